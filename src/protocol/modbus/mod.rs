mod address;
mod crc;
mod frame;
mod header;
mod overlay;
mod slave_coils;
mod slave_holdings;

use derive_more::{Display, Error};
use num_enum::{IntoPrimitive, TryFromPrimitive};

pub use address::{resolve_read_request, LogicalRange, ReadRequest, MAX_READ_QUANTITY};
pub use crc::{append_crc16, crc16};
pub use frame::{FrameError, RtuFrame, TcpFrame, RTU_MIN_FRAME_LEN, TCP_MIN_FRAME_LEN};
pub use header::{MbapHeader, MBAP_HEADER_LEN};
pub use overlay::resolve_words;
pub use slave_coils::{build_slave_coils_response, pack_bits, resolve_bits};
pub use slave_holdings::build_slave_holdings_response;

use crate::protocol::types::RegisterSegment;

/// Exception codes returned in Modbus error replies
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, Error, IntoPrimitive, TryFromPrimitive,
)]
#[repr(u8)]
pub enum ModbusException {
    #[display("illegal function")]
    IllegalFunction = 0x01,
    #[display("illegal data address")]
    IllegalDataAddress = 0x02,
    #[display("illegal data value")]
    IllegalDataValue = 0x03,
}

/// Build the data part of a read reply (`[byte_count, data...]`)
pub fn build_read_response(request: &ReadRequest, segments: &[RegisterSegment]) -> Vec<u8> {
    if request.mode.is_bit_type() {
        build_slave_coils_response(request, segments)
    } else {
        build_slave_holdings_response(request, segments)
    }
}
