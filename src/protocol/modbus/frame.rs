use derive_more::{Display, Error};

use super::{
    crc::{append_crc16, crc16},
    header::{MbapHeader, MBAP_HEADER_LEN},
    ModbusException,
};

/// Minimum Modbus TCP frame: MBAP header plus function code
pub const TCP_MIN_FRAME_LEN: usize = MBAP_HEADER_LEN + 1;
/// Minimum RTU frame: unit id, function code and CRC16
pub const RTU_MIN_FRAME_LEN: usize = 4;

const EXCEPTION_FLAG: u8 = 0x80;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Error)]
pub enum FrameError {
    #[display("frame too short: {len} bytes, need at least {min}")]
    TooShort { len: usize, min: usize },
    #[display("CRC mismatch: frame carries {received:04x}, computed {computed:04x}")]
    CrcMismatch { received: u16, computed: u16 },
}

/// Inbound Modbus TCP request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TcpFrame {
    pub header: MbapHeader,
    pub function_code: u8,
    pub payload: Vec<u8>,
}

impl TcpFrame {
    /// Parse a request; the MBAP length field is not cross-checked
    pub fn parse(buf: &[u8]) -> Result<Self, FrameError> {
        if buf.len() < TCP_MIN_FRAME_LEN {
            return Err(FrameError::TooShort {
                len: buf.len(),
                min: TCP_MIN_FRAME_LEN,
            });
        }
        let header = MbapHeader::parse(buf).ok_or(FrameError::TooShort {
            len: buf.len(),
            min: TCP_MIN_FRAME_LEN,
        })?;
        Ok(Self {
            header,
            function_code: buf[MBAP_HEADER_LEN],
            payload: buf[TCP_MIN_FRAME_LEN..].to_vec(),
        })
    }

    pub fn unit_id(&self) -> u8 {
        self.header.unit_id
    }

    /// Success reply: `[function_code, data...]` behind a mirrored header
    pub fn build_response(&self, data: &[u8]) -> Vec<u8> {
        let mut pdu = Vec::with_capacity(data.len() + 1);
        pdu.push(self.function_code);
        pdu.extend_from_slice(data);
        self.wrap(&pdu)
    }

    /// Exception reply: `[function_code | 0x80, error_code]`
    pub fn build_exception(&self, exception: ModbusException) -> Vec<u8> {
        self.wrap(&[self.function_code | EXCEPTION_FLAG, exception.into()])
    }

    fn wrap(&self, pdu: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(MBAP_HEADER_LEN + pdu.len());
        self.header.for_reply(pdu.len()).write_to(&mut out);
        out.extend_from_slice(pdu);
        out
    }
}

/// Inbound RTU request carried over TCP
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RtuFrame {
    pub unit_id: u8,
    pub function_code: u8,
    pub payload: Vec<u8>,
    pub crc: u16,
}

impl RtuFrame {
    /// Parse a request and verify its trailing little-endian CRC16
    pub fn parse(buf: &[u8]) -> Result<Self, FrameError> {
        if buf.len() < RTU_MIN_FRAME_LEN {
            return Err(FrameError::TooShort {
                len: buf.len(),
                min: RTU_MIN_FRAME_LEN,
            });
        }
        let body_len = buf.len() - 2;
        let received = u16::from_le_bytes([buf[body_len], buf[body_len + 1]]);
        let computed = crc16(&buf[..body_len]);
        if received != computed {
            return Err(FrameError::CrcMismatch { received, computed });
        }
        Ok(Self {
            unit_id: buf[0],
            function_code: buf[1],
            payload: buf[2..body_len].to_vec(),
            crc: received,
        })
    }

    /// Success reply: `[unit_id, function_code, data...]` plus CRC16
    pub fn build_response(&self, data: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(data.len() + 4);
        out.push(self.unit_id);
        out.push(self.function_code);
        out.extend_from_slice(data);
        append_crc16(&mut out);
        out
    }

    /// Exception reply: `[unit_id, function_code | 0x80, error_code]` plus CRC16
    pub fn build_exception(&self, exception: ModbusException) -> Vec<u8> {
        let mut out = vec![
            self.unit_id,
            self.function_code | EXCEPTION_FLAG,
            exception.into(),
        ];
        append_crc16(&mut out);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TCP_READ_HOLDINGS: [u8; 12] = [
        0x00, 0x01, 0x00, 0x00, 0x00, 0x06, 0x01, 0x03, 0x00, 0x00, 0x00, 0x02,
    ];

    #[test]
    fn test_tcp_parse() {
        let frame = TcpFrame::parse(&TCP_READ_HOLDINGS).unwrap();
        assert_eq!(frame.header.transaction_id, 1);
        assert_eq!(frame.unit_id(), 1);
        assert_eq!(frame.function_code, 3);
        assert_eq!(frame.payload, vec![0x00, 0x00, 0x00, 0x02]);
    }

    #[test]
    fn test_tcp_parse_tolerates_length_mismatch() {
        let mut buf = TCP_READ_HOLDINGS;
        buf[5] = 0x40;
        assert!(TcpFrame::parse(&buf).is_ok());
    }

    #[test]
    fn test_tcp_too_short() {
        assert_eq!(
            TcpFrame::parse(&TCP_READ_HOLDINGS[..7]),
            Err(FrameError::TooShort { len: 7, min: 8 })
        );
    }

    #[test]
    fn test_tcp_build_response() {
        let frame = TcpFrame::parse(&TCP_READ_HOLDINGS).unwrap();
        assert_eq!(
            frame.build_response(&[0x04, 0x12, 0x34, 0x56, 0x78]),
            vec![0x00, 0x01, 0x00, 0x00, 0x00, 0x07, 0x01, 0x03, 0x04, 0x12, 0x34, 0x56, 0x78]
        );
    }

    #[test]
    fn test_tcp_build_exception() {
        let mut buf = TCP_READ_HOLDINGS;
        buf[7] = 0x05;
        let frame = TcpFrame::parse(&buf).unwrap();
        assert_eq!(
            frame.build_exception(ModbusException::IllegalFunction),
            vec![0x00, 0x01, 0x00, 0x00, 0x00, 0x03, 0x01, 0x85, 0x01]
        );
    }

    #[test]
    fn test_rtu_parse_and_crc() {
        let frame = RtuFrame::parse(&[0x01, 0x03, 0x00, 0x00, 0x00, 0x0a, 0xc5, 0xcd]).unwrap();
        assert_eq!(frame.unit_id, 1);
        assert_eq!(frame.function_code, 3);
        assert_eq!(frame.payload, vec![0x00, 0x00, 0x00, 0x0a]);
        assert_eq!(frame.crc, 0xcdc5);
    }

    #[test]
    fn test_rtu_crc_mismatch() {
        assert_eq!(
            RtuFrame::parse(&[0x01, 0x03, 0x00, 0x00, 0x00, 0x0a, 0xcd, 0xc5]),
            Err(FrameError::CrcMismatch {
                received: 0xc5cd,
                computed: 0xcdc5
            })
        );
    }

    #[test]
    fn test_rtu_too_short() {
        assert!(matches!(
            RtuFrame::parse(&[0x01, 0x03, 0x00]),
            Err(FrameError::TooShort { len: 3, min: 4 })
        ));
    }

    #[test]
    fn test_rtu_built_frames_validate() {
        let frame = RtuFrame::parse(&[0x01, 0x03, 0x00, 0x00, 0x00, 0x0a, 0xc5, 0xcd]).unwrap();

        let ok = frame.build_response(&[0x02, 0xab, 0xcd]);
        let reparsed = RtuFrame::parse(&ok).unwrap();
        assert_eq!(reparsed.payload, vec![0x02, 0xab, 0xcd]);

        let err = frame.build_exception(ModbusException::IllegalDataAddress);
        assert_eq!(&err[..3], &[0x01, 0x83, 0x02]);
        assert!(RtuFrame::parse(&err).is_ok());
    }
}
