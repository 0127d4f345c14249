use super::ModbusException;
use crate::protocol::types::RegisterMode;

/// Largest quantity accepted by any supported read function
pub const MAX_READ_QUANTITY: u16 = 125;

/// Inclusive logical address range of one register category
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogicalRange {
    pub base: u32,
    pub max: u32,
}

impl LogicalRange {
    pub const fn contains(&self, address: u32) -> bool {
        address >= self.base && address <= self.max
    }
}

impl RegisterMode {
    /// Map a function code onto the register category it reads
    pub fn from_function_code(code: u8) -> Result<Self, ModbusException> {
        RegisterMode::try_from(code).map_err(|_| ModbusException::IllegalFunction)
    }

    pub const fn function_code(self) -> u8 {
        self as u8
    }

    pub const fn logical_range(self) -> LogicalRange {
        match self {
            RegisterMode::Coils => LogicalRange { base: 1, max: 9999 },
            RegisterMode::DiscreteInputs => LogicalRange {
                base: 10001,
                max: 19999,
            },
            RegisterMode::Holding => LogicalRange {
                base: 40001,
                max: 49999,
            },
            RegisterMode::Input => LogicalRange {
                base: 30001,
                max: 39999,
            },
        }
    }

    pub const fn is_bit_type(self) -> bool {
        matches!(self, RegisterMode::Coils | RegisterMode::DiscreteInputs)
    }

    /// Find the category whose range holds a logical address
    pub fn for_logical_address(address: u32) -> Option<Self> {
        use strum::IntoEnumIterator;

        Self::iter().find(|mode| mode.logical_range().contains(address))
    }
}

/// A validated read request, expressed in logical addresses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadRequest {
    pub mode: RegisterMode,
    pub protocol_address: u16,
    pub quantity: u16,
    pub logical_start: u32,
}

impl ReadRequest {
    /// Last logical address covered by the request
    pub const fn logical_end(&self) -> u32 {
        self.logical_start + self.quantity as u32 - 1
    }
}

/// Validate function code and request data of a read PDU.
///
/// `data` is the PDU without the function code: protocol address and
/// quantity, both big-endian. Checks run in order: function code, data
/// length, quantity bound, address range.
pub fn resolve_read_request(function_code: u8, data: &[u8]) -> Result<ReadRequest, ModbusException> {
    let mode = RegisterMode::from_function_code(function_code)?;

    if data.len() < 4 {
        return Err(ModbusException::IllegalDataValue);
    }
    let protocol_address = u16::from_be_bytes([data[0], data[1]]);
    let quantity = u16::from_be_bytes([data[2], data[3]]);

    if !(1..=MAX_READ_QUANTITY).contains(&quantity) {
        return Err(ModbusException::IllegalDataValue);
    }

    let range = mode.logical_range();
    let logical_start = range.base + u32::from(protocol_address);
    let logical_end = logical_start + u32::from(quantity) - 1;
    if logical_start < range.base || logical_end > range.max {
        return Err(ModbusException::IllegalDataAddress);
    }

    Ok(ReadRequest {
        mode,
        protocol_address,
        quantity,
        logical_start,
    })
}
