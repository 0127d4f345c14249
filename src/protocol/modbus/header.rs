/// Size of the MBAP header including the unit id
pub const MBAP_HEADER_LEN: usize = 7;

/// Modbus TCP application header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MbapHeader {
    pub transaction_id: u16,
    pub protocol_id: u16,
    pub length: u16,
    pub unit_id: u8,
}

impl MbapHeader {
    /// Read the header from the start of a buffer, `None` if it is too short
    pub fn parse(buf: &[u8]) -> Option<Self> {
        if buf.len() < MBAP_HEADER_LEN {
            return None;
        }
        Some(Self {
            transaction_id: u16::from_be_bytes([buf[0], buf[1]]),
            protocol_id: u16::from_be_bytes([buf[2], buf[3]]),
            length: u16::from_be_bytes([buf[4], buf[5]]),
            unit_id: buf[6],
        })
    }

    /// Header for a reply carrying `pdu_len` bytes after the unit id
    pub fn for_reply(&self, pdu_len: usize) -> Self {
        Self {
            length: (pdu_len + 1) as u16,
            ..*self
        }
    }

    pub fn write_to(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.transaction_id.to_be_bytes());
        out.extend_from_slice(&self.protocol_id.to_be_bytes());
        out.extend_from_slice(&self.length.to_be_bytes());
        out.push(self.unit_id);
    }
}
