/// CRC16/MODBUS (reflected polynomial 0xA001, initial value 0xFFFF)
pub fn crc16(data: &[u8]) -> u16 {
    let mut crc: u16 = 0xffff;
    for byte in data {
        crc ^= u16::from(*byte);
        for _ in 0..8 {
            if crc & 0x0001 == 0 {
                crc >>= 1;
            } else {
                crc = (crc >> 1) ^ 0xA001;
            }
        }
    }
    crc
}

/// Append the CRC of `frame` in wire order (low byte first)
pub fn append_crc16(frame: &mut Vec<u8>) {
    let crc = crc16(frame);
    frame.extend_from_slice(&crc.to_le_bytes());
}
