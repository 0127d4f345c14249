use super::{address::ReadRequest, overlay::resolve_words};
use crate::protocol::types::RegisterSegment;

/// Bit values for a read window: the lowest bit of each resolved word
pub fn resolve_bits(segments: &[RegisterSegment], logical_start: u32, quantity: u16) -> Vec<bool> {
    resolve_words(segments, logical_start, quantity)
        .into_iter()
        .map(|word| word & 1 == 1)
        .collect()
}

/// Pack bits LSB-first: bit `i` lands in byte `i / 8` at position `i % 8`
pub fn pack_bits(bits: &[bool]) -> Vec<u8> {
    let mut packed = vec![0u8; bits.len().div_ceil(8)];
    for (i, bit) in bits.iter().enumerate() {
        if *bit {
            packed[i / 8] |= 1 << (i % 8);
        }
    }
    packed
}

/// Response data for coils and discrete inputs: `[byte_count, packed...]`
pub fn build_slave_coils_response(request: &ReadRequest, segments: &[RegisterSegment]) -> Vec<u8> {
    let packed = pack_bits(&resolve_bits(
        segments,
        request.logical_start,
        request.quantity,
    ));
    let mut data = Vec::with_capacity(packed.len() + 1);
    data.push(packed.len() as u8);
    data.extend_from_slice(&packed);
    data
}
