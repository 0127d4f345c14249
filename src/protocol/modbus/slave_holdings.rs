use super::{address::ReadRequest, overlay::resolve_words};
use crate::protocol::types::RegisterSegment;

/// Response data for holding and input registers: `[byte_count, words BE...]`
pub fn build_slave_holdings_response(
    request: &ReadRequest,
    segments: &[RegisterSegment],
) -> Vec<u8> {
    let words = resolve_words(segments, request.logical_start, request.quantity);
    let mut data = Vec::with_capacity(words.len() * 2 + 1);
    data.push((words.len() * 2) as u8);
    for word in words {
        data.extend_from_slice(&word.to_be_bytes());
    }
    data
}
