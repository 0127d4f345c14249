use crate::{
    protocol::types::RegisterSegment,
    utils::hex::{is_hex, normalize_hex, word_at, word_count},
};

/// Resolve a dense window of register words from stored segments.
///
/// Segments are applied in ascending `start_addr` order (stable for equal
/// starts), each one overwriting what earlier segments wrote, so on overlap
/// the segment with the higher start address wins. Addresses no segment
/// covers read as 0.
pub fn resolve_words(segments: &[RegisterSegment], logical_start: u32, quantity: u16) -> Vec<u16> {
    let mut result = vec![0u16; usize::from(quantity)];
    if quantity == 0 {
        return result;
    }
    let window_end = logical_start + u32::from(quantity) - 1;

    let mut sorted = segments.iter().collect::<Vec<_>>();
    sorted.sort_by_key(|seg| seg.start_addr);

    for seg in sorted {
        let hex = normalize_hex(&seg.hex_data);
        if !is_hex(&hex) {
            log::warn!(
                "Skipping register segment at {} for slave {}: not valid hex",
                seg.start_addr,
                seg.slave_id
            );
            continue;
        }
        let words = word_count(&hex) as u32;
        if words == 0 {
            continue;
        }
        let Some(seg_end) = seg.start_addr.checked_add(words - 1) else {
            log::warn!(
                "Skipping register segment at {} for slave {}: address overflow",
                seg.start_addr,
                seg.slave_id
            );
            continue;
        };

        let from = seg.start_addr.max(logical_start);
        let to = seg_end.min(window_end);
        for address in from..=to {
            if let Some(word) = word_at(&hex, (address - seg.start_addr) as usize) {
                result[(address - logical_start) as usize] = word;
            }
        }
    }

    result
}
