//! Hex text helpers for stored register data

/// Normalize register hex text.
///
/// Removes every `0x`/`0X` marker and all whitespace, then left-pads with a
/// single `0` when the remaining digit count is odd. Characters are not
/// validated here; see [`is_hex`].
pub fn normalize_hex(raw: &str) -> String {
    let mut out = raw
        .replace("0x", "")
        .replace("0X", "")
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>();
    if out.len() % 2 != 0 {
        out.insert(0, '0');
    }
    out
}

/// Whether a normalized string only contains hex digits
pub fn is_hex(normalized: &str) -> bool {
    normalized.chars().all(|c| c.is_ascii_hexdigit())
}

/// Number of whole 16-bit words in normalized hex text
pub fn word_count(normalized: &str) -> usize {
    normalized.len() / 4
}

/// Decode the `index`-th big-endian word of normalized hex text
pub fn word_at(normalized: &str, index: usize) -> Option<u16> {
    let start = index.checked_mul(4)?;
    let digits = normalized.get(start..start + 4)?;
    u16::from_str_radix(digits, 16).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_strips_prefix_and_whitespace() {
        assert_eq!(normalize_hex("0x1234"), "1234");
        assert_eq!(normalize_hex(" 0x12 0X34\n56\t78 "), "12345678");
        assert_eq!(normalize_hex("ABCD"), "ABCD");
    }

    #[test]
    fn test_normalize_pads_odd_length() {
        assert_eq!(normalize_hex("123"), "0123");
        assert_eq!(normalize_hex("0x1"), "01");
        assert_eq!(normalize_hex(""), "");
    }

    #[test]
    fn test_word_decoding() {
        let hex = normalize_hex("1234 abcd ff");
        assert_eq!(word_count(&hex), 2);
        assert_eq!(word_at(&hex, 0), Some(0x1234));
        assert_eq!(word_at(&hex, 1), Some(0xabcd));
        assert_eq!(word_at(&hex, 2), None);
    }

    #[test]
    fn test_is_hex() {
        assert!(is_hex("00ffAA"));
        assert!(!is_hex("12g4"));
    }
}
