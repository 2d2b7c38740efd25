//! Instrument payload decoding.

/// Decode a decimal ASCII instrument value.
///
/// Surrounding whitespace and trailing NULs from C publishers are ignored.
/// Anything else that is not an unsigned 32-bit integer yields `None`, which
/// callers treat as "no update".
pub fn parse_raw(payload: &[u8]) -> Option<u32> {
    let text = std::str::from_utf8(payload).ok()?;
    let text = text.trim_matches(|c: char| c.is_ascii_whitespace() || c == '\0');
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    text.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_values() {
        assert_eq!(parse_raw(b"0"), Some(0));
        assert_eq!(parse_raw(b"32768"), Some(32768));
        assert_eq!(parse_raw(b"65535"), Some(65535));
    }

    #[test]
    fn test_padding_is_trimmed() {
        assert_eq!(parse_raw(b" 1200\n"), Some(1200));
        assert_eq!(parse_raw(b"1200\0"), Some(1200));
    }

    #[test]
    fn test_malformed_is_none() {
        assert_eq!(parse_raw(b""), None);
        assert_eq!(parse_raw(b"abc"), None);
        assert_eq!(parse_raw(b"-1"), None);
        assert_eq!(parse_raw(b"+5"), None);
        assert_eq!(parse_raw(b"12 34"), None);
        assert_eq!(parse_raw(b"4294967296"), None);
        assert_eq!(parse_raw(&[0xff, 0xfe]), None);
    }
}
