//! Timestamp helpers for `[HH:MM:SS]`-stamped transcripts and chapter lists.

/// Format seconds as `HH:MM:SS`
pub fn format_timestamp(total_secs: u64) -> String {
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let secs = total_secs % 60;
    format!("{hours:02}:{minutes:02}:{secs:02}")
}

/// Parse `HH:MM:SS`, `H:MM:SS` or `MM:SS` into seconds
pub fn parse_timestamp(timestamp: &str) -> Option<u64> {
    let parts: Vec<u64> = timestamp
        .split(':')
        .map(|p| p.trim().parse().ok())
        .collect::<Option<Vec<_>>>()?;
    match parts.as_slice() {
        [m, s] => Some(m * 60 + s),
        [h, m, s] => Some(h * 3600 + m * 60 + s),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_timestamp() {
        assert_eq!(format_timestamp(0), "00:00:00");
        assert_eq!(format_timestamp(3661), "01:01:01");
        assert_eq!(format_timestamp(59), "00:00:59");
    }

    #[test]
    fn test_parse_timestamp() {
        assert_eq!(parse_timestamp("00:00:00"), Some(0));
        assert_eq!(parse_timestamp("1:01:01"), Some(3661));
        assert_eq!(parse_timestamp("3:43"), Some(223));
        assert_eq!(parse_timestamp("junk"), None);
        assert_eq!(parse_timestamp("1:2:3:4"), None);
    }

    #[test]
    fn test_roundtrip() {
        for secs in [0, 59, 60, 3599, 3600, 7322] {
            assert_eq!(parse_timestamp(&format_timestamp(secs)), Some(secs));
        }
    }
}
