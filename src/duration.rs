//! Human duration parsing for commands (`30s`, `10m`, `1h30m`, `2 days`)

use std::time::Duration;

/// Parse a whole string such as `"10m"`, `"1h 30m"` or `"2 hours"`
#[must_use]
pub fn parse_duration(text: &str) -> Option<Duration> {
    let compact: String = text
        .trim()
        .to_lowercase()
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();
    if compact.is_empty() {
        return None;
    }
    humantime::parse_duration(&compact).ok()
}

/// Find the first duration embedded in free text, e.g. `"timeout 5m please"`
///
/// A bare number followed by a unit word (`"1 hour"`) is read as one duration.
#[must_use]
pub fn find_duration(text: &str) -> Option<Duration> {
    let tokens: Vec<&str> = text.split_whitespace().collect();
    tokens.iter().enumerate().find_map(|(i, token)| {
        if token.chars().all(|c| c.is_ascii_digit()) {
            let unit = tokens.get(i + 1)?;
            parse_duration(&format!("{token}{unit}"))
        } else {
            parse_duration(token)
        }
    })
}

/// Render seconds compactly, largest unit first (`"1h 5m"`)
#[must_use]
pub fn format_seconds(total: u64) -> String {
    humantime::format_duration(Duration::from_secs(total)).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_units() {
        assert_eq!(parse_duration("30s"), Some(Duration::from_secs(30)));
        assert_eq!(parse_duration("10m"), Some(Duration::from_secs(600)));
        assert_eq!(parse_duration("2 hours"), Some(Duration::from_secs(7_200)));
        assert_eq!(parse_duration("1d"), Some(Duration::from_secs(86_400)));
        assert_eq!(parse_duration("5MIN"), Some(Duration::from_secs(300)));
    }

    #[test]
    fn test_parse_compound() {
        assert_eq!(parse_duration("1h30m"), Some(Duration::from_secs(5_400)));
        assert_eq!(parse_duration("1h 30m"), Some(Duration::from_secs(5_400)));
        assert_eq!(parse_duration("2days 4h"), Some(Duration::from_secs(187_200)));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert_eq!(parse_duration(""), None);
        assert_eq!(parse_duration("ten minutes"), None);
        assert_eq!(parse_duration("10"), None);
        assert_eq!(parse_duration("10m extra"), None);
    }

    #[test]
    fn test_find_embedded() {
        assert_eq!(
            find_duration("mass ban timeout 5m"),
            Some(Duration::from_secs(300))
        );
        assert_eq!(
            find_duration("link enable 2 timeout 1 hour"),
            Some(Duration::from_secs(3_600))
        );
        assert_eq!(find_duration("link enable 2 kick"), None);
        assert_eq!(find_duration("link enable 2"), None);
    }

    #[test]
    fn test_format_seconds() {
        assert_eq!(format_seconds(0), "0s");
        assert_eq!(format_seconds(120), "2m");
        assert_eq!(format_seconds(3_905), "1h 5m 5s");
        assert_eq!(format_seconds(90_000), "1day 1h");
    }
}
