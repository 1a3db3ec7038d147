//! Duration normalization
//!
//! The origin reports durations as integer seconds on some endpoints and as
//! pre-formatted text ("3:25", "1:02:05") on others. Everything is normalized
//! to `MM:SS`, or `HH:MM:SS` from one hour up, when the descriptor is built.

use crate::utils::format_clock;
use serde::Deserialize;

/// Raw duration as the origin sends it
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum RawDuration {
    /// Integer seconds
    Seconds(u64),
    /// Pre-formatted text
    Text(String),
}

impl Default for RawDuration {
    fn default() -> Self {
        RawDuration::Seconds(0)
    }
}

/// Normalize a raw duration to its canonical clock string
///
/// Text that is not a `[H:]M:S` clock is kept unchanged.
pub fn normalize(raw: &RawDuration) -> String {
    match raw {
        RawDuration::Seconds(secs) => format_clock(*secs),
        RawDuration::Text(text) => parse_clock(text).map(format_clock).unwrap_or_else(|| text.clone()),
    }
}

/// Normalize an optional raw duration; a missing value becomes `00:00`
pub fn normalize_opt(raw: Option<&RawDuration>) -> String {
    raw.map(normalize).unwrap_or_else(|| format_clock(0))
}

fn parse_clock(text: &str) -> Option<u64> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    if let Ok(secs) = text.parse::<u64>() {
        return Some(secs);
    }

    let fields: Vec<u64> = text
        .split(':')
        .map(|f| f.trim().parse::<u64>())
        .collect::<std::result::Result<_, _>>()
        .ok()?;
    let (h, m, s) = match fields.as_slice() {
        [m, s] => (0, *m, *s),
        [h, m, s] => (*h, *m, *s),
        _ => return None,
    };
    h.checked_mul(3600)?.checked_add(m.checked_mul(60)?)?.checked_add(s)
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seconds_are_formatted() {
        assert_eq!(normalize(&RawDuration::Seconds(125)), "02:05");
        assert_eq!(normalize(&RawDuration::Seconds(3725)), "01:02:05");
        assert_eq!(normalize(&RawDuration::Seconds(0)), "00:00");
    }

    #[test]
    fn text_is_reformatted() {
        assert_eq!(normalize(&RawDuration::Text("2:05".into())), "02:05");
        assert_eq!(normalize(&RawDuration::Text("1:02:05".into())), "01:02:05");
        assert_eq!(normalize(&RawDuration::Text("62:05".into())), "01:02:05");
        assert_eq!(normalize(&RawDuration::Text("125".into())), "02:05");
    }

    #[test]
    fn unparseable_text_is_kept() {
        assert_eq!(normalize(&RawDuration::Text("live".into())), "live");
        assert_eq!(normalize(&RawDuration::Text(String::new())), "");
    }

    #[test]
    fn overflowing_clock_text_is_kept() {
        let huge = "9999999999999999:00:00";
        assert_eq!(normalize(&RawDuration::Text(huge.into())), huge);
        let minutes = format!("{}:00", u64::MAX);
        assert_eq!(normalize(&RawDuration::Text(minutes.clone())), minutes);
    }

    #[test]
    fn deserializes_either_shape() {
        let n: RawDuration = serde_json::from_str("3725").unwrap();
        assert_eq!(n, RawDuration::Seconds(3725));
        let t: RawDuration = serde_json::from_str("\"03:25\"").unwrap();
        assert_eq!(t, RawDuration::Text("03:25".into()));
        assert_eq!(normalize_opt(None), "00:00");
    }
}
