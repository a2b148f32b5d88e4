//! Timestamp parsing and the short "last message" labels shown in room lists.

use chrono::{DateTime, Datelike, NaiveDateTime, Utc};

/// Parse a backend timestamp. Accepts RFC 3339 and offset-less ISO-8601
/// (interpreted as UTC).
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f"))
        .ok()
        .map(|naive| naive.and_utc())
}

/// Label for a room's last activity relative to `now`.
pub fn format_last_message_time_at(timestamp: &str, now: DateTime<Utc>) -> Option<String> {
    let at = parse_timestamp(timestamp)?;
    let days = (now - at).num_days();

    let label = if days <= 0 {
        at.format("%I:%M %p").to_string()
    } else if days == 1 {
        "Yesterday".to_string()
    } else if days < 7 {
        at.format("%a").to_string()
    } else if at.year() == now.year() || days < 365 {
        format!("{} {}", at.format("%b"), at.day())
    } else {
        format!("{} {}, {}", at.format("%b"), at.day(), at.year())
    };
    Some(label)
}

pub fn format_last_message_time(timestamp: &str) -> Option<String> {
    format_last_message_time_at(timestamp, Utc::now())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 15, 18, 0, 0).unwrap()
    }

    #[test]
    fn test_parse_variants() {
        let a = parse_timestamp("2024-06-15T09:30:00").unwrap();
        let b = parse_timestamp("2024-06-15T09:30:00.123456").unwrap();
        let c = parse_timestamp("2024-06-15T18:30:00+09:00").unwrap();
        assert_eq!(a.timestamp(), b.timestamp());
        assert_eq!(a, c);
        assert!(parse_timestamp("yesterday").is_none());
    }

    #[test]
    fn test_labels() {
        let label = |s| format_last_message_time_at(s, now()).unwrap();
        assert_eq!(label("2024-06-15T09:05:00"), "09:05 AM");
        assert_eq!(label("2024-06-14T09:05:00"), "Yesterday");
        assert_eq!(label("2024-06-11T09:05:00"), "Tue");
        assert_eq!(label("2024-03-02T09:05:00"), "Mar 2");
        assert_eq!(label("2022-03-02T09:05:00"), "Mar 2, 2022");
    }
}
