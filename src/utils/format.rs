//! Format - Console Formatting Utilities

use chrono::{DateTime, Local, Utc};

use crate::domain::GeoPoint;

/// Format a UTC datetime in local time
pub fn format_datetime(dt: &DateTime<Utc>) -> String {
    let local: DateTime<Local> = dt.with_timezone(&Local);
    local.format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Format just the local time portion
pub fn format_time(dt: &DateTime<Utc>) -> String {
    let local: DateTime<Local> = dt.with_timezone(&Local);
    local.format("%H:%M:%S").to_string()
}

/// Coordinates to six decimals
pub fn format_position(p: &GeoPoint) -> String {
    format!("{:.6}, {:.6}", p.lat, p.lng)
}

/// Coarse age such as `42s ago` or `3h ago`
pub fn format_age(then: &DateTime<Utc>, now: &DateTime<Utc>) -> String {
    let secs = (*now - *then).num_seconds().max(0);
    match secs {
        0..60 => format!("{secs}s ago"),
        60..3_600 => format!("{}m ago", secs / 60),
        3_600..86_400 => format!("{}h ago", secs / 3_600),
        _ => format!("{}d ago", secs / 86_400),
    }
}

/// Truncate to `max_len` characters with an ellipsis
pub fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else if max_len <= 3 {
        s.chars().take(max_len).collect()
    } else {
        let head: String = s.chars().take(max_len - 3).collect();
        format!("{head}...")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_truncate_is_char_safe() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("Gulshan Avenue, Dhaka", 10), "Gulshan...");
        assert_eq!(truncate("ঢাকা শহর", 4), "ঢ...");
    }

    #[test]
    fn test_format_age() {
        let now = Utc::now();
        assert_eq!(format_age(&(now - Duration::seconds(5)), &now), "5s ago");
        assert_eq!(format_age(&(now - Duration::minutes(3)), &now), "3m ago");
        assert_eq!(format_age(&(now - Duration::hours(30)), &now), "1d ago");
        assert_eq!(format_age(&(now + Duration::seconds(5)), &now), "0s ago");
    }

    #[test]
    fn test_format_position() {
        assert_eq!(format_position(&GeoPoint::new(23.8103, 90.4125)), "23.810300, 90.412500");
    }
}
