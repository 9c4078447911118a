use time::OffsetDateTime;

/// Current wall-clock time in milliseconds since the Unix epoch. Game
/// deadlines cross the wire in this form.
pub fn now_millis() -> u64 {
    (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as u64
}

pub fn millis_remaining(expire_time: u64, now: u64) -> u64 {
    expire_time.saturating_sub(now)
}

/// Remaining time as `MM:SS`, clamped to `00:00` at or past the
/// deadline. Never renders a negative value.
pub fn format_remaining(expire_time: u64, now: u64) -> String {
    let secs = millis_remaining(expire_time, now) / 1000;
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_format_remaining() {
        let expire = 1_000_000;
        assert_eq!(format_remaining(expire, expire - 180_000), "03:00");
        assert_eq!(format_remaining(expire, expire - 61_000), "01:01");
        assert_eq!(format_remaining(expire, expire - 999), "00:00");
    }

    #[test]
    fn test_format_remaining_clamps_past_expiry() {
        let expire = 1_000_000;
        assert_eq!(format_remaining(expire, expire), "00:00");
        assert_eq!(format_remaining(expire, expire + 5_000), "00:00");
        assert_eq!(millis_remaining(expire, expire + 5_000), 0);
    }
}
