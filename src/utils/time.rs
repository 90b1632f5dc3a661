//! Time helpers

use chrono::{DateTime, Utc};

/// Milliseconds elapsed between `since` and `now`
///
/// Returns `i64::MAX` when `since` is unknown, so "never saved" always
/// counts as overdue.
pub fn millis_since(since: Option<DateTime<Utc>>, now: DateTime<Utc>) -> i64 {
    match since {
        Some(ts) => (now - ts).num_milliseconds().max(0),
        None => i64::MAX,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_millis_since() {
        let now = Utc::now();
        assert_eq!(millis_since(Some(now - Duration::milliseconds(250)), now), 250);
        assert_eq!(millis_since(None, now), i64::MAX);
        // clock skew never yields a negative gap
        assert_eq!(millis_since(Some(now + Duration::seconds(1)), now), 0);
    }
}
