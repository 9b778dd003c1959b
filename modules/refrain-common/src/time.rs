use chrono::{Datelike, TimeZone, Utc};

pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

pub fn current_year() -> i32 {
    Utc::now().year()
}

/// UTC year of a millisecond timestamp. `None` for unknown (`<= 0`) timestamps.
pub fn year_of(timestamp_ms: i64) -> Option<i32> {
    if timestamp_ms <= 0 {
        return None;
    }
    Utc.timestamp_millis_opt(timestamp_ms)
        .single()
        .map(|dt| dt.year())
}

/// `YYYY-MM-DD` in UTC.
pub fn date_of(timestamp_ms: i64) -> Option<String> {
    if timestamp_ms <= 0 {
        return None;
    }
    Utc.timestamp_millis_opt(timestamp_ms)
        .single()
        .map(|dt| dt.format("%Y-%m-%d").to_string())
}

/// `[start, end)` of a UTC calendar year in milliseconds.
pub fn year_bounds_ms(year: i32) -> (i64, i64) {
    (start_of_year_ms(year), start_of_year_ms(year + 1))
}

/// July 1st 00:00 UTC of `year`, the starting point of a historical cursor walk.
pub fn mid_year_ms(year: i32) -> i64 {
    Utc.with_ymd_and_hms(year, 7, 1, 0, 0, 0)
        .single()
        .map(|dt| dt.timestamp_millis())
        .unwrap_or(0)
}

fn start_of_year_ms(year: i32) -> i64 {
    Utc.with_ymd_and_hms(year, 1, 1, 0, 0, 0)
        .single()
        .map(|dt| dt.timestamp_millis())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_timestamps_have_no_year() {
        assert_eq!(year_of(0), None);
        assert_eq!(year_of(-5), None);
        assert_eq!(date_of(0), None);
    }

    #[test]
    fn mid_year_falls_inside_its_year() {
        let mid = mid_year_ms(2019);
        assert_eq!(year_of(mid), Some(2019));
        let (start, end) = year_bounds_ms(2019);
        assert!(start < mid && mid < end);
        assert_eq!(year_of(end - 1), Some(2019));
        assert_eq!(year_of(end), Some(2020));
    }

    #[test]
    fn dates_are_utc() {
        // 2020-01-01T00:00:00Z
        assert_eq!(date_of(1_577_836_800_000).as_deref(), Some("2020-01-01"));
    }
}
