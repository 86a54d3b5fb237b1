//! Display formatting for single iperf report fields.
//!
//! Every function here is total: input that does not convert is handed back
//! untouched, so one bad field never spoils the rest of a record.

use chrono::{NaiveDateTime, Timelike};

const COMPACT_TIMESTAMP: &str = "%Y%m%d%H%M%S";
const DISPLAY_TIMESTAMP: &str = "%Y-%m-%d %H:%M:%S";

/// `20240101120000` -> `2024-01-01 12:00:00`
pub fn format_timestamp(raw: &str) -> String {
    match NaiveDateTime::parse_from_str(raw, COMPACT_TIMESTAMP) {
        // chrono reads second 60 as a leap second; it is not a valid clock time here.
        Ok(dt) if dt.nanosecond() >= 1_000_000_000 => raw.to_string(),
        Ok(dt) => dt.format(DISPLAY_TIMESTAMP).to_string(),
        Err(_) => raw.to_string(),
    }
}

/// `0.0-10.0` -> `0.0s-10.0s`
pub fn format_interval(raw: &str) -> String {
    let bounds: Vec<&str> = raw.split('-').collect();
    let [start, end] = bounds.as_slice() else {
        return raw.to_string();
    };

    match (start.trim().parse::<f64>(), end.trim().parse::<f64>()) {
        (Ok(start), Ok(end)) => format!("{start:.1}s-{end:.1}s"),
        _ => raw.to_string(),
    }
}

/// `1310720` -> `1310720 (1280 KB)`
pub fn format_transfer(raw: &str) -> String {
    match raw.trim().parse::<i64>() {
        Ok(bytes) => format!("{} ({:.0} KB)", bytes, bytes as f64 / 1024.0),
        Err(_) => raw.to_string(),
    }
}

/// `1048576` -> `1048576 (1049 Kbps)`
pub fn format_bandwidth(raw: &str) -> String {
    match raw.trim().parse::<i64>() {
        Ok(bps) => format!("{} ({:.0} Kbps)", bps, bps as f64 / 1000.0),
        Err(_) => raw.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamp() {
        assert_eq!(format_timestamp("20240101120000"), "2024-01-01 12:00:00");
        assert_eq!(format_timestamp("20231231235959"), "2023-12-31 23:59:59");
        assert_eq!(format_timestamp("yesterday"), "yesterday");
        assert_eq!(format_timestamp(""), "");
        // month 13
        assert_eq!(format_timestamp("20241301120000"), "20241301120000");
        // second 60
        assert_eq!(format_timestamp("20240101235960"), "20240101235960");
        assert_eq!(format_timestamp("20240101235961"), "20240101235961");
    }

    #[test]
    fn interval() {
        assert_eq!(format_interval("0.0-10.0"), "0.0s-10.0s");
        assert_eq!(format_interval("1-2.26"), "1.0s-2.3s");
        assert_eq!(format_interval("0.0-1.0-2.0"), "0.0-1.0-2.0");
        assert_eq!(format_interval("10.0"), "10.0");
        assert_eq!(format_interval("a-b"), "a-b");
    }

    #[test]
    fn transfer_and_bandwidth() {
        assert_eq!(format_transfer("1310720"), "1310720 (1280 KB)");
        assert_eq!(format_transfer("0"), "0 (0 KB)");
        assert_eq!(format_transfer("12.5"), "12.5");
        assert_eq!(format_bandwidth("1048576"), "1048576 (1049 Kbps)");
        assert_eq!(format_bandwidth("1048576\r"), "1048576 (1049 Kbps)");
        assert_eq!(format_bandwidth("fast"), "fast");
    }

    #[test]
    fn fallback_is_a_fixed_point() {
        for raw in ["garbage", "1-2-3", "", "12.5"] {
            let once = format_interval(raw);
            assert_eq!(format_interval(&once), once);
            let once = format_transfer(raw);
            assert_eq!(format_transfer(&once), once);
            let once = format_bandwidth(raw);
            assert_eq!(format_bandwidth(&once), once);
            let once = format_timestamp(raw);
            assert_eq!(format_timestamp(&once), once);
        }
    }
}
