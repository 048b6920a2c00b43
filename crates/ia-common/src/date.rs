//! Install date codec.
//!
//! Both the registry `InstallDate` value and the instrumentation service
//! report dates as an 8-character `yyyyMMdd` string. Anything else is treated
//! as "no date", never as an error.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

/// Parse a raw `yyyyMMdd` install date.
///
/// Returns `None` for any input that is not exactly eight ASCII digits or
/// that does not name a real calendar day.
pub fn parse_install_date(raw: &str) -> Option<NaiveDate> {
    if raw.len() != 8 || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let year: i32 = raw[0..4].parse().ok()?;
    let month: u32 = raw[4..6].parse().ok()?;
    let day: u32 = raw[6..8].parse().ok()?;

    // Year 0000 is not a representable calendar year for the source data.
    if year < 1 {
        return None;
    }

    NaiveDate::from_ymd_opt(year, month, day)
}

/// Lift a calendar date to a timestamp at local midnight.
pub fn date_at_midnight(date: NaiveDate) -> NaiveDateTime {
    date.and_time(NaiveTime::MIN)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_parse_valid_date() {
        assert_eq!(
            parse_install_date("20230615"),
            NaiveDate::from_ymd_opt(2023, 6, 15)
        );
    }

    #[test]
    fn test_parse_rejects_wrong_length() {
        assert_eq!(parse_install_date(""), None);
        assert_eq!(parse_install_date("2023061"), None);
        assert_eq!(parse_install_date("202306150"), None);
        assert_eq!(parse_install_date("2023-06-15"), None);
    }

    #[test]
    fn test_parse_rejects_non_numeric() {
        assert_eq!(parse_install_date("2023O615"), None);
        assert_eq!(parse_install_date("abcdefgh"), None);
        assert_eq!(parse_install_date(" 2023061"), None);
        assert_eq!(parse_install_date("+2023061"), None);
    }

    #[test]
    fn test_parse_rejects_impossible_days() {
        assert_eq!(parse_install_date("20230230"), None);
        assert_eq!(parse_install_date("20231301"), None);
        assert_eq!(parse_install_date("20230000"), None);
        assert_eq!(parse_install_date("00000101"), None);
    }

    #[test]
    fn test_parse_leap_day() {
        assert_eq!(
            parse_install_date("20240229"),
            NaiveDate::from_ymd_opt(2024, 2, 29)
        );
        assert_eq!(parse_install_date("20230229"), None);
    }

    #[test]
    fn test_date_at_midnight() {
        let date = NaiveDate::from_ymd_opt(2023, 6, 15).unwrap();
        let ts = date_at_midnight(date);
        assert_eq!(ts.date(), date);
        assert_eq!(ts.time(), NaiveTime::MIN);
    }

    proptest! {
        #[test]
        fn prop_parse_never_panics(raw in ".{0,12}") {
            let _ = parse_install_date(&raw);
        }

        #[test]
        fn prop_formatted_dates_parse_back(
            year in 1i32..=9999,
            ordinal in 1u32..=365,
        ) {
            let date = NaiveDate::from_yo_opt(year, ordinal).unwrap();
            let raw = date.format("%Y%m%d").to_string();
            prop_assert_eq!(parse_install_date(&raw), Some(date));
        }

        #[test]
        fn prop_non_eight_length_rejected(raw in "[0-9]{0,7}|[0-9]{9,12}") {
            prop_assert_eq!(parse_install_date(&raw), None);
        }
    }
}
