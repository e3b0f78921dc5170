use chrono::{Datelike, Duration, NaiveDate};

/// Month `offset` months after `month`, staying in 1..=12
pub fn month_after(month: u32, offset: u32) -> u32 {
    (month - 1 + offset) % 12 + 1
}

/// Last calendar day of `month` in `year`
pub fn last_day_of_month(year: i32, month: u32) -> Option<NaiveDate> {
    let (next_year, next_month) = if month == 12 {
        (year.checked_add(1)?, 1)
    } else {
        (year, month + 1)
    };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)?.pred_opt()
}

/// Lookback periods of 365 days each, newest first.
///
/// Period `i` ends `i * 365` days before `today` and starts 365 days before its end.
pub fn lookback_periods(today: NaiveDate, count: u32) -> Vec<(NaiveDate, NaiveDate)> {
    (0..count)
        .map(|i| {
            let end = today - Duration::days(i as i64 * 365);
            (end - Duration::days(365), end)
        })
        .collect()
}

/// `YYYY-MM-DD` prefix of an ISO-8601 timestamp, parsed as a date
pub fn parse_iso_date(datetime: &str) -> Option<NaiveDate> {
    let day = datetime.get(..10)?;
    NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
}

pub fn month_of(date: NaiveDate) -> u32 {
    date.month()
}
