use chrono::{Datelike, NaiveDate};

/// English month names indexed by month number minus one. Used both for
/// building archive file names and for normalising period tags.
pub const MONTH_NAMES: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

/// First month the publisher archive carries in this file layout.
pub const FIRST_YEAR: i32 = 2020;
pub const FIRST_MONTH: u32 = 8;

/// Case-insensitive month name lookup, 1-based.
pub fn month_from_name(name: &str) -> Option<u32> {
    MONTH_NAMES
        .iter()
        .position(|m| m.eq_ignore_ascii_case(name))
        .map(|i| i as u32 + 1)
}

/// Canonical period key, e.g. (2020, 8) -> "2020-08".
pub fn canonical_period(year: i32, month: u32) -> String {
    format!("{year}-{month:02}")
}

/// All months from August 2020 up to and including the month before
/// `today`, oldest first. The current month is never included since its
/// file is not published until the month has closed.
pub fn month_range(today: NaiveDate) -> Vec<(i32, u32)> {
    let mut months = Vec::new();
    let (mut year, mut month) = (FIRST_YEAR, FIRST_MONTH);
    loop {
        let after_last = year > today.year()
            || (year == today.year() && month >= today.month());
        if after_last {
            break;
        }
        months.push((year, month));
        if month == 12 {
            year += 1;
            month = 1;
        } else {
            month += 1;
        }
    }
    months
}
