//! Calendar month arithmetic for the trailing analytics windows.
//!
//! "Trailing N months" always means calendar months: the window starts on the
//! first day of the month N - 1 months before the current one and runs to the
//! anchor date, so every windowed metric agrees on which transactions it
//! covers.

use time::{Date, Month};

/// The first day of the month `offset` months away from the one containing
/// `date`. Negative offsets go back in time.
fn shifted_month_start(date: Date, offset: i32) -> Date {
    let zero_based = date.year() * 12 + date.month() as i32 - 1 + offset;
    let year = zero_based.div_euclid(12);
    let month = Month::try_from((zero_based.rem_euclid(12) + 1) as u8)
        .expect("month index is always within 1-12");

    Date::from_calendar_date(year, month, 1).expect("the first of a month is always a valid date")
}

/// The first day of the month `months` before the one containing `date`.
///
/// `months_back(date, 0)` is the first day of the current month.
pub(crate) fn months_back(date: Date, months: u32) -> Date {
    shifted_month_start(date, -(months as i32))
}

/// The first day of the month containing `date`.
pub(crate) fn month_start(date: Date) -> Date {
    shifted_month_start(date, 0)
}

/// The last day of the month containing `date`.
pub(crate) fn month_end(date: Date) -> Date {
    shifted_month_start(date, 1)
        .previous_day()
        .expect("the day before a month start is always a valid date")
}

/// Format a month as a short label, e.g. "Jan 2026".
pub(crate) fn month_label(date: Date) -> String {
    let month = match date.month() {
        Month::January => "Jan",
        Month::February => "Feb",
        Month::March => "Mar",
        Month::April => "Apr",
        Month::May => "May",
        Month::June => "Jun",
        Month::July => "Jul",
        Month::August => "Aug",
        Month::September => "Sep",
        Month::October => "Oct",
        Month::November => "Nov",
        Month::December => "Dec",
    };

    format!("{} {}", month, date.year())
}
