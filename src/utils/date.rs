//! Repair of run-together and letter-spaced date tokens

use chrono::{Datelike, NaiveDate};

use crate::types::*;

/// Reconstruct a calendar date from a token such as `OCTOBER4,2025`,
/// `O C T O B E R 4 , 2 0 2 5` or `January 04, 2025`.
///
/// Everything before the first digit is the month name; everything from it
/// onwards is `day,year`. A one-digit day is zero padded before parsing with a
/// fixed "month-name day, year" pattern. Any token that does not name a valid
/// calendar date is rejected.
pub fn repair_date(raw: &str) -> StatementResult<NaiveDate> {
    let compact: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    let unparsable = || StatementError::UnparsableDate(raw.to_string());

    let digit_at = compact
        .find(|c: char| c.is_ascii_digit())
        .ok_or_else(unparsable)?;
    let (month, day_year) = compact.split_at(digit_at);
    if month.is_empty() {
        return Err(unparsable());
    }

    let (day, year) = day_year.split_once(',').ok_or_else(unparsable)?;
    let day = if day.len() < 2 {
        format!("0{day}")
    } else {
        day.to_string()
    };

    let candidate = format!("{} {}, {}", title_case(month), day, year);
    NaiveDate::parse_from_str(&candidate, "%B %d, %Y").map_err(|_| unparsable())
}

/// Resolve a month/day token (`Oct04`, `SEPTEMBER28`) against the statement
/// it was printed on.
///
/// The year comes from the statement date; a month/day falling after the
/// statement date belongs to the previous year.
pub fn repair_month_day(token: &str, statement_date: NaiveDate) -> StatementResult<NaiveDate> {
    let year = statement_date.year();
    let date = repair_date(&format!("{token},{year}"))?;
    if date <= statement_date {
        return Ok(date);
    }

    repair_date(&format!("{},{}", token, year - 1))
}

/// Parse a fixed-width numeric token (`101525` with `%m%d%y`)
pub fn parse_numeric_date(token: &str, format: &str) -> StatementResult<NaiveDate> {
    NaiveDate::parse_from_str(token, format)
        .map_err(|_| StatementError::UnparsableDate(token.to_string()))
}

fn title_case(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}
