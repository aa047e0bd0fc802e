//! Date formatting helpers

use chrono::{DateTime, TimeZone};

/// Moment.js tokens accepted in `date_format`, longest first so `MM`
/// does not eat `MMMM`
const TOKENS: [(&str, &str); 8] = [
    ("YYYY", "%Y"),
    ("MMMM", "%B"),
    ("MMM", "%b"),
    ("MM", "%m"),
    ("DD", "%d"),
    ("HH", "%H"),
    ("mm", "%M"),
    ("ss", "%S"),
];

/// Format a date with a Moment.js-style format string
pub fn format_date<Tz: TimeZone>(date: &DateTime<Tz>, format: &str) -> String
where
    Tz::Offset: std::fmt::Display,
{
    date.format(&moment_to_chrono_format(format)).to_string()
}

/// Translate Moment.js tokens into chrono ones.
/// `LL` is the long localized date ("January 15, 2024").
pub fn moment_to_chrono_format(format: &str) -> String {
    if format == "LL" {
        return "%B %-d, %Y".to_string();
    }
    TOKENS
        .iter()
        .fold(format.to_string(), |acc, (token, chrono_token)| {
            acc.replace(token, chrono_token)
        })
}
