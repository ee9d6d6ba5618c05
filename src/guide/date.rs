use chrono::{DateTime, TimeZone, Utc};
use regex::Regex;
use std::sync::OnceLock;
use thiserror::Error;

/// Errors from [`parse_broadcast_time`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DateParseError {
    /// Fewer than six numeric groups in the input.
    #[error("Expected 6 numeric components in '{input}', found {found}")]
    MissingComponents { input: String, found: usize },
    /// A numeric group does not fit its field.
    #[error("Numeric component '{component}' in '{input}' is too large")]
    Overflow { input: String, component: String },
    /// The six components do not name a real calendar instant.
    #[error("'{input}' is not a valid date/time")]
    OutOfRange { input: String },
}

fn digits_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[0-9]+").expect("digit pattern is valid"))
}

/// Parses a guide timestamp into a UTC instant.
///
/// The first six runs of digits are read as year, month (1-based), day,
/// hour, minute and second; any separators are accepted and anything after
/// the sixth group (fractions, a UTC offset) is ignored. The components are
/// taken as UTC wall-clock time.
///
/// # Errors
///
/// Fails with [`DateParseError`] when fewer than six groups are present or
/// when the components do not form a valid date and time (month 13,
/// February 30th, ...).
///
/// # Examples
///
/// ```
/// use showwatch::guide::parse_broadcast_time;
///
/// let t = parse_broadcast_time("2024-05-01T09:30:00+09:00").unwrap();
/// assert_eq!(t.to_rfc3339(), "2024-05-01T09:30:00+00:00");
/// ```
pub fn parse_broadcast_time(input: &str) -> Result<DateTime<Utc>, DateParseError> {
    let groups: Vec<&str> = digits_re()
        .find_iter(input)
        .take(6)
        .map(|m| m.as_str())
        .collect();

    if groups.len() < 6 {
        return Err(DateParseError::MissingComponents {
            input: input.to_string(),
            found: groups.len(),
        });
    }

    let mut fields = [0u32; 6];
    for (field, component) in fields.iter_mut().zip(&groups) {
        *field = component.parse().map_err(|_| DateParseError::Overflow {
            input: input.to_string(),
            component: component.to_string(),
        })?;
    }
    let [year, month, day, hour, minute, second] = fields;

    let year = i32::try_from(year).map_err(|_| DateParseError::Overflow {
        input: input.to_string(),
        component: groups[0].to_string(),
    })?;

    Utc.with_ymd_and_hms(year, month, day, hour, minute, second)
        .single()
        .ok_or_else(|| DateParseError::OutOfRange {
            input: input.to_string(),
        })
}
