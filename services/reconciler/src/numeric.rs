//! Locale-ambiguous numeric coercion
//!
//! Two policies live here:
//! - `coerce` for alert areas: never fails, sums space-separated tokens,
//!   skips tokens it cannot read and falls back to `0.0`.
//! - `required_number` / `required_year` for filter fields: sentinels and
//!   garbage resolve to `None` so the owning row is dropped, never defaulted.

use crate::cell::Cell;
use tracing::debug;

/// Strings meaning "not informed" in the source registries.
pub const UNKNOWN_SENTINELS: &[&str] = &["?", "n/inf", "nan", ""];

/// Result of coercing a multi-token area cell
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coercion {
    pub value: f64,
    pub rejected_tokens: usize,
}

impl Coercion {
    fn zero() -> Self {
        Self {
            value: 0.0,
            rejected_tokens: 0,
        }
    }
}

fn is_sentinel(text: &str) -> bool {
    let lowered = text.trim().to_lowercase();
    UNKNOWN_SENTINELS.contains(&lowered.as_str())
}

/// Replace the first comma with a decimal point and parse.
fn parse_token(token: &str) -> Option<f64> {
    let token = token.trim();
    if token.is_empty() {
        return None;
    }
    token.replacen(',', ".", 1).parse::<f64>().ok()
}

/// Coerce an alert area cell into a single non-negative number.
///
/// `"1,5 2,0"` -> 3.5, blank / absent / `"nan"` -> 0.0.
pub fn coerce(cell: &Cell) -> Coercion {
    match cell {
        Cell::Absent => Coercion::zero(),
        Cell::Number(v) if v.is_finite() && *v >= 0.0 => Coercion {
            value: *v,
            rejected_tokens: 0,
        },
        Cell::Number(v) => {
            debug!(value = %v, "rejecting non-finite or negative area");
            Coercion {
                value: 0.0,
                rejected_tokens: 1,
            }
        }
        Cell::Text(text) => {
            let trimmed = text.trim();
            if trimmed.is_empty() || trimmed == "nan" {
                return Coercion::zero();
            }

            let mut total = 0.0;
            let mut rejected = 0;
            for token in trimmed.split_whitespace() {
                match parse_token(token) {
                    Some(v) if v.is_finite() && v >= 0.0 => total += v,
                    _ => {
                        debug!(token, cell = trimmed, "skipping unparseable area token");
                        rejected += 1;
                    }
                }
            }

            Coercion {
                value: total,
                rejected_tokens: rejected,
            }
        }
    }
}

/// Parse a required numeric field. Sentinels and unparseable text are `None`.
pub fn required_number(cell: &Cell) -> Option<f64> {
    match cell {
        Cell::Absent => None,
        Cell::Number(v) => v.is_finite().then_some(*v),
        Cell::Text(text) if is_sentinel(text) => None,
        Cell::Text(text) => parse_token(text).filter(|v| v.is_finite()),
    }
}

/// Parse a required year. Spreadsheets store years as floats (`2005.0`), so an
/// integral float is accepted; anything with a fractional part is not a year.
pub fn required_year(cell: &Cell) -> Option<i32> {
    let value = match cell {
        Cell::Text(text) if !is_sentinel(text) => {
            let trimmed = text.trim();
            if let Ok(year) = trimmed.parse::<i32>() {
                return Some(year);
            }
            parse_token(trimmed)?
        }
        Cell::Number(v) => *v,
        _ => return None,
    };

    if value.is_finite() && value.fract() == 0.0 && value.abs() <= i32::MAX as f64 {
        Some(value as i32)
    } else {
        None
    }
}
