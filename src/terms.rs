use chrono::{Duration, NaiveDate};

use crate::normalize::ValidationError;

/// Keywords that mark the following integer as a day count
const KEYWORDS: &[&str] = &["net", "due"];

/// Extracts the day count from payment-terms text
///
/// "Net 30" and "Due in 45" style phrasings win. A bare number is
/// accepted when it is the only one in the text; several numbers without
/// a recognized keyword are ambiguous and resolve to nothing.
pub fn terms_days(terms: &str) -> Option<i64> {
    let tokens: Vec<&str> = terms
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|token| !token.is_empty())
        .collect();

    for (i, token) in tokens.iter().enumerate() {
        if KEYWORDS.iter().any(|k| token.eq_ignore_ascii_case(k)) {
            // allow one filler word between keyword and number ("Due in 30")
            let adjacent = tokens[i + 1..]
                .iter()
                .take(2)
                .find_map(|t| t.parse::<i64>().ok());
            if let Some(days) = adjacent {
                return Some(days);
            }
        }
    }

    let mut numbers = tokens.iter().filter_map(|t| t.parse::<i64>().ok());
    match (numbers.next(), numbers.next()) {
        (Some(days), None) => Some(days),
        _ => None,
    }
}

/// Resolves the stored day count and the effective due date for a row
///
/// An explicit due date from the source is authoritative; the day count
/// is still parsed and kept for reference. Without an explicit due date
/// the day count is mandatory and the due date is derived from the
/// invoice date.
pub fn resolve(
    invoice_date: NaiveDate,
    explicit_due: Option<NaiveDate>,
    terms: Option<&str>,
) -> Result<(Option<i64>, NaiveDate), ValidationError> {
    let days = terms.and_then(terms_days);

    match (explicit_due, days) {
        (Some(due), days) => Ok((days, due)),
        (None, Some(days)) => {
            let due = Duration::try_days(days)
                .and_then(|delta| invoice_date.checked_add_signed(delta))
                .ok_or_else(|| {
                    ValidationError::new("CustomerTerms", format!("day count {days} out of range"))
                })?;
            Ok((Some(days), due))
        }
        (None, None) => Err(ValidationError::new(
            "DueDate",
            "no due date given and none can be derived from the terms",
        )),
    }
}
