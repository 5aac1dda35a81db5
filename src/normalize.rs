use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::record::{InvoiceStatus, NormalizedRow, RawRecord};
use crate::terms;

/// A single field of a row failed validation
///
/// Returned as a value and collected into the run report, so one bad row
/// never takes down an ingestion run.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("{field}: {reason}")]
pub struct ValidationError {
    /// The source column the failure belongs to
    pub field: &'static str,
    pub reason: String,
}

impl ValidationError {
    pub(crate) fn new(field: &'static str, reason: impl Into<String>) -> Self {
        Self {
            field,
            reason: reason.into(),
        }
    }
}

/// Date formats seen in the source exports, tried in order
const DATE_FORMATS: &[&str] = &["%m/%d/%y", "%m/%d/%Y", "%Y-%m-%d"];

/// Parses a date in any of the known source formats
///
/// A trailing time portion ("3/11/24 00:00") is discarded. Impossible
/// calendar dates are rejected.
pub fn parse_date(field: &'static str, raw: &str) -> Result<NaiveDate, ValidationError> {
    let token = raw.split_whitespace().next().unwrap_or("");
    if token.is_empty() {
        return Err(ValidationError::new(field, "date is blank"));
    }

    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(token, format).ok())
        .ok_or_else(|| ValidationError::new(field, format!("unrecognized date {token:?}")))
}

fn parse_optional_date(
    field: &'static str,
    raw: &str,
) -> Result<Option<NaiveDate>, ValidationError> {
    match raw.trim().is_empty() {
        true => Ok(None),
        false => parse_date(field, raw).map(Some),
    }
}

/// Parses a monetary amount into a two-decimal fixed-point value
///
/// Thousands separators and a leading currency symbol are tolerated. A
/// blank amount means zero in the source export. Negative and
/// non-numeric values are rejected.
pub fn parse_money(field: &'static str, raw: &str) -> Result<Decimal, ValidationError> {
    let cleaned: String = raw
        .trim()
        .chars()
        .filter(|c| *c != ',' && *c != '$')
        .collect();

    if cleaned.is_empty() {
        return Ok(Decimal::new(0, 2));
    }

    let value = cleaned
        .parse::<Decimal>()
        .map_err(|_| ValidationError::new(field, format!("not a number: {:?}", raw.trim())))?;
    if value.is_sign_negative() {
        return Err(ValidationError::new(field, "amount must not be negative"));
    }

    let mut value = value.round_dp(2);
    value.rescale(2);
    Ok(value)
}

/// Normalizes case and whitespace variants of the invoice status
pub fn parse_status(raw: &str) -> Result<InvoiceStatus, ValidationError> {
    let trimmed = raw.trim();
    if trimmed.eq_ignore_ascii_case("pending") {
        Ok(InvoiceStatus::Pending)
    } else if trimmed.eq_ignore_ascii_case("closed") {
        Ok(InvoiceStatus::Closed)
    } else {
        Err(ValidationError::new(
            "Status",
            format!("expected Pending or Closed, got {trimmed:?}"),
        ))
    }
}

/// Normalizes the currency code, defaulting to USD when blank
pub fn parse_currency(raw: &str) -> Result<String, ValidationError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok("USD".to_string());
    }

    match trimmed.len() == 3 && trimmed.chars().all(|c| c.is_ascii_alphabetic()) {
        true => Ok(trimmed.to_ascii_uppercase()),
        false => Err(ValidationError::new(
            "Currency",
            format!("expected a 3-letter code, got {trimmed:?}"),
        )),
    }
}

fn optional_text(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn required_text(field: &'static str, raw: &str) -> Result<String, ValidationError> {
    optional_text(raw).ok_or_else(|| ValidationError::new(field, "must not be blank"))
}

/// Validates one raw row and resolves its due date
///
/// Pure function: failures come back as values so the orchestrator can
/// skip the row and keep going.
pub fn normalize(record: &RawRecord) -> Result<NormalizedRow, ValidationError> {
    let customer_name = required_text("CustomerName", &record.customer_name)?;
    let invoice_number = required_text("InvoiceNumber", &record.invoice_number)?;
    let invoice_date = parse_date("InvoiceDate", &record.invoice_date)?;
    let explicit_due = parse_optional_date("DueDate", &record.due_date)?;
    let bill_total = parse_money("BillTotal", &record.bill_total)?;
    let applied = parse_money("Applied", &record.applied)?;
    let status = parse_status(&record.status)?;
    let currency = parse_currency(&record.currency)?;
    let customer_terms = optional_text(&record.customer_terms);

    let (terms_days, due_date) =
        terms::resolve(invoice_date, explicit_due, customer_terms.as_deref())?;

    Ok(NormalizedRow {
        customer_name,
        contact_name: optional_text(&record.contact_name),
        contact_phone: optional_text(&record.contact_phone),
        contact_email: optional_text(&record.contact_email),
        invoice_number,
        invoice_date,
        due_date,
        customer_po_number: optional_text(&record.customer_po_number),
        bill_total,
        applied,
        status,
        currency,
        customer_terms,
        terms_days,
    })
}
