use chrono::NaiveDate;
use rust_decimal::Decimal;

/// One row of the accounts-receivable CSV export, exactly as exported
///
/// Every field is kept as raw text. The normalizer turns this into a
/// [`NormalizedRow`] or rejects it with a per-field validation failure.
#[derive(Debug, serde::Deserialize)]
pub struct RawRecord {
    #[serde(rename = "CustomerName", default)]
    pub customer_name: String,
    #[serde(rename = "ContactName", default)]
    pub contact_name: String,
    #[serde(rename = "ContactPhone", default)]
    pub contact_phone: String,
    #[serde(rename = "ContactEmail", default)]
    pub contact_email: String,
    #[serde(rename = "InvoiceNumber", default)]
    pub invoice_number: String,
    #[serde(rename = "InvoiceDate", default)]
    pub invoice_date: String,
    #[serde(rename = "DueDate", default)]
    pub due_date: String,
    #[serde(rename = "CustomerPoNumber", default)]
    pub customer_po_number: String,
    #[serde(rename = "BillTotal", default)]
    pub bill_total: String,
    #[serde(rename = "Applied", default)]
    pub applied: String,
    #[serde(rename = "Status", default)]
    pub status: String,
    #[serde(rename = "Currency", default)]
    pub currency: String,
    #[serde(rename = "CustomerTerms", default)]
    pub customer_terms: String,
}

/// The lifecycle state of an invoice
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InvoiceStatus {
    Pending,
    Closed,
}

impl InvoiceStatus {
    /// The canonical form persisted to the store
    pub fn as_str(self) -> &'static str {
        match self {
            InvoiceStatus::Pending => "Pending",
            InvoiceStatus::Closed => "Closed",
        }
    }
}

/// A fully validated row ready for persistence
///
/// Dates are concrete calendar dates, money is fixed to two decimal
/// places, and the due date has been resolved, either explicit from the
/// source or derived from the payment terms.
#[derive(Clone, Debug, PartialEq)]
pub struct NormalizedRow {
    pub customer_name: String,
    pub contact_name: Option<String>,
    pub contact_phone: Option<String>,
    pub contact_email: Option<String>,
    pub invoice_number: String,
    pub invoice_date: NaiveDate,
    pub due_date: NaiveDate,
    pub customer_po_number: Option<String>,
    pub bill_total: Decimal,
    pub applied: Decimal,
    pub status: InvoiceStatus,
    pub currency: String,
    pub customer_terms: Option<String>,
    pub terms_days: Option<i64>,
}
