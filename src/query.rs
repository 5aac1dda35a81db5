use chrono::{Local, NaiveDate};
use rusqlite::{params, Connection, OptionalExtension};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::store::from_cents;

/// Errors surfaced by the read-only query services
///
/// Parameter problems carry enough detail to correct the request;
/// storage faults carry none.
#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    #[error("invalid {param}: {reason}")]
    InvalidParameter { param: &'static str, reason: String },
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("store connection unavailable")]
    Unavailable,
    #[error(transparent)]
    Store(#[from] rusqlite::Error),
}

fn invalid(param: &'static str, reason: impl Into<String>) -> QueryError {
    QueryError::InvalidParameter {
        param,
        reason: reason.into(),
    }
}

/// Requests above this page size are clamped, never rejected
pub const MAX_PAGE_SIZE: i64 = 200;
const DEFAULT_PAGE_SIZE: i64 = 50;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
enum SortOrder {
    #[default]
    DueDateAsc,
    DueDateDesc,
}

impl SortOrder {
    fn parse(raw: Option<&str>) -> Result<Self, QueryError> {
        match raw {
            None | Some("due_date.asc") => Ok(SortOrder::DueDateAsc),
            Some("due_date.desc") => Ok(SortOrder::DueDateDesc),
            Some(other) => Err(invalid(
                "sort",
                format!("expected due_date.asc or due_date.desc, got {other:?}"),
            )),
        }
    }

    fn as_sql(self) -> &'static str {
        match self {
            SortOrder::DueDateAsc => "ASC",
            SortOrder::DueDateDesc => "DESC",
        }
    }
}

/// Parameters of the past-due listing, as they arrive from the caller
///
/// All fields stay raw text so a malformed value surfaces as an
/// [`QueryError::InvalidParameter`] naming the parameter, not as an
/// opaque deserialization rejection.
#[derive(Debug, Default, Deserialize)]
pub struct PastDueParams {
    /// Reference date in ISO form; defaults to today
    pub as_of: Option<String>,
    pub limit: Option<String>,
    pub offset: Option<String>,
    /// `due_date.asc` (default) or `due_date.desc`
    pub sort: Option<String>,
}

fn parse_int_param(param: &'static str, raw: Option<&str>) -> Result<Option<i64>, QueryError> {
    raw.map(|value| {
        value
            .parse::<i64>()
            .map_err(|_| invalid(param, format!("must be an integer, got {value:?}")))
    })
    .transpose()
}

#[derive(Debug, Serialize)]
pub struct PastDueItem {
    pub invoice_number: String,
    pub customer_name: String,
    pub invoice_date: NaiveDate,
    pub due_date: NaiveDate,
    pub bill_total: Decimal,
    pub applied: Decimal,
    pub outstanding: Decimal,
    pub currency: String,
    pub status: String,
    pub days_past_due: i64,
}

#[derive(Debug, Serialize)]
pub struct PastDueResponse {
    pub items: Vec<PastDueItem>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
    pub as_of: NaiveDate,
}

/// Lists invoices with a positive outstanding balance due before `as_of`
pub fn past_due(conn: &Connection, request: &PastDueParams) -> Result<PastDueResponse, QueryError> {
    let as_of = match request.as_of.as_deref() {
        Some(raw) => raw.parse::<NaiveDate>().map_err(|_| {
            invalid("as_of", format!("must be an ISO date (YYYY-MM-DD), got {raw:?}"))
        })?,
        None => Local::now().date_naive(),
    };
    let limit = parse_int_param("limit", request.limit.as_deref())?
        .unwrap_or(DEFAULT_PAGE_SIZE)
        .clamp(1, MAX_PAGE_SIZE);
    let offset = parse_int_param("offset", request.offset.as_deref())?.unwrap_or(0);
    if offset < 0 {
        return Err(invalid("offset", "must not be negative"));
    }
    let sort = SortOrder::parse(request.sort.as_deref())?;

    let total: i64 = conn.query_row(
        "SELECT COUNT(*)
         FROM invoices i JOIN customers c ON c.id = i.customer_id
         WHERE i.bill_total_cents - i.applied_cents > 0 AND i.due_date < ?1",
        params![as_of],
        |row| row.get(0),
    )?;

    let sql = format!(
        "SELECT i.invoice_number, c.name, i.invoice_date, i.due_date,
                i.bill_total_cents, i.applied_cents, i.currency, i.status
         FROM invoices i JOIN customers c ON c.id = i.customer_id
         WHERE i.bill_total_cents - i.applied_cents > 0 AND i.due_date < ?1
         ORDER BY i.due_date {}
         LIMIT ?2 OFFSET ?3",
        sort.as_sql(),
    );
    let mut stmt = conn.prepare(&sql)?;
    let items = stmt
        .query_map(params![as_of, limit, offset], |row| {
            let due_date: NaiveDate = row.get(3)?;
            let bill_cents: i64 = row.get(4)?;
            let applied_cents: i64 = row.get(5)?;
            Ok(PastDueItem {
                invoice_number: row.get(0)?,
                customer_name: row.get(1)?,
                invoice_date: row.get(2)?,
                due_date,
                bill_total: from_cents(bill_cents),
                applied: from_cents(applied_cents),
                outstanding: from_cents((bill_cents - applied_cents).max(0)),
                currency: row.get(6)?,
                status: row.get(7)?,
                days_past_due: (as_of - due_date).num_days(),
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(PastDueResponse {
        items,
        total,
        limit,
        offset,
        as_of,
    })
}

#[derive(Debug, Default, Deserialize)]
pub struct MonthlySummaryParams {
    /// Target month in YYYY-MM form
    pub month: Option<String>,
    /// Case-insensitive exact customer name filter
    pub customer_name: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct MonthlySummary {
    pub month: String,
    pub currency: String,
    pub sum_bill_total: Decimal,
    pub count_invoices: i64,
}

/// Sums bill totals over invoices dated within one calendar month
pub fn monthly_summary(
    conn: &Connection,
    request: &MonthlySummaryParams,
) -> Result<MonthlySummary, QueryError> {
    let month = request
        .month
        .as_deref()
        .ok_or_else(|| invalid("month", "required, in YYYY-MM form"))?;
    let first_day = NaiveDate::parse_from_str(&format!("{month}-01"), "%Y-%m-%d")
        .map_err(|_| invalid("month", format!("must be YYYY-MM, got {month:?}")))?;
    let next_month = first_day
        .checked_add_months(chrono::Months::new(1))
        .ok_or_else(|| invalid("month", "out of range"))?;

    const BASE: &str = "SELECT COALESCE(SUM(i.bill_total_cents), 0), COUNT(*),
                               COALESCE(MIN(i.currency), 'USD')
                        FROM invoices i JOIN customers c ON c.id = i.customer_id
                        WHERE i.invoice_date >= ?1 AND i.invoice_date < ?2";
    let map = |row: &rusqlite::Row<'_>| {
        Ok((
            row.get::<_, i64>(0)?,
            row.get::<_, i64>(1)?,
            row.get::<_, String>(2)?,
        ))
    };

    let (sum_cents, count_invoices, currency) = match &request.customer_name {
        Some(name) => conn.query_row(
            &format!("{BASE} AND lower(c.name) = lower(?3)"),
            params![first_day, next_month, name],
            map,
        )?,
        None => conn.query_row(BASE, params![first_day, next_month], map)?,
    };

    Ok(MonthlySummary {
        month: month.to_string(),
        currency,
        sum_bill_total: from_cents(sum_cents),
        count_invoices,
    })
}

#[derive(Debug, Serialize)]
pub struct CustomerContact {
    pub name: String,
    pub contact_name: Option<String>,
    pub contact_phone: Option<String>,
    pub contact_email: Option<String>,
    /// Most recent invoice date for this customer, if any
    pub last_invoice_date: Option<NaiveDate>,
}

/// Looks up contact details by exact customer name
pub fn customer_contact(conn: &Connection, name: &str) -> Result<CustomerContact, QueryError> {
    conn.query_row(
        "SELECT c.name, c.contact_name, c.contact_phone, c.contact_email,
                MAX(i.invoice_date)
         FROM customers c LEFT JOIN invoices i ON i.customer_id = c.id
         WHERE c.name = ?1
         GROUP BY c.id",
        params![name],
        |row| {
            Ok(CustomerContact {
                name: row.get(0)?,
                contact_name: row.get(1)?,
                contact_phone: row.get(2)?,
                contact_email: row.get(3)?,
                last_invoice_date: row.get(4)?,
            })
        },
    )
    .optional()?
    .ok_or(QueryError::NotFound("customer"))
}

#[derive(Debug, Serialize)]
pub struct CustomerOut {
    pub id: i64,
    pub name: String,
    pub contact_name: Option<String>,
    pub contact_phone: Option<String>,
    pub contact_email: Option<String>,
}

/// Looks up a single customer by id
pub fn customer_by_id(conn: &Connection, id: i64) -> Result<CustomerOut, QueryError> {
    conn.query_row(
        "SELECT id, name, contact_name, contact_phone, contact_email
         FROM customers WHERE id = ?1",
        params![id],
        |row| {
            Ok(CustomerOut {
                id: row.get(0)?,
                name: row.get(1)?,
                contact_name: row.get(2)?,
                contact_phone: row.get(3)?,
                contact_email: row.get(4)?,
            })
        },
    )
    .optional()?
    .ok_or(QueryError::NotFound("customer"))
}

/// Returns all customers ordered by name
pub fn list_customers(conn: &Connection) -> Result<Vec<CustomerOut>, QueryError> {
    let mut stmt = conn.prepare(
        "SELECT id, name, contact_name, contact_phone, contact_email
         FROM customers ORDER BY name",
    )?;
    let customers = stmt
        .query_map([], |row| {
            Ok(CustomerOut {
                id: row.get(0)?,
                name: row.get(1)?,
                contact_name: row.get(2)?,
                contact_phone: row.get(3)?,
                contact_email: row.get(4)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(customers)
}

#[derive(Debug, Serialize)]
pub struct InvoiceDetail {
    pub id: i64,
    pub invoice_number: String,
    pub customer_id: i64,
    pub customer_name: String,
    pub invoice_date: NaiveDate,
    pub due_date: NaiveDate,
    pub customer_po_number: Option<String>,
    pub bill_total: Decimal,
    pub applied: Decimal,
    pub outstanding: Decimal,
    pub status: String,
    pub currency: String,
    pub customer_terms: Option<String>,
    pub terms_days: Option<i64>,
}

/// Looks up one invoice by its invoice number
pub fn invoice_by_number(conn: &Connection, number: &str) -> Result<InvoiceDetail, QueryError> {
    conn.query_row(
        "SELECT i.id, i.invoice_number, i.customer_id, c.name,
                i.invoice_date, i.due_date, i.customer_po_number,
                i.bill_total_cents, i.applied_cents, i.status, i.currency,
                i.customer_terms, i.terms_days
         FROM invoices i JOIN customers c ON c.id = i.customer_id
         WHERE i.invoice_number = ?1",
        params![number],
        |row| {
            let bill_cents: i64 = row.get(7)?;
            let applied_cents: i64 = row.get(8)?;
            Ok(InvoiceDetail {
                id: row.get(0)?,
                invoice_number: row.get(1)?,
                customer_id: row.get(2)?,
                customer_name: row.get(3)?,
                invoice_date: row.get(4)?,
                due_date: row.get(5)?,
                customer_po_number: row.get(6)?,
                bill_total: from_cents(bill_cents),
                applied: from_cents(applied_cents),
                outstanding: from_cents((bill_cents - applied_cents).max(0)),
                status: row.get(9)?,
                currency: row.get(10)?,
                customer_terms: row.get(11)?,
                terms_days: row.get(12)?,
            })
        },
    )
    .optional()?
    .ok_or(QueryError::NotFound("invoice"))
}
