use std::collections::HashMap;

use rusqlite::{params, Connection, Transaction};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use crate::customer::CustomerRecord;
use crate::record::NormalizedRow;

/// Errors from the persistence layer
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
    #[error("amount out of range for storage")]
    AmountOutOfRange,
}

/// Money is persisted as integer cents so SQL aggregates stay exact;
/// dates are ISO-8601 text, which compares correctly as TEXT.
pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS customers (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL UNIQUE,
    contact_name TEXT,
    contact_phone TEXT,
    contact_email TEXT
);

CREATE TABLE IF NOT EXISTS invoices (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    invoice_number TEXT NOT NULL UNIQUE,
    customer_id INTEGER NOT NULL,
    invoice_date TEXT NOT NULL,
    due_date TEXT NOT NULL,
    customer_po_number TEXT,
    bill_total_cents INTEGER NOT NULL CHECK (bill_total_cents >= 0),
    applied_cents INTEGER NOT NULL CHECK (applied_cents >= 0),
    status TEXT NOT NULL,
    currency TEXT NOT NULL,
    customer_terms TEXT,
    terms_days INTEGER
);

CREATE INDEX IF NOT EXISTS idx_invoices_customer_id ON invoices (customer_id);
CREATE INDEX IF NOT EXISTS idx_invoices_invoice_date ON invoices (invoice_date);
CREATE INDEX IF NOT EXISTS idx_invoices_due_date ON invoices (due_date);
"#;

/// Creates the tables and indexes if they are not present yet
pub fn init_schema(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(SCHEMA)?;
    Ok(())
}

/// Converts a two-decimal amount to integer cents for storage
pub fn to_cents(amount: Decimal) -> Result<i64, StoreError> {
    (amount * Decimal::ONE_HUNDRED)
        .to_i64()
        .ok_or(StoreError::AmountOutOfRange)
}

/// Converts stored cents back to a two-decimal amount
pub fn from_cents(cents: i64) -> Decimal {
    Decimal::new(cents, 2)
}

/// Rebuilds the customer table from the consolidated set
///
/// Delete-all-then-insert inside the caller's transaction, so readers
/// see either the previous snapshot or the new one. Ids are assigned
/// 1..n in first-seen order. Returns the name-to-id mapping used to link
/// invoices.
pub fn replace_customers(
    tx: &Transaction<'_>,
    customers: &[CustomerRecord],
) -> Result<HashMap<String, i64>, StoreError> {
    tx.execute("DELETE FROM customers", [])?;

    let mut ids = HashMap::with_capacity(customers.len());
    let mut stmt = tx.prepare(
        "INSERT INTO customers (id, name, contact_name, contact_phone, contact_email)
         VALUES (?1, ?2, ?3, ?4, ?5)",
    )?;

    for (i, customer) in customers.iter().enumerate() {
        let id = i as i64 + 1;
        stmt.execute(params![
            id,
            customer.name,
            customer.contact.contact_name,
            customer.contact.contact_phone,
            customer.contact.contact_email,
        ])?;
        ids.insert(customer.name.clone(), id);
    }

    Ok(ids)
}

/// Inserts the invoice, or updates all mutable fields in place when the
/// invoice number already exists
///
/// The customer id is passed in freshly resolved by name, so a customer
/// rename in the source relinks existing invoices.
pub fn upsert_invoice(
    tx: &Transaction<'_>,
    row: &NormalizedRow,
    customer_id: i64,
) -> Result<(), StoreError> {
    tx.execute(
        r#"INSERT INTO invoices (
               invoice_number, customer_id, invoice_date, due_date,
               customer_po_number, bill_total_cents, applied_cents,
               status, currency, customer_terms, terms_days
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
           ON CONFLICT (invoice_number) DO UPDATE SET
               customer_id = excluded.customer_id,
               invoice_date = excluded.invoice_date,
               due_date = excluded.due_date,
               customer_po_number = excluded.customer_po_number,
               bill_total_cents = excluded.bill_total_cents,
               applied_cents = excluded.applied_cents,
               status = excluded.status,
               currency = excluded.currency,
               customer_terms = excluded.customer_terms,
               terms_days = excluded.terms_days"#,
        params![
            row.invoice_number,
            customer_id,
            row.invoice_date,
            row.due_date,
            row.customer_po_number,
            to_cents(row.bill_total)?,
            to_cents(row.applied)?,
            row.status.as_str(),
            row.currency,
            row.customer_terms,
            row.terms_days,
        ],
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    #[test]
    fn cents_round_trip() {
        assert_eq!(to_cents(dec!(9400.00)).unwrap(), 940_000);
        assert_eq!(to_cents(dec!(0.00)).unwrap(), 0);
        assert_eq!(from_cents(226_110), dec!(2261.10));
    }
}
