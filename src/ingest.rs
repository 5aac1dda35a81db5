use std::collections::HashSet;
use std::io;

use rusqlite::Connection;

use crate::customer;
use crate::normalize;
use crate::record::RawRecord;
use crate::store::{self, StoreError};

/// Errors that abort an ingestion run
///
/// Row-level problems never surface here; they land in the run report.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("failed to read the CSV input")]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// One rejected row in the run report
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RowFailure {
    /// 1-based data row number in the input file
    pub row: usize,
    /// The source column at fault, or "row" for structural CSV problems
    pub field: &'static str,
    pub reason: String,
}

/// Summary of a single ingestion run
#[derive(Debug, Default)]
pub struct RunReport {
    pub rows_seen: usize,
    pub rows_loaded: usize,
    pub rows_failed: usize,
    /// Distinct customers written by this run
    pub customers: usize,
    /// Rows whose invoice number appeared earlier in the same file;
    /// the later row wins through the upsert.
    pub duplicate_invoices: usize,
    pub failures: Vec<RowFailure>,
}

/// Runs the full pipeline: read, normalize, consolidate, persist
///
/// Malformed rows are skipped and reported, never aborting the batch.
/// The customer replace and all invoice upserts commit as a single
/// transaction, so concurrent readers observe either the previous
/// snapshot or the new one. Re-running with the same file converges to
/// the same state: customers are rebuilt from scratch and invoices are
/// upserted by invoice number.
pub fn ingest<R: io::Read>(
    mut reader: csv::Reader<R>,
    conn: &mut Connection,
) -> Result<RunReport, IngestError> {
    let mut report = RunReport::default();
    let mut rows = Vec::new();
    let mut seen_numbers = HashSet::new();

    for result in reader.deserialize::<RawRecord>() {
        report.rows_seen += 1;
        let row_number = report.rows_seen;

        let record = match result {
            Ok(record) => record,
            Err(err) if err.is_io_error() => return Err(err.into()),
            Err(err) => {
                report.failures.push(RowFailure {
                    row: row_number,
                    field: "row",
                    reason: err.to_string(),
                });
                continue;
            }
        };

        match normalize::normalize(&record) {
            Ok(row) => {
                if !seen_numbers.insert(row.invoice_number.clone()) {
                    report.duplicate_invoices += 1;
                }
                rows.push((row_number, row));
            }
            Err(err) => report.failures.push(RowFailure {
                row: row_number,
                field: err.field,
                reason: err.reason,
            }),
        }
    }

    let customers = customer::consolidate(rows.iter().map(|(_, row)| row));
    report.customers = customers.len();

    let tx = conn.transaction().map_err(StoreError::from)?;
    let customer_ids = store::replace_customers(&tx, &customers)?;

    for (row_number, row) in &rows {
        // every surviving row's customer is in the consolidated set
        let Some(&customer_id) = customer_ids.get(&row.customer_name) else {
            continue;
        };
        match store::upsert_invoice(&tx, row, customer_id) {
            Ok(()) => report.rows_loaded += 1,
            Err(err) => report.failures.push(RowFailure {
                row: *row_number,
                field: "row",
                reason: err.to_string(),
            }),
        }
    }

    tx.commit().map_err(StoreError::from)?;
    report.rows_failed = report.failures.len();

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "CustomerName,ContactName,ContactPhone,ContactEmail,InvoiceNumber,InvoiceDate,DueDate,CustomerPoNumber,BillTotal,Applied,Status,Currency,CustomerTerms";

    fn run(rows: &[&str], conn: &mut Connection) -> RunReport {
        let data = format!("{HEADER}\n{}", rows.join("\n"));
        let reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(io::Cursor::new(data.into_bytes()));
        ingest(reader, conn).unwrap()
    }

    fn connection() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        store::init_schema(&conn).unwrap();
        conn
    }

    fn dump_invoices(conn: &Connection) -> Vec<(String, i64, String, String, i64, i64, String)> {
        let mut stmt = conn
            .prepare(
                "SELECT invoice_number, customer_id, invoice_date, due_date,
                        bill_total_cents, applied_cents, status
                 FROM invoices ORDER BY invoice_number",
            )
            .unwrap();
        stmt.query_map([], |row| {
            Ok((
                row.get(0)?,
                row.get(1)?,
                row.get(2)?,
                row.get(3)?,
                row.get(4)?,
                row.get(5)?,
                row.get(6)?,
            ))
        })
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap()
    }

    fn dump_customers(conn: &Connection) -> Vec<(i64, String, Option<String>)> {
        let mut stmt = conn
            .prepare("SELECT id, name, contact_email FROM customers ORDER BY id")
            .unwrap();
        stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap()
    }

    #[test]
    fn loads_customers_and_invoices() {
        let mut conn = connection();
        let report = run(
            &[
                "Acme,Jo,555-0100,jo@acme.test,INV-100,3/11/24,,PO-7,\"9,400.00\",7138.90,Pending,USD,Net 30",
                "Globex,,,hank@globex.test,INV-101,3/12/24,4/30/24,,500.00,,Closed,,Net 15",
            ],
            &mut conn,
        );

        assert_eq!(report.rows_seen, 2);
        assert_eq!(report.rows_loaded, 2);
        assert_eq!(report.rows_failed, 0);
        assert_eq!(report.customers, 2);

        let invoices = dump_invoices(&conn);
        assert_eq!(invoices.len(), 2);
        // due date derived from "Net 30"
        assert_eq!(invoices[0].3, "2024-04-10");
        // explicit due date is authoritative over "Net 15"
        assert_eq!(invoices[1].3, "2024-04-30");
        // blank Applied means zero
        assert_eq!(invoices[1].5, 0);

        assert_eq!(
            dump_customers(&conn),
            vec![
                (1, "Acme".to_string(), Some("jo@acme.test".to_string())),
                (2, "Globex".to_string(), Some("hank@globex.test".to_string())),
            ],
        );
    }

    #[test]
    fn ingestion_is_idempotent() {
        let rows = [
            "Acme,Jo,,jo@acme.test,INV-100,3/11/24,,,9400.00,7138.90,Pending,USD,Net 30",
            "Globex,,,,INV-101,3/12/24,4/30/24,,500.00,,Closed,,",
        ];

        let mut conn = connection();
        run(&rows, &mut conn);
        let first_invoices = dump_invoices(&conn);
        let first_customers = dump_customers(&conn);

        let report = run(&rows, &mut conn);
        assert_eq!(report.rows_loaded, 2);
        assert_eq!(dump_invoices(&conn), first_invoices);
        assert_eq!(dump_customers(&conn), first_customers);
    }

    #[test]
    fn upsert_updates_changed_fields_only() {
        let mut conn = connection();
        run(
            &[
                "Acme,,,,INV-100,3/11/24,,,9400.00,7138.90,Pending,USD,Net 30",
                "Acme,,,,INV-101,3/12/24,,,250.00,0,Pending,USD,Net 30",
            ],
            &mut conn,
        );

        // corrected file: INV-100 fully applied and closed
        run(
            &[
                "Acme,,,,INV-100,3/11/24,,,9400.00,9400.00,Closed,USD,Net 30",
                "Acme,,,,INV-101,3/12/24,,,250.00,0,Pending,USD,Net 30",
            ],
            &mut conn,
        );

        let invoices = dump_invoices(&conn);
        assert_eq!(invoices.len(), 2);
        assert_eq!(invoices[0].5, 940_000);
        assert_eq!(invoices[0].6, "Closed");
        // the untouched invoice keeps its values
        assert_eq!(invoices[1].4, 25_000);
        assert_eq!(invoices[1].5, 0);
        assert_eq!(invoices[1].6, "Pending");
    }

    #[test]
    fn customer_rename_relinks_existing_invoices() {
        let mut conn = connection();
        run(
            &["Acme,,,,INV-100,3/11/24,,,100.00,0,Pending,USD,Net 30"],
            &mut conn,
        );

        run(
            &["Acme Corp,,,,INV-100,3/11/24,,,100.00,0,Pending,USD,Net 30"],
            &mut conn,
        );

        let customers = dump_customers(&conn);
        assert_eq!(customers.len(), 1);
        assert_eq!(customers[0].1, "Acme Corp");
        // the invoice follows the rename
        assert_eq!(dump_invoices(&conn)[0].1, customers[0].0);
    }

    #[test]
    fn customers_are_rebuilt_each_run() {
        let mut conn = connection();
        run(
            &[
                "Acme,,,,INV-100,3/11/24,,,100.00,0,Pending,USD,Net 30",
                "Globex,,,,INV-101,3/12/24,,,200.00,0,Pending,USD,Net 30",
            ],
            &mut conn,
        );

        run(
            &["Acme,,,,INV-100,3/11/24,,,100.00,0,Pending,USD,Net 30"],
            &mut conn,
        );

        let customers = dump_customers(&conn);
        assert_eq!(customers.len(), 1);
        assert_eq!(customers[0].1, "Acme");
        // ingestion never deletes invoices; the Globex one is orphaned
        assert_eq!(dump_invoices(&conn).len(), 2);
    }

    #[test]
    fn bad_rows_are_skipped_and_reported() {
        let mut conn = connection();
        let report = run(
            &[
                "Acme,,,,INV-100,3/11/24,,,100.00,0,Pending,USD,Net 30",
                "Acme,,,,INV-101,2/30/24,,,100.00,0,Pending,USD,Net 30",
                "Acme,,,,INV-102,3/11/24,,,-5.00,0,Pending,USD,Net 30",
                "Acme,,,,INV-103,3/11/24,,,100.00,0,Pending,USD,on receipt",
            ],
            &mut conn,
        );

        assert_eq!(report.rows_seen, 4);
        assert_eq!(report.rows_loaded, 1);
        assert_eq!(report.rows_failed, 3);

        let fields: Vec<_> = report.failures.iter().map(|f| (f.row, f.field)).collect();
        assert_eq!(
            fields,
            vec![(2, "InvoiceDate"), (3, "BillTotal"), (4, "DueDate")],
        );
        assert_eq!(dump_invoices(&conn).len(), 1);
    }

    #[test]
    fn duplicate_invoice_numbers_last_row_wins() {
        let mut conn = connection();
        let report = run(
            &[
                "Acme,,,,INV-100,3/11/24,,,100.00,0,Pending,USD,Net 30",
                "Acme,,,,INV-100,3/11/24,,,100.00,100.00,Closed,USD,Net 30",
            ],
            &mut conn,
        );

        assert_eq!(report.duplicate_invoices, 1);
        let invoices = dump_invoices(&conn);
        assert_eq!(invoices.len(), 1);
        assert_eq!(invoices[0].5, 10_000);
        assert_eq!(invoices[0].6, "Closed");
    }

    #[test]
    fn structurally_broken_rows_are_row_failures() {
        let mut conn = connection();
        let report = run(&["Acme,too,few,fields"], &mut conn);

        assert_eq!(report.rows_seen, 1);
        assert_eq!(report.rows_failed, 1);
        assert_eq!(report.failures[0].field, "row");
        assert!(dump_invoices(&conn).is_empty());
    }
}
