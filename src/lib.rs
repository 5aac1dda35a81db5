pub use self::{
    customer::{consolidate, Contact, CustomerRecord},
    ingest::{ingest, IngestError, RowFailure, RunReport},
    normalize::{normalize, ValidationError},
    record::{InvoiceStatus, NormalizedRow, RawRecord},
};

pub mod api;
mod customer;
mod ingest;
mod normalize;
pub mod query;
mod record;
pub mod store;
mod terms;
