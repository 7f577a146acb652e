//! Storage layer: append-only CSV sink and the ledger derived from it.

mod csv;
mod error;
mod ledger;

pub use self::csv::CsvStore;
pub use error::StoreError;
pub use ledger::Ledger;
