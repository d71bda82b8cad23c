// Application layer: the ledger engine and its error taxonomy.
// Everything a client (CLI, API, test) touches goes through LedgerService.

pub mod error;
pub mod service;

pub use error::*;
pub use service::*;
