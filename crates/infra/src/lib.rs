//! Infrastructure layer: persistence, configuration and the services that run
//! ledger operations as atomic units of work.
//!
//! Services are generic over a [`store::LedgerStore`]; tests and local tooling use
//! [`store::InMemoryLedgerStore`], deployments use [`store::PostgresLedgerStore`].

pub mod cancellation;
pub mod codes;
pub mod config;
pub mod ledger;
pub mod movements;
pub mod reference;
pub mod retry;
pub mod store;

pub use cancellation::{CancellationEngine, CancellationOutcome};
pub use codes::CodeGenerator;
pub use config::LedgerSettings;
pub use ledger::StockLedger;
pub use movements::{MovementService, TransferPair};
pub use reference::{
    Catalog, InMemoryCatalog, LocationRegistry, ProductRegistry, ReferenceColumn, ReferenceData,
    ReferenceEntry, ReferenceRegistry,
};
pub use retry::ConflictRetry;
pub use store::{InMemoryLedgerStore, LedgerStore, PostgresLedgerStore, UnitOfWork};
