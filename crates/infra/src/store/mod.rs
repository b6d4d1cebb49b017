//! Persistence boundary of the ledger.
//!
//! A [`LedgerStore`] serves reads and applies a [`UnitOfWork`] atomically: every
//! stock mutation, document insert and header cancellation in the unit is
//! version-checked first, then all of them are applied, or none are. A stale
//! version or duplicate code surfaces as `DomainError::Conflict`.

pub mod in_memory;
pub mod postgres;

use std::sync::Arc;

use stockflow_core::{DomainResult, LocationId, MovementId, Page, QueryComposer};
use stockflow_inventory::{
    DocumentType, MovementColumn, MovementDocument, MovementHeader, StockColumn, StockKey,
    StockMutation, StockRecord,
};

pub use in_memory::InMemoryLedgerStore;
pub use postgres::PostgresLedgerStore;

/// Writes committed together.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnitOfWork {
    pub stock: Vec<StockMutation>,
    pub inserts: Vec<MovementDocument>,
    /// Headers in their cancelled state, carrying the version they were read at.
    pub cancellations: Vec<MovementHeader>,
}

impl UnitOfWork {
    pub fn is_empty(&self) -> bool {
        self.stock.is_empty() && self.inserts.is_empty() && self.cancellations.is_empty()
    }
}

pub trait LedgerStore: Send + Sync {
    fn stock(&self, key: StockKey) -> DomainResult<Option<StockRecord>>;

    fn list_stock(
        &self,
        location: Option<LocationId>,
        query: &QueryComposer<StockColumn>,
    ) -> DomainResult<Page<StockRecord>>;

    fn movement(&self, id: MovementId) -> DomainResult<Option<MovementDocument>>;

    fn list_movements(
        &self,
        query: &QueryComposer<MovementColumn>,
    ) -> DomainResult<Page<MovementHeader>>;

    /// Next value of the per-type document sequence. Atomic; never repeats.
    fn next_sequence(&self, document_type: DocumentType) -> DomainResult<u64>;

    fn commit(&self, unit: UnitOfWork) -> DomainResult<()>;
}

impl<S> LedgerStore for Arc<S>
where
    S: LedgerStore + ?Sized,
{
    fn stock(&self, key: StockKey) -> DomainResult<Option<StockRecord>> {
        (**self).stock(key)
    }

    fn list_stock(
        &self,
        location: Option<LocationId>,
        query: &QueryComposer<StockColumn>,
    ) -> DomainResult<Page<StockRecord>> {
        (**self).list_stock(location, query)
    }

    fn movement(&self, id: MovementId) -> DomainResult<Option<MovementDocument>> {
        (**self).movement(id)
    }

    fn list_movements(
        &self,
        query: &QueryComposer<MovementColumn>,
    ) -> DomainResult<Page<MovementHeader>> {
        (**self).list_movements(query)
    }

    fn next_sequence(&self, document_type: DocumentType) -> DomainResult<u64> {
        (**self).next_sequence(document_type)
    }

    fn commit(&self, unit: UnitOfWork) -> DomainResult<()> {
        (**self).commit(unit)
    }
}
