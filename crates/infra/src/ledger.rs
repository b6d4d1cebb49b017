//! Stock ledger service.

use chrono::Utc;
use rust_decimal::Decimal;
use tracing::{debug, instrument};

use stockflow_core::{
    DomainError, DomainResult, ListQuery, LocationId, Page, ProductId, QueryComposer, Stamp,
    UserId,
};
use stockflow_inventory::{
    LedgerDelta, NegativeStockPolicy, StockKey, StockMutation, StockRecord, StockWarning,
    plan_adjustment, plan_price,
};

use crate::config::LedgerSettings;
use crate::retry::ConflictRetry;
use crate::store::{LedgerStore, UnitOfWork};

/// Reads and direct adjustments of [`StockRecord`]s.
#[derive(Debug, Clone)]
pub struct StockLedger<S> {
    store: S,
    settings: LedgerSettings,
}

impl<S: LedgerStore> StockLedger<S> {
    pub fn new(store: S, settings: LedgerSettings) -> Self {
        Self { store, settings }
    }

    fn retry(&self) -> ConflictRetry {
        ConflictRetry::new(self.settings.max_conflict_retries)
    }

    pub fn get_stock(
        &self,
        location_id: LocationId,
        product_id: ProductId,
    ) -> DomainResult<StockRecord> {
        let key = StockKey::new(location_id, product_id);
        self.store
            .stock(key)?
            .ok_or_else(|| DomainError::not_found(format!("stock record for {key}")))
    }

    /// `quantity += delta`. A missing record is opened at price zero by a
    /// positive delta; a negative delta on it is `NotFound`.
    #[instrument(skip(self), err)]
    pub fn adjust_quantity(
        &self,
        location_id: LocationId,
        product_id: ProductId,
        delta: i64,
        actor: UserId,
    ) -> DomainResult<StockRecord> {
        let key = StockKey::new(location_id, product_id);
        self.retry().run("adjust_quantity", |_| {
            let current = self.store.stock(key)?;
            let plan = plan_adjustment(
                key,
                current.as_ref(),
                delta,
                Decimal::ZERO,
                self.settings.negative_stock,
                Stamp::new(actor, Utc::now()),
            )?;
            let next = plan.mutation.applied_to(current.as_ref())?;
            self.store.commit(UnitOfWork {
                stock: vec![plan.mutation],
                ..Default::default()
            })?;
            debug!(
                %key,
                from = plan.previous_quantity,
                to = plan.resulting_quantity,
                "stock adjusted"
            );
            Ok(next)
        })
    }

    /// Replace the unit price; quantity is untouched.
    #[instrument(skip(self), err)]
    pub fn set_price(
        &self,
        location_id: LocationId,
        product_id: ProductId,
        unit_price: Decimal,
        actor: UserId,
    ) -> DomainResult<StockRecord> {
        let key = StockKey::new(location_id, product_id);
        self.retry().run("set_price", |_| {
            let current = self.store.stock(key)?;
            let stamp = Stamp::new(actor, Utc::now());
            let mutation = plan_price(key, current.as_ref(), unit_price, stamp)?;
            let next = mutation.applied_to(current.as_ref())?;
            self.store.commit(UnitOfWork {
                stock: vec![mutation],
                ..Default::default()
            })?;
            Ok(next)
        })
    }

    /// Ledger rows, optionally restricted to one location.
    pub fn list_stock(
        &self,
        location_id: Option<LocationId>,
        query: &ListQuery,
    ) -> DomainResult<Page<StockRecord>> {
        let composer = QueryComposer::new(query, self.settings.paging);
        self.store.list_stock(location_id, &composer)
    }
}

/// Outcome of planning a batch of deltas against the current ledger.
#[derive(Debug, Default)]
pub(crate) struct PlannedDeltas {
    pub mutations: Vec<StockMutation>,
    /// Keys whose resulting quantity is below zero, attributed to the document
    /// that moved them.
    pub warnings: Vec<StockWarning>,
}

/// Read every touched row and plan its mutation. The reads are the versions
/// the commit will be checked against.
pub(crate) fn plan_deltas<S: LedgerStore>(
    store: &S,
    deltas: &[LedgerDelta],
    policy: NegativeStockPolicy,
    stamp: Stamp,
) -> DomainResult<PlannedDeltas> {
    let mut planned = PlannedDeltas::default();
    for delta in deltas {
        let current = store.stock(delta.key)?;
        let plan = plan_adjustment(
            delta.key,
            current.as_ref(),
            delta.delta,
            delta.unit_price,
            policy,
            stamp,
        )?;
        if plan.resulting_quantity < 0 {
            planned.warnings.push(StockWarning {
                key: delta.key,
                movement_id: delta.movement_id,
                quantity: plan.resulting_quantity,
            });
        }
        planned.mutations.push(plan.mutation);
    }
    Ok(planned)
}
