//! Cancellation of registered movement documents.
//!
//! Cancelling applies the inverse of the document's original deltas, whatever the
//! ledger looks like now, and flips the header to `Cancelled` in the same unit of
//! work. Balances pushed below zero are reported, never blocking.

use chrono::Utc;
use serde::Serialize;
use tracing::{info, instrument, warn};

use stockflow_core::{DomainError, DomainResult, MovementId, Stamp, UserId};
use stockflow_inventory::{
    MovementDocument, MovementHeader, NegativeStockPolicy, StockWarning, plan_reversal,
};

use crate::ledger::plan_deltas;
use crate::retry::ConflictRetry;
use crate::store::{LedgerStore, UnitOfWork};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CancellationOutcome {
    /// The cancelled header first, then its transfer pair if it has one.
    pub cancelled: Vec<MovementHeader>,
    pub warnings: Vec<StockWarning>,
}

#[derive(Debug, Clone)]
pub struct CancellationEngine<S> {
    store: S,
    retry: ConflictRetry,
}

impl<S: LedgerStore> CancellationEngine<S> {
    pub fn new(store: S, retry: ConflictRetry) -> Self {
        Self { store, retry }
    }

    fn load(&self, id: MovementId) -> DomainResult<MovementDocument> {
        self.store
            .movement(id)?
            .ok_or_else(|| DomainError::not_found(format!("movement {id}")))
    }

    /// Cancel `id`. A transfer half cancels its pair in the same unit.
    ///
    /// A second cancellation is `InvalidState` and writes nothing.
    #[instrument(skip(self), err)]
    pub fn cancel(&self, id: MovementId, actor: UserId) -> DomainResult<CancellationOutcome> {
        self.retry.run("cancel", |_| {
            let document = self.load(id)?;
            let mut documents = vec![document];
            if let Some(pair) = documents[0].header.paired_movement() {
                documents.push(self.load(pair)?);
            }

            let stamp = Stamp::new(actor, Utc::now());
            let reversal = plan_reversal(&documents, stamp)?;
            let planned = plan_deltas(
                &self.store,
                &reversal.deltas,
                NegativeStockPolicy::Allow,
                stamp,
            )?;

            let warnings = planned.warnings;
            self.store.commit(UnitOfWork {
                stock: planned.mutations,
                inserts: vec![],
                cancellations: reversal.cancelled.clone(),
            })?;

            for w in &warnings {
                warn!(
                    movement_id = %w.movement_id,
                    key = %w.key,
                    quantity = w.quantity,
                    "cancellation left stock below zero"
                );
            }

            let cancelled: Vec<MovementHeader> = reversal
                .cancelled
                .into_iter()
                .map(|h| MovementHeader {
                    version: h.version + 1,
                    ..h
                })
                .collect();
            info!(
                movement_id = %id,
                code = %cancelled[0].code,
                actor = %actor,
                headers = cancelled.len(),
                "movement cancelled"
            );

            Ok(CancellationOutcome {
                cancelled,
                warnings,
            })
        })
    }
}
