//! Registration and lookup of movement documents.
//!
//! Every registration is one read-plan-commit cycle: read the touched ledger rows,
//! take a fresh code, compose the document, then commit header, lines and ledger
//! writes as a single [`UnitOfWork`]. A lost version race re-runs the whole cycle.

use std::collections::BTreeSet;

use chrono::Utc;
use serde::Serialize;
use tracing::{info, instrument};

use stockflow_core::{
    DomainError, DomainResult, ListQuery, LocationId, MovementId, Page, ProductId, QueryComposer,
    Stamp, UserId,
};
use stockflow_inventory::{
    Counterparty, DocumentType, MovementDocument, MovementDraft, MovementHeader, NewMovement,
    StockKey, TransferDraft,
};

use crate::cancellation::{CancellationEngine, CancellationOutcome};
use crate::codes::CodeGenerator;
use crate::config::LedgerSettings;
use crate::ledger::plan_deltas;
use crate::reference::Catalog;
use crate::retry::ConflictRetry;
use crate::store::{LedgerStore, UnitOfWork};

/// Both halves of a registered transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransferPair {
    pub outbound: MovementDocument,
    pub inbound: MovementDocument,
}

#[derive(Debug, Clone)]
pub struct MovementService<S, C> {
    store: S,
    catalog: C,
    codes: CodeGenerator<S>,
    cancellation: CancellationEngine<S>,
    settings: LedgerSettings,
}

impl<S, C> MovementService<S, C>
where
    S: LedgerStore + Clone,
    C: Catalog,
{
    pub fn new(store: S, catalog: C, settings: LedgerSettings) -> Self {
        let retry = ConflictRetry::new(settings.max_conflict_retries);
        Self {
            codes: CodeGenerator::new(store.clone(), settings.codes.clone()),
            cancellation: CancellationEngine::new(store.clone(), retry),
            store,
            catalog,
            settings,
        }
    }

    fn retry(&self) -> ConflictRetry {
        ConflictRetry::new(self.settings.max_conflict_retries)
    }

    fn ensure_location(&self, id: LocationId) -> DomainResult<()> {
        if !self.catalog.location_exists(id)? {
            return Err(DomainError::not_found(format!("location {id}")));
        }
        Ok(())
    }

    fn ensure_products(&self, ids: impl IntoIterator<Item = ProductId>) -> DomainResult<()> {
        let unique: BTreeSet<ProductId> = ids.into_iter().collect();
        for id in unique {
            if !self.catalog.product_exists(id)? {
                return Err(DomainError::not_found(format!("product {id}")));
            }
        }
        Ok(())
    }

    /// Register an issue or a receipt.
    #[instrument(
        skip(self, draft),
        fields(
            document_type = %draft.document_type,
            location_id = %draft.location_id,
            lines = draft.lines.len()
        ),
        err
    )]
    pub fn register(
        &self,
        draft: &MovementDraft,
        actor: UserId,
    ) -> DomainResult<MovementDocument> {
        draft.validate()?;
        self.ensure_location(draft.location_id)?;
        self.ensure_products(draft.lines.iter().map(|l| l.product_id))?;

        let document = self.retry().run("register", |_| {
            let created = Stamp::new(actor, Utc::now());
            let document = MovementDocument::compose(
                NewMovement {
                    id: MovementId::new(),
                    code: self.codes.generate(draft.document_type)?,
                    document_type: draft.document_type,
                    location_id: draft.location_id,
                    counterparty: draft.counterparty(),
                    annotations: draft.annotations.clone(),
                    lines: &draft.lines,
                    created,
                },
                self.settings.currency_scale,
            )?;

            let planned = plan_deltas(
                &self.store,
                &document.ledger_deltas()?,
                self.settings.negative_stock,
                created,
            )?;
            self.store.commit(UnitOfWork {
                stock: planned.mutations,
                inserts: vec![document.clone()],
                cancellations: vec![],
            })?;
            Ok(document)
        })?;

        info!(
            movement_id = %document.header.id,
            code = %document.header.code,
            actor = %actor,
            total = %document.header.total_amount,
            "movement registered"
        );
        Ok(document)
    }

    /// Register a transfer as an outbound header at the origin and an inbound
    /// header at the destination, committed together.
    ///
    /// Lines are priced at the origin's current unit price, so both halves carry
    /// the same lines and total.
    #[instrument(
        skip(self, draft),
        fields(
            origin = %draft.origin,
            destination = %draft.destination,
            lines = draft.lines.len()
        ),
        err
    )]
    pub fn register_transfer(
        &self,
        draft: &TransferDraft,
        actor: UserId,
    ) -> DomainResult<TransferPair> {
        draft.validate()?;
        self.ensure_location(draft.origin)?;
        self.ensure_location(draft.destination)?;
        self.ensure_products(draft.lines.iter().map(|l| l.product_id))?;

        let pair = self.retry().run("register_transfer", |_| {
            let lines = draft.priced(|product_id| {
                let key = StockKey::new(draft.origin, product_id);
                self.store
                    .stock(key)?
                    .map(|r| r.unit_price)
                    .ok_or_else(|| DomainError::not_found(format!("no stock record for {key}")))
            })?;

            let created = Stamp::new(actor, Utc::now());
            let (outbound_id, inbound_id) = (MovementId::new(), MovementId::new());

            let outbound = MovementDocument::compose(
                NewMovement {
                    id: outbound_id,
                    code: self.codes.generate(DocumentType::OutboundTransfer)?,
                    document_type: DocumentType::OutboundTransfer,
                    location_id: draft.origin,
                    counterparty: Counterparty::Transfer {
                        paired_movement: inbound_id,
                        peer_location: draft.destination,
                    },
                    annotations: draft.annotations.clone(),
                    lines: &lines,
                    created,
                },
                self.settings.currency_scale,
            )?;
            let inbound = MovementDocument::compose(
                NewMovement {
                    id: inbound_id,
                    code: self.codes.generate(DocumentType::InboundTransfer)?,
                    document_type: DocumentType::InboundTransfer,
                    location_id: draft.destination,
                    counterparty: Counterparty::Transfer {
                        paired_movement: outbound_id,
                        peer_location: draft.origin,
                    },
                    annotations: draft.annotations.clone(),
                    lines: &lines,
                    created,
                },
                self.settings.currency_scale,
            )?;

            let mut deltas = outbound.ledger_deltas()?;
            deltas.extend(inbound.ledger_deltas()?);
            let planned = plan_deltas(&self.store, &deltas, self.settings.negative_stock, created)?;

            self.store.commit(UnitOfWork {
                stock: planned.mutations,
                inserts: vec![outbound.clone(), inbound.clone()],
                cancellations: vec![],
            })?;
            Ok(TransferPair { outbound, inbound })
        })?;

        info!(
            outbound = %pair.outbound.header.code,
            inbound = %pair.inbound.header.code,
            actor = %actor,
            "transfer registered"
        );
        Ok(pair)
    }

    /// Cancel a document; see [`CancellationEngine::cancel`].
    pub fn cancel(&self, id: MovementId, actor: UserId) -> DomainResult<CancellationOutcome> {
        self.cancellation.cancel(id, actor)
    }

    pub fn get(&self, id: MovementId) -> DomainResult<MovementDocument> {
        self.store
            .movement(id)?
            .ok_or_else(|| DomainError::not_found(format!("movement {id}")))
    }

    /// Headers only; cancelled documents list as inactive.
    pub fn list(&self, query: &ListQuery) -> DomainResult<Page<MovementHeader>> {
        let composer = QueryComposer::new(query, self.settings.paging);
        self.store.list_movements(&composer)
    }
}
