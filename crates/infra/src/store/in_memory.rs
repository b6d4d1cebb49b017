use std::collections::{HashMap, HashSet};
use std::sync::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};

use stockflow_core::{
    DomainError, DomainResult, ExpectedVersion, LocationId, MovementId, Page, QueryComposer,
};
use stockflow_inventory::{
    DocumentType, MovementColumn, MovementDocument, MovementHeader, StockColumn, StockKey,
    StockRecord,
};

use super::{LedgerStore, UnitOfWork};

#[derive(Debug, Default)]
struct State {
    stock: HashMap<StockKey, StockRecord>,
    movements: HashMap<MovementId, MovementDocument>,
    codes: HashSet<(DocumentType, String)>,
}

/// In-memory ledger store.
///
/// Intended for tests/dev. Reads take a shared lock; a commit validates and
/// applies its whole unit under one exclusive lock, which is held only for the
/// apply step, never across a caller's read-modify-write.
#[derive(Debug, Default)]
pub struct InMemoryLedgerStore {
    state: RwLock<State>,
    sequences: [AtomicU64; 4],
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn poisoned() -> DomainError {
        DomainError::persistence("ledger state lock poisoned")
    }
}

impl LedgerStore for InMemoryLedgerStore {
    fn stock(&self, key: StockKey) -> DomainResult<Option<StockRecord>> {
        let state = self.state.read().map_err(|_| Self::poisoned())?;
        Ok(state.stock.get(&key).cloned())
    }

    fn list_stock(
        &self,
        location: Option<LocationId>,
        query: &QueryComposer<StockColumn>,
    ) -> DomainResult<Page<StockRecord>> {
        let state = self.state.read().map_err(|_| Self::poisoned())?;
        let rows = state
            .stock
            .values()
            .filter(|r| location.is_none_or(|l| r.location_id == l))
            .cloned();
        Ok(query.apply(rows))
    }

    fn movement(&self, id: MovementId) -> DomainResult<Option<MovementDocument>> {
        let state = self.state.read().map_err(|_| Self::poisoned())?;
        Ok(state.movements.get(&id).cloned())
    }

    fn list_movements(
        &self,
        query: &QueryComposer<MovementColumn>,
    ) -> DomainResult<Page<MovementHeader>> {
        let state = self.state.read().map_err(|_| Self::poisoned())?;
        Ok(query.apply(state.movements.values().map(|d| d.header.clone())))
    }

    fn next_sequence(&self, document_type: DocumentType) -> DomainResult<u64> {
        Ok(self.sequences[document_type.index()].fetch_add(1, Ordering::SeqCst) + 1)
    }

    fn commit(&self, unit: UnitOfWork) -> DomainResult<()> {
        if unit.is_empty() {
            return Ok(());
        }

        let mut state = self.state.write().map_err(|_| Self::poisoned())?;

        // Stage everything first; nothing touches `state` until all checks pass.
        let mut staged_stock: HashMap<StockKey, StockRecord> = HashMap::new();
        for mutation in &unit.stock {
            let key = mutation.key();
            let current = staged_stock
                .get(&key)
                .or_else(|| state.stock.get(&key));
            let next = mutation.applied_to(current)?;
            staged_stock.insert(key, next);
        }

        let mut staged_codes = HashSet::new();
        for doc in &unit.inserts {
            let header = &doc.header;
            if state.movements.contains_key(&header.id) {
                return Err(DomainError::conflict(format!(
                    "movement {} already exists",
                    header.id
                )));
            }
            let code = (header.document_type, header.code.clone());
            if state.codes.contains(&code) || !staged_codes.insert(code) {
                return Err(DomainError::conflict(format!(
                    "duplicate {} code {}",
                    header.document_type, header.code
                )));
            }
        }

        let mut staged_headers = Vec::with_capacity(unit.cancellations.len());
        for cancelled in &unit.cancellations {
            let current = state
                .movements
                .get(&cancelled.id)
                .ok_or_else(|| DomainError::not_found(format!("movement {}", cancelled.id)))?;
            ExpectedVersion::Exact(cancelled.version).check(Some(current.header.version))?;
            staged_headers.push(MovementHeader {
                version: current.header.version + 1,
                ..cancelled.clone()
            });
        }

        state.stock.extend(staged_stock);
        for doc in unit.inserts {
            state
                .codes
                .insert((doc.header.document_type, doc.header.code.clone()));
            state.movements.insert(doc.header.id, doc);
        }
        for header in staged_headers {
            if let Some(doc) = state.movements.get_mut(&header.id) {
                doc.header = header;
            }
        }

        Ok(())
    }
}
