//! Reversal of a registered document's ledger effect.
//!
//! Reversal applies the arithmetic inverse of each original delta. It does not
//! re-derive anything from the current balance, so a reversal may leave a balance
//! negative when other documents consumed the same stock in between; such balances
//! are reported as [`StockWarning`]s rather than blocking the cancellation.

use serde::{Deserialize, Serialize};

use stockflow_core::{DomainError, DomainResult, MovementId, Stamp};

use crate::document::{LedgerDelta, MovementDocument, MovementHeader, merge_deltas};
use crate::stock::StockKey;

/// Everything a cancellation writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReversalPlan {
    /// Headers in their cancelled state; `version` is still the version read.
    pub cancelled: Vec<MovementHeader>,
    pub deltas: Vec<LedgerDelta>,
}

/// A balance left below zero by a reversal.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockWarning {
    pub key: StockKey,
    pub movement_id: MovementId,
    pub quantity: i64,
}

/// Plan the cancellation of `documents` (one document, or both halves of a
/// transfer). Fails with `InvalidState` if any of them is already cancelled.
pub fn plan_reversal(documents: &[MovementDocument], stamp: Stamp) -> DomainResult<ReversalPlan> {
    let mut cancelled = Vec::with_capacity(documents.len());
    let mut deltas = Vec::new();

    for doc in documents {
        let mut header = doc.header.clone();
        header.cancel(stamp)?;
        cancelled.push(header);

        for d in doc.ledger_deltas()? {
            let delta = d.delta.checked_neg().ok_or_else(|| {
                DomainError::validation(format!("quantity for {} out of range", d.key))
            })?;
            deltas.push(LedgerDelta { delta, ..d });
        }
    }

    Ok(ReversalPlan {
        cancelled,
        deltas: merge_deltas(deltas)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use stockflow_core::{LocationId, PartyId, ProductId, UserId};

    use crate::document::{Counterparty, DocumentType, LineDraft, NewMovement};

    fn doc(document_type: DocumentType, product_id: ProductId, quantity: i64) -> MovementDocument {
        MovementDocument::compose(
            NewMovement {
                id: MovementId::new(),
                code: "RCV-000001".into(),
                document_type,
                location_id: LocationId::new(),
                counterparty: Counterparty::Supplier {
                    party_id: PartyId::new(),
                },
                annotations: None,
                lines: &[LineDraft {
                    product_id,
                    quantity,
                    unit_price: dec!(1),
                }],
                created: Stamp::new(UserId::new(), Utc::now()),
            },
            2,
        )
        .unwrap()
    }

    #[test]
    fn reversal_inverts_every_delta() {
        let p = ProductId::new();
        let receipt = doc(DocumentType::Receipt, p, 7);
        let plan = plan_reversal(
            std::slice::from_ref(&receipt),
            Stamp::new(UserId::new(), Utc::now()),
        )
        .unwrap();
        assert_eq!(plan.deltas.len(), 1);
        assert_eq!(plan.deltas[0].delta, -7);
        assert_eq!(plan.deltas[0].movement_id, receipt.header.id);
        assert_eq!(plan.cancelled[0].version, receipt.header.version);
        assert!(!plan.cancelled[0].is_active());
    }

    #[test]
    fn already_cancelled_document_cannot_be_reversed() {
        let mut issue = doc(DocumentType::Issue, ProductId::new(), 2);
        let stamp = Stamp::new(UserId::new(), Utc::now());
        issue.header.cancel(stamp).unwrap();
        let err = plan_reversal(&[issue], stamp).unwrap_err();
        assert!(matches!(err, DomainError::InvalidState(_)));
    }
}
