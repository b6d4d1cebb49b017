//! Movement documents: a header plus numbered lines that move stock.
//!
//! Issues debit one location, receipts credit one location, and a transfer is a
//! pair of headers (outbound at the origin, inbound at the destination) that point
//! at each other. Documents are never deleted; cancellation flips the header status
//! and is terminal.

use core::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stockflow_core::{
    Column, DomainError, DomainResult, LocationId, MovementId, PartyId, ProductId, Queryable,
    RecordState, SortKey, Stamp, Versioned,
};

use crate::money::{document_total, line_total};
use crate::stock::StockKey;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    Issue,
    Receipt,
    InboundTransfer,
    OutboundTransfer,
}

/// Which way a document moves stock at its own location.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Inbound,
    Outbound,
}

impl Direction {
    pub fn signed(self, quantity: i64) -> i64 {
        match self {
            Direction::Inbound => quantity,
            Direction::Outbound => -quantity,
        }
    }
}

impl DocumentType {
    pub const ALL: [DocumentType; 4] = [
        DocumentType::Issue,
        DocumentType::Receipt,
        DocumentType::InboundTransfer,
        DocumentType::OutboundTransfer,
    ];

    pub fn direction(self) -> Direction {
        match self {
            DocumentType::Issue | DocumentType::OutboundTransfer => Direction::Outbound,
            DocumentType::Receipt | DocumentType::InboundTransfer => Direction::Inbound,
        }
    }

    pub fn is_transfer(self) -> bool {
        matches!(
            self,
            DocumentType::InboundTransfer | DocumentType::OutboundTransfer
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DocumentType::Issue => "issue",
            DocumentType::Receipt => "receipt",
            DocumentType::InboundTransfer => "inbound_transfer",
            DocumentType::OutboundTransfer => "outbound_transfer",
        }
    }

    /// Dense index, for per-type counters.
    pub fn index(self) -> usize {
        match self {
            DocumentType::Issue => 0,
            DocumentType::Receipt => 1,
            DocumentType::InboundTransfer => 2,
            DocumentType::OutboundTransfer => 3,
        }
    }
}

impl core::fmt::Display for DocumentType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DocumentType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| DomainError::validation(format!("unknown document type: {s}")))
    }
}

/// The other side of a movement.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Counterparty {
    Consumer {
        party_id: PartyId,
    },
    Supplier {
        party_id: PartyId,
    },
    /// The other half of a transfer pair.
    Transfer {
        paired_movement: MovementId,
        peer_location: LocationId,
    },
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum DocumentStatus {
    Active,
    Cancelled { cancelled: Stamp },
}

/// Document header row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementHeader {
    pub id: MovementId,
    pub code: String,
    pub document_type: DocumentType,
    /// Location whose ledger this header mutates.
    pub location_id: LocationId,
    pub counterparty: Counterparty,
    pub total_amount: Decimal,
    pub annotations: Option<String>,
    pub status: DocumentStatus,
    pub created: Stamp,
    pub version: u64,
}

impl MovementHeader {
    pub fn is_active(&self) -> bool {
        self.status == DocumentStatus::Active
    }

    pub fn cancelled(&self) -> Option<&Stamp> {
        match &self.status {
            DocumentStatus::Cancelled { cancelled } => Some(cancelled),
            DocumentStatus::Active => None,
        }
    }

    pub fn paired_movement(&self) -> Option<MovementId> {
        match self.counterparty {
            Counterparty::Transfer {
                paired_movement, ..
            } => Some(paired_movement),
            _ => None,
        }
    }

    /// `Active -> Cancelled`. A second call is `InvalidState`.
    pub fn cancel(&mut self, stamp: Stamp) -> DomainResult<()> {
        if !self.is_active() {
            return Err(DomainError::invalid_state(format!(
                "movement {} is already cancelled",
                self.code
            )));
        }
        self.status = DocumentStatus::Cancelled { cancelled: stamp };
        Ok(())
    }
}

impl Versioned for MovementHeader {
    fn version(&self) -> u64 {
        self.version
    }
}

/// Document line row. `(movement_id, line_number)` is its identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementLine {
    pub movement_id: MovementId,
    pub line_number: u32,
    pub product_id: ProductId,
    pub quantity: i64,
    pub unit_price: Decimal,
    pub line_total: Decimal,
}

/// Header and lines, persisted together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementDocument {
    pub header: MovementHeader,
    pub lines: Vec<MovementLine>,
}

/// Signed quantity change for one ledger key.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct LedgerDelta {
    pub key: StockKey,
    /// Document whose lines produced this delta.
    pub movement_id: MovementId,
    pub delta: i64,
    /// Price to open the record at if this delta creates it.
    pub unit_price: Decimal,
}

/// Merge deltas that hit the same key, keeping first-seen order.
///
/// A merged quantity outside `i64` is a validation error; the ledger must move
/// by exactly the sum of the lines.
pub fn merge_deltas(
    deltas: impl IntoIterator<Item = LedgerDelta>,
) -> DomainResult<Vec<LedgerDelta>> {
    let mut merged: Vec<LedgerDelta> = Vec::new();
    for d in deltas {
        match merged.iter_mut().find(|m| m.key == d.key) {
            Some(m) => {
                m.delta = m.delta.checked_add(d.delta).ok_or_else(|| {
                    DomainError::validation(format!("quantity for {} out of range", d.key))
                })?;
            }
            None => merged.push(d),
        }
    }
    merged.retain(|d| d.delta != 0);
    Ok(merged)
}

impl MovementDocument {
    /// Number the lines, price them, and total the header.
    pub fn compose(new: NewMovement<'_>, currency_scale: u32) -> DomainResult<Self> {
        let lines = new
            .lines
            .iter()
            .enumerate()
            .map(|(idx, l)| {
                Ok(MovementLine {
                    movement_id: new.id,
                    line_number: idx as u32 + 1,
                    product_id: l.product_id,
                    quantity: l.quantity,
                    unit_price: l.unit_price,
                    line_total: line_total(l.quantity, l.unit_price)?,
                })
            })
            .collect::<DomainResult<Vec<MovementLine>>>()?;

        let total_amount = document_total(lines.iter().map(|l| l.line_total), currency_scale)?;

        Ok(Self {
            header: MovementHeader {
                id: new.id,
                code: new.code,
                document_type: new.document_type,
                location_id: new.location_id,
                counterparty: new.counterparty,
                total_amount,
                annotations: new.annotations,
                status: DocumentStatus::Active,
                created: new.created,
                version: 1,
            },
            lines,
        })
    }

    /// Ledger effect of registering this document, merged per key.
    pub fn ledger_deltas(&self) -> DomainResult<Vec<LedgerDelta>> {
        let direction = self.header.document_type.direction();
        merge_deltas(self.lines.iter().map(|l| LedgerDelta {
            key: StockKey::new(self.header.location_id, l.product_id),
            movement_id: self.header.id,
            delta: direction.signed(l.quantity),
            unit_price: l.unit_price,
        }))
    }

    pub fn totals_balance(&self, currency_scale: u32) -> bool {
        document_total(self.lines.iter().map(|l| l.line_total), currency_scale)
            .is_ok_and(|total| total == self.header.total_amount)
    }
}

/// Input to [`MovementDocument::compose`].
#[derive(Debug, Clone)]
pub struct NewMovement<'a> {
    pub id: MovementId,
    pub code: String,
    pub document_type: DocumentType,
    pub location_id: LocationId,
    pub counterparty: Counterparty,
    pub annotations: Option<String>,
    pub lines: &'a [LineDraft],
    pub created: Stamp,
}

/// Unnumbered line as supplied by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineDraft {
    pub product_id: ProductId,
    pub quantity: i64,
    pub unit_price: Decimal,
}

fn validate_quantities(quantities: impl IntoIterator<Item = (usize, i64)>) -> DomainResult<()> {
    let mut seen = false;
    for (idx, quantity) in quantities {
        seen = true;
        if quantity <= 0 {
            return Err(DomainError::validation(format!(
                "line {}: quantity must be positive",
                idx + 1
            )));
        }
    }
    if !seen {
        return Err(DomainError::validation("a movement needs at least one line"));
    }
    Ok(())
}

/// Issue or receipt to be registered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementDraft {
    pub document_type: DocumentType,
    pub location_id: LocationId,
    /// Consumer for issues, supplier for receipts.
    pub party_id: PartyId,
    pub annotations: Option<String>,
    pub lines: Vec<LineDraft>,
}

impl MovementDraft {
    pub fn issue(location_id: LocationId, consumer: PartyId, lines: Vec<LineDraft>) -> Self {
        Self {
            document_type: DocumentType::Issue,
            location_id,
            party_id: consumer,
            annotations: None,
            lines,
        }
    }

    pub fn receipt(location_id: LocationId, supplier: PartyId, lines: Vec<LineDraft>) -> Self {
        Self {
            document_type: DocumentType::Receipt,
            location_id,
            party_id: supplier,
            annotations: None,
            lines,
        }
    }

    pub fn with_annotations(mut self, annotations: impl Into<String>) -> Self {
        self.annotations = Some(annotations.into());
        self
    }

    pub fn counterparty(&self) -> Counterparty {
        match self.document_type {
            DocumentType::Receipt => Counterparty::Supplier {
                party_id: self.party_id,
            },
            _ => Counterparty::Consumer {
                party_id: self.party_id,
            },
        }
    }

    pub fn validate(&self) -> DomainResult<()> {
        if self.document_type.is_transfer() {
            return Err(DomainError::validation(
                "transfers must be registered as a transfer pair",
            ));
        }
        validate_quantities(self.lines.iter().map(|l| l.quantity).enumerate())?;
        if let Some(idx) = self
            .lines
            .iter()
            .position(|l| l.unit_price.is_sign_negative())
        {
            return Err(DomainError::validation(format!(
                "line {}: unit price cannot be negative",
                idx + 1
            )));
        }
        Ok(())
    }
}

/// Transfer line: priced at the origin's current unit price when registered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferLineDraft {
    pub product_id: ProductId,
    pub quantity: i64,
}

/// Stock transfer between two locations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferDraft {
    pub origin: LocationId,
    pub destination: LocationId,
    pub annotations: Option<String>,
    pub lines: Vec<TransferLineDraft>,
}

impl TransferDraft {
    pub fn new(origin: LocationId, destination: LocationId, lines: Vec<TransferLineDraft>) -> Self {
        Self {
            origin,
            destination,
            annotations: None,
            lines,
        }
    }

    pub fn validate(&self) -> DomainResult<()> {
        if self.origin == self.destination {
            return Err(DomainError::validation(
                "transfer origin and destination must differ",
            ));
        }
        validate_quantities(self.lines.iter().map(|l| l.quantity).enumerate())
    }

    /// Price every line with `price_of(product)`.
    pub fn priced(
        &self,
        mut price_of: impl FnMut(ProductId) -> DomainResult<Decimal>,
    ) -> DomainResult<Vec<LineDraft>> {
        self.lines
            .iter()
            .map(|l| {
                Ok(LineDraft {
                    product_id: l.product_id,
                    quantity: l.quantity,
                    unit_price: price_of(l.product_id)?,
                })
            })
            .collect()
    }
}

/// List columns of movement headers.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum MovementColumn {
    Id,
    Code,
    DocumentType,
    Annotations,
    CreatedAt,
    TotalAmount,
    Location,
}

impl Column for MovementColumn {
    fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(Self::Id),
            1 => Some(Self::Code),
            2 => Some(Self::DocumentType),
            3 => Some(Self::Annotations),
            4 => Some(Self::CreatedAt),
            5 => Some(Self::TotalAmount),
            6 => Some(Self::Location),
            _ => None,
        }
    }

    fn primary() -> Self {
        Self::Id
    }

    fn searchable(self) -> bool {
        matches!(
            self,
            Self::Code | Self::DocumentType | Self::Annotations | Self::Location
        )
    }

    fn sql_name(self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::Code => "code",
            Self::DocumentType => "document_type",
            Self::Annotations => "annotations",
            Self::CreatedAt => "created_at",
            Self::TotalAmount => "total_amount",
            Self::Location => "location_id",
        }
    }
}

/// Cancelled documents list as `Inactive`; they are never hidden.
impl Queryable for MovementHeader {
    type Column = MovementColumn;

    fn text(&self, column: MovementColumn) -> Option<String> {
        match column {
            MovementColumn::Code => Some(self.code.clone()),
            MovementColumn::DocumentType => Some(self.document_type.as_str().to_string()),
            MovementColumn::Annotations => self.annotations.clone(),
            MovementColumn::Location => Some(self.location_id.to_string()),
            _ => None,
        }
    }

    fn sort_key(&self, column: MovementColumn) -> SortKey {
        match column {
            MovementColumn::Id => SortKey::Id(*self.id.as_uuid()),
            MovementColumn::Code => SortKey::Text(self.code.clone()),
            MovementColumn::DocumentType => SortKey::Text(self.document_type.as_str().to_string()),
            MovementColumn::Annotations => {
                SortKey::Text(self.annotations.clone().unwrap_or_default())
            }
            MovementColumn::CreatedAt => SortKey::Time(self.created.at),
            MovementColumn::TotalAmount => SortKey::Decimal(self.total_amount),
            MovementColumn::Location => SortKey::Id(*self.location_id.as_uuid()),
        }
    }

    fn record_state(&self) -> RecordState {
        match self.status {
            DocumentStatus::Active => RecordState::Active,
            DocumentStatus::Cancelled { .. } => RecordState::Inactive,
        }
    }

    fn reference_time(&self) -> DateTime<Utc> {
        self.created.at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;
    use stockflow_core::UserId;

    fn stamp() -> Stamp {
        Stamp::new(UserId::new(), Utc::now())
    }

    fn try_compose(
        document_type: DocumentType,
        lines: &[LineDraft],
    ) -> DomainResult<MovementDocument> {
        MovementDocument::compose(
            NewMovement {
                id: MovementId::new(),
                code: "ISS-000001".to_string(),
                document_type,
                location_id: LocationId::new(),
                counterparty: Counterparty::Consumer {
                    party_id: PartyId::new(),
                },
                annotations: None,
                lines,
                created: stamp(),
            },
            2,
        )
    }

    fn compose(document_type: DocumentType, lines: &[LineDraft]) -> MovementDocument {
        try_compose(document_type, lines).unwrap()
    }

    fn line(product_id: ProductId, quantity: i64, unit_price: Decimal) -> LineDraft {
        LineDraft {
            product_id,
            quantity,
            unit_price,
        }
    }

    #[test]
    fn lines_are_numbered_in_input_order() {
        let (a, b) = (ProductId::new(), ProductId::new());
        let doc = compose(
            DocumentType::Issue,
            &[line(b, 1, dec!(1)), line(a, 2, dec!(1)), line(b, 3, dec!(1))],
        );
        let numbers: Vec<_> = doc.lines.iter().map(|l| (l.line_number, l.product_id)).collect();
        assert_eq!(numbers, vec![(1, b), (2, a), (3, b)]);
        assert!(doc.lines.iter().all(|l| l.movement_id == doc.header.id));
    }

    #[test]
    fn issue_deltas_are_negative_and_merged_per_product() {
        let (a, b) = (ProductId::new(), ProductId::new());
        let doc = compose(
            DocumentType::Issue,
            &[line(a, 1, dec!(1)), line(b, 2, dec!(1)), line(a, 3, dec!(1))],
        );
        let deltas: Vec<_> = doc
            .ledger_deltas()
            .unwrap()
            .iter()
            .map(|d| (d.key.product_id, d.delta))
            .collect();
        assert_eq!(deltas, vec![(a, -4), (b, -2)]);
    }

    #[test]
    fn line_total_beyond_decimal_range_fails_to_compose() {
        let lines = [line(ProductId::new(), i64::MAX, dec!(100000000000))];
        let err = try_compose(DocumentType::Receipt, &lines).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn merged_quantity_beyond_i64_is_rejected_not_clamped() {
        let p = ProductId::new();
        let half = i64::MAX / 2 + 10;
        let doc = compose(DocumentType::Receipt, &[line(p, half, dec!(0)), line(p, half, dec!(0))]);
        let err = doc.ledger_deltas().unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn deltas_name_their_document() {
        let doc = compose(DocumentType::Issue, &[line(ProductId::new(), 1, dec!(1))]);
        let deltas = doc.ledger_deltas().unwrap();
        assert!(deltas.iter().all(|d| d.movement_id == doc.header.id));
    }

    #[test]
    fn header_total_is_rounded_sum_of_exact_lines() {
        let p = ProductId::new();
        let doc = compose(
            DocumentType::Receipt,
            &[line(p, 3, dec!(0.3333)), line(p, 1, dec!(0.0051))],
        );
        assert_eq!(doc.lines[0].line_total, dec!(0.9999));
        assert_eq!(doc.header.total_amount, dec!(1.01));
    }

    #[test]
    fn cancel_is_terminal() {
        let mut doc = compose(DocumentType::Issue, &[line(ProductId::new(), 1, dec!(1))]);
        doc.header.cancel(stamp()).unwrap();
        assert!(doc.header.cancelled().is_some());
        let err = doc.header.cancel(stamp()).unwrap_err();
        assert!(matches!(err, DomainError::InvalidState(_)));
    }

    #[test]
    fn draft_validation() {
        let loc = LocationId::new();
        let party = PartyId::new();
        assert!(MovementDraft::issue(loc, party, vec![]).validate().is_err());
        assert!(
            MovementDraft::issue(loc, party, vec![line(ProductId::new(), 0, dec!(1))])
                .validate()
                .is_err()
        );
        assert!(
            MovementDraft::receipt(loc, party, vec![line(ProductId::new(), 1, dec!(-1))])
                .validate()
                .is_err()
        );
        let mut transfer_typed =
            MovementDraft::issue(loc, party, vec![line(ProductId::new(), 1, dec!(1))]);
        transfer_typed.document_type = DocumentType::InboundTransfer;
        assert!(transfer_typed.validate().is_err());

        let same_place = TransferDraft::new(
            loc,
            loc,
            vec![TransferLineDraft {
                product_id: ProductId::new(),
                quantity: 1,
            }],
        );
        assert!(same_place.validate().is_err());
    }

    #[test]
    fn document_type_parses_its_own_name() {
        for t in DocumentType::ALL {
            assert_eq!(t.as_str().parse::<DocumentType>().unwrap(), t);
        }
        assert!("refund".parse::<DocumentType>().is_err());
    }

    proptest! {
        #[test]
        fn totals_always_balance(
            lines in proptest::collection::vec((1i64..10_000, 0i64..1_000_000, 0u32..5), 1..20)
        ) {
            let drafts: Vec<LineDraft> = lines
                .into_iter()
                .map(|(q, mantissa, scale)| {
                    line(ProductId::new(), q, Decimal::new(mantissa, scale))
                })
                .collect();
            let doc = compose(DocumentType::Receipt, &drafts);
            prop_assert!(doc.totals_balance(2));
            prop_assert!(doc.header.total_amount.scale() <= 2);
            let expected: Decimal = drafts
                .iter()
                .map(|l| Decimal::from(l.quantity) * l.unit_price)
                .sum();
            prop_assert_eq!(doc.header.total_amount, crate::money::round_money(expected, 2));
        }
    }
}
