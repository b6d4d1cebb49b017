//! Stock ledger rows and the rules for mutating them.
//!
//! A [`StockRecord`] is the quantity-and-price balance of one product at one
//! location. Quantity and price change through disjoint [`StockMutation`]s so a
//! price update can never clobber a concurrent quantity update (or vice versa);
//! both carry the version they were derived from.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stockflow_core::{
    Column, DomainError, DomainResult, ExpectedVersion, LocationId, ProductId, Queryable,
    RecordState, SortKey, Stamp, Versioned,
};

/// Composite key of the ledger.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StockKey {
    pub location_id: LocationId,
    pub product_id: ProductId,
}

impl StockKey {
    pub fn new(location_id: LocationId, product_id: ProductId) -> Self {
        Self {
            location_id,
            product_id,
        }
    }
}

impl core::fmt::Display for StockKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "location {} / product {}", self.location_id, self.product_id)
    }
}

/// Ledger row for one (location, product) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockRecord {
    pub location_id: LocationId,
    pub product_id: ProductId,
    pub quantity: i64,
    pub unit_price: Decimal,
    pub last_updated: Stamp,
    pub version: u64,
}

impl StockRecord {
    pub fn key(&self) -> StockKey {
        StockKey::new(self.location_id, self.product_id)
    }
}

impl Versioned for StockRecord {
    fn version(&self) -> u64 {
        self.version
    }
}

/// What to do when a debit would take quantity below zero.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NegativeStockPolicy {
    /// Fail the operation with `InvalidArgument`.
    #[default]
    Reject,
    /// Let the balance go negative.
    Allow,
}

/// A single write against the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StockMutation {
    /// First write for a key; the store assigns version 1.
    Create { record: StockRecord },
    /// Replace quantity only.
    Quantity {
        key: StockKey,
        expected_version: u64,
        quantity: i64,
        stamp: Stamp,
    },
    /// Replace unit price only.
    Price {
        key: StockKey,
        expected_version: u64,
        unit_price: Decimal,
        stamp: Stamp,
    },
}

impl StockMutation {
    pub fn key(&self) -> StockKey {
        match self {
            StockMutation::Create { record } => record.key(),
            StockMutation::Quantity { key, .. } | StockMutation::Price { key, .. } => *key,
        }
    }

    pub fn expected(&self) -> ExpectedVersion {
        match self {
            StockMutation::Create { .. } => ExpectedVersion::Absent,
            StockMutation::Quantity {
                expected_version, ..
            }
            | StockMutation::Price {
                expected_version, ..
            } => ExpectedVersion::Exact(*expected_version),
        }
    }

    /// The row as it will look once the store has applied this write on top of
    /// `current`.
    pub fn applied_to(&self, current: Option<&StockRecord>) -> DomainResult<StockRecord> {
        self.expected().check(current.map(|r| r.version))?;
        match (self, current) {
            (StockMutation::Create { record }, _) => Ok(StockRecord {
                version: 1,
                ..record.clone()
            }),
            (
                StockMutation::Quantity {
                    quantity, stamp, ..
                },
                Some(row),
            ) => Ok(StockRecord {
                quantity: *quantity,
                last_updated: *stamp,
                version: row.version + 1,
                ..row.clone()
            }),
            (
                StockMutation::Price {
                    unit_price, stamp, ..
                },
                Some(row),
            ) => Ok(StockRecord {
                unit_price: *unit_price,
                last_updated: *stamp,
                version: row.version + 1,
                ..row.clone()
            }),
            (_, None) => Err(DomainError::not_found(format!(
                "stock record for {}",
                self.key()
            ))),
        }
    }
}

/// Planned quantity change for one key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdjustmentPlan {
    pub mutation: StockMutation,
    pub previous_quantity: i64,
    pub resulting_quantity: i64,
}

/// Plan `quantity += delta` against the row read as `current`.
///
/// A missing row can only be opened by a credit, at `opening_price`.
pub fn plan_adjustment(
    key: StockKey,
    current: Option<&StockRecord>,
    delta: i64,
    opening_price: Decimal,
    policy: NegativeStockPolicy,
    stamp: Stamp,
) -> DomainResult<AdjustmentPlan> {
    if delta == 0 {
        return Err(DomainError::validation("stock delta cannot be zero"));
    }

    let Some(row) = current else {
        if delta < 0 {
            return Err(DomainError::not_found(format!(
                "no stock record for {key} to debit"
            )));
        }
        return Ok(AdjustmentPlan {
            mutation: StockMutation::Create {
                record: StockRecord {
                    location_id: key.location_id,
                    product_id: key.product_id,
                    quantity: delta,
                    unit_price: opening_price,
                    last_updated: stamp,
                    version: 0,
                },
            },
            previous_quantity: 0,
            resulting_quantity: delta,
        });
    };

    let resulting = row
        .quantity
        .checked_add(delta)
        .ok_or_else(|| DomainError::invalid_argument(format!("stock overflow for {key}")))?;

    if resulting < 0 && policy == NegativeStockPolicy::Reject {
        return Err(DomainError::invalid_argument(format!(
            "insufficient stock for {key}: have {}, need {}",
            row.quantity, -delta
        )));
    }

    Ok(AdjustmentPlan {
        mutation: StockMutation::Quantity {
            key,
            expected_version: row.version,
            quantity: resulting,
            stamp,
        },
        previous_quantity: row.quantity,
        resulting_quantity: resulting,
    })
}

/// Plan a price-only update.
pub fn plan_price(
    key: StockKey,
    current: Option<&StockRecord>,
    unit_price: Decimal,
    stamp: Stamp,
) -> DomainResult<StockMutation> {
    if unit_price.is_sign_negative() {
        return Err(DomainError::validation("unit price cannot be negative"));
    }
    let row = current
        .ok_or_else(|| DomainError::not_found(format!("no stock record for {key}")))?;
    Ok(StockMutation::Price {
        key,
        expected_version: row.version,
        unit_price,
        stamp,
    })
}

/// List columns of the ledger.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum StockColumn {
    Key,
    Location,
    Product,
    Quantity,
    UnitPrice,
    UpdatedAt,
}

impl Column for StockColumn {
    fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(Self::Key),
            1 => Some(Self::Location),
            2 => Some(Self::Product),
            3 => Some(Self::Quantity),
            4 => Some(Self::UnitPrice),
            5 => Some(Self::UpdatedAt),
            _ => None,
        }
    }

    fn primary() -> Self {
        Self::Key
    }

    fn searchable(self) -> bool {
        matches!(self, Self::Location | Self::Product)
    }

    fn sql_name(self) -> &'static str {
        match self {
            Self::Key => "location_id, product_id",
            Self::Location => "location_id",
            Self::Product => "product_id",
            Self::Quantity => "quantity",
            Self::UnitPrice => "unit_price",
            Self::UpdatedAt => "updated_at",
        }
    }
}

impl Queryable for StockRecord {
    type Column = StockColumn;

    fn text(&self, column: StockColumn) -> Option<String> {
        match column {
            StockColumn::Location => Some(self.location_id.to_string()),
            StockColumn::Product => Some(self.product_id.to_string()),
            _ => None,
        }
    }

    fn sort_key(&self, column: StockColumn) -> SortKey {
        match column {
            StockColumn::Key => SortKey::Text(format!("{}:{}", self.location_id, self.product_id)),
            StockColumn::Location => SortKey::Id(*self.location_id.as_uuid()),
            StockColumn::Product => SortKey::Id(*self.product_id.as_uuid()),
            StockColumn::Quantity => SortKey::Int(self.quantity),
            StockColumn::UnitPrice => SortKey::Decimal(self.unit_price),
            StockColumn::UpdatedAt => SortKey::Time(self.last_updated.at),
        }
    }

    fn record_state(&self) -> RecordState {
        RecordState::Active
    }

    fn reference_time(&self) -> DateTime<Utc> {
        self.last_updated.at
    }
}
