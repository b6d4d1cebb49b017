//! Inventory domain module: stock ledger rows, movement documents, document codes
//! and reversal planning.
//!
//! This crate contains business rules only, implemented as deterministic domain
//! logic (no IO, no storage). Services in `stockflow-infra` read rows, plan with
//! these functions, and commit the plans atomically.

pub mod catalog;
pub mod code;
pub mod document;
pub mod money;
pub mod reversal;
pub mod stock;

pub use catalog::{LocationInfo, ProductInfo};
pub use code::CodeFormat;
pub use document::{
    Counterparty, Direction, DocumentStatus, DocumentType, LedgerDelta, LineDraft,
    MovementColumn, MovementDocument, MovementDraft, MovementHeader, MovementLine, NewMovement,
    TransferDraft, TransferLineDraft,
};
pub use reversal::{ReversalPlan, StockWarning, plan_reversal};
pub use stock::{
    AdjustmentPlan, NegativeStockPolicy, StockColumn, StockKey, StockMutation, StockRecord,
    plan_adjustment, plan_price,
};
