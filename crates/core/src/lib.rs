//! `stockflow-core`: domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives shared by every entity: identifiers,
//! the error model, the audit lifecycle, optimistic version tokens and the list query
//! composer. No infrastructure concerns.

pub mod audit;
pub mod error;
pub mod id;
pub mod query;
pub mod version;

pub use audit::{AuditTrail, LifecycleState, RecordState, Stamp};
pub use error::{DomainError, DomainResult};
pub use id::{LocationId, MovementId, PartyId, ProductId, TypedId, UserId};
pub use query::{
    Column, ListQuery, Page, PageLimits, Pagination, QueryComposer, Queryable, SortDirection,
    SortKey, StateFilter,
};
pub use version::{ExpectedVersion, Versioned};
