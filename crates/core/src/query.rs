//! Filter, sort and pagination for list operations.
//!
//! Callers describe what they want with a [`ListQuery`]. Column selectors arrive as
//! integer codes and are resolved through each entity's [`Column`] whitelist, so no
//! caller-supplied identifier ever reaches a comparator or a SQL string. Removed
//! records are dropped before any caller filter is considered.

use core::cmp::Ordering;
use core::fmt::Debug;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::audit::RecordState;

/// Which lifecycle states a list should include. Removed is never included.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StateFilter {
    #[default]
    All,
    Active,
    Inactive,
}

impl StateFilter {
    pub fn admits(self, state: RecordState) -> bool {
        match (self, state) {
            (_, RecordState::Removed) => false,
            (StateFilter::All, _) => true,
            (StateFilter::Active, s) => s == RecordState::Active,
            (StateFilter::Inactive, s) => s == RecordState::Inactive,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

/// List request as received from the application layer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListQuery {
    /// Free-text value matched case-insensitively as a substring.
    pub search_value: Option<String>,
    /// Column code the free text applies to.
    pub search_column: Option<i32>,
    pub state: StateFilter,
    /// Inclusive lower bound on the entity's reference date.
    pub date_from: Option<NaiveDate>,
    /// Inclusive upper bound on the entity's reference date.
    pub date_to: Option<NaiveDate>,
    pub sort_column: Option<i32>,
    pub sort_direction: SortDirection,
    /// 1-based.
    pub page_number: Option<u32>,
    pub page_size: Option<u32>,
    /// Download requests: return every matching row, never a page slice.
    pub export_all: bool,
}

/// Page size bounds applied when resolving a [`ListQuery`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PageLimits {
    pub default_page_size: u32,
    pub max_page_size: u32,
}

impl Default for PageLimits {
    fn default() -> Self {
        Self {
            default_page_size: 10,
            max_page_size: 1000,
        }
    }
}

/// Resolved page window.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub page_number: u32,
    pub page_size: u32,
}

impl Pagination {
    pub fn offset(&self) -> u64 {
        u64::from(self.page_number.saturating_sub(1)) * u64::from(self.page_size)
    }
}

/// Whitelisted columns of one entity.
pub trait Column: Copy + Eq + Debug + Send + Sync + 'static {
    /// Map a caller-supplied code; `None` for unknown codes.
    fn from_code(code: i32) -> Option<Self>;

    /// Primary identifier, the default sort column.
    fn primary() -> Self;

    /// Whether free-text search may target this column.
    fn searchable(self) -> bool;

    /// Storage column name for SQL-backed stores.
    fn sql_name(self) -> &'static str;
}

/// Typed, totally ordered sort key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum SortKey {
    Int(i64),
    Decimal(Decimal),
    Text(String),
    Time(DateTime<Utc>),
    Id(Uuid),
}

/// An entity that can be listed through a [`QueryComposer`].
pub trait Queryable {
    type Column: Column;

    /// Searchable text of a column, `None` when the column has no text form.
    fn text(&self, column: Self::Column) -> Option<String>;

    fn sort_key(&self, column: Self::Column) -> SortKey;

    fn record_state(&self) -> RecordState;

    /// Timestamp the date range filter applies to.
    fn reference_time(&self) -> DateTime<Utc>;
}

/// Result of a list operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Number of rows matching the filters, across all pages.
    pub total: u64,
    /// `None` for export requests.
    pub pagination: Option<Pagination>,
}

impl<T> Page<T> {
    pub fn page_count(&self) -> u64 {
        match self.pagination {
            Some(p) if p.page_size > 0 => self.total.div_ceil(u64::from(p.page_size)),
            _ => u64::from(self.total > 0),
        }
    }
}

/// A [`ListQuery`] resolved against one entity's column whitelist.
#[derive(Debug, Clone)]
pub struct QueryComposer<C: Column> {
    search: Option<(C, String)>,
    state: StateFilter,
    date_from: Option<NaiveDate>,
    date_to: Option<NaiveDate>,
    sort: (C, SortDirection),
    window: Option<Pagination>,
}

impl<C: Column> QueryComposer<C> {
    pub fn new(query: &ListQuery, limits: PageLimits) -> Self {
        let search = match (query.search_column, query.search_value.as_deref()) {
            (Some(code), Some(value)) if !value.trim().is_empty() => C::from_code(code)
                .filter(|c| c.searchable())
                .map(|c| (c, value.trim().to_lowercase())),
            _ => None,
        };

        let sort_column = query
            .sort_column
            .and_then(C::from_code)
            .unwrap_or_else(C::primary);

        let window = if query.export_all {
            None
        } else {
            let size = match query.page_size {
                Some(0) | None => limits.default_page_size,
                Some(n) => n,
            }
            .min(limits.max_page_size)
            .max(1);
            Some(Pagination {
                page_number: query.page_number.unwrap_or(1).max(1),
                page_size: size,
            })
        };

        Self {
            search,
            state: query.state,
            date_from: query.date_from,
            date_to: query.date_to,
            sort: (sort_column, query.sort_direction),
            window,
        }
    }

    /// Resolved free-text filter: column and lowercased needle.
    pub fn search(&self) -> Option<(C, &str)> {
        self.search.as_ref().map(|(c, v)| (*c, v.as_str()))
    }

    pub fn state(&self) -> StateFilter {
        self.state
    }

    pub fn date_range(&self) -> (Option<NaiveDate>, Option<NaiveDate>) {
        (self.date_from, self.date_to)
    }

    pub fn sort(&self) -> (C, SortDirection) {
        self.sort
    }

    /// `None` when the query asked for an export.
    pub fn window(&self) -> Option<Pagination> {
        self.window
    }

    pub fn admits<T: Queryable<Column = C>>(&self, row: &T) -> bool {
        if !self.state.admits(row.record_state()) {
            return false;
        }

        let date = row.reference_time().date_naive();
        if self.date_from.is_some_and(|from| date < from) {
            return false;
        }
        if self.date_to.is_some_and(|to| date > to) {
            return false;
        }

        match &self.search {
            Some((column, needle)) => row
                .text(*column)
                .is_some_and(|text| text.to_lowercase().contains(needle.as_str())),
            None => true,
        }
    }

    fn compare<T: Queryable<Column = C>>(&self, a: &T, b: &T) -> Ordering {
        let (column, direction) = self.sort;
        let primary = C::primary();
        let ord = a
            .sort_key(column)
            .cmp(&b.sort_key(column))
            .then_with(|| a.sort_key(primary).cmp(&b.sort_key(primary)));
        match direction {
            SortDirection::Asc => ord,
            SortDirection::Desc => ord.reverse(),
        }
    }

    /// Filter, sort and slice an in-memory row set.
    pub fn apply<T, I>(&self, rows: I) -> Page<T>
    where
        T: Queryable<Column = C>,
        I: IntoIterator<Item = T>,
    {
        let mut matching: Vec<T> = rows.into_iter().filter(|r| self.admits(r)).collect();
        matching.sort_by(|a, b| self.compare(a, b));
        let total = matching.len() as u64;

        let items = match self.window {
            None => matching,
            Some(p) => {
                let offset = usize::try_from(p.offset()).unwrap_or(usize::MAX);
                matching
                    .into_iter()
                    .skip(offset)
                    .take(p.page_size as usize)
                    .collect()
            }
        };

        Page {
            items,
            total,
            pagination: self.window,
        }
    }
}
