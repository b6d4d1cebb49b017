//! Reference data registries: products and locations.
//!
//! Each entry carries an [`AuditTrail`]. Removed entries stay in the registry
//! (soft delete) but are invisible to `get`, `exists` and every list.

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use tracing::info;

use stockflow_core::{
    AuditTrail, Column, DomainError, DomainResult, ListQuery, LocationId, Page,
    PageLimits, ProductId, QueryComposer, Queryable, RecordState, SortKey, TypedId, UserId,
};
use stockflow_inventory::{LocationInfo, ProductInfo};

/// Payload of a reference entry.
pub trait ReferenceData: Clone + Send + Sync + 'static {
    /// Entity name used in messages and logs.
    const KIND: &'static str;

    /// Business code, unique among non-removed entries.
    fn code(&self) -> &str;

    fn code_mut(&mut self) -> &mut String;

    fn name(&self) -> &str;

    /// Trim the code in place; codes are compared and stored trimmed.
    fn normalize(&mut self) {
        let code = self.code_mut();
        let trimmed = code.trim();
        if trimmed.len() != code.len() {
            *code = trimmed.to_string();
        }
    }

    fn validate(&self) -> DomainResult<()> {
        if self.code().trim().is_empty() {
            return Err(DomainError::validation(format!("{} code is required", Self::KIND)));
        }
        if self.name().trim().is_empty() {
            return Err(DomainError::validation(format!("{} name is required", Self::KIND)));
        }
        Ok(())
    }
}

impl ReferenceData for ProductInfo {
    const KIND: &'static str = "product";

    fn code(&self) -> &str {
        &self.sku
    }

    fn code_mut(&mut self) -> &mut String {
        &mut self.sku
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl ReferenceData for LocationInfo {
    const KIND: &'static str = "location";

    fn code(&self) -> &str {
        &self.code
    }

    fn code_mut(&mut self) -> &mut String {
        &mut self.code
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceEntry<K, T> {
    pub id: K,
    pub data: T,
    pub audit: AuditTrail,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ReferenceColumn {
    Id,
    Code,
    Name,
    CreatedAt,
    UpdatedAt,
}

impl Column for ReferenceColumn {
    fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(Self::Id),
            1 => Some(Self::Code),
            2 => Some(Self::Name),
            3 => Some(Self::CreatedAt),
            4 => Some(Self::UpdatedAt),
            _ => None,
        }
    }

    fn primary() -> Self {
        Self::Id
    }

    fn searchable(self) -> bool {
        matches!(self, Self::Code | Self::Name)
    }

    fn sql_name(self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::Code => "code",
            Self::Name => "name",
            Self::CreatedAt => "created_at",
            Self::UpdatedAt => "updated_at",
        }
    }
}

impl<K: TypedId, T: ReferenceData> Queryable for ReferenceEntry<K, T> {
    type Column = ReferenceColumn;

    fn text(&self, column: ReferenceColumn) -> Option<String> {
        match column {
            ReferenceColumn::Code => Some(self.data.code().to_string()),
            ReferenceColumn::Name => Some(self.data.name().to_string()),
            _ => None,
        }
    }

    fn sort_key(&self, column: ReferenceColumn) -> SortKey {
        match column {
            ReferenceColumn::Id => SortKey::Id(self.id.uuid()),
            ReferenceColumn::Code => SortKey::Text(self.data.code().to_lowercase()),
            ReferenceColumn::Name => SortKey::Text(self.data.name().to_lowercase()),
            ReferenceColumn::CreatedAt => SortKey::Time(self.audit.created().at),
            // Never-edited entries sort by creation time.
            ReferenceColumn::UpdatedAt => SortKey::Time(
                self.audit
                    .updated()
                    .map_or(self.audit.created().at, |s| s.at),
            ),
        }
    }

    fn record_state(&self) -> RecordState {
        self.audit.kind()
    }

    fn reference_time(&self) -> DateTime<Utc> {
        self.audit.created().at
    }
}

/// In-memory registry of one reference entity.
#[derive(Debug)]
pub struct ReferenceRegistry<K, T> {
    entries: RwLock<HashMap<K, ReferenceEntry<K, T>>>,
    limits: PageLimits,
}

pub type ProductRegistry = ReferenceRegistry<ProductId, ProductInfo>;
pub type LocationRegistry = ReferenceRegistry<LocationId, LocationInfo>;

impl<K: TypedId, T: ReferenceData> Default for ReferenceRegistry<K, T> {
    fn default() -> Self {
        Self::new(PageLimits::default())
    }
}

impl<K: TypedId, T: ReferenceData> ReferenceRegistry<K, T> {
    pub fn new(limits: PageLimits) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            limits,
        }
    }

    fn poisoned() -> DomainError {
        DomainError::persistence(format!("{} registry lock poisoned", T::KIND))
    }

    fn not_found(id: K) -> DomainError {
        DomainError::not_found(format!("{} {id}", T::KIND))
    }

    fn ensure_code_free(
        entries: &HashMap<K, ReferenceEntry<K, T>>,
        code: &str,
        except: Option<K>,
    ) -> DomainResult<()> {
        let taken = entries.values().any(|e| {
            Some(e.id) != except
                && !e.audit.is_removed()
                && e.data.code().eq_ignore_ascii_case(code)
        });
        if taken {
            return Err(DomainError::invalid_argument(format!(
                "{} code {code} is already in use",
                T::KIND
            )));
        }
        Ok(())
    }

    /// Register a new `Active` entry.
    pub fn create(&self, mut data: T, actor: UserId) -> DomainResult<ReferenceEntry<K, T>> {
        data.normalize();
        data.validate()?;
        let mut entries = self.entries.write().map_err(|_| Self::poisoned())?;
        Self::ensure_code_free(&entries, data.code(), None)?;

        let entry = ReferenceEntry {
            id: K::generate(),
            data,
            audit: AuditTrail::register(actor, Utc::now()),
        };
        entries.insert(entry.id, entry.clone());
        info!(kind = T::KIND, id = %entry.id, actor = %actor, "reference entry created");
        Ok(entry)
    }

    /// Replace the payload and stamp the edit. A removed entry is
    /// `InvalidState` whatever the payload.
    pub fn edit(&self, id: K, mut data: T, actor: UserId) -> DomainResult<ReferenceEntry<K, T>> {
        data.normalize();
        data.validate()?;
        let mut entries = self.entries.write().map_err(|_| Self::poisoned())?;

        let mut audit = entries
            .get(&id)
            .map(|e| e.audit.clone())
            .ok_or_else(|| Self::not_found(id))?;
        audit.record_edit(actor, Utc::now())?;
        Self::ensure_code_free(&entries, data.code(), Some(id))?;

        let entry = entries.get_mut(&id).ok_or_else(|| Self::not_found(id))?;
        entry.audit = audit;
        entry.data = data;
        info!(kind = T::KIND, id = %id, actor = %actor, "reference entry edited");
        Ok(entry.clone())
    }

    pub fn enable(&self, id: K, actor: UserId) -> DomainResult<ReferenceEntry<K, T>> {
        self.transition(id, actor, "enabled", AuditTrail::enable)
    }

    pub fn disable(&self, id: K, actor: UserId) -> DomainResult<ReferenceEntry<K, T>> {
        self.transition(id, actor, "disabled", AuditTrail::disable)
    }

    /// Soft delete. Terminal.
    pub fn remove(&self, id: K, actor: UserId) -> DomainResult<()> {
        let at = Utc::now();
        self.transition(id, actor, "removed", |audit| audit.remove(actor, at))
            .map(|_| ())
    }

    fn transition(
        &self,
        id: K,
        actor: UserId,
        action: &'static str,
        apply: impl FnOnce(&mut AuditTrail) -> DomainResult<()>,
    ) -> DomainResult<ReferenceEntry<K, T>> {
        let mut entries = self.entries.write().map_err(|_| Self::poisoned())?;
        let entry = entries.get_mut(&id).ok_or_else(|| Self::not_found(id))?;
        apply(&mut entry.audit)?;
        info!(kind = T::KIND, id = %id, actor = %actor, action, "reference entry state changed");
        Ok(entry.clone())
    }

    /// `NotFound` for unknown and for removed entries.
    pub fn get(&self, id: K) -> DomainResult<ReferenceEntry<K, T>> {
        let entries = self.entries.read().map_err(|_| Self::poisoned())?;
        entries
            .get(&id)
            .filter(|e| !e.audit.is_removed())
            .cloned()
            .ok_or_else(|| Self::not_found(id))
    }

    /// Known and not removed. Inactive entries still exist.
    pub fn exists(&self, id: K) -> DomainResult<bool> {
        let entries = self.entries.read().map_err(|_| Self::poisoned())?;
        Ok(entries.get(&id).is_some_and(|e| !e.audit.is_removed()))
    }

    pub fn list(&self, query: &ListQuery) -> DomainResult<Page<ReferenceEntry<K, T>>> {
        let composer = QueryComposer::new(query, self.limits);
        let entries = self.entries.read().map_err(|_| Self::poisoned())?;
        Ok(composer.apply(entries.values().cloned()))
    }
}

/// Referential checks run by document registration.
pub trait Catalog: Send + Sync {
    fn product_exists(&self, id: ProductId) -> DomainResult<bool>;

    fn location_exists(&self, id: LocationId) -> DomainResult<bool>;
}

impl<C: Catalog + ?Sized> Catalog for std::sync::Arc<C> {
    fn product_exists(&self, id: ProductId) -> DomainResult<bool> {
        (**self).product_exists(id)
    }

    fn location_exists(&self, id: LocationId) -> DomainResult<bool> {
        (**self).location_exists(id)
    }
}

/// Products and locations held in memory.
#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    pub products: ProductRegistry,
    pub locations: LocationRegistry,
}

impl InMemoryCatalog {
    pub fn new(limits: PageLimits) -> Self {
        Self {
            products: ReferenceRegistry::new(limits),
            locations: ReferenceRegistry::new(limits),
        }
    }
}

impl Catalog for InMemoryCatalog {
    fn product_exists(&self, id: ProductId) -> DomainResult<bool> {
        self.products.exists(id)
    }

    fn location_exists(&self, id: LocationId) -> DomainResult<bool> {
        self.locations.exists(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stockflow_core::StateFilter;

    fn product(sku: &str, name: &str) -> ProductInfo {
        ProductInfo {
            sku: sku.into(),
            name: name.into(),
        }
    }

    #[test]
    fn create_validates_and_rejects_duplicate_codes() {
        let registry = ProductRegistry::default();
        let actor = UserId::new();
        assert!(matches!(
            registry.create(product(" ", "Bolt"), actor),
            Err(DomainError::Validation(_))
        ));
        registry.create(product("B-1", "Bolt"), actor).unwrap();
        assert!(matches!(
            registry.create(product("b-1", "Other bolt"), actor),
            Err(DomainError::InvalidArgument(_))
        ));
    }

    #[test]
    fn codes_are_stored_trimmed_and_clash_with_padded_copies() {
        let registry = ProductRegistry::default();
        let actor = UserId::new();
        let entry = registry.create(product(" B-1 ", "Bolt"), actor).unwrap();
        assert_eq!(entry.data.sku, "B-1");
        assert_eq!(registry.get(entry.id).unwrap().data.sku, "B-1");
        assert!(matches!(
            registry.create(product("B-1", "Other bolt"), actor),
            Err(DomainError::InvalidArgument(_))
        ));

        let other = registry.create(product("C-1", "Clamp"), actor).unwrap();
        assert!(matches!(
            registry.edit(other.id, product(" b-1", "Clamp"), actor),
            Err(DomainError::InvalidArgument(_))
        ));
    }

    #[test]
    fn editing_a_removed_entry_is_invalid_state_even_with_a_clashing_code() {
        let registry = ProductRegistry::default();
        let actor = UserId::new();
        registry.create(product("A-1", "Anchor"), actor).unwrap();
        let gone = registry.create(product("B-1", "Bolt"), actor).unwrap();
        registry.remove(gone.id, actor).unwrap();
        assert!(matches!(
            registry.edit(gone.id, product("A-1", "Bolt"), actor),
            Err(DomainError::InvalidState(_))
        ));
    }

    #[test]
    fn removed_code_can_be_reused() {
        let registry = ProductRegistry::default();
        let actor = UserId::new();
        let first = registry.create(product("B-1", "Bolt"), actor).unwrap();
        registry.remove(first.id, actor).unwrap();
        assert!(registry.create(product("B-1", "Bolt v2"), actor).is_ok());
    }

    #[test]
    fn edit_stamps_update_but_toggles_do_not() {
        let registry = LocationRegistry::default();
        let creator = UserId::new();
        let editor = UserId::new();
        let entry = registry
            .create(
                LocationInfo {
                    code: "WH1".into(),
                    name: "Main".into(),
                },
                creator,
            )
            .unwrap();

        let disabled = registry.disable(entry.id, editor).unwrap();
        assert!(disabled.audit.updated().is_none());
        assert_eq!(disabled.audit.kind(), RecordState::Inactive);

        let edited = registry
            .edit(
                entry.id,
                LocationInfo {
                    code: "WH1".into(),
                    name: "Main warehouse".into(),
                },
                editor,
            )
            .unwrap();
        assert_eq!(edited.audit.updated().map(|s| s.user), Some(editor));
        assert_eq!(edited.audit.created().user, creator);
        // Edits leave the state alone.
        assert_eq!(edited.audit.kind(), RecordState::Inactive);
    }

    #[test]
    fn removed_entries_are_gone_for_readers_and_frozen_for_writers() {
        let registry = ProductRegistry::default();
        let actor = UserId::new();
        let entry = registry.create(product("B-1", "Bolt"), actor).unwrap();
        registry.remove(entry.id, actor).unwrap();

        assert!(matches!(registry.get(entry.id), Err(DomainError::NotFound(_))));
        assert!(!registry.exists(entry.id).unwrap());
        assert!(matches!(
            registry.enable(entry.id, actor),
            Err(DomainError::InvalidState(_))
        ));
        assert!(matches!(
            registry.remove(entry.id, actor),
            Err(DomainError::InvalidState(_))
        ));
        assert!(matches!(
            registry.edit(entry.id, product("B-1", "Bolt"), actor),
            Err(DomainError::InvalidState(_))
        ));
    }

    #[test]
    fn removed_entries_never_list_under_any_filter() {
        let registry = ProductRegistry::default();
        let actor = UserId::new();
        let kept = registry.create(product("A-1", "Anchor"), actor).unwrap();
        let off = registry.create(product("C-1", "Clamp"), actor).unwrap();
        let gone = registry.create(product("B-1", "Bolt"), actor).unwrap();
        registry.disable(off.id, actor).unwrap();
        registry.remove(gone.id, actor).unwrap();

        for state in [StateFilter::All, StateFilter::Active, StateFilter::Inactive] {
            let page = registry
                .list(&ListQuery {
                    state,
                    export_all: true,
                    ..Default::default()
                })
                .unwrap();
            assert!(page.items.iter().all(|e| e.id != gone.id), "{state:?}");
        }

        let all = registry
            .list(&ListQuery {
                sort_column: Some(1),
                ..Default::default()
            })
            .unwrap();
        let ids: Vec<_> = all.items.iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![kept.id, off.id]);
    }

    #[test]
    fn search_matches_name_substring_case_insensitively() {
        let registry = ProductRegistry::default();
        let actor = UserId::new();
        registry.create(product("A-1", "Hex Bolt"), actor).unwrap();
        registry.create(product("A-2", "Washer"), actor).unwrap();

        let page = registry
            .list(&ListQuery {
                search_column: Some(2),
                search_value: Some("bOLt".into()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].data.name, "Hex Bolt");
    }

    #[test]
    fn catalog_checks_existence() {
        let catalog = InMemoryCatalog::default();
        let actor = UserId::new();
        let p = catalog.products.create(product("A-1", "Anchor"), actor).unwrap();
        assert!(catalog.product_exists(p.id).unwrap());
        assert!(!catalog.product_exists(ProductId::new()).unwrap());
        assert!(!catalog.location_exists(LocationId::new()).unwrap());
    }
}
