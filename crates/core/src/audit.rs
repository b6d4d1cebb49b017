//! Audit lifecycle shared by every persisted entity.
//!
//! An entity is `Active`, `Inactive` or `Removed`. Removal is a soft delete: the row
//! stays in storage with the remover's stamp and is hidden from every list.
//! Content edits and enable/disable toggles are disjoint mutation paths; only
//! edits move the `updated` stamp.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};
use crate::id::UserId;

/// Who did something, and when.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stamp {
    pub user: UserId,
    pub at: DateTime<Utc>,
}

impl Stamp {
    pub fn new(user: UserId, at: DateTime<Utc>) -> Self {
        Self { user, at }
    }
}

/// Effective lifecycle state of an entity.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum LifecycleState {
    Active,
    Inactive,
    /// Terminal. Carries the soft-delete stamp.
    Removed { removed: Stamp },
}

/// Dataless view of a lifecycle state, used by list filters.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordState {
    Active,
    Inactive,
    Removed,
}

impl LifecycleState {
    pub fn kind(&self) -> RecordState {
        match self {
            LifecycleState::Active => RecordState::Active,
            LifecycleState::Inactive => RecordState::Inactive,
            LifecycleState::Removed { .. } => RecordState::Removed,
        }
    }
}

/// Creation, edit and soft-delete metadata plus the lifecycle state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditTrail {
    created: Stamp,
    updated: Option<Stamp>,
    state: LifecycleState,
}

impl AuditTrail {
    /// A freshly registered entity: `Active`, never edited.
    pub fn register(actor: UserId, at: DateTime<Utc>) -> Self {
        Self {
            created: Stamp::new(actor, at),
            updated: None,
            state: LifecycleState::Active,
        }
    }

    pub fn created(&self) -> &Stamp {
        &self.created
    }

    pub fn updated(&self) -> Option<&Stamp> {
        self.updated.as_ref()
    }

    pub fn kind(&self) -> RecordState {
        self.state.kind()
    }

    pub fn removed(&self) -> Option<&Stamp> {
        match &self.state {
            LifecycleState::Removed { removed } => Some(removed),
            _ => None,
        }
    }

    pub fn is_removed(&self) -> bool {
        self.removed().is_some()
    }

    /// Stamp a content edit.
    pub fn record_edit(&mut self, actor: UserId, at: DateTime<Utc>) -> DomainResult<()> {
        self.ensure_not_removed("edit")?;
        self.updated = Some(Stamp::new(actor, at));
        Ok(())
    }

    /// `{Active, Inactive} -> Active`.
    pub fn enable(&mut self) -> DomainResult<()> {
        self.ensure_not_removed("enable")?;
        self.state = LifecycleState::Active;
        Ok(())
    }

    /// `{Active, Inactive} -> Inactive`.
    pub fn disable(&mut self) -> DomainResult<()> {
        self.ensure_not_removed("disable")?;
        self.state = LifecycleState::Inactive;
        Ok(())
    }

    /// `{Active, Inactive} -> Removed`.
    pub fn remove(&mut self, actor: UserId, at: DateTime<Utc>) -> DomainResult<()> {
        self.ensure_not_removed("remove")?;
        self.state = LifecycleState::Removed {
            removed: Stamp::new(actor, at),
        };
        Ok(())
    }

    fn ensure_not_removed(&self, action: &str) -> DomainResult<()> {
        if self.is_removed() {
            return Err(DomainError::invalid_state(format!(
                "cannot {action} a removed record"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn trail() -> AuditTrail {
        AuditTrail::register(UserId::new(), Utc::now())
    }

    #[test]
    fn register_starts_active_without_update_stamp() {
        let t = trail();
        assert_eq!(t.kind(), RecordState::Active);
        assert!(t.updated().is_none());
    }

    #[test]
    fn toggles_do_not_touch_update_stamp() {
        let mut t = trail();
        t.disable().unwrap();
        assert_eq!(t.kind(), RecordState::Inactive);
        t.enable().unwrap();
        assert_eq!(t.kind(), RecordState::Active);
        assert!(t.updated().is_none());
    }

    #[test]
    fn edit_sets_update_stamp_and_keeps_created() {
        let mut t = trail();
        let created = *t.created();
        let editor = UserId::new();
        t.record_edit(editor, Utc::now()).unwrap();
        assert_eq!(t.updated().map(|s| s.user), Some(editor));
        assert_eq!(*t.created(), created);
    }

    #[test]
    fn remove_is_terminal() {
        let mut t = trail();
        t.disable().unwrap();
        let remover = UserId::new();
        t.remove(remover, Utc::now()).unwrap();
        assert_eq!(t.removed().map(|s| s.user), Some(remover));
        assert!(t.is_removed());

        for err in [
            t.clone().enable().unwrap_err(),
            t.clone().disable().unwrap_err(),
            t.clone().record_edit(UserId::new(), Utc::now()).unwrap_err(),
            t.clone().remove(UserId::new(), Utc::now()).unwrap_err(),
        ] {
            assert!(matches!(err, DomainError::InvalidState(_)), "{err:?}");
        }
    }

    #[test]
    fn serializes_removed_with_stamp() {
        let mut t = trail();
        t.remove(UserId::new(), Utc::now()).unwrap();
        let json = serde_json::to_value(&t).unwrap();
        assert_eq!(json["state"]["state"], "removed");
        assert!(json["state"]["removed"]["user"].is_string());
    }

    #[derive(Debug, Clone, Copy)]
    enum Op {
        Enable,
        Disable,
        Edit,
        Remove,
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            Just(Op::Enable),
            Just(Op::Disable),
            Just(Op::Edit),
            Just(Op::Remove),
        ]
    }

    proptest! {
        #[test]
        fn removed_never_comes_back(ops in proptest::collection::vec(op(), 0..32)) {
            let mut t = trail();
            let created = *t.created();
            let mut was_removed = false;
            for o in ops {
                let _ = match o {
                    Op::Enable => t.enable(),
                    Op::Disable => t.disable(),
                    Op::Edit => t.record_edit(UserId::new(), Utc::now()),
                    Op::Remove => t.remove(UserId::new(), Utc::now()),
                };
                if was_removed {
                    prop_assert_eq!(t.kind(), RecordState::Removed);
                }
                was_removed = t.is_removed();
                prop_assert_eq!(*t.created(), created);
            }
        }
    }
}
