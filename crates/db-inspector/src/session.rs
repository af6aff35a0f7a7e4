//! Process-wide active database
//!
//! One database is active for every client of the process. The registry only
//! stores the handle; validation happens before `set_active` is called.
//! A selection can be replaced but never cleared.

use arc_swap::ArcSwapOption;
use std::sync::Arc;
use tracing::info;

use crate::error::{InspectorError, InspectorResult};
use crate::file_store::StoredDatabaseFile;
use crate::metrics;

#[derive(Default)]
pub struct SessionRegistry {
    active: ArcSwapOption<StoredDatabaseFile>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_active(&self) -> Option<StoredDatabaseFile> {
        self.active.load_full().map(|handle| (*handle).clone())
    }

    /// Active handle, or `NoActiveDatabase` for callers about to read data.
    pub fn require_active(&self) -> InspectorResult<StoredDatabaseFile> {
        self.get_active().ok_or(InspectorError::NoActiveDatabase)
    }

    pub fn set_active(&self, handle: StoredDatabaseFile) {
        info!("Active database is now {}", handle.name);
        self.active.store(Some(Arc::new(handle)));
        metrics::set_active_database(true);
    }

    /// Whether `handle` is the active database. Never mutates the registry.
    pub fn is_active(&self, handle: &StoredDatabaseFile) -> bool {
        self.active
            .load()
            .as_ref()
            .map(|active| active.path == handle.path)
            .unwrap_or(false)
    }

    /// Point the session at `to` if it currently references `from`.
    ///
    /// Used after a rename so the active handle keeps naming an existing file.
    /// Returns whether the active handle moved.
    pub fn follow_rename(&self, from: &StoredDatabaseFile, to: &StoredDatabaseFile) -> bool {
        let to = Arc::new(to.clone());
        let previous = self.active.rcu(|current| match current {
            Some(active) if active.path == from.path => Some(Arc::clone(&to)),
            other => other.clone(),
        });
        let moved = previous
            .as_ref()
            .map(|active| active.path == from.path)
            .unwrap_or(false);
        if moved {
            info!("Active database renamed {} -> {}", from.name, to.name);
        }
        moved
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn handle(name: &str) -> StoredDatabaseFile {
        StoredDatabaseFile {
            name: name.to_string(),
            path: PathBuf::from("/data").join(name),
        }
    }

    #[test]
    fn test_starts_without_active_database() {
        let registry = SessionRegistry::new();
        assert!(registry.get_active().is_none());
        assert!(matches!(
            registry.require_active().unwrap_err(),
            InspectorError::NoActiveDatabase
        ));
        assert!(!registry.is_active(&handle("a.db")));
    }

    #[test]
    fn test_set_active_replaces_previous() {
        let registry = SessionRegistry::new();
        registry.set_active(handle("a.db"));
        registry.set_active(handle("b.db"));

        assert_eq!(registry.require_active().unwrap().name, "b.db");
        assert!(registry.is_active(&handle("b.db")));
        assert!(!registry.is_active(&handle("a.db")));
    }

    #[test]
    fn test_is_active_does_not_clear() {
        let registry = SessionRegistry::new();
        registry.set_active(handle("a.db"));
        assert!(registry.is_active(&handle("a.db")));
        assert!(registry.is_active(&handle("a.db")));
        assert_eq!(registry.get_active(), Some(handle("a.db")));
    }

    #[test]
    fn test_follow_rename_only_moves_matching_handle() {
        let registry = SessionRegistry::new();
        registry.set_active(handle("a.db"));

        assert!(!registry.follow_rename(&handle("other.db"), &handle("x.db")));
        assert_eq!(registry.get_active(), Some(handle("a.db")));

        assert!(registry.follow_rename(&handle("a.db"), &handle("b.db")));
        assert_eq!(registry.get_active(), Some(handle("b.db")));
    }
}
