//! Database session lifecycle
//!
//! `Inspector` owns the file store, the session registry, the upload validator
//! and the query provider, and exposes every operation the API needs. All
//! filesystem and SQLite work runs on the blocking pool; the session handle is
//! read once per call and never held across I/O.
//!
//! Select, upload activation, rename and delete take `session_gate` around
//! their check and the single filesystem call that follows it, so the active
//! handle always names a file that exists.

use bytes::Bytes;
use futures_util::Stream;
use serde::Serialize;
use std::fmt::Display;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::config::Config;
use crate::detail::{self, DetailCategory, DetailView};
use crate::error::{InspectorError, InspectorResult};
use crate::file_store::{FileStore, StoredDatabaseFile};
use crate::metrics;
use crate::navigation::{NavigationQuery, NavigationResolver, ResolvedView};
use crate::query_db::{DataQueryProvider, SqliteQueryProvider};
use crate::session::SessionRegistry;
use crate::upload::UploadValidator;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DatabaseEntry {
    pub name: String,
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DatabaseListing {
    pub databases: Vec<DatabaseEntry>,
    pub active: Option<String>,
}

pub struct Inspector {
    store: Arc<FileStore>,
    session: SessionRegistry,
    provider: Arc<dyn DataQueryProvider>,
    validator: UploadValidator,
    session_gate: Mutex<()>,
}

impl Inspector {
    pub fn new(store: FileStore, provider: Arc<dyn DataQueryProvider>, max_upload_bytes: u64) -> Self {
        let store = Arc::new(store);
        let validator = UploadValidator::new(Arc::clone(&store), Arc::clone(&provider), max_upload_bytes);
        Self {
            store,
            session: SessionRegistry::new(),
            provider,
            validator,
            session_gate: Mutex::new(()),
        }
    }

    /// Inspector backed by the SQLite provider, storing files under `cfg.data_dir`.
    pub fn from_config(cfg: &Config) -> InspectorResult<Self> {
        let store = FileStore::open(&cfg.data_dir)?;
        let provider: Arc<dyn DataQueryProvider> =
            Arc::new(SqliteQueryProvider::new(cfg.pool_max_size, cfg.pool_cache_capacity));
        Ok(Self::new(store, provider, cfg.max_upload_bytes))
    }

    pub fn session(&self) -> &SessionRegistry {
        &self.session
    }

    pub fn max_upload_bytes(&self) -> u64 {
        self.validator.max_bytes()
    }

    async fn blocking<T, F>(&self, f: F) -> InspectorResult<T>
    where
        F: FnOnce(&FileStore) -> InspectorResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || f(&store)).await?
    }

    pub async fn list(&self) -> InspectorResult<DatabaseListing> {
        let files = self.blocking(|store| store.list()).await?;
        let active = self.session.get_active();
        let databases = files
            .into_iter()
            .map(|file| DatabaseEntry {
                active: active.as_ref().map(|a| a.path == file.path).unwrap_or(false),
                name: file.name,
            })
            .collect();
        Ok(DatabaseListing {
            databases,
            active: active.map(|a| a.name),
        })
    }

    /// Make an existing stored file the active database.
    pub async fn select(&self, name: &str) -> InspectorResult<StoredDatabaseFile> {
        let name = name.to_string();
        let _gate = self.session_gate.lock().await;
        let handle = self.blocking(move |store| store.resolve(&name)).await?;
        self.session.set_active(handle.clone());
        Ok(handle)
    }

    /// Validate and store an upload, then activate it.
    pub async fn upload<S, E>(
        &self,
        field: &str,
        original_name: &str,
        chunks: S,
    ) -> InspectorResult<StoredDatabaseFile>
    where
        S: Stream<Item = Result<Bytes, E>> + Unpin,
        E: Display,
    {
        let stored = match self.validator.validate_and_store(field, original_name, chunks).await {
            Ok(stored) => stored,
            Err(e) => {
                metrics::inc_upload("rejected");
                return Err(e);
            }
        };

        // The new file is listed as soon as it is stored; it may have been
        // renamed or deleted before we get here.
        let _gate = self.session_gate.lock().await;
        let name = stored.name.clone();
        let stored = self.blocking(move |store| store.resolve(&name)).await?;
        metrics::inc_upload("accepted");
        self.session.set_active(stored.clone());
        Ok(stored)
    }

    pub async fn rename(&self, old_name: &str, new_name: &str) -> InspectorResult<StoredDatabaseFile> {
        let old_name = old_name.to_string();
        let _gate = self.session_gate.lock().await;
        let from = self.blocking(move |store| store.resolve(&old_name)).await?;

        self.provider.release(&from.path);
        let old_name = from.name.clone();
        let new_name = new_name.to_string();
        let to = self
            .blocking(move |store| store.rename(&old_name, &new_name))
            .await?;
        // A browse running during the rename may have pooled the old path again.
        self.provider.release(&from.path);

        self.session.follow_rename(&from, &to);
        Ok(to)
    }

    /// Delete a stored file unless it is the active database.
    pub async fn delete(&self, name: &str) -> InspectorResult<()> {
        let lookup = name.to_string();
        let _gate = self.session_gate.lock().await;
        let target = self.blocking(move |store| store.resolve(&lookup)).await?;

        if self.session.is_active(&target) {
            warn!("Refusing to delete active database {}", target.name);
            return Err(InspectorError::ActiveDatabaseDeletionForbidden(target.name));
        }

        self.provider.release(&target.path);
        let name = target.name.clone();
        self.blocking(move |store| store.delete(&name)).await?;
        info!("Database {} deleted", target.name);
        Ok(())
    }

    pub async fn browse(&self, query: NavigationQuery) -> InspectorResult<ResolvedView> {
        let active = self.session.require_active()?;
        let provider = Arc::clone(&self.provider);
        tokio::task::spawn_blocking(move || {
            NavigationResolver::new(provider.as_ref(), &active.path).resolve(&query)
        })
        .await?
    }

    pub async fn detail(&self, category: DetailCategory, state_id: &str) -> InspectorResult<DetailView> {
        let active = self.session.require_active()?;
        let provider = Arc::clone(&self.provider);
        let state_id = state_id.to_string();
        tokio::task::spawn_blocking(move || {
            detail::dispatch(provider.as_ref(), &active.path, category, &state_id)
        })
        .await?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query_db::{fixtures, Branch, Project, ProjectState, StateCriteria};
    use futures::stream;
    use serde_json::Value;
    use std::path::Path;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tempfile::TempDir;

    /// Delegates to SQLite, but the first `release` is followed by a query
    /// against the same path, as a browse racing a rename would do.
    struct RequeryAfterRelease {
        inner: Arc<SqliteQueryProvider>,
        fired: AtomicBool,
    }

    impl DataQueryProvider for RequeryAfterRelease {
        fn probe(&self, path: &Path) -> anyhow::Result<()> {
            self.inner.probe(path)
        }
        fn projects(&self, db: &Path) -> anyhow::Result<Vec<Project>> {
            self.inner.projects(db)
        }
        fn branches(&self, db: &Path, project_id: &str) -> anyhow::Result<Vec<Branch>> {
            self.inner.branches(db, project_id)
        }
        fn branch(&self, db: &Path, branch_id: &str) -> anyhow::Result<Option<Branch>> {
            self.inner.branch(db, branch_id)
        }
        fn project_states(&self, db: &Path, branch_id: &str) -> anyhow::Result<Vec<ProjectState>> {
            self.inner.project_states(db, branch_id)
        }
        fn search_project_states(
            &self,
            db: &Path,
            branch_id: &str,
            criteria: &StateCriteria,
        ) -> anyhow::Result<Vec<ProjectState>> {
            self.inner.search_project_states(db, branch_id, criteria)
        }
        fn epics(&self, db: &Path, state_id: &str) -> anyhow::Result<Option<Value>> {
            self.inner.epics(db, state_id)
        }
        fn tasks(&self, db: &Path, state_id: &str) -> anyhow::Result<Option<Value>> {
            self.inner.tasks(db, state_id)
        }
        fn steps(&self, db: &Path, state_id: &str) -> anyhow::Result<Option<Value>> {
            self.inner.steps(db, state_id)
        }
        fn iterations(&self, db: &Path, state_id: &str) -> anyhow::Result<Option<Value>> {
            self.inner.iterations(db, state_id)
        }
        fn files(&self, db: &Path, state_id: &str) -> anyhow::Result<Option<Value>> {
            self.inner.files(db, state_id)
        }
        fn user_inputs(&self, db: &Path, state_id: &str) -> anyhow::Result<Option<Value>> {
            self.inner.user_inputs(db, state_id)
        }
        fn llm_requests(&self, db: &Path, state_id: &str) -> anyhow::Result<Option<Value>> {
            self.inner.llm_requests(db, state_id)
        }
        fn release(&self, db: &Path) {
            self.inner.release(db);
            if !self.fired.swap(true, Ordering::SeqCst) {
                self.inner.projects(db).unwrap();
            }
        }
    }

    fn inspector() -> (TempDir, Inspector) {
        let dir = TempDir::new().unwrap();
        let provider: Arc<dyn DataQueryProvider> = Arc::new(SqliteQueryProvider::new(2, 4));
        let inspector = Inspector::new(FileStore::new(dir.path()), provider, 50_000_000);
        (dir, inspector)
    }

    fn one_chunk(bytes: Vec<u8>) -> impl Stream<Item = Result<Bytes, std::io::Error>> + Unpin {
        stream::iter(vec![Ok(Bytes::from(bytes))])
    }

    fn names(listing: &DatabaseListing) -> Vec<&str> {
        listing.databases.iter().map(|d| d.name.as_str()).collect()
    }

    #[tokio::test]
    async fn test_browse_requires_active_database() {
        let (_dir, inspector) = inspector();
        let err = inspector.browse(NavigationQuery::default()).await.unwrap_err();
        assert!(matches!(err, InspectorError::NoActiveDatabase));
        let err = inspector.detail(DetailCategory::Epic, "s1").await.unwrap_err();
        assert!(matches!(err, InspectorError::NoActiveDatabase));
    }

    #[tokio::test]
    async fn test_upload_activates_and_browses_latest() {
        let (_dir, inspector) = inspector();
        let stored = inspector
            .upload("file", "run.db", one_chunk(fixtures::seeded_bytes()))
            .await
            .unwrap();
        assert_eq!(inspector.session().get_active(), Some(stored.clone()));

        let view = inspector.browse(NavigationQuery::default()).await.unwrap();
        assert_eq!(view.selected_project_id.as_deref(), Some("p1"));
        assert_eq!(view.selected_branch_id.as_deref(), Some("b1"));
        assert_eq!(view.project_states.len(), 3);

        let listing = inspector.list().await.unwrap();
        assert_eq!(listing.active.as_deref(), Some(stored.name.as_str()));
        assert!(listing.databases[0].active);
    }

    #[tokio::test]
    async fn test_failed_upload_leaves_session_untouched() {
        let (dir, inspector) = inspector();
        fixtures::seeded_file(dir.path(), "keep.db");
        inspector.select("keep.db").await.unwrap();

        let err = inspector
            .upload("file", "bad.db", one_chunk(b"not sqlite at all, plain text".repeat(40)))
            .await
            .unwrap_err();
        assert!(matches!(err, InspectorError::UploadRejected(_)));
        assert_eq!(inspector.session().get_active().unwrap().name, "keep.db");
        assert_eq!(names(&inspector.list().await.unwrap()), ["keep.db"]);
    }

    #[tokio::test]
    async fn test_select_missing_database_is_not_found() {
        let (_dir, inspector) = inspector();
        let err = inspector.select("ghost.db").await.unwrap_err();
        assert!(matches!(err, InspectorError::DatabaseNotFound(_)));
        assert!(inspector.session().get_active().is_none());
    }

    #[tokio::test]
    async fn test_deleting_active_database_is_forbidden() {
        let (dir, inspector) = inspector();
        fixtures::seeded_file(dir.path(), "a.db");
        fixtures::seeded_file(dir.path(), "b.db");
        inspector.select("a.db").await.unwrap();
        inspector.browse(NavigationQuery::default()).await.unwrap();

        let err = inspector.delete("a.db").await.unwrap_err();
        assert!(matches!(err, InspectorError::ActiveDatabaseDeletionForbidden(_)));
        assert_eq!(names(&inspector.list().await.unwrap()), ["a.db", "b.db"]);
        assert!(inspector.browse(NavigationQuery::default()).await.is_ok());

        inspector.delete("b.db").await.unwrap();
        assert_eq!(names(&inspector.list().await.unwrap()), ["a.db"]);
    }

    #[tokio::test]
    async fn test_rename_active_database_moves_session() {
        let (dir, inspector) = inspector();
        fixtures::seeded_file(dir.path(), "a.db");
        inspector.select("a.db").await.unwrap();
        inspector.browse(NavigationQuery::default()).await.unwrap();

        inspector.rename("a.db", "renamed.sqlite").await.unwrap();
        assert_eq!(inspector.session().get_active().unwrap().name, "renamed.sqlite");
        assert_eq!(names(&inspector.list().await.unwrap()), ["renamed.sqlite"]);

        let view = inspector.browse(NavigationQuery::default()).await.unwrap();
        assert_eq!(view.selected_branch_id.as_deref(), Some("b1"));

        let err = inspector.delete("renamed.sqlite").await.unwrap_err();
        assert!(matches!(err, InspectorError::ActiveDatabaseDeletionForbidden(_)));
    }

    #[tokio::test]
    async fn test_rename_drops_pool_reopened_under_old_path() {
        let dir = TempDir::new().unwrap();
        fixtures::seeded_file(dir.path(), "a.db");
        let sqlite = Arc::new(SqliteQueryProvider::new(2, 4));
        let provider: Arc<dyn DataQueryProvider> = Arc::new(RequeryAfterRelease {
            inner: Arc::clone(&sqlite),
            fired: AtomicBool::new(false),
        });
        let inspector = Inspector::new(FileStore::new(dir.path()), provider, 50_000_000);
        let old_path = dir.path().join("a.db");

        inspector.select("a.db").await.unwrap();
        inspector.browse(NavigationQuery::default()).await.unwrap();
        assert!(sqlite.has_pool(&old_path));

        inspector.rename("a.db", "b.db").await.unwrap();
        assert!(!sqlite.has_pool(&old_path));

        let view = inspector.browse(NavigationQuery::default()).await.unwrap();
        assert_eq!(view.selected_branch_id.as_deref(), Some("b1"));
        assert!(sqlite.has_pool(&dir.path().join("b.db")));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_select_and_delete_never_leave_session_dangling() {
        let (dir, inspector) = inspector();
        fixtures::seeded_file(dir.path(), "keep.db");
        let inspector = Arc::new(inspector);

        for _ in 0..25 {
            inspector.select("keep.db").await.unwrap();
            if !dir.path().join("a.db").exists() {
                fixtures::seeded_file(dir.path(), "a.db");
            }

            let deleter = {
                let inspector = Arc::clone(&inspector);
                tokio::spawn(async move { inspector.delete("a.db").await })
            };
            let selector = {
                let inspector = Arc::clone(&inspector);
                tokio::spawn(async move { inspector.select("a.db").await })
            };
            let deleted = deleter.await.unwrap();
            let selected = selector.await.unwrap();

            let active = inspector.session().get_active().unwrap();
            assert!(active.path.is_file(), "active {} must exist", active.name);
            match (deleted, selected) {
                (Ok(()), Err(InspectorError::DatabaseNotFound(_))) => {
                    assert_eq!(active.name, "keep.db");
                }
                (Err(InspectorError::ActiveDatabaseDeletionForbidden(_)), Ok(_)) => {
                    assert_eq!(active.name, "a.db");
                }
                other => panic!("unexpected outcome: {:?}", other),
            }
        }
    }

    #[tokio::test]
    async fn test_detail_reads_active_database() {
        let (dir, inspector) = inspector();
        fixtures::seeded_file(dir.path(), "a.db");
        inspector.select("a.db").await.unwrap();

        let view = inspector.detail(DetailCategory::Files, "s3").await.unwrap();
        assert_eq!(view.template, "files_details");
        assert_eq!(view.data.unwrap()[0]["path"], "src/login.rs");
    }
}
