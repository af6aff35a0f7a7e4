//! Read access to inspected databases
//!
//! `DataQueryProvider` is the seam between the session/navigation core and
//! the SQL that reads the agent tool's tables. `SqliteQueryProvider` is the
//! shipped implementation: one read-only r2d2 pool per database path, kept in
//! a bounded cache and evicted when the file is renamed or deleted.
pub mod schema;
pub mod hierarchy_store;
pub mod detail_store;
#[cfg(test)]
pub(crate) mod fixtures;

pub use detail_store::StateColumn;
pub use schema::*;

use anyhow::Context;
use moka::sync::Cache;
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{Connection, OpenFlags};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Everything the core reads from a database. All calls are blocking.
pub trait DataQueryProvider: Send + Sync {
    /// Open `path` read-only and confirm it is a database. The probe
    /// connection is closed before this returns, on success and on failure.
    fn probe(&self, path: &Path) -> anyhow::Result<()>;

    fn projects(&self, db: &Path) -> anyhow::Result<Vec<Project>>;
    fn branches(&self, db: &Path, project_id: &str) -> anyhow::Result<Vec<Branch>>;
    fn branch(&self, db: &Path, branch_id: &str) -> anyhow::Result<Option<Branch>>;
    fn project_states(&self, db: &Path, branch_id: &str) -> anyhow::Result<Vec<ProjectState>>;
    fn search_project_states(
        &self,
        db: &Path,
        branch_id: &str,
        criteria: &StateCriteria,
    ) -> anyhow::Result<Vec<ProjectState>>;

    fn epics(&self, db: &Path, state_id: &str) -> anyhow::Result<Option<Value>>;
    fn tasks(&self, db: &Path, state_id: &str) -> anyhow::Result<Option<Value>>;
    fn steps(&self, db: &Path, state_id: &str) -> anyhow::Result<Option<Value>>;
    fn iterations(&self, db: &Path, state_id: &str) -> anyhow::Result<Option<Value>>;
    fn files(&self, db: &Path, state_id: &str) -> anyhow::Result<Option<Value>>;
    fn user_inputs(&self, db: &Path, state_id: &str) -> anyhow::Result<Option<Value>>;
    fn llm_requests(&self, db: &Path, state_id: &str) -> anyhow::Result<Option<Value>>;

    /// Drop anything held open for `db`. Called before the file is renamed or deleted.
    fn release(&self, _db: &Path) {}
}

type SqlitePool = Pool<SqliteConnectionManager>;

fn open_read_only(path: &Path) -> rusqlite::Result<Connection> {
    Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
}

pub struct SqliteQueryProvider {
    pools: Cache<PathBuf, Arc<SqlitePool>>,
    pool_max_size: u32,
}

impl SqliteQueryProvider {
    pub fn new(pool_max_size: u32, cache_capacity: u64) -> Self {
        info!(
            "SQLite query provider: {} connections per database, {} cached databases",
            pool_max_size, cache_capacity
        );
        Self {
            pools: Cache::builder()
                .max_capacity(cache_capacity.max(1))
                .build(),
            pool_max_size: pool_max_size.max(1),
        }
    }

    fn build_pool(&self, db: &Path) -> anyhow::Result<Arc<SqlitePool>> {
        if !db.is_file() {
            anyhow::bail!("database file not found: {}", db.display());
        }
        let manager = SqliteConnectionManager::file(db)
            .with_flags(OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX)
            .with_init(|conn| conn.execute_batch("PRAGMA query_only = ON; PRAGMA busy_timeout = 5000;"));
        let pool = Pool::builder()
            .max_size(self.pool_max_size)
            .min_idle(Some(0))
            .connection_timeout(Duration::from_secs(10))
            .build(manager)
            .map_err(|e| anyhow::anyhow!("Failed to create connection pool: {}", e))?;
        debug!("Opened connection pool for {}", db.display());
        Ok(Arc::new(pool))
    }

    fn get_conn(&self, db: &Path) -> anyhow::Result<r2d2::PooledConnection<SqliteConnectionManager>> {
        let pool = self
            .pools
            .try_get_with(db.to_path_buf(), || self.build_pool(db))
            .map_err(|e| anyhow::anyhow!("{:#}", e))?;
        pool.get()
            .with_context(|| format!("Failed to get connection for {}", db.display()))
    }

    #[cfg(test)]
    pub(crate) fn has_pool(&self, db: &Path) -> bool {
        self.pools.contains_key(db)
    }

    fn state_column(&self, db: &Path, state_id: &str, column: StateColumn) -> anyhow::Result<Option<Value>> {
        let conn = self.get_conn(db)?;
        detail_store::get_state_column(&conn, state_id, column)
    }
}

impl DataQueryProvider for SqliteQueryProvider {
    fn probe(&self, path: &Path) -> anyhow::Result<()> {
        let conn = open_read_only(path)
            .with_context(|| format!("cannot open {}", path.display()))?;
        let check = conn.query_row("SELECT COUNT(*) FROM sqlite_master", [], |row| {
            row.get::<_, i64>(0)
        });
        if let Err((_conn, e)) = conn.close() {
            warn!("Probe connection for {} did not close cleanly: {}", path.display(), e);
        }
        let tables = check.context("sqlite_master is unreadable")?;
        debug!("Probe of {} found {} schema objects", path.display(), tables);
        Ok(())
    }

    fn projects(&self, db: &Path) -> anyhow::Result<Vec<Project>> {
        let conn = self.get_conn(db)?;
        hierarchy_store::get_projects(&conn)
    }

    fn branches(&self, db: &Path, project_id: &str) -> anyhow::Result<Vec<Branch>> {
        let conn = self.get_conn(db)?;
        hierarchy_store::get_branches(&conn, project_id)
    }

    fn branch(&self, db: &Path, branch_id: &str) -> anyhow::Result<Option<Branch>> {
        let conn = self.get_conn(db)?;
        hierarchy_store::get_branch(&conn, branch_id)
    }

    fn project_states(&self, db: &Path, branch_id: &str) -> anyhow::Result<Vec<ProjectState>> {
        let conn = self.get_conn(db)?;
        hierarchy_store::get_project_states(&conn, branch_id)
    }

    fn search_project_states(
        &self,
        db: &Path,
        branch_id: &str,
        criteria: &StateCriteria,
    ) -> anyhow::Result<Vec<ProjectState>> {
        let conn = self.get_conn(db)?;
        hierarchy_store::search_project_states(&conn, branch_id, criteria)
    }

    fn epics(&self, db: &Path, state_id: &str) -> anyhow::Result<Option<Value>> {
        self.state_column(db, state_id, StateColumn::Epics)
    }

    fn tasks(&self, db: &Path, state_id: &str) -> anyhow::Result<Option<Value>> {
        self.state_column(db, state_id, StateColumn::Tasks)
    }

    fn steps(&self, db: &Path, state_id: &str) -> anyhow::Result<Option<Value>> {
        self.state_column(db, state_id, StateColumn::Steps)
    }

    fn iterations(&self, db: &Path, state_id: &str) -> anyhow::Result<Option<Value>> {
        self.state_column(db, state_id, StateColumn::Iterations)
    }

    fn files(&self, db: &Path, state_id: &str) -> anyhow::Result<Option<Value>> {
        let conn = self.get_conn(db)?;
        detail_store::get_files(&conn, state_id).map(Some)
    }

    fn user_inputs(&self, db: &Path, state_id: &str) -> anyhow::Result<Option<Value>> {
        let conn = self.get_conn(db)?;
        detail_store::get_user_inputs(&conn, state_id).map(Some)
    }

    fn llm_requests(&self, db: &Path, state_id: &str) -> anyhow::Result<Option<Value>> {
        let conn = self.get_conn(db)?;
        detail_store::get_llm_requests(&conn, state_id).map(Some)
    }

    fn release(&self, db: &Path) {
        self.pools.invalidate(db);
        debug!("Released connection pool for {}", db.display());
    }
}
