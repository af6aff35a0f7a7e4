// db-inspector/crates/db-inspector/src/lib.rs

pub mod api;
pub mod config;
pub mod detail;
pub mod error;
pub mod file_store;
pub mod lifecycle;
pub mod metrics;
pub mod navigation;
pub mod query_db;
pub mod server;
pub mod session;
pub mod shared_state;
pub mod telemetry;
pub mod upload;

// Public API exports
pub use config::Config;
pub use detail::{DetailCategory, DetailView};
pub use error::{InspectorError, InspectorResult, UploadRejection};
pub use file_store::{FileStore, StoredDatabaseFile};
pub use lifecycle::{DatabaseEntry, DatabaseListing, Inspector};
pub use navigation::{NavigationQuery, NavigationResolver, ResolvedView, StateFilter};
pub use query_db::{DataQueryProvider, SqliteQueryProvider};
pub use server::{build_router, run_server};
pub use session::SessionRegistry;
pub use shared_state::AppState;
