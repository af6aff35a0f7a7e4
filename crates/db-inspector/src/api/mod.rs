//! API module - HTTP handlers over the inspector

pub mod admin_api;
pub mod browse_api;
pub mod database_api;
pub mod detail_api;

// Re-export API handlers
pub use admin_api::{health, status};
pub use browse_api::browse;
pub use database_api::{
    delete_database, list_databases, rename_database, select_database, upload_database,
    RenameRequest, SelectRequest,
};
pub use detail_api::{get_detail, get_llm_requests};
