// Adapters layer: concrete implementations of the domain ports for external systems.

pub mod google_auth;
pub mod google_sheets;
pub mod metabase;
pub mod sentiment;
pub mod storage;

pub use google_auth::{ServiceAccountAuth, ServiceAccountKey, TokenProvider};
pub use google_sheets::GoogleSheetsClient;
pub use metabase::MetabaseClient;
pub use sentiment::VaderScorer;
pub use storage::LocalStorage;
