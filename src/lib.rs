pub mod adapters;
pub mod app;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::cli::CliArgs;

pub use crate::adapters::{GoogleSheetsClient, LocalStorage, MetabaseClient, ServiceAccountAuth, VaderScorer};
pub use app::sinks::{CsvExport, SheetsPublisher};
pub use config::AppConfig;
pub use crate::core::{etl::EtlEngine, pipeline::LeadPipeline};
pub use utils::error::{EtlError, Result};
