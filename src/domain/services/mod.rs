pub mod aggregator;
pub mod classifier;
pub mod sanitizer;

pub use aggregator::{aggregate_all, crosstab, default_groupings};
pub use classifier::Classifier;
pub use sanitizer::sanitize_dataset;
