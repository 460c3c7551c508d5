pub use crate::app::pipelines::lead_pipeline::LeadPipeline;
