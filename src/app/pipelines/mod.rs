pub mod lead_pipeline;

pub use lead_pipeline::LeadPipeline;
