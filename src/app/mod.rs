pub mod pipelines;
pub mod sinks;
