pub mod etl;
pub mod pipeline;

pub use crate::domain::model::{Dataset, Record, Report};
pub use crate::domain::ports::{Pipeline, ReportSink, Storage};
pub use crate::utils::error::Result;
