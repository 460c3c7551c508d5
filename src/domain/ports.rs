use crate::domain::model::{CrossTab, Dataset, DateRange, PublishSummary, Report};
use crate::utils::error::Result;
use async_trait::async_trait;
use serde_json::Value;

pub trait Storage: Send + Sync {
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;

    /// Human-readable location of `path`, for summaries.
    fn location(&self, path: &str) -> String;
}

/// Compound sentiment in `[-1, 1]`.
pub trait SentimentScorer: Send + Sync {
    fn compound(&self, text: &str) -> f64;
}

/// Upstream analytics query returning one dataset per date window.
#[async_trait]
pub trait QuerySource: Send + Sync {
    async fn fetch(&self, range: &DateRange) -> Result<Dataset>;
}

/// Minimal spreadsheet surface: list, create, clear and write sheets.
#[async_trait]
pub trait SpreadsheetClient: Send + Sync {
    /// Sheet titles in tab order.
    async fn sheet_titles(&self) -> Result<Vec<String>>;
    async fn add_sheet(&self, title: &str, rows: usize, cols: usize) -> Result<()>;
    async fn clear_sheet(&self, title: &str) -> Result<()>;
    /// Writes `values` starting at A1.
    async fn write_values(&self, title: &str, values: Vec<Vec<Value>>) -> Result<()>;
}

#[async_trait]
pub trait ReportSink: Send + Sync {
    async fn publish(&self, report: &Report) -> Result<PublishSummary>;
}

#[async_trait]
pub trait Pipeline: Send + Sync {
    async fn extract(&self, range: &DateRange) -> Result<Dataset>;
    fn classify(&self, dataset: Dataset) -> Result<Dataset>;
    fn sanitize(&self, dataset: Dataset) -> Dataset;
    fn aggregate(&self, dataset: &Dataset) -> Result<Vec<CrossTab>>;
    async fn load(&self, report: &Report) -> Result<PublishSummary>;
}
