use crate::domain::model::{PublishSummary, Report};
use crate::domain::ports::{ReportSink, SpreadsheetClient};
use crate::utils::error::{EtlError, Result};
use async_trait::async_trait;
use serde_json::Value;

/// Clear-then-write publishing: raw rows to the primary sheet, each
/// cross-tab to its own sheet (created when missing).
pub struct SheetsPublisher<C: SpreadsheetClient> {
    client: C,
    primary_sheet: Option<String>,
}

impl<C: SpreadsheetClient> SheetsPublisher<C> {
    pub fn new(client: C, primary_sheet: Option<String>) -> Self {
        Self {
            client,
            primary_sheet,
        }
    }

    /// Returns the title to write to. Sheets keeps tab titles unique
    /// regardless of case, so an existing tab differing only in case is reused.
    async fn ensure_sheet(
        &self,
        existing: &[String],
        title: &str,
        rows: usize,
        cols: usize,
    ) -> Result<String> {
        let wanted = title.to_lowercase();
        if let Some(found) = existing.iter().find(|t| t.to_lowercase() == wanted) {
            return Ok(found.clone());
        }
        self.client.add_sheet(title, rows, cols).await?;
        Ok(title.to_string())
    }

    async fn replace_contents(&self, title: &str, values: Vec<Vec<Value>>) -> Result<()> {
        self.client.clear_sheet(title).await?;
        self.client.write_values(title, values).await
    }
}

#[async_trait]
impl<C: SpreadsheetClient> ReportSink for SheetsPublisher<C> {
    async fn publish(&self, report: &Report) -> Result<PublishSummary> {
        let existing = self.client.sheet_titles().await?;

        let primary = match &self.primary_sheet {
            Some(title) => {
                let cols = report.dataset.columns().len();
                self.ensure_sheet(&existing, title, report.dataset.len() + 1, cols)
                    .await?
            }
            None => existing
                .first()
                .cloned()
                .ok_or_else(|| EtlError::PublishError {
                    sheet: "(primary)".to_string(),
                    message: "spreadsheet has no sheets".to_string(),
                })?,
        };

        tracing::info!(
            "Writing {} records to sheet '{}'",
            report.dataset.len(),
            primary
        );
        self.replace_contents(&primary, report.dataset.to_rows())
            .await?;

        for table in &report.aggregations {
            let sheet = self
                .ensure_sheet(
                    &existing,
                    &table.title,
                    table.rows.len() + 1,
                    table.column_count(),
                )
                .await?;
            self.replace_contents(&sheet, table.to_rows()).await?;
            tracing::debug!("Published '{}' ({} groups)", table.title, table.rows.len());
        }

        Ok(PublishSummary {
            destination: "Google Sheets".to_string(),
            rows_written: report.dataset.len(),
            sheets_written: 1 + report.aggregations.len(),
        })
    }
}
