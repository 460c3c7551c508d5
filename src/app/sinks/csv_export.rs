use crate::domain::model::{PublishSummary, Report};
use crate::domain::ports::{ReportSink, Storage};
use crate::utils::error::{EtlError, Result};
use async_trait::async_trait;
use serde_json::Value;

pub const RAW_DATA_FILE: &str = "raw_data.csv";

/// Writes the same sheets the spreadsheet would get as CSV files.
pub struct CsvExport<S: Storage> {
    storage: S,
}

impl<S: Storage> CsvExport<S> {
    pub fn new(storage: S) -> Self {
        Self { storage }
    }
}

#[async_trait]
impl<S: Storage> ReportSink for CsvExport<S> {
    async fn publish(&self, report: &Report) -> Result<PublishSummary> {
        self.storage
            .write_file(RAW_DATA_FILE, &to_csv(&report.dataset.to_rows())?)
            .await?;
        tracing::debug!("Wrote {}", self.storage.location(RAW_DATA_FILE));

        for table in &report.aggregations {
            let file_name = csv_file_name(&table.title);
            self.storage
                .write_file(&file_name, &to_csv(&table.to_rows())?)
                .await?;
            tracing::debug!("Wrote {}", self.storage.location(&file_name));
        }

        Ok(PublishSummary {
            destination: self.storage.location(""),
            rows_written: report.dataset.len(),
            sheets_written: 1 + report.aggregations.len(),
        })
    }
}

/// "By Cust & Lead Type" -> "by_cust_lead_type.csv"
pub fn csv_file_name(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    for ch in title.chars() {
        if ch.is_alphanumeric() {
            slug.extend(ch.to_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('_') {
            slug.push('_');
        }
    }
    let slug = slug.trim_end_matches('_');
    if slug.is_empty() {
        "sheet.csv".to_string()
    } else {
        format!("{}.csv", slug)
    }
}

fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

pub fn to_csv(rows: &[Vec<Value>]) -> Result<Vec<u8>> {
    let mut writer = csv::WriterBuilder::new()
        .flexible(true)
        .from_writer(Vec::new());
    for row in rows {
        writer.write_record(row.iter().map(cell_text))?;
    }
    writer
        .into_inner()
        .map_err(|e| EtlError::IoError(e.into_error()))
}
