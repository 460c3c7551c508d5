use crate::adapters::google_auth::TokenProvider;
use crate::domain::ports::SpreadsheetClient;
use crate::utils::error::{EtlError, Result};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::Deserialize;
use serde_json::{json, Value};
use url::Url;

pub const DEFAULT_SHEETS_BASE_URL: &str = "https://sheets.googleapis.com";

const SPREADSHEET_CONTEXT: &str = "(spreadsheet)";

#[derive(Debug, Deserialize)]
struct SpreadsheetMeta {
    #[serde(default)]
    sheets: Vec<SheetMeta>,
}

#[derive(Debug, Deserialize)]
struct SheetMeta {
    properties: SheetProperties,
}

#[derive(Debug, Deserialize)]
struct SheetProperties {
    title: String,
    #[serde(default)]
    index: i64,
}

/// Google Sheets v4 REST client bound to one spreadsheet.
pub struct GoogleSheetsClient<A: TokenProvider> {
    client: Client,
    base_url: String,
    spreadsheet_id: String,
    auth: A,
}

impl<A: TokenProvider> GoogleSheetsClient<A> {
    pub fn new(auth: A, spreadsheet_id: &str) -> Self {
        Self::with_base_url(auth, spreadsheet_id, DEFAULT_SHEETS_BASE_URL)
    }

    pub fn with_base_url(auth: A, spreadsheet_id: &str, base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            spreadsheet_id: spreadsheet_id.to_string(),
            auth,
        }
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = Url::parse(&self.base_url).map_err(|e| EtlError::ConfigError {
            message: format!("invalid Sheets base URL {}: {}", self.base_url, e),
        })?;
        url.path_segments_mut()
            .map_err(|_| EtlError::ConfigError {
                message: format!("Sheets base URL cannot be a base: {}", self.base_url),
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn send(&self, request: RequestBuilder, sheet: &str) -> Result<Response> {
        let token = self.auth.access_token().await?;
        let response = request.bearer_auth(token).send().await?;

        let status = response.status();
        tracing::debug!("Sheets API response status for '{}': {}", sheet, status);
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EtlError::PublishError {
                sheet: sheet.to_string(),
                message: format!("{}: {}", status, body),
            });
        }
        Ok(response)
    }
}

/// A1 range covering a whole sheet, with the title quoted.
pub fn sheet_range(title: &str) -> String {
    format!("'{}'", title.replace('\'', "''"))
}

#[async_trait]
impl<A: TokenProvider> SpreadsheetClient for GoogleSheetsClient<A> {
    async fn sheet_titles(&self) -> Result<Vec<String>> {
        let mut url = self.endpoint(&["v4", "spreadsheets", self.spreadsheet_id.as_str()])?;
        url.query_pairs_mut()
            .append_pair("fields", "sheets.properties(title,index)");

        let response = self
            .send(self.client.get(url), SPREADSHEET_CONTEXT)
            .await?;
        let meta: SpreadsheetMeta = response.json().await?;

        let mut sheets: Vec<SheetProperties> =
            meta.sheets.into_iter().map(|s| s.properties).collect();
        sheets.sort_by_key(|p| p.index);
        Ok(sheets.into_iter().map(|p| p.title).collect())
    }

    async fn add_sheet(&self, title: &str, rows: usize, cols: usize) -> Result<()> {
        let batch = format!("{}:batchUpdate", self.spreadsheet_id);
        let url = self.endpoint(&["v4", "spreadsheets", batch.as_str()])?;
        let body = json!({
            "requests": [{
                "addSheet": {
                    "properties": {
                        "title": title,
                        "gridProperties": {
                            "rowCount": rows.max(1),
                            "columnCount": cols.max(1),
                        }
                    }
                }
            }]
        });

        self.send(self.client.post(url).json(&body), title).await?;
        tracing::info!("Created sheet '{}' ({} x {})", title, rows, cols);
        Ok(())
    }

    async fn clear_sheet(&self, title: &str) -> Result<()> {
        let clear = format!("{}:clear", sheet_range(title));
        let url = self.endpoint(&[
            "v4",
            "spreadsheets",
            self.spreadsheet_id.as_str(),
            "values",
            clear.as_str(),
        ])?;

        self.send(self.client.post(url).json(&json!({})), title)
            .await?;
        Ok(())
    }

    async fn write_values(&self, title: &str, values: Vec<Vec<Value>>) -> Result<()> {
        let range = format!("{}!A1", sheet_range(title));
        let mut url = self.endpoint(&[
            "v4",
            "spreadsheets",
            self.spreadsheet_id.as_str(),
            "values",
            range.as_str(),
        ])?;
        url.query_pairs_mut().append_pair("valueInputOption", "RAW");

        let row_count = values.len();
        let body = json!({
            "range": range,
            "majorDimension": "ROWS",
            "values": values,
        });

        self.send(self.client.put(url).json(&body), title).await?;
        tracing::debug!("Wrote {} rows to '{}'", row_count, title);
        Ok(())
    }
}
