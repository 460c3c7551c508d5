use crate::config::MetabaseSettings;
use crate::domain::model::{Dataset, DateRange, Record};
use crate::domain::ports::QuerySource;
use crate::utils::error::{EtlError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};

const SESSION_HEADER: &str = "X-Metabase-Session";

#[derive(Debug, Deserialize)]
struct SessionResponse {
    id: String,
}

/// Runs a saved Metabase question with `start_date`/`end_date` template tags.
pub struct MetabaseClient {
    client: Client,
    base_url: String,
    username: String,
    password: String,
    question_id: String,
}

impl MetabaseClient {
    pub fn new(settings: &MetabaseSettings, question_id: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: settings.url.trim_end_matches('/').to_string(),
            username: settings.username.clone(),
            password: settings.password.clone(),
            question_id: question_id.to_string(),
        }
    }

    pub async fn login(&self) -> Result<String> {
        let url = format!("{}/api/session", self.base_url);
        tracing::debug!("Requesting Metabase session from: {}", url);

        let response = self
            .client
            .post(&url)
            .json(&json!({
                "username": self.username,
                "password": self.password,
            }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EtlError::AuthError {
                service: "Metabase".to_string(),
                message: format!("{}: {}", status, body),
            });
        }

        let session: SessionResponse = response.json().await?;
        Ok(session.id)
    }

    pub async fn run_question(&self, token: &str, range: &DateRange) -> Result<Dataset> {
        let url = format!(
            "{}/api/card/{}/query/json",
            self.base_url, self.question_id
        );
        tracing::debug!("Running Metabase question {} for {}", self.question_id, range);

        let response = self
            .client
            .post(&url)
            .header(SESSION_HEADER, token)
            .json(&query_body(range))
            .send()
            .await?;

        let status = response.status();
        tracing::debug!("Metabase response status: {}", status);
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EtlError::QueryError {
                status: status.as_u16(),
                message: body,
            });
        }

        let payload: Value = response.json().await?;
        dataset_from_json(payload)
    }
}

#[async_trait]
impl QuerySource for MetabaseClient {
    async fn fetch(&self, range: &DateRange) -> Result<Dataset> {
        let token = self.login().await?;
        self.run_question(&token, range).await
    }
}

fn date_parameter(tag: &str, value: String) -> Value {
    json!({
        "type": "date",
        "target": ["variable", ["template-tag", tag]],
        "value": value,
    })
}

pub fn query_body(range: &DateRange) -> Value {
    json!({
        "parameters": [
            date_parameter("start_date", range.start_param()),
            date_parameter("end_date", range.end_param()),
        ]
    })
}

/// Metabase's JSON export is an array of row objects keyed by column name.
pub fn dataset_from_json(payload: Value) -> Result<Dataset> {
    match payload {
        Value::Array(items) => {
            let mut records = Vec::with_capacity(items.len());
            for (index, item) in items.into_iter().enumerate() {
                match item {
                    Value::Object(obj) => records.push(Record::from(obj)),
                    other => {
                        return Err(EtlError::ProcessingError {
                            message: format!(
                                "row {} of query results is not an object: {}",
                                index, other
                            ),
                        })
                    }
                }
            }
            Ok(Dataset::from_records(records))
        }
        // 查詢失敗時 Metabase 仍可能回傳 2xx，錯誤放在 body 裡
        Value::Object(obj) if obj.contains_key("error") => Err(EtlError::QueryError {
            status: 200,
            message: obj
                .get("error")
                .map(|e| e.as_str().map(str::to_string).unwrap_or_else(|| e.to_string()))
                .unwrap_or_default(),
        }),
        other => Err(EtlError::ProcessingError {
            message: format!(
                "expected an array of rows from Metabase, got: {}",
                truncate(&other.to_string(), 200)
            ),
        }),
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let head: String = text.chars().take(max_chars).collect();
        format!("{}…", head)
    }
}
