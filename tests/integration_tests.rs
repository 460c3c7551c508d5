use httpmock::prelude::*;
use lead_triage::adapters::google_auth::{ServiceAccountKey, SPREADSHEETS_SCOPE};
use lead_triage::domain::model::DateRange;
use lead_triage::{
    AppConfig, CsvExport, EtlEngine, EtlError, GoogleSheetsClient, LeadPipeline, LocalStorage,
    MetabaseClient, ServiceAccountAuth, SheetsPublisher, VaderScorer,
};
use chrono::NaiveDate;
use serde_json::json;
use std::io::Write;
use tempfile::{NamedTempFile, TempDir};

const TEST_PRIVATE_KEY: &str = include_str!("fixtures/test_rsa_key.pem");

fn range() -> DateRange {
    DateRange::new(
        NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
        NaiveDate::from_ymd_opt(2024, 5, 8).unwrap(),
    )
    .unwrap()
}

fn config_for(server: &MockServer, credentials_path: &str) -> AppConfig {
    let content = json!({
        "metabase": {
            "url": server.base_url(),
            "username": "ops@example.com",
            "password": "secret"
        },
        "metabase_question_id": 77,
        "google_sheets": {
            "credentials_path": credentials_path,
            "spreadsheet_id": "sheet-abc"
        }
    })
    .to_string();
    AppConfig::from_json_str(&content).unwrap()
}

fn mock_metabase(server: &MockServer) -> (httpmock::Mock<'_>, httpmock::Mock<'_>) {
    let session = server.mock(|when, then| {
        when.method(POST).path("/api/session");
        then.status(200).json_body(json!({"id": "mb-session"}));
    });
    let query = server.mock(|when, then| {
        when.method(POST)
            .path("/api/card/77/query/json")
            .header("x-metabase-session", "mb-session")
            .body_contains("\"start_date\"")
            .body_contains("2024-05-08");
        then.status(200).json_body(json!([
            {"lead_id": 1, "customer_name": "Acme", "lead_type": "Inbound", "utm_source": "google",
             "application_status": "Applied", "last_clinician_response": "STOP"},
            {"lead_id": 2, "customer_name": "Acme", "lead_type": "Outbound", "utm_source": null,
             "application_status": "Applied", "last_clinician_response": "please call asap"},
            {"lead_id": 3, "customer_name": "Beta\u{7}", "lead_type": "Inbound", "utm_source": "meta",
             "application_status": "Pending", "last_clinician_response": "maybe later"},
            {"lead_id": 4, "customer_name": "Beta", "lead_type": "Inbound", "utm_source": "meta",
             "application_status": "Pending", "last_clinician_response": null}
        ]));
    });
    (session, query)
}

#[tokio::test]
async fn test_end_to_end_publish_to_google_sheets() {
    let server = MockServer::start();
    let (session_mock, query_mock) = mock_metabase(&server);

    let token_mock = server.mock(|when, then| {
        when.method(POST).path("/token");
        then.status(200)
            .json_body(json!({"access_token": "ya29.it", "token_type": "Bearer"}));
    });
    let titles_mock = server.mock(|when, then| {
        when.method(GET)
            .path("/v4/spreadsheets/sheet-abc")
            .header("authorization", "Bearer ya29.it");
        then.status(200).json_body(json!({
            "sheets": [
                {"properties": {"title": "Sheet1", "index": 0}},
                {"properties": {"title": "By Lead Type", "index": 1}}
            ]
        }));
    });
    let add_mock = server.mock(|when, then| {
        when.method(POST).path("/v4/spreadsheets/sheet-abc:batchUpdate");
        then.status(200).json_body(json!({"replies": [{}]}));
    });
    let clear_mock = server.mock(|when, then| {
        when.method(POST)
            .path_contains("/v4/spreadsheets/sheet-abc/values/")
            .path_contains(":clear");
        then.status(200).json_body(json!({}));
    });
    let primary_write_mock = server.mock(|when, then| {
        when.method(PUT)
            .path_contains("Sheet1")
            .header("authorization", "Bearer ya29.it")
            .json_body(json!({
                "range": "'Sheet1'!A1",
                "majorDimension": "ROWS",
                "values": [
                    ["lead_id", "customer_name", "lead_type", "utm_source", "application_status",
                     "last_clinician_response", "classification"],
                    [1, "Acme", "Inbound", "google", "Applied", "STOP", "Not Interested"],
                    [2, "Acme", "Outbound", "", "Applied", "please call asap", "Very Interested"],
                    [3, "Beta", "Inbound", "meta", "Pending", "maybe later", "Interested"],
                    [4, "Beta", "Inbound", "meta", "Pending", "", "Not Interested"]
                ]
            }));
        then.status(200).json_body(json!({"updatedRows": 5}));
    });
    let pivot_writes_mock = server.mock(|when, then| {
        when.method(PUT)
            .path_contains("By")
            .query_param("valueInputOption", "RAW")
            .body_contains("\"Not Interested\",\"Interested\",\"Very Interested\"");
        then.status(200).json_body(json!({"updatedRows": 3}));
    });

    let key = ServiceAccountKey {
        client_email: "reporter@project.iam.gserviceaccount.com".to_string(),
        private_key: TEST_PRIVATE_KEY.to_string(),
        private_key_id: None,
        token_uri: server.url("/token"),
    };
    let config = config_for(&server, "unused.json");
    let source = MetabaseClient::new(&config.metabase, &config.question_id);
    let auth = ServiceAccountAuth::new(key, SPREADSHEETS_SCOPE);
    let client = GoogleSheetsClient::with_base_url(
        auth,
        &config.google_sheets.spreadsheet_id,
        &server.base_url(),
    );
    let sink = SheetsPublisher::new(client, None);
    let engine = EtlEngine::new(LeadPipeline::new(source, sink, VaderScorer::new()));

    let summary = engine.run(range()).await.unwrap();

    assert_eq!(summary.rows, 4);
    assert_eq!(summary.publish.sheets_written, 6);
    session_mock.assert();
    query_mock.assert();
    token_mock.assert_hits(1);
    titles_mock.assert();
    // 只有不存在的 4 張樞紐表需要建立
    add_mock.assert_hits(4);
    clear_mock.assert_hits(6);
    primary_write_mock.assert();
    pivot_writes_mock.assert_hits(5);
}

#[tokio::test]
async fn test_end_to_end_csv_export() {
    let server = MockServer::start();
    let (_session, query_mock) = mock_metabase(&server);
    let temp_dir = TempDir::new().unwrap();
    let output_path = temp_dir.path().to_str().unwrap().to_string();

    let config = config_for(&server, "sa.json");
    let source = MetabaseClient::new(&config.metabase, &config.question_id);
    let sink = CsvExport::new(LocalStorage::new(output_path));
    let engine = EtlEngine::new(LeadPipeline::new(source, sink, VaderScorer::new()));

    let summary = engine.run(range()).await.unwrap();
    query_mock.assert();
    assert_eq!(summary.publish.sheets_written, 6);

    let by_source =
        std::fs::read_to_string(temp_dir.path().join("by_utm_source.csv")).unwrap();
    // utm_source 為 null 的資料不列入
    assert_eq!(
        by_source,
        "utm_source,Not Interested,Interested,Very Interested\n\
         google,1,0,0\n\
         meta,1,1,0\n"
    );

    let by_pair =
        std::fs::read_to_string(temp_dir.path().join("by_cust_lead_type.csv")).unwrap();
    assert_eq!(
        by_pair,
        "customer_name,lead_type,Not Interested,Interested,Very Interested\n\
         Acme,Inbound,1,0,0\n\
         Acme,Outbound,0,0,1\n\
         Beta,Inbound,1,1,0\n"
    );

    let raw = std::fs::read_to_string(temp_dir.path().join("raw_data.csv")).unwrap();
    assert_eq!(raw.lines().count(), 5);
    assert!(!raw.contains('\u{7}'));
}

#[tokio::test]
async fn test_metabase_auth_failure_publishes_nothing() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/api/session");
        then.status(401).body("Password did not match stored password.");
    });
    let temp_dir = TempDir::new().unwrap();
    let output_path = temp_dir.path().join("out").to_str().unwrap().to_string();

    let config = config_for(&server, "sa.json");
    let source = MetabaseClient::new(&config.metabase, &config.question_id);
    let sink = CsvExport::new(LocalStorage::new(output_path));
    let engine = EtlEngine::new(LeadPipeline::new(source, sink, VaderScorer::new()));

    let result = engine.run(range()).await;

    let err = result.unwrap_err();
    assert!(matches!(err, EtlError::AuthError { .. }));
    assert_eq!(err.severity().exit_code(), 3);
    assert!(!temp_dir.path().join("out").exists());
}

#[tokio::test]
async fn test_missing_response_column_is_schema_error() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/api/session");
        then.status(200).json_body(json!({"id": "mb-session"}));
    });
    server.mock(|when, then| {
        when.method(POST).path("/api/card/77/query/json");
        then.status(200)
            .json_body(json!([{"customer_name": "Acme", "lead_type": "Inbound"}]));
    });
    let temp_dir = TempDir::new().unwrap();

    let config = config_for(&server, "sa.json");
    let source = MetabaseClient::new(&config.metabase, &config.question_id);
    let sink = CsvExport::new(LocalStorage::new(
        temp_dir.path().to_str().unwrap().to_string(),
    ));
    let engine = EtlEngine::new(LeadPipeline::new(source, sink, VaderScorer::new()));

    let err = engine.run(range()).await.unwrap_err();
    assert!(matches!(
        err,
        EtlError::SchemaError { ref field, .. } if field == "last_clinician_response"
    ));
    assert!(!temp_dir.path().join("raw_data.csv").exists());
}

#[test]
fn test_service_account_key_file_round_trip() {
    let mut key_file = NamedTempFile::new().unwrap();
    let content = json!({
        "type": "service_account",
        "project_id": "demo",
        "private_key_id": "abc123",
        "private_key": TEST_PRIVATE_KEY,
        "client_email": "reporter@demo.iam.gserviceaccount.com",
        "token_uri": "https://oauth2.googleapis.com/token"
    });
    key_file
        .write_all(content.to_string().as_bytes())
        .unwrap();

    let auth = ServiceAccountAuth::from_key_file(key_file.path()).unwrap();
    assert_eq!(auth.client_email(), "reporter@demo.iam.gserviceaccount.com");
    assert!(auth.assertion(chrono::Utc::now()).is_ok());
}
