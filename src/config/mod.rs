#[cfg(feature = "cli")]
pub mod cli;

use crate::domain::model::DateRange;
use crate::utils::error::{EtlError, Result};
use crate::utils::validation::{self, Validate};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde_json::Value;
use std::fmt;
use std::path::Path;

pub const DEFAULT_TIMEZONE: &str = "America/Mexico_City";
pub const DEFAULT_LOOKBACK_DAYS: u32 = 7;
const MAX_LOOKBACK_DAYS: u32 = 366;

#[derive(Clone)]
pub struct MetabaseSettings {
    pub url: String,
    pub username: String,
    pub password: String,
}

impl fmt::Debug for MetabaseSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetabaseSettings")
            .field("url", &self.url)
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct SheetsSettings {
    pub credentials_path: String,
    pub spreadsheet_id: String,
    /// Sheet that receives the raw rows; the first tab when unset.
    pub primary_sheet: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ReportSettings {
    pub timezone: Tz,
    pub lookback_days: u32,
}

impl Default for ReportSettings {
    fn default() -> Self {
        Self {
            timezone: chrono_tz::America::Mexico_City,
            lookback_days: DEFAULT_LOOKBACK_DAYS,
        }
    }
}

/// Settings loaded from the JSON configuration document.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub metabase: MetabaseSettings,
    pub question_id: String,
    pub google_sheets: SheetsSettings,
    pub report: ReportSettings,
}

impl AppConfig {
    /// 從 JSON 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(EtlError::IoError)?;
        Self::from_json_str(&content)
    }

    /// 從 JSON 字串解析配置
    pub fn from_json_str(content: &str) -> Result<Self> {
        let processed_content = substitute_env_vars(content);

        let root: Value =
            serde_json::from_str(&processed_content).map_err(|e| EtlError::ConfigValidationError {
                field: "json_parsing".to_string(),
                message: format!("JSON parsing error: {}", e),
            })?;

        let report = ReportSettings {
            timezone: match optional_str(&root, "report.timezone")? {
                Some(name) => parse_timezone("report.timezone", &name)?,
                None => ReportSettings::default().timezone,
            },
            lookback_days: optional_u32(&root, "report.lookback_days")?
                .unwrap_or(DEFAULT_LOOKBACK_DAYS),
        };

        Ok(Self {
            metabase: MetabaseSettings {
                url: require_str(&root, "metabase.url")?,
                username: require_str(&root, "metabase.username")?,
                password: require_str(&root, "metabase.password")?,
            },
            question_id: require_id(&root, "metabase_question_id")?,
            google_sheets: SheetsSettings {
                credentials_path: require_str(&root, "google_sheets.credentials_path")?,
                spreadsheet_id: require_str(&root, "google_sheets.spreadsheet_id")?,
                primary_sheet: optional_str(&root, "google_sheets.primary_sheet")?,
            },
            report,
        })
    }

    /// The window used when no dates are given: `lookback_days` back from
    /// today in the report timezone.
    pub fn default_date_range(&self, now: DateTime<Utc>) -> DateRange {
        let today = now.with_timezone(&self.report.timezone).date_naive();
        DateRange::ending_on(today, self.report.lookback_days)
    }
}

impl Validate for AppConfig {
    fn validate(&self) -> Result<()> {
        validation::validate_url("metabase.url", &self.metabase.url)?;
        validation::validate_non_empty_string("metabase.username", &self.metabase.username)?;
        validation::validate_non_empty_string("metabase.password", &self.metabase.password)?;
        validation::validate_non_empty_string("metabase_question_id", &self.question_id)?;

        validation::validate_path(
            "google_sheets.credentials_path",
            &self.google_sheets.credentials_path,
        )?;
        validation::validate_file_extension(
            "google_sheets.credentials_path",
            &self.google_sheets.credentials_path,
            &["json"],
        )?;
        validation::validate_non_empty_string(
            "google_sheets.spreadsheet_id",
            &self.google_sheets.spreadsheet_id,
        )?;
        if let Some(sheet) = &self.google_sheets.primary_sheet {
            validation::validate_non_empty_string("google_sheets.primary_sheet", sheet)?;
        }

        validation::validate_range(
            "report.lookback_days",
            self.report.lookback_days,
            0,
            MAX_LOOKBACK_DAYS,
        )?;

        tracing::debug!("Configuration validation passed");
        Ok(())
    }
}

/// 替換環境變數 (例如 ${METABASE_PASSWORD})，未設定的保留原樣
fn substitute_env_vars(content: &str) -> String {
    use regex::Regex;
    use std::sync::LazyLock;

    static ENV_VAR: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"\$\{([^}]+)\}").expect("env var pattern is valid"));

    ENV_VAR
        .replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            match std::env::var(var_name) {
                // 值會被嵌入 JSON 字串中，需跳脫
                Ok(value) => escape_json_fragment(&value),
                Err(_) => format!("${{{}}}", var_name),
            }
        })
        .into_owned()
}

fn escape_json_fragment(value: &str) -> String {
    let quoted = Value::String(value.to_string()).to_string();
    quoted[1..quoted.len() - 1].to_string()
}

fn lookup<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.')
        .try_fold(root, |node, key| node.get(key))
        .filter(|v| !v.is_null())
}

fn require_str(root: &Value, path: &str) -> Result<String> {
    optional_str(root, path)?.ok_or_else(|| EtlError::MissingConfigError {
        field: path.to_string(),
    })
}

fn optional_str(root: &Value, path: &str) -> Result<Option<String>> {
    match lookup(root, path) {
        None => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(other) => Err(EtlError::InvalidConfigValueError {
            field: path.to_string(),
            value: other.to_string(),
            reason: "expected a string".to_string(),
        }),
    }
}

fn optional_u32(root: &Value, path: &str) -> Result<Option<u32>> {
    match lookup(root, path) {
        None => Ok(None),
        Some(value) => value
            .as_u64()
            .and_then(|n| u32::try_from(n).ok())
            .map(Some)
            .ok_or_else(|| EtlError::InvalidConfigValueError {
                field: path.to_string(),
                value: value.to_string(),
                reason: "expected a non-negative integer".to_string(),
            }),
    }
}

/// Metabase card ids show up both as numbers and as strings.
fn require_id(root: &Value, path: &str) -> Result<String> {
    match lookup(root, path) {
        None => Err(EtlError::MissingConfigError {
            field: path.to_string(),
        }),
        Some(Value::String(s)) => Ok(s.clone()),
        Some(Value::Number(n)) if n.is_u64() => Ok(n.to_string()),
        Some(other) => Err(EtlError::InvalidConfigValueError {
            field: path.to_string(),
            value: other.to_string(),
            reason: "expected a question id".to_string(),
        }),
    }
}

fn parse_timezone(field: &str, name: &str) -> Result<Tz> {
    name.parse::<Tz>()
        .map_err(|e| EtlError::InvalidConfigValueError {
            field: field.to_string(),
            value: name.to_string(),
            reason: format!("unknown timezone: {}", e),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone};
    use std::io::Write;
    use tempfile::NamedTempFile;

    const FULL_CONFIG: &str = r#"
{
  "metabase": {
    "url": "https://metabase.example.com/",
    "username": "ops@example.com",
    "password": "secret"
  },
  "metabase_question_id": 1234,
  "google_sheets": {
    "credentials_path": "service-account.json",
    "spreadsheet_id": "1AbCdEf"
  }
}
"#;

    #[test]
    fn test_parse_basic_json_config() {
        let config = AppConfig::from_json_str(FULL_CONFIG).unwrap();

        assert_eq!(config.metabase.url, "https://metabase.example.com/");
        assert_eq!(config.question_id, "1234");
        assert_eq!(config.google_sheets.spreadsheet_id, "1AbCdEf");
        assert_eq!(config.google_sheets.primary_sheet, None);
        assert_eq!(config.report.timezone, chrono_tz::America::Mexico_City);
        assert_eq!(config.report.lookback_days, 7);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_key_names_the_field() {
        let content = r#"{
            "metabase": {"url": "https://mb.example.com", "username": "u"},
            "metabase_question_id": "12",
            "google_sheets": {"credentials_path": "sa.json", "spreadsheet_id": "x"}
        }"#;

        let err = AppConfig::from_json_str(content).unwrap_err();
        assert!(matches!(
            err,
            EtlError::MissingConfigError { ref field } if field == "metabase.password"
        ));
    }

    #[test]
    fn test_missing_section() {
        let err = AppConfig::from_json_str(r#"{"metabase_question_id": 1}"#).unwrap_err();
        assert!(matches!(err, EtlError::MissingConfigError { .. }));
    }

    #[test]
    fn test_invalid_json() {
        let err = AppConfig::from_json_str("{ not json").unwrap_err();
        assert!(matches!(err, EtlError::ConfigValidationError { .. }));
    }

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("LEAD_TRIAGE_TEST_PASSWORD", "pa\"ss");

        let content = FULL_CONFIG.replace("\"secret\"", "\"${LEAD_TRIAGE_TEST_PASSWORD}\"");
        let config = AppConfig::from_json_str(&content).unwrap();
        assert_eq!(config.metabase.password, "pa\"ss");

        std::env::remove_var("LEAD_TRIAGE_TEST_PASSWORD");
    }

    #[test]
    fn test_unset_env_var_is_left_as_is() {
        let content = FULL_CONFIG.replace("\"secret\"", "\"${LEAD_TRIAGE_UNSET_VAR}\"");
        let config = AppConfig::from_json_str(&content).unwrap();
        assert_eq!(config.metabase.password, "${LEAD_TRIAGE_UNSET_VAR}");
    }

    #[test]
    fn test_report_settings() {
        let content = FULL_CONFIG.replacen(
            "\"metabase_question_id\"",
            r#""report": {"timezone": "UTC", "lookback_days": 14}, "metabase_question_id""#,
            1,
        );
        let config = AppConfig::from_json_str(&content).unwrap();
        assert_eq!(config.report.timezone, chrono_tz::UTC);
        assert_eq!(config.report.lookback_days, 14);

        let bad = FULL_CONFIG.replacen(
            "\"metabase_question_id\"",
            r#""report": {"timezone": "Mars/Olympus"}, "metabase_question_id""#,
            1,
        );
        assert!(matches!(
            AppConfig::from_json_str(&bad),
            Err(EtlError::InvalidConfigValueError { .. })
        ));
    }

    #[test]
    fn test_config_validation() {
        let content = FULL_CONFIG.replace("https://metabase.example.com/", "not-a-url");
        let config = AppConfig::from_json_str(&content).unwrap();
        assert!(config.validate().is_err());

        let content = FULL_CONFIG.replace("service-account.json", "service-account.p12");
        let config = AppConfig::from_json_str(&content).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_default_date_range_uses_report_timezone() {
        let config = AppConfig::from_json_str(FULL_CONFIG).unwrap();

        // 03:00 UTC 在墨西哥城仍是前一天
        let now = Utc.with_ymd_and_hms(2024, 5, 9, 3, 0, 0).unwrap();
        let range = config.default_date_range(now);

        assert_eq!(range.end, NaiveDate::from_ymd_opt(2024, 5, 8).unwrap());
        assert_eq!(range.start, NaiveDate::from_ymd_opt(2024, 5, 1).unwrap());
    }

    #[test]
    fn test_debug_hides_password() {
        let config = AppConfig::from_json_str(FULL_CONFIG).unwrap();
        let debug = format!("{:?}", config);
        assert!(!debug.contains("secret"));
    }

    #[test]
    fn test_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(FULL_CONFIG.as_bytes()).unwrap();

        let config = AppConfig::from_file(temp_file.path()).unwrap();
        assert_eq!(config.metabase.username, "ops@example.com");
    }
}
