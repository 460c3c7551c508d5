use crate::config::AppConfig;
use crate::domain::model::DateRange;
use crate::utils::error::Result;
use chrono::{DateTime, NaiveDate, Utc};
use clap::Parser;

#[derive(Debug, Clone, Parser)]
#[command(name = "lead-triage")]
#[command(about = "Classify lead responses from Metabase and publish pivots to Google Sheets")]
pub struct CliArgs {
    /// First day of the report window (YYYY-MM-DD)
    #[arg(requires = "end_date")]
    pub start_date: Option<NaiveDate>,

    /// Last day of the report window (YYYY-MM-DD)
    pub end_date: Option<NaiveDate>,

    /// Path to the JSON configuration file
    #[arg(short, long, default_value = "config.json")]
    pub config: String,

    /// Write the sheets as CSV files into this directory instead of Google Sheets
    #[arg(long)]
    pub output_dir: Option<String>,

    /// Validate configuration and show the plan without calling any service
    #[arg(long)]
    pub dry_run: bool,

    #[arg(short, long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Emit logs as JSON lines")]
    pub log_json: bool,
}

impl CliArgs {
    /// Explicit dates when both were given, otherwise the configured default window.
    pub fn date_range(&self, config: &AppConfig, now: DateTime<Utc>) -> Result<DateRange> {
        match (self.start_date, self.end_date) {
            (Some(start), Some(end)) => DateRange::new(start, end),
            _ => Ok(config.default_date_range(now)),
        }
    }
}
