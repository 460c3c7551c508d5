use chrono::Utc;
use clap::Parser;
use lead_triage::core::etl::RunSummary;
use lead_triage::core::Pipeline;
use lead_triage::domain::model::DateRange;
use lead_triage::utils::{logger, validation::Validate};
use lead_triage::{
    AppConfig, CliArgs, CsvExport, EtlEngine, EtlError, GoogleSheetsClient, LeadPipeline,
    LocalStorage, MetabaseClient, ServiceAccountAuth, SheetsPublisher, VaderScorer,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    // 初始化日誌
    if args.log_json {
        logger::init_json_logger(args.verbose);
    } else {
        logger::init_cli_logger(args.verbose);
    }

    tracing::info!("Starting lead-triage");
    tracing::debug!("CLI args: {:?}", args);

    // 載入並驗證配置，失敗時不做任何網路呼叫
    let config = AppConfig::from_file(&args.config).unwrap_or_else(|e| exit_with(&e));
    if let Err(e) = config.validate() {
        exit_with(&e);
    }
    let range = args
        .date_range(&config, Utc::now())
        .unwrap_or_else(|e| exit_with(&e));

    if args.dry_run {
        display_plan(&config, &args, &range);
        return Ok(());
    }

    let source = MetabaseClient::new(&config.metabase, &config.question_id);
    let outcome = match &args.output_dir {
        Some(dir) => {
            tracing::info!("📁 Exporting CSV files to {}", dir);
            let sink = CsvExport::new(LocalStorage::new(dir.clone()));
            run(LeadPipeline::new(source, sink, VaderScorer::new()), range).await
        }
        None => {
            let auth = ServiceAccountAuth::from_key_file(&config.google_sheets.credentials_path)
                .unwrap_or_else(|e| exit_with(&e));
            tracing::debug!("Using service account {}", auth.client_email());
            let client = GoogleSheetsClient::new(auth, &config.google_sheets.spreadsheet_id);
            let sink = SheetsPublisher::new(client, config.google_sheets.primary_sheet.clone());
            run(LeadPipeline::new(source, sink, VaderScorer::new()), range).await
        }
    };

    match outcome {
        Ok(summary) => {
            tracing::info!(
                "✅ Run complete: {} rows, {} sheets written to {}",
                summary.rows,
                summary.publish.sheets_written,
                summary.publish.destination
            );
            println!(
                "✅ Workflow run complete: {} rows processed from {} to {}",
                summary.rows,
                summary.range.start_param(),
                summary.range.end_param()
            );
        }
        Err(e) => exit_with(&e),
    }

    Ok(())
}

async fn run<P: Pipeline>(pipeline: P, range: DateRange) -> lead_triage::Result<RunSummary> {
    EtlEngine::new(pipeline).run(range).await
}

fn exit_with(e: &EtlError) -> ! {
    tracing::error!(
        "❌ Lead triage failed: {} (Category: {:?}, Severity: {:?})",
        e,
        e.category(),
        e.severity()
    );
    tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

    eprintln!("❌ {}", e.user_friendly_message());
    eprintln!("💡 {}", e.recovery_suggestion());

    std::process::exit(e.severity().exit_code());
}

fn display_plan(config: &AppConfig, args: &CliArgs, range: &DateRange) {
    println!("📋 Run Plan (dry run):");
    println!("  Date range: {}", range);
    println!(
        "  Source: {}/api/card/{}",
        config.metabase.url.trim_end_matches('/'),
        config.question_id
    );
    match &args.output_dir {
        Some(dir) => println!("  Destination: CSV files in {}", dir),
        None => {
            println!("  Destination: spreadsheet {}", config.google_sheets.spreadsheet_id);
            println!(
                "  Primary sheet: {}",
                config
                    .google_sheets
                    .primary_sheet
                    .as_deref()
                    .unwrap_or("(first sheet)")
            );
        }
    }
    println!("  Pivots:");
    for spec in lead_triage::domain::services::default_groupings() {
        println!("    {} <- {}", spec.title, spec.fields.join(" x "));
    }
    println!();
    println!("✅ Configuration is valid. No services were called.");
}
