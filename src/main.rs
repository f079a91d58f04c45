use std::path::Path;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use outreachbot::cli::Args;
use outreachbot::config::{AppConfig, ConfigError};
use outreachbot::discover::LeadDiscoverer;
use outreachbot::history::HistoryStore;
use outreachbot::pipeline::Pipeline;
use outreachbot::Lead;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Handle --init first, before any other processing
    if args.init {
        match AppConfig::create_default_config() {
            Ok(path) => {
                println!("✅ Created default configuration file at: {}", path.display());
                println!("   Edit this file to customize settings, then run outreachbot again.");
                std::process::exit(0);
            }
            Err(e) => {
                eprintln!("❌ Failed to create configuration file: {}", e);
                std::process::exit(1);
            }
        }
    }

    init_tracing(args.verbose);

    if let Err(e) = args.validate() {
        eprintln!("❌ {}", e);
        std::process::exit(1);
    }

    let config = match AppConfig::load() {
        Ok(cfg) => cfg,
        Err(ConfigError::FileNotFound(path)) => {
            eprintln!("❌ Configuration file not found at: {}", path.display());
            eprintln!("   Run with --init to create a default configuration file.");
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("❌ Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    let log_path = args
        .log_path
        .clone()
        .unwrap_or_else(|| config.pipeline.outreach_log_path.clone());
    let history_path = args
        .history_path
        .clone()
        .unwrap_or_else(|| config.pipeline.history_path.clone());

    if let Some(n) = args.recall_history {
        print_history(Path::new(&history_path), n);
        return Ok(());
    }

    let leads = gather_leads(&args, &config).await?;
    if leads.is_empty() {
        println!("No leads found; nothing to do.");
        return Ok(());
    }

    let pipeline = Pipeline::new(
        &config,
        args.dry_run,
        args.use_browser,
        Path::new(&log_path),
        Path::new(&history_path),
    )?;

    let summary = match &args.url_file {
        Some(file) => format!("{} leads from {}", leads.len(), file),
        None => format!(
            "{} leads for '{}' in '{}'",
            leads.len(),
            args.category.as_deref().unwrap_or_default(),
            args.city.as_deref().unwrap_or_default()
        ),
    };

    let stats = pipeline.run(&leads, &summary).await?;

    println!(
        "\nDone: {} leads processed, {} sent, {} skipped, {} fetch failures, {} without email, {} send failures",
        stats.total, stats.sent, stats.skipped, stats.fetch_failed, stats.no_email, stats.send_failed
    );
    if args.dry_run {
        println!("(dry run: no emails were actually sent)");
    }

    Ok(())
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("outreachbot={}", default_level)));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

async fn gather_leads(args: &Args, config: &AppConfig) -> Result<Vec<Lead>> {
    if let Some(file) = &args.url_file {
        let mut leads = LeadDiscoverer::load_leads_from_file(Path::new(file))?;
        leads.truncate(args.max);
        return Ok(leads);
    }

    let city = args.city.as_deref().unwrap_or_default();
    let discoverer = LeadDiscoverer::new(config)?;

    let mut leads: Vec<Lead> = Vec::new();
    for category in args.categories() {
        if leads.len() >= args.max {
            break;
        }
        let remaining = args.max - leads.len();
        let found = discoverer
            .discover(
                city,
                &category,
                remaining,
                args.filter_aggregators,
                args.use_maps,
            )
            .await;
        leads.extend(found);
    }

    leads.truncate(args.max);
    Ok(leads)
}

fn print_history(path: &Path, n: usize) {
    let store = HistoryStore::new(path);
    let runs = store.last_runs(n);

    if runs.is_empty() {
        println!("No run history at {}", path.display());
        return;
    }

    println!("Last {} run(s):", runs.len());
    for run in runs {
        println!("  {}  {}", run.timestamp, run.summary);
        if !run.details.is_null() {
            println!("      {}", run.details);
        }
    }
}
