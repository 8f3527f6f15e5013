//! Wiring & DI. Entry point: parse flags, bootstrap adapters, inject into the analysis service.
//! No business logic here.

use chat_insight::adapters::ai::{MockAdapter, build_providers, build_verified_providers};
use chat_insight::adapters::export::ExportFile;
use chat_insight::adapters::persistence::ReportJson;
use chat_insight::adapters::ui::ProgressReporter;
use chat_insight::domain::DomainError;
use chat_insight::ports::{AnalysisProvider, ResultStorePort};
use chat_insight::shared::config::AppConfig;
use chat_insight::usecases::{AnalysisService, DispatchMode};
use clap::Parser;
use dotenv::dotenv;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Analyze chat exports with LLM providers and write a relationship report.
#[derive(Debug, Parser)]
#[command(name = "chat-insight", version, about)]
struct Cli {
    /// Chat export JSON files, in upload order.
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Report path (default: ./analysis.json).
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Send every chunk to all configured providers and merge the replies.
    #[arg(long)]
    fan_out: bool,

    /// Merge all files into one chat before analyzing.
    #[arg(long)]
    combine: bool,

    /// Skip files that fail instead of aborting the batch.
    #[arg(long)]
    continue_on_error: bool,

    /// Check every API key against its provider before analyzing.
    #[arg(long)]
    verify_keys: bool,

    /// Use demo output instead of calling any provider.
    #[arg(long)]
    demo: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env_loaded = dotenv();
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    match &env_loaded {
        Ok(path) => info!(path = %path.display(), "loaded .env"),
        Err(_) => info!("no .env found"),
    }

    let cli = Cli::parse();
    let cfg = AppConfig::load()
        .map_err(|e| anyhow::anyhow!("{}", DomainError::Config(e.to_string())))?;

    let mut options = cfg.analysis_options();
    if cli.fan_out {
        options.dispatch_mode = DispatchMode::FanOut;
    }
    options.combine_files |= cli.combine;
    options.continue_on_file_error |= cli.continue_on_error;

    // --- Providers (demo fallback is a caller policy, never inside the pipeline) ---
    let providers: Vec<Arc<dyn AnalysisProvider>> = if cli.demo {
        info!("demo mode, using mock provider");
        vec![Arc::new(MockAdapter::new())]
    } else {
        let creds = cfg.credentials();
        let built = if cli.verify_keys || cfg.verify_keys_or_default() {
            build_verified_providers(&creds).await
        } else {
            build_providers(&creds)
        };
        match built {
            Ok(providers) => providers,
            Err(DomainError::NoProviderConfigured) if cfg.demo_fallback_or_default() => {
                warn!("no usable API key configured, falling back to demo output");
                vec![Arc::new(MockAdapter::new())]
            }
            Err(e) => return Err(anyhow::anyhow!("{}", e)),
        }
    };

    let service = AnalysisService::new(providers, options).map_err(|e| anyhow::anyhow!("{}", e))?;
    info!(providers = ?service.gateway().provider_names(), "analysis service ready");

    // --- Inputs ---
    let mut files = Vec::with_capacity(cli.files.len());
    for path in &cli.files {
        files.push(ExportFile::read(path).await.map_err(|e| anyhow::anyhow!("{}", e))?);
    }

    // --- Run ---
    let progress = ProgressReporter::new();
    let on_progress = |percent: u8, status: &str| progress.update(percent, status);
    let report = match service.analyze_exports(&files, Some(&on_progress)).await {
        Ok(report) => {
            progress.finish("done");
            report
        }
        Err(e) => {
            progress.abandon("failed");
            return Err(anyhow::anyhow!("analysis failed: {}", e));
        }
    };

    // --- Persist ---
    let output = cli
        .output
        .unwrap_or_else(|| PathBuf::from(cfg.output_path_or_default()));
    let store = ReportJson::new(&output);
    info!(path = %store.path().display(), "saving report");
    let path = store
        .save_report(&report)
        .await
        .map_err(|e| anyhow::anyhow!("{}", e))?;

    for (category, score) in &report.category_scores {
        println!("{:<14} {:>3}", category, score);
    }
    println!("Report written to {}", path.display());

    Ok(())
}
