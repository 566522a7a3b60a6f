use anyhow::{Context, Result};
use clap::Parser;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

use leadcleaner::cli::Cli;
use leadcleaner::config::{self, AppConfig};
use leadcleaner::detector::ColumnMapping;
use leadcleaner::dns::{MxCache, MxResolver};
use leadcleaner::export::{write_export, ExportOptions};
use leadcleaner::ingest::read_csv_file;
use leadcleaner::logger::{self, ConsoleProgress, VerbosityLevel};
use leadcleaner::task::{CsvProcessor, TaskStore};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let verbosity = VerbosityLevel::from_verbose_count(cli.verbose);
    logger::init_tracing(verbosity);

    // Handle --init flag first (before any other processing)
    if cli.init {
        let path = cli.config.as_deref().unwrap_or(Path::new(config::CONFIG_PATH));
        match AppConfig::create_default_config_at(path) {
            Ok(path) => {
                println!("✅ Created default configuration file at: {}", path.display());
                println!("   Edit this file to customize settings, then run leadcleaner again.");
                return Ok(());
            }
            Err(e) => {
                eprintln!("❌ Failed to create configuration file: {}", e);
                std::process::exit(1);
            }
        }
    }

    let app_config = match load_config(&cli) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("❌ Configuration error: {:#}", e);
            std::process::exit(1);
        }
    };

    let resolver = if cli.no_mx {
        info!("MX lookups disabled");
        None
    } else {
        let resolver = MxResolver::from_config(&app_config, MxCache::new())
            .context("Failed to initialize MX resolver")?;
        Some(Arc::new(resolver))
    };

    let export_options = ExportOptions {
        long_name_flag: cli
            .flag_long_names
            .map(Into::into)
            .unwrap_or(app_config.export.long_name_flag),
        long_name_threshold: app_config.export.long_name_threshold,
    };

    let store = Arc::new(TaskStore::new());
    let processor = CsvProcessor::new(store.clone(), resolver).with_export_options(export_options);
    let explicit_mapping = cli.mapping();

    let mut failures = 0;
    let mut outputs = Vec::new();

    for path in &cli.files {
        match clean_file(&processor, path, &explicit_mapping, &cli.output_dir).await {
            Ok(Some((task_id, output))) => outputs.push((task_id, output)),
            Ok(None) => failures += 1,
            Err(e) => {
                eprintln!("❌ {}: {:#}", path.display(), e);
                failures += 1;
            }
        }
    }

    logger::print_task_summary(&store.list(), &outputs);

    if failures > 0 {
        eprintln!("❌ {} of {} files failed", failures, cli.files.len());
        std::process::exit(1);
    }

    println!("✅ Cleaned {} files.", cli.files.len());
    Ok(())
}

/// Explicit `--config` must exist; the default location falls back to the
/// embedded configuration.
fn load_config(cli: &Cli) -> Result<AppConfig> {
    if let Some(path) = &cli.config {
        return AppConfig::load_from_path(path)
            .with_context(|| format!("Failed to load {}", path.display()));
    }

    match AppConfig::load() {
        Ok(cfg) => Ok(cfg),
        Err(config::ConfigError::FileNotFound(path)) => {
            warn!(
                "Configuration file not found at {}; using built-in defaults (run with --init to create one)",
                path.display()
            );
            Ok(AppConfig::embedded_default()?)
        }
        Err(e) => Err(e.into()),
    }
}

/// Run one file through the processor and write its export.
///
/// Returns `Ok(None)` when the task ran but ended in `error`.
async fn clean_file(
    processor: &CsvProcessor,
    path: &Path,
    explicit_mapping: &ColumnMapping,
    output_dir: &Path,
) -> Result<Option<(String, String)>> {
    let (filename, content) = read_csv_file(path)?;
    let task_id = processor
        .add_task(&filename, content)
        .with_context(|| format!("Invalid CSV file: {}", filename))?;

    let task = processor
        .store()
        .get(&task_id)
        .context("Task disappeared after creation")?;
    let mapping = explicit_mapping
        .clone()
        .or_suggested(&task.original_headers, task.shape);
    info!("{}: detected {} with mapping {:?}", filename, task.shape, mapping);

    let progress = ConsoleProgress::new(&filename);
    if processor.process(&task_id, mapping, &progress).await.is_err() {
        return Ok(None);
    }

    let export = processor.export(&task_id)?;
    let written = write_export(&export, output_dir)?;

    Ok(Some((task_id, written.display().to_string())))
}
