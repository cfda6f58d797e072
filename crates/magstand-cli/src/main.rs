// SPDX-License-Identifier: GPL-3.0-or-later
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use magstand_application::{scan_inbox, CalibreDb, FileOutcome, ImportService, MatchEngine};
use tracing::{debug, info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Command-line arguments for magstand
#[derive(Parser, Debug)]
#[command(name = "magstand")]
#[command(about = "Import magazine issues into a calibre library")]
#[command(version)]
struct Args {
    /// Configuration file for the importer
    #[arg(short, long, env = "MAGSTAND_CONFIG")]
    config: Option<PathBuf>,

    /// Log each configured magazine and every resolved match
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = magstand_config::load(args.config.as_deref())
        .context("failed to load configuration")?;
    init_tracing(args.verbose, &config.telemetry.log_level);

    info!(
        target: "cli",
        import_dir = %config.import.import_dir.display(),
        calibredb = %config.import.calibredb.display(),
        magazines = config.magazines.len(),
        "starting import run"
    );
    for magazine in &config.magazines {
        debug!(
            target: "cli",
            name = %magazine.name,
            pattern = %magazine.pattern,
            title = %magazine.title,
            publisher = %magazine.publisher,
            archive_dir = ?magazine.archive_dir,
            "configured magazine"
        );
    }

    let engine =
        MatchEngine::new(config.magazine_rules()).context("invalid magazine configuration")?;
    let catalog = CalibreDb::new(&config.import.calibredb, config.import.library_path.clone());
    let service = ImportService::new(catalog);

    let files = scan_inbox(&config.import.import_dir)?;
    let mut imported = 0usize;
    let mut skipped = 0usize;
    let mut failed = 0usize;

    for file in &files {
        let Some(filename) = file.file_name().and_then(|name| name.to_str()) else {
            warn!(target: "cli", file = %file.display(), "skipping file with a non-UTF-8 name");
            skipped += 1;
            continue;
        };
        let matches = engine.match_filename(filename);
        for issue in &matches.issues {
            debug!(
                target: "cli",
                file = filename,
                magazine = %issue.series,
                title = %issue.title,
                number = %issue.number,
                "resolved match"
            );
        }
        let report = service.process_file(file, &matches).await;
        match report.outcome {
            FileOutcome::Skipped => skipped += 1,
            FileOutcome::AllSucceeded => imported += 1,
            FileOutcome::PartiallyFailed => failed += 1,
        }
    }

    info!(
        target: "cli",
        files = files.len(),
        imported,
        skipped,
        failed,
        "import run finished"
    );
    if failed > 0 {
        anyhow::bail!("{} file(s) failed to import and remain in the inbox", failed);
    }
    Ok(())
}

fn init_tracing(verbose: bool, configured_level: &str) {
    let fmt_layer = fmt::layer().with_target(true).with_level(true);
    let default_filter = if verbose { "debug" } else { configured_level };
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}
