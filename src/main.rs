mod error;

use crate::error::{ErrorKind, Result};
use clap::Parser;
use exn::{OptionExt, ResultExt};
use spotcheck_config::Config;
use spotcheck_storage::backend::S3Backend;
use spotcheck_verify::run::validate_buckets;
use spotcheck_verify::{JsonFileStore, ResumeStore};
use std::path::PathBuf;
use std::process::ExitCode;
use time::UtcDateTime;
use tracing_subscriber::EnvFilter;

/// Check that backups are fresh, then download a random sample of them for
/// a manual spot-check.
#[derive(Parser, Debug)]
#[command(name = "spotcheck", version, about, long_about = None)]
struct Cli {
    /// Configuration file (TOML, YAML or JSON); defaults to the user config directory
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Discard any saved download plan and sample again
    #[arg(long)]
    fresh: bool,

    /// Only check backup freshness; don't sample or download anything
    #[arg(long, conflicts_with = "fresh")]
    validate_only: bool,
}

fn init_logging(verbose: bool) {
    let fallback = if verbose { "info,spotcheck=debug,spotcheck_verify=debug,spotcheck_storage=debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(verbose).init();
}

async fn execute(cli: &Cli) -> Result<()> {
    let config = Config::load(cli.config.as_deref()).or_raise(|| ErrorKind::Config)?;
    let settings = config.store.as_ref().ok_or_raise(|| ErrorKind::NoStore)?;
    let store = S3Backend::new(
        "s3",
        &settings.region,
        settings.endpoint.as_deref(),
        &settings.key_id,
        &settings.key_secret,
    )
    .await
    .or_raise(|| ErrorKind::Store)?;
    let now = UtcDateTime::now();

    if cli.validate_only {
        return validate_buckets(&store, &config, now).await.or_raise(|| ErrorKind::Validation);
    }

    let resume = JsonFileStore::new(config.resume_path());
    if cli.fresh {
        tracing::info!(path = %resume.path().display(), "Discarding saved download plan");
        resume.delete().await.or_raise(|| ErrorKind::Reset)?;
    }
    let summary = spotcheck_verify::run(&store, &config, &resume, now).await.or_raise(|| ErrorKind::Download)?;
    tracing::info!(
        buckets = summary.buckets,
        downloaded = summary.downloaded,
        skipped = summary.skipped,
        root = %config.download_root.display(),
        "Sample ready for spot-checking"
    );
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    match execute(&cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:?}");
            ExitCode::FAILURE
        },
    }
}
