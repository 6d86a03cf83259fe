use anyhow::Result;
use clap::Parser;
use oss2s3::config;
use oss2s3::core::Core;
use oss2s3::migrate::format_size;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "oss2s3")]
#[command(version, about = "Copy every object of an OSS bucket into an S3 bucket", long_about = None)]
struct Cli {
    /// Config file path (default: ./config.yaml, then environment)
    #[arg(long)]
    config: Option<String>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Objects copied concurrently
    #[arg(long)]
    workers: Option<usize>,

    /// Attempts per object before giving up on it
    #[arg(long)]
    max_attempts: Option<u32>,

    /// List the source and report its size without copying
    #[arg(long)]
    dry_run: bool,

    /// Disable SSL certificate verification
    #[arg(long)]
    insecure: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| cli.log_level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    // One object at a time by default; current_thread is enough even with workers > 1
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async_main(cli))
}

async fn async_main(cli: Cli) -> Result<()> {
    let mut config = config::load_config(cli.config.as_deref())?;

    config.apply_overrides(&config::Overrides {
        workers: cli.workers,
        max_attempts: cli.max_attempts,
        insecure_tls: cli.insecure,
    });
    config.validate()?;

    let driver = Core::new(&config)?.into_driver();

    if cli.dry_run {
        let listing = driver.survey().await?;
        info!(
            "dry run: {} object(s), {} in total",
            listing.objects,
            format_size(listing.bytes)
        );
        return Ok(());
    }

    driver.run().await?;
    Ok(())
}
