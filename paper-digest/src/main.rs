use clap::Parser;
use paper_digest::{invoke, Settings};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env file is fine; the process environment still applies.
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let settings = Settings::parse();
    info!("Starting paper digest{}", if settings.dry_run { " (dry run)" } else { "" });

    let outcome = invoke(&settings).await;
    if !outcome.is_success() {
        error!("Run failed with status {}: {}", outcome.status_code, outcome.body);
        anyhow::bail!("{}", outcome.body);
    }

    info!("{}", outcome.body);
    Ok(())
}
