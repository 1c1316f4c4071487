use anyhow::Result;
use collector_service::{app, config::AppConfig, observability};

/// Runs a single collection tick and prints the stored reading as JSON.
#[tokio::main]
async fn main() -> Result<()> {
    observability::init_tracing();

    let cfg = AppConfig::load()?;
    let collector = app::build_collector(&cfg)?;

    let reading = collector.collect_once().await?;
    println!("{}", serde_json::to_string_pretty(&reading)?);

    Ok(())
}
