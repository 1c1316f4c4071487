use std::process::ExitCode;

use anyhow::Result;
use collector_service::{app, config::AppConfig, observability};

const USAGE: &str = "usage: solar_history [PERIOD] [GRANULARITY]   (defaults: 24h hour)";

/// Prints aggregated history for a period as JSON.
#[tokio::main]
async fn main() -> Result<ExitCode> {
    observability::init_tracing();

    let mut args = std::env::args().skip(1);
    let period = args.next().unwrap_or_else(|| "24h".to_string());
    let granularity = args.next().unwrap_or_else(|| "hour".to_string());
    if period == "-h" || period == "--help" {
        println!("{USAGE}");
        return Ok(ExitCode::SUCCESS);
    }

    let cfg = AppConfig::load()?;
    let engine = app::build_query_engine(&cfg).await?;

    match engine.query(&period, &granularity).await {
        Ok(result) => {
            println!("{}", serde_json::to_string_pretty(&result)?);
            Ok(ExitCode::SUCCESS)
        }
        Err(e) if e.is_invalid_parameters() => {
            eprintln!("{e}\n{USAGE}");
            Ok(ExitCode::from(2))
        }
        Err(e) => Err(e.into()),
    }
}
