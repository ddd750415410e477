use std::process::ExitCode;

use futures::StreamExt as _;
use futures::stream::FuturesUnordered;
use groq_client::config::API_KEY_ENV;
use groq_client::{GroqClient, GroqClientConfig};
use groq_stress::{LoadTestResult, Settings, StressError, init_observability, run_load_test, suite};
use tracing::{error, info};

#[tokio::main]
async fn main() -> ExitCode {
    let settings = Settings::load();
    let _log_guard = match init_observability(&settings.log) {
        Ok(guard) => guard,
        Err(err) => {
            eprintln!("error: {err}");
            return ExitCode::FAILURE;
        }
    };

    match run(settings).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, "stress run failed");
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

async fn run(settings: Settings) -> Result<(), StressError> {
    let api_key = std::env::var(API_KEY_ENV).unwrap_or_default();
    if api_key.trim().is_empty() {
        return Err(StressError::Config(format!("{API_KEY_ENV} is not set")));
    }
    let client = GroqClient::new(
        GroqClientConfig::new(api_key)
            .base_url(settings.base_url.clone())
            .timeout(settings.timeout),
    )?;
    let configs = suite(&client, &settings)?;
    info!(
        tests = configs.len(),
        rate = settings.rate,
        duration_ms = settings.duration.as_millis() as u64,
        "starting stress run"
    );

    let mut pending: FuturesUnordered<_> = configs.iter().map(run_load_test).collect();
    while let Some(result) = pending.next().await {
        report(&result, settings.json)?;
    }
    Ok(())
}

fn report(result: &LoadTestResult, json: bool) -> Result<(), StressError> {
    if json {
        let line = serde_json::to_string(result)
            .map_err(|e| StressError::Output(format!("failed to encode result: {e}")))?;
        println!("{line}");
    } else {
        println!("{result}\n");
    }
    Ok(())
}
