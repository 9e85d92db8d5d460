use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use neuron_simulator::services::llm::{ClientConfig, LLMService};
use neuron_simulator::{NeuronSimulator, SimulatorConfig};

/// One line of stdin.
#[derive(Deserialize)]
struct SimulationJob {
    explanation: String,
    tokens: Vec<String>,
    #[serde(default)]
    config: Option<SimulatorConfig>,
}

async fn run_job(service: &Arc<LLMService>, line: &str, default_config: &SimulatorConfig) -> Result<String> {
    let job: SimulationJob = serde_json::from_str(line).context("invalid job line")?;
    let config = job.config.as_ref().unwrap_or(default_config);

    let simulator = NeuronSimulator::from_config(Arc::clone(service), job.explanation, config)
        .context("failed to build simulator")?;
    let simulation = simulator.simulate(&job.tokens).await.context("simulation failed")?;
    serde_json::to_string(&simulation).context("failed to encode simulation")
}

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Logging
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("setting default subscriber failed")?;

    // 2. Config: optional JSON file as first argument, client from env
    let default_config = match std::env::args().nth(1) {
        Some(path) => {
            let raw = std::fs::read_to_string(&path).with_context(|| format!("reading {path}"))?;
            serde_json::from_str(&raw).with_context(|| format!("parsing {path}"))?
        }
        None => SimulatorConfig::default(),
    };
    let client_config = ClientConfig::from_env();
    tracing::info!(
        "Simulator ready: {} via {} ({})",
        default_config.simulation_type,
        client_config.base_url,
        client_config.model
    );
    let service = Arc::new(LLMService::new(client_config));

    // 3. One job per stdin line, one simulation per stdout line
    let reader = BufReader::new(tokio::io::stdin());
    let mut lines = reader.lines();
    let mut stdout = tokio::io::stdout();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        match run_job(&service, &line, &default_config).await {
            Ok(encoded) => {
                stdout.write_all(encoded.as_bytes()).await?;
                stdout.write_all(b"\n").await?;
                stdout.flush().await?;
            }
            Err(e) => tracing::error!("Job failed: {:#}", e),
        }
    }

    tracing::info!("Input closed, exiting.");
    Ok(())
}
