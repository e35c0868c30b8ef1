//! One job step per process invocation, the way the host scheduler drives
//! the job. State, input, and output locations come from the environment;
//! an optional operator request is applied before the step runs.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use et_engine::GaEngine;
use et_job::{ConfigurationRequest, JobResources, JobState, StepOutcome, TuningJob};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let state_path = PathBuf::from(required_env("EVOTUNE_STATE_PATH")?);
    let resources = JobResources {
        input: PathBuf::from(required_env("EVOTUNE_INPUT_PATH")?),
        output: PathBuf::from(required_env("EVOTUNE_OUTPUT_PATH")?),
    };

    let mut state = if state_path.exists() {
        let raw = std::fs::read_to_string(&state_path)
            .with_context(|| format!("reading {}", state_path.display()))?;
        JobState::from_json(&raw)?
    } else {
        JobState::new()
    };

    let job = TuningJob::new(Arc::new(GaEngine::new()));

    if let Ok(request_path) = std::env::var("EVOTUNE_REQUEST_PATH") {
        let raw = std::fs::read_to_string(&request_path)
            .with_context(|| format!("reading {request_path}"))?;
        let request: ConfigurationRequest = serde_json::from_str(&raw)?;
        match job.apply_request(&state, &request) {
            Ok(next) => state = next,
            Err(rejection) => warn!("Request rejected: {rejection}"),
        }
    }

    match job.run_step(state, &resources).await? {
        StepOutcome::AwaitingInput { state, view } => {
            std::fs::write(&state_path, state.to_json()?)
                .with_context(|| format!("writing {}", state_path.display()))?;
            println!("{}", serde_json::to_string_pretty(&view)?);
        }
        StepOutcome::Completed => {
            println!("Tuned classifier written to {}", resources.output.display());
        }
        StepOutcome::Failed { reason } => {
            anyhow::bail!("optimization failed to start: {reason}");
        }
    }

    Ok(())
}

fn required_env(name: &str) -> anyhow::Result<String> {
    std::env::var(name).with_context(|| format!("{name} must be set"))
}
