pub mod config;
pub mod error;
pub mod integrations;
pub mod jobs;

use anyhow::Context;
use std::io::Read;

use config::AppConfig;
use integrations::{hubspot::HubSpotClient, servicem8::ServiceM8Client};
use jobs::orchestrator::{JobCreator, JobOutcome};
use jobs::Event;

/// Handles a single deal event read from the file named by the first
/// argument, or from stdin when no argument is given.
pub async fn run() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let app_config = AppConfig::load().context("invalid configuration")?;

    let raw = match std::env::args().nth(1) {
        Some(path) => std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read event from {}", path))?,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("failed to read event from stdin")?;
            buf
        }
    };
    let event: Event = serde_json::from_str(&raw).context("event is not valid JSON")?;

    let http = integrations::http_client(app_config.request_timeout())
        .context("failed to build HTTP client")?;

    let creator = JobCreator::new(
        HubSpotClient::new(http.clone(), &app_config),
        ServiceM8Client::new(http, &app_config),
        app_config.stage_gate.clone(),
        app_config.include_job_address,
    );

    match creator.handle_create_job(&event).await {
        JobOutcome::Created { job_uuid, .. } => log::info!("Job {} created", job_uuid),
        JobOutcome::Skipped(reason) => log::info!("No job created: {:?}", reason),
        JobOutcome::JobNotCreated(e) => log::warn!("No job created: {}", e),
    }

    Ok(())
}
