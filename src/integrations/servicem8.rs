use async_trait::async_trait;
use reqwest::Client;

use super::{check_response, JobService};
use crate::config::AppConfig;
use crate::error::IntegrationError;
use crate::jobs::{JobContactPayload, JobPayload};

const SERVICE: &str = "ServiceM8";
const RECORD_UUID_HEADER: &str = "x-record-uuid";

// ─── Jobs ────────────────────────────────────────────────────────────────────

pub struct ServiceM8Client {
    client: Client,
    base_url: String,
    api_key: String,
}

impl ServiceM8Client {
    pub fn new(client: Client, config: &AppConfig) -> Self {
        Self {
            client,
            base_url: config.servicem8_base_url.trim_end_matches('/').to_string(),
            api_key: config.servicem8_api_key.clone(),
        }
    }
}

#[async_trait]
impl JobService for ServiceM8Client {
    async fn create_job(&self, job: &JobPayload) -> Result<String, IntegrationError> {
        let url = format!("{}/api_1.0/job.json", self.base_url);

        let result = self
            .client
            .post(&url)
            .header("X-Api-Key", &self.api_key)
            .json(job)
            .send()
            .await;

        let response = check_response(SERVICE, result).await?;

        let job_uuid = response
            .headers()
            .get(RECORD_UUID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .ok_or(IntegrationError::MissingRecordId { service: SERVICE })?;

        log::info!("Created ServiceM8 job {}", job_uuid);
        Ok(job_uuid)
    }

    async fn create_job_contact(
        &self,
        contact: &JobContactPayload,
    ) -> Result<(), IntegrationError> {
        let url = format!("{}/api_1.0/jobcontact.json", self.base_url);

        let result = self
            .client
            .post(&url)
            .header("X-Api-Key", &self.api_key)
            .json(contact)
            .send()
            .await;

        check_response(SERVICE, result).await?;
        log::info!("Created job contact for ServiceM8 job {}", contact.job_uuid);
        Ok(())
    }
}
