pub mod hubspot;
pub mod servicem8;

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use crate::error::IntegrationError;
use crate::jobs::{JobContactPayload, JobPayload};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DealContact {
    pub firstname: Option<String>,
    pub lastname: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DealDetails {
    pub deal_id: String,
    pub contact: DealContact,
}

/// One record from a batch property read.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObjectProperties {
    pub id: String,
    #[serde(default)]
    pub properties: HashMap<String, Option<String>>,
}

impl ObjectProperties {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.properties.get(name).and_then(|v| v.as_deref())
    }
}

/// CRM side: deal lookup and write-back.
#[async_trait]
pub trait DealLookup: Send + Sync {
    /// `Ok(None)` when the deal does not exist.
    async fn get_deal_details_with_associations(
        &self,
        deal_id: &str,
    ) -> Result<Option<DealDetails>, IntegrationError>;

    async fn get_objects_properties(
        &self,
        object_type: &str,
        ids: &[&str],
        property_names: &[&str],
    ) -> Result<Vec<ObjectProperties>, IntegrationError>;

    async fn update_deal_job_id(&self, deal_id: &str, job_uuid: &str)
        -> Result<(), IntegrationError>;
}

/// Field-service side: job and job contact creation.
#[async_trait]
pub trait JobService: Send + Sync {
    /// Returns the new job's uuid.
    async fn create_job(&self, job: &JobPayload) -> Result<String, IntegrationError>;

    async fn create_job_contact(&self, contact: &JobContactPayload)
        -> Result<(), IntegrationError>;
}

/// Shared HTTP client with an explicit per-request timeout.
pub fn http_client(timeout: Duration) -> Result<Client, reqwest::Error> {
    Client::builder()
        .timeout(timeout)
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
        .build()
}

/// Maps transport failures and non-2xx responses to [`IntegrationError`].
pub(crate) async fn check_response(
    service: &'static str,
    result: Result<Response, reqwest::Error>,
) -> Result<Response, IntegrationError> {
    let response = result.map_err(|source| IntegrationError::Transport { service, source })?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(IntegrationError::Status {
            service,
            status,
            body,
        });
    }

    Ok(response)
}
