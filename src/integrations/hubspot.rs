use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;

use super::{check_response, DealContact, DealDetails, DealLookup, ObjectProperties};
use crate::config::AppConfig;
use crate::error::IntegrationError;

const SERVICE: &str = "HubSpot";
const CONTACT_PROPERTIES: &str = "firstname,lastname,phone,email";

// ─── Wire types ──────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct HubSpotDeal {
    id: String,
    #[serde(default)]
    associations: Option<HubSpotAssociations>,
}

#[derive(Debug, Deserialize)]
struct HubSpotAssociations {
    contacts: Option<AssociationList>,
}

#[derive(Debug, Deserialize)]
struct AssociationList {
    #[serde(default)]
    results: Vec<AssociationRef>,
}

#[derive(Debug, Deserialize)]
struct AssociationRef {
    id: String,
}

#[derive(Debug, Deserialize)]
struct HubSpotContact {
    #[serde(default)]
    properties: DealContact,
}

#[derive(Debug, Deserialize)]
struct BatchReadResponse {
    #[serde(default)]
    results: Vec<ObjectProperties>,
}

// ─── Client ──────────────────────────────────────────────────────────────────

pub struct HubSpotClient {
    client: Client,
    base_url: String,
    api_token: String,
    job_id_property: String,
}

impl HubSpotClient {
    pub fn new(client: Client, config: &AppConfig) -> Self {
        Self {
            client,
            base_url: config.hubspot_base_url.trim_end_matches('/').to_string(),
            api_token: config.hubspot_api_token.clone(),
            job_id_property: config.job_id_property.clone(),
        }
    }

    /// `{base}/crm/v3/objects/...` with every segment percent-encoded.
    fn object_url(&self, segments: &[&str]) -> Result<Url, IntegrationError> {
        let invalid = || IntegrationError::InvalidUrl {
            service: SERVICE,
            url: self.base_url.clone(),
        };

        let mut url = Url::parse(&self.base_url).map_err(|_| invalid())?;
        url.path_segments_mut()
            .map_err(|_| invalid())?
            .pop_if_empty()
            .extend(["crm", "v3", "objects"])
            .extend(segments);
        Ok(url)
    }

    async fn get_contact(&self, contact_id: &str) -> Result<DealContact, IntegrationError> {
        let url = self.object_url(&["contacts", contact_id])?;

        let result = self
            .client
            .get(url)
            .bearer_auth(&self.api_token)
            .query(&[("properties", CONTACT_PROPERTIES)])
            .send()
            .await;

        let contact: HubSpotContact = check_response(SERVICE, result)
            .await?
            .json()
            .await
            .map_err(|source| IntegrationError::Decode { service: SERVICE, source })?;

        Ok(contact.properties)
    }
}

// ─── Deal lookup ─────────────────────────────────────────────────────────────

#[async_trait]
impl DealLookup for HubSpotClient {
    async fn get_deal_details_with_associations(
        &self,
        deal_id: &str,
    ) -> Result<Option<DealDetails>, IntegrationError> {
        let url = self.object_url(&["deals", deal_id])?;

        let response = self
            .client
            .get(url)
            .bearer_auth(&self.api_token)
            .query(&[("associations", "contacts")])
            .send()
            .await
            .map_err(|source| IntegrationError::Transport { service: SERVICE, source })?;

        if response.status() == StatusCode::NOT_FOUND {
            log::warn!("HubSpot deal {} not found", deal_id);
            return Ok(None);
        }

        let deal: HubSpotDeal = check_response(SERVICE, Ok(response))
            .await?
            .json()
            .await
            .map_err(|source| IntegrationError::Decode { service: SERVICE, source })?;

        let contact_id = deal
            .associations
            .and_then(|a| a.contacts)
            .and_then(|c| c.results.into_iter().next())
            .map(|r| r.id);

        let contact = match contact_id {
            Some(id) => self.get_contact(&id).await?,
            None => {
                log::warn!("HubSpot deal {} has no associated contact", deal.id);
                DealContact::default()
            }
        };

        Ok(Some(DealDetails {
            deal_id: deal.id,
            contact,
        }))
    }

    async fn get_objects_properties(
        &self,
        object_type: &str,
        ids: &[&str],
        property_names: &[&str],
    ) -> Result<Vec<ObjectProperties>, IntegrationError> {
        let url = self.object_url(&[object_type, "batch", "read"])?;

        let body = serde_json::json!({
            "properties": property_names,
            "inputs": ids.iter().map(|id| serde_json::json!({ "id": id })).collect::<Vec<_>>(),
        });

        let result = self
            .client
            .post(url)
            .bearer_auth(&self.api_token)
            .json(&body)
            .send()
            .await;

        let batch: BatchReadResponse = check_response(SERVICE, result)
            .await?
            .json()
            .await
            .map_err(|source| IntegrationError::Decode { service: SERVICE, source })?;

        Ok(batch.results)
    }

    async fn update_deal_job_id(
        &self,
        deal_id: &str,
        job_uuid: &str,
    ) -> Result<(), IntegrationError> {
        let url = self.object_url(&["deals", deal_id])?;

        let mut properties = serde_json::Map::new();
        properties.insert(self.job_id_property.clone(), job_uuid.into());
        let body = serde_json::json!({ "properties": properties });

        let result = self
            .client
            .patch(url)
            .bearer_auth(&self.api_token)
            .json(&body)
            .send()
            .await;

        check_response(SERVICE, result).await?;
        log::info!(
            "Updated HubSpot deal {} with {}: {}",
            deal_id,
            self.job_id_property,
            job_uuid
        );
        Ok(())
    }
}
