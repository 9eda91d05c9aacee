use chrono::{Local, NaiveDate};

use super::{compose_description, Event, JobContactPayload, JobPayload};
use crate::config::StageGate;
use crate::error::IntegrationError;
use crate::integrations::{DealLookup, JobService};

const DEAL_STAGE_PROPERTY: &str = "dealstage";

/// Why an event did not produce a job.
#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    MissingDealId,
    DealNotFound,
    StageMismatch {
        actual: Option<String>,
        required: String,
    },
}

/// Result of one `handle_create_job` invocation.
#[derive(Debug)]
pub enum JobOutcome {
    Skipped(SkipReason),
    JobNotCreated(IntegrationError),
    /// The job exists; the two follow-up steps ran independently.
    Created {
        job_uuid: String,
        contact: Result<(), IntegrationError>,
        deal_update: Result<(), IntegrationError>,
    },
}

impl JobOutcome {
    pub fn job_uuid(&self) -> Option<&str> {
        match self {
            JobOutcome::Created { job_uuid, .. } => Some(job_uuid),
            _ => None,
        }
    }
}

/// Creates a field-service job for a CRM deal and links the two records.
pub struct JobCreator<D, J> {
    deals: D,
    jobs: J,
    stage_gate: StageGate,
    include_job_address: bool,
    today: fn() -> NaiveDate,
}

fn local_today() -> NaiveDate {
    Local::now().date_naive()
}

impl<D: DealLookup, J: JobService> JobCreator<D, J> {
    pub fn new(deals: D, jobs: J, stage_gate: StageGate, include_job_address: bool) -> Self {
        Self {
            deals,
            jobs,
            stage_gate,
            include_job_address,
            today: local_today,
        }
    }

    pub fn with_clock(mut self, today: fn() -> NaiveDate) -> Self {
        self.today = today;
        self
    }

    /// Never fails: every collaborator error is logged and folded into the outcome.
    pub async fn handle_create_job(&self, event: &Event) -> JobOutcome {
        let Some(deal_id) = event.deal_id() else {
            log::error!("No deal_record_id provided in the event data.");
            return JobOutcome::Skipped(SkipReason::MissingDealId);
        };

        let details = match self.deals.get_deal_details_with_associations(deal_id).await {
            Ok(Some(details)) => details,
            Ok(None) => {
                log::error!("Could not retrieve details for deal {}. Aborting.", deal_id);
                return JobOutcome::Skipped(SkipReason::DealNotFound);
            }
            Err(e) => {
                log::error!("Could not retrieve details for deal {}: {}. Aborting.", deal_id, e);
                return JobOutcome::Skipped(SkipReason::DealNotFound);
            }
        };
        log::debug!("Resolved deal {} with its primary contact", details.deal_id);

        if self.stage_gate.enabled {
            if let Err(reason) = self.check_stage(deal_id).await {
                return JobOutcome::Skipped(reason);
            }
        }

        let address = if self.include_job_address {
            Some(event.job_street_address.clone().unwrap_or_default())
        } else {
            None
        };
        let job = JobPayload::quote((self.today)(), compose_description(event), address);

        let job_uuid = match self.jobs.create_job(&job).await {
            Ok(uuid) => uuid,
            Err(e) => {
                log::error!("Error creating job for deal {}: {}", deal_id, e);
                return JobOutcome::JobNotCreated(e);
            }
        };

        let contact = self
            .jobs
            .create_job_contact(&JobContactPayload::primary(&job_uuid, &details.contact))
            .await;
        if let Err(ref e) = contact {
            log::error!("Error creating job contact for job {}: {}", job_uuid, e);
        }

        let deal_update = self.deals.update_deal_job_id(deal_id, &job_uuid).await;
        if let Err(ref e) = deal_update {
            log::error!("Error updating deal {} with job {}: {}", deal_id, job_uuid, e);
        }

        JobOutcome::Created {
            job_uuid,
            contact,
            deal_update,
        }
    }

    async fn check_stage(&self, deal_id: &str) -> Result<(), SkipReason> {
        let current = match self
            .deals
            .get_objects_properties("deals", &[deal_id], &[DEAL_STAGE_PROPERTY])
            .await
        {
            Ok(records) => records
                .first()
                .and_then(|r| r.get(DEAL_STAGE_PROPERTY))
                .map(str::to_string),
            Err(e) => {
                log::error!("Could not read stage of deal {}: {}", deal_id, e);
                None
            }
        };

        let required = &self.stage_gate.required_stage;
        if current.as_deref() != Some(required.as_str()) {
            log::warn!(
                "Skipping job creation for deal {}. Stage '{}' does not match required stage '{}'.",
                deal_id,
                current.as_deref().unwrap_or("none"),
                required
            );
            return Err(SkipReason::StageMismatch {
                actual: current,
                required: required.clone(),
            });
        }

        log::info!("Deal {} is in the correct stage. Proceeding with job creation.", deal_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::integrations::{DealContact, DealDetails, ObjectProperties};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::collections::HashMap;

    const REQUIRED: &str = "953048614";

    #[derive(Default)]
    struct FakeDeals {
        details: Option<DealDetails>,
        lookup_fails: bool,
        stage: Option<String>,
        stage_lookup_fails: bool,
        update_fails: bool,
        calls: Mutex<Vec<String>>,
        updates: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl DealLookup for FakeDeals {
        async fn get_deal_details_with_associations(
            &self,
            deal_id: &str,
        ) -> Result<Option<DealDetails>, IntegrationError> {
            self.calls.lock().push(format!("details:{deal_id}"));
            if self.lookup_fails {
                return Err(IntegrationError::MissingRecordId { service: "HubSpot" });
            }
            Ok(self.details.clone())
        }

        async fn get_objects_properties(
            &self,
            object_type: &str,
            ids: &[&str],
            property_names: &[&str],
        ) -> Result<Vec<ObjectProperties>, IntegrationError> {
            self.calls
                .lock()
                .push(format!("properties:{object_type}:{}:{}", ids.join(","), property_names.join(",")));
            if self.stage_lookup_fails {
                return Err(IntegrationError::MissingRecordId { service: "HubSpot" });
            }
            let mut properties = HashMap::new();
            properties.insert("dealstage".to_string(), self.stage.clone());
            Ok(vec![ObjectProperties {
                id: ids[0].to_string(),
                properties,
            }])
        }

        async fn update_deal_job_id(
            &self,
            deal_id: &str,
            job_uuid: &str,
        ) -> Result<(), IntegrationError> {
            self.updates
                .lock()
                .push((deal_id.to_string(), job_uuid.to_string()));
            if self.update_fails {
                return Err(IntegrationError::MissingRecordId { service: "HubSpot" });
            }
            Ok(())
        }
    }

    #[derive(Default)]
    struct FakeJobs {
        job_uuid: Option<String>,
        contact_fails: bool,
        jobs: Mutex<Vec<JobPayload>>,
        contacts: Mutex<Vec<JobContactPayload>>,
    }

    #[async_trait]
    impl JobService for FakeJobs {
        async fn create_job(&self, job: &JobPayload) -> Result<String, IntegrationError> {
            self.jobs.lock().push(job.clone());
            self.job_uuid
                .clone()
                .ok_or(IntegrationError::MissingRecordId { service: "ServiceM8" })
        }

        async fn create_job_contact(
            &self,
            contact: &JobContactPayload,
        ) -> Result<(), IntegrationError> {
            self.contacts.lock().push(contact.clone());
            if self.contact_fails {
                return Err(IntegrationError::MissingRecordId { service: "ServiceM8" });
            }
            Ok(())
        }
    }

    fn fixed_day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 17).unwrap()
    }

    fn contact() -> DealContact {
        DealContact {
            firstname: Some("Ada".to_string()),
            lastname: Some("Lovelace".to_string()),
            phone: Some("0400 000 000".to_string()),
            email: Some("ada@example.com".to_string()),
        }
    }

    fn deals_in_stage(stage: &str) -> FakeDeals {
        FakeDeals {
            details: Some(DealDetails {
                deal_id: "42".to_string(),
                contact: contact(),
            }),
            stage: Some(stage.to_string()),
            ..FakeDeals::default()
        }
    }

    fn jobs_returning(uuid: &str) -> FakeJobs {
        FakeJobs {
            job_uuid: Some(uuid.to_string()),
            ..FakeJobs::default()
        }
    }

    fn gate(enabled: bool) -> StageGate {
        StageGate {
            enabled,
            required_stage: REQUIRED.to_string(),
        }
    }

    fn event() -> Event {
        Event {
            deal_record_id: Some("42".to_string()),
            service_categories: "A;B".to_string(),
            service_type: "C".to_string(),
            enquiry_notes: " hello ".to_string(),
            job_street_address: Some("12 Harbour St".to_string()),
        }
    }

    fn creator(deals: FakeDeals, jobs: FakeJobs, enabled: bool) -> JobCreator<FakeDeals, FakeJobs> {
        JobCreator::new(deals, jobs, gate(enabled), true).with_clock(fixed_day)
    }

    #[tokio::test]
    async fn missing_deal_id_makes_no_calls() {
        let creator = creator(deals_in_stage(REQUIRED), jobs_returning("job-123"), true);
        let event = Event {
            deal_record_id: None,
            ..event()
        };

        let outcome = creator.handle_create_job(&event).await;

        assert!(matches!(outcome, JobOutcome::Skipped(SkipReason::MissingDealId)));
        assert!(creator.deals.calls.lock().is_empty());
        assert!(creator.deals.updates.lock().is_empty());
        assert!(creator.jobs.jobs.lock().is_empty());
    }

    #[tokio::test]
    async fn unresolved_deal_skips_job_creation() {
        let deals = FakeDeals {
            details: None,
            ..deals_in_stage(REQUIRED)
        };
        let creator = creator(deals, jobs_returning("job-123"), true);

        let outcome = creator.handle_create_job(&event()).await;

        assert!(matches!(outcome, JobOutcome::Skipped(SkipReason::DealNotFound)));
        assert!(creator.jobs.jobs.lock().is_empty());
    }

    #[tokio::test]
    async fn failed_deal_lookup_counts_as_not_found() {
        let deals = FakeDeals {
            lookup_fails: true,
            ..deals_in_stage(REQUIRED)
        };
        let creator = creator(deals, jobs_returning("job-123"), true);

        let outcome = creator.handle_create_job(&event()).await;

        assert!(matches!(outcome, JobOutcome::Skipped(SkipReason::DealNotFound)));
        assert!(creator.jobs.jobs.lock().is_empty());
    }

    #[tokio::test]
    async fn wrong_stage_skips_job_creation() {
        let creator = creator(deals_in_stage("appointmentscheduled"), jobs_returning("job-123"), true);

        let outcome = creator.handle_create_job(&event()).await;

        match outcome {
            JobOutcome::Skipped(SkipReason::StageMismatch { actual, required }) => {
                assert_eq!(actual.as_deref(), Some("appointmentscheduled"));
                assert_eq!(required, REQUIRED);
            }
            other => panic!("expected stage mismatch, got {other:?}"),
        }
        assert!(creator.jobs.jobs.lock().is_empty());
        assert!(creator
            .deals
            .calls
            .lock()
            .contains(&"properties:deals:42:dealstage".to_string()));
    }

    #[tokio::test]
    async fn failed_stage_lookup_never_matches() {
        let deals = FakeDeals {
            stage_lookup_fails: true,
            ..deals_in_stage(REQUIRED)
        };
        let creator = creator(deals, jobs_returning("job-123"), true);

        let outcome = creator.handle_create_job(&event()).await;

        assert!(matches!(
            outcome,
            JobOutcome::Skipped(SkipReason::StageMismatch { actual: None, .. })
        ));
        assert!(creator.jobs.jobs.lock().is_empty());
    }

    #[tokio::test]
    async fn disabled_gate_skips_stage_lookup() {
        let creator = creator(deals_in_stage("anything"), jobs_returning("job-123"), false);

        let outcome = creator.handle_create_job(&event()).await;

        assert_eq!(outcome.job_uuid(), Some("job-123"));
        assert_eq!(*creator.deals.calls.lock(), vec!["details:42".to_string()]);
    }

    #[tokio::test]
    async fn creates_job_contact_and_links_deal() {
        let creator = creator(deals_in_stage(REQUIRED), jobs_returning("job-123"), true);

        let outcome = creator.handle_create_job(&event()).await;

        match outcome {
            JobOutcome::Created {
                job_uuid,
                contact,
                deal_update,
            } => {
                assert_eq!(job_uuid, "job-123");
                assert!(contact.is_ok());
                assert!(deal_update.is_ok());
            }
            other => panic!("expected created job, got {other:?}"),
        }

        let jobs = creator.jobs.jobs.lock();
        assert_eq!(
            *jobs,
            vec![JobPayload {
                status: "Quote".to_string(),
                date: "2026-10-17".to_string(),
                job_description: "Service Category: A, B\nService Type: C\nEnquiry Notes: hello"
                    .to_string(),
                job_address: Some("12 Harbour St".to_string()),
            }]
        );

        let contacts = creator.jobs.contacts.lock();
        assert_eq!(*contacts, vec![JobContactPayload::primary("job-123", &contact())]);

        assert_eq!(
            *creator.deals.updates.lock(),
            vec![("42".to_string(), "job-123".to_string())]
        );
    }

    #[tokio::test]
    async fn address_left_out_when_disabled() {
        let creator = JobCreator::new(
            deals_in_stage(REQUIRED),
            jobs_returning("job-123"),
            gate(true),
            false,
        )
        .with_clock(fixed_day);

        creator.handle_create_job(&event()).await;

        assert_eq!(creator.jobs.jobs.lock()[0].job_address, None);
    }

    #[tokio::test]
    async fn missing_address_sent_empty_when_enabled() {
        let creator = creator(deals_in_stage(REQUIRED), jobs_returning("job-123"), true);
        let event = Event {
            job_street_address: None,
            ..event()
        };

        creator.handle_create_job(&event).await;

        assert_eq!(creator.jobs.jobs.lock()[0].job_address.as_deref(), Some(""));
    }

    #[tokio::test]
    async fn no_job_uuid_stops_follow_up_calls() {
        let creator = creator(deals_in_stage(REQUIRED), FakeJobs::default(), true);

        let outcome = creator.handle_create_job(&event()).await;

        assert!(matches!(outcome, JobOutcome::JobNotCreated(_)));
        assert_eq!(creator.jobs.jobs.lock().len(), 1);
        assert!(creator.jobs.contacts.lock().is_empty());
        assert!(creator.deals.updates.lock().is_empty());
    }

    #[tokio::test]
    async fn contact_failure_still_links_deal() {
        let jobs = FakeJobs {
            contact_fails: true,
            ..jobs_returning("job-123")
        };
        let creator = creator(deals_in_stage(REQUIRED), jobs, true);

        let outcome = creator.handle_create_job(&event()).await;

        match outcome {
            JobOutcome::Created {
                contact,
                deal_update,
                ..
            } => {
                assert!(contact.is_err());
                assert!(deal_update.is_ok());
            }
            other => panic!("expected created job, got {other:?}"),
        }
        assert_eq!(
            *creator.deals.updates.lock(),
            vec![("42".to_string(), "job-123".to_string())]
        );
    }

    #[tokio::test]
    async fn deal_update_failure_is_recorded() {
        let deals = FakeDeals {
            update_fails: true,
            ..deals_in_stage(REQUIRED)
        };
        let creator = creator(deals, jobs_returning("job-123"), true);

        let outcome = creator.handle_create_job(&event()).await;

        assert!(matches!(
            outcome,
            JobOutcome::Created {
                contact: Ok(()),
                deal_update: Err(_),
                ..
            }
        ));
    }
}
