pub mod orchestrator;

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};

use crate::integrations::DealContact;

pub const JOB_STATUS_QUOTE: &str = "Quote";
pub const CONTACT_TYPE_JOB: &str = "JOB";

/// Deal webhook payload.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Event {
    #[serde(deserialize_with = "deal_id_from_string_or_number")]
    pub deal_record_id: Option<String>,
    #[serde(deserialize_with = "null_as_empty")]
    pub service_categories: String,
    #[serde(deserialize_with = "null_as_empty")]
    pub service_type: String,
    #[serde(deserialize_with = "null_as_empty")]
    pub enquiry_notes: String,
    pub job_street_address: Option<String>,
}

impl Event {
    /// The deal id, if present and not blank.
    pub fn deal_id(&self) -> Option<&str> {
        self.deal_record_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StringOrInt {
    Str(String),
    Int(u64),
}

fn deal_id_from_string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<StringOrInt>::deserialize(deserializer)? {
        Some(StringOrInt::Str(s)) => Some(s),
        Some(StringOrInt::Int(n)) => Some(n.to_string()),
        None => None,
    })
}

/// Unset CRM properties arrive as `null`.
fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobPayload {
    pub status: String,
    pub date: String,
    pub job_description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_address: Option<String>,
}

impl JobPayload {
    pub fn quote(date: NaiveDate, job_description: String, job_address: Option<String>) -> Self {
        Self {
            status: JOB_STATUS_QUOTE.to_string(),
            date: date.format("%Y-%m-%d").to_string(),
            job_description,
            job_address,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobContactPayload {
    pub job_uuid: String,
    pub first: Option<String>,
    pub last: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    #[serde(rename = "type")]
    pub contact_type: String,
    pub is_primary_contact: u8,
}

impl JobContactPayload {
    /// Primary job contact built from the deal's CRM contact.
    pub fn primary(job_uuid: &str, contact: &DealContact) -> Self {
        Self {
            job_uuid: job_uuid.to_string(),
            first: contact.firstname.clone(),
            last: contact.lastname.clone(),
            phone: contact.phone.clone(),
            email: contact.email.clone(),
            contact_type: CONTACT_TYPE_JOB.to_string(),
            is_primary_contact: 1,
        }
    }
}

/// Renders `"<label>: a, b"` from a `;`-delimited value, skipping blank items.
pub fn format_value(label: &str, value: &str) -> String {
    let items: Vec<&str> = value
        .split(';')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .collect();

    if items.is_empty() {
        format!("{}:", label)
    } else {
        format!("{}: {}", label, items.join(", "))
    }
}

pub fn compose_description(event: &Event) -> String {
    format!(
        "{}\n{}\nEnquiry Notes: {}",
        format_value("Service Category", &event.service_categories),
        format_value("Service Type", &event.service_type),
        event.enquiry_notes.trim()
    )
}
