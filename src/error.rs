use std::path::PathBuf;

use thiserror::Error;

/// Failure of a single call to one of the remote services.
///
/// Collaborators return this instead of panicking or retrying; the job
/// orchestrator logs it and records it in the invocation outcome.
#[derive(Error, Debug)]
pub enum IntegrationError {
    #[error("{service} request failed: {source}")]
    Transport {
        service: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("{service} error ({status}): {body}")]
    Status {
        service: &'static str,
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("{service} response could not be parsed: {source}")]
    Decode {
        service: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("{service} base url {url} cannot hold a path")]
    InvalidUrl { service: &'static str, url: String },

    #[error("{service} did not return a record id")]
    MissingRecordId { service: &'static str },
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("{0} is not configured")]
    MissingCredential(&'static str),

    #[error("request timeout must be greater than zero")]
    InvalidTimeout,
}
