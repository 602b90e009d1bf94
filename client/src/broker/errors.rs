use crate::broker::factory::ProviderKind;
use reqwest::StatusCode;
use thiserror::Error;

/// Result alias used across the broker modules.
pub type ProviderResult<T> = Result<T, ProviderError>;

/// Errors surfaced by broker providers and their supporting machinery.
///
/// Every operation either succeeds per its status contract or fails as a
/// whole with one of these; nothing is retried or swallowed on the way up.
#[derive(Error, Debug)]
pub enum ProviderError {
    /// The broker answered with a status other than the one the operation
    /// expects.
    #[error("Http request [{url}] failed with status code {status}")]
    UnexpectedStatus { url: String, status: StatusCode },

    /// The exchange broke down before a status was observed, or the
    /// response body could not be read.
    #[error("Http request [{url}] failed: {reason}")]
    RequestFailed { url: String, reason: String },

    /// A listing feed could not be parsed into resource records.
    #[error("Malformed resource feed: {reason}")]
    MalformedFeed { reason: String },

    /// A peek-lock response did not advertise the lock address.
    #[error("Response from [{url}] carries no lock Location header")]
    MissingLockLocation { url: String },

    /// The supplied lock duration is not an ISO 8601 duration.
    #[error("Invalid lock duration '{0}': expected an ISO 8601 duration such as PT30S")]
    InvalidLockDuration(String),

    /// Token derivation failed before any request was made.
    #[error("Authentication error: {0}")]
    Authentication(String),

    /// The provider could not be constructed from the given settings.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// No backend implements the requested provider kind.
    #[error("No backend available for provider kind {0:?}")]
    NoSuchBackend(ProviderKind),
}

impl ProviderError {
    /// True when the broker rejected the request's authorization, which is
    /// how a token used past its window shows up. The recovery is to build
    /// a fresh provider, not to retry the call.
    pub fn is_auth_rejection(&self) -> bool {
        matches!(
            self,
            ProviderError::UnexpectedStatus { status, .. }
                if *status == StatusCode::UNAUTHORIZED || *status == StatusCode::FORBIDDEN
        )
    }
}
