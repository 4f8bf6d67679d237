//! Cloud provider error types

use thiserror::Error;

/// Errors returned by any [`CloudApi`](crate::CloudApi) call
#[derive(Error, Debug)]
pub enum CloudError {
    #[error("Resource not found: {0}")]
    ResourceNotFound(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("API error ({status}): {message}")]
    ApiError { status: u16, message: String },

    #[error("Request {request_id} failed: {message}")]
    RequestFailed { request_id: String, message: String },

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The provider accepted a create call and assigned an id, but did not
    /// confirm completion. The object may exist and still needs removing.
    #[error("{source} (object {object_id})")]
    Incomplete {
        object_id: String,
        source: Box<CloudError>,
    },
}

impl CloudError {
    /// Shorthand for an API rejection
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::ApiError {
            status,
            message: message.into(),
        }
    }

    /// Whether the provider reported that the resource does not exist
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            CloudError::ResourceNotFound(_) | CloudError::ApiError { status: 404, .. }
        )
    }

    /// Id of an object the provider created even though the call failed
    pub fn object_id(&self) -> Option<&str> {
        match self {
            CloudError::Incomplete { object_id, .. } => Some(object_id),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, CloudError>;
