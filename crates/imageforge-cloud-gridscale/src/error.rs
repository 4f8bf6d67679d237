//! gridscale provider error types

use imageforge_cloud::CloudError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GridscaleError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("gridscale API returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Request {request_id} failed: {message}")]
    RequestFailed { request_id: String, message: String },

    #[error("Request {0} did not complete in time")]
    RequestTimeout(String),

    #[error("Public network not found")]
    PublicNetworkNotFound,

    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),

    #[error("JSON parse error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Object `object_uuid` was accepted but its request did not finish
    #[error("{source}")]
    Incomplete {
        object_uuid: String,
        source: Box<GridscaleError>,
    },
}

impl From<GridscaleError> for CloudError {
    fn from(err: GridscaleError) -> Self {
        match err {
            GridscaleError::MissingEnvVar(var) => {
                CloudError::InvalidConfig(format!("{} is not set", var))
            }
            GridscaleError::Http(e) => CloudError::Transport(e.to_string()),
            GridscaleError::Api { status, message } => CloudError::ApiError { status, message },
            GridscaleError::RequestFailed {
                request_id,
                message,
            } => CloudError::RequestFailed {
                request_id,
                message,
            },
            GridscaleError::RequestTimeout(request_id) => {
                CloudError::Timeout(format!("request {}", request_id))
            }
            GridscaleError::PublicNetworkNotFound => {
                CloudError::ResourceNotFound("public network".to_string())
            }
            GridscaleError::UnexpectedResponse(message) => CloudError::Transport(message),
            GridscaleError::JsonError(e) => CloudError::Json(e),
            GridscaleError::Incomplete {
                object_uuid,
                source,
            } => CloudError::Incomplete {
                object_id: object_uuid,
                source: Box::new((*source).into()),
            },
        }
    }
}

pub type Result<T> = std::result::Result<T, GridscaleError>;
