use thiserror::Error;

use crate::dataset::DatasetError;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("API returned HTTP {status}: {message}")]
    Api { status: u16, message: String },

    #[error("pipeline run failed (HTTP {status}): {message}")]
    PipelineRun { status: u16, message: String },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Dataset(#[from] DatasetError),

    #[error("batch {index} failed: {source:#}")]
    Batch {
        index: usize,
        #[source]
        source: anyhow::Error,
    },

    #[error("failed to update status of run {run_id}: {source}")]
    StatusUpdate {
        run_id: String,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    pub(crate) fn api(status: reqwest::StatusCode, body: &str) -> Self {
        Error::Api {
            status: status.as_u16(),
            message: truncate(body),
        }
    }
}

pub(crate) fn truncate(body: &str) -> String {
    const MAX_MESSAGE: usize = 500;
    match body.char_indices().nth(MAX_MESSAGE) {
        Some((cut, _)) => body[..cut].to_string(),
        None => body.to_string(),
    }
}
