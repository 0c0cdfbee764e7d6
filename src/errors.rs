use std::io;

use thiserror::Error;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("could not geocode location: {0}")]
    LocationNotFound(String),
    #[error("overpass failed on all mirrors: {last_error}")]
    MirrorExhausted {
        #[source]
        last_error: Box<AppError>,
    },
    #[error("malformed response from {url}: {message}")]
    MalformedUpstreamResponse { url: String, message: String },
    #[error("{url} responded with status {status}")]
    UpstreamStatus { url: String, status: u16 },
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error("{0}")]
    Config(String),
}

impl AppError {
    pub fn is_client_error(&self) -> bool {
        matches!(self, AppError::LocationNotFound(_))
    }

    pub fn is_mirror_exhausted(&self) -> bool {
        matches!(self, AppError::MirrorExhausted { .. })
    }
}
