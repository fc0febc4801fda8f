//! Error types for fintel

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Remote model error: {0}")]
    Remote(String),

    #[error("Remote model timed out after {0} ms")]
    Timeout(u128),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Prompt error: {0}")]
    Prompt(String),

    #[error("Activity log error: {0}")]
    Activity(String),
}

pub type Result<T> = std::result::Result<T, Error>;
