use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SiteError {
    #[error("KDL parse error: {0}")]
    KdlParse(#[from] kdl::KdlError),

    #[error("failed to read file: {0}")]
    Io(#[from] std::io::Error),

    #[error("IO error: {path}\nreason: {message}")]
    IoError { path: PathBuf, message: String },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("unknown stage '{0}' (expected one of: dev, prod)")]
    UnknownStage(String),

    #[error("stage '{0}' is declared more than once")]
    DuplicateStage(String),

    #[error("exactly one production stage is required, found {0}")]
    ProductionStageCount(usize),

    #[error("stage '{0}' has no assets bucket configured")]
    MissingAssetsLocation(String),

    #[error("hosted zone for '{0}' not found")]
    HostedZoneNotFound(String),

    #[error("template serialization failed: {0}")]
    Serialize(String),
}

impl From<serde_json::Error> for SiteError {
    fn from(e: serde_json::Error) -> Self {
        SiteError::Serialize(e.to_string())
    }
}

impl From<serde_yaml::Error> for SiteError {
    fn from(e: serde_yaml::Error) -> Self {
        SiteError::Serialize(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, SiteError>;
