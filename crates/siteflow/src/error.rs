use siteflow_cloud::CloudError;
use siteflow_core::SiteError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RunError {
    #[error(transparent)]
    Site(#[from] SiteError),

    #[error(transparent)]
    Cloud(#[from] CloudError),

    #[error("`{command}` exited with {status}: {stderr}")]
    CommandFailed {
        command: String,
        status: String,
        stderr: String,
    },

    #[error("stage '{0}' is not part of the pipeline")]
    UnknownStage(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, RunError>;
