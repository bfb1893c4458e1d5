//! AWS provider error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AwsError {
    #[error("aws CLI not found. Please install: https://aws.amazon.com/cli/")]
    CliNotFound,

    #[error("aws authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("aws command failed: {0}")]
    CommandFailed(String),

    #[error("Stack not found: {0}")]
    StackNotFound(String),

    #[error("Unexpected aws output: {0}")]
    UnexpectedOutput(String),

    #[error("JSON parse error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl From<AwsError> for siteflow_cloud::CloudError {
    fn from(e: AwsError) -> Self {
        use siteflow_cloud::CloudError;
        match e {
            AwsError::CliNotFound | AwsError::AuthenticationFailed(_) => {
                CloudError::AuthenticationFailed(e.to_string())
            }
            AwsError::CommandFailed(msg) => CloudError::CommandFailed(msg),
            AwsError::StackNotFound(name) => CloudError::StackNotFound(name),
            other => CloudError::ApiError(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, AwsError>;
