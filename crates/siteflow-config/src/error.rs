use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error(
        "site configuration not found. Looked in:\n\
        - current directory: site.local.kdl, .site.local.kdl, site.kdl, .site.kdl\n\
        - ./.siteflow/ directory\n\
        - ~/.config/siteflow/site.kdl\n\
        Set SITEFLOW_CONFIG_PATH to point at a file directly"
    )]
    SiteFileNotFound,

    #[error("site file does not exist: {0}")]
    ExplicitPathMissing(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ConfigError>;
