//! AWS provider for siteflow
//!
//! Implements [`siteflow_cloud::CloudProvider`] and
//! [`siteflow_cloud::DeliveryProvider`] on top of the `aws` CLI.
//!
//! # Requirements
//!
//! - `aws` CLI v2 must be installed
//! - Credentials come from the usual CLI sources (`AWS_PROFILE`, env, SSO)
//!
//! # Example
//!
//! ```ignore
//! use siteflow_cloud::CloudProvider;
//! use siteflow_cloud_aws::AwsProvider;
//!
//! let provider = AwsProvider::new("us-east-1");
//! let auth = provider.check_auth().await?;
//! if !auth.authenticated {
//!     panic!("Not authenticated: {:?}", auth.error);
//! }
//! ```

pub mod aws;
pub mod error;
pub mod provider;

pub use aws::{AwsCli, CallerIdentity, StackDescription, StackOutput};
pub use error::{AwsError, Result};
pub use provider::AwsProvider;
