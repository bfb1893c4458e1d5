//! siteflow cloud abstraction
//!
//! Provider traits, stack plans and the local state file. Concrete
//! providers live in their own crates.
//!
//! ```text
//!            siteflow (runner)
//!                   │
//!   ┌───────────────▼────────────────┐
//!   │          siteflow-cloud         │
//!   │  CloudProvider  DeliveryProvider│
//!   │  Plan / Action   StateManager   │
//!   └───────────────┬────────────────┘
//!                   │
//!          siteflow-cloud-aws
//!              (aws CLI)
//! ```

pub mod action;
pub mod error;
pub mod provider;
pub mod state;

pub use action::{Action, ActionResult, ActionType, ApplyResult, Plan, PlanSummary};
pub use error::{CloudError, Result};
pub use provider::{
    AuthStatus, CloudProvider, DeliveryProvider, HostedZoneRecord, RetryConfig, StackConfig,
    StackSet,
};
pub use state::{
    ProviderState, SiteState, StackState, StackStatus, StageRecord, StageStatus, StateLock,
    StateManager,
};
