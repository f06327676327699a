#![doc = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/README.md"))]

pub mod account;
pub mod anchor;
pub mod clock;
pub mod config;
pub mod dashboard;
pub mod descriptors;
mod error;
pub mod gateway;
pub mod ledger;
pub mod orchestrator;
pub mod units;

pub use crate::config::{ConfigError, DashboardConfig};
pub use crate::dashboard::{DashboardSnapshot, RefreshReport, RefreshSection, StakeDashboard};
pub use crate::error::StakeError;
pub use crate::gateway::Provider;
pub use crate::orchestrator::{ActionKind, RequestOutcome, TransactionStatus};
