//! ParkQueue admin core: the pending-account approval workflow, the status
//! notifier contract, and dashboard figures over the student directory.

pub mod approvals;
pub mod audit;
pub mod config;
pub mod dashboard;
pub mod directory;
pub mod error;
pub mod notifications;
pub mod session;
pub mod telemetry;
