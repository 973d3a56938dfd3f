//! Pending-account approval workflow.
//!
//! The engine loads candidate accounts from the directory, classifies the
//! pending ones, and lets an operator filter, inspect, approve or reject them.
//! Approve/reject write the account record first; the audit entry and the
//! status email that follow are best effort.

pub mod classify;
pub mod command;
pub mod domain;
pub mod engine;
pub mod filter;
pub mod router;
pub mod transition;

#[cfg(test)]
mod tests;

pub use classify::{fallback_student_id, is_pending};
pub use command::{ApprovalCommand, DispatchResult, Notice, NoticeLevel};
pub use domain::{
    ApproveOutcome, Filters, LoadOutcome, LoadState, NotifyOutcome, Page, PendingAccount,
    RejectionDraft, SortKey, StudentDetails, StudentIdSource, TransitionReport, WorkflowSnapshot,
};
pub use engine::{ApprovalError, ApprovalsManager};
pub use router::{approvals_router, ApprovalsApi};
pub use transition::DEFAULT_REJECTION_REASON;
