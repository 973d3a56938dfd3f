//! Notifier contract shared by the approval workflow (client side) and the
//! email microservice (server side).

pub mod client;
pub mod compose;
pub mod contract;
pub mod mailer;
pub mod router;

pub use client::{HttpNotifier, Notifier, NotifyError};
pub use contract::{
    ApprovalEmailRequest, NotifierResponse, ParkingAction, ParkingEmailRequest, ReviewStatus,
};
pub use mailer::{DeliveryReceipt, LogMailer, MailError, MailTransport, OutboundEmail, SmtpMailer};
pub use router::{mailer_router, MailerService};
