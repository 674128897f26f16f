//! Concrete publish/consume workflows built on the broker primitive.

pub mod auth;
pub mod notification;

pub use auth::{AuthDrainSummary, AuthWorkflow};
pub use notification::NotificationWorkflow;
