//! Workflow-level error taxonomy.
//!
//! Maps onto the HTTP contract: validation failures are 400 material,
//! ownership/missing-row failures are 404, everything else is a 500. The
//! server layer does the actual status mapping.

use thiserror::Error;

use crate::broker::BrokerError;
use crate::repository::DieselError;
use crate::services::ExtractError;
use crate::session::SessionError;

#[derive(Debug, Error)]
pub enum WorkflowError {
    /// Precondition not met; surfaced verbatim to the caller.
    #[error("{0}")]
    Validation(String),
    /// Missing resource, or a resource the caller does not own.
    #[error("{0}")]
    NotFound(String),
    #[error("Database error: {0}")]
    Database(#[from] DieselError),
    #[error(transparent)]
    Broker(#[from] BrokerError),
    #[error(transparent)]
    Extraction(#[from] ExtractError),
    #[error(transparent)]
    Session(#[from] SessionError),
}

pub type WorkflowResult<T> = Result<T, WorkflowError>;
