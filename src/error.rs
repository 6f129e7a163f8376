use std::time::Duration;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, SimError>;

/// Errors raised by the simulation engine
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SimError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Illegal state transition: {0}")]
    IllegalStateTransition(String),

    /// A back-reference was resolved after its owner was discarded
    #[error("{0} no longer exists")]
    OwnerGone(&'static str),

    #[error("Tick took {elapsed:?} but only {budget:?} are allowed")]
    DeadlineExceeded { elapsed: Duration, budget: Duration },

    #[error("Cannot instantiate abstract type: {0}")]
    AbstractInstantiation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Background loop failed: {0}")]
    TaskFailed(String),
}

impl SimError {
    pub fn validation(msg: impl Into<String>) -> Self {
        SimError::Validation(msg.into())
    }

    pub fn illegal_transition(msg: impl Into<String>) -> Self {
        SimError::IllegalStateTransition(msg.into())
    }
}

impl From<validator::ValidationErrors> for SimError {
    fn from(errors: validator::ValidationErrors) -> Self {
        SimError::Config(errors.to_string())
    }
}

impl From<figment::Error> for SimError {
    fn from(err: figment::Error) -> Self {
        SimError::Config(err.to_string())
    }
}
