//! Domain error types.

use thiserror::Error;

use crate::models::{AlertStatus, VerificationStatus};

/// A state transition that the lifecycle does not allow.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("Alert cannot move from {from} to {to}")]
    Alert { from: AlertStatus, to: AlertStatus },

    #[error("Manual verification request is already {status}")]
    VerificationDecided { status: VerificationStatus },
}
