//! Domain models for Visit Guard.

pub mod actor;
pub mod manual_verification;
pub mod proximity_alert;

pub use actor::{Actor, ActorRole};
pub use manual_verification::{
    ApproveManualVerificationRequest, ManualVerificationRequest, RejectManualVerificationRequest,
    SubmitManualVerificationRequest, VerificationReason, VerificationStatus,
};
pub use proximity_alert::{
    AlertSeverity, AlertStatus, AlertSummary, AlertTransitionRequest, ListAlertsQuery,
    ProximityAlert,
};
