//! Remote scheduling API used by the alert and verification workflows.

mod http;
mod memory;

pub use http::HttpBackend;
pub use memory::InMemoryBackend;

use domain::models::{
    Actor, AlertTransitionRequest, ApproveManualVerificationRequest, ListAlertsQuery,
    ManualVerificationRequest, ProximityAlert, RejectManualVerificationRequest,
    SubmitManualVerificationRequest,
};
use uuid::Uuid;

use crate::error::ClientError;

/// The REST contract consumed by this crate.
///
/// Each method is a single request with no retry. The actor is passed for
/// attribution and logging; the HTTP implementation identifies the caller
/// through its bearer token.
#[async_trait::async_trait]
pub trait ProximityBackend: Send + Sync {
    /// GET alerts?status=...
    async fn list_alerts(&self, query: &ListAlertsQuery)
        -> Result<Vec<ProximityAlert>, ClientError>;

    /// POST alerts/{id}/acknowledge
    async fn acknowledge_alert(
        &self,
        actor: &Actor,
        alert_id: Uuid,
        request: &AlertTransitionRequest,
    ) -> Result<ProximityAlert, ClientError>;

    /// POST alerts/{id}/resolve
    async fn resolve_alert(
        &self,
        actor: &Actor,
        alert_id: Uuid,
        request: &AlertTransitionRequest,
    ) -> Result<(), ClientError>;

    /// POST alerts/{id}/mark_false_alarm
    async fn mark_false_alarm(
        &self,
        actor: &Actor,
        alert_id: Uuid,
        request: &AlertTransitionRequest,
    ) -> Result<(), ClientError>;

    /// POST visits/{id}/request_manual_verification
    async fn request_manual_verification(
        &self,
        actor: &Actor,
        visit_id: Uuid,
        request: &SubmitManualVerificationRequest,
    ) -> Result<ManualVerificationRequest, ClientError>;

    /// POST visits/{id}/approve_manual_verification
    async fn approve_manual_verification(
        &self,
        actor: &Actor,
        visit_id: Uuid,
        request: &ApproveManualVerificationRequest,
    ) -> Result<ManualVerificationRequest, ClientError>;

    /// POST visits/{id}/reject_manual_verification
    async fn reject_manual_verification(
        &self,
        actor: &Actor,
        visit_id: Uuid,
        request: &RejectManualVerificationRequest,
    ) -> Result<ManualVerificationRequest, ClientError>;
}
