//! Manual visit verification: therapist submission and admin adjudication.
//!
//! Role and payload checks run before any request is sent; a rejected
//! input produces a warning notice and no network call.

use std::sync::Arc;

use domain::models::{
    Actor, ActorRole, ApproveManualVerificationRequest, ManualVerificationRequest,
    RejectManualVerificationRequest, SubmitManualVerificationRequest,
};
use domain::TransitionError;
use tracing::{info, warn};
use uuid::Uuid;
use validator::Validate;

use crate::backend::ProximityBackend;
use crate::error::ClientError;
use crate::notice::{Notice, NoticeSink};

const SUBMIT: &str = "submit manual verification";
const APPROVE: &str = "approve manual verification";
const REJECT: &str = "reject manual verification";

pub struct ManualVerificationWorkflow {
    backend: Arc<dyn ProximityBackend>,
    notices: Arc<dyn NoticeSink>,
}

impl ManualVerificationWorkflow {
    pub fn new(backend: Arc<dyn ProximityBackend>, notices: Arc<dyn NoticeSink>) -> Self {
        Self { backend, notices }
    }

    /// Submits a therapist's attestation for a visit.
    pub async fn submit(
        &self,
        therapist: &Actor,
        visit_id: Uuid,
        submission: &SubmitManualVerificationRequest,
    ) -> Result<ManualVerificationRequest, ClientError> {
        self.require_role(therapist, ActorRole::Therapist, SUBMIT)?;
        submission
            .validate()
            .map_err(|e| self.fail(SUBMIT, e.into()))?;

        let created = self
            .backend
            .request_manual_verification(therapist, visit_id, submission)
            .await
            .map_err(|e| self.fail(SUBMIT, e))?;

        check_response(&created);
        info!(
            visit_id = %visit_id,
            request_id = %created.id,
            therapist_id = %therapist.user_id,
            "Manual verification submitted"
        );
        self.notices
            .notify(Notice::info("Manual verification request submitted"));
        Ok(created)
    }

    /// Approves a pending request. Blank notes are sent as no notes.
    pub async fn approve(
        &self,
        admin: &Actor,
        request: &ManualVerificationRequest,
        notes: Option<String>,
    ) -> Result<ManualVerificationRequest, ClientError> {
        self.ensure_pending(request, APPROVE)?;
        self.approve_visit(admin, request.visit_id, request.version, notes)
            .await
    }

    /// Approves the request attached to a visit without a local copy.
    ///
    /// A zero `version` lets the server skip its staleness check.
    pub async fn approve_visit(
        &self,
        admin: &Actor,
        visit_id: Uuid,
        version: u64,
        notes: Option<String>,
    ) -> Result<ManualVerificationRequest, ClientError> {
        self.require_role(admin, ActorRole::Admin, APPROVE)?;

        let payload = ApproveManualVerificationRequest {
            notes: notes.filter(|n| !n.trim().is_empty()),
            version,
        };
        payload
            .validate()
            .map_err(|e| self.fail(APPROVE, e.into()))?;

        let approved = self
            .backend
            .approve_manual_verification(admin, visit_id, &payload)
            .await
            .map_err(|e| self.fail(APPROVE, e))?;

        check_response(&approved);
        info!(
            visit_id = %visit_id,
            request_id = %approved.id,
            admin_id = %admin.user_id,
            "Manual verification approved"
        );
        self.notices
            .notify(Notice::info("Manual verification approved"));
        Ok(approved)
    }

    /// Rejects a pending request. A non-blank reason is mandatory.
    pub async fn reject(
        &self,
        admin: &Actor,
        request: &ManualVerificationRequest,
        reason: &str,
    ) -> Result<ManualVerificationRequest, ClientError> {
        self.ensure_pending(request, REJECT)?;
        self.reject_visit(admin, request.visit_id, request.version, reason)
            .await
    }

    /// Rejects the request attached to a visit without a local copy.
    pub async fn reject_visit(
        &self,
        admin: &Actor,
        visit_id: Uuid,
        version: u64,
        reason: &str,
    ) -> Result<ManualVerificationRequest, ClientError> {
        self.require_role(admin, ActorRole::Admin, REJECT)?;

        let payload = RejectManualVerificationRequest {
            reason: reason.trim().to_string(),
            version,
        };
        payload
            .validate()
            .map_err(|e| self.fail(REJECT, e.into()))?;

        let rejected = self
            .backend
            .reject_manual_verification(admin, visit_id, &payload)
            .await
            .map_err(|e| self.fail(REJECT, e))?;

        check_response(&rejected);
        info!(
            visit_id = %visit_id,
            request_id = %rejected.id,
            admin_id = %admin.user_id,
            "Manual verification rejected"
        );
        self.notices
            .notify(Notice::info("Manual verification rejected"));
        Ok(rejected)
    }

    fn require_role(&self, actor: &Actor, role: ActorRole, action: &str) -> Result<(), ClientError> {
        if actor.role == role {
            return Ok(());
        }
        Err(self.fail(
            action,
            ClientError::Forbidden(format!("{} requires the {} role", action, role)),
        ))
    }

    fn ensure_pending(
        &self,
        request: &ManualVerificationRequest,
        action: &str,
    ) -> Result<(), ClientError> {
        if request.is_decided() {
            return Err(self.fail(
                action,
                TransitionError::VerificationDecided {
                    status: request.status,
                }
                .into(),
            ));
        }
        Ok(())
    }

    fn fail(&self, action: &str, err: ClientError) -> ClientError {
        warn!(action, error = %err, "Manual verification action failed");
        self.notices.notify_failure(action, &err);
        err
    }
}

/// Logs a server response that breaks the adjudication rules.
fn check_response(request: &ManualVerificationRequest) {
    if let Err(problem) = request.check_invariants() {
        warn!(request_id = %request.id, problem = %problem, "Inconsistent verification request from server");
    }
}
