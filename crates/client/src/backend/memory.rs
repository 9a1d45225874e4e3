//! In-process implementation of the scheduling API.
//!
//! Enforces the same rules as the server: role checks, lifecycle
//! transitions, payload validation and optimistic versioning. Test stub
//! servers keep their state in one of these.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

use chrono::Utc;
use domain::models::{
    Actor, ActorRole, AlertTransitionRequest, ApproveManualVerificationRequest, ListAlertsQuery,
    ManualVerificationRequest, ProximityAlert, RejectManualVerificationRequest,
    SubmitManualVerificationRequest,
};
use domain::TransitionError;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use super::ProximityBackend;
use crate::error::ClientError;

#[derive(Debug, Default)]
struct MemoryState {
    alerts: Vec<ProximityAlert>,
    verifications: HashMap<Uuid, ManualVerificationRequest>,
}

#[derive(Debug, Default)]
pub struct InMemoryBackend {
    state: Mutex<MemoryState>,
    calls: AtomicUsize,
    offline: AtomicBool,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_alerts(alerts: Vec<ProximityAlert>) -> Self {
        let backend = Self::new();
        for alert in alerts {
            backend.insert_alert(alert);
        }
        backend
    }

    /// Adds or replaces an alert, as the server-side detector would.
    pub fn insert_alert(&self, alert: ProximityAlert) {
        if let Ok(mut state) = self.state.lock() {
            match state.alerts.iter_mut().find(|a| a.id == alert.id) {
                Some(existing) => *existing = alert,
                None => state.alerts.push(alert),
            }
        }
    }

    pub fn alert(&self, id: Uuid) -> Option<ProximityAlert> {
        self.state
            .lock()
            .ok()
            .and_then(|state| state.alerts.iter().find(|a| a.id == id).cloned())
    }

    pub fn verification(&self, visit_id: Uuid) -> Option<ManualVerificationRequest> {
        self.state
            .lock()
            .ok()
            .and_then(|state| state.verifications.get(&visit_id).cloned())
    }

    /// Number of API calls received, including ones that failed.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// While offline every call fails with a transport error.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn begin(&self) -> Result<MutexGuard<'_, MemoryState>, ClientError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.offline.load(Ordering::SeqCst) {
            return Err(ClientError::Transport("connection refused".to_string()));
        }
        self.state
            .lock()
            .map_err(|_| ClientError::Server {
                status: 500,
                message: "state lock poisoned".to_string(),
            })
    }

    fn transition_alert(
        &self,
        actor: &Actor,
        alert_id: Uuid,
        request: &AlertTransitionRequest,
        apply: impl FnOnce(&mut ProximityAlert) -> Result<(), TransitionError>,
    ) -> Result<ProximityAlert, ClientError> {
        let mut state = self.begin()?;
        require_role(actor, ActorRole::Admin, "triage alerts")?;
        request.validate()?;

        let alert = state
            .alerts
            .iter_mut()
            .find(|a| a.id == alert_id)
            .ok_or_else(|| ClientError::NotFound(format!("Alert {} not found", alert_id)))?;
        check_version(request.version, alert.version)?;

        let mut updated = alert.clone();
        apply(&mut updated).map_err(conflict)?;
        *alert = updated.clone();

        info!(
            alert_id = %alert_id,
            status = %updated.status,
            actor_id = %actor.user_id,
            "Alert transitioned"
        );
        Ok(updated)
    }

    fn decide_verification(
        &self,
        admin: &Actor,
        visit_id: Uuid,
        expected_version: u64,
        apply: impl FnOnce(&mut ManualVerificationRequest) -> Result<(), TransitionError>,
    ) -> Result<ManualVerificationRequest, ClientError> {
        let mut state = self.begin()?;
        require_role(admin, ActorRole::Admin, "review manual verifications")?;

        let request = state.verifications.get_mut(&visit_id).ok_or_else(|| {
            ClientError::NotFound(format!(
                "No manual verification request for visit {}",
                visit_id
            ))
        })?;
        check_version(expected_version, request.version)?;

        let mut updated = request.clone();
        apply(&mut updated).map_err(conflict)?;
        *request = updated.clone();

        info!(
            visit_id = %visit_id,
            status = %updated.status,
            admin_id = %admin.user_id,
            "Manual verification decided"
        );
        Ok(updated)
    }
}

fn require_role(actor: &Actor, role: ActorRole, action: &str) -> Result<(), ClientError> {
    if actor.role == role {
        Ok(())
    } else {
        Err(ClientError::Forbidden(format!(
            "Only a {} may {}",
            role, action
        )))
    }
}

/// A zero expected version skips the check.
fn check_version(expected: u64, current: u64) -> Result<(), ClientError> {
    if expected != 0 && expected != current {
        return Err(ClientError::Conflict(format!(
            "Version mismatch: expected {}, current {}",
            expected, current
        )));
    }
    Ok(())
}

fn conflict(err: TransitionError) -> ClientError {
    ClientError::Conflict(err.to_string())
}

#[async_trait::async_trait]
impl ProximityBackend for InMemoryBackend {
    async fn list_alerts(
        &self,
        query: &ListAlertsQuery,
    ) -> Result<Vec<ProximityAlert>, ClientError> {
        let state = self.begin()?;
        Ok(state
            .alerts
            .iter()
            .filter(|a| query.matches(a))
            .cloned()
            .collect())
    }

    async fn acknowledge_alert(
        &self,
        actor: &Actor,
        alert_id: Uuid,
        request: &AlertTransitionRequest,
    ) -> Result<ProximityAlert, ClientError> {
        self.transition_alert(actor, alert_id, request, |alert| {
            alert.acknowledge(actor, Utc::now())
        })
    }

    async fn resolve_alert(
        &self,
        actor: &Actor,
        alert_id: Uuid,
        request: &AlertTransitionRequest,
    ) -> Result<(), ClientError> {
        let notes = request.notes.clone();
        self.transition_alert(actor, alert_id, request, |alert| {
            alert.resolve(actor, notes, Utc::now())
        })
        .map(|_| ())
    }

    async fn mark_false_alarm(
        &self,
        actor: &Actor,
        alert_id: Uuid,
        request: &AlertTransitionRequest,
    ) -> Result<(), ClientError> {
        let notes = request.notes.clone();
        self.transition_alert(actor, alert_id, request, |alert| {
            alert.mark_false_alarm(actor, notes, Utc::now())
        })
        .map(|_| ())
    }

    async fn request_manual_verification(
        &self,
        actor: &Actor,
        visit_id: Uuid,
        request: &SubmitManualVerificationRequest,
    ) -> Result<ManualVerificationRequest, ClientError> {
        let mut state = self.begin()?;
        require_role(actor, ActorRole::Therapist, "request manual verification")?;

        if state.verifications.contains_key(&visit_id) {
            return Err(ClientError::Conflict(format!(
                "Visit {} already has a manual verification request",
                visit_id
            )));
        }

        let created =
            ManualVerificationRequest::from_submission(visit_id, actor, request, Utc::now())?;
        state.verifications.insert(visit_id, created.clone());

        info!(
            visit_id = %visit_id,
            therapist_id = %actor.user_id,
            reason = %created.reason,
            "Manual verification requested"
        );
        Ok(created)
    }

    async fn approve_manual_verification(
        &self,
        actor: &Actor,
        visit_id: Uuid,
        request: &ApproveManualVerificationRequest,
    ) -> Result<ManualVerificationRequest, ClientError> {
        request.validate()?;
        let notes = request
            .notes
            .clone()
            .filter(|n| !n.trim().is_empty());
        self.decide_verification(actor, visit_id, request.version, |verification| {
            verification.approve(actor, notes, Utc::now())
        })
    }

    async fn reject_manual_verification(
        &self,
        actor: &Actor,
        visit_id: Uuid,
        request: &RejectManualVerificationRequest,
    ) -> Result<ManualVerificationRequest, ClientError> {
        request.validate()?;
        let reason = request.reason.trim().to_string();
        self.decide_verification(actor, visit_id, request.version, |verification| {
            verification.reject(actor, reason, Utc::now())
        })
    }
}
