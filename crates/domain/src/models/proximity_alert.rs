//! Proximity alert domain model.
//!
//! Alerts are raised by the server-side detector when a therapist and a
//! patient are unexpectedly close outside a scheduled visit. This crate only
//! consumes them and drives their triage lifecycle:
//!
//! ```text
//! active --acknowledge--> acknowledged --resolve---------> resolved
//!                                      \--mark_false_alarm--> false_alarm
//! ```

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::actor::Actor;
use crate::error::TransitionError;

/// Severity assigned by the detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl std::fmt::Display for AlertSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlertSeverity::Low => write!(f, "low"),
            AlertSeverity::Medium => write!(f, "medium"),
            AlertSeverity::High => write!(f, "high"),
            AlertSeverity::Critical => write!(f, "critical"),
        }
    }
}

/// Triage status of a proximity alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertStatus {
    Active,
    Acknowledged,
    Resolved,
    FalseAlarm,
}

impl AlertStatus {
    /// Statuses that make up the working set.
    pub const IN_FLIGHT: [AlertStatus; 2] = [AlertStatus::Active, AlertStatus::Acknowledged];

    pub fn as_str(&self) -> &'static str {
        match self {
            AlertStatus::Active => "active",
            AlertStatus::Acknowledged => "acknowledged",
            AlertStatus::Resolved => "resolved",
            AlertStatus::FalseAlarm => "false_alarm",
        }
    }

    /// Resolved and false-alarm alerts never change again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, AlertStatus::Resolved | AlertStatus::FalseAlarm)
    }

    pub fn is_in_flight(&self) -> bool {
        !self.is_terminal()
    }

    /// Whether acknowledgment metadata must be present in this status.
    pub fn requires_acknowledgment(&self) -> bool {
        !matches!(self, AlertStatus::Active)
    }

    /// Position along the lifecycle. Transitions only ever increase it.
    pub fn progress(&self) -> u8 {
        match self {
            AlertStatus::Active => 0,
            AlertStatus::Acknowledged => 1,
            AlertStatus::Resolved | AlertStatus::FalseAlarm => 2,
        }
    }

    pub fn can_transition_to(&self, next: AlertStatus) -> bool {
        matches!(
            (self, next),
            (AlertStatus::Active, AlertStatus::Acknowledged)
                | (AlertStatus::Acknowledged, AlertStatus::Resolved)
                | (AlertStatus::Acknowledged, AlertStatus::FalseAlarm)
        )
    }
}

impl std::fmt::Display for AlertStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A proximity alert between a therapist and a patient.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ProximityAlert {
    pub id: Uuid,
    pub therapist_id: Uuid,
    pub patient_id: Uuid,
    /// Distance between the two parties in meters, as measured by the detector.
    #[serde(rename = "distance")]
    pub distance_meters: f64,
    pub detected_at: DateTime<Utc>,
    pub severity: AlertSeverity,
    pub status: AlertStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acknowledged_by: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acknowledged_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_by: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    /// Monotonic per-alert version, bumped on every transition.
    #[serde(default)]
    pub version: u64,
}

impl ProximityAlert {
    /// Creates a freshly detected, active alert.
    pub fn detected(
        therapist_id: Uuid,
        patient_id: Uuid,
        distance_meters: f64,
        severity: AlertSeverity,
        detected_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            therapist_id,
            patient_id,
            distance_meters,
            detected_at,
            severity,
            status: AlertStatus::Active,
            acknowledged_by: None,
            acknowledged_at: None,
            resolved_by: None,
            resolved_at: None,
            notes: None,
            version: 1,
        }
    }

    /// Moves an active alert to acknowledged and stamps the acknowledging actor.
    pub fn acknowledge(&mut self, actor: &Actor, at: DateTime<Utc>) -> Result<(), TransitionError> {
        self.ensure_transition(AlertStatus::Acknowledged)?;
        self.status = AlertStatus::Acknowledged;
        self.acknowledged_by = Some(actor.user_id);
        self.acknowledged_at = Some(at);
        self.version = self.version.saturating_add(1);
        Ok(())
    }

    /// Closes an acknowledged alert as a genuine incident.
    pub fn resolve(
        &mut self,
        actor: &Actor,
        notes: Option<String>,
        at: DateTime<Utc>,
    ) -> Result<(), TransitionError> {
        self.close(AlertStatus::Resolved, actor, notes, at)
    }

    /// Closes an acknowledged alert as a sensor or detection artifact.
    pub fn mark_false_alarm(
        &mut self,
        actor: &Actor,
        notes: Option<String>,
        at: DateTime<Utc>,
    ) -> Result<(), TransitionError> {
        self.close(AlertStatus::FalseAlarm, actor, notes, at)
    }

    fn close(
        &mut self,
        target: AlertStatus,
        actor: &Actor,
        notes: Option<String>,
        at: DateTime<Utc>,
    ) -> Result<(), TransitionError> {
        self.ensure_transition(target)?;
        self.status = target;
        self.resolved_by = Some(actor.user_id);
        self.resolved_at = Some(at);
        self.notes = Some(notes.unwrap_or_default());
        self.version = self.version.saturating_add(1);
        Ok(())
    }

    fn ensure_transition(&self, to: AlertStatus) -> Result<(), TransitionError> {
        if self.status.can_transition_to(to) {
            Ok(())
        } else {
            Err(TransitionError::Alert {
                from: self.status,
                to,
            })
        }
    }

    /// Checks that metadata presence matches the status.
    ///
    /// Acknowledgment metadata exists iff the alert left `active`; resolution
    /// metadata exists iff the alert is terminal.
    pub fn check_invariants(&self) -> Result<(), String> {
        let acknowledged = self.acknowledged_by.is_some() && self.acknowledged_at.is_some();
        let partially_acknowledged = self.acknowledged_by.is_some() != self.acknowledged_at.is_some();
        if partially_acknowledged || acknowledged != self.status.requires_acknowledgment() {
            return Err(format!(
                "alert {} has inconsistent acknowledgment metadata for status {}",
                self.id, self.status
            ));
        }

        let resolved =
            self.resolved_by.is_some() && self.resolved_at.is_some() && self.notes.is_some();
        let any_resolution =
            self.resolved_by.is_some() || self.resolved_at.is_some() || self.notes.is_some();
        if resolved != any_resolution || resolved != self.status.is_terminal() {
            return Err(format!(
                "alert {} has inconsistent resolution metadata for status {}",
                self.id, self.status
            ));
        }

        shared::validation::validate_distance_meters(self.distance_meters)
            .map_err(|_| format!("alert {} has an invalid distance", self.id))?;

        Ok(())
    }
}

/// Body for acknowledge, resolve and mark-false-alarm calls.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(rename_all = "snake_case")]
pub struct AlertTransitionRequest {
    #[validate(custom(function = "shared::validation::validate_note_length"))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,

    /// Version of the alert the caller acted on.
    #[serde(default)]
    pub version: u64,
}

/// Query parameters for listing alerts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListAlertsQuery {
    pub statuses: Vec<AlertStatus>,
}

impl ListAlertsQuery {
    /// Alerts still in the working set.
    pub fn in_flight() -> Self {
        Self {
            statuses: AlertStatus::IN_FLIGHT.to_vec(),
        }
    }

    /// Comma separated value for the `status` query parameter.
    pub fn status_param(&self) -> String {
        self.statuses
            .iter()
            .map(AlertStatus::as_str)
            .collect::<Vec<_>>()
            .join(",")
    }

    pub fn matches(&self, alert: &ProximityAlert) -> bool {
        self.statuses.contains(&alert.status)
    }
}

impl Default for ListAlertsQuery {
    fn default() -> Self {
        Self::in_flight()
    }
}

/// Counts over a working set, used for periodic feed reporting.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AlertSummary {
    pub total: usize,
    pub active: usize,
    pub acknowledged: usize,
    pub by_severity: BTreeMap<AlertSeverity, usize>,
}

impl AlertSummary {
    pub fn from_alerts<'a>(alerts: impl IntoIterator<Item = &'a ProximityAlert>) -> Self {
        let mut summary = Self::default();
        for alert in alerts {
            summary.total += 1;
            match alert.status {
                AlertStatus::Active => summary.active += 1,
                AlertStatus::Acknowledged => summary.acknowledged += 1,
                _ => {}
            }
            *summary.by_severity.entry(alert.severity).or_default() += 1;
        }
        summary
    }

    /// Highest severity present, if any.
    pub fn highest_severity(&self) -> Option<AlertSeverity> {
        self.by_severity.keys().next_back().copied()
    }
}
