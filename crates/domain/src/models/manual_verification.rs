//! Manual visit verification domain models.
//!
//! When automatic geolocation cannot confirm a home visit, the therapist
//! attests to it manually and an administrator approves or rejects the
//! attestation exactly once.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError, ValidationErrors};

use super::actor::Actor;
use crate::error::TransitionError;

/// Why automatic verification could not confirm the visit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationReason {
    LocationServicesDisabled,
    PoorGpsSignal,
    DeviceIssue,
    AppError,
    Other,
}

impl std::fmt::Display for VerificationReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VerificationReason::LocationServicesDisabled => write!(f, "location_services_disabled"),
            VerificationReason::PoorGpsSignal => write!(f, "poor_gps_signal"),
            VerificationReason::DeviceIssue => write!(f, "device_issue"),
            VerificationReason::AppError => write!(f, "app_error"),
            VerificationReason::Other => write!(f, "other"),
        }
    }
}

/// Status of a manual verification request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerificationStatus {
    Pending,
    Approved,
    Rejected,
}

impl std::fmt::Display for VerificationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VerificationStatus::Pending => write!(f, "pending"),
            VerificationStatus::Approved => write!(f, "approved"),
            VerificationStatus::Rejected => write!(f, "rejected"),
        }
    }
}

/// A therapist's self-attestation for a visit, plus its adjudication.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ManualVerificationRequest {
    pub id: Uuid,
    pub visit_id: Uuid,
    pub therapist_id: Uuid,
    pub reason: VerificationReason,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_notes: Option<String>,
    pub confirmed_location: bool,
    pub confirmed_time: bool,
    pub confirmed_identity: bool,
    pub submitted_at: DateTime<Utc>,
    pub status: VerificationStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approved_by: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approved_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approval_notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejected_by: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejected_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
    #[serde(default)]
    pub version: u64,
}

impl ManualVerificationRequest {
    /// Builds a pending request from a validated submission.
    pub fn from_submission(
        visit_id: Uuid,
        therapist: &Actor,
        submission: &SubmitManualVerificationRequest,
        submitted_at: DateTime<Utc>,
    ) -> Result<Self, ValidationErrors> {
        submission.validate()?;
        let reason = match submission.reason {
            Some(reason) => reason,
            None => {
                // validate() already rejects a missing reason
                let mut errors = ValidationErrors::new();
                errors.add("reason", ValidationError::new("required"));
                return Err(errors);
            }
        };

        Ok(Self {
            id: Uuid::new_v4(),
            visit_id,
            therapist_id: therapist.user_id,
            reason,
            additional_notes: submission.additional_notes.clone(),
            confirmed_location: submission.confirmed_location,
            confirmed_time: submission.confirmed_time,
            confirmed_identity: submission.confirmed_identity,
            submitted_at,
            status: VerificationStatus::Pending,
            approved_by: None,
            approved_at: None,
            approval_notes: None,
            rejected_by: None,
            rejected_at: None,
            rejection_reason: None,
            version: 1,
        })
    }

    pub fn is_decided(&self) -> bool {
        self.status != VerificationStatus::Pending
    }

    /// Approves a pending request.
    pub fn approve(
        &mut self,
        admin: &Actor,
        notes: Option<String>,
        at: DateTime<Utc>,
    ) -> Result<(), TransitionError> {
        self.ensure_pending()?;
        self.status = VerificationStatus::Approved;
        self.approved_by = Some(admin.user_id);
        self.approved_at = Some(at);
        self.approval_notes = notes;
        self.version = self.version.saturating_add(1);
        Ok(())
    }

    /// Rejects a pending request.
    pub fn reject(
        &mut self,
        admin: &Actor,
        reason: String,
        at: DateTime<Utc>,
    ) -> Result<(), TransitionError> {
        self.ensure_pending()?;
        self.status = VerificationStatus::Rejected;
        self.rejected_by = Some(admin.user_id);
        self.rejected_at = Some(at);
        self.rejection_reason = Some(reason);
        self.version = self.version.saturating_add(1);
        Ok(())
    }

    fn ensure_pending(&self) -> Result<(), TransitionError> {
        if self.is_decided() {
            return Err(TransitionError::VerificationDecided {
                status: self.status,
            });
        }
        Ok(())
    }

    /// Checks that adjudication metadata matches the status and that a
    /// request never carries both an approval and a rejection.
    pub fn check_invariants(&self) -> Result<(), String> {
        let approved = self.approved_by.is_some() || self.approved_at.is_some();
        let rejected =
            self.rejected_by.is_some() || self.rejected_at.is_some() || self.rejection_reason.is_some();

        if approved && rejected {
            return Err(format!(
                "verification request {} is both approved and rejected",
                self.id
            ));
        }

        let consistent = match self.status {
            VerificationStatus::Pending => !approved && !rejected && self.approval_notes.is_none(),
            VerificationStatus::Approved => {
                self.approved_by.is_some() && self.approved_at.is_some() && !rejected
            }
            VerificationStatus::Rejected => {
                self.rejected_by.is_some()
                    && self.rejected_at.is_some()
                    && self.rejection_reason.is_some()
                    && !approved
                    && self.approval_notes.is_none()
            }
        };

        if consistent {
            Ok(())
        } else {
            Err(format!(
                "verification request {} has adjudication metadata inconsistent with status {}",
                self.id, self.status
            ))
        }
    }
}

/// Request payload for submitting a manual verification.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(rename_all = "snake_case")]
#[validate(schema(function = "validate_submission_attestations"))]
pub struct SubmitManualVerificationRequest {
    #[validate(required(message = "A reason for manual verification is required"))]
    pub reason: Option<VerificationReason>,

    #[validate(custom(function = "shared::validation::validate_note_length"))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_notes: Option<String>,

    #[serde(default)]
    pub confirmed_location: bool,

    #[serde(default)]
    pub confirmed_time: bool,

    #[serde(default)]
    pub confirmed_identity: bool,
}

impl SubmitManualVerificationRequest {
    /// A submission with every attestation confirmed.
    pub fn attested(reason: VerificationReason, additional_notes: Option<String>) -> Self {
        Self {
            reason: Some(reason),
            additional_notes,
            confirmed_location: true,
            confirmed_time: true,
            confirmed_identity: true,
        }
    }
}

fn validate_submission_attestations(
    request: &SubmitManualVerificationRequest,
) -> Result<(), ValidationError> {
    shared::validation::validate_attestations(
        request.confirmed_location,
        request.confirmed_time,
        request.confirmed_identity,
    )
}

/// Request payload for approving a manual verification. Notes are optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(rename_all = "snake_case")]
pub struct ApproveManualVerificationRequest {
    #[validate(custom(function = "shared::validation::validate_note_length"))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,

    #[serde(default)]
    pub version: u64,
}

/// Request payload for rejecting a manual verification. A reason is mandatory.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "snake_case")]
pub struct RejectManualVerificationRequest {
    #[validate(custom(function = "shared::validation::validate_reason"))]
    pub reason: String,

    #[serde(default)]
    pub version: u64,
}
