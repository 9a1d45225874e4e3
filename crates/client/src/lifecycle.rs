//! Alert triage: acknowledge, resolve and mark-false-alarm.
//!
//! Transitions are checked against the local copy in the feed before any
//! request is sent. Closing an alert removes it from the feed up front and
//! puts it back if the server call fails.

use std::sync::Arc;

use domain::models::{Actor, AlertStatus, AlertTransitionRequest, ProximityAlert};
use domain::TransitionError;
use tokio::sync::RwLock;
use tracing::{info, warn};
use uuid::Uuid;
use validator::Validate;

use crate::backend::ProximityBackend;
use crate::error::ClientError;
use crate::feed::AlertFeed;
use crate::notice::{Notice, NoticeSink};

pub struct AlertLifecycleManager {
    backend: Arc<dyn ProximityBackend>,
    feed: Arc<RwLock<AlertFeed>>,
    notices: Arc<dyn NoticeSink>,
}

impl AlertLifecycleManager {
    pub fn new(
        backend: Arc<dyn ProximityBackend>,
        feed: Arc<RwLock<AlertFeed>>,
        notices: Arc<dyn NoticeSink>,
    ) -> Self {
        Self {
            backend,
            feed,
            notices,
        }
    }

    pub fn feed(&self) -> Arc<RwLock<AlertFeed>> {
        Arc::clone(&self.feed)
    }

    /// Moves an active alert to acknowledged.
    ///
    /// The feed is updated with the server's copy only once the call succeeds.
    pub async fn acknowledge(
        &self,
        actor: &Actor,
        alert_id: Uuid,
    ) -> Result<ProximityAlert, ClientError> {
        const ACTION: &str = "acknowledge alert";

        let current = self
            .prepare(alert_id, AlertStatus::Acknowledged)
            .await
            .map_err(|e| self.fail(ACTION, e))?;

        let request = AlertTransitionRequest {
            notes: None,
            version: current.version,
        };

        match self
            .backend
            .acknowledge_alert(actor, alert_id, &request)
            .await
        {
            Ok(updated) => {
                self.feed.write().await.upsert_local(updated.clone());
                info!(
                    alert_id = %alert_id,
                    actor_id = %actor.user_id,
                    version = updated.version,
                    "Alert acknowledged"
                );
                self.notices.notify(Notice::info("Alert acknowledged"));
                Ok(updated)
            }
            Err(e) => Err(self.fail(ACTION, e)),
        }
    }

    /// Closes an acknowledged alert as a genuine incident.
    pub async fn resolve(
        &self,
        actor: &Actor,
        alert_id: Uuid,
        notes: Option<String>,
    ) -> Result<(), ClientError> {
        self.close(actor, alert_id, notes, AlertStatus::Resolved)
            .await
    }

    /// Closes an acknowledged alert as a detection artifact.
    pub async fn mark_false_alarm(
        &self,
        actor: &Actor,
        alert_id: Uuid,
        notes: Option<String>,
    ) -> Result<(), ClientError> {
        self.close(actor, alert_id, notes, AlertStatus::FalseAlarm)
            .await
    }

    async fn close(
        &self,
        actor: &Actor,
        alert_id: Uuid,
        notes: Option<String>,
        target: AlertStatus,
    ) -> Result<(), ClientError> {
        let action = match target {
            AlertStatus::FalseAlarm => "mark alert as false alarm",
            _ => "resolve alert",
        };

        let current = self
            .prepare(alert_id, target)
            .await
            .map_err(|e| self.fail(action, e))?;

        let request = AlertTransitionRequest {
            notes,
            version: current.version,
        };
        request.validate().map_err(|e| self.fail(action, e.into()))?;

        let removed = self
            .feed
            .write()
            .await
            .remove_local(alert_id, current.version.saturating_add(1));

        let result = match target {
            AlertStatus::FalseAlarm => {
                self.backend
                    .mark_false_alarm(actor, alert_id, &request)
                    .await
            }
            _ => self.backend.resolve_alert(actor, alert_id, &request).await,
        };

        match result {
            Ok(()) => {
                info!(
                    alert_id = %alert_id,
                    actor_id = %actor.user_id,
                    status = %target,
                    "Alert closed"
                );
                let message = match target {
                    AlertStatus::FalseAlarm => "Alert marked as false alarm",
                    _ => "Alert resolved",
                };
                self.notices.notify(Notice::info(message));
                Ok(())
            }
            Err(e) => {
                if let Some(removed) = removed {
                    self.feed.write().await.restore(removed);
                }
                Err(self.fail(action, e))
            }
        }
    }

    /// Looks up the local copy and checks the transition is legal from it.
    async fn prepare(
        &self,
        alert_id: Uuid,
        target: AlertStatus,
    ) -> Result<ProximityAlert, ClientError> {
        let feed = self.feed.read().await;
        let current = feed
            .get(alert_id)
            .cloned()
            .ok_or_else(|| ClientError::NotFound(format!("Alert {} is not in the feed", alert_id)))?;

        if !current.status.can_transition_to(target) {
            return Err(TransitionError::Alert {
                from: current.status,
                to: target,
            }
            .into());
        }
        Ok(current)
    }

    /// Emits the single notice for a failed action and hands the error back.
    fn fail(&self, action: &str, err: ClientError) -> ClientError {
        warn!(action, error = %err, "Alert action failed");
        self.notices.notify_failure(action, &err);
        err
    }
}
