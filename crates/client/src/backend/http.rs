//! HTTP implementation of the scheduling API.

use std::time::Duration;

use domain::models::{
    Actor, AlertTransitionRequest, ApproveManualVerificationRequest, ListAlertsQuery,
    ManualVerificationRequest, ProximityAlert, RejectManualVerificationRequest,
    SubmitManualVerificationRequest,
};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use super::ProximityBackend;
use crate::config::BackendConfig;
use crate::error::ClientError;
use crate::metrics::RequestTimer;

/// List responses arrive either as a bare array or wrapped in an envelope.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum AlertListBody {
    Bare(Vec<ProximityAlert>),
    Wrapped { alerts: Vec<ProximityAlert> },
}

impl AlertListBody {
    fn into_alerts(self) -> Vec<ProximityAlert> {
        match self {
            AlertListBody::Bare(alerts) | AlertListBody::Wrapped { alerts } => alerts,
        }
    }
}

/// Talks to the scheduling API over HTTPS with a bearer token.
pub struct HttpBackend {
    client: Client,
    base_url: String,
    access_token: String,
    timeout_secs: u64,
}

impl HttpBackend {
    pub fn new(config: &BackendConfig) -> Result<Self, ClientError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| ClientError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            access_token: config.access_token.clone(),
            timeout_secs: config.request_timeout_secs,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    /// Sends the request and maps transport and status failures.
    async fn send(
        &self,
        timer: RequestTimer,
        request: RequestBuilder,
    ) -> Result<Response, ClientError> {
        let operation = timer.operation();
        let response = match request.bearer_auth(&self.access_token).send().await {
            Ok(response) => response,
            Err(e) => {
                timer.record("transport_error");
                warn!(operation, error = %e, "Backend request failed");
                return Err(if e.is_timeout() {
                    ClientError::Timeout(self.timeout_secs)
                } else {
                    ClientError::Transport(e.to_string())
                });
            }
        };

        let status = response.status();
        if !status.is_success() {
            timer.record("http_error");
            let body = response.text().await.unwrap_or_default();
            warn!(operation, status = status.as_u16(), "Backend returned an error");
            return Err(ClientError::from_status(status.as_u16(), &body));
        }

        let elapsed = timer.record("ok");
        debug!(operation, duration_secs = elapsed, "Backend request succeeded");
        Ok(response)
    }

    async fn post_json<B, R>(
        &self,
        operation: &'static str,
        path: &str,
        body: &B,
    ) -> Result<R, ClientError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let timer = RequestTimer::new(operation);
        let response = self
            .send(timer, self.client.post(self.url(path)).json(body))
            .await?;
        response
            .json()
            .await
            .map_err(|e| ClientError::InvalidResponse(e.to_string()))
    }

    async fn post_no_content<B>(
        &self,
        operation: &'static str,
        path: &str,
        body: &B,
    ) -> Result<(), ClientError>
    where
        B: Serialize + ?Sized,
    {
        let timer = RequestTimer::new(operation);
        self.send(timer, self.client.post(self.url(path)).json(body))
            .await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl ProximityBackend for HttpBackend {
    async fn list_alerts(
        &self,
        query: &ListAlertsQuery,
    ) -> Result<Vec<ProximityAlert>, ClientError> {
        let timer = RequestTimer::new("list_alerts");
        let request = self
            .client
            .get(self.url("alerts"))
            .query(&[("status", query.status_param())]);
        let response = self.send(timer, request).await?;

        let body: AlertListBody = response
            .json()
            .await
            .map_err(|e| ClientError::InvalidResponse(e.to_string()))?;
        Ok(body.into_alerts())
    }

    async fn acknowledge_alert(
        &self,
        actor: &Actor,
        alert_id: Uuid,
        request: &AlertTransitionRequest,
    ) -> Result<ProximityAlert, ClientError> {
        debug!(alert_id = %alert_id, actor_id = %actor.user_id, "Acknowledging alert");
        self.post_json(
            "acknowledge_alert",
            &format!("alerts/{}/acknowledge", alert_id),
            request,
        )
        .await
    }

    async fn resolve_alert(
        &self,
        actor: &Actor,
        alert_id: Uuid,
        request: &AlertTransitionRequest,
    ) -> Result<(), ClientError> {
        debug!(alert_id = %alert_id, actor_id = %actor.user_id, "Resolving alert");
        self.post_no_content(
            "resolve_alert",
            &format!("alerts/{}/resolve", alert_id),
            request,
        )
        .await
    }

    async fn mark_false_alarm(
        &self,
        actor: &Actor,
        alert_id: Uuid,
        request: &AlertTransitionRequest,
    ) -> Result<(), ClientError> {
        debug!(alert_id = %alert_id, actor_id = %actor.user_id, "Marking alert as false alarm");
        self.post_no_content(
            "mark_false_alarm",
            &format!("alerts/{}/mark_false_alarm", alert_id),
            request,
        )
        .await
    }

    async fn request_manual_verification(
        &self,
        actor: &Actor,
        visit_id: Uuid,
        request: &SubmitManualVerificationRequest,
    ) -> Result<ManualVerificationRequest, ClientError> {
        debug!(visit_id = %visit_id, actor_id = %actor.user_id, "Requesting manual verification");
        self.post_json(
            "request_manual_verification",
            &format!("visits/{}/request_manual_verification", visit_id),
            request,
        )
        .await
    }

    async fn approve_manual_verification(
        &self,
        actor: &Actor,
        visit_id: Uuid,
        request: &ApproveManualVerificationRequest,
    ) -> Result<ManualVerificationRequest, ClientError> {
        debug!(visit_id = %visit_id, actor_id = %actor.user_id, "Approving manual verification");
        self.post_json(
            "approve_manual_verification",
            &format!("visits/{}/approve_manual_verification", visit_id),
            request,
        )
        .await
    }

    async fn reject_manual_verification(
        &self,
        actor: &Actor,
        visit_id: Uuid,
        request: &RejectManualVerificationRequest,
    ) -> Result<ManualVerificationRequest, ClientError> {
        debug!(visit_id = %visit_id, actor_id = %actor.user_id, "Rejecting manual verification");
        self.post_json(
            "reject_manual_verification",
            &format!("visits/{}/reject_manual_verification", visit_id),
            request,
        )
        .await
    }
}
