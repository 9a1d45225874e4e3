use domain::TransitionError;
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    /// No response arrived (connection refused, reset, DNS failure, ...).
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Request timeout after {0}s")]
    Timeout(u64),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    /// Input rejected before or by the server.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The local lifecycle does not allow the action; no request was sent.
    #[error(transparent)]
    Transition(#[from] TransitionError),

    #[error("Server error ({status}): {message}")]
    Server { status: u16, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// Error body returned by the API.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

impl ClientError {
    /// Maps a non-success HTTP status and body to an error kind.
    pub fn from_status(status: u16, body: &str) -> Self {
        let message = serde_json::from_str::<ErrorBody>(body)
            .ok()
            .and_then(|b| b.message.or(b.error))
            .unwrap_or_else(|| {
                if body.is_empty() {
                    format!("HTTP {}", status)
                } else {
                    body.to_string()
                }
            });

        match status {
            400 | 422 => ClientError::Validation(message),
            401 => ClientError::Unauthorized(message),
            403 => ClientError::Forbidden(message),
            404 => ClientError::NotFound(message),
            409 => ClientError::Conflict(message),
            _ => ClientError::Server { status, message },
        }
    }

    /// Whether the user can fix this by correcting input or choosing another action.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            ClientError::Validation(_) | ClientError::Transition(_)
        )
    }

    /// Text shown to the end user for a failed `action` ("acknowledge alert", ...).
    pub fn user_message(&self, action: &str) -> String {
        match self {
            ClientError::Validation(msg) => msg.clone(),
            ClientError::Transition(err) => format!("Cannot {}: {}", action, err),
            ClientError::Unauthorized(_) => {
                "Your session has expired. Please sign in again.".to_string()
            }
            ClientError::Forbidden(_) => format!("You are not allowed to {}.", action),
            ClientError::Conflict(_) => format!(
                "Could not {} because it was changed by someone else. Refresh and try again.",
                action
            ),
            _ => format!("Failed to {}. Please try again.", action),
        }
    }
}

impl From<validator::ValidationErrors> for ClientError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let messages: Vec<String> = errors
            .field_errors()
            .iter()
            .flat_map(|(field, errors)| {
                errors.iter().map(move |e| match &e.message {
                    Some(message) => message.to_string(),
                    None => format!("{}: {}", field, e.code),
                })
            })
            .collect();

        let message = if messages.is_empty() {
            "Invalid input".to_string()
        } else {
            messages.join(", ")
        };

        ClientError::Validation(message)
    }
}
