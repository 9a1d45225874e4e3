//! User-visible notices.
//!
//! Every failed or successful user action ends in exactly one notice. The
//! binary logs them; an embedding UI can supply its own sink to show toasts.

use std::sync::Mutex;

use serde::Serialize;

use crate::error::ClientError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
}

impl std::fmt::Display for NoticeLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NoticeLevel::Info => write!(f, "info"),
            NoticeLevel::Warning => write!(f, "warning"),
            NoticeLevel::Error => write!(f, "error"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            message: message.into(),
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Warning,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }

    /// The notice for a failed `action`. Input problems are warnings.
    pub fn failure(action: &str, err: &ClientError) -> Self {
        let message = err.user_message(action);
        if err.is_input_error() {
            Notice::warning(message)
        } else {
            Notice::error(message)
        }
    }
}

/// Destination for user-visible notices.
pub trait NoticeSink: Send + Sync {
    fn notify(&self, notice: Notice);

    fn notify_failure(&self, action: &str, err: &ClientError) {
        self.notify(Notice::failure(action, err));
    }
}

/// Writes notices to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNoticeSink;

impl NoticeSink for TracingNoticeSink {
    fn notify(&self, notice: Notice) {
        match notice.level {
            NoticeLevel::Info => tracing::info!(notice = %notice.message, "User notice"),
            NoticeLevel::Warning => tracing::warn!(notice = %notice.message, "User notice"),
            NoticeLevel::Error => tracing::error!(notice = %notice.message, "User notice"),
        }
    }
}

/// Keeps notices in memory for inspection.
#[derive(Debug, Default)]
pub struct RecordingNoticeSink {
    notices: Mutex<Vec<Notice>>,
}

impl RecordingNoticeSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notices(&self) -> Vec<Notice> {
        self.notices
            .lock()
            .map(|n| n.clone())
            .unwrap_or_default()
    }

    pub fn last(&self) -> Option<Notice> {
        self.notices().pop()
    }

    pub fn count(&self, level: NoticeLevel) -> usize {
        self.notices().iter().filter(|n| n.level == level).count()
    }
}

impl NoticeSink for RecordingNoticeSink {
    fn notify(&self, notice: Notice) {
        if let Ok(mut notices) = self.notices.lock() {
            notices.push(notice);
        }
    }
}
