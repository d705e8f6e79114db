use std::time::Duration;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeKind {
    Loading,
    Info,
    Error,
    /// Access denied. Not an error, and never auto-dismissed.
    Locked,
}

/// A user-facing status line. Transient notices carry the delay after which
/// the adapter should hide them.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notice {
    pub kind: NoticeKind,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_dismiss: Option<Duration>,
}

impl Notice {
    pub fn loading(text: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Loading,
            text: text.into(),
            auto_dismiss: None,
        }
    }

    pub fn info(text: impl Into<String>, ttl: Duration) -> Self {
        Self {
            kind: NoticeKind::Info,
            text: text.into(),
            auto_dismiss: Some(ttl),
        }
    }

    pub fn error(text: impl Into<String>, ttl: Duration) -> Self {
        Self {
            kind: NoticeKind::Error,
            text: text.into(),
            auto_dismiss: Some(ttl),
        }
    }

    pub fn locked(text: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Locked,
            text: text.into(),
            auto_dismiss: None,
        }
    }

    pub fn is_persistent(&self) -> bool {
        self.auto_dismiss.is_none()
    }
}
