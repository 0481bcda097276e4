//! Out-of-band delivery of reset secrets.
//!
//! Delivery is fire-and-forget: it runs on its own task after the response
//! has been decided, and a failure only produces a `warn!` event on the
//! `settle::notify` target.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{info, warn};

/// Notification delivery failure.
#[derive(Debug, Error)]
#[error("notification delivery failed: {0}")]
pub struct NotifyError(pub String);

/// A message carrying a reset secret to its owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResetNotice {
    /// 6-digit code for the staff reset flow.
    Code { email: String, code: String },
    /// Link for the portal reset flow.
    Link { email: String, url: String },
}

impl ResetNotice {
    pub fn recipient(&self) -> &str {
        match self {
            ResetNotice::Code { email, .. } | ResetNotice::Link { email, .. } => email,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            ResetNotice::Code { .. } => "code",
            ResetNotice::Link { .. } => "link",
        }
    }
}

/// Delivery channel for reset notices (email in production deployments).
#[async_trait]
pub trait ResetNotifier: Send + Sync {
    async fn deliver(&self, notice: ResetNotice) -> Result<(), NotifyError>;
}

/// Notifier that records the delivery request in the log without the secret.
#[derive(Debug, Default, Clone)]
pub struct LogNotifier;

#[async_trait]
impl ResetNotifier for LogNotifier {
    async fn deliver(&self, notice: ResetNotice) -> Result<(), NotifyError> {
        info!(
            target: "settle::notify",
            recipient = notice.recipient(),
            kind = notice.kind(),
            "reset notice queued"
        );
        Ok(())
    }
}

/// Spawn delivery without awaiting it.
pub fn dispatch(notifier: Arc<dyn ResetNotifier>, notice: ResetNotice) {
    tokio::spawn(async move {
        let recipient = notice.recipient().to_string();
        let kind = notice.kind();
        if let Err(e) = notifier.deliver(notice).await {
            warn!(
                target: "settle::notify",
                %recipient,
                kind,
                error = %e,
                "reset notice not delivered"
            );
        }
    });
}
