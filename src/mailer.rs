//! Transactional-email boundary. Delivery itself is external; this crate
//! only specifies the interface and derives idempotency keys so retries of
//! the same invitation never double-send.

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use thiserror::Error;

#[derive(Debug, Clone)]
pub struct EmailRequest {
    pub to: String,
    pub subject: String,
    pub body: String,
    pub idempotency_key: String,
}

#[derive(Debug, Error)]
#[error("Email send failed: {0}")]
pub struct MailerError(pub String);

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, request: EmailRequest) -> Result<(), MailerError>;
}

/// Idempotency key derived from the invitation token.
pub fn invitation_idempotency_key(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(b"invitation:");
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Logs outgoing mail instead of delivering it. Used in development and
/// tests.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, request: EmailRequest) -> Result<(), MailerError> {
        tracing::info!(
            "Email to {} [{}]: {}",
            request.to,
            request.idempotency_key,
            request.subject
        );
        Ok(())
    }
}
