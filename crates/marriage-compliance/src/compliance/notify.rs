use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Acknowledgement returned by an outbound transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryReceipt {
    pub success: bool,
    pub provider_reference: Option<String>,
}

impl DeliveryReceipt {
    pub fn delivered(reference: impl Into<String>) -> Self {
        Self {
            success: true,
            provider_reference: Some(reference.into()),
        }
    }

    pub fn rejected() -> Self {
        Self {
            success: false,
            provider_reference: None,
        }
    }
}

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("transport rejected message: {0}")]
    Rejected(String),
    #[error("transport throttled delivery")]
    Throttled,
    #[error("transport timed out after {0} ms")]
    Timeout(u64),
    #[error("transport unavailable: {0}")]
    Unavailable(String),
}

/// Outbound email/SMS capability (e.g. SMTP or a provider API adapter).
#[async_trait]
pub trait NotificationTransport: Send + Sync {
    async fn send(
        &self,
        to: &str,
        subject: &str,
        body: &str,
    ) -> Result<DeliveryReceipt, TransportError>;
}
