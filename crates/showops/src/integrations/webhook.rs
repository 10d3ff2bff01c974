use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use tracing::info;

use super::provider::ProviderRegistry;

/// Inbound delivery shape shared by every provider hook.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookEnvelope {
    pub provider: String,
    pub event_type: String,
    pub payload: Value,
}

/// Handler seam keyed by `(provider, event_type)`; `"*"` registers a
/// wildcard for every event of a provider.
pub trait WebhookHandler: Send + Sync {
    fn handle(&self, envelope: &WebhookEnvelope) -> Result<(), WebhookError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeliverySummary {
    pub provider: String,
    pub event_type: String,
    pub handled: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum WebhookError {
    #[error("delivery is missing the signature header")]
    MissingSignature,
    #[error("delivery signature does not match")]
    BadSignature,
    #[error("unknown provider {0}")]
    UnknownProvider(String),
    #[error("envelope names provider {envelope} but was delivered to {path}")]
    ProviderMismatch { path: String, envelope: String },
    #[error("malformed delivery body: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("handler failed: {0}")]
    Handler(String),
}

/// Verifies and routes inbound webhook deliveries. Signatures are checked
/// before the body is parsed; unknown providers are rejected outright.
pub struct WebhookProcessor {
    secret: String,
    registry: Arc<ProviderRegistry>,
    handlers: HashMap<(String, String), Arc<dyn WebhookHandler>>,
}

impl WebhookProcessor {
    pub fn new(secret: impl Into<String>, registry: Arc<ProviderRegistry>) -> Self {
        Self {
            secret: secret.into(),
            registry,
            handlers: HashMap::new(),
        }
    }

    pub fn register(
        &mut self,
        provider: impl Into<String>,
        event_type: impl Into<String>,
        handler: Arc<dyn WebhookHandler>,
    ) {
        self.handlers
            .insert((provider.into(), event_type.into()), handler);
    }

    pub fn process(
        &self,
        provider_slug: &str,
        signature: Option<&str>,
        body: &str,
    ) -> Result<DeliverySummary, WebhookError> {
        let signature = signature.ok_or(WebhookError::MissingSignature)?;
        let expected = sign(&self.secret, body);
        if !constant_time_eq(signature.as_bytes(), expected.as_bytes()) {
            return Err(WebhookError::BadSignature);
        }

        if self.registry.get(provider_slug).is_none() {
            return Err(WebhookError::UnknownProvider(provider_slug.to_string()));
        }

        let envelope: WebhookEnvelope = serde_json::from_str(body)?;
        if envelope.provider != provider_slug {
            return Err(WebhookError::ProviderMismatch {
                path: provider_slug.to_string(),
                envelope: envelope.provider,
            });
        }

        let handler = self
            .handlers
            .get(&(envelope.provider.clone(), envelope.event_type.clone()))
            .or_else(|| {
                self.handlers
                    .get(&(envelope.provider.clone(), "*".to_string()))
            });

        let handled = match handler {
            Some(handler) => {
                handler.handle(&envelope)?;
                true
            }
            None => {
                info!(
                    provider = %envelope.provider,
                    event = %envelope.event_type,
                    "no handler registered; delivery acknowledged and skipped"
                );
                false
            }
        };

        Ok(DeliverySummary {
            provider: envelope.provider,
            event_type: envelope.event_type,
            handled,
        })
    }
}

/// Hex-encoded SHA-256 digest over secret + body.
pub fn sign(secret: &str, body: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    hasher.update(body.as_bytes());
    hex::encode(hasher.finalize())
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter()
        .zip(b.iter())
        .fold(0u8, |acc, (left, right)| acc | (left ^ right))
        == 0
}
