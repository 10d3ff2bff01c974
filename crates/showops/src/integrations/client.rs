use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::oauth::TokenStore;
use super::provider::{AuthScheme, ProviderDescriptor};

/// A provider call: the action name resolves to an endpoint path relative
/// to the descriptor's base URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderAction {
    pub name: String,
    pub params: Value,
}

impl ProviderAction {
    pub fn new(name: impl Into<String>, params: Value) -> Self {
        Self {
            name: name.into(),
            params,
        }
    }
}

/// Outbound provider seam. The orchestration engine, sync manager, and API
/// wiring all go through this trait; tests substitute scripted clients.
#[async_trait]
pub trait ProviderClient: Send + Sync {
    async fn execute(
        &self,
        provider: &ProviderDescriptor,
        action: &ProviderAction,
    ) -> Result<Value, ClientError>;
}

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("transport failure: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("provider returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("missing credentials for provider {0}")]
    MissingCredentials(String),
}

impl ClientError {
    /// Transport failures and server-side statuses are worth retrying;
    /// auth and client errors are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            ClientError::Transport(_) => true,
            ClientError::Status { status, .. } => *status >= 500 || *status == 429,
            ClientError::MissingCredentials(_) => false,
        }
    }
}

/// Per-provider credential material for outbound calls. OAuth tokens sit in
/// the TTL-backed store so expiry is handled uniformly.
#[derive(Default)]
pub struct CredentialStore {
    api_keys: HashMap<String, String>,
    tokens: TokenStore,
}

impl CredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_api_key(&mut self, slug: impl Into<String>, key: impl Into<String>) {
        self.api_keys.insert(slug.into(), key.into());
    }

    pub fn api_key(&self, slug: &str) -> Option<&String> {
        self.api_keys.get(slug)
    }

    pub fn tokens(&self) -> &TokenStore {
        &self.tokens
    }
}

/// Thin REST client resolving actions against the provider descriptor.
/// Every action posts JSON; responses must decode as JSON.
pub struct RestProviderClient {
    http: reqwest::Client,
    credentials: CredentialStore,
}

impl RestProviderClient {
    pub fn new(credentials: CredentialStore) -> Self {
        Self {
            http: reqwest::Client::new(),
            credentials,
        }
    }

    fn endpoint(provider: &ProviderDescriptor, action: &ProviderAction) -> String {
        format!(
            "{}/{}",
            provider.base_url.trim_end_matches('/'),
            action.name.trim_start_matches('/')
        )
    }
}

#[async_trait]
impl ProviderClient for RestProviderClient {
    async fn execute(
        &self,
        provider: &ProviderDescriptor,
        action: &ProviderAction,
    ) -> Result<Value, ClientError> {
        let url = Self::endpoint(provider, action);
        let mut request = self.http.post(url).json(&action.params);

        request = match &provider.auth {
            AuthScheme::ApiKey { header } => {
                let key = self
                    .credentials
                    .api_key(&provider.slug)
                    .ok_or_else(|| ClientError::MissingCredentials(provider.slug.clone()))?;
                request.header(header.as_str(), key.as_str())
            }
            AuthScheme::OAuth2 { .. } => {
                let token = self
                    .credentials
                    .tokens()
                    .access_token(&provider.slug)
                    .ok_or_else(|| ClientError::MissingCredentials(provider.slug.clone()))?;
                request.bearer_auth(token)
            }
            AuthScheme::Basic => {
                let pair = self
                    .credentials
                    .api_key(&provider.slug)
                    .ok_or_else(|| ClientError::MissingCredentials(provider.slug.clone()))?;
                match pair.split_once(':') {
                    Some((user, password)) => request.basic_auth(user, Some(password)),
                    None => request.basic_auth(pair.as_str(), Option::<&str>::None),
                }
            }
            // Inbound-only providers carry no outbound credential.
            AuthScheme::WebhookSecret => request,
        };

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let payload = response.json::<Value>().await?;
        Ok(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::integrations::provider::ProviderCategory;

    fn descriptor() -> ProviderDescriptor {
        ProviderDescriptor {
            slug: "stripe".to_string(),
            display_name: "Stripe".to_string(),
            base_url: "https://api.stripe.com/v1/".to_string(),
            auth: AuthScheme::ApiKey {
                header: "Authorization".to_string(),
            },
            category: ProviderCategory::Payments,
        }
    }

    #[test]
    fn endpoint_joins_base_url_and_action_path() {
        let action = ProviderAction::new("/payouts/create", serde_json::json!({}));
        assert_eq!(
            RestProviderClient::endpoint(&descriptor(), &action),
            "https://api.stripe.com/v1/payouts/create"
        );
    }

    #[test]
    fn retryability_follows_error_class() {
        let server_side = ClientError::Status {
            status: 503,
            body: "unavailable".to_string(),
        };
        assert!(server_side.is_retryable());

        let throttled = ClientError::Status {
            status: 429,
            body: "slow down".to_string(),
        };
        assert!(throttled.is_retryable());

        let rejected = ClientError::Status {
            status: 404,
            body: "no such action".to_string(),
        };
        assert!(!rejected.is_retryable());

        let unauthenticated = ClientError::MissingCredentials("stripe".to_string());
        assert!(!unauthenticated.is_retryable());
    }
}
