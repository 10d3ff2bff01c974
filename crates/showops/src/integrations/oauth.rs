use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::cache::TtlCache;

use super::provider::{AuthScheme, ProviderDescriptor};

/// Server-side OAuth2 bookkeeping: authorization URLs, token exchange
/// payloads, and expiry tracking. No interactive flow lives here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenSet {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: DateTime<Utc>,
}

impl TokenSet {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// True when the token should be refreshed ahead of expiry.
    pub fn expires_within(&self, now: DateTime<Utc>, window: Duration) -> bool {
        now + window >= self.expires_at
    }
}

#[derive(Debug, thiserror::Error)]
pub enum OAuthError {
    #[error("provider {0} does not use OAuth2")]
    NotOAuth(String),
    #[error("invalid OAuth URL: {0}")]
    InvalidUrl(String),
    #[error("transport failure: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("token endpoint rejected the request with HTTP {status}")]
    Denied { status: u16 },
}

/// Builds the provider's authorization URL with state and scope encoding.
pub fn authorize_url(
    provider: &ProviderDescriptor,
    client_id: &str,
    redirect_uri: &str,
    state: &str,
) -> Result<String, OAuthError> {
    let (auth_url, scopes) = match &provider.auth {
        AuthScheme::OAuth2 {
            auth_url, scopes, ..
        } => (auth_url, scopes),
        _ => return Err(OAuthError::NotOAuth(provider.slug.clone())),
    };

    let url = reqwest::Url::parse_with_params(
        auth_url,
        &[
            ("response_type", "code"),
            ("client_id", client_id),
            ("redirect_uri", redirect_uri),
            ("scope", scopes.join(" ").as_str()),
            ("state", state),
        ],
    )
    .map_err(|err| OAuthError::InvalidUrl(err.to_string()))?;

    Ok(url.to_string())
}

pub fn token_request_form(
    code: &str,
    client_id: &str,
    client_secret: &str,
    redirect_uri: &str,
) -> Vec<(&'static str, String)> {
    vec![
        ("grant_type", "authorization_code".to_string()),
        ("code", code.to_string()),
        ("client_id", client_id.to_string()),
        ("client_secret", client_secret.to_string()),
        ("redirect_uri", redirect_uri.to_string()),
    ]
}

pub fn refresh_request_form(
    refresh_token: &str,
    client_id: &str,
    client_secret: &str,
) -> Vec<(&'static str, String)> {
    vec![
        ("grant_type", "refresh_token".to_string()),
        ("refresh_token", refresh_token.to_string()),
        ("client_id", client_id.to_string()),
        ("client_secret", client_secret.to_string()),
    ]
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default = "default_expiry_seconds")]
    expires_in: i64,
}

fn default_expiry_seconds() -> i64 {
    3600
}

/// Posts an exchange or refresh form to the provider's token endpoint.
pub async fn request_token(
    http: &reqwest::Client,
    token_url: &str,
    form: &[(&'static str, String)],
) -> Result<TokenSet, OAuthError> {
    let response = http.post(token_url).form(form).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(OAuthError::Denied {
            status: status.as_u16(),
        });
    }

    let payload = response.json::<TokenResponse>().await?;
    Ok(TokenSet {
        access_token: payload.access_token,
        refresh_token: payload.refresh_token,
        expires_at: Utc::now() + Duration::seconds(payload.expires_in),
    })
}

/// Token storage keyed by provider slug, backed by the TTL cache so expired
/// tokens disappear without a sweep.
pub struct TokenStore {
    cache: TtlCache<String, TokenSet>,
}

impl Default for TokenStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenStore {
    pub fn new() -> Self {
        Self {
            cache: TtlCache::new(StdDuration::from_secs(3600)),
        }
    }

    pub fn put(&self, slug: &str, token: TokenSet) {
        let ttl = (token.expires_at - Utc::now())
            .to_std()
            .unwrap_or(StdDuration::ZERO);
        self.cache.insert_with_ttl(slug.to_string(), token, ttl);
    }

    pub fn get(&self, slug: &str) -> Option<TokenSet> {
        self.cache.get(&slug.to_string())
    }

    pub fn access_token(&self, slug: &str) -> Option<String> {
        self.get(slug)
            .filter(|token| !token.is_expired(Utc::now()))
            .map(|token| token.access_token)
    }
}
