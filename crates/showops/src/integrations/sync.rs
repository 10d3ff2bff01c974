use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::warn;

use super::client::{ClientError, ProviderAction, ProviderClient};
use super::provider::ProviderRegistry;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncDirection {
    Push,
    Pull,
    Both,
}

impl SyncDirection {
    fn pulls(self) -> bool {
        matches!(self, Self::Pull | Self::Both)
    }

    fn pushes(self) -> bool {
        matches!(self, Self::Push | Self::Both)
    }
}

/// Field transforms are declared for the pull direction; numeric transforms
/// invert on push, case transforms apply as-is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldTransform {
    None,
    Lowercase,
    Uppercase,
    CentsToDecimal,
    DecimalToCents,
}

impl FieldTransform {
    fn inverse(self) -> Self {
        match self {
            Self::CentsToDecimal => Self::DecimalToCents,
            Self::DecimalToCents => Self::CentsToDecimal,
            other => other,
        }
    }

    fn apply(self, value: &Value) -> Value {
        match self {
            Self::None => value.clone(),
            Self::Lowercase => match value.as_str() {
                Some(text) => Value::String(text.to_lowercase()),
                None => value.clone(),
            },
            Self::Uppercase => match value.as_str() {
                Some(text) => Value::String(text.to_uppercase()),
                None => value.clone(),
            },
            Self::CentsToDecimal => match value.as_i64() {
                Some(cents) => json!(cents as f64 / 100.0),
                None => value.clone(),
            },
            Self::DecimalToCents => match value.as_f64() {
                Some(decimal) => json!((decimal * 100.0).round() as i64),
                None => value.clone(),
            },
        }
    }
}

/// Declarative mapping between a platform entity field and the provider's
/// field name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldMapping {
    pub local: String,
    pub remote: String,
    pub direction: SyncDirection,
    pub transform: FieldTransform,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncRule {
    pub entity: String,
    pub provider: String,
    pub pull_action: String,
    pub mappings: Vec<FieldMapping>,
}

impl SyncRule {
    /// Maps a provider record into platform field names. Absent remote
    /// fields are skipped, not nulled.
    pub fn apply_pull(&self, remote: &Value) -> Value {
        let mut mapped = Map::new();
        for mapping in &self.mappings {
            if !mapping.direction.pulls() {
                continue;
            }
            if let Some(value) = remote.get(&mapping.remote) {
                mapped.insert(mapping.local.clone(), mapping.transform.apply(value));
            }
        }
        Value::Object(mapped)
    }

    /// Maps a platform record into provider field names.
    pub fn apply_push(&self, local: &Value) -> Value {
        let mut mapped = Map::new();
        for mapping in &self.mappings {
            if !mapping.direction.pushes() {
                continue;
            }
            if let Some(value) = local.get(&mapping.local) {
                mapped.insert(
                    mapping.remote.clone(),
                    mapping.transform.inverse().apply(value),
                );
            }
        }
        Value::Object(mapped)
    }
}

/// Where mapped records land after a pull. In-memory in tests and the demo;
/// a real deployment points this at the platform database.
pub trait RecordSink: Send + Sync {
    fn store(&self, entity: &str, record: Value) -> Result<(), SinkError>;
}

#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("record sink unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct SyncSummary {
    pub provider: String,
    pub entity: String,
    pub pulled: usize,
    pub stored: usize,
    pub failed: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("unknown provider {0}")]
    UnknownProvider(String),
    #[error("no sync rules registered for provider {0}")]
    NoRules(String),
    #[error(transparent)]
    Client(#[from] ClientError),
}

/// Pulls provider records through the client, applies the field mappings,
/// and hands rows to the sink. Per-record sink failures are counted, not
/// fatal.
pub struct SyncManager {
    registry: Arc<ProviderRegistry>,
    client: Arc<dyn ProviderClient>,
    rules: Vec<SyncRule>,
    sink: Arc<dyn RecordSink>,
}

impl SyncManager {
    pub fn new(
        registry: Arc<ProviderRegistry>,
        client: Arc<dyn ProviderClient>,
        rules: Vec<SyncRule>,
        sink: Arc<dyn RecordSink>,
    ) -> Self {
        Self {
            registry,
            client,
            rules,
            sink,
        }
    }

    pub fn rules_for(&self, provider: &str) -> Vec<&SyncRule> {
        self.rules
            .iter()
            .filter(|rule| rule.provider == provider)
            .collect()
    }

    pub async fn pull(&self, provider_slug: &str) -> Result<Vec<SyncSummary>, SyncError> {
        let descriptor = self
            .registry
            .get(provider_slug)
            .ok_or_else(|| SyncError::UnknownProvider(provider_slug.to_string()))?;

        let rules = self.rules_for(provider_slug);
        if rules.is_empty() {
            return Err(SyncError::NoRules(provider_slug.to_string()));
        }

        let mut summaries = Vec::with_capacity(rules.len());
        for rule in rules {
            let action = ProviderAction::new(rule.pull_action.clone(), json!({}));
            let response = self.client.execute(descriptor, &action).await?;
            let rows = match response {
                Value::Array(rows) => rows,
                other => vec![other],
            };

            let mut stored = 0usize;
            let mut failed = 0usize;
            let pulled = rows.len();
            for row in rows {
                let mapped = rule.apply_pull(&row);
                match self.sink.store(&rule.entity, mapped) {
                    Ok(()) => stored += 1,
                    Err(err) => {
                        failed += 1;
                        warn!(
                            entity = %rule.entity,
                            provider = %rule.provider,
                            %err,
                            "record dropped during sync"
                        );
                    }
                }
            }

            summaries.push(SyncSummary {
                provider: rule.provider.clone(),
                entity: rule.entity.clone(),
                pulled,
                stored,
                failed,
            });
        }

        Ok(summaries)
    }
}
