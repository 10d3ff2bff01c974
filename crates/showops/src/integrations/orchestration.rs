use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::config::RetryConfig;

use super::client::{ClientError, ProviderAction, ProviderClient};
use super::provider::ProviderRegistry;

/// Named list of provider/action steps executed sequentially, in parallel
/// groups, or behind a condition on the run context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestrationChain {
    pub name: String,
    pub steps: Vec<ChainStep>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainStep {
    pub id: String,
    pub provider: String,
    pub action: String,
    pub params: Value,
    pub mode: StepMode,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StepMode {
    Sequential,
    /// Contiguous steps sharing a group run concurrently and all settle
    /// before the chain continues.
    Parallel { group: String },
    Conditional { when: Condition },
}

/// Conditions are evaluated against the run context: the seed payload under
/// `seed`, plus each finished step's output under its step id. Fields use
/// dotted paths (`seed.low_inventory`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Condition {
    FieldExists { field: String },
    FieldEquals { field: String, value: Value },
    FieldTruthy { field: String },
}

impl Condition {
    pub fn evaluate(&self, context: &Map<String, Value>) -> bool {
        match self {
            Condition::FieldExists { field } => lookup(context, field).is_some(),
            Condition::FieldEquals { field, value } => {
                lookup(context, field).map(|found| found == value).unwrap_or(false)
            }
            Condition::FieldTruthy { field } => lookup(context, field)
                .map(|found| match found {
                    Value::Bool(flag) => *flag,
                    Value::String(text) => !text.is_empty() && text != "false" && text != "0",
                    Value::Number(number) => number.as_f64().map(|n| n != 0.0).unwrap_or(false),
                    Value::Null => false,
                    _ => true,
                })
                .unwrap_or(false),
        }
    }
}

fn lookup<'a>(context: &'a Map<String, Value>, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let first = segments.next()?;
    let mut current = context.get(first)?;
    for segment in segments {
        current = current.get(segment)?;
    }
    Some(current)
}

/// Exponential backoff between retry attempts; only retryable client
/// errors are retried.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub multiplier: f64,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(200),
            multiplier: 2.0,
            max_backoff: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            initial_backoff: Duration::from_millis(config.initial_backoff_ms),
            multiplier: config.backoff_multiplier,
            max_backoff: Duration::from_millis(config.max_backoff_ms),
        }
    }

    /// Delay before the attempt following `finished_attempt` (1-based).
    pub fn delay(&self, finished_attempt: u32) -> Duration {
        let factor = self.multiplier.powi(finished_attempt.saturating_sub(1) as i32);
        let backoff = self.initial_backoff.mul_f64(factor.max(0.0));
        backoff.min(self.max_backoff)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Succeeded,
    Failed,
    Skipped,
}

#[derive(Debug, Clone, Serialize)]
pub struct StepOutcome {
    pub id: String,
    pub status: StepStatus,
    pub attempts: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Succeeded,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChainRun {
    pub chain: String,
    pub status: RunStatus,
    pub steps: Vec<StepOutcome>,
}

/// Executes orchestration chains against the provider client. A failed step
/// halts the chain; the remaining steps are recorded as skipped.
pub struct ChainEngine {
    registry: Arc<ProviderRegistry>,
    client: Arc<dyn ProviderClient>,
    retry: RetryPolicy,
}

impl ChainEngine {
    pub fn new(
        registry: Arc<ProviderRegistry>,
        client: Arc<dyn ProviderClient>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            registry,
            client,
            retry,
        }
    }

    pub async fn run(&self, chain: &OrchestrationChain, seed: Value) -> ChainRun {
        let mut context = Map::new();
        context.insert("seed".to_string(), seed);

        let mut outcomes: Vec<StepOutcome> = Vec::with_capacity(chain.steps.len());
        let mut halted = false;
        let mut index = 0;

        while index < chain.steps.len() {
            let step = &chain.steps[index];

            if halted {
                outcomes.push(StepOutcome {
                    id: step.id.clone(),
                    status: StepStatus::Skipped,
                    attempts: 0,
                    output: None,
                    error: Some("chain halted by an earlier failure".to_string()),
                });
                index += 1;
                continue;
            }

            match &step.mode {
                StepMode::Parallel { group } => {
                    let mut end = index;
                    while end < chain.steps.len() {
                        match &chain.steps[end].mode {
                            StepMode::Parallel { group: other } if other == group => end += 1,
                            _ => break,
                        }
                    }
                    let batch = &chain.steps[index..end];
                    let results =
                        join_all(batch.iter().map(|step| self.execute_step(step))).await;
                    for (step, outcome) in batch.iter().zip(results) {
                        if outcome.status == StepStatus::Failed {
                            halted = true;
                        }
                        if let Some(output) = &outcome.output {
                            context.insert(step.id.clone(), output.clone());
                        }
                        outcomes.push(outcome);
                    }
                    index = end;
                }
                StepMode::Conditional { when } => {
                    if when.evaluate(&context) {
                        let outcome = self.execute_step(step).await;
                        if outcome.status == StepStatus::Failed {
                            halted = true;
                        }
                        if let Some(output) = &outcome.output {
                            context.insert(step.id.clone(), output.clone());
                        }
                        outcomes.push(outcome);
                    } else {
                        outcomes.push(StepOutcome {
                            id: step.id.clone(),
                            status: StepStatus::Skipped,
                            attempts: 0,
                            output: None,
                            error: None,
                        });
                    }
                    index += 1;
                }
                StepMode::Sequential => {
                    let outcome = self.execute_step(step).await;
                    if outcome.status == StepStatus::Failed {
                        halted = true;
                    }
                    if let Some(output) = &outcome.output {
                        context.insert(step.id.clone(), output.clone());
                    }
                    outcomes.push(outcome);
                    index += 1;
                }
            }
        }

        let status = if halted {
            RunStatus::Failed
        } else {
            RunStatus::Succeeded
        };
        info!(chain = %chain.name, ?status, steps = outcomes.len(), "chain run finished");

        ChainRun {
            chain: chain.name.clone(),
            status,
            steps: outcomes,
        }
    }

    async fn execute_step(&self, step: &ChainStep) -> StepOutcome {
        let provider = match self.registry.get(&step.provider) {
            Some(provider) => provider,
            None => {
                return StepOutcome {
                    id: step.id.clone(),
                    status: StepStatus::Failed,
                    attempts: 0,
                    output: None,
                    error: Some(format!("unknown provider {}", step.provider)),
                }
            }
        };

        let action = ProviderAction::new(step.action.clone(), step.params.clone());
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match self.client.execute(provider, &action).await {
                Ok(output) => {
                    return StepOutcome {
                        id: step.id.clone(),
                        status: StepStatus::Succeeded,
                        attempts: attempt,
                        output: Some(output),
                        error: None,
                    }
                }
                Err(err) if should_retry(&err, attempt, self.retry.max_attempts) => {
                    warn!(
                        step = %step.id,
                        provider = %step.provider,
                        attempt,
                        %err,
                        "step failed; retrying"
                    );
                    tokio::time::sleep(self.retry.delay(attempt)).await;
                }
                Err(err) => {
                    return StepOutcome {
                        id: step.id.clone(),
                        status: StepStatus::Failed,
                        attempts: attempt,
                        output: None,
                        error: Some(err.to_string()),
                    }
                }
            }
        }
    }
}

fn should_retry(err: &ClientError, attempt: u32, max_attempts: u32) -> bool {
    err.is_retryable() && attempt < max_attempts
}

/// Named chain lookup for the API layer and CLI demo.
#[derive(Default)]
pub struct ChainCatalog {
    chains: HashMap<String, OrchestrationChain>,
}

impl ChainCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, chain: OrchestrationChain) {
        self.chains.insert(chain.name.clone(), chain);
    }

    pub fn get(&self, name: &str) -> Option<&OrchestrationChain> {
        self.chains.get(name)
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.chains.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn context_with(path: &str, value: Value) -> Map<String, Value> {
        let mut context = Map::new();
        let mut segments = path.split('.').rev();
        let leaf = segments.next().expect("path has a leaf");
        let mut nested = json!({ leaf: value });
        for segment in segments {
            nested = json!({ segment: nested });
        }
        match nested {
            Value::Object(object) => {
                for (key, value) in object {
                    context.insert(key, value);
                }
            }
            _ => unreachable!("nested object built above"),
        }
        context
    }

    #[test]
    fn conditions_read_dotted_paths() {
        let context = context_with("seed.low_inventory", json!(true));
        assert!(Condition::FieldExists {
            field: "seed.low_inventory".to_string()
        }
        .evaluate(&context));
        assert!(Condition::FieldTruthy {
            field: "seed.low_inventory".to_string()
        }
        .evaluate(&context));
        assert!(!Condition::FieldExists {
            field: "seed.missing".to_string()
        }
        .evaluate(&context));
    }

    #[test]
    fn truthiness_covers_strings_and_numbers() {
        assert!(Condition::FieldTruthy {
            field: "flag".to_string()
        }
        .evaluate(&context_with("flag", json!("yes"))));
        assert!(!Condition::FieldTruthy {
            field: "flag".to_string()
        }
        .evaluate(&context_with("flag", json!("false"))));
        assert!(!Condition::FieldTruthy {
            field: "flag".to_string()
        }
        .evaluate(&context_with("flag", json!(0))));
        assert!(Condition::FieldTruthy {
            field: "flag".to_string()
        }
        .evaluate(&context_with("flag", json!(2))));
    }

    #[test]
    fn equals_compares_json_values() {
        let context = context_with("create_event.status", json!("live"));
        assert!(Condition::FieldEquals {
            field: "create_event.status".to_string(),
            value: json!("live"),
        }
        .evaluate(&context));
        assert!(!Condition::FieldEquals {
            field: "create_event.status".to_string(),
            value: json!("draft"),
        }
        .evaluate(&context));
    }

    #[test]
    fn backoff_grows_and_caps() {
        let policy = RetryPolicy {
            max_attempts: 5,
            initial_backoff: Duration::from_millis(100),
            multiplier: 2.0,
            max_backoff: Duration::from_millis(350),
        };
        assert_eq!(policy.delay(1), Duration::from_millis(100));
        assert_eq!(policy.delay(2), Duration::from_millis(200));
        assert_eq!(policy.delay(3), Duration::from_millis(350));
        assert_eq!(policy.delay(4), Duration::from_millis(350));
    }

    #[test]
    fn catalog_lookup_is_by_name() {
        let mut catalog = ChainCatalog::new();
        catalog.register(OrchestrationChain {
            name: "announce_on_sale".to_string(),
            steps: Vec::new(),
        });
        assert!(catalog.get("announce_on_sale").is_some());
        assert!(catalog.get("unknown").is_none());
        assert_eq!(catalog.names(), vec!["announce_on_sale"]);
    }
}
