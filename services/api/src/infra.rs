use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::{json, Value};
use showops::integrations::{
    ChainCatalog, ChainEngine, ChainStep, ClientError, Condition, FieldMapping, FieldTransform,
    OrchestrationChain, ProviderAction, ProviderClient, ProviderDescriptor, RecordSink, SinkError,
    StepMode, SyncDirection, SyncRule, WebhookEnvelope, WebhookError, WebhookHandler,
    WebhookProcessor,
};
use showops::notifications::{Notification, NotificationPublisher, PublishError};
use showops::workflows::production::domain::WorkflowStatus;
use showops::workflows::production::{
    RepositoryError, StateId, StateRepository, WorkflowService, WorkflowState,
};
use tracing::info;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Everything the route handlers need, bundled as axum state.
pub(crate) struct ApiContext {
    pub(crate) service: WorkflowService<InMemoryStateRepository, RecordingPublisher>,
    pub(crate) engine: ChainEngine,
    pub(crate) chains: ChainCatalog,
    pub(crate) processor: WebhookProcessor,
}

#[derive(Default, Clone)]
pub(crate) struct InMemoryStateRepository {
    records: Arc<Mutex<HashMap<StateId, WorkflowState>>>,
}

impl StateRepository for InMemoryStateRepository {
    fn upsert(&self, state: WorkflowState) -> Result<(), RepositoryError> {
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        guard.insert(state.id.clone(), state);
        Ok(())
    }

    fn fetch(&self, id: &StateId) -> Result<Option<WorkflowState>, RepositoryError> {
        let guard = self.records.lock().expect("repository mutex poisoned");
        Ok(guard.get(id).cloned())
    }

    fn list_active(&self) -> Result<Vec<WorkflowState>, RepositoryError> {
        let guard = self.records.lock().expect("repository mutex poisoned");
        Ok(guard
            .values()
            .filter(|state| state.status == WorkflowStatus::Active)
            .cloned()
            .collect())
    }
}

#[derive(Default, Clone)]
pub(crate) struct RecordingPublisher {
    events: Arc<Mutex<Vec<Notification>>>,
}

impl RecordingPublisher {
    pub(crate) fn events(&self) -> Vec<Notification> {
        self.events.lock().expect("notification mutex poisoned").clone()
    }
}

impl NotificationPublisher for RecordingPublisher {
    fn publish(&self, notification: Notification) -> Result<(), PublishError> {
        info!(
            template = %notification.template,
            subject = %notification.subject,
            "notification published"
        );
        let mut guard = self.events.lock().expect("notification mutex poisoned");
        guard.push(notification);
        Ok(())
    }
}

/// Provider client for development and demos: acknowledges every action
/// without touching the network.
#[derive(Default, Clone)]
pub(crate) struct OfflineProviderClient;

#[async_trait]
impl ProviderClient for OfflineProviderClient {
    async fn execute(
        &self,
        provider: &ProviderDescriptor,
        action: &ProviderAction,
    ) -> Result<Value, ClientError> {
        Ok(json!({
            "provider": provider.slug,
            "action": action.name,
            "params": action.params,
            "status": "accepted",
        }))
    }
}

#[derive(Default, Clone)]
pub(crate) struct InMemoryRecordSink {
    records: Arc<Mutex<Vec<(String, Value)>>>,
}

impl InMemoryRecordSink {
    pub(crate) fn records(&self) -> Vec<(String, Value)> {
        self.records.lock().expect("sink mutex poisoned").clone()
    }
}

impl RecordSink for InMemoryRecordSink {
    fn store(&self, entity: &str, record: Value) -> Result<(), SinkError> {
        let mut guard = self.records.lock().expect("sink mutex poisoned");
        guard.push((entity.to_string(), record));
        Ok(())
    }
}

/// Webhook handler that surfaces the delivery into the tracing stream; the
/// workflow-side reaction is wired separately per deployment.
struct LoggingWebhookHandler;

impl WebhookHandler for LoggingWebhookHandler {
    fn handle(&self, envelope: &WebhookEnvelope) -> Result<(), WebhookError> {
        info!(
            provider = %envelope.provider,
            event = %envelope.event_type,
            "webhook delivery handled"
        );
        Ok(())
    }
}

pub(crate) fn register_webhook_handlers(processor: &mut WebhookProcessor) {
    processor.register("eventbrite", "order.placed", Arc::new(LoggingWebhookHandler));
    processor.register("stripe", "*", Arc::new(LoggingWebhookHandler));
    processor.register("ticketfeed", "scan.recorded", Arc::new(LoggingWebhookHandler));
}

/// Chains shipped with the service. `announce_on_sale` is the canonical
/// mixed-mode example: one sequential create, a parallel announce group,
/// and a conditional boost.
pub(crate) fn standard_chains() -> ChainCatalog {
    let mut catalog = ChainCatalog::new();

    catalog.register(OrchestrationChain {
        name: "announce_on_sale".to_string(),
        steps: vec![
            ChainStep {
                id: "create_event".to_string(),
                provider: "eventbrite".to_string(),
                action: "events/create".to_string(),
                params: json!({ "publish": true }),
                mode: StepMode::Sequential,
            },
            ChainStep {
                id: "post_slack".to_string(),
                provider: "slack".to_string(),
                action: "chat.postMessage".to_string(),
                params: json!({ "channel": "#on-sales" }),
                mode: StepMode::Parallel {
                    group: "announce".to_string(),
                },
            },
            ChainStep {
                id: "send_campaign".to_string(),
                provider: "mailchimp".to_string(),
                action: "campaigns/send".to_string(),
                params: json!({ "list": "subscribers" }),
                mode: StepMode::Parallel {
                    group: "announce".to_string(),
                },
            },
            ChainStep {
                id: "boost_listing".to_string(),
                provider: "dice".to_string(),
                action: "listings/boost".to_string(),
                params: json!({}),
                mode: StepMode::Conditional {
                    when: Condition::FieldTruthy {
                        field: "seed.low_inventory".to_string(),
                    },
                },
            },
        ],
    });

    catalog.register(OrchestrationChain {
        name: "settlement_export".to_string(),
        steps: vec![
            ChainStep {
                id: "export_ledger".to_string(),
                provider: "quickbooks".to_string(),
                action: "journal/create".to_string(),
                params: json!({ "memo": "show settlement" }),
                mode: StepMode::Sequential,
            },
            ChainStep {
                id: "archive_packet".to_string(),
                provider: "dropbox".to_string(),
                action: "files/upload".to_string(),
                params: json!({ "path": "/settlements" }),
                mode: StepMode::Sequential,
            },
        ],
    });

    catalog
}

/// Field mappings for the ticketing pull used by the demo.
pub(crate) fn standard_sync_rules() -> Vec<SyncRule> {
    vec![SyncRule {
        entity: "ticket_order".to_string(),
        provider: "eventbrite".to_string(),
        pull_action: "orders/list".to_string(),
        mappings: vec![
            FieldMapping {
                local: "order_reference".to_string(),
                remote: "id".to_string(),
                direction: SyncDirection::Pull,
                transform: FieldTransform::None,
            },
            FieldMapping {
                local: "buyer_email".to_string(),
                remote: "email".to_string(),
                direction: SyncDirection::Both,
                transform: FieldTransform::Lowercase,
            },
            FieldMapping {
                local: "gross".to_string(),
                remote: "gross_cents".to_string(),
                direction: SyncDirection::Pull,
                transform: FieldTransform::CentsToDecimal,
            },
        ],
    }]
}
