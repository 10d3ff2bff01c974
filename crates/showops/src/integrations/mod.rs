pub mod client;
pub mod oauth;
pub mod orchestration;
pub mod provider;
pub mod sync;
pub mod webhook;

pub use client::{ClientError, CredentialStore, ProviderAction, ProviderClient, RestProviderClient};
pub use orchestration::{
    ChainCatalog, ChainEngine, ChainRun, ChainStep, Condition, OrchestrationChain, RetryPolicy,
    RunStatus, StepMode, StepOutcome, StepStatus,
};
pub use provider::{
    AuthScheme, ProviderCategory, ProviderDescriptor, ProviderError, ProviderRegistry,
};
pub use sync::{
    FieldMapping, FieldTransform, RecordSink, SinkError, SyncDirection, SyncError, SyncManager,
    SyncRule, SyncSummary,
};
pub use webhook::{DeliverySummary, WebhookEnvelope, WebhookError, WebhookHandler, WebhookProcessor};
