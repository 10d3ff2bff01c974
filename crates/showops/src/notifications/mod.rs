use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::info;

/// Rendered notification handed to a publisher. Bodies are plain text;
/// delivery transports live behind the `NotificationPublisher` seam.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub template: String,
    pub subject: String,
    pub body: String,
    pub details: BTreeMap<String, String>,
}

/// Named text template with `{placeholder}` substitution.
#[derive(Debug, Clone)]
pub struct NotificationTemplate {
    pub name: &'static str,
    pub subject: &'static str,
    pub body: &'static str,
}

#[derive(Debug)]
pub struct TemplateRegistry {
    templates: Vec<NotificationTemplate>,
}

impl TemplateRegistry {
    pub fn standard() -> Self {
        Self {
            templates: vec![
                NotificationTemplate {
                    name: "production_created",
                    subject: "Production {production_id} created",
                    body: "A new production workflow {production_id} was created and is awaiting activation.",
                },
                NotificationTemplate {
                    name: "phase_advanced",
                    subject: "Production moved to {phase}",
                    body: "Production {production_id} advanced to {phase} / {step} by {actor}.",
                },
                NotificationTemplate {
                    name: "production_cancelled",
                    subject: "Production {production_id} cancelled",
                    body: "Production {production_id} was cancelled by {actor}.",
                },
                NotificationTemplate {
                    name: "settlement_closed",
                    subject: "Settlement closed for {production_id}",
                    body: "Production {production_id} completed settlement with a total of {settlement_total}.",
                },
                NotificationTemplate {
                    name: "chain_failed",
                    subject: "Integration chain {chain} failed",
                    body: "Chain {chain} halted at step {step}: {error}.",
                },
            ],
        }
    }

    pub fn render(
        &self,
        name: &str,
        details: &BTreeMap<String, String>,
    ) -> Result<Notification, NotificationError> {
        let template = self
            .templates
            .iter()
            .find(|template| template.name == name)
            .ok_or_else(|| NotificationError::UnknownTemplate(name.to_string()))?;

        Ok(Notification {
            template: template.name.to_string(),
            subject: substitute(template.subject, details),
            body: substitute(template.body, details),
            details: details.clone(),
        })
    }
}

/// Replaces `{key}` markers with detail values. Unknown placeholders are
/// left intact so missing data is visible in the delivered message.
fn substitute(text: &str, details: &BTreeMap<String, String>) -> String {
    let mut rendered = text.to_string();
    for (key, value) in details {
        rendered = rendered.replace(&format!("{{{key}}}"), value);
    }
    rendered
}

#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    #[error("unknown notification template {0}")]
    UnknownTemplate(String),
}

/// Outbound delivery seam, mirrored by in-memory fakes in tests and the API
/// service wiring.
pub trait NotificationPublisher: Send + Sync {
    fn publish(&self, notification: Notification) -> Result<(), PublishError>;
}

#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("notification transport unavailable: {0}")]
    Transport(String),
}

/// Default publisher: emits the notification into the tracing stream.
#[derive(Debug, Default, Clone)]
pub struct TracingPublisher;

impl NotificationPublisher for TracingPublisher {
    fn publish(&self, notification: Notification) -> Result<(), PublishError> {
        info!(
            template = %notification.template,
            subject = %notification.subject,
            "notification published"
        );
        Ok(())
    }
}
