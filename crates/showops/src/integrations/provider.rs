use serde::{Deserialize, Serialize};

/// How a provider authenticates outbound calls (and, for inbound-only
/// providers, how webhook deliveries are verified).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuthScheme {
    ApiKey {
        header: String,
    },
    OAuth2 {
        auth_url: String,
        token_url: String,
        scopes: Vec<String>,
    },
    Basic,
    WebhookSecret,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderCategory {
    Ticketing,
    Payments,
    Accounting,
    Messaging,
    Storage,
    Esign,
    Calendar,
    ProjectTracking,
    EmailMarketing,
    DevOps,
}

impl ProviderCategory {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Ticketing => "Ticketing",
            Self::Payments => "Payments",
            Self::Accounting => "Accounting",
            Self::Messaging => "Messaging",
            Self::Storage => "Storage",
            Self::Esign => "E-Signature",
            Self::Calendar => "Calendar",
            Self::ProjectTracking => "Project Tracking",
            Self::EmailMarketing => "Email Marketing",
            Self::DevOps => "Developer Tooling",
        }
    }
}

/// Configuration record for a third-party service. Behavior lives behind
/// the `ProviderClient` trait; the descriptor is pure data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderDescriptor {
    pub slug: String,
    pub display_name: String,
    pub base_url: String,
    pub auth: AuthScheme,
    pub category: ProviderCategory,
}

/// Statically registered provider catalog with linear lookup.
#[derive(Debug, Default)]
pub struct ProviderRegistry {
    providers: Vec<ProviderDescriptor>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn standard() -> Self {
        let mut registry = Self::new();
        for descriptor in standard_catalog() {
            registry
                .register(descriptor)
                .expect("standard catalog has no duplicate slugs");
        }
        registry
    }

    pub fn register(&mut self, descriptor: ProviderDescriptor) -> Result<(), ProviderError> {
        if self.get(&descriptor.slug).is_some() {
            return Err(ProviderError::DuplicateSlug(descriptor.slug));
        }
        self.providers.push(descriptor);
        Ok(())
    }

    pub fn get(&self, slug: &str) -> Option<&ProviderDescriptor> {
        self.providers.iter().find(|provider| provider.slug == slug)
    }

    pub fn by_category(&self, category: ProviderCategory) -> Vec<&ProviderDescriptor> {
        self.providers
            .iter()
            .filter(|provider| provider.category == category)
            .collect()
    }

    pub fn descriptors(&self) -> &[ProviderDescriptor] {
        &self.providers
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("provider slug {0} is already registered")]
    DuplicateSlug(String),
}

fn api_key(slug: &str, name: &str, base_url: &str, category: ProviderCategory) -> ProviderDescriptor {
    ProviderDescriptor {
        slug: slug.to_string(),
        display_name: name.to_string(),
        base_url: base_url.to_string(),
        auth: AuthScheme::ApiKey {
            header: "Authorization".to_string(),
        },
        category,
    }
}

fn oauth2(
    slug: &str,
    name: &str,
    base_url: &str,
    auth_url: &str,
    token_url: &str,
    scopes: &[&str],
    category: ProviderCategory,
) -> ProviderDescriptor {
    ProviderDescriptor {
        slug: slug.to_string(),
        display_name: name.to_string(),
        base_url: base_url.to_string(),
        auth: AuthScheme::OAuth2 {
            auth_url: auth_url.to_string(),
            token_url: token_url.to_string(),
            scopes: scopes.iter().map(|scope| scope.to_string()).collect(),
        },
        category,
    }
}

fn standard_catalog() -> Vec<ProviderDescriptor> {
    vec![
        api_key(
            "stripe",
            "Stripe",
            "https://api.stripe.com/v1",
            ProviderCategory::Payments,
        ),
        oauth2(
            "square",
            "Square",
            "https://connect.squareup.com/v2",
            "https://connect.squareup.com/oauth2/authorize",
            "https://connect.squareup.com/oauth2/token",
            &["PAYMENTS_READ", "PAYMENTS_WRITE"],
            ProviderCategory::Payments,
        ),
        oauth2(
            "eventbrite",
            "Eventbrite",
            "https://www.eventbriteapi.com/v3",
            "https://www.eventbrite.com/oauth/authorize",
            "https://www.eventbrite.com/oauth/token",
            &["event:write", "order:read"],
            ProviderCategory::Ticketing,
        ),
        api_key(
            "dice",
            "DICE",
            "https://partners-api.dice.fm/v2",
            ProviderCategory::Ticketing,
        ),
        oauth2(
            "slack",
            "Slack",
            "https://slack.com/api",
            "https://slack.com/oauth/v2/authorize",
            "https://slack.com/api/oauth.v2.access",
            &["chat:write", "channels:read"],
            ProviderCategory::Messaging,
        ),
        oauth2(
            "quickbooks",
            "QuickBooks Online",
            "https://quickbooks.api.intuit.com/v3",
            "https://appcenter.intuit.com/connect/oauth2",
            "https://oauth.platform.intuit.com/oauth2/v1/tokens/bearer",
            &["com.intuit.quickbooks.accounting"],
            ProviderCategory::Accounting,
        ),
        oauth2(
            "xero",
            "Xero",
            "https://api.xero.com/api.xro/2.0",
            "https://login.xero.com/identity/connect/authorize",
            "https://identity.xero.com/connect/token",
            &["accounting.transactions"],
            ProviderCategory::Accounting,
        ),
        oauth2(
            "docusign",
            "DocuSign",
            "https://na3.docusign.net/restapi/v2.1",
            "https://account.docusign.com/oauth/auth",
            "https://account.docusign.com/oauth/token",
            &["signature"],
            ProviderCategory::Esign,
        ),
        oauth2(
            "dropbox",
            "Dropbox",
            "https://api.dropboxapi.com/2",
            "https://www.dropbox.com/oauth2/authorize",
            "https://api.dropboxapi.com/oauth2/token",
            &["files.content.write"],
            ProviderCategory::Storage,
        ),
        oauth2(
            "google-calendar",
            "Google Calendar",
            "https://www.googleapis.com/calendar/v3",
            "https://accounts.google.com/o/oauth2/v2/auth",
            "https://oauth2.googleapis.com/token",
            &["https://www.googleapis.com/auth/calendar.events"],
            ProviderCategory::Calendar,
        ),
        oauth2(
            "asana",
            "Asana",
            "https://app.asana.com/api/1.0",
            "https://app.asana.com/-/oauth_authorize",
            "https://app.asana.com/-/oauth_token",
            &["default"],
            ProviderCategory::ProjectTracking,
        ),
        ProviderDescriptor {
            slug: "jira".to_string(),
            display_name: "Jira Cloud".to_string(),
            base_url: "https://api.atlassian.com/ex/jira".to_string(),
            auth: AuthScheme::Basic,
            category: ProviderCategory::ProjectTracking,
        },
        api_key(
            "github",
            "GitHub",
            "https://api.github.com",
            ProviderCategory::DevOps,
        ),
        api_key(
            "mailchimp",
            "Mailchimp",
            "https://us1.api.mailchimp.com/3.0",
            ProviderCategory::EmailMarketing,
        ),
        api_key(
            "sendgrid",
            "SendGrid",
            "https://api.sendgrid.com/v3",
            ProviderCategory::EmailMarketing,
        ),
        ProviderDescriptor {
            slug: "ticketfeed".to_string(),
            display_name: "TicketFeed Scanning".to_string(),
            base_url: "https://feeds.ticketfeed.example/v1".to_string(),
            auth: AuthScheme::WebhookSecret,
            category: ProviderCategory::Ticketing,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_catalog_registers_every_auth_scheme() {
        let registry = ProviderRegistry::standard();
        assert!(registry.len() >= 14);

        let stripe = registry.get("stripe").expect("stripe registered");
        assert!(matches!(stripe.auth, AuthScheme::ApiKey { .. }));

        let slack = registry.get("slack").expect("slack registered");
        assert!(matches!(slack.auth, AuthScheme::OAuth2 { .. }));

        let jira = registry.get("jira").expect("jira registered");
        assert_eq!(jira.auth, AuthScheme::Basic);

        let ticketfeed = registry.get("ticketfeed").expect("ticketfeed registered");
        assert_eq!(ticketfeed.auth, AuthScheme::WebhookSecret);
    }

    #[test]
    fn duplicate_slugs_are_rejected() {
        let mut registry = ProviderRegistry::standard();
        let error = registry
            .register(api_key(
                "stripe",
                "Stripe Again",
                "https://api.stripe.com/v1",
                ProviderCategory::Payments,
            ))
            .expect_err("duplicate slug rejected");
        match error {
            ProviderError::DuplicateSlug(slug) => assert_eq!(slug, "stripe"),
        }
    }

    #[test]
    fn category_lookup_filters_the_catalog() {
        let registry = ProviderRegistry::standard();
        let ticketing = registry.by_category(ProviderCategory::Ticketing);
        assert!(ticketing.len() >= 3);
        assert!(ticketing.iter().all(|provider| {
            provider.category == ProviderCategory::Ticketing
        }));
    }
}
