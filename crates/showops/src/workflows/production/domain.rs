use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductionPhase {
    Booking,
    Advancing,
    Production,
    ShowDay,
    Settlement,
}

impl ProductionPhase {
    pub const fn ordered() -> [Self; 5] {
        [
            Self::Booking,
            Self::Advancing,
            Self::Production,
            Self::ShowDay,
            Self::Settlement,
        ]
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Booking => "Booking & Offers",
            Self::Advancing => "Advancing",
            Self::Production => "Production Prep",
            Self::ShowDay => "Show Day",
            Self::Settlement => "Settlement & Wrap",
        }
    }

    pub fn position(self) -> usize {
        Self::ordered()
            .iter()
            .position(|phase| *phase == self)
            .unwrap_or(0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    Draft,
    Active,
    Completed,
    Cancelled,
    Error,
}

impl WorkflowStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Draft => "Draft",
            Self::Active => "Active",
            Self::Completed => "Completed",
            Self::Cancelled => "Cancelled",
            Self::Error => "Error",
        }
    }

    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }

    /// Guard over status moves. Terminal statuses admit nothing further;
    /// `Error` may only be retried (`Active`) or abandoned (`Cancelled`).
    pub fn allows(self, next: WorkflowStatus) -> bool {
        if self == next {
            return true;
        }
        matches!(
            (self, next),
            (Self::Draft, Self::Active)
                | (Self::Draft, Self::Cancelled)
                | (Self::Active, Self::Completed)
                | (Self::Active, Self::Cancelled)
                | (Self::Active, Self::Error)
                | (Self::Error, Self::Active)
                | (Self::Error, Self::Cancelled)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductionRole {
    Promoter,
    ProductionManager,
    TourManager,
    SettlementAccountant,
    CrewChief,
}

impl ProductionRole {
    pub const fn ordered() -> [Self; 5] {
        [
            Self::Promoter,
            Self::ProductionManager,
            Self::TourManager,
            Self::SettlementAccountant,
            Self::CrewChief,
        ]
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Promoter => "Promoter",
            Self::ProductionManager => "Production Manager",
            Self::TourManager => "Tour Manager",
            Self::SettlementAccountant => "Settlement Accountant",
            Self::CrewChief => "Crew Chief",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    View,
    Edit,
    Transition,
    Cancel,
    Administer,
}

/// Coarse access grant attached to a workflow state. Checks are a linear
/// scan over the grant list; `Administer` implies every other permission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PermissionGrant {
    pub user_id: String,
    pub role: ProductionRole,
    pub permissions: Vec<Permission>,
}

impl PermissionGrant {
    pub fn allows(&self, permission: Permission) -> bool {
        self.permissions
            .iter()
            .any(|granted| *granted == permission || *granted == Permission::Administer)
    }
}

/// Data-bag checks attached to blueprint steps. Rules inspect the untyped
/// `serde_json` map; presence is enforced separately by `Required`.
#[derive(Debug, Clone, Copy)]
pub enum ValidationRule {
    Required(&'static str),
    NonEmptyText(&'static str),
    PositiveNumber(&'static str),
    IsoDate(&'static str),
    DateOrdered {
        earlier: &'static str,
        later: &'static str,
    },
}

impl ValidationRule {
    pub(crate) fn check(&self, data: &Map<String, Value>) -> Result<(), String> {
        match self {
            ValidationRule::Required(field) => match data.get(*field) {
                Some(value) if !value.is_null() => Ok(()),
                _ => Err(format!("{field} is required")),
            },
            ValidationRule::NonEmptyText(field) => match data.get(*field) {
                None => Ok(()),
                Some(value) => match value.as_str() {
                    Some(text) if !text.trim().is_empty() => Ok(()),
                    _ => Err(format!("{field} must be non-empty text")),
                },
            },
            ValidationRule::PositiveNumber(field) => match data.get(*field) {
                None => Ok(()),
                Some(value) => match value.as_f64() {
                    Some(number) if number > 0.0 => Ok(()),
                    _ => Err(format!("{field} must be a positive number")),
                },
            },
            ValidationRule::IsoDate(field) => match data.get(*field) {
                None => Ok(()),
                Some(value) => match value.as_str().and_then(parse_iso_date) {
                    Some(_) => Ok(()),
                    None => Err(format!("{field} must be an ISO date (YYYY-MM-DD)")),
                },
            },
            ValidationRule::DateOrdered { earlier, later } => {
                let first = data.get(*earlier).and_then(Value::as_str).and_then(parse_iso_date);
                let second = data.get(*later).and_then(Value::as_str).and_then(parse_iso_date);
                match (first, second) {
                    (Some(first), Some(second)) if first > second => {
                        Err(format!("{earlier} must not fall after {later}"))
                    }
                    _ => Ok(()),
                }
            }
        }
    }
}

fn parse_iso_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").ok()
}

#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error("unknown step key {0}")]
    UnknownStep(String),
    #[error("step {step} failed validation ({})", .failures.join("; "))]
    Validation {
        step: String,
        failures: Vec<String>,
    },
    #[error("user {user} lacks the {permission:?} permission")]
    PermissionDenied {
        user: String,
        permission: Permission,
    },
    #[error("cannot move workflow status from {from:?} to {to:?}")]
    StatusJump {
        from: WorkflowStatus,
        to: WorkflowStatus,
    },
    #[error("workflow is {status:?}; transitions require an active workflow")]
    NotActive { status: WorkflowStatus },
}
