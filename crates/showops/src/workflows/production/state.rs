use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use super::blueprint::ProductionBlueprint;
use super::domain::{
    Permission, PermissionGrant, ProductionPhase, WorkflowError, WorkflowStatus,
};

/// Opaque workflow state identifier, generated at creation and never reused.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StateId(pub String);

impl StateId {
    pub fn generate() -> Self {
        Self(format!("prod-{}", uuid::Uuid::new_v4()))
    }
}

impl fmt::Display for StateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Append-only record of a phase/step move. The log is never pruned or
/// capped; it doubles as the audit trail for reporting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionRecord {
    pub at: DateTime<Utc>,
    pub actor: String,
    pub from_phase: ProductionPhase,
    pub from_step: String,
    pub to_phase: ProductionPhase,
    pub to_step: String,
}

/// Persistent workflow state: a mutable pointer into the blueprint plus the
/// transition log, the untyped data bag, and coarse permission grants.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowState {
    pub id: StateId,
    pub workflow_id: String,
    pub current_phase: ProductionPhase,
    pub current_step: String,
    pub status: WorkflowStatus,
    pub data: Map<String, Value>,
    pub transitions: Vec<TransitionRecord>,
    pub permissions: Vec<PermissionGrant>,
}

impl WorkflowState {
    pub fn new(blueprint: &ProductionBlueprint, permissions: Vec<PermissionGrant>) -> Self {
        let first = blueprint.first_step();
        Self {
            id: StateId::generate(),
            workflow_id: blueprint.id().to_string(),
            current_phase: first.phase,
            current_step: first.key.to_string(),
            status: WorkflowStatus::Draft,
            data: Map::new(),
            transitions: Vec::new(),
            permissions,
        }
    }

    pub fn has_permission(&self, user: &str, permission: Permission) -> bool {
        self.permissions
            .iter()
            .any(|grant| grant.user_id == user && grant.allows(permission))
    }

    pub fn grant(&mut self, grant: PermissionGrant) {
        self.permissions.push(grant);
    }

    /// Moves the pointer and appends to the transition log. Callers are
    /// responsible for validating the move first.
    pub(crate) fn record_transition(
        &mut self,
        actor: &str,
        to_phase: ProductionPhase,
        to_step: &str,
    ) {
        self.transitions.push(TransitionRecord {
            at: Utc::now(),
            actor: actor.to_string(),
            from_phase: self.current_phase,
            from_step: self.current_step.clone(),
            to_phase,
            to_step: to_step.to_string(),
        });
        self.current_phase = to_phase;
        self.current_step = to_step.to_string();
    }

    pub fn set_status(&mut self, to: WorkflowStatus) -> Result<(), WorkflowError> {
        if !self.status.allows(to) {
            return Err(WorkflowError::StatusJump {
                from: self.status,
                to,
            });
        }
        self.status = to;
        Ok(())
    }

    pub fn merge_data(&mut self, patch: Map<String, Value>) {
        for (key, value) in patch {
            self.data.insert(key, value);
        }
    }

    pub fn last_transition_at(&self) -> Option<DateTime<Utc>> {
        self.transitions.last().map(|record| record.at)
    }

    /// Steps strictly before the current pointer count as complete; a
    /// completed workflow counts every step.
    pub fn completed_steps(&self, blueprint: &ProductionBlueprint) -> usize {
        if self.status == WorkflowStatus::Completed {
            return blueprint.step_templates().len();
        }
        blueprint.position(&self.current_step).unwrap_or(0)
    }

    pub fn view(&self) -> StateView {
        StateView {
            id: self.id.clone(),
            workflow_id: self.workflow_id.clone(),
            status: self.status,
            status_label: self.status.label(),
            current_phase: self.current_phase,
            phase_label: self.current_phase.label(),
            current_step: self.current_step.clone(),
            transition_count: self.transitions.len(),
        }
    }
}

/// Sanitized representation of a workflow state for API responses.
#[derive(Debug, Clone, Serialize)]
pub struct StateView {
    pub id: StateId,
    pub workflow_id: String,
    pub status: WorkflowStatus,
    pub status_label: &'static str,
    pub current_phase: ProductionPhase,
    pub phase_label: &'static str,
    pub current_step: String,
    pub transition_count: usize,
}
