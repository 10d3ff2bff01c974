use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{Duration, Utc};
use serde_json::{Map, Value};
use tracing::warn;

use crate::notifications::{NotificationPublisher, PublishError, TemplateRegistry};

use super::blueprint::{AutoAction, AutoCondition, AutoRule, ProductionBlueprint};
use super::domain::{Permission, PermissionGrant, WorkflowError, WorkflowStatus};
use super::report::ProductionReport;
use super::repository::{RepositoryError, StateRepository};
use super::state::{StateId, WorkflowState};

/// Hours without a transition before an active workflow reads as stalled.
const STALL_THRESHOLD_HOURS: i64 = 72;

/// Service composing the blueprint, the state repository, and the
/// notification seam. All mutations round-trip through `upsert`.
pub struct WorkflowService<R, N> {
    blueprint: ProductionBlueprint,
    repository: Arc<R>,
    notifier: Arc<N>,
    templates: TemplateRegistry,
}

/// Result of an `advance` call: the stored state plus the id of the
/// automatic rule that fired, if any.
#[derive(Debug)]
pub struct AdvanceOutcome {
    pub state: WorkflowState,
    pub auto_applied: Option<&'static str>,
}

impl<R, N> WorkflowService<R, N>
where
    R: StateRepository + 'static,
    N: NotificationPublisher + 'static,
{
    pub fn new(repository: Arc<R>, notifier: Arc<N>) -> Self {
        Self::with_blueprint(ProductionBlueprint::standard(), repository, notifier)
    }

    pub fn with_blueprint(
        blueprint: ProductionBlueprint,
        repository: Arc<R>,
        notifier: Arc<N>,
    ) -> Self {
        Self {
            blueprint,
            repository,
            notifier,
            templates: TemplateRegistry::standard(),
        }
    }

    pub fn blueprint(&self) -> &ProductionBlueprint {
        &self.blueprint
    }

    /// Create a draft workflow state seeded at the blueprint's first step.
    pub fn create(&self, grants: Vec<PermissionGrant>) -> Result<WorkflowState, ServiceError> {
        let state = WorkflowState::new(&self.blueprint, grants);
        self.repository.upsert(state.clone())?;
        self.notify(
            "production_created",
            &[("production_id", state.id.to_string())],
        )?;
        Ok(state)
    }

    pub fn get(&self, id: &StateId) -> Result<WorkflowState, ServiceError> {
        let state = self.repository.fetch(id)?.ok_or(RepositoryError::NotFound)?;
        Ok(state)
    }

    pub fn list_active(&self) -> Result<Vec<WorkflowState>, ServiceError> {
        let states = self.repository.list_active()?;
        Ok(states)
    }

    pub fn activate(&self, id: &StateId, actor: &str) -> Result<WorkflowState, ServiceError> {
        let mut state = self.get(id)?;
        self.require_permission(&state, actor, Permission::Transition)?;
        state.set_status(WorkflowStatus::Active)?;
        self.repository.upsert(state.clone())?;
        Ok(state)
    }

    /// Move the workflow pointer to `to_step`. The step being exited must
    /// pass its required-field and validation checks against the merged data
    /// bag; afterwards the automatic rules get one first-match pass.
    pub fn advance(
        &self,
        id: &StateId,
        actor: &str,
        to_step: &str,
        patch: Map<String, Value>,
    ) -> Result<AdvanceOutcome, ServiceError> {
        let mut state = self.get(id)?;

        if state.status != WorkflowStatus::Active {
            return Err(WorkflowError::NotActive {
                status: state.status,
            }
            .into());
        }
        self.require_permission(&state, actor, Permission::Transition)?;

        let target = self
            .blueprint
            .step(to_step)
            .ok_or_else(|| WorkflowError::UnknownStep(to_step.to_string()))?;

        state.merge_data(patch);
        self.validate_step(&state, &state.current_step.clone())?;

        let from_phase = state.current_phase;
        state.record_transition(actor, target.phase, target.key);

        let auto_applied = self.apply_auto_rules(&mut state);
        self.repository.upsert(state.clone())?;

        if from_phase != state.current_phase {
            self.notify(
                "phase_advanced",
                &[
                    ("production_id", state.id.to_string()),
                    ("phase", state.current_phase.label().to_string()),
                    ("step", state.current_step.clone()),
                    ("actor", actor.to_string()),
                ],
            )?;
        }

        Ok(AdvanceOutcome {
            state,
            auto_applied,
        })
    }

    /// Guarded status change. Cancellation needs the `Cancel` permission;
    /// everything else needs `Transition`.
    pub fn set_status(
        &self,
        id: &StateId,
        actor: &str,
        to: WorkflowStatus,
    ) -> Result<WorkflowState, ServiceError> {
        let mut state = self.get(id)?;
        let needed = if to == WorkflowStatus::Cancelled {
            Permission::Cancel
        } else {
            Permission::Transition
        };
        self.require_permission(&state, actor, needed)?;
        state.set_status(to)?;
        self.repository.upsert(state.clone())?;

        if to == WorkflowStatus::Cancelled {
            self.notify(
                "production_cancelled",
                &[
                    ("production_id", state.id.to_string()),
                    ("actor", actor.to_string()),
                ],
            )?;
        }
        Ok(state)
    }

    /// Close out the workflow: the final data patch is merged, the current
    /// step must validate, then the status guard admits `Completed`.
    pub fn complete(
        &self,
        id: &StateId,
        actor: &str,
        patch: Map<String, Value>,
    ) -> Result<WorkflowState, ServiceError> {
        let mut state = self.get(id)?;
        self.require_permission(&state, actor, Permission::Transition)?;
        state.merge_data(patch);
        self.validate_step(&state, &state.current_step.clone())?;
        state.set_status(WorkflowStatus::Completed)?;
        self.repository.upsert(state.clone())?;

        let settlement_total = state
            .data
            .get("settlement_total")
            .map(value_as_text)
            .unwrap_or_else(|| "unreported".to_string());
        self.notify(
            "settlement_closed",
            &[
                ("production_id", state.id.to_string()),
                ("settlement_total", settlement_total),
            ],
        )?;
        Ok(state)
    }

    pub fn report(&self, id: &StateId) -> Result<ProductionReport, ServiceError> {
        let state = self.get(id)?;
        Ok(ProductionReport::build(
            &self.blueprint,
            &state,
            Utc::now(),
            Duration::hours(STALL_THRESHOLD_HOURS),
        ))
    }

    fn require_permission(
        &self,
        state: &WorkflowState,
        user: &str,
        permission: Permission,
    ) -> Result<(), ServiceError> {
        if state.has_permission(user, permission) {
            Ok(())
        } else {
            Err(WorkflowError::PermissionDenied {
                user: user.to_string(),
                permission,
            }
            .into())
        }
    }

    fn validate_step(&self, state: &WorkflowState, step_key: &str) -> Result<(), ServiceError> {
        let step = self
            .blueprint
            .step(step_key)
            .ok_or_else(|| WorkflowError::UnknownStep(step_key.to_string()))?;

        let mut failures = Vec::new();
        for field in &step.required_fields {
            match state.data.get(*field) {
                Some(value) if !value.is_null() => {}
                _ => failures.push(format!("{field} is required")),
            }
        }
        for rule in &step.validations {
            if let Err(failure) = rule.check(&state.data) {
                if !failures.contains(&failure) {
                    failures.push(failure);
                }
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(WorkflowError::Validation {
                step: step_key.to_string(),
                failures,
            }
            .into())
        }
    }

    /// One pass over the automatic rules, first match wins. Several rules
    /// matching at once is logged but not treated as an error.
    fn apply_auto_rules(&self, state: &mut WorkflowState) -> Option<&'static str> {
        let matched: Vec<&AutoRule> = self
            .blueprint
            .auto_rules()
            .iter()
            .filter(|rule| rule_matches(rule, state))
            .collect();

        if matched.len() > 1 {
            let ids: Vec<&str> = matched.iter().map(|rule| rule.id).collect();
            warn!(rules = ?ids, "multiple automatic transition rules match; applying the first");
        }

        let rule = matched.first()?;
        match &rule.then {
            AutoAction::SetStatus(to) => {
                if state.status == *to {
                    return None;
                }
                match state.set_status(*to) {
                    Ok(()) => Some(rule.id),
                    Err(err) => {
                        warn!(rule = rule.id, %err, "automatic status rule skipped by guard");
                        None
                    }
                }
            }
            AutoAction::AdvanceTo(step_key) => {
                if state.current_step == *step_key {
                    return None;
                }
                match self.blueprint.step(step_key) {
                    Some(target) => {
                        state.record_transition("system", target.phase, target.key);
                        Some(rule.id)
                    }
                    None => {
                        warn!(rule = rule.id, step = step_key, "automatic rule targets unknown step");
                        None
                    }
                }
            }
        }
    }

    fn notify(&self, template: &str, pairs: &[(&str, String)]) -> Result<(), ServiceError> {
        let details: BTreeMap<String, String> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.clone()))
            .collect();
        match self.templates.render(template, &details) {
            Ok(notification) => {
                self.notifier.publish(notification)?;
                Ok(())
            }
            Err(err) => {
                warn!(%err, "notification skipped");
                Ok(())
            }
        }
    }
}

fn rule_matches(rule: &AutoRule, state: &WorkflowState) -> bool {
    if let Some(step) = rule.at_step {
        if state.current_step != step {
            return false;
        }
    }
    match &rule.when {
        AutoCondition::FieldPresent(field) => state
            .data
            .get(*field)
            .map(|value| !value.is_null())
            .unwrap_or(false),
        AutoCondition::FieldEquals { field, value } => state
            .data
            .get(*field)
            .map(|found| value_as_text(found) == *value)
            .unwrap_or(false),
    }
}

fn value_as_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// Error raised by the workflow service.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error(transparent)]
    Workflow(#[from] WorkflowError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Notification(#[from] PublishError),
}
