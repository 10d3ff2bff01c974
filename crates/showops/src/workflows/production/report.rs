use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use super::blueprint::ProductionBlueprint;
use super::domain::{ProductionPhase, ProductionRole, WorkflowStatus};
use super::state::WorkflowState;

#[derive(Debug, Clone, Serialize)]
pub struct PhaseProgressEntry {
    pub phase: ProductionPhase,
    pub phase_label: &'static str,
    pub completed: usize,
    pub total: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct RoleLoadEntry {
    pub role: ProductionRole,
    pub role_label: &'static str,
    pub open: usize,
}

/// Point-in-time progress view derived from the blueprint, the pointer
/// position, and the transition log.
#[derive(Debug, Clone, Serialize)]
pub struct ProductionReport {
    pub status: WorkflowStatus,
    pub status_label: &'static str,
    pub current_phase: ProductionPhase,
    pub phase_label: &'static str,
    pub current_step: String,
    pub phase_progress: Vec<PhaseProgressEntry>,
    pub role_load: Vec<RoleLoadEntry>,
    pub transition_count: usize,
    pub last_transition_at: Option<DateTime<Utc>>,
    pub stalled: bool,
}

impl ProductionReport {
    pub(crate) fn build(
        blueprint: &ProductionBlueprint,
        state: &WorkflowState,
        now: DateTime<Utc>,
        stall_after: Duration,
    ) -> Self {
        let completed = state.completed_steps(blueprint);

        let phase_progress = ProductionPhase::ordered()
            .into_iter()
            .map(|phase| {
                let steps = blueprint.steps_for_phase(phase);
                let done = steps
                    .iter()
                    .filter(|step| {
                        blueprint
                            .position(step.key)
                            .map(|position| position < completed)
                            .unwrap_or(false)
                    })
                    .count();
                PhaseProgressEntry {
                    phase,
                    phase_label: phase.label(),
                    completed: done,
                    total: steps.len(),
                }
            })
            .collect();

        let role_load = ProductionRole::ordered()
            .into_iter()
            .filter_map(|role| {
                let owned: Vec<usize> = blueprint
                    .step_templates()
                    .iter()
                    .enumerate()
                    .filter(|(_, step)| step.primary_role == role)
                    .map(|(position, _)| position)
                    .collect();
                if owned.is_empty() {
                    return None;
                }
                let open = owned
                    .iter()
                    .filter(|position| **position >= completed)
                    .count();
                Some(RoleLoadEntry {
                    role,
                    role_label: role.label(),
                    open,
                })
            })
            .collect();

        let last_transition_at = state.last_transition_at();
        let stalled = state.status == WorkflowStatus::Active
            && last_transition_at
                .map(|at| now - at > stall_after)
                .unwrap_or(false);

        Self {
            status: state.status,
            status_label: state.status.label(),
            current_phase: state.current_phase,
            phase_label: state.current_phase.label(),
            current_step: state.current_step.clone(),
            phase_progress,
            role_load,
            transition_count: state.transitions.len(),
            last_transition_at,
            stalled,
        }
    }
}
