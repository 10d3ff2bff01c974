pub mod domain;

mod blueprint;
mod report;
mod repository;
mod service;
mod state;

#[cfg(test)]
mod tests;

pub use blueprint::{AutoAction, AutoCondition, AutoRule, ProductionBlueprint, StepTemplate};
pub use report::{PhaseProgressEntry, ProductionReport, RoleLoadEntry};
pub use repository::{RepositoryError, StateRepository};
pub use service::{AdvanceOutcome, ServiceError, WorkflowService};
pub use state::{StateId, StateView, TransitionRecord, WorkflowState};
