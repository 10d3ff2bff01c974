use super::state::{StateId, WorkflowState};

/// Storage abstraction so the service module can be exercised in isolation.
/// Persistence is upsert-shaped: the full state record is written back on
/// every mutation.
pub trait StateRepository: Send + Sync {
    fn upsert(&self, state: WorkflowState) -> Result<(), RepositoryError>;
    fn fetch(&self, id: &StateId) -> Result<Option<WorkflowState>, RepositoryError>;
    fn list_active(&self) -> Result<Vec<WorkflowState>, RepositoryError>;
}

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("workflow state not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}
