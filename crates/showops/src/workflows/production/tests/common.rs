use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde_json::{json, Map, Value};

use crate::notifications::{Notification, NotificationPublisher, PublishError};
use crate::workflows::production::repository::RepositoryError;
use crate::workflows::production::{
    domain::{Permission, PermissionGrant, ProductionRole},
    StateId, StateRepository, WorkflowService, WorkflowState,
};

#[derive(Default)]
pub(super) struct InMemoryStateRepository {
    records: Mutex<HashMap<StateId, WorkflowState>>,
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
            .filter(|state| state.status == crate::workflows::production::domain::WorkflowStatus::Active)
            .cloned()
            .collect())
    }
}

#[derive(Default)]
pub(super) struct RecordingPublisher {
    events: Mutex<Vec<Notification>>,
}

impl RecordingPublisher {
    pub(super) fn events(&self) -> Vec<Notification> {
        self.events.lock().expect("publisher mutex poisoned").clone()
    }
}

impl NotificationPublisher for RecordingPublisher {
    fn publish(&self, notification: Notification) -> Result<(), PublishError> {
        let mut guard = self.events.lock().expect("publisher mutex poisoned");
        guard.push(notification);
        Ok(())
    }
}

pub(super) fn promoter_grant(user: &str) -> PermissionGrant {
    PermissionGrant {
        user_id: user.to_string(),
        role: ProductionRole::Promoter,
        permissions: vec![Permission::View, Permission::Edit, Permission::Transition],
    }
}

pub(super) fn admin_grant(user: &str) -> PermissionGrant {
    PermissionGrant {
        user_id: user.to_string(),
        role: ProductionRole::ProductionManager,
        permissions: vec![Permission::Administer],
    }
}

pub(super) type TestService = WorkflowService<InMemoryStateRepository, RecordingPublisher>;

pub(super) fn service() -> (TestService, Arc<InMemoryStateRepository>, Arc<RecordingPublisher>) {
    let repository = Arc::new(InMemoryStateRepository::default());
    let publisher = Arc::new(RecordingPublisher::default());
    let service = WorkflowService::new(repository.clone(), publisher.clone());
    (service, repository, publisher)
}

pub(super) fn booking_offer_patch() -> Map<String, Value> {
    let mut patch = Map::new();
    patch.insert("venue".to_string(), json!("Grand Hall"));
    patch.insert("event_date".to_string(), json!("2026-05-02"));
    patch.insert("artist_fee".to_string(), json!(18_000));
    patch
}
