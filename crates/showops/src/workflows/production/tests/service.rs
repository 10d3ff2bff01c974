use serde_json::{json, Map, Value};

use super::common::{admin_grant, booking_offer_patch, promoter_grant, service, TestService};
use crate::workflows::production::domain::{WorkflowError, WorkflowStatus};
use crate::workflows::production::repository::StateRepository;
use crate::workflows::production::{ServiceError, StateId};

#[test]
fn create_persists_a_draft_and_notifies() {
    let (service, repository, publisher) = service();
    let state = service
        .create(vec![promoter_grant("ava.promoter")])
        .expect("create succeeds");

    let stored = repository
        .fetch(&state.id)
        .expect("fetch succeeds")
        .expect("state stored");
    assert_eq!(stored.status, WorkflowStatus::Draft);

    let events = publisher.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].template, "production_created");
}

#[test]
fn advance_requires_an_active_workflow() {
    let (service, _, _) = service();
    let state = service
        .create(vec![promoter_grant("ava.promoter")])
        .expect("create succeeds");

    let error = service
        .advance(
            &state.id,
            "ava.promoter",
            "booking_execute_contract",
            booking_offer_patch(),
        )
        .expect_err("draft workflows cannot advance");
    match error {
        ServiceError::Workflow(WorkflowError::NotActive { status }) => {
            assert_eq!(status, WorkflowStatus::Draft);
        }
        other => panic!("expected not-active error, got {other:?}"),
    }
}

#[test]
fn advance_validates_the_step_being_exited() {
    let (service, _, _) = service();
    let state = service
        .create(vec![promoter_grant("ava.promoter")])
        .expect("create succeeds");
    service
        .activate(&state.id, "ava.promoter")
        .expect("activation succeeds");

    let mut incomplete = Map::new();
    incomplete.insert("venue".to_string(), json!("Grand Hall"));

    let error = service
        .advance(&state.id, "ava.promoter", "booking_execute_contract", incomplete)
        .expect_err("missing offer fields fail validation");
    match error {
        ServiceError::Workflow(WorkflowError::Validation { step, failures }) => {
            assert_eq!(step, "booking_confirm_offer");
            assert!(failures.iter().any(|failure| failure.contains("event_date")));
            assert!(failures.iter().any(|failure| failure.contains("artist_fee")));
        }
        other => panic!("expected validation error, got {other:?}"),
    }
}

#[test]
fn advance_moves_the_pointer_and_notifies_on_phase_change() {
    let (service, _, publisher) = service();
    let state = service
        .create(vec![promoter_grant("ava.promoter")])
        .expect("create succeeds");
    service
        .activate(&state.id, "ava.promoter")
        .expect("activation succeeds");

    let outcome = service
        .advance(
            &state.id,
            "ava.promoter",
            "booking_execute_contract",
            booking_offer_patch(),
        )
        .expect("advance within booking succeeds");
    assert_eq!(outcome.state.current_step, "booking_execute_contract");
    assert!(outcome.auto_applied.is_none());

    let mut contract = Map::new();
    contract.insert("contract_reference".to_string(), json!("CT-2026-0148"));
    let outcome = service
        .advance(&state.id, "ava.promoter", "advancing_collect_rider", contract)
        .expect("advance into advancing succeeds");
    assert_eq!(outcome.state.transitions.len(), 2);

    let events = publisher.events();
    assert!(events
        .iter()
        .any(|event| event.template == "phase_advanced" && event.subject.contains("Advancing")));
}

#[test]
fn advance_rejects_users_without_the_transition_permission() {
    let (service, _, _) = service();
    let state = service
        .create(vec![promoter_grant("ava.promoter")])
        .expect("create succeeds");
    service
        .activate(&state.id, "ava.promoter")
        .expect("activation succeeds");

    let error = service
        .advance(&state.id, "intern", "booking_execute_contract", booking_offer_patch())
        .expect_err("unknown user denied");
    match error {
        ServiceError::Workflow(WorkflowError::PermissionDenied { user, .. }) => {
            assert_eq!(user, "intern");
        }
        other => panic!("expected permission error, got {other:?}"),
    }
}

#[test]
fn advance_rejects_unknown_target_steps() {
    let (service, _, _) = service();
    let state = service
        .create(vec![promoter_grant("ava.promoter")])
        .expect("create succeeds");
    service
        .activate(&state.id, "ava.promoter")
        .expect("activation succeeds");

    let error = service
        .advance(&state.id, "ava.promoter", "booking_sign_napkin", booking_offer_patch())
        .expect_err("unknown step rejected");
    match error {
        ServiceError::Workflow(WorkflowError::UnknownStep(key)) => {
            assert_eq!(key, "booking_sign_napkin");
        }
        other => panic!("expected unknown step error, got {other:?}"),
    }
}

#[test]
fn cancellation_reason_triggers_the_automatic_halt_rule() {
    let (service, _, _) = service();
    let state = service
        .create(vec![promoter_grant("ava.promoter")])
        .expect("create succeeds");
    service
        .activate(&state.id, "ava.promoter")
        .expect("activation succeeds");

    let mut patch = booking_offer_patch();
    patch.insert("cancellation_reason".to_string(), json!("artist illness"));

    let outcome = service
        .advance(&state.id, "ava.promoter", "booking_execute_contract", patch)
        .expect("advance succeeds");
    assert_eq!(outcome.auto_applied, Some("halt_on_cancellation"));
    assert_eq!(outcome.state.status, WorkflowStatus::Cancelled);
}

#[test]
fn first_matching_auto_rule_wins_when_several_match() {
    let (service, _, _) = service();
    let state = service
        .create(vec![admin_grant("ops.admin")])
        .expect("create succeeds");
    service
        .activate(&state.id, "ops.admin")
        .expect("activation succeeds");

    // Both halt_on_cancellation and flag_incident_review match; declaration
    // order decides.
    let mut patch = booking_offer_patch();
    patch.insert("cancellation_reason".to_string(), json!("weather"));
    patch.insert("incident_reported".to_string(), json!("true"));

    let outcome = service
        .advance(&state.id, "ops.admin", "booking_execute_contract", patch)
        .expect("advance succeeds");
    assert_eq!(outcome.auto_applied, Some("halt_on_cancellation"));
    assert_eq!(outcome.state.status, WorkflowStatus::Cancelled);
}

#[test]
fn doors_cleared_flag_skips_the_checklist_step() {
    let (service, _, _) = service();
    let state = service
        .create(vec![admin_grant("ops.admin")])
        .expect("create succeeds");
    service
        .activate(&state.id, "ops.admin")
        .expect("activation succeeds");

    walk_to_safety_walkthrough(&service, &state.id);

    let mut patch = Map::new();
    patch.insert("walkthrough_signoff".to_string(), json!("crew chief"));
    patch.insert("doors_cleared".to_string(), json!("true"));
    let outcome = service
        .advance(&state.id, "ops.admin", "showday_doors_checklist", patch)
        .expect("advance succeeds");

    assert_eq!(outcome.auto_applied, Some("skip_doors_checklist"));
    assert_eq!(outcome.state.current_step, "showday_file_show_report");
    let last = outcome
        .state
        .transitions
        .last()
        .expect("auto transition recorded");
    assert_eq!(last.actor, "system");
}

#[test]
fn cancel_requires_the_cancel_permission_and_notifies() {
    let (service, _, publisher) = service();
    let state = service
        .create(vec![promoter_grant("ava.promoter"), admin_grant("ops.admin")])
        .expect("create succeeds");
    service
        .activate(&state.id, "ava.promoter")
        .expect("activation succeeds");

    let error = service
        .set_status(&state.id, "ava.promoter", WorkflowStatus::Cancelled)
        .expect_err("promoter lacks cancel");
    assert!(matches!(
        error,
        ServiceError::Workflow(WorkflowError::PermissionDenied { .. })
    ));

    let state = service
        .set_status(&state.id, "ops.admin", WorkflowStatus::Cancelled)
        .expect("admin cancels");
    assert_eq!(state.status, WorkflowStatus::Cancelled);
    assert!(publisher
        .events()
        .iter()
        .any(|event| event.template == "production_cancelled"));
}

#[test]
fn set_status_honors_the_guard() {
    let (service, _, _) = service();
    let state = service
        .create(vec![admin_grant("ops.admin")])
        .expect("create succeeds");

    let error = service
        .set_status(&state.id, "ops.admin", WorkflowStatus::Completed)
        .expect_err("draft cannot jump straight to completed");
    assert!(matches!(
        error,
        ServiceError::Workflow(WorkflowError::StatusJump { .. })
    ));
}

#[test]
fn complete_validates_the_current_step_first() {
    let (service, _, _) = service();
    let state = service
        .create(vec![admin_grant("ops.admin")])
        .expect("create succeeds");
    service
        .activate(&state.id, "ops.admin")
        .expect("activation succeeds");

    let error = service
        .complete(&state.id, "ops.admin", Map::new())
        .expect_err("first step data missing");
    assert!(matches!(
        error,
        ServiceError::Workflow(WorkflowError::Validation { .. })
    ));
}

#[test]
fn complete_merges_final_data_and_closes_out() {
    let (service, _, publisher) = service();
    let state = service
        .create(vec![admin_grant("ops.admin")])
        .expect("create succeeds");
    service
        .activate(&state.id, "ops.admin")
        .expect("activation succeeds");

    walk_to_settlement_final(&service, &state.id);

    let mut patch = Map::new();
    patch.insert("settlement_total".to_string(), json!(96_400));
    let stored = service
        .complete(&state.id, "ops.admin", patch)
        .expect("completion succeeds");
    assert_eq!(stored.status, WorkflowStatus::Completed);

    let closed = publisher
        .events()
        .into_iter()
        .find(|event| event.template == "settlement_closed")
        .expect("settlement notification published");
    assert!(closed.body.contains("96400"));
}

#[test]
fn report_tracks_phase_progress_and_role_load() {
    let (service, _, _) = service();
    let state = service
        .create(vec![admin_grant("ops.admin")])
        .expect("create succeeds");
    service
        .activate(&state.id, "ops.admin")
        .expect("activation succeeds");
    service
        .advance(
            &state.id,
            "ops.admin",
            "booking_execute_contract",
            booking_offer_patch(),
        )
        .expect("advance succeeds");

    let report = service.report(&state.id).expect("report builds");
    assert_eq!(report.phase_progress.len(), 5);
    assert_eq!(report.phase_progress[0].completed, 1);
    assert_eq!(report.phase_progress[0].total, 2);
    assert!(!report.stalled);
    assert_eq!(report.transition_count, 1);

    let promoter_load = report
        .role_load
        .iter()
        .find(|entry| entry.role_label == "Promoter")
        .expect("promoter load tracked");
    assert_eq!(promoter_load.open, 2);
}

/// Advances a fresh active workflow until the safety walkthrough is the
/// current step.
fn walk_to_safety_walkthrough(service: &TestService, id: &StateId) {
    let steps: [(&str, &[(&str, Value)]); 7] = [
        (
            "booking_execute_contract",
            &[
                ("venue", json!("Grand Hall")),
                ("event_date", json!("2026-05-02")),
                ("artist_fee", json!(18_000)),
            ],
        ),
        (
            "advancing_collect_rider",
            &[("contract_reference", json!("CT-1"))],
        ),
        (
            "advancing_book_vendors",
            &[("technical_rider_url", json!("https://riders.example/ct1"))],
        ),
        (
            "advancing_staffing_plan",
            &[
                ("audio_vendor", json!("Clearwave Audio")),
                ("lighting_vendor", json!("Northlight")),
            ],
        ),
        (
            "production_build_schedule",
            &[("crew_headcount", json!(24))],
        ),
        (
            "production_issue_call_sheets",
            &[
                ("load_in_date", json!("2026-05-01")),
                ("doors_date", json!("2026-05-02")),
            ],
        ),
        (
            "production_safety_walkthrough",
            &[("call_time", json!("14:00"))],
        ),
    ];

    for (to_step, pairs) in steps {
        let mut patch = Map::new();
        for (key, value) in pairs {
            patch.insert(key.to_string(), value.clone());
        }
        service
            .advance(id, "ops.admin", to_step, patch)
            .unwrap_or_else(|err| panic!("walk failed entering {to_step}: {err}"));
    }
}

fn walk_to_settlement_final(service: &TestService, id: &StateId) {
    walk_to_safety_walkthrough(service, id);

    let mut signoff = Map::new();
    signoff.insert("walkthrough_signoff".to_string(), json!("crew chief"));
    service
        .advance(id, "ops.admin", "showday_doors_checklist", signoff)
        .expect("walkthrough completes");

    service
        .advance(id, "ops.admin", "showday_file_show_report", Map::new())
        .expect("doors checklist has no requirements");

    let mut attendance = Map::new();
    attendance.insert("attendance".to_string(), json!(1_850));
    service
        .advance(id, "ops.admin", "settlement_reconcile_box_office", attendance)
        .expect("show report files");

    let mut receipts = Map::new();
    receipts.insert("gross_receipts".to_string(), json!(120_500));
    service
        .advance(id, "ops.admin", "settlement_pay_vendors", receipts)
        .expect("box office reconciles");

    let mut invoices = Map::new();
    invoices.insert("vendor_invoices_cleared".to_string(), json!("all cleared"));
    service
        .advance(id, "ops.admin", "settlement_final_report", invoices)
        .expect("vendor payments release");
}
