use crate::infra::{
    register_webhook_handlers, standard_chains, standard_sync_rules, InMemoryRecordSink,
    InMemoryStateRepository, OfflineProviderClient, RecordingPublisher,
};
use clap::Args;
use serde_json::{json, Map};
use showops::error::AppError;
use showops::integrations::webhook::sign;
use showops::integrations::{
    ChainEngine, ProviderRegistry, RetryPolicy, StepStatus, SyncManager, WebhookProcessor,
};
use showops::workflows::import::ScheduleImporter;
use showops::workflows::production::domain::{Permission, PermissionGrant, ProductionRole};
use showops::workflows::production::{ProductionBlueprint, WorkflowService};
use std::path::PathBuf;
use std::sync::Arc;

const DEMO_SECRET: &str = "demo-secret";

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Skip the integration hub portion of the demo (chains, sync, webhooks).
    #[arg(long)]
    pub(crate) skip_integrations: bool,
    /// Print the full blueprint step listing at the end.
    #[arg(long)]
    pub(crate) list_steps: bool,
}

#[derive(Args, Debug)]
pub(crate) struct ImportArgs {
    /// Tracker CSV export to hydrate a production workflow from
    #[arg(long)]
    pub(crate) csv: PathBuf,
    /// Print every blueprint step with its imported status
    #[arg(long)]
    pub(crate) list_steps: bool,
}

pub(crate) async fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let repository = Arc::new(InMemoryStateRepository::default());
    let publisher = Arc::new(RecordingPublisher::default());
    let service = WorkflowService::new(repository, publisher.clone());

    let grants = vec![
        PermissionGrant {
            user_id: "ava.promoter".to_string(),
            role: ProductionRole::Promoter,
            permissions: vec![Permission::View, Permission::Edit, Permission::Transition],
        },
        PermissionGrant {
            user_id: "ops.admin".to_string(),
            role: ProductionRole::ProductionManager,
            permissions: vec![Permission::Administer],
        },
    ];

    println!("== Production workflow ==");
    let state = service.create(grants)?;
    println!("created {} ({})", state.id, state.view().status_label);

    service.activate(&state.id, "ava.promoter")?;

    let mut offer = Map::new();
    offer.insert("venue".to_string(), json!("Grand Hall"));
    offer.insert("event_date".to_string(), json!("2026-05-02"));
    offer.insert("artist_fee".to_string(), json!(18_000));
    service.advance(&state.id, "ava.promoter", "booking_execute_contract", offer)?;

    let mut contract = Map::new();
    contract.insert("contract_reference".to_string(), json!("CT-2026-0148"));
    let outcome =
        service.advance(&state.id, "ava.promoter", "advancing_collect_rider", contract)?;
    println!(
        "advanced to {} / {}",
        outcome.state.view().phase_label,
        outcome.state.current_step
    );

    let report = service.report(&state.id)?;
    for entry in &report.phase_progress {
        println!(
            "  {:<20} {}/{} steps complete",
            entry.phase_label, entry.completed, entry.total
        );
    }
    println!(
        "notifications published: {}",
        publisher.events().len()
    );

    if !args.skip_integrations {
        run_integration_demo().await?;
    }

    if args.list_steps {
        println!("\n== Blueprint steps ==");
        let blueprint = ProductionBlueprint::standard();
        for step in blueprint.step_templates() {
            println!(
                "  [{}] {} ({})",
                step.phase.label(),
                step.name,
                step.primary_role.label()
            );
        }
    }

    Ok(())
}

async fn run_integration_demo() -> Result<(), AppError> {
    let registry = Arc::new(ProviderRegistry::standard());
    let client = Arc::new(OfflineProviderClient);

    println!("\n== Orchestration chain ==");
    let engine = ChainEngine::new(registry.clone(), client.clone(), RetryPolicy::default());
    let chains = standard_chains();
    let chain = chains
        .get("announce_on_sale")
        .expect("standard catalog ships the announce chain");
    let run = engine.run(chain, json!({ "low_inventory": true })).await;
    println!("chain {} finished: {:?}", run.chain, run.status);
    for step in &run.steps {
        let marker = match step.status {
            StepStatus::Succeeded => "ok",
            StepStatus::Failed => "failed",
            StepStatus::Skipped => "skipped",
        };
        println!("  {:<16} {} (attempts: {})", step.id, marker, step.attempts);
    }

    println!("\n== Sync pull ==");
    let sink = InMemoryRecordSink::default();
    let manager = SyncManager::new(
        registry.clone(),
        client,
        standard_sync_rules(),
        Arc::new(sink.clone()),
    );
    let summaries = manager
        .pull("eventbrite")
        .await
        .map_err(|err| AppError::Integration(Box::new(err)))?;
    for summary in &summaries {
        println!(
            "  {} from {}: pulled {}, stored {}, failed {}",
            summary.entity, summary.provider, summary.pulled, summary.stored, summary.failed
        );
    }
    println!("  sink now holds {} records", sink.records().len());

    println!("\n== Webhook delivery ==");
    let mut processor = WebhookProcessor::new(DEMO_SECRET, registry);
    register_webhook_handlers(&mut processor);
    let body = json!({
        "provider": "eventbrite",
        "event_type": "order.placed",
        "payload": { "order_id": "ord-1", "gross_cents": 12050 },
    })
    .to_string();
    let summary = processor
        .process("eventbrite", Some(&sign(DEMO_SECRET, &body)), &body)
        .map_err(|err| AppError::Integration(Box::new(err)))?;
    println!(
        "  {} {} handled: {}",
        summary.provider, summary.event_type, summary.handled
    );

    Ok(())
}

pub(crate) fn run_schedule_import(args: ImportArgs) -> Result<(), AppError> {
    let outcome = ScheduleImporter::from_path(&args.csv)?;

    println!("imported {}", args.csv.display());
    println!(
        "  status: {} at {} / {}",
        outcome.state.view().status_label,
        outcome.state.view().phase_label,
        outcome.state.current_step
    );
    println!("  steps applied: {}", outcome.applied.len());
    if let Some(step) = outcome.in_progress {
        println!("  in progress: {step}");
    }
    if !outcome.out_of_order.is_empty() {
        println!(
            "  completed out of order (not applied): {}",
            outcome.out_of_order.join(", ")
        );
    }
    if outcome.unmatched_rows > 0 {
        println!("  unmatched rows skipped: {}", outcome.unmatched_rows);
    }

    if args.list_steps {
        let blueprint = ProductionBlueprint::standard();
        println!("\n== Step status ==");
        for step in blueprint.step_templates() {
            let marker = if outcome.applied.contains(&step.key) {
                "x"
            } else if outcome.state.current_step == step.key {
                "~"
            } else {
                " "
            };
            println!("  [{marker}] {} ({})", step.name, step.phase.label());
        }
    }

    Ok(())
}
