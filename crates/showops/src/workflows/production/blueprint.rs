use super::domain::{ProductionPhase, ProductionRole, ValidationRule, WorkflowStatus};

/// Statically registered workflow definition: ordered steps grouped into
/// phases, plus the automatic transition rules evaluated after each move.
/// Definitions live in code, not data.
#[derive(Debug)]
pub struct ProductionBlueprint {
    id: &'static str,
    steps: Vec<StepTemplate>,
    auto_rules: Vec<AutoRule>,
}

#[derive(Debug, Clone)]
pub struct StepTemplate {
    pub key: &'static str,
    pub name: &'static str,
    pub phase: ProductionPhase,
    pub primary_role: ProductionRole,
    pub required_fields: Vec<&'static str>,
    pub validations: Vec<ValidationRule>,
}

/// Automatic transition rule. Rules are scanned in declaration order and
/// the first match wins; the service logs a warning when several match.
#[derive(Debug, Clone)]
pub struct AutoRule {
    pub id: &'static str,
    /// Restricts the rule to a specific current step; `None` matches any.
    pub at_step: Option<&'static str>,
    pub when: AutoCondition,
    pub then: AutoAction,
}

#[derive(Debug, Clone)]
pub enum AutoCondition {
    FieldPresent(&'static str),
    FieldEquals {
        field: &'static str,
        value: &'static str,
    },
}

#[derive(Debug, Clone)]
pub enum AutoAction {
    SetStatus(WorkflowStatus),
    AdvanceTo(&'static str),
}

impl ProductionBlueprint {
    pub fn standard() -> Self {
        Self {
            id: "event_production",
            steps: standard_step_templates(),
            auto_rules: standard_auto_rules(),
        }
    }

    pub fn id(&self) -> &'static str {
        self.id
    }

    pub fn step_templates(&self) -> &[StepTemplate] {
        &self.steps
    }

    pub fn step(&self, key: &str) -> Option<&StepTemplate> {
        self.steps.iter().find(|step| step.key == key)
    }

    pub fn steps_for_phase(&self, phase: ProductionPhase) -> Vec<&StepTemplate> {
        self.steps.iter().filter(|step| step.phase == phase).collect()
    }

    pub fn first_step(&self) -> &StepTemplate {
        &self.steps[0]
    }

    pub fn position(&self, key: &str) -> Option<usize> {
        self.steps.iter().position(|step| step.key == key)
    }

    /// Successor in blueprint order; the last step of a phase flows into the
    /// first step of the next phase. `None` past the final step.
    pub fn next_step_after(&self, key: &str) -> Option<&StepTemplate> {
        let position = self.position(key)?;
        self.steps.get(position + 1)
    }

    pub fn auto_rules(&self) -> &[AutoRule] {
        &self.auto_rules
    }
}

fn standard_step_templates() -> Vec<StepTemplate> {
    vec![
        StepTemplate {
            key: "booking_confirm_offer",
            name: "Confirm Offer Terms",
            phase: ProductionPhase::Booking,
            primary_role: ProductionRole::Promoter,
            required_fields: vec!["venue", "event_date", "artist_fee"],
            validations: vec![
                ValidationRule::NonEmptyText("venue"),
                ValidationRule::IsoDate("event_date"),
                ValidationRule::PositiveNumber("artist_fee"),
            ],
        },
        StepTemplate {
            key: "booking_execute_contract",
            name: "Execute Artist Contract",
            phase: ProductionPhase::Booking,
            primary_role: ProductionRole::Promoter,
            required_fields: vec!["contract_reference"],
            validations: vec![ValidationRule::NonEmptyText("contract_reference")],
        },
        StepTemplate {
            key: "advancing_collect_rider",
            name: "Collect Technical Rider",
            phase: ProductionPhase::Advancing,
            primary_role: ProductionRole::TourManager,
            required_fields: vec!["technical_rider_url"],
            validations: vec![ValidationRule::NonEmptyText("technical_rider_url")],
        },
        StepTemplate {
            key: "advancing_book_vendors",
            name: "Book Production Vendors",
            phase: ProductionPhase::Advancing,
            primary_role: ProductionRole::ProductionManager,
            required_fields: vec!["audio_vendor", "lighting_vendor"],
            validations: vec![
                ValidationRule::NonEmptyText("audio_vendor"),
                ValidationRule::NonEmptyText("lighting_vendor"),
            ],
        },
        StepTemplate {
            key: "advancing_staffing_plan",
            name: "Approve Staffing Plan",
            phase: ProductionPhase::Advancing,
            primary_role: ProductionRole::ProductionManager,
            required_fields: vec!["crew_headcount"],
            validations: vec![ValidationRule::PositiveNumber("crew_headcount")],
        },
        StepTemplate {
            key: "production_build_schedule",
            name: "Build Production Schedule",
            phase: ProductionPhase::Production,
            primary_role: ProductionRole::ProductionManager,
            required_fields: vec!["load_in_date", "doors_date"],
            validations: vec![
                ValidationRule::IsoDate("load_in_date"),
                ValidationRule::IsoDate("doors_date"),
                ValidationRule::DateOrdered {
                    earlier: "load_in_date",
                    later: "doors_date",
                },
            ],
        },
        StepTemplate {
            key: "production_issue_call_sheets",
            name: "Issue Call Sheets",
            phase: ProductionPhase::Production,
            primary_role: ProductionRole::ProductionManager,
            required_fields: vec!["call_time"],
            validations: vec![ValidationRule::NonEmptyText("call_time")],
        },
        StepTemplate {
            key: "production_safety_walkthrough",
            name: "Complete Safety Walkthrough",
            phase: ProductionPhase::Production,
            primary_role: ProductionRole::CrewChief,
            required_fields: vec!["walkthrough_signoff"],
            validations: vec![ValidationRule::NonEmptyText("walkthrough_signoff")],
        },
        StepTemplate {
            key: "showday_doors_checklist",
            name: "Clear Doors Checklist",
            phase: ProductionPhase::ShowDay,
            primary_role: ProductionRole::CrewChief,
            required_fields: vec![],
            validations: vec![],
        },
        StepTemplate {
            key: "showday_file_show_report",
            name: "File Show Report",
            phase: ProductionPhase::ShowDay,
            primary_role: ProductionRole::TourManager,
            required_fields: vec!["attendance"],
            validations: vec![ValidationRule::PositiveNumber("attendance")],
        },
        StepTemplate {
            key: "settlement_reconcile_box_office",
            name: "Reconcile Box Office",
            phase: ProductionPhase::Settlement,
            primary_role: ProductionRole::SettlementAccountant,
            required_fields: vec!["gross_receipts"],
            validations: vec![ValidationRule::PositiveNumber("gross_receipts")],
        },
        StepTemplate {
            key: "settlement_pay_vendors",
            name: "Release Vendor Payments",
            phase: ProductionPhase::Settlement,
            primary_role: ProductionRole::SettlementAccountant,
            required_fields: vec!["vendor_invoices_cleared"],
            validations: vec![ValidationRule::NonEmptyText("vendor_invoices_cleared")],
        },
        StepTemplate {
            key: "settlement_final_report",
            name: "Publish Final Settlement Report",
            phase: ProductionPhase::Settlement,
            primary_role: ProductionRole::Promoter,
            required_fields: vec!["settlement_total"],
            validations: vec![ValidationRule::PositiveNumber("settlement_total")],
        },
    ]
}

fn standard_auto_rules() -> Vec<AutoRule> {
    vec![
        AutoRule {
            id: "halt_on_cancellation",
            at_step: None,
            when: AutoCondition::FieldPresent("cancellation_reason"),
            then: AutoAction::SetStatus(WorkflowStatus::Cancelled),
        },
        AutoRule {
            id: "flag_incident_review",
            at_step: None,
            when: AutoCondition::FieldEquals {
                field: "incident_reported",
                value: "true",
            },
            then: AutoAction::SetStatus(WorkflowStatus::Error),
        },
        AutoRule {
            id: "skip_doors_checklist",
            at_step: Some("showday_doors_checklist"),
            when: AutoCondition::FieldEquals {
                field: "doors_cleared",
                value: "true",
            },
            then: AutoAction::AdvanceTo("showday_file_show_report"),
        },
        AutoRule {
            id: "close_out_settlement",
            at_step: Some("settlement_final_report"),
            when: AutoCondition::FieldPresent("settlement_total"),
            then: AutoAction::SetStatus(WorkflowStatus::Completed),
        },
    ]
}
