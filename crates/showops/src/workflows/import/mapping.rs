use super::normalizer::normalize_name;
use std::collections::HashMap;
use std::sync::OnceLock;

static TRACKER_NAME_MAP: OnceLock<HashMap<String, &'static str>> = OnceLock::new();

pub(crate) fn step_key_for_normalized(normalized_name: &str) -> Option<&'static str> {
    tracker_name_map().get(normalized_name).copied()
}

fn tracker_name_map() -> &'static HashMap<String, &'static str> {
    TRACKER_NAME_MAP.get_or_init(|| {
        const NAME_TO_STEP: &[(&str, &str)] = &[
            // Booking & Offers
            ("Confirm Offer Terms - Promoter", "booking_confirm_offer"),
            ("Confirm Offer Terms \u{2013} Promoter", "booking_confirm_offer"),
            ("Confirm Offer Terms", "booking_confirm_offer"),
            ("Confirm Offer", "booking_confirm_offer"),
            ("Execute Artist Contract - Promoter", "booking_execute_contract"),
            ("Execute Artist Contract", "booking_execute_contract"),
            ("Sign Artist Agreement", "booking_execute_contract"),
            // Advancing
            ("Collect Technical Rider - Tour Manager", "advancing_collect_rider"),
            ("Collect Technical Rider", "advancing_collect_rider"),
            ("Collect Rider", "advancing_collect_rider"),
            (
                "Book Production Vendors - Production Manager",
                "advancing_book_vendors",
            ),
            ("Book Production Vendors", "advancing_book_vendors"),
            ("Book Audio & Lighting Vendors", "advancing_book_vendors"),
            (
                "Approve Staffing Plan - Production Manager",
                "advancing_staffing_plan",
            ),
            ("Approve Staffing Plan", "advancing_staffing_plan"),
            ("Lock Crew Plan", "advancing_staffing_plan"),
            // Production Prep
            (
                "Build Production Schedule - Production Manager",
                "production_build_schedule",
            ),
            ("Build Production Schedule", "production_build_schedule"),
            ("Draft Load-In Schedule", "production_build_schedule"),
            ("Issue Call Sheets - Production Manager", "production_issue_call_sheets"),
            ("Issue Call Sheets", "production_issue_call_sheets"),
            ("Send Call Sheets", "production_issue_call_sheets"),
            (
                "Complete Safety Walkthrough - Crew Chief",
                "production_safety_walkthrough",
            ),
            ("Complete Safety Walkthrough", "production_safety_walkthrough"),
            ("Safety Walkthrough", "production_safety_walkthrough"),
            // Show Day
            ("Clear Doors Checklist - Crew Chief", "showday_doors_checklist"),
            ("Clear Doors Checklist", "showday_doors_checklist"),
            ("Doors Checklist", "showday_doors_checklist"),
            ("File Show Report - Tour Manager", "showday_file_show_report"),
            ("File Show Report", "showday_file_show_report"),
            ("Submit Show Report", "showday_file_show_report"),
            // Settlement & Wrap
            (
                "Reconcile Box Office - Settlement Accountant",
                "settlement_reconcile_box_office",
            ),
            ("Reconcile Box Office", "settlement_reconcile_box_office"),
            ("Box Office Reconciliation", "settlement_reconcile_box_office"),
            (
                "Release Vendor Payments - Settlement Accountant",
                "settlement_pay_vendors",
            ),
            ("Release Vendor Payments", "settlement_pay_vendors"),
            ("Pay Vendors", "settlement_pay_vendors"),
            (
                "Publish Final Settlement Report - Promoter",
                "settlement_final_report",
            ),
            ("Publish Final Settlement Report", "settlement_final_report"),
            ("Final Settlement Report", "settlement_final_report"),
        ];

        let mut map = HashMap::with_capacity(NAME_TO_STEP.len());
        for (name, step_key) in NAME_TO_STEP {
            map.insert(normalize_name(name), *step_key);
        }
        map
    })
}

#[cfg(test)]
pub(crate) fn lookup_for_tests(name: &str) -> Option<&'static str> {
    let normalized = normalize_name(name);
    step_key_for_normalized(&normalized)
}
