//! Terminal output helpers

use owo_colors::OwoColorize;

use caseflow_common::{Case, CaseStatus, CaseStatusEvent};

use crate::client::{CaseDetailView, TransitionView};

fn status_label(status: CaseStatus) -> String {
    match status {
        CaseStatus::Closed => status.as_str().red().to_string(),
        CaseStatus::Investigating | CaseStatus::UnderReview => {
            status.as_str().yellow().to_string()
        }
        _ => status.as_str().green().to_string(),
    }
}

pub fn print_case(case: &Case) {
    println!(
        "{}  {}  [{} / {}]",
        case.case_number.bold(),
        case.title,
        status_label(case.status),
        case.court_status.as_str().cyan()
    );
    if let Some(summary) = &case.summary {
        println!("  {}", summary.dimmed());
    }
    println!(
        "  unit {}  opened {}  by {}  reopens {}",
        case.org_unit_id,
        case.created_at.format("%Y-%m-%d"),
        case.created_by,
        case.reopen_count
    );
    if let Some(closed_at) = case.closed_at {
        let outcome = case.outcome_code.as_deref().unwrap_or("-");
        println!("  closed {} outcome {}", closed_at.format("%Y-%m-%d"), outcome);
    }
}

pub fn print_transition(view: &TransitionView) {
    print_case(&view.case);
    if let Some(id) = &view.assignment_id {
        println!("  assignment {}", id.dimmed());
    }
}

pub fn print_detail(detail: &CaseDetailView) {
    print_case(&detail.case);
    if !detail.assignments.is_empty() {
        println!("{}", "assignments:".bold());
        for a in &detail.assignments {
            let lead = if a.is_lead { " (lead)" } else { "" };
            let deadline = a
                .deadline
                .map(|d| d.format("%Y-%m-%d").to_string())
                .unwrap_or_else(|| "-".to_string());
            println!(
                "  {}{}  {}  due {}  {}",
                a.investigator_id,
                lead.bold(),
                a.priority,
                deadline,
                a.status.as_str().dimmed()
            );
        }
    }
    if let Some(order) = &detail.court_assignment {
        println!(
            "{} {}  due {}",
            "court work order:".bold(),
            order.assigned_to,
            order.deadline.format("%Y-%m-%d")
        );
    }
    if detail.final_report.is_some() {
        println!("{}", "final report on file".dimmed());
    }
}

pub fn print_history(events: &[CaseStatusEvent]) {
    for event in events {
        println!(
            "{}  {}/{} -> {}/{}  {} ({})  {}",
            event.created_at.format("%Y-%m-%d %H:%M:%S").dimmed(),
            event.prev_status,
            event.prev_court_status,
            status_label(event.new_status),
            event.new_court_status.as_str().cyan(),
            event.actor_id,
            event.actor_role,
            event.reason
        );
    }
}
