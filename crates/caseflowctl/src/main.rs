//! Caseflow Control - CLI client for the caseflow daemon
//!
//! Drives the daemon's HTTP API: OB intake, the workflow transitions,
//! report filing, and the read paths.

mod client;
mod output;

use anyhow::Result;
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use serde_json::json;

use caseflow_common::CaseStatusEvent;
use client::{CaseDetailView, CaseflowClient, TransitionView};

#[derive(Parser)]
#[command(name = "caseflowctl")]
#[command(about = "Caseflow - criminal case record workflow", long_about = None)]
#[command(version)]
struct Cli {
    /// Daemon base URL
    #[arg(long, global = true, default_value = "http://127.0.0.1:8790")]
    server: String,

    /// Acting user id (forwarded as x-user-id)
    #[arg(long, global = true)]
    user: Option<String>,

    /// Acting user role (forwarded as x-user-role)
    #[arg(long, global = true)]
    role: Option<String>,

    /// Acting user's org unit (forwarded as x-org-unit)
    #[arg(long, global = true)]
    org: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Record a new case at the OB desk
    New {
        title: String,
        #[arg(long)]
        summary: Option<String>,
    },

    /// Submit a draft case for station review
    Submit { case_id: String },

    /// Accept a submitted case for station review
    Approve {
        case_id: String,
        #[arg(long)]
        reason: Option<String>,
    },

    /// Return a case to the OB desk for revision
    Return {
        case_id: String,
        #[arg(long)]
        reason: Option<String>,
    },

    /// Assign (or re-assign) an investigator
    Assign {
        case_id: String,
        #[arg(long)]
        investigator: String,
        /// RFC 3339 deadline, e.g. 2026-09-01T00:00:00Z
        #[arg(long)]
        deadline: DateTime<Utc>,
        #[arg(long)]
        lead: bool,
        #[arg(long)]
        priority: Option<String>,
        #[arg(long)]
        notes: Option<String>,
    },

    /// Mark the investigation ready for court
    Escalate { case_id: String },

    /// Submit (or resubmit) the case to court
    SendCourt {
        case_id: String,
        #[arg(long)]
        deadline: Option<DateTime<Utc>>,
        #[arg(long)]
        notes: Option<String>,
    },

    /// Court: return the case with a work order
    CourtAssign {
        case_id: String,
        #[arg(long)]
        investigator: String,
        #[arg(long)]
        deadline: DateTime<Utc>,
        #[arg(long)]
        notes: Option<String>,
    },

    /// Court: dispose of the case
    CourtClose {
        case_id: String,
        #[arg(long)]
        reason: String,
        #[arg(long)]
        outcome: Option<String>,
        #[arg(long)]
        decision_ref: Option<String>,
    },

    /// Close the case at the station
    Close {
        case_id: String,
        #[arg(long)]
        reason: String,
        #[arg(long)]
        outcome: Option<String>,
    },

    /// Reopen a closed case
    Reopen {
        case_id: String,
        #[arg(long)]
        reason: String,
    },

    /// File the final investigation report
    Report { case_id: String },

    /// Sign the filed final report
    Sign { case_id: String },

    /// Show a case with its assignments
    Show { case_id: String },

    /// Show the status history ledger
    History { case_id: String },

    /// Add or update a directory user (super admin)
    AddUser {
        id: String,
        #[arg(long)]
        username: String,
        #[arg(long)]
        role: String,
        #[arg(long)]
        org_unit: String,
    },

    /// Check daemon health
    Health,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let client = CaseflowClient::new(&cli.server, cli.user, cli.role, cli.org);

    match cli.command {
        Commands::New { title, summary } => {
            let value = client
                .post("/v1/cases", &json!({ "title": title, "summary": summary }))
                .await?;
            let case: caseflow_common::Case = serde_json::from_value(value)?;
            output::print_case(&case);
        }

        Commands::Submit { case_id } => {
            transition(&client, &format!("/v1/cases/{case_id}/submit"), None).await?;
        }

        Commands::Approve { case_id, reason } => {
            transition(
                &client,
                &format!("/v1/cases/{case_id}/approve"),
                Some(json!({ "reason": reason })),
            )
            .await?;
        }

        Commands::Return { case_id, reason } => {
            transition(
                &client,
                &format!("/v1/cases/{case_id}/return"),
                Some(json!({ "reason": reason })),
            )
            .await?;
        }

        Commands::Assign {
            case_id,
            investigator,
            deadline,
            lead,
            priority,
            notes,
        } => {
            transition(
                &client,
                &format!("/v1/cases/{case_id}/assignments"),
                Some(json!({
                    "investigator_id": investigator,
                    "deadline": deadline,
                    "is_lead": lead,
                    "priority": priority,
                    "notes": notes,
                })),
            )
            .await?;
        }

        Commands::Escalate { case_id } => {
            transition(&client, &format!("/v1/cases/{case_id}/escalate"), None).await?;
        }

        Commands::SendCourt {
            case_id,
            deadline,
            notes,
        } => {
            transition(
                &client,
                &format!("/v1/cases/{case_id}/court/submit"),
                Some(json!({ "court_deadline": deadline, "court_notes": notes })),
            )
            .await?;
        }

        Commands::CourtAssign {
            case_id,
            investigator,
            deadline,
            notes,
        } => {
            transition(
                &client,
                &format!("/v1/cases/{case_id}/court/assign-back"),
                Some(json!({
                    "investigator_id": investigator,
                    "deadline": deadline,
                    "notes": notes,
                })),
            )
            .await?;
        }

        Commands::CourtClose {
            case_id,
            reason,
            outcome,
            decision_ref,
        } => {
            transition(
                &client,
                &format!("/v1/cases/{case_id}/court/close"),
                Some(json!({
                    "reason": reason,
                    "outcome_code": outcome,
                    "court_decision_ref": decision_ref,
                })),
            )
            .await?;
        }

        Commands::Close {
            case_id,
            reason,
            outcome,
        } => {
            transition(
                &client,
                &format!("/v1/cases/{case_id}/close"),
                Some(json!({ "reason": reason, "outcome_code": outcome })),
            )
            .await?;
        }

        Commands::Reopen { case_id, reason } => {
            transition(
                &client,
                &format!("/v1/cases/{case_id}/reopen"),
                Some(json!({ "reason": reason })),
            )
            .await?;
        }

        Commands::Report { case_id } => {
            client
                .post_empty(&format!("/v1/cases/{case_id}/report"))
                .await?;
            println!("final report filed for {case_id}");
        }

        Commands::Sign { case_id } => {
            client
                .post_empty(&format!("/v1/cases/{case_id}/report/sign"))
                .await?;
            println!("final report signed for {case_id}");
        }

        Commands::Show { case_id } => {
            let value = client.get(&format!("/v1/cases/{case_id}")).await?;
            let detail: CaseDetailView = serde_json::from_value(value)?;
            output::print_detail(&detail);
        }

        Commands::History { case_id } => {
            let value = client.get(&format!("/v1/cases/{case_id}/history")).await?;
            let events: Vec<CaseStatusEvent> = serde_json::from_value(value)?;
            output::print_history(&events);
        }

        Commands::AddUser {
            id,
            username,
            role,
            org_unit,
        } => {
            client
                .post(
                    "/v1/users",
                    &json!({
                        "id": id,
                        "username": username,
                        "role": role,
                        "org_unit_id": org_unit,
                    }),
                )
                .await?;
            println!("user {id} saved");
        }

        Commands::Health => {
            let value = client.get("/v1/health").await?;
            println!("{value}");
        }
    }

    Ok(())
}

async fn transition(
    client: &CaseflowClient,
    path: &str,
    body: Option<serde_json::Value>,
) -> Result<()> {
    let value = match body {
        Some(body) => client.post(path, &body).await?,
        None => client.post_empty(path).await?,
    };
    let view: TransitionView = serde_json::from_value(value)?;
    output::print_transition(&view);
    Ok(())
}
