//! Case lifecycle engine
//!
//! The only writer of case status fields. Each request validates in a
//! fixed order (case exists, transition table, role matrix, stored-state
//! preconditions), then applies the status change, the mandated
//! assignment mutation, and the history row inside one IMMEDIATE
//! transaction. Notification intents are returned to the caller and
//! dispatched only after the commit.

use chrono::Utc;
use rusqlite::{Transaction, TransactionBehavior};
use serde_json::json;
use tracing::info;

use caseflow_common::transition::{evaluate, role_may_trigger};
use caseflow_common::{
    Actor, AssignmentEffect, AssignmentPriority, Case, CaseIntent, CaseflowConfig, Notification,
    NotificationKind, NotificationPriority, Role, TransitionPayload, WorkflowError,
};

use crate::{assignments, history, store};
use crate::store::CaseStore;

/// Result of an accepted transition
#[derive(Debug)]
pub struct TransitionReceipt {
    pub case: Case,
    /// Assignment row touched by the transition, if any
    pub assignment_id: Option<String>,
    /// Built inside the transaction, delivered after commit
    pub notifications: Vec<Notification>,
}

#[derive(Clone)]
pub struct LifecycleEngine {
    store: CaseStore,
    config: CaseflowConfig,
}

impl LifecycleEngine {
    pub fn new(store: CaseStore, config: CaseflowConfig) -> Self {
        Self { store, config }
    }

    /// Validate and apply one workflow intent against a case.
    ///
    /// Rejections before the commit leave no trace; the receipt's
    /// notifications have not been delivered yet when this returns.
    pub async fn request_transition(
        &self,
        case_id: &str,
        intent: CaseIntent,
        actor: &Actor,
        payload: TransitionPayload,
    ) -> Result<TransitionReceipt, WorkflowError> {
        // Fail fast on payload shape; everything else needs stored state.
        validate_payload(intent, &payload)?;

        let mut conn = self.store.lock().await;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(WorkflowError::dependency)?;
        let receipt = self.apply(&tx, case_id, intent, actor, &payload)?;
        tx.commit().map_err(WorkflowError::dependency)?;

        info!(
            "case {}: {} by {} ({}) -> {}/{}",
            receipt.case.case_number,
            intent,
            actor.user_id,
            actor.role,
            receipt.case.status,
            receipt.case.court_status
        );
        Ok(receipt)
    }

    fn apply(
        &self,
        tx: &Transaction<'_>,
        case_id: &str,
        intent: CaseIntent,
        actor: &Actor,
        payload: &TransitionPayload,
    ) -> Result<TransitionReceipt, WorkflowError> {
        // Re-read under the write lock so a concurrent transition that
        // committed first fails this one's precondition, not its data.
        let case = store::fetch_case(tx, case_id)
            .map_err(WorkflowError::dependency)?
            .ok_or_else(|| WorkflowError::NotFound {
                entity: "case",
                id: case_id.to_string(),
            })?;

        // Fixed check order: existence, table legality, role matrix,
        // stored-state preconditions.
        let effect = evaluate(case.status, case.court_status, intent)?;
        if !role_may_trigger(actor.role, intent) {
            return Err(WorkflowError::Forbidden {
                role: actor.role,
                intent,
            });
        }
        self.check_preconditions(tx, &case, intent, payload)?;

        // Closure notifications go to the people losing their active
        // assignments; resolve them before the rows are completed.
        let closing_assignees = if effect.assignment == AssignmentEffect::CompleteAll {
            assignments::active_assignees(tx, &case.id).map_err(WorkflowError::dependency)?
        } else {
            Vec::new()
        };

        let now = Utc::now();
        let mut updated = case.clone();
        updated.status = effect.status;
        updated.court_status = effect.court_status;

        let mut detail = None;
        match intent {
            CaseIntent::Approve => {
                updated.approved_by = Some(actor.user_id.clone());
                updated.approved_at = Some(now);
            }
            CaseIntent::SubmitToCourt => {
                updated.court_submitted_at = Some(now);
                if payload.court_deadline.is_some() {
                    updated.court_deadline = payload.court_deadline;
                }
                if let Some(notes) = &payload.court_notes {
                    updated.court_notes = Some(notes.clone());
                }
            }
            CaseIntent::CourtAssignBack => {
                updated.court_deadline = payload.deadline;
                if let Some(notes) = &payload.notes {
                    updated.court_notes = Some(notes.clone());
                }
            }
            CaseIntent::Close | CaseIntent::CourtClose => {
                updated.closed_at = Some(now);
                updated.outcome_code = payload.outcome_code.clone();
                updated.outcome_description = payload.outcome_description.clone();
                if intent == CaseIntent::CourtClose {
                    updated.court_decision_ref = payload.court_decision_ref.clone();
                }
            }
            CaseIntent::Reopen => {
                detail = Some(json!({
                    "previous_closed_at": case.closed_at,
                    "previous_outcome_code": case.outcome_code,
                }));
                updated.reopen_count += 1;
                updated.closed_at = None;
            }
            _ => {}
        }

        let assignment_id = match effect.assignment {
            AssignmentEffect::None => None,
            AssignmentEffect::UpsertInvestigator => {
                let investigator = required_investigator(payload)?;
                let deadline = required_deadline(payload)?;
                let priority = parse_priority(payload)?;
                Some(
                    assignments::upsert_investigator_assignment(
                        tx,
                        &case.id,
                        investigator,
                        &actor.user_id,
                        deadline,
                        priority,
                        payload.notes.as_deref(),
                        payload.is_lead,
                    )
                    .map_err(WorkflowError::dependency)?,
                )
            }
            AssignmentEffect::UpsertCourt => {
                let investigator = required_investigator(payload)?;
                let deadline = required_deadline(payload)?;
                Some(
                    assignments::upsert_court_assignment(
                        tx,
                        &case.id,
                        investigator,
                        &actor.user_id,
                        deadline,
                        payload.notes.as_deref(),
                    )
                    .map_err(WorkflowError::dependency)?,
                )
            }
            AssignmentEffect::CompleteCourt => {
                assignments::complete_active_court_assignment(tx, &case.id)
                    .map_err(WorkflowError::dependency)?;
                None
            }
            AssignmentEffect::CompleteAll => {
                assignments::complete_all_active(tx, &case.id)
                    .map_err(WorkflowError::dependency)?;
                None
            }
        };

        store::update_case(tx, &updated).map_err(WorkflowError::dependency)?;

        let reason = payload
            .reason
            .clone()
            .unwrap_or_else(|| effect.default_reason.to_string());
        if effect.changes(case.status_pair()) {
            history::append(tx, &case, &updated, actor, &reason, detail)
                .map_err(WorkflowError::dependency)?;
        }

        let notifications =
            self.notifications_for(tx, &updated, intent, payload, &reason, &closing_assignees)?;

        Ok(TransitionReceipt {
            case: updated,
            assignment_id,
            notifications,
        })
    }

    /// Intent-specific requirements that need stored state
    fn check_preconditions(
        &self,
        tx: &Transaction<'_>,
        case: &Case,
        intent: CaseIntent,
        payload: &TransitionPayload,
    ) -> Result<(), WorkflowError> {
        match intent {
            CaseIntent::EscalateToCourt => {
                if store::final_report(tx, &case.id)
                    .map_err(WorkflowError::dependency)?
                    .is_none()
                {
                    return Err(WorkflowError::precondition(
                        "a final report must be filed before escalation",
                    ));
                }
            }
            CaseIntent::SubmitToCourt => {
                let signed = store::final_report(tx, &case.id)
                    .map_err(WorkflowError::dependency)?
                    .map(|r| r.is_signed())
                    .unwrap_or(false);
                if !signed {
                    return Err(WorkflowError::precondition(
                        "a signed final report is required for court submission",
                    ));
                }
            }
            CaseIntent::Close | CaseIntent::CourtClose => {
                if assignments::has_active_court_assignment(tx, &case.id)
                    .map_err(WorkflowError::dependency)?
                {
                    return Err(WorkflowError::precondition(
                        "an active court assignment blocks closure",
                    ));
                }
            }
            CaseIntent::Reopen => {
                if case.reopen_count >= self.config.max_reopen_count {
                    return Err(WorkflowError::ReopenBudgetExhausted {
                        case_id: case.id.clone(),
                        budget: self.config.max_reopen_count,
                    });
                }
            }
            CaseIntent::AssignInvestigators | CaseIntent::CourtAssignBack => {
                let investigator = required_investigator(payload)?;
                if !store::is_active_user_with_role(tx, investigator, Role::Investigator)
                    .map_err(WorkflowError::dependency)?
                {
                    return Err(WorkflowError::NotFound {
                        entity: "investigator",
                        id: investigator.to_string(),
                    });
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn notifications_for(
        &self,
        tx: &Transaction<'_>,
        case: &Case,
        intent: CaseIntent,
        payload: &TransitionPayload,
        reason: &str,
        closing_assignees: &[String],
    ) -> Result<Vec<Notification>, WorkflowError> {
        let mut out = Vec::new();
        let number = &case.case_number;

        match intent {
            CaseIntent::Submit => {
                let admins =
                    store::users_with_role(tx, Role::StationAdmin, Some(&case.org_unit_id))
                        .map_err(WorkflowError::dependency)?;
                for admin in admins {
                    out.push(
                        Notification::new(&admin, &case.id, NotificationKind::CaseSubmitted,
                            "New case for review")
                            .with_message(&format!("Case {number} was submitted for station review")),
                    );
                }
            }
            CaseIntent::Approve => {
                out.push(
                    Notification::new(&case.created_by, &case.id, NotificationKind::CaseApproved,
                        "Case approved")
                        .with_message(&format!("Case {number} was accepted for station review")),
                );
            }
            CaseIntent::ReturnForRevision => {
                out.push(
                    Notification::new(&case.created_by, &case.id, NotificationKind::CaseReturned,
                        "Case returned")
                        .with_message(&format!("Case {number} was returned for revision: {reason}"))
                        .with_priority(NotificationPriority::High),
                );
            }
            CaseIntent::AssignInvestigators => {
                if let Some(investigator) = payload.investigator_id.as_deref() {
                    out.push(
                        Notification::new(investigator, &case.id,
                            NotificationKind::InvestigatorAssigned, "New case assignment")
                            .with_message(&format!("You have been assigned to case {number}"))
                            .with_priority(NotificationPriority::High),
                    );
                }
            }
            CaseIntent::EscalateToCourt => {
                let admins =
                    store::users_with_role(tx, Role::StationAdmin, Some(&case.org_unit_id))
                        .map_err(WorkflowError::dependency)?;
                for admin in admins {
                    out.push(
                        Notification::new(&admin, &case.id, NotificationKind::CaseEscalated,
                            "Case escalated")
                            .with_message(&format!("Case {number} is ready for court submission")),
                    );
                }
            }
            CaseIntent::SubmitToCourt => {
                let court_users = store::users_with_role(tx, Role::CourtUser, None)
                    .map_err(WorkflowError::dependency)?;
                for user in court_users {
                    out.push(
                        Notification::new(&user, &case.id, NotificationKind::SubmittedToCourt,
                            "Case submitted to court")
                            .with_message(&format!("Case {number} awaits court review")),
                    );
                }
            }
            CaseIntent::CourtAssignBack => {
                if let Some(investigator) = payload.investigator_id.as_deref() {
                    out.push(
                        Notification::new(investigator, &case.id,
                            NotificationKind::CourtAssignedBack, "Court work order")
                            .with_message(&format!(
                                "The court returned case {number} with instructions"
                            ))
                            .with_priority(NotificationPriority::High),
                    );
                }
            }
            CaseIntent::Close | CaseIntent::CourtClose => {
                out.push(
                    Notification::new(&case.created_by, &case.id, NotificationKind::CaseClosed,
                        "Case closed")
                        .with_message(&format!("Case {number} was closed: {reason}")),
                );
                for assignee in closing_assignees {
                    out.push(
                        Notification::new(assignee, &case.id, NotificationKind::CaseClosed,
                            "Case closed")
                            .with_message(&format!("Case {number} was closed: {reason}")),
                    );
                }
            }
            CaseIntent::Reopen => {
                let admins =
                    store::users_with_role(tx, Role::StationAdmin, Some(&case.org_unit_id))
                        .map_err(WorkflowError::dependency)?;
                for admin in admins {
                    out.push(
                        Notification::new(&admin, &case.id, NotificationKind::CaseReopened,
                            "Case reopened")
                            .with_message(&format!("Case {number} was reopened: {reason}"))
                            .with_priority(NotificationPriority::High),
                    );
                }
            }
        }

        // One notification per recipient per transition.
        let mut seen = std::collections::HashSet::new();
        out.retain(|n| seen.insert(n.recipient.clone()));
        out.truncate(self.config.notification_fanout_cap);
        Ok(out)
    }
}

// ============================================================================
// Payload validation (no stored state involved)
// ============================================================================

fn validate_payload(intent: CaseIntent, payload: &TransitionPayload) -> Result<(), WorkflowError> {
    match intent {
        CaseIntent::AssignInvestigators | CaseIntent::CourtAssignBack => {
            required_investigator(payload)?;
            let deadline = required_deadline(payload)?;
            if deadline <= Utc::now() {
                return Err(WorkflowError::Validation {
                    field: "deadline",
                    problem: "must be in the future".to_string(),
                });
            }
            parse_priority(payload)?;
        }
        CaseIntent::Close | CaseIntent::CourtClose | CaseIntent::Reopen => {
            if payload.reason.as_deref().map(str::trim).unwrap_or("").is_empty() {
                return Err(WorkflowError::Validation {
                    field: "reason",
                    problem: "required".to_string(),
                });
            }
        }
        _ => {}
    }
    Ok(())
}

fn required_investigator(payload: &TransitionPayload) -> Result<&str, WorkflowError> {
    match payload.investigator_id.as_deref().map(str::trim) {
        Some(id) if !id.is_empty() => Ok(id),
        _ => Err(WorkflowError::Validation {
            field: "investigator_id",
            problem: "required".to_string(),
        }),
    }
}

fn required_deadline(
    payload: &TransitionPayload,
) -> Result<chrono::DateTime<Utc>, WorkflowError> {
    payload.deadline.ok_or_else(|| WorkflowError::Validation {
        field: "deadline",
        problem: "required".to_string(),
    })
}

fn parse_priority(payload: &TransitionPayload) -> Result<AssignmentPriority, WorkflowError> {
    match payload.priority.as_deref() {
        None => Ok(AssignmentPriority::default()),
        Some(p) => AssignmentPriority::parse(p).ok_or_else(|| WorkflowError::Validation {
            field: "priority",
            problem: format!("unknown priority '{p}'"),
        }),
    }
}
