//! Composite transition table
//!
//! One table owns both status axes. `evaluate` answers "is this intent
//! legal from this state pair, and what pair plus assignment effect does
//! it produce"; `role_may_trigger` is the role matrix. Both are pure so
//! every entry point goes through the same rules.
//!
//! Intent-specific preconditions that need stored state (signed report,
//! active court assignment, reopen budget) are checked by the engine
//! after the table says the move is legal.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::actor::Role;
use crate::case::{CaseStatus, CourtStatus};
use crate::error::WorkflowError;

// ============================================================================
// Intents
// ============================================================================

/// The fixed set of workflow intents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseIntent {
    Submit,
    Approve,
    ReturnForRevision,
    AssignInvestigators,
    EscalateToCourt,
    SubmitToCourt,
    CourtAssignBack,
    CourtClose,
    Reopen,
    Close,
}

impl CaseIntent {
    pub fn as_str(&self) -> &'static str {
        match self {
            CaseIntent::Submit => "submit",
            CaseIntent::Approve => "approve",
            CaseIntent::ReturnForRevision => "return_for_revision",
            CaseIntent::AssignInvestigators => "assign_investigators",
            CaseIntent::EscalateToCourt => "escalate_to_court",
            CaseIntent::SubmitToCourt => "submit_to_court",
            CaseIntent::CourtAssignBack => "court_assign_back",
            CaseIntent::CourtClose => "court_close",
            CaseIntent::Reopen => "reopen",
            CaseIntent::Close => "close",
        }
    }

    /// Parse from the wire form
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "submit" => Some(CaseIntent::Submit),
            "approve" => Some(CaseIntent::Approve),
            "return_for_revision" => Some(CaseIntent::ReturnForRevision),
            "assign_investigators" => Some(CaseIntent::AssignInvestigators),
            "escalate_to_court" => Some(CaseIntent::EscalateToCourt),
            "submit_to_court" => Some(CaseIntent::SubmitToCourt),
            "court_assign_back" => Some(CaseIntent::CourtAssignBack),
            "court_close" => Some(CaseIntent::CourtClose),
            "reopen" => Some(CaseIntent::Reopen),
            "close" => Some(CaseIntent::Close),
            _ => None,
        }
    }
}

impl std::fmt::Display for CaseIntent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// Payload
// ============================================================================

/// Intent-specific fields carried with a transition request
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransitionPayload {
    /// Free-text reason recorded in the history row
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Target investigator for assignment intents
    #[serde(skip_serializing_if = "Option::is_none")]
    pub investigator_id: Option<String>,
    /// Assignment deadline
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deadline: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_lead: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome_description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub court_deadline: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub court_notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub court_decision_ref: Option<String>,
}

// ============================================================================
// Effects
// ============================================================================

/// Assignment mutation mandated by a transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignmentEffect {
    /// No assignment change
    None,
    /// Idempotent upsert of an investigator assignment
    UpsertInvestigator,
    /// Idempotent upsert of the case's court assignment
    UpsertCourt,
    /// Complete the active court assignment (court resubmission)
    CompleteCourt,
    /// Complete every active assignment (closure)
    CompleteAll,
}

/// Outcome of a legal table lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionEffect {
    /// Resulting investigation-axis status
    pub status: CaseStatus,
    /// Resulting court-axis status
    pub court_status: CourtStatus,
    pub assignment: AssignmentEffect,
    /// Reason recorded when the payload carries none
    pub default_reason: &'static str,
}

impl TransitionEffect {
    /// Whether the effect moves either axis
    pub fn changes(&self, from: (CaseStatus, CourtStatus)) -> bool {
        (self.status, self.court_status) != from
    }
}

// ============================================================================
// Transition Table
// ============================================================================

/// Look up the table entry for `intent` from the current state pair.
///
/// The investigation axis takes precedence: a closed case rejects every
/// court-axis intent regardless of what the court axis would permit.
pub fn evaluate(
    status: CaseStatus,
    court_status: CourtStatus,
    intent: CaseIntent,
) -> Result<TransitionEffect, WorkflowError> {
    use AssignmentEffect as Fx;
    use CaseIntent as I;
    use CaseStatus as S;
    use CourtStatus as C;

    let illegal = || {
        Err(WorkflowError::InvalidStateTransition {
            status,
            court_status,
            intent,
        })
    };

    match intent {
        I::Submit => match status {
            S::Draft => Ok(TransitionEffect {
                status: S::Submitted,
                court_status,
                assignment: Fx::None,
                default_reason: "submitted for station review",
            }),
            _ => illegal(),
        },

        I::Approve => match status {
            S::Submitted => Ok(TransitionEffect {
                status: S::UnderStationReview,
                court_status,
                assignment: Fx::None,
                default_reason: "accepted for station review",
            }),
            _ => illegal(),
        },

        I::ReturnForRevision => match status {
            S::Submitted | S::UnderStationReview => Ok(TransitionEffect {
                status: S::Draft,
                court_status,
                assignment: Fx::None,
                default_reason: "returned to OB desk for revision",
            }),
            _ => illegal(),
        },

        I::AssignInvestigators => match status {
            // First assignment opens the investigation.
            S::UnderStationReview => Ok(TransitionEffect {
                status: S::Investigating,
                court_status,
                assignment: Fx::UpsertInvestigator,
                default_reason: "investigation opened",
            }),
            // Later assignments mutate the roster without a status change.
            S::Investigating => Ok(TransitionEffect {
                status: S::Investigating,
                court_status,
                assignment: Fx::UpsertInvestigator,
                default_reason: "investigator roster updated",
            }),
            _ => illegal(),
        },

        I::EscalateToCourt => match status {
            S::Investigating => Ok(TransitionEffect {
                status: S::Escalated,
                court_status,
                assignment: Fx::None,
                default_reason: "escalated for court submission",
            }),
            _ => illegal(),
        },

        I::SubmitToCourt => match (status, court_status) {
            (S::Escalated, C::NotSent) => Ok(TransitionEffect {
                status: S::UnderReview,
                court_status: C::SentToCourt,
                assignment: Fx::None,
                default_reason: "submitted to court",
            }),
            // Resubmission after the court sent the case back; the open
            // court work order is completed by the same transition.
            (S::UnderReview, C::CourtAssignedBack) => Ok(TransitionEffect {
                status: S::UnderReview,
                court_status: C::CourtReview,
                assignment: Fx::CompleteCourt,
                default_reason: "resubmitted to court",
            }),
            _ => illegal(),
        },

        I::CourtAssignBack => match (status, court_status) {
            // Investigation axis wins: never reopen court work on a closed case.
            (S::Closed, _) => illegal(),
            (_, C::SentToCourt) | (_, C::CourtReview) => Ok(TransitionEffect {
                status,
                court_status: C::CourtAssignedBack,
                assignment: Fx::UpsertCourt,
                default_reason: "returned by court with instructions",
            }),
            _ => illegal(),
        },

        // Closure legality lives here; the engine separately rejects both
        // closure intents with PreconditionFailed while a court assignment
        // is still active.
        I::CourtClose => match (status, court_status) {
            (S::UnderReview, c) if c.in_court() => Ok(TransitionEffect {
                status: S::Closed,
                court_status: C::CourtClosed,
                assignment: Fx::CompleteAll,
                default_reason: "closed by court decision",
            }),
            _ => illegal(),
        },

        I::Close => match status {
            S::Investigating | S::Escalated | S::UnderReview => Ok(TransitionEffect {
                status: S::Closed,
                court_status,
                assignment: Fx::CompleteAll,
                default_reason: "case closed",
            }),
            _ => illegal(),
        },

        I::Reopen => match status {
            S::Closed => Ok(TransitionEffect {
                status: S::Investigating,
                // A reopened court disposition starts a fresh court cycle.
                court_status: if court_status == C::CourtClosed {
                    C::NotSent
                } else {
                    court_status
                },
                assignment: Fx::None,
                default_reason: "case reopened",
            }),
            _ => illegal(),
        },
    }
}

// ============================================================================
// Role Matrix
// ============================================================================

/// Whether `role` is authorized to trigger `intent`
pub fn role_may_trigger(role: Role, intent: CaseIntent) -> bool {
    use CaseIntent as I;
    match intent {
        I::Submit => matches!(role, Role::ObOfficer),
        I::Approve | I::ReturnForRevision | I::AssignInvestigators => {
            matches!(role, Role::StationAdmin | Role::Admin | Role::SuperAdmin)
        }
        I::EscalateToCourt | I::SubmitToCourt | I::Close | I::Reopen => {
            matches!(role, Role::Investigator | Role::Admin | Role::SuperAdmin)
        }
        I::CourtAssignBack | I::CourtClose => matches!(role, Role::CourtUser),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_illegal(status: CaseStatus, court: CourtStatus, intent: CaseIntent) {
        match evaluate(status, court, intent) {
            Err(WorkflowError::InvalidStateTransition { .. }) => {}
            other => panic!("expected rejection for {intent} from {status}/{court}, got {other:?}"),
        }
    }

    #[test]
    fn test_happy_path_investigation_axis() {
        let fx = evaluate(CaseStatus::Draft, CourtStatus::NotSent, CaseIntent::Submit).unwrap();
        assert_eq!(fx.status, CaseStatus::Submitted);

        let fx = evaluate(CaseStatus::Submitted, CourtStatus::NotSent, CaseIntent::Approve).unwrap();
        assert_eq!(fx.status, CaseStatus::UnderStationReview);

        let fx = evaluate(
            CaseStatus::UnderStationReview,
            CourtStatus::NotSent,
            CaseIntent::AssignInvestigators,
        )
        .unwrap();
        assert_eq!(fx.status, CaseStatus::Investigating);
        assert_eq!(fx.assignment, AssignmentEffect::UpsertInvestigator);

        let fx = evaluate(
            CaseStatus::Investigating,
            CourtStatus::NotSent,
            CaseIntent::EscalateToCourt,
        )
        .unwrap();
        assert_eq!(fx.status, CaseStatus::Escalated);
    }

    #[test]
    fn test_replay_is_rejected() {
        // Replaying an already-applied transition finds the case in the
        // resulting state and must be rejected, not silently accepted.
        assert_illegal(CaseStatus::Submitted, CourtStatus::NotSent, CaseIntent::Submit);
        assert_illegal(
            CaseStatus::UnderStationReview,
            CourtStatus::NotSent,
            CaseIntent::Approve,
        );
        assert_illegal(
            CaseStatus::UnderReview,
            CourtStatus::SentToCourt,
            CaseIntent::SubmitToCourt,
        );
    }

    #[test]
    fn test_reassignment_changes_nothing() {
        let fx = evaluate(
            CaseStatus::Investigating,
            CourtStatus::NotSent,
            CaseIntent::AssignInvestigators,
        )
        .unwrap();
        assert!(!fx.changes((CaseStatus::Investigating, CourtStatus::NotSent)));
        assert_eq!(fx.assignment, AssignmentEffect::UpsertInvestigator);
    }

    #[test]
    fn test_court_cycle() {
        // First submission moves both axes.
        let fx = evaluate(
            CaseStatus::Escalated,
            CourtStatus::NotSent,
            CaseIntent::SubmitToCourt,
        )
        .unwrap();
        assert_eq!(fx.status, CaseStatus::UnderReview);
        assert_eq!(fx.court_status, CourtStatus::SentToCourt);

        // Court sends the case back with a work order.
        let fx = evaluate(
            CaseStatus::UnderReview,
            CourtStatus::SentToCourt,
            CaseIntent::CourtAssignBack,
        )
        .unwrap();
        assert_eq!(fx.court_status, CourtStatus::CourtAssignedBack);
        assert_eq!(fx.assignment, AssignmentEffect::UpsertCourt);

        // Resubmission completes the work order.
        let fx = evaluate(
            CaseStatus::UnderReview,
            CourtStatus::CourtAssignedBack,
            CaseIntent::SubmitToCourt,
        )
        .unwrap();
        assert_eq!(fx.court_status, CourtStatus::CourtReview);
        assert_eq!(fx.assignment, AssignmentEffect::CompleteCourt);

        // Court disposes of the case.
        let fx = evaluate(
            CaseStatus::UnderReview,
            CourtStatus::CourtReview,
            CaseIntent::CourtClose,
        )
        .unwrap();
        assert_eq!(fx.status, CaseStatus::Closed);
        assert_eq!(fx.court_status, CourtStatus::CourtClosed);
        assert_eq!(fx.assignment, AssignmentEffect::CompleteAll);
    }

    #[test]
    fn test_investigation_axis_takes_precedence() {
        // Even where the court axis alone would permit the move.
        assert_illegal(
            CaseStatus::Closed,
            CourtStatus::SentToCourt,
            CaseIntent::CourtAssignBack,
        );
        assert_illegal(
            CaseStatus::Closed,
            CourtStatus::CourtReview,
            CaseIntent::CourtAssignBack,
        );
    }

    #[test]
    fn test_close_preserves_court_axis() {
        let fx = evaluate(CaseStatus::Investigating, CourtStatus::NotSent, CaseIntent::Close)
            .unwrap();
        assert_eq!(fx.status, CaseStatus::Closed);
        assert_eq!(fx.assignment, AssignmentEffect::CompleteAll);

        // Closing a case the court holds is table-legal (the engine blocks
        // it separately while a court work order is active) and leaves the
        // court axis where it was.
        let fx = evaluate(CaseStatus::UnderReview, CourtStatus::SentToCourt, CaseIntent::Close)
            .unwrap();
        assert_eq!(fx.status, CaseStatus::Closed);
        assert_eq!(fx.court_status, CourtStatus::SentToCourt);

        assert_illegal(CaseStatus::Draft, CourtStatus::NotSent, CaseIntent::Close);
        assert_illegal(CaseStatus::Closed, CourtStatus::NotSent, CaseIntent::Close);
    }

    #[test]
    fn test_court_close_from_any_in_court_state() {
        for court in [
            CourtStatus::SentToCourt,
            CourtStatus::CourtReview,
            CourtStatus::CourtAssignedBack,
        ] {
            let fx = evaluate(CaseStatus::UnderReview, court, CaseIntent::CourtClose).unwrap();
            assert_eq!(fx.status, CaseStatus::Closed);
            assert_eq!(fx.court_status, CourtStatus::CourtClosed);
        }
        assert_illegal(CaseStatus::Escalated, CourtStatus::NotSent, CaseIntent::CourtClose);
    }

    #[test]
    fn test_reopen_targets_investigating() {
        let fx = evaluate(CaseStatus::Closed, CourtStatus::NotSent, CaseIntent::Reopen).unwrap();
        assert_eq!(fx.status, CaseStatus::Investigating);
        assert_eq!(fx.court_status, CourtStatus::NotSent);

        assert_illegal(CaseStatus::Investigating, CourtStatus::NotSent, CaseIntent::Reopen);
    }

    #[test]
    fn test_reopen_resets_closed_court_axis() {
        let fx = evaluate(CaseStatus::Closed, CourtStatus::CourtClosed, CaseIntent::Reopen)
            .unwrap();
        assert_eq!(fx.status, CaseStatus::Investigating);
        assert_eq!(fx.court_status, CourtStatus::NotSent);
    }

    #[test]
    fn test_role_matrix() {
        assert!(role_may_trigger(Role::ObOfficer, CaseIntent::Submit));
        assert!(!role_may_trigger(Role::Admin, CaseIntent::Submit));

        assert!(role_may_trigger(Role::StationAdmin, CaseIntent::Approve));
        assert!(role_may_trigger(Role::SuperAdmin, CaseIntent::AssignInvestigators));
        assert!(!role_may_trigger(Role::Investigator, CaseIntent::Approve));

        assert!(role_may_trigger(Role::Investigator, CaseIntent::EscalateToCourt));
        assert!(role_may_trigger(Role::Investigator, CaseIntent::SubmitToCourt));
        assert!(role_may_trigger(Role::Admin, CaseIntent::Close));
        assert!(!role_may_trigger(Role::CourtUser, CaseIntent::Close));

        assert!(role_may_trigger(Role::CourtUser, CaseIntent::CourtAssignBack));
        assert!(role_may_trigger(Role::CourtUser, CaseIntent::CourtClose));
        assert!(!role_may_trigger(Role::StationAdmin, CaseIntent::CourtClose));
    }

    #[test]
    fn test_intent_round_trip() {
        for intent in [
            CaseIntent::Submit,
            CaseIntent::Approve,
            CaseIntent::ReturnForRevision,
            CaseIntent::AssignInvestigators,
            CaseIntent::EscalateToCourt,
            CaseIntent::SubmitToCourt,
            CaseIntent::CourtAssignBack,
            CaseIntent::CourtClose,
            CaseIntent::Reopen,
            CaseIntent::Close,
        ] {
            assert_eq!(CaseIntent::parse(intent.as_str()), Some(intent));
        }
        assert_eq!(CaseIntent::parse("archive"), None);
    }
}
