//! Assignment manager
//!
//! Idempotent upserts keyed by the natural active-row uniqueness:
//! (case, investigator) for investigator assignments, the case itself for
//! court assignments. All functions run on the engine's open transaction;
//! rows are completed, never deleted.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use caseflow_common::{AssignmentPriority, CaseAssignment, CourtAssignment};

use crate::store::{row_to_assignment, row_to_court_assignment};

/// Create or refresh the investigator's active assignment.
///
/// Repeated calls for the same (case, investigator) converge on one row
/// carrying the latest deadline/priority/notes. Requesting lead demotes
/// any other active lead in the same statement batch, so there is never a
/// moment with two active leads.
pub fn upsert_investigator_assignment(
    conn: &Connection,
    case_id: &str,
    investigator_id: &str,
    assigned_by: &str,
    deadline: DateTime<Utc>,
    priority: AssignmentPriority,
    notes: Option<&str>,
    is_lead: bool,
) -> rusqlite::Result<String> {
    if is_lead {
        conn.execute(
            "UPDATE case_assignments SET is_lead = 0
             WHERE case_id = ?1 AND status = 'active' AND is_lead = 1
               AND investigator_id <> ?2",
            params![case_id, investigator_id],
        )?;
    }

    let existing: Option<String> = conn
        .query_row(
            "SELECT id FROM case_assignments
             WHERE case_id = ?1 AND investigator_id = ?2 AND status = 'active'",
            params![case_id, investigator_id],
            |row| row.get(0),
        )
        .optional()?;

    match existing {
        Some(id) => {
            conn.execute(
                "UPDATE case_assignments
                 SET deadline = ?1, priority = ?2, notes = ?3,
                     is_lead = CASE WHEN ?4 THEN 1 ELSE is_lead END
                 WHERE id = ?5",
                params![deadline, priority.as_str(), notes, is_lead, id],
            )?;
            Ok(id)
        }
        None => {
            let id = Uuid::new_v4().to_string();
            conn.execute(
                "INSERT INTO case_assignments
                     (id, case_id, investigator_id, assigned_by, assigned_at,
                      deadline, priority, is_lead, status, notes)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 'active', ?9)",
                params![
                    id,
                    case_id,
                    investigator_id,
                    assigned_by,
                    Utc::now(),
                    deadline,
                    priority.as_str(),
                    is_lead,
                    notes
                ],
            )?;
            Ok(id)
        }
    }
}

/// Create or refresh the single active court assignment for a case
pub fn upsert_court_assignment(
    conn: &Connection,
    case_id: &str,
    assigned_to: &str,
    assigned_by: &str,
    deadline: DateTime<Utc>,
    notes: Option<&str>,
) -> rusqlite::Result<String> {
    let existing: Option<String> = conn
        .query_row(
            "SELECT id FROM court_assignments WHERE case_id = ?1 AND status = 'active'",
            params![case_id],
            |row| row.get(0),
        )
        .optional()?;

    match existing {
        Some(id) => {
            conn.execute(
                "UPDATE court_assignments
                 SET assigned_to = ?1, assigned_by = ?2, deadline = ?3, notes = ?4
                 WHERE id = ?5",
                params![assigned_to, assigned_by, deadline, notes, id],
            )?;
            Ok(id)
        }
        None => {
            let id = Uuid::new_v4().to_string();
            conn.execute(
                "INSERT INTO court_assignments
                     (id, case_id, assigned_to, assigned_by, assigned_at, deadline, notes, status)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 'active')",
                params![id, case_id, assigned_to, assigned_by, Utc::now(), deadline, notes],
            )?;
            Ok(id)
        }
    }
}

/// Complete the active court assignment, if any (court resubmission)
pub fn complete_active_court_assignment(conn: &Connection, case_id: &str) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE court_assignments SET status = 'completed'
         WHERE case_id = ?1 AND status = 'active'",
        params![case_id],
    )?;
    Ok(())
}

/// Complete every active assignment of both kinds; called at closure
pub fn complete_all_active(conn: &Connection, case_id: &str) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE case_assignments SET status = 'completed'
         WHERE case_id = ?1 AND status = 'active'",
        params![case_id],
    )?;
    complete_active_court_assignment(conn, case_id)
}

pub fn has_active_court_assignment(conn: &Connection, case_id: &str) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM court_assignments WHERE case_id = ?1 AND status = 'active')",
        params![case_id],
        |row| row.get(0),
    )
}

/// Investigators with an active assignment on the case
pub fn active_assignees(conn: &Connection, case_id: &str) -> rusqlite::Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT investigator_id FROM case_assignments
         WHERE case_id = ?1 AND status = 'active' ORDER BY assigned_at",
    )?;
    let rows = stmt.query_map(params![case_id], |row| row.get(0))?;
    rows.collect()
}

/// Every assignment row for the case, newest first
pub fn list_assignments(conn: &Connection, case_id: &str) -> rusqlite::Result<Vec<CaseAssignment>> {
    let mut stmt = conn.prepare(
        "SELECT id, case_id, investigator_id, assigned_by, assigned_at,
                deadline, priority, is_lead, status, notes
         FROM case_assignments WHERE case_id = ?1
         ORDER BY assigned_at DESC",
    )?;
    let rows = stmt.query_map(params![case_id], row_to_assignment)?;
    rows.collect()
}

pub fn active_court_assignment(
    conn: &Connection,
    case_id: &str,
) -> rusqlite::Result<Option<CourtAssignment>> {
    conn.query_row(
        "SELECT id, case_id, assigned_to, assigned_by, assigned_at, deadline, notes, status
         FROM court_assignments WHERE case_id = ?1 AND status = 'active'",
        params![case_id],
        row_to_court_assignment,
    )
    .optional()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use caseflow_common::AssignmentStatus;
    use chrono::Duration;
    use rusqlite::Connection;

    fn test_conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE case_assignments (
                id TEXT PRIMARY KEY, case_id TEXT NOT NULL, investigator_id TEXT NOT NULL,
                assigned_by TEXT NOT NULL, assigned_at TEXT NOT NULL, deadline TEXT,
                priority TEXT NOT NULL DEFAULT 'normal', is_lead INTEGER NOT NULL DEFAULT 0,
                status TEXT NOT NULL DEFAULT 'active', notes TEXT
            );
            CREATE UNIQUE INDEX idx_active_assignment
                ON case_assignments(case_id, investigator_id) WHERE status = 'active';
            CREATE UNIQUE INDEX idx_active_lead
                ON case_assignments(case_id) WHERE status = 'active' AND is_lead = 1;
            CREATE TABLE court_assignments (
                id TEXT PRIMARY KEY, case_id TEXT NOT NULL, assigned_to TEXT NOT NULL,
                assigned_by TEXT NOT NULL, assigned_at TEXT NOT NULL, deadline TEXT NOT NULL,
                notes TEXT, status TEXT NOT NULL DEFAULT 'active'
            );
            CREATE UNIQUE INDEX idx_active_court_assignment
                ON court_assignments(case_id) WHERE status = 'active';",
        )
        .unwrap();
        conn
    }

    fn deadline(days: i64) -> DateTime<Utc> {
        Utc::now() + Duration::days(days)
    }

    #[test]
    fn test_upsert_converges_to_one_row() {
        let conn = test_conn();
        let first = upsert_investigator_assignment(
            &conn, "c-1", "u-inv1", "u-adm1", deadline(7),
            AssignmentPriority::Normal, None, false,
        )
        .unwrap();
        let later = deadline(14);
        let second = upsert_investigator_assignment(
            &conn, "c-1", "u-inv1", "u-adm1", later,
            AssignmentPriority::High, Some("extended"), false,
        )
        .unwrap();
        assert_eq!(first, second);

        let rows = list_assignments(&conn, "c-1").unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].deadline, Some(later));
        assert_eq!(rows[0].priority, AssignmentPriority::High);
        assert_eq!(rows[0].notes.as_deref(), Some("extended"));
    }

    #[test]
    fn test_lead_demotion_keeps_one_lead() {
        let conn = test_conn();
        upsert_investigator_assignment(
            &conn, "c-1", "u-inv1", "u-adm1", deadline(7),
            AssignmentPriority::Normal, None, true,
        )
        .unwrap();
        upsert_investigator_assignment(
            &conn, "c-1", "u-inv2", "u-adm1", deadline(7),
            AssignmentPriority::Normal, None, true,
        )
        .unwrap();

        let rows = list_assignments(&conn, "c-1").unwrap();
        let leads: Vec<_> = rows.iter().filter(|a| a.is_lead).collect();
        assert_eq!(leads.len(), 1);
        assert_eq!(leads[0].investigator_id, "u-inv2");
    }

    #[test]
    fn test_non_lead_upsert_preserves_lead_flag() {
        let conn = test_conn();
        upsert_investigator_assignment(
            &conn, "c-1", "u-inv1", "u-adm1", deadline(7),
            AssignmentPriority::Normal, None, true,
        )
        .unwrap();
        // Deadline refresh without the lead flag must not demote.
        upsert_investigator_assignment(
            &conn, "c-1", "u-inv1", "u-adm1", deadline(10),
            AssignmentPriority::Normal, None, false,
        )
        .unwrap();

        let rows = list_assignments(&conn, "c-1").unwrap();
        assert!(rows[0].is_lead);
    }

    #[test]
    fn test_court_assignment_single_active_row() {
        let conn = test_conn();
        let first =
            upsert_court_assignment(&conn, "c-1", "u-inv1", "u-court1", deadline(5), None).unwrap();
        let second = upsert_court_assignment(
            &conn, "c-1", "u-inv2", "u-court1", deadline(9), Some("witness summons"),
        )
        .unwrap();
        assert_eq!(first, second);

        let row = active_court_assignment(&conn, "c-1").unwrap().unwrap();
        assert_eq!(row.assigned_to, "u-inv2");
        assert_eq!(row.notes.as_deref(), Some("witness summons"));
    }

    #[test]
    fn test_complete_all_active() {
        let conn = test_conn();
        upsert_investigator_assignment(
            &conn, "c-1", "u-inv1", "u-adm1", deadline(7),
            AssignmentPriority::Normal, None, true,
        )
        .unwrap();
        upsert_court_assignment(&conn, "c-1", "u-inv1", "u-court1", deadline(5), None).unwrap();
        assert!(has_active_court_assignment(&conn, "c-1").unwrap());

        complete_all_active(&conn, "c-1").unwrap();

        assert!(!has_active_court_assignment(&conn, "c-1").unwrap());
        assert!(active_assignees(&conn, "c-1").unwrap().is_empty());
        let rows = list_assignments(&conn, "c-1").unwrap();
        assert!(rows.iter().all(|a| a.status == AssignmentStatus::Completed));
    }

    #[test]
    fn test_reassignment_after_completion_creates_fresh_row() {
        let conn = test_conn();
        upsert_investigator_assignment(
            &conn, "c-1", "u-inv1", "u-adm1", deadline(7),
            AssignmentPriority::Normal, None, false,
        )
        .unwrap();
        complete_all_active(&conn, "c-1").unwrap();
        upsert_investigator_assignment(
            &conn, "c-1", "u-inv1", "u-adm1", deadline(7),
            AssignmentPriority::Normal, None, false,
        )
        .unwrap();

        let rows = list_assignments(&conn, "c-1").unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(
            rows.iter().filter(|a| a.status == AssignmentStatus::Active).count(),
            1
        );
    }
}
