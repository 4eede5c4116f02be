//! SQLite store
//!
//! Single connection guarded by an async mutex; every workflow mutation
//! runs on it inside one IMMEDIATE transaction, so concurrent transitions
//! on the same case serialize and re-validate against committed state.
//! Schema creation is idempotent; partial unique indexes back the
//! active-row invariants at the storage layer.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};
use tracing::info;
use uuid::Uuid;

use caseflow_common::{
    AssignmentPriority, AssignmentStatus, Case, CaseAssignment, CaseStatus, CourtAssignment,
    CourtStatus, Role, WorkflowError,
};

/// A row in the minimal user directory
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: String,
    pub username: String,
    pub role: Role,
    pub org_unit_id: String,
    pub active: bool,
}

/// The final investigation report attached to a case
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseReport {
    pub id: String,
    pub case_id: String,
    pub submitted_by: String,
    pub submitted_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signed_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signed_at: Option<DateTime<Utc>>,
}

impl CaseReport {
    pub fn is_signed(&self) -> bool {
        self.signed_at.is_some()
    }
}

/// Case projection returned by the read path
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseDetail {
    pub case: Case,
    pub assignments: Vec<CaseAssignment>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub court_assignment: Option<CourtAssignment>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_report: Option<CaseReport>,
}

// ============================================================================
// Store
// ============================================================================

/// Handle to the case database
#[derive(Clone)]
pub struct CaseStore {
    conn: Arc<Mutex<Connection>>,
}

impl CaseStore {
    /// Open or create the database and bring the schema up
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .context("failed to create database directory")?;
        }

        info!("opening case database at {}", path.display());

        let path = path.to_path_buf();
        let conn = tokio::task::spawn_blocking(move || -> Result<Connection> {
            let conn = Connection::open(&path).context("failed to open SQLite database")?;
            conn.pragma_update(None, "journal_mode", "WAL")
                .context("failed to enable WAL mode")?;
            conn.pragma_update(None, "synchronous", "NORMAL")
                .context("failed to set synchronous mode")?;
            conn.pragma_update(None, "foreign_keys", "ON")
                .context("failed to enable foreign keys")?;
            initialize_schema(&conn).context("failed to initialize schema")?;
            Ok(conn)
        })
        .await??;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Take the connection; the engine holds this across a transaction
    pub async fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().await
    }

    /// OB intake: create a draft case, retrying case-number collisions
    pub async fn create_case(
        &self,
        org_unit_id: &str,
        title: &str,
        summary: Option<&str>,
        created_by: &str,
    ) -> Result<Case, WorkflowError> {
        let conn = self.conn.lock().await;
        for _ in 0..4 {
            let case = Case::new(org_unit_id, title, summary, created_by);
            match insert_case(&conn, &case) {
                Ok(()) => {
                    info!("case {} recorded by {}", case.case_number, created_by);
                    return Ok(case);
                }
                Err(e) if is_unique_violation(&e) => continue,
                Err(e) => return Err(WorkflowError::dependency(e)),
            }
        }
        Err(WorkflowError::dependency(
            "could not allocate a unique case number",
        ))
    }

    /// Read-path case fetch
    pub async fn get_case(&self, case_id: &str) -> Result<Option<Case>, WorkflowError> {
        let conn = self.conn.lock().await;
        fetch_case(&conn, case_id).map_err(WorkflowError::dependency)
    }

    /// Full projection: case, assignments, court assignment, report
    pub async fn get_case_detail(&self, case_id: &str) -> Result<Option<CaseDetail>, WorkflowError> {
        let conn = self.conn.lock().await;
        let Some(case) = fetch_case(&conn, case_id).map_err(WorkflowError::dependency)? else {
            return Ok(None);
        };
        let assignments =
            crate::assignments::list_assignments(&conn, case_id).map_err(WorkflowError::dependency)?;
        let court_assignment = crate::assignments::active_court_assignment(&conn, case_id)
            .map_err(WorkflowError::dependency)?;
        let final_report = final_report(&conn, case_id).map_err(WorkflowError::dependency)?;
        Ok(Some(CaseDetail {
            case,
            assignments,
            court_assignment,
            final_report,
        }))
    }

    /// Ordered status ledger; `None` when the case does not exist
    pub async fn get_history(
        &self,
        case_id: &str,
    ) -> Result<Option<Vec<caseflow_common::CaseStatusEvent>>, WorkflowError> {
        let conn = self.conn.lock().await;
        if fetch_case(&conn, case_id)
            .map_err(WorkflowError::dependency)?
            .is_none()
        {
            return Ok(None);
        }
        crate::history::for_case(&conn, case_id)
            .map(Some)
            .map_err(WorkflowError::dependency)
    }

    /// Insert or update a directory user
    pub async fn upsert_user(&self, user: &UserRecord) -> Result<(), WorkflowError> {
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO users (id, username, role, org_unit_id, active)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(id) DO UPDATE SET
                 username = excluded.username,
                 role = excluded.role,
                 org_unit_id = excluded.org_unit_id,
                 active = excluded.active",
            params![
                user.id,
                user.username,
                user.role.as_str(),
                user.org_unit_id,
                user.active as i64
            ],
        )
        .map_err(WorkflowError::dependency)?;
        Ok(())
    }

    /// File the final investigation report for a case
    pub async fn file_final_report(
        &self,
        case_id: &str,
        submitted_by: &str,
    ) -> Result<CaseReport, WorkflowError> {
        let conn = self.conn.lock().await;
        let case = fetch_case(&conn, case_id)
            .map_err(WorkflowError::dependency)?
            .ok_or_else(|| WorkflowError::NotFound {
                entity: "case",
                id: case_id.to_string(),
            })?;
        if final_report(&conn, case_id)
            .map_err(WorkflowError::dependency)?
            .is_some()
        {
            return Err(WorkflowError::precondition(
                "a final report has already been filed for this case",
            ));
        }
        let report = CaseReport {
            id: Uuid::new_v4().to_string(),
            case_id: case.id.clone(),
            submitted_by: submitted_by.to_string(),
            submitted_at: Utc::now(),
            signed_by: None,
            signed_at: None,
        };
        conn.execute(
            "INSERT INTO case_reports (id, case_id, kind, submitted_by, submitted_at)
             VALUES (?1, ?2, 'final', ?3, ?4)",
            params![report.id, report.case_id, report.submitted_by, report.submitted_at],
        )
        .map_err(WorkflowError::dependency)?;
        Ok(report)
    }

    /// Sign the filed final report
    pub async fn sign_final_report(
        &self,
        case_id: &str,
        signed_by: &str,
    ) -> Result<CaseReport, WorkflowError> {
        let conn = self.conn.lock().await;
        let mut report = final_report(&conn, case_id)
            .map_err(WorkflowError::dependency)?
            .ok_or_else(|| {
                WorkflowError::precondition("no final report has been filed for this case")
            })?;
        if report.is_signed() {
            return Err(WorkflowError::precondition(
                "the final report is already signed",
            ));
        }
        report.signed_by = Some(signed_by.to_string());
        report.signed_at = Some(Utc::now());
        conn.execute(
            "UPDATE case_reports SET signed_by = ?1, signed_at = ?2 WHERE id = ?3",
            params![report.signed_by, report.signed_at, report.id],
        )
        .map_err(WorkflowError::dependency)?;
        Ok(report)
    }
}

// ============================================================================
// Schema
// ============================================================================

fn initialize_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS cases (
            id TEXT PRIMARY KEY,
            case_number TEXT NOT NULL UNIQUE,
            org_unit_id TEXT NOT NULL,
            title TEXT NOT NULL,
            summary TEXT,
            status TEXT NOT NULL,
            court_status TEXT NOT NULL,
            created_by TEXT NOT NULL,
            approved_by TEXT,
            created_at TEXT NOT NULL,
            approved_at TEXT,
            closed_at TEXT,
            outcome_code TEXT,
            outcome_description TEXT,
            court_deadline TEXT,
            court_notes TEXT,
            court_decision_ref TEXT,
            court_submitted_at TEXT,
            reopen_count INTEGER NOT NULL DEFAULT 0
        );
        CREATE INDEX IF NOT EXISTS idx_cases_org_unit ON cases(org_unit_id);
        CREATE INDEX IF NOT EXISTS idx_cases_status ON cases(status);

        CREATE TABLE IF NOT EXISTS case_assignments (
            id TEXT PRIMARY KEY,
            case_id TEXT NOT NULL REFERENCES cases(id),
            investigator_id TEXT NOT NULL,
            assigned_by TEXT NOT NULL,
            assigned_at TEXT NOT NULL,
            deadline TEXT,
            priority TEXT NOT NULL DEFAULT 'normal',
            is_lead INTEGER NOT NULL DEFAULT 0,
            status TEXT NOT NULL DEFAULT 'active',
            notes TEXT
        );
        CREATE UNIQUE INDEX IF NOT EXISTS idx_active_assignment
            ON case_assignments(case_id, investigator_id) WHERE status = 'active';
        CREATE UNIQUE INDEX IF NOT EXISTS idx_active_lead
            ON case_assignments(case_id) WHERE status = 'active' AND is_lead = 1;

        CREATE TABLE IF NOT EXISTS court_assignments (
            id TEXT PRIMARY KEY,
            case_id TEXT NOT NULL REFERENCES cases(id),
            assigned_to TEXT NOT NULL,
            assigned_by TEXT NOT NULL,
            assigned_at TEXT NOT NULL,
            deadline TEXT NOT NULL,
            notes TEXT,
            status TEXT NOT NULL DEFAULT 'active'
        );
        CREATE UNIQUE INDEX IF NOT EXISTS idx_active_court_assignment
            ON court_assignments(case_id) WHERE status = 'active';

        CREATE TABLE IF NOT EXISTS case_status_history (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            case_id TEXT NOT NULL REFERENCES cases(id),
            prev_status TEXT NOT NULL,
            new_status TEXT NOT NULL,
            prev_court_status TEXT NOT NULL,
            new_court_status TEXT NOT NULL,
            actor_id TEXT NOT NULL,
            actor_role TEXT NOT NULL,
            reason TEXT NOT NULL,
            detail TEXT,
            created_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_history_case ON case_status_history(case_id);

        CREATE TABLE IF NOT EXISTS case_reports (
            id TEXT PRIMARY KEY,
            case_id TEXT NOT NULL REFERENCES cases(id),
            kind TEXT NOT NULL DEFAULT 'final',
            submitted_by TEXT NOT NULL,
            submitted_at TEXT NOT NULL,
            signed_by TEXT,
            signed_at TEXT,
            UNIQUE(case_id, kind)
        );

        CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            username TEXT NOT NULL UNIQUE,
            role TEXT NOT NULL,
            org_unit_id TEXT NOT NULL,
            active INTEGER NOT NULL DEFAULT 1
        );
        CREATE INDEX IF NOT EXISTS idx_users_role ON users(role);",
    )
}

// ============================================================================
// Row access (shared with the engine inside its transaction)
// ============================================================================

/// Conversion failure for an enum column
fn bad_text(msg: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, msg.into())
}

pub fn fetch_case(conn: &Connection, case_id: &str) -> rusqlite::Result<Option<Case>> {
    conn.query_row(
        "SELECT id, case_number, org_unit_id, title, summary, status, court_status,
                created_by, approved_by, created_at, approved_at, closed_at,
                outcome_code, outcome_description, court_deadline, court_notes,
                court_decision_ref, court_submitted_at, reopen_count
         FROM cases WHERE id = ?1",
        params![case_id],
        row_to_case,
    )
    .optional()
}

pub fn insert_case(conn: &Connection, case: &Case) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO cases (id, case_number, org_unit_id, title, summary, status, court_status,
                            created_by, created_at, reopen_count)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            case.id,
            case.case_number,
            case.org_unit_id,
            case.title,
            case.summary,
            case.status.as_str(),
            case.court_status.as_str(),
            case.created_by,
            case.created_at,
            case.reopen_count
        ],
    )?;
    Ok(())
}

/// Write back every engine-mutable field of the case row
pub fn update_case(conn: &Connection, case: &Case) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE cases SET
            status = ?1, court_status = ?2, approved_by = ?3, approved_at = ?4,
            closed_at = ?5, outcome_code = ?6, outcome_description = ?7,
            court_deadline = ?8, court_notes = ?9, court_decision_ref = ?10,
            court_submitted_at = ?11, reopen_count = ?12
         WHERE id = ?13",
        params![
            case.status.as_str(),
            case.court_status.as_str(),
            case.approved_by,
            case.approved_at,
            case.closed_at,
            case.outcome_code,
            case.outcome_description,
            case.court_deadline,
            case.court_notes,
            case.court_decision_ref,
            case.court_submitted_at,
            case.reopen_count,
            case.id
        ],
    )?;
    Ok(())
}

fn row_to_case(row: &rusqlite::Row<'_>) -> rusqlite::Result<Case> {
    let status: String = row.get("status")?;
    let court_status: String = row.get("court_status")?;
    Ok(Case {
        id: row.get("id")?,
        case_number: row.get("case_number")?,
        org_unit_id: row.get("org_unit_id")?,
        title: row.get("title")?,
        summary: row.get("summary")?,
        status: CaseStatus::parse(&status)
            .ok_or_else(|| bad_text(format!("unknown case status '{status}'")))?,
        court_status: CourtStatus::parse(&court_status)
            .ok_or_else(|| bad_text(format!("unknown court status '{court_status}'")))?,
        created_by: row.get("created_by")?,
        approved_by: row.get("approved_by")?,
        created_at: row.get("created_at")?,
        approved_at: row.get("approved_at")?,
        closed_at: row.get("closed_at")?,
        outcome_code: row.get("outcome_code")?,
        outcome_description: row.get("outcome_description")?,
        court_deadline: row.get("court_deadline")?,
        court_notes: row.get("court_notes")?,
        court_decision_ref: row.get("court_decision_ref")?,
        court_submitted_at: row.get("court_submitted_at")?,
        reopen_count: row.get("reopen_count")?,
    })
}

pub fn row_to_assignment(row: &rusqlite::Row<'_>) -> rusqlite::Result<CaseAssignment> {
    let priority: String = row.get("priority")?;
    let status: String = row.get("status")?;
    Ok(CaseAssignment {
        id: row.get("id")?,
        case_id: row.get("case_id")?,
        investigator_id: row.get("investigator_id")?,
        assigned_by: row.get("assigned_by")?,
        assigned_at: row.get("assigned_at")?,
        deadline: row.get("deadline")?,
        priority: AssignmentPriority::parse(&priority)
            .ok_or_else(|| bad_text(format!("unknown priority '{priority}'")))?,
        is_lead: row.get::<_, i64>("is_lead")? != 0,
        status: AssignmentStatus::parse(&status)
            .ok_or_else(|| bad_text(format!("unknown assignment status '{status}'")))?,
        notes: row.get("notes")?,
    })
}

pub fn row_to_court_assignment(row: &rusqlite::Row<'_>) -> rusqlite::Result<CourtAssignment> {
    let status: String = row.get("status")?;
    Ok(CourtAssignment {
        id: row.get("id")?,
        case_id: row.get("case_id")?,
        assigned_to: row.get("assigned_to")?,
        assigned_by: row.get("assigned_by")?,
        assigned_at: row.get("assigned_at")?,
        deadline: row.get("deadline")?,
        notes: row.get("notes")?,
        status: AssignmentStatus::parse(&status)
            .ok_or_else(|| bad_text(format!("unknown assignment status '{status}'")))?,
    })
}

pub fn final_report(conn: &Connection, case_id: &str) -> rusqlite::Result<Option<CaseReport>> {
    conn.query_row(
        "SELECT id, case_id, submitted_by, submitted_at, signed_by, signed_at
         FROM case_reports WHERE case_id = ?1 AND kind = 'final'",
        params![case_id],
        |row| {
            Ok(CaseReport {
                id: row.get("id")?,
                case_id: row.get("case_id")?,
                submitted_by: row.get("submitted_by")?,
                submitted_at: row.get("submitted_at")?,
                signed_by: row.get("signed_by")?,
                signed_at: row.get("signed_at")?,
            })
        },
    )
    .optional()
}

/// Ids of active users holding `role`, optionally narrowed to one org unit
pub fn users_with_role(
    conn: &Connection,
    role: Role,
    org_unit_id: Option<&str>,
) -> rusqlite::Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT id FROM users
         WHERE role = ?1 AND active = 1 AND (?2 IS NULL OR org_unit_id = ?2)
         ORDER BY id",
    )?;
    let rows = stmt.query_map(params![role.as_str(), org_unit_id], |row| row.get(0))?;
    rows.collect()
}

pub fn is_active_user_with_role(
    conn: &Connection,
    user_id: &str,
    role: Role,
) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM users WHERE id = ?1 AND role = ?2 AND active = 1)",
        params![user_id, role.as_str()],
        |row| row.get(0),
    )
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn open_store() -> (CaseStore, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = CaseStore::open(&dir.path().join("test.db")).await.unwrap();
        (store, dir)
    }

    #[tokio::test]
    async fn test_open_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("test.db");
        drop(CaseStore::open(&path).await.unwrap());
        // Second open replays the schema without error.
        drop(CaseStore::open(&path).await.unwrap());
    }

    #[tokio::test]
    async fn test_create_and_fetch_case() {
        let (store, _dir) = open_store().await;
        let case = store
            .create_case("station-01", "Stolen bicycle", None, "u-ob1")
            .await
            .unwrap();
        let fetched = store.get_case(&case.id).await.unwrap().unwrap();
        assert_eq!(fetched.case_number, case.case_number);
        assert_eq!(fetched.status, CaseStatus::Draft);
        assert_eq!(fetched.court_status, CourtStatus::NotSent);
        assert!(store.get_case("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_report_file_and_sign() {
        let (store, _dir) = open_store().await;
        let case = store
            .create_case("station-01", "Burglary", None, "u-ob1")
            .await
            .unwrap();

        let report = store.file_final_report(&case.id, "u-inv1").await.unwrap();
        assert!(!report.is_signed());

        // Filing twice is rejected.
        let err = store.file_final_report(&case.id, "u-inv1").await.unwrap_err();
        assert_eq!(err.kind(), "precondition_failed");

        let signed = store.sign_final_report(&case.id, "u-adm1").await.unwrap();
        assert!(signed.is_signed());
        assert_eq!(signed.signed_by.as_deref(), Some("u-adm1"));

        let err = store.sign_final_report(&case.id, "u-adm1").await.unwrap_err();
        assert_eq!(err.kind(), "precondition_failed");
    }

    #[tokio::test]
    async fn test_sign_without_report_is_rejected() {
        let (store, _dir) = open_store().await;
        let case = store
            .create_case("station-01", "Fraud", None, "u-ob1")
            .await
            .unwrap();
        let err = store.sign_final_report(&case.id, "u-adm1").await.unwrap_err();
        assert_eq!(err.kind(), "precondition_failed");
    }

    #[tokio::test]
    async fn test_user_directory() {
        let (store, _dir) = open_store().await;
        store
            .upsert_user(&UserRecord {
                id: "u-court1".to_string(),
                username: "registrar".to_string(),
                role: Role::CourtUser,
                org_unit_id: "court-01".to_string(),
                active: true,
            })
            .await
            .unwrap();

        let conn = store.lock().await;
        assert!(is_active_user_with_role(&conn, "u-court1", Role::CourtUser).unwrap());
        assert!(!is_active_user_with_role(&conn, "u-court1", Role::Admin).unwrap());
        let court_users = users_with_role(&conn, Role::CourtUser, None).unwrap();
        assert_eq!(court_users, vec!["u-court1".to_string()]);
    }
}
