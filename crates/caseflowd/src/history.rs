//! Audit trail recorder
//!
//! One insert per accepted transition, on the engine's transaction.
//! Nothing here updates or deletes; reads come back in insertion order.

use chrono::Utc;
use rusqlite::{params, Connection};

use caseflow_common::{Actor, Case, CaseStatus, CaseStatusEvent, CourtStatus, Role};

/// Append the ledger row documenting `prev` moving to `new`
pub fn append(
    conn: &Connection,
    prev: &Case,
    new: &Case,
    actor: &Actor,
    reason: &str,
    detail: Option<serde_json::Value>,
) -> rusqlite::Result<i64> {
    let detail_text = detail.map(|d| d.to_string());
    conn.execute(
        "INSERT INTO case_status_history
             (case_id, prev_status, new_status, prev_court_status, new_court_status,
              actor_id, actor_role, reason, detail, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            new.id,
            prev.status.as_str(),
            new.status.as_str(),
            prev.court_status.as_str(),
            new.court_status.as_str(),
            actor.user_id,
            actor.role.as_str(),
            reason,
            detail_text,
            Utc::now()
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Full ordered ledger for one case
pub fn for_case(conn: &Connection, case_id: &str) -> rusqlite::Result<Vec<CaseStatusEvent>> {
    let mut stmt = conn.prepare(
        "SELECT id, case_id, prev_status, new_status, prev_court_status, new_court_status,
                actor_id, actor_role, reason, detail, created_at
         FROM case_status_history WHERE case_id = ?1 ORDER BY id",
    )?;
    let rows = stmt.query_map(params![case_id], row_to_event)?;
    rows.collect()
}

fn bad_text(msg: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, msg.into())
}

fn row_to_event(row: &rusqlite::Row<'_>) -> rusqlite::Result<CaseStatusEvent> {
    let prev_status: String = row.get("prev_status")?;
    let new_status: String = row.get("new_status")?;
    let prev_court: String = row.get("prev_court_status")?;
    let new_court: String = row.get("new_court_status")?;
    let actor_role: String = row.get("actor_role")?;
    let detail_text: Option<String> = row.get("detail")?;
    Ok(CaseStatusEvent {
        id: row.get("id")?,
        case_id: row.get("case_id")?,
        prev_status: CaseStatus::parse(&prev_status)
            .ok_or_else(|| bad_text(format!("unknown case status '{prev_status}'")))?,
        new_status: CaseStatus::parse(&new_status)
            .ok_or_else(|| bad_text(format!("unknown case status '{new_status}'")))?,
        prev_court_status: CourtStatus::parse(&prev_court)
            .ok_or_else(|| bad_text(format!("unknown court status '{prev_court}'")))?,
        new_court_status: CourtStatus::parse(&new_court)
            .ok_or_else(|| bad_text(format!("unknown court status '{new_court}'")))?,
        actor_id: row.get("actor_id")?,
        actor_role: Role::parse(&actor_role)
            .ok_or_else(|| bad_text(format!("unknown role '{actor_role}'")))?,
        reason: row.get("reason")?,
        detail: detail_text.and_then(|t| serde_json::from_str(&t).ok()),
        created_at: row.get("created_at")?,
    })
}
