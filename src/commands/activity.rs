use crate::models::activity::{ActivityEvent, ActivityKind};
use crate::models::snapshot::StatusSnapshot;

/// Append one activity event for a member. Returns `false` when an event
/// with the same `external_id` was already recorded.
pub async fn record_activity(
    workspace_path: String,
    project_id: String,
    member_id: String,
    kind: String,
    timestamp: Option<i64>,
    external_id: Option<String>,
) -> Result<bool, String> {
    let kind: ActivityKind = kind.parse().map_err(|e| format!("INVALID_INPUT: {e}"))?;
    let timestamp = timestamp.unwrap_or_else(|| chrono::Utc::now().timestamp());
    if timestamp <= 0 {
        return Err(format!("INVALID_INPUT: timestamp must be positive, got {timestamp}"));
    }

    let conn = crate::commands::db::get_db_connection(&workspace_path)
        .map_err(|e| format!("DB error: {e}"))?;
    let members = crate::commands::db::load_members(&conn, &project_id)
        .map_err(|e| format!("DB read error: {e}"))?;
    if !members.iter().any(|m| m.id == member_id) {
        return Err(format!("UNKNOWN_MEMBER: {member_id}"));
    }

    let mut event = ActivityEvent::new(member_id, kind, timestamp);
    event.external_id = external_id;

    let inserted = crate::commands::db::insert_event(&conn, &project_id, &event)
        .map_err(|e| format!("Insert error: {e}"))?;
    if !inserted {
        log::debug!("duplicate {} event for {} ignored", kind.as_str(), event.member_id);
    }
    Ok(inserted)
}

pub async fn get_status_snapshots(
    workspace_path: String,
    project_id: String,
) -> Result<Vec<StatusSnapshot>, String> {
    let conn = crate::commands::db::get_db_connection(&workspace_path)
        .map_err(|e| format!("DB error: {e}"))?;
    crate::commands::db::load_snapshots(&conn, &project_id)
        .map_err(|e| format!("DB read error: {e}"))
}
