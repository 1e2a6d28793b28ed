use crate::models::activity::{ActivityEvent, ActivityKind};
use crate::models::blocker::BlockerSignal;
use crate::models::evaluation::EvaluationResult;
use crate::models::member::{Member, MemberStatus, Role};
use crate::models::project::Project;
use crate::models::snapshot::StatusSnapshot;
use rusqlite::{params, Connection, OptionalExtension, Result, Row};

const DB_SCHEMA_VERSION: i64 = 3;

pub fn initialize_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "PRAGMA foreign_keys = ON;
         PRAGMA journal_mode = WAL;
         PRAGMA synchronous = NORMAL;",
    )?;

    let mut version: i64 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;

    if version < 1 {
        apply_migration_1(conn)?;
        version = 1;
        conn.pragma_update(None, "user_version", version)?;
    }

    if version < 2 {
        apply_migration_2(conn)?;
        version = 2;
        conn.pragma_update(None, "user_version", version)?;
    }

    if version < 3 {
        apply_migration_3(conn)?;
        version = 3;
        conn.pragma_update(None, "user_version", version)?;
    }

    if version > DB_SCHEMA_VERSION {
        log::warn!("state.db has schema version {version}, newer than {DB_SCHEMA_VERSION}");
    }

    Ok(())
}

fn apply_migration_1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS projects (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            leader_id TEXT NOT NULL,
            repo_url TEXT,
            start_date TEXT,
            end_date TEXT,
            created_at INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS project_members (
            id TEXT PRIMARY KEY,
            project_id TEXT NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
            user_id TEXT NOT NULL,
            github_username TEXT,
            role TEXT NOT NULL CHECK(role IN ('leader', 'member')) DEFAULT 'member',
            status TEXT NOT NULL CHECK(status IN ('active', 'stalled', 'ghost')) DEFAULT 'active',
            contribution_score REAL NOT NULL DEFAULT 50,
            dependency_id TEXT REFERENCES project_members(id) ON DELETE SET NULL,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL,
            UNIQUE (project_id, user_id)
        );

        CREATE TABLE IF NOT EXISTS activity_events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            project_id TEXT NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
            member_id TEXT NOT NULL REFERENCES project_members(id) ON DELETE CASCADE,
            type TEXT NOT NULL CHECK(type IN ('commit', 'pr', 'pr_review')),
            timestamp INTEGER NOT NULL,
            external_id TEXT
        );

        CREATE TABLE IF NOT EXISTS status_snapshots (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            project_id TEXT NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
            timestamp INTEGER NOT NULL,
            active_count INTEGER NOT NULL,
            stalled_count INTEGER NOT NULL,
            ghost_count INTEGER NOT NULL,
            average_score REAL NOT NULL,
            snapshot_metadata TEXT
        );
        ",
    )
}

fn apply_migration_2(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS blocker_signals (
            id TEXT PRIMARY KEY,
            project_id TEXT NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
            member_id TEXT NOT NULL REFERENCES project_members(id) ON DELETE CASCADE,
            description TEXT,
            status TEXT NOT NULL CHECK(status IN ('active', 'resolved')) DEFAULT 'active',
            created_at INTEGER NOT NULL,
            resolved_at INTEGER
        );
        ",
    )?;

    add_column_if_missing(conn, "activity_events", "metadata TEXT")?;
    add_column_if_missing(conn, "project_members", "last_evaluated_at INTEGER")?;

    Ok(())
}

fn apply_migration_3(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE INDEX IF NOT EXISTS idx_members_project ON project_members(project_id);
        CREATE INDEX IF NOT EXISTS idx_events_project_time
            ON activity_events(project_id, timestamp);
        CREATE UNIQUE INDEX IF NOT EXISTS idx_events_external
            ON activity_events(project_id, external_id) WHERE external_id IS NOT NULL;
        CREATE INDEX IF NOT EXISTS idx_snapshots_project_time
            ON status_snapshots(project_id, timestamp);
        CREATE INDEX IF NOT EXISTS idx_blockers_project ON blocker_signals(project_id, status);
        ",
    )
}

fn add_column_if_missing(conn: &Connection, table: &str, column_def: &str) -> Result<()> {
    let column_name = column_def
        .split_whitespace()
        .next()
        .unwrap_or(column_def)
        .to_string();

    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table})"))?;
    let exists = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .filter_map(|res| res.ok())
        .any(|name| name == column_name);

    if !exists {
        conn.execute(&format!("ALTER TABLE {table} ADD COLUMN {column_def}"), [])?;
    }

    Ok(())
}

pub fn get_db_connection(workspace_path: &str) -> Result<Connection> {
    let db_path = format!("{workspace_path}/.ghostbuster/state.db");
    let conn = Connection::open(db_path)?;
    initialize_schema(&conn)?;
    Ok(conn)
}

// Projects

pub fn insert_project(conn: &Connection, project: &Project) -> Result<()> {
    conn.execute(
        "INSERT INTO projects (id, name, leader_id, repo_url, start_date, end_date, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            &project.id,
            &project.name,
            &project.leader_id,
            project.repo_url.as_deref(),
            project.start_date.as_deref(),
            project.end_date.as_deref(),
            project.created_at,
        ],
    )?;
    Ok(())
}

pub fn load_project(conn: &Connection, project_id: &str) -> Result<Option<Project>> {
    let project = conn
        .query_row(
            "SELECT id, name, leader_id, repo_url, start_date, end_date, created_at
             FROM projects WHERE id = ?1",
            params![project_id],
            |row| {
                Ok(Project {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    leader_id: row.get(2)?,
                    repo_url: row.get(3)?,
                    start_date: row.get(4)?,
                    end_date: row.get(5)?,
                    created_at: row.get(6)?,
                    members: Vec::new(),
                })
            },
        )
        .optional()?;

    match project {
        Some(mut project) => {
            project.members = load_members(conn, project_id)?;
            Ok(Some(project))
        }
        None => Ok(None),
    }
}

pub fn count_projects(conn: &Connection) -> Result<usize> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM projects", [], |row| row.get(0))?;
    Ok(count as usize)
}

pub fn delete_project(conn: &Connection, project_id: &str) -> Result<bool> {
    let deleted = conn.execute("DELETE FROM projects WHERE id = ?1", params![project_id])?;
    Ok(deleted > 0)
}

// Members

const MEMBER_COLUMNS: &str = "id, project_id, user_id, github_username, role, status, \
     contribution_score, dependency_id, created_at, updated_at";

fn member_from_row(row: &Row<'_>) -> Result<Member> {
    Ok(Member {
        id: row.get(0)?,
        project_id: row.get(1)?,
        user_id: row.get(2)?,
        github_username: row.get(3)?,
        role: row.get::<_, String>(4)?.parse().unwrap_or(Role::Member),
        status: row.get::<_, String>(5)?.parse().unwrap_or(MemberStatus::Active),
        contribution_score: row.get(6)?,
        dependency_id: row.get(7)?,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
    })
}

pub fn insert_member(conn: &Connection, member: &Member) -> Result<()> {
    conn.execute(
        &format!(
            "INSERT INTO project_members ({MEMBER_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)"
        ),
        params![
            &member.id,
            &member.project_id,
            &member.user_id,
            member.github_username.as_deref(),
            member.role.as_str(),
            member.status.as_str(),
            member.contribution_score,
            member.dependency_id.as_deref(),
            member.created_at,
            member.updated_at,
        ],
    )?;
    Ok(())
}

pub fn load_members(conn: &Connection, project_id: &str) -> Result<Vec<Member>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {MEMBER_COLUMNS} FROM project_members
         WHERE project_id = ?1 ORDER BY created_at ASC, id ASC"
    ))?;
    let members = stmt
        .query_map(params![project_id], member_from_row)?
        .collect::<Result<Vec<_>>>()?;
    Ok(members)
}

pub fn delete_member(conn: &Connection, member_id: &str) -> Result<bool> {
    let deleted = conn.execute("DELETE FROM project_members WHERE id = ?1", params![member_id])?;
    Ok(deleted > 0)
}

pub fn update_dependency(
    conn: &Connection,
    member_id: &str,
    dependency_id: Option<&str>,
) -> Result<()> {
    conn.execute(
        "UPDATE project_members SET dependency_id = ?2, updated_at = ?3 WHERE id = ?1",
        params![member_id, dependency_id, chrono::Utc::now().timestamp()],
    )?;
    Ok(())
}

// Activity

/// Append an event. Returns `false` when an event with the same external id
/// was already recorded for the project.
pub fn insert_event(conn: &Connection, project_id: &str, event: &ActivityEvent) -> Result<bool> {
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO activity_events
         (project_id, member_id, type, timestamp, external_id, metadata)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            project_id,
            &event.member_id,
            event.kind.as_str(),
            event.timestamp,
            event.external_id.as_deref(),
            event.metadata.as_deref(),
        ],
    )?;
    Ok(inserted > 0)
}

pub fn insert_events(
    conn: &Connection,
    project_id: &str,
    events: &[ActivityEvent],
) -> Result<usize> {
    let tx = conn.unchecked_transaction()?;
    let mut inserted = 0;
    for event in events {
        if insert_event(&tx, project_id, event)? {
            inserted += 1;
        }
    }
    tx.commit()?;
    Ok(inserted)
}

fn event_from_row(row: &Row<'_>) -> Result<ActivityEvent> {
    let kind: String = row.get(1)?;
    let kind: ActivityKind = kind.parse().map_err(|e: String| {
        rusqlite::Error::FromSqlConversionFailure(1, rusqlite::types::Type::Text, e.into())
    })?;

    Ok(ActivityEvent {
        member_id: row.get(0)?,
        kind,
        timestamp: row.get(2)?,
        external_id: row.get(3)?,
        metadata: row.get(4)?,
    })
}

pub fn load_events_since(
    conn: &Connection,
    project_id: &str,
    since: i64,
) -> Result<Vec<ActivityEvent>> {
    let mut stmt = conn.prepare(
        "SELECT member_id, type, timestamp, external_id, metadata FROM activity_events
         WHERE project_id = ?1 AND timestamp >= ?2
         ORDER BY timestamp ASC, id ASC",
    )?;

    let events = stmt
        .query_map(params![project_id, since], event_from_row)?
        .collect::<Result<Vec<_>>>()?;
    Ok(events)
}

// Evaluation results

/// Write member statuses and scores. Callers wanting this to be atomic with
/// the snapshot use [`record_evaluation`].
pub fn persist_evaluation(conn: &Connection, result: &EvaluationResult) -> Result<()> {
    for member in &result.members {
        conn.execute(
            "UPDATE project_members
             SET status = ?2, contribution_score = ?3, last_evaluated_at = ?4, updated_at = ?4
             WHERE id = ?1",
            params![
                &member.member_id,
                member.status.as_str(),
                member.contribution_score,
                result.evaluated_at,
            ],
        )?;
    }
    Ok(())
}

/// Persist an evaluation pass in one transaction: member statuses, a new
/// status snapshot, and pruning down to `retain` snapshots.
pub fn record_evaluation(
    conn: &Connection,
    result: &EvaluationResult,
    retain: usize,
) -> Result<StatusSnapshot> {
    let tx = conn.unchecked_transaction()?;
    persist_evaluation(&tx, result)?;
    let snapshot = insert_snapshot(&tx, result)?;
    let pruned = prune_snapshots(&tx, &result.project_id, retain)?;
    tx.commit()?;

    if pruned > 0 {
        log::debug!("pruned {pruned} old snapshots of {}", result.project_id);
    }
    Ok(snapshot)
}

pub fn insert_snapshot(conn: &Connection, result: &EvaluationResult) -> Result<StatusSnapshot> {
    let metadata = serde_json::json!({
        "member_count": result.members.len(),
        "duration_ms": result.duration_ms,
    })
    .to_string();

    conn.execute(
        "INSERT INTO status_snapshots
         (project_id, timestamp, active_count, stalled_count, ghost_count, average_score,
          snapshot_metadata)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            &result.project_id,
            result.evaluated_at,
            result.active_count as i64,
            result.stalled_count as i64,
            result.ghost_count as i64,
            result.average_score,
            &metadata,
        ],
    )?;

    Ok(StatusSnapshot {
        id: conn.last_insert_rowid(),
        project_id: result.project_id.clone(),
        timestamp: result.evaluated_at,
        active_count: result.active_count,
        stalled_count: result.stalled_count,
        ghost_count: result.ghost_count,
        average_score: result.average_score,
        snapshot_metadata: Some(metadata),
    })
}

pub fn load_snapshots(conn: &Connection, project_id: &str) -> Result<Vec<StatusSnapshot>> {
    let mut stmt = conn.prepare(
        "SELECT id, project_id, timestamp, active_count, stalled_count, ghost_count,
         average_score, snapshot_metadata FROM status_snapshots
         WHERE project_id = ?1 ORDER BY timestamp ASC, id ASC",
    )?;

    let snapshots = stmt
        .query_map(params![project_id], |row| {
            Ok(StatusSnapshot {
                id: row.get(0)?,
                project_id: row.get(1)?,
                timestamp: row.get(2)?,
                active_count: row.get::<_, i64>(3)? as usize,
                stalled_count: row.get::<_, i64>(4)? as usize,
                ghost_count: row.get::<_, i64>(5)? as usize,
                average_score: row.get(6)?,
                snapshot_metadata: row.get(7)?,
            })
        })?
        .collect::<Result<Vec<_>>>()?;

    Ok(snapshots)
}

/// Keep only the newest `retain` snapshots of a project.
pub fn prune_snapshots(conn: &Connection, project_id: &str, retain: usize) -> Result<usize> {
    conn.execute(
        "DELETE FROM status_snapshots WHERE project_id = ?1 AND id NOT IN (
            SELECT id FROM status_snapshots WHERE project_id = ?1
            ORDER BY timestamp DESC, id DESC LIMIT ?2
        )",
        params![project_id, retain as i64],
    )
}

pub fn last_evaluation_time(conn: &Connection) -> Option<i64> {
    conn.query_row("SELECT MAX(timestamp) FROM status_snapshots", [], |row| row.get(0))
        .ok()
        .flatten()
}

// Blockers

const BLOCKER_COLUMNS: &str =
    "id, project_id, member_id, description, status, created_at, resolved_at";

fn blocker_from_row(row: &Row<'_>) -> Result<BlockerSignal> {
    Ok(BlockerSignal {
        id: row.get(0)?,
        project_id: row.get(1)?,
        member_id: row.get(2)?,
        description: row.get(3)?,
        status: row.get(4)?,
        created_at: row.get(5)?,
        resolved_at: row.get(6)?,
    })
}

pub fn count_open_blockers(conn: &Connection, project_id: &str) -> Result<usize> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM blocker_signals WHERE project_id = ?1 AND status = 'active'",
        params![project_id],
        |row| row.get(0),
    )?;
    Ok(count as usize)
}

pub async fn blocker_crud(
    workspace_path: String,
    operation: String,
    item: Option<BlockerSignal>,
    id: Option<String>,
) -> std::result::Result<serde_json::Value, String> {
    let conn = get_db_connection(&workspace_path)
        .map_err(|e| format!("DB error: {e}"))?;

    match operation.as_str() {
        "report" => {
            let mut item = item.ok_or("Item required for report")?;
            let members = load_members(&conn, &item.project_id)
                .map_err(|e| format!("DB read error: {e}"))?;
            if !members.iter().any(|m| m.id == item.member_id) {
                return Err(format!("UNKNOWN_MEMBER: {}", item.member_id));
            }
            if item.id.is_empty() {
                item.id = uuid::Uuid::new_v4().to_string();
            }
            conn.execute(
                &format!(
                    "INSERT INTO blocker_signals ({BLOCKER_COLUMNS})
                     VALUES (?1, ?2, ?3, ?4, 'active', ?5, NULL)"
                ),
                params![
                    &item.id,
                    &item.project_id,
                    &item.member_id,
                    item.description.as_deref(),
                    item.created_at
                ],
            )
            .map_err(|e| format!("Insert error: {e}"))?;
            log::info!("blocker {} reported by {}", item.id, item.member_id);
            Ok(serde_json::json!({"status": "reported", "id": item.id}))
        }
        "resolve" => {
            let id = id.ok_or("ID required for resolve")?;
            let now = chrono::Utc::now().timestamp();
            let updated = conn
                .execute(
                    "UPDATE blocker_signals SET status = 'resolved', resolved_at = ?2
                     WHERE id = ?1 AND status = 'active'",
                    params![&id, now],
                )
                .map_err(|e| format!("Update error: {e}"))?;
            if updated == 0 {
                return Err(format!("No open blocker with id {id}"));
            }
            Ok(serde_json::json!({"status": "resolved", "id": id}))
        }
        "list" => {
            let project_id = item
                .map(|i| i.project_id)
                .or(id)
                .ok_or("Project ID required for list")?;
            let mut stmt = conn
                .prepare(&format!(
                    "SELECT {BLOCKER_COLUMNS} FROM blocker_signals
                     WHERE project_id = ?1 ORDER BY created_at DESC"
                ))
                .map_err(|e| format!("Query error: {e}"))?;

            let items = stmt
                .query_map(params![project_id], blocker_from_row)
                .and_then(|rows| rows.collect::<Result<Vec<_>>>())
                .map_err(|e| format!("Map error: {e}"))?;

            Ok(serde_json::to_value(items).unwrap_or_default())
        }
        "delete" => {
            let id = id.ok_or("ID required for delete")?;
            conn.execute("DELETE FROM blocker_signals WHERE id = ?1", params![id])
                .map_err(|e| format!("Delete error: {e}"))?;
            Ok(serde_json::json!({"status": "deleted"}))
        }
        _ => Err(format!("Unknown operation: {operation}")),
    }
}
