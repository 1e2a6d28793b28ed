use crate::models::workspace::WorkspaceMeta;
use git2::Repository;
use std::fs;
use std::path::Path;

pub async fn open_workspace(path: String) -> Result<WorkspaceMeta, String> {
    let workspace_path = Path::new(&path);

    if !workspace_path.exists() {
        return Err("PATH_NOT_FOUND: Directory does not exist".to_string());
    }

    let ghostbuster_dir = workspace_path.join(".ghostbuster");
    fs::create_dir_all(&ghostbuster_dir)
        .map_err(|e| format!("INIT_FAILED: Could not create .ghostbuster directory: {}", e))?;

    // Initialize SQLite database with migrations.
    let conn = crate::commands::db::get_db_connection(&path)
        .map_err(|e| format!("INIT_FAILED: Could not initialize database: {}", e))?;

    // Initialize settings file with defaults/migrations.
    crate::commands::settings::load_settings_from_disk(&path)
        .map_err(|e| format!("INIT_FAILED: Could not initialize settings: {}", e))?;

    let name = workspace_path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "unknown".to_string());

    // A workspace doesn't have to be a repository; ingestion can point elsewhere.
    let branch = Repository::open(&path).ok().and_then(|repo| {
        repo.head()
            .ok()
            .and_then(|head| head.shorthand().map(|s| s.to_string()))
    });

    let project_count = crate::commands::db::count_projects(&conn)
        .map_err(|e| format!("DB read error: {e}"))?;

    log::info!("opened workspace {path} ({project_count} projects)");

    Ok(WorkspaceMeta {
        path: path.clone(),
        name,
        branch,
        project_count,
        last_evaluation_at: crate::commands::db::last_evaluation_time(&conn),
    })
}

/// Import commit activity for a project's members from a local clone.
/// Returns how many new events were stored; re-running is idempotent.
pub async fn ingest_git_history(
    workspace_path: String,
    project_id: String,
    repo_path: String,
    history_days: Option<u32>,
) -> Result<usize, String> {
    let settings = crate::commands::settings::load_effective_evaluation_settings(&workspace_path)?;
    let history_days = history_days.unwrap_or(settings.git_history_days).max(1);

    Repository::open(&repo_path)
        .map_err(|_| format!("NOT_GIT_REPO: {repo_path} is not a Git repository"))?;

    let conn = crate::commands::db::get_db_connection(&workspace_path)
        .map_err(|e| format!("DB error: {e}"))?;
    let members = crate::commands::db::load_members(&conn, &project_id)
        .map_err(|e| format!("DB read error: {e}"))?;
    if members.is_empty() {
        return Err(format!("UNKNOWN_PROJECT: {project_id}"));
    }

    let since = chrono::Utc::now().timestamp() - history_days as i64 * 86400;
    let events = crate::analysis::ingest::collect_commit_events(&repo_path, &members, since)
        .map_err(|e| e.to_string())?;

    let inserted = crate::commands::db::insert_events(&conn, &project_id, &events)
        .map_err(|e| format!("DB insert error: {e}"))?;

    log::info!(
        "ingested {inserted} new commit events ({} seen) into project {project_id}",
        events.len()
    );
    Ok(inserted)
}
