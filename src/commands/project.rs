use crate::commands::db;
use crate::commands::evaluate::build_dependency_graph;
use crate::models::member::{Member, MemberId, MemberStatus, Role};
use crate::models::project::{parse_repo_url, NewProject, Project};
use rusqlite::Connection;

pub async fn create_project(workspace_path: String, input: NewProject) -> Result<Project, String> {
    let name = input.name.trim();
    if name.is_empty() {
        return Err("INVALID_INPUT: Project name is required".to_string());
    }
    if let Some(url) = input.repo_url.as_deref() {
        if parse_repo_url(url).is_none() {
            return Err(format!("INVALID_INPUT: Not a repository URL: {url}"));
        }
    }

    let conn = open(&workspace_path)?;
    let now = chrono::Utc::now().timestamp();
    let project_id = uuid::Uuid::new_v4().to_string();

    let leader = new_member(
        &project_id,
        input.leader_user_id,
        input.leader_github_username,
        Role::Leader,
        now,
    );

    let project = Project {
        id: project_id,
        name: name.to_string(),
        leader_id: leader.id.clone(),
        repo_url: input.repo_url,
        start_date: input.start_date,
        end_date: input.end_date,
        created_at: now,
        members: vec![leader],
    };

    let tx = conn
        .unchecked_transaction()
        .map_err(|e| format!("DB error: {e}"))?;
    db::insert_project(&tx, &project).map_err(|e| format!("Insert error: {e}"))?;
    db::insert_member(&tx, &project.members[0]).map_err(|e| format!("Insert error: {e}"))?;
    tx.commit().map_err(|e| format!("Commit error: {e}"))?;

    log::info!("created project {} ({})", project.name, project.id);
    Ok(project)
}

pub async fn get_project(workspace_path: String, project_id: String) -> Result<Project, String> {
    let conn = open(&workspace_path)?;
    load(&conn, &project_id)
}

pub async fn delete_project(workspace_path: String, project_id: String) -> Result<(), String> {
    let conn = open(&workspace_path)?;
    let deleted = db::delete_project(&conn, &project_id).map_err(|e| format!("Delete error: {e}"))?;
    if !deleted {
        return Err(format!("UNKNOWN_PROJECT: {project_id}"));
    }
    log::info!("deleted project {project_id}");
    Ok(())
}

pub async fn join_project(
    workspace_path: String,
    project_id: String,
    user_id: String,
    github_username: Option<String>,
) -> Result<Member, String> {
    let conn = open(&workspace_path)?;
    let project = load(&conn, &project_id)?;

    if project.members.iter().any(|m| m.user_id == user_id) {
        return Err(format!("INVALID_INPUT: {user_id} already belongs to this project"));
    }

    let member = new_member(
        &project_id,
        user_id,
        github_username,
        Role::Member,
        chrono::Utc::now().timestamp(),
    );
    db::insert_member(&conn, &member).map_err(|e| format!("Insert error: {e}"))?;

    log::info!("{} joined project {project_id} as {}", member.user_id, member.id);
    Ok(member)
}

/// Remove a member. Anyone who was waiting on them loses that dependency;
/// their ids are returned.
pub async fn remove_member(
    workspace_path: String,
    project_id: String,
    member_id: String,
) -> Result<Vec<MemberId>, String> {
    let conn = open(&workspace_path)?;
    let project = load(&conn, &project_id)?;

    let member = project
        .member(&member_id)
        .ok_or_else(|| format!("UNKNOWN_MEMBER: {member_id}"))?;
    if member.role == Role::Leader {
        return Err("INVALID_INPUT: The project leader cannot be removed".to_string());
    }

    let mut graph = build_dependency_graph(&project.members);
    let cleared = graph.remove_member(&member_id);

    let tx = conn
        .unchecked_transaction()
        .map_err(|e| format!("DB error: {e}"))?;
    for dependent in &cleared {
        db::update_dependency(&tx, dependent, None).map_err(|e| format!("Update error: {e}"))?;
    }
    db::delete_member(&tx, &member_id).map_err(|e| format!("Delete error: {e}"))?;
    tx.commit().map_err(|e| format!("Commit error: {e}"))?;

    log::info!("removed {member_id} from {project_id}; cleared {} dependencies", cleared.len());
    Ok(cleared)
}

/// Declare that `member_id` is waiting on `depends_on`. Rejected without any
/// change if it would create a cycle.
pub async fn set_dependency(
    workspace_path: String,
    project_id: String,
    member_id: String,
    depends_on: String,
) -> Result<Member, String> {
    let conn = open(&workspace_path)?;
    let project = load(&conn, &project_id)?;

    let mut graph = build_dependency_graph(&project.members);
    graph
        .add_edge(&member_id, &depends_on)
        .map_err(|e| e.to_string())?;

    db::update_dependency(&conn, &member_id, Some(&depends_on))
        .map_err(|e| format!("Update error: {e}"))?;

    log::debug!("{member_id} now depends on {depends_on}");
    reload_member(&conn, &project_id, &member_id)
}

pub async fn clear_dependency(
    workspace_path: String,
    project_id: String,
    member_id: String,
) -> Result<Member, String> {
    let conn = open(&workspace_path)?;
    let project = load(&conn, &project_id)?;
    if project.member(&member_id).is_none() {
        return Err(format!("UNKNOWN_MEMBER: {member_id}"));
    }

    db::update_dependency(&conn, &member_id, None).map_err(|e| format!("Update error: {e}"))?;
    reload_member(&conn, &project_id, &member_id)
}

fn new_member(
    project_id: &str,
    user_id: String,
    github_username: Option<String>,
    role: Role,
    now: i64,
) -> Member {
    Member {
        id: uuid::Uuid::new_v4().to_string(),
        project_id: project_id.to_string(),
        user_id,
        github_username: github_username.filter(|u| !u.trim().is_empty()),
        role,
        dependency_id: None,
        status: MemberStatus::Active,
        contribution_score: 50.0,
        created_at: now,
        updated_at: now,
    }
}

fn open(workspace_path: &str) -> Result<Connection, String> {
    db::get_db_connection(workspace_path).map_err(|e| format!("DB error: {e}"))
}

fn load(conn: &Connection, project_id: &str) -> Result<Project, String> {
    db::load_project(conn, project_id)
        .map_err(|e| format!("DB read error: {e}"))?
        .ok_or_else(|| format!("UNKNOWN_PROJECT: {project_id}"))
}

fn reload_member(conn: &Connection, project_id: &str, member_id: &str) -> Result<Member, String> {
    db::load_members(conn, project_id)
        .map_err(|e| format!("DB read error: {e}"))?
        .into_iter()
        .find(|m| m.id == member_id)
        .ok_or_else(|| format!("UNKNOWN_MEMBER: {member_id}"))
}
