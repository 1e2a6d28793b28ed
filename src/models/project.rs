use super::member::{Member, Role};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub name: String,
    pub leader_id: String,
    pub repo_url: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub created_at: i64,
    pub members: Vec<Member>,
}

impl Project {
    pub fn leader(&self) -> Option<&Member> {
        self.members
            .iter()
            .find(|m| m.id == self.leader_id && m.role == Role::Leader)
    }

    pub fn member(&self, member_id: &str) -> Option<&Member> {
        self.members.iter().find(|m| m.id == member_id)
    }
}

/// Input for creating a project. The leader becomes its first member.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewProject {
    pub name: String,
    pub leader_user_id: String,
    pub leader_github_username: Option<String>,
    pub repo_url: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

/// Extract `(owner, repo)` from a GitHub-style remote URL.
///
/// Accepts `https://github.com/owner/repo`, an optional `.git` suffix or
/// trailing slash, and the scp-like `git@github.com:owner/repo.git` form.
pub fn parse_repo_url(url: &str) -> Option<(String, String)> {
    let trimmed = url.trim().trim_end_matches('/');
    let path = if let Some(rest) = trimmed.strip_prefix("git@") {
        rest.split_once(':')?.1
    } else {
        let without_scheme = trimmed
            .split_once("://")
            .map(|(_, rest)| rest)
            .unwrap_or(trimmed);
        without_scheme.split_once('/')?.1
    };

    let mut parts = path.split('/').filter(|p| !p.is_empty());
    let owner = parts.next()?;
    let repo = parts.next()?.trim_end_matches(".git");
    if parts.next().is_some() || owner.is_empty() || repo.is_empty() {
        return None;
    }

    Some((owner.to_string(), repo.to_string()))
}
