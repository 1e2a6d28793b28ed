use crate::error::Result;
use crate::models::activity::{ActivityEvent, ActivityKind};
use crate::models::member::Member;
use git2::Repository;
use serde_json::json;
use std::collections::HashMap;

/// Walk the local history of `repo_path` and turn commits authored by a
/// project member into `commit` events keyed by sha.
///
/// A commit belongs to a member when its author name, or the local part of
/// its author email, matches the member's GitHub username (case-insensitive).
/// Commits older than `since` stop the walk.
pub fn collect_commit_events(
    repo_path: &str,
    members: &[Member],
    since: i64,
) -> Result<Vec<ActivityEvent>> {
    let repo = Repository::open(repo_path)?;
    let authors = author_index(members);
    if authors.is_empty() {
        log::info!("no member of the project has a GitHub username; skipping {repo_path}");
        return Ok(Vec::new());
    }

    let mut revwalk = repo.revwalk()?;
    if revwalk.push_head().is_err() {
        // Unborn HEAD: nothing committed yet.
        return Ok(Vec::new());
    }
    revwalk.set_sorting(git2::Sort::TIME)?;

    let mut events = Vec::new();
    for oid in revwalk.flatten() {
        let commit = match repo.find_commit(oid) {
            Ok(c) => c,
            Err(_) => continue,
        };

        let timestamp = commit.time().seconds();
        if timestamp < since {
            break;
        }

        let author = commit.author();
        let member_id = author
            .name()
            .and_then(|name| authors.get(&name.to_lowercase()))
            .or_else(|| {
                author
                    .email()
                    .and_then(|email| email.split('@').next())
                    .and_then(|local| authors.get(&local.to_lowercase()))
            });

        if let Some(member_id) = member_id {
            let metadata = serde_json::to_string(&json!({
                "summary": commit.summary(),
                "author_name": author.name(),
                "author_email": author.email(),
            }))?;
            events.push(
                ActivityEvent::new(member_id.clone(), ActivityKind::Commit, timestamp)
                    .with_external_id(oid.to_string())
                    .with_metadata(metadata),
            );
        }
    }

    log::debug!("collected {} commit events from {repo_path}", events.len());
    Ok(events)
}

fn author_index(members: &[Member]) -> HashMap<String, String> {
    members
        .iter()
        .filter_map(|m| {
            m.github_username
                .as_deref()
                .map(str::trim)
                .filter(|u| !u.is_empty())
                .map(|u| (u.to_lowercase(), m.id.clone()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::member::{MemberStatus, Role};
    use git2::{Signature, Time};

    fn member(id: &str, username: Option<&str>) -> Member {
        Member {
            id: id.to_string(),
            project_id: "p".to_string(),
            user_id: format!("user-{id}"),
            github_username: username.map(str::to_string),
            role: Role::Member,
            dependency_id: None,
            status: MemberStatus::Ghost,
            contribution_score: 50.0,
            created_at: 0,
            updated_at: 0,
        }
    }

    fn commit_as(repo: &Repository, name: &str, email: &str, seconds: i64) {
        let signature = Signature::new(name, email, &Time::new(seconds, 0)).expect("signature");
        let tree_id = repo.index().expect("index").write_tree().expect("tree");
        let tree = repo.find_tree(tree_id).expect("find tree");
        let parent = repo.head().ok().and_then(|h| h.peel_to_commit().ok());
        let parents: Vec<&git2::Commit> = parent.iter().collect();
        repo.commit(Some("HEAD"), &signature, &signature, "work", &tree, &parents)
            .expect("commit");
    }

    #[test]
    fn matches_authors_by_name_or_email_and_stops_at_cutoff() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let repo = Repository::init(tmp.path()).expect("init");
        commit_as(&repo, "Someone Old", "ritika@example.com", 1_000_000);
        commit_as(&repo, "Ritika-Dev67", "r@example.com", 2_000_000);
        commit_as(&repo, "Sarah Miller", "sarahm@example.com", 2_000_100);
        commit_as(&repo, "Stranger", "stranger@example.com", 2_000_200);

        let members = vec![
            member("m1", Some("ritika-dev67")),
            member("m2", Some("SarahM")),
            member("m3", None),
        ];

        let events = collect_commit_events(&tmp.path().to_string_lossy(), &members, 1_500_000)
            .expect("collect");

        let mut owners: Vec<&str> = events.iter().map(|e| e.member_id.as_str()).collect();
        owners.sort();
        assert_eq!(owners, vec!["m1", "m2"]);
        assert!(events.iter().all(|e| e.external_id.is_some()));

        let sarah = events.iter().find(|e| e.member_id == "m2").expect("m2 event");
        let metadata: serde_json::Value =
            serde_json::from_str(sarah.metadata.as_deref().expect("metadata")).expect("json");
        assert_eq!(metadata["summary"], json!("work"));
        assert_eq!(metadata["author_email"], json!("sarahm@example.com"));
    }

    #[test]
    fn empty_repository_yields_no_events() {
        let tmp = tempfile::tempdir().expect("tempdir");
        Repository::init(tmp.path()).expect("init");
        let members = [member("m1", Some("a"))];
        let events =
            collect_commit_events(&tmp.path().to_string_lossy(), &members, 1).expect("collect");
        assert!(events.is_empty());
    }
}
