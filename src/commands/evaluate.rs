use crate::analysis::activity::{self, ActivityLog, SharedActivityLog};
use crate::analysis::classifier::classify_project;
use crate::analysis::graph::DependencyGraph;
use crate::analysis::scoring::{score_members, ScoreInput};
use crate::commands::settings::EvaluationSettings;
use crate::error::{GhostError, Result as GhostResult};
use crate::models::evaluation::*;
use crate::models::member::{ActivityCounters, Member, MemberId, MemberStatus};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

pub async fn run_evaluation(
    workspace_path: String,
    project_id: String,
    cache: Arc<Mutex<EvaluationCache>>,
) -> Result<EvaluationResult, String> {
    let now = chrono::Utc::now().timestamp();
    run_evaluation_internal(&workspace_path, &project_id, now, &cache)
}

/// Classify and score every member of a project as of `now`, persist the
/// results, record a status snapshot and refresh the cache.
pub fn run_evaluation_internal(
    workspace_path: &str,
    project_id: &str,
    now: i64,
    cache: &Arc<Mutex<EvaluationCache>>,
) -> Result<EvaluationResult, String> {
    let start = std::time::Instant::now();
    let settings = crate::commands::settings::load_effective_evaluation_settings(workspace_path)?;

    let conn = crate::commands::db::get_db_connection(workspace_path)
        .map_err(|e| format!("DB error: {e}"))?;
    let project = crate::commands::db::load_project(&conn, project_id)
        .map_err(|e| format!("DB read error: {e}"))?
        .ok_or_else(|| format!("UNKNOWN_PROJECT: {project_id}"))?;

    // One read of the event table is the snapshot this pass works on.
    let since = earliest_window_start(now, &settings).map_err(|e| e.to_string())?;
    let events = crate::commands::db::load_events_since(&conn, project_id, since)
        .map_err(|e| format!("DB read error: {e}"))?;
    let activity_log = ActivityLog::from_events(events);

    let mut result =
        evaluate_snapshot(project_id, &project.members, &activity_log, now, &settings)
            .map_err(|e| e.to_string())?;
    result.duration_ms = start.elapsed().as_millis() as u64;

    crate::commands::db::record_evaluation(&conn, &result, settings.snapshot_retention)
        .map_err(|e| format!("DB upsert error: {e}"))?;

    log::info!(
        "evaluated project {project_id}: {} active, {} stalled, {} ghost in {}ms",
        result.active_count,
        result.stalled_count,
        result.ghost_count,
        result.duration_ms
    );

    update_cache(cache, result.clone());
    Ok(result)
}

/// Evaluate against a live, concurrently written activity log. The log is
/// locked only long enough to copy the events the pass needs.
pub fn evaluate_live(
    project_id: &str,
    members: &[Member],
    shared: &SharedActivityLog,
    now: i64,
    settings: &EvaluationSettings,
) -> GhostResult<EvaluationResult> {
    let since = earliest_window_start(now, settings)?;
    let snapshot = {
        let guard = shared
            .lock()
            .map_err(|_| GhostError::InvalidInput("activity log lock poisoned".to_string()))?;
        guard.snapshot_since(since)
    };
    evaluate_snapshot(project_id, members, &snapshot, now, settings)
}

/// Pure evaluation pass over a fixed set of members and events.
pub fn evaluate_snapshot(
    project_id: &str,
    members: &[Member],
    activity_log: &ActivityLog,
    now: i64,
    settings: &EvaluationSettings,
) -> GhostResult<EvaluationResult> {
    let active_start = activity::window_start(now, settings.active_window_hours as i64)?;
    let score_start = activity::window_start(now, settings.score_window_days as i64 * 24)?;

    let graph = build_dependency_graph(members);

    let mut recent: HashMap<MemberId, ActivityCounters> = HashMap::with_capacity(members.len());
    let mut window: HashMap<MemberId, ActivityCounters> = HashMap::with_capacity(members.len());
    for member in members {
        recent.insert(member.id.clone(), activity_log.counters_for(&member.id, active_start)?);
        window.insert(member.id.clone(), activity_log.counters_for(&member.id, score_start)?);
    }

    let statuses = classify_project(&graph, &recent, &settings.policy);

    let inputs: Vec<ScoreInput<'_>> = members
        .iter()
        .map(|member| ScoreInput {
            member_id: &member.id,
            counters: window[&member.id],
            status: statuses[&member.id],
        })
        .collect();
    let scores = score_members(&inputs, &settings.scoring);

    let evaluations: Vec<MemberEvaluation> = members
        .iter()
        .map(|member| MemberEvaluation {
            member_id: member.id.clone(),
            user_id: member.user_id.clone(),
            github_username: member.github_username.clone(),
            status: statuses[&member.id],
            contribution_score: scores[&member.id],
            recent: recent[&member.id],
            window: window[&member.id],
            dependency_id: graph.resolve(&member.id).cloned(),
            dependency_depth: graph.depth(&member.id),
            streak_days: activity_log.streak_days(&member.id, now),
            last_activity_at: activity_log.last_activity(&member.id),
        })
        .collect();

    let daily = activity_log.daily_counters(None, score_start, now)?;
    Ok(build_evaluation_result(project_id, now, evaluations, daily))
}

/// Build the project's graph from stored dependency ids.
///
/// Dependencies on members that no longer exist are treated as none; stored
/// edges that would close a cycle are dropped.
pub fn build_dependency_graph(members: &[Member]) -> DependencyGraph {
    let mut graph = DependencyGraph::with_members(members.iter().map(|m| m.id.clone()));

    for member in members {
        let Some(dependency) = member.dependency_id.as_deref() else {
            continue;
        };

        if !graph.contains(dependency) {
            log::debug!("{} depends on missing member {dependency}; ignoring", member.id);
            continue;
        }

        if let Err(e) = graph.add_edge(&member.id, dependency) {
            log::warn!("dropping stored dependency of {}: {e}", member.id);
        }
    }

    graph
}

fn earliest_window_start(now: i64, settings: &EvaluationSettings) -> GhostResult<i64> {
    let active_start = activity::window_start(now, settings.active_window_hours as i64)?;
    let score_start = activity::window_start(now, settings.score_window_days as i64 * 24)?;
    Ok(active_start.min(score_start))
}

fn build_evaluation_result(
    project_id: &str,
    now: i64,
    members: Vec<MemberEvaluation>,
    daily: Vec<DailyActivity>,
) -> EvaluationResult {
    let count = |status: MemberStatus| members.iter().filter(|m| m.status == status).count();
    let total_score: f64 = members.iter().map(|m| m.contribution_score).sum();

    EvaluationResult {
        project_id: project_id.to_string(),
        evaluated_at: now,
        active_count: count(MemberStatus::Active),
        stalled_count: count(MemberStatus::Stalled),
        ghost_count: count(MemberStatus::Ghost),
        average_score: if members.is_empty() {
            0.0
        } else {
            total_score / members.len() as f64
        },
        members,
        daily,
        duration_ms: 0,
    }
}

pub async fn get_member_breakdown(
    project_id: String,
    member_id: String,
    cache: Arc<Mutex<EvaluationCache>>,
) -> Result<MemberEvaluation, String> {
    let cache_lock = cache.lock().map_err(|_| "Cache lock error".to_string())?;
    let result = cache_lock
        .results
        .get(&project_id)
        .ok_or("No evaluation available. Run evaluation first.")?;

    result
        .member(&member_id)
        .cloned()
        .ok_or(format!("UNKNOWN_MEMBER: {member_id}"))
}

pub async fn get_team_summary(
    workspace_path: String,
    project_id: String,
    cache: Arc<Mutex<EvaluationCache>>,
) -> Result<TeamSummary, String> {
    let result = {
        let cache_lock = cache.lock().map_err(|_| "Cache lock error".to_string())?;
        cache_lock
            .results
            .get(&project_id)
            .cloned()
            .ok_or("No evaluation available. Run evaluation first.")?
    };

    let conn = crate::commands::db::get_db_connection(&workspace_path)
        .map_err(|e| format!("DB error: {e}"))?;
    let open_blockers = crate::commands::db::count_open_blockers(&conn, &project_id)
        .map_err(|e| format!("DB read error: {e}"))?;

    Ok(build_team_summary(&result, open_blockers))
}

fn build_team_summary(result: &EvaluationResult, open_blockers: usize) -> TeamSummary {
    let ghosts = result
        .members
        .iter()
        .filter(|m| m.status == MemberStatus::Ghost)
        .map(|m| m.member_id.clone())
        .collect();

    let stalled_on = result
        .members
        .iter()
        .filter(|m| m.status == MemberStatus::Stalled)
        .filter_map(|m| m.dependency_id.clone().map(|dep| (m.member_id.clone(), dep)))
        .collect();

    let mut team_totals = ActivityCounters::default();
    for member in &result.members {
        team_totals.commits += member.window.commits;
        team_totals.prs += member.window.prs;
        team_totals.reviews += member.window.reviews;
    }

    let mut ranking: Vec<RankedMember> = result
        .members
        .iter()
        .map(|m| RankedMember {
            member_id: m.member_id.clone(),
            github_username: m.github_username.clone(),
            status: m.status,
            counters: m.window,
            total: m.window.total(),
        })
        .collect();
    ranking.sort_by(|a, b| b.total.cmp(&a.total).then_with(|| a.member_id.cmp(&b.member_id)));

    TeamSummary {
        project_id: result.project_id.clone(),
        evaluated_at: result.evaluated_at,
        active_count: result.active_count,
        stalled_count: result.stalled_count,
        ghost_count: result.ghost_count,
        average_score: result.average_score,
        ghosts,
        stalled_on,
        open_blockers,
        team_totals,
        daily: result.daily.clone(),
        ranking,
    }
}

fn update_cache(cache: &Arc<Mutex<EvaluationCache>>, result: EvaluationResult) {
    if let Ok(mut lock) = cache.lock() {
        lock.results.insert(result.project_id.clone(), result);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::activity::{ActivityEvent, ActivityKind};
    use crate::models::member::Role;

    const NOW: i64 = 1_760_000_000;
    const HOUR: i64 = 3600;

    fn member(id: &str, dependency: Option<&str>) -> Member {
        Member {
            id: id.to_string(),
            project_id: "p".to_string(),
            user_id: format!("user-{id}"),
            github_username: None,
            role: if id == "L" { Role::Leader } else { Role::Member },
            dependency_id: dependency.map(str::to_string),
            status: MemberStatus::Active,
            contribution_score: 50.0,
            created_at: 0,
            updated_at: 0,
        }
    }

    fn evaluate_idle(members: &[Member]) -> EvaluationResult {
        evaluate_snapshot("p", members, &ActivityLog::new(), NOW, &EvaluationSettings::default())
            .expect("evaluate")
    }

    fn commits(member: &str, count: usize, hours_ago: i64) -> Vec<ActivityEvent> {
        (0..count)
            .map(|_| ActivityEvent::new(member, ActivityKind::Commit, NOW - hours_ago * HOUR))
            .collect()
    }

    #[test]
    fn idle_dependent_of_idle_leader_is_stalled() {
        let members = vec![member("L", None), member("M", Some("L"))];
        let result = evaluate_idle(&members);

        assert_eq!(result.member("L").unwrap().status, MemberStatus::Ghost);
        assert_eq!(result.member("M").unwrap().status, MemberStatus::Stalled);
        assert_eq!(result.stalled_count, 1);
        assert_eq!(result.ghost_count, 1);
        // No activity anywhere: everyone gets the default, the stalled floor doesn't lower it.
        assert!(result.members.iter().all(|m| m.contribution_score == 50.0));
    }

    #[test]
    fn activity_outside_active_window_still_counts_for_score() {
        let members = vec![member("L", None), member("M", Some("L"))];
        let mut events = commits("L", 5, 1);
        events.extend(commits("M", 3, 96)); // 4 days ago: scored, but not recent

        let result = evaluate_snapshot(
            "p",
            &members,
            &ActivityLog::from_events(events),
            NOW,
            &EvaluationSettings::default(),
        )
        .expect("evaluate");

        let leader = result.member("L").unwrap();
        let dependent = result.member("M").unwrap();
        assert_eq!(leader.status, MemberStatus::Active);
        assert_eq!(leader.contribution_score, 100.0);
        assert_eq!(dependent.status, MemberStatus::Ghost);
        assert_eq!(dependent.window.commits, 3);
        assert_eq!(dependent.recent.total(), 0);
        assert_eq!(dependent.contribution_score, 0.0);
    }

    #[test]
    fn stored_cycles_and_dangling_dependencies_are_ignored() {
        let members = vec![
            member("a", Some("b")),
            member("b", Some("a")),
            member("c", Some("removed")),
        ];

        let graph = build_dependency_graph(&members);
        assert_eq!(graph.edges().len(), 1);
        assert_eq!(graph.resolve("c"), None);

        let result = evaluate_idle(&members);
        assert_eq!(result.member("c").unwrap().status, MemberStatus::Ghost);
    }

    #[test]
    fn live_evaluation_sees_events_recorded_before_the_pass_only() {
        let members = vec![member("L", None)];
        let shared: SharedActivityLog = Arc::new(Mutex::new(ActivityLog::new()));
        let settings = EvaluationSettings::default();

        let before = evaluate_live("p", &members, &shared, NOW, &settings).expect("evaluate");
        assert_eq!(before.member("L").unwrap().status, MemberStatus::Ghost);

        shared
            .lock()
            .unwrap()
            .record_event(ActivityEvent::new("L", ActivityKind::Pr, NOW - HOUR));

        let after = evaluate_live("p", &members, &shared, NOW, &settings).expect("evaluate");
        assert_eq!(after.member("L").unwrap().status, MemberStatus::Active);
        assert_eq!(after.member("L").unwrap().recent.prs, 1);
    }

    #[test]
    fn team_summary_lists_ghosts_and_blocking_pairs() {
        let members = vec![member("L", None), member("M", Some("L")), member("X", None)];
        let result = evaluate_idle(&members);

        let summary = build_team_summary(&result, 2);
        let mut ghosts = summary.ghosts.clone();
        ghosts.sort();
        assert_eq!(ghosts, vec!["L".to_string(), "X".to_string()]);
        assert_eq!(summary.stalled_on, vec![("M".to_string(), "L".to_string())]);
        assert_eq!(summary.open_blockers, 2);
    }

    #[test]
    fn team_summary_totals_daily_series_and_ranking() {
        let members = vec![member("L", None), member("M", Some("L")), member("X", None)];
        let mut events = commits("L", 2, 1);
        events.push(ActivityEvent::new("X", ActivityKind::Pr, NOW - 30 * HOUR));
        events.push(ActivityEvent::new("X", ActivityKind::PrReview, NOW - 30 * HOUR));
        events.push(ActivityEvent::new("X", ActivityKind::PrReview, NOW - 80 * HOUR));

        let result = evaluate_snapshot(
            "p",
            &members,
            &ActivityLog::from_events(events),
            NOW,
            &EvaluationSettings::default(),
        )
        .expect("evaluate");
        let summary = build_team_summary(&result, 0);

        assert_eq!(summary.team_totals, ActivityCounters { commits: 2, prs: 1, reviews: 2 });
        assert_eq!(summary.daily.len(), 8);
        let daily_total: u32 = summary.daily.iter().map(|d| d.counters.total()).sum();
        assert_eq!(daily_total, summary.team_totals.total());

        let order: Vec<&str> = summary.ranking.iter().map(|r| r.member_id.as_str()).collect();
        assert_eq!(order, vec!["X", "L", "M"]);
        assert_eq!(summary.ranking[0].total, 3);
        assert_eq!(summary.ranking[2].status, MemberStatus::Ghost);
    }
}
