use super::member::{ActivityCounters, MemberId, MemberStatus};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemberEvaluation {
    pub member_id: MemberId,
    pub user_id: String,
    pub github_username: Option<String>,
    pub status: MemberStatus,
    pub contribution_score: f64,
    /// Counters over the active window, used for classification
    pub recent: ActivityCounters,
    /// Counters over the scoring window
    pub window: ActivityCounters,
    pub dependency_id: Option<MemberId>,
    pub dependency_depth: usize,
    pub streak_days: u32,
    pub last_activity_at: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub project_id: String,
    pub evaluated_at: i64,
    pub active_count: usize,
    pub stalled_count: usize,
    pub ghost_count: usize,
    pub average_score: f64,
    pub members: Vec<MemberEvaluation>,
    /// Team-wide activity per UTC day over the scoring window, oldest first
    pub daily: Vec<DailyActivity>,
    pub duration_ms: u64,
}

impl EvaluationResult {
    pub fn member(&self, member_id: &str) -> Option<&MemberEvaluation> {
        self.members.iter().find(|m| m.member_id == member_id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamSummary {
    pub project_id: String,
    pub evaluated_at: i64,
    pub active_count: usize,
    pub stalled_count: usize,
    pub ghost_count: usize,
    pub average_score: f64,
    pub ghosts: Vec<MemberId>,
    /// (stalled member, member they are waiting on)
    pub stalled_on: Vec<(MemberId, MemberId)>,
    pub open_blockers: usize,
    /// Sum of every member's counters over the scoring window
    pub team_totals: ActivityCounters,
    pub daily: Vec<DailyActivity>,
    /// Members by total activity in the scoring window, busiest first
    pub ranking: Vec<RankedMember>,
}

/// Activity counted within one UTC day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyActivity {
    /// `YYYY-MM-DD`
    pub date: String,
    /// Unix timestamp of the day's midnight (UTC)
    pub day_start: i64,
    pub counters: ActivityCounters,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankedMember {
    pub member_id: MemberId,
    pub github_username: Option<String>,
    pub status: MemberStatus,
    pub counters: ActivityCounters,
    pub total: u32,
}

/// Scoring weights per activity kind
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreWeights {
    pub commit: f64,
    pub pr: f64,
    pub review: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            commit: 1.0,
            pr: 3.0,
            review: 2.0,
        }
    }
}

/// In-memory cache of the last evaluation per project
#[derive(Debug, Default)]
pub struct EvaluationCache {
    pub results: HashMap<String, EvaluationResult>,
}
