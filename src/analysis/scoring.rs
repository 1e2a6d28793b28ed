use crate::models::evaluation::ScoreWeights;
use crate::models::member::{ActivityCounters, MemberId, MemberStatus};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoringConfig {
    pub weights: ScoreWeights,
    /// Score handed out when the project gives nothing to normalise against
    pub default_score: f64,
    /// Lowest score a stalled member can receive
    pub stalled_floor: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            weights: ScoreWeights::default(),
            default_score: 50.0,
            stalled_floor: 50.0,
        }
    }
}

pub struct ScoreInput<'a> {
    pub member_id: &'a MemberId,
    pub counters: ActivityCounters,
    pub status: MemberStatus,
}

pub fn weighted_sum(counters: &ActivityCounters, weights: &ScoreWeights) -> f64 {
    counters.commits as f64 * weights.commit
        + counters.prs as f64 * weights.pr
        + counters.reviews as f64 * weights.review
}

/// Contribution scores (0–100) for every member of a project.
///
/// Weighted sums are min-max normalised across the project so the top
/// contributor lands on 100. With fewer than two members, or no spread
/// between them, everyone gets `default_score`.
pub fn score_members(
    inputs: &[ScoreInput<'_>],
    config: &ScoringConfig,
) -> HashMap<MemberId, f64> {
    let sums: Vec<f64> = inputs
        .iter()
        .map(|input| weighted_sum(&input.counters, &config.weights))
        .collect();

    let min = sums.iter().copied().fold(f64::INFINITY, f64::min);
    let max = sums.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let spread = max - min;
    let degenerate = inputs.len() < 2 || max <= 0.0 || spread <= f64::EPSILON;

    inputs
        .iter()
        .zip(sums)
        .map(|(input, sum)| {
            let normalized = if degenerate {
                config.default_score
            } else {
                (sum - min) / spread * 100.0
            };

            let adjusted = match input.status {
                MemberStatus::Stalled => normalized.max(config.stalled_floor),
                MemberStatus::Active | MemberStatus::Ghost => normalized,
            };

            (input.member_id.clone(), adjusted.round().clamp(0.0, 100.0))
        })
        .collect()
}
