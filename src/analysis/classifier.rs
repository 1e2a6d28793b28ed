use super::graph::DependencyGraph;
use crate::models::member::{ActivityCounters, MemberId, MemberStatus};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassifierPolicy {
    /// Minimum events inside the active window for a member to count as active
    pub active_threshold: u32,
}

impl Default for ClassifierPolicy {
    fn default() -> Self {
        Self { active_threshold: 1 }
    }
}

/// Classify one member from their recent counters and the status already
/// derived for the member they wait on.
///
/// - enough recent activity → `Active`, whatever the dependency says
/// - otherwise waiting on someone who is not active → `Stalled`
/// - otherwise → `Ghost`
pub fn classify_member(
    recent: &ActivityCounters,
    dependency_status: Option<MemberStatus>,
    policy: &ClassifierPolicy,
) -> MemberStatus {
    if recent.total() >= policy.active_threshold {
        return MemberStatus::Active;
    }

    match dependency_status {
        Some(MemberStatus::Active) | None => MemberStatus::Ghost,
        Some(MemberStatus::Stalled) | Some(MemberStatus::Ghost) => MemberStatus::Stalled,
    }
}

/// Classify every member of the graph in dependency order.
///
/// Members missing from `recent` are treated as having no recent activity.
pub fn classify_project(
    graph: &DependencyGraph,
    recent: &HashMap<MemberId, ActivityCounters>,
    policy: &ClassifierPolicy,
) -> HashMap<MemberId, MemberStatus> {
    let mut statuses: HashMap<MemberId, MemberStatus> = HashMap::with_capacity(graph.len());

    for member in graph.evaluation_order() {
        let counters = recent.get(&member).copied().unwrap_or_default();
        // A dependency outside the graph was removed; treat it as none.
        let dependency_status = graph
            .resolve(&member)
            .and_then(|dependency| statuses.get(dependency).copied());

        let status = classify_member(&counters, dependency_status, policy);
        log::debug!("classified {member} as {status}");
        statuses.insert(member, status);
    }

    statuses
}
