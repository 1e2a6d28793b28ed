use crate::error::{GhostError, Result};
use crate::models::member::MemberId;
use std::collections::{BTreeMap, BTreeSet};

/// "Waiting on" relationships between the members of one project.
///
/// Each member has at most one outgoing edge, so the graph is a forest of
/// parent pointers. It is kept acyclic: every mutation that would let a member
/// reach itself is rejected before anything is written.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    members: BTreeSet<MemberId>,
    edges: BTreeMap<MemberId, MemberId>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_members<I, S>(members: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<MemberId>,
    {
        Self {
            members: members.into_iter().map(Into::into).collect(),
            edges: BTreeMap::new(),
        }
    }

    pub fn add_member(&mut self, member: impl Into<MemberId>) {
        self.members.insert(member.into());
    }

    pub fn contains(&self, member: &str) -> bool {
        self.members.contains(member)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn members(&self) -> impl Iterator<Item = &MemberId> {
        self.members.iter()
    }

    /// Record that `member` is blocked waiting on `depends_on`, replacing any
    /// previous dependency of `member`.
    pub fn add_edge(&mut self, member: &str, depends_on: &str) -> Result<()> {
        self.ensure_member(member)?;
        self.ensure_member(depends_on)?;

        if member == depends_on {
            return Err(cycle(member, depends_on));
        }

        // Walk the target's chain; reaching `member` means the new edge closes a loop.
        let mut current = depends_on;
        for _ in 0..self.members.len() {
            match self.edges.get(current) {
                Some(next) if next == member => return Err(cycle(member, depends_on)),
                Some(next) => current = next.as_str(),
                None => {
                    self.edges.insert(member.to_string(), depends_on.to_string());
                    return Ok(());
                }
            }
        }

        // Only reachable if the graph was already corrupt.
        Err(cycle(member, depends_on))
    }

    /// Clear `member`'s dependency. Returns the previous target, if any.
    pub fn remove_edge(&mut self, member: &str) -> Option<MemberId> {
        self.edges.remove(member)
    }

    pub fn resolve(&self, member: &str) -> Option<&MemberId> {
        self.edges.get(member)
    }

    /// Remove a member and clear every edge that pointed at it.
    /// Returns the dependents whose edge was cleared.
    pub fn remove_member(&mut self, member: &str) -> Vec<MemberId> {
        self.members.remove(member);
        self.edges.remove(member);

        let dependents: Vec<MemberId> = self
            .edges
            .iter()
            .filter(|(_, target)| target.as_str() == member)
            .map(|(source, _)| source.clone())
            .collect();

        for dependent in &dependents {
            self.edges.remove(dependent);
        }

        dependents
    }

    /// Number of edges between `member` and the end of its chain.
    pub fn depth(&self, member: &str) -> usize {
        let mut depth = 0;
        let mut current = member;
        while let Some(next) = self.edges.get(current) {
            depth += 1;
            current = next.as_str();
            if depth >= self.members.len() {
                break;
            }
        }
        depth
    }

    /// All members ordered so that every dependency comes before its dependents:
    /// increasing chain depth, ties broken by id.
    pub fn evaluation_order(&self) -> Vec<MemberId> {
        let mut ordered: Vec<(usize, &MemberId)> = self
            .members
            .iter()
            .map(|member| (self.depth(member), member))
            .collect();
        ordered.sort();
        ordered.into_iter().map(|(_, member)| member.clone()).collect()
    }

    pub fn edges(&self) -> Vec<(MemberId, MemberId)> {
        self.edges
            .iter()
            .map(|(member, target)| (member.clone(), target.clone()))
            .collect()
    }

    fn ensure_member(&self, member: &str) -> Result<()> {
        if self.members.contains(member) {
            Ok(())
        } else {
            Err(GhostError::UnknownMember(member.to_string()))
        }
    }
}

fn cycle(member: &str, depends_on: &str) -> GhostError {
    GhostError::Cycle {
        member: member.to_string(),
        depends_on: depends_on.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph(ids: &[&str]) -> DependencyGraph {
        DependencyGraph::with_members(ids.iter().copied())
    }

    fn reaches_itself(graph: &DependencyGraph, start: &str) -> bool {
        let mut current = start;
        for _ in 0..=graph.len() {
            match graph.resolve(current) {
                Some(next) if next == start => return true,
                Some(next) => current = next.as_str(),
                None => return false,
            }
        }
        true
    }

    #[test]
    fn rejects_self_dependency() {
        let mut g = graph(&["a"]);
        let err = g.add_edge("a", "a").unwrap_err();
        assert!(matches!(err, GhostError::Cycle { .. }));
        assert_eq!(g.resolve("a"), None);
    }

    #[test]
    fn rejects_reverse_edge_and_keeps_original() {
        let mut g = graph(&["a", "b"]);
        g.add_edge("a", "b").expect("a -> b");

        let err = g.add_edge("b", "a").unwrap_err();
        assert!(matches!(err, GhostError::Cycle { .. }));
        assert_eq!(g.edges(), vec![("a".to_string(), "b".to_string())]);
    }

    #[test]
    fn rejects_transitive_cycle() {
        let mut g = graph(&["a", "b", "c", "d"]);
        g.add_edge("a", "b").unwrap();
        g.add_edge("b", "c").unwrap();
        g.add_edge("c", "d").unwrap();

        assert!(g.add_edge("d", "a").is_err());
        assert_eq!(g.resolve("d"), None);
    }

    #[test]
    fn replacing_an_edge_is_checked_too() {
        let mut g = graph(&["a", "b", "c"]);
        g.add_edge("a", "b").unwrap();
        g.add_edge("b", "c").unwrap();

        // a already waits on b; retargeting c onto a would close c -> a -> b -> c
        assert!(g.add_edge("c", "a").is_err());
        g.add_edge("a", "c").expect("retarget a");
        assert_eq!(g.resolve("a").map(String::as_str), Some("c"));
    }

    #[test]
    fn unknown_members_are_rejected() {
        let mut g = graph(&["a"]);
        assert!(matches!(
            g.add_edge("a", "zed"),
            Err(GhostError::UnknownMember(id)) if id == "zed"
        ));
        assert!(matches!(g.add_edge("zed", "a"), Err(GhostError::UnknownMember(_))));
    }

    #[test]
    fn no_member_ever_reaches_itself_after_random_edges() {
        let ids: Vec<String> = (0..8).map(|i| format!("m{i}")).collect();
        let mut g = DependencyGraph::with_members(ids.iter().cloned());

        // Deterministic pseudo-random sequence of edge insertions.
        let mut seed: u64 = 0x9e37_79b9;
        for _ in 0..200 {
            seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            let from = &ids[(seed >> 33) as usize % ids.len()];
            let to = &ids[(seed >> 17) as usize % ids.len()];
            let _ = g.add_edge(from, to);

            for id in &ids {
                assert!(!reaches_itself(&g, id), "{id} reaches itself");
            }
        }
    }

    #[test]
    fn removing_a_member_clears_dependents() {
        let mut g = graph(&["lead", "a", "b"]);
        g.add_edge("a", "lead").unwrap();
        g.add_edge("b", "lead").unwrap();

        let mut cleared = g.remove_member("lead");
        cleared.sort();
        assert_eq!(cleared, vec!["a".to_string(), "b".to_string()]);
        assert!(g.edges().is_empty());
        assert!(!g.contains("lead"));
    }

    #[test]
    fn remove_edge_is_unconditional() {
        let mut g = graph(&["a", "b"]);
        g.add_edge("a", "b").unwrap();
        assert_eq!(g.remove_edge("a"), Some("b".to_string()));
        assert_eq!(g.remove_edge("a"), None);
        assert_eq!(g.remove_edge("nobody"), None);
    }

    #[test]
    fn evaluation_order_puts_dependencies_first() {
        let mut g = graph(&["a", "b", "c", "d"]);
        g.add_edge("a", "b").unwrap();
        g.add_edge("b", "c").unwrap();
        g.add_edge("d", "c").unwrap();

        let order = g.evaluation_order();
        assert_eq!(order.len(), 4);
        let pos = |id: &str| order.iter().position(|m| m == id).unwrap();
        assert!(pos("c") < pos("b"));
        assert!(pos("b") < pos("a"));
        assert!(pos("c") < pos("d"));
        assert_eq!(g.depth("a"), 2);
        assert_eq!(g.depth("c"), 0);
    }
}
