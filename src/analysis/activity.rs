use crate::error::{GhostError, Result};
use crate::models::activity::{ActivityEvent, ActivityKind};
use crate::models::evaluation::DailyActivity;
use crate::models::member::{ActivityCounters, MemberId};
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex};

const SECONDS_PER_HOUR: i64 = 3600;
const SECONDS_PER_DAY: i64 = 86_400;

/// Activity log shared between ingestion and evaluation passes.
pub type SharedActivityLog = Arc<Mutex<ActivityLog>>;

/// Append-only log of contribution events with per-member running totals.
#[derive(Debug, Clone, Default)]
pub struct ActivityLog {
    events: Vec<ActivityEvent>,
    by_member: HashMap<MemberId, Vec<usize>>,
    totals: HashMap<MemberId, ActivityCounters>,
}

impl ActivityLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_events<I>(events: I) -> Self
    where
        I: IntoIterator<Item = ActivityEvent>,
    {
        let mut log = Self::new();
        for event in events {
            log.record_event(event);
        }
        log
    }

    pub fn record_event(&mut self, event: ActivityEvent) {
        let index = self.events.len();
        increment(self.totals.entry(event.member_id.clone()).or_default(), event.kind);
        self.by_member
            .entry(event.member_id.clone())
            .or_default()
            .push(index);
        self.events.push(event);
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Counters for `member` over events with `timestamp >= window_start`.
    pub fn counters_for(&self, member: &str, window_start: i64) -> Result<ActivityCounters> {
        if window_start <= 0 {
            return Err(GhostError::InvalidWindow(format!(
                "window start must be a positive unix timestamp, got {window_start}"
            )));
        }

        let mut counters = ActivityCounters::default();
        for event in self.member_events(member) {
            if event.timestamp >= window_start {
                increment(&mut counters, event.kind);
            }
        }
        Ok(counters)
    }

    pub fn totals_for(&self, member: &str) -> ActivityCounters {
        self.totals.get(member).copied().unwrap_or_default()
    }

    pub fn last_activity(&self, member: &str) -> Option<i64> {
        self.member_events(member).map(|e| e.timestamp).max()
    }

    /// Detached copy holding only events at or after `window_start`.
    pub fn snapshot_since(&self, window_start: i64) -> Self {
        Self::from_events(
            self.events
                .iter()
                .filter(|e| e.timestamp >= window_start)
                .cloned(),
        )
    }

    /// Consecutive UTC days with at least one event, counting back from
    /// today. A streak that ended yesterday is still running.
    pub fn streak_days(&self, member: &str, now: i64) -> u32 {
        let days: BTreeSet<i64> = self
            .member_events(member)
            .filter(|e| e.timestamp <= now)
            .map(|e| e.timestamp.div_euclid(SECONDS_PER_DAY))
            .collect();

        let today = now.div_euclid(SECONDS_PER_DAY);
        let mut day = if days.contains(&today) { today } else { today - 1 };
        let mut streak = 0;
        while days.contains(&day) {
            streak += 1;
            day -= 1;
        }
        streak
    }

    /// Per-day counters for every UTC day touched by `[since, now]`, oldest
    /// first, with empty days included. `None` counts the whole log.
    pub fn daily_counters(
        &self,
        member: Option<&str>,
        since: i64,
        now: i64,
    ) -> Result<Vec<DailyActivity>> {
        if since <= 0 || since > now {
            return Err(GhostError::InvalidWindow(format!(
                "daily range {since}..{now} is empty or starts before the epoch"
            )));
        }

        let first_day = since.div_euclid(SECONDS_PER_DAY);
        let last_day = now.div_euclid(SECONDS_PER_DAY);
        let mut buckets = vec![ActivityCounters::default(); (last_day - first_day + 1) as usize];

        let events: Box<dyn Iterator<Item = &ActivityEvent> + '_> = match member {
            Some(member) => Box::new(self.member_events(member)),
            None => Box::new(self.events.iter()),
        };
        for event in events.filter(|e| e.timestamp >= since && e.timestamp <= now) {
            let slot = (event.timestamp.div_euclid(SECONDS_PER_DAY) - first_day) as usize;
            increment(&mut buckets[slot], event.kind);
        }

        Ok(buckets
            .into_iter()
            .enumerate()
            .map(|(offset, counters)| {
                let day_start = (first_day + offset as i64) * SECONDS_PER_DAY;
                DailyActivity {
                    date: format_day(day_start),
                    day_start,
                    counters,
                }
            })
            .collect())
    }

    fn member_events<'a>(&'a self, member: &str) -> impl Iterator<Item = &'a ActivityEvent> + 'a {
        self.by_member
            .get(member)
            .into_iter()
            .flatten()
            .map(move |&index| &self.events[index])
    }
}

/// Start of a trailing window of `hours` ending at `now`.
pub fn window_start(now: i64, hours: i64) -> Result<i64> {
    if hours <= 0 {
        return Err(GhostError::InvalidWindow(format!(
            "window length must be positive, got {hours}h"
        )));
    }

    let start = hours
        .checked_mul(SECONDS_PER_HOUR)
        .and_then(|span| now.checked_sub(span))
        .filter(|start| *start > 0)
        .ok_or_else(|| {
            GhostError::InvalidWindow(format!(
                "a {hours}h window ending at {now} starts before the epoch"
            ))
        })?;

    Ok(start)
}

fn format_day(day_start: i64) -> String {
    chrono::DateTime::from_timestamp(day_start, 0)
        .map(|day| day.format("%Y-%m-%d").to_string())
        .unwrap_or_default()
}

fn increment(counters: &mut ActivityCounters, kind: ActivityKind) {
    match kind {
        ActivityKind::Commit => counters.commits += 1,
        ActivityKind::Pr => counters.prs += 1,
        ActivityKind::PrReview => counters.reviews += 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: i64 = 1_760_000_000;

    fn event(member: &str, kind: ActivityKind, hours_ago: i64) -> ActivityEvent {
        ActivityEvent::new(member, kind, NOW - hours_ago * SECONDS_PER_HOUR)
    }

    #[test]
    fn counts_only_events_inside_the_window() {
        let log = ActivityLog::from_events(vec![
            event("alice", ActivityKind::Commit, 1),
            event("alice", ActivityKind::Commit, 30),
            event("alice", ActivityKind::Pr, 60),
            event("alice", ActivityKind::PrReview, 2),
            event("bob", ActivityKind::Commit, 1),
        ]);

        let start = window_start(NOW, 48).unwrap();
        let counters = log.counters_for("alice", start).unwrap();
        assert_eq!(counters, ActivityCounters { commits: 2, prs: 0, reviews: 1 });
        assert_eq!(log.totals_for("alice").total(), 4);
    }

    #[test]
    fn unknown_member_has_zero_counters() {
        let log = ActivityLog::new();
        let counters = log.counters_for("ghost", NOW - 10).unwrap();
        assert_eq!(counters.total(), 0);
        assert_eq!(log.last_activity("ghost"), None);
    }

    #[test]
    fn rejects_non_positive_windows() {
        let log = ActivityLog::new();
        assert!(matches!(log.counters_for("a", 0), Err(GhostError::InvalidWindow(_))));
        assert!(matches!(window_start(NOW, 0), Err(GhostError::InvalidWindow(_))));
        assert!(matches!(window_start(NOW, -5), Err(GhostError::InvalidWindow(_))));
        assert!(matches!(window_start(100, 1), Err(GhostError::InvalidWindow(_))));
    }

    #[test]
    fn snapshot_is_detached_from_later_events() {
        let mut log = ActivityLog::from_events(vec![event("a", ActivityKind::Commit, 1)]);
        let snapshot = log.snapshot_since(NOW - SECONDS_PER_DAY);

        log.record_event(event("a", ActivityKind::Commit, 0));

        assert_eq!(snapshot.len(), 1);
        assert_eq!(log.len(), 2);
    }

    #[test]
    fn streak_counts_consecutive_days() {
        let day = |n: i64| NOW - n * SECONDS_PER_DAY;
        let log = ActivityLog::from_events(vec![
            ActivityEvent::new("a", ActivityKind::Commit, day(0)),
            ActivityEvent::new("a", ActivityKind::Commit, day(1)),
            ActivityEvent::new("a", ActivityKind::Pr, day(2)),
            ActivityEvent::new("a", ActivityKind::Commit, day(4)),
            ActivityEvent::new("b", ActivityKind::Commit, day(1)),
            ActivityEvent::new("c", ActivityKind::Commit, day(3)),
        ]);

        assert_eq!(log.streak_days("a", NOW), 3);
        assert_eq!(log.streak_days("b", NOW), 1);
        assert_eq!(log.streak_days("c", NOW), 0);
    }

    #[test]
    fn daily_counters_bucket_by_utc_day() {
        // NOW is 2025-10-09 08:53:20 UTC.
        let today = NOW.div_euclid(SECONDS_PER_DAY) * SECONDS_PER_DAY;
        let log = ActivityLog::from_events(vec![
            ActivityEvent::new("a", ActivityKind::Commit, today + 60),
            ActivityEvent::new("a", ActivityKind::Pr, today + 120),
            ActivityEvent::new("b", ActivityKind::PrReview, today - 60),
            ActivityEvent::new("a", ActivityKind::Commit, today - 2 * SECONDS_PER_DAY),
            ActivityEvent::new("a", ActivityKind::Commit, today - 10 * SECONDS_PER_DAY),
        ]);

        let since = window_start(NOW, 7 * 24).unwrap();
        let team = log.daily_counters(None, since, NOW).unwrap();
        assert_eq!(team.len(), 8);
        assert_eq!(team.last().unwrap().date, "2025-10-09");
        assert_eq!(
            team.last().unwrap().counters,
            ActivityCounters { commits: 1, prs: 1, reviews: 0 }
        );
        assert_eq!(team[6].counters.reviews, 1);
        assert_eq!(team[5].counters.commits, 1);
        assert_eq!(team[4].counters.total(), 0);
        let total: u32 = team.iter().map(|d| d.counters.total()).sum();
        assert_eq!(total, 4);

        let only_b = log.daily_counters(Some("b"), since, NOW).unwrap();
        assert_eq!(only_b.iter().map(|d| d.counters.total()).sum::<u32>(), 1);

        assert!(matches!(
            log.daily_counters(None, NOW, NOW - 1),
            Err(GhostError::InvalidWindow(_))
        ));
    }

    #[test]
    fn concurrent_recording_is_not_lost() {
        let shared: SharedActivityLog = Arc::new(Mutex::new(ActivityLog::new()));
        let handles: Vec<_> = (0..4)
            .map(|worker| {
                let shared = Arc::clone(&shared);
                std::thread::spawn(move || {
                    for i in 0..25 {
                        let member = format!("m{worker}");
                        let event = ActivityEvent::new(member, ActivityKind::Commit, NOW - i);
                        shared.lock().unwrap().record_event(event);
                    }
                })
            })
            .collect();

        // Snapshots taken mid-ingestion are internally consistent.
        let snapshot = shared.lock().unwrap().snapshot_since(1);
        let counted: u32 = (0..4)
            .map(|w| snapshot.totals_for(&format!("m{w}")).total())
            .sum();
        assert_eq!(counted as usize, snapshot.len());

        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(shared.lock().unwrap().len(), 100);
    }
}
