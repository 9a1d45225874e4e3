//! The in-flight alert working set.
//!
//! Holds every active or acknowledged alert the client knows about, newest
//! first. A poll replaces the set wholesale, except where a local mutation
//! is newer than the polled copy: such entries keep their local state (or
//! stay removed) until the server catches up. Newer means a higher version,
//! or the same version with a status further along the lifecycle, so servers
//! that never send versions are handled too.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use domain::models::{AlertStatus, AlertSummary, ProximityAlert};
use uuid::Uuid;

/// Local knowledge about an alert that a poll may not reflect yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct LocalMark {
    version: u64,
    status: AlertStatus,
    removed: bool,
}

impl LocalMark {
    /// Whether a polled copy predates this local change.
    fn is_newer_than(&self, polled: &ProximityAlert) -> bool {
        if polled.version != self.version {
            return polled.version < self.version;
        }
        self.removed || polled.status.progress() < self.status.progress()
    }
}

/// An alert taken out of the feed optimistically, kept so it can be put back.
#[derive(Debug, Clone, PartialEq)]
pub struct RemovedAlert {
    alert: ProximityAlert,
}

impl RemovedAlert {
    pub fn alert(&self) -> &ProximityAlert {
        &self.alert
    }
}

/// What a snapshot did to entries with pending local changes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SnapshotOutcome {
    /// Polled entries older than the local copy, which was kept.
    pub kept_local: usize,
    /// Polled entries for alerts already closed locally.
    pub suppressed: usize,
}

impl SnapshotOutcome {
    pub fn stale_entries(&self) -> usize {
        self.kept_local + self.suppressed
    }
}

#[derive(Debug, Default)]
pub struct AlertFeed {
    alerts: Vec<ProximityAlert>,
    marks: HashMap<Uuid, LocalMark>,
    last_refreshed_at: Option<DateTime<Utc>>,
}

impl AlertFeed {
    pub fn new() -> Self {
        Self::default()
    }

    /// Alerts ordered by detection time, newest first.
    pub fn alerts(&self) -> &[ProximityAlert] {
        &self.alerts
    }

    pub fn get(&self, id: Uuid) -> Option<&ProximityAlert> {
        self.alerts.iter().find(|a| a.id == id)
    }

    pub fn len(&self) -> usize {
        self.alerts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.alerts.is_empty()
    }

    pub fn ids(&self) -> HashSet<Uuid> {
        self.alerts.iter().map(|a| a.id).collect()
    }

    pub fn summary(&self) -> AlertSummary {
        AlertSummary::from_alerts(&self.alerts)
    }

    /// When the last successful poll was applied.
    pub fn last_refreshed_at(&self) -> Option<DateTime<Utc>> {
        self.last_refreshed_at
    }

    /// Replaces the working set with a polled snapshot.
    pub fn apply_snapshot(
        &mut self,
        incoming: Vec<ProximityAlert>,
        refreshed_at: DateTime<Utc>,
    ) -> SnapshotOutcome {
        let mut outcome = SnapshotOutcome::default();
        let mut seen = HashSet::with_capacity(incoming.len());
        let mut next = Vec::with_capacity(incoming.len());

        for alert in incoming {
            if alert.status.is_terminal() || !seen.insert(alert.id) {
                continue;
            }

            match self.marks.get(&alert.id).copied() {
                Some(mark) if mark.is_newer_than(&alert) => {
                    if mark.removed {
                        outcome.suppressed += 1;
                    } else {
                        outcome.kept_local += 1;
                        let local = self.get(alert.id).cloned().unwrap_or(alert);
                        next.push(local);
                    }
                }
                _ => {
                    self.marks.remove(&alert.id);
                    next.push(alert);
                }
            }
        }

        // Marks only matter while the server still reports the alert.
        self.marks.retain(|id, _| seen.contains(id));

        sort_newest_first(&mut next);
        self.alerts = next;
        self.last_refreshed_at = Some(refreshed_at);
        outcome
    }

    /// Records a server-confirmed update to an alert.
    pub fn upsert_local(&mut self, alert: ProximityAlert) {
        self.marks.insert(
            alert.id,
            LocalMark {
                version: alert.version,
                status: alert.status,
                removed: false,
            },
        );
        match self.alerts.iter_mut().find(|a| a.id == alert.id) {
            Some(existing) => *existing = alert,
            None => {
                self.alerts.push(alert);
                sort_newest_first(&mut self.alerts);
            }
        }
    }

    /// Takes an alert out of the working set ahead of a closing call.
    ///
    /// `closed_version` is the version the alert will have once closed; polls
    /// reporting anything older do not bring it back.
    pub fn remove_local(&mut self, id: Uuid, closed_version: u64) -> Option<RemovedAlert> {
        let index = self.alerts.iter().position(|a| a.id == id)?;
        let alert = self.alerts.remove(index);
        self.marks.insert(
            id,
            LocalMark {
                version: closed_version,
                status: alert.status,
                removed: true,
            },
        );
        Some(RemovedAlert { alert })
    }

    /// Puts back an alert whose closing call failed.
    pub fn restore(&mut self, removed: RemovedAlert) {
        let alert = removed.alert;
        self.marks.remove(&alert.id);
        if self.get(alert.id).is_none() {
            self.alerts.push(alert);
            sort_newest_first(&mut self.alerts);
        }
    }
}

fn sort_newest_first(alerts: &mut [ProximityAlert]) {
    alerts.sort_by(|a, b| {
        b.detected_at
            .cmp(&a.detected_at)
            .then_with(|| a.id.cmp(&b.id))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use domain::models::{Actor, AlertSeverity, AlertStatus};

    fn alert_at(minutes_ago: i64) -> ProximityAlert {
        ProximityAlert::detected(
            Uuid::new_v4(),
            Uuid::new_v4(),
            45.3,
            AlertSeverity::High,
            Utc::now() - Duration::minutes(minutes_ago),
        )
    }

    fn admin() -> Actor {
        Actor::admin(Uuid::new_v4(), "Admin")
    }

    #[test]
    fn test_snapshot_orders_newest_first() {
        let old = alert_at(30);
        let new = alert_at(1);
        let mid = alert_at(10);
        let mut feed = AlertFeed::new();

        let outcome = feed.apply_snapshot(vec![old.clone(), new.clone(), mid.clone()], Utc::now());

        let ids: Vec<Uuid> = feed.alerts().iter().map(|a| a.id).collect();
        assert_eq!(ids, vec![new.id, mid.id, old.id]);
        assert_eq!(outcome, SnapshotOutcome::default());
        assert!(feed.last_refreshed_at().is_some());
    }

    #[test]
    fn test_snapshot_replaces_membership() {
        let a = alert_at(5);
        let b = alert_at(3);
        let mut feed = AlertFeed::new();
        feed.apply_snapshot(vec![a.clone(), b.clone()], Utc::now());

        feed.apply_snapshot(vec![b.clone()], Utc::now());
        assert_eq!(feed.len(), 1);
        assert!(feed.get(a.id).is_none());
    }

    #[test]
    fn test_snapshot_is_idempotent() {
        let alerts = vec![alert_at(5), alert_at(3)];
        let mut feed = AlertFeed::new();
        feed.apply_snapshot(alerts.clone(), Utc::now());
        let first = feed.ids();
        feed.apply_snapshot(alerts, Utc::now());
        assert_eq!(feed.ids(), first);
    }

    #[test]
    fn test_snapshot_drops_terminal_and_duplicates() {
        let actor = admin();
        let a = alert_at(5);
        let mut closed = alert_at(4);
        closed.acknowledge(&actor, Utc::now()).unwrap();
        closed.resolve(&actor, None, Utc::now()).unwrap();

        let mut feed = AlertFeed::new();
        feed.apply_snapshot(vec![a.clone(), a.clone(), closed], Utc::now());
        assert_eq!(feed.len(), 1);
    }

    #[test]
    fn test_stale_poll_does_not_resurrect_removed_alert() {
        let actor = admin();
        let mut alert = alert_at(5);
        alert.acknowledge(&actor, Utc::now()).unwrap();
        let mut feed = AlertFeed::new();
        feed.apply_snapshot(vec![alert.clone()], Utc::now());

        let removed = feed.remove_local(alert.id, alert.version + 1).unwrap();
        assert_eq!(removed.alert().id, alert.id);
        assert!(feed.is_empty());

        // A poll started before the resolve still reports the acknowledged copy.
        let outcome = feed.apply_snapshot(vec![alert.clone()], Utc::now());
        assert!(feed.is_empty());
        assert_eq!(outcome.suppressed, 1);
        assert_eq!(outcome.stale_entries(), 1);

        // Once the server stops reporting it the mark goes away.
        feed.apply_snapshot(vec![], Utc::now());
        feed.apply_snapshot(vec![alert.clone()], Utc::now());
        assert_eq!(feed.len(), 1);
    }

    #[test]
    fn test_stale_poll_keeps_local_acknowledgment() {
        let actor = admin();
        let alert = alert_at(5);
        let mut feed = AlertFeed::new();
        feed.apply_snapshot(vec![alert.clone()], Utc::now());

        let mut acked = alert.clone();
        acked.acknowledge(&actor, Utc::now()).unwrap();
        feed.upsert_local(acked.clone());

        let outcome = feed.apply_snapshot(vec![alert.clone()], Utc::now());
        assert_eq!(outcome.kept_local, 1);
        assert_eq!(feed.get(alert.id).unwrap().status, AlertStatus::Acknowledged);

        // The server catching up clears the mark.
        feed.apply_snapshot(vec![acked.clone()], Utc::now());
        let outcome = feed.apply_snapshot(vec![acked], Utc::now());
        assert_eq!(outcome, SnapshotOutcome::default());
    }

    #[test]
    fn test_unversioned_poll_keeps_local_acknowledgment() {
        let actor = admin();
        let mut alert = alert_at(5);
        alert.version = 0;
        let mut feed = AlertFeed::new();
        feed.apply_snapshot(vec![alert.clone()], Utc::now());

        // The server sends no versions, so the acknowledged copy is still 0.
        let mut acked = alert.clone();
        acked.acknowledge(&actor, Utc::now()).unwrap();
        acked.version = 0;
        feed.upsert_local(acked.clone());

        let outcome = feed.apply_snapshot(vec![alert.clone()], Utc::now());
        assert_eq!(outcome.kept_local, 1);
        assert_eq!(feed.get(alert.id).unwrap().status, AlertStatus::Acknowledged);

        // A later poll reporting the acknowledgment clears the mark.
        feed.apply_snapshot(vec![acked.clone()], Utc::now());
        let outcome = feed.apply_snapshot(vec![acked], Utc::now());
        assert_eq!(outcome, SnapshotOutcome::default());
        assert_eq!(feed.get(alert.id).unwrap().status, AlertStatus::Acknowledged);
    }

    #[test]
    fn test_unversioned_poll_does_not_resurrect_closed_alert() {
        let actor = admin();
        let mut alert = alert_at(5);
        alert.acknowledge(&actor, Utc::now()).unwrap();
        alert.version = 0;
        let mut feed = AlertFeed::new();
        feed.apply_snapshot(vec![alert.clone()], Utc::now());

        feed.remove_local(alert.id, 0).unwrap();
        let outcome = feed.apply_snapshot(vec![alert], Utc::now());
        assert!(feed.is_empty());
        assert_eq!(outcome.suppressed, 1);
    }

    #[test]
    fn test_restore_puts_alert_back_in_order() {
        let newer = alert_at(1);
        let older = alert_at(20);
        let mut feed = AlertFeed::new();
        feed.apply_snapshot(vec![newer.clone(), older.clone()], Utc::now());

        let removed = feed.remove_local(newer.id, newer.version + 1).unwrap();
        feed.restore(removed);

        let ids: Vec<Uuid> = feed.alerts().iter().map(|a| a.id).collect();
        assert_eq!(ids, vec![newer.id, older.id]);

        // The restored alert is no longer suppressed by polls.
        feed.apply_snapshot(vec![newer.clone(), older], Utc::now());
        assert!(feed.get(newer.id).is_some());
    }

    #[test]
    fn test_remove_unknown_alert() {
        let mut feed = AlertFeed::new();
        assert!(feed.remove_local(Uuid::new_v4(), 2).is_none());
    }

    #[test]
    fn test_summary_reflects_feed() {
        let mut feed = AlertFeed::new();
        feed.apply_snapshot(vec![alert_at(1), alert_at(2)], Utc::now());
        let summary = feed.summary();
        assert_eq!(summary.total, 2);
        assert_eq!(summary.active, 2);
    }
}
