//! Per-user login statistics
//!
//! One record per configured user, created up front and never removed. The
//! whole map sits behind a single reader/writer lock: snapshots run
//! concurrently with each other, and an increment holds the write lock while
//! it bumps the counter and stamps the time together, so a reader never sees
//! one without the other.

use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Records login outcomes and serves per-user snapshots
pub trait StatsKeeper: Send + Sync {
    /// Record a successful session creation for `username`
    fn increment_authorized(&self, username: &str);

    /// Record a rejected password for `username`
    fn increment_unauthorized(&self, username: &str);

    /// Point-in-time copy of the record for `username`
    fn snapshot(&self, username: &str) -> Option<UserStats>;
}

impl<T: StatsKeeper + ?Sized> StatsKeeper for std::sync::Arc<T> {
    fn increment_authorized(&self, username: &str) {
        (**self).increment_authorized(username);
    }

    fn increment_unauthorized(&self, username: &str) {
        (**self).increment_unauthorized(username);
    }

    fn snapshot(&self, username: &str) -> Option<UserStats> {
        (**self).snapshot(username)
    }
}

/// Login statistics for one user
///
/// Field names on the wire are fixed, including the misspelled
/// `last_unsucessful_session_unix_time`, which existing clients read.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserStats {
    /// Unix time of the last successful session creation
    #[serde(rename = "last_successful_session_unix_time")]
    pub last_success: Option<i64>,

    /// Number of successful session creations
    #[serde(rename = "authorized_attempt")]
    pub authorized: u64,

    /// Unix time of the last rejected password
    #[serde(rename = "last_unsucessful_session_unix_time")]
    pub last_failure: Option<i64>,

    /// Number of rejected passwords
    #[serde(rename = "unauthorized_attempt")]
    pub unauthorized: u64,
}

/// In-memory [`StatsKeeper`] guarded by one `RwLock`
#[derive(Debug, Default)]
pub struct Keeper {
    records: RwLock<HashMap<String, UserStats>>,
}

impl Keeper {
    /// Create a keeper with an empty record for each username
    pub fn new<I, S>(usernames: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let records = usernames
            .into_iter()
            .map(|name| (name.into(), UserStats::default()))
            .collect();
        Self {
            records: RwLock::new(records),
        }
    }

    /// Number of tracked users
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    /// Whether no users are tracked
    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    fn update(&self, username: &str, apply: impl FnOnce(&mut UserStats, i64)) {
        let now = unix_now();
        let mut records = self.records.write();
        match records.get_mut(username) {
            Some(record) => apply(record, now),
            None => warn!(username = %username, "Stats update for untracked user ignored"),
        }
    }
}

impl StatsKeeper for Keeper {
    fn increment_authorized(&self, username: &str) {
        self.update(username, |record, now| {
            record.authorized = record.authorized.saturating_add(1);
            record.last_success = Some(now);
        });
    }

    fn increment_unauthorized(&self, username: &str) {
        self.update(username, |record, now| {
            record.unauthorized = record.unauthorized.saturating_add(1);
            record.last_failure = Some(now);
        });
    }

    fn snapshot(&self, username: &str) -> Option<UserStats> {
        self.records.read().get(username).cloned()
    }
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_secs()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}
