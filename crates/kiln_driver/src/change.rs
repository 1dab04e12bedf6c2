//! Change tracking for incremental passes.
//!
//! Passes report which scopes they changed or deleted. Every report takes the
//! next value of a session-wide stamp, so stamps are strictly increasing and no
//! two reports share one. Each consumer keeps a watermark; asking for changes
//! "since my mark" returns what was recorded after it and moves the mark to the
//! current stamp, so a change is delivered to a consumer at most once.

use kiln_common::{ensure_state, KilnResult};
use kiln_source::InputId;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;

/// A reference to a changeable part of the program tree.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug, Serialize, Deserialize)]
pub enum ScopeRef {
    /// A whole script.
    Script(InputId),
    /// A named function inside a script.
    Function {
        /// The enclosing script.
        script: InputId,
        /// The function's name.
        name: String,
    },
}

impl ScopeRef {
    /// The script this scope belongs to.
    pub fn script(&self) -> &InputId {
        match self {
            ScopeRef::Script(script) | ScopeRef::Function { script, .. } => script,
        }
    }
}

/// One event log: each reference appears at most once, at its latest stamp.
#[derive(Debug)]
struct Timeline<R> {
    by_stamp: BTreeMap<u64, R>,
    stamps: HashMap<R, u64>,
}

impl<R: Hash + Eq + Clone> Timeline<R> {
    fn new() -> Self {
        Self {
            by_stamp: BTreeMap::new(),
            stamps: HashMap::new(),
        }
    }

    fn record(&mut self, r: R, stamp: u64) {
        if let Some(old) = self.stamps.insert(r.clone(), stamp) {
            self.by_stamp.remove(&old);
        }
        self.by_stamp.insert(stamp, r);
    }

    fn remove(&mut self, r: &R) -> bool {
        match self.stamps.remove(r) {
            Some(stamp) => {
                self.by_stamp.remove(&stamp);
                true
            }
            None => false,
        }
    }

    fn since(&self, mark: u64) -> Vec<R> {
        self.by_stamp
            .range(mark + 1..)
            .map(|(_, r)| r.clone())
            .collect()
    }

    fn stamp_of(&self, r: &R) -> Option<u64> {
        self.stamps.get(r).copied()
    }

    fn clear(&mut self) {
        self.by_stamp.clear();
        self.stamps.clear();
    }
}

/// Time-stamped change and delete logs with per-consumer watermarks.
#[derive(Debug)]
pub struct ChangeTracker<R> {
    stamp: u64,
    changed: Timeline<R>,
    deleted: Timeline<R>,
    changed_marks: HashMap<String, u64>,
    deleted_marks: HashMap<String, u64>,
}

impl<R: Hash + Eq + Clone> ChangeTracker<R> {
    /// Creates a tracker at stamp 0, meaning nothing has happened yet.
    pub fn new() -> Self {
        Self {
            stamp: 0,
            changed: Timeline::new(),
            deleted: Timeline::new(),
            changed_marks: HashMap::new(),
            deleted_marks: HashMap::new(),
        }
    }

    /// The stamp of the latest recorded event.
    pub fn stamp(&self) -> u64 {
        self.stamp
    }

    /// Records a change to `r` at the next stamp.
    ///
    /// Returns `false` and records nothing if `r` was deleted earlier in the
    /// session. A reference changed again moves to the new stamp.
    pub fn record_changed(&mut self, r: R) -> bool {
        if self.deleted.stamp_of(&r).is_some() {
            return false;
        }
        self.stamp += 1;
        self.changed.record(r, self.stamp);
        true
    }

    /// Records the deletion of `r` at the next stamp and drops any pending
    /// change for it.
    pub fn record_deleted(&mut self, r: R) {
        self.stamp += 1;
        self.changed.remove(&r);
        self.deleted.record(r, self.stamp);
    }

    /// Returns every reference changed after `consumer`'s watermark, oldest
    /// first, and moves the watermark to the current stamp.
    pub fn since_mark(&mut self, consumer: &str) -> Vec<R> {
        let mark = self.changed_marks.get(consumer).copied().unwrap_or(0);
        let refs = self.changed.since(mark);
        self.changed_marks.insert(consumer.to_string(), self.stamp);
        refs
    }

    /// Like [`since_mark`](Self::since_mark), over deletions. Deletion marks are
    /// kept apart from change marks.
    pub fn deleted_since_mark(&mut self, consumer: &str) -> Vec<R> {
        let mark = self.deleted_marks.get(consumer).copied().unwrap_or(0);
        let refs = self.deleted.since(mark);
        self.deleted_marks.insert(consumer.to_string(), self.stamp);
        refs
    }

    /// Returns `true` if `r` has a pending change recorded after `stamp`.
    pub fn has_changed_since(&self, r: &R, stamp: u64) -> bool {
        self.changed.stamp_of(r).is_some_and(|s| s > stamp)
    }

    /// Returns `true` if `r` was deleted in this session.
    pub fn is_deleted(&self, r: &R) -> bool {
        self.deleted.stamp_of(r).is_some()
    }

    /// Continues a restored session: later events are stamped after `stamp`.
    ///
    /// Event logs and watermarks are cleared; they describe a tree that no
    /// longer exists in this process.
    pub fn resume_at(&mut self, stamp: u64) -> KilnResult<()> {
        ensure_state!(
            stamp >= self.stamp,
            "cannot resume change tracking at stamp {stamp}, already at {}",
            self.stamp
        );
        self.stamp = stamp;
        self.changed.clear();
        self.deleted.clear();
        self.changed_marks.clear();
        self.deleted_marks.clear();
        Ok(())
    }
}

impl<R: Hash + Eq + Clone> Default for ChangeTracker<R> {
    fn default() -> Self {
        Self::new()
    }
}
