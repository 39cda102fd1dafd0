//! Enumeration sessions.
//!
//! A session is opened by the host before listing a directory and closed after it. In
//! between, the host calls the listing callback as many times as it takes to drain the
//! entries through its fixed-size buffers.
//!
//! ### Lifecycle
//! `Created` → `Filled` → `Draining` → (`Reset` on restart → `Filled` …) → destroyed.

use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::warn;

use crate::host::{DirEntry, EntrySink, FillResult, NameRules, SessionId};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// Opened, nothing computed yet.
    Created,
    /// Entries computed, none handed out.
    Filled,
    /// Some entries handed out.
    Draining,
    /// Cleared by a restart, waiting to be refilled.
    Reset,
}

/// Sorted entries of one listing plus the position the host has drained up to.
#[derive(Debug, Default)]
pub struct EntryCollector {
    entries: Vec<DirEntry>,
    cursor: usize,
    filled: bool,
    restarted: bool,
}

impl EntryCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_filled(&self) -> bool {
        self.filled
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn entries(&self) -> &[DirEntry] {
        &self.entries
    }

    pub fn state(&self) -> SessionState {
        match (self.filled, self.cursor) {
            (false, _) if self.restarted => SessionState::Reset,
            (false, _) => SessionState::Created,
            (true, 0) => SessionState::Filled,
            (true, _) => SessionState::Draining,
        }
    }

    /// Drops the computed entries and rewinds the cursor.
    pub fn reset(&mut self) {
        self.entries.clear();
        self.cursor = 0;
        self.filled = false;
        self.restarted = true;
    }

    /// Stores `entries` in collation order, skipping names the host cannot represent.
    pub fn fill<I>(&mut self, entries: I, rules: &dyn NameRules)
    where
        I: IntoIterator<Item = DirEntry>,
    {
        self.entries.clear();
        for entry in entries {
            if rules.is_valid_name(entry.name()) {
                self.entries.push(entry);
            } else {
                warn!(name = entry.name(), "skipping entry the host cannot represent");
            }
        }
        self.entries.sort_by(|a, b| rules.compare(a.name(), b.name()));
        self.cursor = 0;
        self.filled = true;
    }

    /// Offers entries from the cursor on until the sink is full or the entries run out.
    /// Returns the number of entries the sink accepted.
    pub fn drain_into(&mut self, sink: &mut dyn EntrySink) -> usize {
        let start = self.cursor;
        while let Some(entry) = self.entries.get(self.cursor) {
            if sink.add(entry) == FillResult::BufferFull {
                break;
            }
            self.cursor += 1;
        }
        self.cursor - start
    }
}

/// Live enumeration sessions keyed by their host-issued identifier.
///
/// The map itself is sharded, so sessions starting and ending on different threads do
/// not contend; each session additionally sits behind its own mutex because the host
/// does not promise to serialize calls for one session.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: DashMap<SessionId, Arc<Mutex<EntryCollector>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an empty session. A live session with the same id is reset.
    pub fn begin(&self, id: SessionId) {
        if let Some(previous) = self
            .sessions
            .insert(id, Arc::new(Mutex::new(EntryCollector::new())))
        {
            warn!(session = %id, filled = previous.lock().is_filled(), "session id reused while live");
        }
    }

    /// Removes and discards the session. Returns `false` if it was not live.
    pub fn end(&self, id: SessionId) -> bool {
        self.sessions.remove(&id).is_some()
    }

    /// Returns the session's collector, detached from the map lock.
    pub fn get(&self, id: SessionId) -> Option<Arc<Mutex<EntryCollector>>> {
        self.sessions.get(&id).map(|session| Arc::clone(session.value()))
    }

    pub fn state(&self, id: SessionId) -> Option<SessionState> {
        self.get(id).map(|session| session.lock().state())
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
