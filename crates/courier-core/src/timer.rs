//! Cancellable single-shot timers.
//!
//! Timers are keyed by (connection, room, kind). Scheduling under a live key
//! replaces the previous timer, so repeated `typing_start` debounces instead
//! of stacking. An expiry task may only run its callback after atomically
//! removing its own, still-current entry: firing after a cancel or a
//! replacement is a no-op, never an error.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::task::JoinHandle;
use tracing::trace;

use crate::connection::ConnectionId;
use crate::room::RoomId;

/// What a timer is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerKind {
    /// Typing-indicator auto-expiry.
    TypingExpiry,
}

/// Key identifying a single pending timer.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TimerKey {
    pub connection: ConnectionId,
    pub room: RoomId,
    pub kind: TimerKind,
}

impl TimerKey {
    /// Key for a typing-expiry timer.
    #[must_use]
    pub fn typing(connection: ConnectionId, room: RoomId) -> Self {
        Self {
            connection,
            room,
            kind: TimerKind::TypingExpiry,
        }
    }
}

struct TimerEntry {
    generation: u64,
    handle: Option<JoinHandle<()>>,
}

impl TimerEntry {
    fn abort(self) {
        if let Some(handle) = self.handle {
            handle.abort();
        }
    }
}

/// Registry of pending single-shot timers.
///
/// Must be used within a Tokio runtime: expiry callbacks run on spawned
/// tasks.
pub struct TimerRegistry {
    timers: Arc<DashMap<TimerKey, TimerEntry>>,
    generations: AtomicU64,
}

impl TimerRegistry {
    /// Create a new empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            timers: Arc::new(DashMap::new()),
            generations: AtomicU64::new(0),
        }
    }

    /// Schedule a single-shot timer, replacing any pending timer under the
    /// same key.
    ///
    /// The replacement is atomic with respect to firing: the superseded
    /// timer's expiry observes a newer generation in its slot and does
    /// nothing, so a key never double-fires.
    pub fn schedule<F>(&self, key: TimerKey, delay: Duration, callback: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let generation = self.generations.fetch_add(1, Ordering::Relaxed);

        // Arm the slot before spawning so the expiry task always observes
        // its own entry, even with a zero delay.
        if let Some(previous) = self.timers.insert(
            key.clone(),
            TimerEntry {
                generation,
                handle: None,
            },
        ) {
            trace!(?key, "replacing pending timer");
            previous.abort();
        }

        let timers = Arc::clone(&self.timers);
        let task_key = key.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            // Fire only while this entry is still the current one for the
            // key; a concurrent cancel or replacement wins the removal race
            // and the callback never runs.
            let live = timers
                .remove_if(&task_key, |_, entry| entry.generation == generation)
                .is_some();
            if live {
                callback();
            }
        });

        match self.timers.get_mut(&key) {
            Some(mut entry) if entry.generation == generation => entry.handle = Some(handle),
            // Cancelled or replaced before the handle landed; the
            // generation check keeps the spawned task from firing.
            _ => handle.abort(),
        }
    }

    /// Cancel a pending timer.
    ///
    /// Returns `true` if a timer was pending under the key. Safe to call
    /// while the timer is concurrently firing: whichever side removes the
    /// entry wins, and the loser does nothing.
    pub fn cancel(&self, key: &TimerKey) -> bool {
        match self.timers.remove(key) {
            Some((_, entry)) => {
                entry.abort();
                true
            }
            None => false,
        }
    }

    /// Cancel every pending timer owned by a connection.
    ///
    /// Returns the number of timers cancelled.
    pub fn cancel_all(&self, connection: &ConnectionId) -> usize {
        let keys: Vec<TimerKey> = self
            .timers
            .iter()
            .filter(|entry| &entry.key().connection == connection)
            .map(|entry| entry.key().clone())
            .collect();

        keys.iter().filter(|key| self.cancel(key)).count()
    }

    /// Whether a timer is pending under the key.
    #[must_use]
    pub fn is_scheduled(&self, key: &TimerKey) -> bool {
        self.timers.contains_key(key)
    }

    /// Number of pending timers.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.timers.len()
    }
}

impl Default for TimerRegistry {
    fn default() -> Self {
        Self::new()
    }
}
