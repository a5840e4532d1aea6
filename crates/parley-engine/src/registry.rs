// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-conversation generation registry.
//!
//! At most one live entry exists per conversation id. Each entry owns the
//! cancel handle of its task and an append-only event log with a bounded
//! tail. Observers read the log by sequence number, so any number of them
//! can follow a generation, join late, or reconnect without ever blocking
//! the producing task.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::Stream;
use parley_core::types::{ConversationId, GenerationEvent, UserId};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

/// Default number of events retained for replay.
pub const DEFAULT_REPLAY_CAP: usize = 1024;

/// Process-local map of running generations.
#[derive(Clone)]
pub struct GenerationRegistry {
    entries: Arc<DashMap<ConversationId, Arc<RegistryEntry>>>,
    replay_cap: usize,
}

/// Result of [`GenerationRegistry::acquire_or_join`].
pub enum Admission {
    /// No generation was running; the caller owns the new entry and must
    /// start its task.
    New(EntryLease),
    /// A generation is already running; the caller may only observe it.
    Existing(Arc<RegistryEntry>),
}

impl GenerationRegistry {
    pub fn new(replay_cap: usize) -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            replay_cap: replay_cap.max(1),
        }
    }

    /// Registers a generation for `conversation_id` or joins the running one.
    ///
    /// Concurrent callers for the same id are serialized on the map shard,
    /// so exactly one of them observes [`Admission::New`].
    pub fn acquire_or_join(&self, conversation_id: ConversationId, user_id: UserId) -> Admission {
        match self.entries.entry(conversation_id) {
            Entry::Occupied(occupied) => {
                debug!(conversation_id, "joining running generation");
                Admission::Existing(Arc::clone(occupied.get()))
            }
            Entry::Vacant(vacant) => {
                let entry = Arc::new(RegistryEntry::new(
                    conversation_id,
                    user_id,
                    self.replay_cap,
                ));
                vacant.insert(Arc::clone(&entry));
                debug!(conversation_id, user_id, "generation registered");
                Admission::New(EntryLease {
                    registry: self.clone(),
                    entry,
                    released: false,
                })
            }
        }
    }

    /// Appends `event` to the entry's log and wakes its observers.
    pub fn buffer_and_emit(&self, entry: &RegistryEntry, event: GenerationEvent) {
        entry.push(event);
    }

    /// Closes the entry's log and removes it from the map.
    ///
    /// Returns `true` for the call that actually closed the log; later calls
    /// are no-ops.
    pub fn terminate(&self, entry: &Arc<RegistryEntry>) -> bool {
        let closed = entry.close();
        self.entries
            .remove_if(&entry.conversation_id, |_, current| Arc::ptr_eq(current, entry));
        if closed {
            debug!(conversation_id = entry.conversation_id, "generation terminated");
        }
        closed
    }

    /// Fires the cancel handle of the running generation, if any.
    pub fn cancel(&self, conversation_id: ConversationId) -> bool {
        match self.entries.get(&conversation_id) {
            Some(entry) => {
                entry.cancel.cancel();
                debug!(conversation_id, "generation cancel requested");
                true
            }
            None => false,
        }
    }

    /// Like [`cancel`](Self::cancel), but only for a generation started by `user_id`.
    pub fn cancel_owned(&self, conversation_id: ConversationId, user_id: UserId) -> bool {
        match self.entries.get(&conversation_id) {
            Some(entry) if entry.user_id == user_id => {
                entry.cancel.cancel();
                debug!(conversation_id, user_id, "generation cancel requested");
                true
            }
            _ => false,
        }
    }

    /// Conversation ids with a running generation started by `user_id`.
    pub fn conversations_for_user(&self, user_id: UserId) -> Vec<ConversationId> {
        let mut ids: Vec<ConversationId> = self
            .entries
            .iter()
            .filter(|entry| entry.user_id == user_id)
            .map(|entry| *entry.key())
            .collect();
        ids.sort_unstable();
        ids
    }

    pub fn get(&self, conversation_id: ConversationId) -> Option<Arc<RegistryEntry>> {
        self.entries.get(&conversation_id).map(|e| Arc::clone(e.value()))
    }

    pub fn contains(&self, conversation_id: ConversationId) -> bool {
        self.entries.contains_key(&conversation_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Ownership of a freshly registered entry.
///
/// Dropping the lease terminates the entry, so the log is closed and the
/// map slot freed on every exit path of the owning task.
pub struct EntryLease {
    registry: GenerationRegistry,
    entry: Arc<RegistryEntry>,
    released: bool,
}

impl EntryLease {
    pub fn entry(&self) -> &Arc<RegistryEntry> {
        &self.entry
    }

    pub fn emit(&self, event: GenerationEvent) {
        self.registry.buffer_and_emit(&self.entry, event);
    }

    /// Terminates the entry now instead of on drop.
    pub fn terminate(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if !self.released {
            self.released = true;
            self.registry.terminate(&self.entry);
        }
    }
}

impl Drop for EntryLease {
    fn drop(&mut self) {
        self.release();
    }
}

/// A running generation.
pub struct RegistryEntry {
    conversation_id: ConversationId,
    user_id: UserId,
    cancel: CancellationToken,
    log: Mutex<EventLog>,
    notify: watch::Sender<u64>,
}

struct EventLog {
    events: VecDeque<(u64, GenerationEvent)>,
    next_seq: u64,
    cap: usize,
    closed: bool,
}

enum Read {
    Event(u64, GenerationEvent),
    Pending,
    Closed,
}

impl RegistryEntry {
    fn new(conversation_id: ConversationId, user_id: UserId, cap: usize) -> Self {
        let (notify, _) = watch::channel(0);
        Self {
            conversation_id,
            user_id,
            cancel: CancellationToken::new(),
            log: Mutex::new(EventLog {
                events: VecDeque::with_capacity(cap.min(64)),
                next_seq: 0,
                cap,
                closed: false,
            }),
            notify,
        }
    }

    pub fn conversation_id(&self) -> ConversationId {
        self.conversation_id
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    /// Cancel handle of the generation; task contexts are children of it.
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Events currently retained for replay, oldest first.
    pub fn buffered(&self) -> Vec<GenerationEvent> {
        self.lock().events.iter().map(|(_, e)| e.clone()).collect()
    }

    /// Starts an observer at the oldest retained event.
    pub fn subscribe(self: &Arc<Self>) -> Subscription {
        Subscription {
            entry: Arc::clone(self),
            cursor: 0,
            wake: self.notify.subscribe(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, EventLog> {
        self.log.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn push(&self, event: GenerationEvent) {
        let seq = {
            let mut log = self.lock();
            if log.closed {
                trace!(conversation_id = self.conversation_id, "event after close dropped");
                return;
            }
            let seq = log.next_seq;
            log.next_seq += 1;
            if log.events.len() == log.cap {
                log.events.pop_front();
            }
            log.events.push_back((seq, event));
            seq
        };
        self.notify.send_replace(seq + 1);
    }

    fn close(&self) -> bool {
        let first = {
            let mut log = self.lock();
            !std::mem::replace(&mut log.closed, true)
        };
        if first {
            self.notify.send_modify(|_| {});
        }
        first
    }

    fn read_from(&self, cursor: u64) -> Read {
        let log = self.lock();
        let Some(&(oldest, _)) = log.events.front() else {
            return if log.closed { Read::Closed } else { Read::Pending };
        };
        let seq = cursor.max(oldest);
        if seq >= log.next_seq {
            return if log.closed { Read::Closed } else { Read::Pending };
        }
        let index = (seq - oldest) as usize;
        match log.events.get(index) {
            Some((seq, event)) => Read::Event(*seq, event.clone()),
            None => Read::Pending,
        }
    }
}

/// One observer's position in an entry's event log.
///
/// A subscription that falls behind the retained tail resumes at the oldest
/// retained event, so its transcript is partial.
pub struct Subscription {
    entry: Arc<RegistryEntry>,
    cursor: u64,
    wake: watch::Receiver<u64>,
}

impl Subscription {
    pub fn conversation_id(&self) -> ConversationId {
        self.entry.conversation_id
    }

    /// Next event in order, or `None` once the generation has terminated
    /// and every retained event was read.
    pub async fn next_event(&mut self) -> Option<GenerationEvent> {
        loop {
            self.wake.borrow_and_update();
            match self.entry.read_from(self.cursor) {
                Read::Event(seq, event) => {
                    self.cursor = seq + 1;
                    return Some(event);
                }
                Read::Closed => return None,
                Read::Pending => {
                    // The sender lives in the entry this subscription holds.
                    if self.wake.changed().await.is_err() {
                        return None;
                    }
                }
            }
        }
    }

    pub fn into_stream(self) -> impl Stream<Item = GenerationEvent> + Send + 'static {
        futures::stream::unfold(self, |mut sub| async move {
            sub.next_event().await.map(|event| (event, sub))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn lease(admission: Admission) -> EntryLease {
        match admission {
            Admission::New(lease) => lease,
            Admission::Existing(_) => panic!("expected a new entry"),
        }
    }

    #[test]
    fn first_caller_is_new_then_existing() {
        let registry = GenerationRegistry::new(8);
        let first = lease(registry.acquire_or_join(1, 10));
        assert!(matches!(
            registry.acquire_or_join(1, 10),
            Admission::Existing(_)
        ));
        assert_eq!(registry.len(), 1);
        drop(first);
        assert!(registry.is_empty());
    }

    #[test]
    fn concurrent_acquire_admits_exactly_one() {
        let registry = GenerationRegistry::new(8);
        let handles: Vec<_> = (0..16)
            .map(|_| {
                let registry = registry.clone();
                std::thread::spawn(move || match registry.acquire_or_join(7, 1) {
                    Admission::New(lease) => {
                        // Hold the lease so no later caller re-registers.
                        std::mem::forget(lease);
                        1
                    }
                    Admission::Existing(_) => 0,
                })
            })
            .collect();
        let admitted: i32 = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(admitted, 1);
    }

    #[test]
    fn terminate_closes_once_and_keeps_newer_entry() {
        let registry = GenerationRegistry::new(8);
        let lease_a = lease(registry.acquire_or_join(3, 1));
        let entry_a = Arc::clone(lease_a.entry());
        assert!(registry.terminate(&entry_a));
        assert!(!registry.terminate(&entry_a));

        let lease_b = lease(registry.acquire_or_join(3, 1));
        // Dropping the stale lease must not evict the newer entry.
        drop(lease_a);
        assert!(registry.contains(3));
        drop(lease_b);
        assert!(!registry.contains(3));
    }

    #[test]
    fn cancel_reports_presence_and_fires_token() {
        let registry = GenerationRegistry::new(8);
        assert!(!registry.cancel(5));
        let lease = lease(registry.acquire_or_join(5, 2));
        assert!(!registry.cancel_owned(5, 3));
        assert!(!lease.entry().cancel_token().is_cancelled());
        assert!(registry.cancel_owned(5, 2));
        assert!(lease.entry().cancel_token().is_cancelled());
        assert!(registry.cancel(5));
    }

    #[test]
    fn buffer_evicts_oldest_beyond_cap() {
        let registry = GenerationRegistry::new(3);
        let lease = lease(registry.acquire_or_join(1, 1));
        for i in 0..5 {
            lease.emit(GenerationEvent::content(i.to_string()));
        }
        let buffered: Vec<_> = lease
            .entry()
            .buffered()
            .into_iter()
            .filter_map(|e| e.content_delta)
            .collect();
        assert_eq!(buffered, vec!["2", "3", "4"]);
    }

    #[test]
    fn thread_list_is_per_user() {
        let registry = GenerationRegistry::new(8);
        let _a = lease(registry.acquire_or_join(20, 1));
        let _b = lease(registry.acquire_or_join(10, 1));
        let _c = lease(registry.acquire_or_join(30, 2));
        assert_eq!(registry.conversations_for_user(1), vec![10, 20]);
        assert_eq!(registry.conversations_for_user(2), vec![30]);
        assert!(registry.conversations_for_user(3).is_empty());
    }

    #[tokio::test]
    async fn late_subscriber_replays_then_follows_live() {
        let registry = GenerationRegistry::new(16);
        let lease = lease(registry.acquire_or_join(1, 1));
        lease.emit(GenerationEvent::content("a"));
        lease.emit(GenerationEvent::content("b"));

        let mut late = lease.entry().subscribe();
        assert_eq!(late.next_event().await.unwrap().content_delta.as_deref(), Some("a"));
        assert_eq!(late.next_event().await.unwrap().content_delta.as_deref(), Some("b"));

        let reader = tokio::spawn(async move {
            let mut seen = Vec::new();
            while let Some(event) = late.next_event().await {
                seen.extend(event.content_delta);
            }
            seen
        });
        tokio::time::sleep(Duration::from_millis(10)).await;
        lease.emit(GenerationEvent::content("c"));
        lease.terminate();

        assert_eq!(reader.await.unwrap(), vec!["c"]);
    }

    #[tokio::test]
    async fn lagging_subscriber_resumes_at_oldest_retained() {
        let registry = GenerationRegistry::new(2);
        let lease = lease(registry.acquire_or_join(1, 1));
        let mut slow = lease.entry().subscribe();
        for i in 0..4 {
            lease.emit(GenerationEvent::content(i.to_string()));
        }
        lease.terminate();

        let mut seen = Vec::new();
        while let Some(event) = slow.next_event().await {
            seen.extend(event.content_delta);
        }
        assert_eq!(seen, vec!["2", "3"]);
    }

    #[tokio::test]
    async fn emit_after_close_is_ignored() {
        let registry = GenerationRegistry::new(4);
        let lease = lease(registry.acquire_or_join(1, 1));
        let entry = Arc::clone(lease.entry());
        lease.terminate();
        registry.buffer_and_emit(&entry, GenerationEvent::content("late"));
        assert!(entry.buffered().is_empty());
        assert!(entry.subscribe().next_event().await.is_none());
    }
}
