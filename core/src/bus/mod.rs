//! Bounded publish/subscribe bus.
//!
//! Producers push typed messages; every active subscription for that message
//! kind is notified synchronously, in registration order, inside the `push`
//! call. Storage is a fixed-capacity ring: once full the oldest entry is
//! overwritten and counted as dropped. Entries older than the TTL stay in the
//! ring until overwritten but are hidden from history reads.
//!
//! ```text
//!   push(msg) ──► ring (cap N, oldest dropped) ──► subscription 1 ─┐
//!                                               ├─► subscription 2 ─┤ errors and panics
//!                                               └─► subscription k ─┘ are isolated
//!                                                        │
//!                                                     outbox ──► pushed next, in order
//! ```

mod message;
mod subscriber;

#[cfg(test)]
mod bus_tests;

use std::collections::VecDeque;
use std::fmt;
use std::hash::Hash;
use std::panic::{AssertUnwindSafe, catch_unwind};

use hashbrown::HashMap;
use skirmish_types::BusConfig;

use crate::runtime::Clock;

pub use message::{AmountFact, BusMessage, CombatStateChanged, MessageKind, ScaleUpdate};
pub use subscriber::{FnSubscriber, Outbox, Subscriber, SubscriberError};

use subscriber::panic_message;

/// Nested publishes deeper than this are dropped to stop feedback loops.
const MAX_NESTED_DEPTH: usize = 8;

/// A message type that can travel on an [`EventBus`].
pub trait Topic {
    type Kind: Copy + Eq + Hash + fmt::Debug + fmt::Display;
    fn kind(&self) -> Self::Kind;
}

/// One stored, immutable bus entry.
#[derive(Debug, Clone, PartialEq)]
pub struct Event<M: Topic> {
    pub kind: M::Kind,
    pub payload: M,
    /// Bus clock time at publish.
    pub timestamp: f64,
    /// Strictly increasing per bus, never reused.
    pub sequence: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(pub u64);

pub type EventFilter<M> = Box<dyn Fn(&Event<M>) -> bool>;

struct Subscription<M: Topic> {
    id: SubscriptionId,
    kind: M::Kind,
    name: String,
    subscriber: Box<dyn Subscriber<M>>,
    filter: Option<EventFilter<M>>,
    active: bool,
    faults: u64,
}

/// Read-only snapshot of bus counters.
#[derive(Debug, Clone, PartialEq)]
pub struct BusStats<K: Eq + Hash> {
    pub size: usize,
    pub capacity: usize,
    pub total_pushed: u64,
    pub total_dropped: u64,
    pub subscriber_count: usize,
    pub subscriber_faults: u64,
    /// Outbox messages discarded past the nesting limit.
    pub nested_dropped: u64,
    /// Messages pushed per kind since the bus was created.
    pub per_kind_counts: HashMap<K, u64>,
}

pub struct EventBus<M: Topic> {
    name: String,
    ring: VecDeque<Event<M>>,
    capacity: usize,
    ttl_seconds: f64,
    clock: Box<dyn Clock>,

    subscriptions: Vec<Subscription<M>>,
    next_subscription_id: u64,
    next_sequence: u64,

    total_pushed: u64,
    total_dropped: u64,
    subscriber_faults: u64,
    nested_dropped: u64,
    per_kind_counts: HashMap<M::Kind, u64>,

    size_log_step: usize,
    last_size_bucket: usize,
    depth: usize,
}

impl<M: Topic> EventBus<M> {
    pub fn new(name: impl Into<String>, config: &BusConfig, clock: Box<dyn Clock>) -> Self {
        let capacity = config.max_size.max(1);
        Self {
            name: name.into(),
            ring: VecDeque::with_capacity(capacity),
            capacity,
            ttl_seconds: config.ttl_seconds,
            clock,
            subscriptions: Vec::new(),
            next_subscription_id: 1,
            next_sequence: 1,
            total_pushed: 0,
            total_dropped: 0,
            subscriber_faults: 0,
            nested_dropped: 0,
            per_kind_counts: HashMap::new(),
            size_log_step: config.size_log_step,
            last_size_bucket: 0,
            depth: 0,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    // --- Publishing ---

    /// Store `payload` and notify matching subscribers. Never fails.
    pub fn push(&mut self, payload: M) -> u64 {
        let sequence = self.store(payload);
        self.dispatch_latest();
        sequence
    }

    fn store(&mut self, payload: M) -> u64 {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        let kind = payload.kind();

        if self.ring.len() >= self.capacity {
            self.ring.pop_front();
            self.total_dropped += 1;
        }
        self.ring.push_back(Event {
            kind,
            payload,
            timestamp: self.clock.now(),
            sequence,
        });

        self.total_pushed += 1;
        *self.per_kind_counts.entry(kind).or_insert(0) += 1;
        self.log_size_change();
        sequence
    }

    fn log_size_change(&mut self) {
        if self.size_log_step == 0 {
            return;
        }
        let bucket = self.ring.len() / self.size_log_step;
        if bucket != self.last_size_bucket {
            tracing::debug!(
                "[BUS] {} size {} / {} (dropped {})",
                self.name,
                self.ring.len(),
                self.capacity,
                self.total_dropped
            );
            self.last_size_bucket = bucket;
        }
    }

    fn dispatch_latest(&mut self) {
        let Some(event) = self.ring.back() else {
            return;
        };
        let mut outbox = Outbox::new();

        for sub in self
            .subscriptions
            .iter_mut()
            .filter(|s| s.active && s.kind == event.kind)
        {
            let outcome = catch_unwind(AssertUnwindSafe(|| {
                if let Some(filter) = &sub.filter
                    && !filter(event)
                {
                    return Ok(());
                }
                sub.subscriber.notify(event, &mut outbox)
            }));

            let err = match outcome {
                Ok(Ok(())) => continue,
                Ok(Err(err)) => err,
                Err(payload) => SubscriberError::Panicked(panic_message(payload.as_ref())),
            };
            sub.faults += 1;
            self.subscriber_faults += 1;
            tracing::warn!(
                "[BUS] {} subscriber '{}' failed on {} #{}: {}",
                self.name,
                sub.name,
                event.kind,
                event.sequence,
                err
            );
        }

        if outbox.is_empty() {
            return;
        }
        if self.depth >= MAX_NESTED_DEPTH {
            tracing::warn!(
                "[BUS] {} dropping {} nested message(s) past depth {}",
                self.name,
                outbox.len(),
                MAX_NESTED_DEPTH
            );
            self.nested_dropped += outbox.len() as u64;
            return;
        }
        self.depth += 1;
        for message in outbox.into_messages() {
            self.push(message);
        }
        self.depth -= 1;
    }

    // --- Subscriptions ---

    pub fn subscribe(
        &mut self,
        kind: M::Kind,
        name: impl Into<String>,
        subscriber: Box<dyn Subscriber<M>>,
        filter: Option<EventFilter<M>>,
    ) -> SubscriptionId {
        let id = SubscriptionId(self.next_subscription_id);
        self.next_subscription_id += 1;
        let name = name.into();
        tracing::debug!("[BUS] {} subscribe '{}' to {} as {:?}", self.name, name, kind, id);
        self.subscriptions.push(Subscription {
            id,
            kind,
            name,
            subscriber,
            filter,
            active: true,
            faults: 0,
        });
        id
    }

    /// Subscribe a closure with no outbox access.
    pub fn subscribe_fn<F>(&mut self, kind: M::Kind, name: impl Into<String>, callback: F) -> SubscriptionId
    where
        F: FnMut(&Event<M>) -> Result<(), SubscriberError> + 'static,
        M: 'static,
    {
        self.subscribe(kind, name, Box::new(FnSubscriber(callback)), None)
    }

    /// Remove a subscription. Unknown ids are ignored; returns whether one
    /// was removed.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscriptions.len();
        self.subscriptions.retain(|s| s.id != id);
        before != self.subscriptions.len()
    }

    /// Pause or resume delivery without dropping the subscription.
    pub fn set_active(&mut self, id: SubscriptionId, active: bool) -> bool {
        match self.subscriptions.iter_mut().find(|s| s.id == id) {
            Some(sub) => {
                sub.active = active;
                true
            }
            None => false,
        }
    }

    pub fn subscription_faults(&self, id: SubscriptionId) -> Option<u64> {
        self.subscriptions.iter().find(|s| s.id == id).map(|s| s.faults)
    }

    // --- Reads ---

    fn is_live(&self, event: &Event<M>, now: f64) -> bool {
        now - event.timestamp <= self.ttl_seconds
    }

    /// Stored events younger than the TTL, oldest first, optionally limited
    /// to one kind.
    pub fn pull(&self, kind: Option<M::Kind>) -> Vec<&Event<M>> {
        let now = self.clock.now();
        self.ring
            .iter()
            .filter(|e| kind.is_none_or(|k| e.kind == k))
            .filter(|e| self.is_live(e, now))
            .collect()
    }

    /// Every live event, oldest first.
    pub fn history(&self) -> Vec<&Event<M>> {
        self.pull(None)
    }

    /// Most recent live event of a kind.
    pub fn latest(&self, kind: M::Kind) -> Option<&Event<M>> {
        let now = self.clock.now();
        self.ring
            .iter()
            .rev()
            .find(|e| e.kind == kind && self.is_live(e, now))
    }

    pub fn len(&self) -> usize {
        self.ring.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    pub fn stats(&self) -> BusStats<M::Kind> {
        BusStats {
            size: self.ring.len(),
            capacity: self.capacity,
            total_pushed: self.total_pushed,
            total_dropped: self.total_dropped,
            subscriber_count: self.subscriptions.len(),
            subscriber_faults: self.subscriber_faults,
            nested_dropped: self.nested_dropped,
            per_kind_counts: self.per_kind_counts.clone(),
        }
    }

    /// Drop stored entries and reset size-change tracking. Subscriptions
    /// and lifetime counters are kept.
    pub fn clear(&mut self) {
        self.ring.clear();
        self.last_size_bucket = 0;
    }
}
