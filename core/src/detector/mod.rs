//! Combat session detection.
//!
//! The detector consumes the host's combat on/off signal and the raw event
//! stream, decides where sessions and segments begin and end, and publishes
//! accepted facts on the bus.
//!
//! ```text
//!             combat on (policy ok)
//!   Idle ───────────────────────────► Active ◄──────────┐
//!    ▲                                  │ combat off     │ combat on
//!    │ idle ≥ activity_timeout          ▼                │
//!    └──────────────────────────── TimeoutPending ──────┘
//! ```
//!
//! Events are processed while a session is open (Active or TimeoutPending).
//! Only qualifying activity moves the activity clock, so passive periodic
//! ticks cannot keep a session alive on their own.

mod host;
mod pets;
mod roster;
mod session;


use serde::{Deserialize, Serialize};
use skirmish_types::{CorrelatorConfig, DetectorConfig};

use crate::bus::{AmountFact, BusMessage, CombatStateChanged, EventBus};
use crate::combat_log::{
    CombatEvent, EventKind, RawEvent, Unit, is_ignored_entity, is_noise_kind, is_passive_periodic,
};
use crate::correlator::TimestampCorrelator;
use crate::runtime::{SharedScheduler, TimerHandle, TimerTask, scheduler_now};
use crate::storage::SessionStore;

pub use host::{
    DefaultTrackingPolicy, GroupContext, GroupMember, GroupPet, HostContext, InstanceKind,
    PlayerIdentity, StaticHost, TrackingPolicy,
};
pub use pets::{
    ClassifyContext, DetectionSource, LayeredPetClassifier, PetClassifier, PetKind,
    PetOwnershipEntry, owner_from_name,
};
pub use roster::RosterCache;
pub use session::{BufferPool, Segment, Session, generate_session_id, short_hash};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DetectorState {
    #[default]
    Idle,
    Active,
    TimeoutPending,
}

/// Counters for everything the detector saw, kept across sessions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectorStats {
    pub sessions_started: u64,
    pub sessions_stored: u64,
    pub sessions_discarded: u64,
    /// Combat-on signals rejected by the tracking policy.
    pub untracked_signals: u64,
    pub accepted: u64,
    pub noise: u64,
    pub malformed: u64,
    pub irrelevant: u64,
    /// Events that arrived with no open session.
    pub outside_session: u64,
}

struct OpenSession {
    session: Session,
    segment: Segment,
    next_segment: usize,
}

pub struct SessionDetector {
    config: DetectorConfig,
    state: DetectorState,
    correlator: TimestampCorrelator,

    host: Box<dyn HostContext>,
    policy: Box<dyn TrackingPolicy>,
    classifier: Box<dyn PetClassifier>,
    scheduler: Option<SharedScheduler>,
    store: Option<Box<dyn SessionStore>>,

    open: Option<OpenSession>,
    player: PlayerIdentity,
    roster: RosterCache,
    pool: BufferPool,

    /// Local clock time of the last qualifying activity.
    last_activity: f64,
    /// Stand-in clock when no scheduler is attached.
    fallback_now: f64,
    activity_timer: Option<TimerHandle>,
    roster_timer: Option<TimerHandle>,

    stats: DetectorStats,
}

impl SessionDetector {
    pub fn new(
        config: &DetectorConfig,
        correlator: &CorrelatorConfig,
        host: Box<dyn HostContext>,
    ) -> Self {
        Self {
            config: config.clone(),
            state: DetectorState::Idle,
            correlator: TimestampCorrelator::new(correlator),
            host,
            policy: Box::new(DefaultTrackingPolicy {
                track_open_world: config.track_open_world,
            }),
            classifier: Box::new(LayeredPetClassifier::new(config)),
            scheduler: None,
            store: None,
            open: None,
            player: PlayerIdentity::default(),
            roster: RosterCache::new(),
            pool: BufferPool::default(),
            last_activity: 0.0,
            fallback_now: 0.0,
            activity_timer: None,
            roster_timer: None,
            stats: DetectorStats::default(),
        }
    }

    pub fn with_scheduler(mut self, scheduler: SharedScheduler) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    pub fn with_store(mut self, store: Box<dyn SessionStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_policy(mut self, policy: Box<dyn TrackingPolicy>) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_classifier(mut self, classifier: Box<dyn PetClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    // --- Accessors ---

    pub fn state(&self) -> DetectorState {
        self.state
    }

    /// The open session, if any.
    pub fn session(&self) -> Option<&Session> {
        self.open.as_ref().map(|o| &o.session)
    }

    pub fn active_segment(&self) -> Option<&Segment> {
        self.open.as_ref().map(|o| &o.segment)
    }

    pub fn store(&self) -> Option<&dyn SessionStore> {
        self.store.as_deref()
    }

    pub fn correlator(&self) -> &TimestampCorrelator {
        &self.correlator
    }

    pub fn stats(&self) -> &DetectorStats {
        &self.stats
    }

    pub fn roster(&self) -> &RosterCache {
        &self.roster
    }

    pub fn pooled_buffers(&self) -> usize {
        self.pool.len()
    }

    fn now(&self) -> f64 {
        scheduler_now(self.scheduler.as_ref()).unwrap_or(self.fallback_now)
    }

    // --- Timers ---

    fn schedule(&self, delay: f64, task: TimerTask) -> Option<TimerHandle> {
        match &self.scheduler {
            Some(scheduler) => Some(scheduler.borrow_mut().schedule(delay, task)),
            None => {
                tracing::warn!("[SESSION] no scheduler attached, {:?} not scheduled", task);
                None
            }
        }
    }

    fn cancel(&self, handle: Option<TimerHandle>) {
        if let (Some(scheduler), Some(handle)) = (&self.scheduler, handle) {
            scheduler.borrow_mut().cancel(handle);
        }
    }

    fn cancel_timers(&mut self) {
        let handles = [self.activity_timer.take(), self.roster_timer.take()];
        for handle in handles {
            self.cancel(handle);
        }
    }

    // --- Combat signal ---

    /// Feed the host's combat on/off signal.
    pub fn set_combat(&mut self, in_combat: bool, bus: &mut EventBus<BusMessage>) {
        match (self.state, in_combat) {
            (DetectorState::Idle, true) => self.begin_session(bus),
            (DetectorState::Active, false) => {
                self.state = DetectorState::TimeoutPending;
                let stale = self.activity_timer.take();
                self.cancel(stale);
                self.activity_timer = self.schedule(self.config.check_interval, TimerTask::ActivityCheck);
                tracing::debug!("[SESSION] combat off, waiting {:.1}s for activity", self.config.activity_timeout);
            }
            (DetectorState::TimeoutPending, true) => {
                let pending = self.activity_timer.take();
                self.cancel(pending);
                self.state = DetectorState::Active;
                tracing::debug!("[SESSION] combat resumed");
            }
            (state, _) => {
                tracing::trace!("[SESSION] combat={} ignored in {:?}", in_combat, state);
            }
        }
    }

    fn begin_session(&mut self, bus: &mut EventBus<BusMessage>) {
        let context = self.host.group_context();
        let zone = self.host.zone();
        if !self.policy.should_track(&context, &zone) {
            self.stats.untracked_signals += 1;
            tracing::debug!("[SESSION] not tracking {:?} in '{}'", context.instance, zone);
            return;
        }

        let now = self.now();
        self.player = self.host.player();
        let session = Session::new(
            now,
            self.player.name.clone(),
            zone,
            context,
            self.pool.take(),
        );
        let segment = Segment::new(&session.id, 0, 0.0);

        self.classifier.reset();
        self.roster.rebuild(self.host.as_ref(), now);
        self.last_activity = now;
        self.correlator.start_session(now);

        tracing::info!(
            "[SESSION] started {} ({}) in '{}', group of {}",
            session.hash,
            session.id,
            session.zone,
            session.group_context.group_size
        );
        let announce = CombatStateChanged {
            in_combat: true,
            start_time: now,
            session_id: session.id.clone(),
            duration: None,
        };
        self.open = Some(OpenSession {
            session,
            segment,
            next_segment: 1,
        });
        self.state = DetectorState::Active;
        self.stats.sessions_started += 1;

        self.cancel_timers();
        self.roster_timer = self.schedule(self.config.roster_rescan_interval, TimerTask::RosterRescan);
        bus.push(BusMessage::CombatStateChanged(announce));
    }

    /// Close the open session now, regardless of state.
    pub fn finish(&mut self, bus: &mut EventBus<BusMessage>) {
        if self.open.is_some() {
            self.end_session(bus);
        }
    }

    fn end_session(&mut self, bus: &mut EventBus<BusMessage>) {
        self.cancel_timers();
        self.state = DetectorState::Idle;
        let Some(OpenSession {
            mut session,
            segment,
            ..
        }) = self.open.take()
        else {
            return;
        };

        session.attach_segment(segment, self.config.segment_min_events);
        let end = self.last_activity.max(session.start_time);
        session.end(end);
        self.correlator.end_session(end);

        let announce = CombatStateChanged {
            in_combat: false,
            start_time: session.start_time,
            session_id: session.id.clone(),
            duration: Some(session.duration_seconds),
        };

        if session.meets_criteria(&self.config) {
            tracing::info!(
                "[SESSION] ended {}: {:.1}s, {} events, {} segments",
                session.hash,
                session.duration_seconds,
                session.event_count,
                session.segments.len()
            );
            match self.store.as_mut() {
                Some(store) => {
                    store.store_session(session);
                    self.stats.sessions_stored += 1;
                }
                None => {
                    tracing::warn!("[SESSION] no store attached, dropping {}", session.hash);
                    self.pool.give(session.events);
                }
            }
        } else {
            tracing::info!(
                "[SESSION] discarded {}: {:.1}s, {} events ({:.2}/s)",
                session.hash,
                session.duration_seconds,
                session.event_count,
                session.activity_rate()
            );
            self.stats.sessions_discarded += 1;
            self.pool.give(session.events);
        }

        bus.push(BusMessage::CombatStateChanged(announce));
    }

    /// Handle a timer task scheduled by this detector.
    pub fn on_timer(&mut self, task: TimerTask, bus: &mut EventBus<BusMessage>) {
        match task {
            TimerTask::ActivityCheck => {
                self.activity_timer = None;
                if self.state != DetectorState::TimeoutPending {
                    return;
                }
                let idle = self.now() - self.last_activity;
                if idle >= self.config.activity_timeout {
                    tracing::debug!("[SESSION] idle for {:.1}s, ending", idle);
                    self.end_session(bus);
                } else {
                    self.activity_timer = self.schedule(self.config.check_interval, TimerTask::ActivityCheck);
                }
            }
            TimerTask::RosterRescan => {
                self.roster_timer = None;
                if self.open.is_none() {
                    return;
                }
                let now = self.now();
                self.roster.rebuild(self.host.as_ref(), now);
                self.roster_timer = self.schedule(self.config.roster_rescan_interval, TimerTask::RosterRescan);
            }
            TimerTask::Recompute(_) => {
                tracing::debug!("[SESSION] ignoring foreign timer {:?}", task);
            }
        }
    }

    // --- Events ---

    /// Run one raw event through filtering, classification and
    /// segmentation. Rejected events leave no trace beyond counters.
    pub fn handle_event(&mut self, raw: &RawEvent, bus: &mut EventBus<BusMessage>) {
        if self.open.is_none() {
            if self.scheduler.is_none() {
                self.fallback_now = raw.timestamp;
            }
            self.stats.outside_session += 1;
            return;
        }

        if is_noise_kind(&raw.kind) {
            self.stats.noise += 1;
            return;
        }

        let mut event = match raw.parse(self.config.max_amount) {
            Ok(event) => event,
            Err(err) => {
                self.stats.malformed += 1;
                tracing::warn!("[SESSION] rejected event: {}", err);
                return;
            }
        };

        if self.scheduler.is_none() {
            self.advance_fallback_clock(raw.timestamp);
        }
        let now = self.now();
        if event.kind == EventKind::SpellSummon && self.is_tracked_unit(&event.source) {
            self.classifier.register_summon(&event.source, &event.dest, now);
        }

        let source_pet = self.classify(&event.source, now);
        let dest_pet = self.classify(&event.dest, now);

        let relevant = self.is_relevant(&event.source, source_pet.as_ref())
            || self.is_relevant(&event.dest, dest_pet.as_ref());
        if !relevant {
            self.stats.irrelevant += 1;
            return;
        }

        if is_activity(&event) {
            self.last_activity = now;
        }
        event.time = self.correlator.relative_time(raw.timestamp);

        let fact = event.amount.map(|amount| AmountFact {
            amount,
            source: event.source.guid.clone(),
            source_name: event.source.name.clone(),
            target: event.dest.guid.clone(),
            source_flags: event.source.flags,
            timestamp: event.time,
            spell_id: event.spell.as_ref().map(|s| s.id),
            spell_name: event.spell.as_ref().map(|s| s.name.clone()),
            from_pet: source_pet.is_some(),
            owner_name: source_pet.as_ref().and_then(|p| p.owner_name.clone()),
            critical: event.critical,
            periodic: event.kind.is_periodic(),
        });
        let is_heal = event.kind.is_heal();

        self.record(event, [source_pet, dest_pet]);

        if let Some(fact) = fact {
            bus.push(if is_heal {
                BusMessage::HealEvent(fact)
            } else {
                BusMessage::DamageEvent(fact)
            });
        }
        if self.config.publish_raw {
            bus.push(BusMessage::RawCombatEvent(raw.clone()));
        }
    }

    /// Without a scheduler, event time stands in for the local clock.
    /// Log-domain stamps are mapped onto the session baseline first.
    fn advance_fallback_clock(&mut self, timestamp: f64) {
        self.fallback_now = match self.correlator.baseline() {
            Some(baseline) => baseline + self.correlator.relative_time(timestamp),
            None => timestamp,
        };
    }

    fn classify(&mut self, unit: &Unit, now: f64) -> Option<PetOwnershipEntry> {
        if !unit.is_known() {
            return None;
        }
        let mut ctx = ClassifyContext {
            now,
            player: &self.player,
            roster: &mut self.roster,
            host: self.host.as_ref(),
        };
        self.classifier.classify(unit, &mut ctx)
    }

    /// The player or a current group member.
    fn is_tracked_unit(&self, unit: &Unit) -> bool {
        if !unit.is_known() {
            return false;
        }
        unit.guid == self.player.guid
            || (!self.player.name.is_empty() && unit.name == self.player.name)
            || self.roster.is_member(&unit.guid)
    }

    fn is_relevant(&self, unit: &Unit, pet: Option<&PetOwnershipEntry>) -> bool {
        if !unit.is_known() {
            return false;
        }
        if !unit.flags.is_player() && is_ignored_entity(&unit.name) {
            return false;
        }
        if self.is_tracked_unit(unit) || unit.flags.is_grouped() {
            return true;
        }
        pet.is_some_and(|pet| match pet.owner_name.as_deref() {
            Some(owner) => owner == self.player.name || self.roster.is_member_name(owner),
            None => unit.flags.is_friendly(),
        })
    }

    fn record(&mut self, event: CombatEvent, pets: [Option<PetOwnershipEntry>; 2]) {
        let Some(open) = self.open.as_mut() else {
            return;
        };

        if open.segment.should_split(event.time, &self.config) {
            let next = Segment::new(&open.session.id, open.next_segment, event.time);
            open.next_segment += 1;
            let done = std::mem::replace(&mut open.segment, next);
            tracing::debug!(
                "[SESSION] {} segment {} closed at {} events",
                open.session.hash,
                done.index,
                done.event_count
            );
            open.session.attach_segment(done, self.config.segment_min_events);
        }

        let session = &mut open.session;
        for unit in [&event.source, &event.dest] {
            if unit.is_known() && !unit.name.is_empty() {
                session.guid_map.insert(unit.guid.clone(), unit.name.clone());
            }
        }
        for pet in pets.into_iter().flatten() {
            session.pets.insert(pet.guid.clone(), pet);
        }

        session.events.push(event.clone());
        session.event_count += 1;
        open.segment.push(event);
        self.stats.accepted += 1;
    }
}

/// Whether an accepted event extends the activity clock.
fn is_activity(event: &CombatEvent) -> bool {
    if !event.kind.is_activity_candidate() {
        return false;
    }
    !(event.kind.is_periodic() && event.spell_name().is_some_and(is_passive_periodic))
}
