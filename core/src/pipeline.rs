//! One bus, one session detector and the damage/healing rate engines,
//! wired together over a shared scheduler.
//!
//! ```text
//!   combat on/off ─┐                      ┌─► RateSubscriber ─► RateEngine (damage)
//!   raw events ────┼─► SessionDetector ─► EventBus
//!   advance(now) ──┘        ▲             └─► RateSubscriber ─► RateEngine (healing)
//!        │                  │                        ▲
//!        └── due TimerTasks ┴────────────────────────┘
//! ```

use std::cell::RefCell;
use std::rc::Rc;

use skirmish_types::PipelineConfig;

use crate::bus::{BusMessage, EventBus, MessageKind, ScaleUpdate};
use crate::combat_log::RawEvent;
use crate::detector::{DetectorState, HostContext, SessionDetector, TrackingPolicy};
use crate::engine::{ConsumerScope, MetricSnapshot, RateEngine, RateSubscriber};
use crate::runtime::{Clock, ConsumerId, SharedScheduler, TimerTask};
use crate::storage::SessionStore;

/// Bus clock reading the shared scheduler, so bus timestamps and timer
/// deadlines share one time axis.
struct SchedulerClock(SharedScheduler);

impl Clock for SchedulerClock {
    fn now(&self) -> f64 {
        self.0.borrow().now()
    }
}

pub struct Pipeline {
    bus: EventBus<BusMessage>,
    detector: SessionDetector,
    scheduler: SharedScheduler,
    damage: Rc<RefCell<RateEngine>>,
    healing: Rc<RefCell<RateEngine>>,
}

impl Pipeline {
    pub fn new(
        config: &PipelineConfig,
        host: Box<dyn HostContext>,
        scheduler: SharedScheduler,
        scope: ConsumerScope,
    ) -> Self {
        let mut bus = EventBus::new(
            "combat",
            &config.bus,
            Box::new(SchedulerClock(scheduler.clone())),
        );
        let detector = SessionDetector::new(&config.detector, &config.correlator, host)
            .with_scheduler(scheduler.clone());

        let damage = Rc::new(RefCell::new(
            RateEngine::new(ConsumerId::Damage, &config.engine).with_scheduler(scheduler.clone()),
        ));
        let healing = Rc::new(RefCell::new(
            RateEngine::new(ConsumerId::Healing, &config.engine).with_scheduler(scheduler.clone()),
        ));

        for (engine, amount_kind, name) in [
            (&damage, MessageKind::DamageEvent, "damage"),
            (&healing, MessageKind::HealEvent, "healing"),
        ] {
            for kind in [MessageKind::CombatStateChanged, amount_kind] {
                bus.subscribe(
                    kind,
                    name,
                    Box::new(RateSubscriber::new(engine.clone(), scope)),
                    None,
                );
            }
        }

        Self {
            bus,
            detector,
            scheduler,
            damage,
            healing,
        }
    }

    pub fn with_store(mut self, store: Box<dyn SessionStore>) -> Self {
        self.detector = self.detector.with_store(store);
        self
    }

    pub fn with_policy(mut self, policy: Box<dyn TrackingPolicy>) -> Self {
        self.detector = self.detector.with_policy(policy);
        self
    }

    // --- Inputs ---

    /// Host combat on/off. Engines stop counting toward the final rate while
    /// the detector waits out a combat-off signal.
    pub fn combat_signal(&mut self, in_combat: bool) {
        let before = self.detector.state();
        self.detector.set_combat(in_combat, &mut self.bus);
        let after = self.detector.state();

        match (before, after) {
            (DetectorState::Active, DetectorState::TimeoutPending) => {
                self.each_engine(|engine| engine.pause());
            }
            (DetectorState::TimeoutPending, DetectorState::Active) => {
                self.each_engine(|engine| engine.resume());
            }
            _ => {}
        }
    }

    pub fn raw_event(&mut self, event: &RawEvent) {
        self.detector.handle_event(event, &mut self.bus);
    }

    /// Relay a display-scale hint from an external collaborator.
    pub fn publish_scale(&mut self, update: ScaleUpdate) {
        self.bus.push(BusMessage::ScaleUpdate(update));
    }

    /// Fire every timer due at or before `now`, in due order. Returns how
    /// many fired.
    pub fn advance(&mut self, now: f64) -> usize {
        let mut fired = 0;
        loop {
            let next = self.scheduler.borrow_mut().pop_due(now);
            let Some(task) = next else {
                break;
            };
            fired += 1;
            match task {
                TimerTask::Recompute(id) => match self.engine(id).try_borrow_mut() {
                    Ok(mut engine) => engine.on_timer(),
                    Err(_) => tracing::warn!("[ENGINE] {:?} busy, recompute skipped", id),
                },
                task => self.detector.on_timer(task, &mut self.bus),
            }
        }
        fired
    }

    /// Close any open session immediately.
    pub fn finish(&mut self) {
        self.detector.finish(&mut self.bus);
    }

    // --- Accessors ---

    pub fn engine(&self, id: ConsumerId) -> &Rc<RefCell<RateEngine>> {
        match id {
            ConsumerId::Damage => &self.damage,
            ConsumerId::Healing => &self.healing,
        }
    }

    pub fn snapshot(&self, id: ConsumerId) -> MetricSnapshot {
        self.engine(id).borrow().snapshot()
    }

    pub fn bus(&self) -> &EventBus<BusMessage> {
        &self.bus
    }

    /// For collaborators that subscribe their own consumers.
    pub fn bus_mut(&mut self) -> &mut EventBus<BusMessage> {
        &mut self.bus
    }

    pub fn detector(&self) -> &SessionDetector {
        &self.detector
    }

    pub fn now(&self) -> f64 {
        self.scheduler.borrow().now()
    }

    fn each_engine(&self, mut f: impl FnMut(&mut RateEngine)) {
        for engine in [&self.damage, &self.healing] {
            if let Ok(mut engine) = engine.try_borrow_mut() {
                f(&mut engine);
            }
        }
    }
}
