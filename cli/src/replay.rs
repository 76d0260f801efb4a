//! Drives a [`Pipeline`] from capture lines on a manual clock.

use std::cell::RefCell;
use std::rc::Rc;

use serde::Serialize;
use skirmish_core::bus::{BusMessage, MessageKind};
use skirmish_core::engine::{ConsumerScope, MetricSnapshot};
use skirmish_core::runtime::{ManualClock, ManualScheduler, SharedScheduler};
use skirmish_core::{ConsumerId, MemoryStore, Pipeline, SessionSummary, StaticHost};
use skirmish_types::PipelineConfig;

use crate::capture::CaptureLine;

/// Everything printed for one stored session.
#[derive(Debug, Clone, Serialize)]
pub struct SessionReport {
    pub summary: SessionSummary,
    pub damage: MetricSnapshot,
    pub healing: MetricSnapshot,
}

pub struct Replay {
    pipeline: Pipeline,
    host: Rc<RefCell<StaticHost>>,
    ended: Rc<RefCell<Vec<String>>>,
    log_domain_threshold: f64,
    applied: usize,
}

impl Replay {
    pub fn new(config: &PipelineConfig, scope: ConsumerScope) -> Self {
        let scheduler: SharedScheduler = Rc::new(RefCell::new(ManualScheduler::new(ManualClock::new(0.0))));
        let host = Rc::new(RefCell::new(StaticHost::default()));

        let mut pipeline = Pipeline::new(config, Box::new(host.clone()), scheduler, scope)
            .with_store(Box::new(MemoryStore::new()));

        let ended = Rc::new(RefCell::new(Vec::new()));
        let sink = ended.clone();
        pipeline
            .bus_mut()
            .subscribe_fn(MessageKind::CombatStateChanged, "replay", move |event| {
                if let BusMessage::CombatStateChanged(change) = &event.payload
                    && !change.in_combat
                {
                    sink.borrow_mut().push(change.session_id.clone());
                }
                Ok(())
            });

        Self {
            pipeline,
            host,
            ended,
            log_domain_threshold: config.correlator.log_domain_threshold,
            applied: 0,
        }
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    pub fn applied(&self) -> usize {
        self.applied
    }

    /// Apply one capture line. Returns reports for sessions that closed
    /// while applying it.
    pub fn apply(&mut self, line: CaptureLine) -> Vec<SessionReport> {
        if let Some(at) = line.at(self.log_domain_threshold) {
            self.pipeline.advance(at);
        }
        match line {
            CaptureLine::Host { host, .. } => {
                tracing::debug!("[REPLAY] host update: {} in '{}'", host.player.name, host.zone);
                *self.host.borrow_mut() = host;
            }
            CaptureLine::Combat { in_combat, .. } => self.pipeline.combat_signal(in_combat),
            CaptureLine::Event { event, .. } => self.pipeline.raw_event(&event),
            CaptureLine::Scale { update, .. } => self.pipeline.publish_scale(update),
            CaptureLine::Advance { .. } => {}
        }
        self.applied += 1;
        self.collect()
    }

    /// Close whatever is still open and report it.
    pub fn finish(&mut self) -> Vec<SessionReport> {
        self.pipeline.finish();
        self.collect()
    }

    fn collect(&mut self) -> Vec<SessionReport> {
        let ended: Vec<String> = self.ended.borrow_mut().drain(..).collect();
        let Some(store) = self.pipeline.detector().store() else {
            return Vec::new();
        };
        ended
            .iter()
            .filter_map(|id| {
                let session = store.session(id);
                if session.is_none() {
                    tracing::debug!("[REPLAY] session {} was not stored", id);
                }
                session
            })
            .map(|session| SessionReport {
                summary: SessionSummary::from_session(session),
                damage: self.pipeline.snapshot(ConsumerId::Damage),
                healing: self.pipeline.snapshot(ConsumerId::Healing),
            })
            .collect()
    }
}
