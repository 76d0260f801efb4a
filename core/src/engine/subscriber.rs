use std::cell::RefCell;
use std::rc::Rc;

use crate::bus::{AmountFact, BusMessage, Event, Outbox, Subscriber, SubscriberError};

use super::RateEngine;

/// Which accepted facts a consumer counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConsumerScope {
    /// Only the local player's own output.
    #[default]
    Player,
    /// Player, group members and everyone's pets.
    Group,
}

impl ConsumerScope {
    pub fn admits(self, fact: &AmountFact) -> bool {
        match self {
            ConsumerScope::Player => fact.source_flags.is_mine(),
            ConsumerScope::Group => fact.source_flags.is_grouped() || fact.from_pet,
        }
    }
}

/// Bus adapter feeding one [`RateEngine`].
///
/// Subscribe it to `COMBAT_STATE_CHANGED` and to the amount kind the engine
/// consumes.
pub struct RateSubscriber {
    engine: Rc<RefCell<RateEngine>>,
    scope: ConsumerScope,
    session_id: Option<String>,
}

impl RateSubscriber {
    pub fn new(engine: Rc<RefCell<RateEngine>>, scope: ConsumerScope) -> Self {
        Self {
            engine,
            scope,
            session_id: None,
        }
    }
}

impl Subscriber<BusMessage> for RateSubscriber {
    fn notify(&mut self, event: &Event<BusMessage>, _outbox: &mut Outbox<BusMessage>) -> Result<(), SubscriberError> {
        let mut engine = self
            .engine
            .try_borrow_mut()
            .map_err(|e| SubscriberError::Unavailable(e.to_string()))?;

        match &event.payload {
            BusMessage::CombatStateChanged(change) if change.in_combat => {
                if self.session_id.as_deref() != Some(change.session_id.as_str()) {
                    self.session_id = Some(change.session_id.clone());
                    engine.start(change.start_time);
                }
            }
            BusMessage::CombatStateChanged(change) => {
                match change.duration {
                    Some(duration) => engine.stop_at(duration),
                    None => engine.stop(),
                }
                self.session_id = None;
            }
            BusMessage::DamageEvent(fact) | BusMessage::HealEvent(fact) => {
                if self.scope.admits(fact) {
                    engine.accept(fact.amount, fact.timestamp, fact.source_flags);
                }
            }
            _ => {}
        }
        Ok(())
    }
}
