//! Tests for the bounded event bus
//!
//! Covers overflow accounting, delivery order, fault isolation, TTL reads
//! and nested publishing from inside a subscriber.

use std::cell::RefCell;
use std::rc::Rc;

use skirmish_types::BusConfig;

use super::*;
use crate::runtime::ManualClock;

fn config(max_size: usize, ttl_seconds: f64) -> BusConfig {
    BusConfig {
        max_size,
        ttl_seconds,
        size_log_step: 0,
    }
}

fn scale(n: u32) -> BusMessage {
    BusMessage::ScaleUpdate(ScaleUpdate {
        dps_scale: n as f64,
        hps_scale: 0.0,
        character: "Tester".to_string(),
        timestamp: 0.0,
    })
}

fn state(in_combat: bool) -> BusMessage {
    BusMessage::CombatStateChanged(CombatStateChanged {
        in_combat,
        start_time: 0.0,
        session_id: "s".to_string(),
        duration: None,
    })
}

fn make_bus(max_size: usize) -> (EventBus<BusMessage>, ManualClock) {
    let clock = ManualClock::new(0.0);
    let bus = EventBus::new("test", &config(max_size, 30.0), Box::new(clock.clone()));
    (bus, clock)
}

fn recorder() -> Rc<RefCell<Vec<u64>>> {
    Rc::new(RefCell::new(Vec::new()))
}

// ─────────────────────────────────────────────────────────────────────────────
// Capacity
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_overflow_drops_oldest() {
    let (mut bus, _clock) = make_bus(200);
    for n in 0..1_200 {
        bus.push(scale(n));
    }

    let stats = bus.stats();
    assert_eq!(stats.size, 200);
    assert_eq!(stats.capacity, 200);
    assert_eq!(stats.total_pushed, 1_200);
    assert_eq!(stats.total_dropped, 1_000);

    let oldest = bus.pull(None)[0];
    assert_eq!(oldest.sequence, 1_001);
}

#[test]
fn test_bounded_growth_for_many_sizes() {
    for (max, pushes) in [(1usize, 5u32), (7, 7), (7, 8), (50, 333)] {
        let (mut bus, _clock) = make_bus(max);
        for n in 0..pushes {
            bus.push(scale(n));
        }
        let stats = bus.stats();
        assert_eq!(stats.size, max.min(pushes as usize));
        assert_eq!(stats.total_dropped, (pushes as u64).saturating_sub(max as u64));
    }
}

#[test]
fn test_sequences_strictly_increase() {
    let (mut bus, _clock) = make_bus(4);
    let seqs: Vec<u64> = (0..10).map(|n| bus.push(scale(n))).collect();
    assert!(seqs.windows(2).all(|w| w[1] > w[0]));

    bus.clear();
    assert!(bus.push(scale(99)) > seqs[9]);
}

#[test]
fn test_per_kind_counts() {
    let (mut bus, _clock) = make_bus(10);
    bus.push(scale(1));
    bus.push(state(true));
    bus.push(scale(2));

    let stats = bus.stats();
    assert_eq!(stats.per_kind_counts.get(&MessageKind::ScaleUpdate), Some(&2));
    assert_eq!(stats.per_kind_counts.get(&MessageKind::CombatStateChanged), Some(&1));
    assert_eq!(stats.per_kind_counts.get(&MessageKind::DamageEvent), None);
}

// ─────────────────────────────────────────────────────────────────────────────
// Delivery
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_delivery_in_subscription_order() {
    let (mut bus, _clock) = make_bus(10);
    let order = Rc::new(RefCell::new(Vec::new()));

    for tag in ["first", "second", "third"] {
        let order = Rc::clone(&order);
        bus.subscribe_fn(MessageKind::ScaleUpdate, tag, move |_| {
            order.borrow_mut().push(tag);
            Ok(())
        });
    }
    bus.push(scale(1));

    assert_eq!(*order.borrow(), vec!["first", "second", "third"]);
}

#[test]
fn test_only_matching_kind_is_delivered() {
    let (mut bus, _clock) = make_bus(10);
    let seen = recorder();
    let sink = Rc::clone(&seen);
    bus.subscribe_fn(MessageKind::CombatStateChanged, "state", move |e| {
        sink.borrow_mut().push(e.sequence);
        Ok(())
    });

    bus.push(scale(1));
    let seq = bus.push(state(true));
    bus.push(scale(2));

    assert_eq!(*seen.borrow(), vec![seq]);
}

#[test]
fn test_filter_narrows_delivery() {
    let (mut bus, _clock) = make_bus(10);
    let seen = recorder();
    let sink = Rc::clone(&seen);
    let filter: EventFilter<BusMessage> = Box::new(|e| match &e.payload {
        BusMessage::ScaleUpdate(s) => s.dps_scale > 1.0,
        _ => false,
    });
    bus.subscribe(
        MessageKind::ScaleUpdate,
        "big",
        Box::new(FnSubscriber(move |e: &Event<BusMessage>| -> Result<(), SubscriberError> {
            sink.borrow_mut().push(e.sequence);
            Ok(())
        })),
        Some(filter),
    );

    bus.push(scale(1));
    let kept = bus.push(scale(5));

    assert_eq!(*seen.borrow(), vec![kept]);
}

#[test]
fn test_failing_subscriber_is_isolated() {
    let (mut bus, _clock) = make_bus(10);
    let seen = recorder();

    let bad = bus.subscribe_fn(MessageKind::ScaleUpdate, "always-fails", |e| {
        Err(SubscriberError::Rejected {
            kind: e.kind.to_string(),
            reason: "nope".into(),
        })
    });
    let sink = Rc::clone(&seen);
    bus.subscribe_fn(MessageKind::ScaleUpdate, "normal", move |e| {
        sink.borrow_mut().push(e.sequence);
        Ok(())
    });

    let seqs: Vec<u64> = (0..5).map(|n| bus.push(scale(n))).collect();

    assert_eq!(*seen.borrow(), seqs);
    assert_eq!(bus.subscription_faults(bad), Some(5));
    assert_eq!(bus.stats().subscriber_faults, 5);
}

#[test]
fn test_panicking_subscriber_is_isolated() {
    let (mut bus, _clock) = make_bus(10);
    let seen = recorder();

    bus.subscribe_fn(MessageKind::ScaleUpdate, "panics", |_| panic!("subscriber blew up"));
    let sink = Rc::clone(&seen);
    bus.subscribe_fn(MessageKind::ScaleUpdate, "normal", move |e| {
        sink.borrow_mut().push(e.sequence);
        Ok(())
    });

    bus.push(scale(1));
    bus.push(scale(2));

    assert_eq!(seen.borrow().len(), 2);
    assert_eq!(bus.stats().subscriber_faults, 2);
}

#[test]
fn test_unsubscribe_is_idempotent() {
    let (mut bus, _clock) = make_bus(10);
    let seen = recorder();
    let sink = Rc::clone(&seen);
    let id = bus.subscribe_fn(MessageKind::ScaleUpdate, "once", move |e| {
        sink.borrow_mut().push(e.sequence);
        Ok(())
    });

    bus.push(scale(1));
    assert!(bus.unsubscribe(id));
    assert!(!bus.unsubscribe(id));
    assert!(!bus.unsubscribe(SubscriptionId(9_999)));
    bus.push(scale(2));

    assert_eq!(seen.borrow().len(), 1);
    assert_eq!(bus.stats().subscriber_count, 0);
}

#[test]
fn test_inactive_subscription_skipped() {
    let (mut bus, _clock) = make_bus(10);
    let seen = recorder();
    let sink = Rc::clone(&seen);
    let id = bus.subscribe_fn(MessageKind::ScaleUpdate, "paused", move |e| {
        sink.borrow_mut().push(e.sequence);
        Ok(())
    });

    bus.set_active(id, false);
    bus.push(scale(1));
    bus.set_active(id, true);
    let seq = bus.push(scale(2));

    assert_eq!(*seen.borrow(), vec![seq]);
}

struct Relay;

impl Subscriber<BusMessage> for Relay {
    fn notify(
        &mut self,
        event: &Event<BusMessage>,
        outbox: &mut Outbox<BusMessage>,
    ) -> Result<(), SubscriberError> {
        if let BusMessage::CombatStateChanged(change) = &event.payload {
            outbox.push(BusMessage::ScaleUpdate(ScaleUpdate {
                dps_scale: if change.in_combat { 1.0 } else { 0.0 },
                hps_scale: 0.0,
                character: "relay".into(),
                timestamp: event.timestamp,
            }));
        }
        Ok(())
    }
}

#[test]
fn test_nested_push_is_sequential() {
    let (mut bus, _clock) = make_bus(10);
    let order = Rc::new(RefCell::new(Vec::new()));

    bus.subscribe(MessageKind::CombatStateChanged, "relay", Box::new(Relay), None);
    let sink = Rc::clone(&order);
    bus.subscribe_fn(MessageKind::CombatStateChanged, "state-log", move |e| {
        sink.borrow_mut().push((e.kind, e.sequence));
        Ok(())
    });
    let sink = Rc::clone(&order);
    bus.subscribe_fn(MessageKind::ScaleUpdate, "scale-log", move |e| {
        sink.borrow_mut().push((e.kind, e.sequence));
        Ok(())
    });

    let seq = bus.push(state(true));

    // Every subscriber of the outer event runs before the relayed message.
    assert_eq!(
        *order.borrow(),
        vec![
            (MessageKind::CombatStateChanged, seq),
            (MessageKind::ScaleUpdate, seq + 1),
        ]
    );
    assert_eq!(bus.len(), 2);
}

struct Echo;

impl Subscriber<BusMessage> for Echo {
    fn notify(
        &mut self,
        event: &Event<BusMessage>,
        outbox: &mut Outbox<BusMessage>,
    ) -> Result<(), SubscriberError> {
        outbox.push(event.payload.clone());
        Ok(())
    }
}

#[test]
fn test_feedback_loop_is_cut_off() {
    let (mut bus, _clock) = make_bus(100);
    bus.subscribe(MessageKind::ScaleUpdate, "echo", Box::new(Echo), None);

    bus.push(scale(1));

    let stats = bus.stats();
    assert_eq!(stats.total_pushed, 1 + MAX_NESTED_DEPTH as u64);
    assert_eq!(stats.nested_dropped, 1);
}

// ─────────────────────────────────────────────────────────────────────────────
// Reads
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_ttl_hides_stale_entries() {
    let clock = ManualClock::new(0.0);
    let mut bus: EventBus<BusMessage> =
        EventBus::new("ttl", &config(10, 5.0), Box::new(clock.clone()));

    bus.push(scale(1));
    clock.set(3.0);
    let fresh = bus.push(scale(2));
    clock.set(7.0);

    let live = bus.pull(Some(MessageKind::ScaleUpdate));
    assert_eq!(live.len(), 1);
    assert_eq!(live[0].sequence, fresh);
    assert_eq!(bus.history().len(), 1);
    // Still physically stored.
    assert_eq!(bus.len(), 2);

    clock.set(20.0);
    assert!(bus.pull(None).is_empty());
    assert!(bus.latest(MessageKind::ScaleUpdate).is_none());
}

#[test]
fn test_clear_keeps_subscriptions() {
    let (mut bus, _clock) = make_bus(10);
    let seen = recorder();
    let sink = Rc::clone(&seen);
    bus.subscribe_fn(MessageKind::ScaleUpdate, "keep", move |e| {
        sink.borrow_mut().push(e.sequence);
        Ok(())
    });

    bus.push(scale(1));
    bus.clear();
    assert!(bus.is_empty());
    bus.push(scale(2));

    assert_eq!(seen.borrow().len(), 2);
    assert_eq!(bus.stats().total_pushed, 2);
}
