use thiserror::Error;

use super::{Event, Topic};

/// Failure reported by a subscriber. The bus logs it and moves on.
#[derive(Debug, Error)]
pub enum SubscriberError {
    #[error("subscriber rejected {kind} message: {reason}")]
    Rejected { kind: String, reason: String },
    #[error("subscriber state unavailable: {0}")]
    Unavailable(String),
    #[error("subscriber panicked: {0}")]
    Panicked(String),
}

/// Receiver side of a subscription.
pub trait Subscriber<M: Topic> {
    /// Handle one delivered event. Messages pushed into `outbox` are
    /// published on the same bus right after the current dispatch finishes.
    fn notify(&mut self, event: &Event<M>, outbox: &mut Outbox<M>) -> Result<(), SubscriberError>;
}

/// Adapter so plain closures can subscribe.
pub struct FnSubscriber<F>(pub F);

impl<M, F> Subscriber<M> for FnSubscriber<F>
where
    M: Topic,
    F: FnMut(&Event<M>) -> Result<(), SubscriberError>,
{
    fn notify(&mut self, event: &Event<M>, _outbox: &mut Outbox<M>) -> Result<(), SubscriberError> {
        (self.0)(event)
    }
}

/// Messages a subscriber wants published after the current dispatch.
pub struct Outbox<M> {
    queued: Vec<M>,
}

impl<M> Outbox<M> {
    pub(crate) fn new() -> Self {
        Self { queued: Vec::new() }
    }

    pub fn push(&mut self, message: M) {
        self.queued.push(message);
    }

    pub fn len(&self) -> usize {
        self.queued.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queued.is_empty()
    }

    pub(crate) fn into_messages(self) -> Vec<M> {
        self.queued
    }
}

/// Best-effort text from a caught panic payload.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
