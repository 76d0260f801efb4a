//! Typed payloads carried by the combat event bus.
//!
//! Each message kind has its own struct so consumers match exhaustively on
//! [`BusMessage`] instead of probing loose fields.

use serde::{Deserialize, Serialize};

use crate::combat_log::{RawEvent, UnitFlags};

use super::Topic;

/// Discriminant used for subscription routing and per-kind counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageKind {
    CombatStateChanged,
    DamageEvent,
    HealEvent,
    RawCombatEvent,
    ScaleUpdate,
}

impl MessageKind {
    pub const ALL: [MessageKind; 5] = [
        MessageKind::CombatStateChanged,
        MessageKind::DamageEvent,
        MessageKind::HealEvent,
        MessageKind::RawCombatEvent,
        MessageKind::ScaleUpdate,
    ];

    /// Wire name, e.g. `DAMAGE_EVENT`.
    pub fn as_str(self) -> &'static str {
        match self {
            MessageKind::CombatStateChanged => "COMBAT_STATE_CHANGED",
            MessageKind::DamageEvent => "DAMAGE_EVENT",
            MessageKind::HealEvent => "HEAL_EVENT",
            MessageKind::RawCombatEvent => "RAW_COMBAT_EVENT",
            MessageKind::ScaleUpdate => "SCALE_UPDATE",
        }
    }
}

impl std::fmt::Display for MessageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Session boundary transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombatStateChanged {
    pub in_combat: bool,
    /// Local clock time the session started at.
    pub start_time: f64,
    pub session_id: String,
    /// Final session duration, set when `in_combat` is false.
    #[serde(default)]
    pub duration: Option<f64>,
}

/// Accepted damage or healing fact. Both message kinds share one shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AmountFact {
    pub amount: f64,
    pub source: String,
    pub source_name: String,
    pub target: String,
    pub source_flags: UnitFlags,
    /// Seconds since the session started.
    pub timestamp: f64,
    pub spell_id: Option<u32>,
    pub spell_name: Option<String>,
    /// Source was resolved as a pet or guardian of a tracked unit.
    #[serde(default)]
    pub from_pet: bool,
    /// Resolved owner name when `from_pet` is set.
    #[serde(default)]
    pub owner_name: Option<String>,
    #[serde(default)]
    pub critical: bool,
    #[serde(default)]
    pub periodic: bool,
}

/// Display-scale hint published by an external scaling collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScaleUpdate {
    pub dps_scale: f64,
    pub hps_scale: f64,
    pub character: String,
    pub timestamp: f64,
}

/// Everything the combat pipeline publishes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BusMessage {
    CombatStateChanged(CombatStateChanged),
    DamageEvent(AmountFact),
    HealEvent(AmountFact),
    /// Full tuple of an accepted raw event, for diagnostics.
    RawCombatEvent(RawEvent),
    ScaleUpdate(ScaleUpdate),
}

impl BusMessage {
    /// Amount fact carried by damage and heal messages.
    pub fn amount_fact(&self) -> Option<&AmountFact> {
        match self {
            BusMessage::DamageEvent(fact) | BusMessage::HealEvent(fact) => Some(fact),
            _ => None,
        }
    }
}

impl Topic for BusMessage {
    type Kind = MessageKind;

    fn kind(&self) -> MessageKind {
        match self {
            BusMessage::CombatStateChanged(_) => MessageKind::CombatStateChanged,
            BusMessage::DamageEvent(_) => MessageKind::DamageEvent,
            BusMessage::HealEvent(_) => MessageKind::HealEvent,
            BusMessage::RawCombatEvent(_) => MessageKind::RawCombatEvent,
            BusMessage::ScaleUpdate(_) => MessageKind::ScaleUpdate,
        }
    }
}
