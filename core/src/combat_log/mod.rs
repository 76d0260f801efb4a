//! Raw telemetry tuples from the host and their validated form.
//!
//! The host hands over loosely typed tuples (`RawEvent`). Before anything in
//! the detector looks at one it is parsed into a [`CombatEvent`]; malformed
//! tuples are rejected with a [`RawEventError`] and never reach a session.

mod flags;
mod kinds;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use flags::UnitFlags;
pub use kinds::{
    EventKind, IGNORED_ENTITY_PATTERNS, OWNER_BOUND_PATTERNS, PASSIVE_PERIODIC_PATTERNS,
    is_ignored_entity, is_noise_kind, is_owner_bound_name, is_passive_periodic,
};

/// One kind-specific argument as delivered by the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawArg {
    Number(f64),
    Flag(bool),
    Text(String),
    Nil,
}

impl RawArg {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            RawArg::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            RawArg::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Flags arrive as booleans or as 0/1 depending on the host.
    pub fn as_flag(&self) -> bool {
        match self {
            RawArg::Flag(b) => *b,
            RawArg::Number(n) => *n != 0.0,
            _ => false,
        }
    }
}

/// Unfiltered telemetry tuple:
/// `(timestamp, kind, source id/name/flags, dest id/name/flags, ...args)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawEvent {
    pub timestamp: f64,
    pub kind: String,
    #[serde(default)]
    pub source_id: Option<String>,
    #[serde(default)]
    pub source_name: Option<String>,
    #[serde(default)]
    pub source_flags: UnitFlags,
    #[serde(default)]
    pub dest_id: Option<String>,
    #[serde(default)]
    pub dest_name: Option<String>,
    #[serde(default)]
    pub dest_flags: UnitFlags,
    #[serde(default)]
    pub args: Vec<RawArg>,
}

/// One side of an event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Unit {
    /// Empty when the host sent no id (environment, nil units).
    pub guid: String,
    pub name: String,
    pub flags: UnitFlags,
}

impl Unit {
    pub fn is_known(&self) -> bool {
        !self.guid.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Spell {
    pub id: u32,
    pub name: String,
}

/// Validated event as stored in sessions and segments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombatEvent {
    /// Timestamp as the host sent it (either clock domain).
    pub raw_timestamp: f64,
    /// Seconds since the session started; filled in on acceptance.
    pub time: f64,
    pub kind: EventKind,
    pub kind_name: String,
    pub source: Unit,
    pub dest: Unit,
    pub spell: Option<Spell>,
    /// Damage dealt or effective healing (overhealing removed).
    pub amount: Option<f64>,
    pub overheal: f64,
    pub critical: bool,
}

impl CombatEvent {
    pub fn spell_name(&self) -> Option<&str> {
        self.spell.as_ref().map(|s| s.name.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RawEventError {
    #[error("{kind}: missing unit GUID ({side})")]
    MissingGuid { kind: String, side: &'static str },
    #[error("{kind}: missing amount argument at index {index}")]
    MissingAmount { kind: String, index: usize },
    #[error("{kind}: non-numeric amount argument at index {index}")]
    NonNumericAmount { kind: String, index: usize },
    #[error("{kind}: amount {amount} outside 0..={max}")]
    AmountOutOfRange { kind: String, amount: f64, max: f64 },
    #[error("non-finite timestamp {0}")]
    BadTimestamp(f64),
}

fn unit(id: &Option<String>, name: &Option<String>, flags: UnitFlags) -> Unit {
    Unit {
        guid: id.as_deref().map(str::trim).unwrap_or_default().to_string(),
        name: name.clone().unwrap_or_default(),
        flags,
    }
}

fn number_at(raw: &RawEvent, index: usize) -> Result<f64, RawEventError> {
    match raw.args.get(index) {
        None | Some(RawArg::Nil) => Err(RawEventError::MissingAmount {
            kind: raw.kind.clone(),
            index,
        }),
        Some(arg) => arg.as_number().ok_or_else(|| RawEventError::NonNumericAmount {
            kind: raw.kind.clone(),
            index,
        }),
    }
}

fn checked_amount(raw: &RawEvent, value: f64, max_amount: f64) -> Result<f64, RawEventError> {
    if !value.is_finite() || value < 0.0 || value > max_amount {
        return Err(RawEventError::AmountOutOfRange {
            kind: raw.kind.clone(),
            amount: value,
            max: max_amount,
        });
    }
    Ok(value)
}

impl RawEvent {
    /// Parse and validate into a [`CombatEvent`].
    ///
    /// Argument layout follows the usual prefix/suffix scheme: spell-prefixed
    /// kinds start with `spellId, spellName, school`; swing kinds have no
    /// prefix. Damage suffix is `amount, overkill, school, resisted, blocked,
    /// absorbed, critical`; heal suffix is `amount, overhealing, absorbed,
    /// critical`.
    pub fn parse(&self, max_amount: f64) -> Result<CombatEvent, RawEventError> {
        if !self.timestamp.is_finite() {
            return Err(RawEventError::BadTimestamp(self.timestamp));
        }
        let kind = EventKind::parse(&self.kind);
        let source = unit(&self.source_id, &self.source_name, self.source_flags);
        let dest = unit(&self.dest_id, &self.dest_name, self.dest_flags);

        if !source.is_known() && !dest.is_known() {
            return Err(RawEventError::MissingGuid {
                kind: self.kind.clone(),
                side: "source and dest",
            });
        }
        if kind.carries_amount() && !source.is_known() {
            return Err(RawEventError::MissingGuid {
                kind: self.kind.clone(),
                side: "source",
            });
        }

        let prefix = if kind.is_swing() || kind == EventKind::UnitDied {
            0
        } else {
            3
        };
        let spell = if prefix == 3 {
            self.args
                .first()
                .and_then(RawArg::as_number)
                .filter(|id| id.is_finite() && *id >= 0.0 && *id <= u32::MAX as f64)
                .map(|id| Spell {
                    id: id as u32,
                    name: self
                        .args
                        .get(1)
                        .and_then(RawArg::as_text)
                        .unwrap_or_default()
                        .to_string(),
                })
        } else {
            None
        };

        let mut amount = None;
        let mut overheal = 0.0;
        let mut critical = false;
        if kind.is_damage() {
            let value = checked_amount(self, number_at(self, prefix)?, max_amount)?;
            amount = Some(value);
            critical = self.args.get(prefix + 6).is_some_and(RawArg::as_flag);
        } else if kind.is_heal() {
            let value = checked_amount(self, number_at(self, prefix)?, max_amount)?;
            overheal = self
                .args
                .get(prefix + 1)
                .and_then(RawArg::as_number)
                .filter(|o| o.is_finite() && *o >= 0.0)
                .unwrap_or(0.0)
                .min(value);
            amount = Some(value - overheal);
            critical = self.args.get(prefix + 3).is_some_and(RawArg::as_flag);
        }

        Ok(CombatEvent {
            raw_timestamp: self.timestamp,
            time: 0.0,
            kind,
            kind_name: self.kind.clone(),
            source,
            dest,
            spell,
            amount,
            overheal,
            critical,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAX: f64 = 1_000_000.0;

    fn raw(kind: &str, args: Vec<RawArg>) -> RawEvent {
        RawEvent {
            timestamp: 10.0,
            kind: kind.to_string(),
            source_id: Some("Player-1".into()),
            source_name: Some("Ayla".into()),
            source_flags: UnitFlags(UnitFlags::AFFILIATION_MINE | UnitFlags::TYPE_PLAYER),
            dest_id: Some("Creature-9".into()),
            dest_name: Some("Boar".into()),
            dest_flags: UnitFlags(UnitFlags::TYPE_NPC | UnitFlags::REACTION_HOSTILE),
            args,
        }
    }

    fn n(v: f64) -> RawArg {
        RawArg::Number(v)
    }

    fn t(s: &str) -> RawArg {
        RawArg::Text(s.to_string())
    }

    #[test]
    fn test_parse_spell_damage() {
        let ev = raw(
            "SPELL_DAMAGE",
            vec![n(133.0), t("Fireball"), n(4.0), n(1500.0), n(0.0), n(4.0), n(0.0), n(0.0), n(0.0), RawArg::Flag(true)],
        )
        .parse(MAX)
        .unwrap();

        assert_eq!(ev.kind, EventKind::SpellDamage);
        assert_eq!(ev.amount, Some(1500.0));
        assert!(ev.critical);
        assert_eq!(ev.spell, Some(Spell { id: 133, name: "Fireball".into() }));
    }

    #[test]
    fn test_parse_swing_damage_has_no_spell() {
        let ev = raw("SWING_DAMAGE", vec![n(250.0)]).parse(MAX).unwrap();
        assert_eq!(ev.amount, Some(250.0));
        assert_eq!(ev.spell, None);
        assert!(!ev.critical);
    }

    #[test]
    fn test_heal_amount_excludes_overheal() {
        let ev = raw(
            "SPELL_HEAL",
            vec![n(2061.0), t("Flash Heal"), n(2.0), n(1000.0), n(300.0), n(0.0), n(1.0)],
        )
        .parse(MAX)
        .unwrap();
        assert_eq!(ev.amount, Some(700.0));
        assert_eq!(ev.overheal, 300.0);
        assert!(ev.critical);
    }

    #[test]
    fn test_rejects_missing_guid() {
        let mut r = raw("SPELL_DAMAGE", vec![n(1.0), t("x"), n(1.0), n(5.0)]);
        r.source_id = None;
        assert!(matches!(r.parse(MAX), Err(RawEventError::MissingGuid { side: "source", .. })));

        let mut r = raw("SPELL_AURA_APPLIED", vec![]);
        r.source_id = Some("   ".into());
        r.dest_id = None;
        assert!(matches!(r.parse(MAX), Err(RawEventError::MissingGuid { .. })));
    }

    #[test]
    fn test_rejects_non_numeric_amount() {
        let r = raw("SPELL_DAMAGE", vec![n(1.0), t("x"), n(1.0), t("lots")]);
        assert!(matches!(r.parse(MAX), Err(RawEventError::NonNumericAmount { index: 3, .. })));

        let r = raw("SWING_DAMAGE", vec![]);
        assert!(matches!(r.parse(MAX), Err(RawEventError::MissingAmount { index: 0, .. })));
    }

    #[test]
    fn test_rejects_out_of_range_amount() {
        let r = raw("SWING_DAMAGE", vec![n(-5.0)]);
        assert!(matches!(r.parse(MAX), Err(RawEventError::AmountOutOfRange { .. })));

        let r = raw("SWING_DAMAGE", vec![n(MAX * 10.0)]);
        assert!(matches!(r.parse(MAX), Err(RawEventError::AmountOutOfRange { .. })));
    }

    #[test]
    fn test_non_amount_kinds_need_only_one_guid() {
        let mut r = raw("UNIT_DIED", vec![]);
        r.source_id = None;
        let ev = r.parse(MAX).unwrap();
        assert_eq!(ev.kind, EventKind::UnitDied);
        assert_eq!(ev.amount, None);
    }

    #[test]
    fn test_deserialize_from_json() {
        let json = r#"{
            "timestamp": 1700000000.25,
            "kind": "SPELL_PERIODIC_HEAL",
            "source_id": "Player-1",
            "source_name": "Ayla",
            "source_flags": 1297,
            "dest_id": "Player-1",
            "args": [774, "Rejuvenation", 8, 420, 0, 0, false]
        }"#;
        let r: RawEvent = serde_json::from_str(json).unwrap();
        assert_eq!(r.args[1], RawArg::Text("Rejuvenation".into()));
        assert_eq!(r.args[6], RawArg::Flag(false));
        assert!(r.dest_name.is_none());

        let ev = r.parse(MAX).unwrap();
        assert_eq!(ev.amount, Some(420.0));
        assert_eq!(ev.spell_name(), Some("Rejuvenation"));
    }
}
