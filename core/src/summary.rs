//! Per-source totals for a finished session.

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

use crate::detector::Session;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceTotals {
    pub name: String,
    pub damage: f64,
    pub healing: f64,
    /// Part of `damage` dealt by this source's pets and guardians.
    pub pet_damage: f64,
    pub hits: u32,
    pub crits: u32,
    pub dps: f64,
    pub hps: f64,
}

impl SourceTotals {
    pub fn crit_rate(&self) -> f64 {
        if self.hits == 0 {
            0.0
        } else {
            self.crits as f64 / self.hits as f64
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub hash: String,
    pub zone: String,
    pub player: String,
    pub duration: f64,
    pub event_count: usize,
    pub segment_count: usize,
    pub total_damage: f64,
    pub total_healing: f64,
    /// Sorted by damage, highest first.
    pub sources: Vec<SourceTotals>,
}

impl SessionSummary {
    /// Fold every accepted amount into its source. Pet output is credited to
    /// the owner when the session resolved one.
    pub fn from_session(session: &Session) -> Self {
        let mut by_source: HashMap<String, SourceTotals> = HashMap::new();

        for event in &session.events {
            let Some(amount) = event.amount else {
                continue;
            };
            let pet_owner = session
                .pets
                .get(&event.source.guid)
                .and_then(|pet| pet.owner_name.clone());
            let is_pet = pet_owner.is_some();
            let name = match pet_owner {
                Some(owner) => owner,
                None => session
                    .guid_map
                    .get(&event.source.guid)
                    .cloned()
                    .unwrap_or_else(|| event.source.name.clone()),
            };

            let entry = by_source.entry(name.clone()).or_insert_with(|| SourceTotals {
                name,
                ..Default::default()
            });
            if event.kind.is_damage() {
                entry.damage += amount;
                if is_pet {
                    entry.pet_damage += amount;
                }
            } else if event.kind.is_heal() {
                entry.healing += amount;
            } else {
                continue;
            }
            entry.hits += 1;
            if event.critical {
                entry.crits += 1;
            }
        }

        let duration = session.duration_seconds;
        let mut sources: Vec<SourceTotals> = by_source.into_values().collect();
        for source in &mut sources {
            if duration > 0.0 {
                source.dps = source.damage / duration;
                source.hps = source.healing / duration;
            }
        }
        sources.sort_by(|a, b| b.damage.total_cmp(&a.damage).then_with(|| a.name.cmp(&b.name)));

        Self {
            session_id: session.id.clone(),
            hash: session.hash.clone(),
            zone: session.zone.clone(),
            player: session.player.clone(),
            duration,
            event_count: session.event_count,
            segment_count: session.segments.len(),
            total_damage: sources.iter().map(|s| s.damage).sum(),
            total_healing: sources.iter().map(|s| s.healing).sum(),
            sources,
        }
    }

    pub fn source(&self, name: &str) -> Option<&SourceTotals> {
        self.sources.iter().find(|s| s.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::combat_log::{CombatEvent, EventKind, Unit, UnitFlags};
    use crate::detector::{DetectionSource, GroupContext, PetKind, PetOwnershipEntry};

    fn unit(guid: &str, name: &str) -> Unit {
        Unit {
            guid: guid.into(),
            name: name.into(),
            flags: UnitFlags::NONE,
        }
    }

    fn event(kind: &str, source: Unit, amount: f64, critical: bool) -> CombatEvent {
        CombatEvent {
            raw_timestamp: 0.0,
            time: 0.0,
            kind: EventKind::parse(kind),
            kind_name: kind.into(),
            source,
            dest: unit("Creature-1", "Boar"),
            spell: None,
            amount: Some(amount),
            overheal: 0.0,
            critical,
        }
    }

    fn session() -> Session {
        let mut s = Session::new(0.0, "Ayla".into(), "Deadmines".into(), GroupContext::solo(), Vec::new());
        s.pets.insert(
            "Pet-7".into(),
            PetOwnershipEntry {
                guid: "Pet-7".into(),
                name: "Wolf".into(),
                owner_name: Some("Ayla".into()),
                detected_at: 0.0,
                kind: PetKind::Pet,
                source: DetectionSource::NameTag,
            },
        );
        s.events = vec![
            event("SPELL_DAMAGE", unit("Player-1", "Ayla"), 300.0, true),
            event("SWING_DAMAGE", unit("Pet-7", "Wolf"), 100.0, false),
            event("SPELL_HEAL", unit("Player-2", "Brom"), 250.0, false),
            event("SPELL_DAMAGE", unit("Player-2", "Brom"), 50.0, false),
        ];
        s.event_count = s.events.len();
        s.end(10.0);
        s
    }

    #[test]
    fn test_pet_damage_credited_to_owner() {
        let summary = SessionSummary::from_session(&session());

        let ayla = summary.source("Ayla").unwrap();
        assert_eq!(ayla.damage, 400.0);
        assert_eq!(ayla.pet_damage, 100.0);
        assert_eq!(ayla.dps, 40.0);
        assert!(summary.source("Wolf").is_none());
    }

    #[test]
    fn test_totals_and_ordering() {
        let summary = SessionSummary::from_session(&session());

        assert_eq!(summary.total_damage, 450.0);
        assert_eq!(summary.total_healing, 250.0);
        assert_eq!(summary.sources[0].name, "Ayla");
        let brom = summary.source("Brom").unwrap();
        assert_eq!(brom.hps, 25.0);
        assert_eq!(brom.hits, 2);
    }

    #[test]
    fn test_crit_rate() {
        let summary = SessionSummary::from_session(&session());
        assert_eq!(summary.source("Ayla").unwrap().crit_rate(), 0.5);
    }

    #[test]
    fn test_zero_duration_has_no_rates() {
        let mut s = session();
        s.end(0.0);
        let summary = SessionSummary::from_session(&s);
        assert_eq!(summary.source("Ayla").unwrap().dps, 0.0);
    }
}
