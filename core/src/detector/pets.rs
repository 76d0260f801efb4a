//! Pet and guardian ownership detection.
//!
//! Classification is best effort. Hosts rarely say outright who owns a
//! summoned unit, so the layered classifier tries progressively weaker
//! signals until one matches:
//!
//! 1. an `<Owner>` tag embedded in the unit name
//! 2. the guid cache of earlier positive matches
//! 3. affiliation flags: "mine" plus the pet or guardian type bit
//! 4. the host's pet roster, rescanned at most every `roster_scan_interval`
//! 5. known owner-bound summon names on friendly or grouped units
//!
//! False positives and negatives are expected. The trait lets hosts swap in
//! a better strategy when they have one.

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};
use skirmish_types::DetectorConfig;

use super::host::{HostContext, PlayerIdentity};
use super::roster::RosterCache;
use crate::combat_log::{Unit, is_owner_bound_name};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PetKind {
    Pet,
    Guardian,
}

/// Which layer produced an ownership entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DetectionSource {
    NameTag,
    Flags,
    Roster,
    Summon,
    Heuristic,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PetOwnershipEntry {
    pub guid: String,
    pub name: String,
    /// None when the unit is clearly owner-bound but the owner is unknown.
    pub owner_name: Option<String>,
    /// Local clock time of detection.
    pub detected_at: f64,
    pub kind: PetKind,
    pub source: DetectionSource,
}

/// Everything a classifier may consult for one lookup.
pub struct ClassifyContext<'a> {
    pub now: f64,
    pub player: &'a PlayerIdentity,
    pub roster: &'a mut RosterCache,
    pub host: &'a dyn HostContext,
}

pub trait PetClassifier {
    /// Resolve `unit` to an ownership entry, if it is a pet or guardian.
    fn classify(&mut self, unit: &Unit, ctx: &mut ClassifyContext<'_>) -> Option<PetOwnershipEntry>;

    /// Record an explicit summon reported by the host.
    fn register_summon(&mut self, owner: &Unit, summoned: &Unit, now: f64);

    /// Forget every cached entry.
    fn reset(&mut self);

    fn cached(&self) -> usize;
}

#[derive(Debug)]
pub struct LayeredPetClassifier {
    cache: HashMap<String, PetOwnershipEntry>,
    ceiling: usize,
    roster_scan_interval: f64,
    evictions: u64,
}

impl LayeredPetClassifier {
    pub fn new(config: &DetectorConfig) -> Self {
        Self {
            cache: HashMap::new(),
            ceiling: config.pet_cache_ceiling.max(1),
            roster_scan_interval: config.roster_scan_interval,
            evictions: 0,
        }
    }

    /// Times the cache was cleared for exceeding its ceiling.
    pub fn evictions(&self) -> u64 {
        self.evictions
    }

    fn remember(&mut self, entry: PetOwnershipEntry) -> PetOwnershipEntry {
        if self.cache.len() >= self.ceiling && !self.cache.contains_key(&entry.guid) {
            tracing::debug!(
                "[PETS] cache reached {} entries, clearing",
                self.cache.len()
            );
            self.cache.clear();
            self.evictions += 1;
        }
        tracing::trace!(
            "[PETS] {} ({}) -> {:?} via {:?}",
            entry.name,
            entry.guid,
            entry.owner_name,
            entry.source
        );
        self.cache.insert(entry.guid.clone(), entry.clone());
        entry
    }
}

fn kind_of(unit: &Unit) -> PetKind {
    if unit.flags.is_guardian() {
        PetKind::Guardian
    } else {
        PetKind::Pet
    }
}

/// Extract `Owner` from names like `Spirit Wolf <Owner>`.
pub fn owner_from_name(name: &str) -> Option<&str> {
    let open = name.rfind('<')?;
    let close = name[open..].find('>')? + open;
    let owner = name[open + 1..close].trim();
    (!owner.is_empty()).then_some(owner)
}

impl PetClassifier for LayeredPetClassifier {
    fn classify(&mut self, unit: &Unit, ctx: &mut ClassifyContext<'_>) -> Option<PetOwnershipEntry> {
        if !unit.is_known() || unit.flags.is_player() || unit.guid == ctx.player.guid {
            return None;
        }

        let now = ctx.now;
        let entry = |owner_name: Option<String>, kind: PetKind, source: DetectionSource| {
            PetOwnershipEntry {
                guid: unit.guid.clone(),
                name: unit.name.clone(),
                owner_name,
                detected_at: now,
                kind,
                source,
            }
        };

        if let Some(owner) = owner_from_name(&unit.name) {
            let found = entry(Some(owner.to_string()), kind_of(unit), DetectionSource::NameTag);
            return Some(self.remember(found));
        }

        if let Some(hit) = self.cache.get(&unit.guid) {
            return Some(hit.clone());
        }

        if unit.flags.is_mine() && unit.flags.is_companion() {
            let found = entry(Some(ctx.player.name.clone()), kind_of(unit), DetectionSource::Flags);
            return Some(self.remember(found));
        }

        let mut owner = ctx.roster.pet_owner(&unit.guid).map(str::to_string);
        if owner.is_none()
            && unit.flags.is_companion()
            && ctx.roster.rebuild_if_due(ctx.host, ctx.now, self.roster_scan_interval)
        {
            owner = ctx.roster.pet_owner(&unit.guid).map(str::to_string);
        }
        if let Some(owner) = owner {
            let found = entry(Some(owner), kind_of(unit), DetectionSource::Roster);
            return Some(self.remember(found));
        }

        if is_owner_bound_name(&unit.name) && (unit.flags.is_grouped() || unit.flags.is_friendly()) {
            let owner = unit.flags.is_mine().then(|| ctx.player.name.clone());
            let found = entry(owner, PetKind::Guardian, DetectionSource::Heuristic);
            return Some(self.remember(found));
        }

        None
    }

    fn register_summon(&mut self, owner: &Unit, summoned: &Unit, now: f64) {
        if !summoned.is_known() {
            return;
        }
        let found = PetOwnershipEntry {
            guid: summoned.guid.clone(),
            name: summoned.name.clone(),
            owner_name: Some(owner.name.clone()).filter(|n| !n.is_empty()),
            detected_at: now,
            kind: if summoned.flags.is_pet() {
                PetKind::Pet
            } else {
                PetKind::Guardian
            },
            source: DetectionSource::Summon,
        };
        self.remember(found);
    }

    fn reset(&mut self) {
        self.cache.clear();
    }

    fn cached(&self) -> usize {
        self.cache.len()
    }
}
