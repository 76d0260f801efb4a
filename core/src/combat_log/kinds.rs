//! Event kind tables and name pattern lists.
//!
//! Lookups on the hot path use compile-time `phf` tables; pattern lists are
//! short and matched as lowercase substrings.

use phf::{phf_map, phf_set};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    SwingDamage,
    SpellDamage,
    SpellPeriodicDamage,
    RangeDamage,
    DamageShield,
    DamageSplit,
    SpellHeal,
    SpellPeriodicHeal,
    SwingMissed,
    SpellMissed,
    SpellPeriodicMissed,
    RangeMissed,
    SpellInterrupt,
    SpellDispel,
    SpellStolen,
    UnitDied,
    SpellSummon,
    SpellCastSuccess,
    SpellAuraApplied,
    SpellAuraRemoved,
    SpellAbsorbed,
    SpellInstakill,
    /// Anything not worth a dedicated variant. Still recorded if relevant.
    Other,
}

static KIND_BY_NAME: phf::Map<&'static str, EventKind> = phf_map! {
    "SWING_DAMAGE" => EventKind::SwingDamage,
    "SWING_DAMAGE_LANDED" => EventKind::SwingDamage,
    "SPELL_DAMAGE" => EventKind::SpellDamage,
    "SPELL_PERIODIC_DAMAGE" => EventKind::SpellPeriodicDamage,
    "RANGE_DAMAGE" => EventKind::RangeDamage,
    "DAMAGE_SHIELD" => EventKind::DamageShield,
    "DAMAGE_SPLIT" => EventKind::DamageSplit,
    "SPELL_HEAL" => EventKind::SpellHeal,
    "SPELL_PERIODIC_HEAL" => EventKind::SpellPeriodicHeal,
    "SWING_MISSED" => EventKind::SwingMissed,
    "SPELL_MISSED" => EventKind::SpellMissed,
    "SPELL_PERIODIC_MISSED" => EventKind::SpellPeriodicMissed,
    "RANGE_MISSED" => EventKind::RangeMissed,
    "DAMAGE_SHIELD_MISSED" => EventKind::SpellMissed,
    "SPELL_INTERRUPT" => EventKind::SpellInterrupt,
    "SPELL_DISPEL" => EventKind::SpellDispel,
    "SPELL_STOLEN" => EventKind::SpellStolen,
    "UNIT_DIED" => EventKind::UnitDied,
    "SPELL_SUMMON" => EventKind::SpellSummon,
    "SPELL_CAST_SUCCESS" => EventKind::SpellCastSuccess,
    "SPELL_AURA_APPLIED" => EventKind::SpellAuraApplied,
    "SPELL_AURA_REMOVED" => EventKind::SpellAuraRemoved,
    "SPELL_ABSORBED" => EventKind::SpellAbsorbed,
    "SPELL_INSTAKILL" => EventKind::SpellInstakill,
};

/// Kinds that never carry useful combat signal. Checked against the raw
/// kind string before any other work is done.
static NOISE_KINDS: phf::Set<&'static str> = phf_set! {
    "ENCHANT_APPLIED",
    "ENCHANT_REMOVED",
    "SPELL_CAST_START",
    "SPELL_CAST_FAILED",
    "ENVIRONMENTAL_DAMAGE",
    "SPELL_AURA_APPLIED_DOSE",
    "SPELL_AURA_REMOVED_DOSE",
    "SPELL_AURA_REFRESH",
    "SPELL_AURA_BROKEN",
    "SPELL_AURA_BROKEN_SPELL",
    "SPELL_ENERGIZE",
    "SPELL_PERIODIC_ENERGIZE",
    "SPELL_DRAIN",
    "SPELL_PERIODIC_DRAIN",
    "SPELL_LEECH",
    "SPELL_PERIODIC_LEECH",
    "SPELL_EXTRA_ATTACKS",
    "SPELL_CREATE",
    "SPELL_RESURRECT",
    "SPELL_DURABILITY_DAMAGE",
    "SPELL_DURABILITY_DAMAGE_ALL",
    "SPELL_EMPOWER_START",
    "SPELL_EMPOWER_INTERRUPT",
    "PARTY_KILL",
    "UNIT_DESTROYED",
    "UNIT_DISSIPATES",
    "COMBATANT_INFO",
    "EMOTE",
};

/// Quick-exit check on the raw kind string.
#[inline]
pub fn is_noise_kind(kind: &str) -> bool {
    NOISE_KINDS.contains(kind)
}

impl EventKind {
    pub fn parse(kind: &str) -> EventKind {
        KIND_BY_NAME.get(kind).copied().unwrap_or(EventKind::Other)
    }

    pub fn is_damage(self) -> bool {
        matches!(
            self,
            EventKind::SwingDamage
                | EventKind::SpellDamage
                | EventKind::SpellPeriodicDamage
                | EventKind::RangeDamage
                | EventKind::DamageShield
                | EventKind::DamageSplit
        )
    }

    pub fn is_heal(self) -> bool {
        matches!(self, EventKind::SpellHeal | EventKind::SpellPeriodicHeal)
    }

    /// Kinds whose payload carries an amount that must be validated.
    pub fn carries_amount(self) -> bool {
        self.is_damage() || self.is_heal()
    }

    pub fn is_periodic(self) -> bool {
        matches!(
            self,
            EventKind::SpellPeriodicDamage
                | EventKind::SpellPeriodicHeal
                | EventKind::SpellPeriodicMissed
        )
    }

    pub fn is_miss(self) -> bool {
        matches!(
            self,
            EventKind::SwingMissed
                | EventKind::SpellMissed
                | EventKind::SpellPeriodicMissed
                | EventKind::RangeMissed
        )
    }

    /// Swing events have no spell prefix in their argument list.
    pub fn is_swing(self) -> bool {
        matches!(self, EventKind::SwingDamage | EventKind::SwingMissed)
    }

    /// Kinds that can count as combat activity, before the periodic
    /// name check.
    pub fn is_activity_candidate(self) -> bool {
        self.is_damage()
            || self.is_heal()
            || self.is_miss()
            || matches!(
                self,
                EventKind::SpellInterrupt
                    | EventKind::SpellDispel
                    | EventKind::SpellStolen
                    | EventKind::UnitDied
                    | EventKind::SpellInstakill
            )
    }
}

/// Periodic effects that tick on their own. Their ticks do not keep a
/// session alive.
pub const PASSIVE_PERIODIC_PATTERNS: &[&str] = &[
    // heal over time
    "renew",
    "rejuvenation",
    "regrowth",
    "lifebloom",
    "wild growth",
    "riptide",
    "earth shield",
    "atonement",
    "echo",
    "spring blossoms",
    "cenarion ward",
    "enveloping mist",
    "renewing mist",
    "soothing mist",
    "glimmer of light",
    "beacon of",
    "leech",
    // damage over time
    "corruption",
    "agony",
    "unstable affliction",
    "siphon life",
    "immolate",
    "shadow word: pain",
    "vampiric touch",
    "devouring plague",
    "moonfire",
    "sunfire",
    "stellar flare",
    "rip",
    "rake",
    "rupture",
    "garrote",
    "serpent sting",
    "flame shock",
    "blood plague",
    "frost fever",
    "virulent plague",
    "deep wounds",
    "rend",
    "ignite",
    "living bomb",
    // buffs and auras
    "power word: shield",
    "prayer of mending",
    "blessing of",
    "aura",
];

/// Entities that never count as relevant, even with grouped flags.
pub const IGNORED_ENTITY_PATTERNS: &[&str] = &[
    "totem",
    "mirror image",
    "ward",
    "explosives",
    "spirit link",
    "image of",
    "barrier",
    "banner",
];

/// Owner-bound summons recognised by name when their flags lack the pet or
/// guardian bits.
pub const OWNER_BOUND_PATTERNS: &[&str] = &[
    "army of the dead",
    "risen ghoul",
    "ebon gargoyle",
    "gargoyle",
    "shadowfiend",
    "mindbender",
    "spirit wolf",
    "feral spirit",
    "treant",
    "water elemental",
    "earth elemental",
    "fire elemental",
    "storm elemental",
    "infernal",
    "doomguard",
    "dreadstalker",
    "wild imp",
    "felguard",
    "xuen",
    "niuzao",
    "chi-ji",
    "yu'lon",
    "spirit beast",
    "hati",
    "dire beast",
];

fn matches_any(name: &str, patterns: &[&str]) -> bool {
    if name.is_empty() {
        return false;
    }
    let lower = name.to_lowercase();
    patterns.iter().any(|p| lower.contains(p))
}

pub fn is_passive_periodic(spell_name: &str) -> bool {
    matches_any(spell_name, PASSIVE_PERIODIC_PATTERNS)
}

pub fn is_ignored_entity(name: &str) -> bool {
    matches_any(name, IGNORED_ENTITY_PATTERNS)
}

pub fn is_owner_bound_name(name: &str) -> bool {
    matches_any(name, OWNER_BOUND_PATTERNS)
}
