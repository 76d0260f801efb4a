use serde::{Deserialize, Serialize};

/// Unit affiliation, reaction, control and type bits supplied with every
/// raw event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UnitFlags(pub u32);

impl UnitFlags {
    // Affiliation
    pub const AFFILIATION_MINE: u32 = 0x0000_0001;
    pub const AFFILIATION_PARTY: u32 = 0x0000_0002;
    pub const AFFILIATION_RAID: u32 = 0x0000_0004;
    pub const AFFILIATION_OUTSIDER: u32 = 0x0000_0008;
    // Reaction
    pub const REACTION_FRIENDLY: u32 = 0x0000_0010;
    pub const REACTION_NEUTRAL: u32 = 0x0000_0020;
    pub const REACTION_HOSTILE: u32 = 0x0000_0040;
    // Control
    pub const CONTROL_PLAYER: u32 = 0x0000_0100;
    pub const CONTROL_NPC: u32 = 0x0000_0200;
    // Type
    pub const TYPE_PLAYER: u32 = 0x0000_0400;
    pub const TYPE_NPC: u32 = 0x0000_0800;
    pub const TYPE_PET: u32 = 0x0000_1000;
    pub const TYPE_GUARDIAN: u32 = 0x0000_2000;
    pub const TYPE_OBJECT: u32 = 0x0000_4000;

    pub const NONE: UnitFlags = UnitFlags(0);

    #[inline]
    pub fn has(self, bits: u32) -> bool {
        self.0 & bits != 0
    }

    pub fn is_mine(self) -> bool {
        self.has(Self::AFFILIATION_MINE)
    }

    /// Mine, party or raid affiliation.
    pub fn is_grouped(self) -> bool {
        self.has(Self::AFFILIATION_MINE | Self::AFFILIATION_PARTY | Self::AFFILIATION_RAID)
    }

    pub fn is_outsider(self) -> bool {
        self.has(Self::AFFILIATION_OUTSIDER)
    }

    pub fn is_friendly(self) -> bool {
        self.has(Self::REACTION_FRIENDLY)
    }

    pub fn is_hostile(self) -> bool {
        self.has(Self::REACTION_HOSTILE)
    }

    pub fn is_player(self) -> bool {
        self.has(Self::TYPE_PLAYER)
    }

    pub fn is_pet(self) -> bool {
        self.has(Self::TYPE_PET)
    }

    pub fn is_guardian(self) -> bool {
        self.has(Self::TYPE_GUARDIAN)
    }

    /// Pet or guardian type bit.
    pub fn is_companion(self) -> bool {
        self.has(Self::TYPE_PET | Self::TYPE_GUARDIAN)
    }

    pub fn is_object(self) -> bool {
        self.has(Self::TYPE_OBJECT)
    }
}

impl From<u32> for UnitFlags {
    fn from(bits: u32) -> Self {
        UnitFlags(bits)
    }
}
