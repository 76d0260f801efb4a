//! Narrow view of the host the detector needs: who the player is, where they
//! are, and who they are grouped with.

use std::cell::RefCell;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

/// Kind of content the player is currently in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstanceKind {
    #[default]
    OpenWorld,
    Party,
    Raid,
    Scenario,
    Battleground,
    Arena,
}

impl InstanceKind {
    pub fn is_instanced(self) -> bool {
        self != InstanceKind::OpenWorld
    }
}

/// Grouping and instance context captured when a session starts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GroupContext {
    pub instance: InstanceKind,
    /// Number of players in the group, including the player. 1 when solo.
    pub group_size: usize,
}

impl GroupContext {
    pub fn solo() -> Self {
        Self {
            instance: InstanceKind::OpenWorld,
            group_size: 1,
        }
    }

    pub fn is_grouped(&self) -> bool {
        self.group_size > 1
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerIdentity {
    pub guid: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupMember {
    pub guid: String,
    pub name: String,
}

/// A pet the host knows to be owned by a group member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupPet {
    pub guid: String,
    pub owner_name: String,
}

/// Roster and location queries answered by the host.
pub trait HostContext {
    fn player(&self) -> PlayerIdentity;
    fn zone(&self) -> String;
    fn group_context(&self) -> GroupContext;
    /// Current group members, excluding the player.
    fn group_members(&self) -> Vec<GroupMember>;
    fn group_pets(&self) -> Vec<GroupPet>;
}

/// Lets a host keep mutating its state while the detector holds a handle.
impl<H: HostContext> HostContext for Rc<RefCell<H>> {
    fn player(&self) -> PlayerIdentity {
        self.borrow().player()
    }

    fn zone(&self) -> String {
        self.borrow().zone()
    }

    fn group_context(&self) -> GroupContext {
        self.borrow().group_context()
    }

    fn group_members(&self) -> Vec<GroupMember> {
        self.borrow().group_members()
    }

    fn group_pets(&self) -> Vec<GroupPet> {
        self.borrow().group_pets()
    }
}

/// Fixed host state, set directly. Used by replay and tests.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StaticHost {
    pub player: PlayerIdentity,
    pub zone: String,
    pub context: GroupContext,
    pub members: Vec<GroupMember>,
    pub pets: Vec<GroupPet>,
}

impl StaticHost {
    pub fn solo(guid: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            player: PlayerIdentity {
                guid: guid.into(),
                name: name.into(),
            },
            zone: String::new(),
            context: GroupContext::solo(),
            members: Vec::new(),
            pets: Vec::new(),
        }
    }
}

impl HostContext for StaticHost {
    fn player(&self) -> PlayerIdentity {
        self.player.clone()
    }

    fn zone(&self) -> String {
        self.zone.clone()
    }

    fn group_context(&self) -> GroupContext {
        self.context.clone()
    }

    fn group_members(&self) -> Vec<GroupMember> {
        self.members.clone()
    }

    fn group_pets(&self) -> Vec<GroupPet> {
        self.pets.clone()
    }
}

/// Decides whether a combat-on signal should open a session.
pub trait TrackingPolicy {
    fn should_track(&self, context: &GroupContext, zone: &str) -> bool;
}

/// Track all instanced content; open world only when enabled.
#[derive(Debug, Clone, Copy)]
pub struct DefaultTrackingPolicy {
    pub track_open_world: bool,
}

impl TrackingPolicy for DefaultTrackingPolicy {
    fn should_track(&self, context: &GroupContext, _zone: &str) -> bool {
        context.instance.is_instanced() || self.track_open_world
    }
}

impl<F> TrackingPolicy for F
where
    F: Fn(&GroupContext, &str) -> bool,
{
    fn should_track(&self, context: &GroupContext, zone: &str) -> bool {
        self(context, zone)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy_gates_open_world() {
        let open = GroupContext::solo();
        let raid = GroupContext {
            instance: InstanceKind::Raid,
            group_size: 20,
        };

        let strict = DefaultTrackingPolicy {
            track_open_world: false,
        };
        assert!(!strict.should_track(&open, "Elwynn"));
        assert!(strict.should_track(&raid, "Molten Core"));

        let loose = DefaultTrackingPolicy {
            track_open_world: true,
        };
        assert!(loose.should_track(&open, "Elwynn"));
    }

    #[test]
    fn test_closure_policy() {
        let only_arenas = |ctx: &GroupContext, _: &str| ctx.instance == InstanceKind::Arena;
        assert!(!only_arenas.should_track(&GroupContext::solo(), ""));
    }

    #[test]
    fn test_shared_host_sees_updates() {
        let host = Rc::new(RefCell::new(StaticHost::solo("Player-1", "Ayla")));
        let handle: Box<dyn HostContext> = Box::new(Rc::clone(&host));

        host.borrow_mut().zone = "Deadmines".into();
        host.borrow_mut().members.push(GroupMember {
            guid: "Player-2".into(),
            name: "Bren".into(),
        });

        assert_eq!(handle.zone(), "Deadmines");
        assert_eq!(handle.group_members().len(), 1);
        assert_eq!(handle.player().name, "Ayla");
    }
}
