use hashbrown::{HashMap, HashSet};

use super::host::HostContext;

/// Snapshot of the group roster and the pets the host attributes to it.
///
/// Always rebuilt wholesale from the host, never patched.
#[derive(Debug, Clone, Default)]
pub struct RosterCache {
    members: HashMap<String, String>,
    member_names: HashSet<String>,
    /// pet guid -> owner name
    pets: HashMap<String, String>,
    last_scan: Option<f64>,
    scans: u64,
}

impl RosterCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rebuild(&mut self, host: &dyn HostContext, now: f64) {
        self.members.clear();
        self.member_names.clear();
        self.pets.clear();

        for member in host.group_members() {
            self.member_names.insert(member.name.clone());
            self.members.insert(member.guid, member.name);
        }
        for pet in host.group_pets() {
            self.pets.insert(pet.guid, pet.owner_name);
        }
        self.last_scan = Some(now);
        self.scans += 1;
        tracing::debug!(
            "[ROSTER] rebuilt: {} members, {} pets",
            self.members.len(),
            self.pets.len()
        );
    }

    /// Rebuild if the last scan is at least `min_interval` old. Returns true
    /// if a scan ran.
    pub fn rebuild_if_due(&mut self, host: &dyn HostContext, now: f64, min_interval: f64) -> bool {
        if let Some(last) = self.last_scan
            && now - last < min_interval
        {
            return false;
        }
        self.rebuild(host, now);
        true
    }

    pub fn is_member(&self, guid: &str) -> bool {
        self.members.contains_key(guid)
    }

    pub fn is_member_name(&self, name: &str) -> bool {
        self.member_names.contains(name)
    }

    pub fn pet_owner(&self, guid: &str) -> Option<&str> {
        self.pets.get(guid).map(String::as_str)
    }

    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    pub fn scans(&self) -> u64 {
        self.scans
    }

    pub fn clear(&mut self) {
        self.members.clear();
        self.member_names.clear();
        self.pets.clear();
        self.last_scan = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector::host::{GroupMember, GroupPet, StaticHost};

    fn host() -> StaticHost {
        let mut host = StaticHost::solo("Player-1", "Ayla");
        host.members.push(GroupMember {
            guid: "Player-2".into(),
            name: "Bren".into(),
        });
        host.pets.push(GroupPet {
            guid: "Pet-7".into(),
            owner_name: "Bren".into(),
        });
        host
    }

    #[test]
    fn test_rebuild_replaces_contents() {
        let mut host = host();
        let mut roster = RosterCache::new();
        roster.rebuild(&host, 0.0);

        assert!(roster.is_member("Player-2"));
        assert!(roster.is_member_name("Bren"));
        assert_eq!(roster.pet_owner("Pet-7"), Some("Bren"));

        host.members.clear();
        host.pets.clear();
        roster.rebuild(&host, 1.0);
        assert_eq!(roster.member_count(), 0);
        assert_eq!(roster.pet_owner("Pet-7"), None);
    }

    #[test]
    fn test_rebuild_if_due_is_rate_limited() {
        let host = host();
        let mut roster = RosterCache::new();

        assert!(roster.rebuild_if_due(&host, 10.0, 2.0));
        assert!(!roster.rebuild_if_due(&host, 11.0, 2.0));
        assert!(roster.rebuild_if_due(&host, 12.0, 2.0));
        assert_eq!(roster.scans(), 2);
    }
}
