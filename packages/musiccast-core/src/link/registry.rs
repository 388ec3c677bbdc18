//! Registry of distribution groups formed by this controller.
//!
//! Provides O(1) lookups by group id and by member address via a secondary
//! index. Lifetime is the lifetime of the owning controller.

use dashmap::DashMap;
use parking_lot::Mutex;
use serde::Serialize;
use thiserror::Error;

use super::group_id::GroupId;

/// One device taking part in a group, addressed by host and zone.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct GroupMember {
    pub address: String,
    pub zone: String,
}

impl GroupMember {
    pub fn new(address: impl Into<String>, zone: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            zone: zone.into(),
        }
    }
}

/// An active distribution group.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DistributionGroup {
    pub id: GroupId,
    pub master: GroupMember,
    pub clients: Vec<GroupMember>,
    pub name: String,
}

impl DistributionGroup {
    /// Returns the client addresses in link order.
    #[must_use]
    pub fn client_addresses(&self) -> Vec<String> {
        self.clients.iter().map(|c| c.address.clone()).collect()
    }

    /// Master first, then the clients.
    pub fn member_addresses(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.master.address.as_str())
            .chain(self.clients.iter().map(|c| c.address.as_str()))
    }
}

/// A device is already part of another tracked group.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{address} already belongs to group {group}")]
pub struct MemberConflict {
    pub address: String,
    pub group: GroupId,
}

/// Tracks groups by id, with a member-address index.
///
/// A device belongs to at most one group: [`insert`](Self::insert) refuses a
/// group that shares a member with another tracked group.
#[derive(Default)]
pub struct GroupRegistry {
    /// Primary: group id -> group
    groups: DashMap<GroupId, DistributionGroup>,
    /// Secondary: member address -> group id
    member_index: DashMap<String, GroupId>,
    /// Serializes the check-then-insert of [`insert`](Self::insert).
    write_lock: Mutex<()>,
}

impl GroupRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fails if any of `addresses` belongs to a tracked group other than `except`.
    pub fn check_free<'a>(
        &self,
        addresses: impl IntoIterator<Item = &'a str>,
        except: Option<GroupId>,
    ) -> Result<(), MemberConflict> {
        for address in addresses {
            if let Some(entry) = self.member_index.get(address) {
                let group = *entry.value();
                if Some(group) != except {
                    return Err(MemberConflict {
                        address: address.to_string(),
                        group,
                    });
                }
            }
        }
        Ok(())
    }

    /// Registers a group, replacing any previous version stored under its id.
    ///
    /// Fails without changes if a member already belongs to another group.
    pub fn insert(&self, group: DistributionGroup) -> Result<(), MemberConflict> {
        let _guard = self.write_lock.lock();
        self.check_free(group.member_addresses(), Some(group.id))?;

        if let Some((_, previous)) = self.groups.remove(&group.id) {
            for address in previous.member_addresses() {
                self.member_index.remove(address);
            }
        }
        for address in group.member_addresses() {
            self.member_index.insert(address.to_string(), group.id);
        }
        self.groups.insert(group.id, group);
        Ok(())
    }

    pub fn get(&self, id: &GroupId) -> Option<DistributionGroup> {
        self.groups.get(id).map(|r| r.value().clone())
    }

    /// Removes a group and the index entries still pointing at it.
    pub fn remove(&self, id: &GroupId) -> Option<DistributionGroup> {
        let _guard = self.write_lock.lock();
        let (_, group) = self.groups.remove(id)?;
        for address in group.member_addresses() {
            self.member_index.remove_if(address, |_, stored| stored == id);
        }
        Some(group)
    }

    /// Drops one client from a tracked group, returning the updated group.
    pub fn remove_client(&self, id: &GroupId, address: &str) -> Option<DistributionGroup> {
        let _guard = self.write_lock.lock();
        let updated = {
            let mut entry = self.groups.get_mut(id)?;
            entry.clients.retain(|c| c.address != address);
            entry.value().clone()
        };
        self.member_index.remove_if(address, |_, stored| stored == id);
        Some(updated)
    }

    /// Finds the group a device belongs to, as master or client.
    pub fn find_by_member(&self, address: &str) -> Option<DistributionGroup> {
        let id = *self.member_index.get(address)?.value();
        self.get(&id)
    }

    /// Finds the group mastered by `address`.
    pub fn find_by_master(&self, address: &str) -> Option<DistributionGroup> {
        self.find_by_member(address)
            .filter(|g| g.master.address == address)
    }

    /// Returns the number of tracked groups.
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Returns a snapshot of every tracked group.
    pub fn groups(&self) -> Vec<DistributionGroup> {
        self.groups.iter().map(|r| r.value().clone()).collect()
    }
}
