//! The host's admin registry, and an in-memory one for the console host and tests.

use std::collections::{BTreeSet, HashMap};

use parking_lot::Mutex;
use steam_community::SteamId;

/// Holds every permission on the server.
pub const ROOT_FLAG: &str = "@css/root";

/// What the plugin needs from the server's admin system.
///
/// Owned by the host. Grants are expected to be idempotent.
pub trait AdminManager: Send + Sync + 'static {
    fn add_player_to_group(&self, player: SteamId, group: &str);
    fn add_player_permissions(&self, player: SteamId, flag: &str);
    fn clear_player_permissions(&self, player: SteamId);
    fn remove_player_admin_data(&self, player: SteamId);

    /// Used by the host to gate commands.
    fn player_has_permissions(&self, player: SteamId, flag: &str) -> bool;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdminCall {
    AddToGroup(SteamId, String),
    AddPermission(SteamId, String),
    ClearPermissions(SteamId),
    RemoveAdminData(SteamId),
}

#[derive(Debug, Default)]
struct AdminData {
    groups: BTreeSet<String>,
    flags: BTreeSet<String>,
}

#[derive(Debug, Default)]
struct Inner {
    admins: HashMap<SteamId, AdminData>,
    calls: Vec<AdminCall>,
}

#[derive(Debug, Default)]
pub struct MemoryAdmins {
    /// `#group` -> flags it carries.
    groups: HashMap<String, BTreeSet<String>>,
    inner: Mutex<Inner>,
}

impl MemoryAdmins {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_groups(groups: HashMap<String, BTreeSet<String>>) -> Self {
        Self {
            groups,
            inner: Mutex::new(Inner::default()),
        }
    }

    /// Every call made so far, oldest first.
    pub fn calls(&self) -> Vec<AdminCall> {
        self.inner.lock().calls.clone()
    }

    pub fn is_admin(&self, player: SteamId) -> bool {
        self.inner.lock().admins.contains_key(&player)
    }

    pub fn groups_of(&self, player: SteamId) -> BTreeSet<String> {
        self.inner.lock().admins.get(&player).map(|a| a.groups.clone()).unwrap_or_default()
    }

    pub fn flags_of(&self, player: SteamId) -> BTreeSet<String> {
        self.inner.lock().admins.get(&player).map(|a| a.flags.clone()).unwrap_or_default()
    }
}

impl AdminManager for MemoryAdmins {
    fn add_player_to_group(&self, player: SteamId, group: &str) {
        let mut inner = self.inner.lock();
        inner.calls.push(AdminCall::AddToGroup(player, group.to_string()));
        if !self.groups.contains_key(group) {
            debug!("Admin group {} is not defined, {} gets no flags from it", group, player);
        }
        inner.admins.entry(player).or_default().groups.insert(group.to_string());
    }

    fn add_player_permissions(&self, player: SteamId, flag: &str) {
        let mut inner = self.inner.lock();
        inner.calls.push(AdminCall::AddPermission(player, flag.to_string()));
        inner.admins.entry(player).or_default().flags.insert(flag.to_string());
    }

    fn clear_player_permissions(&self, player: SteamId) {
        let mut inner = self.inner.lock();
        inner.calls.push(AdminCall::ClearPermissions(player));
        if let Some(data) = inner.admins.get_mut(&player) {
            data.flags.clear();
            data.groups.clear();
        }
    }

    fn remove_player_admin_data(&self, player: SteamId) {
        let mut inner = self.inner.lock();
        inner.calls.push(AdminCall::RemoveAdminData(player));
        inner.admins.remove(&player);
    }

    fn player_has_permissions(&self, player: SteamId, flag: &str) -> bool {
        let inner = self.inner.lock();
        let data = match inner.admins.get(&player) {
            Some(data) => data,
            None => return false,
        };

        let mut flags = data.flags.iter()
            .chain(data.groups.iter().filter_map(|g| self.groups.get(g)).flatten());
        flags.any(|f| f == flag || f == ROOT_FLAG)
    }
}
