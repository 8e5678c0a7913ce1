//! Hands out admin permissions to every member of a Steam group.
//!
//! The roster is pulled a short while after every map start, and again after
//! `css_steamadmingroup_reload`, which first takes back everything this plugin
//! granted. Only one refresh runs at a time: a trigger that arrives while a
//! refresh is waiting is folded into it, and a trigger that arrives while a
//! fetch is in flight queues exactly one follow-up refresh. A reload
//! discards whatever roster was already on its way in.

use std::{collections::HashSet, sync::Arc};

use async_trait::async_trait;
use itertools::Itertools;
use parking_lot::Mutex;
use steam_community::{parse_roster, FetchError, GroupClient, Roster, SteamId};
use tokio::sync::watch;

use crate::{
    admin::{AdminManager, ROOT_FLAG},
    config::{ConfigError, Config, Grant, ValidConfig},
    host::{Event, Host},
    Plugin,
};

/// Registered as `css_steamadmingroup_reload`.
pub const RELOAD_COMMAND: &str = "steamadmingroup_reload";
pub const RELOAD_REPLY: &str = "Reloaded admins from steam group";

/// Where the roster xml comes from.
#[async_trait]
pub trait RosterSource: Send + Sync + 'static {
    /// For log lines.
    fn describe(&self) -> String;
    async fn fetch_roster(&self) -> Result<String, FetchError>;
}

#[async_trait]
impl RosterSource for GroupClient {
    fn describe(&self) -> String {
        self.url().to_string()
    }

    async fn fetch_roster(&self) -> Result<String, FetchError> {
        GroupClient::fetch_roster(self).await
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshState {
    Idle,
    FetchScheduled,
    Fetching,
    Applying,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ApplyReport {
    /// Distinct members in the roster.
    pub members: usize,
    pub newly_cached: usize,
    /// Calls made into the admin manager.
    pub grants: usize,
}

#[derive(Debug)]
struct Inner {
    state: RefreshState,
    /// Set when a refresh was asked for while one was already fetching.
    rerun: bool,
    /// Players we handed permissions to.
    cache: HashSet<SteamId>,
    /// Bumped by every revoke. A roster fetched under an older generation is stale.
    generation: u64,
}

pub struct SteamAdminGroup {
    config: ValidConfig,
    source: Box<dyn RosterSource>,
    inner: Mutex<Inner>,
    /// Bumped after every finished refresh, whether it applied anything or not.
    refreshes: watch::Sender<u64>,
}

impl std::fmt::Debug for SteamAdminGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SteamAdminGroup")
            .field("config", &self.config)
            .field("source", &self.source.describe())
            .field("inner", &self.inner)
            .finish()
    }
}

impl SteamAdminGroup {
    pub fn new(config: ValidConfig, source: impl RosterSource) -> Self {
        let (refreshes, _) = watch::channel(0);
        Self {
            config,
            source: Box::new(source),
            inner: Mutex::new(Inner {
                state: RefreshState::Idle,
                rerun: false,
                cache: HashSet::new(),
                generation: 0,
            }),
            refreshes,
        }
    }

    /// Validates the config and fetches from steamcommunity.com.
    pub fn from_config(config: Config) -> Result<Self, ConfigError> {
        let config = config.validate()?;
        let client = GroupClient::new(config.group_id);
        info!("Steam group roster: {}", client.url());
        Ok(Self::new(config, client))
    }

    pub fn state(&self) -> RefreshState {
        self.inner.lock().state
    }

    pub fn cached(&self) -> Vec<SteamId> {
        self.inner.lock().cache.iter().copied().sorted().collect()
    }

    /// Ticks once per finished refresh.
    pub fn refreshes(&self) -> watch::Receiver<u64> {
        self.refreshes.subscribe()
    }

    /// Fetch the roster after the configured delay, unless that is already going to happen.
    pub fn schedule_refresh(self: &Arc<Self>, admins: Arc<dyn AdminManager>) {
        let mut inner = self.inner.lock();
        match inner.state {
            RefreshState::Idle => {
                inner.state = RefreshState::FetchScheduled;
                drop(inner);

                let self_clone = self.clone();
                tokio::spawn(async move { self_clone.refresh_loop(admins).await });
            }
            RefreshState::FetchScheduled => trace!("Refresh already scheduled"),
            RefreshState::Fetching | RefreshState::Applying => {
                debug!("Refresh in flight, queueing another one");
                inner.rerun = true;
            }
        }
    }

    async fn refresh_loop(self: Arc<Self>, admins: Arc<dyn AdminManager>) {
        loop {
            tokio::time::sleep(self.config.refresh_delay).await;
            let generation = {
                let mut inner = self.inner.lock();
                inner.state = RefreshState::Fetching;
                inner.generation
            };

            let roster = self.fetch().await;

            let again = {
                let mut inner = self.inner.lock();
                let roster = match roster {
                    Some(_) if inner.generation != generation => {
                        debug!("Admins were revoked while fetching, dropping the stale roster");
                        None
                    }
                    roster => roster,
                };
                if let Some(roster) = roster {
                    inner.state = RefreshState::Applying;
                    let report = apply(&mut inner.cache, &self.config.grants, &*admins, &roster);
                    info!(
                        "Applied {} grant(s) to {} member(s) of steam group {}, {} new, {} cached",
                        report.grants,
                        report.members,
                        roster.group_name.as_deref().unwrap_or("<unnamed>"),
                        report.newly_cached,
                        inner.cache.len()
                    );
                }

                if inner.rerun {
                    inner.rerun = false;
                    inner.state = RefreshState::FetchScheduled;
                    true
                } else {
                    inner.state = RefreshState::Idle;
                    false
                }
            };

            self.refreshes.send_modify(|n| *n += 1);
            if !again {
                break;
            }
        }
    }

    /// `None` means the refresh is abandoned. The reason is already logged.
    async fn fetch(&self) -> Option<Roster> {
        trace!("Fetching {}", self.source.describe());
        let xml = match self.source.fetch_roster().await {
            Ok(xml) => xml,
            Err(FetchError::Status(status)) => {
                error!("Unable to fetch group info! Steam answered {}", status);
                return None;
            }
            Err(err) => {
                warn!("Unknown error with fetching group info: {}", err);
                return None;
            }
        };

        match parse_roster(&xml) {
            Ok(roster) => {
                if roster.rejected > 0 {
                    debug!("Skipped {} roster entries that aren't player ids", roster.rejected);
                }
                if roster.is_partial() {
                    warn!(
                        "Steam group has {} members but only {} were listed, the rest get no permissions",
                        roster.member_count.unwrap_or_default(),
                        roster.members.len()
                    );
                }
                Some(roster)
            }
            Err(err) => {
                warn!("Unable to parse admins from steam group! {}", err);
                None
            }
        }
    }

    /// Takes back every permission this plugin handed out. Returns how many players lost them.
    ///
    /// Happens in one go under the lock, so no refresh can apply halfway through.
    /// A fetch already in flight won't be applied afterwards.
    pub fn revoke_all(&self, admins: &dyn AdminManager) -> usize {
        let mut inner = self.inner.lock();
        inner.generation += 1;

        let revoked = inner.cache.len();
        for player in inner.cache.drain() {
            admins.clear_player_permissions(player);
            admins.remove_player_admin_data(player);
        }
        revoked
    }

    /// Revoke, then fetch again.
    pub fn reload(self: &Arc<Self>, admins: Arc<dyn AdminManager>) {
        let revoked = self.revoke_all(&*admins);
        info!("Revoked permissions of {} steam group member(s)", revoked);
        self.schedule_refresh(admins);
    }
}

/// Grants every permission to every distinct member, and remembers them.
fn apply(cache: &mut HashSet<SteamId>, grants: &[Grant], admins: &dyn AdminManager, roster: &Roster) -> ApplyReport {
    let mut report = ApplyReport::default();

    for &player in roster.members.iter().unique() {
        report.members += 1;
        for grant in grants {
            match grant {
                Grant::Group(group) => admins.add_player_to_group(player, group),
                Grant::Flag(flag) => admins.add_player_permissions(player, flag),
            }
            report.grants += 1;
        }

        if cache.insert(player) {
            trace!("{} ({}) is now a group admin", player, player.steam3());
            report.newly_cached += 1;
        }
    }

    report
}

#[async_trait]
impl Plugin for SteamAdminGroup {
    const NAME: &'static str = "steamadmingroup";

    fn enabled(&self) -> bool {
        self.config.enabled
    }

    async fn start(self: &Arc<Self>, host: &Arc<Host>) {
        host.register_command(RELOAD_COMMAND, ROOT_FLAG, "Reloads admins from the steam group");

        // Loaded mid-map, there won't be a map start for a while.
        if let Some(map) = host.current_map() {
            debug!("Loaded while {} is running, refreshing now", map);
            self.schedule_refresh(host.admins());
        }
    }

    async fn event(self: Arc<Self>, host: Arc<Host>, ev: Event) -> anyhow::Result<()> {
        match ev {
            Event::MapStart { .. } => self.schedule_refresh(host.admins()),
            Event::Command { caller, name, reply, .. } if name == RELOAD_COMMAND => {
                info!("{} requested a reload of steam group admins", caller);
                self.reload(host.admins());
                reply.reply(RELOAD_REPLY);
            }
            _ => (),
        }

        Ok(())
    }
}
