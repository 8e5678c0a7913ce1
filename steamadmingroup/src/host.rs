//! The game server as seen by plugins: an event stream, a command registry
//! and the admin registry.

use std::{collections::BTreeMap, fmt, sync::Arc};

use futures::Stream;
use parking_lot::Mutex;
use steam_community::SteamId;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc};
use tokio_stream::{
    wrappers::{errors::BroadcastStreamRecvError, BroadcastStream},
    StreamExt,
};

use crate::admin::AdminManager;

/// Commands may be typed with or without this prefix.
pub const COMMAND_PREFIX: &str = "css_";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Caller {
    /// Server console or rcon. Passes every permission check.
    Console,
    Player(SteamId),
}

impl fmt::Display for Caller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Caller::Console => write!(f, "console"),
            Caller::Player(id) => write!(f, "{}", id.steam3()),
        }
    }
}

/// Sends text back to whoever issued a command.
#[derive(Debug, Clone)]
pub struct Reply(mpsc::UnboundedSender<String>);

impl Reply {
    pub fn reply(&self, msg: impl Into<String>) {
        // caller went away, nobody to tell.
        let _ = self.0.send(msg.into());
    }
}

#[derive(Debug, Clone)]
pub enum Event {
    MapStart {
        map_name: String,
    },
    Command {
        caller: Caller,
        /// Lowercase, without the `css_` prefix.
        name: String,
        args: Vec<String>,
        reply: Reply,
    },
    Shutdown,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    #[error("empty command")]
    Empty,
    #[error("Unknown command: {0}")]
    Unknown(String),
    #[error("[CSS] You do not have the correct permissions ({0}) to execute this command.")]
    PermissionDenied(String),
}

#[derive(Debug, Clone)]
struct RegisteredCommand {
    permission: String,
    description: String,
}

pub struct Host {
    admins: Arc<dyn AdminManager>,
    /// You can `.subscribe()` to this and you'll receive Events.
    events: broadcast::Sender<Event>,
    commands: Mutex<BTreeMap<String, RegisteredCommand>>,
    current_map: Mutex<Option<String>>,
}

impl fmt::Debug for Host {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Host")
            .field("commands", &self.commands.lock().keys().collect::<Vec<_>>())
            .field("current_map", &self.current_map.lock())
            .finish()
    }
}

fn normalize(name: &str) -> String {
    let name = name.to_ascii_lowercase();
    match name.strip_prefix(COMMAND_PREFIX) {
        Some(stripped) => stripped.to_string(),
        None => name,
    }
}

impl Host {
    pub fn new(admins: Arc<dyn AdminManager>) -> Arc<Self> {
        let (events, _) = broadcast::channel(128);
        Arc::new(Self {
            admins,
            events,
            commands: Mutex::new(BTreeMap::new()),
            current_map: Mutex::new(None),
        })
    }

    pub fn admins(&self) -> Arc<dyn AdminManager> {
        self.admins.clone()
    }

    pub fn current_map(&self) -> Option<String> {
        self.current_map.lock().clone()
    }

    /// Lagged events are dropped with a warning.
    pub fn event_stream(&self) -> impl Stream<Item = Event> + Send + Unpin + 'static {
        BroadcastStream::new(self.events.subscribe()).filter_map(|ev| match ev {
            Ok(ev) => Some(ev),
            Err(BroadcastStreamRecvError::Lagged(n)) => {
                warn!("Too many events at once! Had to drop {} events", n);
                None
            }
        })
    }

    fn broadcast(&self, ev: Event) {
        if self.events.send(ev).is_err() {
            debug!("No plugin is listening for events");
        }
    }

    pub fn map_start(&self, map_name: impl Into<String>) {
        let map_name = map_name.into();
        info!("Map {} started", map_name);
        *self.current_map.lock() = Some(map_name.clone());
        self.broadcast(Event::MapStart { map_name });
    }

    pub fn shutdown(&self) {
        self.broadcast(Event::Shutdown);
    }

    /// Registering a name twice replaces the earlier entry.
    pub fn register_command(&self, name: &str, permission: &str, description: &str) {
        let name = normalize(name);
        debug!("Registering command {}{} (requires {})", COMMAND_PREFIX, name, permission);
        let old = self.commands.lock().insert(name.clone(), RegisteredCommand {
            permission: permission.to_string(),
            description: description.to_string(),
        });
        if old.is_some() {
            warn!("Command {} was registered twice", name);
        }
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.commands.lock().contains_key(&normalize(name))
    }

    /// `(name, description)` for every registered command.
    pub fn commands(&self) -> Vec<(String, String)> {
        self.commands.lock()
            .iter()
            .map(|(name, cmd)| (format!("{}{}", COMMAND_PREFIX, name), cmd.description.clone()))
            .collect()
    }

    /// Checks the caller's permission, then hands the command to the plugins.
    /// Replies arrive on the returned receiver.
    pub fn dispatch(&self, caller: Caller, line: &str) -> Result<mpsc::UnboundedReceiver<String>, CommandError> {
        let mut words = line.split_whitespace();
        let name = normalize(words.next().ok_or(CommandError::Empty)?);
        let args = words.map(str::to_string).collect::<Vec<_>>();

        let permission = match self.commands.lock().get(&name) {
            Some(cmd) => cmd.permission.clone(),
            None => return Err(CommandError::Unknown(name)),
        };

        if let Caller::Player(id) = &caller {
            if !self.admins.player_has_permissions(*id, &permission) {
                info!("{} tried to use {} without {}", caller, name, permission);
                return Err(CommandError::PermissionDenied(permission));
            }
        }

        let (tx, rx) = mpsc::unbounded_channel();
        self.broadcast(Event::Command {
            caller,
            name,
            args,
            reply: Reply(tx),
        });
        Ok(rx)
    }
}
