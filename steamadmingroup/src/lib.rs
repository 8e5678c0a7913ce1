#![warn(missing_debug_implementations, rust_2018_idioms)]
#![allow(clippy::new_without_default)]

#[cfg(test)]
#[macro_use] extern crate maplit;
#[macro_use] extern crate log;

use std::{collections::BTreeMap, path::PathBuf, sync::Arc};

use async_trait::async_trait;
use futures::StreamExt;
use itertools::Itertools;

use crate::config::{load_config, ConfigError};
use crate::host::{Event, Host};

pub mod admin;
pub mod admin_group;
pub mod config;
pub mod host;
pub mod logging;

pub use admin_group::SteamAdminGroup;

/// This is the trait you want to implement when you're creating a new plugin.
///
/// The simplest way to use this trait is to implement the `event` function.
/// The `run` function can be overridden, but it invokes the `event` function and does some common
/// error-handling. If you override `run`, then you lose that.
#[async_trait]
pub trait Plugin: Send + Sync + 'static {
    const NAME: &'static str;
    fn enabled(&self) -> bool { true }

    /// Called once, after the plugin is subscribed to events. Register commands here.
    async fn start(self: &Arc<Self>, _host: &Arc<Host>) { }

    /// You *can* implement this, but you may be more interested in `event`.
    ///
    /// In case `run` is overridden, `event` does nothing.
    async fn run(self: Arc<Self>, host: Arc<Host>) -> anyhow::Result<()> {
        info!("Plugin {} is {}.", Self::NAME, if self.enabled() { "enabled" } else { "disabled" });
        if self.enabled() {
            let mut stream = host.event_stream();
            self.start(&host).await;

            while let Some(event) = stream.next().await {
                if let Event::Shutdown = event {
                    debug!("[{}] shutting down", Self::NAME);
                    break;
                }

                let host = host.clone();
                let self_clone = self.clone();
                tokio::spawn(async move {
                    if let Err(err) = self_clone.event(host, event).await {
                        error!("[{}] failed to handle event: {:?}", Self::NAME, err);
                    }
                });
            }
        }
        Ok(())
    }

    async fn event(self: Arc<Self>, _host: Arc<Host>, _ev: Event) -> anyhow::Result<()> {
        // do nothing unless overridden.
        Ok(())
    }
}

/// Just a helper trait to avoid trait object and associated constants clashing.
#[async_trait]
trait Plugin2: Sync + Send {
    async fn run(self: Arc<Self>, host: Arc<Host>) -> anyhow::Result<()>;
}

#[async_trait]
impl<T: Plugin> Plugin2 for T {
    async fn run(self: Arc<Self>, host: Arc<Host>) -> anyhow::Result<()> {
        Plugin::run(self, host).await
    }
}

/// The set of loaded plugins. Each plugin reads `<config_dir>/<NAME>.yaml`.
pub struct App {
    config_dir: PathBuf,
    plugins: BTreeMap<String, Arc<dyn Plugin2>>,
}

impl std::fmt::Debug for App {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("App")
            .field("config_dir", &self.config_dir)
            .field("plugins", &self.plugins.keys().collect_vec())
            .finish()
    }
}

impl App {
    pub fn new(config_dir: impl Into<PathBuf>) -> Self {
        Self {
            config_dir: config_dir.into(),
            plugins: BTreeMap::new(),
        }
    }

    /// Loads the plugin's config and hands it to `f`, which may still reject it.
    pub fn has_plugin<P, C, F>(&mut self, f: F) -> Result<Arc<P>, ConfigError>
    where
        P: Plugin,
        C: serde::de::DeserializeOwned,
        F: FnOnce(C) -> Result<P, ConfigError>,
    {
        let config: C = load_config(self.config_dir.join(format!("{}.yaml", P::NAME)))?;
        Ok(self.has_plugin_noconfig(f(config)?))
    }

    pub fn has_plugin_noconfig<P: Plugin>(&mut self, p: P) -> Arc<P> {
        let p = Arc::new(p);

        let exists = self.plugins.insert(P::NAME.to_string(), p.clone());
        if exists.is_some() {
            panic!("Double-loading of plugins is forbidden. Plugin: {}", P::NAME);
        }

        p
    }

    /// Invoke `run` on every loaded plugin, then wait for completion.
    pub async fn run(self, host: Arc<Host>) {
        let jhs = self.plugins.into_iter()
            .map(|(name, p)| {
                let host = host.clone();
                let jh = tokio::spawn(async move { p.run(host).await });
                (name, jh)
            })
            .collect_vec();

        for (name, jh) in jhs {
            match jh.await {
                Ok(Ok(())) => debug!("Plugin {} has quit", name),
                Ok(Err(err)) => error!("Plugin {} has quit with error: {:?}", name, err),
                Err(err) => error!("Plugin {} panicked: {}", name, err),
            }
        }
    }
}
