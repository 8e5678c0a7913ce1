//! A bare-bones console host for the plugin.
//!
//! Type `map <name>` to start a map, `admins` to list the group admins,
//! `as <steamid64> <command>` to run a command as a player, `quit` to leave.
//! Anything else is run as a console command, e.g. `css_steamadmingroup_reload`.

#[macro_use] extern crate log;

use std::{collections::{BTreeSet, HashMap}, env::var, io::Write, sync::Arc, time::Duration};

use anyhow::Context;
use dotenv::dotenv;
use steam_community::SteamId;
use steamadmingroup::{
    admin::MemoryAdmins,
    host::{Caller, Host},
    logging, App, SteamAdminGroup,
};
use tokio::io::{AsyncBufReadExt, BufReader};

/// How long to wait for more replies after a command.
const REPLY_GRACE: Duration = Duration::from_millis(500);

/// Flags of the default `#css/admin` group.
fn admin_groups() -> HashMap<String, BTreeSet<String>> {
    let flags = ["@css/generic", "@css/kick", "@css/ban", "@css/slay", "@css/changemap", "@css/chat"];
    let mut groups = HashMap::new();
    groups.insert("#css/admin".to_string(), flags.iter().map(|f| f.to_string()).collect());
    groups
}

fn prompt() -> std::io::Result<()> {
    print!("-> ");
    std::io::stdout().flush()
}

async fn run_command(host: &Host, caller: Caller, line: &str) {
    match host.dispatch(caller, line) {
        Ok(mut replies) => {
            while let Ok(Some(msg)) = tokio::time::timeout(REPLY_GRACE, replies.recv()).await {
                println!("<- {}", msg);
            }
        }
        Err(err) => println!("<- {}", err),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok(); // load (additional) environment variables from `.env` file in working directory.
    logging::init_logging("info")?;
    info!("This is SteamAdminGroup {}", env!("CARGO_PKG_VERSION"));

    let config_dir = var("SAG_CONFIG_DIR").unwrap_or_else(|_| "configs".into());
    let admins = Arc::new(MemoryAdmins::with_groups(admin_groups()));
    let host = Host::new(admins);

    let mut app = App::new(config_dir);
    let plugin = app.has_plugin(SteamAdminGroup::from_config)
        .context("Failed to load plugin steamadmingroup")?;
    let app_jh = tokio::spawn(app.run(host.clone()));

    host.map_start(var("SAG_MAP").unwrap_or_else(|_| "de_dust2".into()));

    prompt()?;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        match line.split_once(' ') {
            _ if line.is_empty() => (),
            _ if line == "quit" || line == "exit" => break,
            _ if line == "admins" => {
                let cached = plugin.cached();
                println!("<- {} group admin(s)", cached.len());
                for id in cached {
                    println!("   {} {}", id, id.steam3());
                }
            }
            _ if line == "commands" => {
                for (name, description) in host.commands() {
                    println!("   {} - {}", name, description);
                }
            }
            Some(("map", name)) => host.map_start(name.trim()),
            Some(("as", rest)) => match rest.trim().split_once(' ') {
                Some((id, command)) => match id.parse::<SteamId>() {
                    Ok(id) => run_command(&host, Caller::Player(id), command).await,
                    Err(err) => println!("<- {}", err),
                },
                None => println!("<- usage: as <steamid64> <command>"),
            },
            _ => run_command(&host, Caller::Console, line).await,
        }
        prompt()?;
    }

    host.shutdown();
    app_jh.await?;
    Ok(())
}
