#![warn(missing_debug_implementations, rust_2018_idioms)]
/*!
Reads the public member roster of a Steam community group.

# Example
```ignore
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let client = GroupClient::new(5);
    let xml = client.fetch_roster().await?;
    let roster = parse_roster(&xml)?;
    for member in roster.members {
        println!("{} is a member", member);
    }
    Ok(())
}
```
*/

#[macro_use] extern crate log;

pub mod group;
pub mod roster;
pub mod steam_id;

pub use group::{derived_group_id, roster_url, FetchError, GroupClient};
pub use http::StatusCode;
pub use roster::{parse_roster, Roster, RosterError};
pub use steam_id::{SteamId, SteamIdError};
