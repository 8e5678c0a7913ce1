use http::{header::USER_AGENT, StatusCode};
use thiserror::Error;

/// Added to the configured group id to get the id Steam uses in `/gid/` urls.
pub const GROUP_ID_OFFSET: u64 = 1429521408;

/// Leading digits of every clan SteamID64. Together with the derived id this
/// spells out `103582791429521408 + group_id`.
pub const CLAN_ID_PREFIX: &str = "10358279";

pub const DEFAULT_BASE_URL: &str = "https://steamcommunity.com";

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("steam community answered with status {0}")]
    Status(StatusCode),
    #[error("request to steam community failed: {0}")]
    Http(#[from] reqwest::Error),
}

pub fn derived_group_id(group_id: u32) -> u64 {
    GROUP_ID_OFFSET + u64::from(group_id)
}

pub fn roster_url(base: &str, group_id: u32) -> String {
    format!(
        "{}/gid/{}{}/memberslistxml/?xml=1",
        base.trim_end_matches('/'),
        CLAN_ID_PREFIX,
        derived_group_id(group_id)
    )
}

/// Fetches the public member list of a single group.
#[derive(Debug, Clone)]
pub struct GroupClient {
    client: reqwest::Client,
    url: String,
}

impl GroupClient {
    pub fn new(group_id: u32) -> Self {
        Self::with_base_url(DEFAULT_BASE_URL, group_id)
    }

    pub fn with_base_url(base: &str, group_id: u32) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: roster_url(base, group_id),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// One GET, no retry. Anything but a 2xx status is an error.
    pub async fn fetch_roster(&self) -> Result<String, FetchError> {
        let res = self.client
            .get(&self.url)
            .header(USER_AGENT, "SteamAdminGroup")
            .send()
            .await?;

        let status = res.status();
        if !status.is_success() {
            return Err(FetchError::Status(status));
        }

        Ok(res.text().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derived_id_embeds_offset() {
        assert_eq!(derived_group_id(5), 1429521413);
        assert_eq!(derived_group_id(u32::MAX), 1429521408 + 4294967295);
    }

    #[test]
    fn url_spells_clan_id() {
        let url = roster_url(DEFAULT_BASE_URL, 5);
        assert_eq!(url, "https://steamcommunity.com/gid/103582791429521413/memberslistxml/?xml=1");

        let clan_id = 103582791429521408u64 + 5;
        assert!(url.contains(&clan_id.to_string()));
    }

    #[test]
    fn trailing_slash_on_base() {
        assert_eq!(
            roster_url("http://127.0.0.1:8080/", 1),
            "http://127.0.0.1:8080/gid/103582791429521409/memberslistxml/?xml=1"
        );
    }
}
