//! Loading and validating the plugin config.

use std::{fs::File, io::Read, path::Path, time::Duration};

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to deserialize config.")]
    Serde(#[from] serde_yaml::Error),
    #[error("Failed to open config file")]
    Io(#[from] std::io::Error),
    #[error("Invalid value has been set for config value `Group_ID`")]
    InvalidGroupId,
    #[error("Invalid value has been set for config value `Group_Perms`")]
    NoPermissions,
    #[error("Invalid value has been set for config value `refresh_delay`: {0}")]
    InvalidDelay(#[from] humantime::DurationError),
}

pub fn load_config<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T, ConfigError> {
    info!("Loading {}", path.as_ref().to_string_lossy());
    let mut file = File::open(path)?;
    let mut s = String::new();
    file.read_to_string(&mut s)?;
    let t: T = serde_yaml::from_str(&s)?;
    Ok(t)
}

/// The config file as written by the server operator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "yes")]
    pub enabled: bool,
    #[serde(rename = "Group_ID", default)]
    pub group_id: u32,
    #[serde(rename = "Group_Perms", default = "default_perms")]
    pub group_perms: Vec<String>,
    #[serde(default = "default_delay")]
    pub refresh_delay: String,
}

fn yes() -> bool {
    true
}

fn default_perms() -> Vec<String> {
    vec!["#css/admin".to_string()]
}

fn default_delay() -> String {
    "1s".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            enabled: true,
            group_id: 0,
            group_perms: default_perms(),
            refresh_delay: default_delay(),
        }
    }
}

/// One entry of `Group_Perms`, after looking at its prefix.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Grant {
    /// `#css/admin`: put the player into an admin group.
    Group(String),
    /// `@css/kick`: hand out a single flag.
    Flag(String),
}

impl Grant {
    pub fn parse(perm: &str) -> Option<Self> {
        if perm.starts_with('#') {
            Some(Self::Group(perm.to_string()))
        } else if perm.starts_with('@') {
            Some(Self::Flag(perm.to_string()))
        } else {
            None
        }
    }
}

/// A config that passed [`Config::validate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidConfig {
    pub enabled: bool,
    pub group_id: u32,
    pub grants: Vec<Grant>,
    pub refresh_delay: Duration,
}

impl Config {
    pub fn validate(self) -> Result<ValidConfig, ConfigError> {
        if self.group_id == 0 {
            return Err(ConfigError::InvalidGroupId);
        }
        if self.group_perms.is_empty() {
            return Err(ConfigError::NoPermissions);
        }
        let refresh_delay = humantime::parse_duration(self.refresh_delay.trim())?;

        let mut grants: Vec<Grant> = Vec::with_capacity(self.group_perms.len());
        for perm in &self.group_perms {
            match Grant::parse(perm) {
                Some(grant) if grants.contains(&grant) => debug!("Permission {:?} is listed twice", perm),
                Some(grant) => grants.push(grant),
                None => warn!("Permission {:?} starts with neither '#' nor '@' and will be ignored", perm),
            }
        }

        Ok(ValidConfig {
            enabled: self.enabled,
            group_id: self.group_id,
            grants,
            refresh_delay,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn group_keys_as_written() {
        let config: Config = serde_yaml::from_str("Group_ID: 5\nGroup_Perms: [\"#css/admin\", \"@css/kick\"]\n").unwrap();
        let valid = config.validate().unwrap();
        assert!(valid.enabled);
        assert_eq!(valid.group_id, 5);
        assert_eq!(valid.grants, vec![Grant::Group("#css/admin".into()), Grant::Flag("@css/kick".into())]);
        assert_eq!(valid.refresh_delay, Duration::from_secs(1));
    }

    #[test]
    fn zero_group_id_is_fatal() {
        let config: Config = serde_yaml::from_str("Group_Perms: [\"#css/admin\"]\n").unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::InvalidGroupId)));

        let config = Config { group_id: 0, ..Default::default() };
        assert!(matches!(config.validate(), Err(ConfigError::InvalidGroupId)));
    }

    #[test]
    fn empty_perms_are_fatal() {
        let config: Config = serde_yaml::from_str("Group_ID: 5\nGroup_Perms: []\n").unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::NoPermissions)));
    }

    #[test]
    fn default_perms_when_missing() {
        let config: Config = serde_yaml::from_str("Group_ID: 7\n").unwrap();
        assert_eq!(config.validate().unwrap().grants, vec![Grant::Group("#css/admin".into())]);
    }

    #[test]
    fn negative_group_id_does_not_deserialize() {
        assert!(serde_yaml::from_str::<Config>("Group_ID: -3\n").is_err());
    }

    #[test]
    fn unprefixed_perms_are_dropped() {
        let config = Config {
            group_id: 1,
            group_perms: vec!["css/admin".into(), "@css/ban".into(), "@css/ban".into()],
            ..Default::default()
        };
        assert_eq!(config.validate().unwrap().grants, vec![Grant::Flag("@css/ban".into())]);
    }

    #[test]
    fn bad_delay() {
        let config = Config { group_id: 1, refresh_delay: "soon".into(), ..Default::default() };
        assert!(matches!(config.validate(), Err(ConfigError::InvalidDelay(_))));

        let config = Config { group_id: 1, refresh_delay: "250ms".into(), ..Default::default() };
        assert_eq!(config.validate().unwrap().refresh_delay, Duration::from_millis(250));
    }
}
