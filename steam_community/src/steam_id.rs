use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Upper 32 bits of every individual account on the public universe
/// (universe 1, account type 1, desktop instance 1).
const INDIVIDUAL_PUBLIC: u64 = 0x0110_0001;

/// A 64-bit Steam account identifier, as found in `steamID64` nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u64", into = "u64")]
pub struct SteamId(u64);

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SteamIdError {
    #[error("empty steam id")]
    Empty,
    #[error("steam id is not a decimal number: {0:?}")]
    NotANumber(String),
    #[error("{0} is not an individual account on the public universe")]
    NotAnIndividual(u64),
}

impl SteamId {
    pub fn account_id(self) -> u32 {
        (self.0 & 0xFFFF_FFFF) as u32
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }

    /// `[U:1:<account id>]`, the format the Source 2 console prints.
    pub fn steam3(self) -> String {
        format!("[U:1:{}]", self.account_id())
    }
}

impl TryFrom<u64> for SteamId {
    type Error = SteamIdError;

    fn try_from(raw: u64) -> Result<Self, Self::Error> {
        if raw >> 32 != INDIVIDUAL_PUBLIC || raw & 0xFFFF_FFFF == 0 {
            return Err(SteamIdError::NotAnIndividual(raw));
        }
        Ok(Self(raw))
    }
}

impl From<SteamId> for u64 {
    fn from(id: SteamId) -> Self {
        id.0
    }
}

impl FromStr for SteamId {
    type Err = SteamIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(SteamIdError::Empty);
        }
        // u64::from_str would also take a leading '+'.
        if !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(SteamIdError::NotANumber(s.to_owned()));
        }
        let raw = s.parse::<u64>().map_err(|_| SteamIdError::NotANumber(s.to_owned()))?;
        Self::try_from(raw)
    }
}

impl fmt::Display for SteamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
