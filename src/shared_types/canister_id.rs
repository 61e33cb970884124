use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use thiserror::Error;

// -----------------------------------------------------------------------------
// ----- CanisterId ------------------------------------------------------------

/// Textual principal of a remote ledger service, e.g. `ryjl3-tyaaa-aaaaa-aaaba-cai`.
///
/// Only the textual shape is checked (lowercase base32 groups of at most five
/// characters joined by dashes); the checksum is the replica's business.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CanisterId(String);

impl CanisterId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for CanisterId {
    type Err = CanisterIdError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        if raw.is_empty() {
            return Err(CanisterIdError::Empty);
        }

        for group in raw.split('-') {
            if group.is_empty() || group.len() > 5 {
                return Err(CanisterIdError::Malformed(raw.to_string()));
            }

            let valid = group
                .bytes()
                .all(|b| b.is_ascii_lowercase() || (b'2'..=b'7').contains(&b));

            if !valid {
                return Err(CanisterIdError::Malformed(raw.to_string()));
            }
        }

        Ok(CanisterId(raw.to_string()))
    }
}

impl TryFrom<String> for CanisterId {
    type Error = CanisterIdError;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        raw.parse()
    }
}

impl From<CanisterId> for String {
    fn from(id: CanisterId) -> Self {
        id.0
    }
}

impl fmt::Display for CanisterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// -----------------------------------------------------------------------------
// ----- Errors ----------------------------------------------------------------

#[derive(Debug, Error)]
pub enum CanisterIdError {
    #[error("canister id is empty")]
    Empty,

    #[error("malformed canister id '{0}'")]
    Malformed(String),
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------


// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
