//! Ethereum-style wallet addresses.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A 20-byte Ethereum address in its canonical 42-character form:
/// `0x` followed by 40 case-insensitive hex digits.
///
/// The constructor is the only way to build one, so every value in the
/// system is already format-validated. The original input casing is
/// preserved; comparison is byte-exact.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct WalletAddress(String);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
    #[error("wallet address must be 42 characters (0x + 40 hex digits), got {0}")]
    Length(usize),
    #[error("wallet address must start with 0x")]
    Prefix,
    #[error("wallet address contains a non-hex character at position {0}")]
    NonHex(usize),
}

impl WalletAddress {
    pub fn new(value: impl Into<String>) -> Result<Self, AddressError> {
        let value = value.into();
        if value.len() != 42 {
            return Err(AddressError::Length(value.len()));
        }
        if !value.starts_with("0x") {
            return Err(AddressError::Prefix);
        }
        if let Some(pos) = value[2..].find(|c: char| !c.is_ascii_hexdigit()) {
            return Err(AddressError::NonHex(pos + 2));
        }
        Ok(Self(value))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl TryFrom<String> for WalletAddress {
    type Error = AddressError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<WalletAddress> for String {
    fn from(address: WalletAddress) -> Self {
        address.0
    }
}

impl FromStr for WalletAddress {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl fmt::Display for WalletAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
