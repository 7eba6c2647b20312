//! # Principals
//!
//! A [`Principal`] is the textual identity of anything that can hold value
//! in the store: a customer wallet, the store owner, or a deployed contract.
//!
//! Standard principals are opaque strings (`ST1PQHQ...`). Contract principals
//! are derived from their deployer as `<deployer>.<contract-name>`, which is
//! how the store and the reward token address each other.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::config::MAX_PRINCIPAL_LEN;

/// Errors produced when parsing a principal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentityError {
    #[error("principal is empty")]
    Empty,

    #[error("principal is {len} chars, maximum is {max}")]
    TooLong { len: usize, max: usize },

    #[error("principal contains invalid character {0:?}")]
    InvalidCharacter(char),
}

/// Identity of a holder or contract.
///
/// Validated on construction: 1..=`MAX_PRINCIPAL_LEN` characters drawn from
/// `[A-Za-z0-9._-]`. Ordering is lexicographic, which keeps balance maps
/// deterministic when serialized.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Principal(String);

impl Principal {
    /// Parses and validates a principal.
    pub fn new(value: impl Into<String>) -> Result<Self, IdentityError> {
        let value = value.into();
        if value.is_empty() {
            return Err(IdentityError::Empty);
        }
        if value.len() > MAX_PRINCIPAL_LEN {
            return Err(IdentityError::TooLong {
                len: value.len(),
                max: MAX_PRINCIPAL_LEN,
            });
        }
        if let Some(c) = value
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_')))
        {
            return Err(IdentityError::InvalidCharacter(c));
        }
        Ok(Self(value))
    }

    /// Derives the principal of a contract deployed by `self`.
    pub fn contract(&self, name: &str) -> Result<Self, IdentityError> {
        Self::new(format!("{}.{}", self.0, name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Principal {
    type Err = IdentityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for Principal {
    type Error = IdentityError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Principal> for String {
    fn from(p: Principal) -> Self {
        p.0
    }
}

impl AsRef<str> for Principal {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_standard_principal() {
        let p = Principal::new("ST1PQHQKV0RJXZFY1DGX8MNSNYVE3VGZJSRTPGZGM").unwrap();
        assert_eq!(p.as_str().len(), 41);
    }

    #[test]
    fn derives_contract_principal() {
        let deployer = Principal::new("deployer").unwrap();
        let store = deployer.contract("product-store").unwrap();
        assert_eq!(store.as_str(), "deployer.product-store");
    }

    #[test]
    fn rejects_empty_and_whitespace() {
        assert_eq!(Principal::new(""), Err(IdentityError::Empty));
        assert_eq!(
            Principal::new("wallet 1"),
            Err(IdentityError::InvalidCharacter(' '))
        );
    }

    #[test]
    fn rejects_overlong_principal() {
        let long = "a".repeat(MAX_PRINCIPAL_LEN + 1);
        assert!(matches!(
            Principal::new(long),
            Err(IdentityError::TooLong { .. })
        ));
    }

    #[test]
    fn serde_validates_on_deserialize() {
        let ok: Principal = serde_json::from_str("\"wallet_1\"").unwrap();
        assert_eq!(ok.as_str(), "wallet_1");
        assert!(serde_json::from_str::<Principal>("\"bad principal\"").is_err());
    }
}
