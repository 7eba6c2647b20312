//! Store-level errors.
//!
//! Component contracts each report their own error enum. The store folds
//! them into [`StoreError`], whose [`ErrorKind`] is what callers branch on
//! and whose [`code`](StoreError::code) is the numeric `(err uN)` result.

use cosmo_protocol::config::{
    ERR_INSUFFICIENT_BALANCE, ERR_INSUFFICIENT_ESCROW, ERR_INSUFFICIENT_FUNDS,
    ERR_INSUFFICIENT_STOCK, ERR_INVALID_ARGUMENT, ERR_NOT_FOUND, ERR_UNAUTHORIZED,
};
use cosmo_protocol::{IdentityError, Principal};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::product_catalog::CatalogError;
use crate::reward_token::TokenError;
use crate::settlement_escrow::EscrowError;

/// Discriminant of a [`StoreError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Unauthorized,
    NotFound,
    InvalidArgument,
    InsufficientStock,
    InsufficientFunds,
    InsufficientBalance,
    InsufficientEscrow,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Unauthorized => "unauthorized",
            ErrorKind::NotFound => "not_found",
            ErrorKind::InvalidArgument => "invalid_argument",
            ErrorKind::InsufficientStock => "insufficient_stock",
            ErrorKind::InsufficientFunds => "insufficient_funds",
            ErrorKind::InsufficientBalance => "insufficient_balance",
            ErrorKind::InsufficientEscrow => "insufficient_escrow",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a store operation was aborted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("insufficient stock for '{key}': requested {requested}, available {available}")]
    InsufficientStock {
        key: String,
        requested: u64,
        available: u64,
    },

    #[error("insufficient funds: {holder} has {available}, needs {required}")]
    InsufficientFunds {
        holder: Principal,
        available: u64,
        required: u64,
    },

    #[error("insufficient balance: {holder} has {balance}, needs {amount}")]
    InsufficientBalance {
        holder: Principal,
        balance: u64,
        amount: u64,
    },

    #[error("insufficient escrow: requested {requested}, available {available}")]
    InsufficientEscrow { requested: u64, available: u64 },
}

impl StoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StoreError::Unauthorized(_) => ErrorKind::Unauthorized,
            StoreError::NotFound(_) => ErrorKind::NotFound,
            StoreError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            StoreError::InsufficientStock { .. } => ErrorKind::InsufficientStock,
            StoreError::InsufficientFunds { .. } => ErrorKind::InsufficientFunds,
            StoreError::InsufficientBalance { .. } => ErrorKind::InsufficientBalance,
            StoreError::InsufficientEscrow { .. } => ErrorKind::InsufficientEscrow,
        }
    }

    /// Numeric result code, as in `(err u404)`.
    pub fn code(&self) -> u64 {
        match self.kind() {
            ErrorKind::Unauthorized => ERR_UNAUTHORIZED,
            ErrorKind::NotFound => ERR_NOT_FOUND,
            ErrorKind::InvalidArgument => ERR_INVALID_ARGUMENT,
            ErrorKind::InsufficientStock => ERR_INSUFFICIENT_STOCK,
            ErrorKind::InsufficientFunds => ERR_INSUFFICIENT_FUNDS,
            ErrorKind::InsufficientBalance => ERR_INSUFFICIENT_BALANCE,
            ErrorKind::InsufficientEscrow => ERR_INSUFFICIENT_ESCROW,
        }
    }
}

impl From<CatalogError> for StoreError {
    fn from(e: CatalogError) -> Self {
        match e {
            CatalogError::Unauthorized(_) => StoreError::Unauthorized(e.to_string()),
            CatalogError::NotFound(key) => StoreError::NotFound(format!("product '{key}'")),
            CatalogError::InvalidArgument(msg) => StoreError::InvalidArgument(msg),
            CatalogError::InsufficientStock {
                key,
                requested,
                available,
            } => StoreError::InsufficientStock {
                key,
                requested,
                available,
            },
        }
    }
}

impl From<TokenError> for StoreError {
    fn from(e: TokenError) -> Self {
        match e {
            TokenError::Unauthorized { .. } => StoreError::Unauthorized(e.to_string()),
            TokenError::InvalidArgument(msg) => StoreError::InvalidArgument(msg.to_string()),
            TokenError::InsufficientBalance {
                holder,
                balance,
                amount,
            } => StoreError::InsufficientBalance {
                holder,
                balance,
                amount,
            },
            TokenError::SupplyOverflow { .. } => StoreError::InvalidArgument(e.to_string()),
        }
    }
}

impl From<EscrowError> for StoreError {
    fn from(e: EscrowError) -> Self {
        match e {
            EscrowError::InsufficientFunds {
                holder,
                available,
                required,
            } => StoreError::InsufficientFunds {
                holder,
                available,
                required,
            },
            EscrowError::InsufficientEscrow {
                requested,
                available,
            } => StoreError::InsufficientEscrow {
                requested,
                available,
            },
            EscrowError::ZeroAmount | EscrowError::AmountOverflow => {
                StoreError::InvalidArgument(e.to_string())
            }
        }
    }
}

impl From<IdentityError> for StoreError {
    fn from(e: IdentityError) -> Self {
        StoreError::InvalidArgument(format!("principal: {e}"))
    }
}
