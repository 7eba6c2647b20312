//! # Settlement Escrow
//!
//! Holds the settlement currency paid for purchases. Every unit held backs
//! exactly `reward_rate` outstanding reward tokens; redemption pays units
//! back out.
//!
//! The currency itself lives outside the ledger. [`CurrencyWallets`] models
//! those external balances so that a purchase can fail with
//! `InsufficientFunds` and a redemption has somewhere to pay into. Every
//! movement between a wallet and the escrow produces a `CurrencyTransfer`
//! event naming the store principal as the escrow side.

use cosmo_protocol::Principal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

use crate::events::LedgerEvent;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can occur during escrow and wallet operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EscrowError {
    /// The paying wallet cannot cover the amount.
    #[error("insufficient funds: {holder} has {available}, needs {required}")]
    InsufficientFunds {
        holder: Principal,
        available: u64,
        required: u64,
    },

    /// Tried to pay out more than the escrow holds.
    #[error("insufficient escrowed funds: requested {requested}, available {available}")]
    InsufficientEscrow { requested: u64, available: u64 },

    /// Zero amounts move nothing and are refused.
    #[error("amount must be positive")]
    ZeroAmount,

    /// A balance would exceed `u64::MAX`.
    #[error("amount overflow: operation would exceed u64::MAX")]
    AmountOverflow,
}

// ---------------------------------------------------------------------------
// CurrencyWallets
// ---------------------------------------------------------------------------

/// External settlement-currency balances, keyed by holder.
///
/// Empty wallets are removed so equal balances mean equal maps.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrencyWallets {
    balances: BTreeMap<Principal, u64>,
}

impl CurrencyWallets {
    /// Wallets seeded from a genesis allocation. Zero allocations are skipped.
    pub fn from_allocations(allocations: &BTreeMap<Principal, u64>) -> Self {
        Self {
            balances: allocations
                .iter()
                .filter(|(_, &amount)| amount > 0)
                .map(|(holder, &amount)| (holder.clone(), amount))
                .collect(),
        }
    }

    pub fn balance_of(&self, holder: &Principal) -> u64 {
        self.balances.get(holder).copied().unwrap_or(0)
    }

    pub fn credit(&mut self, holder: &Principal, amount: u64) -> Result<(), EscrowError> {
        let current = self.balance_of(holder);
        let updated = current
            .checked_add(amount)
            .ok_or(EscrowError::AmountOverflow)?;
        if updated > 0 {
            self.balances.insert(holder.clone(), updated);
        }
        Ok(())
    }

    pub fn debit(&mut self, holder: &Principal, amount: u64) -> Result<(), EscrowError> {
        let available = self.balance_of(holder);
        if available < amount {
            return Err(EscrowError::InsufficientFunds {
                holder: holder.clone(),
                available,
                required: amount,
            });
        }
        let remaining = available - amount;
        if remaining == 0 {
            self.balances.remove(holder);
        } else {
            self.balances.insert(holder.clone(), remaining);
        }
        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Principal, u64)> {
        self.balances.iter().map(|(p, &b)| (p, b))
    }

    pub(crate) fn restore_balance(&mut self, holder: Principal, balance: u64) {
        if balance == 0 {
            self.balances.remove(&holder);
        } else {
            self.balances.insert(holder, balance);
        }
    }
}

// ---------------------------------------------------------------------------
// SettlementEscrow
// ---------------------------------------------------------------------------

/// Running total of currency held by the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementEscrow {
    /// Principal that holds the escrow (the store contract).
    custodian: Principal,
    total: u64,
}

impl SettlementEscrow {
    pub fn new(custodian: Principal) -> Self {
        Self {
            custodian,
            total: 0,
        }
    }

    /// Moves `amount` from `from`'s wallet into the escrow.
    ///
    /// # Errors
    ///
    /// [`EscrowError::InsufficientFunds`] if the wallet is short,
    /// [`EscrowError::AmountOverflow`] if the escrow total would overflow.
    /// Nothing is changed on error.
    pub fn deposit(
        &mut self,
        wallets: &mut CurrencyWallets,
        from: &Principal,
        amount: u64,
    ) -> Result<LedgerEvent, EscrowError> {
        if amount == 0 {
            return Err(EscrowError::ZeroAmount);
        }
        let new_total = self
            .total
            .checked_add(amount)
            .ok_or(EscrowError::AmountOverflow)?;
        wallets.debit(from, amount)?;
        self.total = new_total;

        Ok(LedgerEvent::CurrencyTransfer {
            sender: from.clone(),
            recipient: self.custodian.clone(),
            amount,
        })
    }

    /// Pays `amount` out of the escrow into `to`'s wallet.
    ///
    /// # Errors
    ///
    /// [`EscrowError::InsufficientEscrow`] if the escrow holds less than
    /// `amount`. Nothing is changed on error.
    pub fn withdraw(
        &mut self,
        wallets: &mut CurrencyWallets,
        to: &Principal,
        amount: u64,
    ) -> Result<LedgerEvent, EscrowError> {
        if amount == 0 {
            return Err(EscrowError::ZeroAmount);
        }
        if amount > self.total {
            return Err(EscrowError::InsufficientEscrow {
                requested: amount,
                available: self.total,
            });
        }
        wallets.credit(to, amount)?;
        self.total -= amount;

        Ok(LedgerEvent::CurrencyTransfer {
            sender: self.custodian.clone(),
            recipient: to.clone(),
            amount,
        })
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub(crate) fn restore_total(&mut self, total: u64) {
        self.total = total;
    }
}
