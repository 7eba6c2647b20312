//! # Reward Token Contract
//!
//! The fungible loyalty token minted to buyers and burned on redemption.
//!
//! ## Security Model
//!
//! - **Mint gating**: minting requires either the token owner as the
//!   transaction sender, or a contract on the valid-caller allowlist as the
//!   immediate caller. The store contract is added to that list so that any
//!   customer's purchase can mint.
//! - **Burn authorization**: only the holder's own balance is ever burned;
//!   there is no admin burn.
//! - **Supply tracking**: total supply and per-holder balances move together
//!   and every addition is overflow-checked.
//!
//! Holders with a zero balance are dropped from the balance map, so two
//! ledgers with the same balances compare equal regardless of history.

use cosmo_protocol::Principal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

use crate::events::LedgerEvent;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can occur during token operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    /// Caller may not perform this operation.
    #[error("unauthorized: {caller} may not {action}")]
    Unauthorized {
        caller: Principal,
        action: &'static str,
    },

    /// Zero amount, self-transfer, or similar.
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    /// Holder has fewer tokens than requested.
    #[error("insufficient balance: {holder} has {balance}, needs {amount}")]
    InsufficientBalance {
        holder: Principal,
        balance: u64,
        amount: u64,
    },

    /// A supply or balance would exceed `u64::MAX`.
    #[error("supply overflow: minting {amount} would exceed u64::MAX")]
    SupplyOverflow { amount: u64 },
}

// ---------------------------------------------------------------------------
// RewardToken
// ---------------------------------------------------------------------------

/// Per-holder reward-token balances.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardToken {
    /// Deployer; always allowed to mint and to manage the allowlist.
    owner: Principal,
    /// `<token-principal>::<token-name>`, stamped on every event.
    asset: String,
    balances: BTreeMap<Principal, u64>,
    total_supply: u64,
    /// Contracts allowed to mint on behalf of arbitrary senders.
    valid_callers: BTreeSet<Principal>,
}

impl RewardToken {
    pub fn new(owner: Principal, asset: String) -> Self {
        Self {
            owner,
            asset,
            balances: BTreeMap::new(),
            total_supply: 0,
            valid_callers: BTreeSet::new(),
        }
    }

    /// Deploy-time allowlist entry, used when the store registers itself.
    pub fn with_valid_caller(mut self, contract: Principal) -> Self {
        self.valid_callers.insert(contract);
        self
    }

    /// Adds `contract` to the mint allowlist. Owner only.
    pub fn add_valid_caller(
        &mut self,
        caller: &Principal,
        contract: &Principal,
    ) -> Result<LedgerEvent, TokenError> {
        self.require_owner(caller, "add a valid contract caller")?;
        self.valid_callers.insert(contract.clone());
        Ok(LedgerEvent::ValidCallerAdded {
            contract: contract.clone(),
        })
    }

    /// Removes `contract` from the mint allowlist. Owner only; removing an
    /// absent entry is not an error.
    pub fn remove_valid_caller(
        &mut self,
        caller: &Principal,
        contract: &Principal,
    ) -> Result<LedgerEvent, TokenError> {
        self.require_owner(caller, "remove a valid contract caller")?;
        self.valid_callers.remove(contract);
        Ok(LedgerEvent::ValidCallerRemoved {
            contract: contract.clone(),
        })
    }

    pub fn is_valid_caller(&self, contract: &Principal) -> bool {
        self.valid_callers.contains(contract)
    }

    /// Whether a call with this sender/caller pair may mint.
    pub fn can_mint(&self, tx_sender: &Principal, contract_caller: &Principal) -> bool {
        *tx_sender == self.owner || self.is_valid_caller(contract_caller)
    }

    /// Credits `amount` new tokens to `recipient`.
    ///
    /// # Errors
    ///
    /// [`TokenError::Unauthorized`] if neither the sender nor the calling
    /// contract may mint, [`TokenError::InvalidArgument`] for a zero amount,
    /// [`TokenError::SupplyOverflow`] if supply would overflow.
    pub fn mint(
        &mut self,
        tx_sender: &Principal,
        contract_caller: &Principal,
        recipient: &Principal,
        amount: u64,
    ) -> Result<LedgerEvent, TokenError> {
        if !self.can_mint(tx_sender, contract_caller) {
            return Err(TokenError::Unauthorized {
                caller: contract_caller.clone(),
                action: "mint reward tokens",
            });
        }
        if amount == 0 {
            return Err(TokenError::InvalidArgument("mint amount must be positive"));
        }

        let new_supply = self
            .total_supply
            .checked_add(amount)
            .ok_or(TokenError::SupplyOverflow { amount })?;
        // Every balance is bounded by the supply, so this cannot overflow
        // once the supply check passed.
        let balance = self.balances.entry(recipient.clone()).or_insert(0);
        *balance += amount;
        self.total_supply = new_supply;

        Ok(LedgerEvent::FtMint {
            asset: self.asset.clone(),
            recipient: recipient.clone(),
            amount,
        })
    }

    /// Destroys `amount` tokens held by `holder`.
    pub fn burn(&mut self, holder: &Principal, amount: u64) -> Result<LedgerEvent, TokenError> {
        if amount == 0 {
            return Err(TokenError::InvalidArgument("burn amount must be positive"));
        }
        self.debit(holder, amount)?;
        self.total_supply -= amount;

        Ok(LedgerEvent::FtBurn {
            asset: self.asset.clone(),
            sender: holder.clone(),
            amount,
        })
    }

    /// Moves `amount` tokens from `from` to `to`.
    ///
    /// Zero amounts and self-transfers are rejected rather than treated as
    /// silent no-ops.
    pub fn transfer(
        &mut self,
        from: &Principal,
        to: &Principal,
        amount: u64,
    ) -> Result<LedgerEvent, TokenError> {
        if amount == 0 {
            return Err(TokenError::InvalidArgument(
                "transfer amount must be positive",
            ));
        }
        if from == to {
            return Err(TokenError::InvalidArgument(
                "sender and recipient must differ",
            ));
        }
        self.debit(from, amount)?;
        *self.balances.entry(to.clone()).or_insert(0) += amount;

        Ok(LedgerEvent::FtTransfer {
            asset: self.asset.clone(),
            sender: from.clone(),
            recipient: to.clone(),
            amount,
        })
    }

    /// Balance of `holder`, zero if never seen.
    pub fn balance_of(&self, holder: &Principal) -> u64 {
        self.balances.get(holder).copied().unwrap_or(0)
    }

    pub fn total_supply(&self) -> u64 {
        self.total_supply
    }

    /// Sum of all balances. Equal to [`total_supply`](Self::total_supply)
    /// unless the ledger is corrupt.
    pub fn balance_sum(&self) -> u128 {
        self.balances.values().map(|&b| u128::from(b)).sum()
    }

    // Checkpoint restore. Zero balances are dropped, as everywhere else.

    pub(crate) fn restore_balance(&mut self, holder: Principal, balance: u64) {
        if balance == 0 {
            self.balances.remove(&holder);
        } else {
            self.balances.insert(holder, balance);
        }
    }

    pub(crate) fn restore_supply(&mut self, total_supply: u64) {
        self.total_supply = total_supply;
    }

    pub(crate) fn restore_valid_caller(&mut self, contract: Principal, allowed: bool) {
        if allowed {
            self.valid_callers.insert(contract);
        } else {
            self.valid_callers.remove(&contract);
        }
    }

    pub fn asset(&self) -> &str {
        &self.asset
    }


    fn debit(&mut self, holder: &Principal, amount: u64) -> Result<(), TokenError> {
        let balance = self.balance_of(holder);
        if balance < amount {
            return Err(TokenError::InsufficientBalance {
                holder: holder.clone(),
                balance,
                amount,
            });
        }
        if balance == amount {
            self.balances.remove(holder);
        } else {
            self.balances.insert(holder.clone(), balance - amount);
        }
        Ok(())
    }

    fn require_owner(&self, caller: &Principal, action: &'static str) -> Result<(), TokenError> {
        if *caller != self.owner {
            return Err(TokenError::Unauthorized {
                caller: caller.clone(),
                action,
            });
        }
        Ok(())
    }
}
