//! # Product Store Contract
//!
//! The entry point of the ledger. Composes the catalog, the reward token,
//! and the settlement escrow into the compound operations customers see:
//! buy a product and earn tokens, move tokens around, redeem tokens for
//! currency.
//!
//! ## Atomicity
//!
//! Every state-changing operation runs in two phases:
//!
//! ```text
//! Idle ──► Validating ──► Applying ──► Idle
//!              │              │
//!              └──────────────┴──► Aborted (state restored)
//! ```
//!
//! Validation reads the state and checks every precondition before anything
//! is touched, and names the entries the operation may write: product
//! listings, holders (token balance and wallet), and allowlist entries.
//! Before applying, the prior values of exactly those entries are saved
//! along with the escrow and supply totals, so a checkpoint costs the size of
//! the operation, not the size of the ledger. Applying then mutates the
//! components in order; if it fails, the checkpoint is written back. Events
//! are staged until commit, so an aborted operation leaves no trace in the
//! state or the log.
//!
//! ## Conservation
//!
//! After every committed operation:
//!
//! ```text
//! sum(token balances) == total_supply == escrow.total * reward_rate
//! ```
//!
//! Mints happen only alongside an escrow deposit and burns only alongside
//! an escrow withdrawal, at the same rate. [`ProductStore::check_invariants`]
//! verifies this and is asserted after every commit in debug builds.

use cosmo_protocol::config::STATUS_OK;
use cosmo_protocol::Principal;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::config::{ConfigError, PricingPolicy, StoreConfig};
use crate::error::StoreError;
use crate::events::{EventLog, EventRecord, LedgerEvent, LogIntegrityError};
use crate::operation::Operation;
use crate::product_catalog::{Product, ProductCatalog, ProductKey};
use crate::reward_token::RewardToken;
use crate::settlement_escrow::{CurrencyWallets, SettlementEscrow};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// The complete mutable state of a ledger instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerState {
    pub catalog: ProductCatalog,
    pub token: RewardToken,
    pub escrow: SettlementEscrow,
    pub wallets: CurrencyWallets,
}

/// Result of a committed operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    /// Status code for writes, the requested value for reads.
    pub value: u64,
    /// Records appended to the log by this operation, in order.
    pub events: Vec<EventRecord>,
}

impl Receipt {
    fn read(value: u64) -> Self {
        Self {
            value,
            events: Vec::new(),
        }
    }
}

/// Lifecycle of a single request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Validating,
    Applying,
    Aborted,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Idle => write!(f, "idle"),
            Phase::Validating => write!(f, "validating"),
            Phase::Applying => write!(f, "applying"),
            Phase::Aborted => write!(f, "aborted"),
        }
    }
}

/// Persistable form of a store: its configuration and state. The event log
/// is persisted separately, record by record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreSnapshot {
    pub config: StoreConfig,
    pub state: LedgerState,
}

/// A conservation invariant does not hold.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvariantViolation {
    #[error("balances sum to {sum} but total supply is {supply}")]
    BalanceSumMismatch { sum: u128, supply: u64 },

    #[error("supply {supply} is not backed by escrow {escrow} at rate {reward_rate}")]
    UnbackedSupply {
        supply: u64,
        escrow: u64,
        reward_rate: u64,
    },
}

/// Errors when rebuilding a store from persisted data.
#[derive(Debug, Error)]
pub enum RestoreError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("event log: {0}")]
    Log(#[from] LogIntegrityError),

    #[error("restored state is inconsistent: {0}")]
    Invariant(#[from] InvariantViolation),
}

/// Values shared by every operation, borrowed alongside the mutable state.
struct Context<'a> {
    store: &'a Principal,
    reward_rate: u64,
    pricing: PricingPolicy,
}

/// Entries an operation may write. Only these are checkpointed.
#[derive(Debug, Default)]
struct Footprint {
    products: Vec<ProductKey>,
    holders: Vec<Principal>,
    callers: Vec<Principal>,
}

impl Footprint {
    fn product(mut self, key: &ProductKey) -> Self {
        self.products.push(key.clone());
        self
    }

    /// Covers both the token balance and the currency wallet of `holder`.
    fn holder(mut self, holder: &Principal) -> Self {
        self.holders.push(holder.clone());
        self
    }

    fn caller(mut self, contract: &Principal) -> Self {
        self.callers.push(contract.clone());
        self
    }
}

/// Prior values of a [`Footprint`], plus the escrow and supply totals.
#[derive(Debug)]
struct Checkpoint {
    products: Vec<(ProductKey, Option<Product>)>,
    /// Holder, token balance, wallet balance.
    holders: Vec<(Principal, u64, u64)>,
    callers: Vec<(Principal, bool)>,
    escrow_total: u64,
    token_supply: u64,
}

impl Checkpoint {
    fn capture(state: &LedgerState, footprint: Footprint) -> Self {
        Self {
            products: footprint
                .products
                .into_iter()
                .map(|key| {
                    let entry = state.catalog.get_product(&key).copied();
                    (key, entry)
                })
                .collect(),
            holders: footprint
                .holders
                .into_iter()
                .map(|holder| {
                    let tokens = state.token.balance_of(&holder);
                    let wallet = state.wallets.balance_of(&holder);
                    (holder, tokens, wallet)
                })
                .collect(),
            callers: footprint
                .callers
                .into_iter()
                .map(|contract| {
                    let allowed = state.token.is_valid_caller(&contract);
                    (contract, allowed)
                })
                .collect(),
            escrow_total: state.escrow.total(),
            token_supply: state.token.total_supply(),
        }
    }

    fn restore(self, state: &mut LedgerState) {
        for (key, entry) in self.products {
            state.catalog.restore_entry(key, entry);
        }
        for (holder, tokens, wallet) in self.holders {
            state.token.restore_balance(holder.clone(), tokens);
            state.wallets.restore_balance(holder, wallet);
        }
        for (contract, allowed) in self.callers {
            state.token.restore_valid_caller(contract, allowed);
        }
        state.escrow.restore_total(self.escrow_total);
        state.token.restore_supply(self.token_supply);
    }
}

/// Validated purchase, ready to apply.
struct PurchasePlan {
    key: ProductKey,
    cost: u64,
    tokens: u64,
}

// ---------------------------------------------------------------------------
// ProductStore
// ---------------------------------------------------------------------------

/// A single ledger instance.
///
/// Methods take `&mut self` and run to completion; callers that share a store
/// across threads must serialize access (the node wraps it in one mutex).
#[derive(Debug, Clone)]
pub struct ProductStore {
    config: StoreConfig,
    principal: Principal,
    state: LedgerState,
    log: EventLog,
}

impl ProductStore {
    /// Deploys a fresh store.
    ///
    /// Genesis wallet allocations and, if configured, the store's own mint
    /// permission are recorded as the first events in the log.
    pub fn new(config: StoreConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let principal = config.store_principal()?;
        let asset = config.asset_identifier()?;

        let mut token = RewardToken::new(config.owner.clone(), asset);
        let mut genesis = Vec::new();
        if config.register_store_as_minter {
            token = token.with_valid_caller(principal.clone());
            genesis.push(LedgerEvent::ValidCallerAdded {
                contract: principal.clone(),
            });
        }
        let wallets = CurrencyWallets::from_allocations(&config.genesis_wallets);
        genesis.extend(wallets.iter().map(|(holder, amount)| LedgerEvent::CurrencyMint {
            recipient: holder.clone(),
            amount,
        }));

        let state = LedgerState {
            catalog: ProductCatalog::new(config.owner.clone(), config.pricing, config.restock),
            token,
            escrow: SettlementEscrow::new(principal.clone()),
            wallets,
        };
        let mut log = EventLog::new();
        log.append_all(genesis);

        tracing::info!(
            owner = %config.owner,
            store = %principal,
            reward_rate = config.reward_rate,
            pricing = ?config.pricing,
            "product store deployed"
        );

        Ok(Self {
            config,
            principal,
            state,
            log,
        })
    }

    /// Rebuilds a store from a snapshot and its persisted event log.
    pub fn from_snapshot(
        snapshot: StoreSnapshot,
        records: Vec<EventRecord>,
    ) -> Result<Self, RestoreError> {
        snapshot.config.validate()?;
        let principal = snapshot.config.store_principal()?;
        let store = Self {
            config: snapshot.config,
            principal,
            state: snapshot.state,
            log: EventLog::from_records(records)?,
        };
        store.check_invariants()?;
        tracing::info!(events = store.log.len(), "product store restored");
        Ok(store)
    }

    pub fn snapshot(&self) -> StoreSnapshot {
        StoreSnapshot {
            config: self.config.clone(),
            state: self.state.clone(),
        }
    }

    // -- Catalog ------------------------------------------------------------

    /// Lists or updates a product. Owner only.
    pub fn add_product(
        &mut self,
        caller: &Principal,
        key: &str,
        quantity: u64,
        unit_price: u64,
    ) -> Result<Receipt, StoreError> {
        self.transact(
            "add_product",
            |state, _| {
                let key = ProductKey::new(key)?;
                if *caller != *state.catalog.owner() {
                    return Err(StoreError::Unauthorized(
                        "only the store owner can add products".into(),
                    ));
                }
                let footprint = Footprint::default().product(&key);
                Ok((key, footprint))
            },
            |state, _, key, staged| {
                let status = state.catalog.add_product(caller, &key, quantity, unit_price)?;
                if let Some(product) = state.catalog.get_product(&key) {
                    staged.push(LedgerEvent::ProductListed {
                        key: key.to_string(),
                        stock: product.stock,
                        unit_price: product.unit_price,
                    });
                }
                Ok(status)
            },
        )
    }

    /// Removes a product. Owner only.
    pub fn delete_product(&mut self, caller: &Principal, key: &str) -> Result<Receipt, StoreError> {
        self.transact(
            "delete_product",
            |state, _| {
                let key = ProductKey::new(key)?;
                if *caller != *state.catalog.owner() {
                    return Err(StoreError::Unauthorized(
                        "only the store owner can delete products".into(),
                    ));
                }
                if state.catalog.get_product(&key).is_none() {
                    return Err(StoreError::NotFound(format!("product '{key}'")));
                }
                let footprint = Footprint::default().product(&key);
                Ok((key, footprint))
            },
            |state, _, key, staged| {
                let status = state.catalog.delete_product(caller, &key)?;
                staged.push(LedgerEvent::ProductDelisted {
                    key: key.to_string(),
                });
                Ok(status)
            },
        )
    }

    /// Quoted price of a product. Read only.
    pub fn get_product_price(&self, key: &str) -> Result<u64, StoreError> {
        let key = ProductKey::new(key)?;
        Ok(self.state.catalog.get_product_price(&key)?)
    }

    pub fn get_product(&self, key: &str) -> Option<&Product> {
        ProductKey::new(key)
            .ok()
            .and_then(|key| self.state.catalog.get_product(&key))
    }

    // -- Purchases ----------------------------------------------------------

    /// Buys `quantity` units of `key` for `buyer`.
    ///
    /// Takes the items out of stock, moves the settlement cost from the
    /// buyer's wallet into escrow, and mints `cost * reward_rate` tokens to
    /// the buyer. A zero-cost purchase moves stock only.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` for a bad key or zero quantity, `NotFound`,
    /// `InsufficientStock`, `InsufficientFunds`, or `Unauthorized` if the
    /// store is not allowed to mint for this buyer. The store is unchanged
    /// on any error.
    pub fn buy_product(
        &mut self,
        buyer: &Principal,
        key: &str,
        quantity: u64,
    ) -> Result<Receipt, StoreError> {
        self.transact(
            "buy_product",
            |state, ctx| {
                let key = ProductKey::new(key)?;
                if quantity == 0 {
                    return Err(StoreError::InvalidArgument(
                        "quantity must be positive".into(),
                    ));
                }
                let product = state
                    .catalog
                    .get_product(&key)
                    .ok_or_else(|| StoreError::NotFound(format!("product '{key}'")))?;
                if quantity > product.stock {
                    return Err(StoreError::InsufficientStock {
                        key: key.to_string(),
                        requested: quantity,
                        available: product.stock,
                    });
                }
                let cost = ctx
                    .pricing
                    .settlement_cost(product.unit_price, quantity)
                    .ok_or_else(|| {
                        StoreError::InvalidArgument("settlement cost overflows".into())
                    })?;
                // Zero cost mints nothing.
                let tokens = cost.checked_mul(ctx.reward_rate).ok_or_else(|| {
                    StoreError::InvalidArgument("reward amount overflows".into())
                })?;
                if cost > 0 {
                    let available = state.wallets.balance_of(buyer);
                    if available < cost {
                        return Err(StoreError::InsufficientFunds {
                            holder: buyer.clone(),
                            available,
                            required: cost,
                        });
                    }
                    if !state.token.can_mint(buyer, ctx.store) {
                        return Err(StoreError::Unauthorized(format!(
                            "{} is not a valid contract caller of the reward token",
                            ctx.store
                        )));
                    }
                }
                let footprint = Footprint::default().product(&key).holder(buyer);
                Ok((PurchasePlan { key, cost, tokens }, footprint))
            },
            |state, ctx, plan, staged| {
                state.catalog.decrement_stock(&plan.key, quantity)?;
                if plan.cost > 0 {
                    staged.push(state.escrow.deposit(&mut state.wallets, buyer, plan.cost)?);
                    staged.push(state.token.mint(buyer, ctx.store, buyer, plan.tokens)?);
                }
                staged.push(LedgerEvent::Purchase {
                    buyer: buyer.clone(),
                    key: plan.key.to_string(),
                    quantity,
                    cost: plan.cost,
                    tokens_minted: plan.tokens,
                });
                Ok(STATUS_OK)
            },
        )
    }

    // -- Reward tokens ------------------------------------------------------

    /// Moves `amount` reward tokens from `sender` to `recipient`.
    pub fn transfer_reward_tokens(
        &mut self,
        sender: &Principal,
        amount: u64,
        recipient: &Principal,
    ) -> Result<Receipt, StoreError> {
        self.transact(
            "transfer_reward_tokens",
            |_, _| Ok(((), Footprint::default().holder(sender).holder(recipient))),
            |state, _, (), staged| {
                staged.push(state.token.transfer(sender, recipient, amount)?);
                Ok(STATUS_OK)
            },
        )
    }

    /// Burns `amount` tokens held by `holder` and pays out
    /// `amount / reward_rate` currency units from escrow.
    ///
    /// `amount` must be a positive multiple of the reward rate.
    pub fn redeem_reward_tokens(
        &mut self,
        holder: &Principal,
        amount: u64,
    ) -> Result<Receipt, StoreError> {
        self.transact(
            "redeem_reward_tokens",
            |state, ctx| {
                if amount == 0 || amount % ctx.reward_rate != 0 {
                    return Err(StoreError::InvalidArgument(format!(
                        "redeemed amount must be a positive multiple of {}",
                        ctx.reward_rate
                    )));
                }
                let balance = state.token.balance_of(holder);
                if balance < amount {
                    return Err(StoreError::InsufficientBalance {
                        holder: holder.clone(),
                        balance,
                        amount,
                    });
                }
                let payout = amount / ctx.reward_rate;
                if payout > state.escrow.total() {
                    return Err(StoreError::InsufficientEscrow {
                        requested: payout,
                        available: state.escrow.total(),
                    });
                }
                Ok((payout, Footprint::default().holder(holder)))
            },
            |state, _, payout, staged| {
                staged.push(state.token.burn(holder, amount)?);
                staged.push(state.escrow.withdraw(&mut state.wallets, holder, payout)?);
                staged.push(LedgerEvent::Redemption {
                    holder: holder.clone(),
                    tokens_burned: amount,
                    currency_paid: payout,
                });
                Ok(STATUS_OK)
            },
        )
    }

    /// Reward-token balance of `holder`.
    pub fn get_bonus_points_count(&self, holder: &Principal) -> u64 {
        self.state.token.balance_of(holder)
    }

    /// Allows `contract` to mint reward tokens. Owner only.
    pub fn add_valid_contract_caller(
        &mut self,
        caller: &Principal,
        contract: &Principal,
    ) -> Result<Receipt, StoreError> {
        self.transact(
            "add_valid_contract_caller",
            |_, _| Ok(((), Footprint::default().caller(contract))),
            |state, _, (), staged| {
                staged.push(state.token.add_valid_caller(caller, contract)?);
                Ok(STATUS_OK)
            },
        )
    }

    /// Revokes `contract`'s permission to mint. Owner only.
    pub fn remove_valid_contract_caller(
        &mut self,
        caller: &Principal,
        contract: &Principal,
    ) -> Result<Receipt, StoreError> {
        self.transact(
            "remove_valid_contract_caller",
            |_, _| Ok(((), Footprint::default().caller(contract))),
            |state, _, (), staged| {
                staged.push(state.token.remove_valid_caller(caller, contract)?);
                Ok(STATUS_OK)
            },
        )
    }

    // -- Settlement wallets -------------------------------------------------

    /// Credits settlement currency to `holder`'s wallet from outside the
    /// ledger. Owner only.
    pub fn fund_wallet(
        &mut self,
        caller: &Principal,
        holder: &Principal,
        amount: u64,
    ) -> Result<Receipt, StoreError> {
        self.transact(
            "fund_wallet",
            |state, _| {
                if *caller != *state.catalog.owner() {
                    return Err(StoreError::Unauthorized(
                        "only the store owner can fund wallets".into(),
                    ));
                }
                if amount == 0 {
                    return Err(StoreError::InvalidArgument(
                        "funding amount must be positive".into(),
                    ));
                }
                Ok(((), Footprint::default().holder(holder)))
            },
            |state, _, (), staged| {
                state.wallets.credit(holder, amount)?;
                staged.push(LedgerEvent::CurrencyMint {
                    recipient: holder.clone(),
                    amount,
                });
                Ok(STATUS_OK)
            },
        )
    }

    pub fn wallet_balance(&self, holder: &Principal) -> u64 {
        self.state.wallets.balance_of(holder)
    }

    // -- Dispatch -----------------------------------------------------------

    /// Applies a serialized [`Operation`]. Reads return a receipt with no
    /// events.
    pub fn execute(&mut self, op: &Operation) -> Result<Receipt, StoreError> {
        match op {
            Operation::AddProduct {
                caller,
                key,
                quantity,
                unit_price,
            } => self.add_product(caller, key, *quantity, *unit_price),
            Operation::DeleteProduct { caller, key } => self.delete_product(caller, key),
            Operation::GetProductPrice { key } => self.get_product_price(key).map(Receipt::read),
            Operation::BuyProduct {
                caller,
                key,
                quantity,
            } => self.buy_product(caller, key, *quantity),
            Operation::TransferRewardTokens {
                caller,
                amount,
                recipient,
            } => self.transfer_reward_tokens(caller, *amount, recipient),
            Operation::RedeemRewardTokens { caller, amount } => {
                self.redeem_reward_tokens(caller, *amount)
            }
            Operation::GetBonusPointsCount { caller } => {
                Ok(Receipt::read(self.get_bonus_points_count(caller)))
            }
            Operation::AddValidContractCaller { caller, contract } => {
                self.add_valid_contract_caller(caller, contract)
            }
            Operation::RemoveValidContractCaller { caller, contract } => {
                self.remove_valid_contract_caller(caller, contract)
            }
            Operation::FundWallet {
                caller,
                holder,
                amount,
            } => self.fund_wallet(caller, holder, *amount),
        }
    }

    // -- Inspection ---------------------------------------------------------

    /// Verifies the conservation invariants.
    pub fn check_invariants(&self) -> Result<(), InvariantViolation> {
        let supply = self.state.token.total_supply();
        let sum = self.state.token.balance_sum();
        if sum != u128::from(supply) {
            return Err(InvariantViolation::BalanceSumMismatch { sum, supply });
        }
        let escrow = self.state.escrow.total();
        let backing = u128::from(escrow) * u128::from(self.config.reward_rate);
        if backing != u128::from(supply) {
            return Err(InvariantViolation::UnbackedSupply {
                supply,
                escrow,
                reward_rate: self.config.reward_rate,
            });
        }
        Ok(())
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// The store's own contract principal (the escrow custodian).
    pub fn principal(&self) -> &Principal {
        &self.principal
    }

    pub fn state(&self) -> &LedgerState {
        &self.state
    }

    pub fn events(&self) -> &EventLog {
        &self.log
    }

    pub fn escrow_total(&self) -> u64 {
        self.state.escrow.total()
    }

    pub fn token_supply(&self) -> u64 {
        self.state.token.total_supply()
    }

    // -- Internals ----------------------------------------------------------

    /// Runs one operation through validate → apply, committing staged events
    /// on success and restoring the footprint checkpoint if apply fails.
    fn transact<P, V, A>(
        &mut self,
        operation: &'static str,
        validate: V,
        apply: A,
    ) -> Result<Receipt, StoreError>
    where
        V: FnOnce(&LedgerState, &Context<'_>) -> Result<(P, Footprint), StoreError>,
        A: FnOnce(&mut LedgerState, &Context<'_>, P, &mut Vec<LedgerEvent>) -> Result<u64, StoreError>,
    {
        let ctx = Context {
            store: &self.principal,
            reward_rate: self.config.reward_rate,
            pricing: self.config.pricing,
        };
        let mut staged = Vec::new();

        tracing::debug!(operation, phase = %Phase::Validating, "phase transition");
        let outcome = validate(&self.state, &ctx).and_then(|(plan, footprint)| {
            let checkpoint = Checkpoint::capture(&self.state, footprint);
            tracing::debug!(operation, phase = %Phase::Applying, "phase transition");
            let applied = apply(&mut self.state, &ctx, plan, &mut staged);
            if applied.is_err() {
                checkpoint.restore(&mut self.state);
            }
            applied
        });

        match outcome {
            Ok(value) => {
                let events = self.log.append_all(staged);
                debug_assert_eq!(self.check_invariants(), Ok(()));
                tracing::info!(
                    operation,
                    value,
                    events = events.len(),
                    escrow = self.state.escrow.total(),
                    supply = self.state.token.total_supply(),
                    phase = %Phase::Idle,
                    "operation committed"
                );
                Ok(Receipt { value, events })
            }
            Err(err) => {
                tracing::warn!(
                    operation,
                    kind = %err.kind(),
                    error = %err,
                    phase = %Phase::Aborted,
                    "operation aborted"
                );
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn p(name: &str) -> Principal {
        Principal::new(name).unwrap()
    }

    fn owner() -> Principal {
        p("deployer")
    }

    fn store_with_candy() -> ProductStore {
        let config = StoreConfig::new(owner()).with_genesis_wallet(p("wallet_1"), 10_000);
        let mut store = ProductStore::new(config).unwrap();
        store.add_product(&owner(), "Candy", 10, 50).unwrap();
        store
    }

    #[test]
    fn genesis_records_minter_and_allocations() {
        let store = store_with_candy();
        let kinds: Vec<&str> = store
            .events()
            .records()
            .iter()
            .map(|r| r.event.kind())
            .collect();
        assert_eq!(
            kinds,
            vec!["valid_caller_added", "currency_mint", "product_listed"]
        );
        assert_eq!(store.wallet_balance(&p("wallet_1")), 10_000);
    }

    #[test]
    fn buy_settles_cost_and_mints_rewards() {
        let mut store = store_with_candy();
        let receipt = store.buy_product(&p("wallet_1"), "Candy", 10).unwrap();
        assert_eq!(receipt.value, STATUS_OK);
        assert_eq!(store.escrow_total(), 500);
        assert_eq!(store.get_bonus_points_count(&p("wallet_1")), 50_000);
        assert_eq!(store.wallet_balance(&p("wallet_1")), 9_500);
        assert_eq!(store.get_product("Candy").unwrap().stock, 0);
        assert!(store.check_invariants().is_ok());
    }

    #[test]
    fn failed_validation_appends_nothing() {
        let mut store = store_with_candy();
        let before_state = store.state().clone();
        let before_len = store.events().len();

        let err = store.buy_product(&p("wallet_1"), "Candy", 11).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InsufficientStock);
        assert_eq!(store.state(), &before_state);
        assert_eq!(store.events().len(), before_len);
    }

    #[test]
    fn failure_during_apply_restores_checkpoint() {
        // Validation passes and apply fails midway: the stock taken and the
        // currency deposited must come back.
        let mut store = store_with_candy();
        let before = store.state().clone();
        let result = store.transact(
            "forced_failure",
            |_, _| {
                let key = ProductKey::new("Candy")?;
                Ok(((), Footprint::default().product(&key).holder(&p("wallet_1"))))
            },
            |state, _, (), staged| {
                let key = ProductKey::new("Candy")?;
                state.catalog.decrement_stock(&key, 5)?;
                staged.push(state.escrow.deposit(&mut state.wallets, &p("wallet_1"), 250)?);
                Err(StoreError::Unauthorized("forced".into()))
            },
        );
        assert!(result.is_err());
        assert_eq!(store.state(), &before);
    }

    #[test]
    fn failed_apply_unlists_a_new_product_and_revokes_a_new_caller() {
        let mut store = store_with_candy();
        let before = store.state().clone();
        let gum = ProductKey::new("Gum").unwrap();
        let minter = p("deployer.minter");
        let result = store.transact(
            "forced_failure",
            |_, _| Ok(((), Footprint::default().product(&gum).caller(&minter))),
            |state, _, (), staged| {
                state.catalog.add_product(&owner(), &gum, 5, 1)?;
                staged.push(state.token.add_valid_caller(&owner(), &minter)?);
                Err(StoreError::InvalidArgument("forced".into()))
            },
        );
        assert!(result.is_err());
        assert_eq!(store.state(), &before);
        assert!(store.get_product("Gum").is_none());
    }

    #[test]
    fn checkpoint_size_follows_the_operation_not_the_ledger() {
        let mut store = store_with_candy();
        for i in 0..50 {
            store.add_product(&owner(), &format!("Item{i}"), 1, 1).unwrap();
        }
        let key = ProductKey::new("Candy").unwrap();
        let footprint = Footprint::default().product(&key).holder(&p("wallet_1"));
        let checkpoint = Checkpoint::capture(store.state(), footprint);
        assert_eq!(checkpoint.products.len(), 1);
        assert_eq!(checkpoint.holders, vec![(p("wallet_1"), 0, 10_000)]);
        assert!(checkpoint.callers.is_empty());
    }

    #[test]
    fn redeem_requires_whole_currency_units() {
        let mut store = store_with_candy();
        store.buy_product(&p("wallet_1"), "Candy", 1).unwrap();
        let err = store.redeem_reward_tokens(&p("wallet_1"), 150).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        let err = store.redeem_reward_tokens(&p("wallet_1"), 0).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn fund_wallet_is_owner_only() {
        let mut store = store_with_candy();
        let err = store.fund_wallet(&p("wallet_1"), &p("wallet_1"), 5).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unauthorized);
        store.fund_wallet(&owner(), &p("wallet_2"), 5).unwrap();
        assert_eq!(store.wallet_balance(&p("wallet_2")), 5);
    }

    #[test]
    fn zero_price_purchase_moves_stock_only() {
        let mut store = store_with_candy();
        store.add_product(&owner(), "Sample", 3, 0).unwrap();
        let receipt = store.buy_product(&p("wallet_2"), "Sample", 2).unwrap();
        assert_eq!(receipt.events.len(), 1);
        assert!(matches!(
            receipt.events[0].event,
            LedgerEvent::Purchase {
                cost: 0,
                tokens_minted: 0,
                ..
            }
        ));
        assert_eq!(store.escrow_total(), 0);
    }

    #[test]
    fn snapshot_round_trip_restores_store() {
        let mut store = store_with_candy();
        store.buy_product(&p("wallet_1"), "Candy", 4).unwrap();
        let snapshot = store.snapshot();
        let records = store.events().records().to_vec();

        let restored = ProductStore::from_snapshot(snapshot, records).unwrap();
        assert_eq!(restored.state(), store.state());
        assert_eq!(restored.events(), store.events());
    }

    #[test]
    fn restore_rejects_unbacked_supply() {
        let mut store = store_with_candy();
        store.buy_product(&p("wallet_1"), "Candy", 4).unwrap();
        let mut snapshot = store.snapshot();
        snapshot.config.reward_rate = 7;
        let records = store.events().records().to_vec();
        assert!(matches!(
            ProductStore::from_snapshot(snapshot, records),
            Err(RestoreError::Invariant(_))
        ));
    }
}
