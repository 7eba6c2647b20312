//! # Store Configuration
//!
//! Everything a deployment gets to choose: who owns the store, the contract
//! names the store and token are deployed under, the reward rate, and the two
//! catalog policies. Loaded from JSON by the node; built in code by tests.

use cosmo_protocol::config::{
    DEFAULT_STORE_CONTRACT, DEFAULT_TOKEN_CONTRACT, DEFAULT_TOKEN_NAME, LEGACY_REWARD_RATE,
    REWARD_RATE,
};
use cosmo_protocol::{IdentityError, Principal};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Errors raised while loading or validating a [`StoreConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("reward rate must be greater than zero")]
    ZeroRewardRate,

    #[error("invalid contract name '{name}': {source}")]
    InvalidContractName {
        name: String,
        #[source]
        source: IdentityError,
    },

    #[error("contract name '{0}' must not contain '.'")]
    NestedContractName(String),

    #[error("token name must not be empty")]
    EmptyTokenName,

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// How the catalog quotes prices and how the store computes the settlement
/// cost of a purchase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PricingPolicy {
    /// `get_product_price` returns the unit price; a purchase costs
    /// `unit_price * quantity`.
    #[default]
    UnitPrice,
    /// Reproduces the legacy deployment: the quoted price is the product's
    /// stock, and a purchase costs exactly `quantity` currency units.
    QuantityAlias,
}

impl PricingPolicy {
    /// Settlement cost of buying `quantity` units at `unit_price`.
    /// `None` on overflow.
    pub fn settlement_cost(self, unit_price: u64, quantity: u64) -> Option<u64> {
        match self {
            PricingPolicy::UnitPrice => unit_price.checked_mul(quantity),
            PricingPolicy::QuantityAlias => Some(quantity),
        }
    }
}

/// What `add_product` does when the key is already listed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RestockPolicy {
    /// Overwrite stock and price.
    #[default]
    Replace,
    /// Add the new quantity to the existing stock; overwrite the price.
    Accumulate,
}

fn default_store_contract() -> String {
    DEFAULT_STORE_CONTRACT.to_string()
}

fn default_token_contract() -> String {
    DEFAULT_TOKEN_CONTRACT.to_string()
}

fn default_token_name() -> String {
    DEFAULT_TOKEN_NAME.to_string()
}

fn default_reward_rate() -> u64 {
    REWARD_RATE
}

fn default_true() -> bool {
    true
}

/// Deployment parameters for a [`ProductStore`](crate::product_store::ProductStore).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Deployer of both contracts. Curates the catalog and manages minters.
    pub owner: Principal,

    /// Contract name of the store, deployed under `owner`.
    #[serde(default = "default_store_contract")]
    pub store_contract: String,

    /// Contract name of the reward token, deployed under `owner`.
    #[serde(default = "default_token_contract")]
    pub token_contract: String,

    /// Fungible token name inside the token contract.
    #[serde(default = "default_token_name")]
    pub token_name: String,

    /// Reward tokens minted per settlement-currency unit.
    #[serde(default = "default_reward_rate")]
    pub reward_rate: u64,

    #[serde(default)]
    pub pricing: PricingPolicy,

    #[serde(default)]
    pub restock: RestockPolicy,

    /// Register the store contract as a valid minter at construction. When
    /// off, only purchases made by the owner can mint until the owner calls
    /// `add_valid_contract_caller` for the store.
    #[serde(default = "default_true")]
    pub register_store_as_minter: bool,

    /// Settlement currency credited to wallets when the store is created.
    #[serde(default)]
    pub genesis_wallets: BTreeMap<Principal, u64>,
}

impl StoreConfig {
    /// Default deployment owned by `owner`.
    pub fn new(owner: Principal) -> Self {
        Self {
            owner,
            store_contract: default_store_contract(),
            token_contract: default_token_contract(),
            token_name: default_token_name(),
            reward_rate: REWARD_RATE,
            pricing: PricingPolicy::UnitPrice,
            restock: RestockPolicy::Replace,
            register_store_as_minter: true,
            genesis_wallets: BTreeMap::new(),
        }
    }

    /// Parameters matching the legacy product-store deployment bit for bit.
    pub fn legacy_trace(owner: Principal) -> Self {
        Self {
            reward_rate: LEGACY_REWARD_RATE,
            pricing: PricingPolicy::QuantityAlias,
            register_store_as_minter: false,
            ..Self::new(owner)
        }
    }

    /// Builder-style genesis allocation.
    pub fn with_genesis_wallet(mut self, holder: Principal, amount: u64) -> Self {
        self.genesis_wallets.insert(holder, amount);
        self
    }

    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json_pretty(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Checks the invariants serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.reward_rate == 0 {
            return Err(ConfigError::ZeroRewardRate);
        }
        if self.token_name.is_empty() {
            return Err(ConfigError::EmptyTokenName);
        }
        for name in [&self.store_contract, &self.token_contract] {
            if name.contains('.') {
                return Err(ConfigError::NestedContractName(name.clone()));
            }
        }
        self.store_principal()?;
        self.token_principal()?;
        Ok(())
    }

    /// `<owner>.<store_contract>`
    pub fn store_principal(&self) -> Result<Principal, ConfigError> {
        self.owner
            .contract(&self.store_contract)
            .map_err(|source| ConfigError::InvalidContractName {
                name: self.store_contract.clone(),
                source,
            })
    }

    /// `<owner>.<token_contract>`
    pub fn token_principal(&self) -> Result<Principal, ConfigError> {
        self.owner
            .contract(&self.token_contract)
            .map_err(|source| ConfigError::InvalidContractName {
                name: self.token_contract.clone(),
                source,
            })
    }

    /// Asset identifier carried by token events: `<token-principal>::<token-name>`.
    pub fn asset_identifier(&self) -> Result<String, ConfigError> {
        Ok(format!("{}::{}", self.token_principal()?, self.token_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn owner() -> Principal {
        Principal::new("deployer").unwrap()
    }

    #[test]
    fn defaults_follow_protocol_constants() {
        let config = StoreConfig::new(owner());
        assert_eq!(config.reward_rate, REWARD_RATE);
        assert_eq!(config.pricing, PricingPolicy::UnitPrice);
        assert!(config.register_store_as_minter);
        assert_eq!(
            config.store_principal().unwrap().as_str(),
            "deployer.product-store"
        );
        assert_eq!(
            config.asset_identifier().unwrap(),
            "deployer.cosmo-ft::cosmo-ft"
        );
    }

    #[test]
    fn minimal_json_fills_defaults() {
        let config = StoreConfig::from_json_str(r#"{ "owner": "deployer" }"#).unwrap();
        assert_eq!(config, StoreConfig::new(owner()));
    }

    #[test]
    fn json_overrides_policies() {
        let raw = r#"{
            "owner": "deployer",
            "reward_rate": 1000,
            "pricing": "quantity_alias",
            "restock": "accumulate",
            "genesis_wallets": { "wallet_1": 5000 }
        }"#;
        let config = StoreConfig::from_json_str(raw).unwrap();
        assert_eq!(config.reward_rate, 1000);
        assert_eq!(config.pricing, PricingPolicy::QuantityAlias);
        assert_eq!(config.restock, RestockPolicy::Accumulate);
        let wallet = Principal::new("wallet_1").unwrap();
        assert_eq!(config.genesis_wallets.get(&wallet), Some(&5000));
    }

    #[test]
    fn zero_reward_rate_rejected() {
        let result = StoreConfig::from_json_str(r#"{ "owner": "d", "reward_rate": 0 }"#);
        assert!(matches!(result, Err(ConfigError::ZeroRewardRate)));
    }

    #[test]
    fn dotted_contract_name_rejected() {
        let mut config = StoreConfig::new(owner());
        config.store_contract = "a.b".into();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::NestedContractName(_))
        ));
    }

    #[test]
    fn invalid_owner_rejected_by_serde() {
        assert!(StoreConfig::from_json_str(r#"{ "owner": "" }"#).is_err());
    }

    #[test]
    fn settlement_cost_per_policy() {
        assert_eq!(PricingPolicy::UnitPrice.settlement_cost(50, 10), Some(500));
        assert_eq!(PricingPolicy::QuantityAlias.settlement_cost(50, 10), Some(10));
        assert_eq!(PricingPolicy::UnitPrice.settlement_cost(u64::MAX, 2), None);
    }

    #[test]
    fn legacy_preset_matches_trace_parameters() {
        let config = StoreConfig::legacy_trace(owner());
        assert_eq!(config.reward_rate, LEGACY_REWARD_RATE);
        assert_eq!(config.pricing, PricingPolicy::QuantityAlias);
        assert!(!config.register_store_as_minter);
    }
}
