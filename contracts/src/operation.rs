//! Serializable store requests.
//!
//! An [`Operation`] names a public store function together with its caller
//! and arguments. Replay scripts are JSON arrays of these, and
//! [`ProductStore::execute`](crate::product_store::ProductStore::execute)
//! applies one.

use cosmo_protocol::Principal;
use serde::{Deserialize, Serialize};

/// One call against the store, tagged by `"op"`.
///
/// ```json
/// { "op": "buy_product", "caller": "wallet_1", "key": "Candy", "quantity": 10 }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Operation {
    AddProduct {
        caller: Principal,
        key: String,
        quantity: u64,
        unit_price: u64,
    },
    DeleteProduct {
        caller: Principal,
        key: String,
    },
    GetProductPrice {
        key: String,
    },
    BuyProduct {
        caller: Principal,
        key: String,
        quantity: u64,
    },
    TransferRewardTokens {
        caller: Principal,
        amount: u64,
        recipient: Principal,
    },
    RedeemRewardTokens {
        caller: Principal,
        amount: u64,
    },
    GetBonusPointsCount {
        caller: Principal,
    },
    AddValidContractCaller {
        caller: Principal,
        contract: Principal,
    },
    RemoveValidContractCaller {
        caller: Principal,
        contract: Principal,
    },
    FundWallet {
        caller: Principal,
        holder: Principal,
        amount: u64,
    },
}

impl Operation {
    /// Function name, as used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            Operation::AddProduct { .. } => "add_product",
            Operation::DeleteProduct { .. } => "delete_product",
            Operation::GetProductPrice { .. } => "get_product_price",
            Operation::BuyProduct { .. } => "buy_product",
            Operation::TransferRewardTokens { .. } => "transfer_reward_tokens",
            Operation::RedeemRewardTokens { .. } => "redeem_reward_tokens",
            Operation::GetBonusPointsCount { .. } => "get_bonus_points_count",
            Operation::AddValidContractCaller { .. } => "add_valid_contract_caller",
            Operation::RemoveValidContractCaller { .. } => "remove_valid_contract_caller",
            Operation::FundWallet { .. } => "fund_wallet",
        }
    }

    /// Whether the operation can change state.
    pub fn is_read_only(&self) -> bool {
        matches!(
            self,
            Operation::GetProductPrice { .. } | Operation::GetBonusPointsCount { .. }
        )
    }
}

/// Parses a replay script: a JSON array of operations.
pub fn parse_script(raw: &str) -> Result<Vec<Operation>, serde_json::Error> {
    serde_json::from_str(raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_tagged_script() {
        let script = r#"[
            { "op": "add_product", "caller": "deployer", "key": "Candy", "quantity": 10, "unit_price": 50 },
            { "op": "buy_product", "caller": "wallet_1", "key": "Candy", "quantity": 2 },
            { "op": "get_bonus_points_count", "caller": "wallet_1" }
        ]"#;
        let ops = parse_script(script).unwrap();
        assert_eq!(ops.len(), 3);
        assert_eq!(ops[1].name(), "buy_product");
        assert!(ops[2].is_read_only());
        assert!(!ops[0].is_read_only());
    }

    #[test]
    fn rejects_invalid_principal() {
        let script = r#"[{ "op": "get_bonus_points_count", "caller": "bad name" }]"#;
        assert!(parse_script(script).is_err());
    }
}
