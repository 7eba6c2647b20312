//! Integration tests for the product store.
//!
//! These drive the store only through its public surface, the way the node
//! and replay scripts do, and check the accounting invariants after every
//! step: catalog stock, wallet balances, escrow, token supply, and the exact
//! events appended to the log.

use cosmo_contracts::{
    ErrorKind, LedgerEvent, Operation, ProductStore, RestockPolicy, StoreConfig, StoreError,
};
use cosmo_protocol::config::{REWARD_RATE, STATUS_OK};
use cosmo_protocol::Principal;

fn p(name: &str) -> Principal {
    Principal::new(name).unwrap()
}

fn deployer() -> Principal {
    p("deployer")
}

fn wallet_1() -> Principal {
    p("wallet_1")
}

fn wallet_2() -> Principal {
    p("wallet_2")
}

/// Store with funded wallets and no products.
fn funded_store() -> ProductStore {
    let config = StoreConfig::new(deployer())
        .with_genesis_wallet(deployer(), 100_000)
        .with_genesis_wallet(wallet_1(), 10_000)
        .with_genesis_wallet(wallet_2(), 10_000);
    ProductStore::new(config).unwrap()
}

/// Funded store listing 10 Candy at 50 each.
fn candy_store() -> ProductStore {
    let mut store = funded_store();
    store.add_product(&deployer(), "Candy", 10, 50).unwrap();
    store
}

fn snapshot_bytes(store: &ProductStore) -> Vec<u8> {
    bincode::serialize(store.state()).unwrap()
}

fn assert_conserved(store: &ProductStore) {
    store.check_invariants().unwrap();
    assert_eq!(
        store.token_supply(),
        store.escrow_total() * store.config().reward_rate
    );
}

// ---------------------------------------------------------------------------
// Catalog Scenarios
// ---------------------------------------------------------------------------

#[test]
fn owner_adds_product_non_owner_rejected() {
    let mut store = funded_store();

    let receipt = store.add_product(&deployer(), "Candy", 10, 50).unwrap();
    assert_eq!(receipt.value, STATUS_OK);
    assert_eq!(
        receipt.events[0].event,
        LedgerEvent::ProductListed {
            key: "Candy".into(),
            stock: 10,
            unit_price: 50,
        }
    );

    let err = store.add_product(&wallet_1(), "Gum", 5, 1).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unauthorized);
    assert!(store.get_product("Gum").is_none());
}

#[test]
fn delete_twice_is_not_found() {
    let mut store = candy_store();
    assert_eq!(store.delete_product(&deployer(), "Candy").unwrap().value, STATUS_OK);

    let err = store.delete_product(&deployer(), "Candy").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert_eq!(err.code(), 404);
}

#[test]
fn price_lookup() {
    let store = candy_store();
    assert_eq!(store.get_product_price("Candy").unwrap(), 50);
    assert_eq!(
        store.get_product_price("Gum").unwrap_err().kind(),
        ErrorKind::NotFound
    );
    assert_eq!(
        store.get_product_price("").unwrap_err().kind(),
        ErrorKind::InvalidArgument
    );
}

#[test]
fn re_adding_replaces_or_accumulates() {
    let mut store = candy_store();
    store.add_product(&deployer(), "Candy", 3, 60).unwrap();
    let candy = store.get_product("Candy").unwrap();
    assert_eq!((candy.stock, candy.unit_price), (3, 60));

    let mut config = StoreConfig::new(deployer());
    config.restock = RestockPolicy::Accumulate;
    let mut store = ProductStore::new(config).unwrap();
    store.add_product(&deployer(), "Candy", 10, 50).unwrap();
    store.add_product(&deployer(), "Candy", 5, 55).unwrap();
    let candy = store.get_product("Candy").unwrap();
    assert_eq!((candy.stock, candy.unit_price), (15, 55));
}

// ---------------------------------------------------------------------------
// Purchases
// ---------------------------------------------------------------------------

#[test]
fn buy_ten_candy_at_fifty() {
    let mut store = candy_store();
    let escrow_before = store.escrow_total();

    let receipt = store.buy_product(&wallet_1(), "Candy", 10).unwrap();
    assert_eq!(receipt.value, STATUS_OK);
    assert_eq!(store.escrow_total(), escrow_before + 500);
    assert_eq!(store.get_bonus_points_count(&wallet_1()), 500 * REWARD_RATE);
    assert_eq!(store.wallet_balance(&wallet_1()), 9_500);
    assert_eq!(store.get_product("Candy").unwrap().stock, 0);

    let events: Vec<&LedgerEvent> = receipt.events.iter().map(|r| &r.event).collect();
    assert_eq!(
        events,
        vec![
            &LedgerEvent::CurrencyTransfer {
                sender: wallet_1(),
                recipient: p("deployer.product-store"),
                amount: 500,
            },
            &LedgerEvent::FtMint {
                asset: "deployer.cosmo-ft::cosmo-ft".into(),
                recipient: wallet_1(),
                amount: 500 * REWARD_RATE,
            },
            &LedgerEvent::Purchase {
                buyer: wallet_1(),
                key: "Candy".into(),
                quantity: 10,
                cost: 500,
                tokens_minted: 500 * REWARD_RATE,
            },
        ]
    );
    assert_conserved(&store);
}

#[test]
fn buying_beyond_stock_fails_and_leaves_stock() {
    let mut store = candy_store();
    let before = snapshot_bytes(&store);
    let log_len = store.events().len();

    let err = store.buy_product(&wallet_1(), "Candy", 11).unwrap_err();
    assert_eq!(
        err,
        StoreError::InsufficientStock {
            key: "Candy".into(),
            requested: 11,
            available: 10,
        }
    );
    assert_eq!(snapshot_bytes(&store), before);
    assert_eq!(store.events().len(), log_len);
}

#[test]
fn buy_rejects_zero_quantity_and_unknown_product() {
    let mut store = candy_store();
    assert_eq!(
        store.buy_product(&wallet_1(), "Candy", 0).unwrap_err().kind(),
        ErrorKind::InvalidArgument
    );
    assert_eq!(
        store.buy_product(&wallet_1(), "Gum", 1).unwrap_err().kind(),
        ErrorKind::NotFound
    );
}

#[test]
fn failed_buy_is_idempotent() {
    let mut store = candy_store();
    store.add_product(&deployer(), "Watch", 1, 20_000).unwrap();
    let state_before = store.state().clone();
    let bytes_before = snapshot_bytes(&store);
    let log_before = store.events().clone();

    // wallet_1 holds 10_000, the watch costs 20_000.
    let err = store.buy_product(&wallet_1(), "Watch", 1).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InsufficientFunds);
    assert_eq!(err.code(), 402);

    assert_eq!(store.state(), &state_before);
    assert_eq!(snapshot_bytes(&store), bytes_before);
    assert_eq!(store.events(), &log_before);
    assert_eq!(store.get_product("Watch").unwrap().stock, 1);
}

#[test]
fn buy_fails_when_store_cannot_mint() {
    let mut store = candy_store();
    let store_principal = store.principal().clone();
    store
        .remove_valid_contract_caller(&deployer(), &store_principal)
        .unwrap();
    let before = snapshot_bytes(&store);

    let err = store.buy_product(&wallet_1(), "Candy", 1).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unauthorized);
    assert_eq!(snapshot_bytes(&store), before);

    // The owner may always mint, so their own purchases still go through.
    store.buy_product(&deployer(), "Candy", 1).unwrap();
    assert_eq!(store.get_bonus_points_count(&deployer()), 50 * REWARD_RATE);
}

// ---------------------------------------------------------------------------
// Transfers and Redemption
// ---------------------------------------------------------------------------

#[test]
fn transfer_with_insufficient_balance_changes_nothing() {
    let mut store = candy_store();
    store.buy_product(&wallet_1(), "Candy", 1).unwrap();
    let a = store.get_bonus_points_count(&wallet_1());
    let b = store.get_bonus_points_count(&wallet_2());

    let err = store
        .transfer_reward_tokens(&wallet_1(), a + 1, &wallet_2())
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InsufficientBalance);
    assert_eq!(store.get_bonus_points_count(&wallet_1()), a);
    assert_eq!(store.get_bonus_points_count(&wallet_2()), b);
}

#[test]
fn transfer_moves_tokens_without_touching_escrow() {
    let mut store = candy_store();
    store.buy_product(&wallet_1(), "Candy", 2).unwrap();
    let escrow = store.escrow_total();

    let receipt = store
        .transfer_reward_tokens(&wallet_1(), 4_000, &wallet_2())
        .unwrap();
    assert_eq!(
        receipt.events[0].event,
        LedgerEvent::FtTransfer {
            asset: "deployer.cosmo-ft::cosmo-ft".into(),
            sender: wallet_1(),
            recipient: wallet_2(),
            amount: 4_000,
        }
    );
    assert_eq!(store.get_bonus_points_count(&wallet_1()), 6_000);
    assert_eq!(store.get_bonus_points_count(&wallet_2()), 4_000);
    assert_eq!(store.escrow_total(), escrow);
    assert_conserved(&store);
}

#[test]
fn buy_then_redeem_round_trip() {
    let mut store = candy_store();
    let escrow_before = store.escrow_total();
    let wallet_before = store.wallet_balance(&wallet_1());

    store.buy_product(&wallet_1(), "Candy", 10).unwrap();
    let minted = store.get_bonus_points_count(&wallet_1());
    let receipt = store.redeem_reward_tokens(&wallet_1(), minted).unwrap();

    assert_eq!(
        receipt.events.last().map(|r| &r.event),
        Some(&LedgerEvent::Redemption {
            holder: wallet_1(),
            tokens_burned: minted,
            currency_paid: 500,
        })
    );
    assert_eq!(store.escrow_total(), escrow_before);
    assert_eq!(store.get_bonus_points_count(&wallet_1()), 0);
    assert_eq!(store.wallet_balance(&wallet_1()), wallet_before);
    assert_eq!(store.token_supply(), 0);
}

#[test]
fn redeeming_transferred_tokens_pays_the_holder() {
    let mut store = candy_store();
    store.buy_product(&wallet_1(), "Candy", 1).unwrap();
    store
        .transfer_reward_tokens(&wallet_1(), 2_000, &wallet_2())
        .unwrap();

    store.redeem_reward_tokens(&wallet_2(), 2_000).unwrap();
    assert_eq!(store.wallet_balance(&wallet_2()), 10_020);
    assert_eq!(store.escrow_total(), 30);
    assert_conserved(&store);
}

#[test]
fn failed_redeem_is_idempotent() {
    let mut store = candy_store();
    store.buy_product(&wallet_1(), "Candy", 1).unwrap();
    let before = snapshot_bytes(&store);
    let log_len = store.events().len();

    let over = store.get_bonus_points_count(&wallet_1()) + REWARD_RATE;
    let err = store.redeem_reward_tokens(&wallet_1(), over).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InsufficientBalance);

    let err = store.redeem_reward_tokens(&wallet_1(), REWARD_RATE + 1).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);

    assert_eq!(snapshot_bytes(&store), before);
    assert_eq!(store.events().len(), log_len);
}

// ---------------------------------------------------------------------------
// Invariants over a mixed sequence
// ---------------------------------------------------------------------------

#[test]
fn invariants_hold_across_mixed_operations() {
    let mut store = candy_store();
    store.add_product(&deployer(), "Gum", 100, 3).unwrap();

    let ops = vec![
        Operation::BuyProduct {
            caller: wallet_1(),
            key: "Gum".into(),
            quantity: 7,
        },
        Operation::BuyProduct {
            caller: wallet_2(),
            key: "Candy".into(),
            quantity: 4,
        },
        Operation::TransferRewardTokens {
            caller: wallet_2(),
            amount: 5_000,
            recipient: wallet_1(),
        },
        Operation::RedeemRewardTokens {
            caller: wallet_1(),
            amount: 2_100,
        },
        // Fails: wallet_2 only has 15_000 left.
        Operation::RedeemRewardTokens {
            caller: wallet_2(),
            amount: 16_000,
        },
        Operation::BuyProduct {
            caller: wallet_1(),
            key: "Candy".into(),
            quantity: 7,
        },
        Operation::DeleteProduct {
            caller: deployer(),
            key: "Gum".into(),
        },
        Operation::BuyProduct {
            caller: wallet_1(),
            key: "Gum".into(),
            quantity: 1,
        },
    ];

    let mut failures = 0;
    for op in &ops {
        if store.execute(op).is_err() {
            failures += 1;
        }
        assert_conserved(&store);
        assert!(store.events().verify().is_ok());
    }
    assert_eq!(failures, 3);
    assert_eq!(store.get_product("Candy").unwrap().stock, 6);
}

#[test]
fn read_operations_return_values_without_events() {
    let mut store = candy_store();
    store.buy_product(&wallet_1(), "Candy", 1).unwrap();
    let log_len = store.events().len();

    let price = store
        .execute(&Operation::GetProductPrice { key: "Candy".into() })
        .unwrap();
    assert_eq!(price.value, 50);
    assert!(price.events.is_empty());

    let points = store
        .execute(&Operation::GetBonusPointsCount { caller: wallet_1() })
        .unwrap();
    assert_eq!(points.value, 50 * REWARD_RATE);
    assert_eq!(store.events().len(), log_len);
}
