// Product store benchmarks.
//
// Covers the buy/redeem cycle, checkpointed failure paths, and event log
// verification at various log lengths.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use cosmo_contracts::{ProductStore, StoreConfig};
use cosmo_protocol::Principal;

fn principal(name: &str) -> Principal {
    Principal::new(name).unwrap()
}

fn stocked_store() -> ProductStore {
    let owner = principal("deployer");
    let config = StoreConfig::new(owner.clone()).with_genesis_wallet(principal("wallet_1"), u64::MAX / 2);
    let mut store = ProductStore::new(config).unwrap();
    store.add_product(&owner, "Candy", u64::MAX / 2, 50).unwrap();
    store
}

fn bench_buy_redeem_cycle(c: &mut Criterion) {
    let buyer = principal("wallet_1");
    let mut store = stocked_store();
    let tokens = 50 * store.config().reward_rate;

    c.bench_function("store/buy_redeem_cycle", |b| {
        b.iter(|| {
            store.buy_product(&buyer, "Candy", 1).unwrap();
            store.redeem_reward_tokens(&buyer, tokens).unwrap();
        });
    });
}

fn bench_aborted_buy(c: &mut Criterion) {
    let buyer = principal("wallet_2");
    let mut store = stocked_store();

    c.bench_function("store/aborted_buy", |b| {
        b.iter(|| store.buy_product(&buyer, "Candy", 1).unwrap_err());
    });
}

fn bench_log_verify(c: &mut Criterion) {
    let mut group = c.benchmark_group("store/log_verify");
    let buyer = principal("wallet_1");

    for purchases in [10u64, 100, 1_000] {
        let mut store = stocked_store();
        for _ in 0..purchases {
            store.buy_product(&buyer, "Candy", 1).unwrap();
        }
        group.throughput(Throughput::Elements(store.events().len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(purchases), &store, |b, store| {
            b.iter(|| store.events().verify().unwrap());
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_buy_redeem_cycle,
    bench_aborted_buy,
    bench_log_verify
);
criterion_main!(benches);
