use std::hint::black_box;
use std::sync::Arc;

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use rust_decimal_macros::dec;

use stockflow_core::{ListQuery, LocationId, PartyId, ProductId, UserId};
use stockflow_inventory::{LineDraft, LocationInfo, MovementDraft, ProductInfo};
use stockflow_infra::{
    InMemoryCatalog, InMemoryLedgerStore, LedgerSettings, MovementService, StockLedger,
};

struct Bench {
    ledger: StockLedger<Arc<InMemoryLedgerStore>>,
    movements: MovementService<Arc<InMemoryLedgerStore>, Arc<InMemoryCatalog>>,
    location: LocationId,
    products: Vec<ProductId>,
    actor: UserId,
}

fn setup(product_count: usize) -> Bench {
    let store = Arc::new(InMemoryLedgerStore::new());
    let catalog = Arc::new(InMemoryCatalog::default());
    let actor = UserId::new();
    let settings = LedgerSettings {
        max_conflict_retries: 1_000,
        ..Default::default()
    };

    let location = catalog
        .locations
        .create(
            LocationInfo {
                code: "WH".into(),
                name: "Warehouse".into(),
            },
            actor,
        )
        .expect("location")
        .id;
    let products = (0..product_count)
        .map(|i| {
            catalog
                .products
                .create(
                    ProductInfo {
                        sku: format!("SKU-{i}"),
                        name: format!("Product {i}"),
                    },
                    actor,
                )
                .expect("product")
                .id
        })
        .collect();

    Bench {
        ledger: StockLedger::new(store.clone(), settings.clone()),
        movements: MovementService::new(store, catalog, settings),
        location,
        products,
        actor,
    }
}

fn receipt(bench: &Bench, lines: usize) -> MovementDraft {
    MovementDraft::receipt(
        bench.location,
        PartyId::new(),
        bench
            .products
            .iter()
            .cycle()
            .take(lines)
            .map(|&product_id| LineDraft {
                product_id,
                quantity: 3,
                unit_price: dec!(1.25),
            })
            .collect(),
    )
}

fn bench_adjust_quantity(c: &mut Criterion) {
    let bench = setup(1);
    let product = bench.products[0];
    c.bench_function("adjust_quantity_single_key", |b| {
        b.iter(|| {
            bench
                .ledger
                .adjust_quantity(bench.location, product, black_box(1), bench.actor)
                .expect("adjust")
        })
    });
}

fn bench_register(c: &mut Criterion) {
    let mut group = c.benchmark_group("register_receipt");
    for lines in [1usize, 10, 50] {
        let bench = setup(lines);
        group.throughput(Throughput::Elements(lines as u64));
        group.bench_with_input(BenchmarkId::from_parameter(lines), &lines, |b, &lines| {
            let draft = receipt(&bench, lines);
            b.iter(|| {
                bench
                    .movements
                    .register(black_box(&draft), bench.actor)
                    .expect("register")
            })
        });
    }
    group.finish();
}

fn bench_register_then_cancel(c: &mut Criterion) {
    let bench = setup(10);
    let draft = receipt(&bench, 10);
    c.bench_function("register_then_cancel_10_lines", |b| {
        b.iter(|| {
            let doc = bench.movements.register(&draft, bench.actor).expect("register");
            bench
                .movements
                .cancel(doc.header.id, bench.actor)
                .expect("cancel")
        })
    });
}

fn bench_list(c: &mut Criterion) {
    let bench = setup(5);
    let draft = receipt(&bench, 5);
    for _ in 0..2_000 {
        bench.movements.register(&draft, bench.actor).expect("register");
    }

    let mut group = c.benchmark_group("list_movements_2000");
    group.bench_function("first_page", |b| {
        let query = ListQuery::default();
        b.iter(|| bench.movements.list(black_box(&query)).expect("list"))
    });
    group.bench_function("search_code", |b| {
        let query = ListQuery {
            search_column: Some(1),
            search_value: Some("000123".into()),
            ..Default::default()
        };
        b.iter(|| bench.movements.list(black_box(&query)).expect("list"))
    });
    group.bench_function("export_all", |b| {
        let query = ListQuery {
            export_all: true,
            ..Default::default()
        };
        b.iter(|| bench.movements.list(black_box(&query)).expect("list"))
    });
    group.finish();
}

criterion_group!(
    benches,
    bench_adjust_quantity,
    bench_register,
    bench_register_then_cancel,
    bench_list
);
criterion_main!(benches);
