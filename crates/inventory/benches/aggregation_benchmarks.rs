use std::collections::BTreeSet;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use stockrecon_core::{ItemIdentifier, Record};
use stockrecon_inventory::{
    aggregate, Quantity, TransactionRecord, TransactionSchema, TransactionType, TypeLabels,
};

fn item_code(i: usize) -> String {
    format!("{:04}", i % 21)
}

fn seed_keys() -> BTreeSet<ItemIdentifier> {
    (0..21).filter_map(|i| ItemIdentifier::new(item_code(i))).collect()
}

fn transactions(n: usize) -> Vec<TransactionRecord> {
    (0..n)
        .map(|i| {
            let kind = if i % 3 == 0 {
                TransactionType::Sale
            } else {
                TransactionType::Purchase
            };
            TransactionRecord::new(&item_code(i), kind, Quantity::Value((i % 50) as i64 + 1))
                .with_record_id(i.to_string())
        })
        .collect()
}

fn bench_aggregate(c: &mut Criterion) {
    let mut group = c.benchmark_group("aggregate");
    let seeds = seed_keys();

    for size in [500usize, 5_000, 50_000] {
        let txs = transactions(size);
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &txs, |b, txs| {
            b.iter(|| aggregate(black_box(txs), &seeds));
        });
    }

    group.finish();
}

fn bench_parse_records(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse_records");
    let schema = TransactionSchema {
        record_id_field: "order_id".to_string(),
        identifier_field: "item_lookup".to_string(),
        type_field: "order_type".to_string(),
        quantity_field: "quantity".to_string(),
        status_field: None,
        item_name_field: None,
        labels: TypeLabels::new("Sales", "Purchase"),
    };
    let records: Vec<Record> = (0..5_000)
        .map(|i| {
            Record::new()
                .with_text("order_id", i.to_string())
                .with_text("item_lookup", item_code(i))
                .with_text("order_type", if i % 3 == 0 { "Sales" } else { "Purchase" })
                .with_text("quantity", ((i % 50) + 1).to_string())
        })
        .collect();

    group.throughput(Throughput::Elements(records.len() as u64));
    group.bench_function("from_record_5000", |b| {
        b.iter(|| {
            records
                .iter()
                .map(|r| TransactionRecord::from_record(black_box(r), &schema))
                .count()
        });
    });

    group.finish();
}

criterion_group!(benches, bench_aggregate, bench_parse_records);
criterion_main!(benches);
