use criterion::{Criterion, Throughput, criterion_group, criterion_main};

use superstore_dashboard::filter::{CrossFilter, ProfitSelection, RegionSelection};
use superstore_dashboard::pipeline::join::join_star;
use superstore_dashboard::views::{ViewSettings, customer, insights, overview, profit, region};
use superstore_dashboard::warehouse::SchemaMapping;
use superstore_dashboard::warehouse::synthetic::synthetic_star;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: jemallocator::Jemalloc = jemallocator::Jemalloc;

const FACT_ROWS: usize = 200_000;

fn join_and_render(c: &mut Criterion) {
    let star = synthetic_star(FACT_ROWS, 7);
    let schema = SchemaMapping::default();
    let settings = ViewSettings::default();

    let mut group = c.benchmark_group("Dashboard");
    group.sample_size(10);
    group.throughput(Throughput::Elements(FACT_ROWS as u64));

    group.bench_function("join_star", |b| {
        b.iter(|| join_star(&star, &schema).unwrap())
    });

    let table = join_star(&star, &schema).unwrap();

    group.bench_function("overview_page", |b| {
        b.iter(|| overview::render(&table, &settings))
    });

    group.bench_function("region_page_unfiltered", |b| {
        let filter = CrossFilter::new();
        b.iter(|| region::render(&table, &filter, &settings))
    });

    group.bench_function("region_page_filtered", |b| {
        let mut filter = CrossFilter::new();
        filter.select(RegionSelection::State("Texas".into()));
        b.iter(|| region::render(&table, &filter, &settings))
    });

    group.bench_function("customer_page", |b| {
        let filter = CrossFilter::new();
        b.iter(|| customer::render(&table, &filter, &settings))
    });

    group.bench_function("profit_page_filtered", |b| {
        let mut filter = CrossFilter::new();
        filter.select(ProfitSelection::Category("Furniture".into()));
        b.iter(|| profit::render(&table, &filter, &settings, None))
    });

    group.bench_function("insights_page", |b| {
        b.iter(|| insights::render(&table, &settings))
    });

    group.finish();
}

criterion_group!(benches, join_and_render);
criterion_main!(benches);
