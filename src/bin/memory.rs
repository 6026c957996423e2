use std::env;
use std::path::PathBuf;

use superstore_dashboard::filter::{CrossFilter, ProfitSelection, RegionSelection};
use superstore_dashboard::predictor::PredictionService;
use superstore_dashboard::views::ViewSettings;
use superstore_dashboard::warehouse::{CsvWarehouse, SchemaMapping, WarehouseLoader};
use superstore_dashboard::Dashboard;

#[global_allocator]
static ALLOC: dhat::Alloc = dhat::Alloc;

fn main() {
    let _profiler = dhat::Profiler::new_heap();

    let dir = PathBuf::from(env::args().nth(1).unwrap_or_else(|| "data".to_string()));
    let loader = WarehouseLoader::new(Box::new(CsvWarehouse::new(dir)), SchemaMapping::default());
    let dashboard = Dashboard::new(
        loader,
        // no cache, so every render allocates
        ViewSettings { cache_capacity: 0, ..Default::default() },
        PredictionService::unavailable("not needed for profiling"),
    );

    let snapshot = dashboard.snapshot();
    println!("Loaded {} analysis rows", snapshot.analysis().row_count());

    dashboard.overview();
    let mut region = CrossFilter::new();
    region.select(RegionSelection::Region("West".into()));
    dashboard.region(&region);
    dashboard.customer(&CrossFilter::new());
    let mut profit = CrossFilter::new();
    profit.select(ProfitSelection::Category("Technology".into()));
    dashboard.profit(&profit);
    dashboard.insights();

    println!("Memory benchmark finished. See dhat-heap.json for details");
}
