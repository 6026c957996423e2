use std::env;
use std::path::PathBuf;

use superstore_dashboard::warehouse::CsvWarehouse;
use superstore_dashboard::warehouse::synthetic::synthetic_star;

/// Usage: data_generator [fact_rows] [dir] [seed]
fn main() {
    let mut args = env::args().skip(1);
    let rows: usize = args.next().and_then(|a| a.parse().ok()).unwrap_or(100_000);
    let dir = PathBuf::from(args.next().unwrap_or_else(|| "data".to_string()));
    let seed: u64 = args.next().and_then(|a| a.parse().ok()).unwrap_or(7);

    let star = synthetic_star(rows, seed);
    CsvWarehouse::new(&dir).write_all(&star).unwrap();

    println!(
        "Synthetic warehouse generated in {}: {} fact rows, {} orders, {} customers",
        dir.display(),
        star.fact_sales.row_count(),
        star.dim_order.row_count(),
        star.dim_customer.row_count()
    );
}
