//! Seeded synthetic star schemas for demos, benchmarks and tests.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::processor::{column::Column, table::Table};
use crate::warehouse::{StarSchema, WarehouseTable};

const SEGMENTS: [&str; 3] = ["Consumer", "Corporate", "Home Office"];
const FIRST_NAMES: [&str; 8] = [
    "Aaron", "Brooke", "Claire", "Dmitri", "Elena", "Farid", "Grace", "Hugo",
];
const LAST_NAMES: [&str; 6] = ["Bergman", "Chu", "Duarte", "Ito", "Novak", "Okafor"];
const SHIP_MODES: [&str; 4] = ["Standard Class", "Second Class", "First Class", "Same Day"];
const PRODUCTS: [(&str, &str); 9] = [
    ("Office Supplies", "Binders"),
    ("Office Supplies", "Paper"),
    ("Office Supplies", "Art"),
    ("Technology", "Phones"),
    ("Technology", "Accessories"),
    ("Technology", "Copiers"),
    ("Furniture", "Chairs"),
    ("Furniture", "Tables"),
    ("Furniture", "Bookcases"),
];
/// (city, state, region, lat, lng)
const LOCATIONS: [(&str, &str, &str, f64, f64); 10] = [
    ("Los Angeles", "California", "West", 34.05, -118.24),
    ("Seattle", "Washington", "West", 47.61, -122.33),
    ("Denver", "Colorado", "West", 39.74, -104.99),
    ("Houston", "Texas", "Central", 29.76, -95.37),
    ("Chicago", "Illinois", "Central", 41.88, -87.63),
    ("Detroit", "Michigan", "Central", 42.33, -83.05),
    ("New York City", "New York", "East", 40.71, -74.01),
    ("Philadelphia", "Pennsylvania", "East", 39.95, -75.17),
    ("Atlanta", "Georgia", "South", 33.75, -84.39),
    ("Miami", "Florida", "South", 25.76, -80.19),
];
const FIRST_YEAR: i64 = 2014;
const YEARS: i64 = 4;

fn str_col(values: Vec<String>) -> Column {
    Column::Str(values.into_iter().map(Some).collect())
}

fn int_col(values: impl IntoIterator<Item = i64>) -> Column {
    Column::Int64(values.into_iter().map(Some).collect())
}

fn float_col(values: Vec<f64>) -> Column {
    Column::Float64(values.into_iter().map(Some).collect())
}

fn table(name: &str, columns: Vec<(&str, Column)>) -> Table {
    let columns = columns
        .into_iter()
        .map(|(h, c)| (h.to_string(), c))
        .collect();
    // column lengths are equal and headers unique by construction
    Table::from_columns(name, columns).unwrap_or_else(|_| Table::empty(name))
}

/// A complete star schema with `fact_rows` order lines.
///
/// The same seed always yields the same data. Orders hold one to four lines;
/// each order has one customer, date and location.
pub fn synthetic_star(fact_rows: usize, seed: u64) -> StarSchema {
    let mut rng = StdRng::seed_from_u64(seed);
    let customers = (fact_rows / 8).clamp(1, 800);
    let products = (fact_rows / 4).clamp(PRODUCTS.len(), 1_800);
    let months = (YEARS * 12) as usize;

    let mut star = StarSchema::empty();

    star.set_table(
        WarehouseTable::DimCustomer,
        table(
            "dim_customer",
            vec![
                ("customer_key", int_col(1..=customers as i64)),
                ("customer_id", str_col((1..=customers).map(|i| format!("CU-{i:05}")).collect())),
                (
                    "customer_name",
                    str_col(
                        (0..customers)
                            .map(|i| {
                                let first = FIRST_NAMES[i % FIRST_NAMES.len()];
                                let last = LAST_NAMES[(i / FIRST_NAMES.len()) % LAST_NAMES.len()];
                                let round = i / (FIRST_NAMES.len() * LAST_NAMES.len()) + 1;
                                format!("{first} {last} {round}")
                            })
                            .collect(),
                    ),
                ),
                (
                    "segment",
                    str_col(
                        (0..customers)
                            .map(|_| SEGMENTS[rng.random_range(0..SEGMENTS.len())].to_string())
                            .collect(),
                    ),
                ),
            ],
        ),
    );

    let product_kinds: Vec<usize> = (0..products).map(|i| i % PRODUCTS.len()).collect();
    star.set_table(
        WarehouseTable::DimProduct,
        table(
            "dim_product",
            vec![
                ("product_key", int_col(1..=products as i64)),
                (
                    "product_name",
                    str_col(
                        product_kinds
                            .iter()
                            .enumerate()
                            .map(|(i, &k)| format!("{} {}", PRODUCTS[k].1, i / PRODUCTS.len() + 1))
                            .collect(),
                    ),
                ),
                (
                    "category",
                    str_col(product_kinds.iter().map(|&k| PRODUCTS[k].0.to_string()).collect()),
                ),
                (
                    "sub_category",
                    str_col(product_kinds.iter().map(|&k| PRODUCTS[k].1.to_string()).collect()),
                ),
            ],
        ),
    );

    star.set_table(
        WarehouseTable::DimTime,
        table(
            "dim_time",
            vec![
                ("time_key", int_col(1..=months as i64)),
                ("year", int_col((0..months as i64).map(|m| FIRST_YEAR + m / 12))),
                ("month", int_col((0..months as i64).map(|m| m % 12 + 1))),
            ],
        ),
    );

    star.set_table(
        WarehouseTable::DimRegion,
        table(
            "dim_region",
            vec![
                ("region_key", int_col(1..=LOCATIONS.len() as i64)),
                ("city", str_col(LOCATIONS.iter().map(|l| l.0.to_string()).collect())),
                ("state", str_col(LOCATIONS.iter().map(|l| l.1.to_string()).collect())),
                ("region", str_col(LOCATIONS.iter().map(|l| l.2.to_string()).collect())),
                ("lat", float_col(LOCATIONS.iter().map(|l| l.3).collect())),
                ("lng", float_col(LOCATIONS.iter().map(|l| l.4).collect())),
            ],
        ),
    );

    // orders, then their lines
    let mut order_ids = Vec::new();
    let mut order_dates = Vec::new();
    let mut order_modes = Vec::new();
    let mut fact = FactColumns::default();
    while fact.len() < fact_rows {
        let order_key = order_ids.len() as i64 + 1;
        let time_key = rng.random_range(1..=months as i64);
        let customer_key = rng.random_range(1..=customers as i64);
        let region_key = rng.random_range(1..=LOCATIONS.len() as i64);
        let day = rng.random_range(1..=28);
        let (year, month) = (FIRST_YEAR + (time_key - 1) / 12, (time_key - 1) % 12 + 1);

        order_ids.push(format!("OR-{year}-{order_key:06}"));
        order_dates.push(format!("{year}-{month:02}-{day:02}"));
        order_modes.push(SHIP_MODES[rng.random_range(0..SHIP_MODES.len())].to_string());

        let lines = rng.random_range(1..=4).min(fact_rows - fact.len());
        for _ in 0..lines {
            let quantity = rng.random_range(1..=9_i64);
            let unit_price = rng.random_range(2.0..400.0_f64);
            let discount = [0.0, 0.0, 0.1, 0.15, 0.2, 0.3, 0.5][rng.random_range(0..7)];
            let sales = (quantity as f64 * unit_price * (1.0 - discount) * 100.0).round() / 100.0;
            let margin = rng.random_range(-0.1..0.35) - discount * 0.8;
            fact.push(FactLine {
                customer_key,
                product_key: rng.random_range(1..=products as i64),
                order_key,
                time_key,
                region_key,
                sales,
                quantity,
                discount,
                profit: (sales * margin * 100.0).round() / 100.0,
                shipping_cost: (sales * rng.random_range(0.02..0.12) * 100.0).round() / 100.0,
            });
        }
    }

    let orders = order_ids.len();
    star.set_table(
        WarehouseTable::DimOrder,
        table(
            "dim_order",
            vec![
                ("order_key", int_col(1..=orders as i64)),
                ("order_id", str_col(order_ids)),
                ("order_date", str_col(order_dates)),
                ("ship_mode", str_col(order_modes)),
            ],
        ),
    );
    star.set_table(WarehouseTable::FactSales, fact.into_table());
    star
}

struct FactLine {
    customer_key: i64,
    product_key: i64,
    order_key: i64,
    time_key: i64,
    region_key: i64,
    sales: f64,
    quantity: i64,
    discount: f64,
    profit: f64,
    shipping_cost: f64,
}

#[derive(Default)]
struct FactColumns {
    lines: Vec<FactLine>,
}

impl FactColumns {
    fn len(&self) -> usize {
        self.lines.len()
    }

    fn push(&mut self, line: FactLine) {
        self.lines.push(line);
    }

    fn into_table(self) -> Table {
        let l = &self.lines;
        table(
            "fact_sales",
            vec![
                ("customer_key", int_col(l.iter().map(|f| f.customer_key))),
                ("product_key", int_col(l.iter().map(|f| f.product_key))),
                ("order_key", int_col(l.iter().map(|f| f.order_key))),
                ("time_key", int_col(l.iter().map(|f| f.time_key))),
                ("region_key", int_col(l.iter().map(|f| f.region_key))),
                ("sales", float_col(l.iter().map(|f| f.sales).collect())),
                ("quantity", int_col(l.iter().map(|f| f.quantity))),
                ("discount", float_col(l.iter().map(|f| f.discount).collect())),
                ("profit", float_col(l.iter().map(|f| f.profit).collect())),
                ("shipping_cost", float_col(l.iter().map(|f| f.shipping_cost).collect())),
            ],
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::join::join_star;
    use crate::warehouse::SchemaMapping;

    #[test]
    fn same_seed_same_star() {
        let a = synthetic_star(200, 42);
        let b = synthetic_star(200, 42);
        assert_eq!(a.fact_sales, b.fact_sales);
        assert_eq!(a.fact_sales.row_count(), 200);
    }

    #[test]
    fn synthetic_star_is_valid_and_joins_completely() {
        let star = synthetic_star(300, 1);
        let schema = SchemaMapping::default();
        schema.validate(&star).unwrap();

        let analysis = join_star(&star, &schema).unwrap();
        assert_eq!(analysis.row_count(), 300);
        assert!(schema.missing_fields(analysis.table()).is_empty());
        assert_eq!(analysis.column(crate::warehouse::Field::Region).unwrap().null_count(), 0);
    }
}
