use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use superstore_dashboard::analytics::{CustomerType, DiscountBucket};
use superstore_dashboard::config::WarehouseConfig;
use superstore_dashboard::dashboard::{Dashboard, DashboardSession, UiEvent};
use superstore_dashboard::filter::{
    CrossFilter, CustomerPage, CustomerSelection, ProfitPage, ProfitSelection, RegionPage,
    RegionSelection,
};
use superstore_dashboard::predictor::PredictionForm;
use superstore_dashboard::DashboardConfig;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: jemallocator::Jemalloc = jemallocator::Jemalloc;

/// Computes dashboard pages from a star-schema sales warehouse and prints them as JSON.
#[derive(Debug, Parser)]
#[command(name = "superstore_dashboard", version, about)]
struct Cli {
    /// TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory of warehouse CSV files; overrides the configured warehouse
    #[arg(long, global = true)]
    warehouse_dir: Option<PathBuf>,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Pretty-print JSON output
    #[arg(long, global = true)]
    pretty: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// KPIs, trends and product scatter
    Overview,
    /// Geographic performance
    Region(RegionArgs),
    /// Segments and customer value
    Customer(CustomerArgs),
    /// Margins, discounts and loss products
    Profit(ProfitArgs),
    /// CLV, seasonality, market basket and year-over-year growth
    Insights,
    /// Predicts profit for one order line
    Predict(PredictArgs),
    /// Replays a JSON array of UI events, printing one page per event
    Session {
        #[arg(long)]
        events: PathBuf,
    },
}

#[derive(Debug, Args)]
#[group(multiple = false)]
struct RegionArgs {
    #[arg(long)]
    state: Option<String>,
    #[arg(long)]
    region: Option<String>,
}

#[derive(Debug, Args)]
#[group(multiple = false)]
struct CustomerArgs {
    #[arg(long)]
    segment: Option<String>,
    /// "Repeat" or "One-time"
    #[arg(long)]
    customer_type: Option<String>,
    #[arg(long)]
    customer: Option<String>,
}

#[derive(Debug, Args)]
#[group(multiple = false)]
struct ProfitArgs {
    #[arg(long)]
    category: Option<String>,
    /// One of 0-10%, 10-20%, 20-30%, 30%+
    #[arg(long)]
    discount_bucket: Option<String>,
    #[arg(long)]
    product: Option<String>,
}

#[derive(Debug, Args)]
struct PredictArgs {
    #[arg(long)]
    quantity: Option<f64>,
    /// Percent, 0 to 100
    #[arg(long)]
    discount: Option<f64>,
    #[arg(long)]
    shipping_cost: Option<f64>,
    #[arg(long)]
    ship_mode: Option<String>,
    #[arg(long)]
    category: Option<String>,
    #[arg(long)]
    sub_category: Option<String>,
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn print_json<T: Serialize>(value: &T, pretty: bool) -> Result<()> {
    let text = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{text}");
    Ok(())
}

fn region_filter(args: RegionArgs) -> CrossFilter<RegionPage> {
    let mut filter = CrossFilter::new();
    if let Some(state) = args.state {
        filter.select(RegionSelection::State(state));
    } else if let Some(region) = args.region {
        filter.select(RegionSelection::Region(region));
    }
    filter
}

fn customer_filter(args: CustomerArgs) -> Result<CrossFilter<CustomerPage>> {
    let mut filter = CrossFilter::new();
    if let Some(segment) = args.segment {
        filter.select(CustomerSelection::Segment(segment));
    } else if let Some(label) = args.customer_type {
        let kind = CustomerType::from_label(&label)
            .ok_or_else(|| anyhow!("unknown customer type '{label}'"))?;
        filter.select(CustomerSelection::CustomerType(kind));
    } else if let Some(customer) = args.customer {
        filter.select(CustomerSelection::Customer(customer));
    }
    Ok(filter)
}

fn profit_filter(args: ProfitArgs) -> Result<CrossFilter<ProfitPage>> {
    let mut filter = CrossFilter::new();
    if let Some(category) = args.category {
        filter.select(ProfitSelection::Category(category));
    } else if let Some(label) = args.discount_bucket {
        let bucket = DiscountBucket::from_label(&label)
            .ok_or_else(|| anyhow!("unknown discount bucket '{label}'"))?;
        filter.select(ProfitSelection::DiscountBucket(bucket));
    } else if let Some(product) = args.product {
        filter.select(ProfitSelection::Product(product));
    }
    Ok(filter)
}

fn replay(dashboard: Dashboard, path: PathBuf, pretty: bool) -> Result<()> {
    let raw =
        fs::read_to_string(&path).with_context(|| format!("cannot read {}", path.display()))?;
    let events: Vec<UiEvent> = serde_json::from_str(&raw)
        .with_context(|| format!("{} is not a JSON array of UI events", path.display()))?;

    let mut session = DashboardSession::new(Arc::new(dashboard));
    for event in events {
        print_json(&session.respond(event), pretty)?;
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    let mut config = DashboardConfig::load(cli.config.as_deref())?;
    if let Some(dir) = cli.warehouse_dir {
        config.warehouse = WarehouseConfig::Csv { dir };
    }
    let dashboard = config.build()?;
    let pretty = cli.pretty;

    match cli.command {
        Command::Overview => print_json(&dashboard.overview(), pretty),
        Command::Region(args) => print_json(&dashboard.region(&region_filter(args)), pretty),
        Command::Customer(args) => print_json(&dashboard.customer(&customer_filter(args)?), pretty),
        Command::Profit(args) => print_json(&dashboard.profit(&profit_filter(args)?), pretty),
        Command::Insights => print_json(&dashboard.insights(), pretty),
        Command::Predict(args) => {
            let form = PredictionForm {
                quantity: args.quantity,
                discount_percent: args.discount,
                shipping_cost: args.shipping_cost,
                ship_mode: args.ship_mode,
                category: args.category,
                sub_category: args.sub_category,
            };
            let result = dashboard.predict(&form)?;
            print_json(&result, pretty)
        }
        Command::Session { events } => replay(dashboard, events, pretty),
    }
}
