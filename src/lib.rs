//! # superstore_dashboard
//!
//! Backend for a cross-filtered sales dashboard over a retail star-schema
//! warehouse (one `fact_sales` table and five dimensions). It supports:
//!
//! - Loading the six warehouse tables once per process from CSV files or
//!   PostgreSQL, with an explicit, validated column mapping
//! - Left-joining them into one immutable analysis table
//! - SIMD-accelerated, rayon-parallel grouped aggregations
//! - Per-page cross-filter state machines driven by chart clicks
//! - Page view models that degrade per chart when a column is missing
//! - A profit/loss predictor contract with input validation
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use superstore_dashboard::config::DashboardConfig;
//! use superstore_dashboard::dashboard::{ClickTarget, DashboardSession, Page, UiEvent};
//! use superstore_dashboard::filter::{ClickPoint, RegionChart};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let dashboard = Arc::new(DashboardConfig::load(None)?.build()?);
//!     let mut session = DashboardSession::new(dashboard);
//!
//!     session.handle(UiEvent::Navigate { page: Page::Region });
//!     let page = session.respond(UiEvent::Click {
//!         target: ClickTarget::Region(RegionChart::LocationMap),
//!         point: ClickPoint::hovering("Texas"),
//!     });
//!     println!("{}", serde_json::to_string_pretty(&page)?);
//!     Ok(())
//! }
//! ```

mod helpers;

pub mod analytics;
pub mod config;
pub mod dashboard;
pub mod filter;
pub mod pipeline;
pub mod predictor;
pub mod processor;
pub mod views;
pub mod warehouse;

pub use config::DashboardConfig;
pub use dashboard::{Dashboard, DashboardSession, Page, UiEvent};
pub use processor::DashboardError;
pub use warehouse::{WarehouseLoader, WarehouseSnapshot};
