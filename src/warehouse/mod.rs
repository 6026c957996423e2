use std::fmt;
use std::sync::{Arc, OnceLock};

use tracing::{debug, error, info, warn};

use crate::pipeline::{AnalysisTable, join::join_star};
use crate::processor::{DashboardError, ParseSummary, table::Table};

pub mod csv_source;
pub mod memory_source;
#[cfg(feature = "postgres")]
pub mod postgres_source;
pub mod schema;
pub mod synthetic;

pub use csv_source::CsvWarehouse;
pub use memory_source::MemoryWarehouse;
#[cfg(feature = "postgres")]
pub use postgres_source::PostgresWarehouse;
pub use schema::{Field, SchemaMapping};

/// The six tables of the star schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WarehouseTable {
    FactSales,
    DimCustomer,
    DimProduct,
    DimOrder,
    DimTime,
    DimRegion,
}

impl WarehouseTable {
    pub const ALL: [WarehouseTable; 6] = [
        WarehouseTable::FactSales,
        WarehouseTable::DimCustomer,
        WarehouseTable::DimProduct,
        WarehouseTable::DimOrder,
        WarehouseTable::DimTime,
        WarehouseTable::DimRegion,
    ];

    pub fn table_name(self) -> &'static str {
        match self {
            WarehouseTable::FactSales => "fact_sales",
            WarehouseTable::DimCustomer => "dim_customer",
            WarehouseTable::DimProduct => "dim_product",
            WarehouseTable::DimOrder => "dim_order",
            WarehouseTable::DimTime => "dim_time",
            WarehouseTable::DimRegion => "dim_region",
        }
    }
}

impl fmt::Display for WarehouseTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table_name())
    }
}

/// The raw fact and dimension tables as read from a source.
#[derive(Debug, Clone, Default)]
pub struct StarSchema {
    pub fact_sales: Table,
    pub dim_customer: Table,
    pub dim_product: Table,
    pub dim_order: Table,
    pub dim_time: Table,
    pub dim_region: Table,
}

impl StarSchema {
    /// Six named tables with no columns and no rows.
    pub fn empty() -> Self {
        StarSchema {
            fact_sales: Table::empty("fact_sales"),
            dim_customer: Table::empty("dim_customer"),
            dim_product: Table::empty("dim_product"),
            dim_order: Table::empty("dim_order"),
            dim_time: Table::empty("dim_time"),
            dim_region: Table::empty("dim_region"),
        }
    }

    pub fn table(&self, which: WarehouseTable) -> &Table {
        match which {
            WarehouseTable::FactSales => &self.fact_sales,
            WarehouseTable::DimCustomer => &self.dim_customer,
            WarehouseTable::DimProduct => &self.dim_product,
            WarehouseTable::DimOrder => &self.dim_order,
            WarehouseTable::DimTime => &self.dim_time,
            WarehouseTable::DimRegion => &self.dim_region,
        }
    }

    pub fn set_table(&mut self, which: WarehouseTable, table: Table) {
        let table = table.rename(which.table_name());
        match which {
            WarehouseTable::FactSales => self.fact_sales = table,
            WarehouseTable::DimCustomer => self.dim_customer = table,
            WarehouseTable::DimProduct => self.dim_product = table,
            WarehouseTable::DimOrder => self.dim_order = table,
            WarehouseTable::DimTime => self.dim_time = table,
            WarehouseTable::DimRegion => self.dim_region = table,
        }
    }
}

/// Logs the rows and values a source rejected while typing `table`.
///
/// Returns how many were rejected.
pub(crate) fn report_rejections(table: WarehouseTable, summary: &ParseSummary) -> usize {
    if !summary.errors.is_empty() {
        warn!(
            table = %table,
            rejected = summary.errors.len(),
            first = ?summary.errors.first(),
            "some rows or values were rejected"
        );
    }
    debug!(table = %table, rows = summary.rows_processed, "parsed table");
    summary.errors.len()
}

/// Read access to the warehouse's six tables.
pub trait WarehouseSource: Send + Sync {
    /// Short human-readable description for logs.
    fn describe(&self) -> String;

    fn read_table(&self, table: WarehouseTable) -> Result<Table, DashboardError>;

    /// Reads every table; the first failure aborts the whole read.
    fn read_all(&self) -> Result<StarSchema, DashboardError> {
        let mut star = StarSchema::empty();
        for which in WarehouseTable::ALL {
            star.set_table(which, self.read_table(which)?);
        }
        Ok(star)
    }
}

/// Immutable result of the one warehouse load.
#[derive(Debug)]
pub struct WarehouseSnapshot {
    star: StarSchema,
    analysis: AnalysisTable,
    load_error: Option<String>,
}

impl WarehouseSnapshot {
    pub fn new(star: StarSchema, analysis: AnalysisTable) -> Self {
        WarehouseSnapshot {
            star,
            analysis,
            load_error: None,
        }
    }

    /// Every table empty, with the reason kept for diagnostics.
    pub fn degraded(schema: SchemaMapping, reason: String) -> Self {
        WarehouseSnapshot {
            star: StarSchema::empty(),
            analysis: AnalysisTable::empty(schema),
            load_error: Some(reason),
        }
    }

    pub fn star(&self) -> &StarSchema {
        &self.star
    }

    pub fn analysis(&self) -> &AnalysisTable {
        &self.analysis
    }

    pub fn load_error(&self) -> Option<&str> {
        self.load_error.as_deref()
    }

    pub fn is_empty(&self) -> bool {
        self.analysis.is_empty()
    }
}

/// Loads the warehouse exactly once and hands out the shared snapshot.
pub struct WarehouseLoader {
    source: Box<dyn WarehouseSource>,
    schema: SchemaMapping,
    snapshot: OnceLock<Arc<WarehouseSnapshot>>,
}

impl fmt::Debug for WarehouseLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WarehouseLoader")
            .field("source", &self.source.describe())
            .field("loaded", &self.is_loaded())
            .finish()
    }
}

impl WarehouseLoader {
    pub fn new(source: Box<dyn WarehouseSource>, schema: SchemaMapping) -> Self {
        WarehouseLoader {
            source,
            schema,
            snapshot: OnceLock::new(),
        }
    }

    pub fn schema(&self) -> &SchemaMapping {
        &self.schema
    }

    pub fn is_loaded(&self) -> bool {
        self.snapshot.get().is_some()
    }

    /// Returns the snapshot, reading the warehouse on the first call only.
    ///
    /// A failed read, an invalid schema or a failed join never surfaces as an
    /// error here: the snapshot degrades to empty tables and keeps the reason.
    pub fn load(&self) -> Arc<WarehouseSnapshot> {
        self.snapshot
            .get_or_init(|| {
                let snapshot = match self.load_snapshot() {
                    Ok(snapshot) => snapshot,
                    Err(e) => {
                        error!(
                            source = %self.source.describe(),
                            error = %e,
                            "warehouse load failed, serving empty tables"
                        );
                        WarehouseSnapshot::degraded(self.schema.clone(), e.to_string())
                    }
                };
                Arc::new(snapshot)
            })
            .clone()
    }

    fn load_snapshot(&self) -> Result<WarehouseSnapshot, DashboardError> {
        let star = self.source.read_all()?;
        for which in WarehouseTable::ALL {
            info!(table = %which, rows = star.table(which).row_count(), "loaded table");
        }

        self.schema.validate(&star)?;
        let analysis = join_star(&star, &self.schema)?;

        let missing = self.schema.missing_fields(analysis.table());
        if !missing.is_empty() && !analysis.is_empty() {
            info!(?missing, "analysis table lacks optional fields");
        }
        info!(rows = analysis.row_count(), "analysis table ready");

        Ok(WarehouseSnapshot::new(star, analysis))
    }
}
