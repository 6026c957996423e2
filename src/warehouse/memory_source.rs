use crate::processor::{DashboardError, table::Table};
use crate::warehouse::{StarSchema, WarehouseSource, WarehouseTable};

/// A warehouse held entirely in memory, for fixtures and embedding.
#[derive(Debug, Clone, Default)]
pub struct MemoryWarehouse {
    star: StarSchema,
}

impl MemoryWarehouse {
    pub fn new(star: StarSchema) -> Self {
        MemoryWarehouse { star }
    }

    /// Builder-style table injection.
    pub fn with_table(mut self, which: WarehouseTable, table: Table) -> Self {
        self.star.set_table(which, table);
        self
    }
}

impl WarehouseSource for MemoryWarehouse {
    fn describe(&self) -> String {
        "in-memory warehouse".into()
    }

    fn read_table(&self, table: WarehouseTable) -> Result<Table, DashboardError> {
        Ok(self.star.table(table).clone())
    }
}
