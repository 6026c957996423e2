use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::processor::{
    DashboardError, csv_reader::read_csv_table, csv_writer::write_csv_table, table::Table,
};
use crate::warehouse::{StarSchema, WarehouseSource, WarehouseTable, report_rejections};

/// A directory holding one `<table>.csv` file per warehouse table.
#[derive(Debug, Clone)]
pub struct CsvWarehouse {
    dir: PathBuf,
}

impl CsvWarehouse {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        CsvWarehouse { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn table_path(&self, table: WarehouseTable) -> PathBuf {
        self.dir.join(format!("{}.csv", table.table_name()))
    }

    /// Writes every table of `star` into the directory, creating it if needed.
    pub fn write_all(&self, star: &StarSchema) -> Result<(), DashboardError> {
        fs::create_dir_all(&self.dir)?;
        for which in WarehouseTable::ALL {
            let path = self.table_path(which);
            write_csv_table(star.table(which), &path)?;
            debug!(table = %which, path = %path.display(), "wrote csv");
        }
        Ok(())
    }
}

impl WarehouseSource for CsvWarehouse {
    fn describe(&self) -> String {
        format!("csv warehouse at {}", self.dir.display())
    }

    fn read_table(&self, table: WarehouseTable) -> Result<Table, DashboardError> {
        let path = self.table_path(table);
        let (loaded, summary) = read_csv_table(table.table_name(), &path).map_err(|e| match e {
            DashboardError::Io(io) => {
                DashboardError::Warehouse(format!("cannot read {}: {io}", path.display()))
            }
            other => other,
        })?;

        report_rejections(table, &summary);
        Ok(loaded)
    }
}
