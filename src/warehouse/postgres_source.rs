use tokio::runtime::{Builder, Runtime};
use tokio_postgres::{Client, NoTls, SimpleQueryMessage};
use tracing::{debug, error};

use crate::processor::{DashboardError, table::Table};
use crate::warehouse::{StarSchema, WarehouseSource, WarehouseTable, report_rejections};

/// A PostgreSQL warehouse read with plain `SELECT *` statements.
///
/// Queries use the simple-query protocol so every value arrives as text and
/// goes through the same type inference as the CSV reader.
pub struct PostgresWarehouse {
    url: String,
    runtime: Runtime,
}

impl PostgresWarehouse {
    /// Prepares a single-threaded runtime; no connection is opened until a read.
    pub fn new(url: impl Into<String>) -> Result<Self, DashboardError> {
        let runtime = Builder::new_current_thread().enable_all().build()?;
        Ok(PostgresWarehouse {
            url: url.into(),
            runtime,
        })
    }

    async fn connect(&self) -> Result<Client, DashboardError> {
        let (client, connection) = tokio_postgres::connect(&self.url, NoTls)
            .await
            .map_err(|e| DashboardError::Warehouse(format!("connect failed: {e}")))?;
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                error!(error = %e, "postgres connection closed with error");
            }
        });
        Ok(client)
    }
}

async fn fetch_table(client: &Client, which: WarehouseTable) -> Result<Table, DashboardError> {
    let sql = format!("SELECT * FROM {}", which.table_name());
    let messages = client
        .simple_query(&sql)
        .await
        .map_err(|e| DashboardError::Warehouse(format!("{sql}: {e}")))?;

    let mut headers: Vec<String> = Vec::new();
    let mut rows: Vec<Vec<Option<String>>> = Vec::new();
    for message in messages {
        if let SimpleQueryMessage::Row(row) = message {
            if headers.is_empty() {
                headers = row.columns().iter().map(|c| c.name().to_string()).collect();
            }
            rows.push((0..row.len()).map(|i| row.get(i).map(str::to_string)).collect());
        }
    }
    debug!(table = %which, rows = rows.len(), "fetched rows");
    text_rows_to_table(which, headers, &rows)
}

/// Types fetched text rows; a result with no columns is an empty table.
fn text_rows_to_table(
    which: WarehouseTable,
    headers: Vec<String>,
    rows: &[Vec<Option<String>>],
) -> Result<Table, DashboardError> {
    if headers.is_empty() {
        return Ok(Table::empty(which.table_name()));
    }
    let (table, summary) = Table::from_text_rows(which.table_name(), headers, rows)?;
    report_rejections(which, &summary);
    Ok(table)
}

impl WarehouseSource for PostgresWarehouse {
    fn describe(&self) -> String {
        // credentials stay out of logs
        let host = self.url.rsplit('@').next().unwrap_or("postgres");
        format!("postgres warehouse at {host}")
    }

    fn read_table(&self, table: WarehouseTable) -> Result<Table, DashboardError> {
        self.runtime.block_on(async {
            let client = self.connect().await?;
            fetch_table(&client, table).await
        })
    }

    fn read_all(&self) -> Result<StarSchema, DashboardError> {
        self.runtime.block_on(async {
            let client = self.connect().await?;
            let mut star = StarSchema::empty();
            for which in WarehouseTable::ALL {
                star.set_table(which, fetch_table(&client, which).await?);
            }
            Ok(star)
        })
    }
}
