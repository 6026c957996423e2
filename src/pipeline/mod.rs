use crate::analytics::RowSet;
use crate::processor::{DashboardError, column::Column, table::Table};
use crate::warehouse::{Field, SchemaMapping};

pub mod join;

/// The denormalized fact-plus-dimensions table every view reads from.
///
/// Built once per process; columns are addressed through [`Field`] so the
/// schema mapping decides which physical column answers each request.
#[derive(Debug, Clone)]
pub struct AnalysisTable {
    table: Table,
    schema: SchemaMapping,
}

impl AnalysisTable {
    pub fn new(table: Table, schema: SchemaMapping) -> Self {
        AnalysisTable { table, schema }
    }

    pub fn empty(schema: SchemaMapping) -> Self {
        AnalysisTable::new(Table::empty("analysis"), schema)
    }

    pub fn table(&self) -> &Table {
        &self.table
    }

    pub fn schema(&self) -> &SchemaMapping {
        &self.schema
    }

    pub fn row_count(&self) -> usize {
        self.table.row_count()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    pub fn all_rows(&self) -> RowSet {
        RowSet::all(self.row_count())
    }

    pub fn has(&self, field: Field) -> bool {
        self.table.has_column(self.schema.column(field))
    }

    /// # Errors
    /// [`DashboardError::MissingColumn`] with the mapped column name.
    pub fn column(&self, field: Field) -> Result<&Column, DashboardError> {
        self.table.get_col(self.schema.column(field))
    }

    /// Customer identity: the business id when present, else the surrogate key.
    pub fn customer_identity(&self) -> Result<&Column, DashboardError> {
        self.column(Field::CustomerId)
            .or_else(|_| self.column(Field::CustomerKey))
    }

    /// Order identity: the surrogate key, else the business order id.
    pub fn order_identity(&self) -> Result<&Column, DashboardError> {
        self.column(Field::OrderKey)
            .or_else(|_| self.column(Field::OrderId))
    }

    /// Like [`AnalysisTable::column`], but customer and order fields resolve
    /// through their identity fallbacks.
    pub fn resolve(&self, field: Field) -> Result<&Column, DashboardError> {
        match field {
            Field::CustomerId | Field::CustomerKey => self.customer_identity(),
            Field::OrderKey | Field::OrderId => self.order_identity(),
            other => self.column(other),
        }
    }
}
