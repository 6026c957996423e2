use serde::{Deserialize, Serialize};

use crate::processor::{DashboardError, table::Table};
use crate::warehouse::{StarSchema, WarehouseTable};

/// Every warehouse attribute the dashboard reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    CustomerKey,
    ProductKey,
    OrderKey,
    TimeKey,
    RegionKey,
    Sales,
    Profit,
    Discount,
    Quantity,
    ShippingCost,
    CustomerId,
    CustomerName,
    Segment,
    ProductName,
    Category,
    SubCategory,
    OrderId,
    OrderDate,
    ShipMode,
    Year,
    Month,
    Region,
    State,
    City,
    Lat,
    Lng,
}

impl Field {
    pub const ALL: [Field; 26] = [
        Field::CustomerKey,
        Field::ProductKey,
        Field::OrderKey,
        Field::TimeKey,
        Field::RegionKey,
        Field::Sales,
        Field::Profit,
        Field::Discount,
        Field::Quantity,
        Field::ShippingCost,
        Field::CustomerId,
        Field::CustomerName,
        Field::Segment,
        Field::ProductName,
        Field::Category,
        Field::SubCategory,
        Field::OrderId,
        Field::OrderDate,
        Field::ShipMode,
        Field::Year,
        Field::Month,
        Field::Region,
        Field::State,
        Field::City,
        Field::Lat,
        Field::Lng,
    ];

    /// The five surrogate keys, in join order.
    pub const KEYS: [(Field, WarehouseTable); 5] = [
        (Field::CustomerKey, WarehouseTable::DimCustomer),
        (Field::ProductKey, WarehouseTable::DimProduct),
        (Field::OrderKey, WarehouseTable::DimOrder),
        (Field::TimeKey, WarehouseTable::DimTime),
        (Field::RegionKey, WarehouseTable::DimRegion),
    ];

    /// Measures used by the correlation matrix.
    pub const MEASURES: [Field; 5] = [
        Field::Sales,
        Field::Profit,
        Field::Discount,
        Field::Quantity,
        Field::ShippingCost,
    ];
}

/// Explicit mapping from dashboard fields to warehouse column names.
///
/// Every field defaults to the conventional snake_case column name and can be
/// overridden from the `[schema]` configuration section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchemaMapping {
    pub customer_key: String,
    pub product_key: String,
    pub order_key: String,
    pub time_key: String,
    pub region_key: String,
    pub sales: String,
    pub profit: String,
    pub discount: String,
    pub quantity: String,
    pub shipping_cost: String,
    pub customer_id: String,
    pub customer_name: String,
    pub segment: String,
    pub product_name: String,
    pub category: String,
    pub sub_category: String,
    pub order_id: String,
    pub order_date: String,
    pub ship_mode: String,
    pub year: String,
    pub month: String,
    pub region: String,
    pub state: String,
    pub city: String,
    pub lat: String,
    pub lng: String,
}

impl Default for SchemaMapping {
    fn default() -> Self {
        SchemaMapping {
            customer_key: "customer_key".into(),
            product_key: "product_key".into(),
            order_key: "order_key".into(),
            time_key: "time_key".into(),
            region_key: "region_key".into(),
            sales: "sales".into(),
            profit: "profit".into(),
            discount: "discount".into(),
            quantity: "quantity".into(),
            shipping_cost: "shipping_cost".into(),
            customer_id: "customer_id".into(),
            customer_name: "customer_name".into(),
            segment: "segment".into(),
            product_name: "product_name".into(),
            category: "category".into(),
            sub_category: "sub_category".into(),
            order_id: "order_id".into(),
            order_date: "order_date".into(),
            ship_mode: "ship_mode".into(),
            year: "year".into(),
            month: "month".into(),
            region: "region".into(),
            state: "state".into(),
            city: "city".into(),
            lat: "lat".into(),
            lng: "lng".into(),
        }
    }
}

impl SchemaMapping {
    pub fn column(&self, field: Field) -> &str {
        match field {
            Field::CustomerKey => &self.customer_key,
            Field::ProductKey => &self.product_key,
            Field::OrderKey => &self.order_key,
            Field::TimeKey => &self.time_key,
            Field::RegionKey => &self.region_key,
            Field::Sales => &self.sales,
            Field::Profit => &self.profit,
            Field::Discount => &self.discount,
            Field::Quantity => &self.quantity,
            Field::ShippingCost => &self.shipping_cost,
            Field::CustomerId => &self.customer_id,
            Field::CustomerName => &self.customer_name,
            Field::Segment => &self.segment,
            Field::ProductName => &self.product_name,
            Field::Category => &self.category,
            Field::SubCategory => &self.sub_category,
            Field::OrderId => &self.order_id,
            Field::OrderDate => &self.order_date,
            Field::ShipMode => &self.ship_mode,
            Field::Year => &self.year,
            Field::Month => &self.month,
            Field::Region => &self.region,
            Field::State => &self.state,
            Field::City => &self.city,
            Field::Lat => &self.lat,
            Field::Lng => &self.lng,
        }
    }

    /// Checks that every surrogate key needed by the join is present.
    ///
    /// The fact table must carry all five keys unless it has no columns at all
    /// (an empty warehouse). A dimension must carry its key whenever it has rows.
    ///
    /// # Errors
    /// Returns [`DashboardError::Schema`] naming the first absent key column.
    pub fn validate(&self, star: &StarSchema) -> Result<(), DashboardError> {
        let fact = star.table(WarehouseTable::FactSales);
        let fact_is_blank = fact.headers().is_empty() && fact.is_empty();

        for (key, dim) in Field::KEYS {
            let column = self.column(key);
            if !fact_is_blank && !fact.has_column(column) {
                return Err(DashboardError::Schema(format!(
                    "fact_sales is missing join key '{column}'"
                )));
            }
            let dim_table = star.table(dim);
            if !dim_table.is_empty() && !dim_table.has_column(column) {
                return Err(DashboardError::Schema(format!(
                    "{} is missing surrogate key '{column}'",
                    dim.table_name()
                )));
            }
        }
        Ok(())
    }

    /// Fields whose mapped column is absent from `table`.
    pub fn missing_fields(&self, table: &Table) -> Vec<Field> {
        Field::ALL
            .into_iter()
            .filter(|f| !table.has_column(self.column(*f)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processor::column::Column;

    fn keyed(name: &str, key: &str) -> Table {
        Table::from_columns(name, vec![(key.to_string(), Column::Int64(vec![Some(1)]))]).unwrap()
    }

    fn full_star() -> StarSchema {
        let fact = Table::from_columns(
            "fact_sales",
            Field::KEYS
                .iter()
                .map(|(k, _)| {
                    let name = SchemaMapping::default().column(*k).to_string();
                    (name, Column::Int64(vec![Some(1)]))
                })
                .collect(),
        )
        .unwrap();
        StarSchema {
            fact_sales: fact,
            dim_customer: keyed("dim_customer", "customer_key"),
            dim_product: keyed("dim_product", "product_key"),
            dim_order: keyed("dim_order", "order_key"),
            dim_time: keyed("dim_time", "time_key"),
            dim_region: keyed("dim_region", "region_key"),
        }
    }

    #[test]
    fn validate_accepts_complete_star() {
        assert!(SchemaMapping::default().validate(&full_star()).is_ok());
        assert!(SchemaMapping::default().validate(&StarSchema::empty()).is_ok());
    }

    #[test]
    fn validate_names_missing_dimension_key() {
        let mut star = full_star();
        star.dim_time = keyed("dim_time", "tk");
        let err = SchemaMapping::default().validate(&star).unwrap_err();
        assert!(err.to_string().contains("dim_time is missing surrogate key 'time_key'"));
    }

    #[test]
    fn overridden_column_names_are_used() {
        let mapping: SchemaMapping = toml::from_str("sub_category = \"Sub-Category\"").unwrap();
        assert_eq!(mapping.column(Field::SubCategory), "Sub-Category");
        assert_eq!(mapping.column(Field::Category), "category");
    }
}
