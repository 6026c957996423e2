use std::fmt;

use serde::{Deserialize, Serialize};

use crate::analytics::customer::classify_customers;
use crate::analytics::{CustomerType, DiscountBucket, RowSet};
use crate::filter::{ClickPoint, CrossFilterPage, usable};
use crate::pipeline::AnalysisTable;
use crate::processor::{DashboardError, column::Column};
use crate::warehouse::Field;

fn rows_equal_to(column: &Column, value: &str, rows: &RowSet) -> RowSet {
    rows.retain(|i| column.text_at(i).is_some_and(|v| v == value))
}

/// Column naming customers for display, classification and table clicks.
pub(crate) fn customer_label_column(table: &AnalysisTable) -> Result<&Column, DashboardError> {
    table
        .column(Field::CustomerName)
        .or_else(|_| table.customer_identity())
}

// --- region ---

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "field", content = "value", rename_all = "snake_case")]
pub enum RegionSelection {
    State(String),
    Region(String),
}

impl fmt::Display for RegionSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegionSelection::State(v) | RegionSelection::Region(v) => f.write_str(v),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegionChart {
    /// Scatter map of locations, reports the state as hover text
    LocationMap,
    /// Horizontal bars, the state is on the y axis
    ProfitByState,
    SalesByRegion,
}

#[derive(Debug, Clone, Copy)]
pub struct RegionPage;

impl CrossFilterPage for RegionPage {
    type Chart = RegionChart;
    type Selection = RegionSelection;

    const PAGE: &'static str = "region";
    const FIELDS: &'static [&'static str] = &["state", "region"];
    const UNFILTERED_TEXT: &'static str =
        "No filter applied. Click on the map or charts to filter data.";

    fn extract(chart: RegionChart, point: &ClickPoint) -> Option<RegionSelection> {
        match chart {
            RegionChart::LocationMap => {
                usable(point.hovertext.as_ref()).map(RegionSelection::State)
            }
            RegionChart::ProfitByState => usable(point.y.as_ref()).map(RegionSelection::State),
            RegionChart::SalesByRegion => usable(point.x.as_ref()).map(RegionSelection::Region),
        }
    }

    fn field_index(selection: &RegionSelection) -> usize {
        match selection {
            RegionSelection::State(_) => 0,
            RegionSelection::Region(_) => 1,
        }
    }

    fn matching_rows(
        selection: &RegionSelection,
        table: &AnalysisTable,
        rows: &RowSet,
    ) -> Result<RowSet, DashboardError> {
        Ok(match selection {
            RegionSelection::State(s) => rows_equal_to(table.column(Field::State)?, s, rows),
            RegionSelection::Region(r) => rows_equal_to(table.column(Field::Region)?, r, rows),
        })
    }
}

// --- customer ---

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "field", content = "value", rename_all = "snake_case")]
pub enum CustomerSelection {
    Segment(String),
    CustomerType(CustomerType),
    Customer(String),
}

impl fmt::Display for CustomerSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CustomerSelection::Segment(v) | CustomerSelection::Customer(v) => f.write_str(v),
            CustomerSelection::CustomerType(t) => write!(f, "{t}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CustomerChart {
    SegmentPie,
    RepeatCustomers,
    TopCustomers,
}

#[derive(Debug, Clone, Copy)]
pub struct CustomerPage;

impl CrossFilterPage for CustomerPage {
    type Chart = CustomerChart;
    type Selection = CustomerSelection;

    const PAGE: &'static str = "customer";
    const FIELDS: &'static [&'static str] = &["segment", "customer_type", "customer"];
    const UNFILTERED_TEXT: &'static str = "No filter applied. Click on charts to filter data.";

    fn extract(chart: CustomerChart, point: &ClickPoint) -> Option<CustomerSelection> {
        match chart {
            CustomerChart::SegmentPie => {
                usable(point.label.as_ref()).map(CustomerSelection::Segment)
            }
            CustomerChart::RepeatCustomers => usable(point.x.as_ref())
                .and_then(|x| CustomerType::from_label(&x))
                .map(CustomerSelection::CustomerType),
            CustomerChart::TopCustomers => usable(point.label.as_ref())
                .or_else(|| usable(point.x.as_ref()))
                .map(CustomerSelection::Customer),
        }
    }

    fn field_index(selection: &CustomerSelection) -> usize {
        match selection {
            CustomerSelection::Segment(_) => 0,
            CustomerSelection::CustomerType(_) => 1,
            CustomerSelection::Customer(_) => 2,
        }
    }

    fn matching_rows(
        selection: &CustomerSelection,
        table: &AnalysisTable,
        rows: &RowSet,
    ) -> Result<RowSet, DashboardError> {
        match selection {
            CustomerSelection::Segment(s) => {
                Ok(rows_equal_to(table.column(Field::Segment)?, s, rows))
            }
            CustomerSelection::Customer(c) => {
                Ok(rows_equal_to(customer_label_column(table)?, c, rows))
            }
            CustomerSelection::CustomerType(wanted) => {
                // membership is decided over the whole table, not the current rows
                let customers = customer_label_column(table)?;
                let classes =
                    classify_customers(customers, table.order_identity()?, &table.all_rows());
                Ok(rows.retain(|i| {
                    customers
                        .text_at(i)
                        .and_then(|c| classes.get(&*c).copied())
                        == Some(*wanted)
                }))
            }
        }
    }
}

// --- profit ---

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "field", content = "value", rename_all = "snake_case")]
pub enum ProfitSelection {
    Category(String),
    DiscountBucket(DiscountBucket),
    Product(String),
}

impl fmt::Display for ProfitSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProfitSelection::Category(v) | ProfitSelection::Product(v) => f.write_str(v),
            ProfitSelection::DiscountBucket(b) => write!(f, "{b}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfitChart {
    MarginByCategory,
    DiscountImpact,
    /// Scatter of category totals; customdata carries the category
    ProfitabilityMatrix,
    LossProducts,
}

#[derive(Debug, Clone, Copy)]
pub struct ProfitPage;

impl CrossFilterPage for ProfitPage {
    type Chart = ProfitChart;
    type Selection = ProfitSelection;

    const PAGE: &'static str = "profit";
    const FIELDS: &'static [&'static str] = &["category", "discount_range", "product"];
    const UNFILTERED_TEXT: &'static str = "No filter applied. Click on charts to filter data.";

    fn extract(chart: ProfitChart, point: &ClickPoint) -> Option<ProfitSelection> {
        match chart {
            ProfitChart::MarginByCategory => {
                usable(point.x.as_ref()).map(ProfitSelection::Category)
            }
            ProfitChart::DiscountImpact => usable(point.x.as_ref())
                .and_then(|x| DiscountBucket::from_label(&x))
                .map(ProfitSelection::DiscountBucket),
            ProfitChart::ProfitabilityMatrix => usable(point.customdata.first())
                .or_else(|| usable(point.hovertext.as_ref()))
                .or_else(|| usable(point.x.as_ref()))
                .map(ProfitSelection::Category),
            ProfitChart::LossProducts => usable(point.label.as_ref())
                .or_else(|| usable(point.y.as_ref()))
                .map(ProfitSelection::Product),
        }
    }

    fn field_index(selection: &ProfitSelection) -> usize {
        match selection {
            ProfitSelection::Category(_) => 0,
            ProfitSelection::DiscountBucket(_) => 1,
            ProfitSelection::Product(_) => 2,
        }
    }

    fn matching_rows(
        selection: &ProfitSelection,
        table: &AnalysisTable,
        rows: &RowSet,
    ) -> Result<RowSet, DashboardError> {
        Ok(match selection {
            ProfitSelection::Category(c) => rows_equal_to(table.column(Field::Category)?, c, rows),
            ProfitSelection::Product(p) => {
                rows_equal_to(table.column(Field::ProductName)?, p, rows)
            }
            ProfitSelection::DiscountBucket(bucket) => {
                let discount = table.column(Field::Discount)?;
                rows.retain(|i| discount.f64_at(i).is_some_and(|d| bucket.contains(d)))
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::{CrossFilter, FilterState};
    use crate::processor::table::Table;
    use crate::warehouse::SchemaMapping;

    fn strs(values: &[&str]) -> Column {
        Column::Str(values.iter().map(|s| Some(s.to_string())).collect())
    }

    fn table() -> AnalysisTable {
        let t = Table::from_columns(
            "analysis",
            vec![
                ("category".into(), strs(&["A", "A", "B"])),
                ("state".into(), strs(&["Texas", "Ohio", "Texas"])),
                ("region".into(), strs(&["Central", "East", "Central"])),
                ("customer_name".into(), strs(&["ann", "ann", "bob"])),
                ("order_key".into(), Column::Int64(vec![Some(1), Some(2), Some(3)])),
                ("discount".into(), Column::Float64(vec![Some(0.0), Some(0.2), Some(0.35)])),
                ("sales".into(), Column::Float64(vec![Some(100.0), Some(200.0), Some(300.0)])),
            ],
        )
        .unwrap();
        AnalysisTable::new(t, SchemaMapping::default())
    }

    #[test]
    fn setting_one_selection_clears_the_other() {
        let mut filter: CrossFilter<RegionPage> = CrossFilter::new();
        filter.click(RegionChart::LocationMap, &ClickPoint::hovering("Texas"));
        assert_eq!(
            filter.fields(),
            vec![("state", Some("Texas".to_string())), ("region", None)]
        );

        filter.click(RegionChart::SalesByRegion, &ClickPoint::at_x("East"));
        assert_eq!(
            filter.fields(),
            vec![("state", None), ("region", Some("East".to_string()))]
        );
        assert_eq!(filter.indicator(), "Filtered by Region: East");
    }

    #[test]
    fn empty_click_leaves_state_unchanged() {
        let mut filter: CrossFilter<RegionPage> = CrossFilter::new();
        filter.click(RegionChart::ProfitByState, &ClickPoint::at_y("Ohio"));
        filter.click(RegionChart::LocationMap, &ClickPoint::default());
        assert_eq!(
            filter.state(),
            &FilterState::FilteredBy(RegionSelection::State("Ohio".into()))
        );
    }

    #[test]
    fn reclicking_keeps_the_filter() {
        let mut filter: CrossFilter<ProfitPage> = CrossFilter::new();
        filter.click(ProfitChart::MarginByCategory, &ClickPoint::at_x("A"));
        filter.click(ProfitChart::MarginByCategory, &ClickPoint::at_x("A"));
        assert_eq!(
            filter.state(),
            &FilterState::FilteredBy(ProfitSelection::Category("A".into()))
        );
    }

    #[test]
    fn reset_returns_to_unfiltered() {
        let mut filter: CrossFilter<CustomerPage> = CrossFilter::new();
        filter.click(CustomerChart::SegmentPie, &ClickPoint::labelled("Consumer"));
        filter.reset();
        assert_eq!(filter.state(), &FilterState::Unfiltered);
        assert_eq!(
            filter.indicator(),
            "No filter applied. Click on charts to filter data."
        );
        assert!(filter.fields().iter().all(|(_, v)| v.is_none()));
    }

    #[test]
    fn profitability_matrix_prefers_customdata() {
        let point = ClickPoint {
            x: Some("1200.5".into()),
            hovertext: Some("Furniture".into()),
            customdata: vec!["Technology".into()],
            ..Default::default()
        };
        assert_eq!(
            ProfitPage::extract(ProfitChart::ProfitabilityMatrix, &point),
            Some(ProfitSelection::Category("Technology".into()))
        );
        let point = ClickPoint {
            customdata: vec![],
            ..point
        };
        assert_eq!(
            ProfitPage::extract(ProfitChart::ProfitabilityMatrix, &point),
            Some(ProfitSelection::Category("Furniture".into()))
        );
    }

    #[test]
    fn discount_click_must_name_a_bucket() {
        assert_eq!(
            ProfitPage::extract(ProfitChart::DiscountImpact, &ClickPoint::at_x("20-30%")),
            Some(ProfitSelection::DiscountBucket(DiscountBucket::From20To30))
        );
        assert_eq!(
            ProfitPage::extract(ProfitChart::DiscountImpact, &ClickPoint::at_x("lots")),
            None
        );
    }

    #[test]
    fn category_filter_selects_matching_rows() {
        let t = table();
        let mut filter: CrossFilter<ProfitPage> = CrossFilter::new();
        filter.click(ProfitChart::MarginByCategory, &ClickPoint::at_x("A"));
        assert_eq!(filter.rows(&t).unwrap().as_slice(), &[0, 1]);

        filter.select(ProfitSelection::DiscountBucket(DiscountBucket::Over30));
        assert_eq!(filter.rows(&t).unwrap().as_slice(), &[2]);
        assert_eq!(filter.indicator(), "Filtered by Discount Range: 30%+");
    }

    #[test]
    fn customer_type_filter_uses_whole_table_membership() {
        let t = table();
        let mut filter: CrossFilter<CustomerPage> = CrossFilter::new();
        filter.click(CustomerChart::RepeatCustomers, &ClickPoint::at_x("Repeat"));
        assert_eq!(filter.rows(&t).unwrap().as_slice(), &[0, 1]);
        assert_eq!(filter.indicator(), "Filtered by Customer Type: Repeat");

        filter.click(CustomerChart::RepeatCustomers, &ClickPoint::at_x("One-time"));
        assert_eq!(filter.rows(&t).unwrap().as_slice(), &[2]);
    }

    #[test]
    fn selections_serialize_as_tagged_values() {
        let json = serde_json::to_string(&FilterState::FilteredBy(RegionSelection::State(
            "Texas".into(),
        )))
        .unwrap();
        assert_eq!(json, r#"{"filtered_by":{"field":"state","value":"Texas"}}"#);
    }
}
