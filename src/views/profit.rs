use serde::Serialize;

use crate::analytics::bucket::{DiscountBucket, HistogramBin, histogram};
use crate::analytics::stats::profit_margin;
use crate::analytics::{GroupTotal, RowSet, aggregate};
use crate::filter::{CrossFilter, FilterState, ProfitPage, ProfitSelection};
use crate::pipeline::AnalysisTable;
use crate::predictor::{DropdownOptions, Vocabulary, dropdown_options};
use crate::processor::{AggregateOp, DashboardError};
use crate::views::{FilteredRows, PageView, View, ViewSettings};
use crate::warehouse::Field;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryMargin {
    pub category: String,
    pub sales: f64,
    pub profit: f64,
    /// Percent, two decimals; NaN (null in JSON) when sales is zero
    pub margin: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiscountImpact {
    pub bucket: DiscountBucket,
    pub sales: f64,
    pub profit: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProfitabilityPoint {
    pub category: String,
    pub sub_category: Option<String>,
    pub sales: f64,
    pub profit: f64,
    /// `|profit| + 1`, never zero
    pub marker_size: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProfitPageView {
    pub indicator: String,
    pub filter: FilterState<ProfitSelection>,
    pub margin_by_category: View<Vec<CategoryMargin>>,
    pub discount_impact: View<Vec<DiscountImpact>>,
    pub profitability: View<Vec<ProfitabilityPoint>>,
    pub discount_distribution: View<Vec<HistogramBin>>,
    pub loss_products: View<Vec<GroupTotal>>,
    pub dropdowns: DropdownOptions,
}

pub fn render(
    table: &AnalysisTable,
    filter: &CrossFilter<ProfitPage>,
    settings: &ViewSettings,
    vocabulary: Option<&Vocabulary>,
) -> PageView<ProfitPageView> {
    if table.is_empty() {
        return PageView::no_data();
    }
    let filtered = FilteredRows::new("profit", filter.rows(table));

    PageView::Ready(ProfitPageView {
        indicator: filter.indicator(),
        filter: filter.state().clone(),
        margin_by_category: View::compute("margin_by_category", || {
            margin_by_category(table, filtered.get()?)
        }),
        discount_impact: View::compute("discount_impact", || {
            discount_impact(table, filtered.get()?)
        }),
        profitability: View::compute("profitability", || profitability(table, filtered.get()?)),
        discount_distribution: View::compute("discount_distribution", || {
            let values = aggregate::gather_f64(table.column(Field::Discount)?, filtered.get()?);
            Ok(histogram(&values, settings.discount_bins))
        }),
        loss_products: View::compute("loss_products", || {
            loss_products(table, filtered.get()?, settings.loss_products)
        }),
        dropdowns: dropdown_options(table, vocabulary),
    })
}

pub fn margin_by_category(
    table: &AnalysisTable,
    rows: &RowSet,
) -> Result<Vec<CategoryMargin>, DashboardError> {
    let result = table
        .query(rows)
        .group_by(Field::Category)
        .aggregate_as(Field::Sales, AggregateOp::Sum, "sales")
        .aggregate_as(Field::Profit, AggregateOp::Sum, "profit")
        .execute()?;
    Ok(result
        .rows
        .into_iter()
        .map(|mut r| CategoryMargin {
            category: r.keys.swap_remove(0),
            sales: r.values[0],
            profit: r.values[1],
            margin: profit_margin(r.values[1], r.values[0]),
        })
        .collect())
}

/// Sales and profit for each of the four discount buckets, empty ones as zero.
pub fn discount_impact(
    table: &AnalysisTable,
    rows: &RowSet,
) -> Result<Vec<DiscountImpact>, DashboardError> {
    let discount = table.column(Field::Discount)?;
    let sales = table.column(Field::Sales)?;
    let profit = table.column(Field::Profit)?;

    let mut impact: Vec<DiscountImpact> = DiscountBucket::ALL
        .into_iter()
        .map(|bucket| DiscountImpact {
            bucket,
            sales: 0.0,
            profit: 0.0,
        })
        .collect();
    for i in rows.iter() {
        let Some(bucket) = discount.f64_at(i).and_then(DiscountBucket::of) else {
            continue;
        };
        let slot = &mut impact[bucket as usize];
        slot.sales += sales.f64_at(i).unwrap_or(0.0);
        slot.profit += profit.f64_at(i).unwrap_or(0.0);
    }
    Ok(impact)
}

/// Profit against sales per category, split by sub-category when known.
pub fn profitability(
    table: &AnalysisTable,
    rows: &RowSet,
) -> Result<Vec<ProfitabilityPoint>, DashboardError> {
    let with_sub = table.has(Field::SubCategory);
    let mut dims = vec![Field::Category];
    if with_sub {
        dims.push(Field::SubCategory);
    }
    let result = table
        .query(rows)
        .group_by_multi(dims)
        .aggregate_as(Field::Sales, AggregateOp::Sum, "sales")
        .aggregate_as(Field::Profit, AggregateOp::Sum, "profit")
        .execute()?;
    Ok(result
        .rows
        .into_iter()
        .map(|r| {
            let mut keys = r.keys.into_iter();
            let category = keys.next().unwrap_or_default();
            ProfitabilityPoint {
                category,
                sub_category: keys.next(),
                sales: r.values[0],
                profit: r.values[1],
                marker_size: r.values[1].abs() + 1.0,
            }
        })
        .collect())
}

/// The `n` products with the largest losses; profitable products never appear.
pub fn loss_products(
    table: &AnalysisTable,
    rows: &RowSet,
    n: usize,
) -> Result<Vec<GroupTotal>, DashboardError> {
    let mut totals = aggregate::sum_by_group(
        table.column(Field::ProductName)?,
        table.column(Field::Profit)?,
        rows,
    );
    totals.retain(|g| g.value < 0.0);
    Ok(aggregate::bottom_n(totals, n))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::{ClickPoint, ProfitChart};
    use crate::processor::{column::Column, table::Table};
    use crate::warehouse::SchemaMapping;

    fn strs(values: &[&str]) -> Column {
        Column::Str(values.iter().map(|s| Some(s.to_string())).collect())
    }

    fn table() -> AnalysisTable {
        let t = Table::from_columns(
            "analysis",
            vec![
                ("product_name".into(), strs(&["pen", "chair", "desk", "pen"])),
                ("category".into(), strs(&["Office", "Furniture", "Furniture", "Office"])),
                ("sub_category".into(), strs(&["Art", "Chairs", "Tables", "Art"])),
                (
                    "discount".into(),
                    Column::Float64(vec![Some(0.0), Some(0.2), Some(0.5), Some(0.1)]),
                ),
                (
                    "sales".into(),
                    Column::Float64(vec![Some(10.0), Some(200.0), Some(300.0), Some(0.0)]),
                ),
                (
                    "profit".into(),
                    Column::Float64(vec![Some(2.0), Some(-20.0), Some(-60.0), Some(-1.0)]),
                ),
            ],
        )
        .unwrap();
        AnalysisTable::new(t, SchemaMapping::default())
    }

    #[test]
    fn every_bucket_is_reported() {
        let t = table();
        let impact = discount_impact(&t, &t.all_rows()).unwrap();
        let labels: Vec<_> = impact.iter().map(|d| d.bucket.label()).collect();
        assert_eq!(labels, vec!["0-10%", "10-20%", "20-30%", "30%+"]);
        assert_eq!(impact[0].sales, 10.0);
        // 0.1 and 0.2 sit on boundaries and go up
        assert_eq!(impact[1].profit, -1.0);
        assert_eq!(impact[2].sales, 200.0);
        assert_eq!(impact[3].profit, -60.0);

        let none = discount_impact(&t, &RowSet::default()).unwrap();
        assert!(none.iter().all(|d| d.sales == 0.0 && d.profit == 0.0));
    }

    #[test]
    fn margins_and_losses() {
        let t = table();
        let margins = margin_by_category(&t, &t.all_rows()).unwrap();
        assert_eq!(margins[0].category, "Office");
        assert_eq!(margins[0].margin, 10.0);
        assert_eq!(margins[1].margin, -16.0);

        let losses = loss_products(&t, &t.all_rows(), 10).unwrap();
        assert_eq!(
            losses,
            vec![GroupTotal::new("desk", -60.0), GroupTotal::new("chair", -20.0)]
        );
    }

    #[test]
    fn profitability_splits_by_sub_category() {
        let t = table();
        let points = profitability(&t, &t.all_rows()).unwrap();
        assert_eq!(points.len(), 3);
        assert_eq!(points[1].sub_category.as_deref(), Some("Chairs"));
        assert_eq!(points[1].marker_size, 21.0);
    }

    #[test]
    fn bucket_click_filters_the_page() {
        let t = table();
        let mut filter = CrossFilter::<ProfitPage>::new();
        filter.click(ProfitChart::DiscountImpact, &ClickPoint::at_x("30%+"));
        let page = render(&t, &filter, &ViewSettings::default(), None);
        let page = page.ready().unwrap();
        assert_eq!(page.indicator, "Filtered by Discount Range: 30%+");
        let margins = page.margin_by_category.ready().unwrap();
        assert_eq!(margins.len(), 1);
        assert_eq!(margins[0].category, "Furniture");
        assert_eq!(page.dropdowns.categories, vec!["Office", "Furniture"]);
    }

    #[test]
    fn missing_discount_only_hits_discount_views() {
        let t = Table::from_columns(
            "analysis",
            vec![
                ("category".into(), strs(&["Office"])),
                ("sales".into(), Column::Float64(vec![Some(0.0)])),
                ("profit".into(), Column::Float64(vec![Some(0.0)])),
            ],
        )
        .unwrap();
        let t = AnalysisTable::new(t, SchemaMapping::default());
        let page = render(&t, &CrossFilter::new(), &ViewSettings::default(), None);
        let page = page.ready().unwrap();
        assert!(!page.discount_impact.is_ready());
        assert!(!page.discount_distribution.is_ready());
        let margins = page.margin_by_category.ready().unwrap();
        assert!(margins[0].margin.is_nan());
        assert_eq!(page.dropdowns.ship_modes.len(), 4);
    }
}
