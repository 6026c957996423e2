use serde::Serialize;

use crate::analytics::customer::{CustomerLifetimeValue, customer_lifetime_value};
use crate::analytics::insights::{
    ExportSummaries, ProductPair, SeasonalRow, YearOverYear, export_summaries, market_basket,
    seasonal_analysis, year_over_year,
};
use crate::pipeline::AnalysisTable;
use crate::views::{PageView, View, ViewSettings};

/// Unfiltered analyses over the whole analysis table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InsightsPageView {
    pub customer_lifetime_value: View<Vec<CustomerLifetimeValue>>,
    pub seasonal: View<Vec<SeasonalRow>>,
    pub market_basket: View<Vec<ProductPair>>,
    /// `None` when no row carries a year
    pub year_over_year: View<Option<YearOverYear>>,
    pub exports: View<ExportSummaries>,
}

pub fn render(table: &AnalysisTable, settings: &ViewSettings) -> PageView<InsightsPageView> {
    if table.is_empty() {
        return PageView::no_data();
    }
    let rows = table.all_rows();
    PageView::Ready(InsightsPageView {
        customer_lifetime_value: View::compute("customer_lifetime_value", || {
            customer_lifetime_value(table, &rows)
        }),
        seasonal: View::compute("seasonal", || seasonal_analysis(table, &rows)),
        market_basket: View::compute("market_basket", || {
            market_basket(table, &rows, settings.basket_pairs)
        }),
        year_over_year: View::compute("year_over_year", || year_over_year(table, &rows)),
        exports: View::compute("exports", || export_summaries(table, &rows)),
    })
}
