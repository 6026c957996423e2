use indexmap::IndexMap;
use serde::Serialize;

use crate::analytics::{GroupTotal, RowSet, aggregate};
use crate::filter::{CrossFilter, FilterState, RegionPage, RegionSelection};
use crate::pipeline::AnalysisTable;
use crate::processor::{AggregateOp, DashboardError};
use crate::views::{FilteredRows, PageView, View, ViewSettings};
use crate::warehouse::Field;

/// Map center shown when no state is selected.
pub const US_CENTER: (f64, f64) = (37.0902, -95.7129);
pub const DEFAULT_ZOOM: f64 = 3.5;
pub const STATE_ZOOM: f64 = 5.0;
/// Marker size of the location with the largest sales.
pub const MAX_MARKER_SIZE: f64 = 30.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocationPoint {
    pub state: String,
    pub lat: f64,
    pub lng: f64,
    pub sales: f64,
    pub marker_size: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MapFocus {
    pub lat: f64,
    pub lng: f64,
    pub zoom: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocationMap {
    pub points: Vec<LocationPoint>,
    pub focus: MapFocus,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CityPerformance {
    pub city: String,
    pub sales: f64,
    pub profit: f64,
    pub orders: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegionPageView {
    pub indicator: String,
    pub filter: FilterState<RegionSelection>,
    pub location_map: View<LocationMap>,
    pub sales_by_region: View<Vec<GroupTotal>>,
    pub profit_by_state: View<Vec<GroupTotal>>,
    pub top_cities: View<Vec<CityPerformance>>,
}

pub fn render(
    table: &AnalysisTable,
    filter: &CrossFilter<RegionPage>,
    settings: &ViewSettings,
) -> PageView<RegionPageView> {
    if table.is_empty() {
        return PageView::no_data();
    }
    let filtered = FilteredRows::new("region", filter.rows(table));
    let selected_state = match filter.state().selection() {
        Some(RegionSelection::State(s)) => Some(s.as_str()),
        _ => None,
    };

    PageView::Ready(RegionPageView {
        indicator: filter.indicator(),
        filter: filter.state().clone(),
        location_map: View::compute("location_map", || location_map(table, selected_state)),
        sales_by_region: View::compute("sales_by_region", || {
            Ok(aggregate::sum_by_group(
                table.column(Field::Region)?,
                table.column(Field::Sales)?,
                filtered.get()?,
            ))
        }),
        profit_by_state: View::compute("profit_by_state", || {
            let totals = aggregate::sum_by_group(
                table.column(Field::State)?,
                table.column(Field::Profit)?,
                filtered.get()?,
            );
            Ok(aggregate::top_n(totals, settings.top_states))
        }),
        top_cities: View::compute("top_cities", || {
            top_cities(table, filtered.get()?, settings.top_cities)
        }),
    })
}

/// Sales per location over the whole table, so the map keeps its context
/// while other charts narrow down.
pub fn location_map(
    table: &AnalysisTable,
    selected_state: Option<&str>,
) -> Result<LocationMap, DashboardError> {
    let states = table.column(Field::State)?;
    let lats = table.column(Field::Lat)?;
    let lngs = table.column(Field::Lng)?;
    let sales = table.column(Field::Sales)?;

    let mut locations: IndexMap<(String, u64, u64), f64> = IndexMap::new();
    for i in table.all_rows().iter() {
        let (Some(state), Some(lat), Some(lng)) =
            (states.text_at(i), lats.f64_at(i), lngs.f64_at(i))
        else {
            continue;
        };
        *locations
            .entry((state.into_owned(), lat.to_bits(), lng.to_bits()))
            .or_default() += sales.f64_at(i).unwrap_or(0.0);
    }

    let max_sales = locations.values().copied().fold(f64::NAN, f64::max);
    let points: Vec<LocationPoint> = locations
        .into_iter()
        .map(|((state, lat, lng), sales)| LocationPoint {
            state,
            lat: f64::from_bits(lat),
            lng: f64::from_bits(lng),
            sales,
            marker_size: if max_sales > 0.0 {
                sales / max_sales * MAX_MARKER_SIZE
            } else {
                0.0
            },
        })
        .collect();

    let focus = selected_state
        .and_then(|s| points.iter().find(|p| p.state == s))
        .map_or(
            MapFocus {
                lat: US_CENTER.0,
                lng: US_CENTER.1,
                zoom: DEFAULT_ZOOM,
            },
            |p| MapFocus {
                lat: p.lat,
                lng: p.lng,
                zoom: STATE_ZOOM,
            },
        );
    Ok(LocationMap { points, focus })
}

fn top_cities(
    table: &AnalysisTable,
    rows: &RowSet,
    n: usize,
) -> Result<Vec<CityPerformance>, DashboardError> {
    let result = table
        .query(rows)
        .group_by(Field::City)
        .aggregate_as(Field::Sales, AggregateOp::Sum, "sales")
        .aggregate_as(Field::Profit, AggregateOp::Sum, "profit")
        .aggregate_as(Field::OrderKey, AggregateOp::DistinctCount, "orders")
        .order_by_desc("sales")
        .limit(n)
        .execute()?;
    Ok(result
        .rows
        .into_iter()
        .map(|mut r| CityPerformance {
            city: r.keys.swap_remove(0),
            sales: r.values[0],
            profit: r.values[1],
            orders: r.values[2],
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::{ClickPoint, RegionChart};
    use crate::processor::{column::Column, table::Table};
    use crate::warehouse::SchemaMapping;

    fn strs(values: &[&str]) -> Column {
        Column::Str(values.iter().map(|s| Some(s.to_string())).collect())
    }

    fn table() -> AnalysisTable {
        let t = Table::from_columns(
            "analysis",
            vec![
                ("order_key".into(), Column::Int64(vec![Some(1), Some(2), Some(2), Some(3)])),
                ("region".into(), strs(&["Central", "Central", "East", "East"])),
                ("state".into(), strs(&["Texas", "Texas", "Ohio", "New York"])),
                ("city".into(), strs(&["Austin", "Dallas", "Akron", "Albany"])),
                (
                    "lat".into(),
                    Column::Float64(vec![Some(31.0), Some(31.0), Some(40.4), Some(42.7)]),
                ),
                (
                    "lng".into(),
                    Column::Float64(vec![Some(-99.9), Some(-99.9), Some(-82.9), Some(-73.8)]),
                ),
                (
                    "sales".into(),
                    Column::Float64(vec![Some(100.0), Some(50.0), Some(75.0), Some(30.0)]),
                ),
                (
                    "profit".into(),
                    Column::Float64(vec![Some(10.0), Some(-5.0), Some(20.0), Some(3.0)]),
                ),
            ],
        )
        .unwrap();
        AnalysisTable::new(t, SchemaMapping::default())
    }

    #[test]
    fn map_scales_markers_and_focuses_selected_state() {
        let t = table();
        let map = location_map(&t, Some("Texas")).unwrap();
        assert_eq!(map.points.len(), 3);
        assert_eq!(map.points[0].sales, 150.0);
        assert_eq!(map.points[0].marker_size, MAX_MARKER_SIZE);
        assert_eq!(map.points[1].marker_size, 15.0);
        assert_eq!(map.focus, MapFocus { lat: 31.0, lng: -99.9, zoom: STATE_ZOOM });

        let unfocused = location_map(&t, None).unwrap();
        assert_eq!(unfocused.focus.zoom, DEFAULT_ZOOM);
        assert_eq!((unfocused.focus.lat, unfocused.focus.lng), US_CENTER);
    }

    #[test]
    fn state_filter_narrows_charts_but_not_the_map() {
        let t = table();
        let mut filter = CrossFilter::<RegionPage>::new();
        filter.click(RegionChart::LocationMap, &ClickPoint::hovering("Texas"));

        let page = render(&t, &filter, &ViewSettings::default());
        let page = page.ready().unwrap();
        assert_eq!(page.indicator, "Filtered by State: Texas");
        assert_eq!(page.location_map.ready().unwrap().points.len(), 3);
        assert_eq!(
            page.sales_by_region.ready().unwrap(),
            &vec![GroupTotal::new("Central", 150.0)]
        );
        let cities = page.top_cities.ready().unwrap();
        assert_eq!(cities[0].city, "Austin");
        assert_eq!(cities[1].orders, 1.0);
    }

    #[test]
    fn top_cities_rank_by_sales() {
        let t = table();
        let cities = top_cities(&t, &t.all_rows(), 2).unwrap();
        let names: Vec<_> = cities.iter().map(|c| c.city.as_str()).collect();
        assert_eq!(names, vec!["Austin", "Akron"]);
    }

    #[test]
    fn missing_coordinates_leave_other_views_intact() {
        let t = Table::from_columns(
            "analysis",
            vec![
                ("region".into(), strs(&["West"])),
                ("state".into(), strs(&["Utah"])),
                ("sales".into(), Column::Float64(vec![Some(5.0)])),
                ("profit".into(), Column::Float64(vec![Some(1.0)])),
            ],
        )
        .unwrap();
        let t = AnalysisTable::new(t, SchemaMapping::default());
        let page = render(&t, &CrossFilter::new(), &ViewSettings::default());
        let page = page.ready().unwrap();
        assert!(!page.location_map.is_ready());
        assert!(page.sales_by_region.is_ready());
        assert!(page.profit_by_state.is_ready());
    }
}
