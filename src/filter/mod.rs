//! Click-driven cross-filtering, one state machine per page.
//!
//! A page holds at most one active selection. Clicking a chart replaces it,
//! reset clears it, and a click that carries no usable value is ignored.

use std::fmt;
use std::hash::Hash;
use std::marker::PhantomData;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::analytics::RowSet;
use crate::pipeline::AnalysisTable;
use crate::processor::DashboardError;

pub mod selection;

pub use selection::{
    CustomerChart, CustomerPage, CustomerSelection, ProfitChart, ProfitPage, ProfitSelection,
    RegionChart, RegionPage, RegionSelection,
};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterState<S> {
    Unfiltered,
    FilteredBy(S),
}

impl<S> Default for FilterState<S> {
    fn default() -> Self {
        FilterState::Unfiltered
    }
}

impl<S> FilterState<S> {
    pub fn selection(&self) -> Option<&S> {
        match self {
            FilterState::Unfiltered => None,
            FilterState::FilteredBy(s) => Some(s),
        }
    }

    pub fn is_filtered(&self) -> bool {
        matches!(self, FilterState::FilteredBy(_))
    }
}

/// The data a chart reports for a clicked point.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClickPoint {
    pub x: Option<String>,
    pub y: Option<String>,
    pub label: Option<String>,
    pub hovertext: Option<String>,
    pub customdata: Vec<String>,
}

impl ClickPoint {
    pub fn at_x(x: &str) -> Self {
        ClickPoint {
            x: Some(x.to_string()),
            ..Default::default()
        }
    }

    pub fn at_y(y: &str) -> Self {
        ClickPoint {
            y: Some(y.to_string()),
            ..Default::default()
        }
    }

    pub fn labelled(label: &str) -> Self {
        ClickPoint {
            label: Some(label.to_string()),
            ..Default::default()
        }
    }

    pub fn hovering(text: &str) -> Self {
        ClickPoint {
            hovertext: Some(text.to_string()),
            ..Default::default()
        }
    }
}

/// Trims and discards blank click values.
pub(crate) fn usable(value: Option<&String>) -> Option<String> {
    value
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Per-page behaviour plugged into [`CrossFilter`].
pub trait CrossFilterPage {
    type Chart: Copy + fmt::Debug;
    type Selection: Clone + PartialEq + Eq + Hash + fmt::Debug + fmt::Display;

    const PAGE: &'static str;
    const FIELDS: &'static [&'static str];
    const UNFILTERED_TEXT: &'static str;

    /// The selection a click on `chart` stands for, if any.
    fn extract(chart: Self::Chart, point: &ClickPoint) -> Option<Self::Selection>;

    /// Index into [`CrossFilterPage::FIELDS`] of the field a selection sets.
    fn field_index(selection: &Self::Selection) -> usize;

    /// Rows of `table` matching `selection`, drawn from `rows`.
    fn matching_rows(
        selection: &Self::Selection,
        table: &AnalysisTable,
        rows: &RowSet,
    ) -> Result<RowSet, DashboardError>;
}

/// One page's filter state plus the transitions that drive it.
pub struct CrossFilter<P: CrossFilterPage> {
    state: FilterState<P::Selection>,
    _page: PhantomData<P>,
}

impl<P: CrossFilterPage> fmt::Debug for CrossFilter<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CrossFilter")
            .field("page", &P::PAGE)
            .field("state", &self.state)
            .finish()
    }
}

impl<P: CrossFilterPage> Clone for CrossFilter<P> {
    fn clone(&self) -> Self {
        CrossFilter {
            state: self.state.clone(),
            _page: PhantomData,
        }
    }
}

impl<P: CrossFilterPage> Default for CrossFilter<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: CrossFilterPage> CrossFilter<P> {
    pub fn new() -> Self {
        CrossFilter {
            state: FilterState::Unfiltered,
            _page: PhantomData,
        }
    }

    pub fn state(&self) -> &FilterState<P::Selection> {
        &self.state
    }

    /// Applies a click. Clicking the current selection again keeps it.
    pub fn click(&mut self, chart: P::Chart, point: &ClickPoint) -> &FilterState<P::Selection> {
        match P::extract(chart, point) {
            Some(selection) => {
                debug!(page = P::PAGE, ?chart, %selection, "filter selected");
                self.state = FilterState::FilteredBy(selection);
            }
            None => debug!(page = P::PAGE, ?chart, "click carried no value, ignored"),
        }
        &self.state
    }

    pub fn select(&mut self, selection: P::Selection) {
        self.state = FilterState::FilteredBy(selection);
    }

    pub fn reset(&mut self) {
        self.state = FilterState::Unfiltered;
    }

    /// Every page field with its value; at most one is set.
    pub fn fields(&self) -> Vec<(&'static str, Option<String>)> {
        let active = self
            .state
            .selection()
            .map(|s| (P::field_index(s), s.to_string()));
        P::FIELDS
            .iter()
            .enumerate()
            .map(|(i, name)| {
                let value = active
                    .as_ref()
                    .filter(|(idx, _)| *idx == i)
                    .map(|(_, v)| v.clone());
                (*name, value)
            })
            .collect()
    }

    /// The filter indicator line shown above the page.
    pub fn indicator(&self) -> String {
        match self.state.selection() {
            None => P::UNFILTERED_TEXT.to_string(),
            Some(s) => format!("Filtered by {}: {s}", P::FIELDS[P::field_index(s)].display_name()),
        }
    }

    /// Rows of the analysis table the current state selects.
    pub fn rows(&self, table: &AnalysisTable) -> Result<RowSet, DashboardError> {
        let all = table.all_rows();
        match self.state.selection() {
            None => Ok(all),
            Some(s) => P::matching_rows(s, table, &all),
        }
    }
}

trait DisplayName {
    fn display_name(&self) -> String;
}

impl DisplayName for &str {
    /// `customer_type` becomes `Customer Type`.
    fn display_name(&self) -> String {
        self.split('_')
            .filter(|w| !w.is_empty())
            .map(|w| {
                let mut chars = w.chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                    None => String::new(),
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_are_title_cased() {
        assert_eq!("customer_type".display_name(), "Customer Type");
        assert_eq!("state".display_name(), "State");
    }

    #[test]
    fn click_point_deserializes_partial_payloads() {
        let point: ClickPoint = serde_json::from_str(r#"{"x": "West"}"#).unwrap();
        assert_eq!(point, ClickPoint::at_x("West"));
        assert!(point.customdata.is_empty());
    }

    #[test]
    fn blank_values_are_unusable() {
        assert_eq!(usable(Some(&"  ".to_string())), None);
        assert_eq!(usable(Some(&" Texas ".to_string())), Some("Texas".into()));
        assert_eq!(usable(None), None);
    }
}
