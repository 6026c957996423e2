//! Per-page view models.
//!
//! Each chart or table is computed independently into a [`View`]: a missing
//! column makes that one view unavailable without affecting its neighbours.
//! A page over an empty analysis table renders as [`PageView::NoData`].

use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::analytics::RowSet;
use crate::filter::{CustomerSelection, FilterState, ProfitSelection, RegionSelection};
use crate::processor::DashboardError;

pub mod customer;
pub mod insights;
pub mod overview;
pub mod profit;
pub mod region;

pub use customer::CustomerPageView;
pub use insights::InsightsPageView;
pub use overview::OverviewPageView;
pub use profit::ProfitPageView;
pub use region::RegionPageView;

pub const NO_DATA_MESSAGE: &str =
    "No data available. Check the warehouse connection and the data loader.";

/// One chart or table: computed, or unavailable with the reason.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum View<T> {
    Ready(T),
    Unavailable { reason: String },
}

impl<T> View<T> {
    /// Runs `compute`, turning an error into an unavailable view.
    pub fn compute(
        name: &'static str,
        compute: impl FnOnce() -> Result<T, DashboardError>,
    ) -> Self {
        match compute() {
            Ok(value) => View::Ready(value),
            Err(e) => {
                warn!(view = name, error = %e, "view unavailable");
                View::Unavailable {
                    reason: format!("{name}: data unavailable ({e})"),
                }
            }
        }
    }

    pub fn ready(&self) -> Option<&T> {
        match self {
            View::Ready(v) => Some(v),
            View::Unavailable { .. } => None,
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, View::Ready(_))
    }
}

/// A whole page, or the no-data notice shown instead of it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PageView<T> {
    NoData { message: String },
    Ready(T),
}

impl<T> PageView<T> {
    pub fn no_data() -> Self {
        PageView::NoData {
            message: NO_DATA_MESSAGE.to_string(),
        }
    }

    pub fn ready(&self) -> Option<&T> {
        match self {
            PageView::Ready(v) => Some(v),
            PageView::NoData { .. } => None,
        }
    }
}

/// Rows a page filter selects, kept so every view can report a failure.
pub(crate) struct FilteredRows(Result<RowSet, DashboardError>);

impl FilteredRows {
    pub(crate) fn new(page: &'static str, rows: Result<RowSet, DashboardError>) -> Self {
        if let Err(e) = &rows {
            warn!(page, error = %e, "filter cannot be applied");
        }
        FilteredRows(rows)
    }

    pub(crate) fn get(&self) -> Result<&RowSet, DashboardError> {
        match &self.0 {
            Ok(rows) => Ok(rows),
            Err(DashboardError::MissingColumn(c)) => Err(DashboardError::MissingColumn(c.clone())),
            Err(e) => Err(DashboardError::Schema(format!("filter cannot be applied: {e}"))),
        }
    }
}

/// Sizes and bins used when rendering pages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewSettings {
    pub top_products: usize,
    pub top_states: usize,
    pub top_cities: usize,
    pub top_customers: usize,
    pub loss_products: usize,
    pub customer_value_bins: usize,
    pub discount_bins: usize,
    pub basket_pairs: usize,
    pub trend_window: usize,
    /// Rendered pages kept in memory; 0 disables the cache
    pub cache_capacity: usize,
}

impl Default for ViewSettings {
    fn default() -> Self {
        ViewSettings {
            top_products: 10,
            top_states: 15,
            top_cities: 10,
            top_customers: 10,
            loss_products: 10,
            customer_value_bins: 30,
            discount_bins: 20,
            basket_pairs: 20,
            trend_window: 3,
            cache_capacity: 64,
        }
    }
}

/// Identifies a rendered page: the page plus its filter state.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ViewKey {
    Overview,
    Region(FilterState<RegionSelection>),
    Customer(FilterState<CustomerSelection>),
    Profit(FilterState<ProfitSelection>),
    Insights,
}

/// A rendered page of any kind, as returned to the presentation layer.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "page", content = "view", rename_all = "snake_case")]
pub enum RenderedPage {
    Overview(Arc<PageView<OverviewPageView>>),
    Region(Arc<PageView<RegionPageView>>),
    Customer(Arc<PageView<CustomerPageView>>),
    Profit(Arc<PageView<ProfitPageView>>),
    Insights(Arc<PageView<InsightsPageView>>),
}

/// A page model that can live in the [`ViewCache`].
pub trait CachedPage: Sized {
    fn wrap(page: Arc<PageView<Self>>) -> RenderedPage;
    fn unwrap(page: &RenderedPage) -> Option<Arc<PageView<Self>>>;
}

macro_rules! cached_page {
    ($ty:ty, $variant:ident) => {
        impl CachedPage for $ty {
            fn wrap(page: Arc<PageView<Self>>) -> RenderedPage {
                RenderedPage::$variant(page)
            }

            fn unwrap(page: &RenderedPage) -> Option<Arc<PageView<Self>>> {
                match page {
                    RenderedPage::$variant(p) => Some(Arc::clone(p)),
                    _ => None,
                }
            }
        }
    };
}

cached_page!(OverviewPageView, Overview);
cached_page!(RegionPageView, Region);
cached_page!(CustomerPageView, Customer);
cached_page!(ProfitPageView, Profit);
cached_page!(InsightsPageView, Insights);

/// LRU cache of rendered pages.
///
/// Entries never go stale: the analysis table they were computed from is
/// immutable for the life of the process.
pub struct ViewCache {
    pages: Option<Mutex<LruCache<ViewKey, RenderedPage>>>,
}

impl std::fmt::Debug for ViewCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ViewCache").field("len", &self.len()).finish()
    }
}

impl ViewCache {
    pub fn new(capacity: usize) -> Self {
        ViewCache {
            pages: NonZeroUsize::new(capacity).map(|cap| Mutex::new(LruCache::new(cap))),
        }
    }

    pub fn len(&self) -> usize {
        self.pages.as_ref().map_or(0, |p| p.lock().len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        if let Some(pages) = &self.pages {
            pages.lock().clear();
        }
    }

    /// Returns the cached page for `key`, rendering and storing it on a miss.
    ///
    /// The lock is not held while rendering; two concurrent misses may both
    /// render, and the later insert wins.
    pub fn get_or_insert_with<T: CachedPage>(
        &self,
        key: ViewKey,
        render: impl FnOnce() -> PageView<T>,
    ) -> Arc<PageView<T>> {
        let Some(pages) = &self.pages else {
            return Arc::new(render());
        };
        if let Some(hit) = pages.lock().get(&key).and_then(T::unwrap) {
            debug!(?key, "view cache hit");
            return hit;
        }
        let rendered = Arc::new(render());
        pages.lock().put(key, T::wrap(Arc::clone(&rendered)));
        rendered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn compute_turns_errors_into_unavailable() {
        let ok: View<u32> = View::compute("kpis", || Ok(3));
        assert_eq!(ok.ready(), Some(&3));

        let missing: View<u32> =
            View::compute("trend", || Err(DashboardError::MissingColumn("month".into())));
        match missing {
            View::Unavailable { reason } => assert!(reason.starts_with("trend: data unavailable")),
            View::Ready(_) => panic!("expected unavailable"),
        }
    }

    #[test]
    fn cache_renders_once_per_key() {
        let cache = ViewCache::new(4);
        let renders = Cell::new(0);
        let render = || {
            renders.set(renders.get() + 1);
            PageView::<InsightsPageView>::no_data()
        };

        let first = cache.get_or_insert_with(ViewKey::Insights, render);
        let second = cache.get_or_insert_with(ViewKey::Insights, render);
        assert_eq!(renders.get(), 1);
        assert!(Arc::ptr_eq(&first, &second));

        cache.get_or_insert_with(ViewKey::Region(FilterState::Unfiltered), || {
            renders.set(renders.get() + 1);
            PageView::<RegionPageView>::no_data()
        });
        assert_eq!(renders.get(), 2);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn filter_state_is_part_of_the_key() {
        let cache = ViewCache::new(4);
        let texas =
            ViewKey::Region(FilterState::FilteredBy(RegionSelection::State("Texas".into())));
        let ohio = ViewKey::Region(FilterState::FilteredBy(RegionSelection::State("Ohio".into())));
        cache.get_or_insert_with(texas.clone(), PageView::<RegionPageView>::no_data);
        cache.get_or_insert_with(ohio, PageView::<RegionPageView>::no_data);
        assert_eq!(cache.len(), 2);
        cache.get_or_insert_with(texas, PageView::<RegionPageView>::no_data);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn zero_capacity_disables_caching() {
        let cache = ViewCache::new(0);
        let renders = Cell::new(0);
        for _ in 0..3 {
            cache.get_or_insert_with(ViewKey::Overview, || {
                renders.set(renders.get() + 1);
                PageView::<OverviewPageView>::no_data()
            });
        }
        assert_eq!(renders.get(), 3);
        assert!(cache.is_empty());
    }
}
