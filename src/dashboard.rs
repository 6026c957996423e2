//! The dashboard facade and per-user sessions.
//!
//! A [`Dashboard`] is shared by every session: it owns the warehouse loader,
//! the rendered-page cache and the prediction service. A [`DashboardSession`]
//! owns one user's navigation and filter state and turns UI events into
//! rendered pages, one synchronous cycle per event.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::filter::{
    ClickPoint, CrossFilter, CustomerChart, CustomerPage, ProfitChart, ProfitPage, RegionChart,
    RegionPage,
};
use crate::predictor::{PredictionError, PredictionForm, PredictionResult, PredictionService};
use crate::views::{
    CustomerPageView, InsightsPageView, OverviewPageView, PageView, ProfitPageView,
    RegionPageView, RenderedPage, ViewCache, ViewKey, ViewSettings,
};
use crate::views::{customer, insights, overview, profit, region};
use crate::warehouse::{WarehouseLoader, WarehouseSnapshot};

#[derive(Debug)]
pub struct Dashboard {
    loader: WarehouseLoader,
    settings: ViewSettings,
    cache: ViewCache,
    predictions: PredictionService,
}

impl Dashboard {
    pub fn new(
        loader: WarehouseLoader,
        settings: ViewSettings,
        predictions: PredictionService,
    ) -> Self {
        Dashboard {
            cache: ViewCache::new(settings.cache_capacity),
            loader,
            settings,
            predictions,
        }
    }

    /// The loaded warehouse; the first call performs the load.
    pub fn snapshot(&self) -> Arc<WarehouseSnapshot> {
        self.loader.load()
    }

    pub fn settings(&self) -> &ViewSettings {
        &self.settings
    }

    pub fn cache(&self) -> &ViewCache {
        &self.cache
    }

    pub fn predictions(&self) -> &PredictionService {
        &self.predictions
    }

    pub fn overview(&self) -> Arc<PageView<OverviewPageView>> {
        let snapshot = self.snapshot();
        self.cache.get_or_insert_with(ViewKey::Overview, || {
            overview::render(snapshot.analysis(), &self.settings)
        })
    }

    pub fn region(&self, filter: &CrossFilter<RegionPage>) -> Arc<PageView<RegionPageView>> {
        let snapshot = self.snapshot();
        self.cache
            .get_or_insert_with(ViewKey::Region(filter.state().clone()), || {
                region::render(snapshot.analysis(), filter, &self.settings)
            })
    }

    pub fn customer(&self, filter: &CrossFilter<CustomerPage>) -> Arc<PageView<CustomerPageView>> {
        let snapshot = self.snapshot();
        self.cache
            .get_or_insert_with(ViewKey::Customer(filter.state().clone()), || {
                customer::render(snapshot.analysis(), filter, &self.settings)
            })
    }

    pub fn profit(&self, filter: &CrossFilter<ProfitPage>) -> Arc<PageView<ProfitPageView>> {
        let snapshot = self.snapshot();
        self.cache
            .get_or_insert_with(ViewKey::Profit(filter.state().clone()), || {
                profit::render(
                    snapshot.analysis(),
                    filter,
                    &self.settings,
                    self.predictions.vocabulary(),
                )
            })
    }

    pub fn insights(&self) -> Arc<PageView<InsightsPageView>> {
        let snapshot = self.snapshot();
        self.cache.get_or_insert_with(ViewKey::Insights, || {
            insights::render(snapshot.analysis(), &self.settings)
        })
    }

    pub fn predict(&self, form: &PredictionForm) -> Result<PredictionResult, PredictionError> {
        self.predictions.predict(form)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Page {
    #[default]
    Overview,
    Region,
    Customer,
    Profit,
    Insights,
}

/// A clickable chart, named by the page it lives on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "page", content = "chart", rename_all = "snake_case")]
pub enum ClickTarget {
    Region(RegionChart),
    Customer(CustomerChart),
    Profit(ProfitChart),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum UiEvent {
    Navigate {
        page: Page,
    },
    Click {
        target: ClickTarget,
        #[serde(default)]
        point: ClickPoint,
    },
    /// Clears the filter of `page`, or of the current page when absent.
    Reset {
        #[serde(default)]
        page: Option<Page>,
    },
}

/// One user's view of the dashboard.
#[derive(Debug, Clone)]
pub struct DashboardSession {
    dashboard: Arc<Dashboard>,
    page: Page,
    region: CrossFilter<RegionPage>,
    customer: CrossFilter<CustomerPage>,
    profit: CrossFilter<ProfitPage>,
}

impl DashboardSession {
    pub fn new(dashboard: Arc<Dashboard>) -> Self {
        DashboardSession {
            dashboard,
            page: Page::default(),
            region: CrossFilter::new(),
            customer: CrossFilter::new(),
            profit: CrossFilter::new(),
        }
    }

    pub fn page(&self) -> Page {
        self.page
    }

    pub fn region_filter(&self) -> &CrossFilter<RegionPage> {
        &self.region
    }

    pub fn customer_filter(&self) -> &CrossFilter<CustomerPage> {
        &self.customer
    }

    pub fn profit_filter(&self) -> &CrossFilter<ProfitPage> {
        &self.profit
    }

    /// Applies one UI event to the session state.
    pub fn handle(&mut self, event: UiEvent) {
        debug!(page = ?self.page, ?event, "ui event");
        match event {
            UiEvent::Navigate { page } => self.page = page,
            UiEvent::Click { target, point } => match target {
                ClickTarget::Region(chart) => {
                    self.region.click(chart, &point);
                }
                ClickTarget::Customer(chart) => {
                    self.customer.click(chart, &point);
                }
                ClickTarget::Profit(chart) => {
                    self.profit.click(chart, &point);
                }
            },
            UiEvent::Reset { page } => match page.unwrap_or(self.page) {
                Page::Region => self.region.reset(),
                Page::Customer => self.customer.reset(),
                Page::Profit => self.profit.reset(),
                Page::Overview | Page::Insights => {}
            },
        }
    }

    /// Renders the current page under the session's filters.
    pub fn render(&self) -> RenderedPage {
        let dashboard = &self.dashboard;
        match self.page {
            Page::Overview => RenderedPage::Overview(dashboard.overview()),
            Page::Region => RenderedPage::Region(dashboard.region(&self.region)),
            Page::Customer => RenderedPage::Customer(dashboard.customer(&self.customer)),
            Page::Profit => RenderedPage::Profit(dashboard.profit(&self.profit)),
            Page::Insights => RenderedPage::Insights(dashboard.insights()),
        }
    }

    /// Handles `event`, then renders.
    pub fn respond(&mut self, event: UiEvent) -> RenderedPage {
        self.handle(event);
        self.render()
    }
}
