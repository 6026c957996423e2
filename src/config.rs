//! TOML configuration.
//!
//! ```toml
//! [warehouse]
//! kind = "csv"
//! dir = "data/warehouse"
//!
//! [schema]
//! order_date = "order_dt"
//!
//! [views]
//! top_products = 5
//!
//! [predictor]
//! artifact = "models/profit_predictor.json"
//! ```
//!
//! Every section is optional and falls back to its defaults.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::dashboard::Dashboard;
use crate::predictor::PredictionService;
use crate::processor::DashboardError;
use crate::views::ViewSettings;
use crate::warehouse::{CsvWarehouse, SchemaMapping, WarehouseLoader, WarehouseSource};

/// Environment variable consulted when a postgres warehouse has no `url`.
pub const DATABASE_URL_ENV: &str = "DATABASE_URL";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    pub warehouse: WarehouseConfig,
    pub schema: SchemaMapping,
    pub views: ViewSettings,
    pub predictor: PredictorConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WarehouseConfig {
    /// One `<table>.csv` file per warehouse table
    Csv { dir: PathBuf },
    Postgres {
        #[serde(default)]
        url: Option<String>,
    },
}

impl Default for WarehouseConfig {
    fn default() -> Self {
        WarehouseConfig::Csv {
            dir: PathBuf::from("data"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PredictorConfig {
    pub artifact: Option<PathBuf>,
}

impl DashboardConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self, DashboardError> {
        toml::from_str(raw).map_err(|e| DashboardError::Config(e.to_string()))
    }

    /// Reads `path`, or returns the defaults when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self, DashboardError> {
        let Some(path) = path else {
            return Ok(DashboardConfig::default());
        };
        let raw = fs::read_to_string(path).map_err(|e| {
            DashboardError::Config(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&raw)
            .map_err(|e| DashboardError::Config(format!("{}: {e}", path.display())))
    }

    pub fn source(&self) -> Result<Box<dyn WarehouseSource>, DashboardError> {
        match &self.warehouse {
            WarehouseConfig::Csv { dir } => Ok(Box::new(CsvWarehouse::new(dir.clone()))),
            WarehouseConfig::Postgres { url } => postgres_source(url.as_deref()),
        }
    }

    pub fn loader(&self) -> Result<WarehouseLoader, DashboardError> {
        Ok(WarehouseLoader::new(self.source()?, self.schema.clone()))
    }

    /// Builds the dashboard. The warehouse itself is read on first use.
    pub fn build(&self) -> Result<Dashboard, DashboardError> {
        Ok(Dashboard::new(
            self.loader()?,
            self.views.clone(),
            PredictionService::from_artifact(self.predictor.artifact.as_deref()),
        ))
    }
}

fn resolve_url(url: Option<&str>) -> Result<String, DashboardError> {
    match url {
        Some(url) => Ok(url.to_string()),
        None => std::env::var(DATABASE_URL_ENV).map_err(|_| {
            DashboardError::Config(format!(
                "postgres warehouse needs `url` or the {DATABASE_URL_ENV} variable"
            ))
        }),
    }
}

#[cfg(feature = "postgres")]
fn postgres_source(url: Option<&str>) -> Result<Box<dyn WarehouseSource>, DashboardError> {
    let url = resolve_url(url)?;
    Ok(Box::new(crate::warehouse::PostgresWarehouse::new(url)?))
}

#[cfg(not(feature = "postgres"))]
fn postgres_source(url: Option<&str>) -> Result<Box<dyn WarehouseSource>, DashboardError> {
    resolve_url(url)?;
    Err(DashboardError::Config(
        "postgres warehouse requested but this build lacks the `postgres` feature".into(),
    ))
}
