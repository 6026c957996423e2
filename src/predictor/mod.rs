//! Contract to the pre-trained profit/loss predictor.
//!
//! The dashboard never trains anything. It validates the user's form, hands a
//! [`PredictionRequest`] to whatever [`ProfitPredictor`] is installed and
//! returns either a [`PredictionResult`] or a [`PredictionError`] whose
//! message can be shown as-is.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, info};

use crate::analytics::RowSet;
use crate::pipeline::AnalysisTable;
use crate::warehouse::Field;

pub mod linear;

pub use linear::LinearArtifactPredictor;

pub const FALLBACK_SHIP_MODES: [&str; 4] =
    ["Standard Class", "Second Class", "First Class", "Same Day"];
pub const FALLBACK_CATEGORIES: [&str; 3] = ["Office Supplies", "Technology", "Furniture"];
pub const FALLBACK_SUBCATEGORIES: [&str; 17] = [
    "Binders",
    "Storage",
    "Art",
    "Paper",
    "Chairs",
    "Phones",
    "Furnishings",
    "Accessories",
    "Fasteners",
    "Labels",
    "Bookcases",
    "Supplies",
    "Envelopes",
    "Copiers",
    "Appliances",
    "Machines",
    "Tables",
];

/// A validated prediction input. `discount` is a fraction in `[0, 1]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRequest {
    pub quantity: f64,
    pub discount: f64,
    pub shipping_cost: f64,
    pub ship_mode: String,
    pub category: String,
    pub sub_category: String,
}

/// Raw form input as submitted; every field may be absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PredictionForm {
    pub quantity: Option<f64>,
    /// Percent, 0 to 100
    pub discount_percent: Option<f64>,
    pub shipping_cost: Option<f64>,
    pub ship_mode: Option<String>,
    pub category: Option<String>,
    pub sub_category: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PredictionStatus {
    Safe,
    AtRisk,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Moderate,
    High,
}

impl RiskLevel {
    pub fn of_probability(loss_probability: f64) -> Self {
        if loss_probability < 0.3 {
            RiskLevel::Low
        } else if loss_probability < 0.5 {
            RiskLevel::Moderate
        } else {
            RiskLevel::High
        }
    }
}

/// How the result card is presented: profitable, loss-making, or in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outlook {
    Favorable,
    Loss,
    Caution,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub predicted_profit: f64,
    pub loss_probability: f64,
    pub status: PredictionStatus,
    pub risk_level: RiskLevel,
    pub outlook: Outlook,
}

impl PredictionResult {
    /// Derives status, risk level and outlook from the two model outputs.
    pub fn from_outputs(predicted_profit: f64, loss_probability: f64) -> Self {
        let status = if predicted_profit < 0.0 || loss_probability > 0.5 {
            PredictionStatus::AtRisk
        } else {
            PredictionStatus::Safe
        };
        let outlook = if predicted_profit >= 0.0 && loss_probability < 0.5 {
            Outlook::Favorable
        } else if predicted_profit < 0.0 {
            Outlook::Loss
        } else {
            Outlook::Caution
        };
        PredictionResult {
            predicted_profit,
            loss_probability,
            status,
            risk_level: RiskLevel::of_probability(loss_probability),
            outlook,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PredictionError {
    #[error("Please fill in all fields to get a prediction ({0} is missing)")]
    MissingField(&'static str),

    #[error("Invalid {field}: {message}")]
    OutOfRange {
        field: &'static str,
        message: String,
    },

    #[error("Invalid input: unknown {field} '{value}'. Ensure all inputs match expected values.")]
    UnknownLabel { field: &'static str, value: String },

    #[error("Model or encoder not loaded. Check the models directory and logs. ({0})")]
    Unavailable(String),

    #[error("Prediction failed: {0}")]
    Model(String),
}

/// Labels a predictor was trained on, per categorical input.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Vocabulary {
    pub ship_modes: Vec<String>,
    pub categories: Vec<String>,
    pub sub_categories: Vec<String>,
}

pub trait ProfitPredictor: Send + Sync {
    fn predict(&self, request: &PredictionRequest) -> Result<PredictionResult, PredictionError>;

    /// Known categorical labels, or `None` when the predictor has none.
    fn vocabulary(&self) -> Option<&Vocabulary>;
}

/// Stand-in used when no artifact could be loaded.
#[derive(Debug, Clone)]
pub struct UnavailablePredictor {
    reason: String,
}

impl UnavailablePredictor {
    pub fn new(reason: impl Into<String>) -> Self {
        UnavailablePredictor {
            reason: reason.into(),
        }
    }
}

impl ProfitPredictor for UnavailablePredictor {
    fn predict(&self, _request: &PredictionRequest) -> Result<PredictionResult, PredictionError> {
        Err(PredictionError::Unavailable(self.reason.clone()))
    }

    fn vocabulary(&self) -> Option<&Vocabulary> {
        None
    }
}

/// Validates form input and delegates to the installed predictor.
pub struct PredictionService {
    predictor: Box<dyn ProfitPredictor>,
}

impl std::fmt::Debug for PredictionService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PredictionService")
            .field("vocabulary", &self.predictor.vocabulary())
            .finish()
    }
}

impl PredictionService {
    pub fn new(predictor: Box<dyn ProfitPredictor>) -> Self {
        PredictionService { predictor }
    }

    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::new(Box::new(UnavailablePredictor::new(reason)))
    }

    /// Loads a linear artifact, falling back to an unavailable predictor.
    pub fn from_artifact(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return Self::unavailable("no predictor artifact configured");
        };
        match LinearArtifactPredictor::from_path(path) {
            Ok(predictor) => {
                info!(artifact = %path.display(), "predictor loaded");
                Self::new(Box::new(predictor))
            }
            Err(e) => {
                error!(artifact = %path.display(), error = %e, "predictor artifact failed to load");
                Self::unavailable(e.to_string())
            }
        }
    }

    pub fn vocabulary(&self) -> Option<&Vocabulary> {
        self.predictor.vocabulary()
    }

    /// Turns raw form input into a request, or explains what is wrong with it.
    pub fn validate(&self, form: &PredictionForm) -> Result<PredictionRequest, PredictionError> {
        let quantity = form.quantity.ok_or(PredictionError::MissingField("quantity"))?;
        let discount_percent = form
            .discount_percent
            .ok_or(PredictionError::MissingField("discount"))?;
        let shipping_cost = form
            .shipping_cost
            .ok_or(PredictionError::MissingField("shipping cost"))?;
        let ship_mode = present(&form.ship_mode, "ship mode")?;
        let category = present(&form.category, "category")?;
        let sub_category = present(&form.sub_category, "sub-category")?;

        for (field, value) in [
            ("quantity", quantity),
            ("discount", discount_percent),
            ("shipping cost", shipping_cost),
        ] {
            if !value.is_finite() {
                return Err(PredictionError::OutOfRange {
                    field,
                    message: "must be a finite number".into(),
                });
            }
        }
        if !(0.0..=100.0).contains(&discount_percent) {
            return Err(PredictionError::OutOfRange {
                field: "discount",
                message: "please enter a discount value between 0 and 100".into(),
            });
        }
        if quantity < 1.0 {
            return Err(PredictionError::OutOfRange {
                field: "quantity",
                message: "must be at least 1".into(),
            });
        }
        if shipping_cost < 0.0 {
            return Err(PredictionError::OutOfRange {
                field: "shipping cost",
                message: "must not be negative".into(),
            });
        }

        if let Some(vocab) = self.predictor.vocabulary() {
            known(&vocab.ship_modes, &ship_mode, "ship mode")?;
            known(&vocab.categories, &category, "category")?;
            known(&vocab.sub_categories, &sub_category, "sub-category")?;
        }

        Ok(PredictionRequest {
            quantity,
            discount: discount_percent / 100.0,
            shipping_cost,
            ship_mode,
            category,
            sub_category,
        })
    }

    pub fn predict(&self, form: &PredictionForm) -> Result<PredictionResult, PredictionError> {
        let request = self.validate(form)?;
        self.predictor.predict(&request).inspect_err(|e| {
            error!(error = %e, "prediction failed");
        })
    }
}

fn present(value: &Option<String>, field: &'static str) -> Result<String, PredictionError> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or(PredictionError::MissingField(field))
}

fn known(labels: &[String], value: &str, field: &'static str) -> Result<(), PredictionError> {
    if labels.is_empty() || labels.iter().any(|l| l == value) {
        Ok(())
    } else {
        Err(PredictionError::UnknownLabel {
            field,
            value: value.to_string(),
        })
    }
}

/// Choices offered by the predictor form.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DropdownOptions {
    pub ship_modes: Vec<String>,
    pub categories: Vec<String>,
    pub sub_categories: Vec<String>,
}

/// Dropdown choices: distinct warehouse values, else the fixed fallbacks.
///
/// A predictor vocabulary takes precedence, restricted to labels the
/// fallback list also knows. An empty result always becomes the fallback.
pub fn dropdown_options(table: &AnalysisTable, vocabulary: Option<&Vocabulary>) -> DropdownOptions {
    let pick = |field: Field, fallback: &[&str], known: Option<&Vec<String>>| {
        let choices: Vec<String> = match known {
            Some(labels) => labels
                .iter()
                .filter(|l| fallback.contains(&l.as_str()))
                .cloned()
                .collect(),
            None => distinct_values(table, field),
        };
        if choices.is_empty() {
            fallback.iter().map(|s| s.to_string()).collect()
        } else {
            choices
        }
    };

    DropdownOptions {
        ship_modes: pick(
            Field::ShipMode,
            &FALLBACK_SHIP_MODES[..],
            vocabulary.map(|v| &v.ship_modes),
        ),
        categories: pick(
            Field::Category,
            &FALLBACK_CATEGORIES[..],
            vocabulary.map(|v| &v.categories),
        ),
        sub_categories: pick(
            Field::SubCategory,
            &FALLBACK_SUBCATEGORIES[..],
            vocabulary.map(|v| &v.sub_categories),
        ),
    }
}

/// Distinct non-null values of a field in first-appearance order.
fn distinct_values(table: &AnalysisTable, field: Field) -> Vec<String> {
    let Ok(column) = table.column(field) else {
        return Vec::new();
    };
    let mut seen = HashSet::new();
    RowSet::all(table.row_count())
        .iter()
        .filter_map(|i| column.text_at(i))
        .filter(|v| seen.insert(v.to_string()))
        .map(|v| v.into_owned())
        .collect()
}
