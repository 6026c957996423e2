//! Predictor backed by a JSON artifact of linear models.
//!
//! The artifact carries everything the feature pipeline needs: label
//! encoders for the three categorical inputs, a standard scaler over the
//! numeric features, and one linear model per output. Each model selects a
//! subset of the encoded feature vector before applying its coefficients.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::predictor::{
    PredictionError, PredictionRequest, PredictionResult, ProfitPredictor, Vocabulary,
};

/// Length of the encoded feature vector.
pub const FEATURE_COUNT: usize = 8;

/// Positions of the scaled numeric features within the feature vector:
/// quantity, discount, shipping cost, quantity x discount, shipping x discount.
const SCALED: [usize; 5] = [0, 1, 2, 6, 7];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    pub mean: [f64; 5],
    pub scale: [f64; 5],
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearModel {
    /// Indices into the feature vector this model reads
    pub features: Vec<usize>,
    pub coefficients: Vec<f64>,
    pub intercept: f64,
}

impl LinearModel {
    fn decision(&self, encoded: &[f64; FEATURE_COUNT]) -> f64 {
        self.features
            .iter()
            .zip(&self.coefficients)
            .map(|(&idx, coef)| encoded[idx] * coef)
            .sum::<f64>()
            + self.intercept
    }

    fn check(&self, name: &str) -> Result<(), PredictionError> {
        if self.features.len() != self.coefficients.len() {
            return Err(PredictionError::Model(format!(
                "{name}: {} selected features but {} coefficients",
                self.features.len(),
                self.coefficients.len()
            )));
        }
        if let Some(bad) = self.features.iter().find(|&&i| i >= FEATURE_COUNT) {
            return Err(PredictionError::Model(format!(
                "{name}: feature index {bad} out of range"
            )));
        }
        Ok(())
    }
}

/// On-disk layout of the predictor artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictorArtifact {
    /// Class labels per categorical input; a label encodes as its position.
    pub encoders: Vocabulary,
    pub scaler: StandardScaler,
    pub regressor: LinearModel,
    /// Logistic model; its sigmoid is the probability of a loss.
    pub classifier: LinearModel,
}

#[derive(Debug, Clone)]
pub struct LinearArtifactPredictor {
    artifact: PredictorArtifact,
}

impl LinearArtifactPredictor {
    pub fn new(artifact: PredictorArtifact) -> Result<Self, PredictionError> {
        artifact.regressor.check("regressor")?;
        artifact.classifier.check("classifier")?;
        if artifact.scaler.scale.iter().any(|s| !s.is_finite() || *s == 0.0) {
            return Err(PredictionError::Model("scaler has a zero or non-finite scale".into()));
        }
        Ok(LinearArtifactPredictor { artifact })
    }

    pub fn from_path(path: &Path) -> Result<Self, PredictionError> {
        let raw = fs::read_to_string(path).map_err(|e| {
            PredictionError::Unavailable(format!("cannot read {}: {e}", path.display()))
        })?;
        let artifact: PredictorArtifact = serde_json::from_str(&raw).map_err(|e| {
            PredictionError::Unavailable(format!("invalid artifact {}: {e}", path.display()))
        })?;
        Self::new(artifact)
    }

    /// Encodes and scales a request into the model's feature vector.
    pub fn encode(
        &self,
        request: &PredictionRequest,
    ) -> Result<[f64; FEATURE_COUNT], PredictionError> {
        let enc = &self.artifact.encoders;
        let mut features = [
            request.quantity,
            request.discount,
            request.shipping_cost,
            label_code(&enc.ship_modes, &request.ship_mode, "ship mode")?,
            label_code(&enc.categories, &request.category, "category")?,
            label_code(&enc.sub_categories, &request.sub_category, "sub-category")?,
            request.quantity * request.discount,
            request.shipping_cost * request.discount,
        ];
        let scaler = &self.artifact.scaler;
        for (slot, &idx) in SCALED.iter().enumerate() {
            features[idx] = (features[idx] - scaler.mean[slot]) / scaler.scale[slot];
        }
        Ok(features)
    }
}

fn label_code(
    classes: &[String],
    value: &str,
    field: &'static str,
) -> Result<f64, PredictionError> {
    classes
        .iter()
        .position(|c| c == value)
        .map(|p| p as f64)
        .ok_or_else(|| PredictionError::UnknownLabel {
            field,
            value: value.to_string(),
        })
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

impl ProfitPredictor for LinearArtifactPredictor {
    fn predict(&self, request: &PredictionRequest) -> Result<PredictionResult, PredictionError> {
        let encoded = self.encode(request)?;
        let profit = self.artifact.regressor.decision(&encoded);
        let loss_probability = sigmoid(self.artifact.classifier.decision(&encoded));
        if !profit.is_finite() || !loss_probability.is_finite() {
            return Err(PredictionError::Model("model produced a non-finite output".into()));
        }
        Ok(PredictionResult::from_outputs(profit, loss_probability))
    }

    fn vocabulary(&self) -> Option<&Vocabulary> {
        Some(&self.artifact.encoders)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predictor::{PredictionStatus, RiskLevel};
    use std::io::Write;

    fn artifact() -> PredictorArtifact {
        PredictorArtifact {
            encoders: Vocabulary {
                ship_modes: vec!["First Class".into(), "Standard Class".into()],
                categories: vec!["Furniture".into(), "Technology".into()],
                sub_categories: vec!["Chairs".into(), "Phones".into()],
            },
            scaler: StandardScaler {
                mean: [0.0; 5],
                scale: [1.0; 5],
            },
            // profit = 10 * quantity - 100 * discount
            regressor: LinearModel {
                features: vec![0, 1],
                coefficients: vec![10.0, -100.0],
                intercept: 0.0,
            },
            // logit = 8 * discount - 2
            classifier: LinearModel {
                features: vec![1],
                coefficients: vec![8.0],
                intercept: -2.0,
            },
        }
    }

    fn request(discount: f64) -> PredictionRequest {
        PredictionRequest {
            quantity: 2.0,
            discount,
            shipping_cost: 5.0,
            ship_mode: "Standard Class".into(),
            category: "Technology".into(),
            sub_category: "Phones".into(),
        }
    }

    #[test]
    fn encodes_labels_by_position_and_interactions() {
        let p = LinearArtifactPredictor::new(artifact()).unwrap();
        let f = p.encode(&request(0.5)).unwrap();
        assert_eq!(f, [2.0, 0.5, 5.0, 1.0, 1.0, 1.0, 1.0, 2.5]);
    }

    #[test]
    fn low_discount_is_safe_high_discount_is_at_risk() {
        let p = LinearArtifactPredictor::new(artifact()).unwrap();

        let safe = p.predict(&request(0.0)).unwrap();
        assert_eq!(safe.predicted_profit, 20.0);
        assert!(safe.loss_probability < 0.3);
        assert_eq!(safe.status, PredictionStatus::Safe);
        assert_eq!(safe.risk_level, RiskLevel::Low);

        let risky = p.predict(&request(0.8)).unwrap();
        assert!(risky.predicted_profit < 0.0);
        assert_eq!(risky.status, PredictionStatus::AtRisk);
        assert_eq!(risky.risk_level, RiskLevel::High);
    }

    #[test]
    fn unknown_label_is_rejected() {
        let p = LinearArtifactPredictor::new(artifact()).unwrap();
        let mut r = request(0.1);
        r.category = "Toys".into();
        assert!(matches!(
            p.predict(&r),
            Err(PredictionError::UnknownLabel { field: "category", .. })
        ));
    }

    #[test]
    fn malformed_models_are_refused() {
        let mut a = artifact();
        a.classifier.features.push(9);
        a.classifier.coefficients.push(1.0);
        assert!(LinearArtifactPredictor::new(a).is_err());

        let mut a = artifact();
        a.scaler.scale[2] = 0.0;
        assert!(LinearArtifactPredictor::new(a).is_err());
    }

    #[test]
    fn loads_from_json_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(serde_json::to_string(&artifact()).unwrap().as_bytes())
            .unwrap();
        let p = LinearArtifactPredictor::from_path(file.path()).unwrap();
        assert_eq!(p.vocabulary().unwrap().categories.len(), 2);

        let missing = LinearArtifactPredictor::from_path(Path::new("/nonexistent/model.json"));
        assert!(matches!(missing, Err(PredictionError::Unavailable(_))));
    }
}
