use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::ComputeError;

/// Members of the forecasting ensemble.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ModelKind {
    Pattern,
    Weather,
    Persistence,
    Climatology,
    ApiForecast,
    NeuralPattern,
    MetaEnsemble,
}

impl ModelKind {
    pub const ALL: [ModelKind; 7] = [
        ModelKind::Pattern,
        ModelKind::Weather,
        ModelKind::Persistence,
        ModelKind::Climatology,
        ModelKind::ApiForecast,
        ModelKind::NeuralPattern,
        ModelKind::MetaEnsemble,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ModelKind::Pattern => "pattern",
            ModelKind::Weather => "weather",
            ModelKind::Persistence => "persistence",
            ModelKind::Climatology => "climatology",
            ModelKind::ApiForecast => "api_forecast",
            ModelKind::NeuralPattern => "neural_pattern",
            ModelKind::MetaEnsemble => "meta_ensemble",
        }
    }

    fn default_weight(&self) -> f64 {
        match self {
            ModelKind::Pattern => 0.22,
            ModelKind::Weather => 0.20,
            ModelKind::Persistence => 0.15,
            ModelKind::Climatology => 0.12,
            ModelKind::ApiForecast => 0.10,
            ModelKind::NeuralPattern => 0.12,
            ModelKind::MetaEnsemble => 0.09,
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelKind {
    type Err = ComputeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ModelKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| ComputeError::InvalidInput(format!("unknown model: {}", s)))
    }
}

/// Normalized ensemble weights.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelWeights {
    weights: BTreeMap<ModelKind, f64>,
}

/// Weight assigned to a member that has gone missing before renormalization.
const MISSING_WEIGHT: f64 = 0.1;

impl Default for ModelWeights {
    fn default() -> Self {
        Self {
            weights: ModelKind::ALL.iter().map(|k| (*k, k.default_weight())).collect(),
        }
    }
}

impl ModelWeights {
    pub fn get(&self, kind: ModelKind) -> f64 {
        self.weights.get(&kind).copied().unwrap_or(0.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (ModelKind, f64)> + '_ {
        self.weights.iter().map(|(k, w)| (*k, *w))
    }

    pub fn total(&self) -> f64 {
        self.weights.values().sum()
    }

    pub fn to_named_map(&self) -> BTreeMap<String, f64> {
        self.weights.iter().map(|(k, w)| (k.as_str().to_string(), *w)).collect()
    }

    /// Every member present with a non-negative weight, summing to one.
    pub(crate) fn normalized(mut self) -> Self {
        for kind in ModelKind::ALL {
            self.weights.entry(kind).or_insert(MISSING_WEIGHT);
        }
        let total = self.total();
        if total > 0.0 {
            for weight in self.weights.values_mut() {
                *weight /= total;
            }
        }
        self
    }
}

/// Moves weights toward members with lower recent error.
#[derive(Debug, Clone)]
pub struct AdaptiveWeightOptimizer {
    learning_rate: f64,
}

impl Default for AdaptiveWeightOptimizer {
    fn default() -> Self {
        Self { learning_rate: 0.05 }
    }
}

impl AdaptiveWeightOptimizer {
    pub fn new(learning_rate: f64) -> Self {
        Self { learning_rate }
    }

    /// Blend each scored member toward its inverse-error share; unscored members keep their weight.
    pub fn update_weights(
        &self,
        current: &ModelWeights,
        errors: &BTreeMap<ModelKind, f64>,
    ) -> ModelWeights {
        if errors.is_empty() {
            return current.clone();
        }

        let scores: BTreeMap<ModelKind, f64> =
            errors.iter().map(|(k, e)| (*k, 1.0 / (e + 0.1))).collect();
        let total_score: f64 = scores.values().sum();

        let weights = current
            .weights
            .iter()
            .map(|(kind, weight)| {
                let updated = match scores.get(kind) {
                    Some(score) => {
                        let target = score / total_score;
                        weight * (1.0 - self.learning_rate) + target * self.learning_rate
                    }
                    None => *weight,
                };
                (*kind, updated)
            })
            .collect();

        ModelWeights { weights }.normalized()
    }
}
