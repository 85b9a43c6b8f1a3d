//! Action outcome probabilities and the categorical outcome draw.
//! Normalization happens once at configuration time so repeated draws
//! are cheap and always consistent.
use indexmap::IndexMap;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::net::ids::{PlaceId, Subplace};
use crate::net::io::SimulationConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Success,
    Failure,
    Error,
}

impl Outcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Outcome::Success => "success",
            Outcome::Failure => "failure",
            Outcome::Error => "error",
        }
    }

    /// The subplace a resolved token is delivered to.
    pub fn subplace(self) -> Subplace {
        match self {
            Outcome::Success => Subplace::Success,
            Outcome::Failure => Subplace::Failure,
            Outcome::Error => Subplace::Error,
        }
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A success/failure/error triple, held as integer percentages that
/// always sum to exactly 100.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeProbability {
    pub success: u32,
    pub failure: u32,
    pub error: u32,
}

impl Default for OutcomeProbability {
    fn default() -> Self {
        Self {
            success: 100,
            failure: 0,
            error: 0,
        }
    }
}

impl OutcomeProbability {
    /// Normalize arbitrary non-negative weights. Negative or non-finite
    /// weights count as zero; an all-zero triple reverts to the default
    /// `(100, 0, 0)`. Rounding drift is folded into the largest bucket
    /// so the result always sums to 100.
    pub fn from_weights(success: f64, failure: f64, error: f64) -> Self {
        let clean = |w: f64| if w.is_finite() && w > 0.0 { w } else { 0.0 };
        let (success, failure, error) = (clean(success), clean(failure), clean(error));
        let total = success + failure + error;
        if total <= 0.0 {
            return Self::default();
        }

        let mut triple = Self {
            success: ((success / total) * 100.0).round() as u32,
            failure: ((failure / total) * 100.0).round() as u32,
            error: ((error / total) * 100.0).round() as u32,
        };
        let sum = triple.success + triple.failure + triple.error;
        let largest = if triple.success >= triple.failure && triple.success >= triple.error {
            &mut triple.success
        } else if triple.failure >= triple.error {
            &mut triple.failure
        } else {
            &mut triple.error
        };
        *largest = (*largest + 100).saturating_sub(sum);
        triple
    }

    /// Draw a uniform value in `[0, 100)` and map it to an outcome.
    pub fn resolve<R: Rng + ?Sized>(&self, rng: &mut R) -> Outcome {
        let roll = rng.random_range(0.0..100.0);
        if roll < self.success as f64 {
            Outcome::Success
        } else if roll < (self.success + self.failure) as f64 {
            Outcome::Failure
        } else {
            Outcome::Error
        }
    }
}

/// Per-place probability overrides; unset places resolve with the
/// default all-success triple.
#[derive(Debug, Clone, Default)]
pub struct ProbabilityTable(IndexMap<PlaceId, OutcomeProbability>);

impl ProbabilityTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_simulation_config(config: &SimulationConfig) -> Self {
        let mut table = Self::new();
        for (place, probability) in &config.action_probabilities {
            table.set(
                place.as_str().into(),
                OutcomeProbability::from_weights(
                    probability.success,
                    probability.failure,
                    probability.error,
                ),
            );
        }
        table
    }

    pub fn get(&self, place: &PlaceId) -> OutcomeProbability {
        self.0.get(place).copied().unwrap_or_default()
    }

    pub fn set(&mut self, place: PlaceId, probability: OutcomeProbability) {
        self.0.insert(place, probability);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&PlaceId, &OutcomeProbability)> {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn weights_normalize_to_percentages() {
        let p = OutcomeProbability::from_weights(50.0, 50.0, 0.0);
        assert_eq!((p.success, p.failure, p.error), (50, 50, 0));

        // Out-of-range weights re-normalize rather than fail.
        let p = OutcomeProbability::from_weights(200.0, 100.0, 100.0);
        assert_eq!((p.success, p.failure, p.error), (50, 25, 25));
        assert_eq!(p.success + p.failure + p.error, 100);
    }

    #[test]
    fn zero_triple_reverts_to_default() {
        let p = OutcomeProbability::from_weights(0.0, 0.0, 0.0);
        assert_eq!(p, OutcomeProbability::default());

        let p = OutcomeProbability::from_weights(-3.0, 0.0, f64::NAN);
        assert_eq!(p, OutcomeProbability::default());
    }

    #[test]
    fn rounding_drift_is_absorbed() {
        let p = OutcomeProbability::from_weights(1.0, 1.0, 1.0);
        assert_eq!(p.success + p.failure + p.error, 100);
    }

    #[test]
    fn guaranteed_outcomes_are_deterministic() {
        let mut rng = StdRng::seed_from_u64(7);
        let always_fail = OutcomeProbability::from_weights(0.0, 1.0, 0.0);
        let always_err = OutcomeProbability::from_weights(0.0, 0.0, 1.0);
        for _ in 0..100 {
            assert_eq!(always_fail.resolve(&mut rng), Outcome::Failure);
            assert_eq!(always_err.resolve(&mut rng), Outcome::Error);
        }
    }

    #[test]
    fn even_split_converges_statistically() {
        let mut rng = StdRng::seed_from_u64(42);
        let p = OutcomeProbability::from_weights(50.0, 50.0, 0.0);
        let draws = 10_000;
        let successes = (0..draws)
            .filter(|_| p.resolve(&mut rng) == Outcome::Success)
            .count();
        let ratio = successes as f64 / draws as f64;
        assert!((0.45..=0.55).contains(&ratio), "ratio {ratio} outside tolerance");
    }

    #[test]
    fn table_defaults_to_all_success() {
        let table = ProbabilityTable::new();
        assert_eq!(table.get(&"anything".into()), OutcomeProbability::default());
    }
}
