//! Random sampling of concrete configurations from a search space.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use crate::search::{HyperparameterSpec, ParameterValue, SearchSpace};

/// One concrete draw from a [`SearchSpace`], in the space's declaration order.
#[derive(Debug, Clone, PartialEq)]
pub struct SampledConfiguration {
    values: Vec<(String, ParameterValue)>,
}

impl SampledConfiguration {
    pub fn get(&self, name: &str) -> Option<&ParameterValue> {
        self.values
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParameterValue)> {
        self.values.iter().map(|(key, value)| (key.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl Serialize for SampledConfiguration {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (key, value) in &self.values {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

/// Memoryless random sampler.
///
/// Every call to [`Sampler::sample`] is an independent draw; nothing is
/// remembered between trials, so repeated configurations are possible.
#[derive(Debug, Clone)]
pub struct Sampler<R = StdRng> {
    rng: R,
}

impl Sampler<StdRng> {
    /// Sampler seeded from operating-system entropy.
    pub fn from_entropy() -> Self {
        Self {
            rng: StdRng::from_os_rng(),
        }
    }

    /// Sampler with a fixed seed, for reproducible searches.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl<R: Rng> Sampler<R> {
    pub fn with_rng(rng: R) -> Self {
        Self { rng }
    }

    pub fn sample(&mut self, space: &SearchSpace) -> SampledConfiguration {
        let values = space
            .parameters()
            .iter()
            .map(|param| {
                let value = match &param.spec {
                    HyperparameterSpec::ContinuousRange { lower, upper } => {
                        ParameterValue::Float(uniform_below(&mut self.rng, *lower, *upper))
                    }
                    HyperparameterSpec::DiscreteSet { values } => {
                        let idx = self.rng.random_range(0..values.len());
                        values[idx].clone()
                    }
                    HyperparameterSpec::Fixed { value } => value.clone(),
                    HyperparameterSpec::BooleanFlag { default } => ParameterValue::Bool(*default),
                };
                (param.name.clone(), value)
            })
            .collect();

        SampledConfiguration { values }
    }
}

/// Uniform draw from `[lower, upper)`.
///
/// Float sampling can round up to `upper` itself; such draws are pulled
/// back to the largest float below it.
fn uniform_below<R: Rng>(rng: &mut R, lower: f64, upper: f64) -> f64 {
    let v = rng.random_range(lower..upper);
    if v < upper {
        v
    } else {
        next_below(upper).max(lower)
    }
}

/// Largest `f64` strictly below a finite `x`.
fn next_below(x: f64) -> f64 {
    if x == 0.0 {
        -f64::from_bits(1)
    } else if x > 0.0 {
        f64::from_bits(x.to_bits() - 1)
    } else {
        f64::from_bits(x.to_bits() + 1)
    }
}
