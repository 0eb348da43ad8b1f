//! Typed parameter sets handed to the external training procedure.

use serde::{Deserialize, Serialize};

use crate::sampler::SampledConfiguration;
use crate::search::ParameterValue;

/// One named parameter for the training procedure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingParameter {
    pub name: String,
    pub value: ParameterValue,
}

/// The full parameter set for one training run.
///
/// Built 1:1 from a [`SampledConfiguration`]: each configuration key becomes
/// exactly one parameter with the same name, in the same order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingParameters {
    parameters: Vec<TrainingParameter>,
}

impl TrainingParameters {
    pub fn get(&self, name: &str) -> Option<&ParameterValue> {
        self.parameters
            .iter()
            .find(|param| param.name == name)
            .map(|param| &param.value)
    }

    pub fn iter(&self) -> impl Iterator<Item = &TrainingParameter> {
        self.parameters.iter()
    }

    pub fn len(&self) -> usize {
        self.parameters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty()
    }

    /// Render as command-line arguments.
    ///
    /// Valued parameters become `--name=value`. Booleans become `--name` when
    /// set and `--no_name` when cleared, so every parameter yields exactly one
    /// argument.
    pub fn to_args(&self) -> Vec<String> {
        self.parameters
            .iter()
            .map(|param| match &param.value {
                ParameterValue::Bool(true) => format!("--{}", param.name),
                ParameterValue::Bool(false) => format!("--no_{}", param.name),
                value => format!("--{}={value}", param.name),
            })
            .collect()
    }
}

impl From<&SampledConfiguration> for TrainingParameters {
    fn from(config: &SampledConfiguration) -> Self {
        Self {
            parameters: config
                .iter()
                .map(|(name, value)| TrainingParameter {
                    name: name.to_string(),
                    value: value.clone(),
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sampler::Sampler;
    use crate::search::SearchSpace;

    #[test]
    fn every_configuration_key_maps_to_one_argument() {
        let space = SearchSpace::builder()
            .fixed("patches_path", "/data/patches")
            .discrete("model", ["resnet"])
            .fixed("patch_size", 64)
            .continuous("clf_lr", 0.001, 0.002)
            .flag("reg_biases", false)
            .flag("augment", true)
            .build()
            .unwrap();
        let config = Sampler::seeded(3).sample(&space);
        let params = TrainingParameters::from(&config);

        assert_eq!(params.len(), config.len());
        let args = params.to_args();
        assert_eq!(args.len(), config.len());
        assert_eq!(args[0], "--patches_path=/data/patches");
        assert_eq!(args[1], "--model=resnet");
        assert_eq!(args[2], "--patch_size=64");
        assert!(args[3].starts_with("--clf_lr=0.00"));
        assert_eq!(args[4], "--no_reg_biases");
        assert_eq!(args[5], "--augment");
    }

    #[test]
    fn translation_is_deterministic() {
        let space = SearchSpace::builder()
            .continuous("l2", 0.0, 1e-2)
            .discrete("train_batch_size", [16, 32, 64])
            .build()
            .unwrap();
        let config = Sampler::from_entropy().sample(&space);

        let first = TrainingParameters::from(&config);
        let second = TrainingParameters::from(&config);
        assert_eq!(first, second);
        assert_eq!(first.to_args(), second.to_args());
        assert_eq!(first.get("l2"), config.get("l2"));
    }

    #[test]
    fn float_arguments_round_trip_through_text() {
        let space = SearchSpace::builder()
            .continuous("finetune_lr", 1e-7, 1e-2)
            .build()
            .unwrap();
        let config = Sampler::seeded(99).sample(&space);
        let params = TrainingParameters::from(&config);

        let arg = &params.to_args()[0];
        let text = arg.strip_prefix("--finetune_lr=").unwrap();
        let parsed: f64 = text.parse().unwrap();
        assert_eq!(Some(parsed), config.get("finetune_lr").and_then(ParameterValue::as_f64));
    }
}
