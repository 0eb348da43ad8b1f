//! Search space definitions.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::error::SearchResult;
use crate::invalid_space;

/// A concrete hyperparameter value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParameterValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl ParameterValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(*v),
            Self::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(v) => Some(v),
            _ => None,
        }
    }
}

impl std::fmt::Display for ParameterValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Text(v) => f.write_str(v),
        }
    }
}

impl From<bool> for ParameterValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for ParameterValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for ParameterValue {
    fn from(v: i32) -> Self {
        Self::Int(v.into())
    }
}

impl From<u32> for ParameterValue {
    fn from(v: u32) -> Self {
        Self::Int(v.into())
    }
}

impl From<f64> for ParameterValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<String> for ParameterValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<&str> for ParameterValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

/// Domain of a single hyperparameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HyperparameterSpec {
    /// Uniform over the half-open interval `[lower, upper)`.
    ContinuousRange { lower: f64, upper: f64 },
    /// Uniform choice among `values`.
    DiscreteSet { values: Vec<ParameterValue> },
    /// Passed through unchanged.
    Fixed { value: ParameterValue },
    /// A boolean switch held at its configured value.
    BooleanFlag { default: bool },
}

/// A named dimension of the search space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterDef {
    pub name: String,
    pub spec: HyperparameterSpec,
}

/// A validated search space.
///
/// Only [`SearchSpaceBuilder::build`] can produce one, so every range in a
/// `SearchSpace` is non-empty and every name is unique. Declaration order is
/// kept so audit records read the way the space was written.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchSpace {
    parameters: Vec<ParameterDef>,
}

impl SearchSpace {
    pub fn builder() -> SearchSpaceBuilder {
        SearchSpaceBuilder::default()
    }

    pub fn get(&self, name: &str) -> Option<&HyperparameterSpec> {
        self.parameters
            .iter()
            .find(|param| param.name == name)
            .map(|param| &param.spec)
    }

    pub fn parameters(&self) -> &[ParameterDef] {
        &self.parameters
    }

    pub fn len(&self) -> usize {
        self.parameters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty()
    }
}

/// Collects parameter definitions; validation happens in [`Self::build`].
#[derive(Debug, Clone, Default)]
pub struct SearchSpaceBuilder {
    parameters: Vec<ParameterDef>,
}

impl SearchSpaceBuilder {
    pub fn continuous(mut self, name: impl Into<String>, lower: f64, upper: f64) -> Self {
        self.parameters.push(ParameterDef {
            name: name.into(),
            spec: HyperparameterSpec::ContinuousRange { lower, upper },
        });
        self
    }

    pub fn discrete<I, V>(mut self, name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<ParameterValue>,
    {
        self.parameters.push(ParameterDef {
            name: name.into(),
            spec: HyperparameterSpec::DiscreteSet {
                values: values.into_iter().map(Into::into).collect(),
            },
        });
        self
    }

    pub fn fixed(mut self, name: impl Into<String>, value: impl Into<ParameterValue>) -> Self {
        self.parameters.push(ParameterDef {
            name: name.into(),
            spec: HyperparameterSpec::Fixed {
                value: value.into(),
            },
        });
        self
    }

    pub fn flag(mut self, name: impl Into<String>, default: bool) -> Self {
        self.parameters.push(ParameterDef {
            name: name.into(),
            spec: HyperparameterSpec::BooleanFlag { default },
        });
        self
    }

    /// Validate every definition and freeze the space.
    pub fn build(self) -> SearchResult<SearchSpace> {
        let mut seen = HashSet::new();

        for param in &self.parameters {
            if param.name.is_empty() {
                return Err(invalid_space!("parameter names must not be empty"));
            }
            if !seen.insert(param.name.as_str()) {
                return Err(invalid_space!("duplicate parameter '{}'", param.name));
            }

            match &param.spec {
                HyperparameterSpec::ContinuousRange { lower, upper } => {
                    if !lower.is_finite() || !upper.is_finite() {
                        return Err(invalid_space!(
                            "range for '{}' must have finite bounds, got [{lower}, {upper})",
                            param.name
                        ));
                    }
                    if lower >= upper {
                        return Err(invalid_space!(
                            "range for '{}' is empty: lower {lower} must be below upper {upper}",
                            param.name
                        ));
                    }
                    if !(upper - lower).is_finite() {
                        return Err(invalid_space!(
                            "range for '{}' is too wide to sample: [{lower}, {upper})",
                            param.name
                        ));
                    }
                }
                HyperparameterSpec::DiscreteSet { values } if values.is_empty() => {
                    return Err(invalid_space!("value set for '{}' is empty", param.name));
                }
                _ => {}
            }
        }

        Ok(SearchSpace {
            parameters: self.parameters,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SearchError;

    #[test]
    fn builder_preserves_declaration_order() {
        let space = SearchSpace::builder()
            .continuous("lr", 1e-5, 1e-2)
            .discrete("model", ["vgg", "resnet"])
            .fixed("patch_size", 64)
            .flag("augment", true)
            .build()
            .unwrap();

        let names: Vec<&str> = space.parameters().iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["lr", "model", "patch_size", "augment"]);
        assert_eq!(space.len(), 4);
        assert_eq!(
            space.get("augment"),
            Some(&HyperparameterSpec::BooleanFlag { default: true })
        );
        assert!(space.get("momentum").is_none());
    }

    #[test]
    fn inverted_range_is_rejected() {
        let err = SearchSpace::builder()
            .continuous("lr", 1e-2, 1e-5)
            .build()
            .unwrap_err();
        assert!(matches!(err, SearchError::InvalidSpace { .. }));
        assert!(err.to_string().contains("lr"));
    }

    #[test]
    fn degenerate_range_is_rejected() {
        let result = SearchSpace::builder().continuous("l2", 0.0, 0.0).build();
        assert!(matches!(result, Err(SearchError::InvalidSpace { .. })));
    }

    #[test]
    fn non_finite_range_is_rejected() {
        let result = SearchSpace::builder()
            .continuous("momentum", f64::NAN, 0.95)
            .build();
        assert!(matches!(result, Err(SearchError::InvalidSpace { .. })));

        let result = SearchSpace::builder()
            .continuous("momentum", 0.0, f64::INFINITY)
            .build();
        assert!(matches!(result, Err(SearchError::InvalidSpace { .. })));
    }

    #[test]
    fn overflowing_range_width_is_rejected() {
        let err = SearchSpace::builder()
            .continuous("l2", -1e308, 1e308)
            .build()
            .unwrap_err();
        assert!(matches!(err, SearchError::InvalidSpace { .. }));
        assert!(err.to_string().contains("too wide"));

        assert!(SearchSpace::builder()
            .continuous("l2", -1e307, 1e307)
            .build()
            .is_ok());
    }

    #[test]
    fn empty_discrete_set_is_rejected() {
        let result = SearchSpace::builder()
            .discrete("model", Vec::<String>::new())
            .build();
        assert!(matches!(result, Err(SearchError::InvalidSpace { .. })));
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let err = SearchSpace::builder()
            .fixed("threads", 5)
            .fixed("threads", 8)
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("duplicate parameter 'threads'"));
    }

    #[test]
    fn space_serializes_with_kind_tags() {
        let space = SearchSpace::builder()
            .continuous("lr", 0.001, 0.01)
            .discrete("train_batch_size", [16, 32])
            .build()
            .unwrap();

        let json = serde_json::to_value(&space).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "parameters": [
                    {"name": "lr", "spec": {"kind": "continuous_range", "lower": 0.001, "upper": 0.01}},
                    {"name": "train_batch_size", "spec": {"kind": "discrete_set", "values": [16, 32]}}
                ]
            })
        );
    }

    #[test]
    fn untagged_values_keep_their_type() {
        let values: Vec<ParameterValue> =
            serde_json::from_str(r#"[true, 32, 0.5, "vgg"]"#).unwrap();
        assert_eq!(
            values,
            vec![
                ParameterValue::Bool(true),
                ParameterValue::Int(32),
                ParameterValue::Float(0.5),
                ParameterValue::Text("vgg".into()),
            ]
        );
        assert_eq!(values[1].as_f64(), Some(32.0));
        assert_eq!(values[3].as_str(), Some("vgg"));
        assert_eq!(values[0].as_bool(), Some(true));
    }
}
