use crate::error::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};

/// Keyword arguments carried by an object reference, as free-form JSON values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Params(pub serde_json::Map<String, serde_json::Value>);

impl Params {
    #[must_use]
    pub fn new() -> Self {
        Self(serde_json::Map::new())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.0.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: serde_json::Value) {
        self.0.insert(key.into(), value);
    }

    /// Merge `overrides` on top of these params.
    ///
    /// Precedence rule: caller-supplied overrides win over configuration-declared
    /// values on key conflicts; disjoint keys are combined.
    #[must_use]
    pub fn merged(&self, overrides: &Params) -> Params {
        let mut out = self.0.clone();
        for (key, value) in &overrides.0 {
            out.insert(key.clone(), value.clone());
        }
        Params(out)
    }

    pub fn get_f64(&self, key: &str) -> ConfigResult<Option<f64>> {
        match self.0.get(key) {
            None => Ok(None),
            Some(value) => value.as_f64().map(Some).ok_or_else(|| {
                ConfigError::invalid(key, format!("expected a number, got {value}"))
            }),
        }
    }

    pub fn get_u64(&self, key: &str) -> ConfigResult<Option<u64>> {
        match self.0.get(key) {
            None => Ok(None),
            Some(value) => value.as_u64().map(Some).ok_or_else(|| {
                ConfigError::invalid(key, format!("expected a non-negative integer, got {value}"))
            }),
        }
    }

    pub fn get_usize(&self, key: &str) -> ConfigResult<Option<usize>> {
        Ok(self.get_u64(key)?.map(|v| v as usize))
    }

    pub fn get_str(&self, key: &str) -> ConfigResult<Option<&str>> {
        match self.0.get(key) {
            None => Ok(None),
            Some(value) => value.as_str().map(Some).ok_or_else(|| {
                ConfigError::invalid(key, format!("expected a string, got {value}"))
            }),
        }
    }

    pub fn get_bool(&self, key: &str) -> ConfigResult<Option<bool>> {
        match self.0.get(key) {
            None => Ok(None),
            Some(value) => value.as_bool().map(Some).ok_or_else(|| {
                ConfigError::invalid(key, format!("expected a boolean, got {value}"))
            }),
        }
    }
}

/// A configuration value naming a registered object plus its keyword arguments.
///
/// The `source` path is looked up in a [`crate::Registry`]; it never triggers a
/// dynamic import.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectRef {
    pub source: String,
    #[serde(default, skip_serializing_if = "Params::is_empty")]
    pub params: Params,
}

impl ObjectRef {
    #[must_use]
    pub fn new(source: impl Into<String>) -> Self {
        Self { source: source.into(), params: Params::new() }
    }

    #[must_use]
    pub fn with_param(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.params.insert(key, value);
        self
    }
}

/// A field that is either a literal value or an object reference.
///
/// Maps with a `source` key deserialize as references; anything else is tried
/// as the literal type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ValueOrRef<T> {
    Reference(ObjectRef),
    Value(T),
}

impl<T> ValueOrRef<T> {
    #[must_use]
    pub fn as_value(&self) -> Option<&T> {
        match self {
            Self::Value(v) => Some(v),
            Self::Reference(_) => None,
        }
    }

    #[must_use]
    pub fn as_reference(&self) -> Option<&ObjectRef> {
        match self {
            Self::Reference(r) => Some(r),
            Self::Value(_) => None,
        }
    }
}
