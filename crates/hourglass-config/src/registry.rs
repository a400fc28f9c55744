//! Explicit name-to-factory registries.
//!
//! Object references are resolved against a registry populated at startup
//! instead of importing symbols from arbitrary paths: an unknown path is a
//! configuration error naming the path, and the set of constructible objects
//! is closed and inspectable.

use crate::error::{ConfigError, ConfigResult};
use crate::reference::{ObjectRef, Params};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

type Factory<C, T> = Arc<dyn Fn(&C, &Params) -> ConfigResult<T> + Send + Sync>;

/// Maps object-reference source paths to factories.
///
/// `C` is the context handed to every factory (a configuration section for
/// handler registries, `()` for plain object registries); `T` is the produced
/// object.
pub struct Registry<C, T> {
    name: &'static str,
    entries: BTreeMap<String, Factory<C, T>>,
}

impl<C, T> fmt::Debug for Registry<C, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("name", &self.name)
            .field("entry_count", &self.entries.len())
            .finish_non_exhaustive()
    }
}

impl<C, T> Registry<C, T> {
    #[must_use]
    pub fn new(name: &'static str) -> Self {
        Self { name, entries: BTreeMap::new() }
    }

    /// Registers a factory under a source path.
    ///
    /// Returns `true` if the path was newly registered, `false` if it replaced
    /// an existing factory.
    pub fn register<F>(&mut self, path: impl Into<String>, factory: F) -> bool
    where
        F: Fn(&C, &Params) -> ConfigResult<T> + Send + Sync + 'static,
    {
        let path = path.into();
        debug!(registry = self.name, path = %path, "registering factory");
        let was_new = !self.entries.contains_key(&path);
        if !was_new {
            warn!(registry = self.name, path = %path, "factory replaced in registry");
        }
        self.entries.insert(path, Arc::new(factory));
        was_new
    }

    #[must_use]
    pub fn contains(&self, path: &str) -> bool {
        self.entries.contains_key(path)
    }

    #[must_use]
    pub fn paths(&self) -> Vec<&str> {
        self.entries.keys().map(String::as_str).collect()
    }

    /// Resolves a reference using only its declared params.
    pub fn resolve(&self, reference: &ObjectRef, ctx: &C) -> ConfigResult<T> {
        self.resolve_with(reference, ctx, &Params::new())
    }

    /// Resolves a reference, merging `overrides` on top of the declared params
    /// (caller-supplied values win on key conflicts).
    ///
    /// Factory failures are wrapped with the offending source path attached.
    pub fn resolve_with(&self, reference: &ObjectRef, ctx: &C, overrides: &Params) -> ConfigResult<T> {
        let factory = self.entries.get(&reference.source).ok_or_else(|| {
            ConfigError::UnknownReference { path: reference.source.clone(), registry: self.name }
        })?;
        let params = reference.params.merged(overrides);
        debug!(registry = self.name, path = %reference.source, "resolving object reference");
        factory(ctx, &params).map_err(|err| match err {
            unknown @ ConfigError::UnknownReference { .. } => unknown,
            other => ConfigError::Instantiate {
                path: reference.source.clone(),
                source: Box::new(other),
            },
        })
    }
}
