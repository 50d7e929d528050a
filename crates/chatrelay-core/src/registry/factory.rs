//! Generic kind-to-factory table with an instance cache.

use std::collections::HashMap;
use std::sync::Arc;

use super::RegistryError;

/// Builds one plugin instance from its name and options.
pub type Factory<T> =
    Box<dyn Fn(&str, &serde_json::Value) -> Result<T, RegistryError> + Send + Sync>;

struct Registration<T, P> {
    factory: Factory<T>,
    params: P,
}

/// Factories for one plugin category, keyed by kind.
pub struct FactoryRegistry<T, P> {
    category: &'static str,
    registrations: HashMap<String, Registration<T, P>>,
    instances: HashMap<String, Arc<T>>,
}

impl<T, P> FactoryRegistry<T, P> {
    pub fn new(category: &'static str) -> Self {
        Self {
            category,
            registrations: HashMap::new(),
            instances: HashMap::new(),
        }
    }

    /// Register a factory for `kind` with its declared capabilities.
    pub fn register<F>(
        &mut self,
        kind: impl Into<String>,
        params: P,
        factory: F,
    ) -> Result<(), RegistryError>
    where
        F: Fn(&str, &serde_json::Value) -> Result<T, RegistryError> + Send + Sync + 'static,
    {
        let kind = kind.into();
        if self.registrations.contains_key(&kind) {
            return Err(RegistryError::DuplicateKind {
                category: self.category,
                kind,
            });
        }
        self.registrations.insert(
            kind,
            Registration {
                factory: Box::new(factory),
                params,
            },
        );
        Ok(())
    }

    /// Declared capabilities of `kind`.
    pub fn params(&self, kind: &str) -> Option<&P> {
        self.registrations.get(kind).map(|r| &r.params)
    }

    /// Build and cache an instance of `kind` named `name`.
    pub fn create(
        &mut self,
        kind: &str,
        name: &str,
        options: &serde_json::Value,
    ) -> Result<Arc<T>, RegistryError> {
        if self.instances.contains_key(name) {
            return Err(RegistryError::DuplicateInstance {
                category: self.category,
                name: name.to_string(),
            });
        }
        let registration =
            self.registrations
                .get(kind)
                .ok_or_else(|| RegistryError::UnknownKind {
                    category: self.category,
                    kind: kind.to_string(),
                })?;

        let instance = Arc::new((registration.factory)(name, options)?);
        self.instances.insert(name.to_string(), Arc::clone(&instance));
        tracing::debug!(category = self.category, kind, name, "plugin instance created");
        Ok(instance)
    }

    /// Look up a created instance by name.
    pub fn instance(&self, name: &str) -> Option<Arc<T>> {
        self.instances.get(name).cloned()
    }

    /// All created instances, sorted by name.
    pub fn instances(&self) -> Vec<(&str, Arc<T>)> {
        let mut all: Vec<(&str, Arc<T>)> = self
            .instances
            .iter()
            .map(|(name, instance)| (name.as_str(), Arc::clone(instance)))
            .collect();
        all.sort_by(|a, b| a.0.cmp(b.0));
        all
    }

    /// Registered kinds, sorted.
    pub fn kinds(&self) -> Vec<&str> {
        let mut kinds: Vec<&str> = self.registrations.keys().map(String::as_str).collect();
        kinds.sort_unstable();
        kinds
    }
}

impl<T, P> std::fmt::Debug for FactoryRegistry<T, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FactoryRegistry")
            .field("category", &self.category)
            .field("kinds", &self.kinds())
            .field("instances", &self.instances.len())
            .finish()
    }
}
