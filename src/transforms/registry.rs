//! Transform registry: pixel transforms looked up by name.

use crate::core::error::JobError;
use crate::core::types::Color;
use indexmap::IndexMap;
use std::fmt;
use std::sync::Arc;

/// A pure per-pixel transform. The second argument is the job's numeric amount.
pub type TransformFn = Arc<dyn Fn(Color, f64) -> Color + Send + Sync>;

/// Registry entry containing a transform and its description.
#[derive(Clone)]
pub struct TransformEntry {
    /// Unique name the transform is requested by.
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// The transform function.
    pub transform: TransformFn,
}

impl TransformEntry {
    /// Apply the transform to one color.
    pub fn apply(&self, color: Color, amount: f64) -> Color {
        (self.transform)(color, amount)
    }
}

impl fmt::Debug for TransformEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransformEntry")
            .field("name", &self.name)
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

/// Registry for all available transforms.
///
/// Built once at startup and shared read-only with every worker.
#[derive(Debug, Clone, Default)]
pub struct TransformRegistry {
    transforms: IndexMap<String, TransformEntry>,
}

impl TransformRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            transforms: IndexMap::new(),
        }
    }

    /// Create a registry pre-populated with the built-in transforms.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        crate::transforms::color::register(&mut registry);
        registry
    }

    /// Register a transform, replacing any previous one with the same name.
    pub fn register<F>(&mut self, name: &str, description: &str, transform: F) -> &mut Self
    where
        F: Fn(Color, f64) -> Color + Send + Sync + 'static,
    {
        let entry = TransformEntry {
            name: name.to_string(),
            description: description.to_string(),
            transform: Arc::new(transform),
        };
        if self.transforms.insert(name.to_string(), entry).is_some() {
            log::debug!("Transform '{}' re-registered", name);
        }
        self
    }

    /// Look up a transform.
    pub fn get(&self, name: &str) -> Option<&TransformEntry> {
        self.transforms.get(name)
    }

    /// Look up a transform, failing with [`JobError::UnknownTransform`].
    pub fn resolve(&self, name: &str) -> Result<&TransformEntry, JobError> {
        self.get(name).ok_or_else(|| JobError::UnknownTransform {
            name: name.to_string(),
        })
    }

    /// Check if a transform is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.transforms.contains_key(name)
    }

    /// Get all registered names in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.transforms.keys().map(|s| s.as_str())
    }

    /// Get all registered transforms in registration order.
    pub fn entries(&self) -> impl Iterator<Item = &TransformEntry> {
        self.transforms.values()
    }

    /// Unregister a transform.
    pub fn unregister(&mut self, name: &str) -> bool {
        self.transforms.shift_remove(name).is_some()
    }

    /// Get the total number of registered transforms.
    pub fn len(&self) -> usize {
        self.transforms.len()
    }

    /// Check if the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.transforms.is_empty()
    }
}
