//! Import table consulted when compiling transformations.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

/// Imports declared by a process definition.
///
/// Typed imports (an import type plus a namespace and a location, e.g. a
/// schema or service descriptor) are kept per import type. Anything that
/// lacks one of those three parts is recorded as a plain import name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportTable {
    /// Plain import names.
    #[serde(default)]
    pub names: BTreeSet<String>,
    /// import type -> (namespace -> location)
    #[serde(default)]
    pub typed: BTreeMap<String, BTreeMap<String, String>>,
}

impl ImportTable {
    /// Create an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an import.
    ///
    /// When all of `import_type`, `namespace`, and `location` are present the
    /// import is typed; otherwise `name` is recorded as a plain import.
    pub fn add(
        &mut self,
        name: &str,
        import_type: Option<&str>,
        namespace: Option<&str>,
        location: Option<&str>,
    ) {
        match (import_type, namespace, location) {
            (Some(kind), Some(ns), Some(loc)) => {
                self.typed
                    .entry(kind.to_owned())
                    .or_default()
                    .insert(ns.to_owned(), loc.to_owned());
            }
            _ => {
                self.names.insert(name.to_owned());
            }
        }
    }

    /// Add a typed import.
    #[must_use]
    pub fn with_typed(
        mut self,
        import_type: impl Into<String>,
        namespace: impl Into<String>,
        location: impl Into<String>,
    ) -> Self {
        self.typed
            .entry(import_type.into())
            .or_default()
            .insert(namespace.into(), location.into());
        self
    }

    /// Add a plain import name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.names.insert(name.into());
        self
    }

    /// Look up the location of `namespace` across every import type.
    #[must_use]
    pub fn location_of(&self, namespace: &str) -> Option<&str> {
        self.typed
            .values()
            .find_map(|by_ns| by_ns.get(namespace))
            .map(String::as_str)
    }

    /// Returns `true` if `namespace` is declared by a typed import or as a plain name.
    #[must_use]
    pub fn declares(&self, namespace: &str) -> bool {
        self.names.contains(namespace) || self.location_of(namespace).is_some()
    }

    /// Whether the table has no imports at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty() && self.typed.is_empty()
    }
}
