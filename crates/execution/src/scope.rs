//! Nested variable scopes.
//!
//! Every instance owns one [`ScopeTree`]: a root scope opened at start and a
//! child scope per active sub-process. Lookups walk from the given scope
//! outward and the first match wins.

use std::collections::BTreeMap;

use orrery_definition::{VariableDeclaration, VariableType};
use orrery_workitem::DataMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::VariableError;

/// Identifies a scope within one instance's [`ScopeTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScopeId(u32);

impl ScopeId {
    /// The instance's root scope.
    pub const ROOT: Self = Self(0);

    /// Returns `true` for the root scope.
    #[must_use]
    pub fn is_root(self) -> bool {
        self == Self::ROOT
    }
}

impl std::fmt::Display for ScopeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "scope#{}", self.0)
    }
}

/// One level of variables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableScope {
    /// Enclosing scope, `None` for the root.
    pub parent: Option<ScopeId>,
    /// Current values.
    #[serde(default)]
    pub values: DataMap,
    /// Names declared on this scope with their accepted types.
    #[serde(default)]
    pub declared: BTreeMap<String, VariableType>,
}

impl VariableScope {
    fn new(parent: Option<ScopeId>, declarations: &[VariableDeclaration]) -> Self {
        let mut scope = Self {
            parent,
            values: DataMap::new(),
            declared: BTreeMap::new(),
        };
        for decl in declarations {
            scope.declared.insert(decl.name.clone(), decl.var_type);
            if let Some(default) = &decl.default {
                scope.values.insert(decl.name.clone(), default.clone());
            }
        }
        scope
    }

    fn owns(&self, name: &str) -> bool {
        self.declared.contains_key(name) || self.values.contains_key(name)
    }
}

/// All scopes of one instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScopeTree {
    scopes: BTreeMap<ScopeId, VariableScope>,
    next: u32,
    strict: bool,
}

impl ScopeTree {
    /// Open the root scope with the given declarations and their defaults.
    #[must_use]
    pub fn new(strict: bool, declarations: &[VariableDeclaration]) -> Self {
        Self {
            scopes: BTreeMap::from([(ScopeId::ROOT, VariableScope::new(None, declarations))]),
            next: 1,
            strict,
        }
    }

    /// Whether reads and writes of undeclared names are rejected.
    #[must_use]
    pub fn is_strict(&self) -> bool {
        self.strict
    }

    /// Open a child of `parent`.
    pub fn open(
        &mut self,
        parent: ScopeId,
        declarations: &[VariableDeclaration],
    ) -> Result<ScopeId, VariableError> {
        if !self.scopes.contains_key(&parent) {
            return Err(VariableError::UnknownScope(parent));
        }
        let id = ScopeId(self.next);
        self.next += 1;
        self.scopes
            .insert(id, VariableScope::new(Some(parent), declarations));
        Ok(id)
    }

    /// Close a child scope, dropping its values. The root cannot be closed.
    pub fn close(&mut self, id: ScopeId) -> Option<VariableScope> {
        if id.is_root() {
            return None;
        }
        self.scopes.remove(&id)
    }

    /// Returns `true` if `id` is open.
    #[must_use]
    pub fn contains(&self, id: ScopeId) -> bool {
        self.scopes.contains_key(&id)
    }

    /// Borrow a scope.
    #[must_use]
    pub fn scope(&self, id: ScopeId) -> Option<&VariableScope> {
        self.scopes.get(&id)
    }

    /// Resolve `name` from `scope` outward.
    #[must_use]
    pub fn get(&self, scope: ScopeId, name: &str) -> Option<&Value> {
        self.chain(scope).find_map(|(_, s)| s.values.get(name))
    }

    /// Resolve `name` from `scope` outward for a read.
    ///
    /// In strict mode a name that no scope in the chain declares or holds is
    /// rejected instead of reading as absent.
    pub fn resolve(&self, scope: ScopeId, name: &str) -> Result<Option<&Value>, VariableError> {
        if !self.scopes.contains_key(&scope) {
            return Err(VariableError::UnknownScope(scope));
        }
        if self.strict && !self.chain(scope).any(|(_, s)| s.owns(name)) {
            return Err(VariableError::Undeclared(name.to_owned()));
        }
        Ok(self.get(scope, name))
    }

    /// Assign `name` as seen from `scope`.
    ///
    /// The innermost scope that declares or already holds `name` receives the
    /// value. An unknown name is created in `scope` unless the tree is strict.
    pub fn set(&mut self, scope: ScopeId, name: &str, value: Value) -> Result<(), VariableError> {
        if !self.scopes.contains_key(&scope) {
            return Err(VariableError::UnknownScope(scope));
        }
        let owner = self
            .chain(scope)
            .find(|(_, s)| s.owns(name))
            .map(|(id, _)| id);

        let target = match owner {
            Some(id) => id,
            None if self.strict => return Err(VariableError::Undeclared(name.to_owned())),
            None => scope,
        };
        let Some(slot) = self.scopes.get_mut(&target) else {
            return Err(VariableError::UnknownScope(target));
        };
        if let Some(expected) = slot.declared.get(name)
            && !expected.accepts(&value)
        {
            return Err(VariableError::TypeMismatch {
                name: name.to_owned(),
                expected: *expected,
                actual: json_kind(&value).to_owned(),
            });
        }
        slot.values.insert(name.to_owned(), value);
        Ok(())
    }

    /// Values visible from `scope`, inner scopes shadowing outer ones.
    #[must_use]
    pub fn visible(&self, scope: ScopeId) -> DataMap {
        let mut merged = DataMap::new();
        for (_, s) in self.chain(scope) {
            for (name, value) in &s.values {
                merged
                    .entry(name.clone())
                    .or_insert_with(|| value.clone());
            }
        }
        merged
    }

    /// Values stored on the root scope.
    #[must_use]
    pub fn root_values(&self) -> DataMap {
        self.scopes
            .get(&ScopeId::ROOT)
            .map(|s| s.values.clone())
            .unwrap_or_default()
    }

    /// Number of open scopes, root included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.scopes.len()
    }

    /// Always `false`: the root scope is never closed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }

    fn chain(&self, start: ScopeId) -> impl Iterator<Item = (ScopeId, &VariableScope)> {
        let mut cursor = Some(start);
        std::iter::from_fn(move || {
            let id = cursor?;
            let scope = self.scopes.get(&id)?;
            cursor = scope.parent;
            Some((id, scope))
        })
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_f64() => "number",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn declared(name: &str, var_type: VariableType) -> VariableDeclaration {
        VariableDeclaration::new(name).with_type(var_type)
    }

    #[test]
    fn defaults_are_bound_on_open() {
        let tree = ScopeTree::new(
            false,
            &[declared("isChecked", VariableType::String).with_default(json!("false"))],
        );
        assert_eq!(tree.get(ScopeId::ROOT, "isChecked"), Some(&json!("false")));
    }

    #[test]
    fn lookup_walks_outward_and_inner_shadows() {
        let mut tree = ScopeTree::new(false, &[]);
        tree.set(ScopeId::ROOT, "a", json!(1)).unwrap();
        let child = tree
            .open(ScopeId::ROOT, &[VariableDeclaration::new("a").with_default(json!(2))])
            .unwrap();

        assert_eq!(tree.get(child, "a"), Some(&json!(2)));
        assert_eq!(tree.get(ScopeId::ROOT, "a"), Some(&json!(1)));
        assert_eq!(tree.visible(child).get("a"), Some(&json!(2)));
    }

    #[test]
    fn set_updates_the_owning_scope() {
        let mut tree = ScopeTree::new(false, &[VariableDeclaration::new("total")]);
        let child = tree.open(ScopeId::ROOT, &[]).unwrap();

        tree.set(child, "total", json!(10)).unwrap();
        tree.set(child, "local", json!(true)).unwrap();

        assert_eq!(tree.root_values().get("total"), Some(&json!(10)));
        assert!(tree.root_values().get("local").is_none());

        tree.close(child);
        assert_eq!(tree.get(ScopeId::ROOT, "local"), None);
    }

    #[test]
    fn strict_rejects_undeclared_writes() {
        let mut tree = ScopeTree::new(true, &[VariableDeclaration::new("known")]);
        assert_eq!(
            tree.set(ScopeId::ROOT, "unknown", json!(1)),
            Err(VariableError::Undeclared("unknown".into()))
        );
        assert!(tree.set(ScopeId::ROOT, "known", json!(1)).is_ok());
    }

    #[test]
    fn strict_rejects_undeclared_reads() {
        let tree = ScopeTree::new(true, &[VariableDeclaration::new("known")]);
        assert_eq!(
            tree.resolve(ScopeId::ROOT, "unknown"),
            Err(VariableError::Undeclared("unknown".into()))
        );
        assert_eq!(tree.resolve(ScopeId::ROOT, "known"), Ok(None));

        let lenient = ScopeTree::new(false, &[]);
        assert_eq!(lenient.resolve(ScopeId::ROOT, "unknown"), Ok(None));
    }

    #[test]
    fn declared_type_is_enforced() {
        let mut tree = ScopeTree::new(false, &[declared("n", VariableType::Integer)]);
        let err = tree.set(ScopeId::ROOT, "n", json!("one")).unwrap_err();
        assert!(matches!(err, VariableError::TypeMismatch { ref actual, .. } if actual == "string"));
        assert!(tree.set(ScopeId::ROOT, "n", Value::Null).is_ok());
    }

    #[test]
    fn root_cannot_be_closed_and_unknown_scopes_fail() {
        let mut tree = ScopeTree::new(false, &[]);
        assert!(tree.close(ScopeId::ROOT).is_none());
        let ghost = ScopeId(42);
        assert_eq!(
            tree.set(ghost, "x", json!(1)),
            Err(VariableError::UnknownScope(ghost))
        );
        assert_eq!(tree.open(ghost, &[]), Err(VariableError::UnknownScope(ghost)));
    }

    #[test]
    fn survives_serde() {
        let mut tree = ScopeTree::new(true, &[declared("x", VariableType::Number)]);
        let child = tree.open(ScopeId::ROOT, &[VariableDeclaration::new("y")]).unwrap();
        tree.set(child, "y", json!([1, 2])).unwrap();

        let restored: ScopeTree =
            serde_json::from_value(serde_json::to_value(&tree).unwrap()).unwrap();
        assert_eq!(restored, tree);
        let next = restored.clone().open(ScopeId::ROOT, &[]).unwrap();
        assert_ne!(next, child);
    }
}
