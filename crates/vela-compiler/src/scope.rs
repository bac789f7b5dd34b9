//! Linked symbol tables.

use rustc_hash::FxHashMap;

/// A scope: a mapping from identifier to a pass-specific descriptor, plus a
/// parent link. Lookup walks outward until found or the chain ends; a scope
/// with no parent is the global scope.
///
/// The type checker stores `&Type` values here, the name locator stores
/// [`crate::NameInfo`].
#[derive(Debug)]
pub struct Scope<'p, 'a, T> {
    symbols: FxHashMap<&'a str, T>,
    parent: Option<&'p Scope<'p, 'a, T>>,
}

impl<'p, 'a, T> Scope<'p, 'a, T> {
    /// The global scope.
    pub fn new() -> Self {
        Self {
            symbols: FxHashMap::default(),
            parent: None,
        }
    }

    /// A child scope whose lookups fall back to `self`.
    pub fn child(&self) -> Scope<'_, 'a, T> {
        Scope {
            symbols: FxHashMap::default(),
            parent: Some(self),
        }
    }

    /// Bind `name` in this scope, shadowing any outer binding.
    pub fn declare(&mut self, name: &'a str, value: T) {
        self.symbols.insert(name, value);
    }

    /// Innermost binding of `name`, walking outward.
    pub fn lookup(&self, name: &str) -> Option<&T> {
        match self.symbols.get(name) {
            Some(value) => Some(value),
            None => self.parent.and_then(|p| p.lookup(name)),
        }
    }

    /// Whether `name` is bound anywhere in the chain.
    pub fn contains(&self, name: &str) -> bool {
        self.lookup(name).is_some()
    }
}

impl<T> Default for Scope<'_, '_, T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn declare_and_lookup() {
        let mut scope: Scope<'_, '_, i32> = Scope::new();
        scope.declare("x", 1);
        assert_eq!(scope.lookup("x"), Some(&1));
        assert_eq!(scope.lookup("y"), None);
    }

    #[test]
    fn lookup_walks_outward() {
        let mut outer: Scope<'_, '_, i32> = Scope::new();
        outer.declare("x", 1);
        let inner = outer.child();
        assert_eq!(inner.lookup("x"), Some(&1));
        assert!(inner.contains("x"));
    }

    #[test]
    fn inner_binding_shadows_outer() {
        let mut outer: Scope<'_, '_, i32> = Scope::new();
        outer.declare("x", 1);
        let mut inner = outer.child();
        inner.declare("x", 2);
        assert_eq!(inner.lookup("x"), Some(&2));
        assert_eq!(outer.lookup("x"), Some(&1));
    }

    #[test]
    fn redeclaration_overwrites() {
        let mut scope: Scope<'_, '_, i32> = Scope::new();
        scope.declare("x", 1);
        scope.declare("x", 2);
        assert_eq!(scope.lookup("x"), Some(&2));
    }
}
