//! The namespace tree: declared globals and functions by module path.
//!
//! Member maps are insertion-ordered because declaration order determines
//! slot assignment in the later passes.

use indexmap::IndexMap;

use super::expr::{LambdaExpr, VariableDeclarationExpr};

/// One module's declarations plus its nested modules.
#[derive(Debug)]
pub struct Namespace<'a> {
    name: String,
    children: IndexMap<String, Namespace<'a>>,
    globals: IndexMap<String, &'a VariableDeclarationExpr<'a>>,
    functions: IndexMap<String, &'a LambdaExpr<'a>>,
}

impl<'a> Namespace<'a> {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            children: IndexMap::new(),
            globals: IndexMap::new(),
            functions: IndexMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Child module by name.
    pub fn child(&self, name: &str) -> Option<&Namespace<'a>> {
        self.children.get(name)
    }

    /// Child module by name, created on first use.
    pub fn ensure_child(&mut self, name: &str) -> &mut Namespace<'a> {
        self.children
            .entry(name.to_string())
            .or_insert_with(|| Namespace::new(name))
    }

    /// Record a global variable declaration.
    pub fn declare_global(&mut self, decl: &'a VariableDeclarationExpr<'a>) {
        self.globals.insert(decl.name.to_string(), decl);
    }

    /// Record a function declaration, keyed by its name.
    pub fn declare_function(&mut self, func: &'a LambdaExpr<'a>) {
        self.functions.insert(func.name.to_string(), func);
    }

    pub fn global(&self, name: &str) -> Option<&'a VariableDeclarationExpr<'a>> {
        self.globals.get(name).copied()
    }

    pub fn function(&self, name: &str) -> Option<&'a LambdaExpr<'a>> {
        self.functions.get(name).copied()
    }

    /// Global declarations in declaration order.
    pub fn globals(&self) -> impl Iterator<Item = &'a VariableDeclarationExpr<'a>> + '_ {
        self.globals.values().copied()
    }

    /// Functions in declaration order.
    pub fn functions(&self) -> impl Iterator<Item = &'a LambdaExpr<'a>> + '_ {
        self.functions.values().copied()
    }

    /// Nested modules in declaration order.
    pub fn children(&self) -> &IndexMap<String, Namespace<'a>> {
        &self.children
    }

    /// Nested modules in declaration order, mutable.
    pub fn children_mut(&mut self) -> impl Iterator<Item = &mut Namespace<'a>> {
        self.children.values_mut()
    }
}

/// The whole module hierarchy of a compilation, rooted at the nameless
/// top-level namespace.
#[derive(Debug)]
pub struct NamespaceTree<'a> {
    root: Namespace<'a>,
}

impl<'a> Namespace<'a> {
    /// Walk a `::`-separated path of child names from this namespace.
    pub fn search(&self, path: &[&str]) -> Option<&Namespace<'a>> {
        let mut current = self;
        for segment in path {
            current = current.child(segment)?;
        }
        Some(current)
    }
}

impl<'a> NamespaceTree<'a> {
    pub fn new() -> Self {
        Self {
            root: Namespace::new(""),
        }
    }

    pub fn root(&self) -> &Namespace<'a> {
        &self.root
    }

    pub fn root_mut(&mut self) -> &mut Namespace<'a> {
        &mut self.root
    }

    /// Resolve a module path from the root.
    pub fn search(&self, path: &[&str]) -> Option<&Namespace<'a>> {
        self.root.search(path)
    }
}

impl Default for NamespaceTree<'_> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::expr::{DefaultExpr, Expr, ExprArena, VariableDeclarationExpr};
    use vela_core::{SourceFile, SourceRange, types};

    fn range() -> SourceRange {
        SourceRange::point(SourceFile::new("t.vela"), 1, 1)
    }

    #[test]
    fn nested_path_search() {
        let mut tree = NamespaceTree::new();
        tree.root_mut().ensure_child("A").ensure_child("B");
        assert!(tree.search(&["A"]).is_some());
        assert!(tree.search(&["A", "B"]).is_some());
        assert!(tree.search(&["A", "C"]).is_none());
        assert!(tree.search(&[]).is_some());
    }

    #[test]
    fn members_preserve_declaration_order() {
        let arena = ExprArena::new();
        let mut tree = NamespaceTree::new();
        let ns = tree.root_mut().ensure_child("M");
        for name in ["c", "a", "b"] {
            let init = Expr::Default(arena.alloc(DefaultExpr {
                ty: &types::INT32,
                range: range(),
            }));
            let decl = arena.alloc(VariableDeclarationExpr {
                name: arena.alloc_str(name),
                ty: &types::INT32,
                initializer: init,
                range: range(),
            });
            ns.declare_global(decl);
        }
        let names: Vec<&str> = ns.globals().map(|g| g.name).collect();
        assert_eq!(names, vec!["c", "a", "b"]);
    }

    #[test]
    fn ensure_child_is_idempotent() {
        let mut tree = NamespaceTree::new();
        tree.root_mut().ensure_child("A");
        tree.root_mut().ensure_child("A");
        assert_eq!(tree.root().children().len(), 1);
    }
}
