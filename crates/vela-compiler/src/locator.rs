//! The name-location pass.
//!
//! Assigns every declared name a location descriptor and records, per
//! function, how many local slots and constant slots it needs. Slot numbers
//! are dense and zero-based: global variables, functions and native
//! functions each draw from their own program-wide counter, locals and
//! constants from per-function counters.
//!
//! The map is keyed by `(node, kind)` because one function node carries
//! several descriptors (its index plus its two counts). Inserts are
//! first-write-wins, so re-walking a shared subtree (global initializers are
//! walked both standalone and as the body of their synthesized initializer
//! function) never disturbs earlier entries.

use rustc_hash::FxHashMap;

use vela_core::{CompileError, ScopeError};
use vela_parser::ast::{Expr, LambdaExpr, Namespace, NamespaceTree, NodeId};

use crate::scope::Scope;

/// What a name resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LocationKind {
    GlobalVariable,
    Function,
    NativeFunction,
    FunctionVariable,
    FunctionConstant,
    FunctionVariableCount,
    FunctionConstantCount,
    GlobalVariableCount,
    GlobalFunctionCount,
    GlobalNativeFunctionCount,
}

/// A location descriptor: the kind of slot plus its number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NameInfo {
    pub kind: LocationKind,
    pub number: i32,
}

impl NameInfo {
    pub fn new(kind: LocationKind, number: i32) -> Self {
        Self { kind, number }
    }
}

/// Scope binding identifiers to their location descriptors.
pub type NameScope<'p, 'a> = Scope<'p, 'a, NameInfo>;

/// Per-function slot counters.
#[derive(Debug, Default, Clone, Copy)]
struct LocalCounters {
    variables: i32,
    constants: i32,
}

/// The name locator. Owns the `(node, kind)` map the emitter reads.
#[derive(Debug, Default)]
pub struct NameLocator {
    entries: FxHashMap<(NodeId, LocationKind), NameInfo>,
    global_variables: i32,
    global_functions: i32,
    global_native_functions: i32,
}

impl NameLocator {
    pub fn new() -> Self {
        tracing::debug!("name locator initialized");
        Self::default()
    }

    /// The descriptor recorded for `(node, kind)`, if any.
    pub fn name_info(&self, id: NodeId, kind: LocationKind) -> Option<NameInfo> {
        self.entries.get(&(id, kind)).copied()
    }

    /// All recorded `(node, kind) -> descriptor` entries.
    pub fn entries(&self) -> impl Iterator<Item = (&(NodeId, LocationKind), &NameInfo)> {
        self.entries.iter()
    }

    /// Number of global variable slots assigned so far.
    pub fn global_variable_count(&self) -> i32 {
        self.global_variables
    }

    /// Number of function slots assigned so far (synthesized initializers
    /// included).
    pub fn global_function_count(&self) -> i32 {
        self.global_functions
    }

    /// Number of native-function slots assigned so far.
    pub fn global_native_function_count(&self) -> i32 {
        self.global_native_functions
    }

    /// Locate every namespace of the tree against one accumulating scope.
    pub fn locate_namespace<'a>(
        &mut self,
        tree: &NamespaceTree<'a>,
        scope: &mut NameScope<'_, 'a>,
    ) -> Result<(), CompileError> {
        self.locate_ns(tree, tree.root(), scope)
    }

    fn locate_ns<'a>(
        &mut self,
        tree: &NamespaceTree<'a>,
        ns: &Namespace<'a>,
        scope: &mut NameScope<'_, 'a>,
    ) -> Result<(), CompileError> {
        for var in ns.globals() {
            let info = NameInfo::new(LocationKind::GlobalVariable, self.global_variables);
            self.global_variables += 1;
            scope.declare(var.name, info);
            self.record(NodeId::of(var), LocationKind::GlobalVariable, info);
        }

        for func in ns.functions() {
            let info = if func.is_native() {
                let info = NameInfo::new(LocationKind::NativeFunction, self.global_native_functions);
                self.global_native_functions += 1;
                info
            } else {
                let info = NameInfo::new(LocationKind::Function, self.global_functions);
                self.global_functions += 1;
                info
            };
            scope.declare(func.name, info);
            self.record(NodeId::of(func), info.kind, info);
        }

        // Global initializers stay top-level expressions: they are re-walked
        // here with fresh counters and can declare no locals of their own.
        for var in ns.globals() {
            let mut inner = scope.child();
            let mut locals = LocalCounters::default();
            self.visit(var.initializer, &mut inner, &mut locals, tree)?;
        }

        for func in ns.functions() {
            self.locate_lambda(func, scope, tree)?;
        }

        for (_, child) in ns.children() {
            self.locate_ns(tree, child, scope)?;
        }
        Ok(())
    }

    /// Number a function: parameters first, then every declaration and
    /// constant in its body; record the final counts on the function node.
    pub fn locate_lambda<'a>(
        &mut self,
        lambda: &'a LambdaExpr<'a>,
        scope: &NameScope<'_, 'a>,
        tree: &NamespaceTree<'a>,
    ) -> Result<(), CompileError> {
        let mut inner = scope.child();
        let mut locals = LocalCounters::default();
        for param in lambda.parameters {
            inner.declare(
                param.name,
                NameInfo::new(LocationKind::FunctionVariable, locals.variables),
            );
            locals.variables += 1;
        }
        self.visit(lambda.body, &mut inner, &mut locals, tree)?;
        self.record(
            NodeId::of(lambda),
            LocationKind::FunctionVariableCount,
            NameInfo::new(LocationKind::FunctionVariableCount, locals.variables),
        );
        self.record(
            NodeId::of(lambda),
            LocationKind::FunctionConstantCount,
            NameInfo::new(LocationKind::FunctionConstantCount, locals.constants),
        );
        Ok(())
    }

    fn visit<'a>(
        &mut self,
        expr: Expr<'a>,
        scope: &mut NameScope<'_, 'a>,
        locals: &mut LocalCounters,
        tree: &NamespaceTree<'a>,
    ) -> Result<(), CompileError> {
        match expr {
            Expr::Constant(c) => {
                // One slot per occurrence; constants are not deduplicated.
                self.record(
                    NodeId::of(c),
                    LocationKind::FunctionConstant,
                    NameInfo::new(LocationKind::FunctionConstant, locals.constants),
                );
                locals.constants += 1;
                Ok(())
            }
            Expr::Parameter(p) => {
                if p.prefix.is_empty() {
                    let info = *scope.lookup(p.name).ok_or_else(|| {
                        CompileError::from(ScopeError::Undefined {
                            name: p.name.to_string(),
                            range: p.range.clone(),
                        })
                    })?;
                    self.record(NodeId::of(p), info.kind, info);
                    return Ok(());
                }
                let Some(ns) = tree.search(p.prefix) else {
                    return Err(ScopeError::MissingModule {
                        name: p.name.to_string(),
                        module: p.prefix.join("::"),
                        range: p.range.clone(),
                    }
                    .into());
                };
                let target = if let Some(var) = ns.global(p.name) {
                    self.name_info(NodeId::of(var), LocationKind::GlobalVariable)
                } else if let Some(func) = ns.function(p.name) {
                    let kind = if func.is_native() {
                        LocationKind::NativeFunction
                    } else {
                        LocationKind::Function
                    };
                    self.name_info(NodeId::of(func), kind)
                } else {
                    None
                };
                let info = target.ok_or_else(|| {
                    CompileError::from(ScopeError::Undefined {
                        name: p.name.to_string(),
                        range: p.range.clone(),
                    })
                })?;
                self.record(NodeId::of(p), info.kind, info);
                Ok(())
            }
            Expr::VariableDeclaration(v) => {
                let info = NameInfo::new(LocationKind::FunctionVariable, locals.variables);
                locals.variables += 1;
                scope.declare(v.name, info);
                self.record(NodeId::of(v), LocationKind::FunctionVariable, info);
                self.visit(v.initializer, scope, locals, tree)
            }
            Expr::Binary(b) => {
                self.visit(b.left, scope, locals, tree)?;
                self.visit(b.right, scope, locals, tree)
            }
            Expr::Unary(u) => self.visit(u.operand, scope, locals, tree),
            Expr::Block(b) => {
                let mut inner = scope.child();
                for e in b.expressions {
                    self.visit(*e, &mut inner, locals, tree)?;
                }
                Ok(())
            }
            Expr::Conditional(c) => {
                self.visit(c.test, scope, locals, tree)?;
                self.visit(c.if_true, scope, locals, tree)?;
                self.visit(c.if_false, scope, locals, tree)
            }
            Expr::WhileLoop(w) => {
                let mut inner = scope.child();
                self.visit(w.condition, &mut inner, locals, tree)?;
                self.visit(w.body, &mut inner, locals, tree)
            }
            Expr::Call(c) => {
                self.visit(c.function, scope, locals, tree)?;
                for arg in c.arguments {
                    self.visit(*arg, scope, locals, tree)?;
                }
                Ok(())
            }
            Expr::Lambda(l) => self.locate_lambda(l, scope, tree),
            Expr::Default(_) => Ok(()),
        }
    }

    fn record(&mut self, id: NodeId, kind: LocationKind, info: NameInfo) {
        self.entries.entry((id, kind)).or_insert(info);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vela_core::SourceFile;
    use vela_parser::ast::ExprArena;
    use vela_parser::{Lexer, Parser};

    fn locate_function<R>(
        source: &str,
        f: impl for<'a> FnOnce(&NameLocator, &'a LambdaExpr<'a>) -> R,
    ) -> R {
        let exprs = ExprArena::new();
        let file = SourceFile::new("test.vela");
        let tokens = Lexer::new(source, file.clone(), &exprs).tokenize().unwrap();
        let mut parser = Parser::new(tokens, file, &exprs);
        let lambda = parser.parse_function().unwrap();
        let tree = NamespaceTree::new();
        let scope = NameScope::new();
        let mut locator = NameLocator::new();
        locator.locate_lambda(lambda, &scope, &tree).unwrap();
        f(&locator, lambda)
    }

    #[test]
    fn locals_are_dense_from_zero() {
        locate_function(
            "func Add(x: Int, y: Int): Int { var z = x + y; z; }",
            |locator, lambda| {
                // Parameters take slots 0 and 1, the declaration slot 2.
                let mut seen = [false; 3];
                for ((_, kind), info) in locator.entries() {
                    if *kind == LocationKind::FunctionVariable {
                        seen[info.number as usize] = true;
                    }
                }
                assert_eq!(seen, [true, true, true]);

                let count = locator
                    .name_info(NodeId::of(lambda), LocationKind::FunctionVariableCount)
                    .unwrap();
                assert_eq!(count.number, 3);
            },
        );
    }

    #[test]
    fn constants_count_per_occurrence() {
        locate_function(
            "func F(): Int { 7 + 7 + 7; }",
            |locator, lambda| {
                let count = locator
                    .name_info(NodeId::of(lambda), LocationKind::FunctionConstantCount)
                    .unwrap();
                assert_eq!(count.number, 3);
            },
        );
    }

    #[test]
    fn undefined_name_is_scope_error() {
        let exprs = ExprArena::new();
        let file = SourceFile::new("test.vela");
        let tokens = Lexer::new("func F(): Int { ghost; }", file.clone(), &exprs)
            .tokenize()
            .unwrap();
        let mut parser = Parser::new(tokens, file, &exprs);
        let lambda = parser.parse_function().unwrap();
        let tree = NamespaceTree::new();
        let scope = NameScope::new();
        let mut locator = NameLocator::new();
        assert!(matches!(
            locator.locate_lambda(lambda, &scope, &tree),
            Err(CompileError::Scope(_))
        ));
    }

    #[test]
    fn block_scopes_shadow_but_slots_stay_dense() {
        locate_function(
            "func F(): Int { var a = 1; if true { var a = 2; a; } a; }",
            |locator, lambda| {
                let count = locator
                    .name_info(NodeId::of(lambda), LocationKind::FunctionVariableCount)
                    .unwrap();
                assert_eq!(count.number, 2);
            },
        );
    }
}
