//! The type-check pass.
//!
//! Walks the IR once, assigning a type to every reachable expression and
//! validating static constraints. Failures are fatal; the first violation
//! stops the pipeline.
//!
//! Checking a namespace also desugars global variables: each initializer is
//! wrapped in a synthesized zero-argument function named
//! `<name>#Initializer` and appended to the same namespace, so global
//! initialization reaches code generation as an ordinary function. This is
//! the one place the pass mutates the namespace tree.

use rustc_hash::FxHashMap;

use vela_core::{
    CompileError, ScopeError, Type, TypeArena, TypeCode, TypeError,
    types::{BOOLEAN, EMPTY},
};
use vela_parser::ast::{
    BinaryExpr, BinaryOp, CallExpr, Expr, ExprArena, LambdaExpr, NamespaceTree, NodeId,
    ParameterExpr, UnaryExpr, UnaryOp, VariableDeclarationExpr,
};

use crate::scope::Scope;

/// Scope binding identifiers to their types.
pub type TypeScope<'p, 'a> = Scope<'p, 'a, &'a Type<'a>>;

/// The type checker. Owns the node-to-type map the emitter reads.
pub struct TypeChecker<'a> {
    types: &'a TypeArena,
    exprs: &'a ExprArena,
    node_types: FxHashMap<NodeId, &'a Type<'a>>,
}

impl<'a> TypeChecker<'a> {
    pub fn new(types: &'a TypeArena, exprs: &'a ExprArena) -> Self {
        tracing::debug!("type checker initialized");
        Self {
            types,
            exprs,
            node_types: FxHashMap::default(),
        }
    }

    /// The checked type of a node, if the pass reached it.
    pub fn node_type(&self, id: NodeId) -> Option<&'a Type<'a>> {
        self.node_types.get(&id).copied()
    }

    /// The checked type of an expression, if the pass reached it.
    pub fn type_of(&self, expr: Expr<'a>) -> Option<&'a Type<'a>> {
        self.node_type(expr.node_id())
    }

    /// Check every namespace of the tree against one accumulating scope.
    ///
    /// Per namespace: declare the globals' types and the functions' callable
    /// types, check each global initializer (appending its synthesized
    /// initializer function), then check every function body against its
    /// declared signature, then recurse into children.
    pub fn check_namespace(
        &mut self,
        tree: &mut NamespaceTree<'a>,
        scope: &mut TypeScope<'_, 'a>,
    ) -> Result<(), CompileError> {
        self.synthesize_initializers(tree.root_mut());
        let tree = &*tree;
        self.check_ns(tree, tree.root(), scope)
    }

    fn check_ns(
        &mut self,
        tree: &NamespaceTree<'a>,
        ns: &vela_parser::ast::Namespace<'a>,
        scope: &mut TypeScope<'_, 'a>,
    ) -> Result<(), CompileError> {
        for var in ns.globals() {
            scope.declare(var.name, var.ty);
        }
        for func in ns.functions() {
            let callable = self.callable_type_of(func);
            scope.declare(func.name, callable);
        }

        for var in ns.globals() {
            self.check_global_variable(var, scope, tree)?;
        }

        for func in ns.functions() {
            let actual = self.check_lambda(func, scope, tree)?;
            let declared = *scope.lookup(func.name).ok_or_else(|| {
                CompileError::from(ScopeError::Undefined {
                    name: func.name.to_string(),
                    range: func.range.clone(),
                })
            })?;
            if !Self::check_function_type(declared, actual) {
                return Err(TypeError::SignatureMismatch {
                    range: func.range.clone(),
                }
                .into());
            }
        }

        for (_, child) in ns.children() {
            self.check_ns(tree, child, scope)?;
        }
        Ok(())
    }

    /// Check one expression in the given scope.
    pub fn check(
        &mut self,
        expr: Expr<'a>,
        scope: &mut TypeScope<'_, 'a>,
        tree: &NamespaceTree<'a>,
    ) -> Result<&'a Type<'a>, CompileError> {
        match expr {
            Expr::Constant(c) => Ok(self.register(expr, Type::basic(c.value.type_code()))),
            Expr::Parameter(p) => self.check_parameter(expr, p, scope, tree),
            Expr::VariableDeclaration(v) => self.check_variable_declaration(v, scope, tree),
            Expr::Binary(b) => self.check_binary(expr, b, scope, tree),
            Expr::Unary(u) => self.check_unary(expr, u, scope, tree),
            Expr::Block(b) => {
                let mut inner = scope.child();
                let mut ty: &'a Type<'a> = &EMPTY;
                for e in b.expressions {
                    ty = self.check(*e, &mut inner, tree)?;
                }
                Ok(self.register(expr, ty))
            }
            Expr::Conditional(c) => {
                let test = self.check(c.test, scope, tree)?;
                if test.code() != TypeCode::Boolean {
                    return Err(TypeError::NonBooleanCondition {
                        range: c.test.range().clone(),
                    }
                    .into());
                }
                let if_true = self.check(c.if_true, scope, tree)?;
                let if_false = self.check(c.if_false, scope, tree)?;
                let ty = self.types.union_of(if_true, if_false);
                Ok(self.register(expr, ty))
            }
            Expr::WhileLoop(w) => {
                let mut inner = scope.child();
                let cond = self.check(w.condition, &mut inner, tree)?;
                if cond.code() != TypeCode::Boolean {
                    return Err(TypeError::NonBooleanCondition {
                        range: w.condition.range().clone(),
                    }
                    .into());
                }
                let body = self.check(w.body, &mut inner, tree)?;
                Ok(self.register(expr, body))
            }
            Expr::Call(c) => self.check_call(expr, c, scope, tree),
            Expr::Lambda(l) => self.check_lambda(l, scope, tree),
            Expr::Default(d) => Ok(self.register(expr, d.ty)),
        }
    }

    /// Check a function: parameters in a child scope, body, resulting
    /// callable type.
    pub fn check_lambda(
        &mut self,
        lambda: &'a LambdaExpr<'a>,
        scope: &TypeScope<'_, 'a>,
        tree: &NamespaceTree<'a>,
    ) -> Result<&'a Type<'a>, CompileError> {
        let mut inner = scope.child();
        let mut params: Vec<&'a Type<'a>> = Vec::with_capacity(lambda.parameters.len());
        for param in lambda.parameters {
            tracing::debug!(name = param.name, "declaring parameter");
            inner.declare(param.name, param.ty);
            params.push(param.ty);
        }
        let ret = self.check(lambda.body, &mut inner, tree)?;
        let callable = self.types.callable(&params, ret);
        self.node_types.insert(NodeId::of(lambda), callable);
        Ok(callable)
    }

    /// Declared-vs-actual signature comparison.
    ///
    /// Arity and every parameter type must match exactly. Returns must match
    /// too, except that a declared `Void` return accepts any actual return.
    pub fn check_function_type(declared: &Type<'_>, actual: &Type<'_>) -> bool {
        let (
            Type::Callable {
                params: declared_params,
                ret: declared_ret,
            },
            Type::Callable {
                params: actual_params,
                ret: actual_ret,
            },
        ) = (declared, actual)
        else {
            tracing::error!("function comparison on non-callable types");
            return false;
        };
        if declared_params.len() != actual_params.len() {
            return false;
        }
        if declared_params
            .iter()
            .zip(actual_params.iter())
            .any(|(d, a)| d != a)
        {
            return false;
        }
        if declared_ret == actual_ret {
            return true;
        }
        if declared_ret.code() == TypeCode::Empty {
            tracing::info!("declared return type is Void, accepting any body type");
            return true;
        }
        false
    }

    // ========================================================================
    // Per-variant rules
    // ========================================================================

    fn check_parameter(
        &mut self,
        expr: Expr<'a>,
        param: &'a ParameterExpr<'a>,
        scope: &mut TypeScope<'_, 'a>,
        tree: &NamespaceTree<'a>,
    ) -> Result<&'a Type<'a>, CompileError> {
        if param.prefix.is_empty() {
            match scope.lookup(param.name) {
                Some(ty) => {
                    let ty = *ty;
                    Ok(self.register(expr, ty))
                }
                None => Err(ScopeError::Undefined {
                    name: param.name.to_string(),
                    range: param.range.clone(),
                }
                .into()),
            }
        } else {
            let Some(ns) = tree.search(param.prefix) else {
                return Err(ScopeError::MissingModule {
                    name: param.name.to_string(),
                    module: param.prefix.join("::"),
                    range: param.range.clone(),
                }
                .into());
            };
            if let Some(var) = ns.global(param.name) {
                Ok(self.register(expr, var.ty))
            } else if let Some(func) = ns.function(param.name) {
                let callable = self.callable_type_of(func);
                Ok(self.register(expr, callable))
            } else {
                Err(ScopeError::Undefined {
                    name: param.name.to_string(),
                    range: param.range.clone(),
                }
                .into())
            }
        }
    }

    fn check_variable_declaration(
        &mut self,
        decl: &'a VariableDeclarationExpr<'a>,
        scope: &mut TypeScope<'_, 'a>,
        tree: &NamespaceTree<'a>,
    ) -> Result<&'a Type<'a>, CompileError> {
        let init_ty = self.check(decl.initializer, scope, tree)?;
        if decl.ty.code() == TypeCode::Unknown {
            tracing::info!(name = decl.name, ty = %init_ty, "inferred variable type from its initializer");
        } else if decl.ty != init_ty {
            tracing::error!(name = decl.name, "initializer does not match the declared variable type");
            return Err(TypeError::Mismatch {
                message: format!(
                    "the value assigned to '{}' does not match its declared type",
                    decl.name
                ),
                range: decl.range.clone(),
            }
            .into());
        }
        scope.declare(decl.name, init_ty);
        self.node_types.insert(NodeId::of(decl), init_ty);
        Ok(&EMPTY)
    }

    fn check_binary(
        &mut self,
        expr: Expr<'a>,
        binary: &'a BinaryExpr<'a>,
        scope: &mut TypeScope<'_, 'a>,
        tree: &NamespaceTree<'a>,
    ) -> Result<&'a Type<'a>, CompileError> {
        if binary.op == BinaryOp::Assign {
            let right = self.check(binary.right, scope, tree)?;
            if !matches!(binary.left, Expr::Parameter(_)) {
                return Err(TypeError::Mismatch {
                    message: "assignment target must be a name".to_string(),
                    range: binary.range.clone(),
                }
                .into());
            }
            let left = self.check(binary.left, scope, tree)?;
            if left != right {
                return Err(TypeError::Mismatch {
                    message: format!("cannot assign a {right} to a {left}"),
                    range: binary.range.clone(),
                }
                .into());
            }
            return Ok(self.register(expr, &EMPTY));
        }

        let left = self.check(binary.left, scope, tree)?;
        let right = self.check(binary.right, scope, tree)?;
        let mismatch = |op: BinaryOp| {
            CompileError::from(TypeError::Mismatch {
                message: format!(
                    "operator '{}' cannot be applied to {left} and {right}",
                    op.symbol()
                ),
                range: binary.range.clone(),
            })
        };
        match binary.op {
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod => {
                if left == right && left.is_numeric() {
                    Ok(self.register(expr, left))
                } else {
                    Err(mismatch(binary.op))
                }
            }
            BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
                let comparable =
                    left.is_numeric() || matches!(left, Type::Char | Type::String);
                if left == right && comparable {
                    Ok(self.register(expr, &BOOLEAN))
                } else {
                    Err(mismatch(binary.op))
                }
            }
            BinaryOp::Eq | BinaryOp::Ne => {
                let comparable = left.is_numeric()
                    || matches!(left, Type::Boolean | Type::Char | Type::String);
                if left == right && comparable {
                    Ok(self.register(expr, &BOOLEAN))
                } else {
                    Err(mismatch(binary.op))
                }
            }
            // No typing rule exists for these yet.
            BinaryOp::And | BinaryOp::Or | BinaryOp::Assign => Err(mismatch(binary.op)),
        }
    }

    fn check_unary(
        &mut self,
        expr: Expr<'a>,
        unary: &'a UnaryExpr<'a>,
        scope: &mut TypeScope<'_, 'a>,
        tree: &NamespaceTree<'a>,
    ) -> Result<&'a Type<'a>, CompileError> {
        let operand = self.check(unary.operand, scope, tree)?;
        match unary.op {
            UnaryOp::Not => {
                if operand.code() == TypeCode::Boolean {
                    Ok(self.register(expr, &BOOLEAN))
                } else {
                    Err(TypeError::Mismatch {
                        message: format!("operator 'not' cannot be applied to {operand}"),
                        range: unary.range.clone(),
                    }
                    .into())
                }
            }
            UnaryOp::Halt => {
                if operand.code() == TypeCode::Int32 {
                    Ok(self.register(expr, &EMPTY))
                } else {
                    Err(TypeError::Mismatch {
                        message: format!("'halt' takes an Int, not a {operand}"),
                        range: unary.range.clone(),
                    }
                    .into())
                }
            }
            UnaryOp::Convert => {
                if operand == unary.target {
                    Ok(self.register(expr, operand))
                } else if operand.is_convertible_scalar() && unary.target.is_convertible_scalar() {
                    Ok(self.register(expr, unary.target))
                } else {
                    Err(TypeError::InvalidConversion {
                        from: operand.to_string(),
                        to: unary.target.to_string(),
                        range: unary.range.clone(),
                    }
                    .into())
                }
            }
            UnaryOp::Plus | UnaryOp::Minus => Err(TypeError::Mismatch {
                message: format!("operator '{}' cannot be applied here", unary.op.symbol()),
                range: unary.range.clone(),
            }
            .into()),
        }
    }

    fn check_call(
        &mut self,
        expr: Expr<'a>,
        call: &'a CallExpr<'a>,
        scope: &mut TypeScope<'_, 'a>,
        tree: &NamespaceTree<'a>,
    ) -> Result<&'a Type<'a>, CompileError> {
        let callee = self.check(call.function, scope, tree)?;
        let Type::Callable { params, ret } = callee else {
            return Err(TypeError::NotCallable {
                range: call.range.clone(),
            }
            .into());
        };
        if params.len() != call.arguments.len() {
            return Err(TypeError::ArityMismatch {
                expected: params.len(),
                found: call.arguments.len(),
                range: call.range.clone(),
            }
            .into());
        }
        for (index, (arg, expected)) in call.arguments.iter().zip(params.iter()).enumerate() {
            let arg_ty = self.check(*arg, scope, tree)?;
            if arg_ty != *expected {
                return Err(TypeError::ArgumentMismatch {
                    index,
                    range: arg.range().clone(),
                }
                .into());
            }
        }
        Ok(self.register(expr, *ret))
    }

    // ========================================================================
    // Internals
    // ========================================================================

    fn check_global_variable(
        &mut self,
        var: &'a VariableDeclarationExpr<'a>,
        scope: &mut TypeScope<'_, 'a>,
        tree: &NamespaceTree<'a>,
    ) -> Result<(), CompileError> {
        let init_ty = self.check(var.initializer, scope, tree)?;
        if var.ty == init_ty {
            scope.declare(var.name, init_ty);
            self.node_types.insert(NodeId::of(var), init_ty);
            Ok(())
        } else {
            tracing::error!(
                name = var.name,
                "global variable initializer does not match its declared type"
            );
            Err(TypeError::Mismatch {
                message: format!(
                    "the value assigned to '{}' does not match its declared type",
                    var.name
                ),
                range: var.range.clone(),
            }
            .into())
        }
    }

    /// Wrap every global initializer in a zero-argument function named
    /// `<name>#Initializer`, appended after the namespace's declared
    /// functions. The later passes treat them as ordinary functions.
    fn synthesize_initializers(&self, ns: &mut vela_parser::ast::Namespace<'a>) {
        let initializers: Vec<&'a LambdaExpr<'a>> =
            ns.globals().map(|var| self.make_initializer(var)).collect();
        for init in initializers {
            ns.declare_function(init);
        }
        for child in ns.children_mut() {
            self.synthesize_initializers(child);
        }
    }

    fn make_initializer(&self, var: &'a VariableDeclarationExpr<'a>) -> &'a LambdaExpr<'a> {
        let name = self.exprs.alloc_str(&format!("{}#Initializer", var.name));
        tracing::debug!(function = name, "synthesizing global initializer");
        self.exprs.alloc(LambdaExpr {
            name,
            parameters: &[],
            return_type: var.ty,
            body: var.initializer,
            annotations: &[],
            range: var.initializer.range().clone(),
        })
    }

    /// The callable type of a function's declared signature.
    pub fn callable_type_of(&self, lambda: &'a LambdaExpr<'a>) -> &'a Type<'a> {
        let params: Vec<&'a Type<'a>> = lambda.parameters.iter().map(|p| p.ty).collect();
        self.types.callable(&params, lambda.return_type)
    }

    fn register(&mut self, expr: Expr<'a>, ty: &'a Type<'a>) -> &'a Type<'a> {
        self.node_types.insert(expr.node_id(), ty);
        ty
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vela_core::{SourceFile, types};
    use vela_parser::{Lexer, Parser};

    fn with_checked_expr<R>(
        source: &str,
        f: impl for<'a> FnOnce(Result<&'a Type<'a>, CompileError>) -> R,
    ) -> R {
        let exprs = ExprArena::new();
        let types = TypeArena::new();
        let file = SourceFile::new("test.vela");
        let tokens = Lexer::new(source, file.clone(), &exprs).tokenize().unwrap();
        let mut parser = Parser::new(tokens, file, &exprs);
        let expr = parser.parse_expression().unwrap();
        let mut checker = TypeChecker::new(&types, &exprs);
        let tree = NamespaceTree::new();
        let mut scope = TypeScope::new();
        f(checker.check(expr, &mut scope, &tree))
    }

    fn with_checked_statement<R>(
        source: &str,
        f: impl for<'a> FnOnce(Result<&'a Type<'a>, CompileError>) -> R,
    ) -> R {
        let exprs = ExprArena::new();
        let types = TypeArena::new();
        let file = SourceFile::new("test.vela");
        let tokens = Lexer::new(source, file.clone(), &exprs).tokenize().unwrap();
        let mut parser = Parser::new(tokens, file, &exprs);
        let expr = parser.parse_statement().unwrap();
        let mut checker = TypeChecker::new(&types, &exprs);
        let tree = NamespaceTree::new();
        let mut scope = TypeScope::new();
        f(checker.check(expr, &mut scope, &tree))
    }

    #[test]
    fn integer_division_is_int() {
        with_checked_expr("36 / 9", |result| {
            assert_eq!(result.unwrap(), &types::INT32);
        });
    }

    #[test]
    fn mixed_arithmetic_is_rejected() {
        with_checked_expr("3 / 3.0", |result| {
            assert!(matches!(result, Err(CompileError::Type(_))));
        });
    }

    #[test]
    fn modulo_follows_arithmetic_rule() {
        with_checked_expr("7 % 3", |result| {
            assert_eq!(result.unwrap(), &types::INT32);
        });
    }

    #[test]
    fn comparison_yields_bool() {
        with_checked_expr("1 < 2", |result| {
            assert_eq!(result.unwrap(), &types::BOOLEAN);
        });
    }

    #[test]
    fn string_equality_is_bool() {
        with_checked_expr(r#""a" == "b""#, |result| {
            assert_eq!(result.unwrap(), &types::BOOLEAN);
        });
    }

    #[test]
    fn bool_ordering_is_rejected() {
        with_checked_expr("true < false", |result| {
            assert!(matches!(result, Err(CompileError::Type(_))));
        });
    }

    #[test]
    fn logical_operators_have_no_rule() {
        with_checked_expr("true and false", |result| {
            assert!(matches!(result, Err(CompileError::Type(_))));
        });
    }

    #[test]
    fn conditional_unions_branch_types() {
        with_checked_statement("if 1 < 2 { 10.3; } else { false; }", |result| {
            let ty = result.unwrap();
            let Type::Union(members) = ty else {
                panic!("expected union, got {ty:?}");
            };
            assert_eq!(members.len(), 2);
            assert!(members.iter().any(|m| **m == types::FLOAT64));
            assert!(members.iter().any(|m| **m == types::BOOLEAN));
        });
    }

    #[test]
    fn conditional_same_branches_collapse() {
        with_checked_statement("if 1 < 2 { 1; } else { 2; }", |result| {
            assert_eq!(result.unwrap(), &types::INT32);
        });
    }

    #[test]
    fn non_boolean_condition_is_rejected() {
        with_checked_statement("if 1 { 2; } else { 3; }", |result| {
            assert!(matches!(
                result,
                Err(CompileError::Type(TypeError::NonBooleanCondition { .. }))
            ));
        });
    }

    #[test]
    fn while_condition_must_be_bool() {
        with_checked_statement("while (1) { 2; }", |result| {
            assert!(matches!(
                result,
                Err(CompileError::Type(TypeError::NonBooleanCondition { .. }))
            ));
        });
    }

    #[test]
    fn undefined_name_is_scope_error() {
        with_checked_expr("missing", |result| {
            assert!(matches!(result, Err(CompileError::Scope(_))));
        });
    }

    #[test]
    fn block_takes_last_expression_type() {
        with_checked_statement("if true { 1; 2.5; } else { 0.5; }", |result| {
            assert_eq!(result.unwrap(), &types::FLOAT64);
        });
    }

    #[test]
    fn variable_declaration_is_void_and_infers() {
        with_checked_statement("var x = 1;", |result| {
            assert_eq!(result.unwrap(), &types::EMPTY);
        });
    }

    #[test]
    fn declared_variable_type_must_match() {
        with_checked_statement("var x: Int = 1.5;", |result| {
            assert!(matches!(result, Err(CompileError::Type(_))));
        });
    }

    #[test]
    fn lambda_yields_callable() {
        let exprs = ExprArena::new();
        let types_arena = TypeArena::new();
        let file = SourceFile::new("test.vela");
        let source = "func f(x: Double, y: Double): Double { x + y; }";
        let tokens = Lexer::new(source, file.clone(), &exprs).tokenize().unwrap();
        let mut parser = Parser::new(tokens, file, &exprs);
        let lambda = parser.parse_function().unwrap();
        let mut checker = TypeChecker::new(&types_arena, &exprs);
        let tree = NamespaceTree::new();
        let scope = TypeScope::new();
        let ty = checker.check_lambda(lambda, &scope, &tree).unwrap();
        let Type::Callable { params, ret } = ty else {
            panic!("expected callable, got {ty:?}");
        };
        assert_eq!(params.len(), 2);
        assert_eq!(params[0], &types::FLOAT64);
        assert_eq!(params[1], &types::FLOAT64);
        assert_eq!(*ret, &types::FLOAT64);
    }

    #[test]
    fn assignment_checks_target_type() {
        let exprs = ExprArena::new();
        let types_arena = TypeArena::new();
        let file = SourceFile::new("test.vela");
        let tokens = Lexer::new("x = 1.5;", file.clone(), &exprs).tokenize().unwrap();
        let mut parser = Parser::new(tokens, file, &exprs);
        let stmt = parser.parse_statement().unwrap();
        let mut checker = TypeChecker::new(&types_arena, &exprs);
        let tree = NamespaceTree::new();
        let mut scope = TypeScope::new();
        scope.declare("x", &types::INT32);
        assert!(matches!(
            checker.check(stmt, &mut scope, &tree),
            Err(CompileError::Type(_))
        ));

        let tokens = Lexer::new("x = 2;", SourceFile::new("test.vela"), &exprs)
            .tokenize()
            .unwrap();
        let mut parser = Parser::new(tokens, SourceFile::new("test.vela"), &exprs);
        let stmt = parser.parse_statement().unwrap();
        assert_eq!(
            checker.check(stmt, &mut scope, &tree).unwrap(),
            &types::EMPTY
        );
    }

    #[test]
    fn function_type_comparison() {
        let arena = TypeArena::new();
        let declared = arena.callable(&[&types::INT32], &types::INT32);
        let actual = arena.callable(&[&types::INT32], &types::INT32);
        assert!(TypeChecker::check_function_type(declared, actual));

        // A declared Void return accepts any body type.
        let lenient = arena.callable(&[&types::INT32], &types::EMPTY);
        let returns_int = arena.callable(&[&types::INT32], &types::INT32);
        assert!(TypeChecker::check_function_type(lenient, returns_int));
        assert!(!TypeChecker::check_function_type(returns_int, lenient));

        // Arity and parameter types are exact.
        let unary_fn = arena.callable(&[&types::INT32], &types::INT32);
        let binary_fn = arena.callable(&[&types::INT32, &types::INT32], &types::INT32);
        assert!(!TypeChecker::check_function_type(unary_fn, binary_fn));
        assert!(!TypeChecker::check_function_type(&types::INT32, unary_fn));
    }
}
