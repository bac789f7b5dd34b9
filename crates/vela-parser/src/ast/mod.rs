//! The Vela intermediate representation and its parser.
//!
//! All IR nodes live in a single [`ExprArena`] owned by the caller; the
//! analysis passes hold `&'ast` references into it and never own nodes.

pub mod expr;
pub mod namespace;
mod parser;

pub use expr::{
    Annotation, AnnotationArg, BinaryExpr, BinaryOp, BlockExpr, CallExpr, ConditionalExpr,
    ConstantExpr, DefaultExpr, Expr, ExprArena, LambdaExpr, LiteralValue, NodeId, ParamDecl,
    ParameterExpr, UnaryExpr, UnaryOp, VariableDeclarationExpr, WhileExpr,
};
pub use namespace::{Namespace, NamespaceTree};
pub use parser::Parser;
