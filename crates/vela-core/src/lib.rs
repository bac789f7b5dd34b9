//! Shared foundations of the Vela compiler.
//!
//! This crate carries what every stage of the pipeline needs:
//! - [`SourceRange`] source positions for diagnostics
//! - the per-stage error types unified under [`CompileError`]
//! - the [`Type`] model with its interning arena

pub mod error;
pub mod span;
pub mod types;

pub use error::{
    AnnotationError, CompileError, EmitError, LexError, ScopeError, SyntaxError, TypeError,
};
pub use span::{SourceFile, SourceRange};
pub use types::{Type, TypeArena, TypeCode};
