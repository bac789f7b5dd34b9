//! Error types for every stage of the pipeline.
//!
//! Each stage reports its own error enum; [`CompileError`] unifies them so the
//! driver can stop on the first diagnostic with a single `?`:
//!
//! ```text
//! CompileError
//! ├── LexError        - tokenization failures
//! ├── SyntaxError     - token mismatches at the parser
//! ├── ScopeError      - undefined identifiers (either analysis pass)
//! ├── TypeError       - static type violations
//! ├── AnnotationError - malformed @External metadata
//! └── EmitError       - code generation failures
//! ```
//!
//! Every failure is fatal: the pipeline does not recover or produce partial
//! output.

use thiserror::Error;

use crate::span::SourceRange;

/// Errors produced by the lexer.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LexError {
    /// A character the language has no use for.
    #[error("unexpected character '{ch}' at {range}")]
    UnexpectedChar { ch: char, range: SourceRange },

    /// A string literal ran to end of input.
    #[error("unterminated string literal at {range}")]
    UnterminatedString { range: SourceRange },

    /// A character literal ran to end of input or is empty.
    #[error("malformed character literal at {range}")]
    MalformedChar { range: SourceRange },

    /// A block comment was never closed.
    #[error("unterminated block comment at {range}")]
    UnterminatedComment { range: SourceRange },

    /// A numeric literal does not fit its type or is not a number.
    #[error("malformed number '{text}' at {range}")]
    InvalidNumber { text: String, range: SourceRange },

    /// An escape sequence the language does not define.
    #[error("invalid escape sequence '\\{ch}' at {range}")]
    InvalidEscape { ch: char, range: SourceRange },
}

/// A token mismatch at the parser.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message} at {range}")]
pub struct SyntaxError {
    pub message: String,
    pub range: SourceRange,
}

impl SyntaxError {
    pub fn new(message: impl Into<String>, range: SourceRange) -> Self {
        Self {
            message: message.into(),
            range,
        }
    }

    /// The standard "expected X, found Y" form.
    pub fn expected(expected: &str, found: &str, range: SourceRange) -> Self {
        Self::new(format!("expected {expected}, found {found}"), range)
    }
}

/// An identifier that does not resolve, from either analysis pass.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScopeError {
    #[error("'{name}' is not defined at {range}")]
    Undefined { name: String, range: SourceRange },

    /// The `::` prefix named a module that does not exist.
    #[error("'{name}' is not defined at {range}: module '{module}' is missing")]
    MissingModule {
        name: String,
        module: String,
        range: SourceRange,
    },
}

/// A static type violation found by the type checker.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TypeError {
    #[error("type mismatch at {range}: {message}")]
    Mismatch { message: String, range: SourceRange },

    #[error("argument {index} type mismatch at {range}")]
    ArgumentMismatch { index: usize, range: SourceRange },

    #[error("expected {expected} arguments, found {found} at {range}")]
    ArityMismatch {
        expected: usize,
        found: usize,
        range: SourceRange,
    },

    #[error("condition must be a Bool at {range}")]
    NonBooleanCondition { range: SourceRange },

    #[error("cannot convert from {from} to {to} at {range}")]
    InvalidConversion {
        from: String,
        to: String,
        range: SourceRange,
    },

    #[error("call target is not callable at {range}")]
    NotCallable { range: SourceRange },

    #[error("function body does not match the declared function type at {range}")]
    SignatureMismatch { range: SourceRange },
}

/// A malformed compile-time annotation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AnnotationError {
    #[error("annotation argument '{name}' was given more than once at {range}")]
    DuplicateArgument { name: String, range: SourceRange },

    #[error("@External annotation is missing its '{name}' argument at {range}")]
    MissingArgument { name: String, range: SourceRange },
}

/// A failure during bytecode emission.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EmitError {
    /// The operator is parsed and checked but has no code generation yet.
    #[error("operator '{op}' is not supported by the emitter at {range}")]
    UnsupportedOperator { op: String, range: SourceRange },

    /// Call targets must be plain identifiers.
    #[error("call target must be a function name at {range}")]
    CalleeNotIdentifier { range: SourceRange },

    /// No opcode family covers this operand type.
    #[error("type {ty} is not supported here at {range}")]
    UnsupportedType { ty: String, range: SourceRange },

    /// The type checker assigned different types to the two operands.
    #[error("operand types disagree at {range}")]
    OperandMismatch { range: SourceRange },

    /// A jump would not fit a signed 16-bit offset.
    #[error("jump offset exceeds 16 bits at {range}")]
    JumpOutOfRange { range: SourceRange },

    #[error("multiple 'Main' functions are defined at {range}")]
    DuplicateMain { range: SourceRange },

    #[error("'Main' function is not defined")]
    MissingMain,

    /// Anything else the emitter cannot express.
    #[error("{message} at {range}")]
    Unsupported { message: String, range: SourceRange },
}

/// Any fatal diagnostic from any stage.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CompileError {
    #[error(transparent)]
    Lex(#[from] LexError),
    #[error(transparent)]
    Syntax(#[from] SyntaxError),
    #[error(transparent)]
    Scope(#[from] ScopeError),
    #[error(transparent)]
    Type(#[from] TypeError),
    #[error(transparent)]
    Annotation(#[from] AnnotationError),
    #[error(transparent)]
    Emit(#[from] EmitError),
}

impl CompileError {
    /// The pipeline stage that produced this diagnostic.
    pub fn stage(&self) -> &'static str {
        match self {
            CompileError::Lex(_) => "lex",
            CompileError::Syntax(_) => "parse",
            CompileError::Scope(_) => "resolve",
            CompileError::Type(_) => "type-check",
            CompileError::Annotation(_) => "annotation",
            CompileError::Emit(_) => "emit",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::span::SourceFile;

    fn range() -> SourceRange {
        SourceRange::point(SourceFile::new("t.vela"), 1, 1)
    }

    #[test]
    fn stage_names() {
        let err: CompileError = LexError::UnterminatedString { range: range() }.into();
        assert_eq!(err.stage(), "lex");

        let err: CompileError = TypeError::NonBooleanCondition { range: range() }.into();
        assert_eq!(err.stage(), "type-check");

        let err: CompileError = EmitError::MissingMain.into();
        assert_eq!(err.stage(), "emit");
    }

    #[test]
    fn syntax_error_expected_form() {
        let err = SyntaxError::expected("';'", "'}'", range());
        assert_eq!(format!("{err}"), "expected ';', found '}' at t.vela:1:1");
    }

    #[test]
    fn scope_error_display() {
        let err = ScopeError::Undefined {
            name: "x".into(),
            range: range(),
        };
        assert_eq!(format!("{err}"), "'x' is not defined at t.vela:1:1");
    }
}
