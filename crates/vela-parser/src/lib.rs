//! Lexer, IR and parser for the Vela language.
//!
//! The parser produces two artifacts that the analysis passes share:
//! an arena-allocated expression tree ([`ast::Expr`]) and a namespace tree
//! ([`ast::NamespaceTree`]) recording declared globals and functions in
//! declaration order.
//!
//! # Example
//!
//! ```
//! use vela_parser::{ast::ExprArena, parse_source};
//!
//! let exprs = ExprArena::new();
//! let tree = parse_source("module M { func Main(): Int { 0; } }", "demo.vela", &exprs).unwrap();
//! assert_eq!(tree.root().children().len(), 1);
//! ```

pub mod ast;
pub mod lexer;

pub use ast::Parser;
pub use lexer::{Lexer, Token, TokenKind};

use vela_core::{CompileError, SourceFile};

/// Lex and parse a whole source file into a namespace tree.
pub fn parse_source<'a>(
    source: &str,
    file_name: &str,
    exprs: &'a ast::ExprArena,
) -> Result<ast::NamespaceTree<'a>, CompileError> {
    let file = SourceFile::new(file_name);
    let tokens = Lexer::new(source, file.clone(), exprs).tokenize()?;
    let mut parser = Parser::new(tokens, file, exprs);
    Ok(parser.parse_program()?)
}
