//! Lexical analysis: UTF-8 source text to a finite token stream.

mod cursor;
mod scanner;
mod token;

pub use cursor::Cursor;
pub use scanner::Lexer;
pub use token::{Token, TokenKind};
