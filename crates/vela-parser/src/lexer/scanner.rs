//! The Vela lexer.

use std::sync::Arc;

use vela_core::{LexError, SourceFile, SourceRange};

use super::cursor::{Cursor, is_ident_continue, is_ident_start};
use super::token::{Token, TokenKind};
use crate::ast::ExprArena;

/// Tokenizes a source file into the finite stream the parser consumes.
///
/// Lexeme text is copied into the expression arena so tokens (and the names
/// derived from them) outlive the source string.
pub struct Lexer<'src, 'ast> {
    cursor: Cursor<'src>,
    file: Arc<SourceFile>,
    arena: &'ast ExprArena,
}

impl<'src, 'ast> Lexer<'src, 'ast> {
    pub fn new(source: &'src str, file: Arc<SourceFile>, arena: &'ast ExprArena) -> Self {
        Self {
            cursor: Cursor::new(source),
            file,
            arena,
        }
    }

    /// Read the whole source, ending with an [`TokenKind::Eof`] token.
    pub fn tokenize(mut self) -> Result<Vec<Token<'ast>>, LexError> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token()?;
            let done = token.kind == TokenKind::Eof;
            tokens.push(token);
            if done {
                return Ok(tokens);
            }
        }
    }

    fn next_token(&mut self) -> Result<Token<'ast>, LexError> {
        self.skip_trivia()?;

        let line = self.cursor.line();
        let col = self.cursor.column();
        let Some(ch) = self.cursor.peek() else {
            return Ok(Token::new(TokenKind::Eof, "", line, col));
        };

        if is_ident_start(ch) {
            let text = self.cursor.eat_while(is_ident_continue);
            let kind = TokenKind::keyword(text).unwrap_or(TokenKind::Identifier);
            return Ok(self.token(kind, text, line, col));
        }
        if ch.is_ascii_digit() {
            return self.number(line, col);
        }
        if ch == '"' {
            return self.string(line, col);
        }
        if ch == '\'' {
            return self.character(line, col);
        }

        self.cursor.advance();
        let kind = match ch {
            '+' => TokenKind::Plus,
            '-' => TokenKind::Minus,
            '*' => TokenKind::Star,
            '/' => TokenKind::Slash,
            '%' => TokenKind::Percent,
            '=' => {
                if self.cursor.eat('=') {
                    TokenKind::EqualEqual
                } else {
                    TokenKind::Assign
                }
            }
            '!' => {
                if self.cursor.eat('=') {
                    TokenKind::BangEqual
                } else {
                    return Err(LexError::UnexpectedChar {
                        ch,
                        range: self.range(line, col),
                    });
                }
            }
            '<' => {
                if self.cursor.eat('=') {
                    TokenKind::LessEqual
                } else {
                    TokenKind::Less
                }
            }
            '>' => {
                if self.cursor.eat('=') {
                    TokenKind::GreaterEqual
                } else {
                    TokenKind::Greater
                }
            }
            ':' => {
                if self.cursor.eat(':') {
                    TokenKind::ColonColon
                } else {
                    TokenKind::Colon
                }
            }
            ';' => TokenKind::Semicolon,
            ',' => TokenKind::Comma,
            '@' => TokenKind::At,
            '(' => TokenKind::LeftParen,
            ')' => TokenKind::RightParen,
            '{' => TokenKind::LeftBrace,
            '}' => TokenKind::RightBrace,
            other => {
                return Err(LexError::UnexpectedChar {
                    ch: other,
                    range: self.range(line, col),
                });
            }
        };
        Ok(self.token(kind, "", line, col))
    }

    /// Skip whitespace, `//` line comments and `/* */` block comments.
    fn skip_trivia(&mut self) -> Result<(), LexError> {
        loop {
            self.cursor.eat_while(|c| c.is_whitespace());
            if self.cursor.peek() != Some('/') {
                return Ok(());
            }
            match self.cursor.peek_next() {
                Some('/') => {
                    self.cursor.eat_while(|c| c != '\n');
                }
                Some('*') => {
                    let line = self.cursor.line();
                    let col = self.cursor.column();
                    self.cursor.advance();
                    self.cursor.advance();
                    loop {
                        match self.cursor.advance() {
                            Some('*') if self.cursor.eat('/') => break,
                            Some(_) => {}
                            None => {
                                return Err(LexError::UnterminatedComment {
                                    range: self.range(line, col),
                                });
                            }
                        }
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    fn number(&mut self, line: u32, col: u32) -> Result<Token<'ast>, LexError> {
        let start = self.cursor.offset();
        self.cursor.eat_while(|c| c.is_ascii_digit());
        let mut is_float = false;
        if self.cursor.peek() == Some('.')
            && self.cursor.peek_next().is_some_and(|c| c.is_ascii_digit())
        {
            is_float = true;
            self.cursor.advance();
            self.cursor.eat_while(|c| c.is_ascii_digit());
        }
        let text = self.cursor.slice_from(start);
        if is_float {
            if text.parse::<f64>().is_err() {
                return Err(self.invalid_number(text, line, col));
            }
            Ok(self.token(TokenKind::Float, text, line, col))
        } else {
            if text.parse::<i32>().is_err() {
                return Err(self.invalid_number(text, line, col));
            }
            Ok(self.token(TokenKind::Integer, text, line, col))
        }
    }

    fn string(&mut self, line: u32, col: u32) -> Result<Token<'ast>, LexError> {
        self.cursor.advance(); // opening quote
        let mut content = String::new();
        loop {
            match self.cursor.advance() {
                Some('"') => break,
                Some('\\') => content.push(self.escape(line, col)?),
                Some(c) => content.push(c),
                None => {
                    return Err(LexError::UnterminatedString {
                        range: self.range(line, col),
                    });
                }
            }
        }
        let text = self.arena.alloc_str(&content);
        Ok(Token::new(TokenKind::Str, text, line, col))
    }

    fn character(&mut self, line: u32, col: u32) -> Result<Token<'ast>, LexError> {
        self.cursor.advance(); // opening quote
        let content = match self.cursor.advance() {
            Some('\\') => self.escape(line, col)?,
            Some('\'') | None => {
                return Err(LexError::MalformedChar {
                    range: self.range(line, col),
                });
            }
            Some(c) => c,
        };
        if !self.cursor.eat('\'') {
            return Err(LexError::MalformedChar {
                range: self.range(line, col),
            });
        }
        let text = self.arena.alloc_str(content.encode_utf8(&mut [0u8; 4]));
        Ok(Token::new(TokenKind::Character, text, line, col))
    }

    fn escape(&mut self, line: u32, col: u32) -> Result<char, LexError> {
        match self.cursor.advance() {
            Some('n') => Ok('\n'),
            Some('t') => Ok('\t'),
            Some('r') => Ok('\r'),
            Some('0') => Ok('\0'),
            Some('\\') => Ok('\\'),
            Some('"') => Ok('"'),
            Some('\'') => Ok('\''),
            Some(ch) => Err(LexError::InvalidEscape {
                ch,
                range: self.range(line, col),
            }),
            None => Err(LexError::UnterminatedString {
                range: self.range(line, col),
            }),
        }
    }

    fn invalid_number(&self, text: &str, line: u32, col: u32) -> LexError {
        LexError::InvalidNumber {
            text: text.to_string(),
            range: self.range(line, col),
        }
    }

    fn token(&self, kind: TokenKind, text: &str, line: u32, col: u32) -> Token<'ast> {
        Token::new(kind, self.arena.alloc_str(text), line, col)
    }

    fn range(&self, line: u32, col: u32) -> SourceRange {
        SourceRange::new(
            Arc::clone(&self.file),
            line,
            col,
            self.cursor.line(),
            self.cursor.column(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex(source: &str, arena: &ExprArena) -> Result<Vec<TokenKind>, LexError> {
        let file = SourceFile::new("test.vela");
        let tokens = Lexer::new(source, file, arena).tokenize()?;
        Ok(tokens.into_iter().map(|t| t.kind).collect())
    }

    #[test]
    fn function_declaration_tokens() {
        use TokenKind::*;
        let arena = ExprArena::new();
        let kinds = lex("func Add(x: Int, y: Int): Int { var z = x + y; z; }", &arena).unwrap();
        assert_eq!(
            kinds,
            vec![
                Func, Identifier, LeftParen, Identifier, Colon, Identifier, Comma, Identifier,
                Colon, Identifier, RightParen, Colon, Identifier, LeftBrace, Var, Identifier,
                Assign, Identifier, Plus, Identifier, Semicolon, Identifier, Semicolon, RightBrace,
                Eof,
            ]
        );
    }

    #[test]
    fn operators_and_scoping() {
        use TokenKind::*;
        let arena = ExprArena::new();
        let kinds = lex("A::B::x == 1 != 2 <= 3 >= 4 < 5 > 6 % 7", &arena).unwrap();
        assert_eq!(
            kinds,
            vec![
                Identifier, ColonColon, Identifier, ColonColon, Identifier, EqualEqual, Integer,
                BangEqual, Integer, LessEqual, Integer, GreaterEqual, Integer, Less, Integer,
                Greater, Integer, Percent, Integer, Eof,
            ]
        );
    }

    #[test]
    fn literals_carry_decoded_text() {
        let arena = ExprArena::new();
        let file = SourceFile::new("test.vela");
        let tokens = Lexer::new(r#""a\nb" 'x' 3.5 42"#, file, &arena)
            .tokenize()
            .unwrap();
        assert_eq!(tokens[0].kind, TokenKind::Str);
        assert_eq!(tokens[0].text, "a\nb");
        assert_eq!(tokens[1].kind, TokenKind::Character);
        assert_eq!(tokens[1].text, "x");
        assert_eq!(tokens[2].kind, TokenKind::Float);
        assert_eq!(tokens[2].text, "3.5");
        assert_eq!(tokens[3].kind, TokenKind::Integer);
        assert_eq!(tokens[3].text, "42");
    }

    #[test]
    fn comments_are_skipped() {
        use TokenKind::*;
        let arena = ExprArena::new();
        let kinds = lex("1 // one\n/* two\nlines */ 2", &arena).unwrap();
        assert_eq!(kinds, vec![Integer, Integer, Eof]);
    }

    #[test]
    fn annotation_tokens() {
        use TokenKind::*;
        let arena = ExprArena::new();
        let kinds = lex(r#"@External(Library = "libm", EntryPoint = "sin")"#, &arena).unwrap();
        assert_eq!(
            kinds,
            vec![
                At, Identifier, LeftParen, Identifier, Assign, Str, Comma, Identifier, Assign,
                Str, RightParen, Eof,
            ]
        );
    }

    #[test]
    fn unterminated_string_errors() {
        let arena = ExprArena::new();
        assert!(matches!(
            lex(r#""abc"#, &arena),
            Err(LexError::UnterminatedString { .. })
        ));
    }

    #[test]
    fn integer_overflow_errors() {
        let arena = ExprArena::new();
        assert!(matches!(
            lex("99999999999", &arena),
            Err(LexError::InvalidNumber { .. })
        ));
    }

    #[test]
    fn lone_bang_errors() {
        let arena = ExprArena::new();
        assert!(matches!(
            lex("!x", &arena),
            Err(LexError::UnexpectedChar { ch: '!', .. })
        ));
    }

    #[test]
    fn positions_are_one_indexed() {
        let arena = ExprArena::new();
        let file = SourceFile::new("test.vela");
        let tokens = Lexer::new("a\n  b", file, &arena).tokenize().unwrap();
        assert_eq!((tokens[0].line, tokens[0].col), (1, 1));
        assert_eq!((tokens[1].line, tokens[1].col), (2, 3));
    }
}
