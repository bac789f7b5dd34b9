//! Recursive-descent parser for the Vela grammar.
//!
//! Precedence, lowest first: `or`, `and`, equality, relational, additive,
//! multiplicative, unary, postfix (call), primary. Assignment is recognized
//! at statement level only.

use std::sync::Arc;

use vela_core::{SourceFile, SourceRange, SyntaxError, Type, types};

use super::expr::{
    Annotation, AnnotationArg, BinaryExpr, BinaryOp, BlockExpr, CallExpr, ConditionalExpr,
    ConstantExpr, DefaultExpr, Expr, ExprArena, LambdaExpr, LiteralValue, ParamDecl,
    ParameterExpr, UnaryExpr, UnaryOp, VariableDeclarationExpr, WhileExpr,
};
use super::namespace::{Namespace, NamespaceTree};
use crate::lexer::{Token, TokenKind};

pub struct Parser<'a> {
    tokens: Vec<Token<'a>>,
    offset: usize,
    file: Arc<SourceFile>,
    exprs: &'a ExprArena,
}

impl<'a> Parser<'a> {
    pub fn new(mut tokens: Vec<Token<'a>>, file: Arc<SourceFile>, exprs: &'a ExprArena) -> Self {
        if tokens.is_empty() {
            tokens.push(Token::new(TokenKind::Eof, "", 1, 1));
        }
        Self {
            tokens,
            offset: 0,
            file,
            exprs,
        }
    }

    /// Parse a whole file: a sequence of `module` blocks.
    pub fn parse_program(&mut self) -> Result<NamespaceTree<'a>, SyntaxError> {
        let mut tree = NamespaceTree::new();
        while !self.check(TokenKind::Eof) {
            self.parse_module(tree.root_mut())?;
        }
        Ok(tree)
    }

    fn parse_module(&mut self, parent: &mut Namespace<'a>) -> Result<(), SyntaxError> {
        self.expect(TokenKind::Module)?;
        let name = self.expect(TokenKind::Identifier)?.text;
        self.expect(TokenKind::LeftBrace)?;
        let ns = parent.ensure_child(name);
        while !self.check(TokenKind::RightBrace) {
            match self.look().kind {
                TokenKind::Module => self.parse_module(ns)?,
                TokenKind::Var => {
                    let decl = self.parse_variable_declaration()?;
                    self.expect(TokenKind::Semicolon)?;
                    ns.declare_global(decl);
                }
                TokenKind::Func | TokenKind::At => {
                    let func = self.parse_function()?;
                    ns.declare_function(func);
                }
                _ => {
                    let t = *self.look();
                    return Err(SyntaxError::expected(
                        "'module', 'var' or 'func'",
                        t.kind.describe(),
                        self.token_range(&t),
                    ));
                }
            }
        }
        self.expect(TokenKind::RightBrace)?;
        Ok(())
    }

    /// Parse a function declaration, annotations included.
    ///
    /// A body-less declaration (`func f(...): T;`) is the native form; its
    /// body is the default value of the declared return type so the checker
    /// sees a conforming body while codegen ignores it.
    pub fn parse_function(&mut self) -> Result<&'a LambdaExpr<'a>, SyntaxError> {
        let annotations = self.parse_annotations()?;
        let start = *self.look();
        self.expect(TokenKind::Func)?;
        let name = self.expect(TokenKind::Identifier)?.text;
        self.expect(TokenKind::LeftParen)?;
        let mut params: Vec<ParamDecl<'a>> = Vec::new();
        if !self.check(TokenKind::RightParen) {
            loop {
                let p_start = *self.look();
                let p_name = self.expect(TokenKind::Identifier)?.text;
                self.expect(TokenKind::Colon)?;
                let p_ty = self.parse_type()?;
                params.push(ParamDecl {
                    name: p_name,
                    ty: p_ty,
                    range: self.token_range(&p_start),
                });
                if !self.eat(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(TokenKind::RightParen)?;
        self.expect(TokenKind::Colon)?;
        let return_type = self.parse_type()?;

        let body = if self.check(TokenKind::Semicolon) {
            let semi = *self.look();
            self.advance();
            Expr::Default(self.exprs.alloc(DefaultExpr {
                ty: return_type,
                range: self.token_range(&semi),
            }))
        } else {
            self.parse_block()?
        };

        Ok(self.exprs.alloc(LambdaExpr {
            name,
            parameters: self.exprs.alloc_slice_clone(&params),
            return_type,
            body,
            annotations,
            range: self.token_range(&start),
        }))
    }

    fn parse_annotations(&mut self) -> Result<&'a [Annotation<'a>], SyntaxError> {
        let mut annotations: Vec<Annotation<'a>> = Vec::new();
        while self.check(TokenKind::At) {
            let start = *self.look();
            self.advance();
            let name = self.expect(TokenKind::Identifier)?.text;
            self.expect(TokenKind::LeftParen)?;
            let mut args: Vec<AnnotationArg<'a>> = Vec::new();
            if !self.check(TokenKind::RightParen) {
                loop {
                    let a_start = *self.look();
                    let a_name = self.expect(TokenKind::Identifier)?.text;
                    self.expect(TokenKind::Assign)?;
                    let value = self.expect(TokenKind::Str)?.text;
                    args.push(AnnotationArg {
                        name: a_name,
                        value,
                        range: self.token_range(&a_start),
                    });
                    if !self.eat(TokenKind::Comma) {
                        break;
                    }
                }
            }
            self.expect(TokenKind::RightParen)?;
            annotations.push(Annotation {
                name,
                arguments: self.exprs.alloc_slice_clone(&args),
                range: self.token_range(&start),
            });
        }
        Ok(self.exprs.alloc_slice_clone(&annotations))
    }

    /// Map a surface type name to a basic type.
    fn parse_type(&mut self) -> Result<&'a Type<'a>, SyntaxError> {
        let token = *self.look();
        self.expect(TokenKind::Identifier)?;
        let ty: &'static Type<'static> = match token.text {
            "Int" => &types::INT32,
            "Long" => &types::INT64,
            "Float" => &types::FLOAT32,
            "Double" => &types::FLOAT64,
            "Bool" => &types::BOOLEAN,
            "Char" => &types::CHAR,
            "String" => &types::STRING,
            "Void" => &types::EMPTY,
            other => {
                return Err(SyntaxError::new(
                    format!("unknown type name '{other}'"),
                    self.token_range(&token),
                ));
            }
        };
        Ok(ty)
    }

    /// Parse one statement.
    pub fn parse_statement(&mut self) -> Result<Expr<'a>, SyntaxError> {
        match self.look().kind {
            TokenKind::If => self.parse_if(),
            TokenKind::While => self.parse_while(),
            TokenKind::Var => {
                let decl = self.parse_variable_declaration()?;
                self.expect(TokenKind::Semicolon)?;
                Ok(Expr::VariableDeclaration(decl))
            }
            _ => {
                let expr = self.parse_assign()?;
                self.expect(TokenKind::Semicolon)?;
                Ok(expr)
            }
        }
    }

    fn parse_variable_declaration(
        &mut self,
    ) -> Result<&'a VariableDeclarationExpr<'a>, SyntaxError> {
        let start = *self.look();
        self.expect(TokenKind::Var)?;
        let name = self.expect(TokenKind::Identifier)?.text;
        let ty = if self.eat(TokenKind::Colon) {
            self.parse_type()?
        } else {
            &types::UNKNOWN
        };
        self.expect(TokenKind::Assign)?;
        let initializer = self.parse_or()?;
        Ok(self.exprs.alloc(VariableDeclarationExpr {
            name,
            ty,
            initializer,
            range: self.token_range(&start),
        }))
    }

    fn parse_if(&mut self) -> Result<Expr<'a>, SyntaxError> {
        let start = *self.look();
        self.expect(TokenKind::If)?;
        let test = self.parse_or()?;
        let if_true = self.parse_block()?;
        let if_false = if self.eat(TokenKind::Else) {
            if self.check(TokenKind::If) {
                self.parse_if()?
            } else {
                self.parse_block()?
            }
        } else {
            let here = *self.look();
            Expr::Default(self.exprs.alloc(DefaultExpr {
                ty: &types::UNKNOWN,
                range: self.token_range(&here),
            }))
        };
        Ok(Expr::Conditional(self.exprs.alloc(ConditionalExpr {
            test,
            if_true,
            if_false,
            range: self.token_range(&start),
        })))
    }

    fn parse_while(&mut self) -> Result<Expr<'a>, SyntaxError> {
        let start = *self.look();
        self.expect(TokenKind::While)?;
        self.expect(TokenKind::LeftParen)?;
        let condition = self.parse_or()?;
        self.expect(TokenKind::RightParen)?;
        let body = self.parse_block()?;
        Ok(Expr::WhileLoop(self.exprs.alloc(WhileExpr {
            condition,
            body,
            range: self.token_range(&start),
        })))
    }

    fn parse_block(&mut self) -> Result<Expr<'a>, SyntaxError> {
        let start = *self.look();
        self.expect(TokenKind::LeftBrace)?;
        let mut expressions: Vec<Expr<'a>> = Vec::new();
        while !self.check(TokenKind::RightBrace) && !self.check(TokenKind::Eof) {
            expressions.push(self.parse_statement()?);
        }
        self.expect(TokenKind::RightBrace)?;
        Ok(Expr::Block(self.exprs.alloc(BlockExpr {
            expressions: self.exprs.alloc_slice(&expressions),
            range: self.token_range(&start),
        })))
    }

    fn parse_assign(&mut self) -> Result<Expr<'a>, SyntaxError> {
        let start = *self.look();
        let left = self.parse_or()?;
        if self.eat(TokenKind::Assign) {
            let right = self.parse_or()?;
            return Ok(self.binary(BinaryOp::Assign, left, right, &start));
        }
        Ok(left)
    }

    /// Parse one expression (assignment excluded).
    pub fn parse_expression(&mut self) -> Result<Expr<'a>, SyntaxError> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> Result<Expr<'a>, SyntaxError> {
        let start = *self.look();
        let mut left = self.parse_and()?;
        while self.eat(TokenKind::Or) {
            let right = self.parse_and()?;
            left = self.binary(BinaryOp::Or, left, right, &start);
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr<'a>, SyntaxError> {
        let start = *self.look();
        let mut left = self.parse_equality()?;
        while self.eat(TokenKind::And) {
            let right = self.parse_equality()?;
            left = self.binary(BinaryOp::And, left, right, &start);
        }
        Ok(left)
    }

    fn parse_equality(&mut self) -> Result<Expr<'a>, SyntaxError> {
        let start = *self.look();
        let mut left = self.parse_relation()?;
        loop {
            let op = match self.look().kind {
                TokenKind::EqualEqual => BinaryOp::Eq,
                TokenKind::BangEqual => BinaryOp::Ne,
                _ => break,
            };
            self.advance();
            let right = self.parse_relation()?;
            left = self.binary(op, left, right, &start);
        }
        Ok(left)
    }

    fn parse_relation(&mut self) -> Result<Expr<'a>, SyntaxError> {
        let start = *self.look();
        let left = self.parse_additive()?;
        let op = match self.look().kind {
            TokenKind::Less => BinaryOp::Lt,
            TokenKind::LessEqual => BinaryOp::Le,
            TokenKind::Greater => BinaryOp::Gt,
            TokenKind::GreaterEqual => BinaryOp::Ge,
            _ => return Ok(left),
        };
        self.advance();
        let right = self.parse_additive()?;
        Ok(self.binary(op, left, right, &start))
    }

    fn parse_additive(&mut self) -> Result<Expr<'a>, SyntaxError> {
        let start = *self.look();
        let mut left = self.parse_term()?;
        loop {
            let op = match self.look().kind {
                TokenKind::Plus => BinaryOp::Add,
                TokenKind::Minus => BinaryOp::Sub,
                _ => break,
            };
            self.advance();
            let right = self.parse_term()?;
            left = self.binary(op, left, right, &start);
        }
        Ok(left)
    }

    fn parse_term(&mut self) -> Result<Expr<'a>, SyntaxError> {
        let start = *self.look();
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.look().kind {
                TokenKind::Star => BinaryOp::Mul,
                TokenKind::Slash => BinaryOp::Div,
                TokenKind::Percent => BinaryOp::Mod,
                _ => break,
            };
            self.advance();
            let right = self.parse_unary()?;
            left = self.binary(op, left, right, &start);
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr<'a>, SyntaxError> {
        let start = *self.look();
        let op = match self.look().kind {
            TokenKind::Plus => UnaryOp::Plus,
            TokenKind::Minus => UnaryOp::Minus,
            TokenKind::Not => UnaryOp::Not,
            _ => return self.parse_postfix(),
        };
        self.advance();
        let operand = self.parse_unary()?;
        Ok(Expr::Unary(self.exprs.alloc(UnaryExpr {
            op,
            operand,
            target: &types::UNKNOWN,
            range: self.token_range(&start),
        })))
    }

    fn parse_postfix(&mut self) -> Result<Expr<'a>, SyntaxError> {
        let mut expr = self.parse_factor()?;
        while self.check(TokenKind::LeftParen) {
            let start = *self.look();
            let arguments = self.parse_arguments()?;
            expr = Expr::Call(self.exprs.alloc(CallExpr {
                function: expr,
                arguments,
                range: self.token_range(&start),
            }));
        }
        Ok(expr)
    }

    fn parse_arguments(&mut self) -> Result<&'a [Expr<'a>], SyntaxError> {
        self.expect(TokenKind::LeftParen)?;
        let mut arguments: Vec<Expr<'a>> = Vec::new();
        if !self.check(TokenKind::RightParen) {
            loop {
                arguments.push(self.parse_or()?);
                if !self.eat(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(TokenKind::RightParen)?;
        Ok(self.exprs.alloc_slice(&arguments))
    }

    fn parse_factor(&mut self) -> Result<Expr<'a>, SyntaxError> {
        let token = *self.look();
        match token.kind {
            TokenKind::LeftParen => {
                self.advance();
                let inner = self.parse_or()?;
                self.expect(TokenKind::RightParen)?;
                Ok(inner)
            }
            TokenKind::Integer => {
                self.advance();
                let value = token.text.parse::<i32>().map_err(|_| {
                    SyntaxError::new("integer literal out of range", self.token_range(&token))
                })?;
                Ok(self.constant(LiteralValue::Int32(value), &token))
            }
            TokenKind::Float => {
                self.advance();
                let value = token.text.parse::<f64>().map_err(|_| {
                    SyntaxError::new("malformed float literal", self.token_range(&token))
                })?;
                Ok(self.constant(LiteralValue::Float64(value), &token))
            }
            TokenKind::Character => {
                self.advance();
                let value = token.text.chars().next().ok_or_else(|| {
                    SyntaxError::new("empty character literal", self.token_range(&token))
                })?;
                Ok(self.constant(LiteralValue::Char(value), &token))
            }
            TokenKind::Str => {
                self.advance();
                Ok(self.constant(LiteralValue::Str(token.text), &token))
            }
            TokenKind::True => {
                self.advance();
                Ok(self.constant(LiteralValue::Boolean(true), &token))
            }
            TokenKind::False => {
                self.advance();
                Ok(self.constant(LiteralValue::Boolean(false), &token))
            }
            TokenKind::Identifier => {
                self.advance();
                let mut segments: Vec<&'a str> = vec![token.text];
                while self.eat(TokenKind::ColonColon) {
                    segments.push(self.expect(TokenKind::Identifier)?.text);
                }
                let (name, prefix) = match segments.split_last() {
                    Some((name, prefix)) => (*name, prefix),
                    None => (token.text, &[] as &[&'a str]),
                };
                Ok(Expr::Parameter(self.exprs.alloc(ParameterExpr {
                    prefix: self.exprs.alloc_slice(prefix),
                    name,
                    ty: &types::UNKNOWN,
                    range: self.token_range(&token),
                })))
            }
            other => Err(SyntaxError::new(
                format!("unexpected {}", other.describe()),
                self.token_range(&token),
            )),
        }
    }

    // ========================================================================
    // Token plumbing
    // ========================================================================

    fn look(&self) -> &Token<'a> {
        &self.tokens[self.offset.min(self.tokens.len() - 1)]
    }

    fn advance(&mut self) {
        if self.offset < self.tokens.len() - 1 {
            self.offset += 1;
        }
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.look().kind == kind
    }

    fn eat(&mut self, kind: TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind) -> Result<Token<'a>, SyntaxError> {
        let token = *self.look();
        if token.kind == kind {
            self.advance();
            Ok(token)
        } else {
            Err(SyntaxError::expected(
                kind.describe(),
                token.kind.describe(),
                self.token_range(&token),
            ))
        }
    }

    fn token_range(&self, token: &Token<'a>) -> SourceRange {
        SourceRange::new(
            Arc::clone(&self.file),
            token.line,
            token.col,
            token.line,
            token.col + token.text.chars().count() as u32,
        )
    }

    fn constant(&self, value: LiteralValue<'a>, token: &Token<'a>) -> Expr<'a> {
        Expr::Constant(self.exprs.alloc(ConstantExpr {
            value,
            range: self.token_range(token),
        }))
    }

    fn binary(
        &self,
        op: BinaryOp,
        left: Expr<'a>,
        right: Expr<'a>,
        start: &Token<'a>,
    ) -> Expr<'a> {
        Expr::Binary(self.exprs.alloc(BinaryExpr {
            op,
            left,
            right,
            range: self.token_range(start),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Lexer;

    fn with_parser<R>(source: &str, f: impl for<'a> FnOnce(&mut Parser<'a>) -> R) -> R {
        let exprs = ExprArena::new();
        let file = SourceFile::new("test.vela");
        let tokens = Lexer::new(source, file.clone(), &exprs).tokenize().unwrap();
        let mut parser = Parser::new(tokens, file, &exprs);
        f(&mut parser)
    }

    #[test]
    fn precedence_mul_binds_tighter_than_add() {
        with_parser("1 + 2 * 3", |p| {
            let expr = p.parse_expression().unwrap();
            let Expr::Binary(add) = expr else {
                panic!("expected binary");
            };
            assert_eq!(add.op, BinaryOp::Add);
            let Expr::Binary(mul) = add.right else {
                panic!("expected binary rhs");
            };
            assert_eq!(mul.op, BinaryOp::Mul);
        });
    }

    #[test]
    fn parenthesized_grouping() {
        with_parser("(1 + 2) * 3", |p| {
            let expr = p.parse_expression().unwrap();
            let Expr::Binary(mul) = expr else {
                panic!("expected binary");
            };
            assert_eq!(mul.op, BinaryOp::Mul);
        });
    }

    #[test]
    fn relational_below_equality() {
        with_parser("1 < 2 == true", |p| {
            let expr = p.parse_expression().unwrap();
            let Expr::Binary(eq) = expr else {
                panic!("expected binary");
            };
            assert_eq!(eq.op, BinaryOp::Eq);
            let Expr::Binary(lt) = eq.left else {
                panic!("expected relational lhs");
            };
            assert_eq!(lt.op, BinaryOp::Lt);
        });
    }

    #[test]
    fn scoped_identifier_splits_prefix() {
        with_parser("A::B::x", |p| {
            let expr = p.parse_expression().unwrap();
            let Expr::Parameter(param) = expr else {
                panic!("expected parameter");
            };
            assert_eq!(param.prefix, &["A", "B"]);
            assert_eq!(param.name, "x");
        });
    }

    #[test]
    fn call_with_arguments() {
        with_parser("f(1, 2.5)", |p| {
            let expr = p.parse_expression().unwrap();
            let Expr::Call(call) = expr else {
                panic!("expected call");
            };
            assert_eq!(call.arguments.len(), 2);
            assert!(matches!(call.function, Expr::Parameter(_)));
        });
    }

    #[test]
    fn statement_assignment() {
        with_parser("x = x + 1;", |p| {
            let stmt = p.parse_statement().unwrap();
            let Expr::Binary(assign) = stmt else {
                panic!("expected binary");
            };
            assert_eq!(assign.op, BinaryOp::Assign);
        });
    }

    #[test]
    fn if_without_else_gets_default_branch() {
        with_parser("if x < 1 { 0; }", |p| {
            let stmt = p.parse_statement().unwrap();
            let Expr::Conditional(cond) = stmt else {
                panic!("expected conditional");
            };
            assert!(matches!(cond.if_false, Expr::Default(_)));
        });
    }

    #[test]
    fn else_if_chains() {
        with_parser("if a { 1; } else if b { 2; } else { 3; }", |p| {
            let stmt = p.parse_statement().unwrap();
            let Expr::Conditional(outer) = stmt else {
                panic!("expected conditional");
            };
            assert!(matches!(outer.if_false, Expr::Conditional(_)));
        });
    }

    #[test]
    fn while_statement() {
        with_parser("while (i < 10) { i = i + 1; }", |p| {
            let stmt = p.parse_statement().unwrap();
            let Expr::WhileLoop(w) = stmt else {
                panic!("expected while");
            };
            assert!(matches!(w.condition, Expr::Binary(_)));
            assert!(matches!(w.body, Expr::Block(_)));
        });
    }

    #[test]
    fn var_with_declared_type() {
        with_parser("var x: Long = 0;", |p| {
            let stmt = p.parse_statement().unwrap();
            let Expr::VariableDeclaration(decl) = stmt else {
                panic!("expected declaration");
            };
            assert_eq!(decl.name, "x");
            assert_eq!(decl.ty, &types::INT64);
        });
    }

    #[test]
    fn var_without_type_is_unknown() {
        with_parser("var x = 1;", |p| {
            let stmt = p.parse_statement().unwrap();
            let Expr::VariableDeclaration(decl) = stmt else {
                panic!("expected declaration");
            };
            assert_eq!(decl.ty, &types::UNKNOWN);
        });
    }

    #[test]
    fn function_signature_and_body() {
        with_parser("func Square(x: Int): Int { x * x; }", |p| {
            let func = p.parse_function().unwrap();
            assert_eq!(func.name, "Square");
            assert_eq!(func.parameters.len(), 1);
            assert_eq!(func.parameters[0].ty, &types::INT32);
            assert_eq!(func.return_type, &types::INT32);
            assert!(!func.is_native());
            assert!(matches!(func.body, Expr::Block(_)));
        });
    }

    #[test]
    fn native_function_declaration() {
        with_parser(
            r#"@External(Library = "libm", EntryPoint = "sin") func sin(x: Double): Double;"#,
            |p| {
                let func = p.parse_function().unwrap();
                assert!(func.is_native());
                assert_eq!(func.annotations.len(), 1);
                assert_eq!(func.annotations[0].arguments.len(), 2);
                assert_eq!(func.annotations[0].arguments[0].value, "libm");
                // The placeholder body is the default of the return type.
                let Expr::Default(d) = func.body else {
                    panic!("expected default body");
                };
                assert_eq!(d.ty, &types::FLOAT64);
            },
        );
    }

    #[test]
    fn modules_nest() {
        with_parser("module A { module B { var x: Int = 5; } }", |p| {
            let tree = p.parse_program().unwrap();
            let b = tree.search(&["A", "B"]).unwrap();
            assert!(b.global("x").is_some());
        });
    }

    #[test]
    fn module_members_in_order() {
        with_parser(
            "module M { func First(): Void { } func Second(): Void { } }",
            |p| {
                let tree = p.parse_program().unwrap();
                let m = tree.search(&["M"]).unwrap();
                let names: Vec<&str> = m.functions().map(|f| f.name).collect();
                assert_eq!(names, vec!["First", "Second"]);
            },
        );
    }

    #[test]
    fn missing_semicolon_is_syntax_error() {
        with_parser("1 + 2", |p| {
            assert!(p.parse_statement().is_err());
        });
    }

    #[test]
    fn unknown_type_name_is_syntax_error() {
        with_parser("var x: Quux = 1;", |p| {
            assert!(p.parse_statement().is_err());
        });
    }

    #[test]
    fn unary_operators_parse() {
        with_parser("not -x", |p| {
            let expr = p.parse_expression().unwrap();
            let Expr::Unary(not) = expr else {
                panic!("expected unary");
            };
            assert_eq!(not.op, UnaryOp::Not);
            let Expr::Unary(neg) = not.operand else {
                panic!("expected nested unary");
            };
            assert_eq!(neg.op, UnaryOp::Minus);
        });
    }
}
