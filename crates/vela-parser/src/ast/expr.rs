//! Expression nodes of the IR.
//!
//! [`Expr`] is a `Copy` enum of references into the [`ExprArena`]; passing an
//! expression around copies a tag and a pointer, never a node. Node identity
//! (for the annotation maps built by the passes) is the address of the
//! arena-allocated payload, exposed as [`NodeId`].

use bumpalo::Bump;

use vela_core::{SourceRange, Type, TypeCode};

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
    Assign,
}

impl BinaryOp {
    /// The operator's source form.
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::And => "and",
            BinaryOp::Or => "or",
            BinaryOp::Assign => "=",
        }
    }
}

/// Unary operators. `Convert` carries its target type on the node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Not,
    Convert,
    Halt,
    Plus,
    Minus,
}

impl UnaryOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            UnaryOp::Not => "not",
            UnaryOp::Convert => "convert",
            UnaryOp::Halt => "halt",
            UnaryOp::Plus => "+",
            UnaryOp::Minus => "-",
        }
    }
}

/// A literal value with its width baked in.
#[derive(Debug, Clone, PartialEq)]
pub enum LiteralValue<'a> {
    Int32(i32),
    Int64(i64),
    Float32(f32),
    Float64(f64),
    Boolean(bool),
    Char(char),
    Str(&'a str),
}

impl LiteralValue<'_> {
    /// The basic type code this literal denotes.
    pub fn type_code(&self) -> TypeCode {
        match self {
            LiteralValue::Int32(_) => TypeCode::Int32,
            LiteralValue::Int64(_) => TypeCode::Int64,
            LiteralValue::Float32(_) => TypeCode::Float32,
            LiteralValue::Float64(_) => TypeCode::Float64,
            LiteralValue::Boolean(_) => TypeCode::Boolean,
            LiteralValue::Char(_) => TypeCode::Char,
            LiteralValue::Str(_) => TypeCode::String,
        }
    }
}

/// A literal constant.
#[derive(Debug)]
pub struct ConstantExpr<'a> {
    pub value: LiteralValue<'a>,
    pub range: SourceRange,
}

/// A name occurrence, optionally qualified with a `::` module prefix.
#[derive(Debug)]
pub struct ParameterExpr<'a> {
    pub prefix: &'a [&'a str],
    pub name: &'a str,
    /// Declared type; `Unknown` for plain references.
    pub ty: &'a Type<'a>,
    pub range: SourceRange,
}

/// `var name[: type] = initializer`
#[derive(Debug)]
pub struct VariableDeclarationExpr<'a> {
    pub name: &'a str,
    /// Declared type; `Unknown` requests inference.
    pub ty: &'a Type<'a>,
    pub initializer: Expr<'a>,
    pub range: SourceRange,
}

#[derive(Debug)]
pub struct BinaryExpr<'a> {
    pub op: BinaryOp,
    pub left: Expr<'a>,
    pub right: Expr<'a>,
    pub range: SourceRange,
}

#[derive(Debug)]
pub struct UnaryExpr<'a> {
    pub op: UnaryOp,
    pub operand: Expr<'a>,
    /// Conversion target for `Convert`; `Unknown` otherwise.
    pub target: &'a Type<'a>,
    pub range: SourceRange,
}

/// An ordered sequence of expressions; its value is the last one's.
#[derive(Debug)]
pub struct BlockExpr<'a> {
    pub expressions: &'a [Expr<'a>],
    pub range: SourceRange,
}

#[derive(Debug)]
pub struct ConditionalExpr<'a> {
    pub test: Expr<'a>,
    pub if_true: Expr<'a>,
    pub if_false: Expr<'a>,
    pub range: SourceRange,
}

#[derive(Debug)]
pub struct WhileExpr<'a> {
    pub condition: Expr<'a>,
    pub body: Expr<'a>,
    pub range: SourceRange,
}

#[derive(Debug)]
pub struct CallExpr<'a> {
    pub function: Expr<'a>,
    pub arguments: &'a [Expr<'a>],
    pub range: SourceRange,
}

/// A declared function parameter.
#[derive(Debug, Clone)]
pub struct ParamDecl<'a> {
    pub name: &'a str,
    pub ty: &'a Type<'a>,
    pub range: SourceRange,
}

/// One `name = "value"` pair inside an annotation.
#[derive(Debug, Clone)]
pub struct AnnotationArg<'a> {
    pub name: &'a str,
    pub value: &'a str,
    pub range: SourceRange,
}

/// Compile-time metadata attached to a function declaration.
#[derive(Debug, Clone)]
pub struct Annotation<'a> {
    pub name: &'a str,
    pub arguments: &'a [AnnotationArg<'a>],
    pub range: SourceRange,
}

/// A named function. Every function in a namespace is one of these, including
/// the synthesized global-variable initializers.
#[derive(Debug)]
pub struct LambdaExpr<'a> {
    pub name: &'a str,
    pub parameters: &'a [ParamDecl<'a>],
    pub return_type: &'a Type<'a>,
    pub body: Expr<'a>,
    pub annotations: &'a [Annotation<'a>],
    pub range: SourceRange,
}

impl LambdaExpr<'_> {
    /// Whether this function is a native binding (`@External`).
    pub fn is_native(&self) -> bool {
        self.annotations.iter().any(|a| a.name == "External")
    }
}

/// The "zero" value of a type.
#[derive(Debug)]
pub struct DefaultExpr<'a> {
    pub ty: &'a Type<'a>,
    pub range: SourceRange,
}

/// An expression node: a tag plus a reference into the arena.
#[derive(Debug, Clone, Copy)]
pub enum Expr<'a> {
    Constant(&'a ConstantExpr<'a>),
    Parameter(&'a ParameterExpr<'a>),
    VariableDeclaration(&'a VariableDeclarationExpr<'a>),
    Binary(&'a BinaryExpr<'a>),
    Unary(&'a UnaryExpr<'a>),
    Block(&'a BlockExpr<'a>),
    Conditional(&'a ConditionalExpr<'a>),
    WhileLoop(&'a WhileExpr<'a>),
    Call(&'a CallExpr<'a>),
    Lambda(&'a LambdaExpr<'a>),
    Default(&'a DefaultExpr<'a>),
}

impl<'a> Expr<'a> {
    pub fn range(&self) -> &SourceRange {
        match self {
            Expr::Constant(e) => &e.range,
            Expr::Parameter(e) => &e.range,
            Expr::VariableDeclaration(e) => &e.range,
            Expr::Binary(e) => &e.range,
            Expr::Unary(e) => &e.range,
            Expr::Block(e) => &e.range,
            Expr::Conditional(e) => &e.range,
            Expr::WhileLoop(e) => &e.range,
            Expr::Call(e) => &e.range,
            Expr::Lambda(e) => &e.range,
            Expr::Default(e) => &e.range,
        }
    }

    /// Stable identity of this node for the pass-side annotation maps.
    pub fn node_id(&self) -> NodeId {
        match self {
            Expr::Constant(e) => NodeId::of(*e),
            Expr::Parameter(e) => NodeId::of(*e),
            Expr::VariableDeclaration(e) => NodeId::of(*e),
            Expr::Binary(e) => NodeId::of(*e),
            Expr::Unary(e) => NodeId::of(*e),
            Expr::Block(e) => NodeId::of(*e),
            Expr::Conditional(e) => NodeId::of(*e),
            Expr::WhileLoop(e) => NodeId::of(*e),
            Expr::Call(e) => NodeId::of(*e),
            Expr::Lambda(e) => NodeId::of(*e),
            Expr::Default(e) => NodeId::of(*e),
        }
    }
}

/// Identity of an arena-allocated node.
///
/// Arena nodes never move, so the payload address identifies a node for the
/// lifetime of the compilation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

impl NodeId {
    pub fn of<T>(node: &T) -> Self {
        Self(std::ptr::from_ref(node) as usize)
    }
}

/// Arena owning every IR node of one compilation.
#[derive(Default)]
pub struct ExprArena {
    bump: Bump,
}

impl ExprArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a node and return a shared reference to it.
    pub fn alloc<T>(&self, node: T) -> &T {
        self.bump.alloc(node)
    }

    /// Copy a string into the arena.
    pub fn alloc_str(&self, text: &str) -> &str {
        self.bump.alloc_str(text)
    }

    /// Copy a slice of `Copy` items into the arena.
    pub fn alloc_slice<T: Copy>(&self, items: &[T]) -> &[T] {
        self.bump.alloc_slice_copy(items)
    }

    /// Clone a slice of items into the arena.
    pub fn alloc_slice_clone<T: Clone>(&self, items: &[T]) -> &[T] {
        self.bump.alloc_slice_clone(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vela_core::SourceFile;

    fn range() -> SourceRange {
        SourceRange::point(SourceFile::new("t.vela"), 1, 1)
    }

    #[test]
    fn node_ids_distinguish_occurrences() {
        let arena = ExprArena::new();
        let a = arena.alloc(ConstantExpr {
            value: LiteralValue::Int32(1),
            range: range(),
        });
        let b = arena.alloc(ConstantExpr {
            value: LiteralValue::Int32(1),
            range: range(),
        });
        assert_ne!(NodeId::of(a), NodeId::of(b));
        assert_eq!(NodeId::of(a), Expr::Constant(a).node_id());
    }

    #[test]
    fn literal_type_codes() {
        assert_eq!(LiteralValue::Int32(0).type_code(), TypeCode::Int32);
        assert_eq!(LiteralValue::Boolean(true).type_code(), TypeCode::Boolean);
        assert_eq!(LiteralValue::Str("x").type_code(), TypeCode::String);
        assert_eq!(LiteralValue::Char('c').type_code(), TypeCode::Char);
    }

    #[test]
    fn native_detection_via_annotation() {
        let arena = ExprArena::new();
        let args = [AnnotationArg {
            name: "Library",
            value: "libm",
            range: range(),
        }];
        let annotations = [Annotation {
            name: "External",
            arguments: arena.alloc_slice_clone(&args),
            range: range(),
        }];
        let body = Expr::Default(arena.alloc(DefaultExpr {
            ty: &vela_core::types::EMPTY,
            range: range(),
        }));
        let lambda = LambdaExpr {
            name: "sin",
            parameters: &[],
            return_type: &vela_core::types::FLOAT64,
            body,
            annotations: arena.alloc_slice_clone(&annotations),
            range: range(),
        };
        assert!(lambda.is_native());
    }

    #[test]
    fn operator_symbols() {
        assert_eq!(BinaryOp::Assign.symbol(), "=");
        assert_eq!(BinaryOp::Mod.symbol(), "%");
        assert_eq!(UnaryOp::Minus.symbol(), "-");
    }
}
