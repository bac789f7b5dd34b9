//! The Vela type model.
//!
//! Types form a small sum: nine basic types plus arrays, callables and
//! unions. Basic types are interned as statics; composite types live in a
//! [`TypeArena`] and are handed out as shared references, so equality over the
//! tree is structural and allocation-free to compare.

use bumpalo::Bump;
use std::fmt;

/// Discriminant of a [`Type`], used where only the kind matters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeCode {
    Unknown,
    Empty,
    Boolean,
    Char,
    Int32,
    Int64,
    Float32,
    Float64,
    String,
    Array,
    Callable,
    Union,
}

/// A Vela type.
#[derive(Debug)]
pub enum Type<'a> {
    /// Not yet known; to be inferred or rejected.
    Unknown,
    /// The void type.
    Empty,
    Boolean,
    /// A 32-bit Unicode code point.
    Char,
    Int32,
    Int64,
    Float32,
    Float64,
    String,
    Array(&'a Type<'a>),
    Callable {
        params: &'a [&'a Type<'a>],
        ret: &'a Type<'a>,
    },
    /// Unordered, deduplicated member set.
    Union(&'a [&'a Type<'a>]),
}

pub static UNKNOWN: Type<'static> = Type::Unknown;
pub static EMPTY: Type<'static> = Type::Empty;
pub static BOOLEAN: Type<'static> = Type::Boolean;
pub static CHAR: Type<'static> = Type::Char;
pub static INT32: Type<'static> = Type::Int32;
pub static INT64: Type<'static> = Type::Int64;
pub static FLOAT32: Type<'static> = Type::Float32;
pub static FLOAT64: Type<'static> = Type::Float64;
pub static STRING: Type<'static> = Type::String;

impl<'a> Type<'a> {
    /// The interned instance of a basic type.
    ///
    /// Composite codes have no single instance and are not valid here.
    pub fn basic(code: TypeCode) -> &'static Type<'static> {
        match code {
            TypeCode::Unknown => &UNKNOWN,
            TypeCode::Empty => &EMPTY,
            TypeCode::Boolean => &BOOLEAN,
            TypeCode::Char => &CHAR,
            TypeCode::Int32 => &INT32,
            TypeCode::Int64 => &INT64,
            TypeCode::Float32 => &FLOAT32,
            TypeCode::Float64 => &FLOAT64,
            TypeCode::String => &STRING,
            TypeCode::Array | TypeCode::Callable | TypeCode::Union => {
                unreachable!("composite type codes are not interned")
            }
        }
    }

    /// The discriminant of this type.
    pub fn code(&self) -> TypeCode {
        match self {
            Type::Unknown => TypeCode::Unknown,
            Type::Empty => TypeCode::Empty,
            Type::Boolean => TypeCode::Boolean,
            Type::Char => TypeCode::Char,
            Type::Int32 => TypeCode::Int32,
            Type::Int64 => TypeCode::Int64,
            Type::Float32 => TypeCode::Float32,
            Type::Float64 => TypeCode::Float64,
            Type::String => TypeCode::String,
            Type::Array(_) => TypeCode::Array,
            Type::Callable { .. } => TypeCode::Callable,
            Type::Union(_) => TypeCode::Union,
        }
    }

    /// One of the four machine-numeric types.
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            Type::Int32 | Type::Int64 | Type::Float32 | Type::Float64
        )
    }

    /// Numeric, Boolean or Char: the domain of `Convert`.
    pub fn is_convertible_scalar(&self) -> bool {
        self.is_numeric() || matches!(self, Type::Boolean | Type::Char)
    }
}

impl PartialEq for Type<'_> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Type::Array(a), Type::Array(b)) => a == b,
            (
                Type::Callable {
                    params: pa,
                    ret: ra,
                },
                Type::Callable {
                    params: pb,
                    ret: rb,
                },
            ) => pa.len() == pb.len() && pa.iter().zip(pb.iter()).all(|(a, b)| a == b) && ra == rb,
            // Union members are a set: equal when sizes match and every
            // member of one occurs in the other.
            (Type::Union(a), Type::Union(b)) => {
                a.len() == b.len() && a.iter().all(|t| b.iter().any(|u| t == u))
            }
            (a, b) => std::mem::discriminant(a) == std::mem::discriminant(b),
        }
    }
}

impl Eq for Type<'_> {}

impl fmt::Display for Type<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Unknown => write!(f, "?"),
            Type::Empty => write!(f, "Void"),
            Type::Boolean => write!(f, "Bool"),
            Type::Char => write!(f, "Char"),
            Type::Int32 => write!(f, "Int"),
            Type::Int64 => write!(f, "Long"),
            Type::Float32 => write!(f, "Float"),
            Type::Float64 => write!(f, "Double"),
            Type::String => write!(f, "String"),
            Type::Array(elem) => write!(f, "{elem}[]"),
            Type::Callable { params, ret } => {
                write!(f, "(")?;
                for (i, p) in params.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{p}")?;
                }
                write!(f, ") -> {ret}")
            }
            Type::Union(members) => {
                for (i, m) in members.iter().enumerate() {
                    if i > 0 {
                        write!(f, " | ")?;
                    }
                    write!(f, "{m}")?;
                }
                Ok(())
            }
        }
    }
}

/// Arena for composite types.
///
/// All composite types created during one compilation live here and die
/// together when compilation ends.
#[derive(Default)]
pub struct TypeArena {
    bump: Bump,
}

impl TypeArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// An array of `elem`.
    pub fn array<'a>(&'a self, elem: &'a Type<'a>) -> &'a Type<'a> {
        self.bump.alloc(Type::Array(elem))
    }

    /// A callable taking `params` and returning `ret`.
    pub fn callable<'a>(&'a self, params: &[&'a Type<'a>], ret: &'a Type<'a>) -> &'a Type<'a> {
        let params = self.bump.alloc_slice_copy(params);
        self.bump.alloc(Type::Callable { params, ret })
    }

    /// The union of `a` and `b`.
    ///
    /// Returns `a` unchanged when the two are structurally equal; otherwise
    /// flattens any union operands and deduplicates the members.
    pub fn union_of<'a>(&'a self, a: &'a Type<'a>, b: &'a Type<'a>) -> &'a Type<'a> {
        if a == b {
            return a;
        }
        let mut members: Vec<&'a Type<'a>> = Vec::new();
        for operand in [a, b] {
            match operand {
                Type::Union(inner) => {
                    for m in inner.iter() {
                        push_unique(&mut members, m);
                    }
                }
                other => push_unique(&mut members, other),
            }
        }
        let members = self.bump.alloc_slice_copy(&members);
        self.bump.alloc(Type::Union(members))
    }
}

fn push_unique<'a>(members: &mut Vec<&'a Type<'a>>, candidate: &'a Type<'a>) {
    if !members.iter().any(|m| *m == candidate) {
        members.push(candidate);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_types_are_interned() {
        assert!(std::ptr::eq(
            Type::basic(TypeCode::Int32),
            Type::basic(TypeCode::Int32)
        ));
        assert_eq!(Type::basic(TypeCode::Boolean).code(), TypeCode::Boolean);
    }

    #[test]
    fn callable_equality_is_ordered() {
        let arena = TypeArena::new();
        let a = arena.callable(&[&INT32, &FLOAT64], &INT32);
        let b = arena.callable(&[&INT32, &FLOAT64], &INT32);
        let c = arena.callable(&[&FLOAT64, &INT32], &INT32);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn union_equality_is_unordered() {
        let arena = TypeArena::new();
        let a = arena.union_of(&INT32, &BOOLEAN);
        let b = arena.union_of(&BOOLEAN, &INT32);
        assert_eq!(a, b);
    }

    #[test]
    fn union_of_equal_types_is_identity() {
        let arena = TypeArena::new();
        let u = arena.union_of(&INT32, &INT32);
        assert!(std::ptr::eq(u, &INT32 as &Type));
    }

    #[test]
    fn union_flattens_and_deduplicates() {
        let arena = TypeArena::new();
        let ab = arena.union_of(&INT32, &BOOLEAN);
        let abc = arena.union_of(ab, &FLOAT64);
        match abc {
            Type::Union(members) => assert_eq!(members.len(), 3),
            other => panic!("expected union, got {other:?}"),
        }
        // Re-adding an existing member changes nothing.
        let again = arena.union_of(abc, &BOOLEAN);
        assert_eq!(abc, again);
    }

    #[test]
    fn union_size_mismatch_is_unequal() {
        let arena = TypeArena::new();
        let ab = arena.union_of(&INT32, &BOOLEAN);
        let abc = arena.union_of(ab, &FLOAT64);
        assert_ne!(ab, abc);
    }

    #[test]
    fn array_equality_is_elementwise() {
        let arena = TypeArena::new();
        assert_eq!(arena.array(&INT32), arena.array(&INT32));
        assert_ne!(arena.array(&INT32), arena.array(&INT64));
    }

    #[test]
    fn display_forms() {
        let arena = TypeArena::new();
        let callable = arena.callable(&[&FLOAT64, &FLOAT64], &FLOAT64);
        assert_eq!(format!("{callable}"), "(Double, Double) -> Double");
        let union = arena.union_of(&FLOAT64, &BOOLEAN);
        assert_eq!(format!("{union}"), "Double | Bool");
    }

    #[test]
    fn convertible_scalars() {
        assert!(INT32.is_convertible_scalar());
        assert!(BOOLEAN.is_convertible_scalar());
        assert!(CHAR.is_convertible_scalar());
        assert!(!STRING.is_convertible_scalar());
        assert!(!EMPTY.is_convertible_scalar());
    }
}
