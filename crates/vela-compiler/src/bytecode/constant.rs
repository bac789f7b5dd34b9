//! Per-function constant pool entries.
//!
//! Each function owns a private pool referenced by one-byte indices in its
//! byte stream. Entries are appended in emission order and never
//! deduplicated; two occurrences of the same literal take two slots.

use num_enum::{IntoPrimitive, TryFromPrimitive};

/// Serialization tag of a pool entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum ConstantKind {
    I32 = 0,
    I64,
    F32,
    F64,
    String,
    Function,
    NativeFunction,
}

/// A constant pool entry.
#[derive(Debug, Clone, PartialEq)]
pub enum Constant {
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
    /// UTF-8 string data.
    String(String),
    /// Index into the program's function table.
    Function(i32),
    /// Index into the program's native-function table.
    NativeFunction(i32),
}

impl Constant {
    pub fn kind(&self) -> ConstantKind {
        match self {
            Constant::I32(_) => ConstantKind::I32,
            Constant::I64(_) => ConstantKind::I64,
            Constant::F32(_) => ConstantKind::F32,
            Constant::F64(_) => ConstantKind::F64,
            Constant::String(_) => ConstantKind::String,
            Constant::Function(_) => ConstantKind::Function,
            Constant::NativeFunction(_) => ConstantKind::NativeFunction,
        }
    }
}
