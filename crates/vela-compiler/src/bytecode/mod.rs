//! Bytecode types: the instruction set, the write-only byte buffer, the
//! per-function constant pool and the program container.

mod buffer;
mod constant;
mod opcode;
mod program;

pub use buffer::{ByteCode, Label};
pub use constant::{Constant, ConstantKind};
pub use opcode::OpCode;
pub use program::{Function, GlobalVariable, NativeFunction, NativeLibrary, Program};
