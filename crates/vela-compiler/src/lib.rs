//! Semantic analysis and code generation for Vela.
//!
//! The pipeline annotates one shared IR tree in three passes:
//!
//! 1. **Type check** ([`TypeChecker`]) - assigns a type to every reachable
//!    expression and validates static constraints. Also desugars global
//!    variable initializers into synthesized `<name>#Initializer` functions.
//! 2. **Name location** ([`NameLocator`]) - assigns every declared name a
//!    location descriptor (global slot, function index, native-function
//!    index, or local slot) and counts locals per function.
//! 3. **Emit** ([`Emitter`]) - walks each function body and produces the
//!    bytecode [`Program`] for the stack VM.
//!
//! The passes are strictly ordered and each one mutates only its own
//! annotation map; the IR and namespace tree are read-only after parsing
//! (with the single, documented exception of the initializer desugaring).

pub mod bytecode;
pub mod emit;
pub mod locator;
pub mod scope;
pub mod typeck;

pub use bytecode::{
    ByteCode, Constant, Function, GlobalVariable, Label, NativeFunction, NativeLibrary, OpCode,
    Program,
};
pub use emit::Emitter;
pub use locator::{LocationKind, NameInfo, NameLocator, NameScope};
pub use scope::Scope;
pub use typeck::{TypeChecker, TypeScope};
