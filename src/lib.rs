//! The Vela compiler.
//!
//! Vela is a small statically-typed imperative language compiled to bytecode
//! for a register-less stack VM. This crate wires the stages together:
//! lexing and parsing ([`vela_parser`]), type checking, name location and
//! emission ([`vela_compiler`]).
//!
//! ```
//! let program = vela::compile(
//!     "module M { func Main(): Int { 0; } }",
//!     "demo.vela",
//! )
//! .unwrap();
//! assert_eq!(program.functions.len(), 1);
//! ```

use vela_compiler::{
    Emitter, Function, GlobalVariable, NameLocator, NameScope, NativeFunction, Program,
    TypeChecker, TypeScope,
};
use vela_core::{CompileError, EmitError, SourceFile, SourceRange, TypeArena};
use vela_parser::ast::ExprArena;

pub use vela_compiler as compiler;
pub use vela_compiler::OpCode;
pub use vela_core as core;
pub use vela_parser as parser;

/// Compile one source file into a bytecode program.
///
/// The stages run strictly in order and stop at the first diagnostic:
/// parse, type check, name location, emission.
pub fn compile(source: &str, file_name: &str) -> Result<Program, CompileError> {
    let exprs = ExprArena::new();
    let types = TypeArena::new();
    compile_in(source, file_name, &exprs, &types)
}

/// Compile against caller-provided arenas.
///
/// Useful when the caller wants to keep the IR alive alongside the program.
pub fn compile_in<'a>(
    source: &str,
    file_name: &str,
    exprs: &'a ExprArena,
    types: &'a TypeArena,
) -> Result<Program, CompileError> {
    let mut tree = vela_parser::parse_source(source, file_name, exprs)?;

    let mut checker = TypeChecker::new(types, exprs);
    let mut type_scope = TypeScope::new();
    checker.check_namespace(&mut tree, &mut type_scope)?;

    let mut locator = NameLocator::new();
    let mut name_scope = NameScope::new();
    locator.locate_namespace(&tree, &mut name_scope)?;

    let mut globals: Vec<Option<GlobalVariable>> =
        vec![None; locator.global_variable_count().max(0) as usize];
    let mut functions: Vec<Option<Function>> =
        vec![None; locator.global_function_count().max(0) as usize];
    let mut natives: Vec<Option<NativeFunction>> =
        vec![None; locator.global_native_function_count().max(0) as usize];

    let mut emitter = Emitter::new(&checker, &locator);
    emitter.compile_namespace(tree.root(), &mut globals, &mut functions, &mut natives)?;
    let entry_point = emitter.entry_point()?;

    Ok(Program {
        globals: collect_slots(globals, file_name)?,
        strings: Vec::new(),
        functions: collect_slots(functions, file_name)?,
        libraries: emitter.native_libraries(),
        native_functions: collect_slots(natives, file_name)?,
        entry_point: entry_point as u16,
    })
}

fn collect_slots<T>(slots: Vec<Option<T>>, file_name: &str) -> Result<Vec<T>, CompileError> {
    let expected = slots.len();
    let filled: Vec<T> = slots.into_iter().flatten().collect();
    if filled.len() == expected {
        Ok(filled)
    } else {
        Err(EmitError::Unsupported {
            message: "a declared slot was never compiled".to_string(),
            range: SourceRange::point(SourceFile::new(file_name), 0, 0),
        }
        .into())
    }
}
