//! The emit pass: annotated IR to bytecode.
//!
//! For each function the emitter walks the body once, choosing
//! width-specific opcodes from the type map and slot numbers from the
//! name-info map, and builds a private constant pool as it goes. Native
//! functions skip body emission entirely; their `@External` annotation is
//! resolved against the program-wide library table instead.
//!
//! Forward jumps are emitted as two-byte placeholders and back-patched once
//! the branch target's offset is known.

use indexmap::IndexSet;

use vela_core::{CompileError, EmitError, SourceRange, Type, TypeCode};
use vela_parser::ast::{
    AnnotationArg, BinaryOp, Expr, LambdaExpr, LiteralValue, Namespace, NodeId, ParameterExpr,
    UnaryOp, VariableDeclarationExpr,
};

use crate::bytecode::{
    ByteCode, Constant, Function, GlobalVariable, NativeFunction, NativeLibrary, OpCode,
};
use crate::locator::{LocationKind, NameInfo, NameLocator};
use crate::typeck::TypeChecker;

/// The bytecode emitter.
pub struct Emitter<'c, 'a> {
    types: &'c TypeChecker<'a>,
    names: &'c NameLocator,
    main_index: Option<i32>,
    libraries: IndexSet<String>,
}

impl<'c, 'a> Emitter<'c, 'a> {
    pub fn new(types: &'c TypeChecker<'a>, names: &'c NameLocator) -> Self {
        Self {
            types,
            names,
            main_index: None,
            libraries: IndexSet::new(),
        }
    }

    /// Compile every function of `ns` (and its children) into its assigned
    /// slot of the output tables.
    pub fn compile_namespace(
        &mut self,
        ns: &Namespace<'a>,
        globals: &mut [Option<GlobalVariable>],
        functions: &mut [Option<Function>],
        natives: &mut [Option<NativeFunction>],
    ) -> Result<(), CompileError> {
        for func in ns.functions() {
            if func.is_native() {
                let native = self.compile_native_function(func)?;
                let index = self
                    .info(NodeId::of(func), LocationKind::NativeFunction, &func.range)?
                    .number;
                set_slot(natives, index, native, &func.range)?;
            } else {
                let compiled = self.compile_function(func)?;
                let index = self
                    .info(NodeId::of(func), LocationKind::Function, &func.range)?
                    .number;
                if func.name == "Main" {
                    if self.main_index.is_some() {
                        return Err(EmitError::DuplicateMain {
                            range: func.range.clone(),
                        }
                        .into());
                    }
                    self.main_index = Some(index);
                }
                set_slot(functions, index, compiled, &func.range)?;
            }
        }

        for var in ns.globals() {
            let index = self
                .info(NodeId::of(var), LocationKind::GlobalVariable, &var.range)?
                .number;
            set_slot(
                globals,
                index,
                GlobalVariable {
                    name: var.name.to_string(),
                },
                &var.range,
            )?;
        }

        for (name, child) in ns.children() {
            self.compile_namespace(child, globals, functions, natives)?;
            tracing::info!(module = name.as_str(), "finished compiling module");
        }
        Ok(())
    }

    /// Compile one non-native function body.
    ///
    /// The terminator is `HALT` for `Main`, otherwise the `RETURN` variant
    /// matching the declared return type.
    pub fn compile_function(&mut self, lambda: &'a LambdaExpr<'a>) -> Result<Function, CompileError> {
        tracing::info!(function = lambda.name, "compiling function");
        let mut code = ByteCode::new();
        let mut pool: Vec<Constant> = Vec::new();
        self.emit(lambda.body, &mut code, &mut pool)?;

        if lambda.name == "Main" {
            code.push_op(OpCode::Halt);
        } else {
            let op = match lambda.return_type.code() {
                TypeCode::Empty => OpCode::Return,
                TypeCode::Int32 | TypeCode::Boolean | TypeCode::Char => OpCode::ReturnI32,
                TypeCode::Int64 => OpCode::ReturnI64,
                TypeCode::Float32 => OpCode::ReturnF32,
                TypeCode::Float64 => OpCode::ReturnF64,
                _ => OpCode::ReturnObject,
            };
            code.push_op(op);
        }

        let total_locals = self
            .info(
                NodeId::of(lambda),
                LocationKind::FunctionVariableCount,
                &lambda.range,
            )?
            .number;
        let args = lambda.parameters.len();
        let locals = u8::try_from(total_locals - args as i32).map_err(|_| {
            CompileError::from(EmitError::Unsupported {
                message: "too many local variables".to_string(),
                range: lambda.range.clone(),
            })
        })?;
        tracing::info!(function = lambda.name, "finished compiling function");
        Ok(Function {
            name: lambda.name.to_string(),
            args: args as u8,
            locals,
            constants: pool,
            code,
        })
    }

    /// Resolve a native declaration's `@External(Library, EntryPoint)` into
    /// a native-function record, growing the library table on first use of a
    /// library.
    pub fn compile_native_function(
        &mut self,
        lambda: &'a LambdaExpr<'a>,
    ) -> Result<NativeFunction, CompileError> {
        let mut library: Option<&AnnotationArg<'a>> = None;
        let mut entry_point: Option<&AnnotationArg<'a>> = None;
        for annotation in lambda.annotations.iter().filter(|a| a.name == "External") {
            for arg in annotation.arguments {
                match arg.name {
                    "Library" => {
                        if library.is_some() {
                            return Err(annotation_duplicate("Library", arg).into());
                        }
                        library = Some(arg);
                    }
                    "EntryPoint" => {
                        if entry_point.is_some() {
                            return Err(annotation_duplicate("EntryPoint", arg).into());
                        }
                        entry_point = Some(arg);
                    }
                    _ => {}
                }
            }
        }
        let library = library.ok_or_else(|| annotation_missing("Library", lambda))?;
        let entry_point = entry_point.ok_or_else(|| annotation_missing("EntryPoint", lambda))?;

        let (library_index, _) = self.libraries.insert_full(library.value.to_string());
        Ok(NativeFunction {
            entry_point: entry_point.value.to_string(),
            args: lambda.parameters.len() as u8,
            library: library_index as u8,
        })
    }

    /// Index of `Main` in the function table.
    pub fn entry_point(&self) -> Result<i32, EmitError> {
        self.main_index.ok_or(EmitError::MissingMain)
    }

    /// The accumulated native-library table, in first-use order.
    pub fn native_libraries(&self) -> Vec<NativeLibrary> {
        self.libraries
            .iter()
            .map(|name| NativeLibrary { name: name.clone() })
            .collect()
    }

    // ========================================================================
    // Expression emission
    // ========================================================================

    fn emit(
        &mut self,
        expr: Expr<'a>,
        code: &mut ByteCode,
        pool: &mut Vec<Constant>,
    ) -> Result<(), CompileError> {
        match expr {
            Expr::Constant(c) => self.emit_constant(&c.value, &c.range, code, pool),
            Expr::Parameter(p) => self.emit_parameter(expr, p, code),
            Expr::VariableDeclaration(v) => self.emit_variable_declaration(expr, v, code, pool),
            Expr::Binary(b) => {
                self.emit(b.left, code, pool)?;
                self.emit(b.right, code, pool)?;
                if b.op == BinaryOp::Assign {
                    return Err(EmitError::UnsupportedOperator {
                        op: b.op.symbol().to_string(),
                        range: b.range.clone(),
                    }
                    .into());
                }
                let left = self.checked_type(b.left)?;
                let right = self.checked_type(b.right)?;
                if left.code() != right.code() {
                    return Err(EmitError::OperandMismatch {
                        range: b.range.clone(),
                    }
                    .into());
                }
                code.push_op(binary_opcode(b.op, left, &b.range)?);
                Ok(())
            }
            Expr::Unary(u) => match u.op {
                UnaryOp::Halt => {
                    self.emit(u.operand, code, pool)?;
                    code.push_op(OpCode::Halt);
                    Ok(())
                }
                UnaryOp::Convert => {
                    self.emit(u.operand, code, pool)?;
                    let from = self.checked_type(u.operand)?;
                    if let Some(op) = cast_opcode(from.code(), u.target.code(), &u.range)? {
                        code.push_op(op);
                    }
                    Ok(())
                }
                UnaryOp::Not | UnaryOp::Plus | UnaryOp::Minus => {
                    Err(EmitError::UnsupportedOperator {
                        op: u.op.symbol().to_string(),
                        range: u.range.clone(),
                    }
                    .into())
                }
            },
            Expr::Block(b) => {
                for e in b.expressions {
                    self.emit(*e, code, pool)?;
                }
                Ok(())
            }
            Expr::Conditional(c) => {
                self.emit(c.test, code, pool)?;
                code.push_op(OpCode::JumpIfFalse);
                let else_slot = code.reserve_i16();
                self.emit(c.if_true, code, pool)?;
                code.push_op(OpCode::Jump);
                let end_slot = code.reserve_i16();
                self.emit(c.if_false, code, pool)?;
                let end = code.len();

                let to_else = to_i16(
                    end_slot.offset() as i64 - else_slot.offset() as i64,
                    &c.range,
                )?;
                code.patch_i16(else_slot, to_else);
                let to_end = to_i16(end as i64 - (end_slot.offset() as i64 + 2), &c.range)?;
                code.patch_i16(end_slot, to_end);
                Ok(())
            }
            Expr::WhileLoop(w) => {
                let loop_start = code.mark();
                self.emit(w.condition, code, pool)?;
                code.push_op(OpCode::JumpIfFalse);
                let exit_slot = code.reserve_i16();
                self.emit(w.body, code, pool)?;
                code.push_op(OpCode::Jump);
                let back_edge = to_i16(
                    code.len() as i64 + 2 - loop_start.offset() as i64,
                    &w.range,
                )?;
                code.push_i16(back_edge);
                let exit = to_i16(
                    code.len() as i64 - (loop_start.offset() as i64 + 2),
                    &w.range,
                )?;
                code.patch_i16(exit_slot, exit);
                Ok(())
            }
            Expr::Call(c) => {
                for arg in c.arguments {
                    self.emit(*arg, code, pool)?;
                }
                let Expr::Parameter(callee) = c.function else {
                    return Err(EmitError::CalleeNotIdentifier {
                        range: c.range.clone(),
                    }
                    .into());
                };
                let id = NodeId::of(callee);
                if let Some(info) = self.names.name_info(id, LocationKind::Function) {
                    code.push_op(OpCode::InvokeFunction);
                    code.push_byte(pool_index(pool, &c.range)?);
                    pool.push(Constant::Function(info.number));
                    Ok(())
                } else if let Some(info) =
                    self.names.name_info(id, LocationKind::NativeFunction)
                {
                    code.push_op(OpCode::InvokeNativeFunction);
                    code.push_byte(pool_index(pool, &c.range)?);
                    pool.push(Constant::NativeFunction(info.number));
                    Ok(())
                } else {
                    Err(EmitError::CalleeNotIdentifier {
                        range: c.range.clone(),
                    }
                    .into())
                }
            }
            Expr::Lambda(l) => Err(EmitError::Unsupported {
                message: "nested function definitions cannot be compiled".to_string(),
                range: l.range.clone(),
            }
            .into()),
            Expr::Default(d) => {
                let op = match d.ty.code() {
                    TypeCode::Empty | TypeCode::Boolean | TypeCode::Char | TypeCode::Int32 => {
                        OpCode::PushI32Zero
                    }
                    TypeCode::Int64 => OpCode::PushI64Zero,
                    TypeCode::Float32 => OpCode::PushF32Zero,
                    TypeCode::Float64 => OpCode::PushF64Zero,
                    _ => {
                        return Err(EmitError::UnsupportedType {
                            ty: d.ty.to_string(),
                            range: d.range.clone(),
                        }
                        .into());
                    }
                };
                code.push_op(op);
                Ok(())
            }
        }
    }

    /// Literal encoding. Small integers avoid the pool: 0 and 1 have
    /// dedicated opcodes, one-byte values ride inline; everything else goes
    /// through a pool slot. Strings always use the pool.
    fn emit_constant(
        &mut self,
        value: &LiteralValue<'a>,
        range: &SourceRange,
        code: &mut ByteCode,
        pool: &mut Vec<Constant>,
    ) -> Result<(), CompileError> {
        match value {
            LiteralValue::Int32(v) => self.emit_i32_literal(*v, range, code, pool),
            LiteralValue::Char(c) => self.emit_i32_literal(*c as i32, range, code, pool),
            LiteralValue::Boolean(b) => {
                code.push_op(if *b {
                    OpCode::PushI32One
                } else {
                    OpCode::PushI32Zero
                });
                Ok(())
            }
            LiteralValue::Int64(v) => {
                if *v == 0 {
                    code.push_op(OpCode::PushI64Zero);
                } else if *v == 1 {
                    code.push_op(OpCode::PushI64One);
                } else {
                    code.push_op(OpCode::PushI64);
                    code.push_byte(pool_index(pool, range)?);
                    pool.push(Constant::I64(*v));
                }
                Ok(())
            }
            LiteralValue::Float32(v) => {
                if *v == 0.0 {
                    code.push_op(OpCode::PushF32Zero);
                } else if *v == 1.0 {
                    code.push_op(OpCode::PushF32One);
                } else {
                    code.push_op(OpCode::PushF32);
                    code.push_byte(pool_index(pool, range)?);
                    pool.push(Constant::F32(*v));
                }
                Ok(())
            }
            LiteralValue::Float64(v) => {
                if *v == 0.0 {
                    code.push_op(OpCode::PushF64Zero);
                } else if *v == 1.0 {
                    code.push_op(OpCode::PushF64One);
                } else {
                    code.push_op(OpCode::PushF64);
                    code.push_byte(pool_index(pool, range)?);
                    pool.push(Constant::F64(*v));
                }
                Ok(())
            }
            LiteralValue::Str(s) => {
                code.push_op(OpCode::PushString);
                code.push_byte(pool_index(pool, range)?);
                pool.push(Constant::String((*s).to_string()));
                Ok(())
            }
        }
    }

    fn emit_i32_literal(
        &mut self,
        value: i32,
        range: &SourceRange,
        code: &mut ByteCode,
        pool: &mut Vec<Constant>,
    ) -> Result<(), CompileError> {
        if value == 0 {
            code.push_op(OpCode::PushI32Zero);
        } else if value == 1 {
            code.push_op(OpCode::PushI32One);
        } else if -128 < value && value < 128 {
            code.push_op(OpCode::PushI32Byte);
            code.push_byte(value as i8 as u8);
        } else {
            code.push_op(OpCode::PushI32);
            code.push_byte(pool_index(pool, range)?);
            pool.push(Constant::I32(value));
        }
        Ok(())
    }

    fn emit_parameter(
        &mut self,
        expr: Expr<'a>,
        param: &'a ParameterExpr<'a>,
        code: &mut ByteCode,
    ) -> Result<(), CompileError> {
        let id = NodeId::of(param);
        let ty = self.checked_type(expr)?;
        if let Some(info) = self.names.name_info(id, LocationKind::FunctionVariable) {
            let op = match ty.code() {
                TypeCode::Int32 | TypeCode::Boolean | TypeCode::Char => OpCode::PushLocalI32,
                TypeCode::Int64 => OpCode::PushLocalI64,
                TypeCode::Float32 => OpCode::PushLocalF32,
                TypeCode::Float64 => OpCode::PushLocalF64,
                TypeCode::String => OpCode::PushLocalObject,
                _ => {
                    return Err(unsupported_variable_type(ty, &param.range));
                }
            };
            code.push_op(op);
            code.push_byte(info.number as u8);
            Ok(())
        } else if let Some(info) = self.names.name_info(id, LocationKind::GlobalVariable) {
            let op = match ty.code() {
                TypeCode::Int32 | TypeCode::Boolean | TypeCode::Char => OpCode::PushGlobalI32,
                TypeCode::Int64 => OpCode::PushGlobalI64,
                TypeCode::Float32 => OpCode::PushGlobalF32,
                TypeCode::Float64 => OpCode::PushGlobalF64,
                TypeCode::String => OpCode::PushGlobalObject,
                _ => {
                    return Err(unsupported_variable_type(ty, &param.range));
                }
            };
            code.push_op(op);
            code.push_byte(info.number as u8);
            Ok(())
        } else {
            Err(EmitError::Unsupported {
                message: format!("'{}' does not name a readable variable", param.name),
                range: param.range.clone(),
            }
            .into())
        }
    }

    fn emit_variable_declaration(
        &mut self,
        expr: Expr<'a>,
        decl: &'a VariableDeclarationExpr<'a>,
        code: &mut ByteCode,
        pool: &mut Vec<Constant>,
    ) -> Result<(), CompileError> {
        let info = self.info(NodeId::of(decl), LocationKind::FunctionVariable, &decl.range)?;
        self.emit(decl.initializer, code, pool)?;
        let ty = self.checked_type(expr)?;
        let op = match ty.code() {
            TypeCode::Boolean | TypeCode::Char | TypeCode::Int32 => OpCode::PopLocalI32,
            TypeCode::Int64 => OpCode::PopLocalI64,
            TypeCode::Float32 => OpCode::PopLocalF32,
            TypeCode::Float64 => OpCode::PopLocalF64,
            _ => {
                tracing::error!(
                    name = decl.name,
                    "variable declarations do not support this type"
                );
                return Err(unsupported_variable_type(ty, &decl.range));
            }
        };
        code.push_op(op);
        code.push_byte(info.number as u8);
        Ok(())
    }

    // ========================================================================
    // Lookups
    // ========================================================================

    fn checked_type(&self, expr: Expr<'a>) -> Result<&'a Type<'a>, CompileError> {
        self.types.type_of(expr).ok_or_else(|| {
            EmitError::Unsupported {
                message: "expression was not type-checked".to_string(),
                range: expr.range().clone(),
            }
            .into()
        })
    }

    fn info(
        &self,
        id: NodeId,
        kind: LocationKind,
        range: &SourceRange,
    ) -> Result<NameInfo, CompileError> {
        self.names.name_info(id, kind).ok_or_else(|| {
            EmitError::Unsupported {
                message: "name was not located".to_string(),
                range: range.clone(),
            }
            .into()
        })
    }
}

fn annotation_duplicate(name: &str, arg: &AnnotationArg<'_>) -> vela_core::AnnotationError {
    tracing::error!(argument = name, "annotation argument defined more than once");
    vela_core::AnnotationError::DuplicateArgument {
        name: name.to_string(),
        range: arg.range.clone(),
    }
}

fn annotation_missing(name: &str, lambda: &LambdaExpr<'_>) -> CompileError {
    tracing::error!(
        argument = name,
        function = lambda.name,
        "native function annotation is incomplete"
    );
    vela_core::AnnotationError::MissingArgument {
        name: name.to_string(),
        range: lambda.range.clone(),
    }
    .into()
}

/// Opcode for a binary operator over operands of type `ty`.
///
/// Boolean and Char operands ride the i32 comparison family and support
/// equality only.
fn binary_opcode(
    op: BinaryOp,
    ty: &Type<'_>,
    range: &SourceRange,
) -> Result<OpCode, CompileError> {
    use BinaryOp::*;
    use OpCode::*;
    let unsupported = || {
        CompileError::from(EmitError::UnsupportedOperator {
            op: op.symbol().to_string(),
            range: range.clone(),
        })
    };
    let opcode = match ty.code() {
        TypeCode::Int32 => match op {
            Add => AddI32,
            Sub => SubI32,
            Mul => MulI32,
            Div => DivI32,
            Mod => ModI32,
            Eq => EqI32,
            Ne => NeI32,
            Lt => LtI32,
            Le => LeI32,
            Gt => GtI32,
            Ge => GeI32,
            _ => return Err(unsupported()),
        },
        TypeCode::Int64 => match op {
            Add => AddI64,
            Sub => SubI64,
            Mul => MulI64,
            Div => DivI64,
            Mod => ModI64,
            Eq => EqI64,
            Ne => NeI64,
            Lt => LtI64,
            Le => LeI64,
            Gt => GtI64,
            Ge => GeI64,
            _ => return Err(unsupported()),
        },
        TypeCode::Float32 => match op {
            Add => AddF32,
            Sub => SubF32,
            Mul => MulF32,
            Div => DivF32,
            Mod => ModF32,
            Eq => EqF32,
            Ne => NeF32,
            Lt => LtF32,
            Le => LeF32,
            Gt => GtF32,
            Ge => GeF32,
            _ => return Err(unsupported()),
        },
        TypeCode::Float64 => match op {
            Add => AddF64,
            Sub => SubF64,
            Mul => MulF64,
            Div => DivF64,
            Mod => ModF64,
            Eq => EqF64,
            Ne => NeF64,
            Lt => LtF64,
            Le => LeF64,
            Gt => GtF64,
            Ge => GeF64,
            _ => return Err(unsupported()),
        },
        TypeCode::Boolean | TypeCode::Char => match op {
            Eq => EqI32,
            Ne => NeI32,
            _ => return Err(unsupported()),
        },
        _ => {
            return Err(EmitError::UnsupportedType {
                ty: ty.to_string(),
                range: range.clone(),
            }
            .into());
        }
    };
    Ok(opcode)
}

/// Cast opcode between two scalar widths; `None` for identity conversions.
///
/// Boolean shares the i32 representation on both sides.
fn cast_opcode(
    from: TypeCode,
    to: TypeCode,
    range: &SourceRange,
) -> Result<Option<OpCode>, CompileError> {
    use OpCode::*;
    let invalid = || {
        CompileError::from(EmitError::Unsupported {
            message: "cannot convert between these types".to_string(),
            range: range.clone(),
        })
    };
    let opcode = match from {
        TypeCode::Boolean | TypeCode::Int32 => match to {
            TypeCode::Int32 | TypeCode::Boolean => None,
            TypeCode::Int64 => Some(CastI32ToI64),
            TypeCode::Float32 => Some(CastI32ToF32),
            TypeCode::Float64 => Some(CastI32ToF64),
            _ => return Err(invalid()),
        },
        TypeCode::Int64 => match to {
            TypeCode::Int32 | TypeCode::Boolean => Some(CastI64ToI32),
            TypeCode::Int64 => None,
            TypeCode::Float32 => Some(CastI64ToF32),
            TypeCode::Float64 => Some(CastI64ToF64),
            _ => return Err(invalid()),
        },
        TypeCode::Float32 => match to {
            TypeCode::Int32 => Some(CastF32ToI32),
            TypeCode::Int64 => Some(CastF32ToI64),
            TypeCode::Float32 => None,
            TypeCode::Float64 => Some(CastF32ToF64),
            _ => return Err(invalid()),
        },
        TypeCode::Float64 => match to {
            TypeCode::Int32 => Some(CastF64ToI32),
            TypeCode::Int64 => Some(CastF64ToI64),
            TypeCode::Float32 => Some(CastF64ToF32),
            TypeCode::Float64 => None,
            _ => return Err(invalid()),
        },
        _ => return Err(invalid()),
    };
    Ok(opcode)
}

fn unsupported_variable_type(ty: &Type<'_>, range: &SourceRange) -> CompileError {
    EmitError::UnsupportedType {
        ty: ty.to_string(),
        range: range.clone(),
    }
    .into()
}

fn pool_index(pool: &[Constant], range: &SourceRange) -> Result<u8, CompileError> {
    u8::try_from(pool.len()).map_err(|_| {
        CompileError::from(EmitError::Unsupported {
            message: "constant pool overflow".to_string(),
            range: range.clone(),
        })
    })
}

fn to_i16(value: i64, range: &SourceRange) -> Result<i16, CompileError> {
    i16::try_from(value).map_err(|_| {
        CompileError::from(EmitError::JumpOutOfRange {
            range: range.clone(),
        })
    })
}

fn set_slot<T>(
    slots: &mut [Option<T>],
    index: i32,
    value: T,
    range: &SourceRange,
) -> Result<(), CompileError> {
    let slot = usize::try_from(index)
        .ok()
        .and_then(|i| slots.get_mut(i))
        .ok_or_else(|| {
            CompileError::from(EmitError::Unsupported {
                message: "slot index out of table bounds".to_string(),
                range: range.clone(),
            })
        })?;
    *slot = Some(value);
    Ok(())
}
