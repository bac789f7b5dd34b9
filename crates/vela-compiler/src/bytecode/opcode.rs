//! The instruction set of the Vela VM.
//!
//! The VM is a register-less stack machine. Each opcode is a single byte;
//! operands follow inline, big-endian when multi-byte.

use num_enum::{IntoPrimitive, TryFromPrimitive};

/// Bytecode operation codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum OpCode {
    // =========================================================================
    // Constants
    // =========================================================================
    /// Push the i32 value 0.
    PushI32Zero = 0,
    /// Push the i32 value 1.
    PushI32One,
    /// Push a small i32. Operand: one signed byte.
    PushI32Byte,
    /// Push an i32 from the constant pool. Operand: u8 pool index.
    PushI32,
    PushI64Zero,
    PushI64One,
    /// Push an i64 from the constant pool. Operand: u8 pool index.
    PushI64,
    PushF32Zero,
    PushF32One,
    /// Push an f32 from the constant pool. Operand: u8 pool index.
    PushF32,
    PushF64Zero,
    PushF64One,
    /// Push an f64 from the constant pool. Operand: u8 pool index.
    PushF64,
    /// Push a string from the constant pool. Operand: u8 pool index.
    PushString,

    // =========================================================================
    // Local variables
    // =========================================================================
    /// Operand: u8 local slot.
    PushLocalI32,
    PushLocalI64,
    PushLocalF32,
    PushLocalF64,
    PushLocalObject,
    /// Pop into a local slot. Operand: u8 local slot.
    PopLocalI32,
    PopLocalI64,
    PopLocalF32,
    PopLocalF64,

    // =========================================================================
    // Global variables
    // =========================================================================
    /// Operand: u8 global slot.
    PushGlobalI32,
    PushGlobalI64,
    PushGlobalF32,
    PushGlobalF64,
    PushGlobalObject,

    // =========================================================================
    // Arithmetic
    // =========================================================================
    AddI32,
    AddI64,
    AddF32,
    AddF64,
    SubI32,
    SubI64,
    SubF32,
    SubF64,
    MulI32,
    MulI64,
    MulF32,
    MulF64,
    DivI32,
    DivI64,
    DivF32,
    DivF64,
    ModI32,
    ModI64,
    ModF32,
    ModF64,

    // =========================================================================
    // Comparisons (push an i32 truth value)
    // =========================================================================
    EqI32,
    EqI64,
    EqF32,
    EqF64,
    NeI32,
    NeI64,
    NeF32,
    NeF64,
    LtI32,
    LtI64,
    LtF32,
    LtF64,
    LeI32,
    LeI64,
    LeF32,
    LeF64,
    GtI32,
    GtI64,
    GtF32,
    GtF64,
    GeI32,
    GeI64,
    GeF32,
    GeF64,

    // =========================================================================
    // Numeric conversions
    // =========================================================================
    CastI32ToI64,
    CastI32ToF32,
    CastI32ToF64,
    CastI64ToI32,
    CastI64ToF32,
    CastI64ToF64,
    CastF32ToI32,
    CastF32ToI64,
    CastF32ToF64,
    CastF64ToI32,
    CastF64ToI64,
    CastF64ToF32,

    // =========================================================================
    // Control flow
    // =========================================================================
    /// Unconditional jump. Operand: i16 offset (big-endian), measured from
    /// the byte after the operand.
    Jump,
    /// Jump when the popped value is false. Operand: i16 offset (big-endian).
    JumpIfFalse,

    // =========================================================================
    // Calls
    // =========================================================================
    /// Call a function. Operand: u8 pool index of a Function constant.
    InvokeFunction,
    /// Call a native function. Operand: u8 pool index of a NativeFunction
    /// constant.
    InvokeNativeFunction,

    // =========================================================================
    // Returns
    // =========================================================================
    Return,
    ReturnI32,
    ReturnI64,
    ReturnF32,
    ReturnF64,
    ReturnObject,

    /// Stop the machine; the popped i32 is the exit status.
    Halt,
}

impl OpCode {
    /// Size in bytes of this opcode's inline operands (the opcode byte
    /// itself excluded).
    pub fn operand_size(&self) -> usize {
        use OpCode::*;
        match self {
            PushI32Byte
            | PushI32
            | PushI64
            | PushF32
            | PushF64
            | PushString
            | PushLocalI32
            | PushLocalI64
            | PushLocalF32
            | PushLocalF64
            | PushLocalObject
            | PopLocalI32
            | PopLocalI64
            | PopLocalF32
            | PopLocalF64
            | PushGlobalI32
            | PushGlobalI64
            | PushGlobalF32
            | PushGlobalF64
            | PushGlobalObject
            | InvokeFunction
            | InvokeNativeFunction => 1,

            Jump | JumpIfFalse => 2,

            _ => 0,
        }
    }

    /// Canonical name for listings and tests.
    pub fn name(&self) -> &'static str {
        use OpCode::*;
        match self {
            PushI32Zero => "PUSH_I32_0",
            PushI32One => "PUSH_I32_1",
            PushI32Byte => "PUSH_I32_1BYTE",
            PushI32 => "PUSH_I32",
            PushI64Zero => "PUSH_I64_0",
            PushI64One => "PUSH_I64_1",
            PushI64 => "PUSH_I64",
            PushF32Zero => "PUSH_F32_0",
            PushF32One => "PUSH_F32_1",
            PushF32 => "PUSH_F32",
            PushF64Zero => "PUSH_F64_0",
            PushF64One => "PUSH_F64_1",
            PushF64 => "PUSH_F64",
            PushString => "PUSH_STRING",
            PushLocalI32 => "PUSH_LOCAL_I32",
            PushLocalI64 => "PUSH_LOCAL_I64",
            PushLocalF32 => "PUSH_LOCAL_F32",
            PushLocalF64 => "PUSH_LOCAL_F64",
            PushLocalObject => "PUSH_LOCAL_OBJECT",
            PopLocalI32 => "POP_LOCAL_I32",
            PopLocalI64 => "POP_LOCAL_I64",
            PopLocalF32 => "POP_LOCAL_F32",
            PopLocalF64 => "POP_LOCAL_F64",
            PushGlobalI32 => "PUSH_GLOBAL_I32",
            PushGlobalI64 => "PUSH_GLOBAL_I64",
            PushGlobalF32 => "PUSH_GLOBAL_F32",
            PushGlobalF64 => "PUSH_GLOBAL_F64",
            PushGlobalObject => "PUSH_GLOBAL_OBJECT",
            AddI32 => "ADD_I32",
            AddI64 => "ADD_I64",
            AddF32 => "ADD_F32",
            AddF64 => "ADD_F64",
            SubI32 => "SUB_I32",
            SubI64 => "SUB_I64",
            SubF32 => "SUB_F32",
            SubF64 => "SUB_F64",
            MulI32 => "MUL_I32",
            MulI64 => "MUL_I64",
            MulF32 => "MUL_F32",
            MulF64 => "MUL_F64",
            DivI32 => "DIV_I32",
            DivI64 => "DIV_I64",
            DivF32 => "DIV_F32",
            DivF64 => "DIV_F64",
            ModI32 => "MOD_I32",
            ModI64 => "MOD_I64",
            ModF32 => "MOD_F32",
            ModF64 => "MOD_F64",
            EqI32 => "EQ_I32",
            EqI64 => "EQ_I64",
            EqF32 => "EQ_F32",
            EqF64 => "EQ_F64",
            NeI32 => "NE_I32",
            NeI64 => "NE_I64",
            NeF32 => "NE_F32",
            NeF64 => "NE_F64",
            LtI32 => "LT_I32",
            LtI64 => "LT_I64",
            LtF32 => "LT_F32",
            LtF64 => "LT_F64",
            LeI32 => "LE_I32",
            LeI64 => "LE_I64",
            LeF32 => "LE_F32",
            LeF64 => "LE_F64",
            GtI32 => "GT_I32",
            GtI64 => "GT_I64",
            GtF32 => "GT_F32",
            GtF64 => "GT_F64",
            GeI32 => "GE_I32",
            GeI64 => "GE_I64",
            GeF32 => "GE_F32",
            GeF64 => "GE_F64",
            CastI32ToI64 => "CAST_I32_TO_I64",
            CastI32ToF32 => "CAST_I32_TO_F32",
            CastI32ToF64 => "CAST_I32_TO_F64",
            CastI64ToI32 => "CAST_I64_TO_I32",
            CastI64ToF32 => "CAST_I64_TO_F32",
            CastI64ToF64 => "CAST_I64_TO_F64",
            CastF32ToI32 => "CAST_F32_TO_I32",
            CastF32ToI64 => "CAST_F32_TO_I64",
            CastF32ToF64 => "CAST_F32_TO_F64",
            CastF64ToI32 => "CAST_F64_TO_I32",
            CastF64ToI64 => "CAST_F64_TO_I64",
            CastF64ToF32 => "CAST_F64_TO_F32",
            Jump => "JUMP",
            JumpIfFalse => "JUMP_IF_FALSE",
            InvokeFunction => "INVOKE_FUNCTION",
            InvokeNativeFunction => "INVOKE_NATIVE_FUNCTION",
            Return => "RETURN",
            ReturnI32 => "RETURN_I32",
            ReturnI64 => "RETURN_I64",
            ReturnF32 => "RETURN_F32",
            ReturnF64 => "RETURN_F64",
            ReturnObject => "RETURN_OBJECT",
            Halt => "HALT",
        }
    }
}
