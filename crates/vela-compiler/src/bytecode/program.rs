//! The logical program and its on-disk form.
//!
//! The emitter produces [`Program`]: the global-variable table, the string
//! table, the function table, the native-library table, the native-function
//! table and the entry-point index. [`Program::serialize`] concatenates them
//! in that fixed order. Counts and lengths are big-endian `u16`, strings are
//! length-prefixed UTF-8.

use super::buffer::ByteCode;
use super::constant::Constant;

/// Magic bytes opening a serialized program.
pub const MAGIC: &[u8; 4] = b"VELA";
/// Container format version.
pub const FORMAT_VERSION: u8 = 1;

/// One global variable slot.
#[derive(Debug, Clone, PartialEq)]
pub struct GlobalVariable {
    pub name: String,
}

/// A compiled function.
#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    pub name: String,
    /// Declared argument count.
    pub args: u8,
    /// Local slots beyond the arguments.
    pub locals: u8,
    pub constants: Vec<Constant>,
    pub code: ByteCode,
}

/// A native function binding resolved at load time.
#[derive(Debug, Clone, PartialEq)]
pub struct NativeFunction {
    /// Symbol name inside the library.
    pub entry_point: String,
    pub args: u8,
    /// Index into the native-library table.
    pub library: u8,
}

/// A shared library referenced by at least one native function.
#[derive(Debug, Clone, PartialEq)]
pub struct NativeLibrary {
    pub name: String,
}

/// A complete compiled program.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub globals: Vec<GlobalVariable>,
    pub strings: Vec<String>,
    pub functions: Vec<Function>,
    pub libraries: Vec<NativeLibrary>,
    pub native_functions: Vec<NativeFunction>,
    /// Index of `Main` in the function table.
    pub entry_point: u16,
}

impl Program {
    /// Serialize to the output artifact's byte layout.
    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(MAGIC);
        out.push(FORMAT_VERSION);

        write_u16(&mut out, self.globals.len() as u16);
        for global in &self.globals {
            write_str(&mut out, &global.name);
        }

        write_u16(&mut out, self.strings.len() as u16);
        for string in &self.strings {
            write_str(&mut out, string);
        }

        write_u16(&mut out, self.functions.len() as u16);
        for function in &self.functions {
            write_function(&mut out, function);
        }

        write_u16(&mut out, self.libraries.len() as u16);
        for library in &self.libraries {
            write_str(&mut out, &library.name);
        }

        write_u16(&mut out, self.native_functions.len() as u16);
        for native in &self.native_functions {
            write_str(&mut out, &native.entry_point);
            out.push(native.args);
            out.push(native.library);
        }

        write_u16(&mut out, self.entry_point);
        out
    }
}

fn write_function(out: &mut Vec<u8>, function: &Function) {
    write_str(out, &function.name);
    out.push(function.args);
    out.push(function.locals);
    write_u16(out, function.constants.len() as u16);
    for constant in &function.constants {
        out.push(constant.kind().into());
        match constant {
            Constant::I32(v) => out.extend_from_slice(&v.to_be_bytes()),
            Constant::I64(v) => out.extend_from_slice(&v.to_be_bytes()),
            Constant::F32(v) => out.extend_from_slice(&v.to_be_bytes()),
            Constant::F64(v) => out.extend_from_slice(&v.to_be_bytes()),
            Constant::String(s) => write_str(out, s),
            Constant::Function(index) => write_u16(out, *index as u16),
            Constant::NativeFunction(index) => write_u16(out, *index as u16),
        }
    }
    write_u32(out, function.code.len() as u32);
    out.extend_from_slice(function.code.bytes());
}

fn write_u16(out: &mut Vec<u8>, value: u16) {
    out.extend_from_slice(&value.to_be_bytes());
}

fn write_u32(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_be_bytes());
}

fn write_str(out: &mut Vec<u8>, s: &str) {
    write_u16(out, s.len() as u16);
    out.extend_from_slice(s.as_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::OpCode;

    fn sample_program() -> Program {
        let mut code = ByteCode::new();
        code.push_op(OpCode::PushI32Zero);
        code.push_op(OpCode::Halt);
        Program {
            globals: vec![GlobalVariable { name: "g".into() }],
            strings: Vec::new(),
            functions: vec![Function {
                name: "Main".into(),
                args: 0,
                locals: 0,
                constants: vec![Constant::I32(300)],
                code,
            }],
            libraries: vec![NativeLibrary {
                name: "libm".into(),
            }],
            native_functions: vec![NativeFunction {
                entry_point: "sin".into(),
                args: 1,
                library: 0,
            }],
            entry_point: 0,
        }
    }

    #[test]
    fn serialization_opens_with_magic_and_version() {
        let bytes = sample_program().serialize();
        assert_eq!(&bytes[0..4], MAGIC);
        assert_eq!(bytes[4], FORMAT_VERSION);
        // Global table: count 1, then "g".
        assert_eq!(&bytes[5..7], &[0, 1]);
        assert_eq!(&bytes[7..9], &[0, 1]);
        assert_eq!(bytes[9], b'g');
    }

    #[test]
    fn serialization_is_deterministic() {
        assert_eq!(sample_program().serialize(), sample_program().serialize());
    }

    #[test]
    fn function_section_carries_code_bytes() {
        let program = sample_program();
        let bytes = program.serialize();
        let code_bytes = program.functions[0].code.bytes();
        assert!(
            bytes
                .windows(code_bytes.len())
                .any(|window| window == code_bytes)
        );
    }

    #[test]
    fn constants_are_tagged() {
        let bytes = sample_program().serialize();
        // The I32 constant tag appears followed by the big-endian value 300.
        let needle = [
            u8::from(crate::bytecode::ConstantKind::I32),
            0,
            0,
            1,
            44,
        ];
        assert!(bytes.windows(needle.len()).any(|w| w == needle));
    }
}
