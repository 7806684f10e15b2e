//! Bytecode representation
//!
//! An instruction is one opcode byte followed by its operands: nothing, a
//! one-byte [`ValueType`] tag, or a little-endian `i32` immediate.

use std::fmt::Write as _;

use crate::buffer::ByteBuffer;
use crate::value::ValueType;

// Generates the opcode enum together with its byte decoding and mnemonic.
macro_rules! opcodes {
    ($($(#[$doc:meta])* $name:ident = $byte:literal => $mnemonic:literal,)*) => {
        /// Opcode byte of every instruction the VM understands.
        #[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
        #[repr(u8)]
        pub enum Op {
            $($(#[$doc])* $name = $byte,)*
        }

        impl Op {
            pub fn from_byte(byte: u8) -> Option<Self> {
                match byte {
                    $($byte => Some(Op::$name),)*
                    _ => None,
                }
            }

            pub fn mnemonic(self) -> &'static str {
                match self {
                    $(Op::$name => $mnemonic,)*
                }
            }
        }
    };
}

opcodes! {
    /// Halt with the top value; operand is its type tag
    Return = 0 => "OP_RETURN",
    /// Push a 4-byte integer immediate
    Constant = 1 => "OP_CONSTANT",
    Negate = 2 => "OP_NEGATE",
    Add = 3 => "OP_ADD",
    Subtract = 4 => "OP_SUBTRACT",
    Multiply = 5 => "OP_MULTIPLY",
    Divide = 6 => "OP_DIVIDE",
    True = 7 => "OP_TRUE",
    False = 8 => "OP_FALSE",
    Not = 9 => "OP_NOT",
    /// Compare the top two values; operand is their type tag
    Equal = 10 => "OP_EQUAL",
    Greater = 11 => "OP_GREATER",
    Less = 12 => "OP_LESS",
}

impl Op {
    /// Operand bytes following the opcode.
    pub fn operand_width(self) -> usize {
        match self {
            Op::Constant => 4,
            Op::Return | Op::Equal => 1,
            _ => 0,
        }
    }
}

/// A decoded instruction
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Instruction {
    /// Halt, yielding a value of the given type
    Return(ValueType),
    /// Push an integer
    Constant(i32),
    /// Negate an integer
    Negate,
    /// Add two integers
    Add,
    /// Subtract two integers
    Subtract,
    /// Multiply two integers
    Multiply,
    /// Divide two integers
    Divide,
    /// Push `true`
    True,
    /// Push `false`
    False,
    /// Invert a boolean
    Not,
    /// Compare two values of the given type for equality
    Equal(ValueType),
    /// `a > b` on integers
    Greater,
    /// `a < b` on integers
    Less,
}

/// Why the bytes at an offset are not a valid instruction.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum DecodeError {
    UnknownOpcode(u8),
    InvalidTypeTag(u8),
    Truncated,
}

impl Instruction {
    /// Decode the instruction at `offset`, returning it with its encoded size.
    pub fn decode(code: &ByteBuffer, offset: usize) -> Result<(Self, usize), DecodeError> {
        let byte = code.read_byte(offset).ok_or(DecodeError::Truncated)?;
        let op = Op::from_byte(byte).ok_or(DecodeError::UnknownOpcode(byte))?;

        let type_operand = || -> Result<ValueType, DecodeError> {
            let tag = code.read_byte(offset + 1).ok_or(DecodeError::Truncated)?;
            ValueType::from_tag(tag).ok_or(DecodeError::InvalidTypeTag(tag))
        };

        let instruction = match op {
            Op::Return => Instruction::Return(type_operand()?),
            Op::Constant => Instruction::Constant(
                code.read_i32_le(offset + 1)
                    .ok_or(DecodeError::Truncated)?,
            ),
            Op::Negate => Instruction::Negate,
            Op::Add => Instruction::Add,
            Op::Subtract => Instruction::Subtract,
            Op::Multiply => Instruction::Multiply,
            Op::Divide => Instruction::Divide,
            Op::True => Instruction::True,
            Op::False => Instruction::False,
            Op::Not => Instruction::Not,
            Op::Equal => Instruction::Equal(type_operand()?),
            Op::Greater => Instruction::Greater,
            Op::Less => Instruction::Less,
        };

        Ok((instruction, 1 + op.operand_width()))
    }

    pub fn op(&self) -> Op {
        match self {
            Instruction::Return(_) => Op::Return,
            Instruction::Constant(_) => Op::Constant,
            Instruction::Negate => Op::Negate,
            Instruction::Add => Op::Add,
            Instruction::Subtract => Op::Subtract,
            Instruction::Multiply => Op::Multiply,
            Instruction::Divide => Op::Divide,
            Instruction::True => Op::True,
            Instruction::False => Op::False,
            Instruction::Not => Op::Not,
            Instruction::Equal(_) => Op::Equal,
            Instruction::Greater => Op::Greater,
            Instruction::Less => Op::Less,
        }
    }

    /// Append the encoded instruction to `code`.
    pub fn encode(&self, code: &mut ByteBuffer) {
        code.write_byte(self.op() as u8);
        match *self {
            Instruction::Return(ty) | Instruction::Equal(ty) => code.write_byte(ty.tag()),
            Instruction::Constant(value) => code.write_i32_le(value),
            _ => {}
        }
    }
}

/// Render one instruction as a listing line, without the trailing newline.
pub fn disassemble_instruction(code: &ByteBuffer, offset: usize) -> (String, usize) {
    let mut line = format!("{offset:04} ");
    match Instruction::decode(code, offset) {
        Ok((instruction, size)) => {
            let mnemonic = instruction.op().mnemonic();
            let _ = match instruction {
                Instruction::Constant(value) => write!(line, "{mnemonic:<16} {value}"),
                Instruction::Return(ty) | Instruction::Equal(ty) => {
                    write!(line, "{mnemonic:<16} {ty}")
                }
                _ => write!(line, "{mnemonic}"),
            };
            (line, size)
        }
        Err(DecodeError::UnknownOpcode(byte)) => {
            let _ = write!(line, "Unknown opcode {byte}");
            (line, 1)
        }
        Err(DecodeError::InvalidTypeTag(tag)) => {
            let _ = write!(line, "Invalid type tag {tag}");
            (line, 2)
        }
        Err(DecodeError::Truncated) => {
            line.push_str("Truncated instruction");
            (line, code.len().saturating_sub(offset).max(1))
        }
    }
}

/// Human-readable listing of the whole buffer, one instruction per line.
pub fn disassemble(code: &ByteBuffer) -> String {
    let mut out = String::new();
    let mut offset = 0;
    while offset < code.len() {
        let (line, size) = disassemble_instruction(code, offset);
        out.push_str(&line);
        out.push('\n');
        offset += size;
    }
    out
}
