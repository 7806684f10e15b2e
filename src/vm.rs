//! Virtual machine that runs the bytecode

use crate::buffer::ByteBuffer;
use crate::bytecode::{disassemble_instruction, DecodeError, Instruction};
use crate::value::{Value, ValueType};

/// Size of the value stack in bytes, room for 256 ints.
pub const STACK_SIZE: usize = 1024;

/// Faults raised while executing bytecode.
#[derive(Debug, Clone, Eq, PartialEq, thiserror::Error)]
pub enum RuntimeError {
    #[error("stack overflow")]
    StackOverflow,

    #[error("stack underflow")]
    StackUnderflow,

    #[error("division by zero")]
    DivisionByZero,

    #[error("unknown opcode {opcode} at offset {offset}")]
    UnknownOpcode { opcode: u8, offset: usize },

    #[error("invalid type tag {tag} at offset {offset}")]
    InvalidTypeTag { tag: u8, offset: usize },

    #[error("truncated instruction at offset {offset}")]
    TruncatedInstruction { offset: usize },

    #[error("values of type {0} are not supported at run time")]
    UnsupportedType(ValueType),

    #[error("reached the end of the code without a return")]
    MissingReturn,

    /// Only detected in debug builds, which track the type of every stack slot.
    #[error("expected {expected} on the stack, found {found}")]
    TypeMismatch {
        expected: ValueType,
        found: ValueType,
    },
}

type VmResult<T> = Result<T, RuntimeError>;

/// Stack machine executing one [`ByteBuffer`] at a time.
///
/// The stack holds raw little-endian scalars without tags: the compiler has
/// already picked the opcode and width for every operation.
pub struct Vm {
    ip: usize,
    sp: usize,
    stack: [u8; STACK_SIZE],
    #[cfg(debug_assertions)]
    types: Vec<ValueType>,
}

impl Default for Vm {
    fn default() -> Self {
        Self::new()
    }
}

impl Vm {
    pub fn new() -> Self {
        Vm {
            ip: 0,
            sp: 0,
            stack: [0; STACK_SIZE],
            #[cfg(debug_assertions)]
            types: Vec::new(),
        }
    }

    /// Execute `code` from the start until it returns.
    pub fn run(&mut self, code: &ByteBuffer) -> VmResult<Value> {
        self.reset();

        loop {
            if let Some(value) = self.next_instruction(code)? {
                log::debug!("program returned {value}");
                return Ok(value);
            }
        }
    }

    /// Bytes currently on the stack, bottom first.
    pub fn stack(&self) -> &[u8] {
        &self.stack[..self.sp]
    }

    fn reset(&mut self) {
        self.ip = 0;
        self.sp = 0;
        #[cfg(debug_assertions)]
        self.types.clear();
    }

    /// Execute a single instruction, yielding the result once the program returns.
    fn next_instruction(&mut self, code: &ByteBuffer) -> VmResult<Option<Value>> {
        if self.ip >= code.len() {
            return Err(RuntimeError::MissingReturn);
        }

        if log::log_enabled!(log::Level::Trace) {
            let (listing, _) = disassemble_instruction(code, self.ip);
            log::trace!("{:<32} stack={:02x?}", listing, self.stack());
        }

        let offset = self.ip;
        let (instruction, size) = Instruction::decode(code, offset).map_err(|err| match err {
            DecodeError::UnknownOpcode(opcode) => RuntimeError::UnknownOpcode { opcode, offset },
            DecodeError::InvalidTypeTag(tag) => RuntimeError::InvalidTypeTag { tag, offset },
            DecodeError::Truncated => RuntimeError::TruncatedInstruction { offset },
        })?;
        self.ip += size;

        match instruction {
            Instruction::Return(ty) => return self.ins_return(ty).map(Some),
            Instruction::Constant(value) => self.push_int(value)?,
            Instruction::Negate => {
                let value = self.pop_int()?;
                self.push_int(value.wrapping_neg())?;
            }
            Instruction::Add => self.binary_int(i32::wrapping_add)?,
            Instruction::Subtract => self.binary_int(i32::wrapping_sub)?,
            Instruction::Multiply => self.binary_int(i32::wrapping_mul)?,
            Instruction::Divide => self.ins_divide()?,
            Instruction::True => self.push_bool(true)?,
            Instruction::False => self.push_bool(false)?,
            Instruction::Not => {
                let value = self.pop_bool()?;
                self.push_bool(!value)?;
            }
            Instruction::Equal(ty) => self.ins_equal(ty)?,
            Instruction::Greater => self.compare_int(|a, b| a > b)?,
            Instruction::Less => self.compare_int(|a, b| a < b)?,
        }

        Ok(None)
    }

    /// Pop the result according to the type the compiler encoded
    fn ins_return(&mut self, ty: ValueType) -> VmResult<Value> {
        match ty {
            ValueType::Int => Ok(Value::Int(self.pop_int()?)),
            ValueType::Bool => Ok(Value::Bool(self.pop_bool()?)),
            ty => Err(RuntimeError::UnsupportedType(ty)),
        }
    }

    fn ins_divide(&mut self) -> VmResult<()> {
        let rhs = self.pop_int()?;
        let lhs = self.pop_int()?;

        if rhs == 0 {
            return Err(RuntimeError::DivisionByZero);
        }
        self.push_int(lhs.wrapping_div(rhs))
    }

    /// Compare two values whose width is given by `ty`
    fn ins_equal(&mut self, ty: ValueType) -> VmResult<()> {
        let equal = match ty {
            ValueType::Int => self.pop_int()? == self.pop_int()?,
            ValueType::Bool => self.pop_bool()? == self.pop_bool()?,
            ty => return Err(RuntimeError::UnsupportedType(ty)),
        };
        self.push_bool(equal)
    }

    fn binary_int(&mut self, op: fn(i32, i32) -> i32) -> VmResult<()> {
        let rhs = self.pop_int()?;
        let lhs = self.pop_int()?;
        self.push_int(op(lhs, rhs))
    }

    fn compare_int(&mut self, op: fn(i32, i32) -> bool) -> VmResult<()> {
        let rhs = self.pop_int()?;
        let lhs = self.pop_int()?;
        self.push_bool(op(lhs, rhs))
    }

    fn push_int(&mut self, value: i32) -> VmResult<()> {
        self.push_stack(&value.to_le_bytes(), ValueType::Int)
    }

    fn pop_int(&mut self) -> VmResult<i32> {
        Ok(i32::from_le_bytes(self.pop_stack::<4>(ValueType::Int)?))
    }

    fn push_bool(&mut self, value: bool) -> VmResult<()> {
        self.push_stack(&[value as u8], ValueType::Bool)
    }

    fn pop_bool(&mut self) -> VmResult<bool> {
        let [byte] = self.pop_stack::<1>(ValueType::Bool)?;
        Ok(byte != 0)
    }

    fn push_stack(&mut self, bytes: &[u8], ty: ValueType) -> VmResult<()> {
        debug_assert_eq!(bytes.len(), ty.width());
        let end = self.sp + bytes.len();
        if end > STACK_SIZE {
            return Err(RuntimeError::StackOverflow);
        }

        self.stack[self.sp..end].copy_from_slice(bytes);
        self.sp = end;
        self.track_push(ty);
        Ok(())
    }

    fn pop_stack<const N: usize>(&mut self, ty: ValueType) -> VmResult<[u8; N]> {
        if self.sp < N {
            return Err(RuntimeError::StackUnderflow);
        }

        self.check_pop(ty)?;

        self.sp -= N;
        let mut bytes = [0; N];
        bytes.copy_from_slice(&self.stack[self.sp..self.sp + N]);
        Ok(bytes)
    }

    #[cfg(debug_assertions)]
    fn track_push(&mut self, ty: ValueType) {
        self.types.push(ty);
    }

    #[cfg(not(debug_assertions))]
    fn track_push(&mut self, _ty: ValueType) {}

    /// Compare the type of the top slot with what the opcode expects.
    #[cfg(debug_assertions)]
    fn check_pop(&mut self, expected: ValueType) -> VmResult<()> {
        match self.types.pop() {
            Some(found) if found != expected => Err(RuntimeError::TypeMismatch { expected, found }),
            _ => Ok(()),
        }
    }

    #[cfg(not(debug_assertions))]
    fn check_pop(&mut self, _expected: ValueType) -> VmResult<()> {
        Ok(())
    }
}
