//! nol compiles small typed expressions into bytecode and runs them on a
//! stack-based virtual machine.
//!
//! # Example
//!
//! ```
//! use nol::Value;
//!
//! assert_eq!(nol::interpret("(1 + 2) * 3").unwrap(), Value::Int(9));
//! assert_eq!(nol::interpret("1 + 2 >= 3").unwrap(), Value::Bool(true));
//! ```
//!
//! # Language
//!
//! A program is a single expression made of integer literals, `true` and
//! `false`, parentheses, unary `-` and `!`, and the binary operators
//! `* /`, `+ -`, `< <= > >=`, `== !=` (tightest first). Every expression has a
//! static type, `int` or `bool`, checked while compiling:
//!
//! - arithmetic and ordering need two ints of the same type,
//! - `!` needs a bool,
//! - `==` and `!=` need both sides to have the same type.
//!
//! # Instructions
//!
//! | Instruction | Operand      | Brief |
//! |-------------|--------------|-------|
//! | RETURN      | type tag     | Pop a value of the tagged type and halt with it. |
//! | CONSTANT    | 4-byte int   | Push the integer. |
//! | NEGATE      |              | Pop an int and push its negation. |
//! | ADD         |              | Pop two ints and push their sum. |
//! | SUBTRACT    |              | Pop two ints and push `lhs - rhs` where `lhs` is the first value pushed. |
//! | MULTIPLY    |              | Pop two ints and push their product. |
//! | DIVIDE      |              | Pop two ints and push `lhs / rhs`. Dividing by zero is a runtime error. |
//! | TRUE        |              | Push `true`. |
//! | FALSE       |              | Push `false`. |
//! | NOT         |              | Pop a bool and push its negation. |
//! | EQUAL       | type tag     | Pop two values of the tagged type and push whether they are equal. |
//! | GREATER     |              | Pop two ints and push `lhs > rhs`. |
//! | LESS        |              | Pop two ints and push `lhs < rhs`. |
//!
//! `>=` and `<=` compile to `LESS` and `GREATER` followed by `NOT`, and `!=`
//! to `EQUAL` followed by `NOT`.
//!
//! # Important notes
//!
//! - Integers are 32-bit and wrap on overflow.
//! - The stack is untyped; the compiler picks the width of every operation. Debug
//!   builds additionally track slot types and report mismatches.
//! - A buffer compiled with errors is still terminated and can be run, but the
//!   result is meaningless. [`Session::interpret`] refuses to run it.

pub mod buffer;
pub mod bytecode;
pub mod compiler;
pub mod map;
pub mod scanner;
pub mod token;
pub mod value;
pub mod vm;

pub use buffer::ByteBuffer;
pub use compiler::{compile, Compilation, Diagnostic, ErrorPolicy};
pub use value::{Value, ValueType};
pub use vm::{RuntimeError, Vm};

/// Errors of a complete compile-and-run cycle.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    #[error("compilation failed")]
    Compile(Vec<Diagnostic>),

    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Compile and run `source` on a fresh session.
pub fn interpret(source: &str) -> Result<Value> {
    Session::default().interpret(source)
}

/// Buffer and VM reused across inputs, as in a REPL.
#[derive(Default)]
pub struct Session {
    code: ByteBuffer,
    vm: Vm,
    policy: ErrorPolicy,
}

impl Session {
    pub fn new(policy: ErrorPolicy) -> Self {
        Session {
            policy,
            ..Default::default()
        }
    }

    /// Compile `source` into the session buffer, replacing the previous code.
    pub fn compile(&mut self, source: &str) -> Compilation {
        compile(source, &mut self.code, self.policy)
    }

    /// Run whatever the last [`Session::compile`] produced.
    pub fn run(&mut self) -> std::result::Result<Value, RuntimeError> {
        self.vm.run(&self.code)
    }

    /// Compile `source` and run it unless compilation reported errors.
    pub fn interpret(&mut self, source: &str) -> Result<Value> {
        let compilation = self.compile(source);
        if compilation.had_error() {
            return Err(Error::Compile(compilation.diagnostics));
        }
        Ok(self.run()?)
    }

    /// The most recently compiled code.
    pub fn code(&self) -> &ByteBuffer {
        &self.code
    }
}
