use std::fmt;

/// Static type of an expression, also used as a one-byte operand tag.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
#[repr(u8)]
pub enum ValueType {
    Bool = 0,
    Int = 1,
    /// Reserved, no literal produces it yet.
    Float = 2,
    /// Reserved, no literal produces it yet.
    Char = 3,
}

impl ValueType {
    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(ValueType::Bool),
            1 => Some(ValueType::Int),
            2 => Some(ValueType::Float),
            3 => Some(ValueType::Char),
            _ => None,
        }
    }

    pub fn tag(self) -> u8 {
        self as u8
    }

    pub fn is_numeric(self) -> bool {
        matches!(self, ValueType::Int | ValueType::Float)
    }

    /// Bytes a value of this type occupies on the VM stack.
    pub fn width(self) -> usize {
        match self {
            ValueType::Bool | ValueType::Char => 1,
            ValueType::Int => 4,
            ValueType::Float => 8,
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueType::Bool => "bool",
            ValueType::Int => "int",
            ValueType::Float => "float",
            ValueType::Char => "char",
        };
        f.write_str(name)
    }
}

/// Result of running a program.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Value {
    Bool(bool),
    Int(i32),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(n) => write!(f, "{n}"),
        }
    }
}
