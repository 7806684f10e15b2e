//! Single-pass compiler: Pratt parsing, type checking and code generation.
//!
//! Every parse handler emits the code for the sub-expression it recognizes and
//! returns its static [`ValueType`], so types flow through the recursion
//! without an intermediate tree.

use std::fmt;

use crate::buffer::ByteBuffer;
use crate::bytecode::Instruction;
use crate::scanner::Scanner;
use crate::token::{Token, TokenKind};
use crate::value::ValueType;

/// What the compiler does after reporting a diagnostic.
#[derive(Debug, Default, Clone, Copy, Eq, PartialEq)]
pub enum ErrorPolicy {
    /// Keep parsing and emitting code, so later problems can be reported too.
    #[default]
    Continue,
    /// Stop at the first diagnostic. The buffer is still terminated.
    Abort,
}

/// Where a diagnostic points.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Location {
    /// The end of the input.
    End,
    /// A token with the given lexeme.
    Lexeme(String),
    /// Nothing printable, as for malformed tokens.
    Unspecified,
}

/// A compile-time error.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Diagnostic {
    pub line: u32,
    pub location: Location,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[line {}] Error", self.line)?;
        match &self.location {
            Location::End => f.write_str(" at end")?,
            Location::Lexeme(lexeme) => write!(f, " at '{lexeme}'")?,
            Location::Unspecified => {}
        }
        write!(f, ": {}", self.message)
    }
}

/// Outcome of [`compile`]. The buffer always ends in a return instruction,
/// even when diagnostics were reported.
#[derive(Debug, Clone)]
pub struct Compilation {
    /// Type of the top-level expression, encoded in the final return.
    pub result_type: ValueType,
    pub diagnostics: Vec<Diagnostic>,
}

impl Compilation {
    pub fn had_error(&self) -> bool {
        !self.diagnostics.is_empty()
    }
}

/// Deepest chain of nested operands the parser recurses into.
const MAX_NESTING: usize = 1024;

#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd)]
enum Precedence {
    None,
    Assignment, // =
    Or,         // ||
    And,        // &&
    Equality,   // == !=
    Comparison, // < > <= >=
    Term,       // + -
    Factor,     // * /
    Unary,      // ! -
    Call,       // . ()
    Primary,
}

impl Precedence {
    /// One level tighter, used for the right operand of left-associative operators.
    fn next(self) -> Self {
        match self {
            Precedence::None => Precedence::Assignment,
            Precedence::Assignment => Precedence::Or,
            Precedence::Or => Precedence::And,
            Precedence::And => Precedence::Equality,
            Precedence::Equality => Precedence::Comparison,
            Precedence::Comparison => Precedence::Term,
            Precedence::Term => Precedence::Factor,
            Precedence::Factor => Precedence::Unary,
            Precedence::Unary => Precedence::Call,
            Precedence::Call | Precedence::Primary => Precedence::Primary,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Prefix {
    Grouping,
    Unary,
    Number,
    Literal,
}

#[derive(Debug, Clone, Copy)]
enum Infix {
    Binary,
}

struct ParseRule {
    prefix: Option<Prefix>,
    infix: Option<Infix>,
    precedence: Precedence,
}

fn rule(kind: TokenKind) -> ParseRule {
    use TokenKind as T;

    let (prefix, infix, precedence) = match kind {
        T::LeftParen => (Some(Prefix::Grouping), None, Precedence::None),
        T::Minus => (Some(Prefix::Unary), Some(Infix::Binary), Precedence::Term),
        T::Plus => (None, Some(Infix::Binary), Precedence::Term),
        T::Slash | T::Star => (None, Some(Infix::Binary), Precedence::Factor),
        T::Bang => (Some(Prefix::Unary), None, Precedence::None),
        T::BangEqual | T::EqualEqual => (None, Some(Infix::Binary), Precedence::Equality),
        T::Greater | T::GreaterEqual | T::Less | T::LessEqual => {
            (None, Some(Infix::Binary), Precedence::Comparison)
        }
        T::Number => (Some(Prefix::Number), None, Precedence::None),
        T::True | T::False => (Some(Prefix::Literal), None, Precedence::None),
        _ => (None, None, Precedence::None),
    };

    ParseRule {
        prefix,
        infix,
        precedence,
    }
}

/// Compile one expression from `source` into `code`, replacing its contents.
pub fn compile(source: &str, code: &mut ByteBuffer, policy: ErrorPolicy) -> Compilation {
    code.clear();

    let mut compiler = Compiler::new(source, code, policy);
    compiler.advance();
    let result_type = compiler.expression();
    if !compiler.halted() {
        compiler.consume(TokenKind::Eof, "Expect end of expression.");
    }
    compiler.emit(Instruction::Return(result_type));

    log::debug!(
        "compiled {} bytes of code, result type {}, {} diagnostics",
        compiler.code.len(),
        result_type,
        compiler.diagnostics.len()
    );

    Compilation {
        result_type,
        diagnostics: compiler.diagnostics,
    }
}

/// Parser state for a single compilation.
struct Compiler<'src, 'code> {
    scanner: Scanner<'src>,
    current: Token<'src>,
    previous: Token<'src>,
    code: &'code mut ByteBuffer,
    policy: ErrorPolicy,
    had_error: bool,
    panic_mode: bool,
    /// Active `parse_precedence` calls.
    depth: usize,
    diagnostics: Vec<Diagnostic>,
}

impl<'src, 'code> Compiler<'src, 'code> {
    fn new(source: &'src str, code: &'code mut ByteBuffer, policy: ErrorPolicy) -> Self {
        let start = Token::new(TokenKind::Eof, "", 0, 1);
        Compiler {
            scanner: Scanner::new(source),
            current: start,
            previous: start,
            code,
            policy,
            had_error: false,
            panic_mode: false,
            depth: 0,
            diagnostics: Vec::new(),
        }
    }

    fn expression(&mut self) -> ValueType {
        self.parse_precedence(Precedence::Assignment)
    }

    fn parse_precedence(&mut self, precedence: Precedence) -> ValueType {
        // Missing operands are assumed to be ints for the rest of the checks.
        if self.halted() {
            return ValueType::Int;
        }
        if self.depth == MAX_NESTING {
            self.error("Expression nested too deeply.");
            return ValueType::Int;
        }

        self.advance();
        let Some(prefix) = rule(self.previous.kind).prefix else {
            self.error("Expect expression.");
            return ValueType::Int;
        };

        self.depth += 1;
        let mut ty = self.prefix(prefix);

        while !self.halted() && precedence <= rule(self.current.kind).precedence {
            self.advance();
            if let Some(infix) = rule(self.previous.kind).infix {
                ty = self.infix(infix, ty);
            }
        }

        self.depth -= 1;
        ty
    }

    fn prefix(&mut self, prefix: Prefix) -> ValueType {
        match prefix {
            Prefix::Grouping => self.grouping(),
            Prefix::Unary => self.unary(),
            Prefix::Number => self.number(),
            Prefix::Literal => self.literal(),
        }
    }

    fn infix(&mut self, infix: Infix, left: ValueType) -> ValueType {
        match infix {
            Infix::Binary => self.binary(left),
        }
    }

    fn grouping(&mut self) -> ValueType {
        let ty = self.expression();
        self.consume(TokenKind::RightParen, "Expect ')' after expression.");
        ty
    }

    fn number(&mut self) -> ValueType {
        let lexeme = self.previous.lexeme;
        let value = match lexeme.parse::<i32>() {
            Ok(value) => value,
            Err(_) if lexeme.contains('.') => {
                self.error("Float literals are not supported.");
                0
            }
            Err(_) => {
                self.error("Integer literal out of range.");
                0
            }
        };

        self.emit(Instruction::Constant(value));
        ValueType::Int
    }

    fn literal(&mut self) -> ValueType {
        match self.previous.kind {
            TokenKind::True => self.emit(Instruction::True),
            TokenKind::False => self.emit(Instruction::False),
            kind => unreachable!("no literal rule for {kind:?}"),
        }
        ValueType::Bool
    }

    fn unary(&mut self) -> ValueType {
        let operator = self.previous;
        let operand = self.parse_precedence(Precedence::Unary);

        match operator.kind {
            TokenKind::Minus => {
                if !operand.is_numeric() {
                    self.error_at(operator, "Expect a number.");
                }
                self.emit(Instruction::Negate);
                operand
            }
            TokenKind::Bang => {
                if operand != ValueType::Bool {
                    self.error_at(operator, "Expect a boolean.");
                }
                self.emit(Instruction::Not);
                ValueType::Bool
            }
            kind => unreachable!("no unary rule for {kind:?}"),
        }
    }

    fn binary(&mut self, left: ValueType) -> ValueType {
        let operator = self.previous;
        let right = self.parse_precedence(rule(operator.kind).precedence.next());

        if matches!(operator.kind, TokenKind::EqualEqual | TokenKind::BangEqual) {
            if left != right {
                self.error_at(operator, "Expect a matching type for equality comparison.");
            }
            // The VM needs the operand width, which only the compiler knows.
            self.emit(Instruction::Equal(left));
            if operator.kind == TokenKind::BangEqual {
                self.emit(Instruction::Not);
            }
            return ValueType::Bool;
        }

        if !left.is_numeric() || !right.is_numeric() {
            self.error_at(operator, "Expect a number.");
        } else if left != right {
            self.error_at(operator, "Expect operands to be of the same type.");
        }

        let (instruction, negate, ty) = match operator.kind {
            TokenKind::Plus => (Instruction::Add, false, ValueType::Int),
            TokenKind::Minus => (Instruction::Subtract, false, ValueType::Int),
            TokenKind::Star => (Instruction::Multiply, false, ValueType::Int),
            TokenKind::Slash => (Instruction::Divide, false, ValueType::Int),
            TokenKind::Greater => (Instruction::Greater, false, ValueType::Bool),
            TokenKind::GreaterEqual => (Instruction::Less, true, ValueType::Bool),
            TokenKind::Less => (Instruction::Less, false, ValueType::Bool),
            TokenKind::LessEqual => (Instruction::Greater, true, ValueType::Bool),
            kind => unreachable!("no binary rule for {kind:?}"),
        };

        self.emit(instruction);
        if negate {
            self.emit(Instruction::Not);
        }
        ty
    }

    fn advance(&mut self) {
        self.previous = self.current;

        let mut skipped_error = false;
        loop {
            self.current = self.scanner.scan_token();
            if self.current.kind != TokenKind::Error {
                break;
            }

            let message = if self.current.lexeme.starts_with('"') {
                "Unterminated string."
            } else {
                "Unexpected character."
            };
            self.error_at(self.current, message);
            skipped_error = true;
        }

        // Getting past malformed input resynchronizes the parser.
        if skipped_error && self.policy == ErrorPolicy::Continue {
            self.panic_mode = false;
        }
    }

    fn consume(&mut self, kind: TokenKind, message: &str) {
        if self.current.kind == kind {
            self.advance();
        } else {
            self.error_at(self.current, message);
        }
    }

    fn emit(&mut self, instruction: Instruction) {
        instruction.encode(self.code);
    }

    /// Whether the error policy forbids any further work.
    fn halted(&self) -> bool {
        self.policy == ErrorPolicy::Abort && self.had_error
    }

    fn error(&mut self, message: &str) {
        self.error_at(self.previous, message);
    }

    fn error_at(&mut self, token: Token<'src>, message: &str) {
        if self.panic_mode {
            return;
        }
        self.panic_mode = true;
        self.had_error = true;

        let location = match token.kind {
            TokenKind::Eof => Location::End,
            TokenKind::Error => Location::Unspecified,
            _ => Location::Lexeme(token.lexeme.to_string()),
        };
        let diagnostic = Diagnostic {
            line: token.line,
            location,
            message: message.to_string(),
        };

        log::debug!("{diagnostic}");
        self.diagnostics.push(diagnostic);
    }
}

#[cfg(test)]
mod tests {
    use indoc::indoc;

    use super::*;
    use crate::bytecode::disassemble;

    fn compile_str(source: &str, policy: ErrorPolicy) -> (Compilation, ByteBuffer) {
        let mut code = ByteBuffer::new();
        let compilation = compile(source, &mut code, policy);
        (compilation, code)
    }

    fn listing(source: &str) -> String {
        let (compilation, code) = compile_str(source, ErrorPolicy::Continue);
        assert!(!compilation.had_error(), "{:?}", compilation.diagnostics);
        disassemble(&code)
    }

    fn errors(source: &str) -> Vec<String> {
        errors_with(source, ErrorPolicy::Continue)
    }

    fn errors_with(source: &str, policy: ErrorPolicy) -> Vec<String> {
        let (compilation, _) = compile_str(source, policy);
        compilation
            .diagnostics
            .iter()
            .map(ToString::to_string)
            .collect()
    }

    #[test]
    fn factor_binds_tighter_than_term() {
        assert_eq!(
            listing("1 + 2 * 3"),
            indoc! {"
                0000 OP_CONSTANT      1
                0005 OP_CONSTANT      2
                0010 OP_CONSTANT      3
                0015 OP_MULTIPLY
                0016 OP_ADD
                0017 OP_RETURN        int
            "}
        );
    }

    #[test]
    fn left_associative() {
        assert_eq!(
            listing("8 - 4 - 2"),
            indoc! {"
                0000 OP_CONSTANT      8
                0005 OP_CONSTANT      4
                0010 OP_SUBTRACT
                0011 OP_CONSTANT      2
                0016 OP_SUBTRACT
                0017 OP_RETURN        int
            "}
        );
    }

    #[test]
    fn grouping() {
        assert_eq!(
            listing("(1 + 2) * 3"),
            indoc! {"
                0000 OP_CONSTANT      1
                0005 OP_CONSTANT      2
                0010 OP_ADD
                0011 OP_CONSTANT      3
                0016 OP_MULTIPLY
                0017 OP_RETURN        int
            "}
        );
    }

    #[test]
    fn comparisons_lower_to_strict_and_not() {
        assert_eq!(
            listing("1 >= 2"),
            indoc! {"
                0000 OP_CONSTANT      1
                0005 OP_CONSTANT      2
                0010 OP_LESS
                0011 OP_NOT
                0012 OP_RETURN        bool
            "}
        );
        assert_eq!(
            listing("1 <= 2"),
            indoc! {"
                0000 OP_CONSTANT      1
                0005 OP_CONSTANT      2
                0010 OP_GREATER
                0011 OP_NOT
                0012 OP_RETURN        bool
            "}
        );
    }

    #[test]
    fn equality_carries_operand_type() {
        assert_eq!(
            listing("!true != false"),
            indoc! {"
                0000 OP_TRUE
                0001 OP_NOT
                0002 OP_FALSE
                0003 OP_EQUAL         bool
                0005 OP_NOT
                0006 OP_RETURN        bool
            "}
        );
        assert_eq!(
            listing("1 < 2 == 3 > 4"),
            indoc! {"
                0000 OP_CONSTANT      1
                0005 OP_CONSTANT      2
                0010 OP_LESS
                0011 OP_CONSTANT      3
                0016 OP_CONSTANT      4
                0021 OP_GREATER
                0022 OP_EQUAL         bool
                0024 OP_RETURN        bool
            "}
        );
    }

    #[test]
    fn unary_negation() {
        assert_eq!(
            listing("--5"),
            indoc! {"
                0000 OP_CONSTANT      5
                0005 OP_NEGATE
                0006 OP_NEGATE
                0007 OP_RETURN        int
            "}
        );
    }

    #[test]
    fn result_type() {
        let (compilation, _) = compile_str("(1 == 1)", ErrorPolicy::Continue);
        assert_eq!(compilation.result_type, ValueType::Bool);

        let (compilation, _) = compile_str("-(2)", ErrorPolicy::Continue);
        assert_eq!(compilation.result_type, ValueType::Int);
    }

    #[test]
    fn type_errors() {
        assert_eq!(errors("1 + true"), vec!["[line 1] Error at '+': Expect a number."]);
        assert_eq!(errors("-false"), vec!["[line 1] Error at '-': Expect a number."]);
        assert_eq!(errors("!1"), vec!["[line 1] Error at '!': Expect a boolean."]);
        assert_eq!(
            errors("1 == true"),
            vec!["[line 1] Error at '==': Expect a matching type for equality comparison."]
        );
        assert_eq!(
            errors("true < false"),
            vec!["[line 1] Error at '<': Expect a number."]
        );
    }

    #[test]
    fn syntax_errors() {
        assert_eq!(errors(""), vec!["[line 1] Error at end: Expect expression."]);
        assert_eq!(errors("1 +"), vec!["[line 1] Error at end: Expect expression."]);
        assert_eq!(
            errors("(1 + 2"),
            vec!["[line 1] Error at end: Expect ')' after expression."]
        );
        assert_eq!(
            errors("1\n+\n2 2"),
            vec!["[line 3] Error at '2': Expect end of expression."]
        );
        assert_eq!(
            errors("\"text\""),
            vec!["[line 1] Error at '\"text\"': Expect expression."]
        );
        assert_eq!(errors("x"), vec!["[line 1] Error at 'x': Expect expression."]);
    }

    #[test]
    fn literal_errors() {
        assert_eq!(
            errors("2147483648"),
            vec!["[line 1] Error at '2147483648': Integer literal out of range."]
        );
        assert_eq!(
            errors("1.5"),
            vec!["[line 1] Error at '1.5': Float literals are not supported."]
        );
        assert!(errors("2147483647").is_empty());
    }

    #[test]
    fn lexical_errors() {
        assert_eq!(
            errors("\"open"),
            vec![
                "[line 1] Error: Unterminated string.",
                "[line 1] Error at end: Expect expression.",
            ]
        );
    }

    #[test]
    fn panic_mode_suppresses_cascades() {
        // The `+` would also be reported without panic mode.
        assert_eq!(
            errors("-true + false"),
            vec!["[line 1] Error at '-': Expect a number."]
        );
    }

    #[test]
    fn error_tokens_resynchronize() {
        assert_eq!(
            errors("1 + @ + true"),
            vec![
                "[line 1] Error: Unexpected character.",
                "[line 1] Error at '+': Expect expression.",
            ]
        );
    }

    #[test]
    fn abort_policy_stops_at_first_error() {
        assert_eq!(
            errors_with("1 + @ + true", ErrorPolicy::Abort),
            vec!["[line 1] Error: Unexpected character."]
        );
    }

    #[test]
    fn nesting_is_limited() {
        assert_eq!(
            errors(&"(".repeat(100_000)),
            vec!["[line 1] Error at '(': Expression nested too deeply."]
        );
        assert_eq!(
            errors(&"-".repeat(100_000)),
            vec!["[line 1] Error at '-': Expression nested too deeply."]
        );

        let (compilation, code) = compile_str(&"!".repeat(100_000), ErrorPolicy::Continue);
        assert!(compilation.had_error());
        assert!(disassemble(&code).ends_with("OP_RETURN        bool\n"));
    }

    #[test]
    fn nesting_below_the_limit_compiles() {
        let depth = MAX_NESTING - 1;
        let source = format!("{}1{}", "(".repeat(depth), ")".repeat(depth));
        assert!(errors(&source).is_empty());
    }

    #[test]
    fn code_is_terminated_despite_errors() {
        for policy in [ErrorPolicy::Continue, ErrorPolicy::Abort] {
            let (compilation, code) = compile_str("1 == true", policy);
            assert!(compilation.had_error());
            assert!(disassemble(&code).ends_with("OP_RETURN        bool\n"));
        }
    }

    #[test]
    fn compile_replaces_previous_code() {
        let mut code = ByteBuffer::new();
        compile("1 + 2", &mut code, ErrorPolicy::Continue);
        compile("true", &mut code, ErrorPolicy::Continue);
        assert_eq!(disassemble(&code), "0000 OP_TRUE\n0001 OP_RETURN        bool\n");
    }
}
