//! Tokens produced by the scanner.

/// Every kind of token the scanner produces.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum TokenKind {
    // Single-character tokens.
    LeftParen,
    RightParen,
    LeftBrace,
    RightBrace,
    Comma,
    Dot,
    Minus,
    Plus,
    Semicolon,
    Slash,
    Star,
    Percent,

    // One or two character tokens.
    Bang,
    BangEqual,
    Equal,
    EqualEqual,
    Greater,
    GreaterEqual,
    Less,
    LessEqual,
    Amp,
    AmpAmp,
    Pipe,
    PipePipe,

    // Literals.
    Identifier,
    String,
    Number,

    // Keywords.
    Else,
    False,
    For,
    If,
    Print,
    Return,
    True,
    While,
    Int,
    Float,
    Bool,
    Char,

    Error,
    Eof,
}

impl TokenKind {
    /// Classify an identifier-shaped lexeme, falling back to
    /// [`TokenKind::Identifier`].
    pub fn keyword(ident: &str) -> TokenKind {
        let bytes = ident.as_bytes();
        let check = |start: usize, rest: &str, kind: TokenKind| {
            if &bytes[start.min(bytes.len())..] == rest.as_bytes() {
                kind
            } else {
                TokenKind::Identifier
            }
        };

        match bytes {
            [b'b', ..] => check(1, "ool", TokenKind::Bool),
            [b'c', ..] => check(1, "har", TokenKind::Char),
            [b'e', ..] => check(1, "lse", TokenKind::Else),
            [b'f', b'a', ..] => check(2, "lse", TokenKind::False),
            [b'f', b'o', ..] => check(2, "r", TokenKind::For),
            [b'f', b'l', ..] => check(2, "oat", TokenKind::Float),
            [b'i', b'f', ..] => check(2, "", TokenKind::If),
            [b'i', b'n', ..] => check(2, "t", TokenKind::Int),
            [b'p', ..] => check(1, "rint", TokenKind::Print),
            [b'r', ..] => check(1, "eturn", TokenKind::Return),
            [b't', b'r', ..] => check(2, "ue", TokenKind::True),
            [b'w', ..] => check(1, "hile", TokenKind::While),
            _ => TokenKind::Identifier,
        }
    }
}

/// A classified slice of the source.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct Token<'a> {
    pub kind: TokenKind,
    /// Text of the token, borrowed from the source.
    pub lexeme: &'a str,
    /// Byte offset of the lexeme in the source.
    pub start: usize,
    /// 1-based line the token ends on.
    pub line: u32,
}

impl<'a> Token<'a> {
    pub fn new(kind: TokenKind, lexeme: &'a str, start: usize, line: u32) -> Self {
        Token {
            kind,
            lexeme,
            start,
            line,
        }
    }

    /// Half-open byte range of the lexeme in the source.
    pub fn span(&self) -> std::ops::Range<usize> {
        self.start..self.start + self.lexeme.len()
    }
}
