//! Lexer turning source text into tokens

use super::token::{Token, TokenKind};

/// On-demand tokenizer over an immutable source buffer.
pub struct Scanner<'a> {
    source: &'a str,
    start: usize,
    cursor: usize,
    line: u32,
    finished: bool,
}

impl<'a> Scanner<'a> {
    pub fn new(source: &'a str) -> Self {
        Scanner {
            source,
            start: 0,
            cursor: 0,
            line: 1,
            finished: false,
        }
    }

    /// Scan the next token. Once the input is exhausted this keeps returning
    /// [`TokenKind::Eof`].
    pub fn scan_token(&mut self) -> Token<'a> {
        self.skip_trivia();
        self.start = self.cursor;

        let Some(ch) = self.next_char(false) else {
            return self.make_token(TokenKind::Eof);
        };

        if ch.is_ascii_alphabetic() {
            return self.read_identifier();
        }
        if ch.is_ascii_digit() {
            return self.read_number();
        }

        let kind = match ch {
            b'(' => TokenKind::LeftParen,
            b')' => TokenKind::RightParen,
            b'{' => TokenKind::LeftBrace,
            b'}' => TokenKind::RightBrace,
            b';' => TokenKind::Semicolon,
            b',' => TokenKind::Comma,
            b'.' => TokenKind::Dot,
            b'-' => TokenKind::Minus,
            b'+' => TokenKind::Plus,
            b'/' => TokenKind::Slash,
            b'*' => TokenKind::Star,
            b'%' => TokenKind::Percent,
            b'!' => self.either(b'=', TokenKind::BangEqual, TokenKind::Bang),
            b'=' => self.either(b'=', TokenKind::EqualEqual, TokenKind::Equal),
            b'<' => self.either(b'=', TokenKind::LessEqual, TokenKind::Less),
            b'>' => self.either(b'=', TokenKind::GreaterEqual, TokenKind::Greater),
            b'&' => self.either(b'&', TokenKind::AmpAmp, TokenKind::Amp),
            b'|' => self.either(b'|', TokenKind::PipePipe, TokenKind::Pipe),
            b'"' => return self.read_string(),
            _ => {
                // Keep multi-byte characters whole so the lexeme stays valid UTF-8.
                while !self.source.is_char_boundary(self.cursor) {
                    self.cursor += 1;
                }
                TokenKind::Error
            }
        };

        self.make_token(kind)
    }

    /// Skip whitespace and `//` comments, counting newlines.
    fn skip_trivia(&mut self) {
        while let Some(ch) = self.next_char(true) {
            match ch {
                b' ' | b'\r' | b'\t' => self.cursor += 1,
                b'\n' => {
                    self.line += 1;
                    self.cursor += 1;
                }
                b'/' if self.peek_next() == Some(b'/') => {
                    while self.next_char(true).is_some_and(|ch| ch != b'\n') {
                        self.cursor += 1;
                    }
                }
                _ => break,
            }
        }
    }

    /// Read a maximal run of letters and digits, then classify it
    fn read_identifier(&mut self) -> Token<'a> {
        while self
            .next_char(true)
            .is_some_and(|ch| ch.is_ascii_alphanumeric())
        {
            self.cursor += 1;
        }

        let kind = TokenKind::keyword(&self.source[self.start..self.cursor]);
        self.make_token(kind)
    }

    /// Read a decimal number with an optional fractional part
    fn read_number(&mut self) -> Token<'a> {
        self.skip_digits();

        if self.next_char(true) == Some(b'.')
            && self.peek_next().is_some_and(|ch| ch.is_ascii_digit())
        {
            self.cursor += 1;
            self.skip_digits();
        }

        self.make_token(TokenKind::Number)
    }

    /// Read a string literal; the opening quote is already consumed
    fn read_string(&mut self) -> Token<'a> {
        while let Some(ch) = self.next_char(false) {
            match ch {
                b'"' => return self.make_token(TokenKind::String),
                b'\n' => self.line += 1,
                _ => {}
            }
        }

        self.make_token(TokenKind::Error)
    }

    fn skip_digits(&mut self) {
        while self.next_char(true).is_some_and(|ch| ch.is_ascii_digit()) {
            self.cursor += 1;
        }
    }

    /// Consume `expected` if it comes next and pick the matching kind.
    fn either(&mut self, expected: u8, matched: TokenKind, single: TokenKind) -> TokenKind {
        if self.next_char(true) == Some(expected) {
            self.cursor += 1;
            matched
        } else {
            single
        }
    }

    fn make_token(&self, kind: TokenKind) -> Token<'a> {
        Token::new(
            kind,
            &self.source[self.start..self.cursor],
            self.start,
            self.line,
        )
    }

    /// Get the next char and increase the cursor if `peek` is false
    fn next_char(&mut self, peek: bool) -> Option<u8> {
        let ch = *self.source.as_bytes().get(self.cursor)?;
        if !peek {
            self.cursor += 1;
        }
        Some(ch)
    }

    fn peek_next(&self) -> Option<u8> {
        self.source.as_bytes().get(self.cursor + 1).copied()
    }
}

/// Yields every token up to and including the first EOF.
impl<'a> Iterator for Scanner<'a> {
    type Item = Token<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        let token = self.scan_token();
        self.finished = token.kind == TokenKind::Eof;
        Some(token)
    }
}
