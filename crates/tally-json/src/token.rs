//! Tokenizer for JSON text.
//!
//! [`Tokenizer`] walks a `&str` and yields [`Spanned`] tokens carrying the
//! byte offset at which each token starts. String escapes are resolved here,
//! and numeric literals are validated against the JSON grammar, so the
//! decoder only deals with structure.

use std::fmt;

use crate::error::{JsonError, JsonResult};
use crate::number::is_valid_literal;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Token {
    LeftBrace,
    RightBrace,
    Colon,
    Comma,
    LeftBracket,
    RightBracket,
    String(String),
    /// Validated numeric literal text.
    Number(String),
    True,
    False,
    Null,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LeftBrace => f.write_str("'{'"),
            Self::RightBrace => f.write_str("'}'"),
            Self::Colon => f.write_str("':'"),
            Self::Comma => f.write_str("','"),
            Self::LeftBracket => f.write_str("'['"),
            Self::RightBracket => f.write_str("']'"),
            Self::String(s) => write!(f, "string {s:?}"),
            Self::Number(n) => write!(f, "number {n}"),
            Self::True => f.write_str("true"),
            Self::False => f.write_str("false"),
            Self::Null => f.write_str("null"),
        }
    }
}

/// A token and the byte offset where it starts.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Spanned {
    pub token: Token,
    pub offset: usize,
}

pub struct Tokenizer<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Tokenizer<'a> {
    pub fn new(input: &'a str) -> Self {
        let pos = if input.starts_with('\u{feff}') { 3 } else { 0 };
        Self { input, pos }
    }

    /// Current byte offset into the input.
    pub fn offset(&self) -> usize {
        self.pos
    }

    /// Skip whitespace and report whether any input remains.
    pub fn at_end(&mut self) -> bool {
        self.skip_whitespace();
        self.pos >= self.input.len()
    }

    /// Next token, `Ok(None)` at end of input.
    pub fn next_token(&mut self) -> JsonResult<Option<Spanned>> {
        self.skip_whitespace();
        let offset = self.pos;
        let Some(c) = self.bump() else {
            return Ok(None);
        };

        let token = match c {
            '{' => Token::LeftBrace,
            '}' => Token::RightBrace,
            ':' => Token::Colon,
            ',' => Token::Comma,
            '[' => Token::LeftBracket,
            ']' => Token::RightBracket,
            '"' => self.lex_string()?,
            '-' | '0'..='9' => {
                self.pos = offset;
                self.lex_number()?
            }
            't' | 'T' => self.lex_literal(offset, "true", Token::True)?,
            'f' | 'F' => self.lex_literal(offset, "false", Token::False)?,
            'n' | 'N' => self.lex_literal(offset, "null", Token::Null)?,
            found => return Err(JsonError::UnexpectedChar { found, offset }),
        };

        Ok(Some(Spanned { token, offset }))
    }

    fn peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn skip_whitespace(&mut self) {
        while let Some(' ' | '\t' | '\n' | '\r') = self.peek() {
            self.pos += 1;
        }
    }

    fn lex_literal(
        &mut self,
        offset: usize,
        word: &'static str,
        token: Token,
    ) -> JsonResult<Token> {
        let matched = self
            .input
            .get(offset..offset + word.len())
            .is_some_and(|s| s.eq_ignore_ascii_case(word));
        if !matched {
            return Err(JsonError::InvalidLiteral {
                expected: word,
                offset,
            });
        }
        self.pos = offset + word.len();
        Ok(token)
    }

    fn lex_number(&mut self) -> JsonResult<Token> {
        let start = self.pos;
        while let Some('-' | '+' | '.' | 'e' | 'E' | '0'..='9') = self.peek() {
            self.pos += 1;
        }
        let text = &self.input[start..self.pos];
        if !is_valid_literal(text) {
            return Err(JsonError::InvalidNumber {
                text: text.to_string(),
                offset: start,
            });
        }
        Ok(Token::Number(text.to_string()))
    }

    fn lex_string(&mut self) -> JsonResult<Token> {
        let mut out = String::new();
        loop {
            let at = self.pos;
            let c = self
                .bump()
                .ok_or(JsonError::UnexpectedEnd { context: "string" })?;
            match c {
                '"' => return Ok(Token::String(out)),
                '\\' => {
                    let escaped = self
                        .bump()
                        .ok_or(JsonError::UnexpectedEnd { context: "string" })?;
                    match escaped {
                        '"' => out.push('"'),
                        '\\' => out.push('\\'),
                        '/' => out.push('/'),
                        'b' => out.push('\u{8}'),
                        'f' => out.push('\u{c}'),
                        'n' => out.push('\n'),
                        'r' => out.push('\r'),
                        't' => out.push('\t'),
                        'u' => out.push(self.lex_unicode_escape(at)?),
                        _ => return Err(JsonError::InvalidEscape { offset: at }),
                    }
                }
                c if (c as u32) < 0x20 => {
                    return Err(JsonError::ControlCharacter { offset: at });
                }
                c => out.push(c),
            }
        }
    }

    /// Decode the hex digits following `\u`, joining surrogate pairs.
    fn lex_unicode_escape(&mut self, offset: usize) -> JsonResult<char> {
        let high = self.read_hex4(offset)?;
        let code = match high {
            0xD800..=0xDBFF => {
                if self.input.get(self.pos..self.pos + 2) != Some("\\u") {
                    return Err(JsonError::InvalidEscape { offset });
                }
                self.pos += 2;
                let low = self.read_hex4(offset)?;
                if !(0xDC00..=0xDFFF).contains(&low) {
                    return Err(JsonError::InvalidEscape { offset });
                }
                0x10000 + ((high - 0xD800) << 10) + (low - 0xDC00)
            }
            0xDC00..=0xDFFF => return Err(JsonError::InvalidEscape { offset }),
            other => other,
        };
        char::from_u32(code).ok_or(JsonError::InvalidEscape { offset })
    }

    fn read_hex4(&mut self, offset: usize) -> JsonResult<u32> {
        let digits = self
            .input
            .get(self.pos..self.pos + 4)
            .filter(|s| s.bytes().all(|b| b.is_ascii_hexdigit()))
            .ok_or(JsonError::InvalidEscape { offset })?;
        let value =
            u32::from_str_radix(digits, 16).map_err(|_| JsonError::InvalidEscape { offset })?;
        self.pos += 4;
        Ok(value)
    }
}

impl Iterator for Tokenizer<'_> {
    type Item = JsonResult<Spanned>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_token().transpose()
    }
}
