//! Recursive-descent decoder from JSON text to [`Json`].

use std::collections::HashMap;

use crate::error::{JsonError, JsonResult};
use crate::number::Number;
use crate::token::{Spanned, Token, Tokenizer};
use crate::value::Json;

/// Maximum nesting of arrays and objects accepted by the decoder.
pub const MAX_DEPTH: usize = 512;

/// Decode a complete JSON document from bytes.
pub fn decode(data: &[u8]) -> JsonResult<Json> {
    let text = std::str::from_utf8(data).map_err(|e| JsonError::Utf8(e.to_string()))?;
    decode_str(text)
}

/// Decode a complete JSON document from text.
///
/// Exactly one value must be present; anything but whitespace after it is
/// reported as [`JsonError::TrailingData`].
pub fn decode_str(text: &str) -> JsonResult<Json> {
    let mut decoder = Decoder {
        tokens: Tokenizer::new(text),
        depth: 0,
    };
    let value = decoder.value(None)?;
    if !decoder.tokens.at_end() {
        return Err(JsonError::TrailingData {
            offset: decoder.tokens.offset(),
        });
    }
    Ok(value)
}

struct Decoder<'a> {
    tokens: Tokenizer<'a>,
    depth: usize,
}

impl Decoder<'_> {
    fn next(&mut self, context: &'static str) -> JsonResult<Spanned> {
        self.tokens
            .next_token()?
            .ok_or(JsonError::UnexpectedEnd { context })
    }

    fn value(&mut self, first: Option<Spanned>) -> JsonResult<Json> {
        let spanned = match first {
            Some(spanned) => spanned,
            None => self.next("a value")?,
        };

        match spanned.token {
            Token::True => Ok(Json::True),
            Token::False => Ok(Json::False),
            Token::Null => Ok(Json::Null),
            Token::String(s) => Ok(Json::String(s)),
            Token::Number(n) => Ok(Json::Number(Number::from_literal(n))),
            Token::LeftBrace => self.nested(Self::object),
            Token::LeftBracket => self.nested(Self::array),
            other => Err(JsonError::UnexpectedToken {
                found: other.to_string(),
                offset: spanned.offset,
                expected: "a value",
            }),
        }
    }

    fn nested(&mut self, f: fn(&mut Self) -> JsonResult<Json>) -> JsonResult<Json> {
        if self.depth >= MAX_DEPTH {
            return Err(JsonError::TooDeep { limit: MAX_DEPTH });
        }
        self.depth += 1;
        let result = f(self);
        self.depth -= 1;
        result
    }

    fn array(&mut self) -> JsonResult<Json> {
        let mut items = Vec::new();
        let first = self.next("array")?;
        if first.token == Token::RightBracket {
            return Ok(Json::Array(items));
        }
        items.push(self.value(Some(first))?);

        loop {
            let sep = self.next("array")?;
            match sep.token {
                Token::RightBracket => return Ok(Json::Array(items)),
                Token::Comma => items.push(self.value(None)?),
                other => {
                    return Err(JsonError::UnexpectedToken {
                        found: other.to_string(),
                        offset: sep.offset,
                        expected: "',' or ']'",
                    })
                }
            }
        }
    }

    fn object(&mut self) -> JsonResult<Json> {
        let mut map = HashMap::new();
        let first = self.next("object")?;
        if first.token == Token::RightBrace {
            return Ok(Json::Object(map));
        }
        self.member(first, &mut map)?;

        loop {
            let sep = self.next("object")?;
            match sep.token {
                Token::RightBrace => return Ok(Json::Object(map)),
                Token::Comma => {
                    let key = self.next("object")?;
                    self.member(key, &mut map)?;
                }
                other => {
                    return Err(JsonError::UnexpectedToken {
                        found: other.to_string(),
                        offset: sep.offset,
                        expected: "',' or '}'",
                    })
                }
            }
        }
    }

    /// Parse `"key": value` given the already-read key token.
    fn member(&mut self, key: Spanned, map: &mut HashMap<String, Json>) -> JsonResult<()> {
        let Token::String(name) = key.token else {
            return Err(JsonError::UnexpectedToken {
                found: key.token.to_string(),
                offset: key.offset,
                expected: "an object key",
            });
        };
        let colon = self.next("object")?;
        if colon.token != Token::Colon {
            return Err(JsonError::UnexpectedToken {
                found: colon.token.to_string(),
                offset: colon.offset,
                expected: "':'",
            });
        }
        let value = self.value(None)?;
        map.insert(name, value);
        Ok(())
    }
}
