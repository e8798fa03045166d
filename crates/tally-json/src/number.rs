use std::fmt;
use std::num::{ParseFloatError, ParseIntError};

/// A JSON numeric literal.
///
/// The source text is kept verbatim, so a value decoded from a document is
/// re-emitted with exactly the same precision. Typed getters parse on demand
/// and report a parse error when the text does not fit the requested type.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Number(String);

impl Number {
    /// Build a number from literal text, validating it against the JSON
    /// number grammar. Returns `None` for anything that is not a number.
    pub fn parse(text: &str) -> Option<Self> {
        is_valid_literal(text).then(|| Self(text.to_string()))
    }

    /// Build a number from a float. Non-finite values have no JSON
    /// representation and yield `None`.
    pub fn from_f64(value: f64) -> Option<Self> {
        value.is_finite().then(|| Self(value.to_string()))
    }

    /// Used by the decoder once the tokenizer has validated the literal.
    pub(crate) fn from_literal(text: String) -> Self {
        Self(text)
    }

    /// The literal text.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_i64(&self) -> Result<i64, ParseIntError> {
        self.0.parse()
    }

    pub fn as_u64(&self) -> Result<u64, ParseIntError> {
        self.0.parse()
    }

    pub fn as_i32(&self) -> Result<i32, ParseIntError> {
        self.0.parse()
    }

    pub fn as_u32(&self) -> Result<u32, ParseIntError> {
        self.0.parse()
    }

    pub fn as_f64(&self) -> Result<f64, ParseFloatError> {
        self.0.parse()
    }

    /// Returns `true` if the literal has no fraction or exponent part.
    pub fn is_integer(&self) -> bool {
        !self.0.contains(&['.', 'e', 'E'][..])
    }
}

macro_rules! number_from_int {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Number {
                fn from(value: $t) -> Self {
                    Self(value.to_string())
                }
            }
        )*
    };
}

number_from_int!(i8, i16, i32, i64, u8, u16, u32, u64, isize, usize);

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Number({})", self.0)
    }
}

/// Check `text` against the JSON number grammar:
/// `-? (0 | [1-9][0-9]*) (\. [0-9]+)? ([eE] [+-]? [0-9]+)?`
pub(crate) fn is_valid_literal(text: &str) -> bool {
    let bytes = text.as_bytes();
    let mut i = 0;

    if bytes.get(i) == Some(&b'-') {
        i += 1;
    }
    match bytes.get(i) {
        Some(b'0') => i += 1,
        Some(b'1'..=b'9') => {
            while matches!(bytes.get(i), Some(b'0'..=b'9')) {
                i += 1;
            }
        }
        _ => return false,
    }

    if bytes.get(i) == Some(&b'.') {
        i += 1;
        let start = i;
        while matches!(bytes.get(i), Some(b'0'..=b'9')) {
            i += 1;
        }
        if i == start {
            return false;
        }
    }

    if matches!(bytes.get(i), Some(b'e' | b'E')) {
        i += 1;
        if matches!(bytes.get(i), Some(b'+' | b'-')) {
            i += 1;
        }
        let start = i;
        while matches!(bytes.get(i), Some(b'0'..=b'9')) {
            i += 1;
        }
        if i == start {
            return false;
        }
    }

    i == bytes.len()
}
