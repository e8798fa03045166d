use thiserror::Error;

/// Errors produced while tokenizing or decoding JSON text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JsonError {
    /// Input ended in the middle of a value.
    #[error("JSON ended unexpectedly while reading {context}")]
    UnexpectedEnd { context: &'static str },

    /// A character that cannot start any token.
    #[error("unexpected character {found:?} at offset {offset}")]
    UnexpectedChar { found: char, offset: usize },

    /// A well-formed token in a position the grammar does not allow.
    #[error("unexpected {found} at offset {offset}, expected {expected}")]
    UnexpectedToken {
        found: String,
        offset: usize,
        expected: &'static str,
    },

    /// A misspelled literal such as `tru` or `nul`.
    #[error("cannot parse literal {expected:?} at offset {offset}")]
    InvalidLiteral {
        expected: &'static str,
        offset: usize,
    },

    /// A backslash escape that JSON does not define, or a bad `\u` sequence.
    #[error("invalid escape sequence at offset {offset}")]
    InvalidEscape { offset: usize },

    /// Raw control character inside a string literal.
    #[error("control character in string at offset {offset}")]
    ControlCharacter { offset: usize },

    /// Numeric literal that does not follow the JSON number grammar.
    #[error("invalid number {text:?} at offset {offset}")]
    InvalidNumber { text: String, offset: usize },

    /// Non-whitespace input after the top-level value.
    #[error("trailing data at offset {offset}")]
    TrailingData { offset: usize },

    /// Arrays/objects nested deeper than [`crate::MAX_DEPTH`].
    #[error("JSON nested deeper than {limit} levels")]
    TooDeep { limit: usize },

    /// Input bytes are not UTF-8.
    #[error("JSON input is not valid UTF-8: {0}")]
    Utf8(String),
}

/// Result alias for JSON operations.
pub type JsonResult<T> = Result<T, JsonError>;
