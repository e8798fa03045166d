//! JSON value model for the tally state store.
//!
//! Every value in the state tree defines its wire contract in terms of the
//! [`Json`] type from this crate. The model is deliberately small:
//!
//! - [`Json`] -- String, Number, Object, Array, True, False, Null
//! - [`Number`] -- numeric literal that keeps its source text, parsed on demand
//! - [`JsonType`] -- the discriminant, used in decode error reporting
//!
//! # Encoding
//!
//! Serialization is deterministic: object keys are emitted in sorted order,
//! numbers are emitted exactly as stored, and an optional indented form is
//! available for files meant to be read by people. See [`Json::to_json`].
//!
//! # Decoding
//!
//! [`decode`] is a hand-written tokenizer and recursive-descent parser. It
//! accepts standard JSON, plus case-insensitive `true`/`false`/`null`
//! literals.
//!
//! # serde
//!
//! [`Json`] implements `Serialize` and `Deserialize`, so documents can be
//! exchanged with `serde_json` or any other serde format.

pub mod decode;
pub mod encode;
pub mod error;
pub mod number;
pub mod serde_impl;
pub mod token;
pub mod value;

pub use decode::{decode, decode_str, MAX_DEPTH};
pub use encode::quote;
pub use error::{JsonError, JsonResult};
pub use number::Number;
pub use value::{Json, JsonType};

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn arb_json() -> impl Strategy<Value = Json> {
        let leaf = prop_oneof![
            Just(Json::Null),
            Just(Json::True),
            Just(Json::False),
            any::<i64>().prop_map(Json::from),
            any::<String>().prop_map(Json::String),
        ];
        leaf.prop_recursive(4, 64, 8, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..8).prop_map(Json::Array),
                prop::collection::hash_map(any::<String>(), inner, 0..8).prop_map(Json::Object),
            ]
        })
    }

    proptest! {
        #[test]
        fn decode_inverts_encode(value in arb_json(), indent in any::<bool>()) {
            let text = value.to_json(indent);
            prop_assert_eq!(decode_str(&text).unwrap(), value);
        }
    }
}
