//! Schema-typed hierarchical state store.
//!
//! Application state is a tree of typed values hanging off named top-level
//! entries. Every value knows its parent and its path (`Users[<id>][Name]`),
//! carries the revision of its last change, and is flagged for saving when
//! it or anything below it changes.
//!
//! # Values
//!
//! Nine variants, described by a [`Schema`]:
//!
//! - scalars -- String, Number, Bool, Date, Enum, GUID
//! - [`Variant::Array`] -- ordered list of elements of one schema
//! - [`Variant::Hash`] -- string-keyed map; an identity hash keys objects by
//!   their leading GUID field
//! - [`Variant::Object`] -- fixed record of named fields ([`ObjectDef`])
//!
//! Every value decodes from and encodes to the [`tally_json::Json`] model,
//! with a small set of lenient coercions (`"12"` for a number, `1` for a
//! bool, and so on).
//!
//! # Concurrency
//!
//! One [`Root`] owns the [`State`] behind a mutex. [`Root::lock`] opens a
//! batch and returns a [`StateGuard`]; dropping the guard commits at most
//! one revision bump.
//!
//! # Persistence
//!
//! Entries registered with a backing name are written as JSON under the
//! config directory ([`StoreConfig`]). Hashes get one file per element.
//! [`Root::save_loop`] flushes dirty entries periodically.
//!
//! # Definitions
//!
//! [`StateDefinition`] builds schemas and top-level entries from a JSON
//! definition document.

pub mod config;
pub mod definition;
pub mod error;
pub mod handle;
pub mod node;
pub mod persist;
pub mod root;
pub mod schema;
pub mod state;

mod array;
mod hash;
mod object;
mod scalar;

pub use config::StoreConfig;
pub use definition::{StateDefinition, StateType, TypeDef};
pub use error::{StateError, StateResult};
pub use handle::{Parent, ValueId};
pub use node::Variant;
pub use persist::{LoadReport, SaveReport};
pub use root::{Root, StateGuard};
pub use schema::{FieldDef, ObjectDef, Schema};
pub use state::{RootEntry, State};
