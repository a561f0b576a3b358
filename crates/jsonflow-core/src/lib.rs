//! A streaming JSON token pipeline with an RFC 9535 JSONPath engine built
//! directly on top of it.
//!
//! The crate is layered bottom-up:
//!
//! - [`token`] — the atomic event flowing through every stage (C1).
//! - [`pipeline`] — sources, sinks, transformers, and their composition
//!   into a running pipeline over bounded channels (C2).
//! - [`cursor`] — a sliding window over one upstream producer, shared by
//!   any number of independently positioned cursors (C3).
//! - [`value`] — a lazy object/array/scalar façade over a cursor (C4).
//! - [`jsonpath`] — RFC 9535 query parsing, compilation, and execution
//!   over the value iterator (C5).
#![warn(missing_docs, rust_2018_idioms)]
#![deny(unsafe_op_in_unsafe_fn)]

pub mod cursor;
pub mod error;
pub mod jsonpath;
pub mod pipeline;
pub mod token;
pub mod value;

pub use error::{Error, Result};

/// Re-exports of the types most callers need.
pub mod prelude {
    pub use crate::cursor::{Cursor, CursorPool, CursorPoolConfig};
    pub use crate::error::{Error, Result};
    pub use crate::jsonpath::{self, MainQueryRunner, Query};
    pub use crate::pipeline::{Sink, Source, Transformer};
    pub use crate::token::Token;
    pub use crate::value::Value;
}
