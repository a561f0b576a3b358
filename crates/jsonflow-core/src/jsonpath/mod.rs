//! The JSONPath engine (C5): RFC 9535 query parsing, compilation, and
//! execution over the value iterator (C4).
//!
//! ```
//! use jsonflow_core::jsonpath;
//!
//! let query = jsonpath::parse_query("$.items[0].name").unwrap();
//! let runner = jsonpath::compile(&query, jsonpath::CompileOptions::default()).unwrap();
//! ```

pub mod ast;
mod compile;
mod descend;
mod dispatch;
mod filter;
mod parser;
mod runcontext;
mod selector;

pub use ast::Query;
pub use compile::{CompileOptions, MainQueryRunner, NodesResult, QueryRunner, SegmentRunner, compile};
pub use parser::{parse_query, parse_query_strict};
pub use runcontext::RunOptions;
pub use selector::SelectorRunner;
