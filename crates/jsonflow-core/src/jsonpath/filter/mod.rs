//! The filter sub-language (§4.5.5): compiling a parsed `FilterExpr` into
//! something the dispatcher can evaluate against a candidate node without
//! consuming it.

pub mod eval;
pub mod functions;

pub use eval::{CompiledFilter, compile_filter, evaluate_truth};
pub use functions::{FunctionArgValue, FunctionRegistry, FunctionResult, JsonPathFunction, default_registry};
