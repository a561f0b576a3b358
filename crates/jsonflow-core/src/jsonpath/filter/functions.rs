//! Extension seam for function extensions beyond RFC 9535's built-in
//! `length`/`count`/`value` (which `eval.rs` evaluates directly, since
//! they need access to live `Value`s the simplified args here can't
//! carry). `match`/`search` are deliberately not shipped here — the
//! teacher's dependency stack carries no `regex` crate — but a caller
//! embedding this engine can register its own via `FunctionRegistry`.

use crate::token::Scalar;

/// A function argument already reduced to a value usable outside the
/// engine's internal `Value`/cursor machinery.
pub enum FunctionArgValue {
    /// A single scalar, or `Nothing` if the argument's query matched no
    /// node or wasn't a scalar.
    Scalar(Option<Scalar>),
    /// The match count of the argument's node list.
    NodesCount(usize),
}

/// The result of an extension function call.
pub enum FunctionResult {
    /// A scalar, usable on either side of a comparison.
    Value(Option<Scalar>),
    /// A `true`/`false` usable directly in a logical position.
    Logical(bool),
}

/// An RFC 9535 function extension.
pub trait JsonPathFunction: Send + Sync {
    /// Number of arguments this function accepts, or `None` if variadic.
    fn arity(&self) -> Option<usize>;
    fn call(&self, args: &[FunctionArgValue]) -> FunctionResult;
}

/// Registered extension functions, consulted for any function name the
/// compiler doesn't recognize as one of the three built-ins. Empty by
/// default: register with [`FunctionRegistry::register`].
#[derive(Default)]
pub struct FunctionRegistry {
    functions: std::collections::HashMap<String, Box<dyn JsonPathFunction>>,
}

impl FunctionRegistry {
    pub fn register(&mut self, name: impl Into<String>, f: Box<dyn JsonPathFunction>) {
        self.functions.insert(name.into(), f);
    }

    pub fn get(&self, name: &str) -> Option<&dyn JsonPathFunction> {
        self.functions.get(name).map(|b| b.as_ref())
    }
}

/// Process-wide default registry (empty — no extension functions ship
/// built in) for callers that compile a query without wiring their own
/// registry. Lazily built once per process rather than allocated afresh
/// per `compile_inner` call.
static DEFAULT_REGISTRY: once_cell::sync::Lazy<FunctionRegistry> =
    once_cell::sync::Lazy::new(FunctionRegistry::default);

/// The process-wide default function registry. See the "global default
/// function registry" redesign note: an explicit registry is always
/// preferred, but this default makes `compile_inner` usable without one.
pub fn default_registry() -> &'static FunctionRegistry {
    &DEFAULT_REGISTRY
}
