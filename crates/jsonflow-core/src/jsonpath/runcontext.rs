//! Per-evaluation context (§4.5.6): the document root (kept alive for the
//! duration of a query so `$`-rooted filter queries can re-read it through
//! the cursor pool's shared window), execution-tunable options, and the
//! precomputed inner-query tables filter evaluation consults instead of
//! re-running `$`-rooted queries from scratch per candidate node.

use crate::value::Value;

use super::compile::InnerQueryTables;
use super::filter::FunctionRegistry;
use super::filter::eval::{FilterValue, materialize};

/// Options controlling engine behavior at points the RFC leaves open or
/// where a streaming engine must trade strict conformance for bounded
/// memory.
pub struct RunOptions {
    /// `true` (default): descendant segments (`..`) visit in RFC 9535's
    /// exact order — all of a node's direct-child matches, then each
    /// child's subtree, in order. `false`: a cheaper single-pass order
    /// that interleaves a child's matches with its subtree before moving
    /// to the next sibling. Only the ordering of emitted results differs;
    /// the result *set* is identical either way.
    pub strict_descendant_order: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            strict_descendant_order: true,
        }
    }
}

/// Carries the document root through a query evaluation so `$`-rooted
/// sub-queries inside filters can be evaluated without having materialized
/// the whole document up front — the root cursor simply stays alive,
/// which is exactly what keeps its tokens resident in the shared window.
///
/// `singular`/`non_singular` are this run's precomputed inner-query
/// tables (§4.5.2, §4.5.6): index-aligned with the `InnerQueryTables` the
/// query was compiled with, evaluated once against `root` by
/// [`precompute_inner_queries`] before the query itself runs.
pub struct RunContext<'a> {
    pub root: &'a Value,
    pub options: &'a RunOptions,
    /// Function extensions beyond the three RFC 9535 built-ins, consulted
    /// by `length`/`count`/`value`'s unknown-name fallback (spec §4.5.5,
    /// §9's "global default function registry" redesign note).
    pub functions: &'a FunctionRegistry,
    pub(crate) singular: &'a [FilterValue],
    pub(crate) non_singular: &'a [Vec<FilterValue>],
}

impl<'a> RunContext<'a> {
    pub(crate) fn new(
        root: &'a Value,
        options: &'a RunOptions,
        functions: &'a FunctionRegistry,
        singular: &'a [FilterValue],
        non_singular: &'a [Vec<FilterValue>],
    ) -> Self {
        Self {
            root,
            options,
            functions,
            singular,
            non_singular,
        }
    }
}

/// Evaluate every inner query registered in `tables` against one top-level
/// input, in the dependency order the spec requires: singular queries
/// first, then non-singular queries.
///
/// Singular queries are filter-free by construction (`Query::is_singular`
/// permits only name/index segments), so they never consult the run
/// context — they're evaluated against an empty bootstrap context. Once
/// every singular value is known, non-singular queries are evaluated
/// against a context that exposes those singular values (a non-singular
/// query's own filters may reference them) but not other non-singular
/// entries, which the spec does not require supporting.
pub(super) fn precompute_inner_queries(
    tables: &InnerQueryTables,
    root: &Value,
    options: &RunOptions,
    functions: &FunctionRegistry,
) -> (Vec<FilterValue>, Vec<Vec<FilterValue>>) {
    let no_singular: Vec<FilterValue> = Vec::new();
    let no_non_singular: Vec<Vec<FilterValue>> = Vec::new();

    let bootstrap = RunContext::new(root, options, functions, &no_singular, &no_non_singular);
    let singular: Vec<FilterValue> = tables
        .singular_runners()
        .iter()
        .map(
            |runner| match runner.run_collect_first(root.clone_value(), &bootstrap) {
                Some(mut v) => materialize(&mut v),
                None => FilterValue::Nothing,
            },
        )
        .collect();

    let with_singular = RunContext::new(root, options, functions, &singular, &no_non_singular);
    let non_singular: Vec<Vec<FilterValue>> = tables
        .non_singular_runners()
        .iter()
        .map(|runner| {
            let mut nodes = Vec::new();
            runner.run(root.clone_value(), &with_singular, &mut |mut v| {
                nodes.push(materialize(&mut v));
                true
            });
            nodes
        })
        .collect();

    (singular, non_singular)
}
