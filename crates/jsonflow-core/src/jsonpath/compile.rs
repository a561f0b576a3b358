//! Compilation (§4.5.2): turning a parsed `ast::Query` into
//! `SelectorRunner`/`SegmentRunner`/`QueryRunner`/`MainQueryRunner`, the
//! structures the dispatcher and descendant-segment walker actually run.

use smallvec::SmallVec;

use crate::error::{Error, Result};
use crate::pipeline::{TokenReader, TokenWriter, Transformer};
use crate::token::Token;
use crate::value::Value;

use super::ast::{self, RootKind};
use super::descend;
use super::dispatch;
use super::filter::{FunctionRegistry, compile_filter};
use super::runcontext::{RunContext, RunOptions};
use super::selector::SelectorRunner;

/// Most segments carry one selector (`$.a`, `$[0]`, `$[*]`); multi-selector
/// segments (`$[0,1,2]`) are the exception, so four inline slots covers the
/// common case without spilling to the heap.
type SelectorList = SmallVec<[SelectorRunner; 4]>;

#[derive(Debug, Clone)]
pub struct SegmentRunner {
    pub descendant: bool,
    pub selectors: SelectorList,
}

/// A fully compiled query: root kind plus its compiled segments. Also used
/// for inner queries nested inside filter expressions.
#[derive(Debug, Clone)]
pub struct QueryRunner {
    pub root: RootKind,
    pub segments: Vec<SegmentRunner>,
}

/// `$`-rooted inner queries discovered while compiling filter expressions,
/// each registered once (deduplicated by structural AST equality) and
/// evaluated once per top-level input rather than once per candidate node
/// (§4.5.2's `InnerSingularQuery{index}`, §4.5.6's non-singular table).
/// `@`-rooted queries never go through this table — they depend on the
/// current node, not just the document root, so they're always evaluated
/// live.
#[derive(Default)]
pub struct InnerQueryTables {
    singular_src: Vec<ast::Query>,
    singular: Vec<QueryRunner>,
    non_singular_src: Vec<ast::Query>,
    non_singular: Vec<QueryRunner>,
}

impl InnerQueryTables {
    pub(crate) fn register_singular(&mut self, query: &ast::Query, runner: QueryRunner) -> usize {
        if let Some(i) = self.singular_src.iter().position(|q| q == query) {
            return i;
        }
        self.singular_src.push(query.clone());
        self.singular.push(runner);
        self.singular.len() - 1
    }

    pub(crate) fn register_non_singular(&mut self, query: &ast::Query, runner: QueryRunner) -> usize {
        if let Some(i) = self.non_singular_src.iter().position(|q| q == query) {
            return i;
        }
        self.non_singular_src.push(query.clone());
        self.non_singular.push(runner);
        self.non_singular.len() - 1
    }

    pub(crate) fn singular_runners(&self) -> &[QueryRunner] {
        &self.singular
    }

    pub(crate) fn non_singular_runners(&self) -> &[QueryRunner] {
        &self.non_singular
    }
}

impl QueryRunner {
    /// Run the query against `value`, calling `emit` for every matched
    /// node. `emit` returning `false` stops the walk early.
    pub fn run(&self, value: Value, ctx: &RunContext, emit: &mut dyn FnMut(Value) -> bool) -> bool {
        run_segments(&self.segments, value, ctx, emit)
    }

    /// Run the query, returning the first matched node (if any) and
    /// stopping immediately — the common case for comparison operands and
    /// `value()`, where only one node is ever meaningful.
    pub fn run_collect_first(&self, value: Value, ctx: &RunContext) -> Option<Value> {
        let mut found = None;
        self.run(value, ctx, &mut |v| {
            found = Some(v);
            false
        });
        found
    }

    /// Run the query purely for its match count, discarding every match.
    pub fn run_count(&self, value: Value, ctx: &RunContext) -> usize {
        let mut count = 0usize;
        self.run(value, ctx, &mut |mut v| {
            v.discard();
            count += 1;
            true
        });
        count
    }
}

fn run_segments(
    segments: &[SegmentRunner],
    value: Value,
    ctx: &RunContext,
    emit: &mut dyn FnMut(Value) -> bool,
) -> bool {
    match segments.split_first() {
        None => emit(value),
        Some((seg, rest)) => {
            run_one_segment(seg, value, ctx, &mut |v| run_segments(rest, v, ctx, emit))
        }
    }
}

fn run_one_segment(
    seg: &SegmentRunner,
    value: Value,
    ctx: &RunContext,
    emit: &mut dyn FnMut(Value) -> bool,
) -> bool {
    if seg.descendant {
        descend::run_descendant_segment(&seg.selectors, value, ctx, emit)
    } else {
        apply_child_segment(&seg.selectors, value, ctx, emit)
    }
}

fn apply_child_segment(
    selectors: &[SelectorRunner],
    mut value: Value,
    ctx: &RunContext,
    emit: &mut dyn FnMut(Value) -> bool,
) -> bool {
    match &mut value {
        Value::Scalar(_) => true,
        Value::Array(arr) => dispatch::run_array(selectors, arr, ctx, emit),
        Value::Object(obj) => dispatch::run_object(selectors, obj, ctx, emit),
    }
}

/// Top-level compiled query: owns no borrowed state, so it can serve as a
/// pipeline `Transformer` — each `transform` call reads one top-level
/// document from `input`, evaluates the query against it, and re-emits
/// each matched node as its own top-level value on `out`.
pub struct MainQueryRunner {
    query: QueryRunner,
    options: RunOptions,
    functions: FunctionRegistry,
    tables: InnerQueryTables,
}

impl MainQueryRunner {
    pub fn new(
        query: QueryRunner,
        options: RunOptions,
        functions: FunctionRegistry,
        tables: InnerQueryTables,
    ) -> Self {
        Self {
            query,
            options,
            functions,
            tables,
        }
    }

    /// Evaluate the query against an already-constructed root value,
    /// writing each match as a standalone top-level value to `out`.
    pub fn run_to(&self, root: Value, out: &mut Vec<Token>) -> Result<()> {
        let (singular, non_singular) =
            super::runcontext::precompute_inner_queries(&self.tables, &root, &self.options, &self.functions);
        let ctx = RunContext::new(&root, &self.options, &self.functions, &singular, &non_singular);
        self.query.run(root.clone_value(), &ctx, &mut |mut v| {
            v.copy(out);
            true
        });
        Ok(())
    }

    /// Count (or check existence of) matches without materializing them —
    /// the operation named by spec §6 for filter test-expressions and for
    /// `count()`.
    pub fn evaluate_nodes_result(&self, root: Value) -> NodesResult {
        let (singular, non_singular) =
            super::runcontext::precompute_inner_queries(&self.tables, &root, &self.options, &self.functions);
        let ctx = RunContext::new(&root, &self.options, &self.functions, &singular, &non_singular);
        let mut count = 0usize;
        self.query.run(root.clone_value(), &ctx, &mut |mut v| {
            v.discard();
            count += 1;
            true
        });
        NodesResult { count }
    }
}

impl Transformer for MainQueryRunner {
    fn transform(&mut self, input: TokenReader, out: TokenWriter) -> Result<()> {
        let cursor_pool = crate::cursor::CursorPool::new(
            crate::pipeline::channel::reader_as_upstream(input),
            crate::cursor::CursorPoolConfig::default(),
        );
        loop {
            let cursor = cursor_pool.new_cursor();
            if cursor.is_detached() {
                break;
            }
            let peek = cursor.clone_cursor();
            if peek.advance().is_none() {
                break;
            }
            drop(peek);
            let root = Value::read(cursor);
            let mut buf = Vec::new();
            self.run_to(root, &mut buf)?;
            for tok in buf {
                out.write(tok)?;
            }
        }
        Ok(())
    }
}

/// Existence/count summary of a query's matches, without the matched
/// nodes' content (see spec §6, `MainQueryRunner::evaluate_nodes_result`).
pub struct NodesResult {
    pub count: usize,
}

impl NodesResult {
    pub fn exists(&self) -> bool {
        self.count > 0
    }
}

/// Options steering compilation: descendant-order semantics (`RunOptions`)
/// plus the function extension registry consulted for any filter function
/// name beyond the three RFC 9535 built-ins (`length`, `count`, `value`) —
/// see the "global default function registry" redesign note (spec §9).
#[derive(Default)]
pub struct CompileOptions {
    pub run: RunOptions,
    pub functions: FunctionRegistry,
}

/// Compile a top-level query (must be `$`-rooted) into a `MainQueryRunner`.
pub fn compile(query: &ast::Query, options: CompileOptions) -> Result<MainQueryRunner> {
    if query.root != RootKind::Input {
        return Err(Error::parse("top-level query must start with '$'"));
    }
    let mut tables = InnerQueryTables::default();
    let runner = compile_inner_with(query, &options.functions, &mut tables)?;
    Ok(MainQueryRunner::new(runner, options.run, options.functions, tables))
}

/// Compile any query (top-level or one nested inside a filter) into a
/// `QueryRunner`, against the process-wide default (empty) function
/// registry. The inner-query table built along the way is discarded, so
/// this is only sound for filter-free queries — anything compiled through
/// [`compile`] (or [`compile_inner_with`] with a table the caller keeps)
/// gets the real precomputation.
pub fn compile_inner(query: &ast::Query) -> Result<QueryRunner> {
    let mut tables = InnerQueryTables::default();
    compile_inner_with(query, super::filter::default_registry(), &mut tables)
}

pub(super) fn compile_inner_with(
    query: &ast::Query,
    registry: &FunctionRegistry,
    tables: &mut InnerQueryTables,
) -> Result<QueryRunner> {
    let segments = query
        .segments
        .iter()
        .map(|seg| compile_segment(seg, registry, tables))
        .collect::<Result<Vec<_>>>()?;
    Ok(QueryRunner {
        root: query.root,
        segments,
    })
}

fn compile_segment(
    segment: &ast::Segment,
    registry: &FunctionRegistry,
    tables: &mut InnerQueryTables,
) -> Result<SegmentRunner> {
    let selectors = segment
        .selectors
        .iter()
        .map(|sel| compile_selector(sel, registry, tables))
        .collect::<Result<SelectorList>>()?;
    if segment.descendant {
        for sel in &selectors {
            if sel.lookahead() > 0 || sel.reverses_selection() {
                return Err(Error::unimplemented(
                    "negative-index/negative-step slice selectors under a descendant segment require unbounded buffering",
                ));
            }
        }
    }
    Ok(SegmentRunner {
        descendant: segment.descendant,
        selectors,
    })
}

fn compile_selector(
    selector: &ast::Selector,
    registry: &FunctionRegistry,
    tables: &mut InnerQueryTables,
) -> Result<SelectorRunner> {
    Ok(match selector {
        ast::Selector::Name(n) => SelectorRunner::Name(n.clone()),
        ast::Selector::Index(i) => SelectorRunner::Index(*i),
        ast::Selector::Wildcard => SelectorRunner::Wildcard,
        ast::Selector::Slice(s) => SelectorRunner::Slice(*s),
        ast::Selector::Filter(f) => SelectorRunner::Filter(compile_filter(f, registry, tables)?),
    })
}
