//! Compiled filter expressions and their evaluation against a candidate
//! node (§4.5.5): `ComparableEvaluator` resolves the two sides of a
//! comparison to RFC 9535's `ValueType` (a scalar, a materialized
//! structure, or `Nothing`); `LogicalEvaluator` combines comparisons and
//! existence tests; `NodesResultEvaluator` drives a nested query to
//! determine existence or a count.

use crate::error::{Error, Result};
use crate::jsonpath::ast::{self, CompareOp, FunctionArg, FunctionCall, Literal, RootKind};
use crate::jsonpath::compile::{InnerQueryTables, QueryRunner};
use crate::jsonpath::runcontext::RunContext;
use crate::token::{Scalar, ScalarType, Token};
use crate::value::Value;

use super::functions::{FunctionArgValue, FunctionRegistry, FunctionResult};

#[derive(Debug, Clone)]
pub enum CompiledFilter {
    Or(Vec<CompiledFilter>),
    And(Vec<CompiledFilter>),
    Not(Box<CompiledFilter>),
    Compare {
        left: CompiledComparable,
        op: CompareOp,
        right: CompiledComparable,
    },
    Test {
        query: TestQuery,
        negated: bool,
    },
}

/// A test-expression's query, split by whether it could be precomputed.
#[derive(Debug, Clone)]
pub enum TestQuery {
    /// `@`-rooted: re-run against each candidate node.
    Current(Box<QueryRunner>),
    /// `$`-rooted singular query: index into the per-run singular table.
    InnerSingular(usize),
    /// `$`-rooted non-singular query: index into the per-run materialized
    /// node-list table.
    InnerNodes(usize),
}

#[derive(Debug, Clone)]
pub enum CompiledComparable {
    Literal(Literal),
    /// `@`-rooted: evaluated against the current candidate node every
    /// time — it depends on where the walk is, so it can't be
    /// precomputed once per top-level input the way a `$`-rooted query
    /// can (§4.5.2).
    CurrentQuery(Box<QueryRunner>),
    /// `$`-rooted singular query: index into the per-run precomputed
    /// singular-query table (§4.5.2 `InnerSingularQuery{index}`).
    InnerSingular(usize),
    /// `$`-rooted non-singular query: index into the per-run materialized
    /// node-list table (§4.5.6); used as a bare comparable this resolves
    /// to its first matched node.
    InnerNodes(usize),
    Function(CompiledFunctionCall),
}

#[derive(Debug, Clone)]
pub struct CompiledFunctionCall {
    pub name: String,
    pub args: Vec<CompiledComparable>,
}

/// Compile a parsed filter expression, rejecting anything this engine
/// can't evaluate (unknown functions not present in `registry`,
/// non-singular query operands in comparison position — both per RFC
/// 9535's well-typedness rules). `tables` accumulates every `$`-rooted
/// inner query discovered along the way, deduplicated by structural
/// equality, so it's evaluated once per top-level input instead of once
/// per candidate node (§4.5.2, §4.5.6).
pub fn compile_filter(
    expr: &ast::FilterExpr,
    registry: &FunctionRegistry,
    tables: &mut InnerQueryTables,
) -> Result<CompiledFilter> {
    Ok(match expr {
        ast::FilterExpr::Or(list) => CompiledFilter::Or(
            list.iter()
                .map(|e| compile_filter(e, registry, tables))
                .collect::<Result<_>>()?,
        ),
        ast::FilterExpr::And(list) => CompiledFilter::And(
            list.iter()
                .map(|e| compile_filter(e, registry, tables))
                .collect::<Result<_>>()?,
        ),
        ast::FilterExpr::Not(inner) => {
            CompiledFilter::Not(Box::new(compile_filter(inner, registry, tables)?))
        }
        ast::FilterExpr::Compare { left, op, right } => {
            let (op, swap) = op.normalize();
            let (left, right) = if swap { (right, left) } else { (left, right) };
            CompiledFilter::Compare {
                left: compile_comparable(left, registry, tables)?,
                op,
                right: compile_comparable(right, registry, tables)?,
            }
        }
        ast::FilterExpr::Test { query, negated } => CompiledFilter::Test {
            query: compile_test_query(query, registry, tables)?,
            negated: *negated,
        },
    })
}

fn compile_test_query(
    query: &ast::Query,
    registry: &FunctionRegistry,
    tables: &mut InnerQueryTables,
) -> Result<TestQuery> {
    let runner = super::super::compile::compile_inner_with(query, registry, tables)?;
    Ok(match query.root {
        RootKind::Current => TestQuery::Current(Box::new(runner)),
        RootKind::Input => {
            if query.is_singular() {
                TestQuery::InnerSingular(tables.register_singular(query, runner))
            } else {
                TestQuery::InnerNodes(tables.register_non_singular(query, runner))
            }
        }
    })
}

fn compile_comparable(
    c: &ast::Comparable,
    registry: &FunctionRegistry,
    tables: &mut InnerQueryTables,
) -> Result<CompiledComparable> {
    Ok(match c {
        ast::Comparable::Literal(lit) => CompiledComparable::Literal(lit.clone()),
        ast::Comparable::Query(q) => {
            if !q.is_singular() {
                return Err(Error::unimplemented(
                    "comparison operands must be singular queries",
                ));
            }
            let runner = super::super::compile::compile_inner_with(q, registry, tables)?;
            match q.root {
                RootKind::Current => CompiledComparable::CurrentQuery(Box::new(runner)),
                RootKind::Input => CompiledComparable::InnerSingular(tables.register_singular(q, runner)),
            }
        }
        ast::Comparable::Function(f) => CompiledComparable::Function(compile_function(f, registry, tables)?),
    })
}

fn compile_function(
    call: &FunctionCall,
    registry: &FunctionRegistry,
    tables: &mut InnerQueryTables,
) -> Result<CompiledFunctionCall> {
    let args = call
        .args
        .iter()
        .map(|a| compile_function_arg(a, registry, tables))
        .collect::<Result<Vec<_>>>()?;
    match call.name.as_str() {
        "length" | "count" | "value" => {}
        other => {
            let registered = registry
                .get(other)
                .ok_or_else(|| Error::parse(format!("unknown function '{other}'")))?;
            if let Some(arity) = registered.arity() {
                if arity != args.len() {
                    return Err(Error::parse(format!(
                        "function '{other}' expects {arity} argument(s), got {}",
                        args.len()
                    )));
                }
            }
        }
    }
    Ok(CompiledFunctionCall {
        name: call.name.clone(),
        args,
    })
}

fn compile_function_arg(
    arg: &FunctionArg,
    registry: &FunctionRegistry,
    tables: &mut InnerQueryTables,
) -> Result<CompiledComparable> {
    Ok(match arg {
        FunctionArg::Literal(lit) => CompiledComparable::Literal(lit.clone()),
        FunctionArg::Query(q) => {
            let runner = super::super::compile::compile_inner_with(q, registry, tables)?;
            match q.root {
                RootKind::Current => CompiledComparable::CurrentQuery(Box::new(runner)),
                RootKind::Input => {
                    if q.is_singular() {
                        CompiledComparable::InnerSingular(tables.register_singular(q, runner))
                    } else {
                        CompiledComparable::InnerNodes(tables.register_non_singular(q, runner))
                    }
                }
            }
        }
        FunctionArg::Function(f) => CompiledComparable::Function(compile_function(f, registry, tables)?),
    })
}

/// RFC 9535's `ValueType`, reduced from a node or literal: either a plain
/// scalar, a materialized array/object (as its full token sequence, so
/// equality reduces to `Vec<Token>` comparison), or `Nothing`. `pub(crate)`
/// so `runcontext`'s precompute pass can store these in its tables.
#[derive(Debug, Clone)]
pub(crate) enum FilterValue {
    Nothing,
    Scalar(Scalar),
    Nodes(Vec<Token>),
}

pub fn evaluate_truth(filter: &CompiledFilter, ctx: &RunContext, current: &Value) -> bool {
    match filter {
        CompiledFilter::Or(list) => list.iter().any(|f| evaluate_truth(f, ctx, current)),
        CompiledFilter::And(list) => list.iter().all(|f| evaluate_truth(f, ctx, current)),
        CompiledFilter::Not(inner) => !evaluate_truth(inner, ctx, current),
        CompiledFilter::Compare { left, op, right } => {
            let l = eval_comparable(left, ctx, current);
            let r = eval_comparable(right, ctx, current);
            compare(*op, l, r)
        }
        CompiledFilter::Test { query, negated } => {
            let found = match query {
                TestQuery::Current(runner) => runner.run_collect_first(current.clone_value(), ctx).is_some(),
                TestQuery::InnerSingular(idx) => {
                    !matches!(ctx.singular.get(*idx), None | Some(FilterValue::Nothing))
                }
                TestQuery::InnerNodes(idx) => {
                    ctx.non_singular.get(*idx).map(|nodes| !nodes.is_empty()).unwrap_or(false)
                }
            };
            if *negated { !found } else { found }
        }
    }
}

fn eval_comparable(comp: &CompiledComparable, ctx: &RunContext, current: &Value) -> FilterValue {
    match comp {
        CompiledComparable::Literal(lit) => FilterValue::Scalar(literal_to_scalar(lit)),
        CompiledComparable::CurrentQuery(runner) => {
            match runner.run_collect_first(current.clone_value(), ctx) {
                Some(mut v) => materialize(&mut v),
                None => FilterValue::Nothing,
            }
        }
        CompiledComparable::InnerSingular(idx) => {
            ctx.singular.get(*idx).cloned().unwrap_or(FilterValue::Nothing)
        }
        CompiledComparable::InnerNodes(idx) => ctx
            .non_singular
            .get(*idx)
            .and_then(|nodes| nodes.first())
            .cloned()
            .unwrap_or(FilterValue::Nothing),
        CompiledComparable::Function(call) => eval_function(call, ctx, current),
    }
}

fn eval_function(call: &CompiledFunctionCall, ctx: &RunContext, current: &Value) -> FilterValue {
    match call.name.as_str() {
        "length" => match call.args.first() {
            Some(arg) => match eval_comparable(arg, ctx, current) {
                FilterValue::Scalar(s) if s.ty == ScalarType::String => {
                    FilterValue::Scalar(Scalar::number_from_f64(
                        s.decode_string().chars().count() as f64,
                    ))
                }
                FilterValue::Nodes(tokens) => match count_top_level_items(&tokens) {
                    Some(n) => FilterValue::Scalar(Scalar::number_from_i64(n as i64)),
                    None => FilterValue::Nothing,
                },
                _ => FilterValue::Nothing,
            },
            None => FilterValue::Nothing,
        },
        "count" => match call.args.first() {
            Some(CompiledComparable::CurrentQuery(runner)) => {
                let n = runner.run_count(current.clone_value(), ctx);
                FilterValue::Scalar(Scalar::number_from_i64(n as i64))
            }
            Some(CompiledComparable::InnerNodes(idx)) => {
                let n = ctx.non_singular.get(*idx).map(|nodes| nodes.len()).unwrap_or(0);
                FilterValue::Scalar(Scalar::number_from_i64(n as i64))
            }
            Some(CompiledComparable::InnerSingular(idx)) => {
                let n = usize::from(!matches!(ctx.singular.get(*idx), None | Some(FilterValue::Nothing)));
                FilterValue::Scalar(Scalar::number_from_i64(n as i64))
            }
            _ => FilterValue::Scalar(Scalar::number_from_i64(0)),
        },
        "value" => match call.args.first() {
            Some(arg) => eval_comparable(arg, ctx, current),
            None => FilterValue::Nothing,
        },
        name => match ctx.functions.get(name) {
            Some(f) => {
                let args: Vec<FunctionArgValue> = call
                    .args
                    .iter()
                    .map(|a| to_function_arg_value(a, ctx, current))
                    .collect();
                match f.call(&args) {
                    FunctionResult::Value(Some(s)) => FilterValue::Scalar(s),
                    FunctionResult::Value(None) => FilterValue::Nothing,
                    FunctionResult::Logical(b) => FilterValue::Scalar(Scalar::boolean(b)),
                }
            }
            None => FilterValue::Nothing,
        },
    }
}

/// Reduce a compiled comparable to the simplified value shape registered
/// extension functions accept (`FunctionArgValue`), which can't carry a
/// live `Value` — only a scalar or a node count.
fn to_function_arg_value(comp: &CompiledComparable, ctx: &RunContext, current: &Value) -> FunctionArgValue {
    match eval_comparable(comp, ctx, current) {
        FilterValue::Scalar(s) => FunctionArgValue::Scalar(Some(s)),
        FilterValue::Nothing => FunctionArgValue::Scalar(None),
        FilterValue::Nodes(tokens) => {
            FunctionArgValue::NodesCount(count_top_level_items(&tokens).unwrap_or(1))
        }
    }
}

pub(crate) fn materialize(value: &mut Value) -> FilterValue {
    match value {
        Value::Scalar(s) => FilterValue::Scalar(s.clone()),
        Value::Array(_) | Value::Object(_) => {
            let mut out = Vec::new();
            value.copy(&mut out);
            FilterValue::Nodes(out)
        }
    }
}

fn literal_to_scalar(lit: &Literal) -> Scalar {
    match lit {
        Literal::Null => Scalar::null(),
        Literal::Bool(b) => Scalar::boolean(*b),
        Literal::Number(n) => Scalar::number_from_f64(*n),
        Literal::String(s) => Scalar::string(s),
    }
}

fn filter_value_eq(a: &FilterValue, b: &FilterValue) -> bool {
    match (a, b) {
        (FilterValue::Nothing, FilterValue::Nothing) => true,
        (FilterValue::Nothing, _) | (_, FilterValue::Nothing) => false,
        (FilterValue::Scalar(x), FilterValue::Scalar(y)) => x == y,
        (FilterValue::Nodes(x), FilterValue::Nodes(y)) => nodes_equal(x, y),
        _ => false,
    }
}

/// A structural snapshot of a fully copied array/object value, used only to
/// evaluate `==`/`!=` the way the spec requires: arrays element-wise in
/// order, objects deep-equal by key set (order-independent) with value
/// equality recursively.
enum CmpNode {
    Scalar(Scalar),
    Array(Vec<CmpNode>),
    Object(Vec<(String, CmpNode)>),
}

impl PartialEq for CmpNode {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (CmpNode::Scalar(a), CmpNode::Scalar(b)) => a == b,
            (CmpNode::Array(a), CmpNode::Array(b)) => a == b,
            (CmpNode::Object(a), CmpNode::Object(b)) => {
                a.len() == b.len()
                    && a.iter()
                        .all(|(k, v)| b.iter().any(|(k2, v2)| k == k2 && v == v2))
            }
            _ => false,
        }
    }
}

fn parse_cmp_node(tokens: &[Token], i: &mut usize) -> CmpNode {
    match &tokens[*i] {
        Token::Scalar(s) => {
            *i += 1;
            CmpNode::Scalar(s.clone())
        }
        Token::StartArray => {
            *i += 1;
            let mut items = Vec::new();
            loop {
                match tokens.get(*i) {
                    Some(Token::EndArray) => {
                        *i += 1;
                        break;
                    }
                    Some(Token::Elision) => {
                        *i += 1;
                        break;
                    }
                    Some(_) => items.push(parse_cmp_node(tokens, i)),
                    None => break,
                }
            }
            CmpNode::Array(items)
        }
        Token::StartObject => {
            *i += 1;
            let mut members = Vec::new();
            loop {
                match tokens.get(*i) {
                    Some(Token::EndObject) => {
                        *i += 1;
                        break;
                    }
                    Some(Token::Elision) => {
                        *i += 1;
                        break;
                    }
                    Some(Token::Scalar(key)) => {
                        let key = key.decode_string();
                        *i += 1;
                        members.push((key, parse_cmp_node(tokens, i)));
                    }
                    _ => break,
                }
            }
            CmpNode::Object(members)
        }
        Token::Elision | Token::EndArray | Token::EndObject => {
            *i += 1;
            CmpNode::Array(Vec::new())
        }
    }
}

fn nodes_equal(a: &[Token], b: &[Token]) -> bool {
    if a.is_empty() || b.is_empty() {
        return a == b;
    }
    parse_cmp_node(a, &mut 0) == parse_cmp_node(b, &mut 0)
}

fn compare(op: CompareOp, left: FilterValue, right: FilterValue) -> bool {
    match op {
        CompareOp::Eq => filter_value_eq(&left, &right),
        CompareOp::Ne => !filter_value_eq(&left, &right),
        CompareOp::Lt | CompareOp::Le => match (left, right) {
            (FilterValue::Scalar(x), FilterValue::Scalar(y))
                if x.ty == ScalarType::Number && y.ty == ScalarType::Number =>
            {
                match (x.decode_number(), y.decode_number()) {
                    (Some(a), Some(b)) => {
                        if op == CompareOp::Lt { a < b } else { a <= b }
                    }
                    _ => false,
                }
            }
            (FilterValue::Scalar(x), FilterValue::Scalar(y))
                if x.ty == ScalarType::String && y.ty == ScalarType::String =>
            {
                let (a, b) = (x.decode_string(), y.decode_string());
                if op == CompareOp::Lt { a < b } else { a <= b }
            }
            _ => false,
        },
        // `>`/`>=` are normalized away at compile time.
        CompareOp::Gt | CompareOp::Ge => unreachable!("normalized at compile time"),
    }
}

/// Count the direct children of one fully copied array/object value.
fn count_top_level_items(tokens: &[Token]) -> Option<usize> {
    match tokens.first() {
        Some(Token::StartArray) => {
            let mut depth = 0i64;
            let mut count = 0usize;
            for tok in tokens {
                match tok {
                    Token::StartArray | Token::StartObject => {
                        if depth == 1 {
                            count += 1;
                        }
                        depth += 1;
                    }
                    Token::EndArray | Token::EndObject => depth -= 1,
                    Token::Scalar(_) if depth == 1 => count += 1,
                    _ => {}
                }
            }
            Some(count)
        }
        Some(Token::StartObject) => {
            let mut depth = 0i64;
            let mut count = 0usize;
            for tok in tokens {
                match tok {
                    Token::StartArray | Token::StartObject => depth += 1,
                    Token::EndArray | Token::EndObject => depth -= 1,
                    Token::Scalar(s) if depth == 1 && s.is_key() => count += 1,
                    _ => {}
                }
            }
            Some(count)
        }
        _ => None,
    }
}
