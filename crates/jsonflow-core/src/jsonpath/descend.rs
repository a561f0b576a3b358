//! Descendant segment execution (§4.5.4): applying a segment's selectors
//! not just to a node's direct children but to every descendant.
//!
//! RFC 9535 fixes the visitation order: for each node, first the matches
//! among its own direct children (in selector/member order), then each
//! child's subtree, recursively. `strict_descendant_order` selects between
//! that order and a cheaper single-pass order that interleaves a child's
//! match with its subtree before moving to the next sibling — the result
//! *set* is identical, only emission order differs.

use crate::value::Value;

use super::dispatch;
use super::runcontext::RunContext;
use super::selector::{Decision, NegIndexInfo, SelectorRunner};

pub fn run_descendant_segment(
    selectors: &[SelectorRunner],
    value: Value,
    ctx: &RunContext,
    emit: &mut dyn FnMut(Value) -> bool,
) -> bool {
    match selectors.split_last() {
        None => true,
        Some((last, rest)) => {
            for sel in rest {
                let clone = value.clone_value();
                if !run_descendant_one(sel, clone, ctx, emit) {
                    value.clone_value().discard();
                    return false;
                }
            }
            run_descendant_one(last, value, ctx, emit)
        }
    }
}

fn run_descendant_one(
    sel: &SelectorRunner,
    value: Value,
    ctx: &RunContext,
    emit: &mut dyn FnMut(Value) -> bool,
) -> bool {
    if ctx.options.strict_descendant_order {
        run_descendant_strict(sel, value, ctx, emit)
    } else {
        run_descendant_relaxed(sel, value, ctx, emit)
    }
}

fn run_descendant_strict(
    sel: &SelectorRunner,
    mut value: Value,
    ctx: &RunContext,
    emit: &mut dyn FnMut(Value) -> bool,
) -> bool {
    if matches!(value, Value::Scalar(_)) {
        return true;
    }
    let probe = value.clone_value();
    if !apply_as_child_segment(sel, probe, ctx, emit) {
        value.discard();
        return false;
    }
    match value {
        Value::Array(mut arr) => {
            while arr.advance() {
                let child = arr.current_value();
                if !run_descendant_strict(sel, child, ctx, emit) {
                    arr.discard();
                    return false;
                }
            }
            true
        }
        Value::Object(mut obj) => {
            while obj.advance() {
                let (_, child) = obj.current_key_val();
                if !run_descendant_strict(sel, child, ctx, emit) {
                    obj.discard();
                    return false;
                }
            }
            true
        }
        Value::Scalar(_) => unreachable!(),
    }
}

fn apply_as_child_segment(
    sel: &SelectorRunner,
    mut value: Value,
    ctx: &RunContext,
    emit: &mut dyn FnMut(Value) -> bool,
) -> bool {
    match &mut value {
        Value::Scalar(_) => true,
        Value::Array(arr) => dispatch::run_array(std::slice::from_ref(sel), arr, ctx, emit),
        Value::Object(obj) => dispatch::run_object(std::slice::from_ref(sel), obj, ctx, emit),
    }
}

fn run_descendant_relaxed(
    sel: &SelectorRunner,
    value: Value,
    ctx: &RunContext,
    emit: &mut dyn FnMut(Value) -> bool,
) -> bool {
    match value {
        Value::Scalar(_) => true,
        Value::Array(mut arr) => {
            let mut index: i64 = 0;
            while arr.advance() {
                let child = arr.current_value();
                let probe = child.clone_value();
                let (decision, _) = sel.decide_index(index, NegIndexInfo::BeyondLookahead);
                let matched = match decision {
                    Decision::Yes => true,
                    Decision::No => false,
                    Decision::DontKnow => dispatch::resolve_filter(sel, &probe, ctx),
                };
                if matched && !emit(probe) {
                    arr.discard();
                    return false;
                } else if !matched {
                    drop(probe);
                }
                if !run_descendant_relaxed(sel, child, ctx, emit) {
                    arr.discard();
                    return false;
                }
                index += 1;
            }
            true
        }
        Value::Object(mut obj) => {
            while obj.advance() {
                let (key, child) = obj.current_key_val();
                let probe = child.clone_value();
                let matched = match sel.decide_key(&key.decode_string()) {
                    Decision::Yes => true,
                    Decision::No => false,
                    Decision::DontKnow => dispatch::resolve_filter(sel, &probe, ctx),
                };
                if matched && !emit(probe) {
                    obj.discard();
                    return false;
                } else if !matched {
                    drop(probe);
                }
                if !run_descendant_relaxed(sel, child, ctx, emit) {
                    obj.discard();
                    return false;
                }
            }
            true
        }
    }
}
