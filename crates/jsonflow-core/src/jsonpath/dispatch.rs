//! The item dispatcher (§4.5.3): decides, for each array item or object
//! member, which selector(s) of a child segment want it, with a bounded
//! lookahead window for negative-index/slice decisions and a fallback
//! buffered path for segments that need the whole collection at once
//! (multiple selectors, or a reverse-step slice).

use std::collections::VecDeque;

use crate::value::{ArrayIter, ObjectIter, Value};

use super::filter::evaluate_truth;
use super::runcontext::RunContext;
use super::selector::{Decision, NegIndexInfo, SelectorRunner, slice_matches_with_length};

/// Resolve a `Decision::DontKnow` (filter selectors only) by peeking the
/// value without consuming it.
pub(super) fn resolve_filter(sel: &SelectorRunner, value: &Value, ctx: &RunContext) -> bool {
    match sel {
        SelectorRunner::Filter(f) => evaluate_truth(f, ctx, value),
        _ => false,
    }
}

/// Apply a (non-descendant) child segment's selectors to one array.
/// Returns `false` if `emit` asked to stop.
pub fn run_array(
    selectors: &[SelectorRunner],
    arr: &mut ArrayIter,
    ctx: &RunContext,
    emit: &mut dyn FnMut(Value) -> bool,
) -> bool {
    if selectors.len() == 1 && !selectors[0].reverses_selection() {
        let lookahead = selectors[0].lookahead();
        return if lookahead == 0 {
            run_array_single_fast(&selectors[0], arr, ctx, emit)
        } else {
            run_array_single_lookahead(&selectors[0], lookahead as usize, arr, ctx, emit)
        };
    }
    run_array_buffered(selectors, arr, ctx, emit)
}

fn run_array_single_fast(
    sel: &SelectorRunner,
    arr: &mut ArrayIter,
    ctx: &RunContext,
    emit: &mut dyn FnMut(Value) -> bool,
) -> bool {
    let mut index: i64 = 0;
    while arr.advance() {
        let mut v = arr.current_value();
        let decision = match sel.decide_index(index, NegIndexInfo::BeyondLookahead) {
            (Decision::DontKnow, _) => {
                if resolve_filter(sel, &v, ctx) { (Decision::Yes, false) } else { (Decision::No, false) }
            }
            other => other,
        };
        let (decision, no_more) = decision;
        match decision {
            Decision::Yes => {
                if !emit(v) {
                    arr.discard();
                    return false;
                }
            }
            _ => v.discard(),
        }
        if no_more {
            arr.discard();
            return true;
        }
        index += 1;
    }
    true
}

fn run_array_single_lookahead(
    sel: &SelectorRunner,
    lookahead: usize,
    arr: &mut ArrayIter,
    ctx: &RunContext,
    emit: &mut dyn FnMut(Value) -> bool,
) -> bool {
    let mut deque: VecDeque<(i64, Value)> = VecDeque::with_capacity(lookahead + 1);
    let mut index: i64 = 0;
    while arr.advance() {
        let v = arr.current_value();
        deque.push_back((index, v));
        index += 1;
        if deque.len() > lookahead {
            let (idx, v) = deque.pop_front().unwrap();
            if !decide_and_emit(sel, idx, NegIndexInfo::BeyondLookahead, v, ctx, emit) {
                drain_deque(deque);
                arr.discard();
                return false;
            }
        }
    }
    let total = index;
    while let Some((idx, v)) = deque.pop_front() {
        let neg = idx - total;
        if !decide_and_emit(sel, idx, NegIndexInfo::Exact(neg), v, ctx, emit) {
            drain_deque(deque);
            arr.discard();
            return false;
        }
    }
    true
}

fn decide_and_emit(
    sel: &SelectorRunner,
    index: i64,
    neg: NegIndexInfo,
    mut v: Value,
    ctx: &RunContext,
    emit: &mut dyn FnMut(Value) -> bool,
) -> bool {
    let (decision, _) = match sel.decide_index(index, neg) {
        (Decision::DontKnow, no_more) => {
            if resolve_filter(sel, &v, ctx) { (Decision::Yes, no_more) } else { (Decision::No, no_more) }
        }
        other => other,
    };
    match decision {
        Decision::Yes => emit(v),
        _ => {
            v.discard();
            true
        }
    }
}

fn drain_deque(mut deque: VecDeque<(i64, Value)>) {
    while let Some((_, mut v)) = deque.pop_front() {
        v.discard();
    }
}

/// Multi-selector or reverse-slice segments: materialize the whole array
/// once, then emit selector-by-selector (in declaration order; reversed
/// per-selector for negative-step slices), cloning an item only when more
/// than one selector still needs it.
fn run_array_buffered(
    selectors: &[SelectorRunner],
    arr: &mut ArrayIter,
    ctx: &RunContext,
    emit: &mut dyn FnMut(Value) -> bool,
) -> bool {
    let mut items: Vec<Option<Value>> = Vec::new();
    while arr.advance() {
        items.push(Some(arr.current_value()));
    }
    let length = items.len() as i64;

    let mut per_selector: Vec<Vec<usize>> = Vec::with_capacity(selectors.len());
    for sel in selectors {
        let mut idxs = Vec::new();
        match sel {
            SelectorRunner::Filter(_) => {
                for (i, slot) in items.iter().enumerate() {
                    let v = slot.as_ref().unwrap();
                    if resolve_filter(sel, v, ctx) {
                        idxs.push(i);
                    }
                }
            }
            SelectorRunner::Slice(slice) if slice.step.unwrap_or(1) < 0 => {
                for i in (0..items.len()).rev() {
                    if slice_matches_with_length(slice, i as i64, length) {
                        idxs.push(i);
                    }
                }
            }
            _ => {
                for i in 0..items.len() {
                    let (d, _) = sel.decide_index(i as i64, NegIndexInfo::Exact(i as i64 - length));
                    if matches!(d, Decision::Yes) {
                        idxs.push(i);
                    }
                }
            }
        }
        per_selector.push(idxs);
    }

    let mut remaining = vec![0usize; items.len()];
    for idxs in &per_selector {
        for &i in idxs {
            remaining[i] += 1;
        }
    }

    for idxs in per_selector {
        for i in idxs {
            remaining[i] -= 1;
            let v = if remaining[i] == 0 {
                items[i].take().expect("item consumed more times than counted")
            } else {
                items[i].as_ref().expect("item already consumed").clone_value()
            };
            if !emit(v) {
                for slot in items.into_iter().flatten() {
                    let mut slot = slot;
                    slot.discard();
                }
                return false;
            }
        }
    }
    for slot in items.into_iter().flatten() {
        let mut slot = slot;
        slot.discard();
    }
    true
}

/// Apply a (non-descendant) child segment's selectors to one object.
pub fn run_object(
    selectors: &[SelectorRunner],
    obj: &mut ObjectIter,
    ctx: &RunContext,
    emit: &mut dyn FnMut(Value) -> bool,
) -> bool {
    if selectors
        .iter()
        .all(|s| matches!(s, SelectorRunner::Index(_) | SelectorRunner::Slice(_)))
    {
        obj.discard();
        return true;
    }
    if selectors.len() == 1 {
        return run_object_single(&selectors[0], obj, ctx, emit);
    }
    run_object_buffered(selectors, obj, ctx, emit)
}

fn run_object_single(
    sel: &SelectorRunner,
    obj: &mut ObjectIter,
    ctx: &RunContext,
    emit: &mut dyn FnMut(Value) -> bool,
) -> bool {
    while obj.advance() {
        let (key, v) = obj.current_key_val();
        let decision = sel.decide_key(&key.decode_string());
        if !decide_key_and_emit(sel, decision, v, ctx, emit) {
            obj.discard();
            return false;
        }
    }
    true
}

fn decide_key_and_emit(
    sel: &SelectorRunner,
    decision: Decision,
    mut v: Value,
    ctx: &RunContext,
    emit: &mut dyn FnMut(Value) -> bool,
) -> bool {
    let yes = match decision {
        Decision::Yes => true,
        Decision::No => false,
        Decision::DontKnow => resolve_filter(sel, &v, ctx),
    };
    if yes {
        emit(v)
    } else {
        v.discard();
        true
    }
}

fn run_object_buffered(
    selectors: &[SelectorRunner],
    obj: &mut ObjectIter,
    ctx: &RunContext,
    emit: &mut dyn FnMut(Value) -> bool,
) -> bool {
    let mut keys: Vec<String> = Vec::new();
    let mut items: Vec<Option<Value>> = Vec::new();
    while obj.advance() {
        let (key, v) = obj.current_key_val();
        keys.push(key.decode_string());
        items.push(Some(v));
    }

    let mut per_selector: Vec<Vec<usize>> = Vec::with_capacity(selectors.len());
    for sel in selectors {
        let mut idxs = Vec::new();
        for (i, key) in keys.iter().enumerate() {
            let decision = sel.decide_key(key);
            let yes = match decision {
                Decision::Yes => true,
                Decision::No => false,
                Decision::DontKnow => resolve_filter(sel, items[i].as_ref().unwrap(), ctx),
            };
            if yes {
                idxs.push(i);
            }
        }
        per_selector.push(idxs);
    }

    let mut remaining = vec![0usize; items.len()];
    for idxs in &per_selector {
        for &i in idxs {
            remaining[i] += 1;
        }
    }

    for idxs in per_selector {
        for i in idxs {
            remaining[i] -= 1;
            let v = if remaining[i] == 0 {
                items[i].take().expect("item consumed more times than counted")
            } else {
                items[i].as_ref().expect("item already consumed").clone_value()
            };
            if !emit(v) {
                for slot in items.into_iter().flatten() {
                    let mut slot = slot;
                    slot.discard();
                }
                return false;
            }
        }
    }
    for slot in items.into_iter().flatten() {
        let mut slot = slot;
        slot.discard();
    }
    true
}
