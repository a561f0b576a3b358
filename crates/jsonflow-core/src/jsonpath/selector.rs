//! Compiled selectors: one `SelectorRunner` variant per selector kind,
//! each able to decide membership from an object key or an array
//! `(index, NegIndexInfo)` pair without advancing the underlying value.

use super::ast::Slice;
use super::filter::CompiledFilter;

/// The outcome of asking a selector whether it wants the current item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Yes,
    No,
    /// The selector needs to look at the value itself (filters only).
    DontKnow,
}

/// What the dispatcher's bounded lookahead window knows about an array
/// item's distance from the end.
#[derive(Debug, Clone, Copy)]
pub enum NegIndexInfo {
    /// Exact distance from the end (always `<= -1`).
    Exact(i64),
    /// The item is guaranteed to have more than the selector's lookahead
    /// count of items after it, so its eventual `neg_index` is guaranteed
    /// to be more negative than `-lookahead`. Precisely the "sentinel"
    /// value from spec §4.5.3.
    BeyondLookahead,
}

#[derive(Debug, Clone)]
pub enum SelectorRunner {
    Name(String),
    Index(i64),
    Wildcard,
    Slice(Slice),
    Filter(CompiledFilter),
}

impl SelectorRunner {
    /// How many extra array items the engine must read ahead to resolve
    /// this selector's negative-index decisions for the current item.
    pub fn lookahead(&self) -> i64 {
        match self {
            SelectorRunner::Index(i) if *i < 0 => -i,
            SelectorRunner::Slice(s) => {
                let mut l = 0;
                if let Some(v) = s.start {
                    if v < 0 {
                        l = l.max(-v);
                    }
                }
                if let Some(v) = s.end {
                    if v < 0 {
                        l = l.max(-v);
                    }
                }
                l
            }
            _ => 0,
        }
    }

    /// Negative-step slices must see the whole collection before they can
    /// emit anything, in reverse.
    pub fn reverses_selection(&self) -> bool {
        matches!(self, SelectorRunner::Slice(s) if s.step.unwrap_or(1) < 0)
    }

    pub fn decide_key(&self, key: &str) -> Decision {
        match self {
            SelectorRunner::Name(n) => {
                if n == key {
                    Decision::Yes
                } else {
                    Decision::No
                }
            }
            SelectorRunner::Wildcard => Decision::Yes,
            SelectorRunner::Filter(_) => Decision::DontKnow,
            // Index/Slice never match object members.
            SelectorRunner::Index(_) | SelectorRunner::Slice(_) => Decision::No,
        }
    }

    /// Decide for an array item. Returns `(decision, no_more_after)` where
    /// `no_more_after` means this selector can never match a later item in
    /// the same collection.
    pub fn decide_index(&self, index: i64, neg: NegIndexInfo) -> (Decision, bool) {
        match self {
            SelectorRunner::Wildcard => (Decision::Yes, false),
            SelectorRunner::Filter(_) => (Decision::DontKnow, false),
            SelectorRunner::Name(_) => (Decision::No, true),
            SelectorRunner::Index(i) if *i >= 0 => {
                use std::cmp::Ordering::*;
                match index.cmp(i) {
                    Equal => (Decision::Yes, true),
                    Greater => (Decision::No, true),
                    Less => (Decision::No, false),
                }
            }
            SelectorRunner::Index(i) => match neg {
                NegIndexInfo::BeyondLookahead => (Decision::No, false),
                NegIndexInfo::Exact(n) => {
                    if n == *i {
                        (Decision::Yes, true)
                    } else {
                        (Decision::No, n > *i)
                    }
                }
            },
            SelectorRunner::Slice(slice) => decide_slice(slice, index, neg),
        }
    }
}

fn decide_slice(slice: &Slice, index: i64, neg: NegIndexInfo) -> (Decision, bool) {
    let step = slice.step.unwrap_or(1);
    if step == 0 {
        return (Decision::No, true);
    }
    debug_assert!(step > 0, "reverse slices are dispatched via the buffered path");
    let start_is_negative = slice.start.is_some_and(|v| v < 0);
    let end_is_negative = slice.end.is_some_and(|v| v < 0);
    match neg {
        NegIndexInfo::BeyondLookahead => {
            if start_is_negative {
                return (Decision::No, false);
            }
            let start = slice.start.unwrap_or(0).max(0);
            if index < start || (index - start) % step != 0 {
                return (Decision::No, false);
            }
            if end_is_negative {
                // Guaranteed index < effective_end since lookahead >= |end|.
                (Decision::Yes, false)
            } else {
                match slice.end {
                    Some(e) if index >= e => (Decision::No, true),
                    _ => (Decision::Yes, false),
                }
            }
        }
        NegIndexInfo::Exact(neg_index) => {
            let length = index - neg_index;
            let start = resolve_bound(slice.start, length, 0);
            let end = resolve_bound(slice.end, length, length);
            let no_more = index + 1 >= end;
            if index >= start && index < end && (index - start) % step == 0 {
                (Decision::Yes, no_more)
            } else {
                (Decision::No, no_more)
            }
        }
    }
}

fn resolve_bound(bound: Option<i64>, length: i64, default: i64) -> i64 {
    match bound {
        None => default,
        Some(v) if v < 0 => (length + v).max(0),
        Some(v) => v.min(length),
    }
}

/// A fully materialized slice decision, used by the buffered dispatch path
/// (multi-selector segments, and reverse slices) where the whole
/// collection's length is known up front.
pub fn slice_matches_with_length(slice: &Slice, index: i64, length: i64) -> bool {
    let step = slice.step.unwrap_or(1);
    if step == 0 {
        return false;
    }
    if step > 0 {
        let start = resolve_bound(slice.start, length, 0);
        let end = resolve_bound(slice.end, length, length);
        index >= start && index < end && (index - start) % step == 0
    } else {
        // Negative step: RFC 9535 default start = length-1, default end =
        // -length-1 (i.e. "before index 0").
        let default_start = length - 1;
        let start = match slice.start {
            None => default_start,
            Some(v) if v < 0 => (length + v).clamp(-1, length - 1),
            Some(v) => v.clamp(-1, length - 1),
        };
        let end = match slice.end {
            None => -1,
            Some(v) if v < 0 => (length + v).clamp(-1, length - 1),
            Some(v) => v.clamp(-1, length - 1),
        };
        index <= start && index > end && (start - index) % (-step) == 0
    }
}
