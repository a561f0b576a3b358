//! The cursor pool (C3): a sliding window over a single upstream token
//! producer, letting multiple cursors read independently with
//! amortized-linear memory.
//!
//! Many parts of the JSONPath engine need to traverse the same sub-stream
//! more than once — lookahead for negative indices, comparing two sides of
//! a predicate, an inner query referenced from a filter. Materializing
//! those sub-streams into arrays would defeat streaming; the pool instead
//! keeps a shared window and lets cursors clone cheaply.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use crate::token::Token;

/// A pull source for a cursor pool: produces the next token, or `None` on
/// exhaustion. Boxed so the pool doesn't need to be generic over whether
/// its upstream is a channel, a decoder, or a materialized slice.
pub type Upstream = Box<dyn FnMut() -> Option<Token> + Send>;

/// Wraps an already-collected token slice as an `Upstream`, for the
/// "construction from materialized data" mode (§4.3): no real upstream
/// exists and `advance` returns `None` once the slice is exhausted.
pub fn slice_upstream(tokens: Vec<Token>) -> Upstream {
    let mut iter = tokens.into_iter();
    Box::new(move || iter.next())
}

/// Tunable knobs from the suggested constants in spec §4.3.
#[derive(Debug, Clone, Copy)]
pub struct CursorPoolConfig {
    /// Number of cumulative `advance` calls before `advance_window` runs.
    pub catchup_threshold: usize,
    /// Below this backing capacity, or when the remaining length exceeds
    /// half of capacity, the window buffer is reused in place rather than
    /// reallocated on shrink.
    pub small_buffer_cap: usize,
}

impl Default for CursorPoolConfig {
    fn default() -> Self {
        Self {
            catchup_threshold: 100,
            small_buffer_cap: 1024,
        }
    }
}

struct CursorSlot {
    /// `None` once the cursor has been detached.
    position: Option<u64>,
    /// Bumped every time this slot is reused from the free list, so a
    /// stale `Cursor` handle from a prior occupant (already detached, but
    /// not yet dropped) can't be mistaken for the slot's current occupant.
    generation: u64,
}

struct PoolInner {
    upstream: Option<Upstream>,
    window: VecDeque<Token>,
    window_pos: u64,
    cursors: Vec<CursorSlot>,
    /// Indices of detached slots in `cursors` available for reuse, so the
    /// vec stays bounded by the number of simultaneously-live cursors
    /// rather than the number ever created.
    free_slots: Vec<usize>,
    catchup_count: usize,
    config: CursorPoolConfig,
}

impl PoolInner {
    /// Allocates a slot for a new cursor, reusing a detached one from the
    /// free list when available. Returns the slot id and its generation.
    fn alloc_slot(&mut self, position: Option<u64>) -> (usize, u64) {
        if let Some(id) = self.free_slots.pop() {
            let generation = self.cursors[id].generation + 1;
            self.cursors[id] = CursorSlot { position, generation };
            (id, generation)
        } else {
            self.cursors.push(CursorSlot { position, generation: 0 });
            (self.cursors.len() - 1, 0)
        }
    }
}

impl PoolInner {
    fn pull_one(&mut self) -> Option<Token> {
        let upstream = self.upstream.as_mut()?;
        match upstream() {
            Some(tok) => Some(tok),
            None => {
                self.upstream = None;
                None
            }
        }
    }

    /// Ensure `window` holds the token at absolute index `pos`, pulling
    /// from upstream as needed. Returns `false` on EOF.
    fn ensure(&mut self, pos: u64) -> bool {
        while self.window_pos + self.window.len() as u64 <= pos {
            match self.pull_one() {
                Some(tok) => self.window.push_back(tok),
                None => return false,
            }
        }
        true
    }

    fn advance_at(&mut self, position: &mut Option<u64>) -> Option<Token> {
        let pos = (*position)?;
        if !self.ensure(pos) {
            *position = None;
            return None;
        }
        let idx = (pos - self.window_pos) as usize;
        let tok = self.window[idx].clone();
        *position = Some(pos + 1);
        self.catchup_count += 1;
        if self.catchup_count >= self.config.catchup_threshold {
            self.catchup_count = 0;
            self.advance_window();
        }
        Some(tok)
    }

    fn min_live_position(&self) -> Option<u64> {
        self.cursors.iter().filter_map(|c| c.position).min()
    }

    /// Drop tokens no live cursor can still observe and, if the spike that
    /// grew the window has subsided, release the oversized buffer back to
    /// the allocator.
    fn advance_window(&mut self) {
        let Some(min_pos) = self.min_live_position() else {
            // No live cursors: the whole window is garbage.
            tracing::trace!(dropped = self.window.len(), "cursor pool: no live cursors, clearing window");
            self.window_pos += self.window.len() as u64;
            self.window.clear();
            return;
        };
        let shift = (min_pos - self.window_pos) as usize;
        if shift == 0 {
            return;
        }
        self.window.drain(0..shift);
        self.window_pos = min_pos;

        let remaining = self.window.len();
        let cap = self.window.capacity();
        if cap <= self.config.small_buffer_cap || remaining > cap / 2 {
            tracing::trace!(shift, remaining, cap, "cursor pool: window shrunk, buffer reused");
        } else {
            tracing::debug!(
                shift,
                remaining,
                old_cap = cap,
                "cursor pool: window shrunk past half-empty threshold, reallocating smaller buffer"
            );
            let mut shrunk = VecDeque::with_capacity(remaining.max(self.config.small_buffer_cap));
            shrunk.extend(self.window.drain(..));
            self.window = shrunk;
        }
    }
}

/// A pool of cursors sharing one sliding window over one upstream.
#[derive(Clone)]
pub struct CursorPool {
    inner: Rc<RefCell<PoolInner>>,
}

impl CursorPool {
    pub fn new(upstream: Upstream, config: CursorPoolConfig) -> Self {
        Self {
            inner: Rc::new(RefCell::new(PoolInner {
                upstream: Some(upstream),
                window: VecDeque::new(),
                window_pos: 0,
                cursors: Vec::new(),
                free_slots: Vec::new(),
                catchup_count: 0,
                config,
            })),
        }
    }

    pub fn from_slice(tokens: Vec<Token>) -> Self {
        Self::new(slice_upstream(tokens), CursorPoolConfig::default())
    }

    /// Create a cursor positioned at the current window tail (i.e. at the
    /// "now" of the upstream as observed so far).
    pub fn new_cursor(&self) -> Cursor {
        let mut inner = self.inner.borrow_mut();
        let pos = inner.window_pos + inner.window.len() as u64;
        let (id, generation) = inner.alloc_slot(Some(pos));
        Cursor {
            pool: self.inner.clone(),
            id,
            generation,
        }
    }

    /// Number of tokens presently resident in the shared window.
    pub fn window_len(&self) -> usize {
        self.inner.borrow().window.len()
    }
}

/// A position in a cursor pool. Cheaply clonable: cloning creates a second
/// cursor at the same position in O(1).
pub struct Cursor {
    pool: Rc<RefCell<PoolInner>>,
    id: usize,
    /// Must match `cursors[id].generation`, or this handle refers to a slot
    /// that has since been reclaimed and reissued to a different cursor.
    generation: u64,
}

impl Cursor {
    /// True once this handle's slot has been reused by a later cursor
    /// (i.e. this handle outlived its own `detach`).
    fn is_stale(&self, inner: &PoolInner) -> bool {
        inner.cursors[self.id].generation != self.generation
    }

    /// Returns the token at the cursor's position and advances it by one.
    /// Returns `None` on EOF and auto-detaches the cursor.
    pub fn advance(&self) -> Option<Token> {
        let mut inner = self.pool.borrow_mut();
        if self.is_stale(&inner) {
            return None;
        }
        let mut position = inner.cursors[self.id].position;
        let tok = inner.advance_at(&mut position);
        inner.cursors[self.id].position = position;
        tok
    }

    /// Current absolute stream position, or `None` if detached.
    pub fn position(&self) -> Option<u64> {
        let inner = self.pool.borrow();
        if self.is_stale(&inner) {
            return None;
        }
        inner.cursors[self.id].position
    }

    pub fn is_detached(&self) -> bool {
        self.position().is_none()
    }

    /// Creates a second cursor at the same position in O(1).
    pub fn clone_cursor(&self) -> Cursor {
        let mut inner = self.pool.borrow_mut();
        let position = if self.is_stale(&inner) {
            None
        } else {
            inner.cursors[self.id].position
        };
        let (id, generation) = inner.alloc_slot(position);
        Cursor {
            pool: self.pool.clone(),
            id,
            generation,
        }
    }

    /// Removes this cursor from the pool, triggering catch-up accounting.
    pub fn detach(&self) {
        let mut inner = self.pool.borrow_mut();
        if self.is_stale(&inner) {
            return;
        }
        if inner.cursors[self.id].position.take().is_some() {
            inner.free_slots.push(self.id);
            inner.advance_window();
        }
    }

    /// Skip `n` tokens without materializing them (used by lookahead).
    pub fn skip(&self, n: usize) {
        for _ in 0..n {
            if self.advance().is_none() {
                break;
            }
        }
    }
}

impl Drop for Cursor {
    fn drop(&mut self) {
        self.detach();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::{Scalar, ScalarType};

    fn toks(n: i64) -> Vec<Token> {
        (0..n)
            .map(|i| Token::Scalar(Scalar::new(i.to_string(), ScalarType::Number, Default::default())))
            .collect()
    }

    #[test]
    fn single_cursor_consumes_all() {
        let pool = CursorPool::from_slice(toks(5));
        let c = pool.new_cursor();
        for i in 0..5 {
            let t = c.advance().unwrap();
            assert_eq!(t.as_scalar().unwrap().decode_number(), Some(i as f64));
        }
        assert!(c.advance().is_none());
        assert!(c.is_detached());
    }

    #[test]
    fn clone_lockstep_keeps_window_small() {
        let pool = CursorPool::from_slice(toks(1000));
        let c1 = pool.new_cursor();
        let c2 = c1.clone_cursor();
        for _ in 0..500 {
            c1.advance();
            c2.advance();
        }
        // Lockstep cursors: window should never need to retain more than a
        // handful of tokens at once.
        assert!(pool.window_len() <= 2);
    }

    #[test]
    fn racing_cursor_grows_window_until_catchup() {
        // A low threshold forces `advance_window` to run after every single
        // advance, so the window tracks `max_position - min_position`
        // exactly rather than only "eventually".
        let config = CursorPoolConfig {
            catchup_threshold: 1,
            ..Default::default()
        };
        let pool = CursorPool::new(slice_upstream(toks(50)), config);
        let slow = pool.new_cursor();
        let fast = slow.clone_cursor();
        for _ in 0..10 {
            fast.advance();
        }
        assert_eq!(pool.window_len(), 10);
        for _ in 0..10 {
            slow.advance();
        }
        assert_eq!(pool.window_len(), 0);
    }

    #[test]
    fn detached_cursor_is_inert() {
        let pool = CursorPool::from_slice(toks(3));
        let c = pool.new_cursor();
        c.detach();
        assert!(c.advance().is_none());
    }

    #[test]
    fn detached_slots_are_reclaimed() {
        // Cloning and immediately dropping a cursor many times must not grow
        // the slot table unboundedly; each drop should free its slot for the
        // next clone to reuse.
        let pool = CursorPool::from_slice(toks(5));
        let base = pool.new_cursor();
        for _ in 0..1000 {
            let c = base.clone_cursor();
            drop(c);
        }
        assert!(pool.inner.borrow().cursors.len() <= 2);
    }

    #[test]
    fn stale_handle_is_inert_after_slot_reuse() {
        let pool = CursorPool::from_slice(toks(5));
        let base = pool.new_cursor();
        let stale = base.clone_cursor();
        stale.detach();
        // Reuses the slot `stale` just freed.
        let other = base.clone_cursor();
        other.advance();
        assert!(stale.advance().is_none());
        assert!(stale.is_detached());
    }

    #[test]
    fn window_bound_matches_min_max_position() {
        let config = CursorPoolConfig {
            catchup_threshold: 1,
            ..Default::default()
        };
        let pool = CursorPool::new(slice_upstream(toks(200)), config);
        let c1 = pool.new_cursor();
        let c2 = c1.clone_cursor();
        for _ in 0..30 {
            c1.advance();
        }
        for _ in 0..5 {
            c2.advance();
        }
        let expected = c1.position().unwrap() - c2.position().unwrap();
        assert_eq!(pool.window_len() as u64, expected);
    }
}
