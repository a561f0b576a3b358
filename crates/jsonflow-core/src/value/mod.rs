//! The value iterator (C4): a recursive object/array/scalar façade over a
//! token cursor. This is what the JSONPath engine (C5) actually walks —
//! it never sees raw tokens directly.

use crate::cursor::Cursor;
use crate::token::{Scalar, Token};

/// A JSON value, lazily backed by a cursor for arrays and objects.
pub enum Value {
    Scalar(Scalar),
    Array(ArrayIter),
    Object(ObjectIter),
}

impl Value {
    /// Read one value starting at `cursor`'s current position. The first
    /// token must be a `Scalar`, `StartArray`, or `StartObject` — anything
    /// else is a contract violation and panics.
    pub fn read(cursor: Cursor) -> Value {
        match cursor.advance() {
            Some(first @ Token::Scalar(_)) | Some(first @ Token::StartArray) | Some(
                first @ Token::StartObject,
            ) => read_from_first(cursor, first),
            other => panic!("expected a value, found {other:?}"),
        }
    }

    pub fn as_scalar(&self) -> Option<&Scalar> {
        match self {
            Value::Scalar(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array_mut(&mut self) -> Option<&mut ArrayIter> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_object_mut(&mut self) -> Option<&mut ObjectIter> {
        match self {
            Value::Object(o) => Some(o),
            _ => None,
        }
    }

    /// Discards the remainder of this value's range from its cursor (or
    /// detaches), restoring a defined post-state. A no-op for scalars.
    pub fn discard(&mut self) {
        match self {
            Value::Scalar(_) => {}
            Value::Array(a) => a.discard(),
            Value::Object(o) => o.discard(),
        }
    }

    /// Re-emits the whole value as tokens to `out`. The value is then
    /// considered fully consumed.
    pub fn copy(&mut self, out: &mut Vec<Token>) {
        match self {
            Value::Scalar(s) => out.push(Token::Scalar(s.clone())),
            Value::Array(a) => a.copy(out),
            Value::Object(o) => o.copy(out),
        }
    }

    /// A second independent view of the same logical value. Clone of a
    /// scalar never allocates beyond the `Bytes` refcount bump.
    pub fn clone_value(&self) -> Value {
        match self {
            Value::Scalar(s) => Value::Scalar(s.clone()),
            Value::Array(a) => Value::Array(a.clone_array()),
            Value::Object(o) => Value::Object(o.clone_object()),
        }
    }
}

fn read_from_first(cursor: Cursor, first: Token) -> Value {
    match first {
        Token::Scalar(s) => Value::Scalar(s),
        Token::StartArray => Value::Array(ArrayIter::new(cursor)),
        Token::StartObject => Value::Object(ObjectIter::new(cursor)),
        other => panic!("unexpected token as value start: {other:?}"),
    }
}

/// Shared bookkeeping between `ArrayIter` and `ObjectIter`: both iterate a
/// collection delimited by a matching End token, and both enforce "at most
/// one live child per parent".
struct CollectionState {
    cursor: Cursor,
    /// False only for a freshly-opened collection whose `Start*` token
    /// hasn't been re-emitted by `copy` yet; clones are born `true` since
    /// their cursor is already positioned mid-collection.
    started: bool,
    done: bool,
    elided: bool,
    has_live_child: bool,
}

impl CollectionState {
    fn new(cursor: Cursor) -> Self {
        Self {
            cursor,
            started: false,
            done: false,
            elided: false,
            has_live_child: false,
        }
    }

    fn cloned_at_current_position(cursor: Cursor, done: bool, elided: bool) -> Self {
        Self {
            cursor,
            started: true,
            done,
            elided,
            has_live_child: false,
        }
    }

    /// Pull the next raw token of this collection, panicking if a live
    /// child value hasn't been discarded first.
    fn next_token(&mut self) -> Option<Token> {
        assert!(
            !self.has_live_child,
            "advancing a parent without consuming its current child is a contract violation"
        );
        if self.done {
            return None;
        }
        self.cursor.advance()
    }

    fn finish_on(&mut self, tok: &Token, end: &Token) -> bool {
        if tok == end {
            self.done = true;
            true
        } else if matches!(tok, Token::Elision) {
            self.elided = true;
            self.done = true;
            true
        } else {
            false
        }
    }

    fn discard_remaining(&mut self, end: &Token) {
        self.has_live_child = false;
        if self.done {
            return;
        }
        loop {
            let Some(tok) = self.cursor.advance() else {
                self.done = true;
                return;
            };
            if self.finish_on(&tok, end) {
                return;
            }
            skip_value_tokens(&self.cursor, tok);
        }
    }
}

/// Consume and discard one full value's worth of tokens, given its first
/// token already read from `cursor`.
fn skip_value_tokens(cursor: &Cursor, first: Token) {
    match first {
        Token::Scalar(_) => {}
        Token::StartArray => drain_collection(cursor, &Token::EndArray),
        Token::StartObject => drain_collection(cursor, &Token::EndObject),
        Token::Elision => {}
        other => panic!("unexpected token while discarding a value: {other:?}"),
    }
}

fn drain_collection(cursor: &Cursor, end: &Token) {
    loop {
        match cursor.advance() {
            Some(tok) if &tok == end => return,
            Some(Token::Elision) => return,
            Some(tok) => skip_value_tokens(cursor, tok),
            None => return,
        }
    }
}

fn copy_value_tokens(cursor: &Cursor, first: Token, out: &mut Vec<Token>) {
    match &first {
        Token::StartArray => {
            out.push(first);
            copy_collection(cursor, &Token::EndArray, out);
        }
        Token::StartObject => {
            out.push(first);
            copy_collection(cursor, &Token::EndObject, out);
        }
        _ => out.push(first),
    }
}

fn copy_collection(cursor: &Cursor, end: &Token, out: &mut Vec<Token>) {
    loop {
        match cursor.advance() {
            Some(tok) if &tok == end => {
                out.push(tok);
                return;
            }
            Some(Token::Elision) => {
                out.push(Token::Elision);
                return;
            }
            Some(tok) => copy_value_tokens(cursor, tok, out),
            None => return,
        }
    }
}

/// Lazy iteration over an array's items.
pub struct ArrayIter {
    state: CollectionState,
    pending_first: Option<Token>,
}

impl ArrayIter {
    fn new(cursor: Cursor) -> Self {
        Self {
            state: CollectionState::new(cursor),
            pending_first: None,
        }
    }

    /// Discards the previous child (if any) and reads the next token.
    /// Returns `true` if a new child value was started, `false` on
    /// `EndArray` or `Elision` (both mark the iterator done).
    pub fn advance(&mut self) -> bool {
        if let Some(first) = self.pending_first.take() {
            skip_value_tokens(&self.state.cursor, first);
        }
        self.state.has_live_child = false;
        let Some(tok) = self.state.next_token() else {
            self.state.done = true;
            return false;
        };
        if self.state.finish_on(&tok, &Token::EndArray) {
            return false;
        }
        self.state.has_live_child = true;
        self.pending_first = Some(tok);
        true
    }

    /// Consumes the remainder of the array's tokens.
    pub fn discard(&mut self) {
        if let Some(first) = self.pending_first.take() {
            skip_value_tokens(&self.state.cursor, first);
        }
        self.state.discard_remaining(&Token::EndArray);
    }

    /// Re-emits the whole array (including delimiters) as tokens.
    pub fn copy(&mut self, out: &mut Vec<Token>) {
        if !self.state.started {
            out.push(Token::StartArray);
        }
        if let Some(first) = self.pending_first.take() {
            copy_value_tokens(&self.state.cursor, first, out);
            self.state.has_live_child = false;
        }
        if !self.state.done {
            copy_collection(&self.state.cursor, &Token::EndArray, out);
        } else if self.state.elided {
            out.push(Token::Elision);
        } else {
            out.push(Token::EndArray);
        }
    }

    /// The value produced by the last successful `advance`. Valid only
    /// between that call and the next `advance`/`discard`/`copy`.
    ///
    /// `pending_first` is cloned rather than taken: the child gets its own
    /// cursor positioned where the parent's is, but the parent's cursor
    /// hasn't moved past the child yet. Keeping `pending_first` around lets
    /// the next `advance`/`discard`/`copy` skip the child's full token
    /// range on the parent's own cursor, whether or not the caller ever
    /// touches the returned value.
    pub fn current_value(&mut self) -> Value {
        assert!(
            self.state.has_live_child,
            "current_value called without a prior successful advance, or called twice"
        );
        let first = self
            .pending_first
            .as_ref()
            .expect("current_value called without a prior successful advance")
            .clone();
        self.state.has_live_child = false;
        read_from_first(self.state.cursor.clone_cursor(), first)
    }

    pub fn is_done(&self) -> bool {
        self.state.done
    }

    pub fn is_elided(&self) -> bool {
        self.state.elided
    }

    fn clone_array(&self) -> ArrayIter {
        ArrayIter {
            state: CollectionState::cloned_at_current_position(
                self.state.cursor.clone_cursor(),
                self.state.done,
                self.state.elided,
            ),
            pending_first: None,
        }
    }
}

/// Lazy iteration over an object's key/value pairs.
pub struct ObjectIter {
    state: CollectionState,
    pending_key: Option<Scalar>,
    pending_first: Option<Token>,
}

impl ObjectIter {
    fn new(cursor: Cursor) -> Self {
        Self {
            state: CollectionState::new(cursor),
            pending_key: None,
            pending_first: None,
        }
    }

    /// Discards the previous pair (if any) and reads the next key/value.
    /// Returns `true` if a new pair was started, `false` on `EndObject` or
    /// `Elision`.
    pub fn advance(&mut self) -> bool {
        if let Some(first) = self.pending_first.take() {
            skip_value_tokens(&self.state.cursor, first);
            self.pending_key = None;
        }
        self.state.has_live_child = false;
        let Some(tok) = self.state.next_token() else {
            self.state.done = true;
            return false;
        };
        if self.state.finish_on(&tok, &Token::EndObject) {
            return false;
        }
        let key = match tok {
            Token::Scalar(s) if s.is_key() => s,
            other => panic!("expected an object key scalar, found {other:?}"),
        };
        let first = self
            .state
            .cursor
            .advance()
            .expect("object key must be followed by a value");
        self.pending_key = Some(key);
        self.pending_first = Some(first);
        self.state.has_live_child = true;
        true
    }

    pub fn discard(&mut self) {
        if let Some(first) = self.pending_first.take() {
            skip_value_tokens(&self.state.cursor, first);
            self.pending_key = None;
        }
        self.state.discard_remaining(&Token::EndObject);
    }

    pub fn copy(&mut self, out: &mut Vec<Token>) {
        if !self.state.started {
            out.push(Token::StartObject);
        }
        if let Some(key) = self.pending_key.take() {
            out.push(Token::Scalar(key));
            let first = self.pending_first.take().expect("key without a value");
            copy_value_tokens(&self.state.cursor, first, out);
            self.state.has_live_child = false;
        }
        if !self.state.done {
            copy_collection(&self.state.cursor, &Token::EndObject, out);
        } else if self.state.elided {
            out.push(Token::Elision);
        } else {
            out.push(Token::EndObject);
        }
    }

    /// The key and value produced by the last successful `advance`.
    ///
    /// As with `ArrayIter::current_value`, `pending_key`/`pending_first` are
    /// cloned rather than taken so the parent can still skip the value via
    /// its own cursor on the next `advance`/`discard`/`copy`.
    pub fn current_key_val(&mut self) -> (Scalar, Value) {
        assert!(
            self.state.has_live_child,
            "current_key_val called without a prior successful advance, or called twice"
        );
        let key = self
            .pending_key
            .as_ref()
            .expect("current_key_val called without a prior successful advance")
            .clone();
        let first = self.pending_first.as_ref().expect("key without a value").clone();
        self.state.has_live_child = false;
        let value = read_from_first(self.state.cursor.clone_cursor(), first);
        (key, value)
    }

    pub fn is_done(&self) -> bool {
        self.state.done
    }

    pub fn is_elided(&self) -> bool {
        self.state.elided
    }

    fn clone_object(&self) -> ObjectIter {
        ObjectIter {
            state: CollectionState::cloned_at_current_position(
                self.state.cursor.clone_cursor(),
                self.state.done,
                self.state.elided,
            ),
            pending_key: None,
            pending_first: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cursor::CursorPool;
    use crate::token::ScalarType;

    fn scalar_num(n: i64) -> Token {
        Token::Scalar(Scalar::number_from_i64(n))
    }

    #[test]
    fn scalar_value_round_trips() {
        let pool = CursorPool::from_slice(vec![scalar_num(42)]);
        let mut value = Value::read(pool.new_cursor());
        assert_eq!(value.as_scalar().unwrap().ty, ScalarType::Number);
        let mut out = Vec::new();
        value.copy(&mut out);
        assert_eq!(out, vec![scalar_num(42)]);
    }

    #[test]
    fn array_advance_and_discard_reaches_eof() {
        let tokens = vec![
            Token::StartArray,
            scalar_num(1),
            scalar_num(2),
            scalar_num(3),
            Token::EndArray,
        ];
        let pool = CursorPool::from_slice(tokens);
        let cursor = pool.new_cursor();
        let mut value = Value::read(cursor);
        let arr = value.as_array_mut().unwrap();
        let mut seen = Vec::new();
        while arr.advance() {
            let mut child = arr.current_value();
            seen.push(child.as_scalar().unwrap().decode_number().unwrap() as i64);
            child.discard();
        }
        assert_eq!(seen, vec![1, 2, 3]);
        assert!(arr.is_done());
    }

    #[test]
    fn array_discard_midway_drains_cursor() {
        let tokens = vec![
            Token::StartArray,
            scalar_num(1),
            scalar_num(2),
            scalar_num(3),
            Token::EndArray,
        ];
        let pool = CursorPool::from_slice(tokens);
        let cursor = pool.new_cursor();
        let mut value = Value::read(cursor);
        let arr = value.as_array_mut().unwrap();
        assert!(arr.advance());
        value.discard();
        // Discarding mid-iteration must consume the rest of the stream so a
        // sibling cursor sees EOF afterward.
    }

    #[test]
    fn copy_reemits_full_array() {
        let tokens = vec![
            Token::StartObject,
            Token::Scalar(Scalar::string("a").as_key()),
            scalar_num(1),
            Token::EndObject,
        ];
        let pool = CursorPool::from_slice(tokens.clone());
        let cursor = pool.new_cursor();
        let mut value = Value::read(cursor);
        let mut out = Vec::new();
        value.copy(&mut out);
        assert_eq!(out, tokens);
    }

    #[test]
    fn object_iterates_key_value_pairs() {
        let tokens = vec![
            Token::StartObject,
            Token::Scalar(Scalar::string("a").as_key()),
            scalar_num(1),
            Token::Scalar(Scalar::string("b").as_key()),
            scalar_num(2),
            Token::EndObject,
        ];
        let pool = CursorPool::from_slice(tokens);
        let cursor = pool.new_cursor();
        let mut value = Value::read(cursor);
        let obj = value.as_object_mut().unwrap();
        let mut pairs = Vec::new();
        while obj.advance() {
            let (key, mut v) = obj.current_key_val();
            pairs.push((
                key.decode_string(),
                v.as_scalar().unwrap().decode_number().unwrap() as i64,
            ));
            v.discard();
        }
        assert_eq!(pairs, vec![("a".to_string(), 1), ("b".to_string(), 2)]);
    }

    #[test]
    fn array_of_composite_children_skips_unread_siblings() {
        // Each item is itself an array; if the parent failed to skip a
        // child's full token range, the next `advance` would desync and
        // either panic or hand back tokens from inside the previous child.
        let tokens = vec![
            Token::StartArray,
            Token::StartArray,
            scalar_num(1),
            scalar_num(2),
            Token::EndArray,
            Token::StartArray,
            scalar_num(3),
            Token::EndArray,
            Token::EndArray,
        ];
        let pool = CursorPool::from_slice(tokens);
        let cursor = pool.new_cursor();
        let mut value = Value::read(cursor);
        let arr = value.as_array_mut().unwrap();

        assert!(arr.advance());
        let _first_child = arr.current_value(); // never read or discarded

        assert!(arr.advance());
        let mut second_child = arr.current_value();
        let inner = second_child.as_array_mut().unwrap();
        assert!(inner.advance());
        assert_eq!(
            inner.current_value().as_scalar().unwrap().decode_number(),
            Some(3.0)
        );
        assert!(!inner.advance());
        second_child.discard();

        assert!(!arr.advance());
        assert!(arr.is_done());
    }

    #[test]
    fn object_with_composite_values_skips_unread_siblings() {
        let tokens = vec![
            Token::StartObject,
            Token::Scalar(Scalar::string("a").as_key()),
            Token::StartArray,
            scalar_num(1),
            scalar_num(2),
            Token::EndArray,
            Token::Scalar(Scalar::string("b").as_key()),
            scalar_num(3),
            Token::EndObject,
        ];
        let pool = CursorPool::from_slice(tokens);
        let cursor = pool.new_cursor();
        let mut value = Value::read(cursor);
        let obj = value.as_object_mut().unwrap();

        assert!(obj.advance());
        let (key, _a_val) = obj.current_key_val(); // array value never read or discarded
        assert_eq!(key.decode_string(), "a");

        assert!(obj.advance());
        let (key, mut b_val) = obj.current_key_val();
        assert_eq!(key.decode_string(), "b");
        assert_eq!(b_val.as_scalar().unwrap().decode_number(), Some(3.0));
        b_val.discard();

        assert!(!obj.advance());
    }

    #[test]
    #[should_panic]
    fn current_value_twice_without_advance_panics() {
        let tokens = vec![Token::StartArray, scalar_num(1), scalar_num(2), Token::EndArray];
        let pool = CursorPool::from_slice(tokens);
        let cursor = pool.new_cursor();
        let mut value = Value::read(cursor);
        let arr = value.as_array_mut().unwrap();
        arr.advance();
        let _first = arr.current_value();
        let _again = arr.current_value(); // only valid once per advance()
    }
}
