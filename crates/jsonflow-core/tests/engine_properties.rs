//! Property tests for the quantified invariants: token stream round-trip
//! through the value iterator, the cursor-pool window-size bound, and the
//! `split`/`join` idempotence property.

mod common;

use jsonflow_core::cursor::CursorPool;
use jsonflow_core::pipeline::transforms::{Join, Split};
use jsonflow_core::pipeline::{Transformer, token_channel};
use jsonflow_core::token::{Scalar, Token};
use jsonflow_core::value::Value;
use proptest::prelude::*;

/// A small recursive JSON-value strategy, reused by both properties below.
fn json_strategy() -> impl Strategy<Value = serde_json::Value> {
    let leaf = prop_oneof![
        Just(serde_json::Value::Null),
        any::<bool>().prop_map(serde_json::Value::Bool),
        any::<i32>().prop_map(|n| serde_json::json!(n)),
        "[a-zA-Z0-9_]{0,8}".prop_map(serde_json::Value::String),
    ];
    leaf.prop_recursive(4, 32, 6, |inner| {
        prop_oneof![
            proptest::collection::vec(inner.clone(), 0..5).prop_map(serde_json::Value::Array),
            proptest::collection::vec(("[a-z]{1,6}", inner), 0..5).prop_map(|pairs| {
                let mut map = serde_json::Map::new();
                for (k, v) in pairs {
                    map.insert(k, v);
                }
                serde_json::Value::Object(map)
            }),
        ]
    })
}

proptest! {
    /// Consuming a value via `advance`+`discard`/`copy` reaches the end of
    /// its token range — re-materializing it through `copy` reproduces the
    /// same token sequence the input was built from.
    #[test]
    fn value_iterator_round_trips_through_copy(value in json_strategy()) {
        let tokens = common::tokens_from_json(&value);
        let pool = CursorPool::from_slice(tokens.clone());
        let mut root = Value::read(pool.new_cursor());
        let mut out = Vec::new();
        root.copy(&mut out);
        prop_assert_eq!(out, tokens);
    }

    /// Discarding a value (rather than copying it) always leaves the
    /// underlying cursor pool fully drained: once the only live cursor is
    /// dropped, a fresh cursor over the same pool sees immediate EOF, and
    /// no tokens are skipped or double-counted along the way.
    #[test]
    fn discard_consumes_exactly_one_value(value in json_strategy()) {
        let tokens = common::tokens_from_json(&value);
        let pool = CursorPool::from_slice(tokens);
        {
            let mut root = Value::read(pool.new_cursor());
            root.discard();
        }
        prop_assert_eq!(pool.window_len(), 0);
        let fresh = pool.new_cursor();
        prop_assert!(fresh.advance().is_none());
    }

    /// For any input, the cursor-pool window never needs to retain more
    /// tokens than the distance between the furthest-ahead and
    /// furthest-behind live cursor.
    #[test]
    fn window_never_exceeds_cursor_spread(n in 1usize..200, lead in 0usize..50) {
        let tokens: Vec<Token> = (0..n as i64)
            .map(|i| Token::Scalar(Scalar::number_from_i64(i)))
            .collect();
        let config = jsonflow_core::cursor::CursorPoolConfig {
            catchup_threshold: 1,
            ..Default::default()
        };
        let pool = CursorPool::new(jsonflow_core::cursor::slice_upstream(tokens), config);
        let slow = pool.new_cursor();
        let fast = slow.clone_cursor();
        let lead = lead.min(n);
        for _ in 0..lead {
            fast.advance();
        }
        let spread = fast.position().unwrap_or(n as u64) - slow.position().unwrap_or(0);
        prop_assert!(pool.window_len() as u64 <= spread);
    }

    /// `join` undoes `split`: splitting a top-level array into its elements
    /// and re-joining them reproduces the original array, elements in
    /// order.
    #[test]
    fn split_then_join_is_idempotent(items in proptest::collection::vec(json_strategy(), 0..8)) {
        let original = serde_json::Value::Array(items);
        let tokens = common::tokens_from_json(&original);

        let (w1, r1) = token_channel(64);
        let (w2, r2) = token_channel(64);
        w1.write_all(tokens).unwrap();
        drop(w1);
        Split.transform(r1, w2).unwrap();

        let (w3, mut r3) = token_channel(64);
        Join.transform(r2, w3).unwrap();

        let mut out = Vec::new();
        while let Some(t) = r3.read() {
            out.push(t);
        }
        let round_tripped = &common::json_values_from_tokens(&out)[0];
        prop_assert_eq!(round_tripped, &original);
    }
}
