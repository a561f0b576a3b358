//! Shared test helpers: building a token stream from a `serde_json::Value`
//! and running a compiled JSONPath query against it, collecting results
//! back into `serde_json::Value` for easy assertions.
//!
//! `serde_json` is only used here, at the test boundary, to describe inputs
//! and expectations conveniently — the engine itself never round-trips
//! scalars through it on the hot path (see `token.rs`).

#![allow(dead_code)]

use jsonflow_core::cursor::CursorPool;
use jsonflow_core::jsonpath::{self, CompileOptions, MainQueryRunner};
use jsonflow_core::token::{Scalar, Token};
use jsonflow_core::value::Value;

pub fn tokens_from_json(value: &serde_json::Value) -> Vec<Token> {
    let mut out = Vec::new();
    push_value(value, false, &mut out);
    out
}

fn push_value(value: &serde_json::Value, as_key: bool, out: &mut Vec<Token>) {
    match value {
        serde_json::Value::Null => out.push(Token::Scalar(Scalar::null())),
        serde_json::Value::Bool(b) => out.push(Token::Scalar(Scalar::boolean(*b))),
        serde_json::Value::Number(n) => {
            let scalar = if let Some(i) = n.as_i64() {
                Scalar::number_from_i64(i)
            } else {
                Scalar::number_from_f64(n.as_f64().unwrap())
            };
            out.push(Token::Scalar(scalar));
        }
        serde_json::Value::String(s) => {
            let scalar = if as_key { Scalar::string(s).as_key() } else { Scalar::string(s) };
            out.push(Token::Scalar(scalar));
        }
        serde_json::Value::Array(items) => {
            out.push(Token::StartArray);
            for item in items {
                push_value(item, false, out);
            }
            out.push(Token::EndArray);
        }
        serde_json::Value::Object(map) => {
            out.push(Token::StartObject);
            for (k, v) in map {
                out.push(Token::Scalar(Scalar::string(k).as_key()));
                push_value(v, false, out);
            }
            out.push(Token::EndObject);
        }
    }
}

/// Re-materializes a (non-key) token run back into `serde_json::Value`s, one
/// per top-level value emitted — mirroring what a JSON encoder sink would
/// see downstream of a `MainQueryRunner`.
pub fn json_values_from_tokens(tokens: &[Token]) -> Vec<serde_json::Value> {
    let mut out = Vec::new();
    let mut pos = 0;
    while pos < tokens.len() {
        let (value, next) = read_value(tokens, pos);
        out.push(value);
        pos = next;
    }
    out
}

fn read_value(tokens: &[Token], pos: usize) -> (serde_json::Value, usize) {
    match &tokens[pos] {
        Token::Scalar(s) => (scalar_to_json(s), pos + 1),
        Token::StartArray => {
            let mut items = Vec::new();
            let mut i = pos + 1;
            loop {
                match &tokens[i] {
                    Token::EndArray => break,
                    Token::Elision => {
                        i += 1;
                        break;
                    }
                    _ => {
                        let (v, next) = read_value(tokens, i);
                        items.push(v);
                        i = next;
                    }
                }
            }
            (serde_json::Value::Array(items), i + 1)
        }
        Token::StartObject => {
            let mut map = serde_json::Map::new();
            let mut i = pos + 1;
            loop {
                match &tokens[i] {
                    Token::EndObject => break,
                    Token::Elision => {
                        i += 1;
                        break;
                    }
                    Token::Scalar(key) => {
                        let k = key.decode_string();
                        let (v, next) = read_value(tokens, i + 1);
                        map.insert(k, v);
                        i = next;
                    }
                    other => panic!("expected object key, found {other:?}"),
                }
            }
            (serde_json::Value::Object(map), i + 1)
        }
        other => panic!("unexpected token at value position: {other:?}"),
    }
}

fn scalar_to_json(s: &Scalar) -> serde_json::Value {
    use jsonflow_core::token::ScalarType;
    match s.ty {
        ScalarType::Null => serde_json::Value::Null,
        ScalarType::Boolean => serde_json::Value::Bool(s.decode_bool()),
        ScalarType::Number => serde_json::json!(s.decode_number().unwrap()),
        ScalarType::String => serde_json::Value::String(s.decode_string()),
    }
}

/// Compile and run a query against a JSON document, returning each matched
/// node as a `serde_json::Value`, in emission order.
pub fn run_query(query: &str, input: &serde_json::Value) -> Vec<serde_json::Value> {
    run_query_with(query, input, CompileOptions::default())
}

pub fn run_query_with(
    query: &str,
    input: &serde_json::Value,
    options: CompileOptions,
) -> Vec<serde_json::Value> {
    let parsed = jsonpath::parse_query(query).expect("query should parse");
    let runner: MainQueryRunner = jsonpath::compile(&parsed, options).expect("query should compile");
    let pool = CursorPool::from_slice(tokens_from_json(input));
    let root = Value::read(pool.new_cursor());
    let mut out = Vec::new();
    runner.run_to(root, &mut out).expect("run_to should not error");
    json_values_from_tokens(&out)
}
