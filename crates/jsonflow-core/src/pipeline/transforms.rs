//! Concrete transformers used both as building blocks and to state the
//! split/join idempotence property from spec §8.

use super::{TokenReader, TokenWriter, Transformer};
use crate::error::Result;
use crate::token::Token;

/// Unwraps each top-level array into its elements, emitted as their own
/// top-level values, in order. Non-array top-level values pass through
/// unchanged.
#[derive(Default)]
pub struct Split;

impl Transformer for Split {
    fn transform(&mut self, mut input: TokenReader, out: TokenWriter) -> Result<()> {
        let mut depth: i64 = 0;
        // `swallow_at` holds the depth an `End*` token must return to for it
        // to be the matching close of a wrapper we're unwrapping, rather
        // than forwarded verbatim.
        let mut swallow_at: Option<i64> = None;
        while let Some(tok) = input.read() {
            match tok {
                Token::StartArray if depth == 0 => {
                    depth += 1;
                    swallow_at = Some(0);
                }
                Token::StartArray | Token::StartObject => {
                    depth += 1;
                    out.write(tok)?;
                }
                Token::EndArray | Token::EndObject => {
                    depth -= 1;
                    if swallow_at == Some(depth) {
                        swallow_at = None;
                    } else {
                        out.write(tok)?;
                    }
                }
                other => out.write(other)?,
            }
        }
        Ok(())
    }
}

/// Wraps a stream of top-level values into a single top-level array.
#[derive(Default)]
pub struct Join;

impl Transformer for Join {
    fn transform(&mut self, mut input: TokenReader, out: TokenWriter) -> Result<()> {
        out.write(Token::StartArray)?;
        while let Some(tok) = input.read() {
            out.write(tok)?;
        }
        out.write(Token::EndArray)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::token_channel;
    use crate::token::{Scalar, ScalarType};

    fn num(n: i64) -> Token {
        Token::Scalar(Scalar::new(n.to_string(), ScalarType::Number, Default::default()))
    }

    fn drain(mut r: TokenReader) -> Vec<Token> {
        let mut out = Vec::new();
        while let Some(t) = r.read() {
            out.push(t);
        }
        out
    }

    #[test]
    fn split_unwraps_one_top_level_array() {
        let (w, r) = token_channel(16);
        let (out_w, out_r) = token_channel(16);
        w.write_all([
            Token::StartArray,
            num(1),
            num(2),
            num(3),
            Token::EndArray,
        ])
        .unwrap();
        drop(w);
        Split.transform(r, out_w).unwrap();
        assert_eq!(drain(out_r), vec![num(1), num(2), num(3)]);
    }

    #[test]
    fn join_wraps_stream_into_array() {
        let (w, r) = token_channel(16);
        let (out_w, out_r) = token_channel(16);
        w.write_all([num(1), num(2), num(3)]).unwrap();
        drop(w);
        Join.transform(r, out_w).unwrap();
        assert_eq!(
            drain(out_r),
            vec![Token::StartArray, num(1), num(2), num(3), Token::EndArray]
        );
    }

    #[test]
    fn split_then_join_round_trips() {
        let original = vec![Token::StartArray, num(1), num(2), num(3), Token::EndArray];

        let (w1, r1) = token_channel(16);
        let (w2, r2) = token_channel(16);
        w1.write_all(original.clone()).unwrap();
        drop(w1);
        Split.transform(r1, w2).unwrap();

        let (w3, r3) = token_channel(16);
        Join.transform(r2, w3).unwrap();
        assert_eq!(drain(r3), original);
    }
}
