//! The token model (C1): the atomic events flowing through every stage of
//! a pipeline, and the well-formedness contract producers must uphold.

use bytes::Bytes;

bitflags::bitflags! {
    /// Boolean flags packed alongside a scalar's type.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ScalarFlags: u8 {
        /// This scalar appears as an object key.
        const KEY = 0b001;
        /// The string payload (between quotes) matches `[A-Za-z_][A-Za-z0-9_]*`,
        /// enabling short-form JPV output.
        const ALNUM = 0b010;
        /// The bytes between the quotes contain no escape sequences,
        /// enabling zero-copy extraction and a fast equality path.
        const UNESCAPED = 0b100;
    }
}

/// The four scalar types a `Scalar` token can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarType {
    Null,
    Boolean,
    Number,
    String,
}

/// A leaf value. `bytes` is the literal input representation verbatim
/// (including surrounding quotes for strings, original digit form for
/// numbers) — scalars never round-trip through host numeric types on the
/// fast path, which preserves precision and avoids normalization.
#[derive(Debug, Clone)]
pub struct Scalar {
    pub bytes: Bytes,
    pub ty: ScalarType,
    pub flags: ScalarFlags,
}

impl Scalar {
    pub fn new(bytes: impl Into<Bytes>, ty: ScalarType, flags: ScalarFlags) -> Self {
        Self {
            bytes: bytes.into(),
            ty,
            flags,
        }
    }

    pub fn null() -> Self {
        Self::new("null", ScalarType::Null, ScalarFlags::empty())
    }

    pub fn boolean(value: bool) -> Self {
        Self::new(
            if value { "true" } else { "false" },
            ScalarType::Boolean,
            ScalarFlags::empty(),
        )
    }

    /// Shortest-round-trip formatting for doubles, decimal for integers.
    /// Non-finite doubles format as `NaN`, `+Inf`, `-Inf`; these are
    /// informational only, encoders may reject them.
    pub fn number_from_f64(value: f64) -> Self {
        let text = if value.is_nan() {
            "NaN".to_string()
        } else if value.is_infinite() {
            if value > 0.0 { "+Inf".to_string() } else { "-Inf".to_string() }
        } else {
            serde_json::Number::from_f64(value)
                .map(|n| n.to_string())
                .unwrap_or_else(|| "NaN".to_string())
        };
        Self::new(text, ScalarType::Number, ScalarFlags::empty())
    }

    pub fn number_from_i64(value: i64) -> Self {
        Self::new(value.to_string(), ScalarType::Number, ScalarFlags::empty())
    }

    pub fn string(value: &str) -> Self {
        let alnum = is_alnum_ident(value);
        let unescaped = !value.contains(['"', '\\']) && !value.chars().any(|c| c.is_control());
        let mut bytes = Vec::with_capacity(value.len() + 2);
        bytes.push(b'"');
        if unescaped {
            bytes.extend_from_slice(value.as_bytes());
        } else {
            for c in value.chars() {
                match c {
                    '"' => bytes.extend_from_slice(b"\\\""),
                    '\\' => bytes.extend_from_slice(b"\\\\"),
                    '\n' => bytes.extend_from_slice(b"\\n"),
                    '\r' => bytes.extend_from_slice(b"\\r"),
                    '\t' => bytes.extend_from_slice(b"\\t"),
                    c if (c as u32) < 0x20 => {
                        bytes.extend_from_slice(format!("\\u{:04x}", c as u32).as_bytes())
                    }
                    c => {
                        let mut buf = [0u8; 4];
                        bytes.extend_from_slice(c.encode_utf8(&mut buf).as_bytes())
                    }
                }
            }
        }
        bytes.push(b'"');
        let mut flags = ScalarFlags::empty();
        if alnum {
            flags |= ScalarFlags::ALNUM;
        }
        if unescaped {
            flags |= ScalarFlags::UNESCAPED;
        }
        Self::new(bytes, ScalarType::String, flags)
    }

    pub fn is_key(&self) -> bool {
        self.flags.contains(ScalarFlags::KEY)
    }

    pub fn as_key(mut self) -> Self {
        self.flags |= ScalarFlags::KEY;
        self
    }

    /// The string payload with surrounding quotes stripped. Only meaningful
    /// for `ScalarType::String`.
    pub fn string_payload(&self) -> &[u8] {
        debug_assert_eq!(self.ty, ScalarType::String);
        let b = self.bytes.as_ref();
        if b.len() >= 2 { &b[1..b.len() - 1] } else { b }
    }

    /// Decode a string scalar's payload to an owned `String`, honoring JSON
    /// escape sequences. Zero-copy when `UNESCAPED` is set.
    pub fn decode_string(&self) -> String {
        debug_assert_eq!(self.ty, ScalarType::String);
        if self.flags.contains(ScalarFlags::UNESCAPED) {
            String::from_utf8_lossy(self.string_payload()).into_owned()
        } else {
            serde_json::from_slice::<String>(self.bytes.as_ref())
                .unwrap_or_else(|_| String::from_utf8_lossy(self.string_payload()).into_owned())
        }
    }

    /// Decode a number scalar to `f64`. Loses precision outside the
    /// IEEE-754 safe integer range, per spec.
    pub fn decode_number(&self) -> Option<f64> {
        debug_assert_eq!(self.ty, ScalarType::Number);
        std::str::from_utf8(self.bytes.as_ref()).ok()?.parse().ok()
    }

    pub fn decode_bool(&self) -> bool {
        debug_assert_eq!(self.ty, ScalarType::Boolean);
        self.bytes.as_ref() == b"true"
    }
}

fn is_alnum_ident(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c == '_' || c.is_ascii_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c == '_' || c.is_ascii_alphanumeric())
}

/// Scalar equality per spec: same type and either byte-equal, or — for
/// numbers and escaped strings — equal after JSON-literal decoding. Two
/// unescaped strings that are not byte-equal are unequal by construction
/// (they cannot differ only in encoding).
impl PartialEq for Scalar {
    fn eq(&self, other: &Self) -> bool {
        if self.ty != other.ty {
            return false;
        }
        if self.bytes == other.bytes {
            return true;
        }
        match self.ty {
            ScalarType::Number => match (self.decode_number(), other.decode_number()) {
                (Some(a), Some(b)) => a == b,
                _ => false,
            },
            ScalarType::String => {
                let both_unescaped = self.flags.contains(ScalarFlags::UNESCAPED)
                    && other.flags.contains(ScalarFlags::UNESCAPED);
                if both_unescaped {
                    false
                } else {
                    self.decode_string() == other.decode_string()
                }
            }
            ScalarType::Null | ScalarType::Boolean => false,
        }
    }
}
impl Eq for Scalar {}

/// The atomic event flowing through a pipeline. Producers must only ever
/// emit well-formed streams (see module docs on `Token` below); consumers
/// may assume well-formedness and panic on violation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    StartObject,
    EndObject,
    StartArray,
    EndArray,
    /// Non-JSON marker inserted by transforms (e.g. depth truncation) to
    /// signal omitted content. Idempotent, and position-sensitive: it may
    /// only appear in place of a collection's trailing value(s).
    Elision,
    Scalar(Scalar),
}

impl Token {
    pub fn is_start(&self) -> bool {
        matches!(self, Token::StartObject | Token::StartArray)
    }

    pub fn is_end(&self) -> bool {
        matches!(self, Token::EndObject | Token::EndArray)
    }

    pub fn as_scalar(&self) -> Option<&Scalar> {
        match self {
            Token::Scalar(s) => Some(s),
            _ => None,
        }
    }
}

/// A well-formed token sequence is a finite run of top-level *values*
/// (`§3`). This validator walks a whole sequence and panics at the first
/// violation — useful in tests and as a debug-assertion at producer
/// boundaries; it is deliberately not wired into the hot path.
pub fn assert_well_formed(tokens: &[Token]) {
    let mut pos = 0usize;
    while pos < tokens.len() {
        pos = assert_value(tokens, pos);
    }
}

fn assert_value(tokens: &[Token], pos: usize) -> usize {
    match &tokens[pos] {
        Token::Scalar(s) => {
            assert!(!s.is_key(), "top-level scalar must not carry the Key flag");
            pos + 1
        }
        Token::StartArray => {
            let mut i = pos + 1;
            loop {
                match tokens.get(i) {
                    Some(Token::EndArray) => return i + 1,
                    Some(Token::Elision) => {
                        assert!(
                            matches!(tokens.get(i + 1), Some(Token::EndArray)),
                            "Elision must be immediately followed by the collection's end"
                        );
                        return i + 2;
                    }
                    Some(_) => i = assert_value(tokens, i),
                    None => panic!("unterminated array"),
                }
            }
        }
        Token::StartObject => {
            let mut i = pos + 1;
            loop {
                match tokens.get(i) {
                    Some(Token::EndObject) => return i + 1,
                    Some(Token::Elision) => {
                        assert!(
                            matches!(tokens.get(i + 1), Some(Token::EndObject)),
                            "Elision must be immediately followed by the collection's end"
                        );
                        return i + 2;
                    }
                    Some(Token::Scalar(key)) => {
                        assert!(key.is_key(), "object member key must carry the Key flag");
                        assert_eq!(key.ty, ScalarType::String, "object keys must be strings");
                        i = assert_value(tokens, i + 1);
                    }
                    other => panic!("expected object key, found {other:?}"),
                }
            }
        }
        other => panic!("unexpected token at value position: {other:?}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_equality_unescaped_strings() {
        let a = Scalar::string("hello");
        let b = Scalar::string("hello");
        assert_eq!(a, b);
        let c = Scalar::string("world");
        assert_ne!(a, c);
    }

    #[test]
    fn scalar_equality_numbers_ignore_representation() {
        let a = Scalar::new("1.0", ScalarType::Number, ScalarFlags::empty());
        let b = Scalar::new("1", ScalarType::Number, ScalarFlags::empty());
        assert_eq!(a, b);
    }

    #[test]
    fn well_formed_accepts_nested_structures() {
        let tokens = vec![
            Token::StartObject,
            Token::Scalar(Scalar::string("a").as_key()),
            Token::StartArray,
            Token::Scalar(Scalar::number_from_i64(1)),
            Token::Scalar(Scalar::number_from_i64(2)),
            Token::EndArray,
            Token::EndObject,
        ];
        assert_well_formed(&tokens);
    }

    #[test]
    #[should_panic]
    fn well_formed_rejects_unterminated_array() {
        let tokens = vec![Token::StartArray, Token::Scalar(Scalar::null())];
        assert_well_formed(&tokens);
    }

    #[test]
    fn elision_only_trailing() {
        let tokens = vec![Token::StartArray, Token::Elision, Token::EndArray];
        assert_well_formed(&tokens);
    }
}
