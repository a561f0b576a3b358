//! A hand-written recursive-descent parser for the RFC 9535 query
//! grammar, covering root/current identifiers, child and descendant
//! segments, the five selector kinds, and the filter sub-language.

use super::ast::*;
use crate::error::{Error, Result};

/// Parse a query, allowing surrounding whitespace (lenient).
pub fn parse_query(input: &str) -> Result<Query> {
    let mut p = Parser::new(input.trim());
    let q = p.parse_root_query()?;
    p.skip_ws();
    p.expect_end()?;
    Ok(q)
}

/// Parse a query, rejecting leading or trailing whitespace.
pub fn parse_query_strict(input: &str) -> Result<Query> {
    if input != input.trim() {
        return Err(Error::parse("leading or trailing whitespace is not allowed"));
    }
    parse_query(input)
}

pub(crate) struct Parser<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Parser<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            bytes: input.as_bytes(),
            pos: 0,
        }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let b = self.peek()?;
        self.pos += 1;
        Some(b)
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(b' ' | b'\t' | b'\n' | b'\r')) {
            self.pos += 1;
        }
    }

    fn expect(&mut self, c: u8) -> Result<()> {
        if self.peek() == Some(c) {
            self.pos += 1;
            Ok(())
        } else {
            Err(Error::parse(format!(
                "expected '{}' at byte {}",
                c as char, self.pos
            )))
        }
    }

    fn expect_end(&self) -> Result<()> {
        if self.pos == self.bytes.len() {
            Ok(())
        } else {
            Err(Error::parse(format!("unexpected trailing input at byte {}", self.pos)))
        }
    }

    fn eat_str(&mut self, s: &str) -> bool {
        if self.bytes[self.pos..].starts_with(s.as_bytes()) {
            self.pos += s.len();
            true
        } else {
            false
        }
    }

    /// `$` ... or `@` ... (the latter only valid as the root of a relative
    /// query used inside a filter).
    fn parse_root_query(&mut self) -> Result<Query> {
        let root = match self.bump() {
            Some(b'$') => RootKind::Input,
            Some(b'@') => RootKind::Current,
            _ => return Err(Error::parse("query must start with '$' or '@'")),
        };
        let segments = self.parse_segments()?;
        Ok(Query { root, segments })
    }

    fn parse_segments(&mut self) -> Result<Vec<Segment>> {
        let mut segments = Vec::new();
        loop {
            self.skip_ws();
            match self.peek() {
                Some(b'.') => {
                    self.pos += 1;
                    if self.peek() == Some(b'.') {
                        self.pos += 1;
                        segments.push(self.parse_descendant_tail()?);
                    } else {
                        segments.push(self.parse_dot_shorthand()?);
                    }
                }
                Some(b'[') => segments.push(Segment {
                    descendant: false,
                    selectors: self.parse_bracketed_selection()?,
                }),
                _ => break,
            }
        }
        Ok(segments)
    }

    fn parse_dot_shorthand(&mut self) -> Result<Segment> {
        if self.peek() == Some(b'*') {
            self.pos += 1;
            return Ok(Segment {
                descendant: false,
                selectors: vec![Selector::Wildcard],
            });
        }
        let name = self.parse_member_name()?;
        Ok(Segment {
            descendant: false,
            selectors: vec![Selector::Name(name)],
        })
    }

    fn parse_descendant_tail(&mut self) -> Result<Segment> {
        match self.peek() {
            Some(b'[') => Ok(Segment {
                descendant: true,
                selectors: self.parse_bracketed_selection()?,
            }),
            Some(b'*') => {
                self.pos += 1;
                Ok(Segment {
                    descendant: true,
                    selectors: vec![Selector::Wildcard],
                })
            }
            _ => {
                let name = self.parse_member_name()?;
                Ok(Segment {
                    descendant: true,
                    selectors: vec![Selector::Name(name)],
                })
            }
        }
    }

    fn parse_member_name(&mut self) -> Result<String> {
        let start = self.pos;
        match self.peek() {
            Some(c) if c == b'_' || c.is_ascii_alphabetic() => self.pos += 1,
            _ => return Err(Error::parse("expected a member name")),
        }
        while matches!(self.peek(), Some(c) if c == b'_' || c.is_ascii_alphanumeric()) {
            self.pos += 1;
        }
        Ok(String::from_utf8_lossy(&self.bytes[start..self.pos]).into_owned())
    }

    fn parse_bracketed_selection(&mut self) -> Result<Vec<Selector>> {
        self.expect(b'[')?;
        let mut selectors = Vec::new();
        loop {
            self.skip_ws();
            selectors.push(self.parse_selector()?);
            self.skip_ws();
            match self.peek() {
                Some(b',') => {
                    self.pos += 1;
                    continue;
                }
                Some(b']') => {
                    self.pos += 1;
                    break;
                }
                _ => return Err(Error::parse("expected ',' or ']' in bracketed selection")),
            }
        }
        Ok(selectors)
    }

    fn parse_selector(&mut self) -> Result<Selector> {
        match self.peek() {
            Some(b'\'') | Some(b'"') => Ok(Selector::Name(self.parse_string_literal()?)),
            Some(b'*') => {
                self.pos += 1;
                Ok(Selector::Wildcard)
            }
            Some(b'?') => {
                self.pos += 1;
                self.skip_ws();
                Ok(Selector::Filter(self.parse_logical_or()?))
            }
            Some(c) if c == b'-' || c.is_ascii_digit() || c == b':' => self.parse_index_or_slice(),
            _ => Err(Error::parse("unrecognized selector")),
        }
    }

    fn parse_index_or_slice(&mut self) -> Result<Selector> {
        let start = self.maybe_parse_int()?;
        self.skip_ws();
        if self.peek() == Some(b':') {
            self.pos += 1;
            self.skip_ws();
            let end = self.maybe_parse_int()?;
            self.skip_ws();
            let step = if self.peek() == Some(b':') {
                self.pos += 1;
                self.skip_ws();
                self.maybe_parse_int()?
            } else {
                None
            };
            Ok(Selector::Slice(Slice { start, end, step }))
        } else {
            match start {
                Some(i) => Ok(Selector::Index(i)),
                None => Err(Error::parse("expected an index")),
            }
        }
    }

    fn maybe_parse_int(&mut self) -> Result<Option<i64>> {
        self.skip_ws();
        let start = self.pos;
        if self.peek() == Some(b'-') {
            self.pos += 1;
        }
        let digits_start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
            self.pos += 1;
        }
        if self.pos == digits_start {
            self.pos = start;
            return Ok(None);
        }
        let text = std::str::from_utf8(&self.bytes[start..self.pos]).unwrap();
        let value: i64 = text
            .parse()
            .map_err(|_| Error::parse(format!("integer literal out of range: {text}")))?;
        const SAFE: i64 = 9_007_199_254_740_991; // 2^53 - 1
        if value.abs() > SAFE {
            return Err(Error::parse(format!(
                "integer literal {text} exceeds the safe integer range"
            )));
        }
        Ok(Some(value))
    }

    fn parse_string_literal(&mut self) -> Result<String> {
        let quote = self.bump().unwrap();
        let mut s = String::new();
        loop {
            match self.bump() {
                None => return Err(Error::parse("unterminated string literal")),
                Some(c) if c == quote => break,
                Some(b'\\') => match self.bump() {
                    Some(b'n') => s.push('\n'),
                    Some(b't') => s.push('\t'),
                    Some(b'r') => s.push('\r'),
                    Some(b'b') => s.push('\u{8}'),
                    Some(b'f') => s.push('\u{c}'),
                    Some(c) if c == quote => s.push(quote as char),
                    Some(b'\\') => s.push('\\'),
                    Some(b'/') => s.push('/'),
                    Some(b'u') => {
                        let hex = std::str::from_utf8(&self.bytes[self.pos..self.pos + 4])
                            .map_err(|_| Error::parse("invalid \\u escape"))?;
                        let cp = u32::from_str_radix(hex, 16)
                            .map_err(|_| Error::parse("invalid \\u escape"))?;
                        self.pos += 4;
                        if let Some(c) = char::from_u32(cp) {
                            s.push(c);
                        }
                    }
                    _ => return Err(Error::parse("invalid escape sequence")),
                },
                Some(c) => {
                    // Re-decode as UTF-8: step back one byte and read a full
                    // char, since member bytes may be multi-byte.
                    self.pos -= 1;
                    let rest = std::str::from_utf8(&self.bytes[self.pos..])
                        .map_err(|_| Error::parse("invalid utf-8 in string literal"))?;
                    let ch = rest.chars().next().unwrap();
                    s.push(ch);
                    self.pos += ch.len_utf8();
                    let _ = c;
                }
            }
        }
        Ok(s)
    }

    // ---- filter expressions ----

    fn parse_logical_or(&mut self) -> Result<FilterExpr> {
        let mut terms = vec![self.parse_logical_and()?];
        loop {
            self.skip_ws();
            if self.eat_str("||") {
                self.skip_ws();
                terms.push(self.parse_logical_and()?);
            } else {
                break;
            }
        }
        Ok(if terms.len() == 1 {
            terms.pop().unwrap()
        } else {
            FilterExpr::Or(terms)
        })
    }

    fn parse_logical_and(&mut self) -> Result<FilterExpr> {
        let mut terms = vec![self.parse_basic_expr()?];
        loop {
            self.skip_ws();
            if self.eat_str("&&") {
                self.skip_ws();
                terms.push(self.parse_basic_expr()?);
            } else {
                break;
            }
        }
        Ok(if terms.len() == 1 {
            terms.pop().unwrap()
        } else {
            FilterExpr::And(terms)
        })
    }

    fn parse_basic_expr(&mut self) -> Result<FilterExpr> {
        self.skip_ws();
        let negated = if self.peek() == Some(b'!') {
            self.pos += 1;
            self.skip_ws();
            true
        } else {
            false
        };
        if self.peek() == Some(b'(') {
            self.pos += 1;
            self.skip_ws();
            let inner = self.parse_logical_or()?;
            self.skip_ws();
            self.expect(b')')?;
            return Ok(if negated {
                FilterExpr::Not(Box::new(inner))
            } else {
                inner
            });
        }
        if matches!(self.peek(), Some(b'$') | Some(b'@')) {
            let query = self.parse_root_query()?;
            self.skip_ws();
            if let Some(op) = self.try_parse_compare_op() {
                self.skip_ws();
                let right = self.parse_comparable()?;
                return self.build_compare(Comparable::Query(query), op, right, negated);
            }
            return Ok(FilterExpr::Test { query, negated });
        }
        // Otherwise: a comparison whose left side is a literal or function call.
        let left = self.parse_comparable()?;
        self.skip_ws();
        let op = self
            .try_parse_compare_op()
            .ok_or_else(|| Error::parse("expected a comparison operator"))?;
        self.skip_ws();
        let right = self.parse_comparable()?;
        self.build_compare(left, op, right, negated)
    }

    fn build_compare(
        &self,
        left: Comparable,
        op: CompareOp,
        right: Comparable,
        negated: bool,
    ) -> Result<FilterExpr> {
        let (op, swap) = op.normalize();
        let (left, right) = if swap { (right, left) } else { (left, right) };
        let cmp = FilterExpr::Compare { left, op, right };
        Ok(if negated {
            FilterExpr::Not(Box::new(cmp))
        } else {
            cmp
        })
    }

    fn try_parse_compare_op(&mut self) -> Option<CompareOp> {
        for (text, op) in [
            ("==", CompareOp::Eq),
            ("!=", CompareOp::Ne),
            ("<=", CompareOp::Le),
            (">=", CompareOp::Ge),
            ("<", CompareOp::Lt),
            (">", CompareOp::Gt),
        ] {
            if self.eat_str(text) {
                return Some(op);
            }
        }
        None
    }

    fn parse_comparable(&mut self) -> Result<Comparable> {
        self.skip_ws();
        match self.peek() {
            Some(b'$') | Some(b'@') => Ok(Comparable::Query(self.parse_root_query()?)),
            Some(b'\'') | Some(b'"') => {
                Ok(Comparable::Literal(Literal::String(self.parse_string_literal()?)))
            }
            Some(c) if c == b'-' || c.is_ascii_digit() => {
                Ok(Comparable::Literal(Literal::Number(self.parse_number()?)))
            }
            Some(_) => {
                let ident = self.parse_ident()?;
                match ident.as_str() {
                    "true" => Ok(Comparable::Literal(Literal::Bool(true))),
                    "false" => Ok(Comparable::Literal(Literal::Bool(false))),
                    "null" => Ok(Comparable::Literal(Literal::Null)),
                    name => {
                        self.skip_ws();
                        self.expect(b'(')?;
                        let args = self.parse_function_args()?;
                        Ok(Comparable::Function(FunctionCall {
                            name: name.to_string(),
                            args,
                        }))
                    }
                }
            }
            None => Err(Error::parse("expected a comparable value")),
        }
    }

    fn parse_function_args(&mut self) -> Result<Vec<FunctionArg>> {
        self.skip_ws();
        let mut args = Vec::new();
        if self.peek() == Some(b')') {
            self.pos += 1;
            return Ok(args);
        }
        loop {
            self.skip_ws();
            args.push(match self.parse_comparable()? {
                Comparable::Literal(l) => FunctionArg::Literal(l),
                Comparable::Query(q) => FunctionArg::Query(q),
                Comparable::Function(f) => FunctionArg::Function(f),
            });
            self.skip_ws();
            match self.bump() {
                Some(b',') => continue,
                Some(b')') => break,
                _ => return Err(Error::parse("expected ',' or ')' in function arguments")),
            }
        }
        Ok(args)
    }

    fn parse_ident(&mut self) -> Result<String> {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c == b'_' || c.is_ascii_alphanumeric()) {
            self.pos += 1;
        }
        if self.pos == start {
            return Err(Error::parse("expected an identifier"));
        }
        Ok(String::from_utf8_lossy(&self.bytes[start..self.pos]).into_owned())
    }

    fn parse_number(&mut self) -> Result<f64> {
        let start = self.pos;
        if self.peek() == Some(b'-') {
            self.pos += 1;
        }
        while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
            self.pos += 1;
        }
        if self.peek() == Some(b'.') {
            self.pos += 1;
            while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
                self.pos += 1;
            }
        }
        if matches!(self.peek(), Some(b'e' | b'E')) {
            self.pos += 1;
            if matches!(self.peek(), Some(b'+' | b'-')) {
                self.pos += 1;
            }
            while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
                self.pos += 1;
            }
        }
        let text = std::str::from_utf8(&self.bytes[start..self.pos]).unwrap();
        text.parse()
            .map_err(|_| Error::parse(format!("invalid number literal: {text}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_dot_and_bracket_names() {
        let q = parse_query("$.a.b['c']").unwrap();
        assert_eq!(q.segments.len(), 3);
    }

    #[test]
    fn parses_slice_and_wildcard() {
        let q = parse_query("$[:3]").unwrap();
        assert!(matches!(q.segments[0].selectors[0], Selector::Slice(_)));
        let q = parse_query("$[*]").unwrap();
        assert!(matches!(q.segments[0].selectors[0], Selector::Wildcard));
    }

    #[test]
    fn parses_descendant_segment() {
        let q = parse_query("$..name").unwrap();
        assert!(q.segments[0].descendant);
    }

    #[test]
    fn parses_multi_selector_segment() {
        let q = parse_query("$[2,0]").unwrap();
        assert_eq!(q.segments[0].selectors.len(), 2);
    }

    #[test]
    fn parses_filter_with_comparison() {
        let q = parse_query("$.items[?@.p<100]").unwrap();
        match &q.segments[1].selectors[0] {
            Selector::Filter(FilterExpr::Compare { op, .. }) => assert_eq!(*op, CompareOp::Lt),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn normalizes_ge_by_swapping_operands() {
        let q = parse_query("$[?@.a >= 1]").unwrap();
        match &q.segments[0].selectors[0] {
            Selector::Filter(FilterExpr::Compare { left, op, .. }) => {
                assert_eq!(*op, CompareOp::Le);
                assert!(matches!(left, Comparable::Literal(Literal::Number(_))));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn strict_parser_rejects_surrounding_whitespace() {
        assert!(parse_query_strict(" $.a").is_err());
        assert!(parse_query_strict("$.a").is_ok());
    }

    #[test]
    fn rejects_out_of_range_integer_literal() {
        assert!(parse_query("$[9007199254740992]").is_err());
    }
}
