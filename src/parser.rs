//! The recursive-descent parser.
//!
//! One byte of lookahead, zero-copy: every string-view, number-token,
//! path-token and blob-text slice borrows from the input `text`, so the
//! returned [`Document`] cannot outlive it. An explicit `pos` field plus
//! `peek`/`bump` helpers over checked slice indexing, no `unsafe`
//! shortcuts.

use crate::base64;
use crate::config;
use crate::error::{Error, Result};
use crate::scanner;
use crate::value::{Document, Number, NumberKind, NumberToken, NodeId, Value};

/// Materialization mode. Syntax-only validation is handled by the
/// separate [`validate`] entry point, which shares this parser's
/// grammar but never allocates a tree.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    /// Parse fully; decode blob-text to blob-bytes; convert number
    /// tokens to concrete numbers.
    Full,
    /// Parse fully; convert numbers; leave blob-text as-is.
    Eager,
    /// Parse fully but keep numbers as textual tokens; leave blob-text
    /// as-is.
    Lazy,
}

/// Parses `bytes` into a [`Document`] under the given materialization
/// mode. Takes raw bytes, not `&str`: several of the pre-parse checks
/// must reject byte patterns — like a UTF-16 BOM — that can never occur
/// in a valid `&str` to begin with, so they have to run before UTF-8
/// validity is assumed.
pub fn parse(bytes: &[u8], mode: Mode) -> Result<Document<'_>> {
    let Some(cursor) = precheck(bytes)? else {
        // empty-after-BOM input: null document
        let mut doc = Document::new();
        let root = doc.alloc(Value::Null);
        doc.set_root(root);
        return Ok(doc);
    };
    let mut parser = Parser {
        text: cursor.text,
        bytes: cursor.text.as_bytes(),
        pos: cursor.pos,
        mode,
        doc: Document::new(),
    };
    let root = parser.parse_value()?;
    parser.skip_ws();
    if parser.pos != parser.bytes.len() {
        if let Some(b) = parser.peek() {
            return Err(Error::unexpected_symbol(b, parser.pos));
        }
    }
    parser.doc.set_root(root);
    Ok(parser.doc)
}

/// Walks the grammar without building a tree, for callers that only
/// want a syntax check. Succeeds under exactly the same conditions as
/// [`parse`].
pub fn validate(bytes: &[u8]) -> Result<()> {
    let Some(cursor) = precheck(bytes)? else {
        return Ok(());
    };
    let mut parser = Parser {
        text: cursor.text,
        bytes: cursor.text.as_bytes(),
        pos: cursor.pos,
        mode: Mode::Lazy,
        doc: Document::new(),
    };
    parser.parse_value()?;
    parser.skip_ws();
    if parser.pos != parser.bytes.len() {
        if let Some(b) = parser.peek() {
            return Err(Error::unexpected_symbol(b, parser.pos));
        }
    }
    Ok(())
}

struct Cursor<'a> {
    text: &'a str,
    pos: usize,
}

/// Runs the pre-parse checks. Returns `None` when the input is empty
/// (after BOM stripping and whitespace skipping) — the "null value"
/// case callers must translate into an empty document.
fn precheck(bytes: &[u8]) -> Result<Option<Cursor<'_>>> {
    if bytes.is_empty() {
        return Ok(None);
    }
    if bytes.starts_with(&[0x00, 0x00, 0xFE, 0xFF]) || bytes.starts_with(&[0xFF, 0xFE, 0x00, 0x00]) {
        return Err(Error::Utf32Bom);
    }
    if bytes.starts_with(&[0xFE, 0xFF]) || bytes.starts_with(&[0xFF, 0xFE]) {
        return Err(Error::Utf16Bom);
    }
    let first = bytes[0];
    if (0xF8..=0xFF).contains(&first) {
        return Err(Error::InvalidUtf8 { byte: first, position: 0 });
    }
    if (0x80..=0xBF).contains(&first) {
        return Err(Error::Utf8Continuation { byte: first });
    }
    let mut pos = 0;
    if bytes.starts_with(&[0xEF, 0xBB, 0xBF]) {
        pos = 3;
    }
    let text = std::str::from_utf8(&bytes[pos..])
        .map_err(|e| Error::InvalidUtf8 { byte: bytes[pos + e.valid_up_to()], position: pos + e.valid_up_to() })?;
    let text_bytes = text.as_bytes();
    match scanner::skip_spaces(text_bytes, 0, text_bytes.len()) {
        Some(idx) => Ok(Some(Cursor { text, pos: idx })),
        None => Err(Error::UnexpectedEndOfText { position: bytes.len() }),
    }
}

struct Parser<'a> {
    text: &'a str,
    bytes: &'a [u8],
    pos: usize,
    mode: Mode,
    doc: Document<'a>,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let b = self.peek()?;
        self.pos += 1;
        Some(b)
    }

    fn expect_byte(&mut self, want: u8) -> Result<()> {
        match self.peek() {
            Some(b) if b == want => {
                self.pos += 1;
                Ok(())
            }
            Some(_) => Err(Error::expected_symbol(want, self.pos)),
            None => Err(Error::UnexpectedEndOfText { position: self.pos }),
        }
    }

    fn skip_ws(&mut self) {
        let remaining = self.bytes.len() - self.pos;
        match scanner::skip_spaces(self.bytes, self.pos, remaining) {
            Some(idx) => self.pos = idx,
            None => self.pos = self.bytes.len(),
        }
    }

    fn parse_value(&mut self) -> Result<NodeId> {
        self.skip_ws();
        match self.peek() {
            Some(b'"') => self.parse_string_value(),
            Some(b'{') => self.parse_object(),
            Some(b'[') => self.parse_array(),
            Some(b'n') => self.parse_keyword("null", Value::Null),
            Some(b't') => self.parse_keyword("true", Value::Bool(true)),
            Some(b'f') => self.parse_keyword("false", Value::Bool(false)),
            Some(b) if b == b'-' || b.is_ascii_digit() => self.parse_number(),
            Some(b) => Err(Error::unexpected_symbol(b, self.pos)),
            None => Err(Error::UnexpectedEndOfText { position: self.pos }),
        }
    }

    fn parse_keyword(&mut self, keyword: &'static str, value: Value<'a>) -> Result<NodeId> {
        let end = self.pos + keyword.len();
        match self.bytes.get(self.pos..end) {
            Some(slice) if slice == keyword.as_bytes() => {
                self.pos = end;
                Ok(self.doc.alloc(value))
            }
            Some(_) => Err(Error::unexpected_symbol(self.bytes[self.pos], self.pos)),
            None => Err(Error::UnexpectedEndOfText { position: self.bytes.len() }),
        }
    }

    fn parse_string_value(&mut self) -> Result<NodeId> {
        self.expect_byte(b'"')?;
        let raw = self.parse_string_raw()?;
        let value = self.classify_string(raw)?;
        Ok(self.doc.alloc(value))
    }

    /// Scans to the closing, unescaped quote, honoring the "odd run of
    /// backslashes escapes the quote" rule. Returns the raw slice
    /// between quotes, untouched (the parser never unescapes or copies
    /// string bodies).
    fn parse_string_raw(&mut self) -> Result<&'a str> {
        let start = self.pos;
        loop {
            let remaining = self.bytes.len() - self.pos;
            let idx = scanner::find_quote(self.bytes, self.pos, remaining)
                .ok_or(Error::UnexpectedEndOfText { position: self.pos })?;
            let mut back = idx;
            let mut backslashes = 0usize;
            while back > start && self.bytes[back - 1] == b'\\' {
                back -= 1;
                backslashes += 1;
            }
            if backslashes % 2 == 1 {
                self.pos = idx + 1;
                continue;
            }
            let raw = &self.text[start..idx];
            self.pos = idx + 1;
            return Ok(raw);
        }
    }

    fn classify_string(&mut self, raw: &'a str) -> Result<Value<'a>> {
        let (path_prefix, blob_prefix, number_prefix) =
            config::with_active(|c| (c.path_prefix.clone(), c.blob_prefix.clone(), c.number_prefix.clone()));
        if let Some(tail) = raw.strip_prefix(path_prefix.as_str()) {
            if !tail.starts_with('/') {
                return Err(Error::InvalidPath { path: tail.to_string() });
            }
            return Ok(Value::PathToken(tail));
        }
        if let Some(tail) = raw.strip_prefix(blob_prefix.as_str()) {
            return match self.mode {
                Mode::Full => Ok(Value::BlobBytes(base64::decode(tail, true)?)),
                Mode::Eager | Mode::Lazy => Ok(Value::BlobText(tail)),
            };
        }
        if let Some(tail) = raw.strip_prefix(number_prefix.as_str()) {
            return self.parse_typed_number_token(tail);
        }
        Ok(Value::StringView(raw))
    }

    fn parse_typed_number_token(&mut self, tail: &'a str) -> Result<Value<'a>> {
        let open = tail.find('(').ok_or_else(|| Error::unexpected_symbol(b'(', self.pos))?;
        let type_name = &tail[..open];
        let rest = &tail[open + 1..];
        let close = rest.find(')').ok_or_else(|| Error::unexpected_symbol(b')', self.pos))?;
        let digits = &rest[..close];
        let kind = NumberKind::from_wire_name(type_name)
            .ok_or_else(|| Error::InvalidPath { path: type_name.to_string() })?;
        match self.mode {
            Mode::Lazy => Ok(Value::NumberToken(NumberToken { slice: digits, kind })),
            Mode::Eager | Mode::Full => Ok(Value::Number(numeric_from_text(digits, kind)?)),
        }
    }

    fn parse_number(&mut self) -> Result<NodeId> {
        let start = self.pos;
        if self.peek() == Some(b'-') {
            self.pos += 1;
        }
        match self.peek() {
            Some(b'0') => self.pos += 1,
            Some(b) if b.is_ascii_digit() => {
                self.pos += 1;
                let remaining = self.bytes.len() - self.pos;
                self.pos = scanner::scan_digits(self.bytes, self.pos, remaining);
            }
            Some(b) => return Err(Error::unexpected_symbol(b, self.pos)),
            None => return Err(Error::UnexpectedEndOfText { position: self.pos }),
        }

        let mut kind = NumberKind::JsonInt64;

        if self.peek() == Some(b'.') {
            self.pos += 1;
            let frac_start = self.pos;
            let remaining = self.bytes.len() - self.pos;
            self.pos = scanner::scan_digits(self.bytes, self.pos, remaining);
            if self.pos == frac_start {
                return Err(Error::unexpected_symbol(self.peek().unwrap_or(0), self.pos));
            }
            kind = NumberKind::JsonDouble;
        }

        if matches!(self.peek(), Some(b'e') | Some(b'E')) {
            self.pos += 1;
            if matches!(self.peek(), Some(b'+') | Some(b'-')) {
                self.pos += 1;
            }
            let exp_start = self.pos;
            let remaining = self.bytes.len() - self.pos;
            self.pos = scanner::scan_digits(self.bytes, self.pos, remaining);
            if self.pos == exp_start {
                return Err(Error::unexpected_symbol(self.peek().unwrap_or(0), self.pos));
            }
            kind = NumberKind::JsonDouble;
        }

        let numeric_end = self.pos;
        let saw_decimal_or_exponent = kind == NumberKind::JsonDouble;

        if saw_decimal_or_exponent && matches!(self.peek(), Some(b'f') | Some(b'F')) {
            self.pos += 1;
            kind = NumberKind::F32;
        } else if matches!(self.peek(), Some(b'i') | Some(b'u')) {
            let signed = self.peek() == Some(b'i');
            self.pos += 1;
            kind = self.parse_width_suffix(signed)?;
        }

        let numeric_text = &self.text[start..numeric_end];
        let full_text = &self.text[start..self.pos];
        let value = match self.mode {
            Mode::Lazy => Value::NumberToken(NumberToken { slice: full_text, kind }),
            Mode::Eager | Mode::Full => Value::Number(numeric_from_text(numeric_text, kind)?),
        };
        Ok(self.doc.alloc(value))
    }

    fn parse_width_suffix(&mut self, signed: bool) -> Result<NumberKind> {
        let width = match self.peek() {
            Some(b'8') => {
                self.pos += 1;
                8
            }
            Some(b'1') => {
                self.pos += 1;
                self.expect_suffix_digit(b'6')?;
                16
            }
            Some(b'3') => {
                self.pos += 1;
                self.expect_suffix_digit(b'2')?;
                32
            }
            Some(b'6') => {
                self.pos += 1;
                self.expect_suffix_digit(b'4')?;
                64
            }
            _ => 64,
        };
        Ok(match (signed, width) {
            (true, 8) => NumberKind::I8,
            (false, 8) => NumberKind::U8,
            (true, 16) => NumberKind::I16,
            (false, 16) => NumberKind::U16,
            (true, 32) => NumberKind::I32,
            (false, 32) => NumberKind::U32,
            (true, 64) => NumberKind::I64,
            (false, 64) => NumberKind::U64,
            _ => unreachable!("width is always one of 8/16/32/64"),
        })
    }

    fn expect_suffix_digit(&mut self, want: u8) -> Result<()> {
        match self.peek() {
            Some(b) if b == want => {
                self.pos += 1;
                Ok(())
            }
            Some(b) => Err(Error::unexpected_symbol(b, self.pos)),
            None => Err(Error::UnexpectedEndOfText { position: self.pos }),
        }
    }

    fn parse_array(&mut self) -> Result<NodeId> {
        self.expect_byte(b'[')?;
        let reserve = config::with_active(|c| c.min_container_reserve);
        let mut items = Vec::with_capacity(reserve);
        self.skip_ws();
        if self.peek() == Some(b']') {
            self.pos += 1;
            return Ok(self.doc.alloc(Value::Array(items)));
        }
        loop {
            let id = self.parse_value()?;
            items.push(id);
            self.skip_ws();
            match self.bump() {
                Some(b',') => self.skip_ws(),
                Some(b']') => break,
                Some(b) => return Err(Error::unexpected_symbol(b, self.pos - 1)),
                None => return Err(Error::UnexpectedEndOfText { position: self.pos }),
            }
        }
        Ok(self.doc.alloc(Value::Array(items)))
    }

    fn parse_object(&mut self) -> Result<NodeId> {
        self.expect_byte(b'{')?;
        let reserve = config::with_active(|c| c.min_container_reserve);
        let mut members = Vec::with_capacity(reserve);
        self.skip_ws();
        if self.peek() == Some(b'}') {
            self.pos += 1;
            return Ok(self.doc.alloc(Value::Object(members)));
        }
        loop {
            self.skip_ws();
            self.expect_byte(b'"')?;
            let key = self.parse_string_raw()?;
            self.skip_ws();
            self.expect_byte(b':')?;
            let value_id = self.parse_value()?;
            members.push((std::borrow::Cow::Borrowed(key), value_id));
            self.skip_ws();
            match self.bump() {
                Some(b',') => {}
                Some(b'}') => break,
                Some(b) => return Err(Error::unexpected_symbol(b, self.pos - 1)),
                None => return Err(Error::UnexpectedEndOfText { position: self.pos }),
            }
        }
        Ok(self.doc.alloc(Value::Object(members)))
    }
}

fn numeric_from_text(text: &str, kind: NumberKind) -> Result<Number> {
    let bad = |_| Error::NumberNotConverted;
    Ok(match kind {
        NumberKind::JsonInt64 | NumberKind::I64 => Number::I64(text.parse().map_err(bad)?),
        NumberKind::U64 => Number::U64(text.parse().map_err(bad)?),
        NumberKind::JsonDouble => Number::F64(text.parse().map_err(bad)?),
        NumberKind::F32 => Number::F32(text.parse().map_err(bad)?),
        NumberKind::I8 => Number::I8(text.parse().map_err(bad)?),
        NumberKind::U8 => Number::U8(text.parse().map_err(bad)?),
        NumberKind::I16 => Number::I16(text.parse().map_err(bad)?),
        NumberKind::U16 => Number::U16(text.parse().map_err(bad)?),
        NumberKind::I32 => Number::I32(text.parse().map_err(bad)?),
        NumberKind::U32 => Number::U32(text.parse().map_err(bad)?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Kind;
    use rstest::rstest;

    #[test]
    fn empty_input_is_null() {
        let doc = parse(b"", Mode::Full).unwrap();
        assert_eq!(doc.classify(doc.root()), Kind::Null);
    }

    #[test]
    fn whitespace_only_input_is_unexpected_end_of_text() {
        assert!(matches!(parse(b"   \n\t", Mode::Full), Err(Error::UnexpectedEndOfText { .. })));
    }

    #[test]
    fn utf8_bom_is_stripped() {
        let doc = parse("\u{feff}42".as_bytes(), Mode::Full).unwrap();
        assert_eq!(doc.classify(doc.root()), Kind::Number);
    }

    #[test]
    fn utf16_bom_is_rejected() {
        assert!(matches!(parse(&[0xFE, 0xFF, b'1'], Mode::Full), Err(Error::Utf16Bom)));
    }

    #[test]
    fn utf32_bom_is_rejected() {
        assert!(matches!(parse(&[0x00, 0x00, 0xFE, 0xFF, b'1'], Mode::Full), Err(Error::Utf32Bom)));
    }

    #[test]
    fn continuation_byte_at_start_is_rejected() {
        assert!(matches!(parse(&[0xA0, b'1'], Mode::Full), Err(Error::Utf8Continuation { .. })));
    }

    #[test]
    fn lazy_mode_keeps_number_token() {
        let doc = parse(br#"{"a":1}"#, Mode::Lazy).unwrap();
        let members = doc.try_object_of(doc.root()).unwrap();
        let (key, id) = &members[0];
        let id = *id;
        assert_eq!(key.as_ref(), "a");
        match doc.get(id) {
            Value::NumberToken(tok) => {
                assert_eq!(tok.slice, "1");
                assert_eq!(tok.kind, NumberKind::JsonInt64);
            }
            other => panic!("expected NumberToken, got {other:?}"),
        }
    }

    #[test]
    fn full_mode_decodes_blob() {
        let doc = parse(br#"{"b":"$cppon-blob:SGVsbG8="}"#, Mode::Full).unwrap();
        let members = doc.try_object_of(doc.root()).unwrap();
        let id = members[0].1;
        match doc.get(id) {
            Value::BlobBytes(bytes) => assert_eq!(bytes, b"Hello"),
            other => panic!("expected BlobBytes, got {other:?}"),
        }
    }

    #[test]
    fn path_prefix_produces_path_token() {
        let doc = parse(br#""$cppon-path:/a/b""#, Mode::Lazy).unwrap();
        assert!(matches!(doc.get(doc.root()), Value::PathToken("/a/b")));
    }

    #[test]
    fn path_prefix_without_leading_slash_is_invalid() {
        let err = parse(br#""$cppon-path:a""#, Mode::Lazy).unwrap_err();
        assert!(matches!(err, Error::InvalidPath { .. }));
    }

    #[test]
    fn number_suffix_i8_parses() {
        let doc = parse(b"5i8", Mode::Full).unwrap();
        match doc.get(doc.root()) {
            Value::Number(Number::I8(5)) => {}
            other => panic!("expected Number::I8(5), got {other:?}"),
        }
    }

    #[test]
    fn number_with_fraction_and_f32_suffix() {
        let doc = parse(b"1.5f", Mode::Full).unwrap();
        match doc.get(doc.root()) {
            Value::Number(Number::F32(v)) => assert!((*v - 1.5).abs() < f32::EPSILON),
            other => panic!("expected Number::F32(1.5), got {other:?}"),
        }
    }

    #[test]
    fn escaped_quote_inside_string_is_not_a_terminator() {
        let doc = parse(br#""a\"b""#, Mode::Full).unwrap();
        assert_eq!(doc.get(doc.root()).as_str(), Some(r#"a\"b"#));
    }

    #[test]
    fn array_and_object_round_trip_shapes() {
        let doc = parse(br#"{"a":[1,2,3],"b":{}}"#, Mode::Full).unwrap();
        let members = doc.try_object_of(doc.root()).unwrap();
        assert_eq!(members.len(), 2);
        let a_id = members[0].1;
        assert_eq!(doc.try_array_of(a_id).unwrap().len(), 3);
    }

    #[test]
    fn trailing_garbage_is_rejected() {
        assert!(parse(b"1 2", Mode::Full).is_err());
    }

    #[test]
    fn validate_agrees_with_parse() {
        let cases: [(&[u8], bool); 3] = [(br#"{"a":1}"#, true), (br#"{"a":}"#, false), (b"[1,2]", true)];
        for (text, should_succeed) in cases {
            assert_eq!(validate(text).is_ok(), should_succeed, "mismatched for {text:?}");
            assert_eq!(parse(text, Mode::Full).is_ok(), should_succeed, "mismatched for {text:?}");
        }
    }

    #[rstest]
    #[case(b"5i8", NumberKind::I8)]
    #[case(b"5u8", NumberKind::U8)]
    #[case(b"5i16", NumberKind::I16)]
    #[case(b"5u16", NumberKind::U16)]
    #[case(b"5i32", NumberKind::I32)]
    #[case(b"5u32", NumberKind::U32)]
    #[case(b"5i64", NumberKind::I64)]
    #[case(b"5u64", NumberKind::U64)]
    #[case(b"5", NumberKind::JsonInt64)]
    #[case(b"5.0", NumberKind::JsonDouble)]
    #[case(b"5e1", NumberKind::JsonDouble)]
    #[case(b"5.0f", NumberKind::F32)]
    fn number_suffix_grammar_selects_expected_kind(#[case] text: &[u8], #[case] expected: NumberKind) {
        let doc = parse(text, Mode::Full).unwrap();
        match doc.get(doc.root()) {
            Value::Number(n) => assert_eq!(n.kind(), expected, "for input {:?}", std::str::from_utf8(text)),
            other => panic!("expected a Number, got {other:?}"),
        }
    }

    #[rstest]
    #[case(b"5i1")] // `16` continuation digit missing
    #[case(b"5i7")] // not one of 8/16/32/64
    #[case(b"5f")] // `f` suffix without a preceding `.`/exponent
    fn number_suffix_grammar_rejects_malformed_suffix(#[case] text: &[u8]) {
        assert!(parse(text, Mode::Full).is_err(), "expected rejection for {:?}", std::str::from_utf8(text));
    }
}
