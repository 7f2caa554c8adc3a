//! The printer.
//!
//! Renders a [`Document`] subtree back to text under one of four
//! layouts, trading off JSON-compatibility against cppon's richer
//! wire forms (typed numbers, blobs, in-doc references). Builds
//! directly into a caller-supplied `String` buffer in one recursive
//! pass, with no intermediate tree of formatted fragments.

use crate::config;
use crate::error::{Error, Result};
use crate::reference;
use crate::value::{Document, Number, NumberKind, NodeId, Value};

/// How printing should treat this call's output buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BufferPolicy {
    /// Start from an empty buffer.
    Reset,
    /// Append to whatever the caller already has in the buffer.
    Retain,
    /// Like `Reset`, but pre-reserves the given extra capacity.
    Reserve(usize),
}

/// The four rendering layouts a document can be printed under.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Layout {
    /// Strict JSON: pointers are flattened, typed numbers are folded
    /// into plain JSON numbers, and any integer outside
    /// `[-2^53+1, 2^53-1]` is an error.
    Json,
    /// The native wire form: typed numbers, blobs, and references all
    /// keep their `$cppon-*` prefixes.
    Cppon,
    /// Like `Cppon`, but every pointer is replaced by a deep copy of
    /// its target, falling back to a path token when that would
    /// recurse into a cycle.
    Flatten,
    /// Like `Cppon`, but every number (not just non-`f64`/`i64` ones)
    /// is rendered through its typed wire form, preserving width
    /// exactly on a round trip.
    Exact,
}

/// Printer options: output-buffer policy, rendering layout, and
/// pretty/compact formatting.
#[derive(Clone, Debug)]
pub struct PrinterOptions {
    pub buffer: BufferPolicy,
    pub layout: Layout,
    pub pretty: bool,
    /// Starting indentation depth (in `tabulation` units) for nested
    /// values. Only visible on the very first emitted line when
    /// [`PrinterOptions::indent_first`] is set; every line after that
    /// is already indented relative to it by the recursive descent.
    pub margin: usize,
    pub tabulation: String,
    /// Whether the first emitted line receives `margin` worth of
    /// indentation, or starts at column 0. Only matters under `pretty`;
    /// useful when the caller is splicing the output into an
    /// already-indented host document.
    pub indent_first: bool,
    /// Overrides `config::Config::printer_element_reserve` for this
    /// call's initial buffer reservation.
    pub reserve_hint: Option<usize>,
}

impl Default for PrinterOptions {
    fn default() -> Self {
        PrinterOptions {
            buffer: BufferPolicy::Reset,
            layout: Layout::Cppon,
            pretty: false,
            margin: 0,
            tabulation: "  ".to_string(),
            indent_first: false,
            reserve_hint: None,
        }
    }
}

impl PrinterOptions {
    /// A strict-JSON preset.
    pub fn json() -> Self {
        PrinterOptions { layout: Layout::Json, ..Default::default() }
    }

    /// Validates option combinations that can't be checked at
    /// construction time — e.g. a zero tabulation width under
    /// `pretty`.
    fn validate(&self) -> Result<()> {
        if self.pretty && self.tabulation.is_empty() {
            return Err(Error::BadOption {
                key: "tabulation".to_string(),
                reason: "must be non-empty when pretty printing".to_string(),
            });
        }
        Ok(())
    }
}

const JSON_MAX_SAFE_INT: i64 = 9_007_199_254_740_991; // 2^53 - 1
const JSON_MIN_SAFE_INT: i64 = -9_007_199_254_740_991; // -2^53 + 1

/// Prints the subtree rooted at `root` into a fresh `String` under
/// `options`.
pub fn print(doc: &Document, root: NodeId, options: &PrinterOptions) -> Result<String> {
    let mut buf = String::new();
    print_into(doc, root, options, &mut buf)?;
    Ok(buf)
}

/// Prints into a caller-owned buffer, honoring [`BufferPolicy`].
pub fn print_into(doc: &Document, root: NodeId, options: &PrinterOptions, buf: &mut String) -> Result<()> {
    options.validate()?;
    match options.buffer {
        BufferPolicy::Reset => buf.clear(),
        BufferPolicy::Retain => {}
        BufferPolicy::Reserve(extra) => {
            buf.clear();
            buf.reserve(extra);
        }
    }
    let element_reserve = options.reserve_hint.unwrap_or_else(|| config::with_active(|c| c.printer_element_reserve));
    buf.reserve(doc.len().saturating_mul(element_reserve).min(1 << 20));

    let mut printer = Printer { doc, options, depth: options.margin };
    if options.pretty && options.indent_first {
        for _ in 0..options.margin {
            buf.push_str(&options.tabulation);
        }
    }
    printer.print_value(root, buf)
}

struct Printer<'d, 'a> {
    doc: &'d Document<'a>,
    options: &'d PrinterOptions,
    depth: usize,
}

impl<'d, 'a> Printer<'d, 'a> {
    fn newline_indent(&self, buf: &mut String, depth: usize) {
        if self.options.pretty {
            buf.push('\n');
            for _ in 0..depth {
                buf.push_str(&self.options.tabulation);
            }
        }
    }

    fn print_value(&mut self, id: NodeId, buf: &mut String) -> Result<()> {
        match self.doc.get(id) {
            Value::Object(members) => self.print_object(members, buf),
            Value::Array(items) => self.print_array(items, buf),
            Value::StringView(s) => print_json_string(s, buf),
            Value::OwnedString(s) => print_json_string(s, buf),
            Value::Bool(b) => {
                buf.push_str(if *b { "true" } else { "false" });
                Ok(())
            }
            Value::Null => {
                buf.push_str("null");
                Ok(())
            }
            Value::Number(n) => self.print_number(*n, buf),
            Value::NumberToken(tok) => {
                buf.push_str(tok.slice);
                Ok(())
            }
            Value::BlobBytes(bytes) => self.print_blob(bytes, buf),
            Value::BlobText(text) => self.print_blob_text(text, buf),
            Value::PathToken(path) => self.print_path_token(path, buf),
            Value::Pointer(target) => self.print_pointer(id, *target, buf),
        }
    }

    fn print_object(&mut self, members: &[(crate::value::Key<'a>, NodeId)], buf: &mut String) -> Result<()> {
        buf.push('{');
        self.depth += 1;
        for (index, (key, child)) in members.iter().enumerate() {
            if index > 0 {
                buf.push(',');
            }
            self.newline_indent(buf, self.depth);
            print_json_string(key.as_ref(), buf)?;
            buf.push(':');
            if self.options.pretty {
                buf.push(' ');
            }
            self.print_value(*child, buf)?;
        }
        self.depth -= 1;
        if !members.is_empty() {
            self.newline_indent(buf, self.depth);
        }
        buf.push('}');
        Ok(())
    }

    fn print_array(&mut self, items: &[NodeId], buf: &mut String) -> Result<()> {
        buf.push('[');
        self.depth += 1;
        for (index, child) in items.iter().enumerate() {
            if index > 0 {
                buf.push(',');
            }
            self.newline_indent(buf, self.depth);
            self.print_value(*child, buf)?;
        }
        self.depth -= 1;
        if !items.is_empty() {
            self.newline_indent(buf, self.depth);
        }
        buf.push(']');
        Ok(())
    }

    fn print_number(&self, n: Number, buf: &mut String) -> Result<()> {
        // A plain, unsuffixed JSON integer and an explicit `i64`
        // literal both convert to `Number::I64`, so `n.kind()` reports
        // `I64` for either once realized — the untagged/tagged
        // distinction only survives in `Lazy` mode's `NumberToken`.
        // `I64`/`JsonDouble` are therefore the two kinds a plain
        // decimal literal already round-trips through.
        if self.options.layout == Layout::Json {
            if n.kind() == NumberKind::I64 {
                if let Some(i) = n.as_i64() {
                    if i > JSON_MAX_SAFE_INT || i < JSON_MIN_SAFE_INT {
                        return Err(Error::JsonCompatibility { value: i });
                    }
                }
            }
            // Any other kind (the width would otherwise be lost, or
            // the magnitude would otherwise be unsafe) gets wrapped in
            // the quoted `$cppon-number:TYPE(value)` wire form so it
            // still round-trips through a JSON reader.
            return if matches!(n.kind(), NumberKind::I64 | NumberKind::JsonDouble) {
                write_plain_number(n, buf)
            } else {
                write_typed_wire_form(n, buf)
            };
        }

        // Every other kind needs its native suffix (`3i32`, `1.5f`,
        // ...) to survive a round trip. `Exact` always preserves the
        // number-token form, even for those two natural kinds (which
        // have no suffix to add).
        let wants_suffix = self.options.layout == Layout::Exact
            || !matches!(n.kind(), NumberKind::I64 | NumberKind::JsonDouble);

        write_plain_number(n, buf)?;
        if wants_suffix {
            buf.push_str(native_suffix(n.kind()));
        }
        Ok(())
    }

    fn print_blob(&self, bytes: &[u8], buf: &mut String) -> Result<()> {
        let prefix = config::with_active(|c| c.blob_prefix.clone());
        buf.push('"');
        buf.push_str(&prefix);
        buf.push_str(&crate::base64::encode(bytes));
        buf.push('"');
        Ok(())
    }

    fn print_blob_text(&self, text: &str, buf: &mut String) -> Result<()> {
        let prefix = config::with_active(|c| c.blob_prefix.clone());
        buf.push('"');
        buf.push_str(&prefix);
        buf.push_str(text);
        buf.push('"');
        Ok(())
    }

    fn print_path_token(&self, path: &str, buf: &mut String) -> Result<()> {
        if self.options.layout == Layout::Json {
            return Err(Error::BadOption {
                key: "layout".to_string(),
                reason: "path tokens cannot be rendered as JSON".to_string(),
            });
        }
        let prefix = config::with_active(|c| c.path_prefix.clone());
        buf.push('"');
        buf.push_str(&prefix);
        buf.push_str(path);
        buf.push('"');
        Ok(())
    }

    fn print_pointer(&mut self, id: NodeId, target: Option<NodeId>, buf: &mut String) -> Result<()> {
        let Some(target) = target else {
            buf.push_str("null");
            return Ok(());
        };
        match self.options.layout {
            Layout::Flatten => {
                if reference::is_pointer_cyclic(self.doc, id)? {
                    let path = reference::find_object_path(self.doc, target)
                        .unwrap_or_else(|| "/".to_string());
                    self.print_path_token(&path, buf)
                } else {
                    self.print_value(target, buf)
                }
            }
            Layout::Json => {
                // JSON has no reference concept; duplicate the target
                // the same way `Flatten` does, ignoring cycles is not
                // possible so a cyclic pointer is a hard error.
                if reference::is_pointer_cyclic(self.doc, id)? {
                    return Err(Error::BadOption {
                        key: "layout".to_string(),
                        reason: "cyclic pointer cannot be rendered as JSON".to_string(),
                    });
                }
                self.print_value(target, buf)
            }
            Layout::Cppon | Layout::Exact => match reference::find_object_path(self.doc, target) {
                Some(path) => self.print_path_token(&path, buf),
                None => self.print_value(target, buf),
            },
        }
    }
}

fn write_plain_number(n: Number, buf: &mut String) -> Result<()> {
    use std::fmt::Write as _;
    match n {
        Number::I8(v) => write!(buf, "{v}").map_err(fmt_err),
        Number::U8(v) => write!(buf, "{v}").map_err(fmt_err),
        Number::I16(v) => write!(buf, "{v}").map_err(fmt_err),
        Number::U16(v) => write!(buf, "{v}").map_err(fmt_err),
        Number::I32(v) => write!(buf, "{v}").map_err(fmt_err),
        Number::U32(v) => write!(buf, "{v}").map_err(fmt_err),
        Number::I64(v) => write!(buf, "{v}").map_err(fmt_err),
        Number::U64(v) => write!(buf, "{v}").map_err(fmt_err),
        Number::F32(v) => write_float(buf, v),
        Number::F64(v) => write_float(buf, v),
    }
}

/// Writes a float so the result always carries a decimal point (the
/// parser's number grammar uses the presence of `.`/`e` to recognize a
/// floating kind, so a bare `1` reparses as an integer instead of
/// `1.0`). Leaves `inf`/`NaN` renderings alone.
fn write_float<T: std::fmt::Display>(buf: &mut String, v: T) -> Result<()> {
    use std::fmt::Write as _;
    let start = buf.len();
    write!(buf, "{v}").map_err(fmt_err)?;
    if buf[start..].bytes().all(|b| b.is_ascii_digit() || b == b'-') {
        buf.push_str(".0");
    }
    Ok(())
}

/// The wire-form suffix a native literal needs to reparse with the
/// same [`NumberKind`] (empty for the two kinds the parser infers from
/// shape alone).
fn native_suffix(kind: NumberKind) -> &'static str {
    match kind {
        NumberKind::JsonInt64 | NumberKind::I64 | NumberKind::JsonDouble => "",
        NumberKind::F32 => "f",
        NumberKind::I8 => "i8",
        NumberKind::U8 => "u8",
        NumberKind::I16 => "i16",
        NumberKind::U16 => "u16",
        NumberKind::I32 => "i32",
        NumberKind::U32 => "u32",
        NumberKind::U64 => "u64",
    }
}

/// Wraps `n` in the quoted `$cppon-number:TYPE(value)` wire form used
/// by JSON-compat printing to carry a C++-typed number through a
/// reader that only understands plain JSON numbers and strings.
fn write_typed_wire_form(n: Number, buf: &mut String) -> Result<()> {
    let prefix = config::with_active(|c| c.number_prefix.clone());
    buf.push('"');
    buf.push_str(&prefix);
    buf.push_str(n.kind().wire_name());
    buf.push('(');
    write_plain_number(n, buf)?;
    buf.push_str(")\"");
    Ok(())
}

fn fmt_err(_: std::fmt::Error) -> Error {
    Error::BadOption { key: "buffer".to_string(), reason: "write failed".to_string() }
}

fn print_json_string(s: &str, buf: &mut String) -> Result<()> {
    buf.push('"');
    for c in s.chars() {
        match c {
            '"' => buf.push_str("\\\""),
            '\\' => buf.push_str("\\\\"),
            '\n' => buf.push_str("\\n"),
            '\r' => buf.push_str("\\r"),
            '\t' => buf.push_str("\\t"),
            c if (c as u32) < 0x20 => {
                use std::fmt::Write as _;
                let _ = write!(buf, "\\u{:04x}", c as u32);
            }
            c => buf.push(c),
        }
    }
    buf.push('"');
    Ok(())
}

/// The kinds of mismatch [`print`] rejects under [`Layout::Json`]:
/// integers outside the safe range, and references that can't be
/// flattened.
pub fn check_json_compatible(doc: &Document, root: NodeId) -> Result<()> {
    fn walk(doc: &Document, id: NodeId) -> Result<()> {
        match doc.get(id) {
            Value::Object(members) => members.iter().try_for_each(|(_, child)| walk(doc, *child)),
            Value::Array(items) => items.iter().try_for_each(|child| walk(doc, *child)),
            Value::Number(n) => {
                // Only a plain `I64` (bare or explicit-`i64`, the two
                // are indistinguishable once realized) is emitted as a
                // plain JSON number subject to the safe-integer range;
                // any other kind is wrapped in the quoted wire form
                // and can carry any magnitude.
                if n.kind() == NumberKind::I64 {
                    if let Some(i) = n.as_i64() {
                        if i > JSON_MAX_SAFE_INT || i < JSON_MIN_SAFE_INT {
                            return Err(Error::JsonCompatibility { value: i });
                        }
                    }
                }
                Ok(())
            }
            Value::PathToken(_) => Err(Error::BadOption {
                key: "layout".to_string(),
                reason: "path tokens cannot be rendered as JSON".to_string(),
            }),
            Value::Pointer(Some(target)) => {
                if reference::is_pointer_cyclic(doc, id)? {
                    return Err(Error::BadOption {
                        key: "layout".to_string(),
                        reason: "cyclic pointer cannot be rendered as JSON".to_string(),
                    });
                }
                walk(doc, *target)
            }
            _ => Ok(()),
        }
    }
    walk(doc, root)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{self, Mode};

    #[test]
    fn compact_json_round_trips_plain_values() {
        let doc = parser::parse(br#"{"a":1,"b":[true,false,null]}"#, Mode::Full).unwrap();
        let text = print(&doc, doc.root(), &PrinterOptions::json()).unwrap();
        assert_eq!(text, r#"{"a":1,"b":[true,false,null]}"#);
    }

    #[test]
    fn pretty_printing_adds_newlines_and_indent() {
        let doc = parser::parse(br#"{"a":1}"#, Mode::Full).unwrap();
        let options = PrinterOptions { pretty: true, ..PrinterOptions::json() };
        let text = print(&doc, doc.root(), &options).unwrap();
        assert!(text.contains('\n'));
        assert!(text.contains("  \"a\""));
    }

    #[test]
    fn json_layout_rejects_integer_outside_safe_range() {
        let doc = parser::parse(b"9223372036854775807", Mode::Full).unwrap();
        assert!(matches!(
            print(&doc, doc.root(), &PrinterOptions::json()),
            Err(Error::JsonCompatibility { .. })
        ));
    }

    #[test]
    fn json_layout_wraps_typed_integer_regardless_of_magnitude() {
        let doc = parser::parse(b"18446744073709551615u64", Mode::Full).unwrap();
        let text = print(&doc, doc.root(), &PrinterOptions::json()).unwrap();
        assert_eq!(text, r#""$cppon-number:uint64(18446744073709551615)""#);
    }

    #[test]
    fn cppon_layout_renders_blob_with_prefix() {
        let doc = parser::parse(br#""$cppon-blob:SGVsbG8=""#, Mode::Full).unwrap();
        let text = print(&doc, doc.root(), &PrinterOptions::default()).unwrap();
        assert_eq!(text, r#""$cppon-blob:SGVsbG8=""#);
    }

    #[test]
    fn exact_layout_renders_typed_number_as_native_suffixed_literal() {
        let doc = parser::parse(b"5i8", Mode::Full).unwrap();
        let options = PrinterOptions { layout: Layout::Exact, ..Default::default() };
        let text = print(&doc, doc.root(), &options).unwrap();
        assert_eq!(text, "5i8");
    }

    #[test]
    fn exact_layout_forces_decimal_point_on_whole_valued_double() {
        let doc = parser::parse(b"1.0", Mode::Full).unwrap();
        let options = PrinterOptions { layout: Layout::Exact, ..Default::default() };
        let text = print(&doc, doc.root(), &options).unwrap();
        assert_eq!(text, "1.0");
    }

    #[test]
    fn flatten_layout_duplicates_pointer_target() {
        let mut doc = parser::parse(br#"{"a":1,"b":null}"#, Mode::Full).unwrap();
        let members = doc.try_object_of(doc.root()).unwrap().to_vec();
        let a_id = members[0].1;
        let b_id = members[1].1;
        doc.assign(b_id, Value::Pointer(Some(a_id))).unwrap();
        let options = PrinterOptions { layout: Layout::Flatten, ..Default::default() };
        let text = print(&doc, doc.root(), &options).unwrap();
        assert_eq!(text, r#"{"a":1,"b":1}"#);
    }

    #[test]
    fn flatten_layout_falls_back_to_path_token_on_cycle() {
        let mut doc = parser::parse(br#"{"a":null}"#, Mode::Full).unwrap();
        let a_id = doc.try_object_of(doc.root()).unwrap()[0].1;
        doc.assign(a_id, Value::Pointer(Some(doc.root()))).unwrap();
        let options = PrinterOptions { layout: Layout::Flatten, ..Default::default() };
        let text = print(&doc, doc.root(), &options).unwrap();
        assert!(text.contains("$cppon-path:/"));
    }

    #[test]
    fn indent_first_applies_margin_to_opening_line() {
        let doc = parser::parse(br#"{"a":1}"#, Mode::Full).unwrap();
        let options = PrinterOptions { pretty: true, margin: 2, indent_first: true, ..PrinterOptions::json() };
        let text = print(&doc, doc.root(), &options).unwrap();
        assert!(text.starts_with("    {"));
    }

    #[test]
    fn reserve_hint_overrides_config_default() {
        let doc = parser::parse(b"1", Mode::Full).unwrap();
        let mut buf = String::new();
        let options = PrinterOptions { reserve_hint: Some(64), ..PrinterOptions::default() };
        print_into(&doc, doc.root(), &options, &mut buf).unwrap();
        assert!(buf.capacity() >= 64);
    }

    #[test]
    fn bad_tabulation_with_pretty_is_rejected() {
        let doc = parser::parse(b"1", Mode::Full).unwrap();
        let options = PrinterOptions { pretty: true, tabulation: String::new(), ..Default::default() };
        assert!(matches!(print(&doc, doc.root(), &options), Err(Error::BadOption { .. })));
    }

    const SNAPSHOT_DOC: &[u8] =
        br#"{"name":"widget","count":3i32,"ratio":1.5f,"tags":["a","b"],"blob":"$cppon-blob:SGk=","nothing":null}"#;

    #[test]
    fn snapshot_compact_cppon() {
        let doc = parser::parse(SNAPSHOT_DOC, Mode::Full).unwrap();
        let text = print(&doc, doc.root(), &PrinterOptions::default()).unwrap();
        insta::assert_snapshot!(text, @r#"{"name":"widget","count":3i32,"ratio":1.5f,"tags":["a","b"],"blob":"$cppon-blob:SGk=","nothing":null}"#);
    }

    #[test]
    fn snapshot_compact_json() {
        let doc = parser::parse(SNAPSHOT_DOC, Mode::Full).unwrap();
        let text = print(&doc, doc.root(), &PrinterOptions::json()).unwrap();
        insta::assert_snapshot!(text, @r#"{"name":"widget","count":"$cppon-number:int32(3)","ratio":"$cppon-number:float(1.5)","tags":["a","b"],"blob":"$cppon-blob:SGk=","nothing":null}"#);
    }

    #[test]
    fn pretty_cppon_indents_nested_array_and_suffixes_typed_numbers() {
        let doc = parser::parse(SNAPSHOT_DOC, Mode::Full).unwrap();
        let options = PrinterOptions { pretty: true, ..Default::default() };
        let text = print(&doc, doc.root(), &options).unwrap();
        assert_eq!(
            text,
            "{\n  \"name\": \"widget\",\n  \"count\": 3i32,\n  \
             \"ratio\": 1.5f,\n  \"tags\": [\n    \"a\",\n    \"b\"\n  ],\n  \
             \"blob\": \"$cppon-blob:SGk=\",\n  \"nothing\": null\n}"
        );
    }

    #[test]
    fn pretty_flatten_duplicates_pointer_target_with_indentation() {
        let mut doc = parser::parse(br#"{"a":1,"b":null}"#, Mode::Full).unwrap();
        let members = doc.try_object_of(doc.root()).unwrap().to_vec();
        let a_id = members[0].1;
        let b_id = members[1].1;
        doc.assign(b_id, Value::Pointer(Some(a_id))).unwrap();
        let options = PrinterOptions { pretty: true, layout: Layout::Flatten, ..Default::default() };
        let text = print(&doc, doc.root(), &options).unwrap();
        assert_eq!(text, "{\n  \"a\": 1,\n  \"b\": 1\n}");
    }
}
