//! Visitors — path/index traversal, autovivification, and the typed
//! read helpers.
//!
//! Segment-by-segment descent through a tree addressed by name or
//! index, extended to also autovivify and to dereference in-doc
//! pointers and path-tokens along the way.

use std::borrow::Cow;

use crate::config;
use crate::error::{Error, Result};
use crate::root_stack;
use crate::value::{Document, Kind, Number, NumberKind, NodeId, Value};

fn is_index_segment(seg: &str) -> bool {
    !seg.is_empty() && seg.bytes().all(|b| b.is_ascii_digit())
}

/// A null-pointer slot is, for autovivification purposes, in the same
/// "not yet shaped" state as a plain null: the write lands on the
/// referring slot itself. When `force` is set (the segment was
/// reached by writing through a pointer to an existing target) an
/// already-shaped-but-wrong value is overwritten instead of rejected;
/// writing through a pointer replaces whatever the target holds, it
/// doesn't merely extend it.
fn autovivify_as_array<'a>(doc: &mut Document<'a>, node: NodeId, force: bool) -> Result<NodeId> {
    match doc.get(node) {
        Value::Array(_) => return Ok(node),
        Value::Null | Value::Pointer(None) => {}
        other if force => {
            let _ = other;
        }
        other => return Err(Error::type_mismatch("array", other.classify().name())),
    }
    doc.assign(node, Value::Array(Vec::new()))?;
    Ok(node)
}

fn autovivify_as_object<'a>(doc: &mut Document<'a>, node: NodeId, force: bool) -> Result<NodeId> {
    match doc.get(node) {
        Value::Object(_) => return Ok(node),
        Value::Null | Value::Pointer(None) => {}
        other if force => {
            let _ = other;
        }
        other => return Err(Error::type_mismatch("object", other.classify().name())),
    }
    doc.assign(node, Value::Object(Vec::new()))?;
    Ok(node)
}

/// Grows `node` (which must already be an array) to hold index `index`,
/// padding with nulls, enforcing the configured `max_array_delta`
/// ceiling.
pub fn visit_index_mut<'a>(doc: &mut Document<'a>, node: NodeId, index: usize) -> Result<NodeId> {
    visit_index_mut_impl(doc, node, index, false)
}

fn visit_index_mut_impl<'a>(doc: &mut Document<'a>, node: NodeId, index: usize, force: bool) -> Result<NodeId> {
    let node = autovivify_as_array(doc, node, force)?;
    let size = doc.try_array_of(node).expect("just ensured array").len();
    if index >= size {
        let max_delta = config::with_active(|c| c.max_array_delta);
        if index - size > max_delta {
            return Err(Error::ExcessiveArrayResize { index, size, max_delta });
        }
        let needed = index + 1 - size;
        let mut new_ids = Vec::with_capacity(needed);
        for _ in 0..needed {
            new_ids.push(doc.alloc(Value::Null));
        }
        doc.array_of(node)?.extend(new_ids);
    }
    Ok(doc.try_array_of(node).expect("array")[index])
}

fn member_or_autovivify<'a>(doc: &mut Document<'a>, node: NodeId, segment: &str, force: bool) -> Result<NodeId> {
    let node = autovivify_as_object(doc, node, force)?;
    if let Some(existing) = doc
        .try_object_of(node)
        .and_then(|members| members.iter().find(|(k, _)| k.as_ref() == segment).map(|(_, id)| *id))
    {
        return Ok(existing);
    }
    let new_id = doc.alloc(Value::Null);
    doc.object_of(node)?.push((Cow::Owned(segment.to_string()), new_id));
    Ok(new_id)
}

/// Dereferences `node` for a write: an in-doc pointer writes through
/// its target (a null pointer writes through the referring slot
/// itself); a path-token resolves against the current root. The
/// returned `bool` reports whether this step wrote through a pointer
/// to an existing target, in which case the caller's next
/// autovivification step must overwrite that target's shape rather
/// than reject it.
fn deref_for_write<'a>(doc: &mut Document<'a>, node: NodeId, doc_id: u64) -> Result<(NodeId, bool)> {
    match doc.get(node) {
        Value::Pointer(Some(target)) => Ok((*target, true)),
        Value::Pointer(None) => Ok((node, false)),
        Value::PathToken(p) => {
            let path = p.to_string();
            let root = root_stack::current_root()
                .filter(|&(d, _)| d == doc_id)
                .map(|(_, n)| n)
                .ok_or_else(|| Error::InvalidPath { path: path.clone() })?;
            Ok((visit_path_write(doc, doc_id, root, &path)?, false))
        }
        _ => Ok((node, false)),
    }
}

/// Mutable path traversal, autovivifying missing members/array slots as
/// it goes. `path` may carry a leading `/`, stripped before walking;
/// `"/"` alone resolves to `start`.
pub fn visit_path_write<'a>(doc: &mut Document<'a>, doc_id: u64, start: NodeId, path: &str) -> Result<NodeId> {
    let stripped = path.strip_prefix('/').unwrap_or(path);
    if stripped.is_empty() {
        return Ok(start);
    }
    let mut current = start;
    for seg in stripped.split('/') {
        if seg.is_empty() {
            continue;
        }
        let (deref, force) = deref_for_write(doc, current, doc_id)?;
        current = deref;
        current = if is_index_segment(seg) {
            let index: usize = seg.parse().map_err(|_| Error::BadArrayIndex { segment: seg.to_string() })?;
            visit_index_mut_impl(doc, current, index, force)?
        } else {
            member_or_autovivify(doc, current, seg, force)?
        };
    }
    Ok(current)
}

fn deref_for_read<'a>(doc: &Document<'a>, node: NodeId) -> Result<NodeId> {
    match doc.get(node) {
        Value::Pointer(Some(target)) => Ok(*target),
        Value::Pointer(None) => Err(Error::NullValue),
        _ => Ok(node),
    }
}

/// Read-only path traversal. A missing object member yields the null
/// sentinel rather than an error; dereferencing a null pointer is a
/// [`Error::NullValue`]; a non-numeric segment against an array is a
/// [`Error::BadArrayIndex`].
pub fn visit_path_const<'a>(doc: &Document<'a>, start: NodeId, path: &str) -> Result<NodeId> {
    let stripped = path.strip_prefix('/').unwrap_or(path);
    if stripped.is_empty() {
        return Ok(start);
    }
    let mut current = start;
    for seg in stripped.split('/') {
        if seg.is_empty() {
            continue;
        }
        current = deref_for_read(doc, current)?;
        current = match doc.get(current) {
            Value::Object(members) => members
                .iter()
                .find(|(k, _)| k.as_ref() == seg)
                .map(|(_, id)| *id)
                .unwrap_or_else(|| doc.null_sentinel()),
            Value::Array(items) => {
                let index: usize = seg
                    .parse()
                    .map_err(|_| Error::BadArrayIndex { segment: seg.to_string() })?;
                *items
                    .get(index)
                    .ok_or_else(|| Error::BadArrayIndex { segment: seg.to_string() })?
            }
            Value::Null if current == doc.null_sentinel() => return Err(Error::NullValue),
            Value::Null => doc.null_sentinel(),
            other => return Err(Error::type_mismatch("object-or-array", other.classify().name())),
        };
    }
    Ok(current)
}

/// Two [`NumberKind`]s are the same value for matching purposes: a
/// plain JSON integer literal (`JsonInt64`) and an explicitly `i64`-
/// suffixed one (`I64`) are the same width and representation.
fn kind_equivalent(a: NumberKind, b: NumberKind) -> bool {
    use NumberKind::{JsonInt64, I64};
    a == b || matches!((a, b), (JsonInt64, I64) | (I64, JsonInt64))
}

/// Types a [`Value::Number`]/[`Value::NumberToken`] can be read as,
/// exactly ([`get_strict_mut`]/[`get_strict_const`]) or via numeric
/// cross-cast ([`get_cast`]).
pub trait Numeric: Sized + Copy {
    fn exact_kind() -> NumberKind;
    fn from_number(n: Number) -> Option<Self>;
    fn parse_text(text: &str) -> Option<Self>;
    fn to_number(self) -> Number;
}

macro_rules! impl_numeric {
    ($ty:ty, $kind:expr, $ctor:expr, $from:expr) => {
        impl Numeric for $ty {
            fn exact_kind() -> NumberKind {
                $kind
            }
            fn from_number(n: Number) -> Option<Self> {
                $from(n)
            }
            fn parse_text(text: &str) -> Option<Self> {
                text.parse().ok()
            }
            fn to_number(self) -> Number {
                $ctor(self)
            }
        }
    };
}

impl_numeric!(i8, NumberKind::I8, Number::I8, |n: Number| match n {
    Number::I8(v) => Some(v),
    other => i8::try_from(other.as_i64()?).ok(),
});
impl_numeric!(u8, NumberKind::U8, Number::U8, |n: Number| match n {
    Number::U8(v) => Some(v),
    other => u8::try_from(other.as_i64()?).ok(),
});
impl_numeric!(i16, NumberKind::I16, Number::I16, |n: Number| match n {
    Number::I16(v) => Some(v),
    other => i16::try_from(other.as_i64()?).ok(),
});
impl_numeric!(u16, NumberKind::U16, Number::U16, |n: Number| match n {
    Number::U16(v) => Some(v),
    other => u16::try_from(other.as_i64()?).ok(),
});
impl_numeric!(i32, NumberKind::I32, Number::I32, |n: Number| match n {
    Number::I32(v) => Some(v),
    other => i32::try_from(other.as_i64()?).ok(),
});
impl_numeric!(u32, NumberKind::U32, Number::U32, |n: Number| match n {
    Number::U32(v) => Some(v),
    other => u32::try_from(other.as_i64()?).ok(),
});
impl_numeric!(i64, NumberKind::I64, Number::I64, |n: Number| match n {
    Number::I64(v) => Some(v),
    other => other.as_i64(),
});
impl_numeric!(u64, NumberKind::U64, Number::U64, |n: Number| match n {
    Number::U64(v) => Some(v),
    other => u64::try_from(other.as_i64()?).ok(),
});
impl_numeric!(f32, NumberKind::F32, Number::F32, |n: Number| match n {
    Number::F32(v) => Some(v),
    other => Some(other.as_f64()? as f32),
});
impl_numeric!(f64, NumberKind::JsonDouble, Number::F64, |n: Number| n.as_f64());

/// Mutable strict read: converts a lazy [`Value::NumberToken`] to a
/// concrete number first, then requires the exact `T` kind.
pub fn get_strict_mut<'a, T: Numeric>(doc: &mut Document<'a>, id: NodeId) -> Result<T> {
    let token = match doc.get(id) {
        Value::NumberToken(tok) => Some(*tok),
        _ => None,
    };
    if let Some(tok) = token {
        let value = T::parse_text(tok.slice).ok_or(Error::NumberNotConverted)?;
        doc.assign(id, Value::Number(value.to_number()))?;
    }
    match doc.get(id) {
        Value::Number(n) if kind_equivalent(n.kind(), T::exact_kind()) => {
            T::from_number(*n).ok_or(Error::NumberNotConverted)
        }
        other => Err(Error::type_mismatch(kind_name(T::exact_kind()), other.classify().name())),
    }
}

/// Const strict read: refuses to realize a [`Value::NumberToken`]
/// unless `exact` mode is requested, in which case it parses without
/// mutating the tree.
pub fn get_strict_const<'a, T: Numeric>(doc: &Document<'a>, id: NodeId, exact: bool) -> Result<T> {
    match doc.get(id) {
        Value::Number(n) if kind_equivalent(n.kind(), T::exact_kind()) => {
            T::from_number(*n).ok_or(Error::NumberNotConverted)
        }
        Value::NumberToken(tok) if exact => T::parse_text(tok.slice).ok_or(Error::NumberNotConverted),
        Value::NumberToken(_) => Err(Error::NumberNotConverted),
        other => Err(Error::type_mismatch(kind_name(T::exact_kind()), other.classify().name())),
    }
}

/// Cast read: like [`get_strict_mut`] but accepts any numeric kind,
/// converting across widths.
pub fn get_cast<'a, T: Numeric>(doc: &mut Document<'a>, id: NodeId) -> Result<T> {
    let token = match doc.get(id) {
        Value::NumberToken(tok) => Some(*tok),
        _ => None,
    };
    if let Some(tok) = token {
        let parsed = parse_any_numeric(tok.slice, tok.kind)?;
        doc.assign(id, Value::Number(parsed))?;
    }
    match doc.get(id) {
        Value::Number(n) => T::from_number(*n).ok_or(Error::NumberNotConverted),
        other => Err(Error::type_mismatch("number", other.classify().name())),
    }
}

/// Borrowing, non-mutating read: `Some(T)` if `id` already holds the
/// exact kind `T`, else `None`.
pub fn get_optional<'a, T: Numeric>(doc: &Document<'a>, id: NodeId) -> Option<T> {
    match doc.get(id) {
        Value::Number(n) if kind_equivalent(n.kind(), T::exact_kind()) => T::from_number(*n),
        _ => None,
    }
}

/// Mutable blob read: realizes [`Value::BlobText`] into
/// [`Value::BlobBytes`] if needed, returning the decoded bytes.
pub fn get_blob_mut<'a>(doc: &mut Document<'a>, id: NodeId) -> Result<&[u8]> {
    let text = match doc.get(id) {
        Value::BlobText(t) => Some(*t),
        _ => None,
    };
    if let Some(text) = text {
        let bytes = crate::base64::decode(text, true)?;
        doc.assign(id, Value::BlobBytes(bytes))?;
    }
    match doc.get(id) {
        Value::BlobBytes(bytes) => Ok(bytes),
        other => Err(Error::type_mismatch("blob-bytes", other.classify().name())),
    }
}

/// Const blob read: refuses to realize a [`Value::BlobText`].
pub fn get_blob_const<'a>(doc: &Document<'a>, id: NodeId) -> Result<&[u8]> {
    match doc.get(id) {
        Value::BlobBytes(bytes) => Ok(bytes),
        Value::BlobText(_) => Err(Error::BlobNotRealized),
        other => Err(Error::type_mismatch("blob-bytes", other.classify().name())),
    }
}

fn kind_name(kind: NumberKind) -> &'static str {
    match kind {
        NumberKind::JsonInt64 | NumberKind::I64 => "i64",
        NumberKind::JsonDouble => "f64",
        NumberKind::F32 => "f32",
        NumberKind::I8 => "i8",
        NumberKind::U8 => "u8",
        NumberKind::I16 => "i16",
        NumberKind::U16 => "u16",
        NumberKind::I32 => "i32",
        NumberKind::U32 => "u32",
        NumberKind::U64 => "u64",
    }
}

fn parse_any_numeric(text: &str, kind: NumberKind) -> Result<Number> {
    let bad = Error::NumberNotConverted;
    Ok(match kind {
        NumberKind::JsonInt64 | NumberKind::I64 => Number::I64(text.parse().map_err(|_| bad)?),
        NumberKind::U64 => Number::U64(text.parse().map_err(|_| bad)?),
        NumberKind::JsonDouble => Number::F64(text.parse().map_err(|_| bad)?),
        NumberKind::F32 => Number::F32(text.parse().map_err(|_| bad)?),
        NumberKind::I8 => Number::I8(text.parse().map_err(|_| bad)?),
        NumberKind::U8 => Number::U8(text.parse().map_err(|_| bad)?),
        NumberKind::I16 => Number::I16(text.parse().map_err(|_| bad)?),
        NumberKind::U16 => Number::U16(text.parse().map_err(|_| bad)?),
        NumberKind::I32 => Number::I32(text.parse().map_err(|_| bad)?),
        NumberKind::U32 => Number::U32(text.parse().map_err(|_| bad)?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{self, Mode};

    #[test]
    fn write_through_absolute_path_autovivifies_objects() {
        let mut doc = parser::parse(b"null", Mode::Full).unwrap();
        let root = doc.root();
        root_stack::push((doc.doc_id(), root));
        let id = visit_path_write(&mut doc, doc.doc_id(), root, "/a/b").unwrap();
        doc.assign(id, Value::Number(Number::I64(3))).unwrap();
        root_stack::pop((doc.doc_id(), root));

        let a = doc.try_object_of(root).unwrap()[0].1;
        assert_eq!(doc.classify(a), Kind::Object);
        let b = doc.try_object_of(a).unwrap()[0].1;
        assert_eq!(get_cast::<i64>(&mut doc, b).unwrap(), 3);
    }

    #[test]
    fn array_index_grows_with_nulls_within_delta() {
        let mut doc = parser::parse(b"[]", Mode::Full).unwrap();
        let root = doc.root();
        let id = visit_index_mut(&mut doc, root, 2).unwrap();
        assert_eq!(doc.classify(id), Kind::Null);
        assert_eq!(doc.try_array_of(root).unwrap().len(), 3);
    }

    #[test]
    fn array_index_beyond_delta_is_rejected() {
        let mut doc = parser::parse(b"[]", Mode::Full).unwrap();
        let root = doc.root();
        let over = config::with_active(|c| c.max_array_delta) + 1;
        assert!(matches!(
            visit_index_mut(&mut doc, root, over),
            Err(Error::ExcessiveArrayResize { .. })
        ));
    }

    #[test]
    fn const_traversal_missing_member_is_null_sentinel() {
        let doc = parser::parse(br#"{"a":1}"#, Mode::Full).unwrap();
        let id = visit_path_const(&doc, doc.root(), "/missing").unwrap();
        assert_eq!(id, doc.null_sentinel());
    }

    #[test]
    fn const_traversal_bad_array_index_errors() {
        let doc = parser::parse(b"[1,2,3]", Mode::Full).unwrap();
        assert!(matches!(
            visit_path_const(&doc, doc.root(), "/not-a-number"),
            Err(Error::BadArrayIndex { .. })
        ));
    }

    #[test]
    fn write_through_null_pointer_lands_on_referring_slot() {
        let mut doc = parser::parse(b"null", Mode::Full).unwrap();
        let root = doc.root();
        doc.assign(root, Value::Pointer(None)).unwrap();
        let id = visit_path_write(&mut doc, doc.doc_id(), root, "/sub").unwrap();
        doc.assign(id, Value::Number(Number::I64(3))).unwrap();
        assert_eq!(doc.classify(root), Kind::Object);
    }

    #[test]
    fn write_through_pointer_to_existing_value_overwrites_target() {
        // /a = 42, /p = pointer_to(/a), write /p/sub = 3: /a becomes
        // {sub: 3} and /p remains a pointer to /a.
        let mut doc = parser::parse(br#"{"a":42,"p":null}"#, Mode::Full).unwrap();
        let root = doc.root();
        let members = doc.try_object_of(root).unwrap().to_vec();
        let a_id = members[0].1;
        let p_id = members[1].1;
        doc.assign(p_id, Value::Pointer(Some(a_id))).unwrap();

        let id = visit_path_write(&mut doc, doc.doc_id(), p_id, "/sub").unwrap();
        doc.assign(id, Value::Number(Number::I64(3))).unwrap();

        assert_eq!(doc.classify(a_id), Kind::Object);
        let sub = doc.try_object_of(a_id).unwrap()[0].1;
        assert_eq!(get_cast::<i64>(&mut doc, sub).unwrap(), 3);
        assert_eq!(doc.get(p_id), &Value::Pointer(Some(a_id)));
    }
}
