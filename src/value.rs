//! The tagged value model.
//!
//! A tree is a [`Document`] owning a flat arena of [`Value`] nodes;
//! children (object members, array elements, in-doc pointers) refer to
//! siblings by [`NodeId`], a stable index into that arena — node ids
//! into a backing store rather than raw pointers, so a cyclic graph
//! stays representable without `unsafe`.
//!
//! String-view, number-token, path-token and blob-text leaves borrow
//! from the source text (`'a`); everything else owns its data.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::{Error, Result};

/// Index of a node within a single [`Document`]'s arena. Stable for the
/// lifetime of the document: nodes are never removed, only replaced in
/// place by [`Document::assign`].
pub type NodeId = usize;

/// The active alternative of a [`Value`], as returned by
/// [`Document::classify`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Kind {
    Object,
    Array,
    StringView,
    OwnedString,
    NumberToken,
    Number,
    Bool,
    Null,
    PathToken,
    Pointer,
    BlobText,
    BlobBytes,
}

impl Kind {
    /// The `expected`/`found` name used in [`crate::error::Error::TypeMismatch`].
    pub fn name(self) -> &'static str {
        match self {
            Kind::Object => "object",
            Kind::Array => "array",
            Kind::StringView => "string-view",
            Kind::OwnedString => "owned-string",
            Kind::NumberToken => "number-token",
            Kind::Number => "number",
            Kind::Bool => "bool",
            Kind::Null => "null",
            Kind::PathToken => "path-token",
            Kind::Pointer => "pointer",
            Kind::BlobText => "blob-text",
            Kind::BlobBytes => "blob-bytes",
        }
    }
}

impl std::fmt::Display for Kind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// NumberKind: the typed tag carried by a lazy [`NumberToken`] and by
/// the wire form `$cppon-number:TYPE(value)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NumberKind {
    JsonInt64,
    JsonDouble,
    F32,
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    I64,
    U64,
}

impl NumberKind {
    /// The `TYPE` name used in the `$cppon-number:TYPE(value)` wire form.
    pub fn wire_name(self) -> &'static str {
        match self {
            NumberKind::JsonInt64 => "int64",
            NumberKind::JsonDouble => "double",
            NumberKind::F32 => "float",
            NumberKind::I8 => "int8",
            NumberKind::U8 => "uint8",
            NumberKind::I16 => "int16",
            NumberKind::U16 => "uint16",
            NumberKind::I32 => "int32",
            NumberKind::U32 => "uint32",
            NumberKind::I64 => "int64",
            NumberKind::U64 => "uint64",
        }
    }

    pub fn from_wire_name(name: &str) -> Option<NumberKind> {
        Some(match name {
            "double" => NumberKind::JsonDouble,
            "float" => NumberKind::F32,
            "int8" => NumberKind::I8,
            "uint8" => NumberKind::U8,
            "int16" => NumberKind::I16,
            "uint16" => NumberKind::U16,
            "int32" => NumberKind::I32,
            "uint32" => NumberKind::U32,
            "int64" => NumberKind::I64,
            "uint64" => NumberKind::U64,
            _ => return None,
        })
    }
}

/// A not-yet-converted numeric literal: the raw slice plus its kind.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NumberToken<'a> {
    pub slice: &'a str,
    pub kind: NumberKind,
}

/// A realized, by-value number.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Number {
    I8(i8),
    U8(u8),
    I16(i16),
    U16(u16),
    I32(i32),
    U32(u32),
    I64(i64),
    U64(u64),
    F32(f32),
    F64(f64),
}

impl Number {
    pub fn kind(self) -> NumberKind {
        match self {
            Number::I8(_) => NumberKind::I8,
            Number::U8(_) => NumberKind::U8,
            Number::I16(_) => NumberKind::I16,
            Number::U16(_) => NumberKind::U16,
            Number::I32(_) => NumberKind::I32,
            Number::U32(_) => NumberKind::U32,
            Number::I64(_) => NumberKind::I64,
            Number::U64(_) => NumberKind::U64,
            Number::F32(_) => NumberKind::F32,
            Number::F64(_) => NumberKind::JsonDouble,
        }
    }

    pub fn as_i64(self) -> Option<i64> {
        match self {
            Number::I8(n) => Some(n as i64),
            Number::U8(n) => Some(n as i64),
            Number::I16(n) => Some(n as i64),
            Number::U16(n) => Some(n as i64),
            Number::I32(n) => Some(n as i64),
            Number::U32(n) => Some(n as i64),
            Number::I64(n) => Some(n),
            Number::U64(n) => i64::try_from(n).ok(),
            _ => None,
        }
    }

    pub fn as_f64(self) -> Option<f64> {
        match self {
            Number::F32(n) => Some(n as f64),
            Number::F64(n) => Some(n),
            Number::I8(n) => Some(n as f64),
            Number::U8(n) => Some(n as f64),
            Number::I16(n) => Some(n as f64),
            Number::U16(n) => Some(n as f64),
            Number::I32(n) => Some(n as f64),
            Number::U32(n) => Some(n as f64),
            Number::I64(n) => Some(n as f64),
            Number::U64(n) => Some(n as f64),
        }
    }
}

/// An object member key: borrowed from the source for parsed members,
/// owned for members introduced by autovivification, since those names
/// don't come from the source buffer at all.
pub type Key<'a> = std::borrow::Cow<'a, str>;

/// A node of the DOM.
#[derive(Clone, Debug, PartialEq)]
pub enum Value<'a> {
    /// Ordered (key, child) pairs; keys borrow from the source where
    /// parsed, own their text where autovivified.
    Object(Vec<(Key<'a>, NodeId)>),
    /// Ordered children.
    Array(Vec<NodeId>),
    /// Non-owning UTF-8 slice into the source buffer.
    StringView(&'a str),
    /// Heap-owned string, produced by mutation or autovivification.
    OwnedString(String),
    /// Lazy numeric literal, not yet converted.
    NumberToken(NumberToken<'a>),
    /// Converted, by-value number.
    Number(Number),
    Bool(bool),
    Null,
    /// Absolute path, always starting with `/` (the tail after the
    /// configured prefix has been stripped).
    PathToken(&'a str),
    /// In-doc pointer. `None` is the "null pointer" case: a reference
    /// slot that hasn't been assigned a target yet.
    Pointer(Option<NodeId>),
    /// Base64 text, not yet decoded.
    BlobText(&'a str),
    /// Realized binary payload.
    BlobBytes(Vec<u8>),
}

impl<'a> Value<'a> {
    pub fn classify(&self) -> Kind {
        match self {
            Value::Object(_) => Kind::Object,
            Value::Array(_) => Kind::Array,
            Value::StringView(_) => Kind::StringView,
            Value::OwnedString(_) => Kind::OwnedString,
            Value::NumberToken(_) => Kind::NumberToken,
            Value::Number(_) => Kind::Number,
            Value::Bool(_) => Kind::Bool,
            Value::Null => Kind::Null,
            Value::PathToken(_) => Kind::PathToken,
            Value::Pointer(_) => Kind::Pointer,
            Value::BlobText(_) => Kind::BlobText,
            Value::BlobBytes(_) => Kind::BlobBytes,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::StringView(s) => Some(s),
            Value::OwnedString(s) => Some(s.as_str()),
            _ => None,
        }
    }
}

static NEXT_DOC_ID: AtomicU64 = AtomicU64::new(1);

/// Owner of a flat arena of [`Value`] nodes borrowed from `'a` source
/// text. Node 0 is a reserved null sentinel: visitors may hand callers
/// a reference to it, but it must never be written through, so
/// traversal code checks `id == doc.null_sentinel()` before any
/// mutation.
#[derive(Debug)]
pub struct Document<'a> {
    id: u64,
    arena: Vec<Value<'a>>,
    root: NodeId,
}

impl<'a> Document<'a> {
    /// Creates a document whose arena holds only the null sentinel at
    /// index 0, also initially the root. Callers typically follow with
    /// [`Document::alloc`] calls from the parser to build out the real
    /// tree, then set the root via [`Document::set_root`].
    pub fn new() -> Self {
        Document {
            id: NEXT_DOC_ID.fetch_add(1, Ordering::Relaxed),
            arena: vec![Value::Null],
            root: 0,
        }
    }

    pub fn doc_id(&self) -> u64 {
        self.id
    }

    pub fn null_sentinel(&self) -> NodeId {
        0
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn set_root(&mut self, root: NodeId) {
        self.root = root;
    }

    /// Allocates `value` into the arena, returning its new id.
    pub fn alloc(&mut self, value: Value<'a>) -> NodeId {
        self.arena.push(value);
        self.arena.len() - 1
    }

    pub fn get(&self, id: NodeId) -> &Value<'a> {
        &self.arena[id]
    }

    pub fn get_mut(&mut self, id: NodeId) -> &mut Value<'a> {
        &mut self.arena[id]
    }

    pub fn len(&self) -> usize {
        self.arena.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arena.is_empty()
    }

    pub fn classify(&self, id: NodeId) -> Kind {
        self.get(id).classify()
    }

    pub fn object_of(&mut self, id: NodeId) -> Result<&mut Vec<(Key<'a>, NodeId)>> {
        match self.get_mut(id) {
            Value::Object(members) => Ok(members),
            other => Err(Error::type_mismatch("object", other.classify().name())),
        }
    }

    pub fn array_of(&mut self, id: NodeId) -> Result<&mut Vec<NodeId>> {
        match self.get_mut(id) {
            Value::Array(items) => Ok(items),
            other => Err(Error::type_mismatch("array", other.classify().name())),
        }
    }

    pub fn try_object_of(&self, id: NodeId) -> Option<&[(Key<'a>, NodeId)]> {
        match self.get(id) {
            Value::Object(members) => Some(members.as_slice()),
            _ => None,
        }
    }

    pub fn try_array_of(&self, id: NodeId) -> Option<&[NodeId]> {
        match self.get(id) {
            Value::Array(items) => Some(items.as_slice()),
            _ => None,
        }
    }

    /// Replaces the node at `id` in place. Rejects assigning a pointer
    /// that targets a node id the arena doesn't (yet) hold, which would
    /// otherwise leave a dangling reference sitting in the tree.
    pub fn assign(&mut self, id: NodeId, value: Value<'a>) -> Result<()> {
        if let Value::Pointer(Some(target)) = value {
            if target >= self.arena.len() {
                return Err(Error::UnsafePointerAssignment);
            }
        }
        self.arena[id] = value;
        Ok(())
    }
}

impl<'a> Default for Document<'a> {
    fn default() -> Self {
        Document::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_document_has_only_the_null_sentinel() {
        let doc = Document::new();
        assert_eq!(doc.len(), 1);
        assert_eq!(doc.classify(doc.null_sentinel()), Kind::Null);
    }

    #[test]
    fn object_of_rejects_non_object() {
        let mut doc = Document::new();
        let id = doc.alloc(Value::Bool(true));
        assert!(doc.object_of(id).is_err());
    }

    #[test]
    fn assign_rejects_dangling_pointer_target() {
        let mut doc = Document::new();
        let id = doc.alloc(Value::Null);
        assert!(doc.assign(id, Value::Pointer(Some(999))).is_err());
    }

    #[test]
    fn assign_accepts_pointer_to_existing_node() {
        let mut doc = Document::new();
        let target = doc.alloc(Value::Bool(false));
        let id = doc.alloc(Value::Null);
        assert!(doc.assign(id, Value::Pointer(Some(target))).is_ok());
    }
}
