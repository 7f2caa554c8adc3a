//! In-document references.
//!
//! A parsed tree can carry two reference forms: a [`Value::PathToken`]
//! (the `$cppon-path:/...` wire form, still textual) and a
//! [`Value::Pointer`] (already resolved to a [`NodeId`]). This module
//! turns the former into the latter across a whole document, and back,
//! plus the helpers the printer needs to detect and render cycles.
//! Resolution runs as a distinct pass over an already-parsed
//! [`Document`] rather than inline during parsing.

use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::value::{Document, NodeId, Value};
use crate::visit;

/// Maps a node that held a [`Value::PathToken`] back to its original
/// path text, so [`restore_paths`] can undo [`resolve_paths`].
pub type PathSideTable<'a> = HashMap<NodeId, &'a str>;

/// Replaces every [`Value::PathToken`] in `doc` with the
/// [`Value::Pointer`] it resolves to, returning a side table that
/// records what was replaced so the substitution can be undone later
/// (e.g. before printing in a layout that wants literal path tokens
/// rather than resolved pointers).
pub fn resolve_paths<'a>(doc: &mut Document<'a>) -> Result<PathSideTable<'a>> {
    let mut side_table = HashMap::new();
    let root = doc.root();
    let ids: Vec<NodeId> = (0..doc.len()).collect();
    for id in ids {
        let path = match doc.get(id) {
            Value::PathToken(p) => Some(*p),
            _ => None,
        };
        let Some(path) = path else { continue };
        let target = visit::visit_path_const(doc, root, path)?;
        side_table.insert(id, path);
        doc.assign(id, Value::Pointer(Some(target)))?;
    }
    Ok(side_table)
}

/// Undoes [`resolve_paths`]: every node recorded in `side_table` gets
/// its [`Value::PathToken`] back.
pub fn restore_paths<'a>(doc: &mut Document<'a>, side_table: &PathSideTable<'a>) -> Result<()> {
    for (&id, &path) in side_table {
        doc.assign(id, Value::PathToken(path))?;
    }
    Ok(())
}

/// Finds the absolute path from `doc`'s root to `target`, if reachable
/// through object members and array indices (not through other
/// pointers — a pointer-to-pointer chain has no single canonical
/// path). Used by the printer's `flatten` layout to render a pointer
/// as a path token when duplicating its target isn't desired.
pub fn find_object_path<'a>(doc: &Document<'a>, target: NodeId) -> Option<String> {
    fn walk(doc: &Document, node: NodeId, target: NodeId, path: &mut String) -> bool {
        if node == target {
            return true;
        }
        match doc.get(node) {
            Value::Object(members) => {
                for (key, child) in members {
                    let mark = path.len();
                    path.push('/');
                    path.push_str(key.as_ref());
                    if walk(doc, *child, target, path) {
                        return true;
                    }
                    path.truncate(mark);
                }
                false
            }
            Value::Array(items) => {
                for (index, child) in items.iter().enumerate() {
                    let mark = path.len();
                    path.push('/');
                    path.push_str(&index.to_string());
                    if walk(doc, *child, target, path) {
                        return true;
                    }
                    path.truncate(mark);
                }
                false
            }
            _ => false,
        }
    }

    let mut path = String::new();
    if walk(doc, doc.root(), target, &mut path) {
        Some(if path.is_empty() { "/".to_string() } else { path })
    } else {
        None
    }
}

/// True if printing the subtree rooted at `pointer`'s target would
/// recurse back into `pointer` itself — i.e. the pointer is cyclic and
/// must not be flattened inline.
pub fn is_pointer_cyclic<'a>(doc: &Document<'a>, pointer: NodeId) -> Result<bool> {
    let target = match doc.get(pointer) {
        Value::Pointer(Some(target)) => *target,
        Value::Pointer(None) => return Ok(false),
        other => return Err(Error::type_mismatch("pointer", other.classify().name())),
    };

    fn walk(doc: &Document, node: NodeId, needle: NodeId, visited: &mut Vec<NodeId>) -> bool {
        if node == needle {
            return true;
        }
        if visited.contains(&node) {
            return false;
        }
        visited.push(node);
        match doc.get(node) {
            Value::Object(members) => members.iter().any(|(_, child)| walk(doc, *child, needle, visited)),
            Value::Array(items) => items.iter().any(|child| walk(doc, *child, needle, visited)),
            Value::Pointer(Some(child)) => walk(doc, *child, needle, visited),
            _ => false,
        }
    }

    let mut visited = Vec::new();
    Ok(walk(doc, target, pointer, &mut visited))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{self, Mode};

    #[test]
    fn resolve_then_restore_round_trips() {
        let mut doc = parser::parse(br#"{"a":1,"b":"$cppon-path:/a"}"#, Mode::Full).unwrap();
        let before = format!("{:?}", doc);
        let table = resolve_paths(&mut doc).unwrap();
        assert_eq!(table.len(), 1);
        let b_id = doc.try_object_of(doc.root()).unwrap()[1].1;
        assert!(matches!(doc.get(b_id), Value::Pointer(Some(_))));
        restore_paths(&mut doc, &table).unwrap();
        assert_eq!(format!("{:?}", doc), before);
    }

    #[test]
    fn resolved_pointer_targets_the_right_node() {
        let mut doc = parser::parse(br#"{"a":1,"b":"$cppon-path:/a"}"#, Mode::Full).unwrap();
        resolve_paths(&mut doc).unwrap();
        let members = doc.try_object_of(doc.root()).unwrap().to_vec();
        let a_id = members[0].1;
        let b_id = members[1].1;
        assert!(matches!(doc.get(b_id), Value::Pointer(Some(id)) if *id == a_id));
    }

    #[test]
    fn find_object_path_locates_nested_member() {
        let doc = parser::parse(br#"{"a":{"b":[1,2,3]}}"#, Mode::Full).unwrap();
        let members = doc.try_object_of(doc.root()).unwrap();
        let a_id = members[0].1;
        let b_members = doc.try_object_of(a_id).unwrap();
        let b_id = b_members[0].1;
        let items = doc.try_array_of(b_id).unwrap();
        let third = items[2];
        assert_eq!(find_object_path(&doc, third), Some("/a/b/2".to_string()));
    }

    #[test]
    fn find_object_path_returns_none_for_unreachable_node() {
        let doc = parser::parse(b"{}", Mode::Full).unwrap();
        assert_eq!(find_object_path(&doc, 9999), None);
    }

    #[test]
    fn acyclic_pointer_is_not_cyclic() {
        let mut doc = parser::parse(br#"{"a":1,"b":null}"#, Mode::Full).unwrap();
        let members = doc.try_object_of(doc.root()).unwrap().to_vec();
        let a_id = members[0].1;
        let b_id = members[1].1;
        doc.assign(b_id, Value::Pointer(Some(a_id))).unwrap();
        assert!(!is_pointer_cyclic(&doc, b_id).unwrap());
    }

    #[test]
    fn self_referential_pointer_is_cyclic() {
        let mut doc = parser::parse(br#"{"a":null}"#, Mode::Full).unwrap();
        let a_id = doc.try_object_of(doc.root()).unwrap()[0].1;
        doc.assign(a_id, Value::Pointer(Some(doc.root()))).unwrap();
        assert!(is_pointer_cyclic(&doc, a_id).unwrap());
    }
}
