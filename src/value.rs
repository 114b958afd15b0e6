//
// Copyright (c) The yangtree Core Contributors
//
// SPDX-License-Identifier: MIT
//

//! Structured values of instance nodes.
//!
//! Values are persistent: objects and arrays sit behind `Arc`, so cloning a
//! value is cheap and every edit builds a new spine while sharing the rest of
//! the tree. Structural equality ignores timestamps.

use std::sync::Arc;

use indexmap::IndexMap;

use crate::types::ScalarValue;

/// Name under which a member is stored in its parent object: `"local"` when
/// the member's namespace equals the parent's, `"namespace:local"` otherwise.
pub type InstanceName = String;

/// A cooked instance value: scalar, object or array.
#[derive(Clone, Debug)]
pub enum Value {
    Object(Arc<ObjectValue>),
    Array(Arc<ArrayValue>),
    Scalar(ScalarValue),
}

/// Cooked object value of an instance node.
#[derive(Clone, Debug, Default)]
pub struct ObjectValue {
    /// Members in document order. Keys starting with `@` carry metadata
    /// objects (RFC 7952) attached to the sibling of the same name, or to
    /// the containing entry for the bare `@` key.
    pub members: IndexMap<InstanceName, Value>,
    /// Time of the last modification.
    pub timestamp: u64,
}

/// Cooked array value (list or leaf-list) of an instance node.
#[derive(Clone, Debug, Default)]
pub struct ArrayValue {
    pub entries: Vec<Value>,
    /// Time of the last modification.
    pub timestamp: u64,
}

impl Value {
    pub fn object(members: IndexMap<InstanceName, Value>, timestamp: u64) -> Value {
        Value::Object(Arc::new(ObjectValue { members, timestamp }))
    }

    pub fn array(entries: Vec<Value>, timestamp: u64) -> Value {
        Value::Array(Arc::new(ArrayValue { entries, timestamp }))
    }

    /// Whether the value is an object or array (as opposed to a scalar).
    pub fn is_structured(&self) -> bool {
        !matches!(self, Value::Scalar(_))
    }

    pub fn as_object(&self) -> Option<&ObjectValue> {
        match self {
            Value::Object(o) => Some(o),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&ArrayValue> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_scalar(&self) -> Option<&ScalarValue> {
        match self {
            Value::Scalar(s) => Some(s),
            _ => None,
        }
    }

    /// Modification timestamp; scalars have none and report zero.
    pub fn timestamp(&self) -> u64 {
        match self {
            Value::Object(o) => o.timestamp,
            Value::Array(a) => a.timestamp,
            Value::Scalar(_) => 0,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Object(a), Value::Object(b)) => a.as_ref() == b.as_ref(),
            (Value::Array(a), Value::Array(b)) => a.as_ref() == b.as_ref(),
            (Value::Scalar(a), Value::Scalar(b)) => a == b,
            _ => false,
        }
    }
}

impl PartialEq for ObjectValue {
    fn eq(&self, other: &ObjectValue) -> bool {
        // key order is irrelevant for equality, timestamps as well
        self.members.len() == other.members.len()
            && self
                .members
                .iter()
                .all(|(k, v)| other.members.get(k) == Some(v))
    }
}

impl PartialEq for ArrayValue {
    fn eq(&self, other: &ArrayValue) -> bool {
        self.entries == other.entries
    }
}

impl ObjectValue {
    /// Member names that carry data (metadata keys excluded), in order.
    pub fn data_member_names(&self) -> impl Iterator<Item = &InstanceName> {
        self.members.keys().filter(|k| !k.starts_with('@'))
    }
}

/// Persistent linked list holding one half of a focused array in the zipper.
#[derive(Clone, Debug, Default)]
pub(crate) struct PList(Option<Arc<PNode>>);

#[derive(Debug)]
struct PNode {
    head: Value,
    tail: PList,
}

impl PList {
    pub(crate) fn empty() -> PList {
        PList(None)
    }

    /// Prepend a value, sharing the remainder.
    pub(crate) fn cons(&self, head: Value) -> PList {
        PList(Some(Arc::new(PNode {
            head,
            tail: self.clone(),
        })))
    }

    /// Split into head and tail.
    pub(crate) fn pop(&self) -> Option<(Value, PList)> {
        self.0
            .as_ref()
            .map(|node| (node.head.clone(), node.tail.clone()))
    }

    /// List of the entries preceding index `i`, nearest sibling first.
    pub(crate) fn before(entries: &[Value]) -> PList {
        let mut res = PList::empty();
        for v in entries {
            res = res.cons(v.clone());
        }
        res
    }

    /// List of the entries following index `i`, nearest sibling first.
    pub(crate) fn after(entries: &[Value]) -> PList {
        let mut res = PList::empty();
        for v in entries.iter().rev() {
            res = res.cons(v.clone());
        }
        res
    }

    pub(crate) fn iter(&self) -> PListIter<'_> {
        PListIter { next: self }
    }
}

pub(crate) struct PListIter<'a> {
    next: &'a PList,
}

impl<'a> Iterator for PListIter<'a> {
    type Item = &'a Value;

    fn next(&mut self) -> Option<&'a Value> {
        let node = self.next.0.as_deref()?;
        self.next = &node.tail;
        Some(&node.head)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(x: i64) -> Value {
        Value::Scalar(ScalarValue::Int64(x))
    }

    #[test]
    fn plist_zipper_halves() {
        let entries = vec![s(0), s(1), s(2), s(3)];
        // focus index 2: before holds [1, 0], after holds [3]
        let before = PList::before(&entries[..2]);
        let after = PList::after(&entries[3..]);
        let b: Vec<_> = before.iter().cloned().collect();
        assert_eq!(b, vec![s(1), s(0)]);
        let a: Vec<_> = after.iter().cloned().collect();
        assert_eq!(a, vec![s(3)]);
    }

    #[test]
    fn equality_ignores_timestamps() {
        let mut m1 = IndexMap::new();
        m1.insert("a".to_string(), s(1));
        let mut m2 = IndexMap::new();
        m2.insert("a".to_string(), s(1));
        assert_eq!(Value::object(m1, 1), Value::object(m2, 99));
    }
}
