//
// Copyright (c) The yangtree Core Contributors
//
// SPDX-License-Identifier: MIT
//

//! YANG instance data.
//!
//! Instance documents are held as persistent values navigated by
//! [`InstanceNode`] zipper cursors: moving up, down or sideways costs O(1)
//! per step, every structural edit returns a new cursor, and no cursor is
//! ever invalidated. Cursors also drive raw (JSON) and XML conversion,
//! default insertion and validation.

use std::sync::Arc;

use bitflags::bitflags;
use indexmap::IndexMap;
use log::trace;
use serde_json::{Map as RawMap, Value as RawValue};

use crate::context::{Context, QualName};
use crate::error::{Error, Result};
use crate::pattern::{PatternEval, SchemaPattern};
use crate::route::{InstanceRoute, RouteItem};
use crate::schema::{NodeId, SchemaNode, SchemaNodeKind};
use crate::types::{DataType, ScalarValue};
use crate::value::{InstanceName, PList, Value};
use crate::xml::XmlElement;
use crate::xpath::{Axis, NodeSet, NodeTest};

bitflags! {
    /// Content type of an instance document or schema node.
    #[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
    pub struct ContentType: u8 {
        const CONFIG = 0x01;
        const NONCONFIG = 0x02;
        const ALL = 0x03;
    }
}

bitflags! {
    /// Parts of validation to perform.
    #[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
    pub struct ValidationScope: u8 {
        /// Schema pattern and type membership.
        const SYNTAX = 0x01;
        /// `when`, `must`, uniqueness, cardinality and reference targets.
        const SEMANTICS = 0x02;
        const ALL = 0x03;
    }
}

/// Callbacks deciding what `raw_value` and the XML writer include. A
/// member or entry is skipped unless both its begin and end callback
/// return true.
pub trait OutputFilter {
    fn begin_member(
        &self,
        _parent: &InstanceNode<'_>,
        _node: &InstanceNode<'_>,
        _attributes: &RawMap<String, RawValue>,
    ) -> bool {
        true
    }

    fn end_member(
        &self,
        _parent: &InstanceNode<'_>,
        _node: &InstanceNode<'_>,
        _attributes: &RawMap<String, RawValue>,
    ) -> bool {
        true
    }

    fn begin_element(
        &self,
        _parent: &InstanceNode<'_>,
        _node: &InstanceNode<'_>,
        _attributes: &RawMap<String, RawValue>,
    ) -> bool {
        true
    }

    fn end_element(
        &self,
        _parent: &InstanceNode<'_>,
        _node: &InstanceNode<'_>,
        _attributes: &RawMap<String, RawValue>,
    ) -> bool {
        true
    }
}

/// The all-inclusive output filter.
#[derive(Debug, Default)]
pub struct NoFilter;

impl OutputFilter for NoFilter {}

/// YANG data node instance implemented as a zipper cursor.
#[derive(Clone, Debug)]
pub struct InstanceNode<'a> {
    context: &'a Context,
    snode: NodeId,
    value: Value,
    timestamp: u64,
    link: Option<Arc<Link<'a>>>,
}

#[derive(Debug)]
enum Link<'a> {
    /// Focus on an object member; `siblings` holds the other members.
    Member {
        name: InstanceName,
        siblings: IndexMap<InstanceName, Value>,
        parent: InstanceNode<'a>,
    },
    /// Focus on an array entry; halves are persistent lists with the
    /// nearest sibling at the head.
    Entry {
        index: usize,
        before: PList,
        after: PList,
        parent: InstanceNode<'a>,
    },
}

impl PartialEq for InstanceNode<'_> {
    fn eq(&self, other: &InstanceNode<'_>) -> bool {
        self.path_key() == other.path_key() && self.value == other.value
    }
}

impl<'a> InstanceNode<'a> {
    // ===== constructors =====

    /// Cook a raw JSON value into an instance tree and return the root
    /// cursor.
    pub(crate) fn from_raw(context: &'a Context, raw: &RawValue) -> Result<InstanceNode<'a>> {
        let root = context.schema_root();
        let ts = context.new_timestamp();
        let value = cook_node(&root, raw, ts, "")?;
        if value.as_object().is_none() {
            return Err(Error::RawType {
                path: String::new(),
                expected: "object".to_string(),
            });
        }
        Ok(InstanceNode {
            context,
            snode: root.id(),
            value,
            timestamp: ts,
            link: None,
        })
    }

    /// Cook a parsed XML document into an instance tree. The top-level
    /// wrapper element itself is ignored; its children become top-level
    /// members.
    pub(crate) fn from_xml(
        context: &'a Context,
        element: &XmlElement,
    ) -> Result<InstanceNode<'a>> {
        let root = context.schema_root();
        let ts = context.new_timestamp();
        let members = cook_element_children(&root, &element.children, ts)?;
        Ok(InstanceNode {
            context,
            snode: root.id(),
            value: Value::object(members, ts),
            timestamp: ts,
            link: None,
        })
    }

    // ===== accessors =====

    pub fn context(&self) -> &'a Context {
        self.context
    }

    /// Schema definition of this node.
    pub fn schema(&self) -> SchemaNode<'a> {
        SchemaNode::new(self.context, self.snode)
    }

    /// Value at the cursor.
    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Time of the last modification observable from this cursor.
    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    pub fn is_root(&self) -> bool {
        self.link.is_none()
    }

    /// Instance name of the node (`"/"` for the root; entries answer with
    /// the name of the containing member).
    pub fn name(&self) -> InstanceName {
        match self.link.as_deref() {
            None => "/".to_string(),
            Some(Link::Member { name, .. }) => name.clone(),
            Some(Link::Entry { parent, .. }) => parent.name(),
        }
    }

    pub(crate) fn instance_name(&self) -> Option<String> {
        match self.link.as_deref() {
            None => None,
            _ => Some(self.name()),
        }
    }

    /// Qualified name of the node.
    pub(crate) fn qual_name(&self) -> Option<QualName> {
        match self.link.as_deref() {
            None => None,
            Some(Link::Member { name, .. }) => match name.split_once(':') {
                Some((ns, local)) => Some((local.to_string(), ns.to_string())),
                None => {
                    let ns = self.schema().namespace().unwrap_or_default();
                    Some((name.clone(), ns.to_string()))
                }
            },
            Some(Link::Entry { parent, .. }) => parent.qual_name(),
        }
    }

    /// Whether the node is an instance of an internal schema node.
    pub fn is_internal_node(&self) -> bool {
        self.schema().is_internal()
    }

    /// Canonical string value used by XPath and diagnostics; structured
    /// values answer with an empty string.
    pub(crate) fn node_string(&self) -> String {
        match &self.value {
            Value::Scalar(s) => s.canonical_string(),
            _ => String::new(),
        }
    }

    pub(crate) fn node_number(&self) -> f64 {
        match &self.value {
            Value::Scalar(s) => s.as_f64().unwrap_or(f64::NAN),
            _ => f64::NAN,
        }
    }

    pub(crate) fn enum_value(&self) -> Option<i32> {
        let name = match self.value.as_scalar() {
            Some(ScalarValue::Enum(name)) => name.clone(),
            _ => return None,
        };
        self.schema().leaf_type()?.enum_value(&name)
    }

    pub(crate) fn has_bit_set(&self, name: &str) -> bool {
        matches!(
            self.value.as_scalar(),
            Some(ScalarValue::Bits(bits)) if bits.iter().any(|b| b == name)
        )
    }

    pub(crate) fn identityref_value(&self) -> Option<QualName> {
        match self.value.as_scalar() {
            Some(ScalarValue::IdentityRef { name, ns }) => {
                Some((name.clone(), ns.clone()))
            }
            _ => None,
        }
    }

    /// JSON Pointer (RFC 6901) of the node.
    pub fn json_pointer(&self) -> String {
        let mut keys = Vec::new();
        let mut node = self;
        loop {
            match node.link.as_deref() {
                None => break,
                Some(Link::Member { name, parent, .. }) => {
                    keys.push(name.clone());
                    node = parent;
                }
                Some(Link::Entry { index, parent, .. }) => {
                    keys.push(index.to_string());
                    node = parent;
                }
            }
        }
        keys.reverse();
        format!("/{}", keys.join("/"))
    }

    /// Instance route of the node (its canonical address).
    pub fn instance_route(&self) -> InstanceRoute {
        let mut items = Vec::new();
        let mut node = self.clone();
        loop {
            match node.link.as_deref() {
                None => break,
                Some(Link::Member { name, parent, .. }) => {
                    let item = match name.split_once(':') {
                        Some((ns, local)) => RouteItem::MemberName {
                            name: local.to_string(),
                            ns: Some(ns.to_string()),
                        },
                        None => RouteItem::MemberName {
                            name: name.clone(),
                            ns: None,
                        },
                    };
                    items.push(item);
                    node = parent.clone();
                }
                Some(Link::Entry { index, parent, .. }) => {
                    items.push(node.entry_route_item(*index));
                    node = parent.clone();
                }
            }
        }
        items.reverse();
        InstanceRoute(items)
    }

    fn entry_route_item(&self, index: usize) -> RouteItem {
        let snode = self.schema();
        match snode.kind() {
            SchemaNodeKind::LeafList => {
                RouteItem::EntryValue(self.node_string())
            }
            SchemaNodeKind::List => {
                let keys = snode.list_keys_qnames();
                if keys.is_empty() {
                    return RouteItem::EntryIndex(index);
                }
                let obj = match self.value.as_object() {
                    Some(obj) => obj,
                    None => return RouteItem::EntryIndex(index),
                };
                let mut sel = Vec::new();
                for (kname, kns) in keys {
                    let iname = if snode.namespace() == Some(kns.as_str()) {
                        kname.clone()
                    } else {
                        format!("{}:{}", kns, kname)
                    };
                    match obj.members.get(&iname).and_then(|v| v.as_scalar()) {
                        Some(scalar) => {
                            let ns = if snode.namespace() == Some(kns.as_str()) {
                                None
                            } else {
                                Some(kns.clone())
                            };
                            sel.push(((kname.clone(), ns), scalar.canonical_string()));
                        }
                        None => return RouteItem::EntryIndex(index),
                    }
                }
                RouteItem::EntryKeys(sel)
            }
            _ => RouteItem::EntryIndex(index),
        }
    }

    /// Cheap canonical key for node identity (used for node-set dedup and
    /// cursor equality).
    pub(crate) fn path_key(&self) -> String {
        let mut keys = String::new();
        let mut node = self;
        loop {
            match node.link.as_deref() {
                None => break,
                Some(Link::Member { name, parent, .. }) => {
                    keys.push_str(name);
                    keys.push('\u{1f}');
                    node = parent;
                }
                Some(Link::Entry { index, parent, .. }) => {
                    keys.push_str(&index.to_string());
                    keys.push('\u{1f}');
                    node = parent;
                }
            }
        }
        keys
    }

    // ===== navigation =====

    fn copy_with(&self, value: Value, timestamp: Option<u64>) -> InstanceNode<'a> {
        let timestamp = timestamp.unwrap_or_else(|| {
            if value.is_structured() {
                value.timestamp()
            } else {
                self.context.new_timestamp()
            }
        });
        InstanceNode {
            context: self.context,
            snode: self.snode,
            value,
            timestamp,
            link: self.link.clone(),
        }
    }

    fn member_schema(&self, name: &str) -> Result<SchemaNode<'a>> {
        let snode = self.schema();
        let (local, ns) = match name.split_once(':') {
            Some((ns, local)) => (local, Some(ns)),
            None => (name, None),
        };
        snode
            .get_data_child(local, ns)
            .ok_or_else(|| Error::NonexistentSchemaNode {
                parent: snode.data_path(),
                name: name.to_string(),
            })
    }

    /// Strip a namespace prefix that coincides with the receiver's.
    fn normalize_member_name(&self, name: &str) -> String {
        if let Some((prefix, local)) = name.split_once(':') {
            if self.schema().namespace() == Some(prefix) {
                return local.to_string();
            }
        }
        name.to_string()
    }

    /// Member of an object by instance name.
    pub fn member(&self, name: &str) -> Result<InstanceNode<'a>> {
        let obj = self.value.as_object().ok_or_else(|| Error::InstanceValue {
            route: self.instance_route().to_string(),
            message: "member of non-object".to_string(),
        })?;
        let name = self.normalize_member_name(name);
        let mut siblings = obj.members.clone();
        let value = siblings.shift_remove(&name).ok_or_else(|| {
            Error::NonexistentInstance {
                route: self.instance_route().to_string(),
                message: format!("member '{}'", name),
            }
        })?;
        let snode = self.member_schema(&name)?;
        Ok(InstanceNode {
            context: self.context,
            snode: snode.id(),
            value,
            timestamp: obj.timestamp,
            link: Some(Arc::new(Link::Member {
                name,
                siblings,
                parent: self.clone(),
            })),
        })
    }

    /// Entry of an array by index; a negative index counts from the end.
    pub fn entry(&self, index: i64) -> Result<InstanceNode<'a>> {
        let arr = self.value.as_array().ok_or_else(|| Error::InstanceValue {
            route: self.instance_route().to_string(),
            message: "entry of non-array".to_string(),
        })?;
        let len = arr.entries.len() as i64;
        let i = if index < 0 { len + index } else { index };
        if i < 0 || i >= len {
            return Err(Error::NonexistentInstance {
                route: self.instance_route().to_string(),
                message: format!("entry {}", index),
            });
        }
        let i = i as usize;
        Ok(InstanceNode {
            context: self.context,
            snode: self.snode,
            value: arr.entries[i].clone(),
            timestamp: arr.timestamp,
            link: Some(Arc::new(Link::Entry {
                index: i,
                before: PList::before(&arr.entries[..i]),
                after: PList::after(&arr.entries[i + 1..]),
                parent: self.clone(),
            })),
        })
    }

    /// Re-zip the focused value into its parent and return the parent
    /// cursor. The parent adopts the younger of the two timestamps.
    pub fn up(&self) -> Result<InstanceNode<'a>> {
        let link = self.link.as_deref().ok_or_else(|| Error::NonexistentInstance {
            route: "/".to_string(),
            message: "up of top".to_string(),
        })?;
        match link {
            Link::Member {
                name,
                siblings,
                parent,
            } => {
                let ts = self.timestamp.max(parent.timestamp);
                let mut members = siblings.clone();
                members.insert(name.clone(), self.value.clone());
                Ok(parent.copy_with(Value::object(members, ts), Some(ts)))
            }
            Link::Entry {
                before,
                after,
                parent,
                ..
            } => {
                let ts = self.timestamp.max(parent.timestamp);
                let mut entries: Vec<Value> = before.iter().cloned().collect();
                entries.reverse();
                entries.push(self.value.clone());
                entries.extend(after.iter().cloned());
                Ok(parent.copy_with(Value::array(entries, ts), Some(ts)))
            }
        }
    }

    /// Cursor at the root of the data tree.
    pub fn top(&self) -> InstanceNode<'a> {
        let mut node = self.clone();
        while !node.is_root() {
            node = node.up().expect("non-root node has a parent");
        }
        node
    }

    /// Sibling member of the same object.
    pub fn sibling(&self, name: &str) -> Result<InstanceNode<'a>> {
        let link = match self.link.as_deref() {
            Some(Link::Member {
                name: my_name,
                siblings,
                parent,
            }) => (my_name, siblings, parent),
            _ => {
                return Err(Error::InstanceValue {
                    route: self.instance_route().to_string(),
                    message: "sibling of non-member".to_string(),
                })
            }
        };
        let (my_name, siblings, parent) = link;
        let name = parent.normalize_member_name(name);
        let snode = parent.member_schema(&name)?;
        let mut sibs = siblings.clone();
        let value = sibs.shift_remove(&name).ok_or_else(|| {
            Error::NonexistentInstance {
                route: self.instance_route().to_string(),
                message: format!("member '{}'", name),
            }
        })?;
        sibs.insert(my_name.clone(), self.value.clone());
        Ok(InstanceNode {
            context: self.context,
            snode: snode.id(),
            value,
            timestamp: self.timestamp,
            link: Some(Arc::new(Link::Member {
                name,
                siblings: sibs,
                parent: parent.clone(),
            })),
        })
    }

    /// Next entry of the containing array.
    pub fn next(&self) -> Result<InstanceNode<'a>> {
        match self.link.as_deref() {
            Some(Link::Entry {
                index,
                before,
                after,
                parent,
            }) => match after.pop() {
                Some((value, naft)) => Ok(InstanceNode {
                    context: self.context,
                    snode: self.snode,
                    value,
                    timestamp: self.timestamp,
                    link: Some(Arc::new(Link::Entry {
                        index: index + 1,
                        before: before.cons(self.value.clone()),
                        after: naft,
                        parent: parent.clone(),
                    })),
                }),
                None => Err(Error::NonexistentInstance {
                    route: self.instance_route().to_string(),
                    message: "next of last".to_string(),
                }),
            },
            _ => Err(Error::InstanceValue {
                route: self.instance_route().to_string(),
                message: "next of non-entry".to_string(),
            }),
        }
    }

    /// Previous entry of the containing array.
    pub fn previous(&self) -> Result<InstanceNode<'a>> {
        match self.link.as_deref() {
            Some(Link::Entry {
                index,
                before,
                after,
                parent,
            }) => match before.pop() {
                Some((value, nbef)) => Ok(InstanceNode {
                    context: self.context,
                    snode: self.snode,
                    value,
                    timestamp: self.timestamp,
                    link: Some(Arc::new(Link::Entry {
                        index: index - 1,
                        before: nbef,
                        after: after.cons(self.value.clone()),
                        parent: parent.clone(),
                    })),
                }),
                None => Err(Error::NonexistentInstance {
                    route: self.instance_route().to_string(),
                    message: "previous of first".to_string(),
                }),
            },
            _ => Err(Error::InstanceValue {
                route: self.instance_route().to_string(),
                message: "previous of non-entry".to_string(),
            }),
        }
    }

    /// Index of an array entry.
    pub fn index(&self) -> Option<usize> {
        match self.link.as_deref() {
            Some(Link::Entry { index, .. }) => Some(*index),
            _ => None,
        }
    }

    /// Iterator over the entries of an array value.
    pub fn entries(&self) -> Result<Vec<InstanceNode<'a>>> {
        let arr = self.value.as_array().ok_or_else(|| Error::InstanceValue {
            route: self.instance_route().to_string(),
            message: "entries of non-array".to_string(),
        })?;
        (0..arr.entries.len() as i64)
            .map(|i| self.entry(i))
            .collect()
    }

    /// Names of the object's data members (metadata keys excluded).
    pub fn member_names(&self) -> Vec<InstanceName> {
        match self.value.as_object() {
            Some(obj) => obj.data_member_names().cloned().collect(),
            None => Vec::new(),
        }
    }

    /// Walk an instance route from this node.
    pub fn goto(&self, route: &InstanceRoute) -> Result<InstanceNode<'a>> {
        let mut node = self.clone();
        for item in &route.0 {
            node = node.goto_step(item)?;
        }
        Ok(node)
    }

    fn goto_step(&self, item: &RouteItem) -> Result<InstanceNode<'a>> {
        match item {
            RouteItem::MemberName { name, ns } => {
                self.member(&RouteItem::iname(name, ns))
            }
            RouteItem::ActionName { name, ns } => Err(Error::NonDataNode {
                route: self.instance_route().to_string(),
                message: format!("action {}", RouteItem::iname(name, ns)),
            }),
            RouteItem::EntryIndex(i) => self.entry(*i as i64),
            RouteItem::EntryValue(text) => {
                let snode = self.schema();
                let dtype = snode.leaf_type().ok_or_else(|| Error::BadSchemaNodeType {
                    path: snode.data_path(),
                    expected: "leaf-list".to_string(),
                })?;
                let target = dtype
                    .parse_canonical(text, snode.namespace().unwrap_or_default())
                    .ok_or_else(|| Error::InvalidKeyValue {
                        value: text.clone(),
                    })?;
                let arr = self.value.as_array().ok_or_else(|| Error::InstanceValue {
                    route: self.instance_route().to_string(),
                    message: "entry of non-array".to_string(),
                })?;
                let pos = arr
                    .entries
                    .iter()
                    .position(|en| en.as_scalar() == Some(&target))
                    .ok_or_else(|| Error::NonexistentInstance {
                        route: self.instance_route().to_string(),
                        message: format!("entry '{}'", text),
                    })?;
                self.entry(pos as i64)
            }
            RouteItem::EntryKeys(keys) => {
                let snode = self.schema();
                let mut cooked = Vec::new();
                for ((kname, kns), text) in keys {
                    let kleaf = snode
                        .get_data_child(kname, kns.as_deref())
                        .ok_or_else(|| Error::NonexistentSchemaNode {
                            parent: snode.data_path(),
                            name: kname.clone(),
                        })?;
                    let value = kleaf
                        .leaf_type()
                        .and_then(|t| {
                            t.parse_canonical(
                                text,
                                kleaf.namespace().unwrap_or_default(),
                            )
                        })
                        .ok_or_else(|| Error::InvalidKeyValue {
                            value: text.clone(),
                        })?;
                    cooked.push((kleaf.iname(), value));
                }
                self.look_up(&cooked)
            }
        }
    }

    /// Return the entry of a keyed list with matching key values.
    pub fn look_up(&self, keys: &[(String, ScalarValue)]) -> Result<InstanceNode<'a>> {
        if self.schema().kind() != SchemaNodeKind::List {
            return Err(Error::InstanceValue {
                route: self.instance_route().to_string(),
                message: "lookup on non-list".to_string(),
            });
        }
        let arr = self.value.as_array().ok_or_else(|| Error::InstanceValue {
            route: self.instance_route().to_string(),
            message: "lookup on non-array".to_string(),
        })?;
        for (i, en) in arr.entries.iter().enumerate() {
            let obj = match en.as_object() {
                Some(obj) => obj,
                None => continue,
            };
            let matches = keys.iter().all(|(name, value)| {
                obj.members.get(name).and_then(|v| v.as_scalar()) == Some(value)
            });
            if matches {
                return self.entry(i as i64);
            }
        }
        Err(Error::NonexistentInstance {
            route: self.instance_route().to_string(),
            message: "entry lookup failed".to_string(),
        })
    }

    /// Peek at a value within the receiver's subtree without moving the
    /// cursor.
    pub fn peek(&self, route: &InstanceRoute) -> Option<Value> {
        let mut value = self.value.clone();
        let mut snode = self.schema();
        for item in &route.0 {
            match item {
                RouteItem::MemberName { name, ns } => {
                    let cn = snode.get_data_child(name, ns.as_deref())?;
                    let obj = value.as_object()?;
                    value = obj.members.get(&cn.iname())?.clone();
                    snode = cn;
                }
                RouteItem::ActionName { .. } => return None,
                RouteItem::EntryIndex(i) => {
                    let arr = value.as_array()?;
                    value = arr.entries.get(*i)?.clone();
                }
                RouteItem::EntryValue(text) => {
                    let target = snode
                        .leaf_type()?
                        .parse_canonical(text, snode.namespace().unwrap_or_default())?;
                    let arr = value.as_array()?;
                    value = arr
                        .entries
                        .iter()
                        .find(|en| en.as_scalar() == Some(&target))?
                        .clone();
                }
                RouteItem::EntryKeys(keys) => {
                    let arr = value.as_array()?;
                    let mut found = None;
                    'entries: for en in &arr.entries {
                        let obj = match en.as_object() {
                            Some(obj) => obj,
                            None => continue,
                        };
                        for ((kname, kns), text) in keys {
                            let kleaf = snode.get_data_child(kname, kns.as_deref())?;
                            let kval = kleaf.leaf_type()?.parse_canonical(
                                text,
                                kleaf.namespace().unwrap_or_default(),
                            )?;
                            if obj.members.get(&kleaf.iname()).and_then(|v| v.as_scalar())
                                != Some(&kval)
                            {
                                continue 'entries;
                            }
                        }
                        found = Some(en.clone());
                        break;
                    }
                    value = found?;
                }
            }
        }
        Some(value)
    }

    // ===== structural edits =====

    /// Insert or replace an object member and return the cursor focused on
    /// it.
    pub fn put_member(&self, name: &str, value: Value) -> Result<InstanceNode<'a>> {
        let obj = self.value.as_object().ok_or_else(|| Error::InstanceValue {
            route: self.instance_route().to_string(),
            message: "member of non-object".to_string(),
        })?;
        let name = self.normalize_member_name(name);
        self.member_schema(&name)?;
        let ts = self.context.new_timestamp();
        let mut members = obj.members.clone();
        members.insert(name.clone(), value);
        self.copy_with(Value::object(members, ts), Some(ts)).member(&name)
    }

    /// Like [`InstanceNode::put_member`], cooking a raw JSON value first.
    pub fn put_member_raw(&self, name: &str, raw: &RawValue) -> Result<InstanceNode<'a>> {
        let norm = self.normalize_member_name(name);
        let csn = self.member_schema(&norm)?;
        let ts = self.context.new_timestamp();
        let value = cook_node(&csn, raw, ts, &self.json_pointer())?;
        self.put_member(&norm, value)
    }

    /// Delete an object member.
    pub fn delete_member(&self, name: &str) -> Result<InstanceNode<'a>> {
        let obj = self.value.as_object().ok_or_else(|| Error::InstanceValue {
            route: self.instance_route().to_string(),
            message: "member of non-object".to_string(),
        })?;
        let name = self.normalize_member_name(name);
        let ts = self.context.new_timestamp();
        let mut members = obj.members.clone();
        if members.shift_remove(&name).is_none() {
            return Err(Error::NonexistentInstance {
                route: self.instance_route().to_string(),
                message: format!("member '{}'", name),
            });
        }
        Ok(self.copy_with(Value::object(members, ts), Some(ts)))
    }

    /// Delete an array entry.
    pub fn delete_entry(&self, index: i64) -> Result<InstanceNode<'a>> {
        let arr = self.value.as_array().ok_or_else(|| Error::InstanceValue {
            route: self.instance_route().to_string(),
            message: "entry of non-array".to_string(),
        })?;
        let len = arr.entries.len() as i64;
        let i = if index < 0 { len + index } else { index };
        if i < 0 || i >= len {
            return Err(Error::NonexistentInstance {
                route: self.instance_route().to_string(),
                message: format!("entry {}", index),
            });
        }
        let ts = self.context.new_timestamp();
        let mut entries = arr.entries.clone();
        entries.remove(i as usize);
        Ok(self.copy_with(Value::array(entries, ts), Some(ts)))
    }

    /// Replace the value at the cursor.
    pub fn update(&self, value: Value) -> InstanceNode<'a> {
        self.copy_with(value, None)
    }

    /// Replace the value at the cursor with a cooked raw value.
    pub fn update_raw(&self, raw: &RawValue) -> Result<InstanceNode<'a>> {
        let ts = self.context.new_timestamp();
        let snode = self.schema();
        let value = if self.link_is_entry() {
            cook_entry(&snode, raw, ts, &self.json_pointer())?
        } else {
            cook_node(&snode, raw, ts, &self.json_pointer())?
        };
        Ok(self.copy_with(value, Some(ts)))
    }

    fn link_is_entry(&self) -> bool {
        matches!(self.link.as_deref(), Some(Link::Entry { .. }))
    }

    /// Insert a new entry before the receiver and focus on it.
    pub fn insert_before(&self, value: Value) -> Result<InstanceNode<'a>> {
        match self.link.as_deref() {
            Some(Link::Entry {
                index,
                before,
                after,
                parent,
            }) => Ok(InstanceNode {
                context: self.context,
                snode: self.snode,
                value,
                timestamp: self.context.new_timestamp(),
                link: Some(Arc::new(Link::Entry {
                    index: *index,
                    before: before.clone(),
                    after: after.cons(self.value.clone()),
                    parent: parent.clone(),
                })),
            }),
            _ => Err(Error::InstanceValue {
                route: self.instance_route().to_string(),
                message: "insert before non-entry".to_string(),
            }),
        }
    }

    /// Insert a new entry after the receiver and focus on it.
    pub fn insert_after(&self, value: Value) -> Result<InstanceNode<'a>> {
        match self.link.as_deref() {
            Some(Link::Entry {
                index,
                before,
                after,
                parent,
            }) => Ok(InstanceNode {
                context: self.context,
                snode: self.snode,
                value,
                timestamp: self.context.new_timestamp(),
                link: Some(Arc::new(Link::Entry {
                    index: *index + 1,
                    before: before.cons(self.value.clone()),
                    after: after.clone(),
                    parent: parent.clone(),
                })),
            }),
            _ => Err(Error::InstanceValue {
                route: self.instance_route().to_string(),
                message: "insert after non-entry".to_string(),
            }),
        }
    }

    /// Deep-merge another cooked value into the receiver's: objects
    /// recurse, leaf-lists unite by value, keyed lists match by key tuple,
    /// everything else is replaced.
    pub fn merge(&self, value: &Value) -> Result<InstanceNode<'a>> {
        let snode = self.schema();
        let empty = match &self.value {
            Value::Object(obj) => obj.members.is_empty(),
            Value::Array(arr) => arr.entries.is_empty(),
            Value::Scalar(_) => true,
        };
        if !snode.is_internal() || empty {
            return Ok(self.update(value.clone()));
        }
        match (&self.value, value) {
            (Value::Array(_), Value::Array(new)) => self.merge_array(&new.entries),
            (Value::Object(_), Value::Object(new)) => {
                let mut cur = self.clone();
                let mut rest: Vec<(InstanceName, Value)> = Vec::new();
                for (k, v) in &new.members {
                    if cur
                        .value
                        .as_object()
                        .map_or(false, |obj| obj.members.contains_key(k))
                    {
                        cur = cur.member(k)?.merge(v)?.up()?;
                    } else {
                        rest.push((k.clone(), v.clone()));
                    }
                }
                let ts = self.context.new_timestamp();
                let mut members = cur.value.as_object().unwrap().members.clone();
                for (k, v) in rest {
                    members.insert(k, v);
                }
                Ok(cur.copy_with(Value::object(members, ts), Some(ts)))
            }
            _ => Ok(self.update(value.clone())),
        }
    }

    /// Merge a raw JSON value.
    pub fn merge_raw(&self, raw: &RawValue) -> Result<InstanceNode<'a>> {
        let ts = self.context.new_timestamp();
        let value = cook_node(&self.schema(), raw, ts, &self.json_pointer())?;
        self.merge(&value)
    }

    fn merge_array(&self, new: &[Value]) -> Result<InstanceNode<'a>> {
        let snode = self.schema();
        if snode.kind() == SchemaNodeKind::LeafList {
            let arr = self.value.as_array().unwrap();
            let ts = self.context.new_timestamp();
            let mut entries = arr.entries.clone();
            for en in new {
                if !entries.contains(en) {
                    entries.push(en.clone());
                }
            }
            return Ok(self.copy_with(Value::array(entries, ts), Some(ts)));
        }
        let keys: Vec<String> = snode
            .list_keys_qnames()
            .iter()
            .map(|(kname, kns)| {
                if snode.namespace() == Some(kns.as_str()) {
                    kname.clone()
                } else {
                    format!("{}:{}", kns, kname)
                }
            })
            .collect();
        let key_tuple = |en: &Value| -> Option<Vec<ScalarValue>> {
            let obj = en.as_object()?;
            keys.iter()
                .map(|k| obj.members.get(k).and_then(|v| v.as_scalar()).cloned())
                .collect()
        };
        let mut pending: Vec<(Option<Vec<ScalarValue>>, Value)> = new
            .iter()
            .map(|en| (key_tuple(en), en.clone()))
            .collect();
        let mut cur = self.clone();
        let len = cur.value.as_array().unwrap().entries.len();
        for i in 0..len {
            let entry = cur.entry(i as i64)?;
            let ekeys = key_tuple(entry.value());
            if let Some(pos) = pending
                .iter()
                .position(|(k, _)| k.is_some() && *k == ekeys)
            {
                let (_, newval) = pending.remove(pos);
                cur = entry.merge(&newval)?.up()?;
            }
        }
        let ts = self.context.new_timestamp();
        let mut entries = cur.value.as_array().unwrap().entries.clone();
        for (_, en) in pending {
            entries.push(en);
        }
        Ok(cur.copy_with(Value::array(entries, ts), Some(ts)))
    }

    // ===== XPath node axes =====

    /// A member cursor for `when` evaluation: the existing member, or a
    /// placeholder with an empty value when the member doesn't exist.
    pub(crate) fn member_or_placeholder(&self, name: &str) -> InstanceNode<'a> {
        if let Ok(member) = self.member(name) {
            return member;
        }
        let snode = self
            .member_schema(name)
            .map(|s| s.id())
            .unwrap_or(self.snode);
        InstanceNode {
            context: self.context,
            snode,
            value: Value::Scalar(ScalarValue::Empty),
            timestamp: self.timestamp,
            link: Some(Arc::new(Link::Member {
                name: name.to_string(),
                siblings: self
                    .value
                    .as_object()
                    .map(|obj| obj.members.clone())
                    .unwrap_or_default(),
                parent: self.clone(),
            })),
        }
    }

    /// Nodes selected from this node by one XPath axis step.
    pub(crate) fn axis_nodes(&self, axis: Axis, test: &NodeTest) -> NodeSet<'a> {
        match axis {
            Axis::Child => self.xpath_children(test),
            Axis::Descendant => self.xpath_descendants(test, false),
            Axis::DescendantOrSelf => self.xpath_descendants(test, true),
            Axis::Parent => match self.xpath_parent() {
                Some(p) if test.matches(p.qual_name().as_ref()) || p.is_root() => {
                    vec![p]
                }
                _ => Vec::new(),
            },
            Axis::Ancestor => self.xpath_ancestors(test, false),
            Axis::AncestorOrSelf => self.xpath_ancestors(test, true),
            Axis::SelfAxis => {
                if test.matches(self.qual_name().as_ref()) || self.is_root() {
                    vec![self.clone()]
                } else {
                    Vec::new()
                }
            }
            Axis::FollowingSibling => self.xpath_entry_siblings(test, true),
            Axis::PrecedingSibling => self.xpath_entry_siblings(test, false),
        }
    }

    fn xpath_children(&self, test: &NodeTest) -> NodeSet<'a> {
        let mut res = Vec::new();
        if self.value.as_object().is_none() {
            return res;
        }
        for name in self.member_names() {
            let member = match self.member(&name) {
                Ok(member) => member,
                Err(_) => continue,
            };
            if !test.matches(member.qual_name().as_ref()) {
                continue;
            }
            if member.value.as_array().is_some() {
                if let Ok(entries) = member.entries() {
                    res.extend(entries);
                }
            } else {
                res.push(member);
            }
        }
        res
    }

    fn xpath_descendants(&self, test: &NodeTest, with_self: bool) -> NodeSet<'a> {
        let mut res = Vec::new();
        if with_self
            && (test.matches(self.qual_name().as_ref())
                || (self.is_root() && *test == NodeTest::AnyNode))
        {
            res.push(self.clone());
        }
        for child in self.xpath_children(&NodeTest::AnyNode) {
            if test.matches(child.qual_name().as_ref()) {
                res.push(child.clone());
            }
            res.extend(child.xpath_descendants(test, false));
        }
        res
    }

    fn xpath_parent(&self) -> Option<InstanceNode<'a>> {
        match self.link.as_deref() {
            None => None,
            Some(Link::Member { .. }) => self.up().ok(),
            Some(Link::Entry { .. }) => self.up().ok()?.up().ok(),
        }
    }

    fn xpath_ancestors(&self, test: &NodeTest, with_self: bool) -> NodeSet<'a> {
        let mut res = Vec::new();
        if with_self
            && (test.matches(self.qual_name().as_ref())
                || (self.is_root() && *test == NodeTest::AnyNode))
        {
            res.push(self.clone());
        }
        let mut node = self.xpath_parent();
        while let Some(p) = node {
            if test.matches(p.qual_name().as_ref())
                || (p.is_root() && *test == NodeTest::AnyNode)
            {
                res.push(p.clone());
            }
            node = p.xpath_parent();
        }
        res
    }

    fn xpath_entry_siblings(&self, test: &NodeTest, following: bool) -> NodeSet<'a> {
        let mut res = Vec::new();
        if !test.matches(self.qual_name().as_ref()) {
            return res;
        }
        if !self.link_is_entry() {
            return res;
        }
        let mut node = self.clone();
        loop {
            let next = if following { node.next() } else { node.previous() };
            match next {
                Ok(n) => {
                    res.push(n.clone());
                    node = n;
                }
                Err(_) => break,
            }
        }
        res
    }

    /// Nodes the receiver refers to (leafref or instance-identifier).
    pub(crate) fn deref_nodes(&self) -> NodeSet<'a> {
        let dtype = match self.schema().leaf_type() {
            Some(dtype) => dtype,
            None => return Vec::new(),
        };
        match dtype {
            DataType::Leafref { path, .. } => match path.evaluate(self) {
                Ok(value) => match value {
                    crate::xpath::XPathValue::Nodes(ns) => ns
                        .into_iter()
                        .filter(|n| n.value() == &self.value)
                        .collect(),
                    _ => Vec::new(),
                },
                Err(_) => Vec::new(),
            },
            DataType::InstanceIdentifier { .. } => {
                match self.value.as_scalar() {
                    Some(ScalarValue::InstanceId(route)) => {
                        match self.top().goto(route) {
                            Ok(node) => vec![node],
                            Err(_) => Vec::new(),
                        }
                    }
                    _ => Vec::new(),
                }
            }
            _ => Vec::new(),
        }
    }

    // ===== XPath evaluation =====

    /// Evaluate an XPath expression on the node. Prefixes in the
    /// expression are interpreted in the context of the named module;
    /// unprefixed names bind to that module's namespace.
    pub fn eval_xpath(
        &self,
        expr: &str,
        module: &str,
    ) -> Result<crate::xpath::XPathValue<'a>> {
        let sdata = &self.context.schema_data;
        let mid = sdata.last_revision(module)?.clone();
        let sctx = crate::context::SchemaContext {
            default_ns: sdata.namespace(&mid)?.to_string(),
            text_mid: mid,
        };
        let parsed = crate::xpath::XPathParser::new(expr, sdata, &sctx).parse()?;
        parsed.evaluate(self)
    }

    /// Evaluate an XPath expression expected to produce a node set.
    pub fn find_xpath(&self, expr: &str, module: &str) -> Result<Vec<InstanceNode<'a>>> {
        match self.eval_xpath(expr, module)? {
            crate::xpath::XPathValue::Nodes(ns) => Ok(ns),
            other => Err(Error::XPathTypeError {
                value: other.string(),
            }),
        }
    }

    // ===== defaults =====

    /// Return the receiver with defaults added recursively to its value.
    /// With `tag` set, every added member is marked with
    /// `ietf-netconf-with-defaults:default` metadata.
    pub fn add_defaults(&self, ctype: ContentType, tag: bool) -> Result<InstanceNode<'a>> {
        let snode = self.schema();
        if !snode.is_internal() && !self.is_root() {
            return Ok(self.clone());
        }
        match &self.value {
            Value::Object(_) => {
                let mut cur = self.clone();
                for name in self.member_names() {
                    let member = cur.member(&name)?;
                    cur = member.add_defaults(ctype, tag)?.up()?;
                }
                cur.add_level_defaults(ctype, tag)
            }
            Value::Array(arr) => {
                if arr.entries.is_empty() {
                    return Ok(self.clone());
                }
                let mut en = self.entry(0)?;
                loop {
                    en = en.add_defaults(ctype, tag)?;
                    match en.next() {
                        Ok(next) => en = next,
                        Err(_) => break,
                    }
                }
                en.up()
            }
            Value::Scalar(_) => Ok(self.clone()),
        }
    }

    /// Add the defaults prescribed for missing members at this level.
    fn add_level_defaults(&self, ctype: ContentType, tag: bool) -> Result<InstanceNode<'a>> {
        let additions = self.default_additions(&self.schema(), ctype)?;
        if additions.is_empty() {
            return Ok(self.clone());
        }
        let ts = self.context.new_timestamp();
        let mut members = self.value.as_object().unwrap().members.clone();
        for (name, value) in additions {
            if tag {
                let mut meta = RawMap::new();
                meta.insert(
                    "ietf-netconf-with-defaults:default".to_string(),
                    RawValue::Bool(true),
                );
                match &value {
                    Value::Object(obj) => {
                        let mut inner = obj.members.clone();
                        inner.insert("@".to_string(), cook_metadata_object(&meta, ts));
                        members.insert(name, Value::object(inner, ts));
                    }
                    _ => {
                        members
                            .insert(format!("@{}", name), cook_metadata_object(&meta, ts));
                        members.insert(name, value);
                    }
                }
            } else {
                members.insert(name, value);
            }
        }
        Ok(self.copy_with(Value::object(members, ts), Some(ts)))
    }

    /// Compute the default members a schema node prescribes that are
    /// missing from the receiver's object value.
    fn default_additions(
        &self,
        snode: &SchemaNode<'a>,
        ctype: ContentType,
    ) -> Result<Vec<(InstanceName, Value)>> {
        let mut res = Vec::new();
        let obj = match self.value.as_object() {
            Some(obj) => obj,
            None => return Ok(res),
        };
        for child in snode.children() {
            match child.kind() {
                SchemaNodeKind::Choice => {
                    // defaults of the default case apply only while no case
                    // member is instantiated
                    let any_present = child.data_children().iter().any(|dc| {
                        obj.members.contains_key(&dc.iname())
                    });
                    if any_present {
                        continue;
                    }
                    if let Some((cname, cns)) = child.default_case() {
                        if let Some(case) = child.get_child(cname, Some(cns.as_str())) {
                            res.extend(self.case_default_additions(&case, ctype)?);
                        }
                    }
                }
                SchemaNodeKind::Case => {}
                _ => res.extend(self.child_default_addition(&child, ctype)?),
            }
        }
        Ok(res)
    }

    fn case_default_additions(
        &self,
        case: &SchemaNode<'a>,
        ctype: ContentType,
    ) -> Result<Vec<(InstanceName, Value)>> {
        let mut res = Vec::new();
        for child in case.children() {
            match child.kind() {
                SchemaNodeKind::Choice | SchemaNodeKind::Case => {}
                _ => res.extend(self.child_default_addition(&child, ctype)?),
            }
        }
        Ok(res)
    }

    fn child_default_addition(
        &self,
        child: &SchemaNode<'a>,
        ctype: ContentType,
    ) -> Result<Vec<(InstanceName, Value)>> {
        let mut res = Vec::new();
        let obj = self.value.as_object().unwrap();
        let iname = child.iname();
        if obj.members.contains_key(&iname) {
            return Ok(res);
        }
        if !child.content_type().intersects(ctype) {
            return Ok(res);
        }
        if let Some(when) = child.when() {
            let cnode = self.member_or_placeholder(&iname);
            if !when.evaluate(&cnode)?.boolean() {
                return Ok(res);
            }
        }
        let ts = self.context.new_timestamp();
        match child.kind() {
            SchemaNodeKind::Leaf => {
                if let Some(default) = child.default_value() {
                    res.push((iname, Value::Scalar(default)));
                }
            }
            SchemaNodeKind::LeafList => {
                let defaults = child.leaf_list_defaults();
                if !defaults.is_empty() {
                    res.push((
                        iname,
                        Value::array(
                            defaults.into_iter().map(Value::Scalar).collect(),
                            ts,
                        ),
                    ));
                }
            }
            SchemaNodeKind::Container if child.is_np_container() => {
                // materialize only if something ends up inside
                let placeholder = InstanceNode {
                    context: self.context,
                    snode: child.id(),
                    value: Value::object(IndexMap::new(), ts),
                    timestamp: ts,
                    link: Some(Arc::new(Link::Member {
                        name: iname.clone(),
                        siblings: obj.members.clone(),
                        parent: self.clone(),
                    })),
                };
                let inner = placeholder.default_additions(child, ctype)?;
                if !inner.is_empty() {
                    let filled = placeholder
                        .copy_with(
                            Value::object(
                                inner.into_iter().collect::<IndexMap<_, _>>(),
                                ts,
                            ),
                            Some(ts),
                        )
                        .add_defaults(ctype, false)?;
                    res.push((iname, filled.value.clone()));
                }
            }
            _ => {}
        }
        Ok(res)
    }

    // ===== raw and XML output =====

    /// Receiver's value in raw form, ready for JSON encoding.
    pub fn raw_value(&self, filter: &dyn OutputFilter) -> RawValue {
        let snode = self.schema();
        if matches!(
            snode.kind(),
            SchemaNodeKind::Anydata | SchemaNodeKind::Anyxml
        ) {
            return generic_to_raw(&self.value);
        }
        match &self.value {
            Value::Object(obj) => {
                let attrs = self.member_attributes();
                let mut out = RawMap::new();
                for name in obj.data_member_names() {
                    let member = match self.member(name) {
                        Ok(member) => member,
                        Err(_) => continue,
                    };
                    let empty = RawMap::new();
                    let m_attr = attrs.get(name).unwrap_or(&empty);
                    let include1 = filter.begin_member(self, &member, m_attr);
                    let value = if include1 {
                        Some(member.raw_value(filter))
                    } else {
                        None
                    };
                    let include2 = filter.end_member(self, &member, m_attr);
                    if let (true, Some(value)) = (include2, value) {
                        let is_dict = value.is_object();
                        out.insert(name.clone(), value);
                        if !m_attr.is_empty() {
                            if is_dict {
                                if let Some(RawValue::Object(inner)) = out.get_mut(name)
                                {
                                    inner.insert(
                                        "@".to_string(),
                                        RawValue::Object(m_attr.clone()),
                                    );
                                }
                            } else {
                                out.insert(
                                    format!("@{}", name),
                                    RawValue::Object(m_attr.clone()),
                                );
                            }
                        }
                    }
                }
                RawValue::Object(out)
            }
            Value::Array(_) => {
                let mut out = Vec::new();
                let entries = match self.entries() {
                    Ok(entries) => entries,
                    Err(_) => return RawValue::Array(out),
                };
                for en in entries {
                    let e_attr = en.entry_attributes();
                    let include1 = filter.begin_element(self, &en, &e_attr);
                    let value = if include1 {
                        Some(en.raw_value(filter))
                    } else {
                        None
                    };
                    let include2 = filter.end_element(self, &en, &e_attr);
                    if let (true, Some(mut value)) = (include2, value) {
                        // a fully filtered-out entry is dropped, not kept
                        // as an empty object
                        if value == RawValue::Object(RawMap::new())
                            && !en.member_names().is_empty()
                        {
                            continue;
                        }
                        if !e_attr.is_empty() {
                            if let RawValue::Object(inner) = &mut value {
                                inner.insert(
                                    "@".to_string(),
                                    RawValue::Object(e_attr.clone()),
                                );
                            }
                        }
                        out.push(value);
                    }
                }
                RawValue::Array(out)
            }
            Value::Scalar(scalar) => match snode.leaf_type() {
                Some(dtype) => dtype.to_raw(scalar),
                None => generic_to_raw(&self.value),
            },
        }
    }

    /// Metadata attached to the object's members: from `@name` sibling
    /// keys and from in-object `@` members of structured children.
    fn member_attributes(&self) -> IndexMap<InstanceName, RawMap<String, RawValue>> {
        let mut res = IndexMap::new();
        let obj = match self.value.as_object() {
            Some(obj) => obj,
            None => return res,
        };
        for (name, value) in &obj.members {
            if name == "@" {
                continue;
            }
            if let Some(target) = name.strip_prefix('@') {
                if let Some(map) = metadata_to_raw(value) {
                    res.insert(target.to_string(), map);
                }
            } else if let Value::Object(child) = value {
                if let Some(meta) = child.members.get("@") {
                    if let Some(map) = metadata_to_raw(meta) {
                        res.insert(name.clone(), map);
                    }
                }
            }
        }
        res
    }

    fn entry_attributes(&self) -> RawMap<String, RawValue> {
        if let Some(obj) = self.value.as_object() {
            if let Some(meta) = obj.members.get("@") {
                if let Some(map) = metadata_to_raw(meta) {
                    return map;
                }
            }
        }
        RawMap::new()
    }

    /// Serialize the receiver to an XML element tree following the
    /// YANG-to-XML encoding rules.
    pub fn to_xml(&self, filter: &dyn OutputFilter) -> Result<XmlElement> {
        if self.is_root() {
            let mut element = XmlElement {
                tag: "content-data".to_string(),
                local: "content-data".to_string(),
                ..Default::default()
            };
            element.ns_decls.push((
                String::new(),
                "urn:ietf:params:xml:ns:yang:ietf-yang-instance-data".to_string(),
            ));
            self.xml_members(&mut element, filter)?;
            Ok(element)
        } else {
            let mut element = XmlElement {
                tag: self.schema().name().unwrap_or_default().to_string(),
                local: self.schema().name().unwrap_or_default().to_string(),
                ..Default::default()
            };
            element
                .ns_decls
                .push((String::new(), self.module_xmlns(&self.schema())?));
            self.xml_content(&mut element, filter)?;
            Ok(element)
        }
    }

    /// XML document text of the receiver.
    pub fn to_xml_string(&self, filter: &dyn OutputFilter) -> Result<String> {
        Ok(self.to_xml(filter)?.to_xml_string())
    }

    fn module_xmlns(&self, snode: &SchemaNode<'a>) -> Result<String> {
        let ns = snode.namespace().unwrap_or_default();
        self.context
            .get_module_latest(ns)
            .and_then(|m| m.namespace().map(str::to_string))
            .ok_or_else(|| Error::InstanceValue {
                route: self.instance_route().to_string(),
                message: format!("no XML namespace for module {}", ns),
            })
    }

    fn xml_content(
        &self,
        element: &mut XmlElement,
        filter: &dyn OutputFilter,
    ) -> Result<()> {
        match &self.value {
            Value::Object(_) => self.xml_members(element, filter),
            Value::Scalar(scalar) => {
                if let ScalarValue::IdentityRef { ns, .. } = scalar {
                    if let Some(module) = self.context.get_module_latest(ns) {
                        if let Some(uri) = module.namespace() {
                            element.ns_decls.push((ns.clone(), uri.to_string()));
                        }
                    }
                }
                element.text = scalar.canonical_string();
                Ok(())
            }
            Value::Array(_) => Err(Error::InstanceValue {
                route: self.instance_route().to_string(),
                message: "array outside an object".to_string(),
            }),
        }
    }

    fn xml_members(
        &self,
        element: &mut XmlElement,
        filter: &dyn OutputFilter,
    ) -> Result<()> {
        let attrs = self.member_attributes();
        for name in self.member_names() {
            let member = self.member(&name)?;
            let empty = RawMap::new();
            let m_attr = attrs.get(&name).unwrap_or(&empty);
            if !filter.begin_member(self, &member, m_attr) {
                let _ = filter.end_member(self, &member, m_attr);
                continue;
            }
            let snode = member.schema();
            let parent_ns = snode.data_parent().and_then(|p| p.namespace());
            let needs_xmlns = self.is_root() || parent_ns != snode.namespace();
            if member.value.as_array().is_some() {
                for en in member.entries()? {
                    let e_attr = en.entry_attributes();
                    if !filter.begin_element(&member, &en, &e_attr) {
                        let _ = filter.end_element(&member, &en, &e_attr);
                        continue;
                    }
                    let mut child = XmlElement {
                        tag: snode.name().unwrap_or_default().to_string(),
                        local: snode.name().unwrap_or_default().to_string(),
                        ..Default::default()
                    };
                    if needs_xmlns {
                        child
                            .ns_decls
                            .push((String::new(), member.module_xmlns(&snode)?));
                    }
                    en.xml_content(&mut child, filter)?;
                    if filter.end_element(&member, &en, &e_attr) {
                        for (aname, avalue) in &e_attr {
                            child
                                .attributes
                                .push((aname.clone(), raw_scalar_string(avalue)));
                        }
                        element.children.push(child);
                    }
                }
            } else {
                let mut child = XmlElement {
                    tag: snode.name().unwrap_or_default().to_string(),
                    local: snode.name().unwrap_or_default().to_string(),
                    ..Default::default()
                };
                if needs_xmlns {
                    child
                        .ns_decls
                        .push((String::new(), member.module_xmlns(&snode)?));
                }
                member.xml_content(&mut child, filter)?;
                if filter.end_member(self, &member, m_attr) {
                    for (aname, avalue) in m_attr {
                        child
                            .attributes
                            .push((aname.clone(), raw_scalar_string(avalue)));
                    }
                    element.children.push(child);
                }
            }
        }
        Ok(())
    }

    // ===== validation =====

    /// Validate the receiver's value, reporting the first problem found.
    pub fn validate(&self, scope: ValidationScope, ctype: ContentType) -> Result<()> {
        match self.validate_all(scope, ctype).into_iter().next() {
            None => Ok(()),
            Some(err) => Err(err),
        }
    }

    /// Validate the receiver's value and report every problem found.
    /// Validation errors are collected, not fatal.
    pub fn validate_all(&self, scope: ValidationScope, ctype: ContentType) -> Vec<Error> {
        let mut errors = Vec::new();
        self.validate_into(scope, ctype, &mut errors);
        errors
    }

    fn validate_into(
        &self,
        scope: ValidationScope,
        ctype: ContentType,
        errors: &mut Vec<Error>,
    ) {
        trace!("validating {}", self.instance_route());
        let snode = self.schema();
        if scope.intersects(ValidationScope::SEMANTICS) && !self.is_root() {
            if let Some(when) = snode.when() {
                // the context node of a when expression is the node itself
                match when.evaluate(self) {
                    Ok(v) if !v.boolean() => errors.push(Error::SemanticViolation {
                        route: self.instance_route().to_string(),
                        tag: "when-violation".to_string(),
                        message: None,
                    }),
                    Ok(_) => {}
                    Err(e) => errors.push(e),
                }
            }
            for must in snode.musts() {
                match must.expression.evaluate(self) {
                    Ok(v) if !v.boolean() => errors.push(Error::SemanticViolation {
                        route: self.instance_route().to_string(),
                        tag: must.error_tag.clone(),
                        message: must.error_message.clone(),
                    }),
                    Ok(_) => {}
                    Err(e) => errors.push(e),
                }
            }
        }
        match &self.value {
            Value::Object(_) => self.validate_object(scope, ctype, errors),
            Value::Array(_) => self.validate_array(scope, ctype, errors),
            Value::Scalar(scalar) => self.validate_scalar(scalar, scope, errors),
        }
    }

    fn validate_object(
        &self,
        scope: ValidationScope,
        ctype: ContentType,
        errors: &mut Vec<Error>,
    ) {
        let snode = self.schema();
        if scope.intersects(ValidationScope::SYNTAX) {
            if let Some(pattern) = snode.pattern() {
                self.check_pattern(pattern, ctype, errors);
            }
        }
        for name in self.member_names() {
            match self.member(&name) {
                Ok(member) => member.validate_into(scope, ctype, errors),
                Err(err) => {
                    if scope.intersects(ValidationScope::SYNTAX) {
                        errors.push(err);
                    }
                }
            }
        }
    }

    /// Feed the observed member names through the derivative of the
    /// compiled pattern; the remaining pattern must be nullable.
    fn check_pattern(
        &self,
        pattern: &Arc<SchemaPattern>,
        ctype: ContentType,
        errors: &mut Vec<Error>,
    ) {
        let eval = PatternEval { parent: self };
        let mut current = pattern.clone();
        for name in self.member_names() {
            match current.deriv(&name, ctype, &eval) {
                Ok(next) => {
                    if matches!(*next, SchemaPattern::NotAllowed) {
                        errors.push(Error::SchemaViolation {
                            route: self.instance_route().to_string(),
                            tag: "member-not-allowed".to_string(),
                            message: Some(format!("member '{}'", name)),
                        });
                        return;
                    }
                    current = next;
                }
                Err(err) => {
                    errors.push(err);
                    return;
                }
            }
        }
        match current.nullable(ctype, &eval) {
            Ok(true) => {}
            Ok(false) => {
                let missing = current
                    .mandatory_members(ctype, &eval)
                    .ok()
                    .flatten()
                    .unwrap_or_default();
                errors.push(Error::SchemaViolation {
                    route: self.instance_route().to_string(),
                    tag: "missing-data".to_string(),
                    message: if missing.is_empty() {
                        None
                    } else {
                        Some(format!("expected '{}'", missing.join("', '")))
                    },
                });
            }
            Err(err) => errors.push(err),
        }
    }

    fn validate_array(
        &self,
        scope: ValidationScope,
        ctype: ContentType,
        errors: &mut Vec<Error>,
    ) {
        let snode = self.schema();
        let arr = self.value.as_array().unwrap();
        let count = arr.entries.len() as u64;
        if scope.intersects(ValidationScope::SEMANTICS) {
            if let Some(min) = snode.min_elements() {
                if count < min {
                    errors.push(Error::SemanticViolation {
                        route: self.instance_route().to_string(),
                        tag: "too-few-elements".to_string(),
                        message: None,
                    });
                }
            }
            if let Some(max) = snode.max_elements() {
                if count > max {
                    errors.push(Error::SemanticViolation {
                        route: self.instance_route().to_string(),
                        tag: "too-many-elements".to_string(),
                        message: None,
                    });
                }
            }
            match snode.kind() {
                SchemaNodeKind::List => self.check_list_uniqueness(errors),
                SchemaNodeKind::LeafList => {
                    let mut seen: Vec<&Value> = Vec::new();
                    for en in &arr.entries {
                        if seen.contains(&en) {
                            errors.push(Error::SemanticViolation {
                                route: self.instance_route().to_string(),
                                tag: "data-not-unique".to_string(),
                                message: Some("repeated leaf-list value".to_string()),
                            });
                            break;
                        }
                        seen.push(en);
                    }
                }
                _ => {}
            }
        }
        match self.entries() {
            Ok(entries) => {
                for en in entries {
                    match &en.value {
                        Value::Object(_) => en.validate_object(scope, ctype, errors),
                        Value::Scalar(scalar) => {
                            en.validate_scalar(scalar, scope, errors)
                        }
                        Value::Array(_) => errors.push(Error::InstanceValue {
                            route: en.instance_route().to_string(),
                            message: "nested array".to_string(),
                        }),
                    }
                    if scope.intersects(ValidationScope::SEMANTICS) {
                        for must in en.schema().musts() {
                            match must.expression.evaluate(&en) {
                                Ok(v) if !v.boolean() => {
                                    errors.push(Error::SemanticViolation {
                                        route: en.instance_route().to_string(),
                                        tag: must.error_tag.clone(),
                                        message: must.error_message.clone(),
                                    })
                                }
                                Ok(_) => {}
                                Err(e) => errors.push(e),
                            }
                        }
                    }
                }
            }
            Err(err) => errors.push(err),
        }
    }

    fn check_list_uniqueness(&self, errors: &mut Vec<Error>) {
        let snode = self.schema();
        let arr = self.value.as_array().unwrap();
        let keys: Vec<String> = snode
            .list_keys_qnames()
            .iter()
            .map(|(kname, kns)| {
                if snode.namespace() == Some(kns.as_str()) {
                    kname.clone()
                } else {
                    format!("{}:{}", kns, kname)
                }
            })
            .collect();
        if !keys.is_empty() {
            let mut seen: Vec<Vec<Option<String>>> = Vec::new();
            for en in &arr.entries {
                let tuple: Vec<Option<String>> = match en.as_object() {
                    Some(obj) => keys
                        .iter()
                        .map(|k| {
                            obj.members
                                .get(k)
                                .and_then(|v| v.as_scalar())
                                .map(|s| s.canonical_string())
                        })
                        .collect(),
                    None => continue,
                };
                if seen.contains(&tuple) {
                    errors.push(Error::SemanticViolation {
                        route: self.instance_route().to_string(),
                        tag: "data-not-unique".to_string(),
                        message: Some("repeated list keys".to_string()),
                    });
                    break;
                }
                seen.push(tuple);
            }
        }
        for group in snode.list_unique() {
            let mut seen: Vec<Vec<String>> = Vec::new();
            for en in &arr.entries {
                let obj = match en.as_object() {
                    Some(obj) => obj,
                    None => continue,
                };
                let mut tuple = Vec::new();
                let mut complete = true;
                for route in group {
                    let mut value: Option<&Value> = None;
                    let mut cur_obj = Some(obj);
                    let mut cur_snode = snode;
                    for (name, ns) in route {
                        let cn = match cur_snode.get_data_child(name, Some(ns.as_str())) {
                            Some(cn) => cn,
                            None => {
                                complete = false;
                                break;
                            }
                        };
                        value = cur_obj.and_then(|o| o.members.get(&cn.iname()));
                        cur_obj = value.and_then(|v| v.as_object());
                        cur_snode = cn;
                    }
                    match value.and_then(|v| v.as_scalar()) {
                        Some(scalar) => tuple.push(scalar.canonical_string()),
                        None => {
                            complete = false;
                        }
                    }
                    if !complete {
                        break;
                    }
                }
                if !complete {
                    continue;
                }
                if seen.contains(&tuple) {
                    errors.push(Error::SemanticViolation {
                        route: self.instance_route().to_string(),
                        tag: "data-not-unique".to_string(),
                        message: Some("unique constraint violated".to_string()),
                    });
                    break;
                }
                seen.push(tuple);
            }
        }
    }

    fn validate_scalar(
        &self,
        scalar: &ScalarValue,
        scope: ValidationScope,
        errors: &mut Vec<Error>,
    ) {
        let snode = self.schema();
        let dtype = match snode.leaf_type() {
            Some(dtype) => dtype,
            None => return,
        };
        if scope.intersects(ValidationScope::SYNTAX) {
            if let Err(violation) = dtype.check(scalar) {
                errors.push(Error::TypeViolation {
                    route: self.instance_route().to_string(),
                    message: violation
                        .error_message
                        .or(violation.error_tag)
                        .or_else(|| Some(scalar.canonical_string())),
                });
                return;
            }
            if let DataType::Identityref { bases } = dtype {
                if let Some(qn) = self.identityref_value() {
                    let derived = bases.iter().any(|base| {
                        self.context.schema_data.is_derived_from(&qn, base)
                    });
                    if !derived {
                        errors.push(Error::TypeViolation {
                            route: self.instance_route().to_string(),
                            message: Some(format!(
                                "identity {}:{} not derived from required base",
                                qn.1, qn.0
                            )),
                        });
                    }
                }
            }
        }
        if scope.intersects(ValidationScope::SEMANTICS) {
            match dtype {
                DataType::Leafref {
                    require_instance: true,
                    ..
                } => {
                    if self.deref_nodes().is_empty() {
                        errors.push(Error::SemanticViolation {
                            route: self.instance_route().to_string(),
                            tag: "instance-required".to_string(),
                            message: Some("leafref target does not exist".to_string()),
                        });
                    }
                }
                DataType::InstanceIdentifier {
                    require_instance: true,
                } => {
                    if let Some(ScalarValue::InstanceId(route)) = self.value.as_scalar()
                    {
                        if self.top().goto(route).is_err() {
                            errors.push(Error::SemanticViolation {
                                route: self.instance_route().to_string(),
                                tag: "instance-required".to_string(),
                                message: Some(
                                    "instance-identifier target does not exist"
                                        .to_string(),
                                ),
                            });
                        }
                    }
                }
                _ => {}
            }
        }
    }
}

// ===== raw cooking =====

/// Cook a raw JSON value against a schema node.
fn cook_node(
    snode: &SchemaNode<'_>,
    raw: &RawValue,
    ts: u64,
    path: &str,
) -> Result<Value> {
    match snode.kind() {
        SchemaNodeKind::SchemaRoot
        | SchemaNodeKind::Container
        | SchemaNodeKind::Input
        | SchemaNodeKind::Output
        | SchemaNodeKind::RpcAction
        | SchemaNodeKind::Notification => match raw {
            RawValue::Object(map) => {
                let members = cook_members(snode, map, ts, path)?;
                Ok(Value::object(members, ts))
            }
            _ => Err(Error::RawType {
                path: path.to_string(),
                expected: "object".to_string(),
            }),
        },
        SchemaNodeKind::List => match raw {
            RawValue::Array(entries) => {
                let mut cooked = Vec::new();
                for (i, en) in entries.iter().enumerate() {
                    let epath = format!("{}/{}", path, i);
                    match en {
                        RawValue::Object(map) => {
                            let members = cook_members(snode, map, ts, &epath)?;
                            cooked.push(Value::object(members, ts));
                        }
                        _ => {
                            return Err(Error::RawType {
                                path: epath,
                                expected: "object".to_string(),
                            })
                        }
                    }
                }
                Ok(Value::array(cooked, ts))
            }
            _ => Err(Error::RawType {
                path: path.to_string(),
                expected: "array".to_string(),
            }),
        },
        SchemaNodeKind::LeafList => match raw {
            RawValue::Array(entries) => {
                let dtype = snode.leaf_type().expect("leaf-list has a type");
                let ns = snode.namespace().unwrap_or_default();
                let mut cooked = Vec::new();
                for (i, en) in entries.iter().enumerate() {
                    let scalar = dtype.parse_raw(en, ns).ok_or_else(|| Error::RawType {
                        path: format!("{}/{}", path, i),
                        expected: dtype.expected_shape().to_string(),
                    })?;
                    cooked.push(Value::Scalar(scalar));
                }
                Ok(Value::array(cooked, ts))
            }
            _ => Err(Error::RawType {
                path: path.to_string(),
                expected: "array".to_string(),
            }),
        },
        SchemaNodeKind::Leaf => {
            let dtype = snode.leaf_type().expect("leaf has a type");
            let ns = snode.namespace().unwrap_or_default();
            let scalar = dtype.parse_raw(raw, ns).ok_or_else(|| Error::RawType {
                path: path.to_string(),
                expected: dtype.expected_shape().to_string(),
            })?;
            Ok(Value::Scalar(scalar))
        }
        SchemaNodeKind::Anydata | SchemaNodeKind::Anyxml => Ok(cook_generic(raw, ts)),
        SchemaNodeKind::Choice | SchemaNodeKind::Case => Err(Error::RawType {
            path: path.to_string(),
            expected: "data node".to_string(),
        }),
    }
}

/// Cook one entry of a list or leaf-list.
fn cook_entry(
    snode: &SchemaNode<'_>,
    raw: &RawValue,
    ts: u64,
    path: &str,
) -> Result<Value> {
    match snode.kind() {
        SchemaNodeKind::List => match raw {
            RawValue::Object(map) => {
                Ok(Value::object(cook_members(snode, map, ts, path)?, ts))
            }
            _ => Err(Error::RawType {
                path: path.to_string(),
                expected: "object".to_string(),
            }),
        },
        SchemaNodeKind::LeafList => {
            let dtype = snode.leaf_type().expect("leaf-list has a type");
            let ns = snode.namespace().unwrap_or_default();
            let scalar = dtype.parse_raw(raw, ns).ok_or_else(|| Error::RawType {
                path: path.to_string(),
                expected: dtype.expected_shape().to_string(),
            })?;
            Ok(Value::Scalar(scalar))
        }
        _ => cook_node(snode, raw, ts, path),
    }
}

fn cook_members(
    snode: &SchemaNode<'_>,
    map: &RawMap<String, RawValue>,
    ts: u64,
    path: &str,
) -> Result<IndexMap<InstanceName, Value>> {
    let mut members = IndexMap::new();
    for (key, rawv) in map {
        if key == "@" || key.starts_with('@') {
            continue; // metadata handled below, after data members
        }
        let (local, ns) = match key.split_once(':') {
            Some((ns, local)) => (local, Some(ns)),
            None => (key.as_str(), None),
        };
        let child = snode.get_data_child(local, ns).ok_or_else(|| Error::RawMember {
            path: path.to_string(),
            member: key.clone(),
        })?;
        let iname = child.iname();
        let cpath = format!("{}/{}", path, key);
        members.insert(iname, cook_node(&child, rawv, ts, &cpath)?);
    }
    for (key, rawv) in map {
        if key == "@" {
            members.insert(key.clone(), cook_metadata(rawv, ts, path, key)?);
        } else if let Some(target) = key.strip_prefix('@') {
            if !members.contains_key(target) && !map.contains_key(target) {
                return Err(Error::MissingAnnotationTarget {
                    path: path.to_string(),
                    name: target.to_string(),
                });
            }
            members.insert(key.clone(), cook_metadata(rawv, ts, path, key)?);
        }
    }
    Ok(members)
}

/// Cook a metadata object (RFC 7952): annotation names must be qualified,
/// values must be scalars.
fn cook_metadata(raw: &RawValue, ts: u64, path: &str, key: &str) -> Result<Value> {
    let map = match raw {
        RawValue::Object(map) => map,
        _ => {
            return Err(Error::AnnotationType {
                path: path.to_string(),
                name: key.to_string(),
                message: "is not an object".to_string(),
            })
        }
    };
    let mut members = IndexMap::new();
    for (aname, avalue) in map {
        if !aname.contains(':') {
            return Err(Error::UndefinedAnnotation {
                path: path.to_string(),
                name: aname.clone(),
            });
        }
        let scalar = match avalue {
            RawValue::Bool(b) => ScalarValue::Bool(*b),
            RawValue::String(s) => ScalarValue::String(s.clone()),
            RawValue::Number(n) => match n.as_i64() {
                Some(i) => ScalarValue::Int64(i),
                None => ScalarValue::String(n.to_string()),
            },
            RawValue::Null => ScalarValue::Empty,
            _ => {
                return Err(Error::AnnotationType {
                    path: path.to_string(),
                    name: aname.clone(),
                    message: "is not a scalar".to_string(),
                })
            }
        };
        members.insert(aname.clone(), Value::Scalar(scalar));
    }
    Ok(Value::object(members, ts))
}

fn cook_metadata_object(map: &RawMap<String, RawValue>, ts: u64) -> Value {
    cook_metadata(&RawValue::Object(map.clone()), ts, "", "@")
        .unwrap_or_else(|_| Value::object(IndexMap::new(), ts))
}

/// Schema-free cooking for anydata content.
fn cook_generic(raw: &RawValue, ts: u64) -> Value {
    match raw {
        RawValue::Object(map) => {
            let members = map
                .iter()
                .map(|(k, v)| (k.clone(), cook_generic(v, ts)))
                .collect();
            Value::object(members, ts)
        }
        RawValue::Array(entries) => Value::array(
            entries.iter().map(|v| cook_generic(v, ts)).collect(),
            ts,
        ),
        RawValue::Bool(b) => Value::Scalar(ScalarValue::Bool(*b)),
        RawValue::String(s) => Value::Scalar(ScalarValue::String(s.clone())),
        RawValue::Number(n) => match n.as_i64() {
            Some(i) => Value::Scalar(ScalarValue::Int64(i)),
            None => Value::Scalar(ScalarValue::String(n.to_string())),
        },
        RawValue::Null => Value::Scalar(ScalarValue::Empty),
    }
}

fn generic_to_raw(value: &Value) -> RawValue {
    match value {
        Value::Object(obj) => RawValue::Object(
            obj.members
                .iter()
                .map(|(k, v)| (k.clone(), generic_to_raw(v)))
                .collect(),
        ),
        Value::Array(arr) => {
            RawValue::Array(arr.entries.iter().map(generic_to_raw).collect())
        }
        Value::Scalar(ScalarValue::Bool(b)) => RawValue::Bool(*b),
        Value::Scalar(ScalarValue::Int64(i)) => RawValue::from(*i),
        Value::Scalar(ScalarValue::Empty) => RawValue::Null,
        Value::Scalar(s) => RawValue::from(s.canonical_string()),
    }
}

fn metadata_to_raw(value: &Value) -> Option<RawMap<String, RawValue>> {
    match generic_to_raw(value) {
        RawValue::Object(map) => Some(map),
        _ => None,
    }
}

fn raw_scalar_string(value: &RawValue) -> String {
    match value {
        RawValue::String(s) => s.clone(),
        other => other.to_string(),
    }
}

// ===== XML cooking =====

/// Cook the child elements of an XML element against an internal schema
/// node, grouping list and leaf-list entries into arrays.
fn cook_element_children(
    snode: &SchemaNode<'_>,
    elements: &[XmlElement],
    ts: u64,
) -> Result<IndexMap<InstanceName, Value>> {
    let mut members: IndexMap<InstanceName, Value> = IndexMap::new();
    let context = snode.context();
    for element in elements {
        // resolve the element's namespace URI to a module name
        let ns = match &element.namespace {
            Some(uri) => context
                .modules()
                .find(|m| m.namespace() == Some(uri.as_str()))
                .map(|m| m.name().to_string()),
            None => None,
        };
        let child = snode
            .get_data_child(&element.local, ns.as_deref())
            .ok_or_else(|| Error::RawMember {
                path: "/".to_string(),
                member: element.local.clone(),
            })?;
        let iname = child.iname();
        let value = cook_element(&child, element, ts)?;
        match child.kind() {
            SchemaNodeKind::List | SchemaNodeKind::LeafList => {
                let mut entries = match members.get(&iname) {
                    Some(Value::Array(arr)) => arr.entries.clone(),
                    _ => Vec::new(),
                };
                entries.push(value);
                members.insert(iname, Value::array(entries, ts));
            }
            _ => {
                members.insert(iname, value);
            }
        }
    }
    Ok(members)
}

/// Cook one XML element; for lists and leaf-lists this is a single entry.
fn cook_element(snode: &SchemaNode<'_>, element: &XmlElement, ts: u64) -> Result<Value> {
    match snode.kind() {
        SchemaNodeKind::Container
        | SchemaNodeKind::List
        | SchemaNodeKind::Input
        | SchemaNodeKind::Output
        | SchemaNodeKind::RpcAction
        | SchemaNodeKind::Notification => Ok(Value::object(
            cook_element_children(snode, &element.children, ts)?,
            ts,
        )),
        SchemaNodeKind::Leaf | SchemaNodeKind::LeafList => {
            let dtype = snode.leaf_type().expect("terminal node has a type");
            let ns = snode.namespace().unwrap_or_default();
            let scalar = dtype
                .parse_canonical(&element.text, ns)
                .ok_or_else(|| Error::RawType {
                    path: format!("/{}", element.local),
                    expected: dtype.expected_shape().to_string(),
                })?;
            Ok(Value::Scalar(scalar))
        }
        SchemaNodeKind::Anydata | SchemaNodeKind::Anyxml => {
            if element.children.is_empty() {
                Ok(Value::Scalar(ScalarValue::String(element.text.clone())))
            } else {
                let mut members = IndexMap::new();
                for child in &element.children {
                    members.insert(
                        child.local.clone(),
                        cook_element_any(child, ts),
                    );
                }
                Ok(Value::object(members, ts))
            }
        }
        _ => Err(Error::RawType {
            path: format!("/{}", element.local),
            expected: "data node".to_string(),
        }),
    }
}

fn cook_element_any(element: &XmlElement, ts: u64) -> Value {
    if element.children.is_empty() {
        Value::Scalar(ScalarValue::String(element.text.clone()))
    } else {
        let members = element
            .children
            .iter()
            .map(|c| (c.local.clone(), cook_element_any(c, ts)))
            .collect();
        Value::object(members, ts)
    }
}
