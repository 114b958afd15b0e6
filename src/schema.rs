//
// Copyright (c) The yangtree Core Contributors
//
// SPDX-License-Identifier: MIT
//

//! YANG schema tree.
//!
//! Schema nodes live in an arena owned by the [`Context`](crate::context::Context);
//! [`SchemaNode`] is a cheap lifetime-bound handle over it. The tree is
//! assembled per implemented module in import-topological order: groupings
//! are expanded in place (`uses` + `refine`), top-level augments are grafted
//! after all base trees exist, deviations are applied last, and finally
//! leafref target types are resolved and the child-membership patterns are
//! compiled.

use std::sync::Arc;

use log::debug;

use crate::context::{Context, QualName, SchemaContext, SchemaData};
use crate::data::ContentType;
use crate::error::{Error, Result};
use crate::iter::{Ancestors, NodeIterable, Siblings, Traverse};
use crate::pattern::SchemaPattern;
use crate::statement::Statement;
use crate::types::{build_type, DataType, Must, ScalarValue};
use crate::xpath::{Expr, XPathParser};

pub(crate) type NodeId = usize;

/// Arena storage of the compiled schema tree.
#[derive(Debug)]
pub(crate) struct SchemaTree {
    pub(crate) nodes: Vec<SchemaNodeData>,
    pub(crate) root: NodeId,
}

#[derive(Debug)]
pub(crate) struct SchemaNodeData {
    pub(crate) name: Option<String>,
    /// Namespace: name of the main module in whose text the node appears.
    pub(crate) ns: Option<String>,
    pub(crate) parent: Option<NodeId>,
    pub(crate) description: Option<String>,
    pub(crate) reference: Option<String>,
    pub(crate) when: Option<Arc<Expr>>,
    pub(crate) musts: Vec<Must>,
    pub(crate) config: bool,
    pub(crate) mandatory: bool,
    pub(crate) kind: SchemaKind,
}

#[derive(Debug)]
pub(crate) enum SchemaKind {
    Internal(InternalData),
    Leaf(LeafData),
    LeafList(LeafListData),
    Anydata,
    Anyxml,
}

#[derive(Debug)]
pub(crate) struct InternalData {
    pub(crate) category: InternalCategory,
    pub(crate) children: Vec<NodeId>,
    /// Compiled member grammar; filled in the final build phase.
    pub(crate) pattern: Option<Arc<SchemaPattern>>,
}

#[derive(Debug)]
pub(crate) enum InternalCategory {
    SchemaRoot,
    Container { presence: bool },
    List(ListData),
    Choice { default_case: Option<QualName> },
    Case,
    Input,
    Output,
    RpcAction,
    Notification,
}

#[derive(Debug, Default)]
pub(crate) struct ListData {
    pub(crate) keys: Vec<QualName>,
    /// One entry per `unique` statement: the descendant leaf routes that
    /// must be jointly unique among entries.
    pub(crate) unique: Vec<Vec<Vec<QualName>>>,
    pub(crate) min_elements: u64,
    pub(crate) max_elements: Option<u64>,
    pub(crate) user_ordered: bool,
}

#[derive(Debug)]
pub(crate) struct LeafData {
    pub(crate) dtype: DataType,
    pub(crate) default: Option<String>,
    pub(crate) units: Option<String>,
    pub(crate) is_key: bool,
}

#[derive(Debug)]
pub(crate) struct LeafListData {
    pub(crate) dtype: DataType,
    pub(crate) defaults: Vec<String>,
    pub(crate) units: Option<String>,
    pub(crate) min_elements: u64,
    pub(crate) max_elements: Option<u64>,
    pub(crate) user_ordered: bool,
}

/// YANG schema node kind.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SchemaNodeKind {
    SchemaRoot,
    Container,
    List,
    Choice,
    Case,
    Input,
    Output,
    RpcAction,
    Notification,
    Leaf,
    LeafList,
    Anydata,
    Anyxml,
}

/// Generic YANG schema node handle.
#[derive(Clone, Copy, Debug)]
pub struct SchemaNode<'a> {
    context: &'a Context,
    id: NodeId,
}

impl PartialEq for SchemaNode<'_> {
    fn eq(&self, other: &SchemaNode<'_>) -> bool {
        self.id == other.id && std::ptr::eq(self.context, other.context)
    }
}

impl<'a> SchemaNode<'a> {
    pub(crate) fn new(context: &'a Context, id: NodeId) -> SchemaNode<'a> {
        SchemaNode { context, id }
    }

    pub(crate) fn id(&self) -> NodeId {
        self.id
    }

    pub(crate) fn context(&self) -> &'a Context {
        self.context
    }

    fn data(&self) -> &'a SchemaNodeData {
        &self.context.schema.nodes[self.id]
    }

    /// Local name; the synthetic schema root has none.
    pub fn name(&self) -> Option<&'a str> {
        self.data().name.as_deref()
    }

    /// Namespace: name of the main module defining the node.
    pub fn namespace(&self) -> Option<&'a str> {
        self.data().ns.as_deref()
    }

    /// Returns the kind of the schema node.
    pub fn kind(&self) -> SchemaNodeKind {
        match &self.data().kind {
            SchemaKind::Internal(int) => match int.category {
                InternalCategory::SchemaRoot => SchemaNodeKind::SchemaRoot,
                InternalCategory::Container { .. } => SchemaNodeKind::Container,
                InternalCategory::List(_) => SchemaNodeKind::List,
                InternalCategory::Choice { .. } => SchemaNodeKind::Choice,
                InternalCategory::Case => SchemaNodeKind::Case,
                InternalCategory::Input => SchemaNodeKind::Input,
                InternalCategory::Output => SchemaNodeKind::Output,
                InternalCategory::RpcAction => SchemaNodeKind::RpcAction,
                InternalCategory::Notification => SchemaNodeKind::Notification,
            },
            SchemaKind::Leaf(_) => SchemaNodeKind::Leaf,
            SchemaKind::LeafList(_) => SchemaNodeKind::LeafList,
            SchemaKind::Anydata => SchemaNodeKind::Anydata,
            SchemaKind::Anyxml => SchemaNodeKind::Anyxml,
        }
    }

    /// Description statement.
    pub fn description(&self) -> Option<&'a str> {
        self.data().description.as_deref()
    }

    /// Reference statement.
    pub fn reference(&self) -> Option<&'a str> {
        self.data().reference.as_deref()
    }

    /// Returns whether the node represents configuration.
    pub fn config(&self) -> bool {
        self.data().config
    }

    /// Returns whether the node is mandatory (the declared flag; for the
    /// effective notion that includes min-elements and non-presence
    /// containers see [`SchemaNode::is_mandatory_effective`]).
    pub fn mandatory(&self) -> bool {
        self.data().mandatory
    }

    /// Content type of instances of this node.
    pub fn content_type(&self) -> ContentType {
        if self.config() {
            ContentType::CONFIG
        } else {
            ContentType::NONCONFIG
        }
    }

    pub(crate) fn when(&self) -> Option<&'a Arc<Expr>> {
        self.data().when.as_ref()
    }

    pub(crate) fn musts(&self) -> &'a [Must] {
        &self.data().musts
    }

    /// Returns whether the node can carry instance data.
    pub fn is_data_node(&self) -> bool {
        matches!(
            self.kind(),
            SchemaNodeKind::Container
                | SchemaNodeKind::List
                | SchemaNodeKind::Leaf
                | SchemaNodeKind::LeafList
                | SchemaNodeKind::Anydata
                | SchemaNodeKind::Anyxml
        )
    }

    /// Returns whether the node may have children.
    pub fn is_internal(&self) -> bool {
        matches!(self.data().kind, SchemaKind::Internal(_))
    }

    fn internal(&self) -> Option<&'a InternalData> {
        match &self.data().kind {
            SchemaKind::Internal(int) => Some(int),
            _ => None,
        }
    }

    fn list_data(&self) -> Option<&'a ListData> {
        match self.internal()?.category {
            InternalCategory::List(ref list) => Some(list),
            _ => None,
        }
    }

    /// Returns whether the node is a non-presence container.
    pub fn is_np_container(&self) -> bool {
        matches!(
            self.internal().map(|int| &int.category),
            Some(InternalCategory::Container { presence: false })
        )
    }

    /// Returns whether the node is a user-ordered list or leaf-list.
    pub fn is_user_ordered(&self) -> bool {
        match &self.data().kind {
            SchemaKind::Internal(int) => match &int.category {
                InternalCategory::List(list) => list.user_ordered,
                _ => false,
            },
            SchemaKind::LeafList(ll) => ll.user_ordered,
            _ => false,
        }
    }

    /// Returns whether the node is a list key leaf.
    pub fn is_list_key(&self) -> bool {
        matches!(&self.data().kind, SchemaKind::Leaf(leaf) if leaf.is_key)
    }

    /// The min-elements constraint of a list or leaf-list.
    pub fn min_elements(&self) -> Option<u64> {
        let min = match &self.data().kind {
            SchemaKind::Internal(int) => match &int.category {
                InternalCategory::List(list) => list.min_elements,
                _ => return None,
            },
            SchemaKind::LeafList(ll) => ll.min_elements,
            _ => return None,
        };
        if min != 0 {
            Some(min)
        } else {
            None
        }
    }

    /// The max-elements constraint of a list or leaf-list.
    pub fn max_elements(&self) -> Option<u64> {
        match &self.data().kind {
            SchemaKind::Internal(int) => match &int.category {
                InternalCategory::List(list) => list.max_elements,
                _ => None,
            },
            SchemaKind::LeafList(ll) => ll.max_elements,
            _ => None,
        }
    }

    /// Qualified names of the list's keys.
    pub fn list_keys_qnames(&self) -> &'a [QualName] {
        match self.list_data() {
            Some(list) => &list.keys,
            None => &[],
        }
    }

    pub(crate) fn list_unique(&self) -> &'a [Vec<Vec<QualName>>] {
        match self.list_data() {
            Some(list) => &list.unique,
            None => &[],
        }
    }

    /// Iterator over the list's key leaves.
    pub fn list_keys(&self) -> impl Iterator<Item = SchemaNode<'a>> + 'a {
        self.children().filter(|snode| snode.is_list_key())
    }

    /// The default case of a choice.
    pub fn default_case(&self) -> Option<&'a QualName> {
        match self.internal().map(|int| &int.category) {
            Some(InternalCategory::Choice { default_case }) => default_case.as_ref(),
            _ => None,
        }
    }

    /// Type of a leaf or leaf-list node.
    pub fn leaf_type(&self) -> Option<&'a DataType> {
        match &self.data().kind {
            SchemaKind::Leaf(leaf) => Some(&leaf.dtype),
            SchemaKind::LeafList(ll) => Some(&ll.dtype),
            _ => None,
        }
    }

    /// Units of a leaf or leaf-list.
    pub fn units(&self) -> Option<&'a str> {
        match &self.data().kind {
            SchemaKind::Leaf(leaf) => leaf.units.as_deref(),
            SchemaKind::LeafList(ll) => ll.units.as_deref(),
            _ => None,
        }
    }

    /// The default value of a leaf (canonical string representation).
    pub fn default_value_canonical(&self) -> Option<&'a str> {
        match &self.data().kind {
            SchemaKind::Leaf(leaf) => leaf.default.as_deref(),
            _ => None,
        }
    }

    /// The default value of a leaf (cooked representation).
    pub fn default_value(&self) -> Option<ScalarValue> {
        match &self.data().kind {
            SchemaKind::Leaf(leaf) => {
                let text = leaf.default.as_deref()?;
                leaf.dtype
                    .parse_canonical(text, self.namespace().unwrap_or_default())
            }
            _ => None,
        }
    }

    /// Default entries of a leaf-list (cooked representation).
    pub fn leaf_list_defaults(&self) -> Vec<ScalarValue> {
        match &self.data().kind {
            SchemaKind::LeafList(ll) => ll
                .defaults
                .iter()
                .filter_map(|text| {
                    ll.dtype
                        .parse_canonical(text, self.namespace().unwrap_or_default())
                })
                .collect(),
            _ => Vec::new(),
        }
    }

    pub(crate) fn pattern(&self) -> Option<&'a Arc<SchemaPattern>> {
        self.internal()?.pattern.as_ref()
    }

    /// Effective mandatory status: a declared mandatory flag, a non-zero
    /// min-elements, or a non-presence container with a mandatory child.
    pub fn is_mandatory_effective(&self) -> bool {
        match self.kind() {
            SchemaNodeKind::Leaf
            | SchemaNodeKind::Choice
            | SchemaNodeKind::Anydata
            | SchemaNodeKind::Anyxml => self.mandatory(),
            SchemaNodeKind::List | SchemaNodeKind::LeafList => {
                self.min_elements().is_some()
            }
            SchemaNodeKind::Container => {
                self.is_np_container()
                    && self
                        .data_children()
                        .iter()
                        .any(|c| c.is_mandatory_effective())
            }
            _ => false,
        }
    }

    // ===== tree navigation =====

    /// Returns an iterator over all child schema nodes (including actions
    /// and notifications).
    pub fn children(&self) -> Siblings<'a, SchemaNode<'a>> {
        Siblings::new(self.first_child())
    }

    /// Returns an iterator over the ancestor schema nodes.
    pub fn ancestors(&self) -> Ancestors<'a, SchemaNode<'a>> {
        Ancestors::new(self.parent())
    }

    /// Returns an iterator over this node and its ancestors.
    pub fn inclusive_ancestors(&self) -> Ancestors<'a, SchemaNode<'a>> {
        Ancestors::new(Some(*self))
    }

    /// Returns an iterator over the following sibling schema nodes.
    pub fn siblings(&self) -> Siblings<'a, SchemaNode<'a>> {
        Siblings::new(self.next_sibling())
    }

    /// Returns an iterator over all nodes of the subtree (depth-first).
    pub fn traverse(&self) -> Traverse<'a, SchemaNode<'a>> {
        Traverse::new(*self)
    }

    /// Direct data children, descending through choice and case nodes.
    pub fn data_children(&self) -> Vec<SchemaNode<'a>> {
        let mut res = Vec::new();
        for child in self.children() {
            match child.kind() {
                SchemaNodeKind::Choice | SchemaNodeKind::Case => {
                    res.extend(child.data_children())
                }
                SchemaNodeKind::RpcAction | SchemaNodeKind::Notification => {}
                _ => res.push(child),
            }
        }
        res
    }

    /// Direct child of any kind with the given qualified name.
    pub fn get_child(&self, name: &str, ns: Option<&str>) -> Option<SchemaNode<'a>> {
        let ns = ns.or_else(|| self.namespace());
        self.children()
            .find(|c| c.name() == Some(name) && c.namespace() == ns)
    }

    /// Data child with the given qualified name, descending through choice
    /// and case nodes. An absent namespace defaults to the receiver's.
    pub fn get_data_child(&self, name: &str, ns: Option<&str>) -> Option<SchemaNode<'a>> {
        let ns = ns.or_else(|| self.namespace())?;
        self.data_children()
            .into_iter()
            .find(|c| c.name() == Some(name) && c.namespace() == Some(ns))
    }

    /// Descend along a route of qualified names through children of any
    /// kind.
    pub(crate) fn get_schema_descendant(
        &self,
        route: &[QualName],
    ) -> Option<SchemaNode<'a>> {
        let mut node = *self;
        for (name, ns) in route {
            node = node.get_child(name, Some(ns.as_str()))?;
        }
        Some(node)
    }

    /// Nearest ancestor that is a data node (or the schema root).
    pub fn data_parent(&self) -> Option<SchemaNode<'a>> {
        let mut parent = self.parent();
        while let Some(p) = parent {
            if p.is_data_node() || p.kind() == SchemaNodeKind::SchemaRoot {
                return Some(p);
            }
            parent = p.parent();
        }
        None
    }

    /// Instance name of the node: `"local"` when the namespace equals the
    /// data parent's, `"namespace:local"` otherwise (and always at top
    /// level).
    pub fn iname(&self) -> String {
        let name = self.name().unwrap_or("/");
        match self.data_parent().and_then(|p| p.namespace()) {
            Some(pns) if Some(pns) == self.namespace() => name.to_string(),
            _ => match self.namespace() {
                Some(ns) => format!("{}:{}", ns, name),
                None => name.to_string(),
            },
        }
    }

    /// Data path of the node (`/module:name/name` form; choice and case
    /// nodes do not contribute).
    pub fn data_path(&self) -> String {
        let mut segments = Vec::new();
        let mut node = Some(*self);
        while let Some(n) = node {
            if n.kind() == SchemaNodeKind::SchemaRoot {
                break;
            }
            if !matches!(n.kind(), SchemaNodeKind::Choice | SchemaNodeKind::Case) {
                segments.push(n.iname());
            }
            node = n.parent();
        }
        if segments.is_empty() {
            return "/".to_string();
        }
        segments.reverse();
        format!("/{}", segments.join("/"))
    }
}

impl<'a> NodeIterable<'a> for SchemaNode<'a> {
    fn parent(&self) -> Option<SchemaNode<'a>> {
        self.data()
            .parent
            .map(|id| SchemaNode::new(self.context, id))
    }

    fn next_sibling(&self) -> Option<SchemaNode<'a>> {
        let parent = self.data().parent?;
        let siblings = match &self.context.schema.nodes[parent].kind {
            SchemaKind::Internal(int) => &int.children,
            _ => return None,
        };
        let pos = siblings.iter().position(|id| *id == self.id)?;
        siblings
            .get(pos + 1)
            .map(|id| SchemaNode::new(self.context, *id))
    }

    fn first_child(&self) -> Option<SchemaNode<'a>> {
        self.internal()?
            .children
            .first()
            .map(|id| SchemaNode::new(self.context, *id))
    }
}

// ===== schema tree assembly =====

impl SchemaTree {
    /// Compile the schema tree from resolved library data.
    pub(crate) fn build(sdata: &SchemaData) -> Result<SchemaTree> {
        let mut builder = Builder {
            nodes: vec![SchemaNodeData {
                name: None,
                ns: None,
                parent: None,
                description: None,
                reference: None,
                when: None,
                musts: Vec::new(),
                config: true,
                mandatory: false,
                kind: SchemaKind::Internal(InternalData {
                    category: InternalCategory::SchemaRoot,
                    children: Vec::new(),
                    pattern: None,
                }),
            }],
            sdata,
        };
        // base trees, per implemented module in topological order
        for mid in &sdata.module_sequence {
            let mdata = &sdata.modules[mid];
            let sctx = SchemaContext {
                default_ns: mdata.main_module.name.clone(),
                text_mid: mid.clone(),
            };
            debug!("building schema from module {}", mid);
            builder.handle_substatements(0, mdata.statement.root(), &sctx)?;
        }
        // top-level augments
        for mid in &sdata.module_sequence {
            let mdata = &sdata.modules[mid];
            let sctx = SchemaContext {
                default_ns: mdata.main_module.name.clone(),
                text_mid: mid.clone(),
            };
            for aug in mdata.statement.root().find_all("augment") {
                builder.apply_augment(&aug, &sctx)?;
            }
        }
        // deviations last
        for mid in &sdata.module_sequence {
            let mdata = &sdata.modules[mid];
            let sctx = SchemaContext {
                default_ns: mdata.main_module.name.clone(),
                text_mid: mid.clone(),
            };
            for dev in mdata.statement.root().find_all("deviation") {
                builder.apply_deviation(&dev, &sctx)?;
            }
        }
        builder.resolve_leafrefs()?;
        let mut tree = SchemaTree {
            nodes: builder.nodes,
            root: 0,
        };
        tree.compile_patterns(0);
        Ok(tree)
    }

    fn child_ids(&self, id: NodeId) -> Vec<NodeId> {
        match &self.nodes[id].kind {
            SchemaKind::Internal(int) => int.children.clone(),
            _ => Vec::new(),
        }
    }

    /// ASCII-art rendition of the data tree.
    pub(crate) fn ascii_tree(&self, context: &Context) -> String {
        let mut out = String::new();
        let root = SchemaNode::new(context, self.root);
        let children = root.data_children();
        for (i, child) in children.iter().enumerate() {
            self.ascii_node(child, "", i + 1 == children.len(), &mut out);
        }
        out
    }

    fn ascii_node(&self, node: &SchemaNode<'_>, prefix: &str, last: bool, out: &mut String) {
        let flags = if node.config() { "rw" } else { "ro" };
        let mark = match node.kind() {
            SchemaNodeKind::List | SchemaNodeKind::LeafList => "*",
            SchemaNodeKind::Leaf | SchemaNodeKind::Anydata | SchemaNodeKind::Anyxml => {
                if node.is_mandatory_effective() || node.is_list_key() {
                    ""
                } else {
                    "?"
                }
            }
            _ => "",
        };
        out.push_str(prefix);
        out.push_str("+--");
        out.push_str(flags);
        out.push(' ');
        out.push_str(&node.iname());
        out.push_str(mark);
        out.push('\n');
        let children = node.data_children();
        let child_prefix = format!("{}{}  ", prefix, if last { " " } else { "|" });
        for (i, child) in children.iter().enumerate() {
            self.ascii_node(child, &child_prefix, i + 1 == children.len(), out);
        }
    }
}

struct Builder<'a> {
    nodes: Vec<SchemaNodeData>,
    sdata: &'a SchemaData,
}

const DATA_KEYWORDS: &[&str] = &[
    "container",
    "list",
    "leaf",
    "leaf-list",
    "choice",
    "case",
    "anydata",
    "anyxml",
    "rpc",
    "action",
    "notification",
    "uses",
];

impl<'a> Builder<'a> {
    fn new_node(
        &mut self,
        parent: NodeId,
        name: Option<String>,
        ns: Option<String>,
        config: bool,
        kind: SchemaKind,
    ) -> NodeId {
        let id = self.nodes.len();
        self.nodes.push(SchemaNodeData {
            name,
            ns,
            parent: Some(parent),
            description: None,
            reference: None,
            when: None,
            musts: Vec::new(),
            config,
            mandatory: false,
            kind,
        });
        if let SchemaKind::Internal(int) = &mut self.nodes[parent].kind {
            int.children.push(id);
        }
        id
    }

    fn node_config(&self, parent: NodeId, stmt: &Statement<'_>) -> bool {
        if !self.nodes[parent].config {
            return false;
        }
        match stmt.find1("config").and_then(|c| c.argument()) {
            Some("false") => false,
            _ => true,
        }
    }

    /// Attach common substatements (when, must, description, reference,
    /// mandatory) to a freshly created node.
    fn handle_common(
        &mut self,
        id: NodeId,
        stmt: &Statement<'a>,
        sctx: &SchemaContext,
    ) -> Result<()> {
        if let Some(when) = stmt.find1("when") {
            let expr =
                XPathParser::new(when.argument_required()?, self.sdata, sctx).parse()?;
            self.nodes[id].when = Some(Arc::new(expr));
        }
        for must in stmt.find_all("must") {
            let expr =
                XPathParser::new(must.argument_required()?, self.sdata, sctx).parse()?;
            let (etag, emsg) = must.get_error_info();
            self.nodes[id]
                .musts
                .push(Must::new(Arc::new(expr), etag, emsg));
        }
        if let Some(desc) = stmt.find1("description") {
            self.nodes[id].description = desc.argument().map(str::to_string);
        }
        if let Some(reference) = stmt.find1("reference") {
            self.nodes[id].reference = reference.argument().map(str::to_string);
        }
        if let Some(mand) = stmt.find1("mandatory") {
            self.nodes[id].mandatory = mand.argument() == Some("true");
        }
        Ok(())
    }

    /// Process all schema-producing substatements of `stmt`, adding the
    /// resulting nodes under `parent`.
    fn handle_substatements(
        &mut self,
        parent: NodeId,
        stmt: Statement<'a>,
        sctx: &SchemaContext,
    ) -> Result<()> {
        for sub in stmt.substatements() {
            if sub.prefix().is_some() {
                // extension statements are opaque
                continue;
            }
            if DATA_KEYWORDS.contains(&sub.keyword())
                && !self.sdata.if_features(&sub, &sctx.text_mid)?
            {
                continue;
            }
            match sub.keyword() {
                "container" => self.handle_container(parent, &sub, sctx)?,
                "list" => self.handle_list(parent, &sub, sctx)?,
                "leaf" => self.handle_leaf(parent, &sub, sctx)?,
                "leaf-list" => self.handle_leaf_list(parent, &sub, sctx)?,
                "choice" => self.handle_choice(parent, &sub, sctx)?,
                "case" => self.handle_case(parent, &sub, sctx)?,
                "anydata" => self.handle_any(parent, &sub, sctx, false)?,
                "anyxml" => self.handle_any(parent, &sub, sctx, true)?,
                "rpc" | "action" => self.handle_rpc_action(parent, &sub, sctx)?,
                "notification" => self.handle_notification(parent, &sub, sctx)?,
                "uses" => self.handle_uses(parent, &sub, sctx)?,
                "include" => {
                    // submodule content is processed through module_sequence
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn handle_container(
        &mut self,
        parent: NodeId,
        stmt: &Statement<'a>,
        sctx: &SchemaContext,
    ) -> Result<()> {
        let config = self.node_config(parent, stmt);
        let id = self.new_node(
            parent,
            Some(stmt.argument_required()?.to_string()),
            Some(sctx.default_ns.clone()),
            config,
            SchemaKind::Internal(InternalData {
                category: InternalCategory::Container {
                    presence: stmt.find1("presence").is_some(),
                },
                children: Vec::new(),
                pattern: None,
            }),
        );
        self.handle_common(id, stmt, sctx)?;
        self.handle_substatements(id, *stmt, sctx)
    }

    fn handle_list(
        &mut self,
        parent: NodeId,
        stmt: &Statement<'a>,
        sctx: &SchemaContext,
    ) -> Result<()> {
        let config = self.node_config(parent, stmt);
        let mut list = ListData::default();
        if let Some(minst) = stmt.find1("min-elements") {
            list.min_elements =
                minst
                    .argument_required()?
                    .parse()
                    .map_err(|_| Error::InvalidArgument {
                        argument: "min-elements".to_string(),
                    })?;
        }
        if let Some(maxst) = stmt.find1("max-elements") {
            let arg = maxst.argument_required()?;
            if arg != "unbounded" {
                list.max_elements =
                    Some(arg.parse().map_err(|_| Error::InvalidArgument {
                        argument: "max-elements".to_string(),
                    })?);
            }
        }
        list.user_ordered =
            stmt.find1("ordered-by").and_then(|o| o.argument()) == Some("user");
        if let Some(keyst) = stmt.find1("key") {
            for key in keyst.argument_required()?.split_whitespace() {
                list.keys
                    .push(self.sdata.translate_node_id(key, sctx)?);
            }
        }
        for uniqst in stmt.find_all("unique") {
            let mut group = Vec::new();
            for sni in uniqst.argument_required()?.split_whitespace() {
                group.push(self.sdata.sni2route(sni, sctx)?);
            }
            list.unique.push(group);
        }
        let keys = list.keys.clone();
        let id = self.new_node(
            parent,
            Some(stmt.argument_required()?.to_string()),
            Some(sctx.default_ns.clone()),
            config,
            SchemaKind::Internal(InternalData {
                category: InternalCategory::List(list),
                children: Vec::new(),
                pattern: None,
            }),
        );
        self.handle_common(id, stmt, sctx)?;
        self.handle_substatements(id, *stmt, sctx)?;
        // key leaves are implicitly mandatory
        for (kname, kns) in &keys {
            let child = self.find_child(id, kname, kns).ok_or_else(|| {
                Error::NonexistentSchemaNode {
                    parent: stmt.text(),
                    name: format!("{}:{}", kns, kname),
                }
            })?;
            self.nodes[child].mandatory = true;
            if let SchemaKind::Leaf(leaf) = &mut self.nodes[child].kind {
                leaf.is_key = true;
            }
        }
        Ok(())
    }

    fn find_child(&self, parent: NodeId, name: &str, ns: &str) -> Option<NodeId> {
        let children = match &self.nodes[parent].kind {
            SchemaKind::Internal(int) => &int.children,
            _ => return None,
        };
        for &child in children {
            let node = &self.nodes[child];
            if node.name.as_deref() == Some(name) && node.ns.as_deref() == Some(ns) {
                return Some(child);
            }
            // descend through choices and cases
            if let SchemaKind::Internal(int) = &node.kind {
                if matches!(
                    int.category,
                    InternalCategory::Choice { .. } | InternalCategory::Case
                ) {
                    if let Some(found) = self.find_child(child, name, ns) {
                        return Some(found);
                    }
                }
            }
        }
        None
    }

    fn handle_leaf(
        &mut self,
        parent: NodeId,
        stmt: &Statement<'a>,
        sctx: &SchemaContext,
    ) -> Result<()> {
        let config = self.node_config(parent, stmt);
        let spec = build_type(stmt.find1_required("type")?, sctx, self.sdata)?;
        let default = stmt
            .find1("default")
            .and_then(|d| d.argument())
            .map(str::to_string)
            .or(spec.default);
        let units = stmt
            .find1("units")
            .and_then(|u| u.argument())
            .map(str::to_string)
            .or(spec.units);
        let id = self.new_node(
            parent,
            Some(stmt.argument_required()?.to_string()),
            Some(sctx.default_ns.clone()),
            config,
            SchemaKind::Leaf(LeafData {
                dtype: spec.dtype,
                default,
                units,
                is_key: false,
            }),
        );
        self.handle_common(id, stmt, sctx)?;
        if self.nodes[id].mandatory {
            // a mandatory leaf has no default
            if let SchemaKind::Leaf(leaf) = &mut self.nodes[id].kind {
                leaf.default = None;
            }
        }
        Ok(())
    }

    fn handle_leaf_list(
        &mut self,
        parent: NodeId,
        stmt: &Statement<'a>,
        sctx: &SchemaContext,
    ) -> Result<()> {
        let config = self.node_config(parent, stmt);
        let spec = build_type(stmt.find1_required("type")?, sctx, self.sdata)?;
        let mut defaults: Vec<String> = stmt
            .find_all("default")
            .filter_map(|d| d.argument())
            .map(str::to_string)
            .collect();
        if defaults.is_empty() {
            if let Some(dflt) = spec.default {
                defaults.push(dflt);
            }
        }
        let mut min_elements = 0;
        let mut max_elements = None;
        if let Some(minst) = stmt.find1("min-elements") {
            min_elements =
                minst
                    .argument_required()?
                    .parse()
                    .map_err(|_| Error::InvalidArgument {
                        argument: "min-elements".to_string(),
                    })?;
        }
        if let Some(maxst) = stmt.find1("max-elements") {
            let arg = maxst.argument_required()?;
            if arg != "unbounded" {
                max_elements = Some(arg.parse().map_err(|_| Error::InvalidArgument {
                    argument: "max-elements".to_string(),
                })?);
            }
        }
        if min_elements > 0 {
            defaults.clear();
        }
        let id = self.new_node(
            parent,
            Some(stmt.argument_required()?.to_string()),
            Some(sctx.default_ns.clone()),
            config,
            SchemaKind::LeafList(LeafListData {
                dtype: spec.dtype,
                defaults,
                units: stmt
                    .find1("units")
                    .and_then(|u| u.argument())
                    .map(str::to_string)
                    .or(spec.units),
                min_elements,
                max_elements,
                user_ordered: stmt.find1("ordered-by").and_then(|o| o.argument())
                    == Some("user"),
            }),
        );
        self.handle_common(id, stmt, sctx)
    }

    fn handle_choice(
        &mut self,
        parent: NodeId,
        stmt: &Statement<'a>,
        sctx: &SchemaContext,
    ) -> Result<()> {
        let config = self.node_config(parent, stmt);
        let default_case = match stmt.find1("default") {
            Some(dflt) => Some(
                self.sdata
                    .translate_node_id(dflt.argument_required()?, sctx)?,
            ),
            None => None,
        };
        let id = self.new_node(
            parent,
            Some(stmt.argument_required()?.to_string()),
            Some(sctx.default_ns.clone()),
            config,
            SchemaKind::Internal(InternalData {
                category: InternalCategory::Choice { default_case },
                children: Vec::new(),
                pattern: None,
            }),
        );
        self.handle_common(id, stmt, sctx)?;
        // a data node directly under a choice is a shorthand case
        const SHORTHAND: &[&str] = &[
            "container",
            "list",
            "leaf",
            "leaf-list",
            "choice",
            "anydata",
            "anyxml",
        ];
        for sub in stmt.substatements() {
            if sub.prefix().is_some() {
                continue;
            }
            let kw = sub.keyword();
            if kw == "case" {
                if self.sdata.if_features(&sub, &sctx.text_mid)? {
                    self.handle_case(id, &sub, sctx)?;
                }
            } else if SHORTHAND.contains(&kw) {
                if !self.sdata.if_features(&sub, &sctx.text_mid)? {
                    continue;
                }
                let case_id = self.new_node(
                    id,
                    Some(sub.argument_required()?.to_string()),
                    Some(sctx.default_ns.clone()),
                    config,
                    SchemaKind::Internal(InternalData {
                        category: InternalCategory::Case,
                        children: Vec::new(),
                        pattern: None,
                    }),
                );
                self.handle_one(case_id, &sub, sctx)?;
            }
        }
        Ok(())
    }

    /// Dispatch a single schema-producing statement.
    fn handle_one(
        &mut self,
        parent: NodeId,
        stmt: &Statement<'a>,
        sctx: &SchemaContext,
    ) -> Result<()> {
        match stmt.keyword() {
            "container" => self.handle_container(parent, stmt, sctx),
            "list" => self.handle_list(parent, stmt, sctx),
            "leaf" => self.handle_leaf(parent, stmt, sctx),
            "leaf-list" => self.handle_leaf_list(parent, stmt, sctx),
            "choice" => self.handle_choice(parent, stmt, sctx),
            "anydata" => self.handle_any(parent, stmt, sctx, false),
            "anyxml" => self.handle_any(parent, stmt, sctx, true),
            "uses" => self.handle_uses(parent, stmt, sctx),
            _ => Ok(()),
        }
    }

    fn handle_case(
        &mut self,
        parent: NodeId,
        stmt: &Statement<'a>,
        sctx: &SchemaContext,
    ) -> Result<()> {
        let config = self.nodes[parent].config;
        let id = self.new_node(
            parent,
            Some(stmt.argument_required()?.to_string()),
            Some(sctx.default_ns.clone()),
            config,
            SchemaKind::Internal(InternalData {
                category: InternalCategory::Case,
                children: Vec::new(),
                pattern: None,
            }),
        );
        self.handle_common(id, stmt, sctx)?;
        self.handle_substatements(id, *stmt, sctx)
    }

    fn handle_any(
        &mut self,
        parent: NodeId,
        stmt: &Statement<'a>,
        sctx: &SchemaContext,
        xml: bool,
    ) -> Result<()> {
        let config = self.node_config(parent, stmt);
        let id = self.new_node(
            parent,
            Some(stmt.argument_required()?.to_string()),
            Some(sctx.default_ns.clone()),
            config,
            if xml {
                SchemaKind::Anyxml
            } else {
                SchemaKind::Anydata
            },
        );
        self.handle_common(id, stmt, sctx)
    }

    fn handle_rpc_action(
        &mut self,
        parent: NodeId,
        stmt: &Statement<'a>,
        sctx: &SchemaContext,
    ) -> Result<()> {
        let id = self.new_node(
            parent,
            Some(stmt.argument_required()?.to_string()),
            Some(sctx.default_ns.clone()),
            false,
            SchemaKind::Internal(InternalData {
                category: InternalCategory::RpcAction,
                children: Vec::new(),
                pattern: None,
            }),
        );
        self.handle_common(id, stmt, sctx)?;
        for kw in &["input", "output"] {
            let category = if *kw == "input" {
                InternalCategory::Input
            } else {
                InternalCategory::Output
            };
            let sub_id = self.new_node(
                id,
                Some(kw.to_string()),
                Some(sctx.default_ns.clone()),
                false,
                SchemaKind::Internal(InternalData {
                    category,
                    children: Vec::new(),
                    pattern: None,
                }),
            );
            if let Some(sub) = stmt.find1(kw) {
                self.handle_substatements(sub_id, sub, sctx)?;
            }
        }
        Ok(())
    }

    fn handle_notification(
        &mut self,
        parent: NodeId,
        stmt: &Statement<'a>,
        sctx: &SchemaContext,
    ) -> Result<()> {
        let id = self.new_node(
            parent,
            Some(stmt.argument_required()?.to_string()),
            Some(sctx.default_ns.clone()),
            false,
            SchemaKind::Internal(InternalData {
                category: InternalCategory::Notification,
                children: Vec::new(),
                pattern: None,
            }),
        );
        self.handle_common(id, stmt, sctx)?;
        self.handle_substatements(id, *stmt, sctx)
    }

    /// Expand a grouping in place, then apply the refinements and augments
    /// hanging off the `uses` statement.
    fn handle_uses(
        &mut self,
        parent: NodeId,
        stmt: &Statement<'a>,
        sctx: &SchemaContext,
    ) -> Result<()> {
        let (grouping, gctx) = self.sdata.get_definition(stmt, sctx)?;
        let before: Vec<NodeId> = match &self.nodes[parent].kind {
            SchemaKind::Internal(int) => int.children.clone(),
            _ => Vec::new(),
        };
        self.handle_substatements(parent, grouping, &gctx)?;
        let added: Vec<NodeId> = match &self.nodes[parent].kind {
            SchemaKind::Internal(int) => int
                .children
                .iter()
                .copied()
                .filter(|id| !before.contains(id))
                .collect(),
            _ => Vec::new(),
        };
        // a when on the uses statement conditions every expanded node
        if let Some(when) = stmt.find1("when") {
            let expr =
                XPathParser::new(when.argument_required()?, self.sdata, sctx).parse()?;
            let expr = Arc::new(expr);
            for id in &added {
                if self.nodes[*id].when.is_none() {
                    self.nodes[*id].when = Some(expr.clone());
                }
            }
        }
        for refst in stmt.find_all("refine") {
            self.apply_refine(parent, &refst, sctx)?;
        }
        for augst in stmt.find_all("augment") {
            let route = self
                .sdata
                .sni2route(augst.argument_required()?, sctx)?;
            let target = self.descend(parent, &route).ok_or_else(|| {
                Error::InvalidSchemaPath {
                    path: augst.argument().unwrap_or_default().to_string(),
                }
            })?;
            if self.sdata.if_features(&augst, &sctx.text_mid)? {
                self.graft_augment(target, &augst, sctx)?;
            }
        }
        Ok(())
    }

    fn descend(&self, from: NodeId, route: &[QualName]) -> Option<NodeId> {
        let mut node = from;
        for (name, ns) in route {
            let children = match &self.nodes[node].kind {
                SchemaKind::Internal(int) => &int.children,
                _ => return None,
            };
            node = children.iter().copied().find(|&c| {
                self.nodes[c].name.as_deref() == Some(name)
                    && self.nodes[c].ns.as_deref() == Some(ns)
            })?;
        }
        Some(node)
    }

    fn apply_refine(
        &mut self,
        parent: NodeId,
        stmt: &Statement<'a>,
        sctx: &SchemaContext,
    ) -> Result<()> {
        let route = self.sdata.sni2route(stmt.argument_required()?, sctx)?;
        let target = self.descend(parent, &route).ok_or_else(|| {
            Error::InvalidSchemaPath {
                path: stmt.argument().unwrap_or_default().to_string(),
            }
        })?;
        if let Some(desc) = stmt.find1("description") {
            self.nodes[target].description = desc.argument().map(str::to_string);
        }
        if let Some(mand) = stmt.find1("mandatory") {
            self.nodes[target].mandatory = mand.argument() == Some("true");
        }
        if let Some(cfg) = stmt.find1("config") {
            self.nodes[target].config = cfg.argument() != Some("false");
        }
        if let Some(dflt) = stmt.find1("default") {
            let value = dflt.argument().map(str::to_string);
            match &mut self.nodes[target].kind {
                SchemaKind::Leaf(leaf) => leaf.default = value,
                SchemaKind::LeafList(ll) => {
                    ll.defaults = value.into_iter().collect();
                }
                _ => {}
            }
        }
        if let Some(pres) = stmt.find1("presence") {
            let _ = pres;
            if let SchemaKind::Internal(int) = &mut self.nodes[target].kind {
                if let InternalCategory::Container { presence } = &mut int.category {
                    *presence = true;
                }
            }
        }
        for (kw, is_min) in &[("min-elements", true), ("max-elements", false)] {
            if let Some(elst) = stmt.find1(kw) {
                let arg = elst.argument_required()?;
                let parsed: Option<u64> = if arg == "unbounded" {
                    None
                } else {
                    Some(arg.parse().map_err(|_| Error::InvalidArgument {
                        argument: arg.to_string(),
                    })?)
                };
                match &mut self.nodes[target].kind {
                    SchemaKind::Internal(int) => {
                        if let InternalCategory::List(list) = &mut int.category {
                            if *is_min {
                                list.min_elements = parsed.unwrap_or(0);
                            } else {
                                list.max_elements = parsed;
                            }
                        }
                    }
                    SchemaKind::LeafList(ll) => {
                        if *is_min {
                            ll.min_elements = parsed.unwrap_or(0);
                        } else {
                            ll.max_elements = parsed;
                        }
                    }
                    _ => {}
                }
            }
        }
        for must in stmt.find_all("must") {
            let expr =
                XPathParser::new(must.argument_required()?, self.sdata, sctx).parse()?;
            let (etag, emsg) = must.get_error_info();
            self.nodes[target]
                .musts
                .push(Must::new(Arc::new(expr), etag, emsg));
        }
        Ok(())
    }

    /// Apply a top-level augment: resolve the target path against the built
    /// trees and graft the augment's children there.
    fn apply_augment(&mut self, stmt: &Statement<'a>, sctx: &SchemaContext) -> Result<()> {
        if !self.sdata.if_features(stmt, &sctx.text_mid)? {
            return Ok(());
        }
        let route = self.sdata.sni2route(stmt.argument_required()?, sctx)?;
        let target =
            self.descend(0, &route)
                .ok_or_else(|| Error::InvalidSchemaPath {
                    path: stmt.argument().unwrap_or_default().to_string(),
                })?;
        debug!(
            "augmenting {} from module {}",
            stmt.argument().unwrap_or_default(),
            sctx.text_mid
        );
        self.graft_augment(target, stmt, sctx)
    }

    fn graft_augment(
        &mut self,
        target: NodeId,
        stmt: &Statement<'a>,
        sctx: &SchemaContext,
    ) -> Result<()> {
        let before: Vec<NodeId> = match &self.nodes[target].kind {
            SchemaKind::Internal(int) => int.children.clone(),
            _ => Vec::new(),
        };
        self.handle_substatements(target, *stmt, sctx)?;
        if let Some(when) = stmt.find1("when") {
            let expr =
                XPathParser::new(when.argument_required()?, self.sdata, sctx).parse()?;
            let expr = Arc::new(expr);
            let added: Vec<NodeId> = match &self.nodes[target].kind {
                SchemaKind::Internal(int) => int
                    .children
                    .iter()
                    .copied()
                    .filter(|id| !before.contains(id))
                    .collect(),
                _ => Vec::new(),
            };
            for id in added {
                if self.nodes[id].when.is_none() {
                    self.nodes[id].when = Some(expr.clone());
                }
            }
        }
        Ok(())
    }

    /// Apply a deviation: `not-supported` removes the target, the other
    /// variants adjust its properties.
    fn apply_deviation(
        &mut self,
        stmt: &Statement<'a>,
        sctx: &SchemaContext,
    ) -> Result<()> {
        let route = self.sdata.sni2route(stmt.argument_required()?, sctx)?;
        let target =
            self.descend(0, &route)
                .ok_or_else(|| Error::InvalidSchemaPath {
                    path: stmt.argument().unwrap_or_default().to_string(),
                })?;
        for devst in stmt.find_all("deviate") {
            match devst.argument_required()? {
                "not-supported" => {
                    debug!(
                        "deviation removes {}",
                        stmt.argument().unwrap_or_default()
                    );
                    let parent = self.nodes[target].parent.unwrap_or(0);
                    if let SchemaKind::Internal(int) = &mut self.nodes[parent].kind {
                        int.children.retain(|id| *id != target);
                    }
                    return Ok(());
                }
                "add" | "replace" => self.deviate_properties(target, &devst, sctx, false)?,
                "delete" => self.deviate_properties(target, &devst, sctx, true)?,
                other => {
                    return Err(Error::InvalidArgument {
                        argument: other.to_string(),
                    })
                }
            }
        }
        Ok(())
    }

    fn deviate_properties(
        &mut self,
        target: NodeId,
        stmt: &Statement<'a>,
        sctx: &SchemaContext,
        delete: bool,
    ) -> Result<()> {
        if let Some(dflt) = stmt.find1("default") {
            let value = if delete {
                None
            } else {
                dflt.argument().map(str::to_string)
            };
            match &mut self.nodes[target].kind {
                SchemaKind::Leaf(leaf) => leaf.default = value,
                SchemaKind::LeafList(ll) => ll.defaults = value.into_iter().collect(),
                _ => {}
            }
        }
        if let Some(units) = stmt.find1("units") {
            let value = if delete {
                None
            } else {
                units.argument().map(str::to_string)
            };
            match &mut self.nodes[target].kind {
                SchemaKind::Leaf(leaf) => leaf.units = value,
                SchemaKind::LeafList(ll) => ll.units = value,
                _ => {}
            }
        }
        if let Some(cfg) = stmt.find1("config") {
            self.nodes[target].config = cfg.argument() != Some("false");
        }
        if let Some(mand) = stmt.find1("mandatory") {
            self.nodes[target].mandatory = !delete && mand.argument() == Some("true");
        }
        for (kw, is_min) in &[("min-elements", true), ("max-elements", false)] {
            if let Some(elst) = stmt.find1(kw) {
                let arg = elst.argument_required()?;
                let parsed: Option<u64> = if delete || arg == "unbounded" {
                    None
                } else {
                    Some(arg.parse().map_err(|_| Error::InvalidArgument {
                        argument: arg.to_string(),
                    })?)
                };
                match &mut self.nodes[target].kind {
                    SchemaKind::Internal(int) => {
                        if let InternalCategory::List(list) = &mut int.category {
                            if *is_min {
                                list.min_elements = parsed.unwrap_or(0);
                            } else {
                                list.max_elements = parsed;
                            }
                        }
                    }
                    SchemaKind::LeafList(ll) => {
                        if *is_min {
                            ll.min_elements = parsed.unwrap_or(0);
                        } else {
                            ll.max_elements = parsed;
                        }
                    }
                    _ => {}
                }
            }
        }
        if delete {
            if stmt.find1("must").is_some() {
                self.nodes[target].musts.clear();
            }
        } else {
            for must in stmt.find_all("must") {
                let expr = XPathParser::new(must.argument_required()?, self.sdata, sctx)
                    .parse()?;
                let (etag, emsg) = must.get_error_info();
                self.nodes[target]
                    .musts
                    .push(Must::new(Arc::new(expr), etag, emsg));
            }
        }
        if let Some(tstmt) = stmt.find1("type") {
            let spec = build_type(tstmt, sctx, self.sdata)?;
            match &mut self.nodes[target].kind {
                SchemaKind::Leaf(leaf) => leaf.dtype = spec.dtype,
                SchemaKind::LeafList(ll) => ll.dtype = spec.dtype,
                _ => {}
            }
        }
        Ok(())
    }

    // ===== leafref resolution =====

    /// Resolve the target type of every leafref in the tree.
    fn resolve_leafrefs(&mut self) -> Result<()> {
        for id in 0..self.nodes.len() {
            let path = match &self.nodes[id].kind {
                SchemaKind::Leaf(LeafData {
                    dtype: DataType::Leafref { path, target: None, .. },
                    ..
                })
                | SchemaKind::LeafList(LeafListData {
                    dtype: DataType::Leafref { path, target: None, .. },
                    ..
                }) => path.clone(),
                _ => continue,
            };
            let target = self.leafref_target_type(id, &path, 0)?;
            match &mut self.nodes[id].kind {
                SchemaKind::Leaf(LeafData {
                    dtype: DataType::Leafref { target: t, .. },
                    ..
                })
                | SchemaKind::LeafList(LeafListData {
                    dtype: DataType::Leafref { target: t, .. },
                    ..
                }) => *t = Some(Box::new(target)),
                _ => {}
            }
        }
        Ok(())
    }

    fn invalid_leafref(&self, id: NodeId) -> Error {
        Error::InvalidLeafrefPath {
            path: self.nodes[id]
                .name
                .clone()
                .unwrap_or_else(|| "/".to_string()),
        }
    }

    /// Walk a leafref path through the schema and return the referenced
    /// leaf's type.
    fn leafref_target_type(
        &self,
        referer: NodeId,
        path: &Expr,
        depth: usize,
    ) -> Result<DataType> {
        if depth > 32 {
            return Err(self.invalid_leafref(referer));
        }
        let steps = leafref_steps(path).ok_or_else(|| self.invalid_leafref(referer))?;
        let mut node = referer;
        let mut iter = steps.iter();
        let mut first = iter.next();
        if let Some(LeafrefStep::Absolute) = first {
            node = 0;
            first = iter.next();
        }
        let mut step = first;
        loop {
            let s = match step {
                Some(s) => s,
                None => break,
            };
            match s {
                LeafrefStep::Absolute => return Err(self.invalid_leafref(referer)),
                LeafrefStep::Up => {
                    // move to the data parent
                    let mut parent = self.nodes[node].parent;
                    loop {
                        match parent {
                            None => return Err(self.invalid_leafref(referer)),
                            Some(p) => {
                                let is_transparent = matches!(
                                    &self.nodes[p].kind,
                                    SchemaKind::Internal(int) if matches!(
                                        int.category,
                                        InternalCategory::Choice { .. }
                                            | InternalCategory::Case
                                    )
                                );
                                if is_transparent {
                                    parent = self.nodes[p].parent;
                                } else {
                                    node = p;
                                    break;
                                }
                            }
                        }
                    }
                }
                LeafrefStep::Child(name, ns) => {
                    node = self
                        .find_child_build(node, name, ns)
                        .ok_or_else(|| self.invalid_leafref(referer))?;
                }
            }
            step = iter.next();
        }
        match &self.nodes[node].kind {
            SchemaKind::Leaf(leaf) => match &leaf.dtype {
                DataType::Leafref {
                    target: Some(t), ..
                } => Ok((**t).clone()),
                DataType::Leafref {
                    path, target: None, ..
                } => self.leafref_target_type(node, &path.clone(), depth + 1),
                other => Ok(other.clone()),
            },
            SchemaKind::LeafList(ll) => Ok(ll.dtype.clone()),
            _ => Err(self.invalid_leafref(referer)),
        }
    }

    fn find_child_build(&self, parent: NodeId, name: &str, ns: &str) -> Option<NodeId> {
        let children = match &self.nodes[parent].kind {
            SchemaKind::Internal(int) => &int.children,
            _ => return None,
        };
        for &child in children {
            let nd = &self.nodes[child];
            if nd.name.as_deref() == Some(name) && nd.ns.as_deref() == Some(ns) {
                return Some(child);
            }
            if let SchemaKind::Internal(int) = &nd.kind {
                if matches!(
                    int.category,
                    InternalCategory::Choice { .. } | InternalCategory::Case
                ) {
                    if let Some(found) = self.find_child_build(child, name, ns) {
                        return Some(found);
                    }
                }
            }
        }
        None
    }
}

impl SchemaTree {
    // ===== pattern compilation =====

    /// Compile the member grammar of `id` and, recursively, of all its
    /// internal descendants.
    fn compile_patterns(&mut self, id: NodeId) {
        let children = self.child_ids(id);
        for child in &children {
            if matches!(self.nodes[*child].kind, SchemaKind::Internal(_)) {
                self.compile_patterns(*child);
            }
        }
        let is_choice = matches!(
            &self.nodes[id].kind,
            SchemaKind::Internal(int) if matches!(int.category, InternalCategory::Choice { .. })
        );
        if is_choice {
            return;
        }
        let mut pattern = SchemaPattern::empty();
        for child in children {
            let entry = self.pattern_entry(child);
            pattern = SchemaPattern::pair(entry, pattern);
        }
        if let SchemaKind::Internal(int) = &mut self.nodes[id].kind {
            int.pattern = Some(pattern);
        }
    }

    fn node_content_type(&self, id: NodeId) -> ContentType {
        if self.nodes[id].config {
            ContentType::CONFIG
        } else {
            ContentType::NONCONFIG
        }
    }

    fn node_iname(&self, id: NodeId) -> String {
        let name = self.nodes[id].name.clone().unwrap_or_default();
        // nearest data ancestor determines qualification
        let mut parent = self.nodes[id].parent;
        while let Some(p) = parent {
            let transparent = matches!(
                &self.nodes[p].kind,
                SchemaKind::Internal(int) if matches!(
                    int.category,
                    InternalCategory::Choice { .. } | InternalCategory::Case
                )
            );
            if transparent {
                parent = self.nodes[p].parent;
            } else {
                break;
            }
        }
        let pns = parent.and_then(|p| self.nodes[p].ns.clone());
        match (&self.nodes[id].ns, pns) {
            (Some(ns), Some(pns)) if *ns == pns => name,
            (Some(ns), _) => format!("{}:{}", ns, name),
            (None, _) => name,
        }
    }

    fn node_mandatory_effective(&self, id: NodeId) -> bool {
        match &self.nodes[id].kind {
            SchemaKind::Leaf(_) | SchemaKind::Anydata | SchemaKind::Anyxml => {
                self.nodes[id].mandatory
            }
            SchemaKind::LeafList(ll) => ll.min_elements > 0,
            SchemaKind::Internal(int) => match &int.category {
                InternalCategory::List(list) => list.min_elements > 0,
                InternalCategory::Container { presence: false } => int
                    .children
                    .iter()
                    .any(|c| self.node_mandatory_effective(*c)),
                InternalCategory::Choice { .. } => self.nodes[id].mandatory,
                _ => false,
            },
        }
    }

    fn pattern_entry(&self, id: NodeId) -> Arc<SchemaPattern> {
        match &self.nodes[id].kind {
            SchemaKind::Internal(int) => match &int.category {
                InternalCategory::Choice { .. } => self.choice_pattern(id),
                InternalCategory::Case => self.case_pattern(id),
                InternalCategory::RpcAction
                | InternalCategory::Notification
                | InternalCategory::Input
                | InternalCategory::Output
                | InternalCategory::SchemaRoot => SchemaPattern::empty(),
                _ => self.member_pattern(id),
            },
            _ => self.member_pattern(id),
        }
    }

    fn member_pattern(&self, id: NodeId) -> Arc<SchemaPattern> {
        let member = Arc::new(SchemaPattern::Member {
            name: self.node_iname(id),
            ctype: self.node_content_type(id),
            when: self.nodes[id].when.clone(),
        });
        if !self.node_mandatory_effective(id) {
            SchemaPattern::optional(member)
        } else if self.node_content_type(id) == ContentType::NONCONFIG {
            // a mandatory state member may be absent in configuration
            SchemaPattern::optional_config(member)
        } else {
            member
        }
    }

    fn case_pattern(&self, id: NodeId) -> Arc<SchemaPattern> {
        let mut pattern = SchemaPattern::empty();
        for child in self.child_ids(id) {
            pattern = SchemaPattern::pair(self.pattern_entry(child), pattern);
        }
        match &self.nodes[id].when {
            Some(when) => Arc::new(SchemaPattern::Conditional {
                pattern,
                when: when.clone(),
            }),
            None => pattern,
        }
    }

    fn choice_pattern(&self, id: NodeId) -> Arc<SchemaPattern> {
        let name = self.nodes[id].name.clone().unwrap_or_default();
        let cases = self.child_ids(id);
        let mut iter = cases.into_iter();
        let mut pattern = match iter.next() {
            Some(first) => self.case_pattern(first),
            None => SchemaPattern::empty(),
        };
        for case in iter {
            pattern = Arc::new(SchemaPattern::Choice {
                left: self.case_pattern(case),
                right: pattern,
                name: name.clone(),
                ctype: ContentType::ALL,
            });
        }
        if !self.nodes[id].mandatory {
            pattern = SchemaPattern::optional(pattern);
        }
        match &self.nodes[id].when {
            Some(when) => Arc::new(SchemaPattern::Conditional {
                pattern,
                when: when.clone(),
            }),
            None => pattern,
        }
    }
}

/// One step of a leafref path.
enum LeafrefStep {
    Absolute,
    Up,
    Child(String, String),
}

/// Flatten a leafref path expression into location steps; leafrefs are
/// restricted to child/parent location paths (key predicates are ignored
/// for type resolution).
fn leafref_steps(expr: &Expr) -> Option<Vec<LeafrefStep>> {
    match expr {
        Expr::Root => Some(vec![LeafrefStep::Absolute]),
        Expr::LocationPath(left, right) => {
            let mut steps = leafref_steps(left)?;
            steps.extend(leafref_steps(right)?);
            Some(steps)
        }
        Expr::Step { axis, test, .. } => match (axis, test) {
            (crate::xpath::Axis::Parent, _) => Some(vec![LeafrefStep::Up]),
            (crate::xpath::Axis::Child, crate::xpath::NodeTest::Name((name, ns))) => {
                Some(vec![LeafrefStep::Child(name.clone(), ns.clone())])
            }
            _ => None,
        },
        _ => None,
    }
}
