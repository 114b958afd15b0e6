//
// Copyright (c) The yangtree Core Contributors
//
// SPDX-License-Identifier: MIT
//

//! XPath 1.0 engine.
//!
//! The parser covers the XPath 1.0 subset YANG needs plus the YANG
//! extension functions (`current`, `deref`, `derived-from[-or-self]`,
//! `enum-value`, `re-match`, `bit-is-set`). Prefixes are resolved at parse
//! time through the schema context; a bare identifier binds to the default
//! namespace of the context module. The evaluator walks instance cursors;
//! node sets are deduplicated by instance route.
//!
//! Unsupported XPath 1.0 features (reported as such, never silently
//! misparsed): `id()`, `lang()`, `namespace-uri()`, the `attribute`,
//! `following`, `preceding` and `namespace` axes, and the `comment()`,
//! `processing-instruction()` and `text()` node tests.

use std::collections::HashSet;

use crate::context::{ModuleId, QualName, SchemaContext, SchemaData};
use crate::data::InstanceNode;
use crate::error::{Error, Result};
use crate::parser::Parser;
use crate::types::compile_xsd_regex;

/// A set of instance nodes, in document order, without duplicates.
pub type NodeSet<'a> = Vec<InstanceNode<'a>>;

/// Value of an XPath (sub)expression.
#[derive(Clone, Debug)]
pub enum XPathValue<'a> {
    Nodes(NodeSet<'a>),
    Number(f64),
    Text(String),
    Boolean(bool),
}

impl<'a> XPathValue<'a> {
    /// XPath `boolean()` coercion.
    pub fn boolean(&self) -> bool {
        match self {
            XPathValue::Nodes(ns) => !ns.is_empty(),
            XPathValue::Number(n) => *n != 0.0 && !n.is_nan(),
            XPathValue::Text(s) => !s.is_empty(),
            XPathValue::Boolean(b) => *b,
        }
    }

    /// XPath `number()` coercion.
    pub fn number(&self) -> f64 {
        match self {
            XPathValue::Nodes(ns) => match ns.first() {
                Some(n) => n.node_number(),
                None => f64::NAN,
            },
            XPathValue::Number(n) => *n,
            XPathValue::Text(s) => s.trim().parse().unwrap_or(f64::NAN),
            XPathValue::Boolean(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
        }
    }

    /// XPath `string()` coercion.
    pub fn string(&self) -> String {
        match self {
            XPathValue::Nodes(ns) => match ns.first() {
                Some(n) => n.node_string(),
                None => String::new(),
            },
            XPathValue::Number(n) => format_number(*n),
            XPathValue::Text(s) => s.clone(),
            XPathValue::Boolean(b) => b.to_string(),
        }
    }

    fn into_nodes(self) -> Result<NodeSet<'a>> {
        match self {
            XPathValue::Nodes(ns) => Ok(ns),
            other => Err(Error::XPathTypeError {
                value: other.string(),
            }),
        }
    }
}

pub(crate) fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        if n > 0.0 {
            "Infinity".to_string()
        } else {
            "-Infinity".to_string()
        }
    } else if n == n.trunc() && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

/// Union of two node sets, first operand's order first.
fn union_nodes<'a>(left: NodeSet<'a>, right: NodeSet<'a>) -> NodeSet<'a> {
    let mut seen: HashSet<String> = left.iter().map(|n| n.path_key()).collect();
    let mut res = left;
    for n in right {
        if seen.insert(n.path_key()) {
            res.push(n);
        }
    }
    res
}

// ===== AST =====

/// XPath axes supported by the engine.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Axis {
    Ancestor,
    AncestorOrSelf,
    Child,
    Descendant,
    DescendantOrSelf,
    FollowingSibling,
    Parent,
    PrecedingSibling,
    SelfAxis,
}

/// Node test of a location step.
#[derive(Clone, Debug, PartialEq)]
pub enum NodeTest {
    /// `node()` or no test (`.`, `..`, `//`).
    AnyNode,
    /// `*`
    AnyName,
    /// A qualified name (prefixes already resolved to module names).
    Name(QualName),
}

impl NodeTest {
    pub(crate) fn matches(&self, qname: Option<&QualName>) -> bool {
        match self {
            NodeTest::AnyNode => true,
            NodeTest::AnyName => qname.is_some(),
            NodeTest::Name(test) => qname == Some(test),
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum MultiplicativeOp {
    Multiply,
    Divide,
    Modulo,
}

/// A parsed XPath expression.
#[derive(Clone, Debug)]
pub enum Expr {
    Or(Box<Expr>, Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Equality {
        left: Box<Expr>,
        right: Box<Expr>,
        negate: bool,
    },
    Relational {
        left: Box<Expr>,
        right: Box<Expr>,
        less: bool,
        equal: bool,
    },
    Additive {
        left: Box<Expr>,
        right: Box<Expr>,
        plus: bool,
    },
    Multiplicative {
        left: Box<Expr>,
        right: Box<Expr>,
        op: MultiplicativeOp,
    },
    UnaryMinus {
        expr: Box<Expr>,
        negate: bool,
    },
    Union(Box<Expr>, Box<Expr>),
    Literal(String),
    Number(f64),
    /// Filter expression followed by a relative location path.
    Path(Box<Expr>, Box<Expr>),
    Filter {
        primary: Box<Expr>,
        predicates: Vec<Expr>,
    },
    /// `/`, the root of the instance tree.
    Root,
    /// Left part of a location path followed by one step.
    LocationPath(Box<Expr>, Box<Expr>),
    Step {
        axis: Axis,
        test: NodeTest,
        predicates: Vec<Expr>,
    },
    Func(Func),
}

/// XPath core functions plus the YANG extensions.
#[derive(Clone, Debug)]
pub enum Func {
    BitIsSet(Box<Expr>, Box<Expr>),
    Boolean(Box<Expr>),
    Ceiling(Box<Expr>),
    Concat(Vec<Expr>),
    Contains(Box<Expr>, Box<Expr>),
    Count(Box<Expr>),
    Current,
    Deref(Box<Expr>),
    DerivedFrom {
        nodes: Box<Expr>,
        identity: Box<Expr>,
        or_self: bool,
        mid: ModuleId,
    },
    EnumValue(Box<Expr>),
    False,
    Floor(Box<Expr>),
    Last,
    LocalName(Option<Box<Expr>>),
    Name(Option<Box<Expr>>),
    NormalizeSpace(Option<Box<Expr>>),
    Not(Box<Expr>),
    Number(Option<Box<Expr>>),
    Position,
    ReMatch(Box<Expr>, Box<Expr>),
    Round(Box<Expr>),
    StartsWith(Box<Expr>, Box<Expr>),
    String(Option<Box<Expr>>),
    StringLength(Option<Box<Expr>>),
    Substring {
        string: Box<Expr>,
        start: Box<Expr>,
        length: Option<Box<Expr>>,
    },
    SubstringAfter(Box<Expr>, Box<Expr>),
    SubstringBefore(Box<Expr>, Box<Expr>),
    Sum(Box<Expr>),
    Translate(Box<Expr>, Box<Expr>, Box<Expr>),
    True,
}

// ===== parser =====

/// Recursive-descent parser for XPath expressions.
pub(crate) struct XPathParser<'a> {
    p: Parser<'a>,
    sdata: &'a SchemaData,
    sctx: &'a SchemaContext,
}

impl<'a> XPathParser<'a> {
    pub(crate) fn new(
        text: &'a str,
        sdata: &'a SchemaData,
        sctx: &'a SchemaContext,
    ) -> XPathParser<'a> {
        XPathParser {
            p: Parser::new(text),
            sdata,
            sctx,
        }
    }

    fn invalid(&self) -> Error {
        Error::InvalidXPath {
            expression: self.p.input.to_string(),
            offset: self.p.offset,
        }
    }

    fn not_supported(&self, feature: &str) -> Error {
        Error::XPathNotSupported {
            feature: feature.to_string(),
        }
    }

    /// Parse a complete XPath expression.
    pub(crate) fn parse(&mut self) -> Result<Expr> {
        self.p.skip_ws();
        self.or_expr()
    }

    fn or_expr(&mut self) -> Result<Expr> {
        let mut op1 = self.and_expr()?;
        while self.p.test_string("or") {
            self.p.skip_ws();
            let op2 = self.and_expr()?;
            op1 = Expr::Or(Box::new(op1), Box::new(op2));
        }
        Ok(op1)
    }

    fn and_expr(&mut self) -> Result<Expr> {
        let mut op1 = self.equality_expr()?;
        while self.p.test_string("and") {
            self.p.skip_ws();
            let op2 = self.equality_expr()?;
            op1 = Expr::And(Box::new(op1), Box::new(op2));
        }
        Ok(op1)
    }

    fn equality_expr(&mut self) -> Result<Expr> {
        let mut op1 = self.relational_expr()?;
        loop {
            let mut negate = false;
            let mut next = match self.p.try_peek() {
                Some(c) => c,
                None => return Ok(op1),
            };
            if next == '!' {
                self.p.advance();
                negate = true;
                next = self.p.peek().map_err(|_| self.invalid())?;
            }
            if next != '=' {
                if negate {
                    return Err(self.invalid());
                }
                return Ok(op1);
            }
            self.p.adv_skip_ws();
            let op2 = self.relational_expr()?;
            op1 = Expr::Equality {
                left: Box::new(op1),
                right: Box::new(op2),
                negate,
            };
        }
    }

    fn relational_expr(&mut self) -> Result<Expr> {
        let mut op1 = self.additive_expr()?;
        loop {
            let rel = match self.p.try_peek() {
                Some(c) if c == '<' || c == '>' => c,
                _ => return Ok(op1),
            };
            self.p.advance();
            let equal = self.p.test_string("=");
            self.p.skip_ws();
            let op2 = self.additive_expr()?;
            op1 = Expr::Relational {
                left: Box::new(op1),
                right: Box::new(op2),
                less: rel == '<',
                equal,
            };
        }
    }

    fn additive_expr(&mut self) -> Result<Expr> {
        let mut op1 = self.multiplicative_expr()?;
        loop {
            let pm = match self.p.try_peek() {
                Some(c) if c == '+' || c == '-' => c,
                _ => return Ok(op1),
            };
            self.p.adv_skip_ws();
            let op2 = self.multiplicative_expr()?;
            op1 = Expr::Additive {
                left: Box::new(op1),
                right: Box::new(op2),
                plus: pm == '+',
            };
        }
    }

    fn multiplicative_expr(&mut self) -> Result<Expr> {
        let mut op1 = self.unary_minus_expr()?;
        loop {
            let op = if self.p.test_string("*") {
                MultiplicativeOp::Multiply
            } else if self.p.test_string("div") {
                MultiplicativeOp::Divide
            } else if self.p.test_string("mod") {
                MultiplicativeOp::Modulo
            } else {
                return Ok(op1);
            };
            self.p.skip_ws();
            let op2 = self.unary_minus_expr()?;
            op1 = Expr::Multiplicative {
                left: Box::new(op1),
                right: Box::new(op2),
                op,
            };
        }
    }

    fn unary_minus_expr(&mut self) -> Result<Expr> {
        let mut negate: Option<bool> = None;
        while self.p.test_string("-") {
            negate = Some(!negate.unwrap_or(false));
            self.p.skip_ws();
        }
        let expr = self.union_expr()?;
        match negate {
            None => Ok(expr),
            Some(negate) => Ok(Expr::UnaryMinus {
                expr: Box::new(expr),
                negate,
            }),
        }
    }

    fn union_expr(&mut self) -> Result<Expr> {
        let mut op1 = self.lit_num_path()?;
        while self.p.test_string("|") {
            self.p.skip_ws();
            let op2 = self.lit_num_path()?;
            op1 = Expr::Union(Box::new(op1), Box::new(op2));
        }
        Ok(op1)
    }

    fn lit_num_path(&mut self) -> Result<Expr> {
        let next = self.p.peek().map_err(|_| self.invalid())?;
        if next == '(' {
            self.p.adv_skip_ws();
            return self.path_expr(None);
        }
        if next == '\'' || next == '"' {
            self.p.advance();
            let val = self.p.up_to(next)?.to_string();
            self.p.skip_ws();
            return Ok(Expr::Literal(val));
        }
        let second_digit = self.p.input[self.p.offset..]
            .chars()
            .nth(1)
            .map_or(false, |c| c.is_ascii_digit());
        if next.is_ascii_digit() || (next == '.' && second_digit) {
            let val = self.p.unsigned_float()?;
            self.p.skip_ws();
            return Ok(Expr::Number(val));
        }
        let start = self.p.offset;
        let fname = match self.p.yang_identifier() {
            Ok(name) => name.to_string(),
            Err(_) => return self.location_path(),
        };
        self.p.skip_ws();
        if self.p.test_string("(")
            && !matches!(
                fname.as_str(),
                "node" | "comment" | "processing-instruction" | "text"
            )
        {
            self.p.skip_ws();
            return self.path_expr(Some(&fname));
        }
        self.p.offset = start;
        self.location_path()
    }

    fn path_expr(&mut self, fname: Option<&str>) -> Result<Expr> {
        let fexpr = self.filter_expr(fname)?;
        if self.p.test_string("/") {
            let rest = self.location_path()?;
            return Ok(Expr::Path(Box::new(fexpr), Box::new(rest)));
        }
        Ok(fexpr)
    }

    fn filter_expr(&mut self, fname: Option<&str>) -> Result<Expr> {
        let primary = match fname {
            None => self.or_expr()?,
            Some(fname) => Expr::Func(self.function(fname)?),
        };
        self.p.char(')').map_err(|_| self.invalid())?;
        self.p.skip_ws();
        let predicates = self.predicates()?;
        if predicates.is_empty() {
            Ok(primary)
        } else {
            Ok(Expr::Filter {
                primary: Box::new(primary),
                predicates,
            })
        }
    }

    fn predicates(&mut self) -> Result<Vec<Expr>> {
        let mut res = Vec::new();
        while self.p.test_string("[") {
            self.p.skip_ws();
            res.push(self.or_expr()?);
            self.p.char(']').map_err(|_| self.invalid())?;
            self.p.skip_ws();
        }
        Ok(res)
    }

    fn location_path(&mut self) -> Result<Expr> {
        let mut op1;
        if self.p.test_string("/") {
            self.p.skip_ws();
            if self.p.at_end() {
                return Ok(Expr::Root);
            }
            let step = self.step()?;
            op1 = Expr::LocationPath(Box::new(Expr::Root), Box::new(step));
        } else {
            op1 = self.step()?;
        }
        while self.p.test_string("/") {
            self.p.skip_ws();
            let step = self.step()?;
            op1 = Expr::LocationPath(Box::new(op1), Box::new(step));
        }
        Ok(op1)
    }

    fn step(&mut self) -> Result<Expr> {
        let (axis, test) = self.axis_test()?;
        let predicates = self.predicates()?;
        Ok(Expr::Step {
            axis,
            test,
            predicates,
        })
    }

    fn axis_test(&mut self) -> Result<(Axis, NodeTest)> {
        let next = self.p.peek().map_err(|_| self.invalid())?;
        if next == '*' {
            self.p.adv_skip_ws();
            return Ok((Axis::Child, NodeTest::AnyName));
        }
        if next == '/' {
            // the second slash of '//'
            return Ok((Axis::DescendantOrSelf, NodeTest::AnyNode));
        }
        if next == '.' {
            self.p.advance();
            let axis = if self.p.test_string(".") {
                Axis::Parent
            } else {
                Axis::SelfAxis
            };
            self.p.skip_ws();
            return Ok((axis, NodeTest::AnyNode));
        }
        let yid = self.p.yang_identifier().map_err(|_| self.invalid())?.to_string();
        let ws = self.p.skip_ws();
        let next = match self.p.try_peek() {
            None => {
                return Ok((Axis::Child, self.default_ns_test(&yid)));
            }
            Some(c) => c,
        };
        if next == '(' {
            return Ok((Axis::Child, self.node_type(&yid)?));
        }
        if next == ':' {
            self.p.advance();
            if self.p.try_peek() == Some(':') {
                self.p.adv_skip_ws();
                let axis = self.axis_by_name(&yid)?;
                return Ok((axis, self.qname_test()?));
            }
            if ws {
                return Err(self.invalid());
            }
            let ns = self
                .sdata
                .prefix2ns(&yid, &self.sctx.text_mid)?
                .to_string();
            let loc = self.p.yang_identifier().map_err(|_| self.invalid())?.to_string();
            self.p.skip_ws();
            return Ok((Axis::Child, NodeTest::Name((loc, ns))));
        }
        Ok((Axis::Child, self.default_ns_test(&yid)))
    }

    /// A bare identifier binds to the default namespace of the context
    /// module.
    fn default_ns_test(&self, name: &str) -> NodeTest {
        NodeTest::Name((name.to_string(), self.sctx.default_ns.clone()))
    }

    fn axis_by_name(&self, name: &str) -> Result<Axis> {
        Ok(match name {
            "ancestor" => Axis::Ancestor,
            "ancestor-or-self" => Axis::AncestorOrSelf,
            "child" => Axis::Child,
            "descendant" => Axis::Descendant,
            "descendant-or-self" => Axis::DescendantOrSelf,
            "following-sibling" => Axis::FollowingSibling,
            "parent" => Axis::Parent,
            "preceding-sibling" => Axis::PrecedingSibling,
            "self" => Axis::SelfAxis,
            "attribute" | "following" | "namespace" | "preceding" => {
                return Err(self.not_supported(&format!("axis '{}::'", name)))
            }
            _ => return Err(self.invalid()),
        })
    }

    fn node_type(&mut self, typ: &str) -> Result<NodeTest> {
        match typ {
            "node" => {
                self.p.adv_skip_ws();
                self.p.char(')').map_err(|_| self.invalid())?;
                self.p.skip_ws();
                Ok(NodeTest::AnyNode)
            }
            "comment" | "processing-instruction" | "text" => {
                Err(self.not_supported(&format!("node type '{}()'", typ)))
            }
            _ => Err(self.invalid()),
        }
    }

    fn qname_test(&mut self) -> Result<NodeTest> {
        if self.p.test_string("*") {
            self.p.skip_ws();
            return Ok(NodeTest::AnyName);
        }
        let ident = self.p.yang_identifier().map_err(|_| self.invalid())?.to_string();
        let ws = self.p.skip_ws();
        let next = match self.p.try_peek() {
            None => return Ok(self.default_ns_test(&ident)),
            Some(c) => c,
        };
        if next == '(' {
            return self.node_type(&ident);
        }
        let res = if !ws && self.p.test_string(":") {
            let ns = self
                .sdata
                .prefix2ns(&ident, &self.sctx.text_mid)?
                .to_string();
            let loc = self.p.yang_identifier().map_err(|_| self.invalid())?.to_string();
            NodeTest::Name((loc, ns))
        } else {
            self.default_ns_test(&ident)
        };
        self.p.skip_ws();
        Ok(res)
    }

    fn opt_arg(&mut self) -> Result<Option<Box<Expr>>> {
        if self.p.peek().map_err(|_| self.invalid())? == ')' {
            Ok(None)
        } else {
            Ok(Some(Box::new(self.parse()?)))
        }
    }

    fn two_args(&mut self) -> Result<(Box<Expr>, Box<Expr>)> {
        let first = self.parse()?;
        self.p.char(',').map_err(|_| self.invalid())?;
        self.p.skip_ws();
        let second = self.parse()?;
        Ok((Box::new(first), Box::new(second)))
    }

    fn function(&mut self, fname: &str) -> Result<Func> {
        Ok(match fname {
            "bit-is-set" => {
                let (a, b) = self.two_args()?;
                Func::BitIsSet(a, b)
            }
            "boolean" => Func::Boolean(Box::new(self.parse()?)),
            "ceiling" => Func::Ceiling(Box::new(self.parse()?)),
            "concat" => {
                let mut parts = vec![self.parse()?];
                while self.p.test_string(",") {
                    self.p.skip_ws();
                    parts.push(self.parse()?);
                }
                if parts.len() < 2 {
                    return Err(self.invalid());
                }
                Func::Concat(parts)
            }
            "contains" => {
                let (a, b) = self.two_args()?;
                Func::Contains(a, b)
            }
            "count" => Func::Count(Box::new(self.parse()?)),
            "current" => Func::Current,
            "deref" => Func::Deref(Box::new(self.parse()?)),
            "derived-from" => {
                let (a, b) = self.two_args()?;
                Func::DerivedFrom {
                    nodes: a,
                    identity: b,
                    or_self: false,
                    mid: self.sctx.text_mid.clone(),
                }
            }
            "derived-from-or-self" => {
                let (a, b) = self.two_args()?;
                Func::DerivedFrom {
                    nodes: a,
                    identity: b,
                    or_self: true,
                    mid: self.sctx.text_mid.clone(),
                }
            }
            "enum-value" => Func::EnumValue(Box::new(self.parse()?)),
            "false" => Func::False,
            "floor" => Func::Floor(Box::new(self.parse()?)),
            "last" => Func::Last,
            "local-name" => Func::LocalName(self.opt_arg()?),
            "name" => Func::Name(self.opt_arg()?),
            "normalize-space" => Func::NormalizeSpace(self.opt_arg()?),
            "not" => Func::Not(Box::new(self.parse()?)),
            "number" => Func::Number(self.opt_arg()?),
            "position" => Func::Position,
            "re-match" => {
                let (a, b) = self.two_args()?;
                Func::ReMatch(a, b)
            }
            "round" => Func::Round(Box::new(self.parse()?)),
            "starts-with" => {
                let (a, b) = self.two_args()?;
                Func::StartsWith(a, b)
            }
            "string" => Func::String(self.opt_arg()?),
            "string-length" => Func::StringLength(self.opt_arg()?),
            "substring" => {
                let (string, start) = self.two_args()?;
                let length = if self.p.test_string(",") {
                    self.p.skip_ws();
                    Some(Box::new(self.parse()?))
                } else {
                    None
                };
                Func::Substring {
                    string,
                    start,
                    length,
                }
            }
            "substring-after" => {
                let (a, b) = self.two_args()?;
                Func::SubstringAfter(a, b)
            }
            "substring-before" => {
                let (a, b) = self.two_args()?;
                Func::SubstringBefore(a, b)
            }
            "sum" => Func::Sum(Box::new(self.parse()?)),
            "translate" => {
                let (a, b) = self.two_args()?;
                self.p.char(',').map_err(|_| self.invalid())?;
                self.p.skip_ws();
                Func::Translate(a, b, Box::new(self.parse()?))
            }
            "true" => Func::True,
            "id" | "lang" | "namespace-uri" => {
                return Err(self.not_supported(&format!("function '{}()'", fname)))
            }
            _ => return Err(self.invalid()),
        })
    }
}

// ===== evaluation =====

/// Evaluation context: current focus, origin of the whole evaluation (used
/// by `current()`), and the position/size of the containing node set.
#[derive(Clone, Debug)]
pub(crate) struct XPathContext<'a> {
    pub(crate) cnode: InstanceNode<'a>,
    pub(crate) origin: InstanceNode<'a>,
    pub(crate) position: usize,
    pub(crate) size: usize,
}

impl<'a> XPathContext<'a> {
    fn update_cnode(&self, cnode: InstanceNode<'a>) -> XPathContext<'a> {
        XPathContext {
            cnode,
            origin: self.origin.clone(),
            position: self.position,
            size: self.size,
        }
    }
}

impl Expr {
    /// Evaluate the expression with `node` as both the initial context node
    /// and the origin.
    pub fn evaluate<'a>(&self, node: &InstanceNode<'a>) -> Result<XPathValue<'a>> {
        self.eval(&XPathContext {
            cnode: node.clone(),
            origin: node.clone(),
            position: 1,
            size: 1,
        })
    }

    fn eval_float(&self, xctx: &XPathContext<'_>) -> Result<f64> {
        Ok(self.eval(xctx)?.number())
    }

    fn eval_string(&self, xctx: &XPathContext<'_>) -> Result<String> {
        Ok(self.eval(xctx)?.string())
    }

    fn apply_predicates<'a>(
        predicates: &[Expr],
        mut ns: NodeSet<'a>,
        xctx: &XPathContext<'a>,
    ) -> Result<NodeSet<'a>> {
        for predicate in predicates {
            let size = ns.len();
            let mut res = Vec::new();
            let mut positional: Option<NodeSet<'a>> = None;
            for (i, node) in ns.iter().enumerate() {
                let pctx = XPathContext {
                    cnode: node.clone(),
                    origin: xctx.origin.clone(),
                    position: i + 1,
                    size,
                };
                match predicate.eval(&pctx)? {
                    // a numeric predicate selects by 1-based position
                    XPathValue::Number(n) => {
                        let idx = n as i64;
                        positional = Some(if idx >= 1 && (idx as usize) <= size {
                            vec![ns[idx as usize - 1].clone()]
                        } else {
                            Vec::new()
                        });
                        break;
                    }
                    pval => {
                        if pval.boolean() {
                            res.push(node.clone());
                        }
                    }
                }
            }
            ns = positional.unwrap_or(res);
        }
        Ok(ns)
    }

    pub(crate) fn eval<'a>(&self, xctx: &XPathContext<'a>) -> Result<XPathValue<'a>> {
        match self {
            Expr::Or(l, r) => {
                let lres = l.eval(xctx)?.boolean();
                let rres = r.eval(xctx)?.boolean();
                Ok(XPathValue::Boolean(lres || rres))
            }
            Expr::And(l, r) => {
                let lres = l.eval(xctx)?.boolean();
                let rres = r.eval(xctx)?.boolean();
                Ok(XPathValue::Boolean(lres && rres))
            }
            Expr::Equality {
                left,
                right,
                negate,
            } => {
                let lres = left.eval(xctx)?;
                let rres = right.eval(xctx)?;
                Ok(XPathValue::Boolean(equality(&lres, &rres, *negate)))
            }
            Expr::Relational {
                left,
                right,
                less,
                equal,
            } => {
                let lres = left.eval(xctx)?;
                let rres = right.eval(xctx)?;
                Ok(XPathValue::Boolean(relational(&lres, &rres, *less, *equal)))
            }
            Expr::Additive { left, right, plus } => {
                let l = left.eval_float(xctx)?;
                let r = right.eval_float(xctx)?;
                Ok(XPathValue::Number(if *plus { l + r } else { l - r }))
            }
            Expr::Multiplicative { left, right, op } => {
                let l = left.eval_float(xctx)?;
                let r = right.eval_float(xctx)?;
                let res = match op {
                    MultiplicativeOp::Multiply => l * r,
                    MultiplicativeOp::Divide => {
                        if r == 0.0 {
                            if l == 0.0 || l.is_nan() {
                                f64::NAN
                            } else {
                                f64::INFINITY.copysign(l)
                            }
                        } else {
                            l / r
                        }
                    }
                    MultiplicativeOp::Modulo => {
                        if r == 0.0 {
                            f64::NAN
                        } else {
                            (l % r).copysign(l)
                        }
                    }
                };
                Ok(XPathValue::Number(res))
            }
            Expr::UnaryMinus { expr, negate } => {
                let res = expr.eval_float(xctx)?;
                Ok(XPathValue::Number(if *negate { -res } else { res }))
            }
            Expr::Union(l, r) => {
                let lres = l.eval(xctx)?.into_nodes()?;
                let rres = r.eval(xctx)?.into_nodes()?;
                Ok(XPathValue::Nodes(union_nodes(lres, rres)))
            }
            Expr::Literal(s) => Ok(XPathValue::Text(s.clone())),
            Expr::Number(n) => Ok(XPathValue::Number(*n)),
            Expr::Path(left, right) => {
                let ns = left.eval(xctx)?.into_nodes()?;
                let mut res = Vec::new();
                for node in ns {
                    let sub = right.eval(&xctx.update_cnode(node))?.into_nodes()?;
                    res = union_nodes(res, sub);
                }
                Ok(XPathValue::Nodes(res))
            }
            Expr::Filter {
                primary,
                predicates,
            } => {
                let ns = primary.eval(xctx)?.into_nodes()?;
                Ok(XPathValue::Nodes(Expr::apply_predicates(
                    predicates, ns, xctx,
                )?))
            }
            Expr::Root => Ok(XPathValue::Nodes(vec![xctx.cnode.top()])),
            Expr::LocationPath(left, right) => {
                let lres = left.eval(xctx)?.into_nodes()?;
                let (axis, test, predicates) = match right.as_ref() {
                    Expr::Step {
                        axis,
                        test,
                        predicates,
                    } => (axis, test, predicates),
                    _ => {
                        return Err(Error::XPathTypeError {
                            value: "location path step".to_string(),
                        })
                    }
                };
                let mut ns: NodeSet<'a> = Vec::new();
                for node in lres {
                    ns = union_nodes(ns, node.axis_nodes(*axis, test));
                }
                Ok(XPathValue::Nodes(Expr::apply_predicates(
                    predicates, ns, xctx,
                )?))
            }
            Expr::Step {
                axis,
                test,
                predicates,
            } => {
                let ns = xctx.cnode.axis_nodes(*axis, test);
                Ok(XPathValue::Nodes(Expr::apply_predicates(
                    predicates, ns, xctx,
                )?))
            }
            Expr::Func(func) => func.eval(xctx),
        }
    }
}

/// XPath-1.0 `=`/`!=` with the existential node-set rules.
fn equality(left: &XPathValue<'_>, right: &XPathValue<'_>, negate: bool) -> bool {
    use XPathValue::*;
    match (left, right) {
        (Nodes(l), Nodes(r)) => l.iter().filter(|n| !n.is_internal_node()).any(|ln| {
            let ls = ln.node_string();
            r.iter()
                .filter(|n| !n.is_internal_node())
                .any(|rn| (rn.node_string() == ls) != negate)
        }),
        (Nodes(ns), other) | (other, Nodes(ns)) => match other {
            Boolean(b) => (!ns.is_empty() == *b) != negate,
            Number(num) => ns
                .iter()
                .filter(|n| !n.is_internal_node())
                .any(|n| (n.node_number() == *num) != negate),
            Text(s) => ns
                .iter()
                .filter(|n| !n.is_internal_node())
                .any(|n| (&n.node_string() == s) != negate),
            Nodes(_) => unreachable!(),
        },
        (Boolean(_), _) | (_, Boolean(_)) => (left.boolean() == right.boolean()) != negate,
        (Number(_), _) | (_, Number(_)) => (left.number() == right.number()) != negate,
        (Text(l), Text(r)) => (l == r) != negate,
    }
}

/// XPath-1.0 `<`/`>`/`<=`/`>=`: numeric comparison, existential over node
/// sets.
fn relational(
    left: &XPathValue<'_>,
    right: &XPathValue<'_>,
    less: bool,
    equal: bool,
) -> bool {
    let cmp = |l: f64, r: f64| match (less, equal) {
        (true, true) => l <= r,
        (true, false) => l < r,
        (false, true) => l >= r,
        (false, false) => l > r,
    };
    match (left, right) {
        (XPathValue::Nodes(l), r) => l.iter().any(|n| cmp(n.node_number(), r.number())),
        (l, XPathValue::Nodes(r)) => r.iter().any(|n| cmp(l.number(), n.node_number())),
        (l, r) => cmp(l.number(), r.number()),
    }
}

impl Func {
    fn eval<'a>(&self, xctx: &XPathContext<'a>) -> Result<XPathValue<'a>> {
        match self {
            Func::BitIsSet(nodes, name) => {
                let ns = nodes.eval(xctx)?.into_nodes()?;
                let name = name.eval_string(xctx)?;
                let res = ns.first().map_or(false, |n| n.has_bit_set(&name));
                Ok(XPathValue::Boolean(res))
            }
            Func::Boolean(e) => Ok(XPathValue::Boolean(e.eval(xctx)?.boolean())),
            Func::Ceiling(e) => Ok(XPathValue::Number(e.eval_float(xctx)?.ceil())),
            Func::Concat(parts) => {
                let mut res = String::new();
                for part in parts {
                    res.push_str(&part.eval_string(xctx)?);
                }
                Ok(XPathValue::Text(res))
            }
            Func::Contains(l, r) => {
                let ls = l.eval_string(xctx)?;
                let rs = r.eval_string(xctx)?;
                Ok(XPathValue::Boolean(ls.contains(&rs)))
            }
            Func::Count(e) => {
                let ns = e.eval(xctx)?.into_nodes()?;
                Ok(XPathValue::Number(ns.len() as f64))
            }
            Func::Current => Ok(XPathValue::Nodes(vec![xctx.origin.clone()])),
            Func::Deref(e) => {
                let ns = e.eval(xctx)?.into_nodes()?;
                let res = match ns.first() {
                    Some(node) if !node.value().is_structured() => node.deref_nodes(),
                    _ => Vec::new(),
                };
                Ok(XPathValue::Nodes(res))
            }
            Func::DerivedFrom {
                nodes,
                identity,
                or_self,
                mid,
            } => {
                let ns = nodes.eval(xctx)?.into_nodes()?;
                let iname = identity.eval_string(xctx)?;
                let target = xctx
                    .cnode
                    .context()
                    .schema_data
                    .translate_pname(&iname, mid)?;
                for node in &ns {
                    if let Some(qn) = node.identityref_value() {
                        if *or_self && qn == target {
                            return Ok(XPathValue::Boolean(true));
                        }
                        if node
                            .context()
                            .schema_data
                            .is_derived_from(&qn, &target)
                        {
                            return Ok(XPathValue::Boolean(true));
                        }
                    }
                }
                Ok(XPathValue::Boolean(false))
            }
            Func::EnumValue(e) => {
                let ns = e.eval(xctx)?.into_nodes()?;
                let res = ns
                    .first()
                    .and_then(|n| n.enum_value())
                    .map_or(f64::NAN, |v| v as f64);
                Ok(XPathValue::Number(res))
            }
            Func::False => Ok(XPathValue::Boolean(false)),
            Func::Floor(e) => Ok(XPathValue::Number(e.eval_float(xctx)?.floor())),
            Func::Last => Ok(XPathValue::Number(xctx.size as f64)),
            Func::LocalName(arg) => {
                let name = self.name_arg(arg, xctx)?;
                let local = match name.split_once(':') {
                    Some((_, local)) => local.to_string(),
                    None => name,
                };
                Ok(XPathValue::Text(local))
            }
            Func::Name(arg) => Ok(XPathValue::Text(self.name_arg(arg, xctx)?)),
            Func::NormalizeSpace(arg) => {
                let s = match arg {
                    Some(e) => e.eval_string(xctx)?,
                    None => xctx.cnode.node_string(),
                };
                Ok(XPathValue::Text(
                    s.split_whitespace().collect::<Vec<_>>().join(" "),
                ))
            }
            Func::Not(e) => Ok(XPathValue::Boolean(!e.eval(xctx)?.boolean())),
            Func::Number(arg) => {
                let res = match arg {
                    Some(e) => e.eval_float(xctx)?,
                    None => xctx.cnode.node_number(),
                };
                Ok(XPathValue::Number(res))
            }
            Func::Position => Ok(XPathValue::Number(xctx.position as f64)),
            Func::ReMatch(l, r) => {
                let text = l.eval_string(xctx)?;
                let pattern = r.eval_string(xctx)?;
                let regex = compile_xsd_regex(&pattern)?;
                Ok(XPathValue::Boolean(regex.is_match(&text)))
            }
            Func::Round(e) => {
                let v = e.eval_float(xctx)?;
                let res = if v.is_nan() || v.is_infinite() {
                    v
                } else {
                    // round-half-up, toward +inf for .5
                    (v + 0.5).floor()
                };
                Ok(XPathValue::Number(res))
            }
            Func::StartsWith(l, r) => {
                let ls = l.eval_string(xctx)?;
                let rs = r.eval_string(xctx)?;
                Ok(XPathValue::Boolean(ls.starts_with(&rs)))
            }
            Func::String(arg) => {
                let res = match arg {
                    Some(e) => e.eval_string(xctx)?,
                    None => xctx.cnode.node_string(),
                };
                Ok(XPathValue::Text(res))
            }
            Func::StringLength(arg) => {
                let s = match arg {
                    Some(e) => e.eval_string(xctx)?,
                    None => xctx.cnode.node_string(),
                };
                Ok(XPathValue::Number(s.chars().count() as f64))
            }
            Func::Substring {
                string,
                start,
                length,
            } => {
                let s = string.eval_string(xctx)?;
                let chars: Vec<char> = s.chars().collect();
                let startf = start.eval_float(xctx)?;
                if startf.is_nan() {
                    return Ok(XPathValue::Text(String::new()));
                }
                let begin = (startf + 0.5).floor() as i64 - 1;
                let res: String = match length {
                    None => chars
                        .iter()
                        .skip(begin.max(0) as usize)
                        .collect(),
                    Some(len) => {
                        let lenf = len.eval_float(xctx)?;
                        if lenf.is_nan() {
                            return Ok(XPathValue::Text(String::new()));
                        }
                        let end = if lenf.is_infinite() && lenf > 0.0 {
                            chars.len() as i64
                        } else {
                            begin + (lenf + 0.5).floor() as i64
                        };
                        chars
                            .iter()
                            .enumerate()
                            .filter(|(i, _)| (*i as i64) >= begin && (*i as i64) < end)
                            .map(|(_, c)| c)
                            .collect()
                    }
                };
                Ok(XPathValue::Text(res))
            }
            Func::SubstringAfter(l, r) => {
                let ls = l.eval_string(xctx)?;
                let rs = r.eval_string(xctx)?;
                let res = match ls.find(&rs) {
                    Some(pos) => ls[pos + rs.len()..].to_string(),
                    None => String::new(),
                };
                Ok(XPathValue::Text(res))
            }
            Func::SubstringBefore(l, r) => {
                let ls = l.eval_string(xctx)?;
                let rs = r.eval_string(xctx)?;
                let res = match ls.find(&rs) {
                    Some(pos) => ls[..pos].to_string(),
                    None => String::new(),
                };
                Ok(XPathValue::Text(res))
            }
            Func::Sum(e) => {
                let ns = e.eval(xctx)?.into_nodes()?;
                let mut res = 0.0;
                for node in &ns {
                    res += node.node_number();
                }
                Ok(XPathValue::Number(res))
            }
            Func::Translate(s, from, to) => {
                let string = s.eval_string(xctx)?;
                let from: Vec<char> = from.eval_string(xctx)?.chars().collect();
                let to: Vec<char> = to.eval_string(xctx)?.chars().collect();
                let res = string
                    .chars()
                    .filter_map(|c| match from.iter().position(|f| *f == c) {
                        Some(i) => to.get(i).copied(),
                        None => Some(c),
                    })
                    .collect();
                Ok(XPathValue::Text(res))
            }
            Func::True => Ok(XPathValue::Boolean(true)),
        }
    }

    fn name_arg(
        &self,
        arg: &Option<Box<Expr>>,
        xctx: &XPathContext<'_>,
    ) -> Result<String> {
        let node = match arg {
            None => Some(xctx.cnode.clone()),
            Some(e) => e.eval(xctx)?.into_nodes()?.into_iter().next(),
        };
        Ok(node.and_then(|n| n.instance_name()).unwrap_or_default())
    }
}
