//
// Copyright (c) The yangtree Core Contributors
//
// SPDX-License-Identifier: MIT
//

//! Schema patterns: a derivative-based grammar of permitted child members.
//!
//! Every internal schema node compiles its children into one pattern. A
//! member sequence is accepted iff the pattern's repeated derivative is
//! nullable at the end, which validates membership, multiplicity, choice
//! selection and mandatory presence in one mechanism. Patterns are
//! immutable and shared; `when` conditions are re-evaluated against the
//! instance tree on every validation pass.

use std::sync::Arc;

use crate::data::{ContentType, InstanceNode};
use crate::error::Result;
use crate::value::InstanceName;
use crate::xpath::Expr;

/// Derivative-based pattern over the members of one object.
#[derive(Debug)]
pub enum SchemaPattern {
    /// Matches the empty member sequence.
    Empty,
    /// Empty in configuration, not allowed otherwise.
    EmptyConfig,
    /// Matches nothing.
    NotAllowed,
    /// Exactly one member with the given instance name; linear (consumed
    /// by its derivative).
    Member {
        name: InstanceName,
        ctype: ContentType,
        when: Option<Arc<Expr>>,
    },
    /// Either alternative.
    Alternative(Arc<SchemaPattern>, Arc<SchemaPattern>),
    /// Both operands, interleaved in any order.
    Pair(Arc<SchemaPattern>, Arc<SchemaPattern>),
    /// A single choice among cases.
    Choice {
        left: Arc<SchemaPattern>,
        right: Arc<SchemaPattern>,
        name: String,
        ctype: ContentType,
    },
    /// Active only while the `when` condition holds.
    Conditional {
        pattern: Arc<SchemaPattern>,
        when: Arc<Expr>,
    },
}

/// Evaluation hooks a pattern needs while validating one object: `when`
/// expressions are evaluated with the focused member (or a placeholder for
/// a missing one) as the context node.
pub(crate) struct PatternEval<'a, 'b> {
    pub(crate) parent: &'b InstanceNode<'a>,
}

impl PatternEval<'_, '_> {
    fn member_when(&self, name: &str, when: &Expr) -> Result<bool> {
        let cnode = self.parent.member_or_placeholder(name);
        Ok(when.evaluate(&cnode)?.boolean())
    }

    fn node_when(&self, when: &Expr) -> Result<bool> {
        Ok(when.evaluate(self.parent)?.boolean())
    }
}

impl SchemaPattern {
    pub(crate) fn empty() -> Arc<SchemaPattern> {
        Arc::new(SchemaPattern::Empty)
    }

    pub(crate) fn not_allowed() -> Arc<SchemaPattern> {
        Arc::new(SchemaPattern::NotAllowed)
    }

    /// Make `p` optional.
    pub(crate) fn optional(p: Arc<SchemaPattern>) -> Arc<SchemaPattern> {
        Self::alternative(Self::empty(), p)
    }

    /// Make `p` optional in configuration only.
    pub(crate) fn optional_config(p: Arc<SchemaPattern>) -> Arc<SchemaPattern> {
        Self::alternative(Arc::new(SchemaPattern::EmptyConfig), p)
    }

    /// `Alternative` constructor eliminating `NotAllowed` operands.
    pub(crate) fn alternative(
        p: Arc<SchemaPattern>,
        q: Arc<SchemaPattern>,
    ) -> Arc<SchemaPattern> {
        if matches!(*p, SchemaPattern::NotAllowed) {
            return q;
        }
        if matches!(*q, SchemaPattern::NotAllowed) {
            return p;
        }
        Arc::new(SchemaPattern::Alternative(p, q))
    }

    /// `Pair` constructor eliminating `Empty` operands and propagating
    /// `NotAllowed`.
    pub(crate) fn pair(p: Arc<SchemaPattern>, q: Arc<SchemaPattern>) -> Arc<SchemaPattern> {
        if matches!(*p, SchemaPattern::Empty) {
            return q;
        }
        if matches!(*q, SchemaPattern::Empty) {
            return p;
        }
        if matches!(*p, SchemaPattern::NotAllowed) {
            return p;
        }
        if matches!(*q, SchemaPattern::NotAllowed) {
            return q;
        }
        Arc::new(SchemaPattern::Pair(p, q))
    }

    /// Return whether the pattern accepts the empty member sequence for the
    /// given content type.
    pub(crate) fn nullable(
        &self,
        ctype: ContentType,
        eval: &PatternEval<'_, '_>,
    ) -> Result<bool> {
        match self {
            SchemaPattern::Empty => Ok(true),
            SchemaPattern::EmptyConfig => Ok(ctype == ContentType::CONFIG),
            SchemaPattern::NotAllowed => Ok(false),
            SchemaPattern::Member { name, ctype: mct, when } => {
                let active = mct.intersects(ctype)
                    && match when {
                        Some(when) => eval.member_when(name, when)?,
                        None => true,
                    };
                Ok(!active)
            }
            SchemaPattern::Alternative(p, q) => {
                Ok(p.nullable(ctype, eval)? || q.nullable(ctype, eval)?)
            }
            SchemaPattern::Pair(p, q) => {
                Ok(p.nullable(ctype, eval)? && q.nullable(ctype, eval)?)
            }
            SchemaPattern::Choice { ctype: ct, .. } => Ok(!ct.intersects(ctype)),
            SchemaPattern::Conditional { pattern, when } => {
                if !eval.node_when(when)? {
                    return Ok(true);
                }
                pattern.nullable(ctype, eval)
            }
        }
    }

    /// Derivative of the pattern with respect to a member name.
    pub(crate) fn deriv(
        self: &Arc<SchemaPattern>,
        x: &str,
        ctype: ContentType,
        eval: &PatternEval<'_, '_>,
    ) -> Result<Arc<SchemaPattern>> {
        match self.as_ref() {
            SchemaPattern::Empty
            | SchemaPattern::EmptyConfig
            | SchemaPattern::NotAllowed => Ok(Self::not_allowed()),
            SchemaPattern::Member { name, ctype: mct, when } => {
                let active = name == x
                    && mct.intersects(ctype)
                    && match when {
                        Some(when) => eval.member_when(name, when)?,
                        None => true,
                    };
                if active {
                    Ok(Self::empty())
                } else {
                    Ok(Self::not_allowed())
                }
            }
            SchemaPattern::Alternative(p, q) => Ok(Self::alternative(
                p.deriv(x, ctype, eval)?,
                q.deriv(x, ctype, eval)?,
            )),
            SchemaPattern::Pair(p, q) => Ok(Self::alternative(
                Self::pair(p.deriv(x, ctype, eval)?, q.clone()),
                Self::pair(q.deriv(x, ctype, eval)?, p.clone()),
            )),
            SchemaPattern::Choice {
                left,
                right,
                ctype: ct,
                ..
            } => {
                if !ct.intersects(ctype) {
                    return Ok(Self::not_allowed());
                }
                Ok(Self::alternative(
                    left.deriv(x, ctype, eval)?,
                    right.deriv(x, ctype, eval)?,
                ))
            }
            SchemaPattern::Conditional { pattern, when } => {
                if !eval.node_when(when)? {
                    return Ok(Self::not_allowed());
                }
                pattern.deriv(x, ctype, eval)
            }
        }
    }

    /// Names of members the pattern requires for the given content type,
    /// used in error messages when a non-nullable pattern remains.
    /// `None` signals "no single obligatory set" (an unresolved
    /// alternative).
    pub(crate) fn mandatory_members(
        &self,
        ctype: ContentType,
        eval: &PatternEval<'_, '_>,
    ) -> Result<Option<Vec<InstanceName>>> {
        match self {
            SchemaPattern::Empty | SchemaPattern::NotAllowed => Ok(None),
            SchemaPattern::EmptyConfig => {
                if ctype.intersects(ContentType::NONCONFIG) {
                    Ok(Some(Vec::new()))
                } else {
                    Ok(None)
                }
            }
            SchemaPattern::Member { name, ctype: mct, when } => {
                let active = mct.intersects(ctype)
                    && match when {
                        Some(when) => eval.member_when(name, when)?,
                        None => true,
                    };
                if active {
                    Ok(Some(vec![name.clone()]))
                } else {
                    Ok(None)
                }
            }
            SchemaPattern::Alternative(p, q)
            | SchemaPattern::Choice {
                left: p, right: q, ..
            } => {
                let lm = p.mandatory_members(ctype, eval)?;
                let rm = q.mandatory_members(ctype, eval)?;
                match (lm, rm) {
                    (Some(mut l), Some(r)) => {
                        l.extend(r);
                        Ok(Some(l))
                    }
                    _ => Ok(None),
                }
            }
            SchemaPattern::Pair(p, q) => {
                let lm = p.mandatory_members(ctype, eval)?;
                let rm = q.mandatory_members(ctype, eval)?;
                match (lm, rm) {
                    (None, rm) => Ok(rm),
                    (lm, None) => Ok(lm),
                    (Some(mut l), Some(r)) => {
                        l.extend(r);
                        Ok(Some(l))
                    }
                }
            }
            SchemaPattern::Conditional { pattern, when } => {
                if !eval.node_when(when)? {
                    return Ok(None);
                }
                pattern.mandatory_members(ctype, eval)
            }
        }
    }

    /// Indented tree rendition for debugging.
    pub fn tree(&self, indent: usize) -> String {
        let pad = " ".repeat(indent);
        match self {
            SchemaPattern::Empty => format!("{}Empty", pad),
            SchemaPattern::EmptyConfig => format!("{}EmptyConfig", pad),
            SchemaPattern::NotAllowed => format!("{}NotAllowed", pad),
            SchemaPattern::Member { name, .. } => format!("{}Member {}", pad, name),
            SchemaPattern::Alternative(p, q) => format!(
                "{}Alternative\n{}\n{}",
                pad,
                p.tree(indent + 2),
                q.tree(indent + 2)
            ),
            SchemaPattern::Pair(p, q) => format!(
                "{}Pair\n{}\n{}",
                pad,
                p.tree(indent + 2),
                q.tree(indent + 2)
            ),
            SchemaPattern::Choice {
                left, right, name, ..
            } => format!(
                "{}Choice {}\n{}\n{}",
                pad,
                name,
                left.tree(indent + 2),
                right.tree(indent + 2)
            ),
            SchemaPattern::Conditional { pattern, .. } => {
                format!("{}Conditional\n{}", pad, pattern.tree(indent + 2))
            }
        }
    }
}
