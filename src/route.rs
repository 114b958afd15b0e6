//
// Copyright (c) The yangtree Core Contributors
//
// SPDX-License-Identifier: MIT
//

//! Routes into instance values.
//!
//! An [`InstanceRoute`] is an ordered sequence of selectors addressing a
//! location inside an instance value. Its canonical wire form is the YANG
//! instance-identifier string; equality and hashing go through that string.
//! Routes are produced by the instance-identifier and RESTCONF resource-id
//! parsers and by cursors reporting their position.

use std::fmt;
use std::hash::{Hash, Hasher};

use crate::context::Context;
use crate::error::{Error, Result};
use crate::parser::Parser;
use crate::schema::{SchemaNode, SchemaNodeKind};

/// One selector of an [`InstanceRoute`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RouteItem {
    /// Object member; `ns` is present when it differs from the parent's.
    MemberName { name: String, ns: Option<String> },
    /// Name of an action or rpc (RESTCONF operation resources only).
    ActionName { name: String, ns: Option<String> },
    /// Positional selector (0-based internally, 1-based in text form).
    EntryIndex(usize),
    /// Leaf-list entry selected by its canonical value.
    EntryValue(String),
    /// List entry selected by key values (canonical strings).
    EntryKeys(Vec<((String, Option<String>), String)>),
}

impl RouteItem {
    /// Instance name of a member selector.
    pub(crate) fn iname(name: &str, ns: &Option<String>) -> String {
        match ns {
            Some(ns) => format!("{}:{}", ns, name),
            None => name.to_string(),
        }
    }
}

impl fmt::Display for RouteItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RouteItem::MemberName { name, ns } | RouteItem::ActionName { name, ns } => {
                write!(f, "/{}", RouteItem::iname(name, ns))
            }
            RouteItem::EntryIndex(i) => write!(f, "[{}]", i + 1),
            RouteItem::EntryValue(v) => write!(f, "[.={:?}]", v),
            RouteItem::EntryKeys(keys) => {
                for ((name, ns), val) in keys {
                    write!(f, "[{}={:?}]", RouteItem::iname(name, ns), val)?;
                }
                Ok(())
            }
        }
    }
}

/// Route into an instance value; also the cooked value of the
/// `instance-identifier` type.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InstanceRoute(pub Vec<RouteItem>);

impl InstanceRoute {
    /// The sub-route addressing data resources: everything after the last
    /// action name, or the whole route when no action is present. Action
    /// nodes are not data nodes, so a route ending at an action has an
    /// empty data path.
    pub fn data_path(&self) -> InstanceRoute {
        match self
            .0
            .iter()
            .rposition(|it| matches!(it, RouteItem::ActionName { .. }))
        {
            Some(pos) => InstanceRoute(self.0[pos + 1..].to_vec()),
            None => self.clone(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for InstanceRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return write!(f, "/");
        }
        for item in &self.0 {
            write!(f, "{}", item)?;
        }
        Ok(())
    }
}

impl Hash for InstanceRoute {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.to_string().hash(state);
    }
}

/// Parse a YANG instance-identifier string into a route.
///
/// The grammar is schema-free: member names keep their prefixes, entry
/// values and keys stay in their (unquoted) string form and are cooked only
/// when the route is resolved against an instance tree.
pub fn parse_instance_id(text: &str) -> Result<InstanceRoute> {
    let mut p = Parser::new(text);
    let mut res = Vec::new();
    if text == "/" {
        return Ok(InstanceRoute(res));
    }
    loop {
        p.char('/')?;
        let (name, prefix) = p.prefixed_name()?;
        res.push(RouteItem::MemberName {
            name: name.to_string(),
            ns: prefix.map(str::to_string),
        });
        if p.at_end() {
            return Ok(InstanceRoute(res));
        }
        while p.try_peek() == Some('[') {
            p.advance();
            p.skip_ws();
            match p.peek()? {
                c if c.is_ascii_digit() => {
                    let index = p.unsigned_integer()?;
                    if index == 0 {
                        return Err(p.error_unexpected("positive index"));
                    }
                    p.skip_ws();
                    p.char(']')?;
                    res.push(RouteItem::EntryIndex(index as usize - 1));
                }
                '.' => {
                    p.advance();
                    res.push(RouteItem::EntryValue(get_value(&mut p)?));
                }
                _ => {
                    let mut keys = Vec::new();
                    loop {
                        let (kname, kprefix) = p.prefixed_name()?;
                        let val = get_value(&mut p)?;
                        keys.push((
                            (kname.to_string(), kprefix.map(str::to_string)),
                            val,
                        ));
                        if !p.test_string("[") {
                            break;
                        }
                        p.skip_ws();
                    }
                    res.push(RouteItem::EntryKeys(keys));
                }
            }
        }
        if p.at_end() {
            return Ok(InstanceRoute(res));
        }
    }
}

/// Parse `= "value"` or `= 'value'` followed by `]`.
fn get_value(p: &mut Parser<'_>) -> Result<String> {
    p.skip_ws();
    p.char('=')?;
    p.skip_ws();
    let quote = p.one_of("'\"")?;
    let val = p.up_to(quote)?.to_string();
    p.skip_ws();
    p.char(']')?;
    Ok(val)
}

/// Parse a RESTCONF data resource identifier into a route.
///
/// Member resolution is schema-driven: an unprefixed name inherits the
/// namespace of its parent, and `=`-separated keys are matched against the
/// target list's key leaves (percent-encoding decoded).
pub(crate) fn parse_resource_id(text: &str, context: &Context) -> Result<InstanceRoute> {
    let mut p = Parser::new(text);
    let mut res = Vec::new();
    if p.at_end() {
        return Ok(InstanceRoute(res));
    }
    if p.try_peek() == Some('/') {
        p.advance();
    }
    if p.at_end() {
        return Ok(InstanceRoute(res));
    }
    let mut sn = context.schema_root();
    loop {
        let (name, prefix) = p.prefixed_name()?;
        let ns = prefix.map(str::to_string);
        let cn = sn.get_data_child(name, ns.as_deref());
        let cn = match cn {
            Some(cn) => cn,
            None => {
                // an action or rpc terminates the resource path
                let action = sn.children().find(|c| {
                    c.kind() == SchemaNodeKind::RpcAction
                        && c.name() == Some(name)
                        && ns.as_deref().map_or(true, |n| c.namespace() == Some(n))
                });
                if action.is_some() {
                    res.push(RouteItem::ActionName {
                        name: name.to_string(),
                        ns,
                    });
                    return Ok(InstanceRoute(res));
                }
                return Err(Error::NonexistentSchemaNode {
                    parent: sn.data_path(),
                    name: RouteItem::iname(name, &ns),
                });
            }
        };
        res.push(RouteItem::MemberName {
            name: name.to_string(),
            ns: match cn.namespace() {
                Some(cns) if sn.namespace() != Some(cns) => Some(cns.to_string()),
                _ => ns,
            },
        });
        if p.at_end() {
            return Ok(InstanceRoute(res));
        }
        match cn.kind() {
            SchemaNodeKind::List | SchemaNodeKind::LeafList => {
                p.char('=')?;
                res.push(key_values(&mut p, &cn)?);
                if p.at_end() {
                    return Ok(InstanceRoute(res));
                }
                p.char('/')?;
            }
            _ => {
                p.char('/')?;
            }
        }
        sn = cn;
    }
}

/// Parse a leaf-list value or comma-separated list keys.
fn key_values(p: &mut Parser<'_>, sn: &SchemaNode<'_>) -> Result<RouteItem> {
    let keys = match p.input[p.offset..].find('/') {
        Some(pos) => {
            let res = &p.input[p.offset..p.offset + pos];
            p.offset += pos;
            res
        }
        None => p.remaining(),
    };
    if keys.is_empty() {
        return Err(p.error_unexpected("entry value or keys"));
    }
    if sn.kind() == SchemaNodeKind::LeafList {
        return Ok(RouteItem::EntryValue(percent_decode(keys)?));
    }
    let key_names = sn.list_keys_qnames();
    let parts: Vec<&str> = keys.split(',').collect();
    if parts.len() != key_names.len() {
        return Err(p.error_unexpected(&format!("exactly {} keys", key_names.len())));
    }
    let mut sel = Vec::new();
    for (part, qname) in parts.iter().zip(key_names) {
        let ns = if sn.namespace() == Some(qname.1.as_str()) {
            None
        } else {
            Some(qname.1.clone())
        };
        sel.push(((qname.0.clone(), ns), percent_decode(part)?));
    }
    Ok(RouteItem::EntryKeys(sel))
}

/// Decode RFC 3986 percent-encoding.
fn percent_decode(text: &str) -> Result<String> {
    let bytes = text.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = bytes
                .get(i + 1..i + 3)
                .and_then(|h| std::str::from_utf8(h).ok())
                .and_then(|h| u8::from_str_radix(h, 16).ok());
            match hex {
                Some(b) => {
                    out.push(b);
                    i += 3;
                }
                None => {
                    return Err(Error::InvalidKeyValue {
                        value: text.to_string(),
                    })
                }
            }
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).map_err(|_| Error::InvalidKeyValue {
        value: text.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn instance_id_round_trip() {
        for text in &[
            "/ex:top/list[name=\"a\"][sub:other=\"b\"]/leaf",
            "/ex:top/ll[.=\"x y\"]",
            "/ex:top/list[3]",
        ] {
            let route = parse_instance_id(text).expect("Failed to parse");
            let printed = route.to_string();
            assert_eq!(parse_instance_id(&printed).unwrap(), route);
        }
    }

    #[test]
    fn instance_id_items() {
        let route = parse_instance_id("/a:b/c[2]").unwrap();
        assert_eq!(
            route.0,
            vec![
                RouteItem::MemberName {
                    name: "b".to_string(),
                    ns: Some("a".to_string())
                },
                RouteItem::MemberName {
                    name: "c".to_string(),
                    ns: None
                },
                RouteItem::EntryIndex(1),
            ]
        );
    }

    #[test]
    fn root_route() {
        assert!(parse_instance_id("/").unwrap().is_empty());
        assert_eq!(parse_instance_id("/").unwrap().to_string(), "/");
    }

    #[test]
    fn zero_index_rejected() {
        assert!(parse_instance_id("/a:b[0]").is_err());
    }

    #[test]
    fn percent_decoding() {
        assert_eq!(percent_decode("a%2Cb%20c").unwrap(), "a,b c");
        assert!(percent_decode("bad%2").is_err());
    }
}
