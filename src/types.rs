//
// Copyright (c) The yangtree Core Contributors
//
// SPDX-License-Identifier: MIT
//

//! The YANG type system: cooked scalar values, constraints and codecs.
//!
//! Every [`DataType`] knows how to cook a raw (JSON) value, parse a
//! canonical string, serialize back to both forms, and check membership
//! against its constraints. Constraints annotated in the module text carry
//! the custom `error-app-tag`/`error-message` along.

use std::convert::TryFrom;
use std::sync::Arc;

use base64::prelude::{Engine, BASE64_STANDARD};
use indexmap::IndexMap;
use num_traits::ToPrimitive;
use regex::Regex;
use serde_json::Value as RawValue;

use crate::context::{QualName, SchemaContext, SchemaData};
use crate::error::{Error, Result};
use crate::route::{parse_instance_id, InstanceRoute};
use crate::statement::Statement;
use crate::xpath::{Expr, XPathParser};

/// A cooked scalar value of an instance node.
#[derive(Clone, Debug, PartialEq)]
pub enum ScalarValue {
    Int8(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    Uint8(u8),
    Uint16(u16),
    Uint32(u32),
    Uint64(u64),
    /// Value scaled by `10^fraction_digits`.
    Decimal64 { value: i64, fraction_digits: u8 },
    Bool(bool),
    Empty,
    String(String),
    Binary(Vec<u8>),
    Enum(String),
    /// Bit names in canonical (position) order.
    Bits(Vec<String>),
    /// Qualified identity: local name plus defining module name.
    IdentityRef { name: String, ns: String },
    InstanceId(InstanceRoute),
}

impl ScalarValue {
    /// Canonical string form per RFC 7950.
    pub fn canonical_string(&self) -> String {
        match self {
            ScalarValue::Int8(v) => v.to_string(),
            ScalarValue::Int16(v) => v.to_string(),
            ScalarValue::Int32(v) => v.to_string(),
            ScalarValue::Int64(v) => v.to_string(),
            ScalarValue::Uint8(v) => v.to_string(),
            ScalarValue::Uint16(v) => v.to_string(),
            ScalarValue::Uint32(v) => v.to_string(),
            ScalarValue::Uint64(v) => v.to_string(),
            ScalarValue::Decimal64 {
                value,
                fraction_digits,
            } => format_decimal(*value, *fraction_digits),
            ScalarValue::Bool(v) => v.to_string(),
            ScalarValue::Empty => String::new(),
            ScalarValue::String(v) => v.clone(),
            ScalarValue::Binary(v) => BASE64_STANDARD.encode(v),
            ScalarValue::Enum(v) => v.clone(),
            ScalarValue::Bits(v) => v.join(" "),
            ScalarValue::IdentityRef { name, ns } => format!("{}:{}", ns, name),
            ScalarValue::InstanceId(route) => route.to_string(),
        }
    }

    /// Integral magnitude, when the value is an integer.
    pub(crate) fn as_i128(&self) -> Option<i128> {
        match self {
            ScalarValue::Int8(v) => Some(*v as i128),
            ScalarValue::Int16(v) => Some(*v as i128),
            ScalarValue::Int32(v) => Some(*v as i128),
            ScalarValue::Int64(v) => Some(*v as i128),
            ScalarValue::Uint8(v) => Some(*v as i128),
            ScalarValue::Uint16(v) => Some(*v as i128),
            ScalarValue::Uint32(v) => Some(*v as i128),
            ScalarValue::Uint64(v) => Some(*v as i128),
            _ => None,
        }
    }

    /// Numeric interpretation used by the XPath engine.
    pub(crate) fn as_f64(&self) -> Option<f64> {
        match self {
            ScalarValue::Decimal64 {
                value,
                fraction_digits,
            } => Some(*value as f64 / 10f64.powi(*fraction_digits as i32)),
            ScalarValue::Bool(v) => Some(if *v { 1.0 } else { 0.0 }),
            ScalarValue::String(s) => s.trim().parse().ok(),
            ScalarValue::Enum(_) | ScalarValue::Empty => None,
            other => other.as_i128().and_then(|v| v.to_f64()),
        }
    }
}

fn format_decimal(value: i64, fraction_digits: u8) -> String {
    let scale = 10i128.pow(fraction_digits as u32);
    let v = value as i128;
    let sign = if v < 0 { "-" } else { "" };
    let abs = v.abs();
    let int = abs / scale;
    let mut frac = format!(
        "{:0width$}",
        abs % scale,
        width = fraction_digits as usize
    );
    while frac.len() > 1 && frac.ends_with('0') {
        frac.pop();
    }
    format!("{}{}.{}", sign, int, frac)
}

fn parse_decimal(text: &str, fraction_digits: u8) -> Option<i64> {
    let text = text.trim();
    let (sign, rest) = match text.strip_prefix('-') {
        Some(rest) => (-1i128, rest),
        None => (1i128, text.strip_prefix('+').unwrap_or(text)),
    };
    let (int_part, frac_part) = match rest.split_once('.') {
        Some((i, f)) => (i, f),
        None => (rest, ""),
    };
    if int_part.is_empty() && frac_part.is_empty() {
        return None;
    }
    if !int_part.chars().all(|c| c.is_ascii_digit())
        || !frac_part.chars().all(|c| c.is_ascii_digit())
        || frac_part.len() > fraction_digits as usize
    {
        return None;
    }
    let scale = 10i128.pow(fraction_digits as u32);
    let int: i128 = if int_part.is_empty() {
        0
    } else {
        int_part.parse().ok()?
    };
    let mut frac: i128 = if frac_part.is_empty() {
        0
    } else {
        frac_part.parse().ok()?
    };
    frac *= 10i128.pow((fraction_digits as usize - frac_part.len()) as u32);
    let scaled = sign * (int * scale + frac);
    i64::try_from(scaled).ok()
}

// ===== constraints =====

/// A failed constraint, with the custom error annotations if declared.
#[derive(Clone, Debug, Default)]
pub struct ConstraintViolation {
    pub error_tag: Option<String>,
    pub error_message: Option<String>,
}

/// A non-empty ordered list of closed numeric intervals. Bounds live in a
/// scaled integral domain (`i128` covers every YANG numeric type, string
/// and binary lengths, and scaled decimal64).
#[derive(Clone, Debug)]
pub struct Intervals {
    intervals: Vec<(i128, i128)>,
    pub error_tag: Option<String>,
    pub error_message: Option<String>,
}

impl Intervals {
    pub fn new(lo: i128, hi: i128) -> Intervals {
        Intervals {
            intervals: vec![(lo, hi)],
            error_tag: None,
            error_message: None,
        }
    }

    pub fn contains(&self, value: i128) -> bool {
        self.intervals.iter().any(|(lo, hi)| *lo <= value && value <= *hi)
    }

    /// Restrict the receiver with a `range` or `length` expression
    /// (`min..max | a..b | n`). Each new bound must fall inside the
    /// existing interval set: narrowing is allowed, widening is an error.
    pub fn restrict_with(
        &mut self,
        expr: &str,
        parse: &dyn Fn(&str) -> Option<i128>,
        error_tag: Option<String>,
        error_message: Option<String>,
    ) -> Result<()> {
        let invalid = || Error::InvalidArgument {
            argument: expr.to_string(),
        };
        let parse_num = |text: &str| parse(text).ok_or_else(invalid);
        let lo_limit = self.intervals[0].0;
        let hi_limit = self.intervals[self.intervals.len() - 1].1;
        let mut pieces: Vec<Vec<&str>> = Vec::new();
        for piece in expr.split('|') {
            let bounds: Vec<&str> = piece.split("..").map(str::trim).collect();
            if bounds.is_empty() || bounds.len() > 2 {
                return Err(invalid());
            }
            pieces.push(bounds);
        }
        let first = &pieces[0];
        let last = &pieces[pieces.len() - 1];
        let lo = if first[0] == "min" {
            lo_limit
        } else {
            parse_num(first[0])?
        };
        let hi = if last[last.len() - 1] == "max" {
            hi_limit
        } else {
            parse_num(last[last.len() - 1])?
        };
        let mut new = Vec::new();
        if pieces.len() == 1 {
            new.push((lo, hi));
        } else {
            new.push((lo, parse_num(first[first.len() - 1])?));
            for piece in &pieces[1..pieces.len() - 1] {
                let plo = parse_num(piece[0])?;
                let phi = parse_num(piece[piece.len() - 1])?;
                new.push((plo, phi));
            }
            new.push((parse_num(last[0])?, hi));
        }
        for (lo, hi) in &new {
            if lo > hi || !self.contains(*lo) || !self.contains(*hi) {
                return Err(invalid());
            }
        }
        self.intervals = new;
        if error_tag.is_some() {
            self.error_tag = error_tag;
        }
        if error_message.is_some() {
            self.error_message = error_message;
        }
        Ok(())
    }

    fn violation(&self) -> ConstraintViolation {
        ConstraintViolation {
            error_tag: self.error_tag.clone(),
            error_message: self.error_message.clone().or_else(|| {
                Some(format!("not in range {}", self.expr_string()))
            }),
        }
    }

    fn expr_string(&self) -> String {
        self.intervals
            .iter()
            .map(|(lo, hi)| {
                if lo == hi {
                    lo.to_string()
                } else {
                    format!("{}..{}", lo, hi)
                }
            })
            .collect::<Vec<_>>()
            .join(" | ")
    }
}

/// A compiled `pattern` constraint. The W3C XSD dialect is translated to
/// the host `regex` syntax at schema-build time.
#[derive(Clone, Debug)]
pub struct Pattern {
    pub pattern: String,
    pub invert_match: bool,
    regex: Regex,
    pub error_tag: Option<String>,
    pub error_message: Option<String>,
}

impl Pattern {
    pub fn new(
        pattern: &str,
        invert_match: bool,
        error_tag: Option<String>,
        error_message: Option<String>,
    ) -> Result<Pattern> {
        let regex = compile_xsd_regex(pattern)?;
        Ok(Pattern {
            pattern: pattern.to_string(),
            invert_match,
            regex,
            error_tag,
            error_message: error_message
                .or_else(|| Some(format!("pattern '{}'", pattern))),
        })
    }

    pub fn matches(&self, text: &str) -> bool {
        self.regex.is_match(text) != self.invert_match
    }

    fn violation(&self) -> ConstraintViolation {
        ConstraintViolation {
            error_tag: self.error_tag.clone(),
            error_message: self.error_message.clone(),
        }
    }
}

/// Translate a W3C XML Schema regular expression into `regex` syntax and
/// compile it (implicitly anchored at both ends).
pub(crate) fn compile_xsd_regex(pattern: &str) -> Result<Regex> {
    let invalid = || Error::InvalidArgument {
        argument: pattern.to_string(),
    };
    let mut out = String::with_capacity(pattern.len() + 8);
    out.push_str("^(?:");
    let mut chars = pattern.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            // XSD name-character classes have no regex equivalent
            Some('i') => out.push_str("[A-Za-z_:]"),
            Some('I') => out.push_str("[^A-Za-z_:]"),
            Some('c') => out.push_str("[-.0-9:A-Za-z_]"),
            Some('C') => out.push_str("[^-.0-9:A-Za-z_]"),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => return Err(invalid()),
        }
    }
    out.push_str(")$");
    Regex::new(&out).map_err(|_| invalid())
}

/// A `must` constraint: a compiled XPath expression with error annotations.
#[derive(Clone, Debug)]
pub struct Must {
    pub expression: Arc<Expr>,
    pub error_tag: String,
    pub error_message: Option<String>,
}

impl Must {
    pub(crate) fn new(
        expression: Arc<Expr>,
        error_tag: Option<&str>,
        error_message: Option<&str>,
    ) -> Must {
        Must {
            expression,
            error_tag: error_tag.unwrap_or("must-violation").to_string(),
            error_message: error_message.map(str::to_string),
        }
    }
}

// ===== the type model =====

/// Resolved YANG data type of a leaf or leaf-list.
#[derive(Clone, Debug)]
pub enum DataType {
    Int {
        width: u8,
        signed: bool,
        range: Intervals,
    },
    Decimal64 {
        fraction_digits: u8,
        range: Intervals,
    },
    String {
        length: Intervals,
        patterns: Vec<Pattern>,
    },
    Boolean,
    Empty,
    Enumeration {
        variants: IndexMap<String, i32>,
    },
    Bits {
        positions: IndexMap<String, u32>,
    },
    Binary {
        length: Intervals,
    },
    Union {
        members: Vec<DataType>,
    },
    Leafref {
        path: Arc<Expr>,
        require_instance: bool,
        /// Type of the referenced leaf, resolved in a post-build pass.
        target: Option<Box<DataType>>,
    },
    InstanceIdentifier {
        require_instance: bool,
    },
    Identityref {
        bases: Vec<QualName>,
    },
}

fn int_limits(width: u8, signed: bool) -> (i128, i128) {
    if signed {
        match width {
            8 => (i8::MIN as i128, i8::MAX as i128),
            16 => (i16::MIN as i128, i16::MAX as i128),
            32 => (i32::MIN as i128, i32::MAX as i128),
            _ => (i64::MIN as i128, i64::MAX as i128),
        }
    } else {
        match width {
            8 => (0, u8::MAX as i128),
            16 => (0, u16::MAX as i128),
            32 => (0, u32::MAX as i128),
            _ => (0, u64::MAX as i128),
        }
    }
}

fn cook_int(value: i128, width: u8, signed: bool) -> Option<ScalarValue> {
    let (lo, hi) = int_limits(width, signed);
    if value < lo || value > hi {
        return None;
    }
    Some(match (signed, width) {
        (true, 8) => ScalarValue::Int8(value as i8),
        (true, 16) => ScalarValue::Int16(value as i16),
        (true, 32) => ScalarValue::Int32(value as i32),
        (true, _) => ScalarValue::Int64(value as i64),
        (false, 8) => ScalarValue::Uint8(value as u8),
        (false, 16) => ScalarValue::Uint16(value as u16),
        (false, 32) => ScalarValue::Uint32(value as u32),
        (false, _) => ScalarValue::Uint64(value as u64),
    })
}

fn parse_int_text(text: &str) -> Option<i128> {
    let text = text.trim();
    let (sign, rest) = match text.strip_prefix('-') {
        Some(rest) => (-1i128, rest),
        None => (1i128, text.strip_prefix('+').unwrap_or(text)),
    };
    let value = if let Some(hex) = rest.strip_prefix("0x").or_else(|| rest.strip_prefix("0X")) {
        i128::from_str_radix(hex, 16).ok()?
    } else {
        rest.parse().ok()?
    };
    Some(sign * value)
}

impl DataType {
    /// Human description of the raw shape this type expects (for
    /// raw-type-error messages).
    pub fn expected_shape(&self) -> &'static str {
        match self {
            DataType::Int { width: 64, .. } | DataType::Decimal64 { .. } => {
                "string or number"
            }
            DataType::Int { .. } => "integer",
            DataType::String { .. } => "string",
            DataType::Boolean => "boolean",
            DataType::Empty => "[null]",
            DataType::Enumeration { .. } => "enum name",
            DataType::Bits { .. } => "bit names",
            DataType::Binary { .. } => "base64 string",
            DataType::Union { .. } => "union member value",
            DataType::Leafref { .. } => "leafref target value",
            DataType::InstanceIdentifier { .. } => "instance identifier",
            DataType::Identityref { .. } => "identity name",
        }
    }

    /// Cook a raw (JSON encoded per RFC 7951) value. `ns` is the namespace
    /// of the leaf, used for unqualified identityref values.
    pub fn parse_raw(&self, raw: &RawValue, ns: &str) -> Option<ScalarValue> {
        match self {
            DataType::Int { width, signed, .. } => {
                let value = match raw {
                    RawValue::Number(n) => {
                        if let Some(i) = n.as_i64() {
                            i as i128
                        } else {
                            n.as_u64()? as i128
                        }
                    }
                    // 64-bit integers are encoded as strings
                    RawValue::String(s) if *width == 64 => parse_int_text(s)?,
                    _ => return None,
                };
                cook_int(value, *width, *signed)
            }
            DataType::Decimal64 {
                fraction_digits, ..
            } => {
                let text = match raw {
                    RawValue::String(s) => s.clone(),
                    RawValue::Number(n) => n.to_string(),
                    _ => return None,
                };
                Some(ScalarValue::Decimal64 {
                    value: parse_decimal(&text, *fraction_digits)?,
                    fraction_digits: *fraction_digits,
                })
            }
            DataType::String { .. } => match raw {
                RawValue::String(s) => Some(ScalarValue::String(s.clone())),
                _ => None,
            },
            DataType::Boolean => match raw {
                RawValue::Bool(b) => Some(ScalarValue::Bool(*b)),
                _ => None,
            },
            DataType::Empty => match raw {
                RawValue::Array(a) if a.len() == 1 && a[0].is_null() => {
                    Some(ScalarValue::Empty)
                }
                _ => None,
            },
            DataType::Enumeration { .. } => match raw {
                RawValue::String(s) => Some(ScalarValue::Enum(s.clone())),
                _ => None,
            },
            DataType::Bits { positions } => match raw {
                RawValue::String(s) => Some(cook_bits(s, positions)),
                _ => None,
            },
            DataType::Binary { .. } => match raw {
                RawValue::String(s) => {
                    BASE64_STANDARD.decode(s).ok().map(ScalarValue::Binary)
                }
                _ => None,
            },
            DataType::Union { members } => members
                .iter()
                .find_map(|member| member.parse_raw(raw, ns)),
            DataType::Leafref { target, .. } => match target {
                Some(target) => target.parse_raw(raw, ns),
                None => match raw {
                    RawValue::String(s) => Some(ScalarValue::String(s.clone())),
                    _ => None,
                },
            },
            DataType::InstanceIdentifier { .. } => match raw {
                RawValue::String(s) => {
                    parse_instance_id(s).ok().map(ScalarValue::InstanceId)
                }
                _ => None,
            },
            DataType::Identityref { .. } => match raw {
                RawValue::String(s) => Some(cook_identityref(s, ns)),
                _ => None,
            },
        }
    }

    /// Parse a canonical string form (used for defaults, XML content and
    /// key predicates).
    pub fn parse_canonical(&self, text: &str, ns: &str) -> Option<ScalarValue> {
        match self {
            DataType::Int { width, signed, .. } => {
                cook_int(parse_int_text(text)?, *width, *signed)
            }
            DataType::Decimal64 {
                fraction_digits, ..
            } => Some(ScalarValue::Decimal64 {
                value: parse_decimal(text, *fraction_digits)?,
                fraction_digits: *fraction_digits,
            }),
            DataType::String { .. } => Some(ScalarValue::String(text.to_string())),
            DataType::Boolean => match text {
                "true" => Some(ScalarValue::Bool(true)),
                "false" => Some(ScalarValue::Bool(false)),
                _ => None,
            },
            DataType::Empty => {
                if text.is_empty() {
                    Some(ScalarValue::Empty)
                } else {
                    None
                }
            }
            DataType::Enumeration { .. } => Some(ScalarValue::Enum(text.to_string())),
            DataType::Bits { positions } => Some(cook_bits(text, positions)),
            DataType::Binary { .. } => {
                BASE64_STANDARD.decode(text).ok().map(ScalarValue::Binary)
            }
            DataType::Union { members } => members
                .iter()
                .find_map(|member| {
                    let v = member.parse_canonical(text, ns)?;
                    member.check(&v).ok()?;
                    Some(v)
                }),
            DataType::Leafref { target, .. } => match target {
                Some(target) => target.parse_canonical(text, ns),
                None => Some(ScalarValue::String(text.to_string())),
            },
            DataType::InstanceIdentifier { .. } => {
                parse_instance_id(text).ok().map(ScalarValue::InstanceId)
            }
            DataType::Identityref { .. } => Some(cook_identityref(text, ns)),
        }
    }

    /// Emit the raw (JSON) form of a cooked value.
    pub fn to_raw(&self, value: &ScalarValue) -> RawValue {
        match value {
            ScalarValue::Int8(v) => RawValue::from(*v),
            ScalarValue::Int16(v) => RawValue::from(*v),
            ScalarValue::Int32(v) => RawValue::from(*v),
            ScalarValue::Int64(v) => RawValue::from(v.to_string()),
            ScalarValue::Uint8(v) => RawValue::from(*v),
            ScalarValue::Uint16(v) => RawValue::from(*v),
            ScalarValue::Uint32(v) => RawValue::from(*v),
            ScalarValue::Uint64(v) => RawValue::from(v.to_string()),
            ScalarValue::Decimal64 { .. } => RawValue::from(value.canonical_string()),
            ScalarValue::Bool(v) => RawValue::from(*v),
            ScalarValue::Empty => RawValue::Array(vec![RawValue::Null]),
            ScalarValue::String(v) => RawValue::from(v.as_str()),
            ScalarValue::Binary(_)
            | ScalarValue::Enum(_)
            | ScalarValue::Bits(_)
            | ScalarValue::IdentityRef { .. }
            | ScalarValue::InstanceId(_) => RawValue::from(value.canonical_string()),
        }
    }

    /// Canonical string form of a cooked value.
    pub fn canonical_string(&self, value: &ScalarValue) -> String {
        value.canonical_string()
    }

    /// Check a cooked value against the type and its constraints.
    pub fn check(&self, value: &ScalarValue) -> std::result::Result<(), ConstraintViolation> {
        let shape_error = || ConstraintViolation {
            error_tag: None,
            error_message: Some(format!("expected {}", self.expected_shape())),
        };
        match self {
            DataType::Int { width, signed, range } => {
                let v = value.as_i128().ok_or_else(shape_error)?;
                let (lo, hi) = int_limits(*width, *signed);
                if v < lo || v > hi {
                    return Err(shape_error());
                }
                if !range.contains(v) {
                    return Err(range.violation());
                }
                Ok(())
            }
            DataType::Decimal64 {
                fraction_digits,
                range,
            } => match value {
                ScalarValue::Decimal64 {
                    value: v,
                    fraction_digits: fd,
                } if fd == fraction_digits => {
                    if !range.contains(*v as i128) {
                        return Err(range.violation());
                    }
                    Ok(())
                }
                _ => Err(shape_error()),
            },
            DataType::String { length, patterns } => match value {
                ScalarValue::String(s) => {
                    if !length.contains(s.chars().count() as i128) {
                        return Err(length.violation());
                    }
                    for pattern in patterns {
                        if !pattern.matches(s) {
                            return Err(pattern.violation());
                        }
                    }
                    Ok(())
                }
                _ => Err(shape_error()),
            },
            DataType::Boolean => match value {
                ScalarValue::Bool(_) => Ok(()),
                _ => Err(shape_error()),
            },
            DataType::Empty => match value {
                ScalarValue::Empty => Ok(()),
                _ => Err(shape_error()),
            },
            DataType::Enumeration { variants } => match value {
                ScalarValue::Enum(name) if variants.contains_key(name) => Ok(()),
                _ => Err(shape_error()),
            },
            DataType::Bits { positions } => match value {
                ScalarValue::Bits(names)
                    if names.iter().all(|n| positions.contains_key(n)) =>
                {
                    Ok(())
                }
                _ => Err(shape_error()),
            },
            DataType::Binary { length } => match value {
                ScalarValue::Binary(bytes) => {
                    if !length.contains(bytes.len() as i128) {
                        return Err(length.violation());
                    }
                    Ok(())
                }
                _ => Err(shape_error()),
            },
            DataType::Union { members } => {
                if members.iter().any(|m| m.check(value).is_ok()) {
                    Ok(())
                } else {
                    Err(shape_error())
                }
            }
            DataType::Leafref { target, .. } => match target {
                Some(target) => target.check(value),
                None => Ok(()),
            },
            DataType::InstanceIdentifier { .. } => match value {
                ScalarValue::InstanceId(_) => Ok(()),
                _ => Err(shape_error()),
            },
            DataType::Identityref { .. } => match value {
                ScalarValue::IdentityRef { .. } => Ok(()),
                _ => Err(shape_error()),
            },
        }
    }

    /// The enum value assigned to a variant name, if this is an
    /// enumeration (used by the XPath `enum-value` function).
    pub fn enum_value(&self, name: &str) -> Option<i32> {
        match self {
            DataType::Enumeration { variants } => variants.get(name).copied(),
            DataType::Leafref {
                target: Some(target),
                ..
            } => target.enum_value(name),
            _ => None,
        }
    }
}

fn cook_bits(text: &str, positions: &IndexMap<String, u32>) -> ScalarValue {
    let mut names: Vec<String> = text.split_whitespace().map(str::to_string).collect();
    names.sort_by_key(|n| positions.get(n).copied().unwrap_or(u32::MAX));
    names.dedup();
    ScalarValue::Bits(names)
}

fn cook_identityref(text: &str, ns: &str) -> ScalarValue {
    match text.split_once(':') {
        Some((prefix, local)) => ScalarValue::IdentityRef {
            name: local.to_string(),
            ns: prefix.to_string(),
        },
        None => ScalarValue::IdentityRef {
            name: text.to_string(),
            ns: ns.to_string(),
        },
    }
}

// ===== building types from statements =====

/// A resolved `type` statement together with inherited default and units.
#[derive(Clone, Debug)]
pub(crate) struct TypeSpec {
    pub(crate) dtype: DataType,
    pub(crate) default: Option<String>,
    pub(crate) units: Option<String>,
}

/// Resolve a `type` statement (following typedef chains) into a concrete
/// [`DataType`].
pub(crate) fn build_type(
    stmt: Statement<'_>,
    sctx: &SchemaContext,
    sdata: &SchemaData,
) -> Result<TypeSpec> {
    let tname = stmt.argument_required()?;
    let local = tname.split_once(':').map_or(tname, |(_, local)| local);
    let mut spec = if tname.contains(':') || !is_builtin_type(local) {
        // derived type: recurse into the typedef
        let (defst, dctx) = sdata.get_definition(&stmt, sctx)?;
        let mut spec = build_type(defst.find1_required("type")?, &dctx, sdata)?;
        if let Some(dflt) = defst.find1("default") {
            spec.default = Some(dflt.argument_required()?.to_string());
        }
        if let Some(units) = defst.find1("units") {
            spec.units = Some(units.argument_required()?.to_string());
        }
        spec
    } else {
        TypeSpec {
            dtype: base_type(local, stmt, sctx, sdata)?,
            default: None,
            units: None,
        }
    };
    apply_restrictions(&mut spec.dtype, stmt, sctx, sdata)?;
    Ok(spec)
}

fn is_builtin_type(name: &str) -> bool {
    matches!(
        name,
        "binary"
            | "bits"
            | "boolean"
            | "decimal64"
            | "empty"
            | "enumeration"
            | "identityref"
            | "instance-identifier"
            | "int8"
            | "int16"
            | "int32"
            | "int64"
            | "leafref"
            | "string"
            | "uint8"
            | "uint16"
            | "uint32"
            | "uint64"
            | "union"
    )
}

fn int_type(width: u8, signed: bool) -> DataType {
    let (lo, hi) = int_limits(width, signed);
    DataType::Int {
        width,
        signed,
        range: Intervals::new(lo, hi),
    }
}

fn base_type(
    name: &str,
    stmt: Statement<'_>,
    sctx: &SchemaContext,
    sdata: &SchemaData,
) -> Result<DataType> {
    let res = match name {
        "int8" => int_type(8, true),
        "int16" => int_type(16, true),
        "int32" => int_type(32, true),
        "int64" => int_type(64, true),
        "uint8" => int_type(8, false),
        "uint16" => int_type(16, false),
        "uint32" => int_type(32, false),
        "uint64" => int_type(64, false),
        "decimal64" => {
            let fd: u8 = stmt
                .find1_required("fraction-digits")?
                .argument_required()?
                .parse()
                .map_err(|_| Error::InvalidArgument {
                    argument: "fraction-digits".to_string(),
                })?;
            if fd < 1 || fd > 18 {
                return Err(Error::InvalidArgument {
                    argument: format!("fraction-digits {}", fd),
                });
            }
            DataType::Decimal64 {
                fraction_digits: fd,
                range: Intervals::new(i64::MIN as i128, i64::MAX as i128),
            }
        }
        "string" => DataType::String {
            length: Intervals::new(0, u64::MAX as i128),
            patterns: Vec::new(),
        },
        "boolean" => DataType::Boolean,
        "empty" => DataType::Empty,
        "binary" => DataType::Binary {
            length: Intervals::new(0, u64::MAX as i128),
        },
        "enumeration" => DataType::Enumeration {
            variants: build_enums(stmt, sctx, sdata)?,
        },
        "bits" => DataType::Bits {
            positions: build_bits(stmt, sctx, sdata)?,
        },
        "union" => {
            let mut members = Vec::new();
            for tstmt in stmt.find_all("type") {
                members.push(build_type(tstmt, sctx, sdata)?.dtype);
            }
            if members.is_empty() {
                return Err(Error::StatementNotFound {
                    parent: stmt.text(),
                    keyword: "type".to_string(),
                });
            }
            DataType::Union { members }
        }
        "leafref" => {
            let pathst = stmt.find1_required("path")?;
            let text = pathst.argument_required()?;
            let path = XPathParser::new(text, sdata, sctx).parse()?;
            DataType::Leafref {
                path: Arc::new(path),
                require_instance: require_instance(stmt)?,
                target: None,
            }
        }
        "instance-identifier" => DataType::InstanceIdentifier {
            require_instance: require_instance(stmt)?,
        },
        "identityref" => {
            let mut bases = Vec::new();
            for basest in stmt.find_all("base") {
                bases.push(
                    sdata.translate_pname(basest.argument_required()?, &sctx.text_mid)?,
                );
            }
            if bases.is_empty() {
                return Err(Error::StatementNotFound {
                    parent: stmt.text(),
                    keyword: "base".to_string(),
                });
            }
            DataType::Identityref { bases }
        }
        _ => unreachable!("is_builtin_type checked"),
    };
    Ok(res)
}

fn require_instance(stmt: Statement<'_>) -> Result<bool> {
    match stmt.find1("require-instance") {
        None => Ok(true),
        Some(ri) => Ok(ri.argument_required()? != "false"),
    }
}

fn build_enums(
    stmt: Statement<'_>,
    sctx: &SchemaContext,
    sdata: &SchemaData,
) -> Result<IndexMap<String, i32>> {
    let mut res = IndexMap::new();
    let mut next = 0i32;
    for est in stmt.find_all("enum") {
        if !sdata.if_features(&est, &sctx.text_mid)? {
            continue;
        }
        let name = est.argument_required()?.to_string();
        let value = match est.find1("value") {
            Some(vst) => vst
                .argument_required()?
                .parse()
                .map_err(|_| Error::InvalidArgument {
                    argument: vst.argument().unwrap_or_default().to_string(),
                })?,
            None => next,
        };
        next = value.saturating_add(1);
        res.insert(name, value);
    }
    Ok(res)
}

fn build_bits(
    stmt: Statement<'_>,
    sctx: &SchemaContext,
    sdata: &SchemaData,
) -> Result<IndexMap<String, u32>> {
    let mut res = IndexMap::new();
    let mut next = 0u32;
    for bst in stmt.find_all("bit") {
        if !sdata.if_features(&bst, &sctx.text_mid)? {
            continue;
        }
        let name = bst.argument_required()?.to_string();
        let position = match bst.find1("position") {
            Some(pst) => pst
                .argument_required()?
                .parse()
                .map_err(|_| Error::InvalidArgument {
                    argument: pst.argument().unwrap_or_default().to_string(),
                })?,
            None => next,
        };
        next = position.saturating_add(1);
        res.insert(name, position);
    }
    Ok(res)
}

/// Apply range/length/pattern and enumeration/bits restrictions appearing
/// directly under a `type` statement to an already-resolved base type.
fn apply_restrictions(
    dtype: &mut DataType,
    stmt: Statement<'_>,
    sctx: &SchemaContext,
    sdata: &SchemaData,
) -> Result<()> {
    if let Some(rst) = stmt.find1("range") {
        let (etag, emsg) = rst.get_error_info();
        let expr = rst.argument_required()?.to_string();
        match dtype {
            DataType::Int { range, .. } => range.restrict_with(
                &expr,
                &|s| parse_int_text(s),
                etag.map(str::to_string),
                emsg.map(str::to_string),
            )?,
            DataType::Decimal64 {
                range,
                fraction_digits,
            } => {
                let fd = *fraction_digits;
                range.restrict_with(
                    &expr,
                    &move |s| parse_decimal(s, fd).map(|v| v as i128),
                    etag.map(str::to_string),
                    emsg.map(str::to_string),
                )?
            }
            _ => {
                return Err(Error::InvalidArgument {
                    argument: format!("range on {}", dtype.expected_shape()),
                })
            }
        }
    }
    if let Some(lst) = stmt.find1("length") {
        let (etag, emsg) = lst.get_error_info();
        let expr = lst.argument_required()?.to_string();
        match dtype {
            DataType::String { length, .. } | DataType::Binary { length } => length
                .restrict_with(
                    &expr,
                    &|s| s.trim().parse::<u64>().ok().map(|v| v as i128),
                    etag.map(str::to_string),
                    emsg.map(str::to_string),
                )?,
            _ => {
                return Err(Error::InvalidArgument {
                    argument: format!("length on {}", dtype.expected_shape()),
                })
            }
        }
    }
    let pattern_stmts: Vec<Statement<'_>> = stmt.find_all("pattern").collect();
    if !pattern_stmts.is_empty() {
        match dtype {
            DataType::String { patterns, .. } => {
                for pst in pattern_stmts {
                    let (etag, emsg) = pst.get_error_info();
                    let invert = pst
                        .find1("modifier")
                        .and_then(|m| m.argument())
                        .map_or(false, |m| m == "invert-match");
                    patterns.push(Pattern::new(
                        pst.argument_required()?,
                        invert,
                        etag.map(str::to_string),
                        emsg.map(str::to_string),
                    )?);
                }
            }
            _ => {
                return Err(Error::InvalidArgument {
                    argument: "pattern on non-string".to_string(),
                })
            }
        }
    }
    // restricting an enumeration or bits type to a subset
    if stmt.find1("enum").is_some() {
        if let DataType::Enumeration { variants } = dtype {
            if !variants.is_empty() {
                let restricted = build_enums(stmt, sctx, sdata)?;
                let mut subset = IndexMap::new();
                for (name, _) in &restricted {
                    match variants.get(name) {
                        Some(value) => {
                            subset.insert(name.clone(), *value);
                        }
                        None => {
                            return Err(Error::InvalidArgument {
                                argument: name.clone(),
                            })
                        }
                    }
                }
                *variants = subset;
            }
        }
    }
    if stmt.find1("bit").is_some() {
        if let DataType::Bits { positions } = dtype {
            if !positions.is_empty() {
                let restricted = build_bits(stmt, sctx, sdata)?;
                let mut subset = IndexMap::new();
                for (name, _) in &restricted {
                    match positions.get(name) {
                        Some(pos) => {
                            subset.insert(name.clone(), *pos);
                        }
                        None => {
                            return Err(Error::InvalidArgument {
                                argument: name.clone(),
                            })
                        }
                    }
                }
                *positions = subset;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decimal_round_trip() {
        let v = parse_decimal("2.57", 2).unwrap();
        assert_eq!(v, 257);
        assert_eq!(format_decimal(v, 2), "2.57");
        assert_eq!(format_decimal(parse_decimal("-7.0", 2).unwrap(), 2), "-7.0");
        assert_eq!(format_decimal(parse_decimal("5", 3).unwrap(), 3), "5.0");
        assert!(parse_decimal("1.234", 2).is_none());
    }

    #[test]
    fn int_cooking() {
        assert_eq!(cook_int(255, 8, false), Some(ScalarValue::Uint8(255)));
        assert_eq!(cook_int(256, 8, false), None);
        assert_eq!(cook_int(-128, 8, true), Some(ScalarValue::Int8(-128)));
        assert_eq!(parse_int_text("0x1f"), Some(31));
        assert_eq!(parse_int_text("-12"), Some(-12));
    }

    #[test]
    fn interval_restriction() {
        let mut ivals = Intervals::new(0, 255);
        ivals
            .restrict_with("1..10 | 100", &|s| parse_int_text(s), None, None)
            .unwrap();
        assert!(ivals.contains(5));
        assert!(ivals.contains(100));
        assert!(!ivals.contains(50));
        // widening beyond the base type is an error
        let mut narrow = Intervals::new(0, 10);
        assert!(narrow
            .restrict_with("5..20", &|s| parse_int_text(s), None, None)
            .is_err());
    }

    #[test]
    fn min_max_keywords() {
        let mut ivals = Intervals::new(0, 255);
        ivals
            .restrict_with("min..99", &|s| parse_int_text(s), None, None)
            .unwrap();
        assert!(ivals.contains(0));
        assert!(!ivals.contains(100));
    }

    #[test]
    fn xsd_patterns() {
        let p = Pattern::new(r"\d{1,3}", false, None, None).unwrap();
        assert!(p.matches("42"));
        assert!(!p.matches("x42"));
        let inv = Pattern::new("xml.*", true, None, None).unwrap();
        assert!(!inv.matches("xml-rocks"));
        assert!(inv.matches("other"));
        let name = Pattern::new(r"\i\c*", false, None, None).unwrap();
        assert!(name.matches("_foo-1.x"));
        assert!(!name.matches("1foo"));
    }

    #[test]
    fn bits_canonical_order() {
        let mut positions = IndexMap::new();
        positions.insert("ten".to_string(), 10u32);
        positions.insert("one".to_string(), 1u32);
        match cook_bits("ten one", &positions) {
            ScalarValue::Bits(names) => assert_eq!(names, vec!["one", "ten"]),
            _ => unreachable!(),
        }
    }

    #[test]
    fn identityref_cooking() {
        assert_eq!(
            cook_identityref("t1:type-t1", "x"),
            ScalarValue::IdentityRef {
                name: "type-t1".to_string(),
                ns: "t1".to_string()
            }
        );
        assert_eq!(
            cook_identityref("local-id", "mod"),
            ScalarValue::IdentityRef {
                name: "local-id".to_string(),
                ns: "mod".to_string()
            }
        );
    }
}
