//
// Copyright (c) The yangtree Core Contributors
//
// SPDX-License-Identifier: MIT
//

//! Native Rust library for YANG data modeling.
//!
//! yangtree consumes a YANG library description ([RFC 7895]), parses the
//! modules it enumerates, compiles them into a single schema tree, and then
//! validates and manipulates JSON- or XML-encoded instance data against that
//! schema.
//!
//! [RFC 7895]: https://datatracker.ietf.org/doc/html/rfc7895
//!
//! ## Design Goals
//! * Implement the module language, type system and XPath engine natively,
//!   with no bindings to an external YANG runtime
//! * Keep compiled schemas immutable and shareable between any number of
//!   concurrent readers
//! * Represent instance data as persistent values with zipper cursors, so
//!   every edit returns a new cursor and never invalidates an old one
//! * Surface every failure through one closed error type with precise
//!   context (module, statement, instance route or parser coordinates)
//!
//! ## Overview
//!
//! A [`context::Context`] is built once from a library description plus a
//! module search path. From it, schema nodes can be inspected through
//! [`schema::SchemaNode`] handles, and instance documents are cooked into
//! [`data::InstanceNode`] cursors that support navigation, structural edits,
//! default insertion and validation.

mod error;
mod parser;

pub mod context;
pub mod data;
pub mod iter;
pub mod pattern;
pub mod route;
pub mod schema;
pub mod statement;
pub mod types;
pub mod value;
pub mod xml;
pub mod xpath;

pub use crate::error::{Error, Result};
