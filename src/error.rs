//
// Copyright (c) The yangtree Core Contributors
//
// SPDX-License-Identifier: MIT
//

use thiserror::Error;

/// A convenience wrapper around `Result` for `yangtree::Error`.
pub type Result<T> = std::result::Result<T, Error>;

/// Enum listing possible errors from yangtree.
///
/// The taxonomy is closed: every failure the library can report is one of
/// these cases, and each case carries the context needed to locate it (parser
/// coordinates, module identifier, statement text or instance route).
#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum Error {
    // ===== module parser =====
    /// Unexpected end of input.
    #[error("line {line}, column {column}: end of input")]
    EndOfInput { line: usize, column: usize },

    /// Unexpected input, with a description of what was expected.
    #[error("line {line}, column {column}: unexpected input{}",
            expected.as_ref().map(|e| format!(": expected {}", e)).unwrap_or_default())]
    UnexpectedInput {
        line: usize,
        column: usize,
        expected: Option<String>,
    },

    /// The argument of a statement is invalid (for example a bad escape
    /// sequence or an unparseable range expression).
    #[error("invalid argument: {argument}")]
    InvalidArgument { argument: String },

    /// Parsed module name doesn't match the name expected by the caller.
    #[error("module name '{found}', expected '{expected}'")]
    ModuleNameMismatch { found: String, expected: String },

    /// Parsed module revision doesn't match the expected revision.
    #[error("module revision '{found}', expected '{expected}'")]
    ModuleRevisionMismatch { found: String, expected: String },

    // ===== library (YANG library resolution) =====
    /// Broken YANG library data.
    #[error("bad yang-library data: {message}")]
    BadYangLibraryData { message: String },

    /// A module or submodule registered in the library was not found on the
    /// search path.
    #[error("module not found: {}", fmt_modrev(name, revision))]
    ModuleNotFound { name: String, revision: String },

    /// A module is not registered in the YANG library.
    #[error("module not registered: {}", fmt_modrev(name, revision))]
    ModuleNotRegistered { name: String, revision: String },

    /// A module is not implemented in the data model.
    #[error("module not implemented: {name}")]
    ModuleNotImplemented { name: String },

    /// A module is not imported by the context module.
    #[error("module {name} not imported in {context}")]
    ModuleNotImported { name: String, context: String },

    /// Multiple revisions of one module are declared as implemented.
    #[error("multiple implemented revisions of module {name}")]
    MultipleImplementedRevisions { name: String },

    /// Implemented modules import each other in a cycle.
    #[error("cyclic imports among implemented modules")]
    CyclicImports,

    /// A supported feature depends on a feature that isn't supported.
    #[error("feature prerequisite not supported: {namespace}:{name}")]
    FeaturePrerequisite { name: String, namespace: String },

    /// Unknown namespace prefix.
    #[error("prefix '{prefix}' is not defined in {module}")]
    UnknownPrefix { prefix: String, module: String },

    // ===== schema =====
    /// A required substatement does not exist.
    #[error("statement '{keyword}' not found in '{parent}'")]
    StatementNotFound { parent: String, keyword: String },

    /// A grouping or typedef definition does not exist.
    #[error("definition not found: {keyword} {name}")]
    DefinitionNotFound { keyword: String, name: String },

    /// Invalid schema or data path.
    #[error("invalid schema path: {path}")]
    InvalidSchemaPath { path: String },

    /// A schema node doesn't exist as a child of `parent`.
    #[error("nonexistent schema node: {name} under {parent}")]
    NonexistentSchemaNode { parent: String, name: String },

    /// A schema node is of a wrong type for the requested operation.
    #[error("schema node {path} is not a {expected}")]
    BadSchemaNodeType { path: String, expected: String },

    /// A leafref path does not address a terminal data node.
    #[error("invalid leafref path of {path}")]
    InvalidLeafrefPath { path: String },

    /// Invalid `if-feature` expression.
    #[error("invalid feature expression: {expression}")]
    InvalidFeatureExpression { expression: String },

    /// An XPath expression is syntactically invalid.
    #[error("invalid XPath at offset {offset}: {expression}")]
    InvalidXPath { expression: String, offset: usize },

    /// An XPath 1.0 feature that this implementation does not support.
    #[error("unsupported XPath feature: {feature}")]
    XPathNotSupported { feature: String },

    /// An XPath subexpression evaluated to a value of the wrong type.
    #[error("XPath type error: {value}")]
    XPathTypeError { value: String },

    // ===== raw data =====
    /// Object member in the raw value doesn't exist in the schema.
    #[error("{{{path}}} unknown member '{member}'")]
    RawMember { path: String, member: String },

    /// Raw value is of an incorrect shape.
    #[error("{{{path}}} expected {expected}")]
    RawType { path: String, expected: String },

    // ===== validation =====
    /// An instance violates a schema (structural/multiplicity) constraint.
    #[error("{{{route}}} {tag}{}", fmt_msg(message))]
    SchemaViolation {
        route: String,
        tag: String,
        message: Option<String>,
    },

    /// An instance violates a semantic rule (`must`, `unique`).
    #[error("{{{route}}} {tag}{}", fmt_msg(message))]
    SemanticViolation {
        route: String,
        tag: String,
        message: Option<String>,
    },

    /// A scalar value doesn't match its expected type.
    #[error("{{{route}}} invalid type{}", fmt_msg(message))]
    TypeViolation {
        route: String,
        message: Option<String>,
    },

    // ===== instance =====
    /// Attempt to access an instance node that doesn't exist.
    #[error("{{{route}}} nonexistent instance: {message}")]
    NonexistentInstance { route: String, message: String },

    /// Attempt to address an instance of a non-data node
    /// (rpc/action/notification).
    #[error("{{{route}}} non-data node: {message}")]
    NonDataNode { route: String, message: String },

    /// The instance value is incompatible with the requested operation.
    #[error("{{{route}}} instance value error: {message}")]
    InstanceValue { route: String, message: String },

    /// List key or leaf-list value is invalid.
    #[error("invalid key value: {value}")]
    InvalidKeyValue { value: String },

    // ===== annotations (RFC 7952 metadata) =====
    /// The instance node being annotated doesn't exist.
    #[error("{{{path}}} no instance '{name}' to annotate")]
    MissingAnnotationTarget { path: String, name: String },

    /// An annotation is used that no module defines.
    #[error("{{{path}}} undefined annotation '{name}'")]
    UndefinedAnnotation { path: String, name: String },

    /// The value of an annotation has the wrong type.
    #[error("{{{path}}} value of annotation '{name}' {message}")]
    AnnotationType {
        path: String,
        name: String,
        message: String,
    },
}

fn fmt_modrev(name: &str, revision: &str) -> String {
    if revision.is_empty() {
        name.to_string()
    } else {
        format!("{}@{}", name, revision)
    }
}

fn fmt_msg(message: &Option<String>) -> String {
    match message {
        Some(msg) => format!(": {}", msg),
        None => String::new(),
    }
}

impl Error {
    /// Returns true for the validation cases that are reported rather than
    /// fatal (spec: a caller may continue validating after collecting one).
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Error::SchemaViolation { .. }
                | Error::SemanticViolation { .. }
                | Error::TypeViolation { .. }
        )
    }
}
