//
// Copyright (c) The yangtree Core Contributors
//
// SPDX-License-Identifier: MIT
//

//! YANG statements and the parser for YANG module text.
//!
//! A parsed module or submodule is an uninterpreted tree of
//! `(keyword, prefix?, argument?, substatements)` tuples. The tree is built
//! once and never mutated; later compilation stages only query it.

use std::fmt;

use crate::error::{Error, Result};
use crate::parser::Parser;

/// The statement tree of a single parsed module or submodule.
///
/// Statements are stored in an arena with parent back-references, which keeps
/// the tree free of interior mutability and shareable between threads.
/// [`Statement`] handles borrow from it.
#[derive(Clone, Debug)]
pub struct ModuleStatements {
    nodes: Vec<StatementData>,
}

#[derive(Clone, Debug)]
struct StatementData {
    keyword: String,
    prefix: Option<String>,
    argument: Option<String>,
    parent: Option<usize>,
    children: Vec<usize>,
}

/// Handle to one statement within a [`ModuleStatements`] tree.
#[derive(Clone, Copy, Debug)]
pub struct Statement<'a> {
    tree: &'a ModuleStatements,
    id: usize,
}

impl ModuleStatements {
    /// The top-level `module` or `submodule` statement.
    pub fn root(&self) -> Statement<'_> {
        Statement { tree: self, id: 0 }
    }

    /// Serialize the whole tree back to canonical YANG text.
    ///
    /// Re-parsing the output yields a structurally equal tree.
    pub fn to_yang(&self) -> String {
        let mut out = String::new();
        self.write_stmt(&mut out, 0, 0);
        out
    }

    fn write_stmt(&self, out: &mut String, id: usize, indent: usize) {
        let node = &self.nodes[id];
        for _ in 0..indent {
            out.push_str("  ");
        }
        if let Some(prefix) = &node.prefix {
            out.push_str(prefix);
            out.push(':');
        }
        out.push_str(&node.keyword);
        if let Some(arg) = &node.argument {
            out.push_str(" \"");
            for c in arg.chars() {
                match c {
                    '"' => out.push_str("\\\""),
                    '\\' => out.push_str("\\\\"),
                    '\n' => out.push_str("\\n"),
                    '\t' => out.push_str("\\t"),
                    _ => out.push(c),
                }
            }
            out.push('"');
        }
        if node.children.is_empty() {
            out.push_str(";\n");
        } else {
            out.push_str(" {\n");
            for &child in &node.children {
                self.write_stmt(out, child, indent + 1);
            }
            for _ in 0..indent {
                out.push_str("  ");
            }
            out.push_str("}\n");
        }
    }
}

impl PartialEq for ModuleStatements {
    fn eq(&self, other: &ModuleStatements) -> bool {
        fn eq_stmt(a: Statement<'_>, b: Statement<'_>) -> bool {
            a.keyword() == b.keyword()
                && a.prefix() == b.prefix()
                && a.argument() == b.argument()
                && a.substatements().count() == b.substatements().count()
                && a.substatements()
                    .zip(b.substatements())
                    .all(|(x, y)| eq_stmt(x, y))
        }
        eq_stmt(self.root(), other.root())
    }
}

impl<'a> Statement<'a> {
    /// Statement keyword (local part for extensions).
    pub fn keyword(&self) -> &'a str {
        &self.tree.nodes[self.id].keyword
    }

    /// Keyword prefix (`None` for built-in statements).
    pub fn prefix(&self) -> Option<&'a str> {
        self.tree.nodes[self.id].prefix.as_deref()
    }

    /// Statement argument, if any.
    pub fn argument(&self) -> Option<&'a str> {
        self.tree.nodes[self.id].argument.as_deref()
    }

    /// Statement argument, or an error naming the statement if it has none.
    pub fn argument_required(&self) -> Result<&'a str> {
        self.argument().ok_or_else(|| Error::StatementNotFound {
            parent: self.text(),
            keyword: "argument".to_string(),
        })
    }

    /// Parent statement.
    pub fn parent(&self) -> Option<Statement<'a>> {
        self.tree.nodes[self.id].parent.map(|id| Statement {
            tree: self.tree,
            id,
        })
    }

    /// Iterator over direct substatements, in document order.
    pub fn substatements(&self) -> impl Iterator<Item = Statement<'a>> + 'a {
        let tree = self.tree;
        self.tree.nodes[self.id]
            .children
            .iter()
            .map(move |&id| Statement { tree, id })
    }

    /// Return the first built-in substatement with the given keyword.
    pub fn find1(&self, kw: &str) -> Option<Statement<'a>> {
        self.substatements()
            .find(|s| s.keyword() == kw && s.prefix().is_none())
    }

    /// Return the first built-in substatement with the given keyword and
    /// argument.
    pub fn find1_arg(&self, kw: &str, arg: &str) -> Option<Statement<'a>> {
        self.substatements().find(|s| {
            s.keyword() == kw && s.prefix().is_none() && s.argument() == Some(arg)
        })
    }

    /// Like [`Statement::find1`], but an absent statement is an error.
    pub fn find1_required(&self, kw: &str) -> Result<Statement<'a>> {
        self.find1(kw).ok_or_else(|| Error::StatementNotFound {
            parent: self.text(),
            keyword: kw.to_string(),
        })
    }

    /// Return all substatements with the given keyword and prefix.
    pub fn find_all_with_prefix(
        &self,
        kw: &'a str,
        prefix: Option<&'a str>,
    ) -> impl Iterator<Item = Statement<'a>> + 'a {
        let this = *self;
        this.substatements()
            .filter(move |s| s.keyword() == kw && s.prefix() == prefix)
    }

    /// Return all built-in substatements with the given keyword.
    pub fn find_all(&self, kw: &'a str) -> impl Iterator<Item = Statement<'a>> + 'a {
        self.find_all_with_prefix(kw, None)
    }

    /// Search ancestor statements for a `grouping` or `typedef` definition
    /// with the given unprefixed name.
    pub fn get_definition(&self, name: &str, kw: &str) -> Option<Statement<'a>> {
        let mut stmt = self.parent();
        while let Some(sup) = stmt {
            if let Some(res) = sup.find1_arg(kw, name) {
                return Some(res);
            }
            stmt = sup.parent();
        }
        None
    }

    /// Return the statement's `error-app-tag` and `error-message` arguments,
    /// if present.
    pub fn get_error_info(&self) -> (Option<&'a str>, Option<&'a str>) {
        let etag = self.find1("error-app-tag").and_then(|s| s.argument());
        let emsg = self.find1("error-message").and_then(|s| s.argument());
        (etag, emsg)
    }

    /// One-line rendition used in error context.
    pub fn text(&self) -> String {
        format!("{}", self)
    }
}

impl fmt::Display for Statement<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(prefix) = self.prefix() {
            write!(f, "{}:", prefix)?;
        }
        write!(f, "{}", self.keyword())?;
        if let Some(arg) = self.argument() {
            write!(f, " \"{}\"", arg.replace('\\', "\\\\").replace('"', "\\\""))?;
        }
        if self.substatements().next().is_some() {
            write!(f, " {{ ... }}")
        } else {
            write!(f, ";")
        }
    }
}

/// Parser of YANG module text into a [`ModuleStatements`] tree.
pub struct ModuleParser<'a> {
    parser: Parser<'a>,
    expect_name: Option<&'a str>,
    expect_revision: Option<&'a str>,
    nodes: Vec<StatementData>,
    // scratch argument accumulator for concatenated quoted strings
    arg: String,
}

impl<'a> ModuleParser<'a> {
    pub fn new(text: &'a str) -> ModuleParser<'a> {
        ModuleParser {
            parser: Parser::new(text),
            expect_name: None,
            expect_revision: None,
            nodes: Vec::new(),
            arg: String::new(),
        }
    }

    /// Set the module name and revision the caller expects to find.
    pub fn with_expected(
        mut self,
        name: Option<&'a str>,
        revision: Option<&'a str>,
    ) -> ModuleParser<'a> {
        self.expect_name = name;
        self.expect_revision = revision;
        self
    }

    /// Parse a complete YANG module or submodule.
    pub fn parse(mut self) -> Result<ModuleStatements> {
        self.opt_separator()?;
        let start = self.parser.offset;
        let root = self.statement(None)?;
        debug_assert_eq!(root, 0);
        {
            let rootd = &self.nodes[0];
            if rootd.keyword != "module" && rootd.keyword != "submodule" {
                self.parser.offset = start;
                return Err(self.parser.error_unexpected("'module' or 'submodule'"));
            }
            if let Some(name) = self.expect_name {
                if rootd.argument.as_deref() != Some(name) {
                    return Err(Error::ModuleNameMismatch {
                        found: rootd.argument.clone().unwrap_or_default(),
                        expected: name.to_string(),
                    });
                }
            }
            if let Some(rev) = self.expect_revision {
                let found = rootd
                    .children
                    .iter()
                    .map(|&id| &self.nodes[id])
                    .find(|n| n.keyword == "revision" && n.prefix.is_none())
                    .and_then(|n| n.argument.as_deref())
                    .unwrap_or_default();
                if found != rev {
                    return Err(Error::ModuleRevisionMismatch {
                        found: found.to_string(),
                        expected: rev.to_string(),
                    });
                }
            }
        }
        // Only separators may follow the closing brace.
        match self.opt_separator() {
            Err(Error::EndOfInput { .. }) => Ok(ModuleStatements { nodes: self.nodes }),
            Err(e) => Err(e),
            Ok(_) => {
                if self.parser.at_end() {
                    Ok(ModuleStatements { nodes: self.nodes })
                } else {
                    Err(self.parser.error_unexpected("end of input"))
                }
            }
        }
    }

    /// Skip an optional separator (whitespace and comments); return whether
    /// anything was consumed. Hitting the end of input is reported so that
    /// the caller can decide whether it is legal there.
    fn opt_separator(&mut self) -> Result<bool> {
        let start = self.parser.offset;
        loop {
            match self.parser.try_peek() {
                None => return Err(self.parser.error_eoi()),
                Some(' ') | Some('\t') | Some('\n') => self.parser.advance(),
                Some('\r') => {
                    let after = self.parser.offset + 1;
                    if self.parser.input[after..].starts_with('\n') {
                        self.parser.advance();
                        self.parser.advance();
                    } else {
                        break;
                    }
                }
                Some('/') => {
                    let after = &self.parser.input[self.parser.offset + 1..];
                    if after.starts_with("/") {
                        // line comment runs to the next newline
                        self.parser.advance();
                        self.parser.advance();
                        loop {
                            match self.parser.try_peek() {
                                None => return Err(self.parser.error_eoi()),
                                Some('\n') => {
                                    self.parser.advance();
                                    break;
                                }
                                Some(_) => self.parser.advance(),
                            }
                        }
                    } else if after.starts_with("*") {
                        self.parser.advance();
                        self.parser.advance();
                        loop {
                            match self.parser.try_peek() {
                                None => return Err(self.parser.error_eoi()),
                                Some('*') => {
                                    self.parser.advance();
                                    if self.parser.try_peek() == Some('/') {
                                        self.parser.advance();
                                        break;
                                    }
                                }
                                Some(_) => self.parser.advance(),
                            }
                        }
                    } else {
                        break;
                    }
                }
                Some(_) => break,
            }
        }
        Ok(self.parser.offset > start)
    }

    fn keyword(&mut self) -> Result<(Option<String>, String)> {
        let first = self.parser.yang_identifier()?.to_string();
        if self.parser.try_peek() == Some(':') {
            self.parser.advance();
            let second = self.parser.yang_identifier()?.to_string();
            Ok((Some(first), second))
        } else {
            Ok((None, first))
        }
    }

    fn statement(&mut self, parent: Option<usize>) -> Result<usize> {
        let (prefix, keyword) = self.keyword()?;
        let had_sep = self.opt_separator()?;
        let next = self.parser.peek()?;
        let (argument, has_block) = match next {
            ';' => (None, false),
            '{' => (None, true),
            _ if !had_sep => return Err(self.parser.error_unexpected("separator")),
            _ => {
                self.arg.clear();
                let has_block = self.argument()?;
                (Some(std::mem::take(&mut self.arg)), has_block)
            }
        };
        self.parser.advance(); // consume ';' or '{'
        let id = self.nodes.len();
        self.nodes.push(StatementData {
            keyword,
            prefix,
            argument,
            parent,
            children: Vec::new(),
        });
        if has_block {
            let children = self.substatements(id)?;
            self.nodes[id].children = children;
        }
        Ok(id)
    }

    /// Parse a statement argument; return true if a substatement block
    /// follows. The terminating `;` or `{` is left for the caller.
    fn argument(&mut self) -> Result<bool> {
        let quoted = match self.parser.peek()? {
            '\'' => {
                self.sq_argument()?;
                true
            }
            '"' => {
                self.dq_argument()?;
                true
            }
            _ if self.arg.is_empty() => {
                self.unq_argument()?;
                false
            }
            _ => return Err(self.parser.error_unexpected("single or double quote")),
        };
        self.opt_separator()?;
        match self.parser.peek()? {
            ';' => Ok(false),
            '{' => Ok(true),
            '+' if quoted => {
                self.parser.advance();
                self.opt_separator()?;
                self.argument()
            }
            _ => {
                let expected = if quoted { "';', '{' or '+'" } else { "';', '{'" };
                Err(self.parser.error_unexpected(expected))
            }
        }
    }

    fn sq_argument(&mut self) -> Result<()> {
        self.parser.advance();
        let chunk = self.parser.up_to('\'')?;
        self.arg.push_str(chunk);
        Ok(())
    }

    fn dq_argument(&mut self) -> Result<()> {
        self.parser.advance();
        let start = self.parser.offset;
        let mut escaped = false;
        loop {
            match self.parser.try_peek() {
                None => return Err(self.parser.error_eoi()),
                Some('"') => break,
                Some('\\') => {
                    escaped = true;
                    self.parser.advance();
                    if self.parser.try_peek().is_none() {
                        return Err(self.parser.error_eoi());
                    }
                    self.parser.advance();
                }
                Some(_) => self.parser.advance(),
            }
        }
        let raw = &self.parser.input[start..self.parser.offset];
        if escaped {
            let unescaped = Self::unescape(raw)?;
            self.arg.push_str(&unescaped);
        } else {
            self.arg.push_str(raw);
        }
        self.parser.advance(); // closing quote
        Ok(())
    }

    fn unq_argument(&mut self) -> Result<()> {
        let start = self.parser.offset;
        loop {
            match self.parser.try_peek() {
                None => return Err(self.parser.error_eoi()),
                Some(';') | Some(' ') | Some('\t') | Some('\r') | Some('\n')
                | Some('{') => break,
                Some('/') => {
                    let after = &self.parser.input[self.parser.offset + 1..];
                    if after.starts_with('/') || after.starts_with('*') {
                        break;
                    }
                    self.parser.advance();
                }
                Some(_) => self.parser.advance(),
            }
        }
        self.arg.push_str(&self.parser.input[start..self.parser.offset]);
        Ok(())
    }

    /// Replace escape sequences in a double-quoted argument. Only
    /// `\n`, `\t`, `\"` and `\\` are defined; anything else is an error.
    fn unescape(text: &str) -> Result<String> {
        let mut res = String::with_capacity(text.len());
        let mut chars = text.chars();
        while let Some(c) = chars.next() {
            if c != '\\' {
                res.push(c);
                continue;
            }
            match chars.next() {
                Some('n') => res.push('\n'),
                Some('t') => res.push('\t'),
                Some('"') => res.push('"'),
                Some('\\') => res.push('\\'),
                _ => {
                    return Err(Error::InvalidArgument {
                        argument: text.to_string(),
                    })
                }
            }
        }
        Ok(res)
    }

    fn substatements(&mut self, parent: usize) -> Result<Vec<usize>> {
        let mut res = Vec::new();
        self.opt_separator()?;
        while self.parser.peek()? != '}' {
            res.push(self.statement(Some(parent))?);
            self.opt_separator()?;
        }
        self.parser.advance(); // closing brace
        Ok(res)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    static MODULE: &str = r#"module test { // Nice module
      prefix t;
      namespace /* URI follows */ 	'http://example.com/test';
      leaf foo {
        type string;
        default "hi \"doc\"";
      }
      leaf bar {
        mandatory true;
        type uint8;
      }
    }
    "#;

    #[test]
    fn parse_module() {
        let tree = ModuleParser::new(MODULE).parse().expect("Failed to parse");
        let root = tree.root();
        assert_eq!(root.keyword(), "module");
        assert_eq!(root.argument(), Some("test"));
        assert_eq!(
            root.find1("namespace").unwrap().argument(),
            Some("http://example.com/test")
        );
        let leaves: Vec<_> = root.find_all("leaf").collect();
        assert_eq!(leaves.len(), 2);
        let dflt = leaves[0].find1("default").unwrap();
        assert_eq!(dflt.argument(), Some("hi \"doc\""));
        assert!(leaves[1].find1_arg("type", "uint8").is_some());
    }

    #[test]
    fn concatenated_arguments() {
        let text = "module m { prefix p; contact \"a\" + 'b' + \"c\"; }";
        let tree = ModuleParser::new(text).parse().unwrap();
        let contact = tree.root().find1("contact").unwrap();
        assert_eq!(contact.argument(), Some("abc"));
    }

    #[test]
    fn separator_required_before_unquoted_argument() {
        // "prefixt;" parses as a keyword, not as "prefix" + argument "t"
        let text = "module m { prefixt; }";
        let tree = ModuleParser::new(text).parse().unwrap();
        assert!(tree.root().find1("prefixt").is_some());
        assert!(tree.root().find1("prefix").is_none());
    }

    #[test]
    fn bad_escape_is_invalid_argument() {
        let text = "module m { description \"bad \\q escape\"; }";
        match ModuleParser::new(text).parse() {
            Err(Error::InvalidArgument { .. }) => (),
            other => panic!("expected InvalidArgument, got {:?}", other),
        }
    }

    #[test]
    fn name_revision_checks() {
        let text = "module m { prefix p; revision 2024-01-01; }";
        assert!(ModuleParser::new(text)
            .with_expected(Some("m"), Some("2024-01-01"))
            .parse()
            .is_ok());
        match ModuleParser::new(text).with_expected(Some("x"), None).parse() {
            Err(Error::ModuleNameMismatch { .. }) => (),
            other => panic!("expected ModuleNameMismatch, got {:?}", other),
        }
        match ModuleParser::new(text)
            .with_expected(Some("m"), Some("2020-01-01"))
            .parse()
        {
            Err(Error::ModuleRevisionMismatch { .. }) => (),
            other => panic!("expected ModuleRevisionMismatch, got {:?}", other),
        }
    }

    #[test]
    fn pretty_print_round_trip() {
        let tree = ModuleParser::new(MODULE).parse().unwrap();
        let printed = tree.to_yang();
        let reparsed = ModuleParser::new(&printed).parse().unwrap();
        assert_eq!(tree, reparsed);
    }

    #[test]
    fn trailing_garbage_rejected() {
        let text = "module m { prefix p; } leaf x;";
        assert!(ModuleParser::new(text).parse().is_err());
    }
}
