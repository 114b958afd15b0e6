//
// Copyright (c) The yangtree Core Contributors
//
// SPDX-License-Identifier: MIT
//

//! Recursive-descent parser base with support for YANG syntactic elements.
//!
//! Shared by the module parser, the feature-expression evaluator, the XPath
//! parser and the instance-identifier parsers.

use crate::error::{Error, Result};

/// Low-level cursor over an input string.
///
/// The offset is a byte index that is only ever advanced across whole
/// characters. All delimiters of the grammars built on top of this are
/// ASCII, so single-byte dispatch is safe; multibyte characters can occur
/// only inside quoted arguments and literals, which are captured as slices.
#[derive(Debug)]
pub(crate) struct Parser<'a> {
    pub(crate) input: &'a str,
    pub(crate) offset: usize,
}

impl<'a> Parser<'a> {
    pub(crate) fn new(input: &'a str) -> Parser<'a> {
        Parser { input, offset: 0 }
    }

    /// Return line and column coordinates corresponding to the offset.
    pub(crate) fn line_column(&self) -> (usize, usize) {
        let before = &self.input[..self.offset];
        let line = before.matches('\n').count() + 1;
        let column = match before.rfind('\n') {
            Some(pos) => before[pos + 1..].chars().count(),
            None => before.chars().count(),
        };
        (line, column)
    }

    pub(crate) fn error_eoi(&self) -> Error {
        let (line, column) = self.line_column();
        Error::EndOfInput { line, column }
    }

    pub(crate) fn error_unexpected(&self, expected: &str) -> Error {
        let (line, column) = self.line_column();
        Error::UnexpectedInput {
            line,
            column,
            expected: if expected.is_empty() {
                None
            } else {
                Some(expected.to_string())
            },
        }
    }

    pub(crate) fn at_end(&self) -> bool {
        self.offset >= self.input.len()
    }

    /// Return the next character without advancing the offset.
    pub(crate) fn peek(&self) -> Result<char> {
        self.try_peek().ok_or_else(|| self.error_eoi())
    }

    pub(crate) fn try_peek(&self) -> Option<char> {
        self.input[self.offset..].chars().next()
    }

    /// Advance the offset past the next character.
    pub(crate) fn advance(&mut self) {
        if let Some(c) = self.try_peek() {
            self.offset += c.len_utf8();
        }
    }

    /// Parse the specified character.
    pub(crate) fn char(&mut self, c: char) -> Result<()> {
        if self.peek()? == c {
            self.advance();
            Ok(())
        } else {
            Err(self.error_unexpected(&format!("char '{}'", c)))
        }
    }

    /// Parse one character from the specified set and return it.
    pub(crate) fn one_of(&mut self, chset: &str) -> Result<char> {
        let c = self.peek()?;
        if chset.contains(c) {
            self.advance();
            Ok(c)
        } else {
            Err(self.error_unexpected(&format!("one of '{}'", chset)))
        }
    }

    /// If `string` comes next, advance past it and return true.
    pub(crate) fn test_string(&mut self, string: &str) -> bool {
        if self.input[self.offset..].starts_with(string) {
            self.offset += string.len();
            true
        } else {
            false
        }
    }

    /// Skip optional whitespace and return whether any was found.
    pub(crate) fn skip_ws(&mut self) -> bool {
        let start = self.offset;
        while let Some(c) = self.try_peek() {
            if c == ' ' || c == '\t' || c == '\n' || c == '\r' {
                self.advance();
            } else {
                break;
            }
        }
        self.offset > start
    }

    /// Advance one character, then skip optional whitespace.
    pub(crate) fn adv_skip_ws(&mut self) -> bool {
        self.advance();
        self.skip_ws()
    }

    /// Parse and return the segment terminated by the first occurrence of
    /// `term`; the terminator itself is consumed.
    pub(crate) fn up_to(&mut self, term: char) -> Result<&'a str> {
        match self.input[self.offset..].find(term) {
            Some(pos) => {
                let res = &self.input[self.offset..self.offset + pos];
                self.offset += pos + term.len_utf8();
                Ok(res)
            }
            None => Err(self.error_eoi()),
        }
    }

    /// Return the remaining input and move to the end.
    pub(crate) fn remaining(&mut self) -> &'a str {
        let res = &self.input[self.offset..];
        self.offset = self.input.len();
        res
    }

    fn is_ident_start(c: char) -> bool {
        c.is_ascii_alphabetic() || c == '_'
    }

    fn is_ident_char(c: char) -> bool {
        c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.'
    }

    /// Parse and return a YANG identifier (`[a-zA-Z_][a-zA-Z0-9_.-]*`).
    pub(crate) fn yang_identifier(&mut self) -> Result<&'a str> {
        let start = self.offset;
        match self.try_peek() {
            Some(c) if Self::is_ident_start(c) => self.advance(),
            _ => return Err(self.error_unexpected("YANG identifier")),
        }
        while let Some(c) = self.try_peek() {
            if Self::is_ident_char(c) {
                self.advance();
            } else {
                break;
            }
        }
        Ok(&self.input[start..self.offset])
    }

    /// Parse an identifier with an optional colon-separated prefix and
    /// return `(name, prefix)`.
    pub(crate) fn prefixed_name(&mut self) -> Result<(&'a str, Option<&'a str>)> {
        let first = self.yang_identifier()?;
        if self.try_peek() != Some(':') {
            return Ok((first, None));
        }
        self.advance();
        Ok((self.yang_identifier()?, Some(first)))
    }

    /// Parse and return an unsigned integer.
    pub(crate) fn unsigned_integer(&mut self) -> Result<u64> {
        let start = self.offset;
        while let Some(c) = self.try_peek() {
            if c.is_ascii_digit() {
                self.advance();
            } else {
                break;
            }
        }
        if start == self.offset {
            return Err(self.error_unexpected("unsigned integer"));
        }
        self.input[start..self.offset]
            .parse()
            .map_err(|_| self.error_unexpected("unsigned integer"))
    }

    /// Parse and return an unsigned floating-point number
    /// (`[0-9]+(\.[0-9]+)?` or `.[0-9]+`).
    pub(crate) fn unsigned_float(&mut self) -> Result<f64> {
        let start = self.offset;
        while let Some(c) = self.try_peek() {
            if c.is_ascii_digit() {
                self.advance();
            } else {
                break;
            }
        }
        if self.try_peek() == Some('.') {
            let dot = self.offset;
            self.advance();
            while let Some(c) = self.try_peek() {
                if c.is_ascii_digit() {
                    self.advance();
                } else {
                    break;
                }
            }
            if self.offset == dot + 1 && start == dot {
                return Err(self.error_unexpected("unsigned float"));
            }
        }
        if start == self.offset {
            return Err(self.error_unexpected("unsigned float"));
        }
        self.input[start..self.offset]
            .parse()
            .map_err(|_| self.error_unexpected("unsigned float"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifiers_and_prefixes() {
        let mut p = Parser::new("ietf-inet-types:ipv4-address rest");
        assert_eq!(
            p.prefixed_name().unwrap(),
            ("ipv4-address", Some("ietf-inet-types"))
        );
        p.skip_ws();
        assert_eq!(p.prefixed_name().unwrap(), ("rest", None));
        assert!(p.at_end());
    }

    #[test]
    fn numbers() {
        let mut p = Parser::new("42 3.25 .5");
        assert_eq!(p.unsigned_integer().unwrap(), 42);
        p.skip_ws();
        assert_eq!(p.unsigned_float().unwrap(), 3.25);
        p.skip_ws();
        assert_eq!(p.unsigned_float().unwrap(), 0.5);
    }

    #[test]
    fn line_column_tracking() {
        let mut p = Parser::new("ab\ncde");
        p.advance();
        p.advance();
        p.advance();
        p.advance();
        assert_eq!(p.line_column(), (2, 1));
    }
}
