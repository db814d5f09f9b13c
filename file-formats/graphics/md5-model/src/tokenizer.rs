//! Token-level reader for the MD5 text formats
//!
//! Both `.md5mesh` and `.md5anim` are whitespace-delimited token streams with
//! `//` line comments and double-quoted strings. The loaders only need two
//! primitives from the underlying reader, "next token" and "rest of line";
//! [`TokenReader`] captures those and layers typed helpers on top.

use std::str::FromStr;

use glam::{Vec2, Vec3};

use crate::error::{Md5Error, Result};

/// Source of whitespace-delimited tokens
pub trait TokenReader<'a> {
    /// Next token, skipping whitespace and comments. `None` at end of input.
    fn next_token(&mut self) -> Option<&'a str>;

    /// Remainder of the current line, consuming the line break
    fn rest_of_line(&mut self) -> &'a str;

    /// 1-based line number of the read position
    fn line(&self) -> usize;

    /// Name used in error messages (file name, "skeleton", "mesh", ...)
    fn context(&self) -> &str;

    /// Read a token, failing at end of input
    fn expect_token(&mut self, expected: &str) -> Result<&'a str> {
        match self.next_token() {
            Some(token) => Ok(token),
            None => Err(Md5Error::UnexpectedEof {
                context: self.context().to_string(),
                expected: expected.to_string(),
            }),
        }
    }

    /// Read a token and require it to be exactly `literal`
    fn expect_literal(&mut self, literal: &str) -> Result<()> {
        let expected = format!("'{literal}'");
        let token = self.expect_token(&expected)?;
        if token == literal {
            Ok(())
        } else {
            Err(self.unexpected(&expected, token))
        }
    }

    /// Read a token and parse it as `T`
    fn parse_value<T: FromStr>(&mut self, what: &str) -> Result<T> {
        let token = self.expect_token(what)?;
        token.parse().map_err(|_| self.unexpected(what, token))
    }

    /// Read a parenthesised pair: `( x y )`
    fn parse_vec2(&mut self, what: &str) -> Result<Vec2> {
        self.expect_literal("(")?;
        let x = self.parse_value(what)?;
        let y = self.parse_value(what)?;
        self.expect_literal(")")?;
        Ok(Vec2::new(x, y))
    }

    /// Read a parenthesised triple: `( x y z )`
    fn parse_vec3(&mut self, what: &str) -> Result<Vec3> {
        self.expect_literal("(")?;
        let x = self.parse_value(what)?;
        let y = self.parse_value(what)?;
        let z = self.parse_value(what)?;
        self.expect_literal(")")?;
        Ok(Vec3::new(x, y, z))
    }

    /// Build an [`Md5Error::UnexpectedToken`] at the current line
    fn unexpected(&self, expected: &str, found: &str) -> Md5Error {
        Md5Error::UnexpectedToken {
            context: self.context().to_string(),
            line: self.line(),
            expected: expected.to_string(),
            found: found.to_string(),
        }
    }
}

/// [`TokenReader`] over in-memory text
#[derive(Debug, Clone)]
pub struct Tokenizer<'a> {
    input: &'a str,
    pos: usize,
    line: usize,
    context: String,
}

impl<'a> Tokenizer<'a> {
    /// Create a tokenizer over `input`, labelling errors with `context`
    pub fn new(input: &'a str, context: impl Into<String>) -> Self {
        Self {
            input,
            pos: 0,
            line: 1,
            context: context.into(),
        }
    }

    /// Whether only whitespace and comments remain
    pub fn is_at_end(&mut self) -> bool {
        self.skip_whitespace_and_comments();
        self.pos >= self.input.len()
    }

    fn skip_whitespace_and_comments(&mut self) {
        let bytes = self.input.as_bytes();
        loop {
            while self.pos < bytes.len() && bytes[self.pos].is_ascii_whitespace() {
                if bytes[self.pos] == b'\n' {
                    self.line += 1;
                }
                self.pos += 1;
            }

            if !self.input[self.pos..].starts_with("//") {
                return;
            }
            while self.pos < bytes.len() && bytes[self.pos] != b'\n' {
                self.pos += 1;
            }
        }
    }
}

impl<'a> TokenReader<'a> for Tokenizer<'a> {
    fn next_token(&mut self) -> Option<&'a str> {
        self.skip_whitespace_and_comments();

        let input = self.input;
        let bytes = input.as_bytes();
        if self.pos >= bytes.len() {
            return None;
        }

        if bytes[self.pos] == b'"' {
            let start = self.pos + 1;
            let end = input[start..]
                .find('"')
                .map_or(input.len(), |offset| start + offset);
            let token = &input[start..end];
            self.line += token.matches('\n').count();
            self.pos = (end + 1).min(input.len());
            return Some(token);
        }

        let start = self.pos;
        while self.pos < bytes.len() && !bytes[self.pos].is_ascii_whitespace() {
            self.pos += 1;
        }
        Some(&input[start..self.pos])
    }

    fn rest_of_line(&mut self) -> &'a str {
        let input = self.input;
        let start = self.pos.min(input.len());
        let end = input[start..]
            .find('\n')
            .map_or(input.len(), |offset| start + offset);

        if end < input.len() {
            self.line += 1;
            self.pos = end + 1;
        } else {
            self.pos = end;
        }
        input[start..end].trim()
    }

    fn line(&self) -> usize {
        self.line
    }

    fn context(&self) -> &str {
        &self.context
    }
}
