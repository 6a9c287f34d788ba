// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Import statement normalization
//!
//! Script bodies run as function bodies, where ES module declarations are not
//! valid syntax. Two forms are rewritten onto `require`:
//!
//! - `import { a, b as c } from "pkg"` becomes `const { a, b: c } = require("pkg")`
//! - `import "pkg"` becomes `require("pkg")`
//!
//! Everything else that starts with the `import` keyword (default imports,
//! namespace imports, dynamic `import()`, `import.meta`) is left untouched and
//! reported in [`Rewrite::unsupported`]; it then fails at compile time like
//! any other syntax error. The scanner skips strings, template literals and
//! comments, but it is not a parser: regular expression literals containing
//! quotes can confuse it.

/// An `import` form the rewriter left unchanged
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsupportedImport {
    /// 1-based line of the `import` keyword
    pub line: usize,
    /// The source text from the keyword to the end of its line
    pub text: String,
}

/// Result of rewriting a script body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rewrite {
    /// Rewritten source
    pub source: String,
    /// Number of import declarations turned into `require` calls
    pub rewritten: usize,
    /// Import forms that were passed through unchanged
    pub unsupported: Vec<UnsupportedImport>,
}

/// One imported binding: `imported` or `imported as local`
#[derive(Debug, Clone, PartialEq, Eq)]
struct Binding<'a> {
    imported: &'a str,
    local: Option<&'a str>,
}

/// A recognized import declaration
#[derive(Debug, Clone, PartialEq, Eq)]
enum Declaration<'a> {
    Named {
        bindings: Vec<Binding<'a>>,
        specifier: &'a str,
        quote: u8,
    },
    SideEffect {
        specifier: &'a str,
        quote: u8,
    },
}

impl Declaration<'_> {
    fn to_require(&self) -> String {
        match self {
            Declaration::Named {
                bindings,
                specifier,
                quote,
            } => {
                let names: Vec<String> = bindings
                    .iter()
                    .map(|b| match b.local {
                        Some(local) => format!("{}: {}", b.imported, local),
                        None => b.imported.to_string(),
                    })
                    .collect();
                let q = *quote as char;
                format!("const {{ {} }} = require({q}{specifier}{q});", names.join(", "))
            }
            Declaration::SideEffect { specifier, quote } => {
                let q = *quote as char;
                format!("require({q}{specifier}{q});")
            }
        }
    }
}

/// Rewrite supported import declarations in `source` onto `require`
pub fn rewrite_imports(source: &str) -> Rewrite {
    let bytes = source.as_bytes();
    let mut out = String::with_capacity(source.len());
    let mut rewritten = 0;
    let mut unsupported = Vec::new();
    let mut copied = 0;
    let mut pos = 0;

    while pos < bytes.len() {
        match bytes[pos] {
            b'\'' | b'"' => pos = skip_string(bytes, pos),
            b'`' => pos = skip_template(bytes, pos),
            b'/' if bytes.get(pos + 1) == Some(&b'/') => pos = skip_line_comment(bytes, pos),
            b'/' if bytes.get(pos + 1) == Some(&b'*') => pos = skip_block_comment(bytes, pos),
            b'i' if is_keyword_at(bytes, pos, b"import") => {
                match parse_declaration(source, pos + "import".len()) {
                    Some((declaration, end)) => {
                        out.push_str(&source[copied..pos]);
                        out.push_str(&declaration.to_require());
                        // keep line numbers stable for error reports
                        for _ in 0..source[pos..end].matches('\n').count() {
                            out.push('\n');
                        }
                        copied = end;
                        rewritten += 1;
                        pos = end;
                    }
                    None => {
                        unsupported.push(UnsupportedImport {
                            line: source[..pos].matches('\n').count() + 1,
                            text: source[pos..].lines().next().unwrap_or_default().to_string(),
                        });
                        pos += "import".len();
                    }
                }
            }
            b if is_ident_byte(b) => {
                while pos < bytes.len() && is_ident_byte(bytes[pos]) {
                    pos += 1;
                }
            }
            _ => pos += 1,
        }
    }
    out.push_str(&source[copied..]);

    Rewrite {
        source: out,
        rewritten,
        unsupported,
    }
}

fn is_ident_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'$' || b >= 0x80
}

fn is_keyword_at(bytes: &[u8], pos: usize, keyword: &[u8]) -> bool {
    if !bytes[pos..].starts_with(keyword) {
        return false;
    }
    if bytes.get(pos + keyword.len()).is_some_and(|&b| is_ident_byte(b)) {
        return false;
    }
    // `obj.import` is a property access, not a declaration
    let before = bytes[..pos]
        .iter()
        .rev()
        .find(|b| !b.is_ascii_whitespace())
        .copied();
    before != Some(b'.')
}

fn skip_string(bytes: &[u8], start: usize) -> usize {
    let quote = bytes[start];
    let mut pos = start + 1;
    while pos < bytes.len() {
        match bytes[pos] {
            b'\\' => pos += 2,
            b'\n' => return pos,
            b if b == quote => return pos + 1,
            _ => pos += 1,
        }
    }
    bytes.len()
}

fn skip_template(bytes: &[u8], start: usize) -> usize {
    let mut pos = start + 1;
    while pos < bytes.len() {
        match bytes[pos] {
            b'\\' => pos += 2,
            b'`' => return pos + 1,
            b'$' if bytes.get(pos + 1) == Some(&b'{') => {
                pos = skip_substitution(bytes, pos + 2);
            }
            _ => pos += 1,
        }
    }
    bytes.len()
}

fn skip_substitution(bytes: &[u8], start: usize) -> usize {
    let mut depth = 1;
    let mut pos = start;
    while pos < bytes.len() {
        match bytes[pos] {
            b'\'' | b'"' => pos = skip_string(bytes, pos),
            b'`' => pos = skip_template(bytes, pos),
            b'{' => {
                depth += 1;
                pos += 1;
            }
            b'}' => {
                depth -= 1;
                pos += 1;
                if depth == 0 {
                    return pos;
                }
            }
            _ => pos += 1,
        }
    }
    bytes.len()
}

fn skip_line_comment(bytes: &[u8], start: usize) -> usize {
    bytes[start..]
        .iter()
        .position(|&b| b == b'\n')
        .map_or(bytes.len(), |offset| start + offset)
}

fn skip_block_comment(bytes: &[u8], start: usize) -> usize {
    bytes[start + 2..]
        .windows(2)
        .position(|w| w == b"*/")
        .map_or(bytes.len(), |offset| start + 2 + offset + 2)
}

/// Cursor over the text following an `import` keyword
struct Cursor<'a> {
    source: &'a str,
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn peek(&self) -> Option<u8> {
        self.source.as_bytes().get(self.pos).copied()
    }

    fn skip_trivia(&mut self) {
        let bytes = self.source.as_bytes();
        loop {
            while self.pos < bytes.len() && bytes[self.pos].is_ascii_whitespace() {
                self.pos += 1;
            }
            if bytes[self.pos..].starts_with(b"//") {
                self.pos = skip_line_comment(bytes, self.pos);
            } else if bytes[self.pos..].starts_with(b"/*") {
                self.pos = skip_block_comment(bytes, self.pos);
            } else {
                return;
            }
        }
    }

    fn eat(&mut self, byte: u8) -> bool {
        self.skip_trivia();
        if self.peek() == Some(byte) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn identifier(&mut self) -> Option<&'a str> {
        self.skip_trivia();
        let bytes = self.source.as_bytes();
        let start = self.pos;
        if bytes.get(start).is_none_or(|b| b.is_ascii_digit()) {
            return None;
        }
        while self.pos < bytes.len() && is_ident_byte(bytes[self.pos]) {
            self.pos += 1;
        }
        (self.pos > start).then(|| &self.source[start..self.pos])
    }

    fn string(&mut self) -> Option<(&'a str, u8)> {
        self.skip_trivia();
        let quote = self.peek().filter(|q| *q == b'\'' || *q == b'"')?;
        let end = skip_string(self.source.as_bytes(), self.pos);
        let closed = end >= 2 && self.source.as_bytes().get(end - 1) == Some(&quote);
        if !closed || end - self.pos < 2 {
            return None;
        }
        let value = &self.source[self.pos + 1..end - 1];
        self.pos = end;
        Some((value, quote))
    }

    fn finish_statement(&mut self) {
        let save = self.pos;
        if !self.eat(b';') {
            self.pos = save;
        }
    }
}

fn parse_declaration(source: &str, after_keyword: usize) -> Option<(Declaration<'_>, usize)> {
    let mut cursor = Cursor {
        source,
        pos: after_keyword,
    };
    cursor.skip_trivia();

    match cursor.peek()? {
        b'\'' | b'"' => {
            let (specifier, quote) = cursor.string()?;
            cursor.finish_statement();
            Some((Declaration::SideEffect { specifier, quote }, cursor.pos))
        }
        b'{' => {
            cursor.pos += 1;
            let mut bindings = Vec::new();
            loop {
                if cursor.eat(b'}') {
                    break;
                }
                let imported = cursor.identifier()?;
                let local = match cursor.identifier() {
                    Some("as") => Some(cursor.identifier()?),
                    Some(_) => return None,
                    None => None,
                };
                bindings.push(Binding { imported, local });
                if !cursor.eat(b',') {
                    if cursor.eat(b'}') {
                        break;
                    }
                    return None;
                }
            }
            if cursor.identifier()? != "from" {
                return None;
            }
            let (specifier, quote) = cursor.string()?;
            cursor.finish_statement();
            Some((
                Declaration::Named {
                    bindings,
                    specifier,
                    quote,
                },
                cursor.pos,
            ))
        }
        _ => None,
    }
}
