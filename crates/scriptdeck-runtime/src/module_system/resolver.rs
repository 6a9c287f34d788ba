// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Specifier classification and identity-relative path resolution

use url::Url;

/// Kind of a `require` specifier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Specifier<'a> {
    /// `http://` or `https://` module, only loadable through `require.async`
    Remote(&'a str),
    /// `./x` or `../x`, resolved against the requiring module's identity
    Relative(&'a str),
    /// Anything else: an external module name or a registered module name
    Bare(&'a str),
}

impl<'a> Specifier<'a> {
    /// Classify a specifier
    pub fn parse(specifier: &'a str) -> Self {
        if is_remote(specifier) {
            Specifier::Remote(specifier)
        } else if is_relative(specifier) {
            Specifier::Relative(specifier)
        } else {
            Specifier::Bare(specifier)
        }
    }
}

/// Check whether a specifier names a remote module.
///
/// Any specifier beginning with `http` is remote, which covers both
/// `http://` and `https://`.
pub fn is_remote(specifier: &str) -> bool {
    specifier.starts_with("http")
}

/// Check whether a specifier is relative to the requiring module
pub fn is_relative(specifier: &str) -> bool {
    specifier == "."
        || specifier == ".."
        || specifier.starts_with("./")
        || specifier.starts_with("../")
}

/// Resolve a relative specifier against a module identity.
///
/// The last segment of `identity` (the file name) is dropped, then each
/// segment of `specifier` is applied: `.` is a no-op, `..` pops one segment,
/// anything else is pushed. Popping never removes the root of an absolute
/// identity.
pub fn resolve_relative(identity: &str, specifier: &str) -> String {
    // Inside a URL module, `..` stops at the host
    if is_remote(identity) {
        if let Some(joined) = Url::parse(identity)
            .ok()
            .and_then(|base| base.join(specifier).ok())
        {
            return joined.to_string();
        }
    }

    let mut segments: Vec<&str> = identity.split('/').collect();
    segments.pop();

    let absolute = identity.starts_with('/');
    for segment in specifier.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if !(absolute && segments.len() == 1) {
                    segments.pop();
                }
            }
            other => segments.push(other),
        }
    }

    segments.join("/")
}

/// Resolve any specifier to the key used for the module cache lookup
pub fn resolve_key(identity: &str, specifier: &str) -> String {
    match Specifier::parse(specifier) {
        Specifier::Relative(relative) => resolve_relative(identity, relative),
        Specifier::Remote(s) | Specifier::Bare(s) => s.to_string(),
    }
}

/// Directory part of a module identity, as exposed through `__dirname`
pub fn dirname(identity: &str) -> String {
    match identity.rfind('/') {
        Some(0) => "/".to_string(),
        Some(pos) => identity[..pos].to_string(),
        None => ".".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_specifier_parse() {
        assert_eq!(
            Specifier::parse("http://example.com/mod.js"),
            Specifier::Remote("http://example.com/mod.js")
        );
        assert_eq!(
            Specifier::parse("https://cdn.example.com/a.js"),
            Specifier::Remote("https://cdn.example.com/a.js")
        );
        assert_eq!(Specifier::parse("./foo"), Specifier::Relative("./foo"));
        assert_eq!(Specifier::parse("../foo"), Specifier::Relative("../foo"));
        assert_eq!(Specifier::parse("timers"), Specifier::Bare("timers"));
        assert_eq!(Specifier::parse("httpclient"), Specifier::Remote("httpclient"));
        assert_eq!(Specifier::parse("http-utils"), Specifier::Remote("http-utils"));
        assert_eq!(Specifier::parse("ftp://host/x.js"), Specifier::Bare("ftp://host/x.js"));
    }

    #[test]
    fn test_resolve_relative() {
        assert_eq!(resolve_relative("/a/b/c.js", "./foo"), "/a/b/foo");
        assert_eq!(resolve_relative("/a/b/c.js", "../x"), "/a/x");
        assert_eq!(resolve_relative("/a/b/c.js", "./lib/./util"), "/a/b/lib/util");
        assert_eq!(resolve_relative("a/b/c.js", "../../x"), "x");
        assert_eq!(resolve_relative("t.js", "./foo"), "foo");
    }

    #[test]
    fn test_resolve_relative_stops_at_root() {
        assert_eq!(resolve_relative("/a/c.js", "../../../x"), "/x");
        assert_eq!(resolve_relative("/c.js", "../x"), "/x");
    }

    #[test]
    fn test_resolve_relative_in_url_module() {
        assert_eq!(
            resolve_relative("https://example.com/lib/a.js", "../../../x.js"),
            "https://example.com/x.js"
        );
        assert_eq!(
            resolve_relative("https://example.com/lib/a.js", "./util/b.js"),
            "https://example.com/lib/util/b.js"
        );
    }

    #[test]
    fn test_resolve_key() {
        assert_eq!(resolve_key("/a/b/c.js", "./foo"), "/a/b/foo");
        assert_eq!(resolve_key("/a/b/c.js", "utils"), "utils");
        assert_eq!(
            resolve_key("https://example.com/lib/a.js", "./b.js"),
            "https://example.com/lib/b.js"
        );
    }

    #[test]
    fn test_dirname() {
        assert_eq!(dirname("/a/b/c.js"), "/a/b");
        assert_eq!(dirname("/c.js"), "/");
        assert_eq!(dirname("t.js"), ".");
        assert_eq!(dirname("https://example.com/lib/a.js"), "https://example.com/lib");
    }
}
