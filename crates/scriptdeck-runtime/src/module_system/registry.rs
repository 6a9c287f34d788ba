// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Module, external module and URL tables

use super::resolver::{Specifier, resolve_key};
use crate::error::{Result, RuntimeError};
use boa_engine::JsValue;
use std::collections::HashMap;

/// Tables consulted by `require`
///
/// - `modules`: exports of modules registered by name
/// - `externals`: host-provided values, consulted before `modules`
/// - `urls`: exports of remote modules keyed by URL
#[derive(Debug, Default)]
pub struct ModuleRegistry {
    modules: HashMap<String, JsValue>,
    externals: HashMap<String, JsValue>,
    urls: HashMap<String, JsValue>,
}

impl ModuleRegistry {
    /// Create empty tables
    pub fn new() -> Self {
        Self::default()
    }

    /// Exports of a registered module
    pub fn module(&self, name: &str) -> Option<JsValue> {
        self.modules.get(name).cloned()
    }

    /// Store a module's exports, replacing any previous entry
    pub fn insert_module(&mut self, name: impl Into<String>, exports: JsValue) {
        let name = name.into();
        if self.modules.insert(name.clone(), exports).is_some() {
            tracing::debug!("Replaced module '{}'", name);
        }
    }

    /// Host-provided external module
    pub fn external(&self, name: &str) -> Option<JsValue> {
        self.externals.get(name).cloned()
    }

    /// Store an external module, replacing any previous entry
    pub fn insert_external(&mut self, name: impl Into<String>, value: JsValue) {
        self.externals.insert(name.into(), value);
    }

    /// Exports of a loaded remote module
    pub fn url(&self, url: &str) -> Option<JsValue> {
        self.urls.get(url).cloned()
    }

    /// Store a remote module's exports
    pub fn insert_url(&mut self, url: impl Into<String>, exports: JsValue) {
        self.urls.insert(url.into(), exports);
    }

    /// Empty the module and URL tables. External modules stay registered.
    pub fn clear(&mut self) {
        tracing::debug!(
            "Clearing {} module(s) and {} URL module(s)",
            self.modules.len(),
            self.urls.len()
        );
        self.modules.clear();
        self.urls.clear();
    }

    /// Names of registered modules, sorted
    pub fn module_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.modules.keys().cloned().collect();
        names.sort();
        names
    }

    /// Names of external modules, sorted
    pub fn external_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.externals.keys().cloned().collect();
        names.sort();
        names
    }

    /// Synchronous `require` lookup for a unit running as `identity`
    pub fn resolve(&self, identity: &str, specifier: &str) -> Result<JsValue> {
        if let Specifier::Remote(url) = Specifier::parse(specifier) {
            return Err(RuntimeError::ExternalModuleSync(url.to_string()));
        }

        if let Some(value) = self.external(specifier) {
            tracing::debug!("require('{}') -> external module", specifier);
            return Ok(value);
        }

        let key = resolve_key(identity, specifier);
        match self.module(&key) {
            Some(exports) => {
                tracing::debug!("require('{}') -> module '{}'", specifier, key);
                Ok(exports)
            }
            None => Err(RuntimeError::module_not_found(specifier)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_specifier_is_rejected() {
        let registry = ModuleRegistry::new();
        let err = registry
            .resolve("t.js", "https://example.com/mod.js")
            .unwrap_err();
        assert!(matches!(err, RuntimeError::ExternalModuleSync(url) if url == "https://example.com/mod.js"));
    }

    #[test]
    fn test_externals_take_priority() {
        let mut registry = ModuleRegistry::new();
        registry.insert_module("utils", JsValue::from(1));
        registry.insert_external("utils", JsValue::from(2));

        let value = registry.resolve("t.js", "utils").unwrap();
        assert_eq!(value.as_number(), Some(2.0));
    }

    #[test]
    fn test_relative_lookup() {
        let mut registry = ModuleRegistry::new();
        registry.insert_module("/a/b/foo", JsValue::from(7));

        let value = registry.resolve("/a/b/c.js", "./foo").unwrap();
        assert_eq!(value.as_number(), Some(7.0));
        assert!(registry.resolve("/a/c.js", "./foo").is_err());
    }

    #[test]
    fn test_missing_module() {
        let registry = ModuleRegistry::new();
        let err = registry.resolve("t.js", "./nope").unwrap_err();
        assert_eq!(err.to_string(), "Cannot find module './nope'");
    }

    #[test]
    fn test_clear_keeps_externals() {
        let mut registry = ModuleRegistry::new();
        registry.insert_module("m", JsValue::from(1));
        registry.insert_url("https://example.com/a.js", JsValue::from(2));
        registry.insert_external("ext", JsValue::from(3));

        registry.clear();

        assert!(registry.module("m").is_none());
        assert!(registry.url("https://example.com/a.js").is_none());
        assert!(registry.external("ext").is_some());
        assert_eq!(registry.external_names(), vec!["ext".to_string()]);
        assert!(registry.module_names().is_empty());
    }
}
