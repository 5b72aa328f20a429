// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Loader configuration

use crate::error::Result;
use serde::Deserialize;
use std::path::Path;

/// Extensions tried when a specifier names a file without one
pub const DEFAULT_EXTENSIONS: &[&str] = &[".mjs", ".js", ".cjs", ".json"];

/// package.json fields consulted for a package entry point
pub const DEFAULT_MAIN_FIELDS: &[&str] = &["module", "main"];

/// Configuration for the synchronous loader and the filesystem host.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LoaderConfig {
    /// File extensions to try, in order
    pub extensions: Vec<String>,

    /// package.json entry point fields, in order
    pub main_fields: Vec<String>,

    /// Scheme used for built-in module keys
    pub builtin_prefix: String,

    /// Run link+evaluate after linking the graph
    pub evaluate: bool,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            extensions: DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
            main_fields: DEFAULT_MAIN_FIELDS.iter().map(|f| f.to_string()).collect(),
            builtin_prefix: "node:".to_string(),
            evaluate: true,
        }
    }
}

impl LoaderConfig {
    /// Defaults overridden from the environment.
    pub fn load() -> Self {
        let mut config = Self::default();
        config.load_from_env();
        config
    }

    /// Parse a JSON configuration object. Missing fields keep their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read a JSON configuration file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    /// Apply `SPACEY_ESM_*` environment overrides.
    pub fn load_from_env(&mut self) {
        self.apply_env(|name| std::env::var(name).ok());
    }

    fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(extensions) = var("SPACEY_ESM_EXTENSIONS") {
            self.extensions = split_list(&extensions)
                .map(|ext| {
                    if ext.starts_with('.') {
                        ext.to_string()
                    } else {
                        format!(".{}", ext)
                    }
                })
                .collect();
        }

        if let Some(fields) = var("SPACEY_ESM_MAIN_FIELDS") {
            self.main_fields = split_list(&fields).map(str::to_string).collect();
        }

        if let Some(value) = var("SPACEY_ESM_NO_EVALUATE") {
            self.evaluate = matches!(value.trim(), "" | "0" | "false");
        }
    }
}

fn split_list(value: &str) -> impl Iterator<Item = &str> {
    value.split(',').map(str::trim).filter(|item| !item.is_empty())
}
