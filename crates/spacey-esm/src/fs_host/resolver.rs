// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Module path resolution (Node.js algorithm)

use crate::config::LoaderConfig;
use crate::error::{EsmError, Result};
use crate::module_system::{ModuleKey, ModuleType};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Names of the runtime's built-in modules
pub const BUILTIN_MODULES: &[&str] = &[
    "assert",
    "buffer",
    "child_process",
    "cluster",
    "console",
    "constants",
    "crypto",
    "dgram",
    "dns",
    "domain",
    "events",
    "fs",
    "http",
    "https",
    "module",
    "net",
    "os",
    "path",
    "perf_hooks",
    "process",
    "punycode",
    "querystring",
    "readline",
    "repl",
    "stream",
    "string_decoder",
    "sys",
    "timers",
    "tls",
    "tty",
    "url",
    "util",
    "v8",
    "vm",
    "worker_threads",
    "zlib",
];

/// Conditions accepted in a package.json `exports` map, by priority
const EXPORT_CONDITIONS: &[&str] = &["require", "node", "import", "default"];

/// Module resolver implementing the Node.js resolution algorithm
#[derive(Debug, Clone)]
pub struct ModuleResolver {
    extensions: Vec<String>,
    main_fields: Vec<String>,
    builtin_prefix: String,
}

impl ModuleResolver {
    /// Create a resolver from loader configuration
    pub fn new(config: &LoaderConfig) -> Self {
        Self {
            extensions: config.extensions.clone(),
            main_fields: config.main_fields.clone(),
            builtin_prefix: config.builtin_prefix.clone(),
        }
    }

    /// Check if a module is a built-in
    pub fn is_builtin(&self, name: &str) -> bool {
        let name = name.strip_prefix(self.builtin_prefix.as_str()).unwrap_or(name);
        BUILTIN_MODULES.contains(&name)
    }

    /// Key for a built-in module name
    pub fn builtin_key(&self, name: &str) -> ModuleKey {
        let name = name.strip_prefix(self.builtin_prefix.as_str()).unwrap_or(name);
        ModuleKey::from(format!("{}{}", self.builtin_prefix, name))
    }

    /// Resolve `specifier` as imported by the module `referrer`
    pub fn resolve(&self, specifier: &str, referrer: &ModuleKey) -> Result<ModuleKey> {
        if self.is_builtin(specifier) {
            return Ok(self.builtin_key(specifier));
        }

        let parent_path = referrer.to_file_path().ok_or_else(|| {
            EsmError::resolution(specifier, referrer, "referrer is not a file module")
        })?;

        let resolved = if is_path_specifier(specifier) {
            self.resolve_file(specifier, &parent_path)
        } else {
            self.resolve_node_modules(specifier, &parent_path)
        };

        let path = resolved.ok_or_else(|| EsmError::module_not_found(specifier, referrer))?;
        tracing::trace!(specifier, referrer = %referrer, resolved = %path.display(), "resolved module");
        Ok(ModuleKey::from(path))
    }

    /// Resolve a file path relative to the importing module
    fn resolve_file(&self, specifier: &str, parent_path: &Path) -> Option<PathBuf> {
        let parent_dir = parent_path.parent().unwrap_or(Path::new("."));
        self.resolve_path(&parent_dir.join(specifier))
    }

    /// Try `path` as a file, then with each extension, then as a directory
    fn resolve_path(&self, path: &Path) -> Option<PathBuf> {
        self.try_file(path).or_else(|| {
            if path.is_dir() {
                self.resolve_directory(path)
            } else {
                None
            }
        })
    }

    fn try_file(&self, path: &Path) -> Option<PathBuf> {
        if path.is_file() {
            return Some(canonical(path));
        }

        let file_name = path.file_name()?.to_string_lossy();
        self.extensions
            .iter()
            .map(|ext| path.with_file_name(format!("{}{}", file_name, ext)))
            .find(|candidate| candidate.is_file())
            .map(|candidate| canonical(&candidate))
    }

    /// Resolve a directory (package.json entry point or index file)
    fn resolve_directory(&self, dir: &Path) -> Option<PathBuf> {
        if let Some(pkg) = PackageJson::read(&dir.join("package.json")) {
            let entries = pkg
                .exports
                .as_ref()
                .and_then(package_entry)
                .into_iter()
                .chain(self.main_fields.iter().filter_map(|field| pkg.field(field)));

            for entry in entries {
                if let Some(path) = self.resolve_entry(dir, &dir.join(entry)) {
                    return Some(path);
                }
            }
        }

        self.extensions
            .iter()
            .map(|ext| dir.join(format!("index{}", ext)))
            .find(|index| index.is_file())
            .map(|index| canonical(&index))
    }

    /// Resolve a package entry point, which may name a file or a directory
    /// below the package. Directories outside `dir` (or `dir` itself) are
    /// only tried as files, so nested packages cannot loop.
    fn resolve_entry(&self, dir: &Path, target: &Path) -> Option<PathBuf> {
        if let Some(path) = self.try_file(target) {
            return Some(path);
        }

        let (target_dir, package_dir) = (canonical(target), canonical(dir));
        if target.is_dir() && target_dir != package_dir && target_dir.starts_with(&package_dir) {
            return self.resolve_directory(target);
        }
        None
    }

    /// Resolve a module from node_modules
    fn resolve_node_modules(&self, specifier: &str, parent_path: &Path) -> Option<PathBuf> {
        let (package_name, subpath) = parse_package_specifier(specifier);

        let mut current = parent_path.parent();
        while let Some(dir) = current {
            let package_dir = dir.join("node_modules").join(package_name);
            if package_dir.exists() {
                let resolved = match subpath {
                    Some(sub) => self.resolve_path(&package_dir.join(sub)),
                    None => self.resolve_directory(&package_dir),
                };
                if resolved.is_some() {
                    return resolved;
                }
            }
            current = dir.parent();
        }

        None
    }
}

impl Default for ModuleResolver {
    fn default() -> Self {
        Self::new(&LoaderConfig::default())
    }
}

fn is_path_specifier(specifier: &str) -> bool {
    specifier.starts_with("./")
        || specifier.starts_with("../")
        || specifier == "."
        || specifier == ".."
        || Path::new(specifier).is_absolute()
}

fn canonical(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}

/// Split a package specifier into name and optional subpath
fn parse_package_specifier(specifier: &str) -> (&str, Option<&str>) {
    if let Some(scoped) = specifier.strip_prefix('@') {
        // @scope/name or @scope/name/subpath
        if let Some(slash_pos) = scoped.find('/') {
            let after_scope = &specifier[slash_pos + 2..];
            if let Some(subpath_pos) = after_scope.find('/') {
                let name_end = slash_pos + 2 + subpath_pos;
                return (&specifier[..name_end], Some(&specifier[name_end + 1..]));
            }
        }
        (specifier, None)
    } else if let Some((name, subpath)) = specifier.split_once('/') {
        (name, Some(subpath))
    } else {
        (specifier, None)
    }
}

/// The root entry of a package.json `exports` value
fn package_entry(exports: &serde_json::Value) -> Option<String> {
    match exports {
        serde_json::Value::String(target) => Some(target.clone()),
        serde_json::Value::Object(map) => {
            if let Some(root) = map.get(".") {
                return package_entry(root);
            }
            EXPORT_CONDITIONS
                .iter()
                .find_map(|condition| map.get(*condition))
                .and_then(package_entry)
        }
        serde_json::Value::Array(targets) => targets.iter().find_map(package_entry),
        _ => None,
    }
}

/// Module type declared by the nearest package.json `"type"` field
pub fn find_package_type(path: &Path) -> Option<ModuleType> {
    let mut current = path.parent();

    while let Some(dir) = current {
        if let Some(pkg) = PackageJson::read(&dir.join("package.json")) {
            return Some(ModuleType::from_package_type(pkg.type_field.as_deref()));
        }
        current = dir.parent();
    }

    None
}

/// Minimal package.json structure for resolution
#[derive(Debug, Deserialize)]
struct PackageJson {
    #[serde(rename = "type")]
    type_field: Option<String>,
    #[serde(default)]
    exports: Option<serde_json::Value>,
    #[serde(flatten)]
    fields: HashMap<String, serde_json::Value>,
}

impl PackageJson {
    fn read(path: &Path) -> Option<Self> {
        let content = std::fs::read_to_string(path).ok()?;
        match serde_json::from_str(&content) {
            Ok(pkg) => Some(pkg),
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "ignoring malformed package.json");
                None
            }
        }
    }

    fn field(&self, name: &str) -> Option<String> {
        self.fields.get(name)?.as_str().map(str::to_string)
    }
}
