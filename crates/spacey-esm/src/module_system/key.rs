// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Resolved module identifiers

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Unique identifier of a resolved module: an absolute path or a URL.
///
/// Cheap to clone; compared by value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModuleKey(Arc<str>);

impl ModuleKey {
    /// Create a key from an already-resolved identifier
    pub fn new(key: impl Into<Arc<str>>) -> Self {
        Self(key.into())
    }

    /// The key as a string
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Filesystem path for `file:` URLs and absolute paths
    pub fn to_file_path(&self) -> Option<PathBuf> {
        let path = Path::new(self.as_str());
        if path.is_absolute() {
            return Some(path.to_path_buf());
        }

        url::Url::parse(self.as_str())
            .ok()
            .filter(|url| url.scheme() == "file")
            .and_then(|url| url.to_file_path().ok())
    }

    /// The URL scheme of this key, if it is a URL rather than a path
    pub fn scheme(&self) -> Option<&str> {
        if Path::new(self.as_str()).is_absolute() {
            return None;
        }
        let (scheme, _) = self.as_str().split_once(':')?;
        is_url_scheme(scheme).then_some(scheme)
    }
}

/// Whether a specifier already names a resolved module and can be used as a
/// key without going through the resolver.
pub fn is_absolute_key(specifier: &str) -> bool {
    if Path::new(specifier).is_absolute() {
        return true;
    }

    // Single-letter schemes are Windows drive letters, not URLs
    match url::Url::parse(specifier) {
        Ok(url) => url.scheme().len() > 1,
        Err(_) => false,
    }
}

fn is_url_scheme(scheme: &str) -> bool {
    let mut chars = scheme.chars();
    scheme.len() > 1
        && chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

impl fmt::Display for ModuleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ModuleKey {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl From<&str> for ModuleKey {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

impl From<String> for ModuleKey {
    fn from(key: String) -> Self {
        Self::new(key)
    }
}

impl From<&Path> for ModuleKey {
    fn from(path: &Path) -> Self {
        Self::new(path.to_string_lossy().as_ref())
    }
}

impl From<PathBuf> for ModuleKey {
    fn from(path: PathBuf) -> Self {
        Self::from(path.as_path())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absolute_keys() {
        assert!(is_absolute_key("/srv/app/index.mjs"));
        assert!(is_absolute_key("file:///srv/app/index.mjs"));
        assert!(is_absolute_key("node:fs"));
        assert!(is_absolute_key("https://esm.sh/preact"));

        assert!(!is_absolute_key("./b.mjs"));
        assert!(!is_absolute_key("../lib/util.js"));
        assert!(!is_absolute_key("lodash"));
        assert!(!is_absolute_key("@scope/pkg/sub"));
    }

    #[test]
    fn test_key_equality_is_by_value() {
        let a = ModuleKey::from("/a.mjs");
        let b = ModuleKey::from(String::from("/a.mjs"));
        assert_eq!(a, b);
        assert_ne!(a, ModuleKey::from("/b.mjs"));
    }

    #[test]
    fn test_scheme_and_file_path() {
        assert_eq!(ModuleKey::from("node:path").scheme(), Some("node"));
        assert_eq!(ModuleKey::from("/a.mjs").scheme(), None);
        assert_eq!(
            ModuleKey::from("/srv/a.mjs").to_file_path(),
            Some(PathBuf::from("/srv/a.mjs"))
        );
        assert_eq!(
            ModuleKey::from("file:///srv/a.mjs").to_file_path(),
            Some(PathBuf::from("/srv/a.mjs"))
        );
        assert_eq!(ModuleKey::from("node:fs").to_file_path(), None);
    }
}
