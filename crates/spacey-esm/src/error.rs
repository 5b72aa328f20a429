// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Error types for synchronous ESM loading

use crate::module_system::ModuleKey;
use std::fmt;
use thiserror::Error;

/// Result type for ESM loading operations
pub type Result<T> = std::result::Result<T, EsmError>;

/// Fallback text for a thrown value that stringifies to nothing
const UNKNOWN_ERROR: &str = "An error occurred";

/// A thrown JavaScript value.
///
/// Either an `Error`-like object (a name plus an optional message) or a
/// primitive that was thrown directly (`throw 42`, `throw undefined`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exception {
    name: String,
    message: Option<String>,
    /// String form of a non-Error thrown value
    thrown: Option<String>,
}

impl Exception {
    /// An `Error` object with a message
    pub fn new(message: impl Into<String>) -> Self {
        Self::with_name("Error", message)
    }

    /// An error object of a specific class (`TypeError`, `SyntaxError`, ...)
    pub fn with_name(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            message: Some(message.into()),
            thrown: None,
        }
    }

    /// An error object constructed without a message (`new Error()`)
    pub fn without_message(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            message: None,
            thrown: None,
        }
    }

    /// A primitive value thrown directly
    pub fn thrown(value: impl fmt::Display) -> Self {
        Self {
            name: "Error".to_string(),
            message: None,
            thrown: Some(value.to_string()),
        }
    }

    /// `throw undefined`
    pub fn undefined() -> Self {
        Self {
            name: "Error".to_string(),
            message: None,
            thrown: Some(String::new()),
        }
    }

    /// Error class name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The error message, if the thrown value carries a non-empty one
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref().filter(|m| !m.is_empty())
    }

    /// Whether the thrown value carries a usable message
    pub fn has_message(&self) -> bool {
        self.message().is_some()
    }

    /// `String(e)` as JavaScript would render it, or `None` when the value is
    /// falsy (`undefined`, `""`).
    fn stringified(&self) -> Option<String> {
        match (&self.thrown, self.message()) {
            (Some(value), _) if value.is_empty() => None,
            (Some(value), _) => Some(value.clone()),
            (None, Some(message)) => Some(format!("{}: {}", self.name, message)),
            (None, None) => Some(self.name.clone()),
        }
    }

    /// Give a message-less exception a message naming the module it came
    /// from. Exceptions that already carry a message are returned unchanged.
    pub fn with_module_context(self, key: &ModuleKey) -> Self {
        if self.has_message() {
            return self;
        }

        let described = self
            .stringified()
            .unwrap_or_else(|| UNKNOWN_ERROR.to_string());
        Self::new(format!(
            "{} occurred while parsing module \"{}\"",
            described, key
        ))
    }
}

impl fmt::Display for Exception {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.stringified() {
            Some(s) => f.write_str(&s),
            None => f.write_str("undefined"),
        }
    }
}

impl std::error::Error for Exception {}

/// Errors that can occur while requiring an ES module synchronously
#[derive(Debug, Error)]
pub enum EsmError {
    /// Module resolution error
    #[error("Error resolving module '{specifier}' from '{referrer}': {reason}")]
    Resolution {
        /// Module specifier
        specifier: String,
        /// Key of the importing module
        referrer: String,
        /// Reason for failure
        reason: String,
    },

    /// Module not found
    #[error("Cannot find module '{specifier}' from '{referrer}'")]
    ModuleNotFound {
        /// Module specifier
        specifier: String,
        /// Key of the importing module
        referrer: String,
    },

    /// A host operation settled as rejected
    #[error("{0}")]
    Exception(Exception),

    /// A module in the graph cannot complete without suspending
    #[error("require() async module \"{0}\" is unsupported. use \"await import()\" instead.")]
    AsyncModuleUnsupported(ModuleKey),

    /// File system error
    #[error("File system error: {0}")]
    Fs(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),
}

impl From<Exception> for EsmError {
    fn from(exception: Exception) -> Self {
        Self::Exception(exception)
    }
}

impl EsmError {
    /// Create a resolution error
    pub fn resolution(
        specifier: impl Into<String>,
        referrer: &ModuleKey,
        reason: impl Into<String>,
    ) -> Self {
        Self::Resolution {
            specifier: specifier.into(),
            referrer: referrer.to_string(),
            reason: reason.into(),
        }
    }

    /// Create a module not found error
    pub fn module_not_found(specifier: impl Into<String>, referrer: &ModuleKey) -> Self {
        Self::ModuleNotFound {
            specifier: specifier.into(),
            referrer: referrer.to_string(),
        }
    }

    /// Whether this error reports a module that needs to suspend
    pub fn is_async_module(&self) -> bool {
        matches!(self, Self::AsyncModuleUnsupported(_))
    }

    /// The value `require()` should throw into JavaScript for this error.
    ///
    /// Rejections are rethrown as-is; engine-level failures become a
    /// `TypeError` (async modules) or a plain `Error`.
    pub fn into_exception(self) -> Exception {
        match self {
            Self::Exception(exception) => exception,
            err @ Self::AsyncModuleUnsupported(_) => Exception::with_name("TypeError", err.to_string()),
            err => Exception::new(err.to_string()),
        }
    }
}
