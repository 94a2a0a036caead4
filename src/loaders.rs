//! Template loaders.
//!
//! A loader resolves a template name to raw source text. The engine itself
//! has no filesystem dependency; loading is an injected capability behind the
//! [`TemplateLoader`] trait, with a directory-backed and an in-memory
//! implementation provided.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::RwLock;

use crate::error::{TemplateError, TemplateResult};

/// Loads template source text by name.
pub trait TemplateLoader: Send + Sync {
    /// Loads the template source with the given name.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError::TemplateNotFound`] if the template cannot be
    /// found. Loading must be side-effect-free.
    fn load(&self, name: &str) -> TemplateResult<String>;
}

/// Loads templates from a single directory on the filesystem.
pub struct FileSystemLoader {
    root: PathBuf,
}

impl FileSystemLoader {
    /// Creates a loader reading from the given template directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl TemplateLoader for FileSystemLoader {
    fn load(&self, name: &str) -> TemplateResult<String> {
        let path = self.root.join(name);
        std::fs::read_to_string(path)
            .map_err(|_| TemplateError::TemplateNotFound(name.to_string()))
    }
}

/// Loads templates from an in-memory map of name to source.
///
/// Useful for tests and for applications that embed their templates.
pub struct StringLoader {
    templates: RwLock<HashMap<String, String>>,
}

impl StringLoader {
    /// Creates a new empty `StringLoader`.
    pub fn new() -> Self {
        Self {
            templates: RwLock::new(HashMap::new()),
        }
    }

    /// Creates a `StringLoader` from a map of template names to sources.
    pub fn from_map(templates: HashMap<String, String>) -> Self {
        Self {
            templates: RwLock::new(templates),
        }
    }

    /// Adds or replaces a template.
    pub fn add(&self, name: impl Into<String>, source: impl Into<String>) {
        self.templates
            .write()
            .unwrap()
            .insert(name.into(), source.into());
    }
}

impl Default for StringLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateLoader for StringLoader {
    fn load(&self, name: &str) -> TemplateResult<String> {
        self.templates
            .read()
            .unwrap()
            .get(name)
            .cloned()
            .ok_or_else(|| TemplateError::TemplateNotFound(name.to_string()))
    }
}
