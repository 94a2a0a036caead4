//! Error types for the template engine.
//!
//! Rendering never surfaces these to callers of [`Engine::render`](crate::engine::Engine::render);
//! each variant's `Display` output is the diagnostic string that replaces the
//! rendered result when the corresponding failure occurs.

use thiserror::Error;

/// Failures that can occur while loading or resolving a template.
///
/// The `Display` formats are part of the engine's output contract: callers of
/// `render` receive them verbatim as the entire render result instead of an
/// error value.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TemplateError {
    /// The named template could not be loaded.
    #[error("Template not found: {0}")]
    TemplateNotFound(String),

    /// A template named by an `{% extends %}` directive could not be loaded.
    #[error("Base template not found: {0}")]
    BaseTemplateNotFound(String),

    /// The `extends` chain exceeded the recursion-depth limit, which usually
    /// means the chain is cyclic.
    #[error("Template inheritance too deep: {0}")]
    InheritanceTooDeep(String),
}

/// A convenience type alias for `Result<T, TemplateError>`.
pub type TemplateResult<T> = Result<T, TemplateError>;
