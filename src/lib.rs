//! # stencil
//!
//! A minimal template rendering engine: text substitution with template
//! inheritance (`{% extends %}`/`{% block %}`), variable interpolation with
//! dotted-attribute lookup (`{{ a.b.c }}`), restricted boolean conditionals
//! (`{% if %}` with `and`/`or`/`not`/`==`/`!=`), and iteration over lists
//! (`{% for %}`).
//!
//! Rendering is a pure function of `(template name, context) → String` and
//! never fails: missing templates surface as diagnostic strings in the
//! output, missing variables interpolate as the empty string, and malformed
//! directives pass through as literal text. Directives are matched flat;
//! nesting the same directive kind is outside the documented contract.
//!
//! Values are interpolated without escaping by default, which is unsafe for
//! untrusted input; HTML escaping is opt-in via
//! [`Engine::set_auto_escape`](engine::Engine::set_auto_escape).
//!
//! ```
//! use stencil::context::{Context, Value};
//! use stencil::engine::Engine;
//!
//! let engine = Engine::new();
//! engine.add_string_template(
//!     "base.html",
//!     "<body>{% block content %}default{% endblock %}</body>",
//! );
//! engine.add_string_template(
//!     "page.html",
//!     r#"{% extends "base.html" %}{% block content %}Hi {{ user.name }}{% endblock %}"#,
//! );
//!
//! let mut ctx = Context::new();
//! let mut user = std::collections::HashMap::new();
//! user.insert("name".to_string(), Value::from("Ada"));
//! ctx.set("user", Value::Map(user));
//!
//! assert_eq!(engine.render("page.html", &ctx), "<body>Hi Ada</body>");
//! ```

pub mod context;
pub mod engine;
pub mod error;
pub mod lexer;
pub mod loaders;
pub mod parser;

pub use context::{escape_html, Context, Value};
pub use engine::Engine;
pub use error::{TemplateError, TemplateResult};
pub use loaders::{FileSystemLoader, StringLoader, TemplateLoader};
