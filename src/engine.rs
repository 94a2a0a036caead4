//! Template engine — loading, inheritance resolution, and rendering.
//!
//! The [`Engine`] is the entry point for the template system. It owns the
//! loader registry, resolves `{% extends %}` chains, and renders parsed
//! templates with a given context. The public [`Engine::render`] never
//! fails: load failures surface as human-readable diagnostic strings in the
//! returned text.

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::context::Context;
use crate::error::{TemplateError, TemplateResult};
use crate::lexer;
use crate::loaders::{FileSystemLoader, StringLoader, TemplateLoader};
use crate::parser::{self, Node, Template};

/// Maximum depth of an `extends` chain before it is treated as cyclic.
const MAX_INHERITANCE_DEPTH: usize = 16;

/// The template engine. Manages loaders and renders templates.
///
/// # Examples
///
/// ```
/// use stencil::context::{Context, Value};
/// use stencil::engine::Engine;
///
/// let engine = Engine::new();
/// engine.add_string_template("hello.html", "Hello {{ name }}!");
///
/// let mut ctx = Context::new();
/// ctx.set("name", Value::from("World"));
///
/// assert_eq!(engine.render("hello.html", &ctx), "Hello World!");
/// ```
pub struct Engine {
    /// Registered template loaders, searched in order.
    loaders: Vec<Box<dyn TemplateLoader>>,
    /// In-memory loader for programmatically added templates; searched first.
    string_loader: StringLoader,
    /// Whether interpolated values are HTML-escaped. Off by default, so
    /// output is raw text — unsafe for untrusted input.
    auto_escape: bool,
}

impl Engine {
    /// Creates a new engine with no loaders configured.
    pub fn new() -> Self {
        Self {
            loaders: Vec::new(),
            string_loader: StringLoader::new(),
            auto_escape: false,
        }
    }

    /// Creates an engine loading templates from the given directory.
    pub fn with_template_dir(dir: impl Into<std::path::PathBuf>) -> Self {
        let mut engine = Self::new();
        engine.add_loader(Box::new(FileSystemLoader::new(dir.into())));
        engine
    }

    /// Adds a template loader to the end of the search order.
    pub fn add_loader(&mut self, loader: Box<dyn TemplateLoader>) {
        self.loaders.push(loader);
    }

    /// Adds an in-memory template.
    pub fn add_string_template(&self, name: &str, source: &str) {
        self.string_loader.add(name, source);
    }

    /// Sets whether interpolated values are HTML-escaped.
    ///
    /// Escaping is opt-in: the default inserts values verbatim so existing
    /// templates keep their output byte-for-byte.
    pub fn set_auto_escape(&mut self, enabled: bool) {
        self.auto_escape = enabled;
    }

    /// Renders a template by name with the given context.
    ///
    /// Always returns a string and never mutates `context`. A missing
    /// template, missing base template, or runaway inheritance chain yields
    /// the corresponding diagnostic string as the entire result.
    pub fn render(&self, name: &str, context: &Context) -> String {
        match self.try_render(name, context) {
            Ok(rendered) => rendered,
            Err(err) => {
                warn!(template = name, error = %err, "template rendering failed");
                err.to_string()
            }
        }
    }

    fn try_render(&self, name: &str, context: &Context) -> TemplateResult<String> {
        let template = self.get_template(name)?;
        let mut scope = context.clone();
        scope.set_escape(self.auto_escape);

        if template.parent.is_some() {
            self.render_with_inheritance(&template, &mut scope)
        } else {
            Ok(parser::render_nodes(&template.nodes, &mut scope))
        }
    }

    /// Loads and parses a template by name.
    fn get_template(&self, name: &str) -> TemplateResult<Template> {
        let source = self.load_source(name)?;
        debug!(template = name, bytes = source.len(), "loaded template");
        let tokens = lexer::tokenize(&source);
        Ok(parser::parse(name, &tokens))
    }

    /// Loads the source of a template, searching the in-memory loader first.
    fn load_source(&self, name: &str) -> TemplateResult<String> {
        if let Ok(source) = self.string_loader.load(name) {
            return Ok(source);
        }
        for loader in &self.loaders {
            if let Ok(source) = loader.load(name) {
                return Ok(source);
            }
        }
        Err(TemplateError::TemplateNotFound(name.to_string()))
    }

    /// Resolves an `extends` chain and renders the final base template with
    /// the accumulated block overrides.
    ///
    /// Walking up the chain, each template's own blocks become defaults that
    /// overrides from further down replace; a block overridden at several
    /// levels keeps the most-derived content. The walk is bounded by
    /// [`MAX_INHERITANCE_DEPTH`] so cyclic chains terminate.
    fn render_with_inheritance(
        &self,
        child: &Template,
        context: &mut Context,
    ) -> TemplateResult<String> {
        let mut overrides = collect_blocks(&child.nodes);
        // Caller only gets here when a parent exists
        let mut parent_name = child.parent.clone().unwrap_or_default();

        for _ in 0..MAX_INHERITANCE_DEPTH {
            let parent = self
                .get_template(&parent_name)
                .map_err(|_| TemplateError::BaseTemplateNotFound(parent_name.clone()))?;
            debug!(
                template = %child.name,
                parent = %parent_name,
                "resolved template inheritance level"
            );

            match parent.parent {
                Some(grandparent) => {
                    let mut merged = collect_blocks(&parent.nodes);
                    merged.extend(overrides);
                    overrides = merged;
                    parent_name = grandparent;
                }
                None => {
                    return Ok(render_base_with_blocks(&parent.nodes, &overrides, context));
                }
            }
        }

        warn!(
            template = %child.name,
            limit = MAX_INHERITANCE_DEPTH,
            "extends chain exceeded depth limit"
        );
        Err(TemplateError::InheritanceTooDeep(child.name.clone()))
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

/// Collects top-level block definitions into a name → content map.
///
/// A block name appearing twice resolves last-write-wins.
fn collect_blocks(nodes: &[Node]) -> HashMap<String, Vec<Node>> {
    let mut blocks = HashMap::new();
    for node in nodes {
        if let Node::BlockDef { name, content } = node {
            blocks.insert(name.clone(), content.clone());
        }
    }
    blocks
}

/// Renders the base template's nodes, splicing in block overrides.
///
/// An overridden block renders the override content; a block with no
/// override keeps its own default content. Block markers never reach the
/// output either way.
fn render_base_with_blocks(
    base_nodes: &[Node],
    overrides: &HashMap<String, Vec<Node>>,
    context: &mut Context,
) -> String {
    let mut output = String::new();

    for node in base_nodes {
        if let Node::BlockDef { name, content } = node {
            let chosen = overrides.get(name).map_or(content.as_slice(), Vec::as_slice);
            output.push_str(&parser::render_nodes(chosen, context));
        } else {
            output.push_str(&parser::render_nodes(std::slice::from_ref(node), context));
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Value;

    fn engine_with(templates: &[(&str, &str)]) -> Engine {
        let engine = Engine::new();
        for (name, source) in templates {
            engine.add_string_template(name, source);
        }
        engine
    }

    #[test]
    fn test_render_no_directives_unchanged() {
        let engine = engine_with(&[("plain.html", "<p>static markup</p>\n")]);
        let ctx = Context::new();
        assert_eq!(engine.render("plain.html", &ctx), "<p>static markup</p>\n");
    }

    #[test]
    fn test_render_variable() {
        let engine = engine_with(&[("t.html", "Hello {{ name }}!")]);
        let mut ctx = Context::new();
        ctx.set("name", Value::from("World"));
        assert_eq!(engine.render("t.html", &ctx), "Hello World!");
    }

    #[test]
    fn test_render_missing_variable_is_empty() {
        let engine = engine_with(&[("t.html", "[{{ missing_key }}]")]);
        let ctx = Context::new();
        assert_eq!(engine.render("t.html", &ctx), "[]");
    }

    #[test]
    fn test_render_dotted_lookup() {
        let engine = engine_with(&[("t.html", "{{ user.name }}")]);
        let mut ctx = Context::new();
        let mut user = HashMap::new();
        user.insert("name".to_string(), Value::from("Ada"));
        ctx.set("user", Value::Map(user));
        assert_eq!(engine.render("t.html", &ctx), "Ada");
    }

    #[test]
    fn test_render_dotted_lookup_missing_segment() {
        let engine = engine_with(&[("t.html", "{{ user.missing }}")]);
        let mut ctx = Context::new();
        let mut user = HashMap::new();
        user.insert("name".to_string(), Value::from("Ada"));
        ctx.set("user", Value::Map(user));
        assert_eq!(engine.render("t.html", &ctx), "");
    }

    #[test]
    fn test_render_if_truthiness() {
        let engine = engine_with(&[("t.html", "{% if flag %}YES{% else %}NO{% endif %}")]);

        let mut ctx = Context::new();
        ctx.set("flag", Value::Bool(true));
        assert_eq!(engine.render("t.html", &ctx), "YES");

        ctx.set("flag", Value::Bool(false));
        assert_eq!(engine.render("t.html", &ctx), "NO");

        let empty = Context::new();
        assert_eq!(engine.render("t.html", &empty), "NO");
    }

    #[test]
    fn test_render_if_without_else_renders_empty() {
        let engine = engine_with(&[("t.html", "{% if status == 'active' %}ON{% endif %}")]);

        let mut ctx = Context::new();
        ctx.set("status", Value::from("active"));
        assert_eq!(engine.render("t.html", &ctx), "ON");

        ctx.set("status", Value::from("inactive"));
        assert_eq!(engine.render("t.html", &ctx), "");
    }

    #[test]
    fn test_render_if_inequality() {
        let engine = engine_with(&[("t.html", "{% if status != 'closed' %}open{% endif %}")]);
        let mut ctx = Context::new();
        ctx.set("status", Value::from("active"));
        assert_eq!(engine.render("t.html", &ctx), "open");
        ctx.set("status", Value::from("closed"));
        assert_eq!(engine.render("t.html", &ctx), "");
    }

    #[test]
    fn test_render_if_compound_conditions() {
        let engine = engine_with(&[(
            "t.html",
            "{% if a and b %}both{% endif %}{% if a or b %}either{% endif %}{% if not b %}negated{% endif %}",
        )]);
        let mut ctx = Context::new();
        ctx.set("a", Value::Bool(true));
        ctx.set("b", Value::Bool(false));
        assert_eq!(engine.render("t.html", &ctx), "eithernegated");
    }

    #[test]
    fn test_render_if_falsy_values() {
        let engine = engine_with(&[("t.html", "{% if v %}T{% else %}F{% endif %}")]);
        for falsy in [
            Value::from(""),
            Value::Integer(0),
            Value::Bool(false),
            Value::List(vec![]),
            Value::None,
        ] {
            let mut ctx = Context::new();
            ctx.set("v", falsy);
            assert_eq!(engine.render("t.html", &ctx), "F");
        }

        let mut ctx = Context::new();
        ctx.set("v", Value::from("x"));
        assert_eq!(engine.render("t.html", &ctx), "T");
    }

    #[test]
    fn test_render_loop_preserves_trailing_separator() {
        let engine = engine_with(&[("t.html", "{% for p in projects %}{{ p.name }}, {% endfor %}")]);
        let mut ctx = Context::new();
        let mut a = HashMap::new();
        a.insert("name".to_string(), Value::from("A"));
        let mut b = HashMap::new();
        b.insert("name".to_string(), Value::from("B"));
        ctx.set("projects", Value::List(vec![Value::Map(a), Value::Map(b)]));
        assert_eq!(engine.render("t.html", &ctx), "A, B, ");
    }

    #[test]
    fn test_render_loop_empty_or_missing_collection() {
        let engine = engine_with(&[("t.html", "<{% for x in items %}{{ x }}{% endfor %}>")]);

        let ctx = Context::new();
        assert_eq!(engine.render("t.html", &ctx), "<>");

        let mut ctx = Context::new();
        ctx.set("items", Value::List(vec![]));
        assert_eq!(engine.render("t.html", &ctx), "<>");
    }

    #[test]
    fn test_render_loop_non_list_collection_renders_empty() {
        let engine = engine_with(&[("t.html", "<{% for x in items %}{{ x }}{% endfor %}>")]);
        let mut ctx = Context::new();
        ctx.set("items", Value::from("not a list"));
        assert_eq!(engine.render("t.html", &ctx), "<>");
    }

    #[test]
    fn test_render_loop_ambient_context_visible() {
        let engine = engine_with(&[("t.html", "{% for x in items %}{{ prefix }}{{ x }};{% endfor %}")]);
        let mut ctx = Context::new();
        ctx.set("prefix", Value::from("#"));
        ctx.set("items", Value::List(vec![Value::from("a"), Value::from("b")]));
        assert_eq!(engine.render("t.html", &ctx), "#a;#b;");
    }

    #[test]
    fn test_render_does_not_mutate_caller_context() {
        let engine = engine_with(&[("t.html", "{% for x in items %}{{ x }}{% endfor %}")]);
        let mut ctx = Context::new();
        ctx.set("items", Value::List(vec![Value::from("a")]));
        engine.render("t.html", &ctx);
        assert!(ctx.get("x").is_none());
    }

    #[test]
    fn test_render_inheritance_override() {
        let engine = engine_with(&[
            (
                "base.html",
                "<body>{% block content %}default{% endblock %}</body>",
            ),
            (
                "child.html",
                r#"{% extends "base.html" %}{% block content %}custom{% endblock %}"#,
            ),
        ]);
        let ctx = Context::new();
        assert_eq!(engine.render("child.html", &ctx), "<body>custom</body>");
    }

    #[test]
    fn test_render_inheritance_keeps_parent_default() {
        let engine = engine_with(&[
            (
                "base.html",
                "A{% block left %}L{% endblock %}B{% block right %}R{% endblock %}C",
            ),
            (
                "child.html",
                r#"{% extends "base.html" %}{% block right %}override{% endblock %}"#,
            ),
        ]);
        let ctx = Context::new();
        assert_eq!(engine.render("child.html", &ctx), "ALBoverrideC");
    }

    #[test]
    fn test_render_inheritance_block_uses_child_context_features() {
        let engine = engine_with(&[
            ("base.html", "<{% block content %}{% endblock %}>"),
            (
                "child.html",
                "{% extends 'base.html' %}{% block content %}{% if on %}{{ label }}{% endif %}{% endblock %}",
            ),
        ]);
        let mut ctx = Context::new();
        ctx.set("on", Value::Bool(true));
        ctx.set("label", Value::from("hi"));
        assert_eq!(engine.render("child.html", &ctx), "<hi>");
    }

    #[test]
    fn test_render_multi_level_inheritance_flattens() {
        let engine = engine_with(&[
            (
                "grandparent.html",
                "GP[{% block content %}gp{% endblock %}]GP",
            ),
            (
                "parent.html",
                r#"{% extends "grandparent.html" %}{% block content %}parent{% endblock %}"#,
            ),
            (
                "child.html",
                r#"{% extends "parent.html" %}{% block content %}child{% endblock %}"#,
            ),
        ]);
        let ctx = Context::new();
        let result = engine.render("child.html", &ctx);
        assert_eq!(result, "GP[child]GP");
        assert!(!result.contains("{% extends"));
    }

    #[test]
    fn test_render_multi_level_intermediate_override_survives() {
        let engine = engine_with(&[
            (
                "grandparent.html",
                "{% block a %}ga{% endblock %}|{% block b %}gb{% endblock %}",
            ),
            (
                "parent.html",
                r#"{% extends "grandparent.html" %}{% block a %}pa{% endblock %}"#,
            ),
            (
                "child.html",
                r#"{% extends "parent.html" %}{% block b %}cb{% endblock %}"#,
            ),
        ]);
        let ctx = Context::new();
        assert_eq!(engine.render("child.html", &ctx), "pa|cb");
    }

    #[test]
    fn test_render_duplicate_child_block_last_wins() {
        let engine = engine_with(&[
            ("base.html", "<{% block content %}d{% endblock %}>"),
            (
                "child.html",
                r#"{% extends "base.html" %}{% block content %}first{% endblock %}{% block content %}second{% endblock %}"#,
            ),
        ]);
        let ctx = Context::new();
        assert_eq!(engine.render("child.html", &ctx), "<second>");
    }

    #[test]
    fn test_render_missing_template_diagnostic() {
        let engine = Engine::new();
        let ctx = Context::new();
        assert_eq!(
            engine.render("missing.html", &ctx),
            "Template not found: missing.html"
        );
    }

    #[test]
    fn test_render_missing_base_template_diagnostic() {
        let engine = engine_with(&[(
            "child.html",
            r#"{% extends "base.html" %}{% block content %}x{% endblock %}"#,
        )]);
        let ctx = Context::new();
        assert_eq!(
            engine.render("child.html", &ctx),
            "Base template not found: base.html"
        );
    }

    #[test]
    fn test_render_cyclic_inheritance_diagnostic() {
        let engine = engine_with(&[
            ("a.html", r#"{% extends "b.html" %}"#),
            ("b.html", r#"{% extends "a.html" %}"#),
        ]);
        let ctx = Context::new();
        assert_eq!(
            engine.render("a.html", &ctx),
            "Template inheritance too deep: a.html"
        );
    }

    #[test]
    fn test_render_unmatched_directive_passes_through() {
        let engine = engine_with(&[("t.html", "{% if flag %}no endif here")]);
        let mut ctx = Context::new();
        ctx.set("flag", Value::Bool(true));
        assert_eq!(engine.render("t.html", &ctx), "{% if flag %}no endif here");
    }

    #[test]
    fn test_render_unknown_tag_passes_through() {
        let engine = engine_with(&[("t.html", "a{% widget %}b")]);
        let ctx = Context::new();
        assert_eq!(engine.render("t.html", &ctx), "a{% widget %}b");
    }

    #[test]
    fn test_render_no_escaping_by_default() {
        let engine = engine_with(&[("t.html", "{{ content }}")]);
        let mut ctx = Context::new();
        ctx.set("content", Value::from("<script>alert('x')</script>"));
        assert_eq!(engine.render("t.html", &ctx), "<script>alert('x')</script>");
    }

    #[test]
    fn test_render_opt_in_escaping() {
        let mut engine = Engine::new();
        engine.add_string_template("t.html", "{{ content }}");
        engine.set_auto_escape(true);

        let mut ctx = Context::new();
        ctx.set("content", Value::from("<b>bold</b>"));
        assert_eq!(engine.render("t.html", &ctx), "&lt;b&gt;bold&lt;/b&gt;");
    }

    #[test]
    fn test_render_base_template_directly_uses_defaults() {
        let engine = engine_with(&[(
            "base.html",
            "<body>{% block content %}default{% endblock %}</body>",
        )]);
        let ctx = Context::new();
        assert_eq!(engine.render("base.html", &ctx), "<body>default</body>");
    }

    #[test]
    fn test_render_context_from_json() {
        let engine = engine_with(&[(
            "t.html",
            "{% for p in projects %}{{ p.name }}; {% endfor %}{{ owner.email }}",
        )]);
        let json = serde_json::json!({
            "projects": [{"name": "Alpha"}, {"name": "Beta"}],
            "owner": {"email": "ada@example.com"}
        });
        let mut ctx = Context::new();
        let Value::Map(map) = Value::from(json) else {
            panic!("expected map");
        };
        for (k, v) in map {
            ctx.set(k, v);
        }
        assert_eq!(
            engine.render("t.html", &ctx),
            "Alpha; Beta; ada@example.com"
        );
    }

    #[test]
    fn test_render_from_filesystem_dir() {
        let dir = std::env::temp_dir().join("stencil_test_engine");
        let _ = std::fs::create_dir_all(&dir);
        std::fs::write(
            dir.join("base.html"),
            "[{% block content %}d{% endblock %}]",
        )
        .unwrap();
        std::fs::write(
            dir.join("page.html"),
            r#"{% extends "base.html" %}{% block content %}{{ title }}{% endblock %}"#,
        )
        .unwrap();

        let engine = Engine::with_template_dir(&dir);
        let mut ctx = Context::new();
        ctx.set("title", Value::from("Patents"));
        assert_eq!(engine.render("page.html", &ctx), "[Patents]");

        let _ = std::fs::remove_dir_all(&dir);
    }
}
