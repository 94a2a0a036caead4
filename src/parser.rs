//! Template parser and node renderer.
//!
//! Converts a stream of lexer [`Token`]s into a tree of [`Node`]s and renders
//! node trees against a [`Context`]. Parsing never fails: a directive that is
//! malformed or missing its end tag is emitted as literal text, preserving
//! the degraded-but-non-crashing behavior templates rely on.
//!
//! Directives are matched flat. Nested `if`/`for`/`block` constructs are out
//! of the documented contract; the recursive parser happens to pair them up
//! innermost-first, which is the supported failure mode for such input.

use crate::context::{escape_html, Context, Value};
use crate::lexer::{TagToken, Token};

/// A node in the parsed template tree.
#[derive(Debug, Clone)]
pub enum Node {
    /// A literal text segment.
    Text(String),
    /// A variable placeholder, holding the trimmed path (`name` or `a.b.c`).
    Variable(String),
    /// An `{% if %}...{% else %}...{% endif %}` conditional.
    If {
        /// The parsed condition.
        condition: Condition,
        /// Nodes rendered when the condition holds.
        then_body: Vec<Node>,
        /// Nodes rendered otherwise; empty when there is no `{% else %}`.
        else_body: Vec<Node>,
    },
    /// A `{% for item in collection %}...{% endfor %}` loop.
    For {
        /// The loop variable name.
        item: String,
        /// The collection name, looked up in the context.
        collection: String,
        /// Body nodes rendered once per element.
        body: Vec<Node>,
    },
    /// A `{% block name %}...{% endblock %}` region.
    BlockDef {
        /// The block name.
        name: String,
        /// The default content nodes.
        content: Vec<Node>,
    },
}

/// A parsed `{% if %}` condition.
///
/// The grammar is deliberately restricted: one splitting pass per operator,
/// applied in the order `and`, `or`, `not`, `==`, `!=`, bare variable. Mixed
/// `a and b or c` is not specially parsed; it falls out of the split order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    /// Logical AND of every ` and `-separated part.
    All(Vec<Condition>),
    /// Logical OR of every ` or `-separated part.
    Any(Vec<Condition>),
    /// Negation of the condition after a leading `not `.
    Not(Box<Condition>),
    /// `var == literal`, compared on the stringified context value.
    Equals {
        /// The variable name to look up.
        var: String,
        /// The quote-stripped literal to compare against.
        literal: String,
    },
    /// `var != literal`.
    NotEquals {
        /// The variable name to look up.
        var: String,
        /// The quote-stripped literal to compare against.
        literal: String,
    },
    /// Bare variable truthiness; a missing key is falsy.
    Truthy(String),
}

/// Parses a condition string using the restricted boolean grammar.
pub fn parse_condition(raw: &str) -> Condition {
    if raw.contains(" and ") {
        Condition::All(raw.split(" and ").map(parse_condition).collect())
    } else if raw.contains(" or ") {
        Condition::Any(raw.split(" or ").map(parse_condition).collect())
    } else if let Some(rest) = raw.strip_prefix("not ") {
        Condition::Not(Box::new(parse_condition(rest)))
    } else if let Some((var, literal)) = raw.split_once(" == ") {
        Condition::Equals {
            var: var.trim().to_string(),
            literal: strip_literal_quotes(literal.trim()),
        }
    } else if let Some((var, literal)) = raw.split_once(" != ") {
        Condition::NotEquals {
            var: var.trim().to_string(),
            literal: strip_literal_quotes(literal.trim()),
        }
    } else {
        Condition::Truthy(raw.trim().to_string())
    }
}

impl Condition {
    /// Evaluates this condition against a context.
    pub fn evaluate(&self, context: &Context) -> bool {
        match self {
            Self::All(parts) => parts.iter().all(|p| p.evaluate(context)),
            Self::Any(parts) => parts.iter().any(|p| p.evaluate(context)),
            Self::Not(inner) => !inner.evaluate(context),
            Self::Equals { var, literal } => lookup_display(context, var) == *literal,
            Self::NotEquals { var, literal } => lookup_display(context, var) != *literal,
            Self::Truthy(name) => context.get(name).is_some_and(Value::is_truthy),
        }
    }
}

/// Looks up a variable and stringifies it; a missing key is the empty string.
fn lookup_display(context: &Context, var: &str) -> String {
    context
        .get(var)
        .map(Value::to_display_string)
        .unwrap_or_default()
}

/// Strips any leading and trailing quote characters from a literal.
fn strip_literal_quotes(s: &str) -> String {
    s.trim_matches(|c| c == '\'' || c == '"').to_string()
}

/// A parsed template.
#[derive(Debug, Clone)]
pub struct Template {
    /// The template name (the logical path it was loaded by).
    pub name: String,
    /// The parsed node tree.
    pub nodes: Vec<Node>,
    /// The parent template name from the first `{% extends %}` directive.
    pub parent: Option<String>,
}

/// Parses a token stream into a [`Template`].
pub fn parse(name: &str, tokens: &[Token]) -> Template {
    let mut state = ParserState {
        tokens,
        pos: 0,
        parent: None,
    };
    let (nodes, _) = state.parse_nodes(&[]);

    Template {
        name: name.to_string(),
        nodes,
        parent: state.parent,
    }
}

struct ParserState<'a> {
    tokens: &'a [Token],
    pos: usize,
    parent: Option<String>,
}

impl<'a> ParserState<'a> {
    /// Parses nodes until one of `stop` is reached as a bare end tag or the
    /// tokens run out.
    ///
    /// Returns the stop tag when one was reached; the parser is left
    /// positioned on it so the caller can consume it. End tags only match
    /// bare (`{% endif %}`, not `{% endif x %}`); anything else falls
    /// through as an ordinary tag.
    fn parse_nodes(&mut self, stop: &[&str]) -> (Vec<Node>, Option<&'a TagToken>) {
        let mut nodes = Vec::new();
        let tokens = self.tokens;

        while self.pos < tokens.len() {
            match &tokens[self.pos] {
                Token::Text(text) => {
                    nodes.push(Node::Text(text.clone()));
                    self.pos += 1;
                }
                Token::Variable(path) => {
                    nodes.push(Node::Variable(path.clone()));
                    self.pos += 1;
                }
                Token::Tag(tag) => {
                    if tag.args.is_empty() && stop.contains(&tag.name.as_str()) {
                        return (nodes, Some(tag));
                    }
                    nodes.extend(self.parse_tag(tag));
                }
            }
        }

        (nodes, None)
    }

    fn parse_tag(&mut self, tag: &'a TagToken) -> Vec<Node> {
        match tag.name.as_str() {
            "extends" => {
                if let Some(parent) = quoted_arg(&tag.args) {
                    // Only the first extends directive is honored
                    if self.parent.is_none() {
                        self.parent = Some(parent);
                    }
                    self.pos += 1;
                    Vec::new()
                } else {
                    self.literal(tag)
                }
            }
            "block" => self.parse_block(tag),
            "if" => self.parse_if(tag),
            "for" => self.parse_for(tag),
            // Unknown tags and stray end tags pass through untouched
            _ => self.literal(tag),
        }
    }

    fn parse_block(&mut self, tag: &'a TagToken) -> Vec<Node> {
        if tag.args.len() != 1 || !is_identifier(&tag.args[0]) {
            return self.literal(tag);
        }
        let name = tag.args[0].clone();
        self.pos += 1;

        let (content, closed) = self.parse_nodes(&["endblock"]);
        if closed.is_some() {
            self.pos += 1;
            vec![Node::BlockDef { name, content }]
        } else {
            unterminated(tag, content)
        }
    }

    fn parse_if(&mut self, tag: &'a TagToken) -> Vec<Node> {
        let condition_src = tag
            .content
            .strip_prefix("if")
            .map(str::trim_start)
            .unwrap_or_default();
        if condition_src.is_empty() {
            return self.literal(tag);
        }
        let condition = parse_condition(condition_src);
        self.pos += 1;

        let (then_body, stopped) = self.parse_nodes(&["else", "endif"]);
        let Some(stop_tag) = stopped else {
            return unterminated(tag, then_body);
        };

        if stop_tag.name == "endif" {
            self.pos += 1;
            return vec![Node::If {
                condition,
                then_body,
                else_body: Vec::new(),
            }];
        }

        // Stopped at {% else %}
        self.pos += 1;
        let (else_body, closed) = self.parse_nodes(&["endif"]);
        if closed.is_some() {
            self.pos += 1;
            vec![Node::If {
                condition,
                then_body,
                else_body,
            }]
        } else {
            let mut nodes = unterminated(tag, then_body);
            nodes.push(Node::Text(stop_tag.raw.clone()));
            nodes.extend(else_body);
            nodes
        }
    }

    fn parse_for(&mut self, tag: &'a TagToken) -> Vec<Node> {
        let valid = tag.args.len() == 3
            && tag.args[1] == "in"
            && is_identifier(&tag.args[0])
            && is_identifier(&tag.args[2]);
        if !valid {
            return self.literal(tag);
        }
        let item = tag.args[0].clone();
        let collection = tag.args[2].clone();
        self.pos += 1;

        let (body, closed) = self.parse_nodes(&["endfor"]);
        if closed.is_some() {
            self.pos += 1;
            vec![Node::For {
                item,
                collection,
                body,
            }]
        } else {
            unterminated(tag, body)
        }
    }

    /// Consumes the current tag and emits it verbatim.
    fn literal(&mut self, tag: &TagToken) -> Vec<Node> {
        self.pos += 1;
        vec![Node::Text(tag.raw.clone())]
    }
}

/// Rebuilds an opening tag that never found its end tag: the raw tag text
/// followed by whatever was parsed after it.
fn unterminated(tag: &TagToken, body: Vec<Node>) -> Vec<Node> {
    let mut nodes = vec![Node::Text(tag.raw.clone())];
    nodes.extend(body);
    nodes
}

/// Extracts the single quoted argument of a tag, quotes stripped.
fn quoted_arg(args: &[String]) -> Option<String> {
    let [arg] = args else { return None };
    let bytes = arg.as_bytes();
    if arg.len() >= 3
        && matches!(bytes[0], b'"' | b'\'')
        && matches!(bytes[arg.len() - 1], b'"' | b'\'')
    {
        Some(arg[1..arg.len() - 1].to_string())
    } else {
        None
    }
}

fn is_identifier(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_alphanumeric() || c == '_')
}

/// Renders a node tree against a context.
///
/// Rendering is infallible: missing variables interpolate as the empty
/// string and missing or non-list collections skip the loop body entirely.
pub fn render_nodes(nodes: &[Node], context: &mut Context) -> String {
    let mut output = String::new();
    for node in nodes {
        render_node(node, context, &mut output);
    }
    output
}

fn render_node(node: &Node, context: &mut Context, output: &mut String) {
    match node {
        Node::Text(text) => output.push_str(text),
        Node::Variable(path) => {
            let value = lookup_display(context, path);
            if context.escape() {
                output.push_str(&escape_html(&value));
            } else {
                output.push_str(&value);
            }
        }
        Node::If {
            condition,
            then_body,
            else_body,
        } => {
            let body = if condition.evaluate(context) {
                then_body
            } else {
                else_body
            };
            let rendered = render_nodes(body, context);
            output.push_str(&rendered);
        }
        Node::For {
            item,
            collection,
            body,
        } => {
            let elements = match context.get(collection) {
                Some(Value::List(items)) => items.clone(),
                _ => Vec::new(),
            };
            for element in elements {
                context.push();
                context.set(item.clone(), element);
                let rendered = render_nodes(body, context);
                context.pop();
                output.push_str(&rendered);
            }
        }
        Node::BlockDef { content, .. } => {
            let rendered = render_nodes(content, context);
            output.push_str(&rendered);
        }
    }
}
