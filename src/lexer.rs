//! Template lexer (tokenizer).
//!
//! Converts raw template source text into a stream of [`Token`]s representing
//! literal text, variable placeholders (`{{ }}`), and directive tags (`{% %}`).
//!
//! Tokenization never fails: an opener with no matching closer is emitted as
//! literal text, so malformed input degrades to passthrough instead of an
//! error.

/// A token produced by the template lexer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// A literal text segment.
    Text(String),
    /// A variable placeholder: `{{ expression }}`, content trimmed.
    Variable(String),
    /// A directive tag: `{% name arg1 arg2 %}`.
    Tag(TagToken),
}

/// The parsed pieces of a `{% ... %}` tag.
///
/// `raw` keeps the original source slice so the parser can emit the tag
/// verbatim when it turns out to be malformed or unmatched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagToken {
    /// The directive keyword (first word inside the tag).
    pub name: String,
    /// The remaining whitespace-separated arguments, quoted strings kept whole.
    pub args: Vec<String>,
    /// The full trimmed tag content, internal whitespace preserved.
    pub content: String,
    /// The original source slice, delimiters included.
    pub raw: String,
}

/// Tokenizes template source into a sequence of [`Token`]s.
pub fn tokenize(source: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut remaining = source;

    while !remaining.is_empty() {
        match find_next_open(remaining) {
            None => {
                tokens.push(Token::Text(remaining.to_string()));
                break;
            }
            Some((pos, Delimiter::Variable)) => {
                if pos > 0 {
                    tokens.push(Token::Text(remaining[..pos].to_string()));
                }
                let after_open = &remaining[pos + 2..];
                if let Some(end) = after_open.find("}}") {
                    let content = after_open[..end].trim();
                    if content.is_empty() {
                        // `{{ }}` with nothing inside stays literal
                        tokens.push(Token::Text(remaining[pos..pos + 2 + end + 2].to_string()));
                    } else {
                        tokens.push(Token::Variable(content.to_string()));
                    }
                    remaining = &after_open[end + 2..];
                } else {
                    tokens.push(Token::Text("{{".to_string()));
                    remaining = after_open;
                }
            }
            Some((pos, Delimiter::Tag)) => {
                if pos > 0 {
                    tokens.push(Token::Text(remaining[..pos].to_string()));
                }
                let after_open = &remaining[pos + 2..];
                if let Some(end) = after_open.find("%}") {
                    let raw = remaining[pos..pos + 2 + end + 2].to_string();
                    let content = after_open[..end].trim().to_string();
                    let parts = split_tag_args(&content);
                    let (name, args) = match parts.split_first() {
                        Some((first, rest)) => (first.clone(), rest.to_vec()),
                        None => (String::new(), Vec::new()),
                    };
                    tokens.push(Token::Tag(TagToken {
                        name,
                        args,
                        content,
                        raw,
                    }));
                    remaining = &after_open[end + 2..];
                } else {
                    tokens.push(Token::Text("{%".to_string()));
                    remaining = after_open;
                }
            }
        }
    }

    tokens
}

#[derive(Debug, Clone, Copy)]
enum Delimiter {
    Variable, // {{
    Tag,      // {%
}

/// Finds the earliest delimiter opening in the source.
fn find_next_open(s: &str) -> Option<(usize, Delimiter)> {
    let var = s.find("{{");
    let tag = s.find("{%");

    match (var, tag) {
        (None, None) => None,
        (Some(v), None) => Some((v, Delimiter::Variable)),
        (None, Some(t)) => Some((t, Delimiter::Tag)),
        (Some(v), Some(t)) => {
            if v <= t {
                Some((v, Delimiter::Variable))
            } else {
                Some((t, Delimiter::Tag))
            }
        }
    }
}

/// Splits tag content on whitespace, keeping quoted strings whole.
fn split_tag_args(content: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut in_single_quote = false;
    let mut in_double_quote = false;

    for ch in content.chars() {
        match ch {
            '\'' if !in_double_quote => {
                in_single_quote = !in_single_quote;
                current.push(ch);
            }
            '"' if !in_single_quote => {
                in_double_quote = !in_double_quote;
                current.push(ch);
            }
            ' ' | '\t' | '\n' | '\r' if !in_single_quote && !in_double_quote => {
                if !current.is_empty() {
                    parts.push(current.clone());
                    current.clear();
                }
            }
            _ => current.push(ch),
        }
    }

    if !current.is_empty() {
        parts.push(current);
    }

    parts
}
