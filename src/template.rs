//! Page templates.
//!
//! A small Django-style engine: `{{ var }}` (HTML-escaped unless piped through `|safe`),
//! `{% if %}`/`{% else %}` with `not`, `==` and `!=`, `{% for x in list %}`,
//! `{% extends %}`/`{% block %}` inheritance, `{% include %}` and `{% tailwind %}`.
//!
//! Workflow:
//! 1. `load_nodes` reads a file, tokenizes it and expands `include` tags in place.
//! 2. If the page extends a base, its blocks replace the base's blocks of the same name.
//! 3. `render_nodes` walks the merged tree against the context.
//!
//! Runtime logging is controlled via `set_display_logs`.

use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::{AppError, AppResult};
use crate::router::Response;

/// Global switch for enabling/disabling internal template logs
static DISPLAY_LOGS: Lazy<AtomicBool> = Lazy::new(|| AtomicBool::new(false));

static TOKEN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)(\{\{.*?\}\}|\{%.*?%\})").unwrap());

const MAX_INCLUDE_DEPTH: usize = 8;

/// Enable or disable internal debug logs for the template engine
pub fn set_display_logs(enabled: bool) {
    DISPLAY_LOGS.store(enabled, Ordering::Relaxed);
}

/// Internal debug: logs only if DISPLAY_LOGS is true
macro_rules! tdebug {
    ($($arg:tt)+) => {
        if DISPLAY_LOGS.load(Ordering::Relaxed) {
            debug!($($arg)+);
        }
    }
}

pub type Context = HashMap<String, TemplateValue>;

/// Supported value types for template context
#[derive(Clone, Debug, PartialEq)]
pub enum TemplateValue {
    Null,
    String(String),
    Bool(bool),
    Number(f64),
    List(Vec<TemplateValue>),
    Object(HashMap<String, TemplateValue>),
}

impl TemplateValue {
    /// Convert the value to a string for rendering
    pub fn as_string(&self) -> String {
        match self {
            TemplateValue::String(s) => s.clone(),
            TemplateValue::Bool(b) => b.to_string(),
            TemplateValue::Number(n) => n.to_string(),
            TemplateValue::Null | TemplateValue::List(_) | TemplateValue::Object(_) => {
                String::new()
            }
        }
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            TemplateValue::Null => false,
            TemplateValue::Bool(b) => *b,
            TemplateValue::String(s) => !s.is_empty(),
            TemplateValue::Number(n) => *n != 0.0,
            TemplateValue::List(items) => !items.is_empty(),
            TemplateValue::Object(map) => !map.is_empty(),
        }
    }
}

impl fmt::Display for TemplateValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_string())
    }
}

impl From<serde_json::Value> for TemplateValue {
    fn from(value: serde_json::Value) -> Self {
        use serde_json::Value;
        match value {
            Value::Null => TemplateValue::Null,
            Value::Bool(b) => TemplateValue::Bool(b),
            Value::Number(n) => TemplateValue::Number(n.as_f64().unwrap_or_default()),
            Value::String(s) => TemplateValue::String(s),
            Value::Array(items) => TemplateValue::List(items.into_iter().map(Into::into).collect()),
            Value::Object(map) => {
                TemplateValue::Object(map.into_iter().map(|(k, v)| (k, v.into())).collect())
            }
        }
    }
}

impl From<&str> for TemplateValue {
    fn from(s: &str) -> Self {
        TemplateValue::String(s.to_string())
    }
}

impl From<String> for TemplateValue {
    fn from(s: String) -> Self {
        TemplateValue::String(s)
    }
}

impl From<bool> for TemplateValue {
    fn from(b: bool) -> Self {
        TemplateValue::Bool(b)
    }
}

/// Serialize a struct into a template context. The value must serialize to a map.
pub fn context_from<T: Serialize>(value: &T) -> AppResult<Context> {
    match TemplateValue::from(serde_json::to_value(value)?) {
        TemplateValue::Object(map) => Ok(map),
        _ => Err(AppError::Serialization(
            "template context must be an object".into(),
        )),
    }
}

/// Token types extracted from the template
#[derive(Debug, Clone)]
pub enum Token {
    Text(String),     // Plain text
    Variable(String), // {{ variable }}
    Tag(String),      // {% tag %}
}

/// AST node types for the template engine
#[derive(Debug, Clone)]
pub enum Node {
    Text(String),
    Variable {
        name: String,
        safe: bool,
    },
    If {
        condition: String,
        then_body: Vec<Node>,
        else_body: Vec<Node>,
    },
    For {
        var_name: String,
        list_name: String,
        body: Vec<Node>,
    },
    Block {
        name: String,
        body: Vec<Node>,
    },
    Extends(String), // {% extends "base.html" %}
    Include(String), // {% include "partial.html" %}
    Tailwind,        // {% tailwind %}
}

/// Tokenizes the template content into a Vec<Token>
pub fn tokenize_template(content: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut last_end = 0;
    for mat in TOKEN_RE.find_iter(content) {
        let start = mat.start();
        let end = mat.end();
        if start > last_end {
            tokens.push(Token::Text(content[last_end..start].to_string()));
        }
        let m = mat.as_str().trim();
        if m.starts_with("{{") {
            let inner = m
                .trim_start_matches("{{")
                .trim_end_matches("}}")
                .trim()
                .to_string();
            tdebug!("tokenize: Variable '{{ {{ {} }} }}'", inner);
            tokens.push(Token::Variable(inner));
        } else {
            let inner = m
                .trim_start_matches("{%")
                .trim_end_matches("%}")
                .trim()
                .to_string();
            tdebug!("tokenize: Tag '{{% {} %}}'", inner);
            tokens.push(Token::Tag(inner));
        }
        last_end = end;
    }
    if last_end < content.len() {
        tokens.push(Token::Text(content[last_end..].to_string()));
    }
    tokens
}

/// Parses a sequence of Token into an AST of Node
pub fn parse_tokens(tokens: &[Token]) -> Vec<Node> {
    let mut idx = 0;
    parse_nodes(tokens, &mut idx, &[])
}

fn unquote(s: &str) -> String {
    s.trim().trim_matches('"').trim_matches('\'').to_string()
}

/// Recursive parser: consumes tokens until an `end_tag` is found
fn parse_nodes(tokens: &[Token], idx: &mut usize, end_tags: &[&str]) -> Vec<Node> {
    let mut nodes = Vec::new();
    while *idx < tokens.len() {
        match &tokens[*idx] {
            Token::Text(t) => {
                nodes.push(Node::Text(t.clone()));
                *idx += 1;
            }
            Token::Variable(v) => {
                let (name, safe) = match v.split_once('|') {
                    Some((name, filter)) => (name.trim().to_string(), filter.trim() == "safe"),
                    None => (v.clone(), false),
                };
                nodes.push(Node::Variable { name, safe });
                *idx += 1;
            }
            Token::Tag(tag) => {
                let t = tag.trim();
                if end_tags.contains(&t) {
                    break;
                }
                if let Some(rest) = t.strip_prefix("extends ") {
                    nodes.push(Node::Extends(unquote(rest)));
                    *idx += 1;
                    continue;
                }
                if let Some(rest) = t.strip_prefix("include ") {
                    nodes.push(Node::Include(unquote(rest)));
                    *idx += 1;
                    continue;
                }
                if let Some(name) = t.strip_prefix("block ") {
                    *idx += 1;
                    let body = parse_nodes(tokens, idx, &["endblock"]);
                    *idx += 1; // skip endblock
                    nodes.push(Node::Block {
                        name: name.trim().to_string(),
                        body,
                    });
                    continue;
                }
                if let Some(cond) = t.strip_prefix("if ") {
                    *idx += 1;
                    let then_body = parse_nodes(tokens, idx, &["else", "endif"]);
                    let mut else_body = Vec::new();
                    if let Some(Token::Tag(tt)) = tokens.get(*idx) {
                        if tt.trim() == "else" {
                            *idx += 1;
                            else_body = parse_nodes(tokens, idx, &["endif"]);
                        }
                    }
                    *idx += 1; // skip endif
                    nodes.push(Node::If {
                        condition: cond.trim().to_string(),
                        then_body,
                        else_body,
                    });
                    continue;
                }
                if let Some(rest) = t.strip_prefix("for ") {
                    let parts: Vec<&str> = rest.split_whitespace().collect();
                    if parts.len() == 3 && parts[1] == "in" {
                        *idx += 1;
                        let body = parse_nodes(tokens, idx, &["endfor"]);
                        *idx += 1; // skip endfor
                        nodes.push(Node::For {
                            var_name: parts[0].to_string(),
                            list_name: parts[2].to_string(),
                            body,
                        });
                        continue;
                    }
                }
                if t == "tailwind" {
                    nodes.push(Node::Tailwind);
                    *idx += 1;
                    continue;
                }
                tdebug!("parse: skipping unknown tag '{}'", t);
                *idx += 1;
            }
        }
    }
    nodes
}

/// Resolves a dotted variable path 'a.b.c' within the context
fn resolve_variable<'a>(name: &str, context: &'a Context) -> Option<&'a TemplateValue> {
    let mut current: Option<&TemplateValue> = None;
    for (i, key) in name.split('.').enumerate() {
        if i == 0 {
            current = context.get(key);
        } else if let Some(TemplateValue::Object(map)) = current {
            current = map.get(key);
        } else {
            return None;
        }
    }
    current
}

/// A literal (`"dog"`, `3`, `true`) or a context lookup.
fn operand(raw: &str, context: &Context) -> TemplateValue {
    let raw = raw.trim();
    if raw.len() >= 2
        && ((raw.starts_with('"') && raw.ends_with('"'))
            || (raw.starts_with('\'') && raw.ends_with('\'')))
    {
        return TemplateValue::String(raw[1..raw.len() - 1].to_string());
    }
    match raw {
        "true" => return TemplateValue::Bool(true),
        "false" => return TemplateValue::Bool(false),
        _ => {}
    }
    if let Ok(n) = raw.parse::<f64>() {
        return TemplateValue::Number(n);
    }
    resolve_variable(raw, context)
        .cloned()
        .unwrap_or(TemplateValue::Null)
}

pub fn evaluate_condition(condition: &str, context: &Context) -> bool {
    let condition = condition.trim();
    if let Some(rest) = condition.strip_prefix("not ") {
        return !evaluate_condition(rest, context);
    }
    if let Some((lhs, rhs)) = condition.split_once("!=") {
        return operand(lhs, context).as_string() != operand(rhs, context).as_string();
    }
    if let Some((lhs, rhs)) = condition.split_once("==") {
        return operand(lhs, context).as_string() == operand(rhs, context).as_string();
    }
    operand(condition, context).is_truthy()
}

pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

/// Merges child blocks into base AST by matching block names
fn merge_blocks(nodes: &[Node], child_blocks: &HashMap<String, Vec<Node>>) -> Vec<Node> {
    nodes
        .iter()
        .map(|node| match node {
            Node::Block { name, body } => Node::Block {
                name: name.clone(),
                body: match child_blocks.get(name) {
                    Some(child) => child.clone(),
                    None => merge_blocks(body, child_blocks),
                },
            },
            Node::If {
                condition,
                then_body,
                else_body,
            } => Node::If {
                condition: condition.clone(),
                then_body: merge_blocks(then_body, child_blocks),
                else_body: merge_blocks(else_body, child_blocks),
            },
            Node::For {
                var_name,
                list_name,
                body,
            } => Node::For {
                var_name: var_name.clone(),
                list_name: list_name.clone(),
                body: merge_blocks(body, child_blocks),
            },
            other => other.clone(),
        })
        .collect()
}

/// Renders the AST into HTML string using the context
pub fn render_nodes(nodes: &[Node], context: &Context) -> String {
    let mut out = String::new();
    for node in nodes {
        match node {
            Node::Text(t) => out.push_str(t),
            Node::Variable { name, safe } => {
                if let Some(val) = resolve_variable(name, context) {
                    if *safe {
                        out.push_str(&val.as_string());
                    } else {
                        out.push_str(&escape_html(&val.as_string()));
                    }
                }
            }
            Node::If {
                condition,
                then_body,
                else_body,
            } => {
                if evaluate_condition(condition, context) {
                    out.push_str(&render_nodes(then_body, context));
                } else {
                    out.push_str(&render_nodes(else_body, context));
                }
            }
            Node::For {
                var_name,
                list_name,
                body,
            } => {
                if let Some(TemplateValue::List(items)) = resolve_variable(list_name, context) {
                    let mut local = context.clone();
                    for item in items {
                        local.insert(var_name.clone(), item.clone());
                        out.push_str(&render_nodes(body, &local));
                    }
                }
            }
            Node::Block { body, .. } => {
                out.push_str(&render_nodes(body, context));
            }
            Node::Extends(_) | Node::Include(_) => {}
            Node::Tailwind => {
                tdebug!("Inserting Tailwind CDN link");
                out.push_str(r#"<script src="https://cdn.tailwindcss.com"></script>"#);
            }
        }
    }
    out
}

/// Read and parse `name` from `dir`, expanding includes.
fn load_nodes(dir: &Path, name: &str, depth: usize) -> Result<Vec<Node>, String> {
    if depth > MAX_INCLUDE_DEPTH {
        return Err(format!("include depth exceeded at '{}'", name));
    }
    let content = std::fs::read_to_string(dir.join(name))
        .map_err(|_| format!("Template '{}' not found", name))?;
    let nodes = parse_tokens(&tokenize_template(&content));
    expand_includes(dir, nodes, depth)
}

fn expand_includes(dir: &Path, nodes: Vec<Node>, depth: usize) -> Result<Vec<Node>, String> {
    let mut out = Vec::with_capacity(nodes.len());
    for node in nodes {
        match node {
            Node::Include(name) => out.extend(load_nodes(dir, &name, depth + 1)?),
            Node::Block { name, body } => out.push(Node::Block {
                name,
                body: expand_includes(dir, body, depth)?,
            }),
            Node::If {
                condition,
                then_body,
                else_body,
            } => out.push(Node::If {
                condition,
                then_body: expand_includes(dir, then_body, depth)?,
                else_body: expand_includes(dir, else_body, depth)?,
            }),
            Node::For {
                var_name,
                list_name,
                body,
            } => out.push(Node::For {
                var_name,
                list_name,
                body: expand_includes(dir, body, depth)?,
            }),
            other => out.push(other),
        }
    }
    Ok(out)
}

/// Load a page, merge it into its base if it extends one, and render it.
pub fn render_to_string(dir: &Path, template_name: &str, context: &Context) -> Result<String, String> {
    let child_nodes = load_nodes(dir, template_name, 0)?;
    tdebug!("Child AST: {:?}", child_nodes);

    let mut child_blocks = HashMap::new();
    let mut base_t: Option<String> = None;
    for node in &child_nodes {
        if let Node::Extends(b) = node {
            base_t = Some(b.clone());
        }
        if let Node::Block { name, body } = node {
            child_blocks.insert(name.clone(), body.clone());
        }
    }

    let merged = match base_t {
        Some(base) => {
            let base_nodes = load_nodes(dir, &base, 0)?;
            tdebug!("Base AST: {:?}", base_nodes);
            merge_blocks(&base_nodes, &child_blocks)
        }
        None => child_nodes,
    };
    Ok(render_nodes(&merged, context))
}

/// Main entry: renders `templates/<name>` into an HTML response, 404 if it is missing.
pub fn render_template(dir: &Path, template_name: &str, context: &Context) -> Response {
    match render_to_string(dir, template_name, context) {
        Ok(html) => Response::html(200, html),
        Err(msg) => {
            log::error!("Template render failed: {}", msg);
            Response::html(404, msg)
        }
    }
}

/// Template directory handle shared through the app state.
#[derive(Clone, Debug)]
pub struct Templates {
    dir: PathBuf,
}

impl Templates {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Templates { dir: dir.into() }
    }

    pub fn render(&self, name: &str, context: &Context) -> Response {
        render_template(&self.dir, name, context)
    }
}
