//! # Template
//!
//! Key / channel templates evaluated against a JSON document.
//!
//! A format string mixes literal text with `{dotted.path}` references:
//!
//! - `"foo:{bar}"` with `{"bar":"b"}` evaluates to `"foo:b"`
//! - `"{foo}:{bar}"` with `{"foo":"f","bar":"b"}` evaluates to `"f:b"`
//! - `"foo:{bar.baz}"` with `{"bar":{"baz":"b"}}` evaluates to `"foo:b"`
//!
//! Rendering rules: strings are unquoted, numbers and booleans use their JSON
//! text, `null` renders as `"null"`, objects and arrays render as compact JSON,
//! and a reference that does not resolve renders as the empty string.

mod path;

use std::fmt;
use std::str::FromStr;

use serde_json::Value;
use thiserror::Error;

pub use path::{lookup, render};

/// Template errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TemplateError {
    /// A `{` reference was never closed
    #[error("missing '}}' in template {format:?}")]
    MissingClosingBrace { format: String },

    /// The document to evaluate against is not JSON
    #[error("invalid json document: {message}")]
    InvalidJson { message: String },
}

/// One compiled template node
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    /// Text copied verbatim
    Literal(String),
    /// Dotted field reference, e.g. `bar.baz`
    Path(String),
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum State {
    Literal,
    Path,
}

/// Compiled template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    nodes: Vec<Node>,
}

impl Template {
    /// Compile a format string
    ///
    /// # Errors
    /// Returns `TemplateError::MissingClosingBrace` when the input ends inside
    /// a `{...}` reference.
    pub fn compile(format: &str) -> Result<Self, TemplateError> {
        let mut nodes = Vec::new();
        let mut buf = String::new();
        let mut state = State::Literal;

        for c in format.chars() {
            match (state, c) {
                (State::Literal, '{') => {
                    if !buf.is_empty() {
                        nodes.push(Node::Literal(std::mem::take(&mut buf)));
                    }
                    state = State::Path;
                }
                (State::Path, '}') => {
                    nodes.push(Node::Path(std::mem::take(&mut buf)));
                    state = State::Literal;
                }
                _ => buf.push(c),
            }
        }

        if state == State::Path {
            return Err(TemplateError::MissingClosingBrace {
                format: format.to_string(),
            });
        }

        if !buf.is_empty() {
            nodes.push(Node::Literal(buf));
        }

        Ok(Self { nodes })
    }

    /// Evaluate against a decoded document
    pub fn eval(&self, doc: &Value) -> String {
        let mut out = String::new();
        for node in &self.nodes {
            match node {
                Node::Literal(text) => out.push_str(text),
                Node::Path(path) => out.push_str(&render(lookup(doc, path))),
            }
        }
        out
    }

    /// Evaluate against raw JSON text
    ///
    /// # Errors
    /// Returns `TemplateError::InvalidJson` when `json` does not parse. A
    /// reference that is merely absent is not an error.
    pub fn eval_json(&self, json: &str) -> Result<String, TemplateError> {
        let doc: Value = serde_json::from_str(json).map_err(|e| TemplateError::InvalidJson {
            message: e.to_string(),
        })?;
        Ok(self.eval(&doc))
    }

    /// Compiled nodes in encounter order
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Field references used by this template
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.nodes.iter().filter_map(|n| match n {
            Node::Path(p) => Some(p.as_str()),
            Node::Literal(_) => None,
        })
    }
}

impl FromStr for Template {
    type Err = TemplateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::compile(s)
    }
}

impl fmt::Display for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for node in &self.nodes {
            match node {
                Node::Literal(text) => f.write_str(text)?,
                Node::Path(path) => write!(f, "{{{path}}}")?,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compile_invalid() {
        for format in ["{", "{foo", "da:sad{foo"] {
            let err = Template::compile(format).unwrap_err();
            assert!(
                matches!(err, TemplateError::MissingClosingBrace { .. }),
                "{format:?} should fail to compile"
            );
        }
    }

    #[test]
    fn test_valid_templates() {
        let cases = [
            ("}", "{}", "}"),
            ("", "{}", ""),
            ("foo:bar:baz", "{}", "foo:bar:baz"),
            ("foo:{bar}", r#"{"bar":"baz"}"#, "foo:baz"),
            ("{foo}:{bar}:baz", r#"{"foo":"f","bar":"b"}"#, "f:b:baz"),
            ("foo:{bar.baz}", r#"{"bar":{"baz":"b"}}"#, "foo:b"),
            ("stream:{foo}:{bar}", r#"{"foo":"f","bar":"b"}"#, "stream:f:b"),
            (
                "integration-errors:project:{projectId}:ingress",
                r#"{"projectId":"p"}"#,
                "integration-errors:project:p:ingress",
            ),
            (
                "stream:persist:{projectId}:ingress",
                r#"{"projectId":"foo"}"#,
                "stream:persist:foo:ingress",
            ),
        ];

        for (format, data, expected) in cases {
            let tmpl = Template::compile(format).unwrap();
            let got = tmpl.eval_json(data).unwrap();
            assert_eq!(got, expected, "{format:?}.eval({data})");
        }
    }

    #[test]
    fn test_absent_reference_renders_empty() {
        let tmpl = Template::compile("stream:project:{projectId}:ingress").unwrap();
        assert_eq!(tmpl.eval_json("{}").unwrap(), "stream:project::ingress");
    }

    #[test]
    fn test_null_reference_renders_null() {
        let tmpl = Template::compile("stream:project:{projectId}:ingress").unwrap();
        assert_eq!(
            tmpl.eval_json(r#"{"projectId":null}"#).unwrap(),
            "stream:project:null:ingress"
        );
    }

    #[test]
    fn test_scalar_rendering() {
        let tmpl = Template::compile("{n}/{f}/{b}").unwrap();
        let got = tmpl.eval_json(r#"{"n":34,"f":1.5,"b":true}"#).unwrap();
        assert_eq!(got, "34/1.5/true");
    }

    #[test]
    fn test_eval_invalid_json() {
        let tmpl = Template::compile("foo:{bar}").unwrap();
        let err = tmpl.eval_json("{bar").unwrap_err();
        assert!(matches!(err, TemplateError::InvalidJson { .. }));
    }

    #[test]
    fn test_nodes_in_order() {
        let tmpl = Template::compile("a{b}c").unwrap();
        assert_eq!(
            tmpl.nodes(),
            &[
                Node::Literal("a".into()),
                Node::Path("b".into()),
                Node::Literal("c".into())
            ]
        );
        assert_eq!(tmpl.paths().collect::<Vec<_>>(), vec!["b"]);
    }

    #[test]
    fn test_display_round_trip() {
        let format = "stream:{foo.bar}:x}";
        let tmpl: Template = format.parse().unwrap();
        assert_eq!(tmpl.to_string(), format);
    }
}
