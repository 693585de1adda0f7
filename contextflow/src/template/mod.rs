//! Placeholder templates.
//!
//! Three tag syntaxes are recognised:
//! - `{{ name }}` substitutes a variable as-is
//! - `<%- name %>` substitutes a variable, HTML-escaped
//! - `<%= expr %>` evaluates a closed expression (see [`Expr`])
//!
//! Unknown names in the two substitution tags are left verbatim. Nothing
//! in a template can run code.

mod expr;
mod parser;
mod variables;

pub use expr::{Expr, Method, MAX_EXPR_DEPTH};
pub use parser::Segment;
pub use variables::{
    builtin_generators, html_escape, VariableGenerator, VariableScope, VariableSource,
};

use crate::errors::TemplateError;
use parser::ParseMode;
use regex::Regex;
use serde::Serialize;
use std::sync::LazyLock;

static TAG_HINT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{|<%[-=]").expect("tag hint regex is valid"));

/// A parsed template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    source: String,
    segments: Vec<Segment>,
}

impl Template {
    /// Parses leniently: malformed tags become literal text, malformed
    /// expressions fail only when rendered.
    #[must_use]
    pub fn parse(source: &str) -> Self {
        let segments = parser::parse(source, ParseMode::Lenient).unwrap_or_else(|_| {
            vec![Segment::Literal(source.to_string())]
        });
        Self {
            source: source.to_string(),
            segments,
        }
    }

    /// Parses strictly: any malformed tag is an error.
    ///
    /// # Errors
    ///
    /// Returns the first [`TemplateError`] found.
    pub fn compile(source: &str) -> Result<Self, TemplateError> {
        Ok(Self {
            source: source.to_string(),
            segments: parser::parse(source, ParseMode::Strict)?,
        })
    }

    /// Returns the template source.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Returns the parsed segments.
    #[must_use]
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Returns true if the template contains at least one tag.
    #[must_use]
    pub fn has_placeholders(&self) -> bool {
        self.segments
            .iter()
            .any(|s| !matches!(s, Segment::Literal(_)))
    }

    /// Variable names referenced by the template, de-duplicated in
    /// first-seen order. Tags that failed to parse contribute nothing.
    #[must_use]
    pub fn placeholder_names(&self) -> Vec<String> {
        let mut names = Vec::new();
        for segment in &self.segments {
            match segment {
                Segment::Raw { name, .. } | Segment::Escaped { name, .. } => {
                    names.push(name.clone());
                }
                Segment::Expression { expr, .. } => expr.collect_variables(&mut names),
                Segment::Literal(_) | Segment::Invalid { .. } => {}
            }
        }
        let mut seen = std::collections::HashSet::new();
        names.retain(|name| seen.insert(name.clone()));
        names
    }

    /// Renders the template.
    ///
    /// # Errors
    ///
    /// Returns an error if an expression cannot be evaluated.
    pub fn render(&self, vars: &dyn VariableSource) -> Result<String, TemplateError> {
        parser::render(&self.segments, vars)
    }
}

/// Cheap check for anything that looks like a tag opener.
#[must_use]
pub fn has_placeholder_syntax(text: &str) -> bool {
    TAG_HINT.is_match(text)
}

/// Substitutes placeholders in `text`.
///
/// Returns `None` when the text has no tag at all, so callers can keep the
/// original without copying it.
///
/// # Errors
///
/// Returns an error if an expression cannot be evaluated.
pub fn substitute(text: &str, vars: &dyn VariableSource) -> Result<Option<String>, TemplateError> {
    if !has_placeholder_syntax(text) {
        return Ok(None);
    }
    let template = Template::parse(text);
    if !template.has_placeholders() {
        return Ok(None);
    }
    template.render(vars).map(Some)
}

/// Returns the placeholder names found in `text`, de-duplicated in
/// first-seen order.
#[must_use]
pub fn extract_placeholders(text: &str) -> Vec<String> {
    if !has_placeholder_syntax(text) {
        return Vec::new();
    }
    Template::parse(text).placeholder_names()
}

/// Dry-run result of a substitution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlaceholderPreview {
    /// The input text.
    pub original: String,
    /// The text after substitution, or the original on error.
    pub rendered: String,
    /// Whether substitution changes the text.
    pub changed: bool,
}

/// Previews what substitution would do without touching any message.
#[must_use]
pub fn preview_placeholders(text: &str, vars: &dyn VariableSource) -> PlaceholderPreview {
    let rendered = match substitute(text, vars) {
        Ok(Some(rendered)) => rendered,
        Ok(None) | Err(_) => text.to_string(),
    };
    PlaceholderPreview {
        changed: rendered != text,
        original: text.to_string(),
        rendered,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    fn vars() -> HashMap<String, String> {
        HashMap::from([
            ("name".to_string(), "Ada".to_string()),
            ("html".to_string(), "<b>".to_string()),
        ])
    }

    #[test]
    fn test_substitute_round_trip() {
        let text = "Hello {{name}}, bye {{ name }}";
        assert_eq!(
            substitute(text, &vars()).unwrap().as_deref(),
            Some("Hello Ada, bye Ada")
        );
        assert_eq!(extract_placeholders(text), vec!["name".to_string()]);
    }

    #[test]
    fn test_substitute_fast_path() {
        assert_eq!(substitute("nothing here", &vars()).unwrap(), None);
        assert_eq!(substitute("{{ not valid }}", &vars()).unwrap(), None);
    }

    #[test]
    fn test_escaped_and_expression() {
        assert_eq!(
            substitute("<%- html %> / {{html}} / <%= name.upper() + '!' %>", &vars())
                .unwrap()
                .as_deref(),
            Some("&lt;b&gt; / <b> / ADA!")
        );
    }

    #[test]
    fn test_substitute_expression_error() {
        assert!(substitute("<%= missing %>", &vars()).is_err());
    }

    #[test]
    fn test_extract_from_all_syntaxes() {
        let names = extract_placeholders("{{a}} <%- b %> <%= c || a %> <%= bad( %>");
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_preview() {
        let preview = preview_placeholders("Hi {{name}}", &vars());
        assert_eq!(preview.rendered, "Hi Ada");
        assert!(preview.changed);

        let unchanged = preview_placeholders("Hi {{nobody}}", &vars());
        assert_eq!(unchanged.rendered, "Hi {{nobody}}");
        assert!(!unchanged.changed);

        let failed = preview_placeholders("<%= nobody %>", &vars());
        assert_eq!(failed.rendered, "<%= nobody %>");
        assert!(!failed.changed);
    }

    #[test]
    fn test_compile_strict() {
        assert!(Template::compile("Q: {{text}}").is_ok());
        assert!(Template::compile("Q: {{text").is_err());
    }
}
