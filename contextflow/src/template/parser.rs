//! Splits template text into literal and placeholder segments.

use super::expr::Expr;
use super::variables::{html_escape, VariableSource};
use crate::errors::TemplateError;
use regex::Regex;
use std::sync::LazyLock;

static IDENTIFIER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier regex is valid")
});

/// One piece of a parsed template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Text copied as-is.
    Literal(String),
    /// `{{ name }}`
    Raw {
        /// Variable name.
        name: String,
        /// Tag as written.
        source: String,
    },
    /// `<%- name %>`
    Escaped {
        /// Variable name.
        name: String,
        /// Tag as written.
        source: String,
    },
    /// `<%= expr %>`
    Expression {
        /// Parsed expression.
        expr: Expr,
        /// Tag as written.
        source: String,
    },
    /// A tag that failed to parse; rendering it is an error.
    Invalid {
        /// Tag as written.
        source: String,
        /// The parse error.
        error: TemplateError,
    },
}

impl Segment {
    /// Returns the tag source for non-literal segments.
    #[must_use]
    pub fn source(&self) -> &str {
        match self {
            Self::Literal(text) => text,
            Self::Raw { source, .. }
            | Self::Escaped { source, .. }
            | Self::Expression { source, .. }
            | Self::Invalid { source, .. } => source,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TagKind {
    Raw,
    Escaped,
    Expression,
}

impl TagKind {
    const fn open(self) -> &'static str {
        match self {
            Self::Raw => "{{",
            Self::Escaped => "<%-",
            Self::Expression => "<%=",
        }
    }

    const fn close(self) -> &'static str {
        match self {
            Self::Raw => "}}",
            Self::Escaped | Self::Expression => "%>",
        }
    }
}

/// How malformed tags are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ParseMode {
    /// Malformed tags are kept as literal text.
    Lenient,
    /// Malformed tags are errors.
    Strict,
}

fn find_next_tag(text: &str) -> Option<(usize, TagKind)> {
    text.char_indices().find_map(|(i, _)| {
        let rest = &text[i..];
        [TagKind::Raw, TagKind::Escaped, TagKind::Expression]
            .into_iter()
            .find(|kind| rest.starts_with(kind.open()))
            .map(|kind| (i, kind))
    })
}

pub(crate) fn parse(src: &str, mode: ParseMode) -> Result<Vec<Segment>, TemplateError> {
    let mut segments = Vec::new();
    let mut literal = String::new();
    let mut pos = 0;

    while pos < src.len() {
        let rest = &src[pos..];
        let Some((offset, kind)) = find_next_tag(rest) else {
            literal.push_str(rest);
            break;
        };
        literal.push_str(&rest[..offset]);

        let tag_start = pos + offset;
        let body_start = tag_start + kind.open().len();
        let Some(body_len) = src[body_start..].find(kind.close()) else {
            if mode == ParseMode::Strict {
                return Err(TemplateError::Unterminated {
                    open: kind.open().to_string(),
                    position: tag_start,
                });
            }
            literal.push_str(&src[tag_start..]);
            break;
        };

        let end = body_start + body_len + kind.close().len();
        let body = &src[body_start..body_start + body_len];
        let source = &src[tag_start..end];

        match classify(kind, body, source, tag_start, mode)? {
            Some(segment) => {
                if !literal.is_empty() {
                    segments.push(Segment::Literal(std::mem::take(&mut literal)));
                }
                segments.push(segment);
            }
            None => literal.push_str(source),
        }
        pos = end;
    }

    if !literal.is_empty() {
        segments.push(Segment::Literal(literal));
    }
    Ok(segments)
}

fn classify(
    kind: TagKind,
    body: &str,
    source: &str,
    position: usize,
    mode: ParseMode,
) -> Result<Option<Segment>, TemplateError> {
    let body = body.trim();
    let strict = mode == ParseMode::Strict;

    if body.is_empty() {
        return if strict {
            Err(TemplateError::EmptyTag { position })
        } else if kind == TagKind::Expression {
            Ok(Some(Segment::Invalid {
                source: source.to_string(),
                error: TemplateError::EmptyTag { position },
            }))
        } else {
            Ok(None)
        };
    }

    match kind {
        TagKind::Raw | TagKind::Escaped => {
            if !IDENTIFIER.is_match(body) {
                return if strict {
                    Err(TemplateError::UnknownToken {
                        token: source.to_string(),
                    })
                } else {
                    Ok(None)
                };
            }
            let name = body.to_string();
            let source = source.to_string();
            Ok(Some(if kind == TagKind::Raw {
                Segment::Raw { name, source }
            } else {
                Segment::Escaped { name, source }
            }))
        }
        TagKind::Expression => match Expr::parse(body) {
            Ok(expr) => Ok(Some(Segment::Expression {
                expr,
                source: source.to_string(),
            })),
            Err(error) if strict => Err(error),
            Err(error) => Ok(Some(Segment::Invalid {
                source: source.to_string(),
                error,
            })),
        },
    }
}

pub(crate) fn render(segments: &[Segment], vars: &dyn VariableSource) -> Result<String, TemplateError> {
    let mut out = String::new();
    for segment in segments {
        match segment {
            Segment::Literal(text) => out.push_str(text),
            Segment::Raw { name, source } => match vars.lookup(name) {
                Some(value) => out.push_str(&value),
                None => out.push_str(source),
            },
            Segment::Escaped { name, source } => match vars.lookup(name) {
                Some(value) => out.push_str(&html_escape(&value)),
                None => out.push_str(source),
            },
            Segment::Expression { expr, .. } => out.push_str(&expr.evaluate(vars)?),
            Segment::Invalid { error, .. } => return Err(error.clone()),
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn raw(name: &str, source: &str) -> Segment {
        Segment::Raw {
            name: name.to_string(),
            source: source.to_string(),
        }
    }

    #[test]
    fn test_parse_literal_only() {
        let segments = parse("plain text", ParseMode::Lenient).unwrap();
        assert_eq!(segments, vec![Segment::Literal("plain text".to_string())]);
    }

    #[test]
    fn test_parse_three_syntaxes() {
        let segments = parse("a {{ x }} b <%- y %> c <%= z %>", ParseMode::Lenient).unwrap();
        assert_eq!(segments.len(), 6);
        assert_eq!(segments[1], raw("x", "{{ x }}"));
        assert!(matches!(&segments[3], Segment::Escaped { name, .. } if name == "y"));
        assert!(matches!(&segments[5], Segment::Expression { expr: Expr::Var(v), .. } if v == "z"));
    }

    #[test]
    fn test_lenient_keeps_malformed_tags_literal() {
        let segments = parse("{{ not a name }} and {{ open", ParseMode::Lenient).unwrap();
        assert_eq!(
            segments,
            vec![Segment::Literal("{{ not a name }} and {{ open".to_string())]
        );
    }

    #[test]
    fn test_lenient_invalid_expression_segment() {
        let segments = parse("<%= alert(1) %>", ParseMode::Lenient).unwrap();
        assert!(matches!(segments[0], Segment::Invalid { .. }));
    }

    #[test]
    fn test_strict_errors() {
        assert_eq!(
            parse("Q: {{text", ParseMode::Strict).unwrap_err(),
            TemplateError::Unterminated {
                open: "{{".to_string(),
                position: 3
            }
        );
        assert_eq!(
            parse("{{ }}", ParseMode::Strict).unwrap_err(),
            TemplateError::EmptyTag { position: 0 }
        );
        assert!(matches!(
            parse("{{ a b }}", ParseMode::Strict).unwrap_err(),
            TemplateError::UnknownToken { .. }
        ));
    }

    #[test]
    fn test_render_unknown_names_stay_verbatim() {
        let segments = parse("Hi {{ who }} <%- who %>", ParseMode::Lenient).unwrap();
        let vars = std::collections::HashMap::new();
        assert_eq!(render(&segments, &vars).unwrap(), "Hi {{ who }} <%- who %>");
    }

    #[test]
    fn test_render_invalid_segment_errors() {
        let segments = parse("<%= %>", ParseMode::Lenient).unwrap();
        let vars = std::collections::HashMap::new();
        assert_eq!(
            render(&segments, &vars).unwrap_err(),
            TemplateError::EmptyTag { position: 0 }
        );
    }

    #[test]
    fn test_multibyte_text_around_tags() {
        let segments = parse("héllo {{name}} 世界", ParseMode::Lenient).unwrap();
        let vars = std::collections::HashMap::from([("name".to_string(), "Ada".to_string())]);
        assert_eq!(render(&segments, &vars).unwrap(), "héllo Ada 世界");
    }
}
