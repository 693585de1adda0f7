//! Closed expression language for `<%= ... %>` tags.
//!
//! Grammar:
//!
//! ```text
//! expr     := concat ( "||" concat )*
//! concat   := postfix ( "+" postfix )*
//! postfix  := primary ( "." method "(" ")" )*
//! primary  := STRING | NUMBER | IDENT | "(" expr ")"
//! method   := "upper" | "lower" | "trim"
//! ```
//!
//! Every value is a string. `+` concatenates. `a || b` yields `a` unless it
//! is missing or empty. Nothing else is evaluated.

use super::variables::VariableSource;
use crate::errors::TemplateError;

/// Deepest parenthesis nesting, and longest method chain, a tag may use.
pub const MAX_EXPR_DEPTH: usize = 64;

/// String method applicable with `.name()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// Uppercase.
    Upper,
    /// Lowercase.
    Lower,
    /// Strip surrounding whitespace.
    Trim,
}

impl Method {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "upper" => Some(Self::Upper),
            "lower" => Some(Self::Lower),
            "trim" => Some(Self::Trim),
            _ => None,
        }
    }

    fn apply(self, value: &str) -> String {
        match self {
            Self::Upper => value.to_uppercase(),
            Self::Lower => value.to_lowercase(),
            Self::Trim => value.trim().to_string(),
        }
    }
}

/// A parsed expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    /// Quoted string literal.
    Str(String),
    /// Number literal, kept as written.
    Num(String),
    /// Variable reference.
    Var(String),
    /// `a + b + ...`
    Concat(Vec<Expr>),
    /// `a || b || ...`
    Fallback(Vec<Expr>),
    /// `target.method()`
    Call {
        /// Receiver.
        target: Box<Expr>,
        /// Method applied.
        method: Method,
    },
}

impl Expr {
    /// Parses an expression.
    ///
    /// # Errors
    ///
    /// Returns `TemplateError::InvalidExpression` on any syntax error.
    pub fn parse(source: &str) -> Result<Self, TemplateError> {
        let invalid = |reason: String| TemplateError::InvalidExpression {
            expression: source.trim().to_string(),
            reason,
        };

        let tokens = tokenize(source).map_err(invalid)?;
        if tokens.is_empty() {
            return Err(invalid("empty expression".to_string()));
        }

        let mut parser = Parser {
            tokens,
            pos: 0,
            depth: 0,
        };
        let expr = parser.fallback().map_err(invalid)?;
        if let Some(token) = parser.peek() {
            return Err(invalid(format!("unexpected {token:?}")));
        }
        Ok(expr)
    }

    /// Evaluates the expression against `vars`.
    ///
    /// # Errors
    ///
    /// Returns `TemplateError::UnknownVariable` when a referenced variable
    /// has no value and no fallback covers it.
    pub fn evaluate(&self, vars: &dyn VariableSource) -> Result<String, TemplateError> {
        match self {
            Self::Str(value) | Self::Num(value) => Ok(value.clone()),
            Self::Var(name) => vars
                .lookup(name)
                .ok_or_else(|| TemplateError::UnknownVariable { name: name.clone() }),
            Self::Concat(parts) => parts.iter().map(|part| part.evaluate(vars)).collect(),
            Self::Fallback(alternatives) => {
                let Some((last, rest)) = alternatives.split_last() else {
                    return Ok(String::new());
                };
                for alternative in rest {
                    match alternative.evaluate(vars) {
                        Ok(value) if !value.is_empty() => return Ok(value),
                        Ok(_) | Err(TemplateError::UnknownVariable { .. }) => {}
                        Err(e) => return Err(e),
                    }
                }
                last.evaluate(vars)
            }
            Self::Call { target, method } => Ok(method.apply(&target.evaluate(vars)?)),
        }
    }

    /// Appends every variable the expression references, in source order.
    pub fn collect_variables(&self, out: &mut Vec<String>) {
        match self {
            Self::Str(_) | Self::Num(_) => {}
            Self::Var(name) => out.push(name.clone()),
            Self::Concat(parts) | Self::Fallback(parts) => {
                for part in parts {
                    part.collect_variables(out);
                }
            }
            Self::Call { target, .. } => target.collect_variables(out),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Str(String),
    Num(String),
    Ident(String),
    Plus,
    OrOr,
    Dot,
    LParen,
    RParen,
}

fn tokenize(source: &str) -> Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let mut chars = source.chars().peekable();

    while let Some(&c) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '+' => {
                chars.next();
                tokens.push(Token::Plus);
            }
            '.' => {
                chars.next();
                tokens.push(Token::Dot);
            }
            '(' => {
                chars.next();
                tokens.push(Token::LParen);
            }
            ')' => {
                chars.next();
                tokens.push(Token::RParen);
            }
            '|' => {
                chars.next();
                if chars.next() != Some('|') {
                    return Err("expected '||'".to_string());
                }
                tokens.push(Token::OrOr);
            }
            '"' | '\'' => {
                let quote = c;
                chars.next();
                let mut value = String::new();
                loop {
                    match chars.next() {
                        None => return Err("unterminated string literal".to_string()),
                        Some('\\') => match chars.next() {
                            Some('n') => value.push('\n'),
                            Some('t') => value.push('\t'),
                            Some(escaped) => value.push(escaped),
                            None => return Err("unterminated string literal".to_string()),
                        },
                        Some(ch) if ch == quote => break,
                        Some(ch) => value.push(ch),
                    }
                }
                tokens.push(Token::Str(value));
            }
            c if c.is_ascii_digit() => {
                let mut value = String::new();
                while let Some(&d) = chars.peek() {
                    if d.is_ascii_digit() {
                        value.push(d);
                        chars.next();
                    } else {
                        break;
                    }
                }
                // A fraction needs a digit after the dot; `1.upper()` is a call.
                let mut lookahead = chars.clone();
                if lookahead.next() == Some('.')
                    && lookahead.peek().is_some_and(char::is_ascii_digit)
                {
                    chars.next();
                    value.push('.');
                    while let Some(&d) = chars.peek() {
                        if d.is_ascii_digit() {
                            value.push(d);
                            chars.next();
                        } else {
                            break;
                        }
                    }
                }
                tokens.push(Token::Num(value));
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let mut value = String::new();
                while let Some(&d) = chars.peek() {
                    if d.is_ascii_alphanumeric() || d == '_' {
                        value.push(d);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Token::Ident(value));
            }
            other => return Err(format!("unexpected character '{other}'")),
        }
    }

    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn fallback(&mut self) -> Result<Expr, String> {
        let mut alternatives = vec![self.concat()?];
        while self.eat(&Token::OrOr) {
            alternatives.push(self.concat()?);
        }
        Ok(if alternatives.len() == 1 {
            alternatives.remove(0)
        } else {
            Expr::Fallback(alternatives)
        })
    }

    fn concat(&mut self) -> Result<Expr, String> {
        let mut parts = vec![self.postfix()?];
        while self.eat(&Token::Plus) {
            parts.push(self.postfix()?);
        }
        Ok(if parts.len() == 1 {
            parts.remove(0)
        } else {
            Expr::Concat(parts)
        })
    }

    fn postfix(&mut self) -> Result<Expr, String> {
        let mut expr = self.primary()?;
        let mut calls = 0_usize;
        while self.eat(&Token::Dot) {
            calls += 1;
            if calls > MAX_EXPR_DEPTH {
                return Err(format!("method chain longer than {MAX_EXPR_DEPTH}"));
            }
            let name = match self.next() {
                Some(Token::Ident(name)) => name,
                other => return Err(format!("expected method name, found {other:?}")),
            };
            let method =
                Method::from_name(&name).ok_or_else(|| format!("unknown method '{name}'"))?;
            if !self.eat(&Token::LParen) || !self.eat(&Token::RParen) {
                return Err(format!("method '{name}' takes no arguments"));
            }
            expr = Expr::Call {
                target: Box::new(expr),
                method,
            };
        }
        Ok(expr)
    }

    fn primary(&mut self) -> Result<Expr, String> {
        match self.next() {
            Some(Token::Str(value)) => Ok(Expr::Str(value)),
            Some(Token::Num(value)) => Ok(Expr::Num(value)),
            Some(Token::Ident(name)) => Ok(Expr::Var(name)),
            Some(Token::LParen) => {
                if self.depth >= MAX_EXPR_DEPTH {
                    return Err(format!("nesting deeper than {MAX_EXPR_DEPTH}"));
                }
                self.depth += 1;
                let inner = self.fallback();
                self.depth -= 1;
                let inner = inner?;
                if self.eat(&Token::RParen) {
                    Ok(inner)
                } else {
                    Err("missing ')'".to_string())
                }
            }
            Some(other) => Err(format!("unexpected {other:?}")),
            None => Err("unexpected end of expression".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn vars() -> HashMap<String, String> {
        HashMap::from([
            ("name".to_string(), "Ada".to_string()),
            ("empty".to_string(), String::new()),
            ("padded".to_string(), "  hi  ".to_string()),
        ])
    }

    fn eval(source: &str) -> Result<String, TemplateError> {
        Expr::parse(source)?.evaluate(&vars())
    }

    #[test]
    fn test_literals_and_variables() {
        assert_eq!(eval("'hello'").unwrap(), "hello");
        assert_eq!(eval("\"a\\\"b\"").unwrap(), "a\"b");
        assert_eq!(eval("42").unwrap(), "42");
        assert_eq!(eval("3.5").unwrap(), "3.5");
        assert_eq!(eval("name").unwrap(), "Ada");
    }

    #[test]
    fn test_concat() {
        assert_eq!(eval("'Hi ' + name + '!'").unwrap(), "Hi Ada!");
    }

    #[test]
    fn test_fallback() {
        assert_eq!(eval("missing || 'guest'").unwrap(), "guest");
        assert_eq!(eval("empty || name").unwrap(), "Ada");
        assert_eq!(eval("name || 'guest'").unwrap(), "Ada");
    }

    #[test]
    fn test_fallback_last_alternative_must_resolve() {
        assert_eq!(
            eval("missing || other").unwrap_err(),
            TemplateError::UnknownVariable {
                name: "other".to_string()
            }
        );
    }

    #[test]
    fn test_methods_and_parentheses() {
        assert_eq!(eval("name.upper()").unwrap(), "ADA");
        assert_eq!(eval("padded.trim()").unwrap(), "hi");
        assert_eq!(eval("(missing || 'X').lower() + 1").unwrap(), "x1");
    }

    #[test]
    fn test_precedence_concat_binds_tighter_than_fallback() {
        let expr = Expr::parse("a + b || c").unwrap();
        assert!(matches!(expr, Expr::Fallback(ref alts) if alts.len() == 2));
    }

    #[test]
    fn test_rejects_code() {
        for source in [
            "process.exit()",
            "name; drop",
            "name = 1",
            "alert(1)",
            "name.upper(1)",
            "",
            "'open",
            "(name",
            "a | b",
        ] {
            assert!(
                matches!(Expr::parse(source), Err(TemplateError::InvalidExpression { .. })),
                "{source} should not parse"
            );
        }
    }

    #[test]
    fn test_nesting_limit() {
        let nested = |depth: usize| format!("{}name{}", "(".repeat(depth), ")".repeat(depth));

        assert_eq!(eval(&nested(MAX_EXPR_DEPTH)).unwrap(), "Ada");
        assert!(matches!(
            Expr::parse(&nested(MAX_EXPR_DEPTH + 1)),
            Err(TemplateError::InvalidExpression { .. })
        ));
        assert!(matches!(
            Expr::parse(&nested(200_000)),
            Err(TemplateError::InvalidExpression { .. })
        ));
    }

    #[test]
    fn test_method_chain_limit() {
        let chain = |calls: usize| format!("name{}", ".upper()".repeat(calls));

        assert_eq!(eval(&chain(MAX_EXPR_DEPTH)).unwrap(), "ADA");
        assert!(matches!(
            Expr::parse(&chain(100_000)),
            Err(TemplateError::InvalidExpression { .. })
        ));
    }

    #[test]
    fn test_unknown_variable() {
        assert_eq!(
            eval("nobody").unwrap_err(),
            TemplateError::UnknownVariable {
                name: "nobody".to_string()
            }
        );
    }

    #[test]
    fn test_collect_variables() {
        let expr = Expr::parse("(a || b).upper() + 'x' + c").unwrap();
        let mut names = Vec::new();
        expr.collect_variables(&mut names);
        assert_eq!(names, vec!["a", "b", "c"]);
    }
}
