//! Template evaluation for assertions and replay predicates.
//!
//! Templates mix plain text with `{{ ... }}` actions. An action is either a
//! variable reference (`{{.name}}`), a quoted literal, or a function call
//! whose arguments are quoted strings, bare numbers/booleans or variable
//! references:
//!
//! ```text
//! {{NthRequest 2}}
//! {{VariableMatches "headers.Content-Type" "application/json"}}
//! {{PropertyEquals "id" .expected_id}}
//! ```
//!
//! Evaluation is single pass; function output is never re-interpolated.

use serde_json::{Map, Value};

use super::functions::{call_function, find_variable, value_to_text};
use crate::error::TemplateError;

const OPEN: &str = "{{";
const CLOSE: &str = "}}";

/// Evaluates a named template against a flat parameter map.
pub trait TemplateEvaluator: Send + Sync {
    /// Renders `template` and returns the produced text.
    ///
    /// # Errors
    ///
    /// Returns a [`TemplateError`] if the template is malformed or calls an
    /// unknown function.
    fn evaluate(
        &self,
        name: &str,
        template: &str,
        params: &Map<String, Value>,
    ) -> Result<String, TemplateError>;
}

/// Evaluator backed by the built-in function table.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinEvaluator;

impl BuiltinEvaluator {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl TemplateEvaluator for BuiltinEvaluator {
    fn evaluate(
        &self,
        name: &str,
        template: &str,
        params: &Map<String, Value>,
    ) -> Result<String, TemplateError> {
        let mut out = String::with_capacity(template.len());
        let mut rest = template;
        while let Some(start) = rest.find(OPEN) {
            out.push_str(&rest[..start]);
            let after = &rest[start + OPEN.len()..];
            let end = after.find(CLOSE).ok_or_else(|| TemplateError::Syntax {
                name: name.to_string(),
                message: "unclosed action".to_string(),
            })?;
            let action = after[..end].trim();
            let value = eval_action(name, action, params)?;
            out.push_str(&value_to_text(&value));
            rest = &after[end + CLOSE.len()..];
        }
        out.push_str(rest);
        Ok(out)
    }
}

/// One lexical element of an action.
#[derive(Debug, Clone, PartialEq)]
enum Token {
    /// `"..."` literal with escapes resolved
    Quoted(String),
    /// `.name` or `.a.b` variable reference (leading dot removed)
    Variable(String),
    /// Anything else: a function name, number or boolean
    Bare(String),
}

fn eval_action(
    name: &str,
    action: &str,
    params: &Map<String, Value>,
) -> Result<Value, TemplateError> {
    let tokens = tokenize(name, action)?;
    let Some((head, args)) = tokens.split_first() else {
        return Err(TemplateError::Syntax {
            name: name.to_string(),
            message: "empty action".to_string(),
        });
    };
    match head {
        Token::Bare(function) => {
            let args: Vec<Value> = args.iter().map(|t| resolve(t, params)).collect();
            call_function(function, &args, params)
        }
        single if args.is_empty() => Ok(resolve(single, params)),
        _ => Err(TemplateError::Syntax {
            name: name.to_string(),
            message: format!("unexpected arguments after '{action}'"),
        }),
    }
}

fn resolve(token: &Token, params: &Map<String, Value>) -> Value {
    match token {
        Token::Quoted(s) => Value::String(s.clone()),
        Token::Variable(path) => find_variable(path, params).unwrap_or(Value::Null),
        Token::Bare(s) => match s.as_str() {
            "true" => Value::Bool(true),
            "false" => Value::Bool(false),
            _ => s
                .parse::<i64>()
                .map(Value::from)
                .or_else(|_| s.parse::<f64>().map(Value::from))
                .unwrap_or_else(|_| Value::String(s.clone())),
        },
    }
}

fn tokenize(name: &str, action: &str) -> Result<Vec<Token>, TemplateError> {
    let mut tokens = Vec::new();
    let mut chars = action.chars().peekable();
    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }
        if c == '"' {
            chars.next();
            let mut literal = String::new();
            let mut closed = false;
            while let Some(c) = chars.next() {
                match c {
                    '"' => {
                        closed = true;
                        break;
                    }
                    '\\' => match chars.next() {
                        Some(escaped @ ('"' | '\\')) => literal.push(escaped),
                        Some(other) => {
                            literal.push('\\');
                            literal.push(other);
                        }
                        None => literal.push('\\'),
                    },
                    other => literal.push(other),
                }
            }
            if !closed {
                return Err(TemplateError::Syntax {
                    name: name.to_string(),
                    message: "unterminated quoted string".to_string(),
                });
            }
            tokens.push(Token::Quoted(literal));
            continue;
        }
        let mut word = String::new();
        while let Some(&c) = chars.peek() {
            if c.is_whitespace() {
                break;
            }
            word.push(c);
            chars.next();
        }
        match word.strip_prefix('.') {
            Some(path) => tokens.push(Token::Variable(path.to_string())),
            None => tokens.push(Token::Bare(word)),
        }
    }
    Ok(tokens)
}
