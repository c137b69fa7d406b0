//! Binding raw input to argument specifications.

use super::{ArgSpec, Arguments, DefaultValue, ParserSet};
use crate::context::Context;
use crate::error::CommandError;

/// Split input on whitespace. Double quotes group words into one token;
/// `""` yields an empty token.
pub fn tokenize(input: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut pending = false;

    for c in input.chars() {
        match c {
            '"' => {
                in_quotes = !in_quotes;
                pending = true;
            }
            c if c.is_whitespace() && !in_quotes => {
                if pending {
                    tokens.push(std::mem::take(&mut current));
                    pending = false;
                }
            }
            c => {
                current.push(c);
                pending = true;
            }
        }
    }
    if pending {
        tokens.push(current);
    }
    tokens
}

/// Bind `tokens` against `specs`, strictly left to right.
///
/// Each spec consumes one token; a greedy spec consumes every remaining token
/// joined with single spaces. Running out of input parses `""`. A failed parse
/// falls back to the default of an optional spec and fails the whole bind
/// otherwise.
pub fn bind(
    ctx: &Context,
    specs: &[ArgSpec],
    tokens: &[String],
    parsers: &ParserSet,
) -> Result<Arguments, CommandError> {
    let mut bound = Arguments::new();
    let mut remaining = tokens.iter();

    for spec in specs {
        let raw = if spec.is_greedy() {
            remaining
                .by_ref()
                .map(String::as_str)
                .collect::<Vec<_>>()
                .join(" ")
        } else {
            remaining.next().cloned().unwrap_or_default()
        };

        let parser = parsers.get(spec.ty());
        let parse = |text: &str| parser.as_ref().and_then(|p| p.parse(ctx, text));

        match parse(&raw) {
            Some(value) => bound.insert(spec.name(), value),
            None if spec.is_optional() => match spec.fallback() {
                Some(DefaultValue::Value(value)) => bound.insert(spec.name(), value.clone()),
                Some(DefaultValue::Raw(text)) => match parse(text) {
                    Some(value) => bound.insert(spec.name(), value),
                    None => return Err(parse_error(spec, text.clone())),
                },
                None => {}
            },
            None => return Err(parse_error(spec, raw)),
        }
    }

    Ok(bound)
}

fn parse_error(spec: &ArgSpec, input: String) -> CommandError {
    CommandError::ArgumentParse {
        parameter: spec.name().to_string(),
        expected: spec.ty().clone(),
        input,
    }
}
