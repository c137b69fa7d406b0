//! Type-keyed argument parsers.
//!
//! A parser turns one raw token into a typed value. Ordinary malformed input
//! yields `None`, never a panic, so the binder can fall back to a default.

use super::{ArgType, ArgValue, Snowflake};
use crate::context::Context;
use dashmap::DashMap;
use regex::Regex;
use std::sync::{Arc, LazyLock};

/// Converts one raw token into a value of a single semantic type.
pub trait Parser: Send + Sync {
    fn parse(&self, ctx: &Context, raw: &str) -> Option<ArgValue>;
}

/// Non-blank text, returned as-is.
pub struct StringParser;

impl Parser for StringParser {
    fn parse(&self, _ctx: &Context, raw: &str) -> Option<ArgValue> {
        parse_literal(&ArgType::String, raw)
    }
}

/// Raw ids and user, member, role and channel mentions.
static SNOWFLAKE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:<(?:@!?|@&|#)([0-9]{17,21})>|([0-9]{17,21}))$")
        .expect("snowflake pattern is a valid regex")
});

pub struct SnowflakeParser;

impl Parser for SnowflakeParser {
    fn parse(&self, _ctx: &Context, raw: &str) -> Option<ArgValue> {
        parse_literal(&ArgType::Snowflake, raw)
    }
}

pub struct IntParser;

impl Parser for IntParser {
    fn parse(&self, _ctx: &Context, raw: &str) -> Option<ArgValue> {
        parse_literal(&ArgType::Int, raw)
    }
}

pub struct BoolParser;

impl Parser for BoolParser {
    fn parse(&self, _ctx: &Context, raw: &str) -> Option<ArgValue> {
        parse_literal(&ArgType::Bool, raw)
    }
}

/// Context-free parsing of the built-in types. Custom types yield `None`.
pub(crate) fn parse_literal(ty: &ArgType, raw: &str) -> Option<ArgValue> {
    match ty {
        ArgType::String => (!raw.trim().is_empty()).then(|| ArgValue::Str(raw.to_string())),
        ArgType::Snowflake => {
            let caps = SNOWFLAKE_PATTERN.captures(raw.trim())?;
            let digits = caps.get(1).or_else(|| caps.get(2))?;
            digits
                .as_str()
                .parse::<Snowflake>()
                .ok()
                .map(ArgValue::Snowflake)
        }
        ArgType::Int => raw.trim().parse::<i64>().ok().map(ArgValue::Int),
        ArgType::Bool => match raw.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "y" | "on" | "1" => Some(ArgValue::Bool(true)),
            "false" | "no" | "n" | "off" | "0" => Some(ArgValue::Bool(false)),
            _ => None,
        },
        ArgType::Custom(_) => None,
    }
}

/// Every parser known to a registry, keyed by the type it produces.
pub struct ParserSet {
    parsers: DashMap<ArgType, Arc<dyn Parser>>,
}

impl ParserSet {
    /// An empty set. Most callers want [`ParserSet::with_defaults`].
    pub fn new() -> Self {
        Self {
            parsers: DashMap::new(),
        }
    }

    /// The built-in parsers for snowflake, string, int and bool.
    pub fn with_defaults() -> Self {
        let set = Self::new();
        set.register(ArgType::Snowflake, SnowflakeParser);
        set.register(ArgType::String, StringParser);
        set.register(ArgType::Int, IntParser);
        set.register(ArgType::Bool, BoolParser);
        set
    }

    /// Register (or replace) the parser for `ty`.
    pub fn register(&self, ty: ArgType, parser: impl Parser + 'static) {
        self.parsers.insert(ty, Arc::new(parser));
    }

    pub fn get(&self, ty: &ArgType) -> Option<Arc<dyn Parser>> {
        self.parsers.get(ty).map(|p| Arc::clone(p.value()))
    }

    pub fn supports(&self, ty: &ArgType) -> bool {
        self.parsers.contains_key(ty)
    }
}

impl Default for ParserSet {
    fn default() -> Self {
        Self::with_defaults()
    }
}
