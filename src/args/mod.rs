//! Argument specifications, parsed values and the binder.
//!
//! - [`ArgSpec`]: per-parameter metadata derived once per command
//! - [`ParserSet`]: one [`Parser`] per semantic [`ArgType`]
//! - [`bind`]: left-to-right binding of raw tokens against a spec list

mod binder;
mod parsers;
mod snowflake;

pub use binder::{bind, tokenize};
pub use parsers::{BoolParser, IntParser, Parser, ParserSet, SnowflakeParser, StringParser};

pub(crate) use parsers::parse_literal;
pub use snowflake::Snowflake;

use serde_json::Value;
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Semantic type a parameter is parsed into.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ArgType {
    Snowflake,
    String,
    Int,
    Bool,
    /// A type registered at runtime under this name.
    Custom(String),
}

impl fmt::Display for ArgType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Snowflake => f.write_str("snowflake"),
            Self::String => f.write_str("string"),
            Self::Int => f.write_str("int"),
            Self::Bool => f.write_str("bool"),
            Self::Custom(name) => f.write_str(name),
        }
    }
}

impl FromStr for ArgType {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_ascii_lowercase().as_str() {
            "snowflake" | "id" => Self::Snowflake,
            "string" | "str" | "text" => Self::String,
            "int" | "integer" | "number" => Self::Int,
            "bool" | "boolean" => Self::Bool,
            _ => Self::Custom(s.trim().to_string()),
        })
    }
}

/// A parsed argument value.
#[derive(Clone)]
pub enum ArgValue {
    Snowflake(Snowflake),
    Str(String),
    Int(i64),
    Bool(bool),
    /// Value produced by a custom parser, with the raw text it came from.
    Custom {
        raw: String,
        value: Arc<dyn Any + Send + Sync>,
    },
}

impl ArgValue {
    /// Wrap a custom parser result.
    pub fn custom<T: Any + Send + Sync>(raw: impl Into<String>, value: T) -> Self {
        Self::Custom {
            raw: raw.into(),
            value: Arc::new(value),
        }
    }

    /// JSON form used on the plugin wire. Snowflakes travel as strings.
    pub fn to_json(&self) -> Value {
        match self {
            Self::Snowflake(id) => Value::String(id.to_string()),
            Self::Str(s) => Value::String(s.clone()),
            Self::Int(n) => Value::from(*n),
            Self::Bool(b) => Value::Bool(*b),
            Self::Custom { raw, .. } => Value::String(raw.clone()),
        }
    }
}

impl fmt::Debug for ArgValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Snowflake(id) => f.debug_tuple("Snowflake").field(id).finish(),
            Self::Str(s) => f.debug_tuple("Str").field(s).finish(),
            Self::Int(n) => f.debug_tuple("Int").field(n).finish(),
            Self::Bool(b) => f.debug_tuple("Bool").field(b).finish(),
            Self::Custom { raw, .. } => f.debug_struct("Custom").field("raw", raw).finish(),
        }
    }
}

impl PartialEq for ArgValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Snowflake(a), Self::Snowflake(b)) => a == b,
            (Self::Str(a), Self::Str(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Custom { value: a, .. }, Self::Custom { value: b, .. }) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

/// Fallback used when an optional parameter fails to parse.
#[derive(Debug, Clone)]
pub(crate) enum DefaultValue {
    Value(ArgValue),
    /// Text run through the parameter's parser at bind time.
    Raw(String),
}

/// Metadata for one command parameter.
#[derive(Debug, Clone)]
pub struct ArgSpec {
    name: String,
    ty: ArgType,
    optional: bool,
    default: Option<DefaultValue>,
    greedy: bool,
    description: Option<String>,
}

impl ArgSpec {
    /// A parameter that must parse.
    pub fn required(name: impl Into<String>, ty: ArgType) -> Self {
        Self {
            name: name.into(),
            ty,
            optional: false,
            default: None,
            greedy: false,
            description: None,
        }
    }

    /// A parameter that binds nothing when it fails to parse.
    pub fn optional(name: impl Into<String>, ty: ArgType) -> Self {
        Self {
            optional: true,
            ..Self::required(name, ty)
        }
    }

    /// Make the parameter optional with a fallback value.
    pub fn with_default(mut self, value: ArgValue) -> Self {
        self.optional = true;
        self.default = Some(DefaultValue::Value(value));
        self
    }

    /// Make the parameter optional with a fallback given as text, parsed by
    /// the parameter's own parser when it is needed.
    pub fn with_raw_default(mut self, raw: impl Into<String>) -> Self {
        self.optional = true;
        self.default = Some(DefaultValue::Raw(raw.into()));
        self
    }

    /// Consume all remaining input. Only valid on the last parameter.
    pub fn greedy(mut self) -> Self {
        self.greedy = true;
        self
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ty(&self) -> &ArgType {
        &self.ty
    }

    pub fn is_optional(&self) -> bool {
        self.optional
    }

    pub fn default_value(&self) -> Option<&ArgValue> {
        match self.default.as_ref()? {
            DefaultValue::Value(v) => Some(v),
            DefaultValue::Raw(_) => None,
        }
    }

    pub fn raw_default(&self) -> Option<&str> {
        match self.default.as_ref()? {
            DefaultValue::Raw(raw) => Some(raw),
            DefaultValue::Value(_) => None,
        }
    }

    pub(crate) fn fallback(&self) -> Option<&DefaultValue> {
        self.default.as_ref()
    }

    pub fn is_greedy(&self) -> bool {
        self.greedy
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Usage token: `<name>`, `[name]`, or with `...` when greedy.
    pub fn usage(&self) -> String {
        let dots = if self.greedy { "..." } else { "" };
        if self.optional {
            format!("[{}{}]", self.name, dots)
        } else {
            format!("<{}{}>", self.name, dots)
        }
    }
}

/// Arguments bound for one invocation, keyed by parameter name.
#[derive(Debug, Clone, Default)]
pub struct Arguments {
    values: HashMap<String, ArgValue>,
}

impl Arguments {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: ArgValue) {
        self.values.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<&ArgValue> {
        self.values.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn str(&self, name: &str) -> Option<&str> {
        match self.values.get(name)? {
            ArgValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn snowflake(&self, name: &str) -> Option<Snowflake> {
        match self.values.get(name)? {
            ArgValue::Snowflake(id) => Some(*id),
            _ => None,
        }
    }

    pub fn int(&self, name: &str) -> Option<i64> {
        match self.values.get(name)? {
            ArgValue::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn bool(&self, name: &str) -> Option<bool> {
        match self.values.get(name)? {
            ArgValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Downcast a custom value to `T`.
    pub fn custom<T: Any + Send + Sync>(&self, name: &str) -> Option<&T> {
        match self.values.get(name)? {
            ArgValue::Custom { value, .. } => value.downcast_ref::<T>(),
            _ => None,
        }
    }

    /// JSON object of every bound value.
    pub fn to_json(&self) -> Value {
        let map = self
            .values
            .iter()
            .map(|(k, v)| (k.clone(), v.to_json()))
            .collect::<serde_json::Map<_, _>>();
        Value::Object(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arg_type_parses_manifest_names() {
        assert_eq!("snowflake".parse::<ArgType>().unwrap(), ArgType::Snowflake);
        assert_eq!("Integer".parse::<ArgType>().unwrap(), ArgType::Int);
        assert_eq!("str".parse::<ArgType>().unwrap(), ArgType::String);
        assert_eq!(
            "duration".parse::<ArgType>().unwrap(),
            ArgType::Custom("duration".into())
        );
    }

    #[test]
    fn test_usage_reflects_optionality_and_greed() {
        assert_eq!(ArgSpec::required("user", ArgType::Snowflake).usage(), "<user>");
        assert_eq!(ArgSpec::optional("n", ArgType::Int).usage(), "[n]");
        assert_eq!(
            ArgSpec::required("text", ArgType::String).greedy().usage(),
            "<text...>"
        );
    }

    #[test]
    fn test_default_makes_parameter_optional() {
        let spec = ArgSpec::required("sides", ArgType::Int).with_default(ArgValue::Int(6));
        assert!(spec.is_optional());
        assert_eq!(spec.default_value(), Some(&ArgValue::Int(6)));

        let raw = ArgSpec::required("sides", ArgType::Int).with_raw_default("6");
        assert!(raw.is_optional());
        assert_eq!(raw.raw_default(), Some("6"));
        assert!(raw.default_value().is_none());
    }

    #[test]
    fn test_accessors_check_variant() {
        let mut args = Arguments::new();
        args.insert("n", ArgValue::Int(3));
        args.insert("who", ArgValue::Snowflake(Snowflake(175928847299117063)));
        args.insert("dur", ArgValue::custom("5m", 300u64));

        assert_eq!(args.int("n"), Some(3));
        assert_eq!(args.str("n"), None);
        assert_eq!(args.snowflake("who"), Some(Snowflake(175928847299117063)));
        assert_eq!(args.custom::<u64>("dur"), Some(&300));
        assert_eq!(args.custom::<String>("dur"), None);

        let json = args.to_json();
        assert_eq!(json["who"], "175928847299117063");
        assert_eq!(json["dur"], "5m");
        assert_eq!(json["n"], 3);
    }
}
