//! Argument and flag parsing.
//!
//! [`ArgsParser::parse`] turns the raw tokens that follow a command name into
//! two [`ValueSet`]s, one for positionals and one for flags, according to a
//! [`CommandSpec`]. It is a single left-to-right scan with no backtracking
//! and no shared state; identical inputs always give identical outputs.
//!
//! # Grammar
//!
//! ```text
//! --name value      long flag, value in the next token
//! --name=value      long flag, inline value
//! --name            boolean long flag (no value consumed)
//! -x / -x=value     shorthand, resolved to its long name, same rules
//! --                every following token is positional
//! anything else     positional, filled in declaration order
//! ```
//!
//! After the scan, defaults are applied and required values checked. Any
//! error is terminal for the invocation.

use std::collections::{BTreeMap, HashMap};

use thiserror::Error;

use crate::duration::parse_duration;
use crate::spec::{ArgKind, ArgSpec, CommandSpec, FlagSpec};
use crate::value::{parse_bool, Value, ValueSet};

/// Errors produced while parsing a command line.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error("unknown flag: {0}")]
    UnknownFlag(String),

    #[error("flag --{0} requires a value")]
    MissingFlagValue(String),

    #[error("unexpected argument: {0}")]
    UnexpectedArgument(String),

    #[error("missing required argument: {0}")]
    MissingArgument(String),

    #[error("missing required flag: --{0}")]
    MissingFlag(String),

    #[error("invalid {kind} value \"{value}\" for {name}: {reason}")]
    InvalidValue {
        name: String,
        kind: ArgKind,
        value: String,
        reason: String,
    },

    #[error("value \"{value}\" not in enum for {name} (expected one of: {allowed})")]
    NotInEnum {
        name: String,
        value: String,
        allowed: String,
    },

    #[error("invalid command spec for {command}: {reason}")]
    InvalidSpec { command: String, reason: String },
}

/// Stateless parser for command lines.
#[derive(Debug, Clone, Copy, Default)]
pub struct ArgsParser;

/// Positional and flag values produced by a successful parse.
pub type Parsed = (ValueSet, ValueSet);

impl ArgsParser {
    pub fn new() -> Self {
        Self
    }

    /// Parses `raw` against `spec`.
    pub fn parse<S: AsRef<str>>(&self, raw: &[S], spec: &CommandSpec) -> Result<Parsed, ParseError> {
        validate_spec(spec)?;

        let flag_index: HashMap<&str, &FlagSpec> =
            spec.flags.iter().map(|f| (f.name.as_str(), f)).collect();

        let mut args: BTreeMap<String, Value> = BTreeMap::new();
        let mut flags: BTreeMap<String, Value> = BTreeMap::new();
        let mut pos_index = 0;
        let mut only_positionals = false;

        let mut i = 0;
        while i < raw.len() {
            let token = raw[i].as_ref();

            if !only_positionals && token == "--" {
                only_positionals = true;
                i += 1;
                continue;
            }

            if !only_positionals {
                if let Some(long) = token.strip_prefix("--") {
                    let (name, inline) = split_inline(long);
                    let flag = flag_index
                        .get(name)
                        .copied()
                        .ok_or_else(|| ParseError::UnknownFlag(format!("--{}", name)))?;
                    i += consume_flag(flag, inline, raw, i, &mut flags)?;
                    continue;
                }

                if token.len() > 1 && token.starts_with('-') {
                    let (alias, inline) = split_inline(&token[1..]);
                    let flag = resolve_shorthand(alias, spec)
                        .ok_or_else(|| ParseError::UnknownFlag(format!("-{}", alias)))?;
                    i += consume_flag(flag, inline, raw, i, &mut flags)?;
                    continue;
                }
            }

            match spec.args.get(pos_index) {
                Some(arg) if arg.repeatable => {
                    push_repeated(&mut args, arg, token)?;
                }
                Some(arg) => {
                    args.insert(arg.name.clone(), cast_value(&arg.name, arg.kind, token, &arg.enum_values)?);
                    pos_index += 1;
                }
                None => match spec.args.last().filter(|a| a.repeatable) {
                    Some(rest) => push_repeated(&mut args, rest, token)?,
                    None => return Err(ParseError::UnexpectedArgument(token.to_string())),
                },
            }
            i += 1;
        }

        apply_arg_defaults(&mut args, &spec.args)?;
        apply_flag_defaults(&mut flags, &spec.flags)?;

        Ok((ValueSet::new(args), ValueSet::new(flags)))
    }
}

/// Only the last positional may be repeatable.
fn validate_spec(spec: &CommandSpec) -> Result<(), ParseError> {
    let count = spec.args.len();
    if let Some(pos) = spec.args.iter().position(|a| a.repeatable) {
        if pos + 1 != count {
            return Err(ParseError::InvalidSpec {
                command: spec.name.clone(),
                reason: format!(
                    "repeatable argument {} must be the last positional",
                    spec.args[pos].name
                ),
            });
        }
    }
    Ok(())
}

fn split_inline(body: &str) -> (&str, Option<&str>) {
    match body.split_once('=') {
        Some((name, value)) => (name, Some(value)),
        None => (body, None),
    }
}

fn resolve_shorthand<'a>(alias: &str, spec: &'a CommandSpec) -> Option<&'a FlagSpec> {
    let mut chars = alias.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => spec.find_shorthand(c),
        _ => None,
    }
}

/// Stores the flag's value and returns how many tokens were consumed.
fn consume_flag<S: AsRef<str>>(
    flag: &FlagSpec,
    inline: Option<&str>,
    raw: &[S],
    pos: usize,
    flags: &mut BTreeMap<String, Value>,
) -> Result<usize, ParseError> {
    if let Some(value) = inline {
        flags.insert(flag.name.clone(), cast_value(&flag.name, flag.kind, value, &flag.enum_values)?);
        return Ok(1);
    }

    if flag.kind == ArgKind::Bool {
        flags.insert(flag.name.clone(), Value::Bool(true));
        return Ok(1);
    }

    let value = raw
        .get(pos + 1)
        .ok_or_else(|| ParseError::MissingFlagValue(flag.name.clone()))?;
    flags.insert(
        flag.name.clone(),
        cast_value(&flag.name, flag.kind, value.as_ref(), &flag.enum_values)?,
    );
    Ok(2)
}

fn push_repeated(args: &mut BTreeMap<String, Value>, arg: &ArgSpec, token: &str) -> Result<(), ParseError> {
    let value = cast_value(&arg.name, arg.kind, token, &arg.enum_values)?;
    match args
        .entry(arg.name.clone())
        .or_insert_with(|| Value::List(Vec::new()))
    {
        Value::List(items) => items.push(value),
        slot => *slot = Value::List(vec![value]),
    }
    Ok(())
}

/// Casts raw text to the declared kind.
pub fn cast_value(name: &str, kind: ArgKind, raw: &str, enum_values: &[String]) -> Result<Value, ParseError> {
    let invalid = |reason: String| ParseError::InvalidValue {
        name: name.to_string(),
        kind,
        value: raw.to_string(),
        reason,
    };

    match kind {
        ArgKind::String => Ok(Value::String(raw.to_string())),
        ArgKind::Int => raw
            .parse::<i64>()
            .map(Value::Int)
            .map_err(|e| invalid(e.to_string())),
        ArgKind::Float => raw
            .parse::<f64>()
            .map(Value::Float)
            .map_err(|e| invalid(e.to_string())),
        ArgKind::Bool => parse_bool(raw)
            .map(Value::Bool)
            .ok_or_else(|| invalid("expected a boolean literal".to_string())),
        ArgKind::Duration => parse_duration(raw)
            .map(Value::Duration)
            .map_err(|e| invalid(e.reason.to_string())),
        ArgKind::Enum => {
            if enum_values.is_empty() || enum_values.iter().any(|v| v == raw) {
                Ok(Value::String(raw.to_string()))
            } else {
                Err(ParseError::NotInEnum {
                    name: name.to_string(),
                    value: raw.to_string(),
                    allowed: enum_values.join(", "),
                })
            }
        }
        ArgKind::Json => serde_json::from_str::<serde_json::Value>(raw)
            .map(Value::Json)
            .map_err(|e| invalid(e.to_string())),
    }
}

fn apply_arg_defaults(target: &mut BTreeMap<String, Value>, specs: &[ArgSpec]) -> Result<(), ParseError> {
    for arg in specs {
        if target.contains_key(&arg.name) {
            continue;
        }
        match &arg.default {
            Some(default) => {
                target.insert(arg.name.clone(), default.clone());
            }
            None if arg.required && !arg.repeatable => {
                return Err(ParseError::MissingArgument(arg.name.clone()));
            }
            None => {}
        }
    }
    Ok(())
}

fn apply_flag_defaults(target: &mut BTreeMap<String, Value>, specs: &[FlagSpec]) -> Result<(), ParseError> {
    for flag in specs {
        if flag.hidden || target.contains_key(&flag.name) {
            continue;
        }
        match &flag.default {
            Some(default) => {
                target.insert(flag.name.clone(), default.clone());
            }
            None if flag.kind == ArgKind::Bool => {
                target.insert(flag.name.clone(), Value::Bool(false));
            }
            None if flag.required => {
                return Err(ParseError::MissingFlag(flag.name.clone()));
            }
            None => {}
        }
    }
    Ok(())
}
