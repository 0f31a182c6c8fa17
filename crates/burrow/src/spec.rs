//! Declarative metadata for contexts, commands, arguments and flags.
//!
//! These are plain records. Nothing in here executes; the registry stores
//! them, the parser reads them, and help rendering formats them.
//!
//! All specs use a consuming builder style so registrations read top-down:
//!
//! ```rust
//! use burrow::{ArgKind, ArgSpec, CommandSpec, FlagSpec};
//!
//! let spec = CommandSpec::new("list")
//!     .context("servers")
//!     .alias("ls")
//!     .summary("List servers")
//!     .arg(ArgSpec::new("filter", ArgKind::String))
//!     .flag(FlagSpec::new("verbose", ArgKind::Bool).short('v'));
//!
//! assert_eq!(spec.aliases, vec!["ls"]);
//! ```

use std::fmt;
use std::time::Duration;

use crate::value::Value;

/// Metadata describing a navigable context.
///
/// The root context has the empty name and always exists.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContextSpec {
    pub name: String,
    pub parent: String,
    pub description: String,
    /// Prompt template. `{base}` and `{context}` are substituted.
    pub prompt: String,
    pub aliases: Vec<String>,
    pub tags: Vec<String>,
    pub hidden: bool,
}

impl ContextSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// The root context spec.
    pub fn root() -> Self {
        Self {
            prompt: "> ".into(),
            ..Default::default()
        }
    }

    pub fn is_root(&self) -> bool {
        self.name.is_empty()
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = parent.into();
        self
    }

    pub fn prompt(mut self, template: impl Into<String>) -> Self {
        self.prompt = template.into();
        self
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into());
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn hidden(mut self, hidden: bool) -> Self {
        self.hidden = hidden;
        self
    }
}

/// Supported value kinds for arguments and flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ArgKind {
    #[default]
    String,
    Int,
    Float,
    Bool,
    Duration,
    Enum,
    Json,
}

impl fmt::Display for ArgKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ArgKind::String => "string",
            ArgKind::Int => "int",
            ArgKind::Float => "float",
            ArgKind::Bool => "bool",
            ArgKind::Duration => "duration",
            ArgKind::Enum => "enum",
            ArgKind::Json => "json",
        };
        f.write_str(name)
    }
}

/// A positional argument.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArgSpec {
    pub name: String,
    pub kind: ArgKind,
    pub required: bool,
    /// Only valid on the last positional argument.
    pub repeatable: bool,
    pub description: String,
    pub default: Option<Value>,
    pub enum_values: Vec<String>,
}

impl ArgSpec {
    pub fn new(name: impl Into<String>, kind: ArgKind) -> Self {
        Self {
            name: name.into(),
            kind,
            ..Default::default()
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn repeatable(mut self) -> Self {
        self.repeatable = true;
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn one_of<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.enum_values = values.into_iter().map(Into::into).collect();
        self
    }
}

/// A named flag, optionally with a single-character shorthand.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlagSpec {
    pub name: String,
    pub shorthand: Option<char>,
    pub kind: ArgKind,
    pub required: bool,
    pub description: String,
    pub default: Option<Value>,
    pub enum_values: Vec<String>,
    /// Hidden flags never receive defaults and are left out of help.
    pub hidden: bool,
}

impl FlagSpec {
    pub fn new(name: impl Into<String>, kind: ArgKind) -> Self {
        Self {
            name: name.into(),
            kind,
            ..Default::default()
        }
    }

    pub fn short(mut self, shorthand: char) -> Self {
        self.shorthand = Some(shorthand);
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn one_of<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.enum_values = values.into_iter().map(Into::into).collect();
        self
    }
}

/// A documented example invocation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Example {
    pub description: String,
    pub command: String,
}

/// Metadata describing a command: identity, arguments and flags.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommandSpec {
    pub name: String,
    pub aliases: Vec<String>,
    pub summary: String,
    pub description: String,
    pub examples: Vec<Example>,
    pub args: Vec<ArgSpec>,
    pub flags: Vec<FlagSpec>,
    pub hidden: bool,
    pub tags: Vec<String>,
    pub category: String,
    /// Owning context name; empty for root.
    pub context: String,
    /// Overrides the generated usage line.
    pub usage: Option<String>,
    /// Whether pipeline data returned by this command is forwarded to the
    /// next active context frame.
    pub allows_pipeline: bool,
    /// Upper bound for the invocation's cancellation scope.
    pub timeout: Option<Duration>,
}

impl CommandSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn context(mut self, context: impl Into<String>) -> Self {
        self.context = context.into();
        self
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into());
        self
    }

    pub fn summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = summary.into();
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn example(mut self, description: impl Into<String>, command: impl Into<String>) -> Self {
        self.examples.push(Example {
            description: description.into(),
            command: command.into(),
        });
        self
    }

    pub fn arg(mut self, arg: ArgSpec) -> Self {
        self.args.push(arg);
        self
    }

    pub fn flag(mut self, flag: FlagSpec) -> Self {
        self.flags.push(flag);
        self
    }

    pub fn hidden(mut self, hidden: bool) -> Self {
        self.hidden = hidden;
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    pub fn usage(mut self, usage: impl Into<String>) -> Self {
        self.usage = Some(usage.into());
        self
    }

    pub fn allows_pipeline(mut self, allows: bool) -> Self {
        self.allows_pipeline = allows;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Looks up a flag by its long name.
    pub fn find_flag(&self, name: &str) -> Option<&FlagSpec> {
        self.flags.iter().find(|f| f.name == name)
    }

    /// Looks up a flag by its shorthand character.
    pub fn find_shorthand(&self, shorthand: char) -> Option<&FlagSpec> {
        self.flags.iter().find(|f| f.shorthand == Some(shorthand))
    }
}

/// Renders a one-line usage string.
///
/// A declared [`CommandSpec::usage`] wins. Otherwise the line is generated:
/// `deploy (aka d) <TARGET> [TAGS...] [flags]`.
pub fn format_usage(spec: &CommandSpec) -> String {
    if let Some(usage) = &spec.usage {
        return usage.clone();
    }

    let mut out = spec.name.clone();
    if !spec.aliases.is_empty() {
        out.push_str(" (aka ");
        out.push_str(&spec.aliases.join(", "));
        out.push(')');
    }

    for arg in &spec.args {
        let mut name = arg.name.to_uppercase();
        if arg.repeatable {
            name.push_str("...");
        }
        if arg.required {
            out.push_str(&format!(" <{}>", name));
        } else {
            out.push_str(&format!(" [{}]", name));
        }
    }

    if !spec.flags.is_empty() {
        out.push_str(" [flags]");
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_usage_full() {
        let spec = CommandSpec::new("deploy")
            .alias("d")
            .alias("ship")
            .arg(ArgSpec::new("target", ArgKind::String).required())
            .arg(ArgSpec::new("tags", ArgKind::String).repeatable())
            .flag(FlagSpec::new("force", ArgKind::Bool));

        assert_eq!(
            format_usage(&spec),
            "deploy (aka d, ship) <TARGET> [TAGS...] [flags]"
        );
    }

    #[test]
    fn test_format_usage_bare() {
        assert_eq!(format_usage(&CommandSpec::new("status")), "status");
    }

    #[test]
    fn test_format_usage_override() {
        let spec = CommandSpec::new("x").usage("x <anything>");
        assert_eq!(format_usage(&spec), "x <anything>");
    }

    #[test]
    fn test_arg_kind_display() {
        assert_eq!(ArgKind::Duration.to_string(), "duration");
        assert_eq!(ArgKind::default(), ArgKind::String);
    }

    #[test]
    fn test_find_flags() {
        let spec = CommandSpec::new("list")
            .flag(FlagSpec::new("verbose", ArgKind::Bool).short('v'))
            .flag(FlagSpec::new("limit", ArgKind::Int));

        assert_eq!(spec.find_flag("limit").map(|f| f.kind), Some(ArgKind::Int));
        assert_eq!(
            spec.find_shorthand('v').map(|f| f.name.as_str()),
            Some("verbose")
        );
        assert!(spec.find_shorthand('x').is_none());
    }

    #[test]
    fn test_root_context() {
        let root = ContextSpec::root();
        assert!(root.is_root());
        assert_eq!(root.prompt, "> ");
    }
}
