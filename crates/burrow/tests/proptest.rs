//! Property-based tests for the argument parser.

use std::time::Duration;

use burrow::{ArgKind, ArgSpec, ArgsParser, CommandSpec, ContextError, ContextManager, ContextSpec};
use burrow::{CommandRegistry, FlagSpec, Value};
use proptest::prelude::*;
use std::sync::Arc;

fn deploy_spec() -> CommandSpec {
    CommandSpec::new("deploy")
        .arg(ArgSpec::new("target", ArgKind::String).required())
        .arg(ArgSpec::new("tags", ArgKind::String).repeatable())
        .flag(FlagSpec::new("count", ArgKind::Int).short('c'))
        .flag(FlagSpec::new("ratio", ArgKind::Float))
        .flag(FlagSpec::new("wait", ArgKind::Duration))
        .flag(FlagSpec::new("force", ArgKind::Bool).short('f'))
        .flag(FlagSpec::new("name", ArgKind::String))
}

fn word() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9]{0,8}"
}

/// Tokens for a deploy invocation, with flags in the spaced form.
fn invocation() -> impl Strategy<Value = Vec<String>> {
    (
        word(),
        prop::collection::vec(word(), 0..4),
        any::<i64>(),
        -1.0e6f64..1.0e6,
        0u64..10_000_000,
        any::<bool>(),
        word(),
    )
        .prop_map(|(target, tags, count, ratio, wait_ms, force, name)| {
            let mut tokens = vec![target];
            tokens.push(format!("--count={}", count));
            tokens.push("--ratio".to_string());
            tokens.push(ratio.to_string());
            tokens.push("--wait".to_string());
            tokens.push(format!("{}ms", wait_ms));
            if force {
                tokens.push("-f".to_string());
            }
            tokens.push("--name".to_string());
            tokens.push(name);
            tokens.extend(tags);
            tokens
        })
}

proptest! {
    /// Same tokens, same outcome.
    #[test]
    fn parse_is_deterministic(tokens in prop::collection::vec("[-a-z0-9=]{0,6}", 0..8)) {
        let parser = ArgsParser::new();
        let spec = deploy_spec();
        prop_assert_eq!(parser.parse(&tokens, &spec), parser.parse(&tokens, &spec));
    }

    /// Rebuilding flags as `--name=value` tokens reproduces the same values.
    #[test]
    fn flags_survive_reconstruction(tokens in invocation()) {
        let parser = ArgsParser::new();
        let spec = deploy_spec();
        let (args, flags) = parser.parse(&tokens, &spec).unwrap();

        let mut rebuilt = vec![args.string("target")];
        rebuilt.extend(flags.iter().map(|(name, value)| format!("--{}={}", name, value)));
        rebuilt.extend(args.strings("tags"));

        let (args_again, flags_again) = parser.parse(&rebuilt, &spec).unwrap();
        prop_assert_eq!(flags, flags_again);
        prop_assert_eq!(args, args_again);
    }

    /// A trailing repeatable slot absorbs every remaining positional.
    #[test]
    fn repeatable_absorbs_tail(tags in prop::collection::vec(word(), 1..10)) {
        let spec = CommandSpec::new("tag").arg(ArgSpec::new("tag", ArgKind::String).repeatable());
        let (args, _) = ArgsParser::new().parse(&tags, &spec).unwrap();
        prop_assert_eq!(args.strings("tag"), tags);
    }

    #[test]
    fn int_flag_forms_agree(n in any::<i64>()) {
        let spec = CommandSpec::new("n").flag(FlagSpec::new("count", ArgKind::Int));
        let parser = ArgsParser::new();
        let inline = vec![format!("--count={}", n)];
        let spaced = vec!["--count".to_string(), n.to_string()];
        let (_, a) = parser.parse(&inline, &spec).unwrap();
        let (_, b) = parser.parse(&spaced, &spec).unwrap();
        prop_assert_eq!(a.raw("count"), Some(&Value::Int(n)));
        prop_assert_eq!(a, b);
    }

    #[test]
    fn duration_flag_round_trips(nanos in 0u64..(48 * 3600 * 1_000_000_000)) {
        let spec = CommandSpec::new("d").flag(FlagSpec::new("wait", ArgKind::Duration));
        let literal = burrow::format_duration(Duration::from_nanos(nanos));
        let (_, flags) = ArgsParser::new().parse(&[format!("--wait={}", literal)], &spec).unwrap();
        prop_assert_eq!(flags.duration("wait"), Duration::from_nanos(nanos));
    }

    /// Any mix of pushes and pops keeps root at the bottom, and pop_to_root
    /// always leaves exactly the root frame.
    #[test]
    fn stack_keeps_root(ops in prop::collection::vec(any::<bool>(), 0..30)) {
        let registry = Arc::new(CommandRegistry::new());
        registry.register_context(ContextSpec::new("servers"));
        let contexts = ContextManager::new(registry);

        for push in ops {
            let before = contexts.depth();
            if push {
                contexts.push("servers", None).unwrap();
                prop_assert_eq!(contexts.depth(), before + 1);
            } else if before == 1 {
                prop_assert_eq!(contexts.pop(), Err(ContextError::AtRoot));
                prop_assert_eq!(contexts.depth(), 1);
            } else {
                contexts.pop().unwrap();
            }
            prop_assert!(contexts.stack()[0].is_root());
        }

        contexts.pop_to_root();
        prop_assert_eq!(contexts.depth(), 1);
        prop_assert!(contexts.current().is_root());
    }
}
