//! Help and listing text.

use crate::output::OutputChannel;
use crate::registry::CommandRegistry;
use crate::spec::{format_usage, ArgKind, CommandSpec};

/// The `help` listing for `context`.
pub(crate) fn render_help(out: &OutputChannel, registry: &CommandRegistry, context: &str, header: &str) {
    out.info(header);

    if context.is_empty() {
        let contexts = registry.contexts(false);
        if !contexts.is_empty() {
            out.info("Contexts:");
            for ctx in &contexts {
                out.info(format!("  {:<15} {}", ctx.name, ctx.description));
            }
        }
        let globals = registry.commands("", false);
        if !globals.is_empty() {
            out.info("\nGlobal Commands:");
            for cmd in &globals {
                out.info(format!("  {:<20} {}", cmd.name, cmd.summary));
            }
        }
        out.info("\nType a context name to enter it or 'ctx goto <name>'.");
        return;
    }

    let commands = registry.commands(context, false);
    if commands.is_empty() {
        out.info(format!("No commands registered for context {}", context));
        return;
    }
    out.info(format!("Commands in {}:", context));
    for cmd in &commands {
        out.info(format!("  {:<20} {}", cmd.name, cmd.summary));
    }
}

/// The `contexts` listing.
pub(crate) fn list_contexts(out: &OutputChannel, registry: &CommandRegistry) {
    let contexts = registry.contexts(false);
    if contexts.is_empty() {
        out.info("No contexts registered.");
        return;
    }
    out.info("Contexts:");
    for ctx in &contexts {
        out.info(format!("  {:<15} {}", ctx.name, ctx.description));
    }
}

/// Detailed help for one command.
pub(crate) fn render_command_help(out: &OutputChannel, spec: &CommandSpec) {
    out.info(format!("Usage: {}", format_usage(spec)));

    let about = if spec.description.is_empty() {
        &spec.summary
    } else {
        &spec.description
    };
    if !about.is_empty() {
        out.info(format!("\n{}", about));
    }

    if !spec.args.is_empty() {
        out.info("\nArguments:");
        for arg in &spec.args {
            let mut traits = vec![kind_label(arg.kind, &arg.enum_values)];
            if arg.required {
                traits.push("required".to_string());
            }
            if arg.repeatable {
                traits.push("repeatable".to_string());
            }
            if let Some(default) = &arg.default {
                traits.push(format!("default: {}", default));
            }
            out.info(format!(
                "  {:<20} {} ({})",
                arg.name,
                arg.description,
                traits.join(", ")
            ));
        }
    }

    let flags: Vec<_> = spec.flags.iter().filter(|f| !f.hidden).collect();
    if !flags.is_empty() {
        out.info("\nFlags:");
        for flag in flags {
            let name = match flag.shorthand {
                Some(short) => format!("-{}, --{}", short, flag.name),
                None => format!("    --{}", flag.name),
            };
            let mut traits = vec![kind_label(flag.kind, &flag.enum_values)];
            if flag.required {
                traits.push("required".to_string());
            }
            if let Some(default) = &flag.default {
                traits.push(format!("default: {}", default));
            }
            out.info(format!(
                "  {:<20} {} ({})",
                name,
                flag.description,
                traits.join(", ")
            ));
        }
    }

    if !spec.examples.is_empty() {
        out.info("\nExamples:");
        for example in &spec.examples {
            out.info(format!("  {:<20} {}", example.command, example.description));
        }
    }
}

fn kind_label(kind: ArgKind, enum_values: &[String]) -> String {
    if kind == ArgKind::Enum && !enum_values.is_empty() {
        format!("one of: {}", enum_values.join("|"))
    } else {
        kind.to_string()
    }
}
