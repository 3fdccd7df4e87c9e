use super::CommandResult;
use crate::core::app::App;

pub type CommandHandler = fn(&mut App, CommandInvocation<'_>) -> CommandResult;

pub struct CommandUsage {
    pub syntax: &'static str,
    pub description: &'static str,
}

pub struct Command {
    pub name: &'static str,
    pub aliases: &'static [&'static str],
    pub usages: &'static [CommandUsage],
    pub handler: CommandHandler,
}

#[derive(Clone, Copy)]
pub struct CommandInvocation<'a> {
    pub input: &'a str,
    pub args: &'a str,
}

impl<'a> CommandInvocation<'a> {
    pub fn arg_tokens(&self) -> Vec<&'a str> {
        self.args.split_whitespace().collect()
    }
}

pub fn all_commands() -> &'static [Command] {
    COMMANDS
}

pub fn find_command(name: &str) -> Option<&'static Command> {
    all_commands().iter().find(|command| {
        command.name.eq_ignore_ascii_case(name)
            || command
                .aliases
                .iter()
                .any(|alias| alias.eq_ignore_ascii_case(name))
    })
}

/// Commands whose name starts with `prefix`, for suggestions on typos.
pub fn matching_commands(prefix: &str) -> Vec<&'static str> {
    let prefix = prefix.to_ascii_lowercase();
    all_commands()
        .iter()
        .filter(|command| command.name.starts_with(&prefix))
        .map(|command| command.name)
        .collect()
}

const COMMANDS: &[Command] = &[
    Command {
        name: "help",
        aliases: &["?"],
        usages: &[CommandUsage {
            syntax: "/help",
            description: "Show available commands",
        }],
        handler: super::handle_help,
    },
    Command {
        name: "load-model",
        aliases: &["load_model", "model"],
        usages: &[CommandUsage {
            syntax: "/load-model <path>",
            description: "Start the inference server with a GGUF model",
        }],
        handler: super::handle_load_model,
    },
    Command {
        name: "eject",
        aliases: &["unload"],
        usages: &[CommandUsage {
            syntax: "/eject",
            description: "Stop the inference server and free the model",
        }],
        handler: super::handle_eject,
    },
    Command {
        name: "models",
        aliases: &[],
        usages: &[CommandUsage {
            syntax: "/models",
            description: "List GGUF files in the models directory",
        }],
        handler: super::handle_models,
    },
    Command {
        name: "info",
        aliases: &["status"],
        usages: &[CommandUsage {
            syntax: "/info",
            description: "Show model, persona and generation settings",
        }],
        handler: super::handle_info,
    },
    Command {
        name: "persona",
        aliases: &[],
        usages: &[
            CommandUsage {
                syntax: "/persona",
                description: "List personas",
            },
            CommandUsage {
                syntax: "/persona <id|none>",
                description: "Select a persona, or clear it",
            },
        ],
        handler: super::handle_persona,
    },
    Command {
        name: "roleplay",
        aliases: &[],
        usages: &[CommandUsage {
            syntax: "/roleplay [on|off]",
            description: "Apply the persona's instructions to prompts",
        }],
        handler: super::handle_roleplay,
    },
    Command {
        name: "set",
        aliases: &[],
        usages: &[
            CommandUsage {
                syntax: "/set",
                description: "Show generation and load parameters",
            },
            CommandUsage {
                syntax: "/set <param> <value>",
                description: "Change a parameter (e.g. /set temperature 0.9)",
            },
        ],
        handler: super::handle_set,
    },
    Command {
        name: "preset",
        aliases: &["presets"],
        usages: &[
            CommandUsage {
                syntax: "/preset",
                description: "List style presets",
            },
            CommandUsage {
                syntax: "/preset <id>",
                description: "Apply a style preset",
            },
            CommandUsage {
                syntax: "/preset save <name>",
                description: "Save the current settings as a preset",
            },
            CommandUsage {
                syntax: "/preset delete <id>",
                description: "Delete a user preset",
            },
        ],
        handler: super::handle_preset,
    },
    Command {
        name: "save",
        aliases: &[],
        usages: &[CommandUsage {
            syntax: "/save [name]",
            description: "Save the conversation and its settings",
        }],
        handler: super::handle_save,
    },
    Command {
        name: "load",
        aliases: &[],
        usages: &[CommandUsage {
            syntax: "/load <name>",
            description: "Load a saved session",
        }],
        handler: super::handle_load,
    },
    Command {
        name: "sessions",
        aliases: &[],
        usages: &[CommandUsage {
            syntax: "/sessions",
            description: "List saved sessions",
        }],
        handler: super::handle_sessions,
    },
    Command {
        name: "delete",
        aliases: &[],
        usages: &[CommandUsage {
            syntax: "/delete <name>",
            description: "Delete a saved session",
        }],
        handler: super::handle_delete,
    },
    Command {
        name: "clear",
        aliases: &[],
        usages: &[CommandUsage {
            syntax: "/clear",
            description: "Clear the transcript, keeping settings",
        }],
        handler: super::handle_clear,
    },
    Command {
        name: "log",
        aliases: &[],
        usages: &[
            CommandUsage {
                syntax: "/log <filename>",
                description: "Append the transcript to a file",
            },
            CommandUsage {
                syntax: "/log",
                description: "Pause or resume logging",
            },
        ],
        handler: super::handle_log,
    },
    Command {
        name: "quit",
        aliases: &["exit", "q"],
        usages: &[CommandUsage {
            syntax: "/quit",
            description: "Unload the model and exit",
        }],
        handler: super::handle_quit,
    },
];
