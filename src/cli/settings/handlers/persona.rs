//! Handler for the persona used by new conversations.

use crate::cli::settings::error::SettingError;
use crate::cli::settings::helpers::{mutate_config_with_message, success_set, success_unset};
use crate::cli::settings::{SetContext, SettingHandler};
use crate::core::config::data::Config;
use crate::core::persona::Persona;

/// Handler for the `default-persona` setting.
pub struct DefaultPersonaHandler;

impl SettingHandler for DefaultPersonaHandler {
    fn key(&self) -> &'static str {
        "default-persona"
    }

    fn set(&self, args: &[String], ctx: &mut SetContext<'_>) -> Result<String, SettingError> {
        if args.is_empty() {
            return Err(SettingError::MissingArgs {
                hint: "To set a default persona, specify its id:",
                example: "ggufchat set default-persona pirate",
            });
        }

        let input = args.join(" ");
        let persona = Persona::from_id(&input).ok_or_else(|| SettingError::UnknownPersona {
            input: input.clone(),
            available: Persona::ALL
                .iter()
                .map(|p| p.id())
                .collect::<Vec<_>>()
                .join(", "),
        })?;
        let id = persona.id().to_string();

        mutate_config_with_message(
            ctx.orchestrator,
            move |config| {
                config.default_persona = Some(id);
                Ok(())
            },
            success_set("default-persona", persona.id()),
        )
    }

    fn unset(&self, ctx: &mut SetContext<'_>) -> Result<String, SettingError> {
        mutate_config_with_message(
            ctx.orchestrator,
            |config| {
                config.default_persona = None;
                Ok(())
            },
            success_unset("default-persona"),
        )
    }

    fn format(&self, config: &Config) -> String {
        match &config.default_persona {
            Some(id) => format!("  default-persona: {id}"),
            None => "  default-persona: (unset)".to_string(),
        }
    }
}
