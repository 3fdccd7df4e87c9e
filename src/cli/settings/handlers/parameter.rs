//! Handlers for the default generation and model-load parameters.

use crate::cli::settings::error::SettingError;
use crate::cli::settings::helpers::{mutate_config_with_message, success_set};
use crate::cli::settings::{SetContext, SettingHandler};
use crate::core::config::data::Config;
use crate::core::generation::{GenerationSettings, ModelParams};

/// Handler for one parameter, keyed by its dashed name (`max-tokens`).
pub struct ParameterHandler {
    key: &'static str,
    param: &'static str,
}

impl ParameterHandler {
    fn is_load_param(&self) -> bool {
        ModelParams::is_param(self.param)
    }

    fn current_value(&self, config: &Config) -> String {
        if self.is_load_param() {
            load_param_value(&config.model_params, self.param)
        } else {
            generation_value(&config.generation, self.param)
        }
    }

    fn default_value(&self) -> String {
        if self.is_load_param() {
            load_param_value(&ModelParams::default(), self.param)
        } else {
            generation_value(&GenerationSettings::default(), self.param)
        }
    }

    fn apply(&self, config: &mut Config, value: &str) -> Result<(), SettingError> {
        let result = if self.is_load_param() {
            config.model_params.set(self.param, value)
        } else {
            config.generation.set(self.param, value)
        };
        result.map_err(|err| SettingError::InvalidValue {
            key: self.key,
            message: err.to_string(),
        })
    }
}

fn generation_value(settings: &GenerationSettings, param: &str) -> String {
    settings
        .to_pairs()
        .into_iter()
        .find(|(name, _)| *name == param)
        .map(|(_, value)| value)
        .unwrap_or_default()
}

fn load_param_value(params: &ModelParams, param: &str) -> String {
    match param {
        "n_ctx" => params.n_ctx.to_string(),
        "n_batch" => params.n_batch.to_string(),
        "n_gpu_layers" => params.n_gpu_layers.to_string(),
        "n_threads" => params
            .n_threads
            .map(|n| n.to_string())
            .unwrap_or_else(|| "auto".to_string()),
        _ => String::new(),
    }
}

impl SettingHandler for ParameterHandler {
    fn key(&self) -> &'static str {
        self.key
    }

    fn set(&self, args: &[String], ctx: &mut SetContext<'_>) -> Result<String, SettingError> {
        let value = args.join(" ");
        if value.trim().is_empty() && self.param != "stop" {
            return Err(SettingError::MissingArgs {
                hint: "Specify a value for the parameter:",
                example: "ggufchat set temperature 0.8",
            });
        }

        let mut candidate = ctx.config.clone();
        self.apply(&mut candidate, &value)?;
        let display = self.current_value(&candidate);

        let key = self.key;
        let param = self.param;
        let load = self.is_load_param();
        mutate_config_with_message(
            ctx.orchestrator,
            move |config| {
                let result = if load {
                    config.model_params.set(param, &value)
                } else {
                    config.generation.set(param, &value)
                };
                result.map_err(|err| err.into())
            },
            success_set(key, &display),
        )
    }

    fn unset(&self, ctx: &mut SetContext<'_>) -> Result<String, SettingError> {
        let default = self.default_value();
        let param = self.param;
        let load = self.is_load_param();
        let message = format!("✅ Reset {} to default: {default}", self.key);
        mutate_config_with_message(
            ctx.orchestrator,
            move |config| {
                let result = if load {
                    config.model_params.set(param, &default)
                } else {
                    config.generation.set(param, &default)
                };
                result.map_err(|err| err.into())
            },
            message,
        )
    }

    fn format(&self, config: &Config) -> String {
        format!("  {}: {}", self.key, self.current_value(config))
    }
}

/// One handler per generation and load parameter.
pub fn parameter_handlers() -> Vec<ParameterHandler> {
    const KEYS: [(&str, &str); 12] = [
        ("temperature", "temperature"),
        ("max-tokens", "max_tokens"),
        ("top-p", "top_p"),
        ("top-k", "top_k"),
        ("repeat-penalty", "repeat_penalty"),
        ("frequency-penalty", "frequency_penalty"),
        ("presence-penalty", "presence_penalty"),
        ("stop", "stop"),
        ("n-ctx", "n_ctx"),
        ("n-batch", "n_batch"),
        ("n-gpu-layers", "n_gpu_layers"),
        ("n-threads", "n_threads"),
    ];
    KEYS.iter()
        .map(|&(key, param)| ParameterHandler { key, param })
        .collect()
}
