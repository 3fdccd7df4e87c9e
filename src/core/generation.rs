//! Sampling and model-load parameters passed to the inference engine.

use serde::{Deserialize, Serialize};
use std::fmt;

pub const DEFAULT_STOP_SEQUENCES: [&str; 4] = ["User:", "USER:", "<|user|>", "<|im_end|>"];

/// Parameters a style preset can pin down.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingParams {
    pub temperature: f64,
    pub max_tokens: u32,
    pub top_p: f64,
    pub top_k: u32,
    pub repeat_penalty: f64,
    pub frequency_penalty: f64,
    pub presence_penalty: f64,
}

impl Default for SamplingParams {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_tokens: 512,
            top_p: 0.95,
            top_k: 40,
            repeat_penalty: 1.1,
            frequency_penalty: 0.0,
            presence_penalty: 0.0,
        }
    }
}

/// Everything sent alongside a prompt. Serialized as a flat
/// parameter-name to value mapping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationSettings {
    #[serde(flatten)]
    pub sampling: SamplingParams,
    pub stop: Vec<String>,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            sampling: SamplingParams::default(),
            stop: DEFAULT_STOP_SEQUENCES
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

/// Errors raised when a parameter is set by name.
#[derive(Debug, PartialEq)]
pub enum ParamError {
    /// No parameter with this name exists.
    UnknownParam(String),

    /// The value could not be parsed for this parameter.
    InvalidValue { name: &'static str, value: String },

    /// The value parsed but lies outside the accepted range.
    OutOfRange {
        name: &'static str,
        value: String,
        range: &'static str,
    },
}

impl fmt::Display for ParamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamError::UnknownParam(name) => write!(
                f,
                "Unknown parameter '{name}'. Known parameters: {}, {}",
                GenerationSettings::PARAM_NAMES.join(", "),
                ModelParams::PARAM_NAMES.join(", ")
            ),
            ParamError::InvalidValue { name, value } => {
                write!(f, "Invalid value for {name}: {value}")
            }
            ParamError::OutOfRange { name, value, range } => {
                write!(f, "{name} must be within {range} (got {value})")
            }
        }
    }
}

impl std::error::Error for ParamError {}

fn parse_float(
    name: &'static str,
    value: &str,
    min: f64,
    max: f64,
    range: &'static str,
) -> Result<f64, ParamError> {
    let parsed: f64 = value.trim().parse().map_err(|_| ParamError::InvalidValue {
        name,
        value: value.to_string(),
    })?;
    if !parsed.is_finite() || parsed < min || parsed > max {
        return Err(ParamError::OutOfRange {
            name,
            value: value.to_string(),
            range,
        });
    }
    Ok(parsed)
}

fn parse_int(
    name: &'static str,
    value: &str,
    min: u32,
    max: u32,
    range: &'static str,
) -> Result<u32, ParamError> {
    let parsed: u32 = value.trim().parse().map_err(|_| ParamError::InvalidValue {
        name,
        value: value.to_string(),
    })?;
    if parsed < min || parsed > max {
        return Err(ParamError::OutOfRange {
            name,
            value: value.to_string(),
            range,
        });
    }
    Ok(parsed)
}

impl GenerationSettings {
    pub const PARAM_NAMES: [&'static str; 8] = [
        "temperature",
        "max_tokens",
        "top_p",
        "top_k",
        "repeat_penalty",
        "frequency_penalty",
        "presence_penalty",
        "stop",
    ];

    /// Update a single parameter from its textual form.
    ///
    /// `stop` takes a comma-separated list; an empty value clears it.
    pub fn set(&mut self, name: &str, value: &str) -> Result<(), ParamError> {
        let sampling = &mut self.sampling;
        match name.trim().replace('-', "_").as_str() {
            "temperature" | "temp" => {
                sampling.temperature = parse_float("temperature", value, 0.0, 2.0, "0.0..=2.0")?;
            }
            "max_tokens" => {
                sampling.max_tokens = parse_int("max_tokens", value, 1, 8192, "1..=8192")?;
            }
            "top_p" => {
                sampling.top_p = parse_float("top_p", value, 0.0, 1.0, "0.0..=1.0")?;
            }
            "top_k" => {
                sampling.top_k = parse_int("top_k", value, 0, 1000, "0..=1000")?;
            }
            "repeat_penalty" => {
                sampling.repeat_penalty =
                    parse_float("repeat_penalty", value, 0.0, 2.0, "0.0..=2.0")?;
            }
            "frequency_penalty" => {
                sampling.frequency_penalty =
                    parse_float("frequency_penalty", value, -2.0, 2.0, "-2.0..=2.0")?;
            }
            "presence_penalty" => {
                sampling.presence_penalty =
                    parse_float("presence_penalty", value, -2.0, 2.0, "-2.0..=2.0")?;
            }
            "stop" => {
                self.stop = value
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect();
            }
            _ => return Err(ParamError::UnknownParam(name.to_string())),
        }
        Ok(())
    }

    /// `(name, value)` pairs in display order
    pub fn to_pairs(&self) -> Vec<(&'static str, String)> {
        let s = &self.sampling;
        vec![
            ("temperature", s.temperature.to_string()),
            ("max_tokens", s.max_tokens.to_string()),
            ("top_p", s.top_p.to_string()),
            ("top_k", s.top_k.to_string()),
            ("repeat_penalty", s.repeat_penalty.to_string()),
            ("frequency_penalty", s.frequency_penalty.to_string()),
            ("presence_penalty", s.presence_penalty.to_string()),
            ("stop", self.stop.join(", ")),
        ]
    }
}

/// Load-time parameters for the inference engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelParams {
    pub n_ctx: u32,
    pub n_batch: u32,
    /// Layers offloaded to the GPU; -1 offloads everything.
    pub n_gpu_layers: i32,
    /// Engine default when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub n_threads: Option<u32>,
}

impl Default for ModelParams {
    fn default() -> Self {
        Self {
            n_ctx: 2048,
            n_batch: 512,
            n_gpu_layers: 0,
            n_threads: None,
        }
    }
}

impl ModelParams {
    pub const PARAM_NAMES: [&'static str; 4] = ["n_ctx", "n_batch", "n_gpu_layers", "n_threads"];

    pub fn is_param(name: &str) -> bool {
        let normalized = name.trim().replace('-', "_");
        Self::PARAM_NAMES.contains(&normalized.as_str())
    }

    /// Update a single load parameter. Takes effect on the next model load.
    ///
    /// `n_threads` accepts `auto` (or an empty value) to use the engine default.
    pub fn set(&mut self, name: &str, value: &str) -> Result<(), ParamError> {
        match name.trim().replace('-', "_").as_str() {
            "n_ctx" => self.n_ctx = parse_int("n_ctx", value, 128, 1_048_576, "128..=1048576")?,
            "n_batch" => self.n_batch = parse_int("n_batch", value, 1, 65_536, "1..=65536")?,
            "n_gpu_layers" => {
                let parsed: i32 = value.trim().parse().map_err(|_| ParamError::InvalidValue {
                    name: "n_gpu_layers",
                    value: value.to_string(),
                })?;
                if !(-1..=10_000).contains(&parsed) {
                    return Err(ParamError::OutOfRange {
                        name: "n_gpu_layers",
                        value: value.to_string(),
                        range: "-1..=10000",
                    });
                }
                self.n_gpu_layers = parsed;
            }
            "n_threads" => {
                let trimmed = value.trim();
                self.n_threads = if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("auto") {
                    None
                } else {
                    Some(parse_int("n_threads", trimmed, 1, 1024, "1..=1024")?)
                };
            }
            _ => return Err(ParamError::UnknownParam(name.to_string())),
        }
        Ok(())
    }
}

impl fmt::Display for ModelParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "n_ctx: {}, n_batch: {}, n_gpu_layers: {}",
            self.n_ctx, self.n_batch, self.n_gpu_layers
        )?;
        if let Some(threads) = self.n_threads {
            write!(f, ", n_threads: {threads}")?;
        }
        Ok(())
    }
}
