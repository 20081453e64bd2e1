use std::env;
use std::path::PathBuf;

use config::{Config, Environment};
use serde::Deserialize;
use skiff::config::AgentConfig;
use skiff::providers::{
    configs::{
        AnthropicProviderConfig, GeminiProviderConfig, OpenAiProviderConfig, ProviderConfig,
    },
    factory::ProviderType,
};

use crate::error::{to_env_var, ConfigError};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase", tag = "type")]
pub enum ProviderSettings {
    Anthropic {
        #[serde(default = "default_anthropic_host")]
        host: String,
        #[serde(default)]
        api_key: Option<String>,
        #[serde(default = "default_anthropic_model")]
        model: String,
        #[serde(default)]
        temperature: Option<f32>,
    },
    OpenAi {
        #[serde(default = "default_openai_host")]
        host: String,
        #[serde(default)]
        api_key: Option<String>,
        #[serde(default = "default_openai_model")]
        model: String,
        #[serde(default)]
        temperature: Option<f32>,
    },
    Gemini {
        #[serde(default = "default_gemini_host")]
        host: String,
        #[serde(default)]
        api_key: Option<String>,
        #[serde(default = "default_gemini_model")]
        model: String,
        #[serde(default)]
        temperature: Option<f32>,
    },
}

impl ProviderSettings {
    pub fn provider_type(&self) -> ProviderType {
        match self {
            ProviderSettings::Anthropic { .. } => ProviderType::Anthropic,
            ProviderSettings::OpenAi { .. } => ProviderType::OpenAi,
            ProviderSettings::Gemini { .. } => ProviderType::Gemini,
        }
    }

    /// Convert to the skiff ProviderConfig. A missing api key falls back to
    /// the vendor's conventional variable, e.g. ANTHROPIC_API_KEY.
    pub fn into_config(self) -> Result<ProviderConfig, ConfigError> {
        let fallback = vendor_key_var(self.provider_type());
        let resolve = |api_key: Option<String>| {
            api_key
                .filter(|key| !key.is_empty())
                .or_else(|| env::var(fallback).ok())
                .ok_or_else(|| ConfigError::MissingEnvVar {
                    env_var: to_env_var("api_key"),
                })
        };

        Ok(match self {
            ProviderSettings::Anthropic {
                host,
                api_key,
                model,
                temperature,
            } => ProviderConfig::Anthropic(AnthropicProviderConfig {
                host,
                api_key: resolve(api_key)?,
                model,
                temperature,
            }),
            ProviderSettings::OpenAi {
                host,
                api_key,
                model,
                temperature,
            } => ProviderConfig::OpenAi(OpenAiProviderConfig {
                host,
                api_key: resolve(api_key)?,
                model,
                temperature,
            }),
            ProviderSettings::Gemini {
                host,
                api_key,
                model,
                temperature,
            } => ProviderConfig::Gemini(GeminiProviderConfig {
                host,
                api_key: resolve(api_key)?,
                model,
                temperature,
            }),
        })
    }
}

fn vendor_key_var(provider: ProviderType) -> &'static str {
    match provider {
        ProviderType::Anthropic => "ANTHROPIC_API_KEY",
        ProviderType::OpenAi => "OPENAI_API_KEY",
        ProviderType::Gemini => "GEMINI_API_KEY",
    }
}

/// Values from the command line, applied over everything else
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub provider: Option<ProviderType>,
    pub model: Option<String>,
    pub max_turns: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub provider: ProviderSettings,
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub skills_dir: Option<PathBuf>,
}

impl Settings {
    pub fn new(overrides: &Overrides) -> Result<Self, ConfigError> {
        Self::load_and_validate(overrides)
    }

    fn load_and_validate(overrides: &Overrides) -> Result<Self, ConfigError> {
        let mut builder = Config::builder()
            .set_default("provider.type", ProviderType::Anthropic.to_string())?
            // Layer on the environment variables
            .add_source(
                Environment::with_prefix("SKIFF")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            );

        if let Some(provider) = overrides.provider {
            builder = builder.set_override("provider.type", provider.to_string())?;
        }
        if let Some(model) = &overrides.model {
            builder = builder.set_override("provider.model", model.as_str())?;
        }
        if let Some(max_turns) = overrides.max_turns {
            builder = builder.set_override("agent.max_turns", max_turns as i64)?;
        }

        let result: Result<Self, config::ConfigError> = builder.build()?.try_deserialize();

        match result {
            Ok(settings) => Ok(settings),
            Err(err) => {
                tracing::debug!("Configuration error: {:?}", &err);

                // Extract the field name from "missing field `type`"
                let error_str = err.to_string();
                if error_str.starts_with("missing field") {
                    let field = error_str
                        .trim_start_matches("missing field `")
                        .trim_end_matches('`');
                    Err(ConfigError::MissingEnvVar {
                        env_var: to_env_var(field),
                    })
                } else if let config::ConfigError::NotFound(field) = &err {
                    Err(ConfigError::MissingEnvVar {
                        env_var: to_env_var(field),
                    })
                } else {
                    Err(ConfigError::Other(err))
                }
            }
        }
    }

    /// Where skills are read from: `skills_dir` if set, else `~/.config/skiff/skills`.
    pub fn skills_dir(&self) -> Option<PathBuf> {
        self.skills_dir
            .clone()
            .or_else(|| dirs::config_dir().map(|dir| dir.join("skiff").join("skills")))
    }
}

fn default_anthropic_host() -> String {
    "https://api.anthropic.com".to_string()
}

fn default_anthropic_model() -> String {
    "claude-3-5-sonnet-latest".to_string()
}

fn default_openai_host() -> String {
    "https://api.openai.com".to_string()
}

fn default_openai_model() -> String {
    "gpt-4o".to_string()
}

fn default_gemini_host() -> String {
    "https://generativelanguage.googleapis.com".to_string()
}

fn default_gemini_model() -> String {
    "gemini-1.5-pro".to_string()
}
