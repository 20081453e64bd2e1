use std::sync::Arc;

use anyhow::Result;
use strum_macros::{Display, EnumIter, EnumString};

use super::{
    anthropic::AnthropicProvider, base::ModelClient, configs::ProviderConfig,
    gemini::GeminiProvider, openai::OpenAiProvider,
};

#[derive(EnumIter, EnumString, Display, Debug, Clone, Copy, PartialEq, Eq)]
#[strum(serialize_all = "lowercase")]
pub enum ProviderType {
    Anthropic,
    OpenAi,
    Gemini,
}

impl From<&ProviderConfig> for ProviderType {
    fn from(config: &ProviderConfig) -> Self {
        match config {
            ProviderConfig::Anthropic(_) => ProviderType::Anthropic,
            ProviderConfig::OpenAi(_) => ProviderType::OpenAi,
            ProviderConfig::Gemini(_) => ProviderType::Gemini,
        }
    }
}

pub fn get_provider(config: ProviderConfig) -> Result<Arc<dyn ModelClient>> {
    match config {
        ProviderConfig::Anthropic(anthropic_config) => {
            Ok(Arc::new(AnthropicProvider::new(anthropic_config)?))
        }
        ProviderConfig::OpenAi(openai_config) => Ok(Arc::new(OpenAiProvider::new(openai_config)?)),
        ProviderConfig::Gemini(gemini_config) => Ok(Arc::new(GeminiProvider::new(gemini_config)?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::configs::GeminiProviderConfig;
    use std::str::FromStr;
    use strum::IntoEnumIterator;

    #[test]
    fn test_provider_type_names() {
        let names: Vec<String> = ProviderType::iter().map(|p| p.to_string()).collect();
        assert_eq!(names, vec!["anthropic", "openai", "gemini"]);
        assert_eq!(ProviderType::from_str("openai").unwrap(), ProviderType::OpenAi);
    }

    #[test]
    fn test_get_provider_builds_client() {
        let config = ProviderConfig::Gemini(GeminiProviderConfig {
            host: "http://localhost".to_string(),
            api_key: "key".to_string(),
            model: "gemini-1.5-pro".to_string(),
            temperature: None,
        });
        assert_eq!(ProviderType::from(&config), ProviderType::Gemini);
        assert!(get_provider(config).is_ok());
    }
}
