use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {env_var}")]
    MissingEnvVar { env_var: String },
    #[error("Configuration error: {0}")]
    Other(#[from] config::ConfigError),
}

/// Environment variable that sets a settings field. Bare field names belong
/// to the provider table, the only one with required fields.
pub fn to_env_var(field: &str) -> String {
    let path = if field.contains('.') {
        field.to_string()
    } else {
        format!("provider.{}", field)
    };
    format!("SKIFF_{}", path.replace('.', "__").to_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_env_var() {
        assert_eq!(to_env_var("api_key"), "SKIFF_PROVIDER__API_KEY");
        assert_eq!(to_env_var("agent.max_turns"), "SKIFF_AGENT__MAX_TURNS");
    }

    #[test]
    fn test_missing_env_var_message() {
        let err = ConfigError::MissingEnvVar {
            env_var: "SKIFF_PROVIDER__TYPE".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Missing required environment variable: SKIFF_PROVIDER__TYPE"
        );
    }
}
