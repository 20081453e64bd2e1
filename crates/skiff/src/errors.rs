use thiserror::Error;

use crate::models::ValidationError;
use crate::security::SecurityError;

/// Prefix every failed tool result starts with, so both the model and the
/// loop can recognise a refusal or failure.
pub const ERROR_MARKER: &str = "Error: ";

#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ToolError {
    #[error("Unknown tool: {0}")]
    ToolNotFound(String),

    #[error("Tool '{tool}' is not available to the {agent} agent")]
    NotPermitted { tool: String, agent: String },

    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("Tool execution failed: {0}")]
    ExecutionError(String),

    #[error(transparent)]
    Security(#[from] SecurityError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("{agent} subagent failed: {reason}")]
    SubagentFailed { agent: String, reason: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ToolError {
    /// Render as the string the model sees in the tool result.
    pub fn render(&self) -> String {
        format!("{}{}", ERROR_MARKER, self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_has_marker() {
        let err = ToolError::ToolNotFound("fly".to_string());
        assert_eq!(err.render(), "Error: Unknown tool: fly");
    }

    #[test]
    fn test_security_error_is_transparent() {
        let err: ToolError = SecurityError::DangerousCommand {
            pattern: "fork bomb".to_string(),
        }
        .into();
        assert!(err.render().starts_with(ERROR_MARKER));
        assert!(err.render().contains("fork bomb"));
    }
}
