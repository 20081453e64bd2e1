//! Tools the model can call, and the dispatcher that routes and gates them.

pub mod bash;
pub mod dispatcher;
pub mod files;
pub mod registry;
pub mod search;
pub mod skill;
pub mod task;
pub mod todo;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use strum_macros::{AsRefStr, Display, EnumIter, EnumString};

use crate::config::AgentConfig;
use crate::errors::ToolError;
use crate::models::tool::Tool;
use crate::security::resolve_sandboxed_path;
use crate::state::SessionState;
use crate::subagent::{AgentType, TaskRunner};

pub use dispatcher::{ToolDispatcher, ToolOutput};
pub use registry::ToolRegistry;

/// Every tool the engine knows. Adding a tool means adding a variant here
/// and registering an executor for it.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, EnumString, EnumIter, AsRefStr,
)]
#[strum(serialize_all = "snake_case")]
pub enum ToolName {
    ReadFile,
    WriteFile,
    EditFile,
    ListDirectory,
    Glob,
    Grep,
    Bash,
    TodoWrite,
    Task,
    Skill,
}

/// Who is calling: the main agent or a subagent of a given type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    Main,
    Subagent(AgentType),
}

impl Capability {
    pub fn allows(&self, tool: ToolName) -> bool {
        match self {
            Capability::Main => true,
            Capability::Subagent(agent_type) => tool != ToolName::Task && agent_type.allows(tool),
        }
    }

    /// Shell commands must pass the read-only allow-list
    pub fn read_only_shell(&self) -> bool {
        matches!(self, Capability::Subagent(agent_type) if agent_type.read_only_shell())
    }

    pub fn label(&self) -> String {
        match self {
            Capability::Main => "main".to_string(),
            Capability::Subagent(agent_type) => agent_type.to_string(),
        }
    }
}

/// Everything an executor may reach while running one call
#[derive(Clone)]
pub struct ToolContext {
    pub root: PathBuf,
    pub capability: Capability,
    pub state: Arc<SessionState>,
    pub config: AgentConfig,
    pub task_runner: Option<Arc<TaskRunner>>,
}

impl ToolContext {
    pub fn new(root: impl Into<PathBuf>, config: AgentConfig, state: Arc<SessionState>) -> Self {
        Self {
            root: root.into(),
            capability: Capability::Main,
            state,
            config,
            task_runner: None,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn resolve(&self, path: &str) -> Result<PathBuf, ToolError> {
        Ok(resolve_sandboxed_path(&self.root, path)?)
    }

    /// Path relative to the sandbox root, for display
    pub fn display_path(&self, path: &Path) -> String {
        let root = resolve_sandboxed_path(&self.root, "")
            .unwrap_or_else(|_| self.root.clone());
        relative_display(&root, path)
    }
}

/// `path` shown relative to an already resolved `root`
pub(crate) fn relative_display(root: &Path, path: &Path) -> String {
    match path.strip_prefix(root) {
        Ok(relative) if relative.as_os_str().is_empty() => ".".to_string(),
        Ok(relative) => relative.display().to_string(),
        Err(_) => path.display().to_string(),
    }
}

#[async_trait]
pub trait ToolExecutor: Send + Sync {
    /// The definition advertised to the model
    fn definition(&self) -> Tool;

    async fn execute(&self, input: Value, ctx: &ToolContext) -> Result<String, ToolError>;
}

/// Decode tool input into its typed form.
pub(crate) fn parse_input<T: DeserializeOwned>(input: Value) -> Result<T, ToolError> {
    serde_json::from_value(input).map_err(|e| ToolError::InvalidParameters(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_tool_names_are_snake_case() {
        assert_eq!(ToolName::ListDirectory.to_string(), "list_directory");
        assert_eq!(ToolName::from_str("todo_write").unwrap(), ToolName::TodoWrite);
        assert!(ToolName::from_str("fly").is_err());
    }

    #[test]
    fn test_capability_narrowing() {
        let plan = Capability::Subagent(AgentType::Plan);
        assert!(plan.allows(ToolName::Grep));
        assert!(!plan.allows(ToolName::Bash));
        assert!(!plan.allows(ToolName::WriteFile));

        let code = Capability::Subagent(AgentType::Code);
        assert!(code.allows(ToolName::WriteFile));
        assert!(!code.allows(ToolName::Task));

        assert!(Capability::Main.allows(ToolName::Task));
        assert!(Capability::Subagent(AgentType::Explore).read_only_shell());
        assert!(!Capability::Subagent(AgentType::Code).read_only_shell());
    }
}
