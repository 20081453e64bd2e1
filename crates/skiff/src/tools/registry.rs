use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::{bail, Result};

use super::bash::BashTool;
use super::files::{EditFileTool, ListDirectoryTool, ReadFileTool, WriteFileTool};
use super::search::{GlobTool, GrepTool};
use super::skill::SkillTool;
use super::task::TaskTool;
use super::todo::TodoWriteTool;
use super::{ToolExecutor, ToolName};
use crate::models::tool::Tool;
use crate::skills::SkillLibrary;

/// Executors keyed by tool name, built once and shared by every agent.
pub struct ToolRegistry {
    executors: BTreeMap<ToolName, Arc<dyn ToolExecutor>>,
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.executors.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Pair a tool name with its executor for [`ToolRegistry::build`].
pub fn entry<E: ToolExecutor + 'static>(
    name: ToolName,
    executor: E,
) -> (ToolName, Arc<dyn ToolExecutor>) {
    (name, Arc::new(executor))
}

impl ToolRegistry {
    /// Register `entries`, rejecting duplicate keys and executors whose
    /// advertised name differs from their key.
    pub fn build(entries: Vec<(ToolName, Arc<dyn ToolExecutor>)>) -> Result<Self> {
        let mut executors = BTreeMap::new();
        for (name, executor) in entries {
            let advertised = executor.definition().name;
            if advertised != name.as_ref() {
                bail!(
                    "Tool registered as '{}' advertises itself as '{}'",
                    name,
                    advertised
                );
            }
            if executors.insert(name, executor).is_some() {
                bail!("Tool '{}' registered twice", name);
            }
        }
        Ok(Self { executors })
    }

    /// The full built-in tool set
    pub fn standard(skills: Arc<SkillLibrary>) -> Result<Self> {
        Self::build(vec![
            entry(ToolName::ReadFile, ReadFileTool),
            entry(ToolName::WriteFile, WriteFileTool),
            entry(ToolName::EditFile, EditFileTool),
            entry(ToolName::ListDirectory, ListDirectoryTool),
            entry(ToolName::Glob, GlobTool),
            entry(ToolName::Grep, GrepTool),
            entry(ToolName::Bash, BashTool),
            entry(ToolName::TodoWrite, TodoWriteTool),
            entry(ToolName::Task, TaskTool),
            entry(ToolName::Skill, SkillTool::new(skills)),
        ])
    }

    pub fn get(&self, name: ToolName) -> Option<&Arc<dyn ToolExecutor>> {
        self.executors.get(&name)
    }

    /// Definitions in declaration order
    pub fn definitions(&self) -> Vec<(ToolName, Tool)> {
        self.executors
            .iter()
            .map(|(name, executor)| (*name, executor.definition()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.executors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.executors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn test_standard_registers_every_tool() {
        let registry = ToolRegistry::standard(Arc::new(SkillLibrary::default())).unwrap();
        assert_eq!(registry.len(), ToolName::iter().count());
        for (name, tool) in registry.definitions() {
            assert_eq!(tool.name, name.to_string());
            assert_eq!(tool.input_schema["type"], "object");
        }
    }

    #[test]
    fn test_build_rejects_mismatched_name() {
        let err = ToolRegistry::build(vec![entry(ToolName::Grep, GlobTool)]).unwrap_err();
        assert!(err.to_string().contains("advertises itself as 'glob'"));
    }

    #[test]
    fn test_build_rejects_duplicates() {
        let err = ToolRegistry::build(vec![
            entry(ToolName::Glob, GlobTool),
            entry(ToolName::Glob, GlobTool),
        ])
        .unwrap_err();
        assert!(err.to_string().contains("registered twice"));
    }
}
