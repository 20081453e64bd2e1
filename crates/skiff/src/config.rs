use serde::{Deserialize, Serialize};

/// Budgets and limits for one agent run and the subagents it spawns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub max_turns: usize,
    pub max_tokens: u32,
    pub max_parallel_tools: usize,
    pub subagent_max_turns: usize,
    pub subagent_max_tokens: u32,
    pub bash_timeout_secs: u64,
    pub max_output_bytes: usize,
    pub max_todos: usize,
    pub todo_nag_rounds: usize,
}

/// Upper bound on a per-call `timeout_secs` override for bash.
pub const MAX_BASH_TIMEOUT_SECS: u64 = 600;

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_turns: 50,
            max_tokens: 8192,
            max_parallel_tools: 8,
            subagent_max_turns: 20,
            subagent_max_tokens: 4096,
            bash_timeout_secs: 120,
            max_output_bytes: 30_000,
            max_todos: 20,
            todo_nag_rounds: 5,
        }
    }
}

impl AgentConfig {
    /// The configuration a subagent runs with: the parent's limits with the
    /// smaller subagent budgets swapped in.
    pub fn for_subagent(&self) -> Self {
        Self {
            max_turns: self.subagent_max_turns,
            max_tokens: self.subagent_max_tokens,
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_deserialize_uses_defaults() {
        let config: AgentConfig = serde_json::from_str(r#"{"max_turns": 3}"#).unwrap();
        assert_eq!(config.max_turns, 3);
        assert_eq!(config.max_parallel_tools, 8);
    }

    #[test]
    fn test_subagent_budgets() {
        let config = AgentConfig::default().for_subagent();
        assert_eq!(config.max_turns, 20);
        assert_eq!(config.max_tokens, 4096);
        assert_eq!(config.bash_timeout_secs, 120);
    }
}
