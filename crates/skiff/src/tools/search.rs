use std::path::Path;

use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use serde_json::{json, Value};
use walkdir::WalkDir;

use super::{parse_input, relative_display, ToolContext, ToolExecutor};
use crate::errors::ToolError;
use crate::models::tool::Tool;

const MAX_GLOB_RESULTS: usize = 200;
const MAX_GREP_MATCHES: usize = 200;

fn is_hidden(entry: &walkdir::DirEntry) -> bool {
    entry.depth() > 0
        && entry
            .file_name()
            .to_str()
            .map(|name| name.starts_with('.'))
            .unwrap_or(false)
}

/// Filesystem walks run on the blocking pool so sibling tool calls keep running.
async fn run_blocking<T, F>(work: F) -> Result<T, ToolError>
where
    F: FnOnce() -> Result<T, ToolError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| ToolError::ExecutionError(format!("Search task failed: {}", e)))?
}

fn capped(mut lines: Vec<String>, max: usize) -> String {
    let total = lines.len();
    if total > max {
        lines.truncate(max);
        lines.push(format!("... ({} more not shown)", total - max));
    }
    lines.join("\n")
}

#[derive(Deserialize)]
struct GlobInput {
    pattern: String,
}

pub struct GlobTool;

#[async_trait]
impl ToolExecutor for GlobTool {
    fn definition(&self) -> Tool {
        Tool::new(
            "glob",
            "Find files by glob pattern, e.g. '**/*.rs' or 'src/*.toml'. Paths are relative to the workspace root.",
            json!({
                "type": "object",
                "required": ["pattern"],
                "properties": {
                    "pattern": {"type": "string", "description": "Glob pattern relative to the workspace root."}
                }
            }),
        )
    }

    async fn execute(&self, input: Value, ctx: &ToolContext) -> Result<String, ToolError> {
        let input: GlobInput = parse_input(input)?;
        let full = ctx.resolve(&input.pattern)?;
        let full = full
            .to_str()
            .ok_or_else(|| ToolError::InvalidParameters("pattern is not valid UTF-8".to_string()))?
            .to_string();
        let base = ctx.resolve("")?;

        let mut matches = run_blocking(move || {
            let paths = glob::glob(&full).map_err(|e| {
                ToolError::InvalidParameters(format!("Invalid glob pattern: {}", e))
            })?;
            Ok(paths
                .filter_map(Result::ok)
                .map(|path| relative_display(&base, &path))
                .collect::<Vec<_>>())
        })
        .await?;

        if matches.is_empty() {
            return Ok(format!("No files matched '{}'", input.pattern));
        }
        matches.sort();
        Ok(capped(matches, MAX_GLOB_RESULTS))
    }
}

#[derive(Deserialize)]
struct GrepInput {
    pattern: String,
    #[serde(default)]
    path: Option<String>,
    #[serde(default)]
    include: Option<String>,
}

pub struct GrepTool;

impl GrepTool {
    fn search_file(path: &Path, regex: &Regex, base: &Path, matches: &mut Vec<String>) {
        // Binary and non-UTF-8 files are skipped
        let Ok(text) = std::fs::read_to_string(path) else {
            return;
        };
        let display = relative_display(base, path);
        for (index, line) in text.lines().enumerate() {
            if regex.is_match(line) {
                matches.push(format!("{}:{}: {}", display, index + 1, line.trim_end()));
            }
        }
    }

    fn search_tree(
        root: &Path,
        base: &Path,
        regex: &Regex,
        include: Option<&glob::Pattern>,
    ) -> Vec<String> {
        let mut matches = Vec::new();
        for entry in WalkDir::new(root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| !is_hidden(entry))
            .filter_map(Result::ok)
        {
            if !entry.file_type().is_file() {
                continue;
            }
            if let Some(include) = include {
                let name = entry.file_name().to_string_lossy();
                if !include.matches(&name) {
                    continue;
                }
            }
            Self::search_file(entry.path(), regex, base, &mut matches);
        }
        matches
    }
}

#[async_trait]
impl ToolExecutor for GrepTool {
    fn definition(&self) -> Tool {
        Tool::new(
            "grep",
            "Search file contents with a regular expression. Results are 'file:line: text'.",
            json!({
                "type": "object",
                "required": ["pattern"],
                "properties": {
                    "pattern": {"type": "string", "description": "Regular expression to search for."},
                    "path": {"type": "string", "description": "File or directory to search. Defaults to the workspace root."},
                    "include": {"type": "string", "description": "Only search files whose name matches this glob, e.g. '*.rs'."}
                }
            }),
        )
    }

    async fn execute(&self, input: Value, ctx: &ToolContext) -> Result<String, ToolError> {
        let input: GrepInput = parse_input(input)?;
        let regex = Regex::new(&input.pattern)
            .map_err(|e| ToolError::InvalidParameters(format!("Invalid regex: {}", e)))?;
        let include = input
            .include
            .as_deref()
            .map(glob::Pattern::new)
            .transpose()
            .map_err(|e| ToolError::InvalidParameters(format!("Invalid include pattern: {}", e)))?;
        let root = ctx.resolve(input.path.as_deref().unwrap_or(""))?;
        if !root.exists() {
            return Err(ToolError::InvalidParameters(format!(
                "'{}' does not exist",
                input.path.unwrap_or_default()
            )));
        }

        let base = ctx.resolve("")?;
        let matches = run_blocking(move || {
            Ok(Self::search_tree(&root, &base, &regex, include.as_ref()))
        })
        .await?;

        if matches.is_empty() {
            return Ok(format!("No matches found for '{}'", input.pattern));
        }
        Ok(capped(matches, MAX_GREP_MATCHES))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AgentConfig;
    use crate::state::SessionState;
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::TempDir;

    fn workspace() -> (TempDir, ToolContext) {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("src/nested")).unwrap();
        std::fs::create_dir_all(dir.path().join(".git")).unwrap();
        std::fs::write(dir.path().join("src/main.rs"), "fn main() {\n    run();\n}\n").unwrap();
        std::fs::write(dir.path().join("src/nested/lib.rs"), "pub fn run() {}\n").unwrap();
        std::fs::write(dir.path().join("README.md"), "run the thing\n").unwrap();
        std::fs::write(dir.path().join(".git/config"), "fn hidden\n").unwrap();

        let config = AgentConfig::default();
        let state = Arc::new(SessionState::new(&config));
        let ctx = ToolContext::new(dir.path(), config, state);
        (dir, ctx)
    }

    #[tokio::test]
    async fn test_glob_relative_sorted() {
        let (_dir, ctx) = workspace();
        let result = GlobTool
            .execute(json!({"pattern": "**/*.rs"}), &ctx)
            .await
            .unwrap();
        assert_eq!(result, "src/main.rs\nsrc/nested/lib.rs");

        let none = GlobTool
            .execute(json!({"pattern": "*.py"}), &ctx)
            .await
            .unwrap();
        assert_eq!(none, "No files matched '*.py'");
    }

    #[tokio::test]
    async fn test_glob_cannot_escape() {
        let (_dir, ctx) = workspace();
        let err = GlobTool
            .execute(json!({"pattern": "../*"}), &ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Security(_)));
    }

    #[tokio::test]
    async fn test_grep_with_include_skips_hidden() {
        let (_dir, ctx) = workspace();
        let result = GrepTool
            .execute(json!({"pattern": r"fn \w+", "include": "*.rs"}), &ctx)
            .await
            .unwrap();
        assert_eq!(result, "src/main.rs:1: fn main() {\nsrc/nested/lib.rs:1: pub fn run() {}");

        let scoped = GrepTool
            .execute(json!({"pattern": "run", "path": "README.md"}), &ctx)
            .await
            .unwrap();
        assert_eq!(scoped, "README.md:1: run the thing");
    }

    #[tokio::test]
    async fn test_grep_invalid_regex() {
        let (_dir, ctx) = workspace();
        let err = GrepTool
            .execute(json!({"pattern": "("}), &ctx)
            .await
            .unwrap_err();
        assert!(err.render().starts_with("Error: Invalid parameters: Invalid regex"));
    }

    #[tokio::test]
    async fn test_grep_yields_while_walking() {
        let (dir, ctx) = workspace();
        let bulk = dir.path().join("bulk");
        std::fs::create_dir(&bulk).unwrap();
        for i in 0..2000 {
            std::fs::write(bulk.join(format!("f{}.txt", i)), "hay\nhay\nneedle\n").unwrap();
        }

        let search = GrepTool.execute(json!({"pattern": "needle"}), &ctx);
        let finished = tokio::time::timeout(Duration::from_millis(1), search).await;
        assert!(finished.is_err());

        let result = GrepTool
            .execute(json!({"pattern": "needle", "path": "bulk/f7.txt"}), &ctx)
            .await
            .unwrap();
        assert_eq!(result, "bulk/f7.txt:3: needle");
    }

    #[test]
    fn test_capped_notes_overflow() {
        let lines: Vec<String> = (0..5).map(|i| i.to_string()).collect();
        assert_eq!(capped(lines, 3), "0\n1\n2\n... (2 more not shown)");
    }
}
