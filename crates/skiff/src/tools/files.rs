use async_trait::async_trait;
use indoc::indoc;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{parse_input, ToolContext, ToolExecutor};
use crate::errors::ToolError;
use crate::models::tool::Tool;

const DEFAULT_READ_LIMIT: usize = 2000;

#[derive(Deserialize)]
struct ReadFileInput {
    path: String,
    offset: Option<usize>,
    limit: Option<usize>,
}

pub struct ReadFileTool;

#[async_trait]
impl ToolExecutor for ReadFileTool {
    fn definition(&self) -> Tool {
        Tool::new(
            "read_file",
            indoc! {"
                Read a text file from the workspace. Lines are returned numbered from 1.
                Use offset (1-based line) and limit to page through large files.
            "},
            json!({
                "type": "object",
                "required": ["path"],
                "properties": {
                    "path": {"type": "string", "description": "Path relative to the workspace root."},
                    "offset": {"type": "integer", "description": "First line to return, 1-based."},
                    "limit": {"type": "integer", "description": "Maximum number of lines to return."}
                }
            }),
        )
    }

    async fn execute(&self, input: Value, ctx: &ToolContext) -> Result<String, ToolError> {
        let input: ReadFileInput = parse_input(input)?;
        let path = ctx.resolve(&input.path)?;
        if !path.is_file() {
            return Err(ToolError::InvalidParameters(format!(
                "'{}' is not a file",
                input.path
            )));
        }

        let text = tokio::fs::read_to_string(&path).await.map_err(|e| {
            ToolError::ExecutionError(format!("Failed to read '{}': {}", input.path, e))
        })?;
        if text.is_empty() {
            return Ok("(empty file)".to_string());
        }

        let start = input.offset.unwrap_or(1).max(1);
        let limit = input.limit.unwrap_or(DEFAULT_READ_LIMIT);
        let lines: Vec<String> = text
            .lines()
            .enumerate()
            .skip(start - 1)
            .take(limit)
            .map(|(index, line)| format!("{:>6}\t{}", index + 1, line))
            .collect();

        if lines.is_empty() {
            return Err(ToolError::InvalidParameters(format!(
                "offset {} is past the end of '{}' ({} lines)",
                start,
                input.path,
                text.lines().count()
            )));
        }
        Ok(lines.join("\n"))
    }
}

#[derive(Deserialize)]
struct WriteFileInput {
    path: String,
    content: String,
}

pub struct WriteFileTool;

#[async_trait]
impl ToolExecutor for WriteFileTool {
    fn definition(&self) -> Tool {
        Tool::new(
            "write_file",
            "Create or overwrite a file with the given content. Parent directories are created as needed.",
            json!({
                "type": "object",
                "required": ["path", "content"],
                "properties": {
                    "path": {"type": "string", "description": "Path relative to the workspace root."},
                    "content": {"type": "string", "description": "The full file content."}
                }
            }),
        )
    }

    async fn execute(&self, input: Value, ctx: &ToolContext) -> Result<String, ToolError> {
        let input: WriteFileInput = parse_input(input)?;
        let path = ctx.resolve(&input.path)?;
        if path.is_dir() {
            return Err(ToolError::InvalidParameters(format!(
                "'{}' is a directory",
                input.path
            )));
        }

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                ToolError::ExecutionError(format!("Failed to create '{}': {}", parent.display(), e))
            })?;
        }
        tokio::fs::write(&path, &input.content).await.map_err(|e| {
            ToolError::ExecutionError(format!("Failed to write '{}': {}", input.path, e))
        })?;

        Ok(format!(
            "Wrote {} bytes to {}",
            input.content.len(),
            ctx.display_path(&path)
        ))
    }
}

#[derive(Deserialize)]
struct EditFileInput {
    path: String,
    old_string: String,
    new_string: String,
}

pub struct EditFileTool;

#[async_trait]
impl ToolExecutor for EditFileTool {
    fn definition(&self) -> Tool {
        Tool::new(
            "edit_file",
            indoc! {"
                Replace one exact occurrence of old_string with new_string in a file.
                old_string must appear exactly once; include surrounding lines to make it unique.
            "},
            json!({
                "type": "object",
                "required": ["path", "old_string", "new_string"],
                "properties": {
                    "path": {"type": "string", "description": "Path relative to the workspace root."},
                    "old_string": {"type": "string", "description": "Exact text to replace."},
                    "new_string": {"type": "string", "description": "Replacement text."}
                }
            }),
        )
    }

    async fn execute(&self, input: Value, ctx: &ToolContext) -> Result<String, ToolError> {
        let input: EditFileInput = parse_input(input)?;
        if input.old_string.is_empty() {
            return Err(ToolError::InvalidParameters(
                "old_string must not be empty".to_string(),
            ));
        }

        let path = ctx.resolve(&input.path)?;
        let text = tokio::fs::read_to_string(&path).await.map_err(|e| {
            ToolError::ExecutionError(format!("Failed to read '{}': {}", input.path, e))
        })?;

        match text.matches(&input.old_string).count() {
            0 => Err(ToolError::InvalidParameters(format!(
                "old_string not found in '{}'",
                input.path
            ))),
            1 => {
                let updated = text.replacen(&input.old_string, &input.new_string, 1);
                tokio::fs::write(&path, updated).await.map_err(|e| {
                    ToolError::ExecutionError(format!("Failed to write '{}': {}", input.path, e))
                })?;
                Ok(format!("Edited {}", ctx.display_path(&path)))
            }
            count => Err(ToolError::InvalidParameters(format!(
                "old_string appears {} times in '{}'; include more context so it is unique",
                count, input.path
            ))),
        }
    }
}

#[derive(Deserialize)]
struct ListDirectoryInput {
    #[serde(default)]
    path: Option<String>,
}

pub struct ListDirectoryTool;

#[async_trait]
impl ToolExecutor for ListDirectoryTool {
    fn definition(&self) -> Tool {
        Tool::new(
            "list_directory",
            "List the entries of a directory. Directories are shown with a trailing '/'.",
            json!({
                "type": "object",
                "properties": {
                    "path": {"type": "string", "description": "Directory relative to the workspace root. Defaults to the root."}
                }
            }),
        )
    }

    async fn execute(&self, input: Value, ctx: &ToolContext) -> Result<String, ToolError> {
        let input: ListDirectoryInput = parse_input(input)?;
        let relative = input.path.unwrap_or_default();
        let path = ctx.resolve(&relative)?;

        let mut reader = tokio::fs::read_dir(&path).await.map_err(|e| {
            ToolError::ExecutionError(format!("Failed to list '{}': {}", path.display(), e))
        })?;

        let mut entries = Vec::new();
        while let Some(entry) = reader
            .next_entry()
            .await
            .map_err(|e| ToolError::ExecutionError(e.to_string()))?
        {
            let mut name = entry.file_name().to_string_lossy().to_string();
            let is_dir = entry
                .file_type()
                .await
                .map(|file_type| file_type.is_dir())
                .unwrap_or(false);
            if is_dir {
                name.push('/');
            }
            entries.push(name);
        }

        if entries.is_empty() {
            return Ok("(empty directory)".to_string());
        }
        entries.sort();
        Ok(entries.join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AgentConfig;
    use crate::state::SessionState;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn context(dir: &TempDir) -> ToolContext {
        let config = AgentConfig::default();
        let state = Arc::new(SessionState::new(&config));
        ToolContext::new(dir.path(), config, state)
    }

    #[tokio::test]
    async fn test_write_then_read_numbered() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(&dir);

        let written = WriteFileTool
            .execute(json!({"path": "src/lib.rs", "content": "one\ntwo\nthree\n"}), &ctx)
            .await
            .unwrap();
        assert_eq!(written, "Wrote 14 bytes to src/lib.rs");

        let read = ReadFileTool
            .execute(json!({"path": "src/lib.rs", "offset": 2, "limit": 1}), &ctx)
            .await
            .unwrap();
        assert_eq!(read, "     2\ttwo");
    }

    #[tokio::test]
    async fn test_read_rejects_escape_and_missing() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(&dir);

        let err = ReadFileTool
            .execute(json!({"path": "../../etc/passwd"}), &ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Security(_)));

        let err = ReadFileTool
            .execute(json!({"path": "missing.txt"}), &ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidParameters(_)));

        let err = ReadFileTool.execute(json!({}), &ctx).await.unwrap_err();
        assert!(err.render().contains("missing field `path`"));
    }

    #[tokio::test]
    async fn test_edit_requires_unique_match() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(&dir);
        std::fs::write(dir.path().join("a.txt"), "foo bar foo").unwrap();

        let err = EditFileTool
            .execute(
                json!({"path": "a.txt", "old_string": "foo", "new_string": "baz"}),
                &ctx,
            )
            .await
            .unwrap_err();
        assert!(err.render().contains("appears 2 times"));

        EditFileTool
            .execute(
                json!({"path": "a.txt", "old_string": "bar", "new_string": "qux"}),
                &ctx,
            )
            .await
            .unwrap();
        assert_eq!(
            std::fs::read_to_string(dir.path().join("a.txt")).unwrap(),
            "foo qux foo"
        );
    }

    #[tokio::test]
    async fn test_list_directory_sorted_with_dir_suffix() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(&dir);
        std::fs::create_dir(dir.path().join("src")).unwrap();
        std::fs::write(dir.path().join("b.txt"), "").unwrap();
        std::fs::write(dir.path().join("a.txt"), "").unwrap();

        let listing = ListDirectoryTool.execute(json!({}), &ctx).await.unwrap();
        assert_eq!(listing, "a.txt\nb.txt\nsrc/");

        let empty = ListDirectoryTool
            .execute(json!({"path": "src"}), &ctx)
            .await
            .unwrap();
        assert_eq!(empty, "(empty directory)");
    }
}
