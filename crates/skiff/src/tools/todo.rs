use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{parse_input, ToolContext, ToolExecutor};
use crate::errors::ToolError;
use crate::models::tool::Tool;
use crate::todo::TodoItem;

#[derive(Deserialize)]
struct TodoWriteInput {
    todos: Vec<TodoItem>,
}

pub struct TodoWriteTool;

#[async_trait]
impl ToolExecutor for TodoWriteTool {
    fn definition(&self) -> Tool {
        Tool::new(
            "todo_write",
            "Replace your todo list. Send the whole list every time. Keep exactly one item in_progress while working.",
            json!({
                "type": "object",
                "required": ["todos"],
                "properties": {
                    "todos": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "required": ["id", "content", "status"],
                            "properties": {
                                "id": {"type": "string"},
                                "content": {"type": "string", "description": "Imperative form, e.g. 'Run tests'."},
                                "status": {"type": "string", "enum": ["pending", "in_progress", "completed"]},
                                "active_form": {"type": "string", "description": "Present continuous form, e.g. 'Running tests'."}
                            }
                        }
                    }
                }
            }),
        )
    }

    async fn execute(&self, input: Value, ctx: &ToolContext) -> Result<String, ToolError> {
        let input: TodoWriteInput = parse_input(input)?;
        Ok(ctx.state.update_todos(input.todos)?)
    }
}
