use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{parse_input, ToolContext, ToolExecutor};
use crate::errors::ToolError;
use crate::models::tool::Tool;
use crate::skills::SkillLibrary;

#[derive(Deserialize)]
struct SkillInput {
    name: String,
    #[serde(default)]
    arguments: Option<String>,
}

pub struct SkillTool {
    library: Arc<SkillLibrary>,
}

impl SkillTool {
    pub fn new(library: Arc<SkillLibrary>) -> Self {
        Self { library }
    }
}

#[async_trait]
impl ToolExecutor for SkillTool {
    fn definition(&self) -> Tool {
        Tool::new(
            "skill",
            "Load the instructions of a named skill. Available skills are listed in the system prompt.",
            json!({
                "type": "object",
                "required": ["name"],
                "properties": {
                    "name": {"type": "string", "description": "Skill name."},
                    "arguments": {"type": "string", "description": "Text substituted for $ARGUMENTS in the skill."}
                }
            }),
        )
    }

    async fn execute(&self, input: Value, _ctx: &ToolContext) -> Result<String, ToolError> {
        let input: SkillInput = parse_input(input)?;
        self.library
            .render(&input.name, input.arguments.as_deref().unwrap_or(""))
            .ok_or_else(|| {
                ToolError::InvalidParameters(format!(
                    "Unknown skill '{}'. Available: {}",
                    input.name,
                    self.library.names().join(", ")
                ))
            })
    }
}
