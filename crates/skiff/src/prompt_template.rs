use serde::Serialize;
use std::path::Path;
use tera::{Context, Error as TeraError, Tera};

use crate::models::tool::Tool;
use crate::skills::SkillLibrary;
use crate::subagent::AgentType;

const SYSTEM_TEMPLATE: &str = include_str!("prompts/system.md");
const SUBAGENT_TEMPLATE: &str = include_str!("prompts/subagent.md");

pub fn load_prompt<T: Serialize>(template: &str, context_data: &T) -> Result<String, TeraError> {
    let mut tera = Tera::default();
    tera.add_raw_template("inline_template", template)?;
    let context = Context::from_serialize(context_data)?;
    let rendered = tera.render("inline_template", &context)?;
    Ok(rendered)
}

#[derive(Serialize)]
struct SystemPromptContext<'a> {
    root: String,
    tools: &'a [Tool],
    skills: String,
}

#[derive(Serialize)]
struct SubagentPromptContext<'a> {
    agent_type: String,
    description: &'a str,
    instructions: &'a str,
    root: String,
    tools: &'a [Tool],
}

/// System prompt for the main agent
pub fn system_prompt(root: &Path, tools: &[Tool], skills: &SkillLibrary) -> Result<String, TeraError> {
    load_prompt(
        SYSTEM_TEMPLATE,
        &SystemPromptContext {
            root: root.display().to_string(),
            tools,
            skills: skills.descriptions(),
        },
    )
}

/// System prompt for a subagent of `agent_type` working on `description`
pub fn subagent_prompt(
    agent_type: AgentType,
    description: &str,
    root: &Path,
    tools: &[Tool],
) -> Result<String, TeraError> {
    load_prompt(
        SUBAGENT_TEMPLATE,
        &SubagentPromptContext {
            agent_type: agent_type.to_string(),
            description,
            instructions: agent_type.instructions(),
            root: root.display().to_string(),
            tools,
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::skills::Skill;
    use serde_json::json;
    use std::collections::HashMap;

    #[test]
    fn test_load_prompt() {
        let template = "Hello, {{ name }}! You are {{ age }} years old.";
        let mut context = HashMap::new();
        context.insert("name".to_string(), "Alice".to_string());
        context.insert("age".to_string(), 30.to_string());

        let result = load_prompt(template, &context).unwrap();
        assert_eq!(result, "Hello, Alice! You are 30 years old.");
    }

    #[test]
    fn test_load_prompt_missing_variable() {
        let template = "Hello, {{ name }}! You are {{ age }} years old.";
        let mut context = HashMap::new();
        context.insert("name".to_string(), "Alice".to_string());
        assert!(load_prompt(template, &context).is_err());
    }

    #[test]
    fn test_system_prompt_lists_tools_and_skills() {
        let tools = vec![Tool::new("grep", "Search files.", json!({"type": "object"}))];
        let skills = SkillLibrary::new(vec![Skill::new("commit", "Write a commit", "...")]);
        let prompt = system_prompt(Path::new("/work/repo"), &tools, &skills).unwrap();
        assert!(prompt.contains("`/work/repo`"));
        assert!(prompt.contains("- grep: Search files."));
        assert!(prompt.contains("- commit: Write a commit"));

        let without = system_prompt(Path::new("/w"), &tools, &SkillLibrary::default()).unwrap();
        assert!(!without.contains("## Skills"));
    }

    #[test]
    fn test_subagent_prompt_is_specialised() {
        let prompt = subagent_prompt(AgentType::Plan, "design cache", Path::new("/w"), &[]).unwrap();
        assert!(prompt.starts_with("You are a plan subagent"));
        assert!(prompt.contains("design cache"));
        assert!(prompt.contains(AgentType::Plan.instructions()));
    }
}
