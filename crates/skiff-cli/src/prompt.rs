use anyhow::{anyhow, Result};
use bat::WrappingMode;
use cliclack::input;
use console::style;
use skiff::models::message::{Message, MessageContent};

const THEME: &str = "zenburn";
const RESULT_PREVIEW_LINES: usize = 12;

pub enum InputType {
    Message(String),
    /// Start over with an empty conversation
    Clear,
    Todos,
    Help,
    Exit,
}

/// Interpret one line of user input. Slash commands are case-insensitive.
pub fn parse_input(text: &str) -> Option<InputType> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    let command = text.to_ascii_lowercase();
    Some(match command.as_str() {
        "/exit" | "/quit" => InputType::Exit,
        "/clear" => InputType::Clear,
        "/todos" => InputType::Todos,
        "/?" | "/help" => InputType::Help,
        _ => InputType::Message(text.to_string()),
    })
}

pub struct CliclackPrompt;

impl CliclackPrompt {
    pub fn new() -> Self {
        Self
    }

    pub fn get_input(&mut self) -> Result<InputType> {
        loop {
            let text: String = input("skiff ›").placeholder("").interact()?;
            if let Some(parsed) = parse_input(&text) {
                return Ok(parsed);
            }
        }
    }

    pub fn intro(&self, root: &str) -> Result<()> {
        cliclack::intro(style(" skiff ").on_cyan().black())?;
        cliclack::log::remark(format!(
            "Working in {}. Type /? for commands, Ctrl+C interrupts a reply.",
            root
        ))?;
        Ok(())
    }

    pub fn outro(&self) -> Result<()> {
        cliclack::outro("Session closed")?;
        Ok(())
    }

    pub fn help(&self) {
        println!("Commands:");
        println!("/exit - Exit the session");
        println!("/clear - Forget the conversation and todo list");
        println!("/todos - Show the todo list");
        println!("/? - Display this help message");
        println!("Ctrl+C - Interrupt skiff (resets the interaction to before the interrupted request)");
    }

    pub fn info(&self, text: &str) {
        let _ = cliclack::log::info(text);
    }

    pub fn warning(&self, text: &str) {
        let _ = cliclack::log::warning(text);
    }

    pub fn error(&self, text: &str) {
        let _ = cliclack::log::error(text);
    }

    /// Print the messages produced by one agent run
    pub fn render(&self, messages: &[Message]) -> Result<()> {
        for message in messages {
            for content in &message.content {
                match content {
                    MessageContent::Text(text) if !text.text.trim().is_empty() => {
                        print_markdown(&text.text)?
                    }
                    MessageContent::Text(_) => {}
                    MessageContent::ToolUse(tool_use) => {
                        let input = serde_json::to_string_pretty(&tool_use.input)?;
                        print_block(&input, &format!("Tool Request: {}", tool_use.name), "JSON")?;
                    }
                    MessageContent::ToolResult(result) => {
                        let title = if result.is_error {
                            "Tool Error:"
                        } else {
                            "Tool Response:"
                        };
                        print_block(&preview(&result.content), title, "txt")?;
                    }
                }
            }
        }
        println!();
        Ok(())
    }
}

fn preview(content: &str) -> String {
    let total = content.lines().count();
    if total <= RESULT_PREVIEW_LINES {
        return content.to_string();
    }
    let mut shown: Vec<&str> = content.lines().take(RESULT_PREVIEW_LINES).collect();
    let more = format!("... ({} more lines)", total - RESULT_PREVIEW_LINES);
    shown.push(&more);
    shown.join("\n")
}

fn print_block(content: &str, title: &str, language: &str) -> Result<()> {
    bat::PrettyPrinter::new()
        .input(bat::Input::from_bytes(content.as_bytes()).name(title))
        .theme(THEME)
        .language(language)
        .grid(true)
        .header(true)
        .wrapping_mode(WrappingMode::Character)
        .print()
        .map_err(|e| anyhow!("Failed to render output: {}", e))?;
    Ok(())
}

pub fn print_markdown(content: &str) -> Result<()> {
    bat::PrettyPrinter::new()
        .input(bat::Input::from_bytes(content.as_bytes()))
        .theme(THEME)
        .language("Markdown")
        .wrapping_mode(WrappingMode::Character)
        .print()
        .map_err(|e| anyhow!("Failed to render output: {}", e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_input() {
        assert!(parse_input("   ").is_none());
        assert!(matches!(parse_input("/EXIT"), Some(InputType::Exit)));
        assert!(matches!(parse_input("/quit"), Some(InputType::Exit)));
        assert!(matches!(parse_input("/clear"), Some(InputType::Clear)));
        assert!(matches!(parse_input("/todos"), Some(InputType::Todos)));
        match parse_input("  fix the build \n") {
            Some(InputType::Message(text)) => assert_eq!(text, "fix the build"),
            _ => panic!("expected a message"),
        }
    }

    #[test]
    fn test_preview_truncates_long_results() {
        let long: Vec<String> = (0..20).map(|i| i.to_string()).collect();
        let shown = preview(&long.join("\n"));
        assert_eq!(shown.lines().count(), RESULT_PREVIEW_LINES + 1);
        assert!(shown.ends_with("... (8 more lines)"));
        assert_eq!(preview("short"), "short");
    }
}
