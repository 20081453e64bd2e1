use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

use crate::errors::ERROR_MARKER;
use crate::models::ValidationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TodoStatus {
    Pending,
    InProgress,
    Completed,
}

impl TodoStatus {
    fn marker(&self) -> &'static str {
        match self {
            TodoStatus::Pending => "[ ]",
            TodoStatus::InProgress => "[~]",
            TodoStatus::Completed => "[x]",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TodoItem {
    pub id: String,
    pub content: String,
    pub status: TodoStatus,
    /// Present-tense phrasing shown while the item is in progress
    #[serde(default, alias = "activeForm")]
    pub active_form: Option<String>,
}

impl TodoItem {
    pub fn new<I: Into<String>, C: Into<String>>(id: I, content: C, status: TodoStatus) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
            status,
            active_form: None,
        }
    }
}

/// Check a proposed list against the tracker invariants.
pub fn validate_todos(items: &[TodoItem], max_todos: usize) -> Result<(), ValidationError> {
    if items.len() > max_todos {
        return Err(ValidationError::TooManyTodos {
            count: items.len(),
            max: max_todos,
        });
    }

    let mut seen = HashSet::new();
    for item in items {
        if item.content.trim().is_empty() {
            return Err(ValidationError::EmptyTodoContent {
                id: item.id.clone(),
            });
        }
        if !seen.insert(item.id.as_str()) {
            return Err(ValidationError::DuplicateTodoId {
                id: item.id.clone(),
            });
        }
    }

    let in_progress = items
        .iter()
        .filter(|item| item.status == TodoStatus::InProgress)
        .count();
    if in_progress > 1 {
        return Err(ValidationError::MultipleInProgress { count: in_progress });
    }
    Ok(())
}

/// The agent's working task list. Updates replace the whole list.
#[derive(Debug, Clone)]
pub struct TodoTracker {
    items: Vec<TodoItem>,
    max_todos: usize,
}

impl TodoTracker {
    pub fn new(max_todos: usize) -> Self {
        Self {
            items: Vec::new(),
            max_todos,
        }
    }

    pub fn items(&self) -> &[TodoItem] {
        &self.items
    }

    /// Replace the list and return its rendering, or an error string with the
    /// previous list left in place.
    pub fn update(&mut self, items: Vec<TodoItem>) -> String {
        self.try_update(items)
            .unwrap_or_else(|e| format!("{}{}", ERROR_MARKER, e))
    }

    pub fn try_update(&mut self, items: Vec<TodoItem>) -> Result<String, ValidationError> {
        validate_todos(&items, self.max_todos)?;
        self.items = items;
        Ok(self.render())
    }

    pub fn render(&self) -> String {
        if self.items.is_empty() {
            return "Todos: none".to_string();
        }

        let total = self.items.len();
        let completed = self
            .items
            .iter()
            .filter(|item| item.status == TodoStatus::Completed)
            .count();
        let percent = completed * 100 / total;

        let mut lines = vec![format!("Todos: {}/{} ({}%)", completed, total, percent)];
        for item in &self.items {
            let text = match (&item.status, &item.active_form) {
                (TodoStatus::InProgress, Some(active)) => active.as_str(),
                _ => item.content.as_str(),
            };
            lines.push(format!("{} {}", item.status.marker(), text));
        }
        lines.join("\n")
    }

    pub fn reset(&mut self) {
        self.items.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<TodoItem> {
        vec![
            TodoItem::new("1", "Read the parser", TodoStatus::Completed),
            TodoItem {
                active_form: Some("Fixing the lexer".to_string()),
                ..TodoItem::new("2", "Fix the lexer", TodoStatus::InProgress)
            },
            TodoItem::new("3", "Run tests", TodoStatus::Pending),
        ]
    }

    #[test]
    fn test_update_renders_progress() {
        let mut tracker = TodoTracker::new(20);
        let rendered = tracker.update(sample());
        assert_eq!(
            rendered,
            "Todos: 1/3 (33%)\n[x] Read the parser\n[~] Fixing the lexer\n[ ] Run tests"
        );
        assert_eq!(tracker.items().len(), 3);
    }

    #[test]
    fn test_multiple_in_progress_rejected_and_state_kept() {
        let mut tracker = TodoTracker::new(20);
        tracker.update(sample());

        let mut bad = sample();
        bad[2].status = TodoStatus::InProgress;
        let result = tracker.update(bad);
        assert!(result.starts_with("Error: "));
        assert!(result.contains("in_progress"));
        assert_eq!(tracker.items(), sample().as_slice());
    }

    #[test]
    fn test_limits_and_ids() {
        let mut tracker = TodoTracker::new(2);
        assert!(tracker.update(sample()).contains("maximum is 2"));

        let duplicate = vec![
            TodoItem::new("a", "one", TodoStatus::Pending),
            TodoItem::new("a", "two", TodoStatus::Pending),
        ];
        assert_eq!(
            validate_todos(&duplicate, 20),
            Err(ValidationError::DuplicateTodoId {
                id: "a".to_string()
            })
        );

        let empty = vec![TodoItem::new("b", "  ", TodoStatus::Pending)];
        assert!(matches!(
            validate_todos(&empty, 20),
            Err(ValidationError::EmptyTodoContent { .. })
        ));
    }

    #[test]
    fn test_deserialize_accepts_camel_case_active_form() {
        let item: TodoItem = serde_json::from_value(serde_json::json!({
            "id": "1",
            "content": "Write docs",
            "status": "in_progress",
            "activeForm": "Writing docs"
        }))
        .unwrap();
        assert_eq!(item.active_form.as_deref(), Some("Writing docs"));
        assert_eq!(item.status, TodoStatus::InProgress);
    }

    #[test]
    fn test_reset_and_empty_render() {
        let mut tracker = TodoTracker::new(20);
        tracker.update(sample());
        tracker.reset();
        assert!(tracker.items().is_empty());
        assert_eq!(tracker.render(), "Todos: none");
    }
}
