use std::sync::{Mutex, MutexGuard};

use crate::config::AgentConfig;
use crate::models::message::Message;
use crate::models::ValidationError;
use crate::reminder::{Reminder, ReminderInjector};
use crate::todo::{TodoItem, TodoTracker};

/// Per-agent mutable state reached by tools through their context.
///
/// The main agent and every subagent each own one, so a child's todo list never
/// leaks into the parent.
#[derive(Debug)]
pub struct SessionState {
    todos: Mutex<TodoTracker>,
    reminders: Mutex<ReminderInjector>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    // A panic while holding the lock leaves plain data behind, still usable.
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl SessionState {
    pub fn new(config: &AgentConfig) -> Self {
        Self {
            todos: Mutex::new(TodoTracker::new(config.max_todos)),
            reminders: Mutex::new(ReminderInjector::new(config.todo_nag_rounds)),
        }
    }

    pub fn update_todos(&self, items: Vec<TodoItem>) -> Result<String, ValidationError> {
        lock(&self.todos).try_update(items)
    }

    pub fn todos(&self) -> Vec<TodoItem> {
        lock(&self.todos).items().to_vec()
    }

    pub fn render_todos(&self) -> String {
        lock(&self.todos).render()
    }

    pub fn record_tool_calls<S: AsRef<str>>(&self, names: &[S]) {
        lock(&self.reminders).record_tool_calls(names);
    }

    pub fn pending_reminders(&self) -> Vec<Reminder> {
        lock(&self.reminders).pending()
    }

    pub fn rounds_since_todo_update(&self) -> usize {
        lock(&self.reminders).rounds_since_todo_update()
    }

    /// Build the user message for `text`, prefixed by any pending reminders.
    /// Reminder state is left alone until [`SessionState::commit_user_turn`].
    pub fn prepare_user_message(&self, text: &str) -> Message {
        self.pending_reminders()
            .into_iter()
            .fold(Message::user(), |message, reminder| {
                message.with_text(format!(
                    "<system-reminder>\n{}\n</system-reminder>",
                    reminder.text()
                ))
            })
            .with_text(text)
    }

    /// Record that a prepared user message became part of the conversation.
    pub fn commit_user_turn(&self) {
        lock(&self.reminders).on_user_turn();
    }

    pub fn reset(&self) {
        lock(&self.todos).reset();
        lock(&self.reminders).reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::todo::TodoStatus;

    #[test]
    fn test_prepare_user_message_wraps_reminders_once() {
        let state = SessionState::new(&AgentConfig::default());
        let first = state.prepare_user_message("hello");
        assert_eq!(first.content.len(), 2);
        assert!(first.text().starts_with("<system-reminder>"));
        assert!(first.text().ends_with("hello"));

        state.commit_user_turn();
        let second = state.prepare_user_message("again");
        assert_eq!(second.text(), "again");
    }

    #[test]
    fn test_uncommitted_turn_keeps_reminders() {
        let state = SessionState::new(&AgentConfig::default());
        state.prepare_user_message("interrupted");
        assert_eq!(state.pending_reminders(), vec![Reminder::FirstMessage]);

        let retry = state.prepare_user_message("retry");
        assert!(retry.text().starts_with("<system-reminder>"));
    }

    #[test]
    fn test_reset_clears_everything() {
        let state = SessionState::new(&AgentConfig::default());
        state
            .update_todos(vec![TodoItem::new("1", "x", TodoStatus::Pending)])
            .unwrap();
        state.prepare_user_message("hi");
        state.commit_user_turn();
        state.record_tool_calls(&["bash"]);
        state.reset();
        assert_eq!(state.rounds_since_todo_update(), 0);
        assert!(state.todos().is_empty());
        assert_eq!(state.prepare_user_message("hi").content.len(), 2);
    }
}
