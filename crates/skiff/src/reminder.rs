use strum_macros::Display;

pub const TODO_WRITE_TOOL: &str = "todo_write";

/// Context nudges attached to the next user turn. Declaration order is the
/// order they are emitted in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Display)]
#[strum(serialize_all = "snake_case")]
pub enum Reminder {
    FirstMessage,
    TodoNag,
}

impl Reminder {
    pub fn text(&self) -> &'static str {
        match self {
            Reminder::FirstMessage => {
                "This is the start of the conversation. For multi-step work, plan it with \
                 the todo_write tool before you begin, and keep the list current."
            }
            Reminder::TodoNag => {
                "The todo list has not been updated in a while. If you are working through \
                 a multi-step task, use todo_write to mark progress. Ignore this if the list \
                 is not relevant."
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReminderInjector {
    first_message: bool,
    rounds_since_todo_update: usize,
    nag_after_rounds: usize,
}

impl ReminderInjector {
    pub fn new(nag_after_rounds: usize) -> Self {
        Self {
            first_message: true,
            rounds_since_todo_update: 0,
            nag_after_rounds,
        }
    }

    pub fn pending(&self) -> Vec<Reminder> {
        let mut reminders = Vec::new();
        if self.first_message {
            reminders.push(Reminder::FirstMessage);
        }
        if self.rounds_since_todo_update >= self.nag_after_rounds {
            reminders.push(Reminder::TodoNag);
        }
        reminders.sort();
        reminders
    }

    pub fn on_user_turn(&mut self) {
        self.first_message = false;
    }

    /// Account for one completed round of tool calls.
    pub fn record_tool_calls<S: AsRef<str>>(&mut self, names: &[S]) {
        if names.iter().any(|name| name.as_ref() == TODO_WRITE_TOOL) {
            self.rounds_since_todo_update = 0;
        } else {
            self.rounds_since_todo_update += 1;
        }
    }

    pub fn rounds_since_todo_update(&self) -> usize {
        self.rounds_since_todo_update
    }

    pub fn reset(&mut self) {
        self.first_message = true;
        self.rounds_since_todo_update = 0;
    }
}
