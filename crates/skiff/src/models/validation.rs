use thiserror::Error;

/// Structural problems in a payload coming from the model. These are never fatal:
/// they are rendered back to the model as a tool result so it can correct itself.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("tool result '{id}' does not answer any outstanding tool use")]
    UnknownToolResult { id: String },

    #[error("tool use '{id}' was answered more than once")]
    DuplicateToolResult { id: String },

    #[error("tool use '{id}' has no matching tool result")]
    MissingToolResult { id: String },

    #[error("only one todo may be in_progress at a time, found {count}")]
    MultipleInProgress { count: usize },

    #[error("todo list has {count} items, the maximum is {max}")]
    TooManyTodos { count: usize, max: usize },

    #[error("todo id '{id}' appears more than once")]
    DuplicateTodoId { id: String },

    #[error("todo '{id}' has empty content")]
    EmptyTodoContent { id: String },
}
