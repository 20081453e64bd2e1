pub mod agent;
pub mod config;
pub mod errors;
pub mod models;
pub mod prompt_template;
pub mod providers;
pub mod reminder;
pub mod security;
pub mod skills;
pub mod state;
pub mod subagent;
pub mod todo;
pub mod tools;
