use std::sync::{Mutex, MutexGuard};

use console::{style, Term};
use skiff::subagent::{AgentType, TaskProgress};

type TaskKey = (AgentType, String);

/// Live status lines, one per running subagent, in start order
#[derive(Debug, Default)]
struct StatusBoard {
    lines: Vec<(TaskKey, String)>,
    drawn: usize,
}

impl StatusBoard {
    fn set(&mut self, key: TaskKey, line: String) {
        match self.lines.iter_mut().find(|(existing, _)| *existing == key) {
            Some(entry) => entry.1 = line,
            None => self.lines.push((key, line)),
        }
    }

    fn remove(&mut self, key: &TaskKey) {
        self.lines.retain(|(existing, _)| existing != key);
    }

    fn lines(&self) -> Vec<&str> {
        self.lines.iter().map(|(_, line)| line.as_str()).collect()
    }
}

/// Keeps one status line per running subagent on stderr, redrawn in place
/// as the children call tools. Finished tasks leave a permanent summary line.
pub struct ConsoleProgress {
    term: Term,
    board: Mutex<StatusBoard>,
}

impl ConsoleProgress {
    pub fn new() -> Self {
        Self {
            term: Term::stderr(),
            board: Mutex::new(StatusBoard::default()),
        }
    }

    fn board(&self) -> MutexGuard<'_, StatusBoard> {
        self.board.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Announce a tool the main agent is about to run
    pub fn tool_started(&self, tool_name: &str) {
        let line = format!("{} {}", style("●").cyan(), style(tool_name).bold());
        self.redraw(&mut self.board(), Some(&line));
    }

    /// Print `permanent` above the live lines, then redraw them. Without a
    /// terminal only permanent lines are written.
    fn redraw(&self, board: &mut StatusBoard, permanent: Option<&str>) {
        if self.term.is_term() {
            let _ = self.term.clear_last_lines(board.drawn);
            if let Some(line) = permanent {
                let _ = self.term.write_line(line);
            }
            for line in board.lines() {
                let _ = self.term.write_line(&style(line).dim().to_string());
            }
            board.drawn = board.lines.len();
        } else if let Some(line) = permanent {
            let _ = self.term.write_line(line);
        }
    }
}

fn status_line(
    agent_type: AgentType,
    description: &str,
    tool_name: &str,
    tool_count: usize,
    elapsed_secs: f64,
) -> String {
    let calls = if tool_count == 1 { "call" } else { "calls" };
    format!(
        "  {}({}) {} · {} tool {} · {:.1}s",
        agent_type, description, tool_name, tool_count, calls, elapsed_secs
    )
}

fn finish_line(agent_type: AgentType, description: &str, success: bool, elapsed_secs: f64) -> String {
    let mark = if success { "✓" } else { "✗" };
    let outcome = if success { "done" } else { "failed" };
    format!(
        "  {} {}({}) {} in {:.1}s",
        mark, agent_type, description, outcome, elapsed_secs
    )
}

impl TaskProgress for ConsoleProgress {
    fn start(&self, agent_type: AgentType, description: &str) {
        let mut board = self.board();
        board.set(
            (agent_type, description.to_string()),
            format!("  {}({}) starting", agent_type, description),
        );
        self.redraw(&mut board, None);
    }

    fn update(
        &self,
        agent_type: AgentType,
        description: &str,
        tool_name: &str,
        tool_count: usize,
        elapsed_secs: f64,
    ) {
        let mut board = self.board();
        board.set(
            (agent_type, description.to_string()),
            status_line(agent_type, description, tool_name, tool_count, elapsed_secs),
        );
        self.redraw(&mut board, None);
    }

    fn finish(&self, agent_type: AgentType, description: &str, success: bool, elapsed_secs: f64) {
        let mut board = self.board();
        board.remove(&(agent_type, description.to_string()));
        let line = finish_line(agent_type, description, success, elapsed_secs);
        let line = if success {
            style(line).green().to_string()
        } else {
            style(line).red().to_string()
        };
        self.redraw(&mut board, Some(&line));
    }
}
