use std::path::{Component, Path, PathBuf};

use lazy_static::lazy_static;
use regex::Regex;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SecurityError {
    #[error("Path '{path}' escapes the sandbox root")]
    PathEscape { path: String },

    #[error("Command blocked: matches dangerous pattern ({pattern})")]
    DangerousCommand { pattern: String },

    #[error("Command '{command}' is not allowed in read-only mode")]
    RestrictedCommand { command: String },
}

lazy_static! {
    static ref DANGEROUS_PATTERNS: Vec<(Regex, &'static str)> = vec![
        (
            Regex::new(
                r"(?i)\brm\s+(?:-{1,2}[a-z-]*\s+)*(?:-[a-z]*r[a-z]*|--recursive)\s+(?:-{1,2}[a-z-]*\s+)*(?:/\*?|~/?|\$home|\$\{home\})(?:\s|;|&|\||$)"
            )
            .unwrap(),
            "recursive delete of root or home",
        ),
        (Regex::new(r"(?i)\bmkfs(?:\.\w+)?\b").unwrap(), "filesystem format"),
        (Regex::new(r"(?i)\bdd\b.*\bof=/dev/").unwrap(), "raw device write"),
        (
            Regex::new(r"(?i)>\s*/dev/(?:sd|hd|vd|xvd|nvme|disk)").unwrap(),
            "redirect into disk device",
        ),
        (Regex::new(r"(?i)\bformat\s+[a-z]:").unwrap(), "drive format"),
        (
            Regex::new(r":\(\)\s*\{\s*:\s*\|\s*:\s*&\s*\}\s*;\s*:").unwrap(),
            "fork bomb",
        ),
        (
            Regex::new(r"(?i)\b(?:curl|wget)\b.*\|\s*(?:sudo\s+)?(?:sh|bash|zsh)\b").unwrap(),
            "remote script piped to shell",
        ),
        (
            Regex::new(r"(?i)\bchmod\s+(?:-r\s+)?777\s+/(?:\s|$)").unwrap(),
            "world-writable root",
        ),
        (
            Regex::new(r"(?i)\bchown\s+-r\s+\S+\s+/(?:\s|$)").unwrap(),
            "recursive chown of root",
        ),
        (
            Regex::new(r"(?i)\bsudo\s+(?:reboot|shutdown|halt|poweroff)\b").unwrap(),
            "privileged power control",
        ),
        (
            Regex::new(r"(?i)(?:^|[;&|]\s*)(?:reboot|shutdown|halt|poweroff)\b").unwrap(),
            "power control",
        ),
    ];
}

const READ_ONLY_COMMANDS: &[&str] = &[
    "ls", "cat", "head", "tail", "wc", "find", "grep", "rg", "pwd", "echo", "tree", "file",
    "stat", "du", "df", "which", "whoami", "date", "env", "printenv", "uname", "basename",
    "dirname", "realpath", "sort", "uniq", "diff", "less", "more",
];

const READ_ONLY_GIT_SUBCOMMANDS: &[&str] = &[
    "status", "log", "diff", "show", "branch", "blame", "ls-files", "rev-parse", "remote", "tag",
];

fn normalize(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match normalized.components().next_back() {
                Some(Component::Normal(_)) => {
                    normalized.pop();
                }
                // `..` at the filesystem root stays at the root
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => normalized.push(".."),
            },
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}

/// Resolve `relative` against the sandbox `root` without touching the filesystem.
///
/// A relative `root` is first made absolute against the current directory.
/// Absolute inputs replace the root before the containment check, so they only
/// pass when they already point inside it.
pub fn resolve_sandboxed_path(root: &Path, relative: &str) -> Result<PathBuf, SecurityError> {
    let escape = || SecurityError::PathEscape {
        path: relative.to_string(),
    };
    let root = normalize(&std::path::absolute(root).map_err(|_| escape())?);
    if !root.has_root() {
        return Err(escape());
    }
    let resolved = normalize(&root.join(relative));
    if resolved.starts_with(&root) {
        Ok(resolved)
    } else {
        Err(escape())
    }
}

/// Reject commands that match the destructive-command deny-list.
pub fn check_command_safety(command: &str) -> Result<(), SecurityError> {
    for (pattern, label) in DANGEROUS_PATTERNS.iter() {
        if pattern.is_match(command) {
            return Err(SecurityError::DangerousCommand {
                pattern: label.to_string(),
            });
        }
    }
    Ok(())
}

/// Allow only commands whose leading program is known not to modify anything.
///
/// Only the first program is inspected; `;`, `&&` and pipes are not followed.
pub fn check_read_only_command(command: &str) -> Result<(), SecurityError> {
    let mut tokens = command.split_whitespace();
    let allowed = match tokens.next() {
        Some("git") => tokens
            .next()
            .map(|sub| READ_ONLY_GIT_SUBCOMMANDS.contains(&sub))
            .unwrap_or(false),
        Some(program) => READ_ONLY_COMMANDS.contains(&program),
        None => false,
    };

    if allowed {
        Ok(())
    } else {
        Err(SecurityError::RestrictedCommand {
            command: command.trim().to_string(),
        })
    }
}

fn floor_char_boundary(text: &str, index: usize) -> usize {
    let mut boundary = index.min(text.len());
    while boundary > 0 && !text.is_char_boundary(boundary) {
        boundary -= 1;
    }
    boundary
}

fn truncation_notice(omitted: usize) -> String {
    format!("\n... [output truncated: {} bytes omitted]", omitted)
}

/// Bound `output` to `max_bytes`, keeping the head and appending a notice.
///
/// The result never exceeds `max_bytes`, so truncating twice with the same bound
/// is a no-op.
pub fn truncate(output: &str, max_bytes: usize) -> String {
    if output.len() <= max_bytes {
        return output.to_string();
    }

    // The omitted count can only shrink from here, so this is an upper bound on the notice.
    let notice_budget = truncation_notice(output.len()).len();
    if max_bytes < notice_budget {
        let cut = floor_char_boundary(output, max_bytes);
        return output[..cut].to_string();
    }

    let cut = floor_char_boundary(output, max_bytes - notice_budget);
    let mut truncated = output[..cut].to_string();
    truncated.push_str(&truncation_notice(output.len() - cut));
    truncated
}
