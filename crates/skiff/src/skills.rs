use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::debug;

/// A named block of reusable instructions
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Skill {
    pub name: String,
    pub description: String,
    pub body: String,
}

impl Skill {
    pub fn new<N, D, B>(name: N, description: D, body: B) -> Self
    where
        N: Into<String>,
        D: Into<String>,
        B: Into<String>,
    {
        Self {
            name: name.into(),
            description: description.into(),
            body: body.into(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SkillLibrary {
    skills: Vec<Skill>,
}

impl SkillLibrary {
    pub fn new(mut skills: Vec<Skill>) -> Self {
        skills.sort_by(|a, b| a.name.cmp(&b.name));
        Self { skills }
    }

    /// Load every `*.md` file in `dir`. The file stem is the skill name and the
    /// first non-empty line its description. A missing directory is an empty library.
    pub fn load_dir(dir: &Path) -> Result<Self> {
        if !dir.is_dir() {
            return Ok(Self::default());
        }

        let mut skills = Vec::new();
        for entry in std::fs::read_dir(dir)
            .with_context(|| format!("Failed to read skills directory {}", dir.display()))?
        {
            let path = entry?.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("md") {
                continue;
            }
            let Some(name) = path.file_stem().and_then(|stem| stem.to_str()) else {
                continue;
            };

            let body = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read skill {}", path.display()))?;
            let description = body
                .lines()
                .map(|line| line.trim().trim_start_matches('#').trim())
                .find(|line| !line.is_empty())
                .unwrap_or_default()
                .to_string();

            debug!(skill = %name, "loaded skill");
            skills.push(Skill::new(name, description, body));
        }
        Ok(Self::new(skills))
    }

    pub fn is_empty(&self) -> bool {
        self.skills.is_empty()
    }

    pub fn skills(&self) -> &[Skill] {
        &self.skills
    }

    pub fn names(&self) -> Vec<&str> {
        self.skills.iter().map(|skill| skill.name.as_str()).collect()
    }

    /// One `- name: description` line per skill
    pub fn descriptions(&self) -> String {
        self.skills
            .iter()
            .map(|skill| format!("- {}: {}", skill.name, skill.description))
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn render(&self, name: &str, arguments: &str) -> Option<String> {
        self.skills
            .iter()
            .find(|skill| skill.name == name)
            .map(|skill| skill.body.replace("$ARGUMENTS", arguments))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("commit.md"),
            "\n# Write a commit message\n\nSummarize $ARGUMENTS.\n",
        )
        .unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let library = SkillLibrary::load_dir(dir.path()).unwrap();
        assert_eq!(library.names(), vec!["commit"]);
        assert_eq!(library.descriptions(), "- commit: Write a commit message");
        assert_eq!(
            library.render("commit", "the diff").unwrap(),
            "\n# Write a commit message\n\nSummarize the diff.\n"
        );
        assert!(library.render("missing", "").is_none());
    }

    #[test]
    fn test_missing_dir_is_empty() {
        let library = SkillLibrary::load_dir(Path::new("/definitely/not/here")).unwrap();
        assert!(library.is_empty());
        assert_eq!(library.descriptions(), "");
    }
}
