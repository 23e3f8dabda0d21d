//! Skill bundle fetch — reads a bundle rooted at the worker's skills
//! directory (spec.md §2 "fetches skill bundles from the node on demand",
//! §3 "Skill" manifest frontmatter `{name, description, script, language,
//! install}").
//!
//! Mirrors the frontmatter-parsing shape of the gateway-side skill loader
//! (`scalyclaw-agent::tools::skill::parse_skill_md`) but reads the
//! execution-relevant keys rather than the prompt-injection ones.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{Result, WorkerError};

#[derive(Debug, Clone, Deserialize)]
pub struct SkillManifest {
    pub name: String,
    pub description: String,
    /// Path to the script file, relative to the skill's own directory.
    pub script: Option<String>,
    /// Interpreter used to run `script` (e.g. `bash`, `python3`, `node`).
    #[serde(default = "default_language")]
    pub language: String,
    /// Shell command run once before the first invocation (dependency install).
    pub install: Option<String>,
}

fn default_language() -> String {
    "bash".to_string()
}

pub struct SkillBundle {
    pub manifest: SkillManifest,
    pub dir: PathBuf,
}

/// Resolve `{skills_dir}/{skill_id}/SKILL.md`, parse its frontmatter, and
/// return the bundle. `skill_id` must end in `-skill` per spec.md §3, but
/// that's validated by the registering side — this just reads the bundle.
pub fn load_bundle(skills_dir: &str, skill_id: &str) -> Result<SkillBundle> {
    if skill_id.contains("..") || skill_id.contains('/') {
        return Err(WorkerError::PathTraversal(skill_id.to_string()));
    }
    let dir = Path::new(skills_dir).join(skill_id);
    let manifest_path = dir.join("SKILL.md");
    let raw = std::fs::read_to_string(&manifest_path)
        .map_err(|_| WorkerError::SkillNotFound(skill_id.to_string()))?;

    let trimmed = raw.trim_start();
    if !trimmed.starts_with("---") {
        return Err(WorkerError::InvalidManifest(format!(
            "{skill_id}: missing frontmatter"
        )));
    }
    let after_first = &trimmed[3..];
    let closing_idx = after_first
        .find("\n---")
        .ok_or_else(|| WorkerError::InvalidManifest(format!("{skill_id}: unterminated frontmatter")))?;
    let yaml_block = &after_first[..closing_idx];

    let manifest: SkillManifest = serde_yaml::from_str(yaml_block)
        .map_err(|e| WorkerError::InvalidManifest(format!("{skill_id}: {e}")))?;

    Ok(SkillBundle { manifest, dir })
}

/// Interpreter command line for a bundle's declared `language`.
pub fn interpreter_for(language: &str) -> &'static str {
    match language {
        "python" | "python3" => "python3",
        "node" | "javascript" | "js" => "node",
        "ruby" => "ruby",
        _ => "bash",
    }
}
