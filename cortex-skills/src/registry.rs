//! Skill registry: loads `SKILL.md` definitions from a directory tree,
//! embeds their descriptions, and matches queries against them
//! (spec.md §4.3).

use crate::frontmatter;
use cortex_embedding::{cosine, EmbeddingEngine};
use cortex_types::Skill;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use walkdir::WalkDir;

/// Errors surfaced by the registry itself. Malformed individual skill files
/// are logged and skipped, not surfaced as errors (spec.md §4.3).
#[derive(Error, Debug)]
pub enum SkillError {
    /// The skills directory itself could not be walked.
    #[error("failed to read skills directory {path}: {source}")]
    DirectoryRead {
        /// Directory that failed to read.
        path: String,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

/// Loads skill definitions and matches queries against them.
///
/// Read-mostly: all mutation happens at [`Self::load_all`] or inside
/// [`Self::match_skill`] for usage counters (spec.md §5).
pub struct SkillRegistry {
    skills: RwLock<Vec<Skill>>,
    embedding_engine: Option<Arc<EmbeddingEngine>>,
    match_threshold: f32,
}

impl SkillRegistry {
    /// Creates an empty registry. Call [`Self::load_all`] to populate it.
    pub fn new(embedding_engine: Option<Arc<EmbeddingEngine>>, match_threshold: f32) -> Self {
        Self { skills: RwLock::new(Vec::new()), embedding_engine, match_threshold }
    }

    /// Walks `dir` for files whose name case-insensitively equals
    /// `SKILL.md`, parses each, and replaces the registry's skill set.
    /// Embeds each skill's description when an embedding engine was
    /// injected at construction time; otherwise skills carry an empty
    /// embedding (spec.md §3 invariant: length 0 or 384).
    pub async fn load_all(&self, dir: &Path) -> Result<usize, SkillError> {
        if !dir.exists() {
            log::warn!("skills directory {:?} does not exist; registry will be empty", dir);
            *self.skills.write().await = Vec::new();
            return Ok(0);
        }

        let mut loaded = Vec::new();
        for entry in WalkDir::new(dir) {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    log::warn!("error walking skills directory: {e}");
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let is_skill_file = entry
                .file_name()
                .to_str()
                .map(|n| n.eq_ignore_ascii_case("SKILL.md"))
                .unwrap_or(false);
            if !is_skill_file {
                continue;
            }

            match self.load_one(entry.path()).await {
                Ok(skill) => loaded.push(skill),
                Err(e) => log::warn!("skipping malformed skill file {:?}: {}", entry.path(), e),
            }
        }

        let count = loaded.len();
        *self.skills.write().await = loaded;
        Ok(count)
    }

    async fn load_one(&self, path: &Path) -> Result<Skill, String> {
        let content = fs::read_to_string(path).map_err(|e| e.to_string())?;
        let fm = frontmatter::parse(&content).map_err(|e| e.to_string())?;

        let id = path
            .parent()
            .and_then(|p| p.file_name())
            .and_then(|n| n.to_str())
            .unwrap_or("unknown")
            .to_string();

        let embedding = if let Some(engine) = &self.embedding_engine {
            engine.embed(&fm.description).await.map_err(|e| e.to_string())?
        } else {
            Vec::new()
        };

        Ok(Skill {
            id,
            name: fm.name,
            description: fm.description,
            required_capability: fm.required_capability,
            system_prompt: content,
            embedding,
            usage_count: 0,
        })
    }

    /// Returns the argmax-similarity skill for `query_embedding`, provided
    /// its similarity clears the registry's threshold; otherwise `None`
    /// (spec.md §4.3: below-threshold is not an error). Increments the
    /// winning skill's usage counter.
    pub async fn match_skill(&self, query_embedding: &[f32]) -> Option<Skill> {
        if query_embedding.is_empty() {
            return None;
        }
        let best_index = {
            let skills = self.skills.read().await;
            let mut best: Option<(usize, f32)> = None;
            for (i, skill) in skills.iter().enumerate() {
                if skill.embedding.is_empty() {
                    continue;
                }
                let sim = cosine(query_embedding, &skill.embedding);
                if best.map(|(_, b)| sim > b).unwrap_or(true) {
                    best = Some((i, sim));
                }
            }
            best.filter(|&(_, sim)| sim >= self.match_threshold).map(|(i, _)| i)
        }?;

        let mut skills = self.skills.write().await;
        let skill = skills.get_mut(best_index)?;
        skill.usage_count += 1;
        Some(skill.clone())
    }

    /// Number of loaded skills.
    pub async fn len(&self) -> usize {
        self.skills.read().await.len()
    }

    /// Whether the registry currently has no loaded skills.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// All skills with the given required capability.
    pub async fn by_capability(&self, capability: &str) -> Vec<Skill> {
        self.skills
            .read()
            .await
            .iter()
            .filter(|s| s.required_capability == capability)
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    fn write_skill(dir: &Path, id: &str, description: &str) {
        let skill_dir = dir.join(id);
        fs::create_dir_all(&skill_dir).unwrap();
        let content = format!(
            "---\nname: {id}\ndescription: {description}\nrequired-capability: coding\n---\n\nBody text.\n"
        );
        fs::write(skill_dir.join("SKILL.md"), content).unwrap();
    }

    #[tokio::test]
    async fn loads_skills_from_nested_directories() {
        let dir = tempdir().unwrap();
        write_skill(dir.path(), "rust-reviewer", "Reviews Rust code");
        write_skill(dir.path(), "sql-helper", "Writes SQL queries");

        let registry = SkillRegistry::new(None, 0.80);
        let count = registry.load_all(dir.path()).await.unwrap();
        assert_eq!(count, 2);
        assert_eq!(registry.len().await, 2);
    }

    #[tokio::test]
    async fn skills_without_engine_have_empty_embeddings() {
        let dir = tempdir().unwrap();
        write_skill(dir.path(), "rust-reviewer", "Reviews Rust code");

        let registry = SkillRegistry::new(None, 0.80);
        registry.load_all(dir.path()).await.unwrap();
        let matches = registry.by_capability("coding").await;
        assert_eq!(matches.len(), 1);
        assert!(matches[0].embedding.is_empty());
    }

    #[tokio::test]
    async fn malformed_skill_files_are_skipped_not_fatal() {
        let dir = tempdir().unwrap();
        let bad_dir = dir.path().join("broken");
        fs::create_dir_all(&bad_dir).unwrap();
        fs::write(bad_dir.join("SKILL.md"), "not frontmatter at all").unwrap();
        write_skill(dir.path(), "good", "A good skill");

        let registry = SkillRegistry::new(None, 0.80);
        let count = registry.load_all(dir.path()).await.unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn match_skill_below_threshold_returns_none() {
        let registry = SkillRegistry::new(None, 0.80);
        // No skills loaded at all -- any query should miss.
        let result = registry.match_skill(&[1.0, 0.0, 0.0]).await;
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn empty_query_embedding_never_matches() {
        let registry = SkillRegistry::new(None, 0.0);
        let result = registry.match_skill(&[]).await;
        assert!(result.is_none());
    }
}
