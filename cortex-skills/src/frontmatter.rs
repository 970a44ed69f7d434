//! Parsing for the YAML frontmatter block at the top of a `SKILL.md` file.

use serde::Deserialize;
use thiserror::Error;

/// Recognized frontmatter keys (spec.md §6).
#[derive(Debug, Clone, Deserialize)]
pub struct Frontmatter {
    /// Human-readable skill name.
    pub name: String,
    /// Free-form description; this is what gets embedded.
    pub description: String,
    /// Required capability tag, e.g. `"coding"`.
    #[serde(rename = "required-capability")]
    pub required_capability: String,
}

/// Errors parsing a skill file.
#[derive(Error, Debug)]
pub enum FrontmatterError {
    /// The file didn't open with a `---` delimited block.
    #[error("no YAML frontmatter block found")]
    MissingBlock,
    /// The YAML block failed to parse into the recognized keys.
    #[error("invalid frontmatter YAML: {0}")]
    InvalidYaml(#[from] serde_yaml::Error),
}

/// Splits `content` into its frontmatter and the full file (frontmatter
/// kept in the returned prompt verbatim, per spec.md §6: "Remaining body is
/// free-form Markdown and becomes the system prompt verbatim (including the
/// frontmatter)").
pub fn parse(content: &str) -> Result<Frontmatter, FrontmatterError> {
    let trimmed = content.trim_start();
    let rest = trimmed.strip_prefix("---").ok_or(FrontmatterError::MissingBlock)?;
    let end = rest.find("\n---").ok_or(FrontmatterError::MissingBlock)?;
    let yaml = &rest[..end];
    let frontmatter: Frontmatter = serde_yaml::from_str(yaml)?;
    Ok(frontmatter)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_well_formed_frontmatter() {
        let content = "---\nname: Rust Reviewer\ndescription: Reviews Rust code for idiomatic style\nrequired-capability: coding\n---\n\n# Body\nSystem prompt text.\n";
        let fm = parse(content).unwrap();
        assert_eq!(fm.name, "Rust Reviewer");
        assert_eq!(fm.required_capability, "coding");
    }

    #[test]
    fn missing_delimiter_is_an_error() {
        let content = "name: X\ndescription: Y\n";
        assert!(matches!(parse(content), Err(FrontmatterError::MissingBlock)));
    }

    #[test]
    fn malformed_yaml_is_an_error() {
        let content = "---\nname: [unterminated\n---\nbody\n";
        assert!(matches!(parse(content), Err(FrontmatterError::InvalidYaml(_))));
    }
}
