//! Skill registry for the Cortex router (spec.md §4.3).

pub mod frontmatter;
pub mod registry;

pub use frontmatter::{Frontmatter, FrontmatterError};
pub use registry::{SkillError, SkillRegistry};
