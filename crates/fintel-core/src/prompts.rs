//! Prompt library for the remote model
//!
//! Prompts are loaded with a two-layer resolution:
//! 1. Check for override in data dir (~/.local/share/fintel/prompts/overrides/)
//! 2. Fall back to embedded defaults (compiled into binary)
//!
//! There is one prompt per analysis kind, named after `AnalysisKind::as_str`.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use serde::Deserialize;

use crate::config::AnalysisKind;
use crate::error::{Error, Result};

/// Embedded default prompts (compiled into binary)
mod defaults {
    pub const CATEGORIZE_TRANSACTIONS: &str =
        include_str!("../../../prompts/categorize_transactions.md");
    pub const IDENTIFY_PATTERNS: &str = include_str!("../../../prompts/identify_patterns.md");
    pub const DETECT_ANOMALIES: &str = include_str!("../../../prompts/detect_anomalies.md");
    pub const GENERATE_PREDICTIONS: &str =
        include_str!("../../../prompts/generate_predictions.md");
}

fn default_content(kind: AnalysisKind) -> &'static str {
    match kind {
        AnalysisKind::CategorizeTransactions => defaults::CATEGORIZE_TRANSACTIONS,
        AnalysisKind::IdentifyPatterns => defaults::IDENTIFY_PATTERNS,
        AnalysisKind::DetectAnomalies => defaults::DETECT_ANOMALIES,
        AnalysisKind::GeneratePredictions => defaults::GENERATE_PREDICTIONS,
    }
}

/// Prompt frontmatter metadata
#[derive(Debug, Clone, Deserialize)]
pub struct PromptMetadata {
    /// Unique identifier
    pub id: String,
    /// Version number for tracking changes
    pub version: u32,
    /// Analysis the prompt serves
    pub task_type: String,
}

/// A loaded prompt with metadata and content
#[derive(Debug, Clone)]
pub struct Prompt {
    pub metadata: PromptMetadata,
    /// The prompt content (system + user sections)
    pub content: String,
    /// Whether this came from an override file
    pub is_override: bool,
    pub override_path: Option<PathBuf>,
}

/// A prompt rendered for one request
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedPrompt {
    pub system: Option<String>,
    pub user: String,
}

impl Prompt {
    /// Get the system section of the prompt
    pub fn system_section(&self) -> Option<&str> {
        extract_section(&self.content, "# System")
    }

    /// Get the user section of the prompt
    pub fn user_section(&self) -> Option<&str> {
        extract_section(&self.content, "# User")
    }

    /// Render the whole prompt with template variables replaced
    pub fn render(&self, vars: &HashMap<&str, String>) -> String {
        render_template(&self.content, vars)
    }

    /// Render system and user sections separately
    ///
    /// A prompt without a `# User` section is sent whole as the user message.
    pub fn render_parts(&self, vars: &HashMap<&str, String>) -> RenderedPrompt {
        match self.user_section() {
            Some(user) => RenderedPrompt {
                system: self.system_section().map(|s| render_template(s, vars)),
                user: render_template(user, vars),
            },
            None => RenderedPrompt {
                system: None,
                user: self.render(vars),
            },
        }
    }
}

/// Prompt library for loading prompts
#[derive(Debug, Clone)]
pub struct PromptLibrary {
    override_dir: Option<PathBuf>,
}

impl PromptLibrary {
    /// Create a new prompt library with default paths
    pub fn new() -> Self {
        Self {
            override_dir: default_prompts_dir(),
        }
    }

    /// Create a prompt library with a custom override directory
    pub fn with_override_dir(path: PathBuf) -> Self {
        Self {
            override_dir: Some(path),
        }
    }

    /// Create a prompt library with no override directory (embedded only)
    pub fn embedded_only() -> Self {
        Self { override_dir: None }
    }

    /// Get the prompt for an analysis, loading from override or default
    pub fn get(&self, kind: AnalysisKind) -> Result<Prompt> {
        if let Some(override_path) = self.override_path(kind) {
            if override_path.exists() {
                let content = fs::read_to_string(&override_path).map_err(|e| {
                    Error::Prompt(format!("Failed to read prompt override: {}", e))
                })?;
                let (metadata, body) = parse_prompt(&content)?;
                tracing::debug!(prompt = %kind, path = %override_path.display(), "Using prompt override");
                return Ok(Prompt {
                    metadata,
                    content: body,
                    is_override: true,
                    override_path: Some(override_path),
                });
            }
        }

        let (metadata, body) = parse_prompt(default_content(kind))?;
        Ok(Prompt {
            metadata,
            content: body,
            is_override: false,
            override_path: None,
        })
    }

    /// List all prompts with their override status
    pub fn list(&self) -> Vec<PromptInfo> {
        AnalysisKind::all()
            .iter()
            .map(|&kind| {
                let prompt = self.get(kind).ok();
                let has_override = self.has_override(kind);
                PromptInfo {
                    id: kind.as_str().to_string(),
                    version: prompt.as_ref().map(|p| p.metadata.version).unwrap_or(0),
                    has_override,
                    override_path: if has_override {
                        self.override_path(kind)
                    } else {
                        None
                    },
                }
            })
            .collect()
    }

    /// Check if a prompt has an override file
    pub fn has_override(&self, kind: AnalysisKind) -> bool {
        self.override_path(kind).is_some_and(|p| p.exists())
    }

    /// Get the override directory path
    pub fn override_dir(&self) -> Option<&PathBuf> {
        self.override_dir.as_ref()
    }

    fn override_path(&self, kind: AnalysisKind) -> Option<PathBuf> {
        self.override_dir
            .as_ref()
            .map(|d| d.join(format!("{}.md", kind.as_str())))
    }
}

impl Default for PromptLibrary {
    fn default() -> Self {
        Self::new()
    }
}

/// Information about a prompt for listing
#[derive(Debug, Clone, serde::Serialize)]
pub struct PromptInfo {
    pub id: String,
    pub version: u32,
    pub has_override: bool,
    pub override_path: Option<PathBuf>,
}

/// Default prompts override directory
pub fn default_prompts_dir() -> Option<PathBuf> {
    dirs::data_local_dir().map(|d| d.join("fintel").join("prompts").join("overrides"))
}

/// Parse a prompt file into metadata and body
fn parse_prompt(content: &str) -> Result<(PromptMetadata, String)> {
    let content = content.trim();

    if !content.starts_with("---") {
        return Err(Error::Prompt(
            "Prompt must start with YAML frontmatter (---)".into(),
        ));
    }

    let rest = &content[3..];
    let end = rest.find("---").ok_or_else(|| {
        Error::Prompt("Prompt frontmatter not closed (missing second ---)".into())
    })?;

    let frontmatter = rest[..end].trim();
    let body = rest[end + 3..].trim();

    let metadata: PromptMetadata = serde_yaml::from_str(frontmatter)
        .map_err(|e| Error::Prompt(format!("Invalid prompt frontmatter: {}", e)))?;

    Ok((metadata, body.to_string()))
}

/// Extract a section from the prompt content
fn extract_section<'a>(content: &'a str, header: &str) -> Option<&'a str> {
    let start = content.find(header)?;
    let after_header = &content[start + header.len()..];

    // Find the next header or end of content
    let end = after_header.find("\n# ").unwrap_or(after_header.len());

    Some(after_header[..end].trim())
}

/// Replace `{{var}}` placeholders, then resolve `{{#if var}}` blocks
fn render_template(template: &str, vars: &HashMap<&str, String>) -> String {
    let mut result = template.to_string();
    for (key, value) in vars {
        let pattern = format!("{{{{{}}}}}", key);
        result = result.replace(&pattern, value);
    }
    resolve_conditionals(&result, vars)
}

/// Keep `{{#if var}}...{{/if}}` blocks whose variable is non-empty, drop the rest
fn resolve_conditionals(content: &str, vars: &HashMap<&str, String>) -> String {
    let mut result = content.to_string();

    while let Some(if_start) = result.find("{{#if ") {
        let var_start = if_start + 6;
        let Some(var_end) = result[var_start..].find("}}") else {
            break;
        };
        let var_name = &result[var_start..var_start + var_end];
        let block_start = var_start + var_end + 2;

        let Some(endif_pos) = result[block_start..].find("{{/if}}") else {
            break;
        };
        let block_content = &result[block_start..block_start + endif_pos];
        let full_end = block_start + endif_pos + 7;

        let include = vars.get(var_name).is_some_and(|v| !v.is_empty());
        result = if include {
            format!("{}{}{}", &result[..if_start], block_content, &result[full_end..])
        } else {
            format!("{}{}", &result[..if_start], &result[full_end..])
        };
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&'static str, &str)]) -> HashMap<&'static str, String> {
        pairs.iter().map(|(k, v)| (*k, v.to_string())).collect()
    }

    #[test]
    fn test_parse_prompt() {
        let content = r#"---
id: test_prompt
version: 2
task_type: detect_anomalies
---

# System
Test system prompt.

# User
Test user prompt with {{variable}}.
"#;

        let (metadata, body) = parse_prompt(content).unwrap();
        assert_eq!(metadata.id, "test_prompt");
        assert_eq!(metadata.version, 2);
        assert_eq!(metadata.task_type, "detect_anomalies");
        assert!(body.contains("# System"));
        assert!(body.contains("# User"));
    }

    #[test]
    fn test_parse_prompt_requires_frontmatter() {
        assert!(parse_prompt("# User\nhello").is_err());
        assert!(parse_prompt("---\nid: x\n# User\nhello").is_err());
    }

    #[test]
    fn test_extract_section() {
        let content = "# System\nSystem content here.\n\n# User\nUser content here.";

        assert_eq!(
            extract_section(content, "# System"),
            Some("System content here.")
        );
        assert_eq!(
            extract_section(content, "# User"),
            Some("User content here.")
        );
    }

    #[test]
    fn test_conditional_blocks() {
        let template = "Start{{#if budgets}}\nBudgets: {{budgets}}{{/if}}\nEnd";

        let rendered = render_template(template, &vars(&[("budgets", "Groceries")]));
        assert!(rendered.contains("Budgets: Groceries"));

        let rendered = render_template(template, &vars(&[("budgets", "")]));
        assert!(!rendered.contains("Budgets:"));
        assert!(rendered.contains("Start"));
        assert!(rendered.contains("End"));
    }

    #[test]
    fn test_embedded_prompts_parse_and_match_kind() {
        let lib = PromptLibrary::embedded_only();
        for kind in AnalysisKind::all() {
            let prompt = lib.get(*kind).unwrap();
            assert_eq!(prompt.metadata.id, kind.as_str());
            assert!(!prompt.is_override);
            assert!(prompt.system_section().is_some());
            assert!(prompt.user_section().unwrap().contains("{{transactions}}"));
        }
    }

    #[test]
    fn test_render_parts() {
        let lib = PromptLibrary::embedded_only();
        let prompt = lib.get(AnalysisKind::GeneratePredictions).unwrap();
        let rendered = prompt.render_parts(&vars(&[
            ("transactions", "[]"),
            ("categories", "[]"),
            ("horizon", "next 3 months"),
            ("as_of", "2024-06-01"),
            ("budgets", ""),
        ]));

        assert!(rendered.system.unwrap().contains("JSON only"));
        assert!(rendered.user.contains("Today is 2024-06-01"));
        assert!(rendered.user.contains("next 3 months"));
        assert!(!rendered.user.contains("{{"));
        assert!(!rendered.user.contains("Monthly budgets"));
    }

    #[test]
    fn test_override_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("detect_anomalies.md"),
            "---\nid: detect_anomalies\nversion: 7\ntask_type: detect_anomalies\n---\n\n# User\nCustom {{transactions}}",
        )
        .unwrap();

        let lib = PromptLibrary::with_override_dir(dir.path().to_path_buf());
        let prompt = lib.get(AnalysisKind::DetectAnomalies).unwrap();
        assert!(prompt.is_override);
        assert_eq!(prompt.metadata.version, 7);
        assert!(!lib.get(AnalysisKind::IdentifyPatterns).unwrap().is_override);

        let listed = lib.list();
        assert_eq!(listed.len(), 4);
        let overridden: Vec<_> = listed.iter().filter(|p| p.has_override).collect();
        assert_eq!(overridden.len(), 1);
        assert_eq!(overridden[0].id, "detect_anomalies");
    }
}
