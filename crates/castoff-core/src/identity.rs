//! Release identity derivation from the triggering version tag.
//!
//! The resolver is pure: the same tag, project name, and changelog always
//! produce the same [`ReleaseIdentity`], so it is testable in isolation
//! from the rest of the pipeline.

use castoff_store::ReleaseIdentity;
use regex::Regex;

use crate::error::{ReleaseError, Result};

/// Expected version-tag shape: `v<major>.<minor>.<patch>[-<pre-release>]`.
const TAG_PATTERN: &str = r"^v\d+\.\d+\.\d+(?:-[0-9A-Za-z.-]+)?$";

/// Derives the release identity (tag, display name, notes) for a run.
pub struct TagResolver {
    project_name: String,
    changelog: Option<String>,
    tag_re: Regex,
}

impl TagResolver {
    /// Create a resolver for a project.
    pub fn new(project_name: &str) -> Self {
        Self {
            project_name: project_name.to_string(),
            changelog: None,
            tag_re: Regex::new(TAG_PATTERN).expect("tag pattern is valid"),
        }
    }

    /// Attach changelog text used to derive release notes.
    pub fn with_changelog(mut self, changelog: &str) -> Self {
        self.changelog = Some(changelog.to_string());
        self
    }

    /// Validate the raw tag and derive the release identity.
    ///
    /// Fails with `ReleaseError::InvalidTag` for an empty or malformed tag.
    pub fn resolve(&self, raw_tag: &str) -> Result<ReleaseIdentity> {
        if raw_tag.is_empty() {
            return Err(ReleaseError::InvalidTag("tag is empty".to_string()));
        }
        if !self.tag_re.is_match(raw_tag) {
            return Err(ReleaseError::InvalidTag(format!(
                "tag '{raw_tag}' does not match {TAG_PATTERN}"
            )));
        }

        let notes = self
            .changelog
            .as_deref()
            .and_then(|text| changelog_section(text, raw_tag))
            .unwrap_or_else(|| format!("Release {raw_tag}"));

        Ok(ReleaseIdentity {
            tag: raw_tag.to_string(),
            display_name: format!("{} {raw_tag}", self.project_name),
            notes,
        })
    }
}

/// Extract the changelog section for a tag.
///
/// Matches a `## v1.2.3` or `## 1.2.3` heading and returns the body up to
/// the next `## ` heading, trimmed. Returns `None` when no section exists.
fn changelog_section(changelog: &str, tag: &str) -> Option<String> {
    let version = tag.trim_start_matches('v');
    let mut collecting = false;
    let mut body = Vec::new();

    for line in changelog.lines() {
        if let Some(heading) = line.strip_prefix("## ") {
            if collecting {
                break;
            }
            let heading_version = heading
                .split_whitespace()
                .next()
                .unwrap_or("")
                .trim_start_matches('v');
            if heading_version == version {
                collecting = true;
            }
            continue;
        }
        if collecting {
            body.push(line);
        }
    }

    if !collecting {
        return None;
    }
    let text = body.join("\n").trim().to_string();
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}
