//! Chooses which server folders an all-folder sync visits
//!
//! Matching is case-insensitive: a folder is selected when its name equals an
//! `exact` pattern or contains any `contains` pattern. `INBOX` is always synced.

use std::sync::LazyLock;

use aho_corasick::AhoCorasick;
use domain::INBOX_FOLDER;
use serde::{Deserialize, Serialize};

use crate::error::ApplicationError;

/// Folder name patterns, usually loaded from configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FolderPatterns {
    pub exact: Vec<String>,
    pub contains: Vec<String>,
}

impl Default for FolderPatterns {
    fn default() -> Self {
        Self {
            exact: vec!["inbox".to_string()],
            contains: [
                "spam", "junk", "스팸", "bulk", "sent", "보낸", "important", "starred", "중요",
            ]
            .into_iter()
            .map(str::to_string)
            .collect(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FolderSelector {
    exact: Vec<String>,
    contains: AhoCorasick,
}

static DEFAULT_SELECTOR: LazyLock<FolderSelector> = LazyLock::new(|| {
    #[allow(clippy::expect_used)] // Infallible with valid static patterns
    FolderSelector::new(&FolderPatterns::default()).expect("Failed to build folder matcher")
});

impl Default for FolderSelector {
    fn default() -> Self {
        DEFAULT_SELECTOR.clone()
    }
}

impl FolderSelector {
    pub fn new(patterns: &FolderPatterns) -> Result<Self, ApplicationError> {
        let contains: Vec<String> = patterns
            .contains
            .iter()
            .map(|p| p.trim().to_lowercase())
            .filter(|p| !p.is_empty())
            .collect();
        let matcher = AhoCorasick::builder()
            .ascii_case_insensitive(true)
            .build(&contains)
            .map_err(|e| ApplicationError::Configuration(format!("Invalid folder patterns: {e}")))?;

        Ok(Self {
            exact: patterns.exact.iter().map(|p| p.trim().to_lowercase()).collect(),
            contains: matcher,
        })
    }

    pub fn is_selected(&self, folder: &str) -> bool {
        let name = folder.to_lowercase();
        self.exact.iter().any(|e| *e == name) || self.contains.is_match(&name)
    }

    /// Filter `folders` in server order, prepending `INBOX` if it was not matched
    pub fn select(&self, folders: &[String]) -> Vec<String> {
        let mut selected: Vec<String> = folders
            .iter()
            .filter(|f| self.is_selected(f))
            .cloned()
            .collect();
        if !selected.iter().any(|f| f.eq_ignore_ascii_case(INBOX_FOLDER)) {
            selected.insert(0, INBOX_FOLDER.to_string());
        }
        selected
    }
}
