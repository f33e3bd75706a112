//! Dump extraction and markup conversion configuration

use serde::{Deserialize, Serialize};

/// Default read block size (1 MiB)
pub const DEFAULT_BLOCK_SIZE: usize = 1024 * 1024;

/// Streaming extraction configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractConfig {
    /// Bytes requested from the input per read
    pub block_size: usize,
    /// Title prefixes (before the first ':') whose pages are dropped, matched case-insensitively
    pub ignored_namespaces: Vec<String>,
    /// Drop pages carrying a redirect marker
    pub skip_redirects: bool,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            block_size: DEFAULT_BLOCK_SIZE,
            ignored_namespaces: vec![
                "wikipedia".to_string(),
                "category".to_string(),
                "template".to_string(),
            ],
            skip_redirects: true,
        }
    }
}

/// What to do with a page whose markup cannot be converted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarkupErrorPolicy {
    /// Log the failure, drop the page and keep going
    Skip,
    /// Stop the whole run on the first failure
    Abort,
}

/// Markup conversion configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConvertConfig {
    /// Replace page markup by its plain-text rendering before writing
    pub convert_markup: bool,
    /// Handling of unconvertible pages
    pub on_markup_error: MarkupErrorPolicy,
}

impl Default for ConvertConfig {
    fn default() -> Self {
        Self {
            convert_markup: true,
            on_markup_error: MarkupErrorPolicy::Skip,
        }
    }
}
