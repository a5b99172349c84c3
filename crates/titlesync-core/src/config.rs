//! Engine configuration for titlesync
//!
//! Persisted as `titlesync.toml`. Every switch the host exposes to users is
//! collected here and handed to the engine at construction; the engine never
//! consults ambient global settings.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SyncError};

/// Default placeholder title when content collapses to nothing
pub const DEFAULT_PLACEHOLDER: &str = "Untitled";

/// Canonical multi-value alias property: always stored as a list, even when a
/// single value remains.
pub const CANONICAL_ALIAS_KEY: &str = "aliases";

/// Engine configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Inclusion/exclusion scope policy
    pub scope: ScopeConfig,
    /// Alias maintenance behavior
    pub alias: AliasConfig,
    /// Title derivation behavior
    pub title: TitleConfig,
    /// Forbidden-character sanitization table
    pub chars: CharConfig,
    /// Custom search/replace rules, applied in order
    pub replacements: Vec<ReplacementRule>,
    /// Safewords that unconditionally block a rename when matched
    pub safewords: Vec<Safeword>,
    /// Rate-limit windows
    pub limits: LimitConfig,
    /// Content-source preference and timing knobs
    pub read: ReadConfig,
    /// User-visible notification mode (manual commands only)
    pub notifications: NotificationMode,
}

impl EngineConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: EngineConfig =
            toml::from_str(&content).map_err(|e| SyncError::InvalidConfig {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| SyncError::Other(format!("failed to serialize config: {}", e)))?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Configured alias property keys (comma-separated list in config)
    pub fn alias_keys(&self) -> Vec<String> {
        self.alias
            .property_keys
            .split(',')
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .collect()
    }
}

/// Scope strategy: how the folder/tag/property lists are interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScopeStrategy {
    /// Process everything except the listed folders/tags/properties
    #[default]
    OnlyExclude,
    /// Process nothing except the listed folders/tags/properties
    ExcludeAllExcept,
}

/// Inclusion/exclusion policy
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScopeConfig {
    pub strategy: ScopeStrategy,
    /// Folder prefixes (vault-relative)
    pub folders: Vec<String>,
    /// Frontmatter tags
    pub tags: Vec<String>,
    /// Frontmatter property keys (presence-based)
    pub properties: Vec<String>,
    /// Property key that unconditionally disables processing for a document.
    /// This check cannot be bypassed by any override.
    pub disable_property_key: String,
    /// Value the disable property must hold to take effect
    pub disable_property_value: String,
}

impl Default for ScopeConfig {
    fn default() -> Self {
        ScopeConfig {
            strategy: ScopeStrategy::default(),
            folders: Vec::new(),
            tags: Vec::new(),
            properties: Vec::new(),
            disable_property_key: "titlesync".to_string(),
            disable_property_value: "off".to_string(),
        }
    }
}

/// Alias maintenance behavior
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AliasConfig {
    pub enabled: bool,
    /// Comma-separated frontmatter keys to maintain the alias in
    pub property_keys: String,
    /// Truncate the alias the same way the filename is truncated
    pub truncate: bool,
    /// Only keep an alias when it differs from the filename
    pub add_only_if_differs: bool,
    /// Keep an emptied property as an explicit empty value instead of deleting it
    pub keep_empty_property: bool,
    /// Move the engine-owned value to the end of the list on every update
    pub pin_to_end: bool,
}

impl Default for AliasConfig {
    fn default() -> Self {
        AliasConfig {
            enabled: true,
            property_keys: CANONICAL_ALIAS_KEY.to_string(),
            truncate: false,
            add_only_if_differs: false,
            keep_empty_property: false,
            pin_to_end: false,
        }
    }
}

/// Order of the configurable transform steps. Character sanitization always
/// runs last so the result is a legal filename.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TransformOrder {
    #[default]
    ReplaceThenStrip,
    StripThenReplace,
}

/// Title derivation behavior
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TitleConfig {
    /// Only derive titles from markdown headings
    pub headings_only: bool,
    /// Use the embedded card target when the first line is `![[...]]`
    pub card_link_extraction: bool,
    /// When the first line opens a fenced code block, use the first line
    /// inside the fence instead of the fence itself
    pub use_code_block_content: bool,
    /// When the first line is a table row, use the first cell of the row
    pub use_table_cell: bool,
    /// Strip markdown markup from the derived title
    pub strip_markup: bool,
    /// Order of custom replacements vs markup stripping
    pub transform_order: TransformOrder,
    /// Placeholder used when content is empty or collapses to nothing
    pub placeholder: String,
    /// Maximum filename length in characters (before the extension)
    pub max_length: usize,
}

impl Default for TitleConfig {
    fn default() -> Self {
        TitleConfig {
            headings_only: false,
            card_link_extraction: true,
            use_code_block_content: true,
            use_table_cell: true,
            strip_markup: true,
            transform_order: TransformOrder::default(),
            placeholder: DEFAULT_PLACEHOLDER.to_string(),
            max_length: 100,
        }
    }
}

/// Per-character sanitization rule
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CharRule {
    /// The forbidden character
    pub char: char,
    pub enabled: bool,
    /// Replacement text (empty removes the character)
    pub replacement: String,
    /// Trim whitespace left of the replacement site
    pub trim_left: bool,
    /// Trim whitespace right of the replacement site
    pub trim_right: bool,
}

impl Default for CharRule {
    fn default() -> Self {
        CharRule {
            char: '/',
            enabled: true,
            replacement: String::new(),
            trim_left: false,
            trim_right: false,
        }
    }
}

/// Forbidden-character table
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CharConfig {
    pub rules: Vec<CharRule>,
}

impl Default for CharConfig {
    fn default() -> Self {
        // Characters the underlying stores commonly refuse in filenames
        let forbidden = ['/', '\\', ':', '*', '?', '"', '<', '>', '|', '#', '^', '[', ']'];
        CharConfig {
            rules: forbidden
                .iter()
                .map(|&c| CharRule {
                    char: c,
                    enabled: true,
                    replacement: String::new(),
                    trim_left: false,
                    trim_right: false,
                })
                .collect(),
        }
    }
}

/// Where a rule or safeword applies within the title-source line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MatchScope {
    /// The whole line must equal the text
    WholeLine,
    /// The line must start with the text
    AtStart,
    /// The text may appear anywhere in the line
    #[default]
    Anywhere,
}

/// Custom search/replace rule
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplacementRule {
    pub search: String,
    pub replace: String,
    pub scope: MatchScope,
    pub enabled: bool,
}

impl Default for ReplacementRule {
    fn default() -> Self {
        ReplacementRule {
            search: String::new(),
            replace: String::new(),
            scope: MatchScope::default(),
            enabled: true,
        }
    }
}

/// A safeword unconditionally blocks the rename when matched
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Safeword {
    pub text: String,
    pub scope: MatchScope,
    pub case_sensitive: bool,
    pub enabled: bool,
}

impl Default for Safeword {
    fn default() -> Self {
        Safeword {
            text: String::new(),
            scope: MatchScope::default(),
            case_sensitive: false,
            enabled: true,
        }
    }
}

/// Rate-limit windows (per §limits: tight per key, looser globally)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitConfig {
    pub window_ms: u64,
    pub max_per_key: u32,
    pub max_global: u32,
    /// Ceiling for the conflict-suffix loop
    pub max_conflict_attempts: u32,
}

impl Default for LimitConfig {
    fn default() -> Self {
        LimitConfig {
            window_ms: 500,
            max_per_key: 15,
            max_global: 30,
            max_conflict_attempts: 1000,
        }
    }
}

/// Default content-source strategy when no fresher source is supplied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReadStrategy {
    /// Open edit buffer, then cache, then disk
    #[default]
    PreferBuffer,
    /// Host cache, then disk
    PreferCache,
    /// Forced fresh disk read
    PreferDisk,
}

/// Content-source preference and timing knobs
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReadConfig {
    pub strategy: ReadStrategy,
    /// Suppression window for stale events after a rename
    pub recently_renamed_ms: u64,
    /// Settle delay before a follow-up recheck
    pub recheck_delay_ms: u64,
    /// Minimum supplied-text/full-document length ratio (percent) below which
    /// an edit is treated as an isolated nested-region edit and skipped
    pub partial_edit_threshold_pct: u32,
}

impl Default for ReadConfig {
    fn default() -> Self {
        ReadConfig {
            strategy: ReadStrategy::default(),
            recently_renamed_ms: 700,
            recheck_delay_ms: 150,
            partial_edit_threshold_pct: 50,
        }
    }
}

/// When manual commands surface success/failure toasts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NotificationMode {
    Always,
    #[default]
    OnChange,
    Never,
}
