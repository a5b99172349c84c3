//! Alias reconciliation.
//!
//! Each configured frontmatter property carries at most one engine-owned copy
//! of the current title, wrapped in invisible zero-width sentinels. Anything
//! bounded by the sentinel is exclusively engine-owned and safe to replace or
//! delete; every other value is user data and is never touched.

use std::sync::Arc;

use crate::config::{EngineConfig, CANONICAL_ALIAS_KEY};
use crate::error::Result;
use crate::frontmatter::PropertyValue;
use crate::host::DocumentStore;
use crate::title;

/// Zero-width sentinel bounding engine-owned values
pub const MARKER: char = '\u{200B}';

/// Wrap a title in the engine-ownership sentinel
pub fn wrap(value: &str) -> String {
    format!("{MARKER}{value}{MARKER}")
}

/// Whether a value is engine-owned
pub fn is_marked(value: &str) -> bool {
    value.len() >= 2 * MARKER.len_utf8() && value.starts_with(MARKER) && value.ends_with(MARKER)
}

/// Strip the sentinel from an engine-owned value
pub fn unwrap_marked(value: &str) -> &str {
    value.trim_matches(MARKER)
}

/// Reconciles engine-owned alias entries with the current title
pub struct AliasManager {
    store: Arc<dyn DocumentStore>,
    config: Arc<EngineConfig>,
}

impl AliasManager {
    pub fn new(store: Arc<dyn DocumentStore>, config: Arc<EngineConfig>) -> Self {
        AliasManager { store, config }
    }

    /// Bring every configured property in line with `alias`.
    ///
    /// `alias` is `None` when the derived title carries no meaning (content
    /// stripped to nothing); stale engine values are then removed and nothing
    /// is written in their place. `filename_stem` is the stem the document is
    /// being renamed to. Returns whether anything changed.
    pub fn reconcile(
        &self,
        path: &str,
        content: &str,
        alias: Option<&str>,
        filename_stem: &str,
        in_batch: bool,
    ) -> Result<bool> {
        if !self.config.alias.enabled {
            return Ok(false);
        }

        let alias = alias.map(|a| {
            if self.config.alias.truncate {
                title::truncate(a, self.config.title.max_length)
            } else {
                a.to_string()
            }
        });

        if self.try_fast_path(path, content, alias.as_deref(), filename_stem, in_batch)? {
            return Ok(true);
        }

        self.rewrite(path, alias.as_deref(), filename_stem)
    }

    /// Targeted in-place substitution of the previous marked value.
    ///
    /// Avoids a full frontmatter rewrite and the host-level "externally
    /// modified" notification a disk rewrite can trigger. Only attempted when
    /// no reordering is required, the operation is not part of a batch, and
    /// every configured property holds exactly one unambiguously locatable
    /// marked value.
    fn try_fast_path(
        &self,
        path: &str,
        content: &str,
        alias: Option<&str>,
        filename_stem: &str,
        in_batch: bool,
    ) -> Result<bool> {
        let Some(alias) = alias else {
            return Ok(false);
        };
        if in_batch || self.config.alias.pin_to_end {
            return Ok(false);
        }
        // Removal cases need the structural path
        if self.config.alias.add_only_if_differs && alias == filename_stem {
            return Ok(false);
        }

        let mapping = match crate::frontmatter::parse(content, path) {
            Ok(mapping) => mapping,
            Err(_) => return Ok(false),
        };

        let new_wrapped = wrap(alias);
        let mut edits: Vec<String> = Vec::new();
        for key in self.config.alias_keys() {
            let values = PropertyValue::from_mapping(&mapping, &key).normalize();
            if values.iter().any(|v| !is_marked(v) && v == alias) {
                // User already carries the value; removal needs the slow path
                return Ok(false);
            }
            let marked: Vec<&String> = values.iter().filter(|v| is_marked(v)).collect();
            let [old] = marked.as_slice() else {
                return Ok(false);
            };
            if content.matches(old.as_str()).count() != 1 {
                return Ok(false);
            }
            if *old != &new_wrapped {
                edits.push((*old).clone());
            }
        }
        if edits.is_empty() {
            // Everything already up to date
            return Ok(false);
        }

        for old in &edits {
            if !self.store.replace_in_buffer(path, old, &new_wrapped)? {
                return Ok(false);
            }
        }
        tracing::debug!(path, "alias updated in place");
        Ok(true)
    }

    /// Full read-modify-write through the host's frontmatter primitive
    fn rewrite(&self, path: &str, alias: Option<&str>, filename_stem: &str) -> Result<bool> {
        let keys = self.config.alias_keys();
        let alias_cfg = self.config.alias.clone();
        let changed = self.store.update_frontmatter(path, &mut |mapping| {
            for key in &keys {
                let existing = PropertyValue::from_mapping(mapping, key).normalize();
                let values = reconcile_values(
                    existing,
                    alias,
                    filename_stem,
                    alias_cfg.add_only_if_differs,
                    alias_cfg.pin_to_end,
                );
                let keep_empty = alias_cfg.keep_empty_property;
                PropertyValue::denormalize(values, key == CANONICAL_ALIAS_KEY)
                    .write_to(mapping, key, keep_empty);
            }
        })?;
        if changed {
            tracing::debug!(path, "alias properties rewritten");
        }
        Ok(changed)
    }
}

/// Compute the new value list for one property.
///
/// User values keep their text and relative order. At most one engine value
/// survives; extras are engine-owned and dropped.
fn reconcile_values(
    existing: Vec<String>,
    alias: Option<&str>,
    filename_stem: &str,
    add_only_if_differs: bool,
    pin_to_end: bool,
) -> Vec<String> {
    let wants_alias = match alias {
        None => None,
        // A redundant alias that merely repeats the filename is removed
        Some(a) if add_only_if_differs && a == filename_stem => None,
        // The user already authored this exact value as a plain entry
        Some(a) if existing.iter().any(|v| !is_marked(v) && v == a) => None,
        Some(a) => Some(wrap(a)),
    };

    let mut out = Vec::with_capacity(existing.len() + 1);
    let mut engine_placed = false;
    for value in existing {
        if !is_marked(&value) {
            out.push(value);
            continue;
        }
        if engine_placed {
            continue;
        }
        engine_placed = true;
        if let Some(wrapped) = &wants_alias {
            if !pin_to_end {
                // Stable position across updates
                out.push(wrapped.clone());
            }
        }
    }

    if let Some(wrapped) = wants_alias {
        if pin_to_end || !engine_placed {
            out.push(wrapped);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AliasConfig;
    use crate::host::memory::MemoryHost;
    use crate::host::DocumentStore;

    fn manager(host: Arc<MemoryHost>, alias: AliasConfig) -> AliasManager {
        let config = EngineConfig {
            alias,
            ..Default::default()
        };
        AliasManager::new(host, Arc::new(config))
    }

    fn default_manager(host: Arc<MemoryHost>) -> AliasManager {
        manager(host, AliasConfig::default())
    }

    #[test]
    fn marker_round_trip() {
        let wrapped = wrap("Hello World");
        assert!(is_marked(&wrapped));
        assert_eq!(unwrap_marked(&wrapped), "Hello World");
        assert!(!is_marked("Hello World"));
        assert!(!is_marked(""));
    }

    #[test]
    fn adds_alias_to_missing_property() {
        let host = Arc::new(MemoryHost::new());
        host.insert("a.md", "# Hello World\n\nBody\n");

        let changed = default_manager(Arc::clone(&host))
            .reconcile("a.md", "# Hello World\n\nBody\n", Some("Hello World"), "x", false)
            .unwrap();
        assert!(changed);

        let content = host.content("a.md").unwrap();
        assert!(content.contains(&wrap("Hello World")));
        assert!(content.starts_with("---\n"));
    }

    #[test]
    fn preserves_user_values_and_position() {
        let host = Arc::new(MemoryHost::new());
        let content = format!(
            "---\naliases:\n  - mine\n  - '{}'\n  - theirs\n---\nbody\n",
            wrap("Old Title")
        );
        host.insert("a.md", &content);

        default_manager(Arc::clone(&host))
            .reconcile("a.md", &content, Some("New Title"), "stem", false)
            .unwrap();

        let updated = host.content("a.md").unwrap();
        let mapping = crate::frontmatter::parse(&updated, "a.md").unwrap();
        let values = PropertyValue::from_mapping(&mapping, "aliases").normalize();
        assert_eq!(
            values,
            vec!["mine".to_string(), wrap("New Title"), "theirs".to_string()]
        );
    }

    #[test]
    fn pin_to_end_moves_engine_value() {
        let host = Arc::new(MemoryHost::new());
        let content = format!(
            "---\naliases:\n  - '{}'\n  - mine\n---\nbody\n",
            wrap("Old")
        );
        host.insert("a.md", &content);

        let alias_cfg = AliasConfig {
            pin_to_end: true,
            ..Default::default()
        };
        manager(Arc::clone(&host), alias_cfg)
            .reconcile("a.md", &content, Some("New"), "stem", false)
            .unwrap();

        let updated = host.content("a.md").unwrap();
        let mapping = crate::frontmatter::parse(&updated, "a.md").unwrap();
        let values = PropertyValue::from_mapping(&mapping, "aliases").normalize();
        assert_eq!(values, vec!["mine".to_string(), wrap("New")]);
    }

    #[test]
    fn alias_equal_to_filename_removes_stale_engine_value() {
        let host = Arc::new(MemoryHost::new());
        let content = format!("---\naliases:\n  - '{}'\n---\nbody\n", wrap("Old"));
        host.insert("a.md", &content);

        let alias_cfg = AliasConfig {
            add_only_if_differs: true,
            ..Default::default()
        };
        manager(Arc::clone(&host), alias_cfg)
            .reconcile("a.md", &content, Some("Same"), "Same", false)
            .unwrap();

        let updated = host.content("a.md").unwrap();
        assert!(!updated.contains(char::from(MARKER)));
        assert!(!updated.contains("aliases"));
    }

    #[test]
    fn user_authored_duplicate_suppresses_engine_value() {
        let host = Arc::new(MemoryHost::new());
        let content = format!(
            "---\naliases:\n  - Target\n  - '{}'\n---\nbody\n",
            wrap("Old")
        );
        host.insert("a.md", &content);

        default_manager(Arc::clone(&host))
            .reconcile("a.md", &content, Some("Target"), "stem", false)
            .unwrap();

        let updated = host.content("a.md").unwrap();
        let mapping = crate::frontmatter::parse(&updated, "a.md").unwrap();
        let values = PropertyValue::from_mapping(&mapping, "aliases").normalize();
        assert_eq!(values, vec!["Target".to_string()]);
    }

    #[test]
    fn none_alias_removes_engine_values_only() {
        let host = Arc::new(MemoryHost::new());
        let content = format!(
            "---\naliases:\n  - keep\n  - '{}'\n---\nbody\n",
            wrap("Stale")
        );
        host.insert("a.md", &content);

        let changed = default_manager(Arc::clone(&host))
            .reconcile("a.md", &content, None, "stem", false)
            .unwrap();
        assert!(changed);

        let updated = host.content("a.md").unwrap();
        let mapping = crate::frontmatter::parse(&updated, "a.md").unwrap();
        let values = PropertyValue::from_mapping(&mapping, "aliases").normalize();
        assert_eq!(values, vec!["keep".to_string()]);
    }

    #[test]
    fn fast_path_edits_buffer_in_place() {
        let host = Arc::new(MemoryHost::new());
        let content = format!("---\naliases:\n  - '{}'\n---\nbody\n", wrap("Old Title"));
        host.insert("a.md", &content);
        host.open_buffer("a.md", &content);

        let changed = default_manager(Arc::clone(&host))
            .reconcile("a.md", &content, Some("New Title"), "stem", false)
            .unwrap();
        assert!(changed);
        assert_eq!(host.buffer_edits(), vec!["a.md".to_string()]);
        assert!(host.frontmatter_writes().is_empty());
        assert!(host.content("a.md").unwrap().contains(&wrap("New Title")));
    }

    #[test]
    fn batch_skips_fast_path() {
        let host = Arc::new(MemoryHost::new());
        let content = format!("---\naliases:\n  - '{}'\n---\nbody\n", wrap("Old"));
        host.insert("a.md", &content);
        host.open_buffer("a.md", &content);

        default_manager(Arc::clone(&host))
            .reconcile("a.md", &content, Some("New"), "stem", true)
            .unwrap();
        assert!(host.buffer_edits().is_empty());
        assert_eq!(host.frontmatter_writes(), vec!["a.md".to_string()]);
    }

    #[test]
    fn no_buffer_falls_back_to_rewrite() {
        let host = Arc::new(MemoryHost::new());
        let content = format!("---\naliases:\n  - '{}'\n---\nbody\n", wrap("Old"));
        host.insert("a.md", &content);

        default_manager(Arc::clone(&host))
            .reconcile("a.md", &content, Some("New"), "stem", false)
            .unwrap();
        assert_eq!(host.frontmatter_writes(), vec!["a.md".to_string()]);
    }

    #[test]
    fn unchanged_alias_is_a_noop() {
        let host = Arc::new(MemoryHost::new());
        let content = format!("---\naliases:\n  - '{}'\n---\nbody\n", wrap("Same"));
        host.insert("a.md", &content);

        let changed = default_manager(Arc::clone(&host))
            .reconcile("a.md", &content, Some("Same"), "stem", false)
            .unwrap();
        assert!(!changed);
        assert!(host.frontmatter_writes().is_empty());
        assert!(host.buffer_edits().is_empty());
    }

    #[test]
    fn scalar_property_stays_scalar_for_non_canonical_keys() {
        let host = Arc::new(MemoryHost::new());
        let content = "body\n".to_string();
        host.insert("a.md", &content);

        let alias_cfg = AliasConfig {
            property_keys: "title-mirror".to_string(),
            ..Default::default()
        };
        manager(Arc::clone(&host), alias_cfg)
            .reconcile("a.md", &content, Some("T"), "stem", false)
            .unwrap();

        let updated = host.content("a.md").unwrap();
        let mapping = crate::frontmatter::parse(&updated, "a.md").unwrap();
        assert_eq!(
            PropertyValue::from_mapping(&mapping, "title-mirror"),
            PropertyValue::Scalar(wrap("T"))
        );
    }

    #[test]
    fn keep_empty_property_writes_explicit_empty() {
        let host = Arc::new(MemoryHost::new());
        let content = format!("---\naliases:\n  - '{}'\n---\nbody\n", wrap("Stale"));
        host.insert("a.md", &content);

        let alias_cfg = AliasConfig {
            keep_empty_property: true,
            ..Default::default()
        };
        manager(Arc::clone(&host), alias_cfg)
            .reconcile("a.md", &content, None, "stem", false)
            .unwrap();

        let updated = host.content("a.md").unwrap();
        assert!(updated.contains("aliases"));
        assert!(!updated.contains(char::from(MARKER)));
    }

    #[test]
    fn reconcile_values_drops_extra_engine_entries() {
        let values = reconcile_values(
            vec![wrap("a"), "user".into(), wrap("b")],
            Some("new"),
            "stem",
            true,
            false,
        );
        assert_eq!(values, vec![wrap("new"), "user".to_string()]);
    }

    #[test]
    fn disabled_alias_does_nothing() {
        let host = Arc::new(MemoryHost::new());
        host.insert("a.md", "body\n");

        let alias_cfg = AliasConfig {
            enabled: false,
            ..Default::default()
        };
        let changed = manager(Arc::clone(&host), alias_cfg)
            .reconcile("a.md", "body\n", Some("T"), "stem", false)
            .unwrap();
        assert!(!changed);
    }
}
