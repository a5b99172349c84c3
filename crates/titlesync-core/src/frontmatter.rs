//! YAML frontmatter parsing and the property value model.
//!
//! A frontmatter property may be a scalar, a list, null, or absent,
//! interchangeably. [`PropertyValue`] models that explicitly, with
//! normalization at the alias-manager boundary instead of ad hoc type checks
//! at each use site.

use serde_yaml::{Mapping, Value};

use crate::error::{Result, SyncError};

const DELIMITER: &str = "---";

/// A frontmatter property value in explicit form
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertyValue {
    Absent,
    Scalar(String),
    List(Vec<String>),
}

impl PropertyValue {
    /// Normalize to an ordered list (scalar becomes a singleton)
    pub fn normalize(&self) -> Vec<String> {
        match self {
            PropertyValue::Absent => Vec::new(),
            PropertyValue::Scalar(s) => vec![s.clone()],
            PropertyValue::List(items) => items.clone(),
        }
    }

    /// Denormalize a list back to the narrowest representation.
    ///
    /// The canonical multi-value key always stays a list; other keys collapse
    /// to a bare scalar when exactly one value remains.
    pub fn denormalize(values: Vec<String>, always_list: bool) -> PropertyValue {
        match (values.len(), always_list) {
            (0, _) => PropertyValue::Absent,
            (1, false) => PropertyValue::Scalar(values.into_iter().next().unwrap_or_default()),
            _ => PropertyValue::List(values),
        }
    }

    /// Read a property from a YAML mapping
    pub fn from_mapping(mapping: &Mapping, key: &str) -> PropertyValue {
        match mapping.get(Value::String(key.to_string())) {
            None | Some(Value::Null) => PropertyValue::Absent,
            Some(Value::Sequence(seq)) => {
                PropertyValue::List(seq.iter().filter_map(scalar_to_string).collect())
            }
            Some(other) => match scalar_to_string(other) {
                Some(s) => PropertyValue::Scalar(s),
                None => PropertyValue::Absent,
            },
        }
    }

    /// Write a property into a YAML mapping. `Absent` removes the key unless
    /// `keep_empty` is set, which writes an explicit empty value instead so
    /// the property still renders in user-visible panels.
    pub fn write_to(self, mapping: &mut Mapping, key: &str, keep_empty: bool) {
        let key = Value::String(key.to_string());
        match self {
            PropertyValue::Absent => {
                if keep_empty {
                    mapping.insert(key, Value::Null);
                } else {
                    mapping.remove(&key);
                }
            }
            PropertyValue::Scalar(s) => {
                mapping.insert(key, Value::String(s));
            }
            PropertyValue::List(items) => {
                let seq = items.into_iter().map(Value::String).collect();
                mapping.insert(key, Value::Sequence(seq));
            }
        }
    }
}

/// Convert a scalar YAML value to its string form
fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Split content into the raw YAML block and the body start offset.
///
/// Returns `None` when the document has no frontmatter. The block must open
/// on the first line; a missing closing delimiter is treated as no block.
pub fn split(content: &str) -> Option<(&str, usize)> {
    let rest = content.strip_prefix(DELIMITER)?;
    let rest = rest.strip_prefix('\n').or_else(|| {
        rest.strip_prefix("\r\n")
    })?;
    let yaml_start = content.len() - rest.len();

    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        if line.trim_end_matches(['\r', '\n']) == DELIMITER {
            let yaml = &content[yaml_start..yaml_start + offset];
            return Some((yaml, yaml_start + offset + line.len()));
        }
        offset += line.len();
    }
    None
}

/// The document body with any frontmatter block stripped
pub fn body(content: &str) -> &str {
    match split(content) {
        Some((_, body_start)) => &content[body_start..],
        None => content,
    }
}

/// Parse the frontmatter block into a YAML mapping (empty when absent)
pub fn parse(content: &str, path: &str) -> Result<Mapping> {
    let Some((yaml, _)) = split(content) else {
        return Ok(Mapping::new());
    };
    if yaml.trim().is_empty() {
        return Ok(Mapping::new());
    }
    let value: Value = serde_yaml::from_str(yaml).map_err(|e| SyncError::InvalidFrontmatter {
        path: path.to_string(),
        reason: e.to_string(),
    })?;
    match value {
        Value::Mapping(mapping) => Ok(mapping),
        Value::Null => Ok(Mapping::new()),
        _ => Err(SyncError::InvalidFrontmatter {
            path: path.to_string(),
            reason: "frontmatter is not a key/value mapping".to_string(),
        }),
    }
}

/// Run a read-modify-write mutation against a document's frontmatter.
///
/// Returns the rewritten content, or `None` when the mutator left the mapping
/// unchanged. An emptied mapping removes the block entirely.
pub fn edit<F>(content: &str, path: &str, mutator: F) -> Result<Option<String>>
where
    F: FnOnce(&mut Mapping),
{
    let before = parse(content, path)?;
    let mut mapping = before.clone();
    mutator(&mut mapping);
    if mapping == before {
        return Ok(None);
    }

    let body = body(content);
    if mapping.is_empty() {
        return Ok(Some(body.to_string()));
    }

    let yaml = serde_yaml::to_string(&Value::Mapping(mapping))
        .map_err(|e| SyncError::InvalidFrontmatter {
            path: path.to_string(),
            reason: e.to_string(),
        })?;
    Ok(Some(format!("{DELIMITER}\n{yaml}{DELIMITER}\n{body}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_extracts_block_and_body() {
        let content = "---\ntitle: x\n---\n# Heading\n";
        let (yaml, body_start) = split(content).unwrap();
        assert_eq!(yaml, "title: x\n");
        assert_eq!(&content[body_start..], "# Heading\n");
    }

    #[test]
    fn split_requires_block_on_first_line() {
        assert!(split("\n---\nx: 1\n---\n").is_none());
        assert!(split("# No frontmatter\n").is_none());
    }

    #[test]
    fn split_requires_closing_delimiter() {
        assert!(split("---\ntitle: x\n").is_none());
    }

    #[test]
    fn body_without_frontmatter_is_whole_content() {
        assert_eq!(body("# Title\n"), "# Title\n");
    }

    #[test]
    fn parse_missing_block_is_empty_mapping() {
        assert!(parse("# Title\n", "a.md").unwrap().is_empty());
    }

    #[test]
    fn parse_rejects_non_mapping() {
        let err = parse("---\n- a\n- b\n---\n", "a.md").unwrap_err();
        assert!(matches!(err, SyncError::InvalidFrontmatter { .. }));
    }

    #[test]
    fn property_value_round_trip() {
        let mapping = parse(
            "---\nscalar: one\nlist:\n  - a\n  - b\nempty:\n---\nbody\n",
            "a.md",
        )
        .unwrap();

        assert_eq!(
            PropertyValue::from_mapping(&mapping, "scalar"),
            PropertyValue::Scalar("one".to_string())
        );
        assert_eq!(
            PropertyValue::from_mapping(&mapping, "list"),
            PropertyValue::List(vec!["a".to_string(), "b".to_string()])
        );
        assert_eq!(
            PropertyValue::from_mapping(&mapping, "empty"),
            PropertyValue::Absent
        );
        assert_eq!(
            PropertyValue::from_mapping(&mapping, "missing"),
            PropertyValue::Absent
        );
    }

    #[test]
    fn numbers_and_bools_normalize_to_strings() {
        let mapping = parse("---\nn: 42\nb: true\n---\n", "a.md").unwrap();
        assert_eq!(
            PropertyValue::from_mapping(&mapping, "n").normalize(),
            vec!["42".to_string()]
        );
        assert_eq!(
            PropertyValue::from_mapping(&mapping, "b").normalize(),
            vec!["true".to_string()]
        );
    }

    #[test]
    fn denormalize_respects_canonical_list_key() {
        assert_eq!(
            PropertyValue::denormalize(vec!["x".to_string()], true),
            PropertyValue::List(vec!["x".to_string()])
        );
        assert_eq!(
            PropertyValue::denormalize(vec!["x".to_string()], false),
            PropertyValue::Scalar("x".to_string())
        );
        assert_eq!(
            PropertyValue::denormalize(Vec::new(), true),
            PropertyValue::Absent
        );
    }

    #[test]
    fn edit_rewrites_only_on_change() {
        let content = "---\ntitle: x\n---\nbody\n";
        let unchanged = edit(content, "a.md", |_| {}).unwrap();
        assert!(unchanged.is_none());

        let changed = edit(content, "a.md", |m| {
            PropertyValue::Scalar("why".to_string()).write_to(m, "title", false);
        })
        .unwrap()
        .unwrap();
        assert!(changed.contains("title: why"));
        assert!(changed.ends_with("body\n"));
    }

    #[test]
    fn edit_creates_block_when_absent() {
        let changed = edit("body\n", "a.md", |m| {
            PropertyValue::List(vec!["t".to_string()]).write_to(m, "aliases", false);
        })
        .unwrap()
        .unwrap();
        assert!(changed.starts_with("---\n"));
        assert!(changed.contains("aliases:"));
        assert!(changed.ends_with("body\n"));
    }

    #[test]
    fn edit_removes_emptied_block() {
        let content = "---\naliases:\n  - t\n---\nbody\n";
        let changed = edit(content, "a.md", |m| {
            PropertyValue::Absent.write_to(m, "aliases", false);
        })
        .unwrap()
        .unwrap();
        assert_eq!(changed, "body\n");
    }

    #[test]
    fn keep_empty_writes_explicit_null() {
        let content = "---\naliases:\n  - t\n---\nbody\n";
        let changed = edit(content, "a.md", |m| {
            PropertyValue::Absent.write_to(m, "aliases", true);
        })
        .unwrap()
        .unwrap();
        assert!(changed.contains("aliases:"));
    }
}
