//! Title derivation: source-line selection, markup stripping, custom
//! replacements, filename sanitization, safewords and self-reference checks.
//!
//! Everything here is pure string work over one document snapshot; the
//! concurrency-sensitive parts of the pipeline live in [`crate::engine`].

use std::sync::OnceLock;

use regex::Regex;

use crate::config::{CharConfig, MatchScope, ReplacementRule, Safeword, TitleConfig};

fn wiki_link_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\[\[([^\[\]|]+)(?:\|([^\[\]]*))?\]\]").unwrap())
}

fn embed_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"!\[\[([^\[\]|]+)(?:\|[^\[\]]*)?\]\]").unwrap())
}

fn md_link_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"!?\[([^\]]*)\]\(([^)]*)\)").unwrap())
}

fn footnote_ref_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\[\^[^\]]*\]").unwrap())
}

fn html_tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"</?[A-Za-z][^>]*>").unwrap())
}

fn list_marker_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s*(?:[-*+]|\d+[.)])\s+(?:\[[ xX]\]\s+)?").unwrap())
}

/// First non-blank line of a body (frontmatter already stripped)
pub fn first_non_empty_line(body: &str) -> Option<&str> {
    body.lines().find(|line| !line.trim().is_empty())
}

/// Whether a line is a markdown heading
pub fn is_heading(line: &str) -> bool {
    let trimmed = line.trim_start();
    let hashes = trimmed.chars().take_while(|&c| c == '#').count();
    (1..=6).contains(&hashes)
        && trimmed[hashes..]
            .chars()
            .next()
            .is_none_or(|c| c == ' ' || c == '\t')
}

/// Resolve the line the title is derived from.
///
/// Usually the first non-blank line, but structural constructs pick a
/// policy-defined representative line instead: a fenced code block yields the
/// first line inside the fence, a table row yields its first cell.
pub fn resolve_title_source(body: &str, config: &TitleConfig) -> Option<String> {
    let first = first_non_empty_line(body)?;
    let trimmed = first.trim();

    if trimmed.starts_with("```") || trimmed.starts_with("~~~") {
        if config.use_code_block_content {
            let fence = &trimmed[..3];
            let mut lines = body.lines().skip_while(|l| l.trim() != trimmed);
            lines.next(); // the fence itself
            for line in lines {
                if line.trim().starts_with(fence) {
                    break;
                }
                if !line.trim().is_empty() {
                    return Some(line.trim().to_string());
                }
            }
        }
        // Fall back to the fence info string, if any
        let info = trimmed.trim_start_matches(['`', '~']).trim();
        if !info.is_empty() {
            return Some(info.to_string());
        }
        return Some(trimmed.to_string());
    }

    if config.use_table_cell && trimmed.starts_with('|') {
        let cell = trimmed
            .trim_matches('|')
            .split('|')
            .next()
            .unwrap_or("")
            .trim();
        if !cell.is_empty() {
            return Some(cell.to_string());
        }
    }

    Some(trimmed.to_string())
}

/// Strip markdown markup from a title-source line
pub fn strip_markup(line: &str, config: &TitleConfig) -> String {
    let mut out = line.trim().to_string();

    // Heading, blockquote and list markers
    loop {
        let trimmed = out.trim_start();
        if let Some(rest) = trimmed.strip_prefix('>') {
            out = rest.trim_start().to_string();
            continue;
        }
        break;
    }
    if is_heading(&out) {
        out = out
            .trim_start()
            .trim_start_matches('#')
            .trim_start()
            .to_string();
    }
    out = list_marker_re().replace(&out, "").to_string();

    // Embedded card references: keep the target's display name, or drop
    out = embed_re()
        .replace_all(&out, |caps: &regex::Captures<'_>| {
            if config.card_link_extraction {
                let target = caps.get(1).map_or("", |m| m.as_str());
                file_stem(target).to_string()
            } else {
                String::new()
            }
        })
        .to_string();

    // Wiki links: label when present, target otherwise
    out = wiki_link_re()
        .replace_all(&out, |caps: &regex::Captures<'_>| {
            match caps.get(2).map(|m| m.as_str().trim()) {
                Some(label) if !label.is_empty() => label.to_string(),
                _ => caps.get(1).map_or("", |m| m.as_str()).trim().to_string(),
            }
        })
        .to_string();

    // Inline links keep their label; images are dropped by the leading `!`
    out = md_link_re()
        .replace_all(&out, |caps: &regex::Captures<'_>| {
            if caps.get(0).is_some_and(|m| m.as_str().starts_with('!')) {
                String::new()
            } else {
                caps.get(1).map_or("", |m| m.as_str()).to_string()
            }
        })
        .to_string();

    out = footnote_ref_re().replace_all(&out, "").to_string();
    out = html_tag_re().replace_all(&out, "").to_string();

    // Emphasis, code and highlight markers
    for marker in ["**", "__", "~~", "==", "*", "_", "`", "%%"] {
        out = out.replace(marker, "");
    }

    out.trim().to_string()
}

/// Apply custom search/replace rules in order
pub fn apply_replacements(line: &str, rules: &[ReplacementRule]) -> String {
    let mut out = line.to_string();
    for rule in rules.iter().filter(|r| r.enabled && !r.search.is_empty()) {
        out = match rule.scope {
            MatchScope::WholeLine => {
                if out == rule.search {
                    rule.replace.clone()
                } else {
                    out
                }
            }
            MatchScope::AtStart => match out.strip_prefix(&rule.search) {
                Some(rest) => format!("{}{}", rule.replace, rest),
                None => out,
            },
            MatchScope::Anywhere => out.replace(&rule.search, &rule.replace),
        };
    }
    out
}

/// Whether any enabled safeword matches the title-source line
pub fn matches_safeword(line: &str, safewords: &[Safeword]) -> bool {
    safewords
        .iter()
        .filter(|s| s.enabled && !s.text.is_empty())
        .any(|safeword| {
            let (line_cmp, text_cmp) = if safeword.case_sensitive {
                (line.to_string(), safeword.text.clone())
            } else {
                (line.to_lowercase(), safeword.text.to_lowercase())
            };
            match safeword.scope {
                MatchScope::WholeLine => line_cmp.trim() == text_cmp,
                MatchScope::AtStart => line_cmp.trim_start().starts_with(&text_cmp),
                MatchScope::Anywhere => line_cmp.contains(&text_cmp),
            }
        })
}

/// Replace forbidden characters per the configured table
pub fn sanitize_chars(title: &str, config: &CharConfig) -> String {
    let mut out = String::with_capacity(title.len());
    let mut skip_leading_ws = false;
    for c in title.chars() {
        if skip_leading_ws && c.is_whitespace() {
            continue;
        }
        skip_leading_ws = false;
        match config.rules.iter().find(|r| r.enabled && r.char == c) {
            Some(rule) => {
                if rule.trim_left {
                    while out.ends_with(char::is_whitespace) {
                        out.pop();
                    }
                }
                out.push_str(&rule.replacement);
                skip_leading_ws = rule.trim_right;
            }
            None => out.push(c),
        }
    }
    out
}

/// Collapse runs of whitespace and trim the ends
pub fn collapse_whitespace(title: &str) -> String {
    title.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Truncate to `max_chars` characters on a char boundary
pub fn truncate(title: &str, max_chars: usize) -> String {
    if title.chars().count() <= max_chars {
        return title.to_string();
    }
    title.chars().take(max_chars).collect::<String>().trim_end().to_string()
}

/// Names the underlying store refuses regardless of display case
pub fn is_reserved_name(stem: &str) -> bool {
    let upper = stem.trim().to_uppercase();
    if upper.is_empty() || upper.chars().all(|c| c == '.') {
        return true;
    }
    let base = upper.split('.').next().unwrap_or("");
    matches!(
        base,
        "CON" | "PRN" | "AUX" | "NUL"
            | "COM1" | "COM2" | "COM3" | "COM4" | "COM5" | "COM6" | "COM7" | "COM8" | "COM9"
            | "LPT1" | "LPT2" | "LPT3" | "LPT4" | "LPT5" | "LPT6" | "LPT7" | "LPT8" | "LPT9"
    )
}

/// Turn a derived title into a legal filename stem, collapsing to the
/// placeholder when the result is empty or reserved.
pub fn sanitize_filename(title: &str, chars: &CharConfig, config: &TitleConfig) -> String {
    let sanitized = collapse_whitespace(&sanitize_chars(title, chars));
    let truncated = truncate(&sanitized, config.max_length);
    if truncated.is_empty() || is_reserved_name(&truncated) {
        config.placeholder.clone()
    } else {
        truncated
    }
}

/// Whether the title-source line links to the document itself.
///
/// Wiki and inline link targets are compared against the document's own name
/// and path before any rewriting. Percent-encoded targets are compared in
/// decoded form when decodable, raw otherwise.
pub fn is_self_referential(line: &str, current_path: &str) -> bool {
    let stem = file_stem(current_path);
    let no_ext = current_path.strip_suffix(".md").unwrap_or(current_path);

    let matches_self = |target: &str| {
        let target = target.trim().trim_start_matches("./");
        let target = target.split(['#', '^']).next().unwrap_or(target).trim();
        if target.is_empty() {
            return false;
        }
        let target_no_ext = target.strip_suffix(".md").unwrap_or(target);
        target_no_ext.eq_ignore_ascii_case(stem)
            || target_no_ext.eq_ignore_ascii_case(no_ext)
            || target.eq_ignore_ascii_case(current_path)
    };

    for caps in wiki_link_re().captures_iter(line) {
        if let Some(target) = caps.get(1) {
            if matches_self(target.as_str()) {
                return true;
            }
        }
    }
    for caps in md_link_re().captures_iter(line) {
        if let Some(url) = caps.get(2) {
            let raw = url.as_str();
            let decoded = percent_decode(raw).unwrap_or_else(|| raw.to_string());
            if matches_self(&decoded) {
                return true;
            }
        }
    }
    false
}

/// Decode percent-escapes; `None` when the escape sequence or the resulting
/// bytes are malformed (callers fall back to the raw string).
fn percent_decode(input: &str) -> Option<String> {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = bytes.get(i + 1..i + 3)?;
            let hex = std::str::from_utf8(hex).ok()?;
            out.push(u8::from_str_radix(hex, 16).ok()?);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).ok()
}

/// Final path segment without its extension
pub fn file_stem(path: &str) -> &str {
    let name = path.rsplit('/').next().unwrap_or(path);
    match name.rfind('.') {
        Some(0) | None => name,
        Some(idx) => &name[..idx],
    }
}
