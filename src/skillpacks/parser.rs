//! SKILL.md file parser.
//!
//! A manifest is a `---` delimited block of `key: value` lines followed by a
//! markdown body. The block is read with a line scanner rather than a YAML
//! deserializer: values such as `description: Use when: x` stay legal and
//! unknown keys are kept instead of rejected.

use super::error::ManifestError;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{BTreeMap, HashSet};

/// Validation constants
pub const MAX_NAME_LEN: usize = 64;
pub const MAX_DESCRIPTION_LEN: usize = 1024;
pub const MAX_COMPATIBILITY_LEN: usize = 500;

const DELIMITER: &str = "---";
const METADATA_KEY: &str = "metadata";
const METADATA_PREFIX: &str = "metadata.";

static NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9]([a-z0-9-]*[a-z0-9])?$").expect("valid name regex"));

/// `[label](target)` or `![alt](target "title")`. The regex crate runs in
/// linear time, so hostile bodies cannot trigger backtracking blowups.
static LINK_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"\[[^\]\n]*\]\(\s*([^)\s]+)(?:\s+"[^"\n]*")?\s*\)"#).expect("valid link regex")
});

/// Parsed SKILL.md
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Manifest {
    pub name: String,
    pub description: String,
    pub compatibility: Option<String>,
    pub metadata: BTreeMap<String, String>,
    pub body: String,
}

impl Manifest {
    /// Resource paths linked from the body.
    pub fn resource_links(&self) -> Vec<String> {
        extract_resource_links(&self.body)
    }
}

/// Raw fields of the metadata block before validation.
#[derive(Debug, Default)]
struct RawFields {
    name: Option<String>,
    description: Option<String>,
    compatibility: Option<String>,
    metadata: BTreeMap<String, String>,
}

/// Split a manifest into its metadata block and its body.
///
/// The first line must be a delimiter; the block ends at the next delimiter
/// line. The body is everything after it, left-trimmed.
pub fn split_manifest(content: &str) -> Result<(&str, &str), ManifestError> {
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);

    let first_end = content.find('\n').unwrap_or(content.len());
    if !is_delimiter(&content[..first_end]) {
        return Err(ManifestError::MissingDelimiters);
    }
    if first_end == content.len() {
        return Err(ManifestError::MissingDelimiters);
    }

    let block_start = first_end + 1;
    let mut pos = block_start;
    while pos <= content.len() {
        let line_end = content[pos..]
            .find('\n')
            .map(|i| pos + i)
            .unwrap_or(content.len());
        if is_delimiter(&content[pos..line_end]) {
            let block = &content[block_start..pos];
            let body_start = (line_end + 1).min(content.len());
            return Ok((block, content[body_start..].trim_start()));
        }
        if line_end == content.len() {
            break;
        }
        pos = line_end + 1;
    }

    Err(ManifestError::MissingDelimiters)
}

/// Parse a complete SKILL.md document.
pub fn parse_manifest(content: &str) -> Result<Manifest, ManifestError> {
    let (block, body) = split_manifest(content)?;
    let fields = parse_fields(block)?;

    let name = fields
        .name
        .ok_or(ManifestError::MissingField { field: "name" })?;
    let description = fields
        .description
        .ok_or(ManifestError::MissingField {
            field: "description",
        })?;
    validate_fields(&name, &description, fields.compatibility.as_deref())?;

    if body.is_empty() {
        return Err(ManifestError::EmptyBody);
    }

    Ok(Manifest {
        name,
        description,
        compatibility: fields.compatibility,
        metadata: fields.metadata,
        body: body.to_string(),
    })
}

/// Render a manifest back to SKILL.md text.
///
/// Scalar values are always double-quoted and escaped, so whitespace, quotes
/// and line breaks survive a parse. Metadata keys outside the plain key
/// charset are quoted too.
pub fn render_manifest(manifest: &Manifest) -> String {
    let mut out = String::new();
    out.push_str(DELIMITER);
    out.push('\n');
    out.push_str(&format!("name: {}\n", quote(&manifest.name)));
    out.push_str(&format!("description: {}\n", quote(&manifest.description)));
    if let Some(compat) = &manifest.compatibility {
        out.push_str(&format!("compatibility: {}\n", quote(compat)));
    }
    if !manifest.metadata.is_empty() {
        out.push_str(METADATA_KEY);
        out.push_str(":\n");
        for (key, value) in &manifest.metadata {
            let key = if is_plain_key(key) {
                key.clone()
            } else {
                quote(key)
            };
            out.push_str(&format!("  {}: {}\n", key, quote(value)));
        }
    }
    out.push_str(DELIMITER);
    out.push('\n');
    out.push_str(&manifest.body);
    out
}

/// Extract relative resource paths from markdown links in `body`.
///
/// External URLs (anything with a scheme) and in-page anchors are skipped.
/// Paths are normalized and folded case-insensitively, first occurrence wins.
pub fn extract_resource_links(body: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut links = Vec::new();

    for caps in LINK_RE.captures_iter(body) {
        let target = &caps[1];
        if target.starts_with('#') || target.contains(':') {
            continue;
        }
        let target = target.split('#').next().unwrap_or(target);
        let normalized = normalize_resource_path(target);
        if normalized.is_empty() {
            continue;
        }
        if seen.insert(normalized.to_lowercase()) {
            links.push(normalized);
        }
    }

    links
}

/// Canonical forward-slash form of a relative path: backslashes become `/`,
/// empty and `.` segments are dropped. `..` segments are kept for the path
/// policy to judge.
pub fn normalize_resource_path(path: &str) -> String {
    let replaced = path.trim().replace('\\', "/");
    let absolute = replaced.starts_with('/');
    let segments: Vec<&str> = replaced
        .split('/')
        .filter(|s| !s.is_empty() && *s != ".")
        .collect();
    let joined = segments.join("/");
    if absolute {
        format!("/{}", joined)
    } else {
        joined
    }
}

fn is_delimiter(line: &str) -> bool {
    line.trim_end() == DELIMITER
}

fn parse_fields(block: &str) -> Result<RawFields, ManifestError> {
    let mut fields = RawFields::default();
    let mut in_metadata = false;

    for line in block.lines() {
        if line.trim().is_empty() || line.trim_start().starts_with('#') {
            continue;
        }

        let indented = line.starts_with(' ') || line.starts_with('\t');
        let Some((key, value)) = split_key_value(line) else {
            continue;
        };

        if indented {
            if in_metadata {
                if let Some(value) = value.lenient() {
                    fields.metadata.insert(key, value);
                }
            }
            continue;
        }
        in_metadata = false;

        match key.to_ascii_lowercase().as_str() {
            "name" => fields.name = Some(value.field("name")?),
            "description" => fields.description = Some(value.field("description")?),
            "compatibility" => fields.compatibility = Some(value.field("compatibility")?),
            METADATA_KEY => match value.lenient() {
                Some(value) => {
                    fields.metadata.insert(METADATA_KEY.to_string(), value);
                }
                None => in_metadata = true,
            },
            lower if lower.starts_with(METADATA_PREFIX) => {
                let sub = &key[METADATA_PREFIX.len()..];
                if let (false, Some(value)) = (sub.is_empty(), value.lenient()) {
                    fields.metadata.insert(sub.to_string(), value);
                }
            }
            _ => {
                // Block-style values (lists, nested maps) have no scalar form
                if let Some(value) = value.lenient() {
                    fields.metadata.insert(key, value);
                }
            }
        }
    }

    Ok(fields)
}

/// Right-hand side of a `key: value` line.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Scalar {
    /// Nothing after the colon: a block header
    Empty,
    Value(String),
    /// Unterminated double quote, or text after the closing quote
    Malformed(String),
}

impl Scalar {
    fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if raw.is_empty() {
            return Scalar::Empty;
        }
        if raw.starts_with('"') {
            return match read_quoted(raw) {
                Some((value, rest)) if rest.trim().is_empty() => Scalar::Value(value),
                _ => Scalar::Malformed(raw.to_string()),
            };
        }
        if raw.len() >= 2 && raw.starts_with('\'') && raw.ends_with('\'') {
            return Scalar::Value(raw[1..raw.len() - 1].to_string());
        }
        Scalar::Value(raw.to_string())
    }

    /// Value of a validated field; bad quoting is an error there.
    fn field(self, field: &'static str) -> Result<String, ManifestError> {
        match self {
            Scalar::Empty => Ok(String::new()),
            Scalar::Value(value) => Ok(value),
            Scalar::Malformed(_) => Err(ManifestError::InvalidFieldValue {
                field,
                reason: "malformed quoted value".to_string(),
            }),
        }
    }

    /// Value of a free-form key; bad quoting keeps the raw text.
    fn lenient(self) -> Option<String> {
        match self {
            Scalar::Empty => None,
            Scalar::Value(value) | Scalar::Malformed(value) => Some(value),
        }
    }
}

fn is_plain_key(key: &str) -> bool {
    !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
}

/// Split `key: value`. Keys are plain (`[A-Za-z0-9_.-]+`) or double-quoted.
fn split_key_value(line: &str) -> Option<(String, Scalar)> {
    let line = line.trim_start();
    let (key, rest) = if line.starts_with('"') {
        let (key, rest) = read_quoted(line)?;
        (key, rest.trim_start().strip_prefix(':')?)
    } else {
        let (key, rest) = line.split_once(':')?;
        let key = key.trim_end();
        if !is_plain_key(key) {
            return None;
        }
        (key.to_string(), rest)
    };
    Some((key, Scalar::parse(rest)))
}

/// Read a double-quoted string at the start of `s`, returning the unescaped
/// text and what follows the closing quote. Unknown escapes are kept as-is.
fn read_quoted(s: &str) -> Option<(String, &str)> {
    let mut chars = s.char_indices();
    if chars.next()?.1 != '"' {
        return None;
    }
    let mut out = String::new();
    while let Some((i, c)) = chars.next() {
        match c {
            '"' => return Some((out, &s[i + 1..])),
            '\\' => match chars.next()?.1 {
                'n' => out.push('\n'),
                'r' => out.push('\r'),
                't' => out.push('\t'),
                '"' => out.push('"'),
                '\\' => out.push('\\'),
                other => {
                    out.push('\\');
                    out.push(other);
                }
            },
            c => out.push(c),
        }
    }
    None
}

/// Double-quoted form of `value` that [`read_quoted`] reverses exactly.
fn quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Field rules shared by file manifests and inline packages.
pub(crate) fn validate_fields(
    name: &str,
    description: &str,
    compatibility: Option<&str>,
) -> Result<(), ManifestError> {
    validate_name(name)?;
    validate_description(description)?;
    if let Some(compat) = compatibility {
        validate_compatibility(compat)?;
    }
    Ok(())
}

fn validate_name(name: &str) -> Result<(), ManifestError> {
    let invalid = |reason: String| ManifestError::InvalidFieldValue {
        field: "name",
        reason,
    };
    if name.trim().is_empty() {
        return Err(invalid("must not be empty".to_string()));
    }
    if name.len() > MAX_NAME_LEN {
        return Err(invalid(format!("exceeds {} chars", MAX_NAME_LEN)));
    }
    if !NAME_RE.is_match(name) {
        return Err(invalid(format!(
            "'{}' must be lowercase letters, numbers and hyphens, not starting or ending with a hyphen",
            name
        )));
    }
    Ok(())
}

fn validate_description(desc: &str) -> Result<(), ManifestError> {
    if desc.trim().is_empty() {
        return Err(ManifestError::InvalidFieldValue {
            field: "description",
            reason: "must not be empty".to_string(),
        });
    }
    if desc.chars().count() > MAX_DESCRIPTION_LEN {
        return Err(ManifestError::InvalidFieldValue {
            field: "description",
            reason: format!("exceeds {} chars", MAX_DESCRIPTION_LEN),
        });
    }
    Ok(())
}

fn validate_compatibility(compat: &str) -> Result<(), ManifestError> {
    if compat.chars().count() > MAX_COMPATIBILITY_LEN {
        return Err(ManifestError::InvalidFieldValue {
            field: "compatibility",
            reason: format!("exceeds {} chars", MAX_COMPATIBILITY_LEN),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_manifest() {
        let content = r#"---
name: calc
description: "does math"
compatibility: 'posix shells'
---

Use [the guide](refs/guide.md) before answering.
"#;
        let m = parse_manifest(content).unwrap();
        assert_eq!(m.name, "calc");
        assert_eq!(m.description, "does math");
        assert_eq!(m.compatibility.as_deref(), Some("posix shells"));
        assert!(m.body.starts_with("Use [the guide]"));
        assert_eq!(m.resource_links(), vec!["refs/guide.md"]);
    }

    #[test]
    fn test_missing_delimiters() {
        assert_eq!(
            parse_manifest("name: calc\ndescription: x\n\nbody"),
            Err(ManifestError::MissingDelimiters)
        );
        assert_eq!(
            parse_manifest("---\nname: calc\ndescription: x\nbody"),
            Err(ManifestError::MissingDelimiters)
        );
    }

    #[test]
    fn test_bom_and_crlf() {
        let content = "\u{feff}---\r\nname: calc\r\ndescription: ok\r\n---\r\nBody\r\n";
        let m = parse_manifest(content).unwrap();
        assert_eq!(m.name, "calc");
        assert_eq!(m.description, "ok");
        assert_eq!(m.body.trim_end(), "Body");
    }

    #[test]
    fn test_missing_vs_invalid_fields() {
        let err = parse_manifest("---\ndescription: x\n---\nbody").unwrap_err();
        assert_eq!(err, ManifestError::MissingField { field: "name" });

        let err = parse_manifest("---\nname: calc\n---\nbody").unwrap_err();
        assert_eq!(
            err,
            ManifestError::MissingField {
                field: "description"
            }
        );

        let err = parse_manifest("---\nname: Invalid_Name\ndescription: x\n---\nbody").unwrap_err();
        assert!(matches!(
            err,
            ManifestError::InvalidFieldValue { field: "name", .. }
        ));

        let err = parse_manifest("---\nname: calc\ndescription: \"  \"\n---\nbody").unwrap_err();
        assert!(matches!(
            err,
            ManifestError::InvalidFieldValue {
                field: "description",
                ..
            }
        ));
    }

    #[test]
    fn test_name_rules() {
        let too_long = "a".repeat(65);
        for bad in ["-calc", "calc-", "Calc", "ca lc", too_long.as_str()] {
            let content = format!("---\nname: {}\ndescription: x\n---\nbody", bad);
            assert!(
                matches!(
                    parse_manifest(&content),
                    Err(ManifestError::InvalidFieldValue { field: "name", .. })
                ),
                "{} should be rejected",
                bad
            );
        }
        let content = format!("---\nname: {}\ndescription: x\n---\nbody", "a".repeat(64));
        assert!(parse_manifest(&content).is_ok());
        assert!(parse_manifest("---\nname: a\ndescription: x\n---\nbody").is_ok());
    }

    #[test]
    fn test_description_and_compatibility_limits() {
        let long = "d".repeat(MAX_DESCRIPTION_LEN + 1);
        let content = format!("---\nname: calc\ndescription: {}\n---\nbody", long);
        assert!(parse_manifest(&content).is_err());

        let long = "c".repeat(MAX_COMPATIBILITY_LEN + 1);
        let content = format!(
            "---\nname: calc\ndescription: x\ncompatibility: {}\n---\nbody",
            long
        );
        assert!(matches!(
            parse_manifest(&content),
            Err(ManifestError::InvalidFieldValue {
                field: "compatibility",
                ..
            })
        ));
    }

    #[test]
    fn test_empty_body() {
        assert_eq!(
            parse_manifest("---\nname: calc\ndescription: x\n---\n\n   \n"),
            Err(ManifestError::EmptyBody)
        );
    }

    #[test]
    fn test_unknown_keys_are_preserved() {
        let content = r#"---
name: calc
description: Use when: numbers show up
license: MIT
metadata.author: jane
metadata:
  version: "1.2"
  audience: ops
allowed-tools:
  - Read
---
Body
"#;
        let m = parse_manifest(content).unwrap();
        assert_eq!(m.description, "Use when: numbers show up");
        assert_eq!(m.metadata.get("license").map(String::as_str), Some("MIT"));
        assert_eq!(m.metadata.get("author").map(String::as_str), Some("jane"));
        assert_eq!(m.metadata.get("version").map(String::as_str), Some("1.2"));
        assert_eq!(m.metadata.get("audience").map(String::as_str), Some("ops"));
        assert!(!m.metadata.contains_key("allowed-tools"));
        assert!(!m.metadata.contains_key("- Read"));
    }

    fn manifest(description: &str, compatibility: Option<&str>, metadata: &[(&str, &str)]) -> Manifest {
        Manifest {
            name: "data-2-csv".to_string(),
            description: description.to_string(),
            compatibility: compatibility.map(str::to_string),
            metadata: metadata
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            body: "# Title\n\nSee [x](refs/x.md).\n".to_string(),
        }
    }

    #[test]
    fn test_render_round_trip() {
        let cases = vec![
            manifest("does math", None, &[]),
            manifest("  'quoted' edges: and colons ", Some("bash >= 4"), &[]),
            manifest("line one\nline two\r\n\ttabbed", None, &[]),
            manifest(r#"back\slash \n literal and "quotes""#, Some(""), &[]),
            manifest("# not a comment", Some("---"), &[]),
            manifest("unicode: caf\u{e9} \u{1f600}", None, &[("author", "jane \"jd\" doe")]),
            manifest("empty values", None, &[("owner", ""), ("license", "MIT")]),
            manifest(
                "odd keys",
                None,
                &[
                    ("review date", "2024"),
                    ("a:b", "c: d"),
                    ("#tag", "x"),
                    ("- item", "y"),
                    ("say \"hi\"", "multi\nline"),
                    ("", "blank key"),
                ],
            ),
            manifest("reserved keys", None, &[("metadata", "flat"), ("name", "shadow")]),
        ];

        for manifest in cases {
            let rendered = render_manifest(&manifest);
            assert_eq!(
                parse_manifest(&rendered).as_ref(),
                Ok(&manifest),
                "rendered:\n{}",
                rendered
            );
        }
    }

    #[test]
    fn test_malformed_quotes() {
        let err = parse_manifest("---\nname: calc\ndescription: \"line one\n---\nbody").unwrap_err();
        assert!(matches!(
            err,
            ManifestError::InvalidFieldValue {
                field: "description",
                ..
            }
        ));

        let err =
            parse_manifest("---\nname: calc\ndescription: \"a\" and \"b\"\n---\nbody").unwrap_err();
        assert!(matches!(
            err,
            ManifestError::InvalidFieldValue {
                field: "description",
                ..
            }
        ));

        // free-form keys keep the raw text
        let m = parse_manifest("---\nname: calc\ndescription: x\nnote: \"open\n---\nbody").unwrap();
        assert_eq!(m.metadata.get("note").map(String::as_str), Some("\"open"));
    }

    #[test]
    fn test_scalar_metadata_line_is_kept() {
        let m = parse_manifest("---\nname: calc\ndescription: x\nmetadata: flat\nowner: \"\"\n---\nbody")
            .unwrap();
        assert_eq!(m.metadata.get("metadata").map(String::as_str), Some("flat"));
        assert_eq!(m.metadata.get("owner").map(String::as_str), Some(""));
    }

    #[test]
    fn test_extract_resource_links() {
        let body = r#"
Read [guide](refs/guide.md) and [Guide again](./refs/GUIDE.md).
See ![diagram](assets/flow.png "Flow") and [site](https://example.com/a.md).
Jump to [section](#usage), [mail](mailto:a@b.c), [anchor](refs/faq.md#top).
Escapes stay visible: [bad](../../secret.txt) [win](refs\win.txt)
"#;
        assert_eq!(
            extract_resource_links(body),
            vec![
                "refs/guide.md",
                "assets/flow.png",
                "refs/faq.md",
                "../../secret.txt",
                "refs/win.txt",
            ]
        );
    }

    #[test]
    fn test_normalize_resource_path() {
        assert_eq!(normalize_resource_path("./refs/doc.md"), "refs/doc.md");
        assert_eq!(normalize_resource_path("refs\\doc.md"), "refs/doc.md");
        assert_eq!(normalize_resource_path("refs//./doc.md"), "refs/doc.md");
        assert_eq!(normalize_resource_path("../x.md"), "../x.md");
        assert_eq!(normalize_resource_path("/etc/passwd"), "/etc/passwd");
    }
}
