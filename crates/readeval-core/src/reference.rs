//! Reference data: fluency character rows and literacy character groups.
//!
//! Loaded once from TOML and passed explicitly to whatever needs it. A
//! built-in set with the standard 18 fluency rows ships with the crate.

use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

const BUILTIN_REFERENCE: &str = include_str!("../data/reference.toml");

/// One row of the oral-reading fluency sheet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CharacterRow {
    /// Zero-based position on the sheet.
    pub index: usize,
    pub characters: Vec<String>,
}

impl CharacterRow {
    /// Target text sent to the engine: glyphs separated by spaces.
    pub fn text(&self) -> String {
        self.characters.join(" ")
    }

    pub fn len(&self) -> usize {
        self.characters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.characters.is_empty()
    }
}

/// A literacy test group. Every correctly read character earns the
/// group's coefficient.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiteracyGroup {
    pub id: String,
    pub coefficient: f64,
    pub characters: Vec<String>,
}

/// Reference rows and groups for a deployment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceSet {
    pub name: String,
    pub rows: Vec<CharacterRow>,
    pub groups: Vec<LiteracyGroup>,
}

impl ReferenceSet {
    /// The reference data bundled with this crate.
    pub fn builtin() -> Result<Self> {
        parse_reference_str(BUILTIN_REFERENCE, Path::new("<builtin>"))
    }

    pub fn row(&self, index: usize) -> Option<&CharacterRow> {
        self.rows.get(index)
    }

    pub fn group(&self, id: &str) -> Option<&LiteracyGroup> {
        self.groups.iter().find(|g| g.id == id)
    }
}

// ---------------------------------------------------------------------------
// TOML parsing
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct TomlReferenceFile {
    #[serde(default = "default_name")]
    name: String,
    #[serde(default)]
    rows: Vec<TomlRow>,
    #[serde(default)]
    groups: Vec<TomlGroup>,
}

fn default_name() -> String {
    "reference".to_string()
}

#[derive(Debug, Deserialize)]
struct TomlRow {
    characters: String,
}

#[derive(Debug, Deserialize)]
struct TomlGroup {
    id: String,
    #[serde(default = "default_coefficient")]
    coefficient: f64,
    characters: String,
}

fn default_coefficient() -> f64 {
    1.0
}

/// Split a row string into glyphs, ignoring whitespace.
fn glyphs(text: &str) -> Vec<String> {
    text.chars()
        .filter(|c| !c.is_whitespace())
        .map(String::from)
        .collect()
}

/// Load a reference set from a TOML file.
pub fn load_reference(path: &Path) -> Result<ReferenceSet> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read reference file: {}", path.display()))?;

    parse_reference_str(&content, path)
}

/// Parse a reference set from a TOML string.
pub fn parse_reference_str(content: &str, source_path: &Path) -> Result<ReferenceSet> {
    let parsed: TomlReferenceFile = toml::from_str(content)
        .with_context(|| format!("failed to parse TOML: {}", source_path.display()))?;

    let rows = parsed
        .rows
        .into_iter()
        .enumerate()
        .map(|(index, row)| CharacterRow {
            index,
            characters: glyphs(&row.characters),
        })
        .collect();

    let groups = parsed
        .groups
        .into_iter()
        .map(|g| LiteracyGroup {
            id: g.id,
            coefficient: g.coefficient,
            characters: glyphs(&g.characters),
        })
        .collect();

    Ok(ReferenceSet {
        name: parsed.name,
        rows,
        groups,
    })
}

/// A warning from reference validation.
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    /// Row index or group id the warning refers to.
    pub location: String,
    pub message: String,
}

/// Check a reference set for entries that would score oddly.
pub fn validate_reference(set: &ReferenceSet) -> Vec<ValidationWarning> {
    let mut warnings = Vec::new();

    if set.rows.is_empty() && set.groups.is_empty() {
        warnings.push(ValidationWarning {
            location: set.name.clone(),
            message: "reference set has no rows and no groups".into(),
        });
    }

    for row in &set.rows {
        let location = format!("row {}", row.index + 1);
        if row.is_empty() {
            warnings.push(ValidationWarning {
                location,
                message: "row is empty".into(),
            });
            continue;
        }
        // Repeated glyphs share one verdict in batch mapping.
        if let Some(dup) = first_duplicate(&row.characters) {
            warnings.push(ValidationWarning {
                location,
                message: format!("character {dup} appears more than once"),
            });
        }
    }

    let mut seen_ids = HashSet::new();
    for group in &set.groups {
        let location = format!("group {}", group.id);
        if !seen_ids.insert(group.id.as_str()) {
            warnings.push(ValidationWarning {
                location: location.clone(),
                message: format!("duplicate group ID: {}", group.id),
            });
        }
        if group.coefficient <= 0.0 {
            warnings.push(ValidationWarning {
                location: location.clone(),
                message: format!("coefficient must be positive, got {}", group.coefficient),
            });
        }
        if group.characters.is_empty() {
            warnings.push(ValidationWarning {
                location,
                message: "group has no characters".into(),
            });
        } else if let Some(dup) = first_duplicate(&group.characters) {
            warnings.push(ValidationWarning {
                location,
                message: format!("character {dup} appears more than once"),
            });
        }
    }

    warnings
}

fn first_duplicate(characters: &[String]) -> Option<&str> {
    let mut seen = HashSet::new();
    characters
        .iter()
        .find(|c| !seen.insert(c.as_str()))
        .map(String::as_str)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
name = "sample"

[[rows]]
characters = "的 一 了 我 是"

[[rows]]
characters = "着他地"

[[groups]]
id = "g1"
coefficient = 1.5
characters = "人 大 小"

[[groups]]
id = "g2"
characters = "山 水"
"#;

    #[test]
    fn parse_rows_and_groups() {
        let set = parse_reference_str(SAMPLE, Path::new("test.toml")).unwrap();
        assert_eq!(set.name, "sample");
        assert_eq!(set.rows.len(), 2);
        assert_eq!(set.rows[0].characters, ["的", "一", "了", "我", "是"]);
        assert_eq!(set.rows[1].characters, ["着", "他", "地"]);
        assert_eq!(set.rows[1].index, 1);
        assert_eq!(set.rows[0].text(), "的 一 了 我 是");

        assert_eq!(set.group("g1").unwrap().coefficient, 1.5);
        assert_eq!(set.group("g2").unwrap().coefficient, 1.0);
        assert!(set.group("g3").is_none());
        assert!(validate_reference(&set).is_empty());
    }

    #[test]
    fn builtin_has_eighteen_rows_of_ten() {
        let set = ReferenceSet::builtin().unwrap();
        assert_eq!(set.rows.len(), 18);
        assert!(set.rows.iter().all(|r| r.len() == 10));
        assert_eq!(set.row(0).unwrap().characters[0], "的");
        assert_eq!(set.row(17).unwrap().characters[9], "次");
        assert!(set.row(18).is_none());
        assert!(validate_reference(&set).is_empty());
    }

    #[test]
    fn validate_flags_problems() {
        let toml = r#"
[[rows]]
characters = ""

[[rows]]
characters = "的 的"

[[groups]]
id = "g1"
coefficient = 0.0
characters = "人"

[[groups]]
id = "g1"
characters = ""
"#;
        let set = parse_reference_str(toml, Path::new("bad.toml")).unwrap();
        let warnings = validate_reference(&set);
        let messages: Vec<_> = warnings.iter().map(|w| w.message.as_str()).collect();

        assert!(messages.contains(&"row is empty"));
        assert!(messages.contains(&"character 的 appears more than once"));
        assert!(messages.iter().any(|m| m.starts_with("coefficient must be positive")));
        assert!(messages.contains(&"duplicate group ID: g1"));
        assert!(messages.contains(&"group has no characters"));
    }

    #[test]
    fn validate_empty_set() {
        let set = parse_reference_str("", Path::new("empty.toml")).unwrap();
        assert_eq!(validate_reference(&set).len(), 1);
    }

    #[test]
    fn parse_malformed_toml() {
        let result = parse_reference_str("[[rows]\ncharacters = ", Path::new("bad.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reference.toml");
        std::fs::write(&path, SAMPLE).unwrap();

        let set = load_reference(&path).unwrap();
        assert_eq!(set.groups.len(), 2);

        assert!(load_reference(&dir.path().join("missing.toml")).is_err());
    }
}
