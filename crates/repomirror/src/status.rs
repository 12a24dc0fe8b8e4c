//! Parsing of porcelain working-tree status output.

use serde::{Deserialize, Serialize};

/// What happened to a path, derived from its two-character status marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Modified,
    Added,
    Deleted,
    Renamed,
    Copied,
    Unmerged,
    Untracked,
    Ignored,
    /// Marker was missing or not recognised.
    Unknown,
}

impl ChangeKind {
    /// Classifies a porcelain `XY` marker.
    pub fn from_code(code: &str) -> Self {
        match code {
            "??" => return ChangeKind::Untracked,
            "!!" => return ChangeKind::Ignored,
            "DD" | "AU" | "UD" | "UA" | "DU" | "AA" | "UU" => return ChangeKind::Unmerged,
            _ => {}
        }

        let has = |c: char| code.contains(c);
        if has('U') {
            ChangeKind::Unmerged
        } else if has('R') {
            ChangeKind::Renamed
        } else if has('C') {
            ChangeKind::Copied
        } else if has('A') {
            ChangeKind::Added
        } else if has('D') {
            ChangeKind::Deleted
        } else if has('M') || has('T') {
            ChangeKind::Modified
        } else {
            ChangeKind::Unknown
        }
    }
}

impl std::fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            ChangeKind::Modified => "modified",
            ChangeKind::Added => "added",
            ChangeKind::Deleted => "deleted",
            ChangeKind::Renamed => "renamed",
            ChangeKind::Copied => "copied",
            ChangeKind::Unmerged => "unmerged",
            ChangeKind::Untracked => "untracked",
            ChangeKind::Ignored => "ignored",
            ChangeKind::Unknown => "unknown",
        };
        f.write_str(label)
    }
}

/// One line of status output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeEntry {
    /// Raw status marker as printed by the tool (e.g. `" M"`, `"??"`).
    pub code: String,
    pub kind: ChangeKind,
    /// Path text as extracted from the line. Renames keep the
    /// `old -> new` form; see [`ChangeEntry::rename_target`].
    pub path: String,
}

impl ChangeEntry {
    /// For rename/copy entries of the form `old -> new`, the new path.
    pub fn rename_target(&self) -> Option<&str> {
        self.path.split_once(" -> ").map(|(_, new)| new.trim())
    }
}

/// Parses line-oriented status output into change entries.
///
/// One entry per non-empty line, order preserved. Never fails: a line that
/// does not look like `XY path` (whitespace-only included) still yields a
/// best-effort entry.
pub fn parse_status(raw: &str) -> Vec<ChangeEntry> {
    raw.lines()
        .filter(|line| !line.trim_end_matches('\r').is_empty())
        .map(parse_line)
        .collect()
}

fn parse_line(line: &str) -> ChangeEntry {
    let line = line.trim_end_matches('\r');

    if let Some((marker, path)) = line.split_once('\t') {
        let code = marker.trim().to_string();
        return ChangeEntry {
            kind: ChangeKind::from_code(&code),
            code,
            path: path.to_string(),
        };
    }

    if line.chars().count() >= 4 {
        // Fixed-width form: two marker characters, one separator, then the path.
        let code: String = line.chars().take(2).collect();
        let path: String = line.chars().skip(3).collect();
        return ChangeEntry {
            kind: ChangeKind::from_code(&code),
            code,
            path: path.trim().to_string(),
        };
    }

    ChangeEntry {
        code: String::new(),
        kind: ChangeKind::Unknown,
        path: line.trim().to_string(),
    }
}
