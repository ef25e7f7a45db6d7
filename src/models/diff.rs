use serde::{Deserialize, Serialize};

use super::comment::Comment;

/// Segment type as reported by the diff endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LineType {
    Context,
    Added,
    Removed,
}

impl LineType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LineType::Context => "CONTEXT",
            LineType::Added => "ADDED",
            LineType::Removed => "REMOVED",
        }
    }
}

impl std::fmt::Display for LineType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for LineType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "CONTEXT" => Ok(LineType::Context),
            "ADDED" => Ok(LineType::Added),
            "REMOVED" => Ok(LineType::Removed),
            other => Err(format!("unknown line type: {}", other)),
        }
    }
}

/// What a [`Diff`] entry stands for.
///
/// File-level comments are collected on a synthetic entry at line 0; it is
/// kept apart from real lines even though it reports itself as context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiffKind {
    Line(LineType),
    File,
}

impl DiffKind {
    pub fn line_type(&self) -> LineType {
        match self {
            DiffKind::Line(line_type) => *line_type,
            DiffKind::File => LineType::Context,
        }
    }
}

/// One line of a pull-request diff with the comments anchored on it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Diff {
    pub kind: DiffKind,
    pub path: String,
    pub source: i64,
    pub destination: i64,
    comments: Vec<Comment>,
}

impl Diff {
    pub fn new(line_type: LineType, path: impl Into<String>, source: i64, destination: i64) -> Self {
        Self {
            kind: DiffKind::Line(line_type),
            path: path.into(),
            source,
            destination,
            comments: Vec::new(),
        }
    }

    pub fn file_level(path: impl Into<String>) -> Self {
        Self {
            kind: DiffKind::File,
            path: path.into(),
            source: 0,
            destination: 0,
            comments: Vec::new(),
        }
    }

    pub fn line_type(&self) -> LineType {
        self.kind.line_type()
    }

    pub fn is_file_level(&self) -> bool {
        self.kind == DiffKind::File
    }

    pub fn add_comment(&mut self, comment: Comment) {
        self.comments.push(comment);
    }

    pub fn comments(&self) -> &[Comment] {
        &self.comments
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiffReport {
    diffs: Vec<Diff>,
}

impl DiffReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, diff: Diff) {
        self.diffs.push(diff);
    }

    pub fn diffs(&self) -> &[Diff] {
        &self.diffs
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Diff> {
        self.diffs.iter()
    }

    pub fn len(&self) -> usize {
        self.diffs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.diffs.is_empty()
    }

    /// Type of the first real line at `destination` in `path`.
    pub fn line_type(&self, path: &str, destination: i64) -> Option<LineType> {
        self.diffs
            .iter()
            .find(|d| !d.is_file_level() && d.path == path && d.destination == destination)
            .map(Diff::line_type)
    }

    pub fn file_level(&self, path: &str) -> Option<&Diff> {
        self.diffs.iter().find(|d| d.is_file_level() && d.path == path)
    }

    /// Every comment attached to any diff, in report order.
    pub fn comments(&self) -> Vec<&Comment> {
        self.diffs.iter().flat_map(|d| d.comments.iter()).collect()
    }
}

impl<'a> IntoIterator for &'a DiffReport {
    type Item = &'a Diff;
    type IntoIter = std::slice::Iter<'a, Diff>;

    fn into_iter(self) -> Self::IntoIter {
        self.diffs.iter()
    }
}
