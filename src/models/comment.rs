use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::user::User;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    pub id: i64,
    pub message: String,
    pub path: String,
    /// `None` when the comment is attached to the whole file.
    pub line: Option<i64>,
    pub author: User,
    pub version: i64,
    pub created_at: Option<DateTime<Utc>>,
}

impl Comment {
    pub fn new(
        id: i64,
        message: impl Into<String>,
        path: impl Into<String>,
        line: Option<i64>,
        author: User,
        version: i64,
    ) -> Self {
        Self {
            id,
            message: message.into(),
            path: path.into(),
            line,
            author,
            version,
            created_at: None,
        }
    }

    pub fn with_created_at(mut self, created_at: Option<DateTime<Utc>>) -> Self {
        self.created_at = created_at;
        self
    }

    pub fn matches(&self, message: &str, path: &str, line: Option<i64>) -> bool {
        self.message == message && self.path == path && self.line == line
    }
}

/// Comments in server enumeration order, merged across pages.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommentReport {
    comments: Vec<Comment>,
}

impl CommentReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, comment: Comment) {
        self.comments.push(comment);
    }

    /// Appends every comment of `other` after the ones already held.
    pub fn extend(&mut self, other: CommentReport) {
        self.comments.extend(other.comments);
    }

    /// Exact match on message, path and line.
    pub fn contains(&self, message: &str, path: &str, line: Option<i64>) -> bool {
        self.comments.iter().any(|c| c.matches(message, path, line))
    }

    pub fn authored_by(&self, user: &User) -> CommentReport {
        self.comments
            .iter()
            .filter(|c| &c.author == user)
            .cloned()
            .collect()
    }

    pub fn for_path(&self, path: &str) -> CommentReport {
        self.comments
            .iter()
            .filter(|c| c.path == path)
            .cloned()
            .collect()
    }

    pub fn comments(&self) -> &[Comment] {
        &self.comments
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Comment> {
        self.comments.iter()
    }

    pub fn len(&self) -> usize {
        self.comments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.comments.is_empty()
    }
}

impl FromIterator<Comment> for CommentReport {
    fn from_iter<I: IntoIterator<Item = Comment>>(iter: I) -> Self {
        Self {
            comments: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for CommentReport {
    type Item = Comment;
    type IntoIter = std::vec::IntoIter<Comment>;

    fn into_iter(self) -> Self::IntoIter {
        self.comments.into_iter()
    }
}

impl<'a> IntoIterator for &'a CommentReport {
    type Item = &'a Comment;
    type IntoIter = std::slice::Iter<'a, Comment>;

    fn into_iter(self) -> Self::IntoIter {
        self.comments.iter()
    }
}
