use serde::{Deserialize, Serialize};

use super::user::User;

/// Identifies a pull request on the server: project key, repository slug and id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PullRequestRef {
    pub project: String,
    pub repository: String,
    pub id: String,
}

impl PullRequestRef {
    pub fn new(
        project: impl Into<String>,
        repository: impl Into<String>,
        id: impl Into<String>,
    ) -> Self {
        Self {
            project: project.into(),
            repository: repository.into(),
            id: id.into(),
        }
    }
}

impl std::fmt::Display for PullRequestRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}#{}", self.project, self.repository, self.id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PullRequest {
    pub reference: PullRequestRef,
    /// Must match the server's current value for mutating calls.
    pub version: i64,
    reviewers: Vec<User>,
}

impl PullRequest {
    pub fn new(reference: PullRequestRef, version: i64) -> Self {
        Self {
            reference,
            version,
            reviewers: Vec::new(),
        }
    }

    pub fn project(&self) -> &str {
        &self.reference.project
    }

    pub fn repository(&self) -> &str {
        &self.reference.repository
    }

    pub fn id(&self) -> &str {
        &self.reference.id
    }

    pub fn reviewers(&self) -> &[User] {
        &self.reviewers
    }

    /// Adds `user` unless a reviewer with the same id is already present.
    pub fn add_reviewer(&mut self, user: User) -> bool {
        if self.has_reviewer(&user) {
            return false;
        }
        self.reviewers.push(user);
        true
    }

    pub(crate) fn push_reviewer(&mut self, user: User) {
        self.reviewers.push(user);
    }

    pub fn has_reviewer(&self, user: &User) -> bool {
        self.reviewers.iter().any(|r| r.id == user.id)
    }

    pub fn reviewer(&self, slug: &str) -> Option<&User> {
        self.reviewers.iter().find(|r| r.slug == slug)
    }
}
