use crate::error::Result;
use crate::models::{CommentReport, PullRequestRef};
use crate::stash::client::StashClient;

/// One page of the comment listing.
#[derive(Debug, Clone)]
pub struct CommentPage {
    pub comments: CommentReport,
    pub is_last_page: bool,
    pub next_page_start: i64,
}

pub struct CommentPaginator<'a> {
    client: &'a StashClient,
}

impl<'a> CommentPaginator<'a> {
    pub fn new(client: &'a StashClient) -> Self {
        Self { client }
    }

    /// Walks the pages starting at offset 0 until the server flags the last
    /// one. Any failing page fails the whole walk.
    pub async fn fetch_all(&self, pr: &PullRequestRef, path: &str) -> Result<CommentReport> {
        let mut report = CommentReport::new();
        let mut start = 0;

        loop {
            tracing::debug!("Fetching comments of {} on {} from {}", pr, path, start);
            let page = self
                .client
                .get_pull_request_comments_page(pr, path, start)
                .await?;
            report.extend(page.comments);

            if page.is_last_page {
                break;
            }

            start = page.next_page_start;
        }

        tracing::debug!("Fetched {} comments of {} on {}", report.len(), pr, path);
        Ok(report)
    }
}
