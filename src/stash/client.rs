use std::time::Duration;

use reqwest::{StatusCode, Url};
use serde_json::json;

use crate::config::{ClientConfig, Credentials};
use crate::error::{BoxError, ClientError, Result};
use crate::models::{Comment, CommentReport, DiffReport, LineType, PullRequest, PullRequestRef, User};
use crate::stash::extract;
use crate::stash::paginator::{CommentPage, CommentPaginator};
use crate::stash::transport::{ApiRequest, Connector, ReqwestConnector};

pub struct StashClient {
    base_url: Url,
    credentials: Credentials,
    timeout: Duration,
    connector: Box<dyn Connector>,
}

impl StashClient {
    pub fn new(config: ClientConfig) -> Result<Self> {
        let connector = ReqwestConnector::new(config.timeout, config.verify_tls);
        Self::with_connector(config, connector)
    }

    pub fn with_connector(config: ClientConfig, connector: impl Connector + 'static) -> Result<Self> {
        let base_url = Url::parse(&config.base_url).map_err(|e| {
            ClientError::Config(format!("Invalid Stash URL {}: {}", config.base_url, e))
        })?;
        if base_url.cannot_be_a_base() {
            return Err(ClientError::Config(format!(
                "Invalid Stash URL {}: not a base URL",
                config.base_url
            )));
        }

        Ok(Self {
            base_url,
            credentials: config.credentials,
            timeout: config.timeout,
            connector: Box::new(connector),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub async fn get_user(&self, slug: &str) -> Result<User> {
        let url = self.api_url(&["users", slug])?;
        tracing::info!("Fetching Stash user: {}", slug);

        let body = self
            .call("get user", ApiRequest::get(url), &[StatusCode::OK])
            .await?;
        Ok(extract::extract_user(&body)?)
    }

    pub async fn get_pull_request(&self, pr: &PullRequestRef) -> Result<PullRequest> {
        let url = self.pull_request_url(pr, &[])?;
        tracing::info!("Fetching pull request: {}", pr);

        let body = self
            .call("get pull request", ApiRequest::get(url), &[StatusCode::OK])
            .await?;
        Ok(extract::extract_pull_request(pr.clone(), &body)?)
    }

    /// Fetches every comment on `path`, following the server's paging cursor.
    pub async fn get_pull_request_comments(
        &self,
        pr: &PullRequestRef,
        path: &str,
    ) -> Result<CommentReport> {
        CommentPaginator::new(self).fetch_all(pr, path).await
    }

    pub async fn get_pull_request_comments_page(
        &self,
        pr: &PullRequestRef,
        path: &str,
        start: i64,
    ) -> Result<CommentPage> {
        let mut url = self.pull_request_url(pr, &["comments"])?;
        url.query_pairs_mut()
            .append_pair("path", path)
            .append_pair("start", &start.to_string());

        let body = self
            .call("get pull request comments", ApiRequest::get(url), &[StatusCode::OK])
            .await?;

        Ok(extract::extract_comment_page(&body)?)
    }

    pub async fn get_pull_request_diffs(&self, pr: &PullRequestRef) -> Result<DiffReport> {
        let mut url = self.pull_request_url(pr, &["diff"])?;
        url.query_pairs_mut().append_pair("withComments", "true");
        tracing::info!("Fetching diffs of pull request: {}", pr);

        let body = self
            .call("get pull request diffs", ApiRequest::get(url), &[StatusCode::OK])
            .await?;
        Ok(extract::extract_diffs(&body)?)
    }

    pub async fn post_comment_on_pull_request(&self, pr: &PullRequestRef, message: &str) -> Result<()> {
        let url = self.pull_request_url(pr, &["comments"])?;
        let request = ApiRequest::post(url).with_body(json!({ "text": message }));

        self.call("post comment on pull request", request, &[StatusCode::CREATED])
            .await?;
        Ok(())
    }

    pub async fn post_comment_line_on_pull_request(
        &self,
        pr: &PullRequestRef,
        message: &str,
        path: &str,
        line: i64,
        line_type: LineType,
    ) -> Result<()> {
        let url = self.pull_request_url(pr, &["comments"])?;
        // context lines are anchored on the source side of the diff
        let file_type = match line_type {
            LineType::Context => "FROM",
            _ => "TO",
        };
        let request = ApiRequest::post(url).with_body(json!({
            "text": message,
            "anchor": {
                "line": line,
                "lineType": line_type.as_str(),
                "fileType": file_type,
                "path": path,
                "srcPath": path,
            }
        }));

        self.call("post line comment on pull request", request, &[StatusCode::CREATED])
            .await?;
        Ok(())
    }

    pub async fn delete_pull_request_comment(&self, pr: &PullRequestRef, comment: &Comment) -> Result<()> {
        let comment_id = comment.id.to_string();
        let mut url = self.pull_request_url(pr, &["comments", comment_id.as_str()])?;
        url.query_pairs_mut()
            .append_pair("version", &comment.version.to_string());

        self.call(
            "delete pull request comment",
            ApiRequest::delete(url),
            &[StatusCode::NO_CONTENT],
        )
        .await?;
        Ok(())
    }

    pub async fn approve_pull_request(&self, pr: &PullRequestRef) -> Result<()> {
        let url = self.pull_request_url(pr, &["approve"])?;
        tracing::info!("Approving pull request: {}", pr);

        self.call("approve pull request", ApiRequest::post(url), &[StatusCode::OK])
            .await?;
        Ok(())
    }

    pub async fn reset_pull_request_approval(&self, pr: &PullRequestRef) -> Result<()> {
        let url = self.pull_request_url(pr, &["approve"])?;
        tracing::info!("Resetting approval of pull request: {}", pr);

        self.call(
            "reset pull request approval",
            ApiRequest::delete(url),
            &[StatusCode::OK],
        )
        .await?;
        Ok(())
    }

    pub async fn add_pull_request_reviewer(
        &self,
        pr: &PullRequestRef,
        version: i64,
        reviewers: &[User],
    ) -> Result<()> {
        let url = self.pull_request_url(pr, &[])?;
        let reviewers: Vec<serde_json::Value> = reviewers
            .iter()
            .map(|user| json!({ "user": { "name": user.name } }))
            .collect();
        let request = ApiRequest::put(url).with_body(json!({
            "id": pr.id,
            "version": version,
            "reviewers": reviewers,
        }));

        self.call("add pull request reviewer", request, &[StatusCode::OK])
            .await?;
        Ok(())
    }

    /// Attaches the configured credentials to `request`.
    pub fn authorize(&self, mut request: ApiRequest) -> ApiRequest {
        request.credentials = Some(self.credentials.clone());
        request
    }

    /// Runs one request on its own connection and returns the body of an
    /// accepted response. The connection is dropped before this returns.
    async fn call(
        &self,
        operation: &'static str,
        request: ApiRequest,
        accepted: &[StatusCode],
    ) -> Result<String> {
        let connection = self.connector.connect()?;
        let request = self.authorize(request);
        tracing::debug!("{} {}", request.method, request.url);

        let response = match tokio::time::timeout(self.timeout, connection.execute(request)).await {
            Ok(Ok(response)) => response,
            Ok(Err(source)) if is_timeout(&source) => {
                return Err(ClientError::Timeout {
                    operation,
                    timeout: self.timeout,
                })
            }
            Ok(Err(source)) => return Err(ClientError::Transport { operation, source }),
            Err(_) => {
                return Err(ClientError::Timeout {
                    operation,
                    timeout: self.timeout,
                })
            }
        };

        if !accepted.contains(&response.status) {
            tracing::warn!(
                "Unable to {}: {} {}",
                operation,
                response.status.as_u16(),
                response.status_text
            );
            return Err(ClientError::Status {
                operation,
                status: response.status.as_u16(),
                status_text: response.status_text,
            });
        }

        Ok(response.body)
    }

    fn api_url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ClientError::Config(format!("Invalid Stash URL {}", self.base_url)))?
            .pop_if_empty()
            .extend(["rest", "api", "1.0"])
            .extend(segments);
        Ok(url)
    }

    fn pull_request_url(&self, pr: &PullRequestRef, tail: &[&str]) -> Result<Url> {
        let mut segments = vec![
            "projects",
            pr.project.as_str(),
            "repos",
            pr.repository.as_str(),
            "pull-requests",
            pr.id.as_str(),
        ];
        segments.extend_from_slice(tail);
        self.api_url(&segments)
    }
}

fn is_timeout(source: &BoxError) -> bool {
    source
        .downcast_ref::<reqwest::Error>()
        .is_some_and(|e| e.is_timeout())
}
