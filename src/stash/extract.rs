//! Turns Stash REST payloads into the domain model.
//!
//! Every function takes the raw response body and either returns a fully
//! built value or an [`ExtractionError`]; nothing is returned half-built.
//! Optional fields are `Option` on the wire types, so a missing key and an
//! explicit `null` are treated the same way and defaults are applied here.
//!
//! Documents and nested records must be JSON objects. serde's derived struct
//! impls would also take a JSON array positionally, hence `from_object`.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::de::{self, DeserializeOwned, Deserializer};
use serde::Deserialize;
use serde_json::Value;

use crate::error::ExtractionError;
use crate::models::{
    Comment, CommentReport, Diff, DiffReport, LineType, PullRequest, PullRequestRef, User,
};
use crate::stash::paginator::CommentPage;

pub type Extracted<T> = std::result::Result<T, ExtractionError>;

#[derive(Deserialize)]
struct RawUser {
    id: i64,
    name: String,
    slug: String,
    email: String,
}

impl From<RawUser> for User {
    fn from(raw: RawUser) -> Self {
        User::new(raw.id, raw.name, raw.slug, raw.email)
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawCommentList {
    #[serde(default, deserialize_with = "objects")]
    values: Option<Vec<RawListedComment>>,
    is_last_page: Option<bool>,
    next_page_start: Option<i64>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawListedComment {
    id: i64,
    text: String,
    #[serde(deserialize_with = "object")]
    anchor: RawAnchor,
    version: i64,
    #[serde(deserialize_with = "object")]
    author: RawUser,
    created_date: Option<i64>,
}

#[derive(Deserialize)]
struct RawAnchor {
    path: String,
    line: Option<i64>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPage {
    is_last_page: Option<bool>,
    next_page_start: Option<i64>,
}

#[derive(Deserialize)]
struct RawPullRequest {
    version: i64,
    #[serde(default, deserialize_with = "objects")]
    reviewers: Option<Vec<RawReviewer>>,
}

#[derive(Deserialize)]
struct RawReviewer {
    #[serde(default, deserialize_with = "optional_object")]
    user: Option<RawUser>,
}

#[derive(Deserialize)]
struct RawDiffList {
    #[serde(default, deserialize_with = "objects")]
    diffs: Option<Vec<RawDiff>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawDiff {
    /// `None` when the file was deleted.
    #[serde(default, deserialize_with = "optional_object")]
    destination: Option<RawPath>,
    #[serde(default, deserialize_with = "objects")]
    hunks: Option<Vec<RawHunk>>,
    #[serde(default, deserialize_with = "objects")]
    line_comments: Option<Vec<RawDiffComment>>,
    #[serde(default, deserialize_with = "objects")]
    file_comments: Option<Vec<RawDiffComment>>,
}

#[derive(Deserialize)]
struct RawPath {
    #[serde(rename = "toString")]
    path: String,
}

#[derive(Deserialize)]
struct RawHunk {
    #[serde(default, deserialize_with = "objects")]
    segments: Option<Vec<RawSegment>>,
}

#[derive(Deserialize)]
struct RawSegment {
    #[serde(rename = "type")]
    line_type: LineType,
    #[serde(default, deserialize_with = "objects")]
    lines: Option<Vec<RawLine>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawLine {
    source: i64,
    destination: i64,
    comment_ids: Option<Vec<i64>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawDiffComment {
    id: i64,
    text: String,
    version: i64,
    #[serde(default, deserialize_with = "optional_object")]
    author: Option<RawUser>,
    created_date: Option<i64>,
}

impl RawDiffComment {
    /// Builds the comment anchored at `line`; comments without an author are dropped.
    fn to_comment(&self, path: &str, line: i64) -> Option<Comment> {
        let author = self.author.as_ref()?;
        let author = User::new(author.id, &author.name, &author.slug, &author.email);
        Some(
            Comment::new(self.id, &self.text, path, Some(line), author, self.version)
                .with_created_at(timestamp(self.created_date)),
        )
    }
}

fn from_object<T: DeserializeOwned>(value: Value) -> serde_json::Result<T> {
    if !value.is_object() {
        return Err(de::Error::invalid_type(unexpected(&value), &"a JSON object"));
    }
    T::deserialize(value)
}

fn unexpected(value: &Value) -> de::Unexpected<'_> {
    match value {
        Value::Null => de::Unexpected::Unit,
        Value::Bool(b) => de::Unexpected::Bool(*b),
        Value::Number(_) => de::Unexpected::Other("number"),
        Value::String(s) => de::Unexpected::Str(s),
        Value::Array(_) => de::Unexpected::Seq,
        Value::Object(_) => de::Unexpected::Map,
    }
}

fn object<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    from_object(Value::deserialize(deserializer)?).map_err(de::Error::custom)
}

fn optional_object<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    Option::<Value>::deserialize(deserializer)?
        .map(from_object)
        .transpose()
        .map_err(de::Error::custom)
}

fn objects<'de, D, T>(deserializer: D) -> Result<Option<Vec<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    Option::<Vec<Value>>::deserialize(deserializer)?
        .map(|values| {
            values
                .into_iter()
                .map(from_object)
                .collect::<serde_json::Result<Vec<T>>>()
        })
        .transpose()
        .map_err(de::Error::custom)
}

fn parse<T: DeserializeOwned>(document: &'static str, json: &str) -> Extracted<T> {
    serde_json::from_str::<Value>(json)
        .and_then(from_object)
        .map_err(|e| ExtractionError::new(document, e))
}

fn timestamp(millis: Option<i64>) -> Option<DateTime<Utc>> {
    millis.and_then(DateTime::<Utc>::from_timestamp_millis)
}

fn listed_comments(values: Option<Vec<RawListedComment>>) -> CommentReport {
    values
        .unwrap_or_default()
        .into_iter()
        .map(|c| {
            Comment::new(
                c.id,
                c.text,
                c.anchor.path,
                c.anchor.line,
                c.author.into(),
                c.version,
            )
            .with_created_at(timestamp(c.created_date))
        })
        .collect()
}

pub fn extract_user(json: &str) -> Extracted<User> {
    let raw: RawUser = parse("user", json)?;
    Ok(raw.into())
}

pub fn extract_comments(json: &str) -> Extracted<CommentReport> {
    let raw: RawCommentList = parse("comment list", json)?;
    Ok(listed_comments(raw.values))
}

/// Reads the comments and the paging cursor of one listing page in one pass.
pub fn extract_comment_page(json: &str) -> Extracted<CommentPage> {
    let raw: RawCommentList = parse("comment list", json)?;

    Ok(CommentPage {
        comments: listed_comments(raw.values),
        is_last_page: raw.is_last_page.unwrap_or(true),
        next_page_start: raw.next_page_start.unwrap_or(0),
    })
}

pub fn extract_pull_request(reference: PullRequestRef, json: &str) -> Extracted<PullRequest> {
    let raw: RawPullRequest = parse("pull request", json)?;

    let mut pull_request = PullRequest::new(reference, raw.version);
    for reviewer in raw.reviewers.unwrap_or_default() {
        if let Some(user) = reviewer.user {
            pull_request.push_reviewer(user.into());
        }
    }

    Ok(pull_request)
}

pub fn extract_diffs(json: &str) -> Extracted<DiffReport> {
    let raw: RawDiffList = parse("diff list", json)?;
    let mut report = DiffReport::new();

    for diff in raw.diffs.unwrap_or_default() {
        let Some(destination) = &diff.destination else {
            continue;
        };
        let path = destination.path.as_str();

        let line_comments: HashMap<i64, &RawDiffComment> = diff
            .line_comments
            .iter()
            .flatten()
            .map(|c| (c.id, c))
            .collect();

        let segments = diff
            .hunks
            .iter()
            .flatten()
            .flat_map(|hunk| hunk.segments.iter().flatten())
            .filter(|segment| segment.line_type != LineType::Removed);

        for segment in segments {
            for line in segment.lines.iter().flatten() {
                let mut entry = Diff::new(segment.line_type, path, line.source, line.destination);

                for comment_id in line.comment_ids.iter().flatten() {
                    if let Some(comment) = line_comments
                        .get(comment_id)
                        .and_then(|c| c.to_comment(path, line.destination))
                    {
                        entry.add_comment(comment);
                    }
                }

                report.add(entry);
            }
        }

        let file_comments = diff.file_comments.as_deref().unwrap_or_default();
        if !file_comments.is_empty() {
            let mut entry = Diff::file_level(path);
            for comment in file_comments.iter().filter_map(|c| c.to_comment(path, 0)) {
                entry.add_comment(comment);
            }
            report.add(entry);
        }
    }

    Ok(report)
}

/// Unpaginated responses carry no flag and count as complete.
pub fn is_last_page(json: &str) -> Extracted<bool> {
    let raw: RawPage = parse("page", json)?;
    Ok(raw.is_last_page.unwrap_or(true))
}

pub fn next_page_start(json: &str) -> Extracted<i64> {
    let raw: RawPage = parse("page", json)?;
    Ok(raw.next_page_start.unwrap_or(0))
}

#[cfg(test)]
mod tests {
    use super::*;

    const DIFFS: &str = include_str!("../../tests/fixtures/diffs.json");

    const AUTHOR: &str =
        r#"{"id":1, "name":"SonarQube", "slug":"sonarqube", "email":"sq@email.com"}"#;

    fn comment_json(id: i64, text: &str, path: &str, line: Option<i64>) -> String {
        let line = line.map(|l| format!(r#", "line":{}"#, l)).unwrap_or_default();
        format!(
            r#"{{"id":{}, "text":"{}", "anchor": {{"path":"{}"{}}}, "author": {}, "version": 0}}"#,
            id, text, path, line, AUTHOR
        )
    }

    #[test]
    fn test_extract_user() {
        let user = extract_user(
            r#"{"name":"SonarQube", "email":"sq@email.com", "id":1, "slug":"sonarqube"}"#,
        )
        .unwrap();

        assert_eq!(user.id, 1);
        assert_eq!(user.name, "SonarQube");
        assert_eq!(user.slug, "sonarqube");
        assert_eq!(user.email, "sq@email.com");
    }

    #[test]
    fn test_extract_user_missing_field() {
        let error = extract_user(r#"{"id":1, "name":"SonarQube", "slug":"sonarqube"}"#).unwrap_err();
        assert_eq!(error.document, "user");
    }

    #[test]
    fn test_extract_user_not_an_object() {
        let error = extract_user(r#"[1, "SonarQube", "sonarqube", "sq@email.com"]"#).unwrap_err();
        assert_eq!(error.document, "user");

        assert!(extract_user("42").is_err());
        assert!(extract_user("null").is_err());
        assert!(extract_user(r#"{"id":"one", "name":"a", "slug":"a", "email":"a"}"#).is_err());
    }

    #[test]
    fn test_positional_documents_are_rejected() {
        let reference = PullRequestRef::new("Project", "Repository", "7");
        assert!(extract_pull_request(reference, "[7, null]").is_err());
        assert!(is_last_page("[false, 3]").is_err());
        assert!(next_page_start("[false, 3]").is_err());
        assert!(extract_comments(r#"[[]]"#).is_err());
        assert!(extract_comment_page(r#"[[], false, 3]"#).is_err());
        assert!(extract_diffs("[[]]").is_err());
    }

    #[test]
    fn test_positional_records_are_rejected() {
        let json = r#"{"values": [{"id":1, "text":"t", "anchor": ["p", 1],
            "author": {"id":1, "name":"SonarQube", "slug":"sonarqube", "email":"sq@email.com"}, "version": 0}]}"#;
        assert!(extract_comments(json).is_err());

        let json = r#"{"version": 1, "reviewers": [{"user": [1, "SonarQube", "sonarqube", "sq@email.com"]}]}"#;
        assert!(extract_pull_request(PullRequestRef::new("P", "R", "1"), json).is_err());

        let json = r#"{"diffs": [{"destination": ["a.rs"], "hunks": []}]}"#;
        assert!(extract_diffs(json).is_err());

        let json = r#"{"diffs": [{"destination": {"toString": "a.rs"},
            "hunks": [{"segments": [{"type": "ADDED", "lines": [[1, 2]]}]}]}]}"#;
        assert!(extract_diffs(json).is_err());
    }

    #[test]
    fn test_extract_comments_keeps_order() {
        let json = format!(
            r#"{{"values": [{}, {}, {}]}}"#,
            comment_json(3, "third", "src/a.rs", Some(5)),
            comment_json(1, "first", "src/a.rs", Some(1)),
            comment_json(2, "second", "src/b.rs", None)
        );

        let report = extract_comments(&json).unwrap();
        assert_eq!(report.len(), 3);

        let ids: Vec<i64> = report.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![3, 1, 2]);

        assert!(report.contains("third", "src/a.rs", Some(5)));
        assert!(report.contains("second", "src/b.rs", None));
        assert!(!report.contains("second", "src/b.rs", Some(0)));
        assert!(!report.contains("first", "src/b.rs", Some(1)));
        assert_eq!(report.comments()[0].author.slug, "sonarqube");
    }

    #[test]
    fn test_extract_comments_without_values() {
        assert!(extract_comments(r#"{"isLastPage": true}"#).unwrap().is_empty());
        assert!(extract_comments(r#"{"values": null}"#).unwrap().is_empty());
    }

    #[test]
    fn test_extract_comments_created_date() {
        let json = format!(
            r#"{{"values": [{{"id":1, "text":"t", "anchor": {{"path":"p", "line":1}}, "author": {}, "version": 4, "createdDate": 1456219453000}}]}}"#,
            AUTHOR
        );
        let report = extract_comments(&json).unwrap();
        let comment = &report.comments()[0];

        assert_eq!(comment.version, 4);
        assert_eq!(
            comment.created_at.map(|d| d.timestamp_millis()),
            Some(1_456_219_453_000)
        );
    }

    #[test]
    fn test_extract_comments_wrong_type() {
        let error = extract_comments(r#"{"values": [{"id": "1234"}]}"#).unwrap_err();
        assert_eq!(error.document, "comment list");
    }

    #[test]
    fn test_extract_pull_request() {
        let json = format!(
            r#"{{"version": 7, "title": "PR-Test", "reviewers": [{{"user": {}}}, {{"role": "REVIEWER"}}, {{"user": {}}}]}}"#,
            AUTHOR, AUTHOR
        );
        let reference = PullRequestRef::new("Project", "Repository", "123");

        let pr = extract_pull_request(reference.clone(), &json).unwrap();
        assert_eq!(pr.reference, reference);
        assert_eq!(pr.version, 7);
        // duplicates are left to the caller
        assert_eq!(pr.reviewers().len(), 2);
    }

    #[test]
    fn test_extract_pull_request_without_reviewers() {
        let pr = extract_pull_request(
            PullRequestRef::new("Project", "Repository", "1"),
            r#"{"version": 1}"#,
        )
        .unwrap();
        assert!(pr.reviewers().is_empty());

        assert!(extract_pull_request(PullRequestRef::new("P", "R", "1"), r#"{"reviewers": []}"#)
            .is_err());
    }

    #[test]
    fn test_extract_diffs_sample() {
        let report = extract_diffs(DIFFS).unwrap();
        assert_eq!(report.len(), 5);

        let diffs = report.diffs();
        assert_eq!(diffs[0].line_type(), LineType::Context);
        assert_eq!((diffs[0].source, diffs[0].destination), (10, 30));
        assert_eq!(diffs[0].comments().len(), 1);
        assert_eq!(diffs[0].comments()[0].id, 12345);
        assert_eq!(diffs[0].comments()[0].line, Some(30));
        assert_eq!(diffs[0].comments()[0].version, 1);

        assert_eq!(diffs[1].line_type(), LineType::Added);
        assert_eq!(diffs[1].destination, 31);
        // 99999 has no matching line comment
        assert_eq!(diffs[1].comments().len(), 1);
        assert_eq!(diffs[1].comments()[0].id, 12347);

        assert!(diffs[2].comments().is_empty());

        assert!(diffs[3].is_file_level());
        assert_eq!(diffs[3].path, "stash-plugin/Test.java");
        assert_eq!(diffs[3].comments().len(), 1);
        assert_eq!(diffs[3].comments()[0].line, Some(0));

        assert_eq!(diffs[4].path, "stash-plugin/Other.java");
        assert!(!diffs[4].is_file_level());
    }

    #[test]
    fn test_extract_diffs_drops_removed_segments() {
        let report = extract_diffs(DIFFS).unwrap();

        assert!(report.iter().all(|d| d.line_type() != LineType::Removed));
        assert!(report.comments().iter().all(|c| c.id != 12346));
    }

    #[test]
    fn test_extract_diffs_skips_deleted_files() {
        let report = extract_diffs(DIFFS).unwrap();

        assert!(report.iter().all(|d| d.path != "stash-plugin/Deleted.java"));
        assert!(report.comments().iter().all(|c| c.id != 22222));
    }

    #[test]
    fn test_extract_diffs_unknown_comment_id() {
        let json = r#"{"diffs": [{"destination": {"toString": "a.rs"},
            "hunks": [{"segments": [{"type": "ADDED", "lines": [{"source": 1, "destination": 2, "commentIds": [42]}]}]}],
            "lineComments": []}]}"#;

        let report = extract_diffs(json).unwrap();
        assert_eq!(report.len(), 1);
        assert!(report.diffs()[0].comments().is_empty());
    }

    #[test]
    fn test_extract_diffs_file_comments_only() {
        let json = format!(
            r#"{{"diffs": [{{"destination": {{"toString": "a.rs"}}, "hunks": [],
                "fileComments": [{{"id": 1, "text": "one", "version": 0, "author": {a}}},
                                 {{"id": 2, "text": "two", "version": 0, "author": {a}}}]}}]}}"#,
            a = AUTHOR
        );

        let report = extract_diffs(&json).unwrap();
        assert_eq!(report.len(), 1);

        let file_level = report.file_level("a.rs").unwrap();
        assert_eq!(file_level.line_type(), LineType::Context);
        assert_eq!((file_level.source, file_level.destination), (0, 0));
        assert_eq!(file_level.comments().len(), 2);
    }

    #[test]
    fn test_extract_diffs_preserves_repeated_lines() {
        let json = r#"{"diffs": [{"destination": {"toString": "a.rs"}, "hunks": [
            {"segments": [{"type": "CONTEXT", "lines": [{"source": 5, "destination": 5}]}]},
            {"segments": [{"type": "CONTEXT", "lines": [{"source": 5, "destination": 5}]}]}]}]}"#;

        assert_eq!(extract_diffs(json).unwrap().len(), 2);
    }

    #[test]
    fn test_extract_diffs_failure_discards_everything() {
        let json = r#"{"diffs": [
            {"destination": {"toString": "a.rs"}, "hunks": [{"segments": [{"type": "ADDED", "lines": [{"source": 1, "destination": 1}]}]}]},
            {"destination": {"toString": "b.rs"}, "hunks": [{"segments": [{"type": "ADDED", "lines": [{"source": "x", "destination": 1}]}]}]}]}"#;

        let error = extract_diffs(json).unwrap_err();
        assert_eq!(error.document, "diff list");
        assert!(extract_diffs("not json").is_err());
    }

    #[test]
    fn test_extract_diffs_large_ids() {
        let json = format!(
            r#"{{"diffs": [{{"destination": {{"toString": "a.rs"}},
                "hunks": [{{"segments": [{{"type": "ADDED", "lines": [{{"source": 0, "destination": 3000000000, "commentIds": [9007199254740993]}}]}}]}}],
                "lineComments": [{{"id": 9007199254740993, "text": "big", "version": 0, "author": {}}}]}}]}}"#,
            AUTHOR
        );

        let report = extract_diffs(&json).unwrap();
        let diff = &report.diffs()[0];
        assert_eq!(diff.destination, 3_000_000_000);
        assert_eq!(diff.comments()[0].id, 9_007_199_254_740_993);
    }

    #[test]
    fn test_pagination_fields() {
        assert!(is_last_page("{}").unwrap());
        assert_eq!(next_page_start("{}").unwrap(), 0);

        let json = r#"{"values": [], "isLastPage": false, "nextPageStart": 25}"#;
        assert!(!is_last_page(json).unwrap());
        assert_eq!(next_page_start(json).unwrap(), 25);

        assert!(is_last_page(r#"{"isLastPage": "no"}"#).is_err());
    }

    #[test]
    fn test_extract_comment_page() {
        let json = format!(
            r#"{{"values": [{}], "isLastPage": false, "nextPageStart": 25}}"#,
            comment_json(1, "first", "src/a.rs", Some(1))
        );

        let page = extract_comment_page(&json).unwrap();
        assert!(page.comments.contains("first", "src/a.rs", Some(1)));
        assert!(!page.is_last_page);
        assert_eq!(page.next_page_start, 25);

        let page = extract_comment_page("{}").unwrap();
        assert!(page.comments.is_empty());
        assert!(page.is_last_page);
        assert_eq!(page.next_page_start, 0);

        let error = extract_comment_page(r#"{"nextPageStart": "25"}"#).unwrap_err();
        assert_eq!(error.document, "comment list");
    }
}
