//! Raw platform nodes to canonical records.
//!
//! Both mappings are pure: the same node and retrieve time always produce the
//! same record. A node lacking a field the record cannot be built without
//! yields a [`NormalizationError`] naming that node and field.

use chrono::DateTime;
use harvest_core::{
    CanonicalRecord, NormalizationError, RawCommentNode, RawPostNode, RecordType, RetrieveTime,
    TIMESTAMP_FORMAT,
};
use url::Url;

/// Record for the root post of a thread. Its `submission_id` is its own id.
pub fn normalize_post(
    post: &RawPostNode,
    retrieve_time: &RetrieveTime,
) -> Result<CanonicalRecord, NormalizationError> {
    let missing = |field| NormalizationError {
        node_id: post.id.clone(),
        field,
    };
    if post.id.is_empty() {
        return Err(missing("id"));
    }
    let created = post.created_utc.ok_or_else(|| missing("created_utc"))?;
    let (created_utc, created_date) = timestamp(created).ok_or_else(|| missing("created_utc"))?;

    let url_domain = post.url.as_deref().map(url_domain).unwrap_or_default();

    Ok(CanonicalRecord::builder(RecordType::Submission, post.id.clone())
        .field("id", post.id.as_str())
        .field("author", post.author.clone())
        .field("title", post.title.clone())
        .field("url", post.url.clone())
        .field("created_utc", created_utc)
        .field("subreddit", post.subreddit.clone())
        .field("score", post.score)
        .field("permalink", post.permalink.clone())
        .field("distinguished", post.distinguished.clone())
        .field("upvote_ratio", post.upvote_ratio)
        .field("url_domain", url_domain)
        .field("created_date", created_date)
        .field("submission_text", post.selftext.clone())
        .build(retrieve_time))
}

/// Record for one comment. The type comes from the kind of node the parent
/// reference points at, and `submission_id` from the thread-root reference.
pub fn normalize_comment(
    comment: &RawCommentNode,
    retrieve_time: &RetrieveTime,
) -> Result<CanonicalRecord, NormalizationError> {
    let missing = |field| NormalizationError {
        node_id: comment.id.clone(),
        field,
    };
    if comment.id.is_empty() {
        return Err(missing("id"));
    }
    let parent = comment.parent.as_ref().ok_or_else(|| missing("parent_id"))?;
    let link = comment
        .link
        .as_ref()
        .filter(|link| link.is_post())
        .ok_or_else(|| missing("link_id"))?;
    let created = comment.created_utc.ok_or_else(|| missing("created_utc"))?;
    let (created_utc, created_date) = timestamp(created).ok_or_else(|| missing("created_utc"))?;

    let record_type = if parent.is_post() {
        RecordType::Comment
    } else {
        RecordType::CommentReply
    };

    Ok(CanonicalRecord::builder(record_type, link.id.clone())
        .field("id", comment.id.as_str())
        .field("author", comment.author.clone())
        .field("body", comment.body.clone())
        .field("created_utc", created_utc)
        .field("parent_id", parent.fullname())
        .field("score", comment.score)
        .field("num_reports", comment.num_reports)
        .field("controversiality", comment.controversiality)
        .field("gilded", comment.gilded)
        .field("downs", comment.downs)
        .field("likes", comment.likes)
        .field("permalink", comment.permalink.clone())
        .field("total_awards_received", comment.total_awards_received)
        .field("subreddit", comment.subreddit.clone())
        .field("created_date", created_date)
        .build(retrieve_time))
}

/// Whole epoch seconds and their UTC calendar rendering.
fn timestamp(epoch: f64) -> Option<(i64, String)> {
    if !epoch.is_finite() {
        return None;
    }
    let secs = epoch.trunc() as i64;
    let date = DateTime::from_timestamp(secs, 0)?;
    Some((secs, date.format(TIMESTAMP_FORMAT).to_string()))
}

/// Network location of a link (host plus explicit port), or empty when the
/// link does not parse or has no host.
fn url_domain(raw: &str) -> String {
    let Ok(url) = Url::parse(raw) else {
        return String::new();
    };
    match (url.host_str(), url.port()) {
        (Some(host), Some(port)) => format!("{}:{}", host, port),
        (Some(host), None) => host.to_string(),
        _ => String::new(),
    }
}
