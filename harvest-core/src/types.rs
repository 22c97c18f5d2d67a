use crate::error::CoreError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use url::Url;

const PLATFORM_DOMAIN: &str = "reddit.com";
const POST_PREFIX: &str = "t3_";
const COMMENT_PREFIX: &str = "t1_";

/// A thread as named by the caller: a bare ID or a full thread URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ThreadIdentifier {
    Id(String),
    Url { url: String, id: String },
}

impl ThreadIdentifier {
    /// Anything mentioning the platform domain is treated as a URL, everything
    /// else as a raw ID. Rejects input that is neither, before any network call.
    pub fn parse(input: &str) -> Result<Self, CoreError> {
        let trimmed = input.trim();
        let malformed = || CoreError::MalformedIdentifier {
            input: input.to_string(),
        };

        if trimmed.contains(PLATFORM_DOMAIN) {
            let with_scheme = if trimmed.contains("://") {
                trimmed.to_string()
            } else {
                format!("https://{}", trimmed)
            };
            let url = Url::parse(&with_scheme).map_err(|_| malformed())?;
            let id = url
                .path_segments()
                .ok_or_else(malformed)?
                .skip_while(|segment| *segment != "comments")
                .nth(1)
                .filter(|id| is_base36(id))
                .ok_or_else(malformed)?;
            return Ok(ThreadIdentifier::Url {
                url: trimmed.to_string(),
                id: id.to_ascii_lowercase(),
            });
        }

        let id = trimmed.strip_prefix(POST_PREFIX).unwrap_or(trimmed);
        if is_base36(id) {
            Ok(ThreadIdentifier::Id(id.to_ascii_lowercase()))
        } else {
            Err(malformed())
        }
    }

    /// The bare thread ID, without any kind prefix.
    pub fn thread_id(&self) -> &str {
        match self {
            ThreadIdentifier::Id(id) => id,
            ThreadIdentifier::Url { id, .. } => id,
        }
    }
}

impl fmt::Display for ThreadIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ThreadIdentifier::Id(id) => f.write_str(id),
            ThreadIdentifier::Url { url, .. } => f.write_str(url),
        }
    }
}

impl FromStr for ThreadIdentifier {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

fn is_base36(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric())
}

/// Ranking window accepted by the top-threads listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeWindow {
    Hour,
    #[default]
    Day,
    Week,
    Month,
    Year,
    All,
}

impl TimeWindow {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeWindow::Hour => "hour",
            TimeWindow::Day => "day",
            TimeWindow::Week => "week",
            TimeWindow::Month => "month",
            TimeWindow::Year => "year",
            TimeWindow::All => "all",
        }
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TimeWindow {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "hour" => Ok(TimeWindow::Hour),
            "day" => Ok(TimeWindow::Day),
            "week" => Ok(TimeWindow::Week),
            "month" => Ok(TimeWindow::Month),
            "year" => Ok(TimeWindow::Year),
            "all" => Ok(TimeWindow::All),
            other => Err(CoreError::InvalidInput {
                message: format!("unknown time window '{}'", other),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RefKind {
    Post,
    Comment,
}

/// Typed pointer to a post or comment, decoded once from a platform fullname.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NodeRef {
    pub kind: RefKind,
    pub id: String,
}

impl NodeRef {
    pub fn post(id: impl Into<String>) -> Self {
        Self {
            kind: RefKind::Post,
            id: id.into(),
        }
    }

    pub fn comment(id: impl Into<String>) -> Self {
        Self {
            kind: RefKind::Comment,
            id: id.into(),
        }
    }

    /// Decodes `t3_<id>` / `t1_<id>`. Any other prefix is not a node reference.
    pub fn from_fullname(fullname: &str) -> Option<Self> {
        if let Some(id) = fullname.strip_prefix(POST_PREFIX) {
            (!id.is_empty()).then(|| Self::post(id))
        } else if let Some(id) = fullname.strip_prefix(COMMENT_PREFIX) {
            (!id.is_empty()).then(|| Self::comment(id))
        } else {
            None
        }
    }

    pub fn fullname(&self) -> String {
        match self.kind {
            RefKind::Post => format!("{}{}", POST_PREFIX, self.id),
            RefKind::Comment => format!("{}{}", COMMENT_PREFIX, self.id),
        }
    }

    pub fn is_post(&self) -> bool {
        self.kind == RefKind::Post
    }
}

impl fmt::Display for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.fullname())
    }
}

/// Root post of a thread as returned by the platform.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawPostNode {
    pub id: String,
    pub author: Option<String>,
    pub title: Option<String>,
    pub selftext: Option<String>,
    pub url: Option<String>,
    pub created_utc: Option<f64>,
    pub subreddit: Option<String>,
    pub score: Option<i64>,
    pub permalink: Option<String>,
    pub distinguished: Option<String>,
    pub upvote_ratio: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawCommentNode {
    pub id: String,
    pub author: Option<String>,
    pub body: Option<String>,
    pub created_utc: Option<f64>,
    pub parent: Option<NodeRef>,
    /// Reference to the thread's root post.
    pub link: Option<NodeRef>,
    pub score: Option<i64>,
    pub num_reports: Option<i64>,
    pub controversiality: Option<i64>,
    pub gilded: Option<i64>,
    pub downs: Option<i64>,
    pub likes: Option<bool>,
    pub permalink: Option<String>,
    pub total_awards_received: Option<i64>,
    pub subreddit: Option<String>,
    pub replies: Vec<CommentNode>,
}

/// "N more comments not fetched yet" marker standing in for a branch.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContinuationPlaceholder {
    pub id: String,
    pub parent: NodeRef,
    pub count: u64,
    /// IDs of the hidden comments. Empty means "continue this thread": the
    /// whole subtree under `parent` must be fetched instead.
    pub children: Vec<String>,
}

impl ContinuationPlaceholder {
    pub fn is_continue_thread(&self) -> bool {
        self.children.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CommentNode {
    Comment(Box<RawCommentNode>),
    More(ContinuationPlaceholder),
}

impl CommentNode {
    pub fn is_placeholder(&self) -> bool {
        matches!(self, CommentNode::More(_))
    }
}

impl From<RawCommentNode> for CommentNode {
    fn from(comment: RawCommentNode) -> Self {
        CommentNode::Comment(Box::new(comment))
    }
}

impl From<ContinuationPlaceholder> for CommentNode {
    fn from(placeholder: ContinuationPlaceholder) -> Self {
        CommentNode::More(placeholder)
    }
}

/// Root-level comment collection of a thread, possibly holding placeholders.
pub type RawCommentTree = Vec<CommentNode>;

#[derive(Debug, Clone)]
pub struct FetchedThread {
    pub post: RawPostNode,
    pub comments: RawCommentTree,
}
