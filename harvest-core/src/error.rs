use thiserror::Error;

/// Crate-wide error for everything below the per-thread pipeline.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("reddit: {0}")]
    RedditApi(#[from] RedditApiError),

    #[error("config: {0}")]
    Config(#[from] ConfigError),

    #[error("export: {0}")]
    Export(#[from] ExportError),

    #[error("i/o: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed JSON: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("transport: {0}")]
    Network(#[from] reqwest::Error),

    #[error("not a thread id or thread URL: {input:?}")]
    MalformedIdentifier { input: String },

    #[error("invalid input: {message}")]
    InvalidInput { message: String },

    #[error("internal: {message}")]
    Internal { message: String },
}

/// Failures reported by the Reddit API itself, one per HTTP outcome we act on.
#[derive(Error, Debug, Clone)]
pub enum RedditApiError {
    /// The token endpoint refused the application credentials.
    #[error("credentials rejected: {reason}")]
    AuthenticationFailed { reason: String },

    /// HTTP 429, with the server's `retry-after` in seconds.
    #[error("throttled, retry in {retry_after}s")]
    RateLimitExceeded { retry_after: u64 },

    #[error("access denied to {resource}")]
    Forbidden { resource: String },

    #[error("no such subreddit: r/{subreddit}")]
    SubredditNotFound { subreddit: String },

    #[error("no such thread: {post_id}")]
    PostNotFound { post_id: String },

    /// HTTP 401 on a data request; the bearer token expired or was revoked.
    #[error("access token no longer valid")]
    InvalidToken,

    #[error("timed out waiting for reddit")]
    RequestTimeout,

    #[error("unexpected payload: {details}")]
    InvalidResponse { details: String },

    #[error("HTTP {status_code} from reddit")]
    ServerError { status_code: u16 },
}

/// A raw node lacked a field the canonical record cannot be built without.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("node {node_id} is missing required field `{field}`")]
pub struct NormalizationError {
    pub node_id: String,
    pub field: &'static str,
}

/// Terminal failure of a single thread inside a batch.
#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("malformed thread identifier: {input:?}")]
    MalformedIdentifier { input: String },

    #[error("failed to fetch thread {thread}: {source}")]
    FetchFailed {
        thread: String,
        #[source]
        source: CoreError,
    },

    #[error("failed to expand continuation {placeholder} in thread {thread}: {source}")]
    ResolutionFailed {
        thread: String,
        placeholder: String,
        #[source]
        source: CoreError,
    },

    #[error("root post could not be normalized: {0}")]
    Normalization(#[from] NormalizationError),
}

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("refusing to export an empty record set")]
    Empty,

    #[error("csv: {0}")]
    Csv(#[from] csv::Error),

    #[error("writing output: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("no config file at {path}")]
    FileNotFound { path: String },

    #[error("`{field}` is required but not set")]
    MissingField { field: String },

    #[error("`{field}` cannot be {value:?}")]
    InvalidValue { field: String, value: String },

    #[error("cannot read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("config is not valid TOML: {0}")]
    Parse(#[from] toml::de::Error),
}
