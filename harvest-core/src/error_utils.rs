use crate::error::*;
use serde::Serialize;
use std::fmt;
use std::time::Duration;
use tracing::error;

/// Classification helpers shared by every error type of the harvester.
pub trait ErrorExt {
    /// Logs the error at error level and hands it back for chaining.
    fn log_error(&self) -> &Self;
    /// Whether trying the same call again later can succeed.
    fn is_retryable(&self) -> bool;
    /// Wait the server asked for before the next attempt, if any.
    fn retry_after(&self) -> Option<Duration>;
    fn user_friendly_message(&self) -> String;
    /// Stable machine-readable tag.
    fn error_code(&self) -> &'static str;
}

impl ErrorExt for RedditApiError {
    fn log_error(&self) -> &Self {
        error!(code = self.error_code(), "Reddit API error: {}", self);
        self
    }

    fn is_retryable(&self) -> bool {
        matches!(
            self,
            RedditApiError::RateLimitExceeded { .. }
                | RedditApiError::RequestTimeout
                | RedditApiError::ServerError { .. }
        )
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            RedditApiError::RateLimitExceeded { retry_after } => {
                Some(Duration::from_secs(*retry_after))
            }
            _ => None,
        }
    }

    fn user_friendly_message(&self) -> String {
        match self {
            RedditApiError::AuthenticationFailed { .. } => {
                "Reddit rejected the application credentials; check your credentials.".to_string()
            }
            RedditApiError::RateLimitExceeded { retry_after } => {
                format!("Reddit is throttling requests; wait {}s.", retry_after)
            }
            RedditApiError::Forbidden { resource } => {
                format!("{} is private, quarantined or banned.", resource)
            }
            RedditApiError::SubredditNotFound { subreddit } => {
                format!("r/{} does not exist or is private.", subreddit)
            }
            RedditApiError::PostNotFound { post_id } => {
                format!("Thread {} does not exist or was removed.", post_id)
            }
            RedditApiError::InvalidToken => "The access token expired mid-run.".to_string(),
            RedditApiError::RequestTimeout => "Reddit did not answer in time.".to_string(),
            RedditApiError::InvalidResponse { .. } => {
                "Reddit answered with something other than a thread listing.".to_string()
            }
            RedditApiError::ServerError { status_code } => {
                format!("Reddit is having trouble (HTTP {}).", status_code)
            }
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            RedditApiError::AuthenticationFailed { .. } => "REDDIT_AUTH_FAILED",
            RedditApiError::RateLimitExceeded { .. } => "REDDIT_RATE_LIMIT",
            RedditApiError::Forbidden { .. } => "REDDIT_FORBIDDEN",
            RedditApiError::SubredditNotFound { .. } => "REDDIT_SUBREDDIT_NOT_FOUND",
            RedditApiError::PostNotFound { .. } => "REDDIT_POST_NOT_FOUND",
            RedditApiError::InvalidToken => "REDDIT_INVALID_TOKEN",
            RedditApiError::RequestTimeout => "REDDIT_TIMEOUT",
            RedditApiError::InvalidResponse { .. } => "REDDIT_INVALID_RESPONSE",
            RedditApiError::ServerError { .. } => "REDDIT_SERVER_ERROR",
        }
    }
}

impl ErrorExt for CoreError {
    fn log_error(&self) -> &Self {
        error!(code = self.error_code(), "{}", self);
        self
    }

    fn is_retryable(&self) -> bool {
        match self {
            CoreError::RedditApi(e) => e.is_retryable(),
            CoreError::Network(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            CoreError::RedditApi(e) => e.retry_after(),
            _ => None,
        }
    }

    fn user_friendly_message(&self) -> String {
        match self {
            CoreError::RedditApi(e) => e.user_friendly_message(),
            CoreError::Network(_) => "Could not reach Reddit; check the connection.".to_string(),
            CoreError::MalformedIdentifier { input } => {
                format!("'{}' is neither a thread ID nor a Reddit thread URL.", input)
            }
            CoreError::Config(e) => format!("Configuration problem: {}", e),
            CoreError::Export(ExportError::Empty) => {
                "Nothing to export: no records were collected.".to_string()
            }
            other => other.to_string(),
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            CoreError::RedditApi(_) => "REDDIT_API",
            CoreError::Config(_) => "CONFIG",
            CoreError::Export(_) => "EXPORT",
            CoreError::Io(_) => "IO",
            CoreError::Serialization(_) => "SERIALIZATION",
            CoreError::Network(_) => "NETWORK",
            CoreError::MalformedIdentifier { .. } => "MALFORMED_IDENTIFIER",
            CoreError::InvalidInput { .. } => "INVALID_INPUT",
            CoreError::Internal { .. } => "INTERNAL",
        }
    }
}

impl ErrorExt for ExtractionError {
    fn log_error(&self) -> &Self {
        error!(code = self.error_code(), "{}", self);
        self
    }

    /// A thread that failed on a transient remote error may succeed in a later run.
    fn is_retryable(&self) -> bool {
        match self {
            ExtractionError::FetchFailed { source, .. }
            | ExtractionError::ResolutionFailed { source, .. } => source.is_retryable(),
            _ => false,
        }
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            ExtractionError::FetchFailed { source, .. }
            | ExtractionError::ResolutionFailed { source, .. } => source.retry_after(),
            _ => None,
        }
    }

    fn user_friendly_message(&self) -> String {
        match self {
            ExtractionError::MalformedIdentifier { input } => {
                format!("'{}' is neither a thread ID nor a Reddit thread URL.", input)
            }
            ExtractionError::FetchFailed { thread, source } => {
                format!("{}: {}", thread, source.user_friendly_message())
            }
            ExtractionError::ResolutionFailed { thread, source, .. } => format!(
                "{}: hidden comments could not be loaded. {}",
                thread,
                source.user_friendly_message()
            ),
            ExtractionError::Normalization(e) => {
                format!("The thread post is incomplete ({}).", e)
            }
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            ExtractionError::MalformedIdentifier { .. } => "MALFORMED_IDENTIFIER",
            ExtractionError::FetchFailed { .. } => "FETCH_FAILED",
            ExtractionError::ResolutionFailed { .. } => "RESOLUTION_FAILED",
            ExtractionError::Normalization(_) => "NORMALIZATION_FAILED",
        }
    }
}

/// Coarse classification used by the run-level failure report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    MalformedIdentifier,
    FetchFailure,
    /// Continuation expansion failed; counts as a fetch failure of the thread.
    ResolutionFailure,
    NormalizationFailure,
}

impl FailureKind {
    pub fn is_fetch_failure(self) -> bool {
        matches!(
            self,
            FailureKind::FetchFailure | FailureKind::ResolutionFailure
        )
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            FailureKind::MalformedIdentifier => "MalformedIdentifier",
            FailureKind::FetchFailure => "FetchFailure",
            FailureKind::ResolutionFailure => "ResolutionFailure",
            FailureKind::NormalizationFailure => "NormalizationFailure",
        };
        f.write_str(label)
    }
}

impl ExtractionError {
    pub fn kind(&self) -> FailureKind {
        match self {
            ExtractionError::MalformedIdentifier { .. } => FailureKind::MalformedIdentifier,
            ExtractionError::FetchFailed { .. } => FailureKind::FetchFailure,
            ExtractionError::ResolutionFailed { .. } => FailureKind::ResolutionFailure,
            ExtractionError::Normalization(_) => FailureKind::NormalizationFailure,
        }
    }

    /// True when the underlying cause is a rejected credential; such a failure
    /// affects every thread of the run, not just this one.
    pub fn is_authentication_failure(&self) -> bool {
        match self {
            ExtractionError::FetchFailed { source, .. }
            | ExtractionError::ResolutionFailed { source, .. } => matches!(
                source,
                CoreError::RedditApi(RedditApiError::AuthenticationFailed { .. })
            ),
            _ => false,
        }
    }
}
