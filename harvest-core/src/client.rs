use crate::error::CoreError;
use crate::types::{CommentNode, ContinuationPlaceholder, FetchedThread, ThreadIdentifier, TimeWindow};
use async_trait::async_trait;

/// Authenticated handle to the discussion platform.
///
/// Implementations own retry and backoff for transient transport failures;
/// an `Err` returned from any method is final for that call.
#[async_trait]
pub trait PlatformClient: Send + Sync {
    /// Top threads of `community` within `window`, best first.
    async fn list_top_thread_ids(
        &self,
        community: &str,
        window: TimeWindow,
        limit: u32,
    ) -> Result<Vec<ThreadIdentifier>, CoreError>;

    /// Root post plus the root-level comment tree, placeholders included.
    async fn fetch_thread(&self, identifier: &ThreadIdentifier) -> Result<FetchedThread, CoreError>;

    /// Expands one placeholder into the nodes it stood for, in platform order.
    /// The result replaces the placeholder among its siblings and may itself
    /// contain further placeholders at any depth.
    async fn resolve_continuation(
        &self,
        thread_id: &str,
        placeholder: &ContinuationPlaceholder,
    ) -> Result<Vec<CommentNode>, CoreError>;
}
