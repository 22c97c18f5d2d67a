pub mod api;
pub mod auth;
pub mod convert;
pub mod rate_limiter;
pub mod retry;
pub mod wire;

#[cfg(test)]
mod tests;

pub use api::RedditApiClient;
pub use auth::{AppOnlyAuth, RedditCredentials};
pub use retry::{RetryConfig, RetryExecutor};

use async_trait::async_trait;
use harvest_core::{
    CommentNode, ContinuationPlaceholder, CoreError, FetchedThread, NodeRef, PlatformClient,
    RedditApiError, ThreadIdentifier, TimeWindow,
};
use std::future::Future;
use tracing::{info, warn};
use wire::Thing;

/// Authenticated Reddit handle: one per run, shared by every thread of a batch.
#[derive(Debug)]
pub struct RedditClient {
    api: RedditApiClient,
    auth: AppOnlyAuth,
    retry: RetryExecutor,
}

impl RedditClient {
    pub fn new(credentials: RedditCredentials) -> Result<Self, CoreError> {
        let api = RedditApiClient::new(credentials.user_agent.clone())?;
        let auth = AppOnlyAuth::new(&credentials)?;
        Ok(Self {
            api,
            auth,
            retry: RetryExecutor::new(RetryConfig::reddit()),
        })
    }

    /// Builds the client and authenticates immediately, so bad credentials
    /// surface before any thread is fetched.
    pub async fn connect(credentials: RedditCredentials) -> Result<Self, CoreError> {
        let client = Self::new(credentials)?;
        client.auth.refresh().await?;
        info!("Authenticated against the Reddit API");
        Ok(client)
    }

    pub fn with_retry_config(mut self, config: RetryConfig) -> Self {
        self.retry = RetryExecutor::new(config);
        self
    }

    pub fn with_api(mut self, api: RedditApiClient) -> Self {
        self.api = api;
        self
    }

    pub async fn is_authenticated(&self) -> bool {
        self.auth.has_fresh_token().await
    }

    pub async fn rate_limit_status(&self) -> rate_limiter::RateLimitStatus {
        self.api.get_rate_limit_status().await
    }

    /// Runs `request` with a bearer token under the retry policy. A rejected
    /// token is discarded so the next attempt re-authenticates.
    async fn authorized<T, F, Fut>(&self, operation_name: &str, request: F) -> Result<T, CoreError>
    where
        F: Fn(String) -> Fut,
        Fut: Future<Output = Result<T, CoreError>>,
    {
        let request = &request;
        let auth = &self.auth;
        self.retry
            .execute(operation_name, move || async move {
                let token = auth.access_token().await?;
                let result = request(token).await;
                if let Err(CoreError::RedditApi(RedditApiError::InvalidToken)) = &result {
                    warn!("Access token rejected, discarding it");
                    auth.invalidate().await;
                }
                result
            })
            .await
    }

    async fn expand_more_children(
        &self,
        thread_id: &str,
        placeholder: &ContinuationPlaceholder,
    ) -> Result<Vec<CommentNode>, CoreError> {
        let link = NodeRef::post(thread_id).fullname();
        let link = link.as_str();
        let api = &self.api;

        let mut things = Vec::with_capacity(placeholder.children.len());
        for chunk in placeholder.children.chunks(api::MORE_CHILDREN_BATCH) {
            let batch = self
                .authorized("morechildren", move |token| async move {
                    api.get_more_children(&token, link, chunk).await
                })
                .await?;
            things.extend(batch);
        }
        Ok(convert::assemble_fragment(&placeholder.parent, things))
    }

    async fn expand_continue_thread(
        &self,
        thread_id: &str,
        placeholder: &ContinuationPlaceholder,
    ) -> Result<Vec<CommentNode>, CoreError> {
        if placeholder.parent.is_post() {
            warn!(
                "Placeholder {} under the post lists no children; nothing to expand",
                placeholder.id
            );
            return Ok(Vec::new());
        }

        let parent_id = placeholder.parent.id.as_str();
        let api = &self.api;
        let (_, listing) = self
            .authorized("continue_thread", move |token| async move {
                api.get_thread(&token, thread_id, Some(parent_id)).await
            })
            .await?;

        let focused = listing.data.children.into_iter().find_map(|thing| match thing {
            Thing::Comment(comment) if comment.id == parent_id => Some(comment),
            _ => None,
        });
        match focused {
            Some(comment) => Ok(convert::comment_from_wire(*comment).replies),
            None => Err(CoreError::RedditApi(RedditApiError::InvalidResponse {
                details: format!(
                    "comment {} missing from its own continuation page",
                    parent_id
                ),
            })),
        }
    }
}

#[async_trait]
impl PlatformClient for RedditClient {
    async fn list_top_thread_ids(
        &self,
        community: &str,
        window: TimeWindow,
        limit: u32,
    ) -> Result<Vec<ThreadIdentifier>, CoreError> {
        let wanted = limit as usize;
        let api = &self.api;
        let mut ids = Vec::with_capacity(wanted.min(api::LISTING_PAGE_SIZE as usize));
        let mut after: Option<String> = None;

        while ids.len() < wanted {
            let page_size = (wanted - ids.len()) as u32;
            let cursor = after.as_deref();
            let listing = self
                .authorized("top_posts", move |token| async move {
                    api.get_top_posts(&token, community, window, page_size, cursor)
                        .await
                })
                .await?;

            let page_len = listing.data.children.len();
            ids.extend(listing.data.children.into_iter().filter_map(|thing| match thing {
                Thing::Link(post) => Some(ThreadIdentifier::Id(post.id)),
                _ => None,
            }));
            after = listing.data.after;
            if page_len == 0 || after.is_none() {
                break;
            }
        }

        ids.truncate(wanted);
        info!("Collected {} thread ids from r/{}", ids.len(), community);
        Ok(ids)
    }

    async fn fetch_thread(&self, identifier: &ThreadIdentifier) -> Result<FetchedThread, CoreError> {
        let thread_id = identifier.thread_id();
        let api = &self.api;
        let (post_listing, comment_listing) = self
            .authorized("fetch_thread", move |token| async move {
                api.get_thread(&token, thread_id, None).await
            })
            .await?;

        let post = post_listing
            .data
            .children
            .into_iter()
            .find_map(|thing| match thing {
                Thing::Link(post) => Some(convert::post_from_wire(*post)),
                _ => None,
            })
            .ok_or_else(|| {
                CoreError::RedditApi(RedditApiError::PostNotFound {
                    post_id: thread_id.to_string(),
                })
            })?;
        let comments = convert::tree_from_listing(comment_listing);

        info!(
            "Fetched thread {} with {} root-level comment nodes",
            thread_id,
            comments.len()
        );
        Ok(FetchedThread { post, comments })
    }

    async fn resolve_continuation(
        &self,
        thread_id: &str,
        placeholder: &ContinuationPlaceholder,
    ) -> Result<Vec<CommentNode>, CoreError> {
        if placeholder.is_continue_thread() {
            self.expand_continue_thread(thread_id, placeholder).await
        } else {
            self.expand_more_children(thread_id, placeholder).await
        }
    }
}
