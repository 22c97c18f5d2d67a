use crate::rate_limiter::{RateLimitConfig, RateLimitStatus, RateLimiter};
use crate::wire::{Listing, MoreChildrenResponse, Thing};
use harvest_core::{CoreError, RedditApiError, TimeWindow};
use reqwest::{Client, Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

pub const REDDIT_API_BASE: &str = "https://oauth.reddit.com";

/// Most IDs `/api/morechildren` accepts in one request.
pub const MORE_CHILDREN_BATCH: usize = 100;
/// Largest page the listing endpoints return.
pub const LISTING_PAGE_SIZE: u32 = 100;

#[derive(Debug)]
pub struct RedditApiClient {
    http_client: Client,
    rate_limiter: RateLimiter,
    base_url: String,
    user_agent: String,
}

impl RedditApiClient {
    pub fn new(user_agent: String) -> Result<Self, CoreError> {
        let http_client = Client::builder()
            .user_agent(&user_agent)
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            http_client,
            rate_limiter: RateLimiter::new(RateLimitConfig::reddit()),
            base_url: REDDIT_API_BASE.to_string(),
            user_agent,
        })
    }

    /// Points the client at another API host, e.g. a local stub server.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    pub async fn make_request(
        &self,
        method: Method,
        endpoint: &str,
        access_token: &str,
        query_params: &[(&str, &str)],
    ) -> Result<Response, CoreError> {
        let url = format!("{}{}", self.base_url, endpoint);
        let start_time = Instant::now();

        let permit = self.rate_limiter.acquire_permit().await;
        debug!(
            "Acquired rate limit permit for {} {} after {:?}",
            method, endpoint, permit.queue_wait_time
        );

        let request_builder = self
            .http_client
            .request(method.clone(), &url)
            .bearer_auth(access_token)
            .query(&[("raw_json", "1")])
            .query(query_params);

        info!("Making Reddit API request: {} {}", method, endpoint);
        let response = request_builder.send().await.map_err(|e| {
            error!("Network error for {} {}: {}", method, endpoint, e);
            if e.is_timeout() {
                CoreError::RedditApi(RedditApiError::RequestTimeout)
            } else {
                CoreError::Network(e)
            }
        })?;

        let status = response.status();
        debug!(
            "{} {} answered {} in {:?}",
            method,
            endpoint,
            status,
            start_time.elapsed()
        );
        if status.is_success() {
            return Ok(response);
        }

        error!("Request failed with status: {} for {}", status, endpoint);
        Err(CoreError::RedditApi(status_error(status, &response, endpoint)))
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        access_token: &str,
        query_params: &[(&str, &str)],
    ) -> Result<T, CoreError> {
        let response = self
            .make_request(Method::GET, endpoint, access_token, query_params)
            .await?;
        response.json::<T>().await.map_err(|e| {
            error!("Failed to parse response from {}: {}", endpoint, e);
            CoreError::RedditApi(RedditApiError::InvalidResponse {
                details: format!("unexpected payload from {}: {}", endpoint, e),
            })
        })
    }

    /// One page of `/r/{subreddit}/top`.
    pub async fn get_top_posts(
        &self,
        access_token: &str,
        subreddit: &str,
        window: TimeWindow,
        limit: u32,
        after: Option<&str>,
    ) -> Result<Listing, CoreError> {
        let endpoint = format!("/r/{}/top", subreddit);
        let limit_str = limit.min(LISTING_PAGE_SIZE).to_string();
        let mut params = vec![("t", window.as_str()), ("limit", limit_str.as_str())];
        if let Some(after_val) = after {
            params.push(("after", after_val));
        }

        let listing: Listing = self
            .get_json(&endpoint, access_token, &params)
            .await
            .map_err(|e| match e {
                CoreError::RedditApi(RedditApiError::PostNotFound { .. }) => {
                    CoreError::RedditApi(RedditApiError::SubredditNotFound {
                        subreddit: subreddit.to_string(),
                    })
                }
                other => other,
            })?;

        info!(
            "Retrieved {} top posts from r/{} ({})",
            listing.data.children.len(),
            subreddit,
            window
        );
        Ok(listing)
    }

    /// `/comments/{thread_id}`: the post listing and the comment listing.
    /// With `focus_comment` set, the comment listing is rooted at that comment.
    pub async fn get_thread(
        &self,
        access_token: &str,
        thread_id: &str,
        focus_comment: Option<&str>,
    ) -> Result<(Listing, Listing), CoreError> {
        let endpoint = format!("/comments/{}", thread_id);
        let mut params = Vec::with_capacity(1);
        if let Some(comment) = focus_comment {
            params.push(("comment", comment));
        }

        let mut listings: Vec<Listing> = self
            .get_json(&endpoint, access_token, &params)
            .await
            .map_err(|e| match e {
                CoreError::RedditApi(RedditApiError::PostNotFound { .. }) => {
                    CoreError::RedditApi(RedditApiError::PostNotFound {
                        post_id: thread_id.to_string(),
                    })
                }
                other => other,
            })?;

        if listings.len() != 2 {
            return Err(CoreError::RedditApi(RedditApiError::InvalidResponse {
                details: format!(
                    "expected 2 listings for thread {}, got {}",
                    thread_id,
                    listings.len()
                ),
            }));
        }
        let comments = listings.pop().unwrap_or_else(empty_listing);
        let post = listings.pop().unwrap_or_else(empty_listing);
        debug!(
            "Thread {} returned {} top-level comment nodes",
            thread_id,
            comments.data.children.len()
        );
        Ok((post, comments))
    }

    /// `/api/morechildren` for at most [`MORE_CHILDREN_BATCH`] comment IDs.
    /// Results come back flat, in pre-order, each carrying its `parent_id`.
    pub async fn get_more_children(
        &self,
        access_token: &str,
        link_fullname: &str,
        children: &[String],
    ) -> Result<Vec<Thing>, CoreError> {
        if children.len() > MORE_CHILDREN_BATCH {
            return Err(CoreError::InvalidInput {
                message: format!(
                    "morechildren accepts at most {} ids, got {}",
                    MORE_CHILDREN_BATCH,
                    children.len()
                ),
            });
        }
        let joined = children.join(",");
        let params = [
            ("api_type", "json"),
            ("link_id", link_fullname),
            ("children", joined.as_str()),
            ("limit_children", "false"),
        ];

        let response: MoreChildrenResponse = self
            .get_json("/api/morechildren", access_token, &params)
            .await?;
        if !response.json.errors.is_empty() {
            warn!("morechildren reported errors: {:?}", response.json.errors);
            return Err(CoreError::RedditApi(RedditApiError::InvalidResponse {
                details: format!("morechildren errors: {:?}", response.json.errors),
            }));
        }

        let things = response.json.data.map(|d| d.things).unwrap_or_default();
        debug!(
            "morechildren returned {} items for {} ids",
            things.len(),
            children.len()
        );
        Ok(things)
    }

    pub async fn get_rate_limit_status(&self) -> RateLimitStatus {
        self.rate_limiter.status().await
    }
}

fn empty_listing() -> Listing {
    Listing {
        kind: "Listing".to_string(),
        data: Default::default(),
    }
}

fn status_error(status: StatusCode, response: &Response, endpoint: &str) -> RedditApiError {
    match status.as_u16() {
        429 => {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<f64>().ok())
                .map(|secs| secs.ceil() as u64)
                .unwrap_or(60);
            warn!("Rate limited, retry after {} seconds", retry_after);
            RedditApiError::RateLimitExceeded { retry_after }
        }
        401 => RedditApiError::InvalidToken,
        403 => RedditApiError::Forbidden {
            resource: endpoint.to_string(),
        },
        404 => RedditApiError::PostNotFound {
            post_id: endpoint.to_string(),
        },
        code if status.is_server_error() => RedditApiError::ServerError { status_code: code },
        code => RedditApiError::InvalidResponse {
            details: format!("unexpected status {} from {}", code, endpoint),
        },
    }
}
