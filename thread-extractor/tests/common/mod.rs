#![allow(dead_code)]

use async_trait::async_trait;
use harvest_core::{
    CommentNode, ContinuationPlaceholder, CoreError, FetchedThread, NodeRef, PlatformClient,
    RawCommentNode, RawPostNode, RedditApiError, ThreadIdentifier, TimeWindow,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// In-memory platform serving canned threads and expansions.
#[derive(Default)]
pub struct FakePlatform {
    threads: HashMap<String, FetchedThread>,
    failing_threads: HashMap<String, RedditApiError>,
    delays: HashMap<String, Duration>,
    expansions: HashMap<String, Vec<CommentNode>>,
    failing_expansions: HashMap<String, RedditApiError>,
    top: Vec<String>,
    fetch_log: Mutex<Vec<String>>,
    resolve_calls: AtomicUsize,
}

impl FakePlatform {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_thread(mut self, post: RawPostNode, comments: Vec<CommentNode>) -> Self {
        self.threads
            .insert(post.id.clone(), FetchedThread { post, comments });
        self
    }

    pub fn with_failing_thread(mut self, id: &str, error: RedditApiError) -> Self {
        self.failing_threads.insert(id.to_string(), error);
        self
    }

    pub fn with_delay(mut self, id: &str, delay: Duration) -> Self {
        self.delays.insert(id.to_string(), delay);
        self
    }

    pub fn with_expansion(mut self, placeholder_id: &str, nodes: Vec<CommentNode>) -> Self {
        self.expansions.insert(placeholder_id.to_string(), nodes);
        self
    }

    pub fn with_failing_expansion(mut self, placeholder_id: &str, error: RedditApiError) -> Self {
        self.failing_expansions
            .insert(placeholder_id.to_string(), error);
        self
    }

    pub fn with_top(mut self, ids: &[&str]) -> Self {
        self.top = ids.iter().map(|id| id.to_string()).collect();
        self
    }

    pub fn fetched(&self) -> Vec<String> {
        self.fetch_log.lock().unwrap().clone()
    }

    pub fn resolve_calls(&self) -> usize {
        self.resolve_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PlatformClient for FakePlatform {
    async fn list_top_thread_ids(
        &self,
        _community: &str,
        _window: TimeWindow,
        limit: u32,
    ) -> Result<Vec<ThreadIdentifier>, CoreError> {
        Ok(self
            .top
            .iter()
            .take(limit as usize)
            .map(|id| ThreadIdentifier::Id(id.clone()))
            .collect())
    }

    async fn fetch_thread(&self, identifier: &ThreadIdentifier) -> Result<FetchedThread, CoreError> {
        let id = identifier.thread_id().to_string();
        self.fetch_log.lock().unwrap().push(id.clone());

        if let Some(delay) = self.delays.get(&id) {
            tokio::time::sleep(*delay).await;
        }
        if let Some(error) = self.failing_threads.get(&id) {
            return Err(CoreError::RedditApi(error.clone()));
        }
        self.threads
            .get(&id)
            .cloned()
            .ok_or(CoreError::RedditApi(RedditApiError::PostNotFound { post_id: id }))
    }

    async fn resolve_continuation(
        &self,
        _thread_id: &str,
        placeholder: &ContinuationPlaceholder,
    ) -> Result<Vec<CommentNode>, CoreError> {
        self.resolve_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = self.failing_expansions.get(&placeholder.id) {
            return Err(CoreError::RedditApi(error.clone()));
        }
        Ok(self
            .expansions
            .get(&placeholder.id)
            .cloned()
            .unwrap_or_default())
    }
}

pub fn post(id: &str) -> RawPostNode {
    RawPostNode {
        id: id.to_string(),
        author: Some("op".to_string()),
        title: Some(format!("Thread {}", id)),
        selftext: Some(String::new()),
        url: Some(format!("https://www.reddit.com/r/test/comments/{}/", id)),
        created_utc: Some(1_700_000_000.0),
        subreddit: Some("test".to_string()),
        score: Some(1),
        permalink: Some(format!("/r/test/comments/{}/", id)),
        distinguished: None,
        upvote_ratio: Some(1.0),
    }
}

/// Comment of thread `thread` under `parent`.
pub fn comment(thread: &str, id: &str, parent: NodeRef, replies: Vec<CommentNode>) -> CommentNode {
    RawCommentNode {
        id: id.to_string(),
        author: Some(format!("user_{}", id)),
        body: Some(format!("body of {}", id)),
        created_utc: Some(1_700_000_100.0),
        parent: Some(parent),
        link: Some(NodeRef::post(thread)),
        score: Some(1),
        replies,
        ..Default::default()
    }
    .into()
}

pub fn more(id: &str, parent: NodeRef, children: &[&str]) -> CommentNode {
    ContinuationPlaceholder {
        id: id.to_string(),
        parent,
        count: children.len() as u64,
        children: children.iter().map(|c| c.to_string()).collect(),
    }
    .into()
}

/// Linear reply chain `c1 -> c2 -> ... -> c{depth}` under the post.
pub fn chain(thread: &str, depth: usize) -> CommentNode {
    let mut node = comment(
        thread,
        &format!("c{}", depth),
        if depth == 1 {
            NodeRef::post(thread)
        } else {
            NodeRef::comment(format!("c{}", depth - 1))
        },
        vec![],
    );
    for level in (1..depth).rev() {
        let parent = if level == 1 {
            NodeRef::post(thread)
        } else {
            NodeRef::comment(format!("c{}", level - 1))
        };
        node = comment(thread, &format!("c{}", level), parent, vec![node]);
    }
    node
}
