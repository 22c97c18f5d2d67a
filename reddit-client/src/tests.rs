use crate::{api::RedditApiClient, wire::Thing, AppOnlyAuth, RedditClient, RedditCredentials, RetryConfig};
use harvest_core::{
    CommentNode, ContinuationPlaceholder, CoreError, ErrorExt, NodeRef, PlatformClient,
    RedditApiError, TimeWindow,
};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

fn create_test_credentials() -> RedditCredentials {
    RedditCredentials::new(
        "test_client_id".to_string(),
        "test_client_secret".to_string(),
        "thread-harvest/0.1 by test_user".to_string(),
    )
}

/// Serves exactly one HTTP response and hands back the raw request head.
async fn serve_once(status: &'static str, headers: &'static str, body: String) -> (String, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base_url = format!("http://{}", listener.local_addr().unwrap());

    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut request = Vec::new();
        let mut buf = [0u8; 1024];
        while !request.windows(4).any(|w| w == b"\r\n\r\n") {
            let n = socket.read(&mut buf).await.unwrap();
            if n == 0 {
                break;
            }
            request.extend_from_slice(&buf[..n]);
        }
        let response = format!(
            "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n{}\r\n{}",
            status,
            body.len(),
            headers,
            body
        );
        socket.write_all(response.as_bytes()).await.unwrap();
        socket.shutdown().await.ok();
        String::from_utf8_lossy(&request).into_owned()
    });

    (base_url, handle)
}

/// Serves the given responses to successive connections, in order, and
/// returns every request head it saw.
async fn serve_sequence(responses: Vec<(&'static str, String)>) -> (String, JoinHandle<Vec<String>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base_url = format!("http://{}", listener.local_addr().unwrap());

    let handle = tokio::spawn(async move {
        let mut seen = Vec::new();
        for (status, body) in responses {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 4096];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
            }
            let response = format!(
                "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
            seen.push(String::from_utf8_lossy(&request).into_owned());
        }
        seen
    });

    (base_url, handle)
}

/// A client with a cached token talking to `base_url`, retrying quickly.
async fn stub_client(base_url: &str) -> RedditClient {
    let client = RedditClient::new(create_test_credentials())
        .unwrap()
        .with_api(stub_api(base_url))
        .with_retry_config(RetryConfig {
            attempts: 2,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            jitter: 0.0,
        });
    client.auth.seed_token("seeded").await;
    client
}

fn request_line(head: &str) -> &str {
    head.lines().next().unwrap_or_default()
}

fn top_page(ids: &[&str], after: Option<&str>) -> String {
    let children: Vec<_> = ids
        .iter()
        .map(|id| serde_json::json!({"kind": "t3", "data": {"id": id}}))
        .collect();
    serde_json::json!({"kind": "Listing", "data": {"after": after, "before": null, "children": children}})
        .to_string()
}

fn stub_api(base_url: &str) -> RedditApiClient {
    RedditApiClient::new("thread-harvest/test".to_string())
        .unwrap()
        .with_base_url(base_url)
}

#[test]
fn test_client_creation() {
    let client = RedditClient::new(create_test_credentials());
    assert!(client.is_ok());
}

#[tokio::test]
async fn test_client_starts_unauthenticated() {
    let client = RedditClient::new(create_test_credentials()).unwrap();
    assert!(!client.is_authenticated().await);
}

#[test]
fn test_client_debug_hides_secret() {
    let client = RedditClient::new(create_test_credentials()).unwrap();
    assert!(!format!("{:?}", client).contains("test_client_secret"));
}

#[tokio::test]
async fn test_thread_request_parses_post_and_comments() {
    let body = serde_json::json!([
        {"kind": "Listing", "data": {"after": null, "before": null, "children": [
            {"kind": "t3", "data": {"id": "abc", "title": "Hello", "author": "op",
                "url": "https://example.com/x", "created_utc": 1640995200.0, "score": 10}}
        ]}},
        {"kind": "Listing", "data": {"after": null, "before": null, "children": [
            {"kind": "t1", "data": {"id": "c1", "parent_id": "t3_abc", "link_id": "t3_abc", "replies": ""}},
            {"kind": "more", "data": {"id": "m1", "parent_id": "t3_abc", "count": 2, "children": ["c2", "c3"]}}
        ]}}
    ])
    .to_string();
    let (base_url, server) = serve_once("200 OK", "", body).await;

    let (post, comments) = stub_api(&base_url)
        .get_thread("token123", "abc", None)
        .await
        .unwrap();

    let request = server.await.unwrap();
    assert!(request.starts_with("GET /comments/abc?raw_json=1 "));
    assert!(request.to_lowercase().contains("authorization: bearer token123"));
    assert!(matches!(&post.data.children[0], Thing::Link(p) if p.id == "abc"));
    assert_eq!(comments.data.children.len(), 2);
}

#[tokio::test]
async fn test_top_posts_request_carries_window_and_limit() {
    let body = serde_json::json!({"kind": "Listing", "data": {"after": "t3_zz", "before": null,
        "children": [{"kind": "t3", "data": {"id": "zz"}}]}})
    .to_string();
    let (base_url, server) = serve_once("200 OK", "", body).await;

    let listing = stub_api(&base_url)
        .get_top_posts("token", "rust", TimeWindow::Week, 250, Some("t3_yy"))
        .await
        .unwrap();

    let request = server.await.unwrap();
    assert!(request.starts_with("GET /r/rust/top?raw_json=1&t=week&limit=100&after=t3_yy "));
    assert_eq!(listing.data.after.as_deref(), Some("t3_zz"));
}

#[tokio::test]
async fn test_more_children_request() {
    let body = serde_json::json!({"json": {"errors": [], "data": {"things": [
        {"kind": "t1", "data": {"id": "c2", "parent_id": "t3_abc", "replies": ""}}
    ]}}})
    .to_string();
    let (base_url, server) = serve_once("200 OK", "", body).await;

    let things = stub_api(&base_url)
        .get_more_children("token", "t3_abc", &["c2".to_string(), "c3".to_string()])
        .await
        .unwrap();

    let request = server.await.unwrap();
    assert!(request.starts_with("GET /api/morechildren?raw_json=1&api_type=json&link_id=t3_abc&children=c2%2Cc3&limit_children=false "));
    assert_eq!(things.len(), 1);
}

#[tokio::test]
async fn test_rate_limit_status_maps_to_retry_after() {
    let (base_url, server) = serve_once(
        "429 Too Many Requests",
        "Retry-After: 7\r\n",
        "{}".to_string(),
    )
    .await;

    let result = stub_api(&base_url).get_thread("token", "abc", None).await;
    server.await.unwrap();
    assert!(matches!(
        result,
        Err(CoreError::RedditApi(RedditApiError::RateLimitExceeded { retry_after: 7 }))
    ));
}

#[tokio::test]
async fn test_missing_thread_maps_to_post_not_found() {
    let (base_url, server) = serve_once("404 Not Found", "", "{}".to_string()).await;

    let result = stub_api(&base_url).get_thread("token", "gone", None).await;
    server.await.unwrap();
    match result {
        Err(CoreError::RedditApi(RedditApiError::PostNotFound { post_id })) => {
            assert_eq!(post_id, "gone")
        }
        other => panic!("expected PostNotFound, got {:?}", other),
    }
}

#[tokio::test]
async fn test_unauthorized_maps_to_invalid_token() {
    let (base_url, server) = serve_once("401 Unauthorized", "", "{}".to_string()).await;

    let result = stub_api(&base_url).get_thread("stale", "abc", None).await;
    server.await.unwrap();
    assert!(matches!(
        result,
        Err(CoreError::RedditApi(RedditApiError::InvalidToken))
    ));
}

#[tokio::test]
async fn test_garbage_payload_is_invalid_response() {
    let (base_url, server) = serve_once("200 OK", "", "[]".to_string()).await;

    let result = stub_api(&base_url).get_thread("token", "abc", None).await;
    server.await.unwrap();
    assert!(matches!(
        result,
        Err(CoreError::RedditApi(RedditApiError::InvalidResponse { .. }))
    ));
}

#[tokio::test]
async fn test_top_listing_follows_after_and_truncates_to_limit() {
    let (base_url, server) = serve_sequence(vec![
        ("200 OK", top_page(&["a", "b"], Some("t3_b"))),
        ("200 OK", top_page(&["c", "d"], Some("t3_d"))),
    ])
    .await;
    let client = stub_client(&base_url).await;

    let ids = client
        .list_top_thread_ids("rust", TimeWindow::Day, 3)
        .await
        .unwrap();

    let requests = server.await.unwrap();
    let ids: Vec<_> = ids.iter().map(|id| id.thread_id().to_string()).collect();
    assert_eq!(ids, vec!["a", "b", "c"]);
    assert_eq!(requests.len(), 2);
    assert!(request_line(&requests[0]).starts_with("GET /r/rust/top?raw_json=1&t=day&limit=3 "));
    assert!(request_line(&requests[1])
        .starts_with("GET /r/rust/top?raw_json=1&t=day&limit=1&after=t3_b "));
}

#[tokio::test]
async fn test_top_listing_stops_on_empty_page() {
    let (base_url, server) = serve_sequence(vec![
        ("200 OK", top_page(&["a", "b"], Some("t3_b"))),
        ("200 OK", top_page(&[], Some("t3_zz"))),
    ])
    .await;
    let client = stub_client(&base_url).await;

    let ids = client
        .list_top_thread_ids("rust", TimeWindow::All, 50)
        .await
        .unwrap();

    assert_eq!(server.await.unwrap().len(), 2);
    assert_eq!(ids.len(), 2);
}

#[tokio::test]
async fn test_top_listing_stops_without_cursor() {
    let (base_url, server) =
        serve_sequence(vec![("200 OK", top_page(&["a"], None))]).await;
    let client = stub_client(&base_url).await;

    let ids = client
        .list_top_thread_ids("rust", TimeWindow::Week, 4_000_000_000)
        .await
        .unwrap();

    assert_eq!(server.await.unwrap().len(), 1);
    assert_eq!(ids.len(), 1);
}

#[tokio::test]
async fn test_large_continuation_is_split_into_sequential_requests() {
    let children: Vec<String> = (0..150).map(|i| format!("k{}", i)).collect();
    let first = serde_json::json!({"json": {"errors": [], "data": {"things": [
        {"kind": "t1", "data": {"id": "k0", "parent_id": "t3_abc", "link_id": "t3_abc", "replies": ""}}
    ]}}})
    .to_string();
    let second = serde_json::json!({"json": {"errors": [], "data": {"things": [
        {"kind": "t1", "data": {"id": "k100", "parent_id": "t1_k0", "link_id": "t3_abc", "replies": ""}}
    ]}}})
    .to_string();
    let (base_url, server) =
        serve_sequence(vec![("200 OK", first), ("200 OK", second)]).await;
    let client = stub_client(&base_url).await;

    let placeholder = ContinuationPlaceholder {
        id: "m1".to_string(),
        parent: NodeRef::post("abc"),
        count: 150,
        children,
    };
    let fragment = client.resolve_continuation("abc", &placeholder).await.unwrap();

    let requests = server.await.unwrap();
    assert_eq!(requests.len(), 2);
    assert!(request_line(&requests[0]).contains("children=k0%2Ck1%2C"));
    assert!(request_line(&requests[0]).contains("%2Ck99&"));
    assert!(request_line(&requests[1]).contains("children=k100%2C"));
    assert!(!request_line(&requests[1]).contains("k99%2C"));

    assert_eq!(fragment.len(), 1);
    match &fragment[0] {
        CommentNode::Comment(k0) => {
            assert_eq!(k0.id, "k0");
            assert!(matches!(&k0.replies[..], [CommentNode::Comment(k100)] if k100.id == "k100"));
        }
        other => panic!("expected a comment, got {:?}", other),
    }
}

fn continue_page(focused: Option<&str>) -> String {
    let comments = match focused {
        Some(id) => serde_json::json!([
            {"kind": "t1", "data": {"id": id, "parent_id": "t1_c4", "link_id": "t3_abc",
                "replies": {"kind": "Listing", "data": {"after": null, "before": null, "children": [
                    {"kind": "t1", "data": {"id": "c6", "parent_id": "t1_c5", "link_id": "t3_abc", "replies": ""}}
                ]}}}}
        ]),
        None => serde_json::json!([]),
    };
    serde_json::json!([
        {"kind": "Listing", "data": {"after": null, "before": null, "children": [
            {"kind": "t3", "data": {"id": "abc"}}
        ]}},
        {"kind": "Listing", "data": {"after": null, "before": null, "children": comments}}
    ])
    .to_string()
}

fn continue_placeholder() -> ContinuationPlaceholder {
    ContinuationPlaceholder {
        id: "more_c5".to_string(),
        parent: NodeRef::comment("c5"),
        count: 0,
        children: Vec::new(),
    }
}

#[tokio::test]
async fn test_continue_thread_returns_replies_of_focused_comment() {
    let (base_url, server) =
        serve_sequence(vec![("200 OK", continue_page(Some("c5")))]).await;
    let client = stub_client(&base_url).await;

    let fragment = client
        .resolve_continuation("abc", &continue_placeholder())
        .await
        .unwrap();

    let requests = server.await.unwrap();
    assert!(request_line(&requests[0]).starts_with("GET /comments/abc?raw_json=1&comment=c5 "));
    assert!(matches!(&fragment[..], [CommentNode::Comment(c6)] if c6.id == "c6"));
}

#[tokio::test]
async fn test_continue_thread_without_focused_comment_is_invalid() {
    let (base_url, server) = serve_sequence(vec![("200 OK", continue_page(None))]).await;
    let client = stub_client(&base_url).await;

    let result = client
        .resolve_continuation("abc", &continue_placeholder())
        .await;

    assert_eq!(server.await.unwrap().len(), 1);
    assert!(matches!(
        result,
        Err(CoreError::RedditApi(RedditApiError::InvalidResponse { .. }))
    ));
}

fn token_auth(base_url: &str) -> AppOnlyAuth {
    AppOnlyAuth::with_token_url(
        &create_test_credentials(),
        &format!("{}/api/v1/access_token", base_url),
    )
    .unwrap()
}

#[tokio::test]
async fn test_token_grant_is_cached() {
    let body = serde_json::json!({"access_token": "fresh", "token_type": "bearer",
        "expires_in": 3600, "scope": "*"})
    .to_string();
    let (base_url, server) = serve_once("200 OK", "", body).await;
    let auth = token_auth(&base_url);

    assert_eq!(auth.refresh().await.unwrap(), "fresh");
    let request = server.await.unwrap();
    assert!(request.starts_with("POST /api/v1/access_token "));
    assert!(request.to_lowercase().contains("authorization: basic "));
    assert!(auth.has_fresh_token().await);
    assert_eq!(auth.access_token().await.unwrap(), "fresh");
}

#[tokio::test]
async fn test_unreachable_token_endpoint_is_retryable() {
    let auth = token_auth("http://127.0.0.1:1");

    let error = auth.refresh().await.unwrap_err();
    assert!(!matches!(
        error,
        CoreError::RedditApi(RedditApiError::AuthenticationFailed { .. })
    ));
    assert!(error.is_retryable());
}

#[tokio::test]
async fn test_token_endpoint_outage_is_a_server_error() {
    let (base_url, server) =
        serve_once("503 Service Unavailable", "", "{}".to_string()).await;

    let error = token_auth(&base_url).refresh().await.unwrap_err();
    server.await.unwrap();
    assert!(matches!(
        error,
        CoreError::RedditApi(RedditApiError::ServerError { status_code: 503 })
    ));
    assert!(error.is_retryable());
}

#[tokio::test]
async fn test_rejected_credentials_fail_authentication() {
    let (base_url, server) = serve_once(
        "401 Unauthorized",
        "",
        r#"{"message": "Unauthorized", "error": 401}"#.to_string(),
    )
    .await;
    let error = token_auth(&base_url).refresh().await.unwrap_err();
    server.await.unwrap();
    assert!(matches!(
        error,
        CoreError::RedditApi(RedditApiError::AuthenticationFailed { .. })
    ));

    let (base_url, server) = serve_once(
        "400 Bad Request",
        "",
        r#"{"error": "invalid_client"}"#.to_string(),
    )
    .await;
    let error = token_auth(&base_url).refresh().await.unwrap_err();
    server.await.unwrap();
    assert!(matches!(
        error,
        CoreError::RedditApi(RedditApiError::AuthenticationFailed { .. })
    ));
    assert!(!error.is_retryable());
}
