use harvest_core::{CommentNode, PlatformClient, ThreadIdentifier};
use reddit_client::{RedditClient, RedditCredentials};
use std::env;

fn count_nodes(nodes: &[CommentNode]) -> (usize, usize) {
    nodes.iter().fold((0, 0), |(comments, placeholders), node| match node {
        CommentNode::Comment(comment) => {
            let (c, p) = count_nodes(&comment.replies);
            (comments + 1 + c, placeholders + p)
        }
        CommentNode::More(_) => (comments, placeholders + 1),
    })
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    println!("=== Reddit Thread Fetch ===\n");

    let thread = env::args()
        .nth(1)
        .ok_or("usage: fetch_thread <THREAD_ID|URL>")?;
    let identifier = ThreadIdentifier::parse(&thread)?;

    let credentials = RedditCredentials::new(
        env::var("REDDIT_CLIENT_ID")?,
        env::var("REDDIT_CLIENT_SECRET")?,
        env::var("REDDIT_USER_AGENT")
            .unwrap_or_else(|_| harvest_core::DEFAULT_USER_AGENT.to_string()),
    );

    let client = RedditClient::connect(credentials).await?;
    println!("✅ Authenticated: {}", client.is_authenticated().await);

    let fetched = client.fetch_thread(&identifier).await?;
    let (comments, placeholders) = count_nodes(&fetched.comments);
    println!("✅ Thread {} fetched", identifier.thread_id());
    println!("   Title: {}", fetched.post.title.as_deref().unwrap_or("<none>"));
    println!("   Comments in first page: {}", comments);
    println!("   Unexpanded placeholders: {}", placeholders);

    let status = client.rate_limit_status().await;
    println!(
        "   Rate limit tokens left: {}/{}",
        status.available_tokens, status.max_tokens
    );

    Ok(())
}
