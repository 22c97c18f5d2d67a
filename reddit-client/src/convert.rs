//! Conversion from wire shapes into the typed node model.
//!
//! Fullname strings are decoded into [`NodeRef`] here and nowhere else.

use crate::wire::{CommentData, Listing, MoreData, PostData, Thing};
use harvest_core::{
    CommentNode, ContinuationPlaceholder, NodeRef, RawCommentNode, RawPostNode, RefKind,
};
use std::collections::HashMap;
use tracing::{debug, warn};

const DELETED_AUTHOR: &str = "[deleted]";

/// Deleted accounts come back as `"[deleted]"`; they carry no identity.
fn author_name(raw: Option<String>) -> Option<String> {
    raw.filter(|name| name != DELETED_AUTHOR && !name.is_empty())
}

fn decode_ref(node_id: &str, field: &str, raw: Option<&str>) -> Option<NodeRef> {
    let raw = raw?;
    let decoded = NodeRef::from_fullname(raw);
    if decoded.is_none() {
        warn!("Node {} has undecodable {} {:?}", node_id, field, raw);
    }
    decoded
}

pub fn post_from_wire(data: PostData) -> RawPostNode {
    RawPostNode {
        id: data.id,
        author: author_name(data.author),
        title: data.title,
        selftext: data.selftext,
        url: data.url,
        created_utc: data.created_utc,
        subreddit: data.subreddit,
        score: data.score,
        permalink: data.permalink,
        distinguished: data.distinguished,
        upvote_ratio: data.upvote_ratio,
    }
}

pub fn comment_from_wire(data: CommentData) -> RawCommentNode {
    let parent = decode_ref(&data.id, "parent_id", data.parent_id.as_deref());
    let link = decode_ref(&data.id, "link_id", data.link_id.as_deref());
    let replies = nodes_from_things(data.replies.into_children());

    RawCommentNode {
        id: data.id,
        author: author_name(data.author),
        body: data.body,
        created_utc: data.created_utc,
        parent,
        link,
        score: data.score,
        num_reports: data.num_reports,
        controversiality: data.controversiality,
        gilded: data.gilded,
        downs: data.downs,
        likes: data.likes,
        permalink: data.permalink,
        total_awards_received: data.total_awards_received,
        subreddit: data.subreddit,
        replies,
    }
}

pub fn placeholder_from_wire(data: MoreData) -> Option<ContinuationPlaceholder> {
    let parent = decode_ref(&data.id, "parent_id", Some(&data.parent_id))?;
    Some(ContinuationPlaceholder {
        id: data.id,
        parent,
        count: data.count,
        children: data.children,
    })
}

fn node_from_thing(thing: Thing) -> Option<CommentNode> {
    match thing {
        Thing::Comment(data) => Some(comment_from_wire(*data).into()),
        Thing::More(data) => placeholder_from_wire(data).map(CommentNode::More),
        Thing::Link(data) => {
            debug!("Ignoring post {} inside a comment listing", data.id);
            None
        }
    }
}

/// Converts an already-nested listing (thread page, `replies` field).
pub fn nodes_from_things(things: Vec<Thing>) -> Vec<CommentNode> {
    things.into_iter().filter_map(node_from_thing).collect()
}

pub fn tree_from_listing(listing: Listing) -> Vec<CommentNode> {
    nodes_from_things(listing.data.children)
}

fn parent_of(node: &CommentNode) -> Option<&NodeRef> {
    match node {
        CommentNode::Comment(comment) => comment.parent.as_ref(),
        CommentNode::More(placeholder) => Some(&placeholder.parent),
    }
}

/// Re-nests the flat, pre-ordered result of a continuation expansion.
///
/// Items whose parent is `anchor` become top-level entries of the returned
/// fragment. Items whose parent is another comment of the fragment are
/// attached to it, keeping the order the platform returned them in. Items
/// whose parent is neither stay at top level so nothing is dropped.
pub fn assemble_fragment(anchor: &NodeRef, things: Vec<Thing>) -> Vec<CommentNode> {
    let mut slots: Vec<Option<CommentNode>> =
        things.into_iter().filter_map(node_from_thing).map(Some).collect();

    let positions: HashMap<String, usize> = slots
        .iter()
        .enumerate()
        .filter_map(|(index, slot)| match slot {
            Some(CommentNode::Comment(comment)) => Some((comment.id.clone(), index)),
            _ => None,
        })
        .collect();

    let parents: Vec<Option<usize>> = slots
        .iter()
        .enumerate()
        .map(|(index, slot)| {
            let parent = slot.as_ref().and_then(parent_of)?;
            if parent == anchor {
                return None;
            }
            match positions.get(&parent.id) {
                Some(&position) if parent.kind == RefKind::Comment && position < index => {
                    Some(position)
                }
                _ => {
                    warn!(
                        "Continuation item at position {} has parent {} outside the fragment",
                        index, parent
                    );
                    None
                }
            }
        })
        .collect();

    // Walk backwards so every child is complete before its parent is placed.
    let mut pending: Vec<Vec<CommentNode>> = vec![Vec::new(); slots.len()];
    let mut roots = Vec::new();
    for index in (0..slots.len()).rev() {
        let Some(mut node) = slots[index].take() else {
            continue;
        };
        if let CommentNode::Comment(comment) = &mut node {
            let mut children = std::mem::take(&mut pending[index]);
            children.reverse();
            comment.replies.extend(children);
        }
        match parents[index] {
            Some(parent) => pending[parent].push(node),
            None => roots.push(node),
        }
    }
    roots.reverse();
    roots
}
