use crate::resolver::{MaterializedComment, MaterializedTree};
use harvest_core::RawCommentNode;
use std::collections::VecDeque;

/// Level-order walk of the tree: all top-level comments first, then their
/// replies, and so on down. A comment therefore always precedes its replies,
/// and siblings keep the order the platform returned them in.
///
/// Uses an explicit queue so arbitrarily deep reply chains cannot overflow.
pub fn flatten(tree: MaterializedTree) -> Vec<RawCommentNode> {
    let mut ordered = Vec::with_capacity(tree.len());
    let mut queue: VecDeque<MaterializedComment> = tree.into_roots().into();

    while let Some(MaterializedComment { comment, replies }) = queue.pop_front() {
        ordered.push(comment);
        queue.extend(replies);
    }

    ordered
}
