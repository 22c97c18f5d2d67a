//! Expansion of continuation placeholders into a fully materialized tree.
//!
//! The platform hands out comment trees with "more comments" markers in place
//! of some branches. Expanding one marker can surface new markers anywhere
//! below it, so resolution runs until a scan finds none left.

use harvest_core::{
    CommentNode, ContinuationPlaceholder, CoreError, ExtractionError, PlatformClient,
    RawCommentNode, RawCommentTree,
};
use std::collections::HashSet;
use std::vec;
use tracing::{debug, info};

/// A comment with all of its descendants fetched.
#[derive(Debug, Clone, PartialEq)]
pub struct MaterializedComment {
    /// The comment itself; its `replies` list is always empty here.
    pub comment: RawCommentNode,
    pub replies: Vec<MaterializedComment>,
}

/// Comment tree of a thread that contains real comments only.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MaterializedTree {
    roots: Vec<MaterializedComment>,
}

impl MaterializedTree {
    /// Converts a placeholder-free tree. Returns the first placeholder found
    /// if the tree still has one.
    pub fn try_from_nodes(nodes: RawCommentTree) -> Result<Self, ContinuationPlaceholder> {
        Ok(Self {
            roots: materialize(nodes)?,
        })
    }

    pub fn roots(&self) -> &[MaterializedComment] {
        &self.roots
    }

    pub fn into_roots(self) -> Vec<MaterializedComment> {
        self.roots
    }

    /// Total number of comments at every depth.
    pub fn len(&self) -> usize {
        let mut total = 0;
        let mut levels: Vec<&[MaterializedComment]> = vec![&self.roots];
        while let Some(level) = levels.pop() {
            total += level.len();
            levels.extend(level.iter().map(|n| n.replies.as_slice()));
        }
        total
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    /// Back to the platform representation, each comment owning its replies.
    pub fn into_nodes(self) -> RawCommentTree {
        // Comments whose replies are still being rebuilt, innermost last.
        let mut open: Vec<(RawCommentNode, vec::IntoIter<MaterializedComment>, RawCommentTree)> =
            Vec::new();
        let mut roots = Vec::with_capacity(self.roots.len());
        let mut pending_roots = self.roots.into_iter();

        loop {
            let next = match open.last_mut() {
                Some((_, pending, _)) => pending.next(),
                None => pending_roots.next(),
            };
            match next {
                Some(MaterializedComment { comment, replies }) => {
                    let rebuilt = Vec::with_capacity(replies.len());
                    open.push((comment, replies.into_iter(), rebuilt));
                }
                None => match open.pop() {
                    Some((mut comment, _, replies)) => {
                        comment.replies = replies;
                        match open.last_mut() {
                            Some((_, _, siblings)) => siblings.push(comment.into()),
                            None => roots.push(comment.into()),
                        }
                    }
                    None => return roots,
                },
            }
        }
    }
}

fn materialize(nodes: RawCommentTree) -> Result<Vec<MaterializedComment>, ContinuationPlaceholder> {
    // Comments whose replies are still being converted, innermost last.
    let mut open: Vec<(RawCommentNode, vec::IntoIter<CommentNode>, Vec<MaterializedComment>)> =
        Vec::new();
    let mut roots = Vec::with_capacity(nodes.len());
    let mut pending_roots = nodes.into_iter();

    loop {
        let next = match open.last_mut() {
            Some((_, pending, _)) => pending.next(),
            None => pending_roots.next(),
        };
        match next {
            Some(CommentNode::Comment(comment)) => {
                let mut comment = *comment;
                let replies = std::mem::take(&mut comment.replies);
                let converted = Vec::with_capacity(replies.len());
                open.push((comment, replies.into_iter(), converted));
            }
            Some(CommentNode::More(placeholder)) => return Err(placeholder),
            None => match open.pop() {
                Some((comment, _, replies)) => {
                    let done = MaterializedComment { comment, replies };
                    match open.last_mut() {
                        Some((_, _, siblings)) => siblings.push(done),
                        None => roots.push(done),
                    }
                }
                None => return Ok(roots),
            },
        }
    }
}

/// Expands every placeholder of one thread, one expansion at a time.
pub struct TreeResolver<'a, C: PlatformClient + ?Sized> {
    client: &'a C,
    thread_id: &'a str,
}

impl<'a, C: PlatformClient + ?Sized> TreeResolver<'a, C> {
    pub fn new(client: &'a C, thread_id: &'a str) -> Self {
        Self { client, thread_id }
    }

    /// Runs expansions until no placeholder is left. A tree without
    /// placeholders is returned as is, without touching the client.
    ///
    /// Any expansion failure fails the whole thread. A placeholder that shows
    /// up again after it was expanded would loop forever and is reported as a
    /// failed expansion instead.
    pub async fn resolve(&self, mut tree: RawCommentTree) -> Result<MaterializedTree, ExtractionError> {
        let mut expanded: HashSet<ContinuationPlaceholder> = HashSet::new();

        while let Some((path, placeholder)) = first_placeholder(&tree) {
            if expanded.contains(&placeholder) {
                return Err(self.failure(
                    &placeholder,
                    CoreError::Internal {
                        message: "expansion returned an already expanded placeholder".to_string(),
                    },
                ));
            }

            debug!(
                "Expanding placeholder {} under {} ({} hidden comments) in thread {}",
                placeholder.id, placeholder.parent, placeholder.count, self.thread_id
            );
            let replacement = self
                .client
                .resolve_continuation(self.thread_id, &placeholder)
                .await
                .map_err(|source| self.failure(&placeholder, source))?;

            splice(&mut tree, &path, replacement).ok_or_else(|| {
                self.failure(
                    &placeholder,
                    CoreError::Internal {
                        message: "placeholder vanished from the tree".to_string(),
                    },
                )
            })?;
            expanded.insert(placeholder);
        }

        if !expanded.is_empty() {
            info!(
                "Thread {} needed {} continuation expansions",
                self.thread_id,
                expanded.len()
            );
        }

        MaterializedTree::try_from_nodes(tree).map_err(|placeholder| {
            self.failure(
                &placeholder,
                CoreError::Internal {
                    message: "placeholder survived resolution".to_string(),
                },
            )
        })
    }

    fn failure(&self, placeholder: &ContinuationPlaceholder, source: CoreError) -> ExtractionError {
        ExtractionError::ResolutionFailed {
            thread: self.thread_id.to_string(),
            placeholder: placeholder.id.clone(),
            source,
        }
    }
}

/// Index path (one index per level) to the first placeholder in pre-order.
fn first_placeholder(tree: &[CommentNode]) -> Option<(Vec<usize>, ContinuationPlaceholder)> {
    // `path` always holds one index fewer than there are open levels.
    let mut levels = vec![tree.iter().enumerate()];
    let mut path = Vec::new();

    while let Some(level) = levels.last_mut() {
        match level.next() {
            Some((index, CommentNode::More(placeholder))) => {
                path.push(index);
                return Some((path, placeholder.clone()));
            }
            Some((index, CommentNode::Comment(comment))) => {
                path.push(index);
                levels.push(comment.replies.iter().enumerate());
            }
            None => {
                levels.pop();
                path.pop();
            }
        }
    }
    None
}

/// Replaces the node at `path` with `replacement`, keeping sibling order.
fn splice(tree: &mut RawCommentTree, path: &[usize], replacement: Vec<CommentNode>) -> Option<()> {
    let (&slot, parents) = path.split_last()?;
    let mut siblings = tree;
    for &index in parents {
        siblings = match siblings.get_mut(index)? {
            CommentNode::Comment(comment) => &mut comment.replies,
            CommentNode::More(_) => return None,
        };
    }
    if slot >= siblings.len() {
        return None;
    }
    siblings.splice(slot..=slot, replacement);
    Some(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use harvest_core::NodeRef;

    fn comment(id: &str, parent: NodeRef, replies: Vec<CommentNode>) -> CommentNode {
        RawCommentNode {
            id: id.to_string(),
            parent: Some(parent),
            link: Some(NodeRef::post("p")),
            created_utc: Some(1.0),
            replies,
            ..Default::default()
        }
        .into()
    }

    fn more(id: &str, parent: NodeRef) -> CommentNode {
        ContinuationPlaceholder {
            id: id.to_string(),
            parent,
            count: 1,
            children: vec![id.to_string()],
        }
        .into()
    }

    #[test]
    fn test_first_placeholder_is_found_in_pre_order() {
        let tree = vec![
            comment(
                "a",
                NodeRef::post("p"),
                vec![comment("b", NodeRef::comment("a"), vec![]), more("m1", NodeRef::comment("a"))],
            ),
            more("m2", NodeRef::post("p")),
        ];

        let (path, placeholder) = first_placeholder(&tree).unwrap();
        assert_eq!(path, vec![0, 1]);
        assert_eq!(placeholder.id, "m1");
    }

    #[test]
    fn test_no_placeholder_found_in_real_tree() {
        let tree = vec![comment("a", NodeRef::post("p"), vec![])];
        assert!(first_placeholder(&tree).is_none());
    }

    #[test]
    fn test_splice_keeps_sibling_order() {
        let mut tree = vec![
            comment("a", NodeRef::post("p"), vec![]),
            more("m", NodeRef::post("p")),
            comment("z", NodeRef::post("p"), vec![]),
        ];
        splice(
            &mut tree,
            &[1],
            vec![
                comment("b", NodeRef::post("p"), vec![]),
                comment("c", NodeRef::post("p"), vec![]),
            ],
        )
        .unwrap();

        let ids: Vec<_> = tree
            .iter()
            .map(|n| match n {
                CommentNode::Comment(c) => c.id.clone(),
                CommentNode::More(m) => m.id.clone(),
            })
            .collect();
        assert_eq!(ids, vec!["a", "b", "c", "z"]);
    }

    #[test]
    fn test_splice_rejects_stale_path() {
        let mut tree = vec![comment("a", NodeRef::post("p"), vec![])];
        assert!(splice(&mut tree, &[3], vec![]).is_none());
        assert!(splice(&mut tree, &[], vec![]).is_none());
    }

    #[test]
    fn test_materialize_round_trip() {
        let tree = vec![comment(
            "a",
            NodeRef::post("p"),
            vec![comment("b", NodeRef::comment("a"), vec![])],
        )];
        let materialized = MaterializedTree::try_from_nodes(tree.clone()).unwrap();
        assert_eq!(materialized.len(), 2);
        assert!(materialized.roots()[0].comment.replies.is_empty());
        assert_eq!(materialized.into_nodes(), tree);
    }

    /// A single reply chain `c0 -> c1 -> ...` ending in a placeholder.
    fn reply_chain(depth: usize) -> RawCommentTree {
        let mut current = more("tail", NodeRef::comment(format!("c{}", depth - 1)));
        for level in (0..depth).rev() {
            let parent = match level {
                0 => NodeRef::post("p"),
                _ => NodeRef::comment(format!("c{}", level - 1)),
            };
            current = comment(&format!("c{}", level), parent, vec![current]);
        }
        vec![current]
    }

    #[test]
    fn test_very_deep_chain_is_walked_without_recursion() {
        const DEPTH: usize = 20_000;
        // A small stack makes any per-level recursion overflow long before DEPTH.
        let worker = std::thread::Builder::new()
            .stack_size(256 * 1024)
            .spawn(|| {
                let mut tree = reply_chain(DEPTH);

                let (path, placeholder) = first_placeholder(&tree).unwrap();
                assert_eq!(path.len(), DEPTH + 1);
                assert!(path.iter().all(|&index| index == 0));
                assert_eq!(placeholder.id, "tail");
                let leftover = MaterializedTree::try_from_nodes(reply_chain(DEPTH)).unwrap_err();
                assert_eq!(leftover.id, "tail");

                let leaf = comment("leaf", NodeRef::comment(format!("c{}", DEPTH - 1)), vec![]);
                splice(&mut tree, &path, vec![leaf]).unwrap();
                assert!(first_placeholder(&tree).is_none());

                let materialized = MaterializedTree::try_from_nodes(tree).unwrap();
                assert_eq!(materialized.len(), DEPTH + 1);

                let nodes = materialized.into_nodes();
                assert_eq!(nodes.len(), 1);
                let flat = crate::flatten::flatten(MaterializedTree::try_from_nodes(nodes).unwrap());
                assert_eq!(flat.len(), DEPTH + 1);
                assert_eq!(flat[0].id, "c0");
                assert_eq!(flat[DEPTH].id, "leaf");
            })
            .unwrap();
        worker.join().unwrap();
    }

    #[test]
    fn test_materialize_reports_leftover_placeholder() {
        let tree = vec![comment("a", NodeRef::post("p"), vec![more("m", NodeRef::comment("a"))])];
        let leftover = MaterializedTree::try_from_nodes(tree).unwrap_err();
        assert_eq!(leftover.id, "m");
    }
}
