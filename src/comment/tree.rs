//! Assembly of a post's flat comment list into its nested reply tree.
//!
//! Reads are lenient: a comment whose parent cannot be found is shown at the
//! top level instead of being dropped, and a comment without reactions gets
//! an empty set. Cycles in `parent_id` chains are broken by promoting one
//! member of the cycle to the top level, so every input comment still
//! appears exactly once in the output.

use std::collections::{HashMap, HashSet};

use mongodb::bson::oid::ObjectId;

use crate::comment::model::{Comment, CommentNode, DisplayRow};
use crate::reaction::model::Reaction;
use crate::reaction::optimistic::reactions_changed;

/// Indentation cap applied when laying a thread out for display
pub const DEFAULT_MAX_DEPTH: usize = 10;

/// Build the reply tree for one post.
///
/// Replies keep the order they had in `comments`, as does the top level.
/// Callers fetch in ascending creation time, so threads read chronologically.
pub fn build_comment_tree(
    comments: Vec<Comment>,
    reactions: &HashMap<ObjectId, Vec<Reaction>>,
) -> Vec<CommentNode> {
    let n = comments.len();

    let mut index: HashMap<ObjectId, usize> = HashMap::with_capacity(n);
    for (i, comment) in comments.iter().enumerate() {
        index.entry(comment.id).or_insert(i);
    }

    let mut parent_of: Vec<Option<usize>> = vec![None; n];
    let mut children: Vec<Vec<usize>> = vec![Vec::new(); n];
    let mut roots = Vec::new();
    for (i, comment) in comments.iter().enumerate() {
        match comment.parent_id.and_then(|p| index.get(&p).copied()) {
            Some(p) if p != i => {
                parent_of[i] = Some(p);
                children[p].push(i);
            }
            _ => roots.push(i),
        }
    }

    let mut visited = vec![false; n];
    let mut attached: Vec<Vec<usize>> = vec![Vec::new(); n];
    let mut preorder = Vec::with_capacity(n);
    let mut top = Vec::with_capacity(roots.len());

    for root in roots {
        walk(root, &children, &mut visited, &mut attached, &mut preorder);
        top.push(root);
    }

    // Whatever is still unvisited hangs off a parent cycle
    for i in 0..n {
        if visited[i] {
            continue;
        }
        let breaker = cycle_member(i, &parent_of);
        log::warn!(
            "Comment {} is part of a reply cycle; showing it at the top level",
            comments[breaker].id
        );
        walk(breaker, &children, &mut visited, &mut attached, &mut preorder);
        top.push(breaker);
    }

    let mut pending: Vec<Option<Comment>> = comments.into_iter().map(Some).collect();
    let mut built: Vec<Option<CommentNode>> = (0..n).map(|_| None).collect();

    // Reverse pre-order sees every child before its parent
    for &i in preorder.iter().rev() {
        let replies = attached[i]
            .iter()
            .filter_map(|&child| built[child].take())
            .collect();
        if let Some(comment) = pending[i].take() {
            let reactions = reactions.get(&comment.id).cloned().unwrap_or_default();
            built[i] = Some(CommentNode {
                comment,
                reactions,
                replies,
            });
        }
    }

    top.into_iter().filter_map(|i| built[i].take()).collect()
}

fn walk(
    start: usize,
    children: &[Vec<usize>],
    visited: &mut [bool],
    attached: &mut [Vec<usize>],
    preorder: &mut Vec<usize>,
) {
    visited[start] = true;
    let mut stack = vec![start];
    while let Some(node) = stack.pop() {
        preorder.push(node);
        for &child in &children[node] {
            if !visited[child] {
                visited[child] = true;
                attached[node].push(child);
                stack.push(child);
            }
        }
    }
}

/// Follow parent links from `start` until a node repeats
fn cycle_member(start: usize, parent_of: &[Option<usize>]) -> usize {
    let mut seen = HashSet::new();
    let mut current = start;
    while seen.insert(current) {
        match parent_of[current] {
            Some(parent) => current = parent,
            None => break,
        }
    }
    current
}

/// Total number of comments in a forest
pub fn count_nodes(nodes: &[CommentNode]) -> usize {
    let mut count = 0;
    let mut stack: Vec<&CommentNode> = nodes.iter().collect();
    while let Some(node) = stack.pop() {
        count += 1;
        stack.extend(node.replies.iter());
    }
    count
}

pub fn find_node<'a>(nodes: &'a [CommentNode], id: &ObjectId) -> Option<&'a CommentNode> {
    let mut stack: Vec<&CommentNode> = nodes.iter().collect();
    while let Some(node) = stack.pop() {
        if node.comment.id == *id {
            return Some(node);
        }
        stack.extend(node.replies.iter());
    }
    None
}

pub fn find_node_mut<'a>(
    nodes: &'a mut [CommentNode],
    id: &ObjectId,
) -> Option<&'a mut CommentNode> {
    let mut stack: Vec<&mut CommentNode> = nodes.iter_mut().collect();
    while let Some(node) = stack.pop() {
        if node.comment.id == *id {
            return Some(node);
        }
        stack.extend(node.replies.iter_mut());
    }
    None
}

/// Replace a comment's reactions after a local toggle.
///
/// Returns whether the in-memory list had to change, using the same
/// shallow comparison the clients use to decide on notifying.
pub fn apply_reaction_change(
    nodes: &mut [CommentNode],
    comment_id: &ObjectId,
    reactions: Vec<Reaction>,
) -> bool {
    match find_node_mut(nodes, comment_id) {
        Some(node) if reactions_changed(&node.reactions, &reactions) => {
            node.reactions = reactions;
            true
        }
        _ => false,
    }
}

/// Pre-order rows with indentation capped at `max_depth`.
/// Only the indentation is capped; deeper replies are still listed.
pub fn flatten_for_display(nodes: &[CommentNode], max_depth: usize) -> Vec<DisplayRow> {
    let mut rows = Vec::new();
    let mut stack: Vec<(&CommentNode, usize)> = nodes.iter().rev().map(|n| (n, 0)).collect();
    while let Some((node, depth)) = stack.pop() {
        rows.push(DisplayRow {
            id: node.comment.id,
            parent_id: node.comment.parent_id,
            depth,
            indent: depth.min(max_depth),
            author_name: node.comment.author_name.clone(),
            content: node.comment.content.clone(),
            reaction_count: node.reactions.len(),
            reply_count: node.replies.len(),
        });
        stack.extend(node.replies.iter().rev().map(|child| (child, depth + 1)));
    }
    rows
}
