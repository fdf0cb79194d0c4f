//! Read-only derived views over a story document.
//!
//! Every function here is a pure projection of the current document
//! (plus, where noted, a search term). Nothing is cached: views are
//! recomputed from the latest document value on every call, so the
//! player, editor, and visualizer surfaces can never desynchronize.

use crate::story::{ChoiceId, NodeId, Story, StoryNode};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// The set of every node id referenced as a choice target anywhere in
/// the document. Built in one pass over nodes and choices.
pub fn referenced_targets(story: &Story) -> BTreeSet<NodeId> {
    story
        .nodes
        .values()
        .flat_map(|node| node.choices.iter().map(|c| c.target_node_id.clone()))
        .collect()
}

/// Nodes unreachable via any choice: not the start node, and not the
/// target of any choice anywhere in the document.
pub fn orphans(story: &Story) -> Vec<&StoryNode> {
    let referenced = referenced_targets(story);
    story
        .nodes
        .values()
        .filter(|node| node.id != story.start_node_id && !referenced.contains(&node.id))
        .collect()
}

/// True if the given node is currently an orphan.
pub fn is_orphan(story: &Story, id: &NodeId) -> bool {
    if id == &story.start_node_id {
        return false;
    }
    story
        .nodes
        .values()
        .all(|node| node.choices.iter().all(|c| &c.target_node_id != id))
}

/// Nodes that have at least one choice targeting `target`, in node
/// table order. `filter`, when present, is matched case-insensitively
/// as a substring of the candidate's title or id.
pub fn inbound_links<'a>(
    story: &'a Story,
    target: &NodeId,
    filter: Option<&str>,
) -> Vec<&'a StoryNode> {
    let needle = filter.map(str::to_lowercase);
    story
        .nodes
        .values()
        .filter(|node| node.choices.iter().any(|c| &c.target_node_id == target))
        .filter(|node| match &needle {
            Some(needle) => {
                node.title.to_lowercase().contains(needle)
                    || node.id.as_str().to_lowercase().contains(needle)
            }
            None => true,
        })
        .collect()
}

/// Case-insensitive substring search over title, id, and content,
/// returning matches in node table order.
pub fn search_nodes<'a>(story: &'a Story, term: &str) -> Vec<&'a StoryNode> {
    let needle = term.to_lowercase();
    if needle.is_empty() {
        return story.nodes.values().collect();
    }
    story
        .nodes
        .values()
        .filter(|node| {
            node.title.to_lowercase().contains(&needle)
                || node.id.as_str().to_lowercase().contains(&needle)
                || node.content.to_lowercase().contains(&needle)
        })
        .collect()
}

/// A choice whose target id no longer resolves. Surfaced for user
/// remediation, never auto-deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BrokenLink {
    pub node_id: NodeId,
    pub choice_id: ChoiceId,
    pub target_node_id: NodeId,
}

/// Every choice in the document whose target does not exist.
pub fn broken_links(story: &Story) -> Vec<BrokenLink> {
    story
        .nodes
        .values()
        .flat_map(|node| {
            node.choices
                .iter()
                .filter(|c| !story.nodes.contains_key(&c.target_node_id))
                .map(|c| BrokenLink {
                    node_id: node.id.clone(),
                    choice_id: c.id.clone(),
                    target_node_id: c.target_node_id.clone(),
                })
        })
        .collect()
}

/// One choice, annotated with its position among the parallel edges
/// that share its endpoint pair, so a renderer can fan or curve them
/// apart instead of overlapping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupedEdge {
    pub source: NodeId,
    pub target: NodeId,
    pub choice_id: ChoiceId,
    pub text: String,

    /// Index of this edge within its endpoint-pair group.
    pub group_index: usize,

    /// Total number of edges in the group.
    pub group_size: usize,

    /// Self-loops need distinct loop-drawing treatment.
    pub is_self_loop: bool,
}

/// Group the document's edges by unordered endpoint pair.
///
/// Choices between the same two nodes (in either direction) share a
/// group; each edge records its index and the group's size. Self-loops
/// are singleton groups. Derived state, recomputed on every call.
pub fn edge_groups(story: &Story) -> Vec<GroupedEdge> {
    // First pass: count edges per unordered endpoint pair.
    let mut sizes: BTreeMap<(NodeId, NodeId), usize> = BTreeMap::new();
    for node in story.nodes.values() {
        for choice in &node.choices {
            if choice.target_node_id == node.id {
                continue;
            }
            *sizes.entry(pair_key(&node.id, &choice.target_node_id)).or_insert(0) += 1;
        }
    }

    // Second pass: assign indexes in encounter order.
    let mut counters: BTreeMap<(NodeId, NodeId), usize> = BTreeMap::new();
    let mut edges = Vec::new();
    for node in story.nodes.values() {
        for choice in &node.choices {
            let is_self_loop = choice.target_node_id == node.id;
            let (group_index, group_size) = if is_self_loop {
                (0, 1)
            } else {
                let key = pair_key(&node.id, &choice.target_node_id);
                let index = counters.entry(key.clone()).or_insert(0);
                let assigned = *index;
                *index += 1;
                (assigned, sizes[&key])
            };

            edges.push(GroupedEdge {
                source: node.id.clone(),
                target: choice.target_node_id.clone(),
                choice_id: choice.id.clone(),
                text: choice.text.clone(),
                group_index,
                group_size,
                is_self_loop,
            });
        }
    }
    edges
}

fn pair_key(a: &NodeId, b: &NodeId) -> (NodeId, NodeId) {
    if a <= b {
        (a.clone(), b.clone())
    } else {
        (b.clone(), a.clone())
    }
}
