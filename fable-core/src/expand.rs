//! Asynchronous expansion protocol.
//!
//! Grows the graph from a dead-end node via an external generator.
//! Each request moves Idle -> Requesting -> Merged or Failed, then back
//! to Idle for that node. The engine itself is stateless per call and
//! does not deduplicate concurrent requests; callers keep at most one
//! request in flight per node, with [`PendingExpansions`] as the guard.
//!
//! The one real hazard lives here: the document stays mutable while a
//! request is in flight. The merge step therefore applies to whatever
//! the *current* document is at completion time and re-checks that the
//! expanded node still exists. A node deleted mid-flight means the
//! result is discarded as a clean failure, never resurrected.

use crate::gen::{GenerateError, StoryGenerator};
use crate::mutate::{self, MutateError};
use crate::story::{NodeId, Story};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use thiserror::Error;
use tracing::{debug, warn};

/// Maximum number of previously visited scenes included as generator
/// context. The window keeps request size bounded on long playthroughs.
pub const MAX_HISTORY_ENTRIES: usize = 12;

/// Errors from the expansion protocol.
#[derive(Debug, Error)]
pub enum ExpandError {
    #[error("an expansion for node {0} is already in flight")]
    AlreadyPending(NodeId),

    #[error("node {0} no longer exists; expansion result discarded")]
    NodeVanished(NodeId),

    #[error("malformed expansion result: {0}")]
    Malformed(String),

    #[error(transparent)]
    Generator(#[from] GenerateError),
}

// ============================================================================
// Request context
// ============================================================================

/// One previously visited scene, reduced to what the generator needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub id: NodeId,
    pub title: String,
    pub content: String,
}

/// id + title of an existing node, so the generator can choose to
/// converge on it instead of minting a new scene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeSummary {
    pub id: NodeId,
    pub title: String,
}

/// Everything the generator is given to continue the story from a
/// dead end: who is playing, where they have been, where they are,
/// and which scenes already exist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpansionRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub player_name: Option<String>,

    /// Visited scenes, oldest first, bounded by [`MAX_HISTORY_ENTRIES`].
    pub history: Vec<HistoryEntry>,

    /// The dead-end scene being expanded.
    pub current: HistoryEntry,

    /// All nodes in the document, for convergence.
    pub existing_nodes: Vec<NodeSummary>,

    /// Opaque style hint from the document.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_style: Option<String>,
}

impl ExpansionRequest {
    /// Build a request from the current document and traversal trail.
    ///
    /// `trail` is the ordered list of visited node ids, current node
    /// last. Trail entries that no longer resolve are skipped rather
    /// than failing the whole request.
    pub fn from_story(
        story: &Story,
        trail: &[NodeId],
        node_id: &NodeId,
        player_name: Option<&str>,
    ) -> Result<Self, ExpandError> {
        let node = story
            .node(node_id)
            .ok_or_else(|| ExpandError::NodeVanished(node_id.clone()))?;

        // The trail's final entry is the node being expanded; everything
        // before it is history, even earlier visits to the same node.
        let past = match trail.split_last() {
            Some((last, rest)) if last == node_id => rest,
            _ => trail,
        };

        let history: Vec<HistoryEntry> = past
            .iter()
            .rev()
            .take(MAX_HISTORY_ENTRIES)
            .filter_map(|id| story.node(id))
            .map(|n| HistoryEntry {
                id: n.id.clone(),
                title: n.title.clone(),
                content: n.content.clone(),
            })
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect();

        let existing_nodes = story
            .nodes
            .values()
            .map(|n| NodeSummary {
                id: n.id.clone(),
                title: n.title.clone(),
            })
            .collect();

        Ok(Self {
            player_name: player_name.map(str::to_string),
            history,
            current: HistoryEntry {
                id: node.id.clone(),
                title: node.title.clone(),
                content: node.content.clone(),
            },
            existing_nodes,
            image_style: story.image_style.clone(),
        })
    }
}

// ============================================================================
// Generator result
// ============================================================================

/// One choice proposed by the generator. Convergent when
/// `existing_target_id` names a real node; divergent when
/// `new_node_content` carries the text of a scene to mint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChoiceSpec {
    pub text: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_node_content: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub existing_target_id: Option<NodeId>,
}

impl ChoiceSpec {
    /// A choice that links to an already existing node.
    pub fn convergent(text: impl Into<String>, target: NodeId) -> Self {
        Self {
            text: text.into(),
            new_node_content: None,
            existing_target_id: Some(target),
        }
    }

    /// A choice that mints a new scene.
    pub fn divergent(text: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            new_node_content: Some(content.into()),
            existing_target_id: None,
        }
    }
}

/// What the generator returns for a single expansion.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpansionResult {
    /// Replacement text for the expanded scene, when supplied.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_content: Option<String>,

    /// Proposed choices; these *replace* the node's choice list.
    #[serde(default)]
    pub choices: Vec<ChoiceSpec>,
}

impl ExpansionResult {
    pub fn new(choices: Vec<ChoiceSpec>) -> Self {
        Self {
            updated_content: None,
            choices,
        }
    }

    pub fn with_updated_content(mut self, content: impl Into<String>) -> Self {
        self.updated_content = Some(content.into());
        self
    }
}

// ============================================================================
// In-flight tracking
// ============================================================================

/// Caller-side guard keeping at most one expansion in flight per node.
#[derive(Debug, Default)]
pub struct PendingExpansions {
    in_flight: BTreeSet<NodeId>,
}

impl PendingExpansions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a node as having a request in flight.
    pub fn begin(&mut self, id: &NodeId) -> Result<(), ExpandError> {
        if !self.in_flight.insert(id.clone()) {
            return Err(ExpandError::AlreadyPending(id.clone()));
        }
        Ok(())
    }

    /// Clear a node's in-flight mark. Idempotent.
    pub fn finish(&mut self, id: &NodeId) {
        self.in_flight.remove(id);
    }

    pub fn is_pending(&self, id: &NodeId) -> bool {
        self.in_flight.contains(id)
    }
}

// ============================================================================
// Protocol steps
// ============================================================================

/// Idle -> Requesting: build the context and call the generator.
///
/// Returns the raw result; merging is a separate step so the caller
/// can apply it to whatever document is current once the call lands.
pub async fn run_expansion<G>(
    generator: &G,
    story: &Story,
    trail: &[NodeId],
    node_id: &NodeId,
    player_name: Option<&str>,
) -> Result<ExpansionResult, ExpandError>
where
    G: StoryGenerator + ?Sized,
{
    let request = ExpansionRequest::from_story(story, trail, node_id, player_name)?;
    debug!(
        node = %node_id,
        history = request.history.len(),
        known_nodes = request.existing_nodes.len(),
        "requesting expansion"
    );
    Ok(generator.expand(&request).await?)
}

/// Requesting -> Merged | Failed: merge a generator result into the
/// *current* document.
///
/// Re-validates that the expanded node still exists; if local edits
/// deleted it while the request was in flight the result is discarded
/// and reported, leaving the document untouched. Content edited in the
/// interim is overwritten by the result: last write wins on the node
/// as a whole.
pub fn apply_expansion(
    story: &Story,
    node_id: &NodeId,
    result: &ExpansionResult,
) -> Result<Story, ExpandError> {
    if !story.contains(node_id) {
        warn!(node = %node_id, "expanded node vanished while request was in flight");
        return Err(ExpandError::NodeVanished(node_id.clone()));
    }

    mutate::merge_expansion(story, node_id, result).map_err(|e| match e {
        MutateError::NodeNotFound(id) => ExpandError::NodeVanished(id),
        MutateError::MalformedExpansion(reason) => ExpandError::Malformed(reason),
        other => ExpandError::Malformed(other.to_string()),
    })
}
