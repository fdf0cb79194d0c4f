//! Playback session cursor.
//!
//! A traversal state machine over a story document: the current node
//! plus a linear history stack rooted at the origin. The cursor never
//! mutates the document; it only reads it to validate traversal.

use crate::story::{NodeId, Story, StoryNode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from cursor traversal.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("current node {0} no longer exists in the story")]
    CurrentNodeMissing(NodeId),

    #[error("choice index {index} out of range ({len} choices)")]
    ChoiceOutOfRange { index: usize, len: usize },

    #[error("choice targets missing node {0}; repair the link before playing")]
    BrokenLink(NodeId),
}

/// Traversal cursor: where the player is and how they got there.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayCursor {
    current: NodeId,
    history: Vec<NodeId>,
}

impl PlayCursor {
    /// Start a session at the story's origin.
    pub fn start(story: &Story) -> Self {
        Self {
            current: story.start_node_id.clone(),
            history: vec![story.start_node_id.clone()],
        }
    }

    /// The current node id.
    pub fn current(&self) -> &NodeId {
        &self.current
    }

    /// The full trail of visited node ids, origin first, current last.
    pub fn trail(&self) -> &[NodeId] {
        &self.history
    }

    /// Number of visited scenes, the origin included.
    pub fn depth(&self) -> usize {
        self.history.len()
    }

    /// The current node, if it still exists in the document.
    pub fn current_node<'a>(&self, story: &'a Story) -> Option<&'a StoryNode> {
        story.node(&self.current)
    }

    /// Move to `target`, pushing it onto the history.
    ///
    /// Validates that the target exists: a transiently dangling choice
    /// is an editing affordance, not something a player may traverse.
    pub fn advance(&mut self, story: &Story, target: &NodeId) -> Result<(), SessionError> {
        if !story.contains(target) {
            return Err(SessionError::BrokenLink(target.clone()));
        }
        self.history.push(target.clone());
        self.current = target.clone();
        Ok(())
    }

    /// Follow the current node's choice at `index`.
    pub fn choose(&mut self, story: &Story, index: usize) -> Result<(), SessionError> {
        let node = self
            .current_node(story)
            .ok_or_else(|| SessionError::CurrentNodeMissing(self.current.clone()))?;
        let choice = node
            .choices
            .get(index)
            .ok_or(SessionError::ChoiceOutOfRange {
                index,
                len: node.choices.len(),
            })?;
        let target = choice.target_node_id.clone();
        self.advance(story, &target)
    }

    /// Step back one scene. No-op at the origin: the session cannot
    /// step back past where playback began.
    pub fn step_back(&mut self) -> bool {
        if self.history.len() <= 1 {
            return false;
        }
        self.history.pop();
        if let Some(last) = self.history.last() {
            self.current = last.clone();
        }
        true
    }

    /// Reset to the origin: both the pointer and the history collapse
    /// to a single-element trail.
    pub fn restart(&mut self, story: &Story) {
        self.current = story.start_node_id.clone();
        self.history = vec![story.start_node_id.clone()];
    }

    /// True when the current node exists and has no choices - the
    /// session has reached a dead end or a true ending. Callers may
    /// grow the graph from here via the expansion protocol.
    pub fn at_leaf(&self, story: &Story) -> bool {
        self.current_node(story).is_some_and(StoryNode::is_leaf)
    }
}
