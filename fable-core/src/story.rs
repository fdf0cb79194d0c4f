//! Story document model.
//!
//! Contains the authoritative in-memory representation of a story:
//! nodes, choices, identifiers, and the structural validation that
//! every other layer builds on. No behavior beyond validation lives
//! here; mutations are in [`crate::mutate`], derived views in
//! [`crate::query`].

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

/// Placeholder token in node content, substituted with the player's
/// name at render time. Never rewritten in the stored document.
pub const PLAYER_NAME_TOKEN: &str = "{playerName}";

// ============================================================================
// ID Types
// ============================================================================

/// Unique identifier for story nodes.
///
/// Opaque and stable: assigned once at creation and never reused within
/// a document's lifetime. Imported documents keep whatever ids they
/// carry; freshly minted nodes get a random id.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    /// Mint a fresh, collision-resistant id.
    pub fn fresh() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&str> for NodeId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for NodeId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier for a choice, unique within its owning node's choice list.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChoiceId(String);

impl ChoiceId {
    /// Mint a fresh choice id.
    pub fn fresh() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ChoiceId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ChoiceId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for ChoiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Choices and Nodes
// ============================================================================

/// A labeled directed edge from one node to another.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Choice {
    pub id: ChoiceId,

    /// The label a player sees.
    pub text: String,

    /// Destination node id. May dangle transiently while editing;
    /// playback re-validates before traversal.
    pub target_node_id: NodeId,
}

impl Choice {
    /// Create a choice with a fresh id.
    pub fn new(text: impl Into<String>, target: NodeId) -> Self {
        Self {
            id: ChoiceId::fresh(),
            text: text.into(),
            target_node_id: target,
        }
    }
}

/// A single scene: narrative text, optional media, outgoing choices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoryNode {
    #[serde(default)]
    pub id: NodeId,

    /// Display label; may be empty (presented as "Untitled", never stored as such).
    #[serde(default)]
    pub title: String,

    /// Narrative text. May contain [`PLAYER_NAME_TOKEN`].
    #[serde(default)]
    pub content: String,

    /// Outgoing choices, in presentation order.
    #[serde(default)]
    pub choices: Vec<Choice>,

    /// Provenance flag, set at creation, never cleared.
    #[serde(default)]
    pub is_ai_generated: bool,

    /// Opaque media reference: a remote/local URL or an embedded data blob.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

impl StoryNode {
    /// Create a node with a fresh id and no choices.
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: NodeId::fresh(),
            title: title.into(),
            content: content.into(),
            choices: Vec::new(),
            is_ai_generated: false,
            image_url: None,
        }
    }

    /// Mark the node as generator-produced.
    pub fn ai_generated(mut self) -> Self {
        self.is_ai_generated = true;
        self
    }

    pub fn with_choice(mut self, choice: Choice) -> Self {
        self.choices.push(choice);
        self
    }

    pub fn with_image_url(mut self, url: impl Into<String>) -> Self {
        self.image_url = Some(url.into());
        self
    }

    /// Title for presentation, falling back for unnamed scenes.
    pub fn display_title(&self) -> &str {
        if self.title.is_empty() {
            "Untitled"
        } else {
            &self.title
        }
    }

    /// Content with the player-name placeholder substituted.
    /// Presentation only; the stored content keeps the token.
    pub fn render_content(&self, player_name: &str) -> String {
        self.content.replace(PLAYER_NAME_TOKEN, player_name)
    }

    /// Find a choice by id.
    pub fn choice(&self, id: &ChoiceId) -> Option<&Choice> {
        self.choices.iter().find(|c| &c.id == id)
    }

    /// True if the node has no outgoing choices (a dead end / true ending).
    pub fn is_leaf(&self) -> bool {
        self.choices.is_empty()
    }
}

// ============================================================================
// Story
// ============================================================================

/// The document root: a named graph of scenes with a fixed entry point.
///
/// Mutations never modify a `Story` in place; the operations in
/// [`crate::mutate`] take the current document and return a new one, so
/// observers holding the old value can detect change by comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Story {
    /// Document identifier. Tolerated missing on import.
    #[serde(default)]
    pub id: String,

    /// Display title of the story.
    pub name: String,

    /// Entry point of playback. Must always resolve to a node;
    /// the node holding this role can never be deleted.
    pub start_node_id: NodeId,

    /// Style hint forwarded opaquely to the generation collaborator.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_style: Option<String>,

    /// Node table, keyed by node id. Iteration order is deterministic
    /// but carries no narrative meaning; player-facing sequencing is
    /// always choice-driven.
    #[serde(default)]
    pub nodes: BTreeMap<NodeId, StoryNode>,
}

impl Story {
    /// Create an empty story containing a single start node.
    pub fn new(name: impl Into<String>) -> Self {
        let start = StoryNode::new("The Beginning", "");
        let start_id = start.id.clone();
        let mut nodes = BTreeMap::new();
        nodes.insert(start_id.clone(), start);
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            start_node_id: start_id,
            image_style: None,
            nodes,
        }
    }

    /// Built-in starter story: small, playable, and shaped like the
    /// graphs this engine is built for — it converges and it cycles.
    pub fn starter() -> Self {
        let start_id = NodeId::from("start");
        let gate_id = NodeId::from("gate");
        let river_id = NodeId::from("river");
        let hall_id = NodeId::from("hall");

        let start = StoryNode {
            id: start_id.clone(),
            title: "The Crossroads".to_string(),
            content: format!(
                "Night falls as {PLAYER_NAME_TOKEN} reaches a crossroads. \
                 A ruined gate looms to the north; the sound of water drifts from the east."
            ),
            choices: vec![
                Choice {
                    id: ChoiceId::from("c-gate"),
                    text: "Approach the gate".to_string(),
                    target_node_id: gate_id.clone(),
                },
                Choice {
                    id: ChoiceId::from("c-river"),
                    text: "Follow the river".to_string(),
                    target_node_id: river_id.clone(),
                },
            ],
            is_ai_generated: false,
            image_url: None,
        };

        let gate = StoryNode {
            id: gate_id.clone(),
            title: "The Ruined Gate".to_string(),
            content: "The gate hangs open. Beyond it, torchlight flickers in a great hall."
                .to_string(),
            choices: vec![
                Choice {
                    id: ChoiceId::from("c-hall"),
                    text: "Enter the hall".to_string(),
                    target_node_id: hall_id.clone(),
                },
                Choice {
                    id: ChoiceId::from("c-back"),
                    text: "Turn back to the crossroads".to_string(),
                    target_node_id: start_id.clone(),
                },
            ],
            is_ai_generated: false,
            image_url: None,
        };

        let river = StoryNode {
            id: river_id.clone(),
            title: "The River Path".to_string(),
            content: "The path follows the water until it bends toward torchlight: \
                      the same great hall, approached from the east."
                .to_string(),
            choices: vec![Choice {
                id: ChoiceId::from("c-east"),
                text: "Slip in through the east door".to_string(),
                target_node_id: hall_id.clone(),
            }],
            is_ai_generated: false,
            image_url: None,
        };

        let hall = StoryNode {
            id: hall_id.clone(),
            title: "The Great Hall".to_string(),
            content: "Both roads end here, under a vaulted ceiling lost in shadow.".to_string(),
            choices: Vec::new(),
            is_ai_generated: false,
            image_url: None,
        };

        let mut nodes = BTreeMap::new();
        for node in [start, gate, river, hall] {
            nodes.insert(node.id.clone(), node);
        }

        Self {
            // Fixed id: the starter seed is deterministic by design.
            id: "starter".to_string(),
            name: "The Crossroads".to_string(),
            start_node_id: start_id,
            image_style: None,
            nodes,
        }
    }

    /// Look up a node by id.
    pub fn node(&self, id: &NodeId) -> Option<&StoryNode> {
        self.nodes.get(id)
    }

    /// The entry-point node, if the document is well-formed.
    pub fn start_node(&self) -> Option<&StoryNode> {
        self.nodes.get(&self.start_node_id)
    }

    pub fn contains(&self, id: &NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Check structural invariants, returning every violation found.
    ///
    /// Never panics and never repairs: callers decide whether a
    /// violation is fatal (unknown start node) or a surfaced editing
    /// condition (dangling choice target).
    pub fn validate(&self) -> Vec<Violation> {
        let mut violations = Vec::new();

        if !self.nodes.contains_key(&self.start_node_id) {
            violations.push(Violation::UnknownStartNode {
                start_node_id: self.start_node_id.clone(),
            });
        }

        for (key, node) in &self.nodes {
            if key != &node.id {
                violations.push(Violation::MismatchedNodeKey {
                    key: key.clone(),
                    node_id: node.id.clone(),
                });
            }

            let mut seen = BTreeSet::new();
            for choice in &node.choices {
                if !seen.insert(choice.id.clone()) {
                    violations.push(Violation::DuplicateChoiceId {
                        node_id: node.id.clone(),
                        choice_id: choice.id.clone(),
                    });
                }
                if !self.nodes.contains_key(&choice.target_node_id) {
                    violations.push(Violation::DanglingChoiceTarget {
                        node_id: node.id.clone(),
                        choice_id: choice.id.clone(),
                        target_node_id: choice.target_node_id.clone(),
                    });
                }
            }
        }

        violations
    }

    /// True when no violations are present at all, dangling targets included.
    pub fn is_valid(&self) -> bool {
        self.validate().is_empty()
    }
}

/// A structural invariant violation found by [`Story::validate`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Violation {
    #[error("start node id {start_node_id} does not exist in the node table")]
    UnknownStartNode { start_node_id: NodeId },

    #[error("choice {choice_id} on node {node_id} targets missing node {target_node_id}")]
    DanglingChoiceTarget {
        node_id: NodeId,
        choice_id: ChoiceId,
        target_node_id: NodeId,
    },

    #[error("node table key {key} does not match the node's own id {node_id}")]
    MismatchedNodeKey { key: NodeId, node_id: NodeId },

    #[error("node {node_id} has more than one choice with id {choice_id}")]
    DuplicateChoiceId { node_id: NodeId, choice_id: ChoiceId },
}
