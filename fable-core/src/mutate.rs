//! Mutation engine.
//!
//! Every operation takes the current document plus its arguments and
//! returns either a new document or a typed rejection. The caller's
//! document is never touched: committing a mutation means replacing the
//! shared document value wholesale with the returned one, so observers
//! comparing old and new can detect change and nothing downstream of a
//! rejection ever sees inconsistent state.

use crate::expand::ExpansionResult;
use crate::persist::{self, PersistError};
use crate::story::{Choice, ChoiceId, NodeId, Story, StoryNode};
use thiserror::Error;
use tracing::{debug, info};

/// Errors from mutation operations. Raised before any mutation is
/// built; a rejected operation leaves the current document unchanged.
#[derive(Debug, Error)]
pub enum MutateError {
    #[error("node not found: {0}")]
    NodeNotFound(NodeId),

    #[error("cannot delete the start node {0}; the origin is permanent")]
    StartNodeDeletion(NodeId),

    #[error("choice {choice_id} not found on node {node_id}")]
    ChoiceNotFound {
        node_id: NodeId,
        choice_id: ChoiceId,
    },

    #[error("choice index {index} out of range for node {node_id} ({len} choices)")]
    ChoiceIndexOutOfRange {
        node_id: NodeId,
        index: usize,
        len: usize,
    },

    #[error("import rejected: {0}")]
    Import(#[from] PersistError),

    #[error("malformed expansion result: {0}")]
    MalformedExpansion(String),
}

// ============================================================================
// Node operations
// ============================================================================

/// Append a new node with a freshly minted id and no choices.
/// Always succeeds; returns the new document and the new node's id.
pub fn create_node(
    story: &Story,
    title: impl Into<String>,
    content: impl Into<String>,
) -> (Story, NodeId) {
    let node = StoryNode::new(title, content);
    let id = node.id.clone();

    let mut next = story.clone();
    next.nodes.insert(id.clone(), node);
    debug!(node = %id, "created node");
    (next, id)
}

/// Field replacements for [`edit_node`]. `None` keeps the stored value;
/// for media, `Some(None)` clears the reference.
#[derive(Debug, Clone, Default)]
pub struct NodeEdit {
    pub title: Option<String>,
    pub content: Option<String>,
    pub image_url: Option<Option<String>>,
}

impl NodeEdit {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    pub fn with_image_url(mut self, url: impl Into<String>) -> Self {
        self.image_url = Some(Some(url.into()));
        self
    }

    pub fn clearing_image(mut self) -> Self {
        self.image_url = Some(None);
        self
    }
}

/// Replace a node's presentation fields. Id, provenance, and the choice
/// list are untouched; choices have their own operations.
pub fn edit_node(story: &Story, id: &NodeId, edit: NodeEdit) -> Result<Story, MutateError> {
    let mut next = story.clone();
    let node = next
        .nodes
        .get_mut(id)
        .ok_or_else(|| MutateError::NodeNotFound(id.clone()))?;
    if let Some(title) = edit.title {
        node.title = title;
    }
    if let Some(content) = edit.content {
        node.content = content;
    }
    if let Some(image_url) = edit.image_url {
        node.image_url = image_url;
    }
    debug!(node = %id, "edited node");
    Ok(next)
}

/// Remove a node and cascade: every choice anywhere in the document
/// targeting it is pruned too, so deletion can never leave an edge a
/// player could follow into a removed scene.
///
/// The start node is permanent; deleting it is rejected outright.
pub fn delete_node(story: &Story, id: &NodeId) -> Result<Story, MutateError> {
    if id == &story.start_node_id {
        return Err(MutateError::StartNodeDeletion(id.clone()));
    }
    if !story.contains(id) {
        return Err(MutateError::NodeNotFound(id.clone()));
    }

    let mut next = story.clone();
    next.nodes.remove(id);

    let mut pruned = 0usize;
    for node in next.nodes.values_mut() {
        let before = node.choices.len();
        node.choices.retain(|c| &c.target_node_id != id);
        pruned += before - node.choices.len();
    }

    info!(node = %id, pruned_choices = pruned, "deleted node");
    Ok(next)
}

// ============================================================================
// Choice operations
// ============================================================================

/// Append a choice to a node. When no target is given the choice points
/// at the start node, which always exists.
pub fn add_choice(
    story: &Story,
    owner: &NodeId,
    text: impl Into<String>,
    target: Option<NodeId>,
) -> Result<(Story, ChoiceId), MutateError> {
    let target = target.unwrap_or_else(|| story.start_node_id.clone());
    let choice = Choice::new(text, target);
    let choice_id = choice.id.clone();

    let mut next = story.clone();
    next.nodes
        .get_mut(owner)
        .ok_or_else(|| MutateError::NodeNotFound(owner.clone()))?
        .choices
        .push(choice);
    debug!(node = %owner, choice = %choice_id, "added choice");
    Ok((next, choice_id))
}

/// Remove the choice at `index` from a node's list.
pub fn remove_choice(story: &Story, owner: &NodeId, index: usize) -> Result<Story, MutateError> {
    let mut next = story.clone();
    let node = next
        .nodes
        .get_mut(owner)
        .ok_or_else(|| MutateError::NodeNotFound(owner.clone()))?;
    if index >= node.choices.len() {
        return Err(MutateError::ChoiceIndexOutOfRange {
            node_id: owner.clone(),
            index,
            len: node.choices.len(),
        });
    }
    node.choices.remove(index);
    debug!(node = %owner, index, "removed choice");
    Ok(next)
}

/// Point an existing choice at a new target.
///
/// The target is deliberately not required to exist yet: mid-edit it is
/// useful to reference a scene about to be created. Dangling targets
/// stay visible through [`crate::query::broken_links`] and
/// [`Story::validate`], and playback refuses to traverse them.
pub fn retarget_choice(
    story: &Story,
    owner: &NodeId,
    choice_id: &ChoiceId,
    new_target: NodeId,
) -> Result<Story, MutateError> {
    let mut next = story.clone();
    let node = next
        .nodes
        .get_mut(owner)
        .ok_or_else(|| MutateError::NodeNotFound(owner.clone()))?;
    let choice = node
        .choices
        .iter_mut()
        .find(|c| &c.id == choice_id)
        .ok_or_else(|| MutateError::ChoiceNotFound {
            node_id: owner.clone(),
            choice_id: choice_id.clone(),
        })?;
    choice.target_node_id = new_target;
    debug!(node = %owner, choice = %choice_id, "retargeted choice");
    Ok(next)
}

// ============================================================================
// Document operations
// ============================================================================

/// Parse and validate a raw candidate document. On success the caller
/// replaces its document wholesale; on failure nothing happened - the
/// rejection carries the format error and the current document is
/// untouched by construction.
pub fn import_story(raw: &str) -> Result<Story, MutateError> {
    let story = persist::from_json(raw)?;
    info!(story = %story.id, nodes = story.node_count(), "imported story document");
    Ok(story)
}

/// Merge a generator result into the document at `node_id`.
///
/// Convergent choice descriptors (naming an existing node) become
/// choices to that node; divergent descriptors mint a new
/// generator-provenance node, titled from the choice text. The target
/// node's choice list is then *replaced* with exactly the built list:
/// an expansion fills in what happens next from a dead end, it does not
/// append options to an already decided scene. Re-expanding a node
/// discards the previous expansion's choices; nodes they pointed at
/// remain and may become orphans, which the query layer surfaces.
///
/// Malformed results (a choice missing its text, carrying neither a
/// new-scene body nor a resolvable existing target) are rejected before
/// any mutation is built.
pub fn merge_expansion(
    story: &Story,
    node_id: &NodeId,
    result: &ExpansionResult,
) -> Result<Story, MutateError> {
    if !story.contains(node_id) {
        return Err(MutateError::NodeNotFound(node_id.clone()));
    }

    // Validate everything up front; rejection must leave no partial work.
    for (index, spec) in result.choices.iter().enumerate() {
        if spec.text.trim().is_empty() {
            return Err(MutateError::MalformedExpansion(format!(
                "choice {index} has no text"
            )));
        }
        let converges = spec
            .existing_target_id
            .as_ref()
            .is_some_and(|id| story.contains(id));
        if !converges && spec.new_node_content.is_none() {
            return Err(MutateError::MalformedExpansion(format!(
                "choice {index} (\"{}\") names no new scene and no existing node",
                spec.text
            )));
        }
    }

    let mut next = story.clone();
    let mut choices = Vec::with_capacity(result.choices.len());
    let mut minted = 0usize;

    for spec in &result.choices {
        let target = match (&spec.existing_target_id, &spec.new_node_content) {
            (Some(existing), _) if next.contains(existing) => existing.clone(),
            (_, Some(content)) => {
                let node = StoryNode::new(spec.text.clone(), content.clone()).ai_generated();
                let id = node.id.clone();
                next.nodes.insert(id.clone(), node);
                minted += 1;
                id
            }
            _ => {
                // Unreachable past the validation loop, but kept total.
                return Err(MutateError::MalformedExpansion(format!(
                    "choice \"{}\" names no new scene and no existing node",
                    spec.text
                )));
            }
        };
        choices.push(Choice::new(spec.text.clone(), target));
    }

    let node = next
        .nodes
        .get_mut(node_id)
        .ok_or_else(|| MutateError::NodeNotFound(node_id.clone()))?;
    if let Some(content) = &result.updated_content {
        node.content = content.clone();
    }
    node.choices = choices;

    info!(
        node = %node_id,
        choices = result.choices.len(),
        minted,
        "merged expansion"
    );
    Ok(next)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expand::ChoiceSpec;
    use crate::query;

    #[test]
    fn test_create_node_always_succeeds() {
        let story = Story::starter();
        let (next, id) = create_node(&story, "New Scene", "Something happens.");

        assert_eq!(next.node_count(), story.node_count() + 1);
        assert!(next.contains(&id));
        assert!(next.node(&id).unwrap().choices.is_empty());
        // the input document is untouched
        assert!(!story.contains(&id));
    }

    #[test]
    fn test_created_ids_are_pairwise_distinct() {
        let mut story = Story::starter();
        let mut ids = Vec::new();
        for i in 0..50 {
            let (next, id) = create_node(&story, format!("Scene {i}"), "");
            story = next;
            ids.push(id);
        }
        let unique: std::collections::BTreeSet<_> = ids.iter().collect();
        assert_eq!(unique.len(), ids.len());
    }

    #[test]
    fn test_edit_node_replaces_fields() {
        let story = Story::starter();
        let gate = NodeId::from("gate");

        let next = edit_node(
            &story,
            &gate,
            NodeEdit::new()
                .with_title("The Broken Gate")
                .with_image_url("https://example.com/gate.png"),
        )
        .unwrap();

        let node = next.node(&gate).unwrap();
        assert_eq!(node.title, "The Broken Gate");
        assert_eq!(node.image_url.as_deref(), Some("https://example.com/gate.png"));
        // content untouched
        assert_eq!(node.content, story.node(&gate).unwrap().content);

        let cleared = edit_node(&next, &gate, NodeEdit::new().clearing_image()).unwrap();
        assert!(cleared.node(&gate).unwrap().image_url.is_none());
    }

    #[test]
    fn test_edit_missing_node_rejected() {
        let story = Story::starter();
        let result = edit_node(&story, &NodeId::from("missing"), NodeEdit::new());
        assert!(matches!(result, Err(MutateError::NodeNotFound(_))));
    }

    #[test]
    fn test_delete_start_node_rejected() {
        let story = Story::starter();
        let result = delete_node(&story, &story.start_node_id.clone());
        assert!(matches!(result, Err(MutateError::StartNodeDeletion(_))));
    }

    #[test]
    fn test_delete_cascades_inbound_choices() {
        let story = Story::starter();
        let gate = NodeId::from("gate");

        let next = delete_node(&story, &gate).unwrap();

        assert!(!next.contains(&gate));
        for node in next.nodes.values() {
            assert!(node.choices.iter().all(|c| c.target_node_id != gate));
        }
        // the start node kept its other choice
        assert_eq!(next.start_node().unwrap().choices.len(), 1);
    }

    #[test]
    fn test_delete_preserves_convergent_reachability() {
        // A -> B -> C with a second, convergent edge A -> C.
        let mut story = Story::new("Diamond");
        let a = story.start_node_id.clone();
        let (next, b) = create_node(&story, "B", "");
        let (next, c) = create_node(&next, "C", "");
        let (next, _) = add_choice(&next, &a, "to B", Some(b.clone())).unwrap();
        let (next, _) = add_choice(&next, &b, "to C", Some(c.clone())).unwrap();
        let (next, _) = add_choice(&next, &a, "shortcut to C", Some(c.clone())).unwrap();
        story = next;

        let after = delete_node(&story, &b).unwrap();

        let start_choices = &after.node(&a).unwrap().choices;
        assert_eq!(start_choices.len(), 1);
        assert_eq!(start_choices[0].target_node_id, c);
        assert!(!query::is_orphan(&after, &c));
    }

    #[test]
    fn test_add_choice_defaults_to_start() {
        let story = Story::starter();
        let hall = NodeId::from("hall");

        let (next, choice_id) = add_choice(&story, &hall, "Leave the hall", None).unwrap();

        let node = next.node(&hall).unwrap();
        let choice = node.choice(&choice_id).unwrap();
        assert_eq!(choice.target_node_id, next.start_node_id);
    }

    #[test]
    fn test_remove_choice_out_of_range() {
        let story = Story::starter();
        let hall = NodeId::from("hall");
        let result = remove_choice(&story, &hall, 0);
        assert!(matches!(
            result,
            Err(MutateError::ChoiceIndexOutOfRange { len: 0, .. })
        ));
    }

    #[test]
    fn test_remove_choice_by_index() {
        let story = Story::starter();
        let start = story.start_node_id.clone();

        let next = remove_choice(&story, &start, 0).unwrap();
        let node = next.start_node().unwrap();
        assert_eq!(node.choices.len(), 1);
        assert_eq!(node.choices[0].text, "Follow the river");
    }

    #[test]
    fn test_retarget_tolerates_missing_target() {
        let story = Story::starter();
        let start = story.start_node_id.clone();
        let choice_id = story.start_node().unwrap().choices[0].id.clone();

        let next =
            retarget_choice(&story, &start, &choice_id, NodeId::from("not-yet-created")).unwrap();

        let broken = query::broken_links(&next);
        assert_eq!(broken.len(), 1);
        assert_eq!(broken[0].choice_id, choice_id);
    }

    #[test]
    fn test_retarget_unknown_choice_rejected() {
        let story = Story::starter();
        let start = story.start_node_id.clone();
        let result = retarget_choice(&story, &start, &ChoiceId::from("nope"), NodeId::from("gate"));
        assert!(matches!(result, Err(MutateError::ChoiceNotFound { .. })));
    }

    #[test]
    fn test_merge_expansion_convergent_and_divergent() {
        let story = Story::starter();
        let hall = NodeId::from("hall");
        let result = ExpansionResult::new(vec![
            ChoiceSpec::divergent("Climb the stair", "A spiral stair winds upward."),
            ChoiceSpec::convergent("Walk back outside", NodeId::from("start")),
        ])
        .with_updated_content("The hall is not empty after all.");

        let next = merge_expansion(&story, &hall, &result).unwrap();

        // exactly one new node, generator provenance, titled from the choice
        assert_eq!(next.node_count(), story.node_count() + 1);
        let minted = next
            .nodes
            .values()
            .find(|n| n.is_ai_generated)
            .expect("a minted node");
        assert_eq!(minted.title, "Climb the stair");
        assert_eq!(minted.content, "A spiral stair winds upward.");
        assert!(minted.choices.is_empty());

        let node = next.node(&hall).unwrap();
        assert_eq!(node.content, "The hall is not empty after all.");
        assert_eq!(node.choices.len(), 2);
        assert_eq!(node.choices[0].target_node_id, minted.id);
        assert_eq!(node.choices[1].target_node_id, NodeId::from("start"));
    }

    #[test]
    fn test_merge_expansion_replaces_choice_list() {
        let story = Story::starter();
        let hall = NodeId::from("hall");

        let first = ExpansionResult::new(vec![ChoiceSpec::divergent("Door A", "Room A.")]);
        let after_first = merge_expansion(&story, &hall, &first).unwrap();

        let second = ExpansionResult::new(vec![ChoiceSpec::divergent("Door B", "Room B.")]);
        let after_second = merge_expansion(&after_first, &hall, &second).unwrap();

        let node = after_second.node(&hall).unwrap();
        assert_eq!(node.choices.len(), 1);
        assert_eq!(node.choices[0].text, "Door B");

        // Room A survives, now orphaned and detectable.
        let room_a = after_second
            .nodes
            .values()
            .find(|n| n.title == "Door A")
            .expect("first expansion's node remains");
        assert!(query::is_orphan(&after_second, &room_a.id));
    }

    #[test]
    fn test_merge_expansion_missing_text_rejected() {
        let story = Story::starter();
        let hall = NodeId::from("hall");
        let result = ExpansionResult::new(vec![
            ChoiceSpec::divergent("Fine", "ok"),
            ChoiceSpec::divergent("   ", "blank label"),
        ]);

        let outcome = merge_expansion(&story, &hall, &result);
        assert!(matches!(outcome, Err(MutateError::MalformedExpansion(_))));
    }

    #[test]
    fn test_merge_expansion_unresolvable_choice_rejected() {
        let story = Story::starter();
        let hall = NodeId::from("hall");
        // Names a node that does not exist and carries no new content.
        let result = ExpansionResult::new(vec![ChoiceSpec {
            text: "Into thin air".to_string(),
            new_node_content: None,
            existing_target_id: Some(NodeId::from("missing")),
        }]);

        let outcome = merge_expansion(&story, &hall, &result);
        assert!(matches!(outcome, Err(MutateError::MalformedExpansion(_))));
    }

    #[test]
    fn test_merge_expansion_bogus_target_with_content_diverges() {
        // A stale convergence target with scene text falls back to
        // minting the scene rather than failing the whole merge.
        let story = Story::starter();
        let hall = NodeId::from("hall");
        let result = ExpansionResult::new(vec![ChoiceSpec {
            text: "Through the hidden door".to_string(),
            new_node_content: Some("A hidden passage.".to_string()),
            existing_target_id: Some(NodeId::from("deleted-meanwhile")),
        }]);

        let next = merge_expansion(&story, &hall, &result).unwrap();
        assert_eq!(next.node_count(), story.node_count() + 1);
        assert!(next.nodes.values().any(|n| n.content == "A hidden passage."));
    }

    #[test]
    fn test_merge_expansion_missing_node_rejected() {
        let story = Story::starter();
        let result = ExpansionResult::default();
        let outcome = merge_expansion(&story, &NodeId::from("missing"), &result);
        assert!(matches!(outcome, Err(MutateError::NodeNotFound(_))));
    }
}
