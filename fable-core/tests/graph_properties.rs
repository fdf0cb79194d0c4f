//! Core guarantees of the story graph engine, exercised through the
//! public API: origin permanence, cascade integrity, id uniqueness,
//! orphan tracking, import atomicity, expansion merge semantics, and
//! interchange round-tripping.

use fable_core::expand::{ChoiceSpec, ExpansionResult};
use fable_core::testing::{assert_choice_targets, assert_no_broken_links, assert_orphans};
use fable_core::{mutate, persist, query, NodeId, PlayCursor, Story};

/// A -> B -> C with a second, convergent edge A -> C.
fn diamond() -> (Story, NodeId, NodeId, NodeId) {
    let story = Story::new("Diamond");
    let a = story.start_node_id.clone();
    let (story, b) = mutate::create_node(&story, "B", "Scene B");
    let (story, c) = mutate::create_node(&story, "C", "Scene C");
    let (story, _) = mutate::add_choice(&story, &a, "to B", Some(b.clone())).unwrap();
    let (story, _) = mutate::add_choice(&story, &b, "to C", Some(c.clone())).unwrap();
    let (story, _) = mutate::add_choice(&story, &a, "shortcut to C", Some(c.clone())).unwrap();
    (story, a, b, c)
}

#[test]
fn start_node_is_permanent() {
    let story = Story::starter();
    let result = mutate::delete_node(&story, &story.start_node_id.clone());

    assert!(matches!(
        result,
        Err(mutate::MutateError::StartNodeDeletion(_))
    ));
    // the rejected operation observed nothing and changed nothing
    assert_eq!(story, Story::starter());
}

#[test]
fn deletion_cascades_everywhere() {
    let (story, _, b, _) = diamond();
    let after = mutate::delete_node(&story, &b).unwrap();

    assert!(!after.contains(&b));
    for node in after.nodes.values() {
        assert!(node.choices.iter().all(|c| c.target_node_id != b));
    }
    assert_no_broken_links(&after);
}

#[test]
fn created_ids_never_collide() {
    let mut story = Story::new("Ids");
    let mut ids = vec![story.start_node_id.clone()];
    for i in 0..200 {
        let (next, id) = mutate::create_node(&story, format!("Scene {i}"), "");
        story = next;
        ids.push(id);
    }

    let unique: std::collections::BTreeSet<_> = ids.iter().collect();
    assert_eq!(unique.len(), ids.len());
}

#[test]
fn orphan_set_tracks_linking_exactly() {
    let story = Story::new("Orphans");
    let start = story.start_node_id.clone();
    let (story, lone) = mutate::create_node(&story, "Lone", "");

    // not the start node, nothing targets it: orphan
    assert_orphans(&story, &[lone.as_str()]);

    // adding a choice targeting it removes it from the orphan set
    let (story, _) = mutate::add_choice(&story, &start, "visit", Some(lone.clone())).unwrap();
    assert_orphans(&story, &[]);

    // removing the last inbound choice restores it
    let story = mutate::remove_choice(&story, &start, 0).unwrap();
    assert_orphans(&story, &[lone.as_str()]);
}

#[test]
fn import_is_atomic() {
    let story = Story::starter();
    let exported = persist::to_json(&story).unwrap();

    // candidate missing startNodeId must reject...
    let broken = r#"{"id": "x", "name": "Broken", "nodes": {}}"#;
    assert!(mutate::import_story(broken).is_err());

    // ...and the pre-import document is byte-for-byte what it was
    assert_eq!(persist::to_json(&story).unwrap(), exported);
}

#[test]
fn expansion_converges_without_minting() {
    let (story, a, _, c) = diamond();
    let result = ExpansionResult::new(vec![ChoiceSpec::convergent("circle back", c.clone())]);

    let after = mutate::merge_expansion(&story, &a, &result).unwrap();

    assert_eq!(after.node_count(), story.node_count());
    assert_choice_targets(&after, &a, &[c.as_str()]);
}

#[test]
fn expansion_divergence_mints_exactly_one_ai_node() {
    let (story, a, _, _) = diamond();
    let result = ExpansionResult::new(vec![ChoiceSpec::divergent("venture on", "New ground.")]);

    let after = mutate::merge_expansion(&story, &a, &result).unwrap();

    assert_eq!(after.node_count(), story.node_count() + 1);
    let minted: Vec<_> = after.nodes.values().filter(|n| n.is_ai_generated).collect();
    assert_eq!(minted.len(), 1);
    assert_eq!(minted[0].content, "New ground.");
}

#[test]
fn second_expansion_replaces_the_first() {
    let story = Story::starter();
    let hall = NodeId::from("hall");

    let first = ExpansionResult::new(vec![
        ChoiceSpec::divergent("Left door", "Left room."),
        ChoiceSpec::divergent("Right door", "Right room."),
    ]);
    let story = mutate::merge_expansion(&story, &hall, &first).unwrap();

    let second = ExpansionResult::new(vec![ChoiceSpec::convergent(
        "Walk back out",
        NodeId::from("start"),
    )]);
    let story = mutate::merge_expansion(&story, &hall, &second).unwrap();

    // the second call's choices, exactly - nothing appended
    assert_choice_targets(&story, &hall, &["start"]);

    // the first expansion's scenes remain in the graph, now orphaned
    let leftovers: Vec<_> = story
        .nodes
        .values()
        .filter(|n| n.is_ai_generated)
        .map(|n| n.id.as_str())
        .collect();
    assert_eq!(leftovers.len(), 2);
    assert_orphans(&story, &leftovers);
}

#[test]
fn export_import_round_trip_is_deep_equal() {
    let (mut story, _, _, _) = diamond();
    story.image_style = Some("woodcut".to_string());

    let json = persist::to_json(&story).unwrap();
    let restored = mutate::import_story(&json).unwrap();
    assert_eq!(story, restored);

    // and a second trip is stable
    assert_eq!(persist::to_json(&restored).unwrap(), json);
}

#[test]
fn playback_traversal_and_step_back() {
    let (story, a, b, c) = diamond();
    let mut cursor = PlayCursor::start(&story);

    cursor.choose(&story, 0).unwrap(); // C1: a -> b
    cursor.choose(&story, 0).unwrap(); // C2: b -> c
    assert_eq!(cursor.current(), &c);

    assert!(cursor.step_back());
    assert_eq!(cursor.current(), &b);
    assert_eq!(cursor.depth(), 2);
    assert_eq!(cursor.trail(), &[a, b]);
}

#[test]
fn deleting_the_middle_of_a_diamond_keeps_the_far_side_reachable() {
    let (story, a, b, c) = diamond();
    let after = mutate::delete_node(&story, &b).unwrap();

    // exactly one choice left on A, pointing at C
    assert_choice_targets(&after, &a, &[c.as_str()]);
    // C is still reachable, so it must not be reported as an orphan
    assert!(!query::is_orphan(&after, &c));
    assert_orphans(&after, &[]);
}
