//! Testing utilities.
//!
//! This module provides tools for integration testing:
//! - `MockGenerator` for deterministic testing without API calls
//! - `TestHarness` for scripted authoring/playback scenarios
//! - Assertion helpers for verifying graph state
//!
//! Scripted results flow through the real mutation engine, so tests
//! exercise exactly the merge path production uses.

use crate::adventure::{Adventure, AdventureError};
use crate::expand::{ChoiceSpec, ExpansionRequest, ExpansionResult};
use crate::gen::{GenerateError, StoryGenerator};
use crate::query;
use crate::story::{NodeId, Story};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// A generator that returns scripted responses.
///
/// Clones share state, so a handle kept outside an [`Adventure`] can
/// keep queueing results while the adventure owns its own clone.
#[derive(Clone, Default)]
pub struct MockGenerator {
    inner: Arc<MockState>,
}

#[derive(Default)]
struct MockState {
    seed: Mutex<Option<Story>>,
    expansions: Mutex<VecDeque<Result<ExpansionResult, GenerateError>>>,
    media_url: Mutex<Option<String>>,
}

impl MockGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the document returned by `generate_seed`. Without one,
    /// seeds fall back to the built-in starter story.
    pub fn set_seed(&self, story: Story) {
        *self.inner.seed.lock().expect("mock state poisoned") = Some(story);
    }

    /// Queue an expansion result, returned in FIFO order.
    pub fn queue_expansion(&self, result: ExpansionResult) {
        self.inner
            .expansions
            .lock()
            .expect("mock state poisoned")
            .push_back(Ok(result));
    }

    /// Queue a generation failure.
    pub fn queue_failure(&self, error: GenerateError) {
        self.inner
            .expansions
            .lock()
            .expect("mock state poisoned")
            .push_back(Err(error));
    }

    /// Script the asset reference returned for every media request.
    pub fn set_media_url(&self, url: impl Into<String>) {
        *self.inner.media_url.lock().expect("mock state poisoned") = Some(url.into());
    }

    /// Number of queued expansion responses not yet consumed.
    pub fn queued(&self) -> usize {
        self.inner
            .expansions
            .lock()
            .expect("mock state poisoned")
            .len()
    }
}

#[async_trait]
impl StoryGenerator for MockGenerator {
    async fn generate_seed(
        &self,
        _theme: &str,
        image_style: Option<&str>,
    ) -> Result<Story, GenerateError> {
        let scripted = self.inner.seed.lock().expect("mock state poisoned").clone();
        let mut story = scripted.unwrap_or_else(Story::starter);
        if story.image_style.is_none() {
            story.image_style = image_style.map(str::to_string);
        }
        Ok(story)
    }

    async fn expand(&self, _request: &ExpansionRequest) -> Result<ExpansionResult, GenerateError> {
        let next = self
            .inner
            .expansions
            .lock()
            .expect("mock state poisoned")
            .pop_front();

        // Past the script, keep the story going with a bland default.
        next.unwrap_or_else(|| {
            Ok(ExpansionResult::new(vec![ChoiceSpec::divergent(
                "Continue onward",
                "The story continues.",
            )]))
        })
    }

    async fn generate_media(
        &self,
        _title: &str,
        _content: &str,
        _style_hint: Option<&str>,
    ) -> Result<Option<String>, GenerateError> {
        Ok(self
            .inner
            .media_url
            .lock()
            .expect("mock state poisoned")
            .clone())
    }

    fn name(&self) -> &str {
        "mock-generator"
    }
}

/// Test harness for running authoring and playback scenarios.
pub struct TestHarness {
    /// Handle for scripting responses mid-scenario.
    pub mock: MockGenerator,
    /// The adventure under test.
    pub adventure: Adventure,
}

impl TestHarness {
    /// Create a harness over the built-in starter story.
    pub fn new() -> Self {
        Self::with_story(Story::starter())
    }

    /// Create a harness over a custom document.
    pub fn with_story(story: Story) -> Self {
        let mock = MockGenerator::new();
        let adventure = Adventure::with_story(Box::new(mock.clone()), story);
        Self { mock, adventure }
    }

    /// Queue an expansion result on the mock.
    pub fn expect_expansion(&mut self, result: ExpansionResult) -> &mut Self {
        self.mock.queue_expansion(result);
        self
    }

    /// Queue a generation failure on the mock.
    pub fn expect_failure(&mut self, error: GenerateError) -> &mut Self {
        self.mock.queue_failure(error);
        self
    }

    /// The current document.
    pub fn story(&self) -> &Story {
        self.adventure.story()
    }

    /// Follow the current scene's choice at `index`.
    pub fn choose(&mut self, index: usize) -> Result<(), AdventureError> {
        self.adventure.choose(index)
    }

    /// Expand the current scene through the mock.
    pub async fn expand(&mut self) -> Result<(), AdventureError> {
        self.adventure.expand_here().await
    }

    /// Ids of nodes currently reported as orphans.
    pub fn orphan_ids(&self) -> Vec<NodeId> {
        query::orphans(self.story())
            .into_iter()
            .map(|n| n.id.clone())
            .collect()
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Assertion Helpers
// ============================================================================

/// Assert the document's orphan set is exactly `expected` (by id, any order).
#[track_caller]
pub fn assert_orphans(story: &Story, expected: &[&str]) {
    let mut actual: Vec<String> = query::orphans(story)
        .into_iter()
        .map(|n| n.id.to_string())
        .collect();
    actual.sort();
    let mut expected: Vec<String> = expected.iter().map(|s| s.to_string()).collect();
    expected.sort();
    assert_eq!(
        actual, expected,
        "expected orphan set {expected:?}, got {actual:?}"
    );
}

/// Assert no choice in the document dangles.
#[track_caller]
pub fn assert_no_broken_links(story: &Story) {
    let broken = query::broken_links(story);
    assert!(
        broken.is_empty(),
        "expected no broken links, found {broken:?}"
    );
}

/// Assert a node's choices target exactly `expected` ids, in order.
#[track_caller]
pub fn assert_choice_targets(story: &Story, node_id: &NodeId, expected: &[&str]) {
    let node = story
        .node(node_id)
        .unwrap_or_else(|| panic!("node {node_id} not found"));
    let actual: Vec<&str> = node
        .choices
        .iter()
        .map(|c| c.target_node_id.as_str())
        .collect();
    assert_eq!(
        actual, expected,
        "expected node {node_id} to target {expected:?}, got {actual:?}"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expand::ChoiceSpec;

    #[tokio::test]
    async fn test_mock_returns_scripted_results_in_order() {
        let mock = MockGenerator::new();
        mock.queue_expansion(ExpansionResult::new(vec![ChoiceSpec::divergent("A", "a")]));
        mock.queue_expansion(ExpansionResult::new(vec![ChoiceSpec::divergent("B", "b")]));

        let story = Story::starter();
        let request =
            ExpansionRequest::from_story(&story, &[], &NodeId::from("hall"), None).unwrap();

        let first = mock.expand(&request).await.unwrap();
        assert_eq!(first.choices[0].text, "A");
        let second = mock.expand(&request).await.unwrap();
        assert_eq!(second.choices[0].text, "B");
        assert_eq!(mock.queued(), 0);
    }

    #[tokio::test]
    async fn test_mock_falls_back_past_the_script() {
        let mock = MockGenerator::new();
        let story = Story::starter();
        let request =
            ExpansionRequest::from_story(&story, &[], &NodeId::from("hall"), None).unwrap();

        let result = mock.expand(&request).await.unwrap();
        assert_eq!(result.choices.len(), 1);
    }

    #[tokio::test]
    async fn test_harness_round_trip() {
        let mut harness = TestHarness::new();
        harness.choose(1).unwrap();
        harness.choose(0).unwrap();

        harness.expect_expansion(ExpansionResult::new(vec![ChoiceSpec::convergent(
            "Back out",
            NodeId::from("start"),
        )]));
        harness.expand().await.unwrap();

        assert_choice_targets(harness.story(), &NodeId::from("hall"), &["start"]);
        assert_no_broken_links(harness.story());
    }
}
