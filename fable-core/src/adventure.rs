//! Adventure - the primary public API for authoring and playback.
//!
//! An `Adventure` owns the single shared document value plus the
//! playback cursor and the generation collaborator. Every mutation
//! funnels through the engine in [`crate::mutate`] and replaces the
//! owned document wholesale; the previous value is handed back so
//! observers (editor panes, a visualizer) can diff old against new.

use crate::expand::{self, ExpandError, PendingExpansions};
use crate::gen::{GenerateError, StoryGenerator};
use crate::mutate::MutateError;
use crate::persist::{self, PersistError};
use crate::session::{PlayCursor, SessionError};
use crate::story::{NodeId, Story, StoryNode};
use std::path::Path;
use thiserror::Error;
use tracing::{info, warn};

/// Errors from adventure operations.
#[derive(Debug, Error)]
pub enum AdventureError {
    #[error(transparent)]
    Mutate(#[from] MutateError),

    #[error(transparent)]
    Expand(#[from] ExpandError),

    #[error(transparent)]
    Generate(#[from] GenerateError),

    #[error(transparent)]
    Persist(#[from] PersistError),

    #[error(transparent)]
    Session(#[from] SessionError),
}

/// Configuration for creating a new adventure.
#[derive(Debug, Clone)]
pub struct AdventureConfig {
    /// Name for freshly seeded stories.
    pub story_name: String,

    /// Player name substituted into scene text at render time.
    pub player_name: Option<String>,

    /// Style hint forwarded to the generation collaborator.
    pub image_style: Option<String>,
}

impl AdventureConfig {
    pub fn new(story_name: impl Into<String>) -> Self {
        Self {
            story_name: story_name.into(),
            player_name: None,
            image_style: None,
        }
    }

    pub fn with_player_name(mut self, name: impl Into<String>) -> Self {
        self.player_name = Some(name.into());
        self
    }

    pub fn with_image_style(mut self, style: impl Into<String>) -> Self {
        self.image_style = Some(style.into());
        self
    }
}

impl Default for AdventureConfig {
    fn default() -> Self {
        Self::new("Untitled Story")
    }
}

/// A playable, editable story with its generation collaborator.
pub struct Adventure {
    story: Story,
    cursor: PlayCursor,
    generator: Box<dyn StoryGenerator>,
    pending: PendingExpansions,
    player_name: Option<String>,
}

impl Adventure {
    /// Start with the built-in starter story.
    pub fn new(generator: Box<dyn StoryGenerator>) -> Self {
        Self::with_story(generator, Story::starter())
    }

    /// Start from an existing document.
    pub fn with_story(generator: Box<dyn StoryGenerator>, story: Story) -> Self {
        let cursor = PlayCursor::start(&story);
        Self {
            story,
            cursor,
            generator,
            pending: PendingExpansions::new(),
            player_name: None,
        }
    }

    /// Generate a complete new story from a free-text theme.
    pub async fn new_from_theme(
        generator: Box<dyn StoryGenerator>,
        theme: &str,
        config: AdventureConfig,
    ) -> Result<Self, AdventureError> {
        let story = generator
            .generate_seed(theme, config.image_style.as_deref())
            .await?;
        info!(story = %story.id, nodes = story.node_count(), "seeded story from theme");

        let mut adventure = Self::with_story(generator, story);
        adventure.player_name = config.player_name;
        Ok(adventure)
    }

    pub fn set_player_name(&mut self, name: impl Into<String>) {
        self.player_name = Some(name.into());
    }

    // ------------------------------------------------------------------
    // Document access
    // ------------------------------------------------------------------

    /// The current document.
    pub fn story(&self) -> &Story {
        &self.story
    }

    /// The playback cursor.
    pub fn cursor(&self) -> &PlayCursor {
        &self.cursor
    }

    /// The current scene, if it still exists. Editors can delete the
    /// node under the player; callers should restart when this is gone.
    pub fn current_node(&self) -> Option<&StoryNode> {
        self.cursor.current_node(&self.story)
    }

    /// The current scene's text, player-name placeholder substituted.
    pub fn current_text(&self) -> Option<String> {
        let node = self.current_node()?;
        Some(match &self.player_name {
            Some(name) => node.render_content(name),
            None => node.content.clone(),
        })
    }

    // ------------------------------------------------------------------
    // Editing
    // ------------------------------------------------------------------

    /// Run a mutation against the current document and commit its
    /// result. Returns the *previous* document on success so observers
    /// can diff; a rejected mutation leaves everything untouched.
    pub fn apply<F>(&mut self, op: F) -> Result<Story, AdventureError>
    where
        F: FnOnce(&Story) -> Result<Story, MutateError>,
    {
        let next = op(&self.story)?;
        Ok(std::mem::replace(&mut self.story, next))
    }

    /// Replace the document with an imported one. Validation happens
    /// before anything changes; on success the cursor restarts at the
    /// new origin and the previous document is returned.
    pub fn import_json(&mut self, raw: &str) -> Result<Story, AdventureError> {
        let imported = crate::mutate::import_story(raw)?;
        let previous = std::mem::replace(&mut self.story, imported);
        self.cursor.restart(&self.story);
        Ok(previous)
    }

    /// Export the document as interchange JSON.
    pub fn export_json(&self) -> Result<String, AdventureError> {
        Ok(persist::to_json(&self.story)?)
    }

    // ------------------------------------------------------------------
    // Playback
    // ------------------------------------------------------------------

    /// Follow the current scene's choice at `index`.
    pub fn choose(&mut self, index: usize) -> Result<(), AdventureError> {
        self.cursor.choose(&self.story, index)?;
        Ok(())
    }

    /// Step back one scene. Returns false at the origin.
    pub fn back(&mut self) -> bool {
        self.cursor.step_back()
    }

    /// Reset playback to the origin.
    pub fn restart(&mut self) {
        self.cursor.restart(&self.story);
    }

    /// True when the player is at a scene with no choices.
    pub fn at_leaf(&self) -> bool {
        self.cursor.at_leaf(&self.story)
    }

    // ------------------------------------------------------------------
    // Expansion
    // ------------------------------------------------------------------

    /// Grow the story from the current dead end.
    ///
    /// Keeps one request in flight per node, merges the result into
    /// whatever the document is once the generator answers, and
    /// attaches best-effort media to freshly minted scenes. A failed
    /// generation changes nothing.
    pub async fn expand_here(&mut self) -> Result<(), AdventureError> {
        let node_id = self.cursor.current().clone();
        self.pending.begin(&node_id)?;

        let outcome = expand::run_expansion(
            self.generator.as_ref(),
            &self.story,
            self.cursor.trail(),
            &node_id,
            self.player_name.as_deref(),
        )
        .await;

        let result = match outcome {
            Ok(result) => result,
            Err(e) => {
                self.pending.finish(&node_id);
                return Err(e.into());
            }
        };

        let merged = expand::apply_expansion(&self.story, &node_id, &result);
        self.pending.finish(&node_id);
        let mut next = merged?;

        let minted: Vec<NodeId> = next
            .nodes
            .keys()
            .filter(|id| !self.story.contains(id))
            .cloned()
            .collect();
        self.attach_media(&mut next, &minted).await;

        self.story = next;
        Ok(())
    }

    /// Best-effort illustrations for new scenes; failures are logged
    /// and dropped, never surfaced as errors.
    async fn attach_media(&self, story: &mut Story, node_ids: &[NodeId]) {
        let style = story.image_style.clone();
        for id in node_ids {
            let Some(node) = story.node(id) else { continue };
            let (title, content) = (node.title.clone(), node.content.clone());

            match self
                .generator
                .generate_media(&title, &content, style.as_deref())
                .await
            {
                Ok(Some(url)) => {
                    if let Some(node) = story.nodes.get_mut(id) {
                        node.image_url = Some(url);
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(node = %id, error = %e, "media generation failed; continuing without");
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // Persistence
    // ------------------------------------------------------------------

    /// Save the document to a file.
    pub async fn save(&self, path: impl AsRef<Path>) -> Result<(), AdventureError> {
        Ok(persist::save(&self.story, path).await?)
    }

    /// Load a document from a file and start playback at its origin.
    pub async fn load(
        path: impl AsRef<Path>,
        generator: Box<dyn StoryGenerator>,
    ) -> Result<Self, AdventureError> {
        let story = persist::load(path).await?;
        Ok(Self::with_story(generator, story))
    }
}
