//! Content-generation collaborators.
//!
//! The engine reaches its generator through the narrow [`StoryGenerator`]
//! contract; transport, prompting, and parsing live behind it. The
//! Claude-backed implementation is [`StoryWeaver`]; tests use the
//! scripted [`crate::testing::MockGenerator`].

mod weaver;

pub use weaver::{StoryWeaver, WeaverConfig};

use crate::expand::{ExpansionRequest, ExpansionResult};
use crate::story::Story;
use async_trait::async_trait;
use thiserror::Error;

/// Errors from content generation. None of these ever carry partial
/// document state: a failed generation simply produces no update.
#[derive(Debug, Error)]
pub enum GenerateError {
    #[error("generation failed: {0}")]
    Api(#[from] claude::Error),

    #[error("generator returned unparsable content: {0}")]
    Parse(String),

    #[error("generator result is malformed: {0}")]
    Malformed(String),
}

/// An external collaborator that writes story content on demand.
#[async_trait]
pub trait StoryGenerator: Send + Sync {
    /// Produce a complete new document from a free-text theme.
    async fn generate_seed(
        &self,
        theme: &str,
        image_style: Option<&str>,
    ) -> Result<Story, GenerateError>;

    /// Continue the story from a dead end.
    async fn expand(&self, request: &ExpansionRequest) -> Result<ExpansionResult, GenerateError>;

    /// Best-effort illustration for a scene, returning an opaque asset
    /// reference. Collaborators without a visual channel return `Ok(None)`;
    /// failures here must never block play or editing.
    async fn generate_media(
        &self,
        _title: &str,
        _content: &str,
        _style_hint: Option<&str>,
    ) -> Result<Option<String>, GenerateError> {
        Ok(None)
    }

    /// Collaborator name, for logs.
    fn name(&self) -> &str;
}
