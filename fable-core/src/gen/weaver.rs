//! Claude-backed story generator.
//!
//! The StoryWeaver turns the generation contract into Messages API
//! calls: it assembles a system prompt, ships the request context as
//! JSON, and parses the JSON the model writes back. Everything it
//! returns is re-validated by the mutation engine before it touches a
//! document.

use super::{GenerateError, StoryGenerator};
use crate::expand::{ExpansionRequest, ExpansionResult};
use crate::story::{Story, Violation};
use async_trait::async_trait;
use claude::{Claude, Message, Request};
use tracing::debug;
use uuid::Uuid;

/// Configuration for the story weaver.
#[derive(Debug, Clone)]
pub struct WeaverConfig {
    /// The model to use (defaults to the client's default).
    pub model: Option<String>,

    /// Maximum tokens for responses. Seeds are whole documents, so the
    /// default is generous.
    pub max_tokens: usize,

    /// Temperature for generation.
    pub temperature: Option<f32>,
}

impl Default for WeaverConfig {
    fn default() -> Self {
        Self {
            model: None,
            max_tokens: 8192,
            temperature: Some(0.8),
        }
    }
}

/// The AI storyteller: seeds whole documents from a theme and continues
/// dead ends with new or convergent choices.
pub struct StoryWeaver {
    client: Claude,
    config: WeaverConfig,
}

impl StoryWeaver {
    /// Create a weaver with an API key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: Claude::new(api_key),
            config: WeaverConfig::default(),
        }
    }

    /// Create a weaver from the ANTHROPIC_API_KEY environment variable.
    pub fn from_env() -> Result<Self, GenerateError> {
        Ok(Self {
            client: Claude::from_env()?,
            config: WeaverConfig::default(),
        })
    }

    /// Configure the weaver.
    pub fn with_config(mut self, config: WeaverConfig) -> Self {
        self.config = config;
        self
    }

    async fn complete(&self, system: &str, user: String) -> Result<String, GenerateError> {
        let mut request = Request::new(vec![Message::user(user)])
            .with_system(system)
            .with_max_tokens(self.config.max_tokens);

        if let Some(ref model) = self.config.model {
            request = request.with_model(model);
        }
        if let Some(temperature) = self.config.temperature {
            request = request.with_temperature(temperature);
        }

        let response = self.client.complete(request).await?;
        Ok(response.text())
    }
}

#[async_trait]
impl StoryGenerator for StoryWeaver {
    async fn generate_seed(
        &self,
        theme: &str,
        image_style: Option<&str>,
    ) -> Result<Story, GenerateError> {
        let mut user = format!("Theme: {theme}");
        if let Some(style) = image_style {
            user.push_str(&format!("\nVisual style note: {style}"));
        }

        let text = self
            .complete(include_str!("prompts/seed.txt"), user)
            .await?;
        debug!(chars = text.len(), "received seed response");

        let mut story = parse_seed(&text)?;
        if let Some(style) = image_style {
            story.image_style = Some(style.to_string());
        }
        Ok(story)
    }

    async fn expand(&self, request: &ExpansionRequest) -> Result<ExpansionResult, GenerateError> {
        let context = serde_json::to_string_pretty(request)
            .map_err(|e| GenerateError::Parse(e.to_string()))?;

        let text = self
            .complete(include_str!("prompts/expand.txt"), context)
            .await?;
        debug!(chars = text.len(), "received expansion response");

        parse_expansion(&text)
    }

    fn name(&self) -> &str {
        "story-weaver"
    }
}

// ============================================================================
// Response parsing
// ============================================================================

/// Pull the JSON payload out of a model reply, tolerating code fences
/// and prose around the object.
fn extract_json(text: &str) -> Result<&str, GenerateError> {
    if let Some(fenced) = text.split("```json").nth(1) {
        if let Some(inner) = fenced.split("```").next() {
            return Ok(inner.trim());
        }
    }

    let start = text.find('{');
    let end = text.rfind('}');
    match (start, end) {
        (Some(start), Some(end)) if start < end => Ok(&text[start..=end]),
        _ => Err(GenerateError::Parse(
            "no JSON object found in response".to_string(),
        )),
    }
}

fn parse_seed(text: &str) -> Result<Story, GenerateError> {
    let json = extract_json(text)?;
    let mut story =
        crate::persist::from_json(json).map_err(|e| GenerateError::Parse(e.to_string()))?;

    if story.id.is_empty() {
        story.id = Uuid::new_v4().to_string();
    }

    // A seed with a broken entry point is unusable; lesser violations
    // (dangling targets) stay repairable in the editor.
    let fatal = story
        .validate()
        .into_iter()
        .find(|v| matches!(v, Violation::UnknownStartNode { .. }));
    if let Some(violation) = fatal {
        return Err(GenerateError::Malformed(violation.to_string()));
    }

    Ok(story)
}

fn parse_expansion(text: &str) -> Result<ExpansionResult, GenerateError> {
    let json = extract_json(text)?;
    let result: ExpansionResult =
        serde_json::from_str(json).map_err(|e| GenerateError::Parse(e.to_string()))?;

    if result.choices.is_empty() {
        return Err(GenerateError::Malformed(
            "expansion proposed no choices".to_string(),
        ));
    }
    for (index, choice) in result.choices.iter().enumerate() {
        if choice.text.trim().is_empty() {
            return Err(GenerateError::Malformed(format!(
                "choice {index} has no text"
            )));
        }
        if choice.new_node_content.is_none() && choice.existing_target_id.is_none() {
            return Err(GenerateError::Malformed(format!(
                "choice {index} (\"{}\") sets neither newNodeContent nor existingTargetId",
                choice.text
            )));
        }
    }

    Ok(result)
}
