//! Branching story graph engine with an AI storyteller.
//!
//! This crate provides:
//! - The story document model and its structural validation
//! - Pure query projections: orphans, inbound links, search, edge grouping
//! - A mutation engine where every operation returns a new document
//! - An asynchronous expansion protocol for growing the graph from
//!   dead ends via a content generator, race-safe against local edits
//! - A playback cursor and the high-level [`Adventure`] session
//!
//! # Quick Start
//!
//! ```ignore
//! use fable_core::{Adventure, StoryWeaver};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let weaver = StoryWeaver::from_env()?;
//!     let mut adventure = Adventure::new(Box::new(weaver));
//!
//!     println!("{}", adventure.current_text().unwrap_or_default());
//!     adventure.choose(0)?;
//!
//!     if adventure.at_leaf() {
//!         adventure.expand_here().await?;
//!     }
//!
//!     adventure.save("crossroads.json").await?;
//!     Ok(())
//! }
//! ```

pub mod adventure;
pub mod expand;
pub mod gen;
pub mod media;
pub mod mutate;
pub mod persist;
pub mod query;
pub mod session;
pub mod story;
pub mod testing;

// Primary public API
pub use adventure::{Adventure, AdventureConfig, AdventureError};
pub use expand::{
    ChoiceSpec, ExpandError, ExpansionRequest, ExpansionResult, HistoryEntry, NodeSummary,
    PendingExpansions,
};
pub use gen::{GenerateError, StoryGenerator, StoryWeaver, WeaverConfig};
pub use mutate::{MutateError, NodeEdit};
pub use persist::PersistError;
pub use query::{BrokenLink, GroupedEdge};
pub use session::{PlayCursor, SessionError};
pub use story::{Choice, ChoiceId, NodeId, Story, StoryNode, Violation, PLAYER_NAME_TOKEN};
pub use testing::{MockGenerator, TestHarness};
