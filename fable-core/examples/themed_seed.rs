//! Generate a complete story from a theme with the live API.
//!
//! Requires ANTHROPIC_API_KEY (a .env file works). The theme can be
//! passed as the first argument.
//!
//! Run with: `cargo run -p fable-core --example themed_seed -- "a clockwork city"`

use fable_core::{persist, query, Adventure, AdventureConfig, StoryWeaver};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let theme = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "a drowned library at the edge of the world".to_string());

    let weaver = StoryWeaver::from_env()?;
    let adventure = Adventure::new_from_theme(
        Box::new(weaver),
        &theme,
        AdventureConfig::new("Themed Seed").with_player_name("Robin"),
    )
    .await?;

    let story = adventure.story();
    println!("\"{}\" - {} scenes", story.name, story.node_count());

    for node in story.nodes.values() {
        println!("\n== {} ({}) ==", node.display_title(), node.id);
        println!("{}", node.content);
        for choice in &node.choices {
            println!("  -> {} [{}]", choice.text, choice.target_node_id);
        }
    }

    println!("\nOrphans: {}", query::orphans(story).len());
    println!("Broken links: {}", query::broken_links(story).len());

    let file = persist::story_file_name(&story.name);
    adventure.save(&file).await?;
    println!("Saved to {file}");

    Ok(())
}
