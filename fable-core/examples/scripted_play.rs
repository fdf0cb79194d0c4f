//! Scripted playthrough with the mock generator - no API key needed.
//!
//! Walks the starter story to its dead end, expands it with a scripted
//! result, and prints the graph views an editor would show.
//!
//! Run with: `cargo run -p fable-core --example scripted_play`

use fable_core::expand::{ChoiceSpec, ExpansionResult};
use fable_core::testing::MockGenerator;
use fable_core::{query, Adventure, NodeId};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let mock = MockGenerator::new();
    mock.queue_expansion(
        ExpansionResult::new(vec![
            ChoiceSpec::divergent(
                "Climb the spiral stair",
                "The stair coils upward into lamplight and dust.",
            ),
            ChoiceSpec::convergent("Walk back to the crossroads", NodeId::from("start")),
        ])
        .with_updated_content("The hall is quiet, but not empty: a stair winds up one wall."),
    );

    let mut adventure = Adventure::new(Box::new(mock));
    adventure.set_player_name("Robin");

    // Play to the dead end.
    loop {
        let node = adventure.current_node().expect("current scene");
        println!("\n== {} ==", node.display_title());
        println!("{}", adventure.current_text().unwrap_or_default());

        if adventure.at_leaf() {
            break;
        }
        for (i, choice) in node.choices.iter().enumerate() {
            println!("  [{i}] {}", choice.text);
        }
        adventure.choose(0)?;
    }

    println!("\nDead end reached - asking the generator to continue...");
    adventure.expand_here().await?;

    let node = adventure.current_node().expect("current scene");
    println!("\n== {} ==", node.display_title());
    println!("{}", adventure.current_text().unwrap_or_default());
    for (i, choice) in node.choices.iter().enumerate() {
        println!("  [{i}] {}", choice.text);
    }

    // The editor's view of the graph.
    let story = adventure.story();
    println!("\nGraph: {} scenes, {} edges", story.node_count(), query::edge_groups(story).len());
    println!("Orphans: {}", query::orphans(story).len());
    println!("Broken links: {}", query::broken_links(story).len());

    Ok(())
}
