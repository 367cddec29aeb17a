//! Read-only commands: `state`, `threads`, `kg`, `graph`

use crate::app::runtime::build_knowledge_graph;
use crate::app::{build_runtime, AppConfig};
use anyhow::{bail, Context, Result};

/// Print a thread's checkpoint
pub async fn state(config: &AppConfig, thread: &str, raw: bool) -> Result<()> {
    let store = config.checkpoint.build().await?;
    let Some(checkpoint) = store.load(thread).await? else {
        bail!(sage_core::Error::ThreadNotFound(thread.to_string()));
    };

    if raw {
        println!("{}", serde_json::to_string_pretty(&checkpoint)?);
        return Ok(());
    }

    println!(
        "Thread '{}': cursor {}, step {}, updated {}",
        thread,
        checkpoint.cursor,
        checkpoint.step,
        checkpoint.updated_at.to_rfc3339()
    );
    for message in &checkpoint.state.messages {
        let author = message.author().unwrap_or(message.role.as_str());
        println!("  [{}] {}", author, message.content);
    }
    if let Some(next) = &checkpoint.state.next {
        println!("  next: {}", next);
    }
    if let Some(intents) = &checkpoint.state.intents {
        println!("  intents: {:?}", intents.codes());
    }
    Ok(())
}

/// List thread ids
pub async fn threads(config: &AppConfig) -> Result<()> {
    let store = config.checkpoint.build().await?;
    let threads = store.list_threads().await?;
    if threads.is_empty() {
        println!("No threads in the {} store.", store.name());
    }
    for thread in threads {
        println!("{}", thread);
    }
    Ok(())
}

/// Look up entities and print the outcome as JSON
pub async fn kg(config: &AppConfig, entities: &[String]) -> Result<()> {
    let Some(agent) = build_knowledge_graph(&config.knowledge_graph).await? else {
        bail!("Knowledge graph is disabled. Set knowledge_graph.enabled = true or SAGE_KNOWLEDGE_GRAPH__ENABLED=true.");
    };
    let outcome = agent.lookup(entities).await;
    println!(
        "{}",
        serde_json::to_string_pretty(&outcome).context("Failed to render lookup outcome")?
    );
    Ok(())
}

/// Print the compiled topology
pub async fn graph(config: &AppConfig) -> Result<()> {
    let runtime = build_runtime(config).await?;
    let config = runtime.graph.config();
    println!(
        "max_steps = {}, call_timeout = {}s",
        config.max_steps,
        config.call_timeout.as_secs()
    );
    for (from, to) in runtime.graph.topology() {
        println!("  {} -> {}", from, to);
    }
    Ok(())
}
