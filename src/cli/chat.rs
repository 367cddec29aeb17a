//! `sage chat` and `sage resume`

use crate::app::{build_runtime, AppConfig};
use anyhow::Result;
use sage_core::{ConversationState, Error, GraphEvent, Node, OrchestrationGraph, StateUpdate};
use std::future::Future;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast;

/// Run one turn, or an interactive session when `message` is `None`
pub async fn run(config: &AppConfig, thread: &str, message: Option<String>) -> Result<()> {
    let runtime = build_runtime(config).await?;
    let mut events = runtime.event_bus.subscribe();
    let graph = &runtime.graph;

    if let Some(message) = message {
        let state = stream_turn(
            &mut events,
            graph,
            thread,
            graph.run(thread, StateUpdate::user(message)),
        )
        .await?;
        print_intents(&state);
        return Ok(());
    }

    println!("Thread '{}'. Type 'exit' to quit.", thread);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print_prompt();
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if matches!(line, "exit" | "quit") {
            break;
        }
        let turn = graph.run(thread, StateUpdate::user(line));
        match stream_turn(&mut events, graph, thread, turn).await {
            Ok(state) => print_intents(&state),
            Err(Error::Cancelled { .. }) => break,
            // Keep the session alive; the next line retries from the rolled-back turn
            Err(e) => eprintln!("{}", sage_core::format_error_for_cli(&e)),
        }
    }
    Ok(())
}

/// Continue an interrupted thread
pub async fn resume(config: &AppConfig, thread: &str, message: Option<String>) -> Result<()> {
    let runtime = build_runtime(config).await?;
    let mut events = runtime.event_bus.subscribe();

    let was_finished = runtime
        .graph
        .checkpoint(thread)
        .await?
        .is_some_and(|cp| cp.is_finished());
    let turn = runtime.graph.resume(thread, message.map(StateUpdate::user));
    let state = stream_turn(&mut events, &runtime.graph, thread, turn).await?;

    if was_finished {
        if let Some(last) = state.last_message() {
            println!(
                "Thread already finished. Last message from {}: {}",
                last.author().unwrap_or(last.role.as_str()),
                last.content
            );
        }
    }
    print_intents(&state);
    Ok(())
}

/// Await `turn` while printing its events; Ctrl-C cancels the turn at its
/// next transition
async fn stream_turn<F>(
    events: &mut broadcast::Receiver<GraphEvent>,
    graph: &OrchestrationGraph,
    thread: &str,
    turn: F,
) -> sage_core::Result<ConversationState>
where
    F: Future<Output = sage_core::Result<ConversationState>>,
{
    tokio::pin!(turn);
    let mut interrupted = false;
    loop {
        tokio::select! {
            result = &mut turn => {
                while let Ok(event) = events.try_recv() {
                    print_event(&event);
                }
                return result;
            }
            Ok(event) = events.recv() => print_event(&event),
            _ = tokio::signal::ctrl_c(), if !interrupted => {
                if graph.cancel(thread) {
                    interrupted = true;
                    eprintln!("Cancelling after the current step...");
                }
            }
        }
    }
}

fn print_event(event: &GraphEvent) {
    match event {
        GraphEvent::NodeCompleted {
            node,
            next,
            output,
            ..
        } => {
            if node == &Node::Supervisor.to_string() {
                println!("  supervisor -> {}", next);
            } else if let Some(text) = output {
                println!("{}: {}", node, text);
            }
        }
        GraphEvent::RunCancelled { thread_id, .. } => {
            eprintln!("Thread '{}' cancelled; run `sage resume` to continue", thread_id);
        }
        _ => {}
    }
}

fn print_intents(state: &ConversationState) {
    if let Some(intents) = state.intents.as_ref().filter(|i| !i.is_empty()) {
        let labels: Vec<&str> = intents.iter().map(|c| c.label()).collect();
        println!("  intents: {}", labels.join(", "));
    }
}

fn print_prompt() {
    use std::io::Write;
    print!("you> ");
    let _ = std::io::stdout().flush();
}
