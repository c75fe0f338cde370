//! `pennywise agent` — Interactive or single-message chat mode.

use pennywise_agent::{AgentLoop, AgentResponse};
use pennywise_config::AppConfig;
use pennywise_core::event::{DomainEvent, EventBus};
use std::io::Write;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::{self, error::RecvError};

pub async fn run(
    message: Option<String>,
    user: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config()?;

    // Check for API key early — give a clear error
    if !config.has_api_key() && config.default_provider != "ollama" {
        eprintln!();
        eprintln!("  ERROR: No API key configured!");
        eprintln!();
        eprintln!("  Set one of these environment variables:");
        eprintln!("    OPENAI_API_KEY      = 'sk-...'");
        eprintln!("    OPENROUTER_API_KEY  = 'sk-or-v1-...'");
        eprintln!("    PENNYWISE_API_KEY   = 'sk-...'   (generic)");
        eprintln!();
        eprintln!("  Or add it to your config file:");
        eprintln!("    {}", AppConfig::config_path().display());
        eprintln!();
        return Err("No API key found. See above for setup instructions.".into());
    }

    let user = user.unwrap_or_else(|| config.agent.default_user.clone());

    let provider = pennywise_providers::build_from_config(&config)
        .default()
        .ok_or("No default provider configured")?;
    let ledger = pennywise_ledger::open(&config.ledger).await?;
    let tools = Arc::new(pennywise_tools::default_registry(ledger.clone()));
    let event_bus = Arc::new(EventBus::default());
    let agent = AgentLoop::from_config(&config, provider, tools, event_bus.clone());

    if let Some(msg) = message {
        // Single message mode
        eprint!("  Thinking...");
        let response = agent.invoke(&msg, &user).await;
        eprint!("\r              \r");
        println!("{}", response.answer);
        print_footer(&response);
        return Ok(());
    }

    // Interactive mode
    println!();
    println!("  ╔══════════════════════════════════════════════╗");
    println!("  ║       Pennywise Agent — Interactive Mode     ║");
    println!("  ╚══════════════════════════════════════════════╝");
    println!();
    println!("  Provider:  {}", config.default_provider);
    println!("  Model:     {}", config.default_model);
    println!("  Ledger:    {}", ledger.name());
    println!("  User:      {user}");
    println!();
    println!("  Try: \"I spent $12 on lunch\" or \"Am I over budget?\"");
    println!("  Type 'exit' or Ctrl+D to quit.");
    println!();

    // Show tool activity while a request is in flight.
    let mut events = event_bus.subscribe();
    tokio::spawn(async move {
        while let Some(line) = next_tool_activity(&mut events).await {
            eprintln!("{line}");
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("  You > ");
        std::io::stdout().flush()?;

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

        let response = agent.invoke(line, &user).await;
        println!();
        for answer_line in response.answer.lines() {
            println!("  Pennywise > {answer_line}");
        }
        print_footer(&response);
        println!();
    }

    println!();
    println!("  Goodbye! 👋");
    println!();

    Ok(())
}

fn print_footer(response: &AgentResponse) {
    let tools = if response.tools_used.is_empty() {
        "no tools".to_string()
    } else {
        response.tools_used.join(", ")
    };
    eprintln!(
        "  ({} steps, {tools}, {:.2}s)",
        response.steps_taken, response.execution_time
    );
}

/// Wait for the next tool execution and format it for display.
///
/// Skips over gaps when the display falls behind; returns `None` once the
/// bus is dropped.
async fn next_tool_activity(events: &mut broadcast::Receiver<Arc<DomainEvent>>) -> Option<String> {
    loop {
        match events.recv().await {
            Ok(event) => {
                if let DomainEvent::ToolExecuted {
                    tool_name,
                    success,
                    duration_ms,
                    ..
                } = event.as_ref()
                {
                    let mark = if *success { "✓" } else { "✗" };
                    return Some(format!("  [{mark} {tool_name} · {duration_ms} ms]"));
                }
            }
            Err(RecvError::Lagged(skipped)) => {
                tracing::debug!(skipped, "Tool activity display fell behind");
            }
            Err(RecvError::Closed) => return None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tool_event(name: &str) -> DomainEvent {
        DomainEvent::ToolExecuted {
            identity: "alice".into(),
            tool_name: name.into(),
            success: true,
            duration_ms: 3,
            timestamp: chrono::Utc::now(),
        }
    }

    #[tokio::test]
    async fn activity_survives_a_lagging_subscriber() {
        let bus = EventBus::new(2);
        let mut events = bus.subscribe();
        for name in ["t0", "t1", "t2", "t3", "t4"] {
            bus.publish(tool_event(name));
        }

        assert_eq!(
            next_tool_activity(&mut events).await.as_deref(),
            Some("  [✓ t3 · 3 ms]")
        );
        assert_eq!(
            next_tool_activity(&mut events).await.as_deref(),
            Some("  [✓ t4 · 3 ms]")
        );

        bus.publish(tool_event("t5"));
        assert_eq!(
            next_tool_activity(&mut events).await.as_deref(),
            Some("  [✓ t5 · 3 ms]")
        );

        drop(bus);
        assert!(next_tool_activity(&mut events).await.is_none());
    }

    #[tokio::test]
    async fn non_tool_events_are_skipped() {
        let bus = EventBus::default();
        let mut events = bus.subscribe();
        bus.publish(DomainEvent::InvocationCompleted {
            identity: "alice".into(),
            steps_taken: 1,
            tools_used: vec![],
            answered: true,
            timestamp: chrono::Utc::now(),
        });
        bus.publish(tool_event("add_expense"));

        assert_eq!(
            next_tool_activity(&mut events).await.as_deref(),
            Some("  [✓ add_expense · 3 ms]")
        );
    }
}
