//! Protocol event subscription.
//!
//! Demonstrates:
//! - Typed event listeners (`Page.loadEventFired`, `Page.frameNavigated`)
//! - Raw listeners on any method name
//! - Unsubscribing
//!
//! Usage:
//!   cargo run --example events -- ws://127.0.0.1:9222/devtools/page/<id>

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use cdp_driver::cdp::page::{FrameNavigated, LoadEventFired};
use cdp_driver::{Result, Tab};

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cdp_driver=debug".into()),
        )
        .init();

    let endpoint = match std::env::args().nth(1) {
        Some(endpoint) => endpoint,
        None => {
            eprintln!("usage: events <ws-endpoint>");
            std::process::exit(2);
        }
    };

    if let Err(e) = run(&endpoint).await {
        eprintln!("\n[ERROR] {e}");
        std::process::exit(1);
    }
}

async fn run(endpoint: &str) -> Result<()> {
    println!("=== Events ===\n");

    let tab = Tab::attach(endpoint).await?;
    tab.enable_page_events().await?;

    // ========================================================================
    // Typed Listeners
    // ========================================================================

    tab.session().subscribe_event(|event: LoadEventFired| {
        println!("[Event] load fired at {:.3}", event.timestamp);
    });

    tab.session().subscribe_event(|event: FrameNavigated| {
        println!("[Event] frame {} -> {}", event.frame.id, event.frame.url);
    });

    // ========================================================================
    // Raw Listener
    // ========================================================================

    let listener = tab.session().subscribe("Page.frameStartedLoading", |params| {
        println!("[Event] frame started loading: {params}");
    });

    tab.goto("https://example.com").await?;
    tokio::time::sleep(Duration::from_secs(2)).await;

    tab.session().unsubscribe("Page.frameStartedLoading", listener);

    tab.goto("https://example.org").await?;
    tokio::time::sleep(Duration::from_secs(2)).await;

    tab.close();
    Ok(())
}
