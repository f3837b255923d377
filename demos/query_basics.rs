//! Selector and text queries against a live tab.
//!
//! Demonstrates:
//! - Attaching to a remote-debugging endpoint
//! - Navigation and waiting for an element
//! - Selector and text lookups
//! - Script evaluation
//!
//! Usage:
//!   cargo run --example query_basics -- ws://127.0.0.1:9222/devtools/page/<id>

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use cdp_driver::{FindOptions, Locator, Result, Tab};

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
            eprintln!("usage: query_basics <ws-endpoint>");
            std::process::exit(2);
        }
    };

    if let Err(e) = run(&endpoint).await {
        eprintln!("\n[ERROR] {e}");
        std::process::exit(1);
    }
}

async fn run(endpoint: &str) -> Result<()> {
    println!("=== Query Basics ===\n");

    let tab = Tab::attach(endpoint).await?;
    tab.goto("https://example.com").await?;

    // ========================================================================
    // Waiting
    // ========================================================================

    let heading = tab
        .wait_for(&Locator::css("h1"), Duration::from_secs(10))
        .await?;
    println!("[Wait]   h1: {}", heading.text());

    // ========================================================================
    // Selector Queries
    // ========================================================================

    let paragraphs = tab.select_all("p", Duration::from_secs(5), None).await?;
    println!("[Select] {} paragraph(s)", paragraphs.len());
    for paragraph in &paragraphs {
        println!("         - {}", paragraph.text());
    }

    // ========================================================================
    // Text Queries
    // ========================================================================

    let link = tab
        .find(
            "More information",
            &FindOptions::default().with_tag("a"),
            Duration::from_secs(5),
        )
        .await?;
    match link {
        Some(link) => println!("[Find]   link href: {:?}", link.attribute("href")),
        None => println!("[Find]   no matching link"),
    }

    // ========================================================================
    // Script Evaluation
    // ========================================================================

    let title = tab.evaluate("document.title", false).await?;
    println!("[Eval]   title: {title}");

    let later = tab
        .evaluate("new Promise(r => setTimeout(() => r('done'), 100))", true)
        .await?;
    println!("[Eval]   promise: {later}");

    let markup = tab.content().await?;
    println!("[Page]   {} bytes of markup", markup.len());

    tab.close();
    Ok(())
}
