//! Simulated page session feeding a running activity-track server
//!
//! Build: cargo build --example page_session -p track-agent
//! Run:   activity-track &  then  ./target/debug/examples/page_session
//! Check: activity-track events -n 20
//!
//! Press Ctrl-C to tear the page down (final flush).

use std::sync::Arc;
use std::time::Duration;
use track_agent::{AgentConfig, StaticPage, Tracker};

const PAGES: [(&str, &str); 3] = [
    ("http://localhost:50000/1.html", "Page 1"),
    ("http://localhost:50000/2.html", "Page 2"),
    ("http://localhost:50000/3.html", "Page 3"),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("debug")),
        )
        .init();

    let endpoint = std::env::args()
        .nth(1)
        .unwrap_or_else(|| track_agent::DEFAULT_ENDPOINT.to_string());

    let page = Arc::new(StaticPage::new(PAGES[0].0, PAGES[0].1));
    let config = AgentConfig::default().with_endpoint(endpoint);
    let tracker = Tracker::start_http(config, page.clone())?;

    println!("Tracking to {} (Ctrl-C to stop)", tracker.config().endpoint);

    let mut step = 0usize;
    let mut ticker = tokio::time::interval(Duration::from_millis(400));
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                step += 1;
                if step % 7 == 0 {
                    let (url, title) = PAGES[(step / 7) % PAGES.len()];
                    page.navigate(url, title);
                    tracker.track("navigate", [title]);
                } else if step % 2 == 0 {
                    tracker.track("click", [format!("button-{}", step % 5)]);
                } else {
                    tracker.track("scroll", Vec::<String>::new());
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    let outcome = tracker.shutdown().await;
    let stats = tracker.stats();
    println!(
        "Final flush: {:?} | tracked={} delivered={} failed_flushes={}",
        outcome, stats.tracked, stats.delivered, stats.failed_flushes
    );
    Ok(())
}
