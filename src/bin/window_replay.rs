//! Replays newline-delimited call records from stdin through the window engine
//! and prints every alert line to stdout. Malformed lines are logged and skipped.

use std::io::{self, BufRead};

use cell_drop_monitor::{CallEvent, KeyedWindowEngine};

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_writer(io::stderr)
        .init();

    let mut engine = KeyedWindowEngine::new();
    let (mut seen, mut skipped) = (0usize, 0usize);

    for line in io::stdin().lock().lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match CallEvent::from_json(&line) {
            Ok(ev) => {
                seen += 1;
                if let Some(alert) = engine.ingest(&ev) {
                    println!("{}", alert.to_json_line());
                }
            }
            Err(e) => {
                skipped += 1;
                tracing::warn!("skipping record: {e:#}");
            }
        }
    }

    tracing::info!(seen, skipped, cells = engine.keys().count(), "replay done");
    Ok(())
}
