//! `watch` command: poll a bridge and print the display state.

use std::time::Duration;

use chrono::Local;
use miette::Result;
use tracing::info;

use mood_poller::{HttpSource, Poller};
use mood_queue::EmotionSample;

pub async fn run(url: &str, interval_ms: u64) -> Result<()> {
    let source = HttpSource::new(url).map_err(|e| miette::miette!("{}", e))?;
    info!(url = source.url(), interval_ms, "watching bridge");

    let handle = Poller::new(source)
        .with_interval(Duration::from_millis(interval_ms))
        .map_err(|e| miette::miette!("invalid --interval-ms: {}", e))?
        .start();
    let mut state = handle.subscribe();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("received shutdown signal");
                break;
            }
            changed = state.changed() => {
                if changed.is_err() {
                    break;
                }
                let sample = state.borrow_and_update().clone();
                println!("{} {}", Local::now().format("%H:%M:%S"), render(&sample));
            }
        }
    }

    handle.stop().await;
    Ok(())
}

/// One line per sample: the dominant emotion, then every label as a percentage.
fn render(sample: &EmotionSample) -> String {
    let Some(dominant) = sample.dominant() else {
        return "(no emotions)".to_string();
    };

    let bars: Vec<String> = sample
        .emotions()
        .iter()
        .map(|e| format!("{} {:.0}%", e.label, e.score * 100.0))
        .collect();

    format!("[{}] {}", dominant.label, bars.join("  "))
}
