//! Command handlers.

use anyhow::{Result, bail};
use cairn_core::EngineConfig;
use cairn_core::events::{EngineEvent, ResourceErrorPayload, ResourceLoadedPayload};
use cairn_core::metrics::MetricsSnapshot;
use cairn_core::resource::{Priority, ResourceDescriptor, ResourceKind};
use cairn_engine::Engine;
use console::style;
use futures::StreamExt;
use std::path::Path;

/// Print the effective configuration.
pub fn show_config(config: &EngineConfig) -> Result<()> {
    print!("{}", serde_yaml::to_string(config)?);
    Ok(())
}

/// Validate a configuration file.
pub fn validate_config(path: &Path) -> Result<()> {
    EngineConfig::from_file(path)?;
    println!("{} {} is valid", style("✓").green(), path.display());
    Ok(())
}

/// Load every locator and print one line per outcome.
pub async fn fetch(
    config: EngineConfig,
    urls: Vec<String>,
    priority: Priority,
    kind: ResourceKind,
    use_cache: bool,
    repeat: bool,
) -> Result<()> {
    let engine = Engine::new(config)?;
    let mut events = engine.subscribe();

    let rounds = if repeat { 2 } else { 1 };
    let mut failures = 0;

    for round in 0..rounds {
        for (index, url) in urls.iter().enumerate() {
            let descriptor = ResourceDescriptor::new(format!("res-{}", index), kind, url)
                .with_priority(priority)
                .with_cache(use_cache);
            engine.enqueue_resource(descriptor);
        }

        let mut remaining = urls.len();
        while remaining > 0 {
            let Some(event) = events.next().await else {
                bail!("event stream closed with {} loads outstanding", remaining);
            };
            match event {
                EngineEvent::ResourceLoaded(loaded) => {
                    print_loaded(&loaded);
                    remaining -= 1;
                }
                EngineEvent::ResourceError(failed) => {
                    print_failed(&failed);
                    failures += 1;
                    remaining -= 1;
                }
                _ => {}
            }
        }

        if round + 1 < rounds {
            println!();
        }
    }

    let stats = engine.cache_stats();
    println!(
        "\n{} entries cached, {} bytes, hit rate {:.0}%",
        stats.entries,
        stats.total_bytes,
        stats.hit_rate() * 100.0
    );
    engine.shutdown();

    if failures > 0 {
        bail!("{} of {} loads failed", failures, urls.len() * rounds);
    }
    Ok(())
}

fn print_loaded(loaded: &ResourceLoadedPayload) {
    let source = if loaded.from_cache {
        style("cache").cyan()
    } else {
        style("network").dim()
    };
    println!(
        "{} {} {} ({} bytes, {}ms, {})",
        style("✓").green(),
        style(&loaded.id).bold(),
        loaded.locator,
        loaded.size,
        loaded.duration_ms,
        source
    );
}

fn print_failed(failed: &ResourceErrorPayload) {
    println!(
        "{} {} {}: {}",
        style("✗").red(),
        style(&failed.descriptor.id).bold(),
        failed.descriptor.locator,
        failed.error
    );
}

/// Start the engine and print metrics as they are sampled.
pub async fn monitor(config: EngineConfig, samples: u32, fps: Option<f64>) -> Result<()> {
    let engine = Engine::new(config)?;
    let mut events = engine.subscribe();

    if let Some(fps) = fps {
        engine.report_frame(fps, None, 0);
    }
    engine.start()?;

    println!(
        "Sampling every {}ms, quality {}",
        engine.get_configuration().monitoring.sample_interval_ms,
        style(engine.quality_tier()).bold()
    );

    let mut seen = 0;
    while seen < samples {
        let Some(event) = events.next().await else {
            break;
        };
        match event {
            EngineEvent::Metrics(snapshot) => {
                print_snapshot(&snapshot);
                seen += 1;
            }
            EngineEvent::MemoryWarning(warning) => println!(
                "{} memory at {:.1}% (threshold {:.1}%)",
                style("!").yellow(),
                warning.percent,
                warning.threshold
            ),
            EngineEvent::QualityChanged(change) => println!(
                "{} quality {} -> {}",
                style("▶").cyan(),
                change.from,
                style(change.to).bold()
            ),
            EngineEvent::GcCompleted(gc) => println!(
                "{} reclaimed {} entries, {} bytes",
                style("i").blue(),
                gc.removed_entries,
                gc.freed_bytes
            ),
            _ => {}
        }
    }

    engine.shutdown();
    Ok(())
}

fn print_snapshot(snapshot: &MetricsSnapshot) {
    println!(
        "#{:<4} mem {:>5.1}% ({} MiB / {} MiB)  cpu {:>5.1}%  fps {:>5.1}  \
         cache {} entries, hit rate {:.2}",
        snapshot.sequence,
        snapshot.memory.percent,
        snapshot.memory.used_bytes / (1024 * 1024),
        snapshot.memory.total_bytes / (1024 * 1024),
        snapshot.cpu.usage_percent,
        snapshot.graphics.fps,
        snapshot.cache.entries,
        snapshot.cache.hit_rate
    );
}
