//! Clean a simulated recording, revert one range and print the evaluation
//!
//! Pass a JSON engine configuration path as the first argument to override
//! the defaults.

use anyhow::{Context, Result};
use eeg_processing::{CleaningEngine, EngineConfig};
use eeg_simulation::{EegSimConfig, EegSimulator};

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let config = match std::env::args().nth(1) {
        Some(path) => EngineConfig::from_file(&path).with_context(|| format!("loading config {}", path))?,
        None => EngineConfig::eeg_default(),
    };
    println!("=== EEG cleaning demo ({}) ===\n", config.name);

    let mut engine = CleaningEngine::new(config).context("building engine")?;

    let recording = EegSimulator::new(EegSimConfig::blink_scenario())?.generate_recording()?;
    let raw = recording.signal;
    println!(
        "Recording: {} channels, {} samples at {} Hz, {} blinks injected",
        raw.channel_count(),
        raw.samples_per_channel(),
        raw.sampling_rate(),
        recording.blinks.len()
    );

    let raw_events = engine.detect_events(&raw, engine.config().detector.clone())?;
    let result = engine.run_default(raw).context("running pipeline")?;
    for timing in &result.timings().steps {
        println!("  {:<12} {:>8} µs", timing.step.name(), timing.elapsed_us());
    }
    for warning in &result.timings().warnings {
        println!("  warning: {}", warning);
    }

    let cleaned_events = engine.detect_current_events()?;
    println!("Artefact events: {} raw, {} cleaned\n", raw_events.len(), cleaned_events.len());

    let evaluation = engine.evaluate()?;
    println!("{}", engine.evaluate_report(&evaluation));

    engine.revert(2.0, 4.0).context("reverting 2-4 s")?;
    let reverted = engine.evaluate()?;
    println!(
        "After reverting [2, 4) s the overall score moves from {:.1} to {:.1}\n",
        evaluation.overall_score, reverted.overall_score
    );

    let analysis = engine.analyze()?;
    println!("{}", analysis.summary_text());

    let out = std::env::temp_dir().join("eeg_cleaned.npy");
    engine.export_npy(&out).with_context(|| format!("writing {}", out.display()))?;
    println!("\nCurrent signal written to {}", out.display());
    Ok(())
}
