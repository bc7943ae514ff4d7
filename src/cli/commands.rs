//! CLI Command Implementations

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use log::{info, warn};
use serde::Serialize;

use crate::config::{Config, ReloadTrigger, ReloadWorker};
use crate::dsp::{ChordRenderer, DigitalSignalChain, EffectRegistry};
use crate::engine::{run_stream, SampleSource, WavSink, WavSource};

/// List every registered effect.
pub fn list_effects(json: bool) -> Result<()> {
    let registry = EffectRegistry::with_builtin();
    let names = registry.list_names();
    if json {
        println!("{}", serde_json::to_string_pretty(&names)?);
    } else {
        for name in names {
            println!("{}", name);
        }
    }
    Ok(())
}

/// Run `input` through the chain into `output`, with live reload enabled.
pub fn process(
    input: &Path,
    output: &Path,
    chain_file: Option<&Path>,
    config_file: Option<&Path>,
    json: bool,
) -> Result<()> {
    let registry = Arc::new(EffectRegistry::with_builtin());
    let chain = Arc::new(DigitalSignalChain::new(registry));
    let config = Arc::new(Config::new());

    if let Some(path) = config_file {
        config
            .load_from_file(path)
            .with_context(|| format!("loading config {}", path.display()))?;
    }

    let summary = match chain_file {
        Some(path) => chain
            .load_file_configured(path, &config)
            .with_context(|| format!("loading effect list {}", path.display()))?,
        None => {
            let names = chain.registry().list_names();
            chain.load_configured(names, &config)
        }
    };
    if !summary.skipped.is_empty() {
        warn!("Unknown effects skipped: {}", summary.skipped.join(", "));
    }
    // Everything is configured; drop the flag raised by the file load.
    config.clear_update();

    let trigger = ReloadTrigger::new();
    trigger.install_signal_handler()?;
    let mut builder = ReloadWorker::builder(Arc::clone(&config), Arc::clone(&chain), trigger);
    if let Some(path) = config_file {
        builder = builder.config_file(path);
    }
    if let Some(path) = chain_file {
        builder = builder.chain_file(path);
    }
    let mut worker = builder.spawn()?;

    let mut source =
        WavSource::open(input).with_context(|| format!("opening {}", input.display()))?;
    let mut sink = WavSink::create(output, source.sample_rate());
    info!(
        "Processing {} through [{}]",
        input.display(),
        chain.active_names().join(" -> ")
    );
    let report = run_stream(&mut source, &mut sink, &chain);
    worker.stop();
    let report = report.with_context(|| format!("writing {}", output.display()))?;

    if json {
        #[derive(Serialize)]
        struct Output<'a> {
            chain: Vec<String>,
            #[serde(flatten)]
            report: &'a crate::engine::StreamReport,
        }
        let out = Output {
            chain: chain.active_names(),
            report: &report,
        };
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        println!("Wrote {}", output.display());
        println!("  Chain:    {}", chain.active_names().join(" -> "));
        println!("  Samples:  {}", report.samples);
        println!("  Duration: {:.2}s", report.duration_secs);
        println!("  Speed:    {:.1}x realtime", report.realtime_factor);
        if report.faults > 0 {
            println!("  Faults:   {}", report.faults);
        }
    }
    Ok(())
}

/// Render a chord from `input` into `output`.
pub fn chord(
    input: &Path,
    output: &Path,
    semitones: &[f32],
    work_dir: Option<&Path>,
    json: bool,
) -> Result<()> {
    let work_dir = match work_dir {
        Some(dir) => dir.to_path_buf(),
        None => output
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join("stompbox-work"),
    };

    let report = ChordRenderer::new(&work_dir)
        .render_chord(input, semitones, output)
        .with_context(|| format!("rendering chord from {}", input.display()))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Wrote {}", report.output.display());
        println!("  Voices:   {}", report.voices);
        println!("  Samples:  {}", report.samples);
        println!(
            "  Speed:    {:.1}x realtime ({:.2}% CPU)",
            report.realtime_factor, report.cpu_percent
        );
    }
    Ok(())
}
