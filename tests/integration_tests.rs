//! Integration Tests
//!
//! End-to-end tests for the pedal core: config file -> chain -> stream.

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use approx::assert_abs_diff_eq;
use tempfile::{tempdir, NamedTempFile};

use stompbox::config::{Config, ReloadTrigger, ReloadWorker};
use stompbox::dsp::harmonizer::{ChordRenderer, BLOCK_SIZE};
use stompbox::dsp::{
    DigitalSignalChain, Effect, EffectRegistry, Fuzz, Gain, Harmonizer, Sample, MAX_EFFECTS,
};
use stompbox::engine::{
    read_mono, run_stream, sine_tone, write_mono, BufferSink, BufferSource, WavSink, WavSource,
};

fn pedal() -> (Arc<DigitalSignalChain>, Arc<Config>) {
    let registry = Arc::new(EffectRegistry::with_builtin());
    (
        Arc::new(DigitalSignalChain::new(registry)),
        Arc::new(Config::new()),
    )
}

fn process_one(chain: &DigitalSignalChain, value: f32) -> Sample {
    let mut sample = Sample::new(value, 0.0);
    chain.apply_effects(&mut sample);
    sample
}

// === Documented effect behaviour ===

#[test]
fn test_gain_identity_and_doubling() {
    assert_abs_diff_eq!(Gain::new(100.0).process(1.0), 1.0, epsilon = 0.01);
    assert_abs_diff_eq!(Gain::new(200.0).process(0.5), 1.0, epsilon = 0.01);
}

#[test]
fn test_fuzz_clamps_full_scale_input() {
    assert_abs_diff_eq!(Fuzz::new(1.0).process(1.0), 0.01, epsilon = 0.001);
}

#[test]
fn test_harmonizer_first_block_is_silent() {
    let mut harmonizer = Harmonizer::new(vec![5.0]);
    let tone = sine_tone(330.0, 0.6, BLOCK_SIZE, 44100);
    let input: Vec<f32> = tone.iter().map(|s| s + 0.2).collect();
    let output: Vec<f32> = input.iter().map(|&x| harmonizer.process(x)).collect();

    assert!(output[..BLOCK_SIZE - 1].iter().all(|&y| y == 0.0));
    assert!(output[BLOCK_SIZE - 1] != 0.0);
}

// === Chain and config together ===

#[test]
fn test_config_file_drives_chain() {
    let (chain, config) = pedal();
    let mut effects = NamedTempFile::new().unwrap();
    writeln!(effects, "gain\nfuzz\n").unwrap();
    let mut settings = NamedTempFile::new().unwrap();
    writeln!(
        settings,
        "# live rig\ngain, on, 200\nfuzz, off, 1.0\noctavedoubler, off, true"
    )
    .unwrap();

    let summary = chain.load_from_file(effects.path()).unwrap();
    assert!(summary.is_complete());
    config.load_from_file(settings.path()).unwrap();
    assert_eq!(chain.configure_effects(&config), 2);
    assert!(!config.has_update());

    let sample = process_one(&chain, 0.3);
    assert_abs_diff_eq!(sample.pcm_value(), 0.6, epsilon = 1e-6);
    assert_eq!(sample.trail().to_vec(), vec!["gain"]);
}

#[test]
fn test_passthrough_with_effects_disabled() {
    let (chain, config) = pedal();
    chain.load_from_names(["gain", "fuzz"]);
    config.set("gain", false, 300i64);
    config.set("fuzz", false, 1.0f64);
    chain.configure_effects(&config);

    assert_eq!(process_one(&chain, 0.5).pcm_value(), 0.5);
}

#[test]
fn test_invalid_setting_keeps_previous_configuration() {
    let (chain, config) = pedal();
    chain.load_from_names(["gain"]);
    config.set("gain", true, 50i64);
    chain.configure_effects(&config);

    config.set("gain", true, -20i64);
    assert_eq!(chain.configure_effects(&config), 0);
    assert!(!config.has_update());
    assert_abs_diff_eq!(process_one(&chain, 0.8).pcm_value(), 0.4, epsilon = 1e-6);
}

#[test]
fn test_register_all_builds_discovery_chain() {
    let (chain, _) = pedal();
    chain.register_all();
    assert_eq!(chain.len(), MAX_EFFECTS);
    assert!(chain.active_names().contains(&"harmonizer".to_string()));
}

#[test]
fn test_hot_swap_while_streaming() {
    let (chain, config) = pedal();
    chain.load_from_names(["gain"]);
    config.set("gain", true, 100i64);
    config.set("octavedoubler", true, true);
    chain.configure_effects(&config);

    let stop = Arc::new(AtomicBool::new(false));
    let swapper = {
        let chain = Arc::clone(&chain);
        let config = Arc::clone(&config);
        let stop = Arc::clone(&stop);
        std::thread::spawn(move || {
            let mut swaps = 0;
            while !stop.load(Ordering::Acquire) {
                let names: &[&str] = if swaps % 2 == 0 {
                    &["octavedoubler", "gain"]
                } else {
                    &["gain"]
                };
                chain.load_configured(names.iter(), &config);
                swaps += 1;
            }
            swaps
        })
    };

    // Every output is either the gain-only or the rectified result; a freshly
    // swapped chain never runs on defaults.
    let deadline = Instant::now() + Duration::from_millis(200);
    while Instant::now() < deadline {
        let sample = process_one(&chain, -0.25);
        let value = sample.pcm_value();
        assert!(value == -0.25 || value == 0.25, "got {}", value);
        assert!(sample.trail().len() <= MAX_EFFECTS);
    }
    stop.store(true, Ordering::Release);
    assert!(swapper.join().unwrap() > 0);
}

#[test]
fn test_reload_worker_picks_up_signal() {
    let (chain, config) = pedal();
    let mut effects = NamedTempFile::new().unwrap();
    writeln!(effects, "gain").unwrap();
    let mut settings = NamedTempFile::new().unwrap();
    writeln!(settings, "gain, on, 50").unwrap();

    let trigger = ReloadTrigger::new();
    let mut worker = ReloadWorker::builder(Arc::clone(&config), Arc::clone(&chain), trigger.clone())
        .config_file(settings.path())
        .chain_file(effects.path())
        .poll_interval(Duration::from_millis(1))
        .spawn()
        .unwrap();

    trigger.notify();
    let deadline = Instant::now() + Duration::from_secs(5);
    while (trigger.is_pending() || config.has_update() || chain.is_empty())
        && Instant::now() < deadline
    {
        std::thread::sleep(Duration::from_millis(5));
    }
    worker.stop();

    assert_eq!(chain.active_names(), vec!["gain"]);
    assert_abs_diff_eq!(process_one(&chain, 0.6).pcm_value(), 0.3, epsilon = 1e-6);
}

// === Audio boundary ===

#[test]
fn test_stream_wav_file_end_to_end() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("dry.wav");
    let output = dir.path().join("wet.wav");
    write_mono(&input, &sine_tone(220.0, 0.5, 4410, 44100), 44100).unwrap();

    let (chain, config) = pedal();
    chain.load_from_names(["octavedoubler"]);
    config.set("octavedoubler", true, true);
    chain.configure_effects(&config);

    let mut source = WavSource::open(&input).unwrap();
    let mut sink = WavSink::create(&output, 44100);
    let report = run_stream(&mut source, &mut sink, &chain).unwrap();
    assert_eq!(report.samples, 4410);

    let (wet, rate) = read_mono(&output).unwrap();
    assert_eq!(rate, 44100);
    assert_eq!(wet.len(), 4410);
    assert!(wet.iter().all(|&s| s >= 0.0));
}

#[test]
fn test_stream_reports_harmonizer_latency() {
    let (chain, config) = pedal();
    chain.load_from_names(["harmonizer"]);
    config.set("harmonizer", true, 0i64);
    chain.configure_effects(&config);
    assert_eq!(chain.latency_samples(), BLOCK_SIZE);

    let input: Vec<f32> = (0..BLOCK_SIZE * 3).map(|i| 0.001 * i as f32 + 0.1).collect();
    let mut source = BufferSource::new(input.clone(), 44100);
    let mut sink = BufferSink::new();
    run_stream(&mut source, &mut sink, &chain).unwrap();

    let out = sink.samples();
    assert!(out[..BLOCK_SIZE - 1].iter().all(|&y| y == 0.0));
    for i in BLOCK_SIZE - 1..out.len() {
        assert_abs_diff_eq!(out[i], input[i + 1 - BLOCK_SIZE], epsilon = 1e-6);
    }
}

#[test]
fn test_chord_render_end_to_end() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("riff.wav");
    let output = dir.path().join("power_chord.wav");
    write_mono(&input, &sine_tone(110.0, 0.9, 8820, 44100), 44100).unwrap();

    let report = ChordRenderer::new(dir.path().join("work"))
        .render_chord(&input, &[0.0, 7.0, 12.0], &output)
        .unwrap();

    assert_eq!(report.voices, 3);
    let (chord, _) = read_mono(&output).unwrap();
    assert_eq!(chord.len(), 8820);
    assert!(chord.iter().all(|s| s.abs() <= 1.0));
}
