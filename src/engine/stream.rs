//! The per-sample processing loop

use std::time::Instant;

use log::{debug, info};
use serde::Serialize;

use super::{SampleSink, SampleSource};
use crate::dsp::{DigitalSignalChain, Sample};
use crate::error::Result;

/// Summary of one `run_stream` call
#[derive(Debug, Clone, Serialize)]
pub struct StreamReport {
    pub samples: u64,
    pub sample_rate: u32,
    /// Audio duration in seconds
    pub duration_secs: f64,
    /// Wall-clock processing time in seconds
    pub elapsed_secs: f64,
    pub realtime_factor: f64,
    /// Processing faults caught during this run
    pub faults: u64,
}

/// Pull every sample from `source`, run it through `chain` and push it into
/// `sink`. The time index advances by `1 / sample_rate` per sample.
///
/// # Errors
/// Only sink failures stop the loop; effect faults are absorbed by the chain.
pub fn run_stream<S, K>(
    source: &mut S,
    sink: &mut K,
    chain: &DigitalSignalChain,
) -> Result<StreamReport>
where
    S: SampleSource + ?Sized,
    K: SampleSink + ?Sized,
{
    let sample_rate = source.sample_rate().max(1);
    chain.set_sample_rate(sample_rate);
    let time_step = 1.0 / sample_rate as f64;
    let faults_before = chain.fault_count();
    let started = Instant::now();

    debug!(
        "[Stream] Starting with chain {:?} @ {} Hz",
        chain.active_names(),
        sample_rate
    );

    let mut count: u64 = 0;
    while let Some(raw) = source.next_sample() {
        let mut sample = Sample::new(raw, count as f64 * time_step);
        chain.apply_effects(&mut sample);
        sink.write_sample(&sample)?;
        count += 1;
    }
    sink.finish()?;

    let elapsed_secs = started.elapsed().as_secs_f64();
    let duration_secs = count as f64 * time_step;
    let report = StreamReport {
        samples: count,
        sample_rate,
        duration_secs,
        elapsed_secs,
        realtime_factor: if elapsed_secs > 0.0 {
            duration_secs / elapsed_secs
        } else {
            0.0
        },
        faults: chain.fault_count() - faults_before,
    };
    info!(
        "[Stream] Processed {} samples ({:.2}s audio) in {:.3}s, {:.1}x realtime, {} faults",
        report.samples,
        report.duration_secs,
        report.elapsed_secs,
        report.realtime_factor,
        report.faults
    );
    Ok(report)
}
