// Copyright 2025-2026 CEMAXECUTER LLC

#[cfg(feature = "zmq")]
pub mod zmq_pub;

use rfs_sweep::fft::{lower_bins, upper_bins};
use rfs_sweep::record::{binary_record, lower_slice_bounds, upper_slice_bounds};
use rfs_sweep::FftFrame;

/// Sample rate implied by a frame's geometry.
pub fn frame_sample_rate(frame: &FftFrame<'_>) -> u64 {
    (frame.bin_width * frame.fft_size as f64).round() as u64
}

/// Build the two publishable slice records for one tuning step, in the
/// same length-prefixed layout the binary sink writes.
pub fn slice_records(frame: &FftFrame<'_>) -> (Vec<u8>, Vec<u8>) {
    let sample_rate = frame_sample_rate(frame);
    let n = frame.fft_size;

    let (hz_low, hz_high) = lower_slice_bounds(frame.frequency_hz, sample_rate);
    let lower = binary_record(hz_low, hz_high, &frame.pwr[lower_bins(n)]);

    let (hz_low, hz_high) = upper_slice_bounds(frame.frequency_hz, sample_rate);
    let upper = binary_record(hz_low, hz_high, &frame.pwr[upper_bins(n)]);

    (lower, upper)
}

/// Metadata frame published once when a sensor comes up, so subscribers
/// can size their decoders before the first record arrives.
pub fn announce(
    sensor_id: Option<&str>,
    sample_rate_hz: u64,
    bin_width: f64,
    fft_size: usize,
) -> serde_json::Value {
    serde_json::json!({
        "sensor_id": sensor_id,
        "sample_rate_hz": sample_rate_hz,
        "bin_width_hz": bin_width,
        "fft_size": fft_size,
        "record_length": 16 + fft_size,
        "started_at": chrono::Local::now().to_rfc3339(),
    })
}
