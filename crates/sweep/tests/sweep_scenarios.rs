//! End-to-end pipeline scenarios driven with synthetic transfers and a
//! mock peripheral.

use std::io::{self, Write};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use rfs_sweep::{
    CallbackCtl, DeviceError, OutputMode, PlanStrategy, SinkTarget, SweepDevice, SweepError,
    Sweeper, TransferHandler, TransferStatus, TunePlan, WriteMutex, BYTES_PER_BLOCK,
};

#[derive(Default)]
struct MockDevice {
    plans: Vec<TunePlan>,
    streaming: bool,
    closed: bool,
}

impl SweepDevice for MockDevice {
    fn init_sweep(&mut self, plan: &TunePlan) -> Result<(), DeviceError> {
        self.plans.push(plan.clone());
        Ok(())
    }

    fn start_rx_sweep(&mut self, _handler: TransferHandler) -> Result<(), DeviceError> {
        self.streaming = true;
        Ok(())
    }

    fn is_streaming(&self) -> bool {
        self.streaming
    }

    fn close(&mut self) -> Result<(), DeviceError> {
        self.streaming = false;
        self.closed = true;
        Ok(())
    }
}

/// Sink whose bytes the test can read back after handing it to the engine.
#[derive(Clone, Default)]
struct SharedBuf(Arc<Mutex<Vec<u8>>>);

impl SharedBuf {
    fn contents(&self) -> Vec<u8> {
        self.0.lock().unwrap().clone()
    }
}

impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// One well-formed block: magic header, frequency, then `iq` repeated.
fn block(frequency_hz: u64, iq: &[u8]) -> Vec<u8> {
    let mut b = vec![0u8; BYTES_PER_BLOCK];
    b[0] = 0x7F;
    b[1] = 0x7F;
    b[2..10].copy_from_slice(&frequency_hz.to_le_bytes());
    if !iq.is_empty() {
        for (i, slot) in b[10..].iter_mut().enumerate() {
            *slot = iq[i % iq.len()];
        }
    }
    b
}

fn transfer(frequencies: &[u64]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(frequencies.len() * BYTES_PER_BLOCK);
    for &f in frequencies {
        buf.extend_from_slice(&block(f, &[]));
    }
    buf
}

fn sweep_frequencies() -> Vec<u64> {
    (0..16).map(|i| 2_400_000_000 + i * 10_000_000).collect()
}

fn text_sweeper(sink: &SharedBuf) -> Sweeper<MockDevice> {
    let mut sweeper = Sweeper::new(MockDevice::default(), 20_000_000, 20);
    sweeper
        .set_output(OutputMode::Text, SinkTarget::Stream(Box::new(sink.clone())))
        .unwrap();
    sweeper.set_range(&[(2400, 2500)]).unwrap();
    sweeper
        .setup_fft(PlanStrategy::Estimate, Some(1_000_000))
        .unwrap();
    sweeper
}

#[test]
fn minimal_text_sweep() {
    let sink = SharedBuf::default();
    let mut sweeper = text_sweeper(&sink);
    sweeper.start(0).unwrap();

    let status = sweeper.process_transfer(&transfer(&sweep_frequencies()));
    assert_eq!(status, TransferStatus::Continue);

    let text = String::from_utf8(sink.contents()).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 32, "two lines per tuning step");

    let fields: Vec<&str> = lines[0].split(", ").collect();
    assert_eq!(fields.len(), 11, "date, time, 4 header fields, 5 powers");
    assert_eq!(fields[2], "2400000000");
    assert_eq!(fields[3], "2405000000");
    assert_eq!(fields[4], "1000000.00");
    assert_eq!(fields[5], "20");

    // Zero IQ input: every power is the log-of-zero sentinel.
    for line in &lines {
        for p in line.split(", ").skip(6) {
            assert_eq!(p, "-inf");
        }
    }

    // Second line is the upper slice of the same step.
    let upper: Vec<&str> = lines[1].split(", ").collect();
    assert_eq!(upper[2], "2410000000");
    assert_eq!(upper[3], "2415000000");
}

#[test]
fn oneshot_counts_one_sweep_then_exits() {
    let sink = SharedBuf::default();
    let mut sweeper = text_sweeper(&sink);
    sweeper.start(1).unwrap();

    let freqs = sweep_frequencies();
    sweeper.process_transfer(&transfer(&freqs));
    assert_eq!(sweeper.sweep_count(), 0);
    assert!(!sweeper.is_exiting());

    // The start-of-range block of the second sweep closes the first.
    sweeper.process_transfer(&transfer(&freqs));
    assert_eq!(sweeper.sweep_count(), 1);
    assert!(sweeper.is_exiting());

    // Nothing after the boundary block was processed.
    let text = String::from_utf8(sink.contents()).unwrap();
    assert_eq!(text.lines().count(), 32);
}

#[test]
fn finite_run_completes_exactly_k_sweeps() {
    let sink = SharedBuf::default();
    let mut sweeper = text_sweeper(&sink);
    sweeper.start(3).unwrap();

    let freqs = sweep_frequencies();
    for _ in 0..5 {
        sweeper.process_transfer(&transfer(&freqs));
    }
    assert_eq!(sweeper.sweep_count(), 3);
    assert!(sweeper.is_exiting());
}

#[test]
fn binary_record_shape() {
    let sink = SharedBuf::default();
    let mut sweeper = Sweeper::new(MockDevice::default(), 20_000_000, 20);
    sweeper
        .set_output(
            OutputMode::Binary,
            SinkTarget::Stream(Box::new(sink.clone())),
        )
        .unwrap();
    sweeper.set_range(&[(2400, 2500)]).unwrap();
    sweeper
        .setup_fft(PlanStrategy::Estimate, Some(1_000_000))
        .unwrap();
    sweeper.start(0).unwrap();

    sweeper.process_transfer(&transfer(&sweep_frequencies()));

    let bytes = sink.contents();
    // 16 steps, two records each, 4 + 36 bytes per record
    assert_eq!(bytes.len(), 16 * 2 * 40);

    let mut offset = 0;
    let mut step = 0u64;
    while offset < bytes.len() {
        let record_length =
            u32::from_le_bytes(bytes[offset..offset + 4].try_into().unwrap());
        assert_eq!(record_length, 36);
        let hz_low =
            u64::from_le_bytes(bytes[offset + 4..offset + 12].try_into().unwrap());
        let hz_high =
            u64::from_le_bytes(bytes[offset + 12..offset + 20].try_into().unwrap());
        assert_eq!(hz_high - hz_low, 5_000_000, "each slice spans sr/4");
        if offset % 80 == 0 {
            assert_eq!(hz_low, 2_400_000_000 + step * 10_000_000);
        } else {
            step += 1;
        }
        offset += 40;
    }
}

#[test]
fn ifft_assembly_flushes_at_the_boundary() {
    let sink = SharedBuf::default();
    let mut sweeper = Sweeper::new(MockDevice::default(), 20_000_000, 20);
    sweeper
        .set_output(
            OutputMode::InverseFft,
            SinkTarget::Stream(Box::new(sink.clone())),
        )
        .unwrap();
    sweeper.set_range(&[(2400, 2420)]).unwrap();
    sweeper
        .setup_fft(PlanStrategy::Estimate, Some(1_000_000))
        .unwrap();
    sweeper.start(0).unwrap();

    // One sweep of one block with a pure tone; the inverse transform is
    // deferred to the boundary, so nothing is written yet.
    let tone: Vec<u8> = (0..20)
        .flat_map(|i| {
            let phase = 2.0 * std::f32::consts::PI * 15.0 * i as f32 / 20.0;
            [
                (phase.cos() * 100.0) as i8 as u8,
                (phase.sin() * 100.0) as i8 as u8,
            ]
        })
        .collect();
    sweeper.process_transfer(&block(2_400_000_000, &tone));
    assert!(sink.contents().is_empty());

    // The next sweep's start-of-range block triggers the flush:
    // 2 * N * step_count floats.
    sweeper.process_transfer(&block(2_400_000_000, &tone));
    let bytes = sink.contents();
    assert_eq!(bytes.len(), 40 * 4);
    let energy: f32 = bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes(c.try_into().unwrap()).powi(2))
        .sum();
    assert!(energy.is_finite());
    assert!(energy > 0.0);
}

#[test]
fn ifft_mode_admits_exactly_one_range() {
    let mut sweeper = Sweeper::new(MockDevice::default(), 20_000_000, 20);
    sweeper
        .set_output(OutputMode::InverseFft, SinkTarget::Nop)
        .unwrap();
    let before = sweeper.program();

    let err = sweeper
        .set_range(&[(2400, 2500), (5000, 5100)])
        .unwrap_err();
    assert!(matches!(err, SweepError::IncompatibleMode));
    assert_eq!(err.code(), -6001);
    assert_eq!(sweeper.program(), before, "failed call must not mutate");
}

#[test]
fn fft_callback_unsubscribes_on_nonzero() {
    let mut sweeper = Sweeper::new(MockDevice::default(), 20_000_000, 20);
    sweeper.set_output(OutputMode::Text, SinkTarget::Nop).unwrap();
    sweeper.set_range(&[(2400, 2500)]).unwrap();
    sweeper
        .setup_fft(PlanStrategy::Estimate, Some(1_000_000))
        .unwrap();

    let calls = Arc::new(AtomicU32::new(0));
    let seen = calls.clone();
    sweeper
        .set_fft_rx_callback(Box::new(move |frame| {
            seen.fetch_add(1, Ordering::SeqCst);
            assert_eq!(frame.fft_size, 20);
            assert_eq!(frame.pwr.len(), 20);
            CallbackCtl::Unsubscribe
        }))
        .unwrap();
    sweeper.start(0).unwrap();

    sweeper.process_transfer(&transfer(&[2_400_000_000, 2_420_000_000]));
    assert_eq!(calls.load(Ordering::SeqCst), 1, "unsubscribed after first");
}

#[test]
fn raw_callback_with_bypass_disables_fft_outputs() {
    let sink = SharedBuf::default();
    let mut sweeper = text_sweeper(&sink);

    let calls = Arc::new(AtomicU32::new(0));
    let seen = calls.clone();
    sweeper
        .set_raw_sample_rx_callback(
            Box::new(move |buf| {
                seen.fetch_add(1, Ordering::SeqCst);
                assert_eq!(buf.len() % BYTES_PER_BLOCK, 0);
                CallbackCtl::Continue
            }),
            true,
        )
        .unwrap();
    sweeper.start(0).unwrap();

    sweeper.process_transfer(&transfer(&sweep_frequencies()));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(sink.contents().is_empty(), "bypass suppresses records");
    assert_eq!(sweeper.byte_count(), 16 * BYTES_PER_BLOCK as u64);
}

#[test]
fn sweep_starts_only_at_the_first_range_low() {
    let sink = SharedBuf::default();
    let mut sweeper = text_sweeper(&sink);
    sweeper.start(0).unwrap();

    // Mid-range blocks before the range start are skipped.
    sweeper.process_transfer(&transfer(&[2_420_000_000, 2_440_000_000]));
    assert!(sink.contents().is_empty());

    sweeper.process_transfer(&transfer(&[2_400_000_000]));
    assert_eq!(String::from_utf8(sink.contents()).unwrap().lines().count(), 2);
}

#[test]
fn malformed_blocks_are_skipped_silently() {
    let sink = SharedBuf::default();
    let mut sweeper = text_sweeper(&sink);
    sweeper.start(0).unwrap();

    let mut buf = transfer(&[2_400_000_000, 2_420_000_000]);
    // Corrupt the second block's magic.
    buf[BYTES_PER_BLOCK] = 0x00;
    let status = sweeper.process_transfer(&buf);
    assert_eq!(status, TransferStatus::Continue);
    assert_eq!(String::from_utf8(sink.contents()).unwrap().lines().count(), 2);
}

#[test]
fn stop_is_observed_at_the_next_block() {
    let sink = SharedBuf::default();
    let mut sweeper = text_sweeper(&sink);
    sweeper.start(0).unwrap();

    sweeper.process_transfer(&transfer(&sweep_frequencies()));
    let before = sink.contents().len();

    sweeper.stop();
    sweeper.process_transfer(&transfer(&sweep_frequencies()));
    assert_eq!(sink.contents().len(), before);
    assert_eq!(sweeper.sweep_count(), 0, "stop resets counters");
}

#[test]
fn stopped_sweep_restarts_cleanly() {
    let sink = SharedBuf::default();
    let mut sweeper = text_sweeper(&sink);
    sweeper.start(0).unwrap();
    sweeper.process_transfer(&transfer(&sweep_frequencies()));
    sweeper.stop();

    sweeper.start(0).unwrap();
    assert!(!sweeper.is_exiting());
    let before = sink.contents().len();
    sweeper.process_transfer(&transfer(&sweep_frequencies()));
    assert!(sink.contents().len() > before, "pipeline runs again");
}

#[test]
fn configuration_order_is_enforced() {
    let mut sweeper = Sweeper::new(MockDevice::default(), 20_000_000, 20);
    assert!(matches!(
        sweeper.set_range(&[(2400, 2500)]),
        Err(SweepError::NotReady)
    ));
    assert!(matches!(sweeper.start(0), Err(SweepError::NotReady)));

    sweeper.set_output(OutputMode::Text, SinkTarget::Nop).unwrap();
    sweeper.set_range(&[(2400, 2500)]).unwrap();
    assert!(matches!(sweeper.start(0), Err(SweepError::NotReady)));

    sweeper
        .setup_fft(PlanStrategy::Estimate, Some(1_000_000))
        .unwrap();
    sweeper.start(0).unwrap();
}

#[test]
fn missing_sink_is_fatal_to_the_transport() {
    let sweeper = Sweeper::new(MockDevice::default(), 20_000_000, 20);
    let status = sweeper.process_transfer(&transfer(&[2_400_000_000]));
    assert_eq!(status, TransferStatus::Shutdown);
}

#[test]
fn write_mutex_is_first_setter_wins() {
    struct Counting(AtomicU32);
    impl WriteMutex for Counting {
        fn lock(&self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
        fn unlock(&self) {}
    }

    let mut sweeper = Sweeper::new(MockDevice::default(), 20_000_000, 20);
    let hooks = Arc::new(Counting(AtomicU32::new(0)));
    sweeper.set_write_mutex(hooks.clone()).unwrap();
    assert!(matches!(
        sweeper.set_write_mutex(Arc::new(Counting(AtomicU32::new(0)))),
        Err(SweepError::InvalidParam)
    ));

    // Control-side writers take the installed hooks.
    sweeper.set_output(OutputMode::Text, SinkTarget::Nop).unwrap();
    sweeper.stop();
    assert!(hooks.0.load(Ordering::SeqCst) >= 2);
}

#[test]
fn normalized_timestamp_is_stable_within_a_sweep() {
    let sink = SharedBuf::default();
    let mut sweeper = text_sweeper(&sink);
    sweeper.set_timestamp_normalization(true).unwrap();
    sweeper.start(0).unwrap();

    sweeper.process_transfer(&transfer(&sweep_frequencies()));
    // Same sweep continues in a second transfer (no start-of-range block).
    let more: Vec<u64> = (0..16).map(|i| 2_560_000_000 + i * 10_000_000).collect();
    sweeper.process_transfer(&transfer(&more));

    let text = String::from_utf8(sink.contents()).unwrap();
    let stamps: Vec<String> = text
        .lines()
        .map(|l| l.split(", ").take(2).collect::<Vec<_>>().join(", "))
        .collect();
    assert_eq!(stamps.len(), 64);
    assert!(
        stamps.iter().all(|s| *s == stamps[0]),
        "every record in the sweep shares one stamp"
    );
}

#[test]
fn set_sample_rate_is_not_supported() {
    let mut sweeper = Sweeper::new(MockDevice::default(), 20_000_000, 20);
    assert!(matches!(
        sweeper.set_sample_rate(10_000_000),
        Err(SweepError::Unsupported)
    ));
}

#[test]
fn close_releases_the_state() {
    let mut sweeper = text_sweeper(&SharedBuf::default());
    sweeper.start(0).unwrap();
    sweeper.close().unwrap();

    assert!(sweeper.device_mut().closed);
    assert!(matches!(
        sweeper.set_output(OutputMode::Text, SinkTarget::Nop),
        Err(SweepError::NotReady)
    ));
    assert!(matches!(sweeper.start(0), Err(SweepError::NotReady)));
}

#[test]
fn start_hands_the_program_to_the_peripheral() {
    let mut sweeper = text_sweeper(&SharedBuf::default());
    sweeper.start(0).unwrap();

    let device = sweeper.device_mut();
    assert!(device.streaming);
    assert_eq!(device.plans.len(), 1);
    let plan = &device.plans[0];
    assert_eq!(plan.freqs_mhz, vec![2400, 2500]);
    assert_eq!(plan.step_width_hz, 20_000_000);
    assert_eq!(plan.bytes_per_block, BYTES_PER_BLOCK as u32);
}
