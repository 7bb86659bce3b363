use std::sync::Arc;

use chrono::{DateTime, Local};
use rfs_sdr::{TransferStatus, BLOCK_HEADER_LEN, BLOCK_MAGIC, BYTES_PER_BLOCK};

use crate::callback::{CallbackCtl, FftFrame, FftReadyFn, RawBlockFn};
use crate::fft::{lower_bins, upper_bins, FftContext};
use crate::flags::{Finiteness, Lifecycle, Shared};
use crate::output::{Output, OutputMode};
use crate::program::{SweepProgram, FREQ_MAX_MHZ, FREQ_ONE_MHZ};
use crate::record;
use crate::sync::{WriteGuard, WriteMutex};

/// Decode a block header: magic bytes, then the tuned frequency in Hz.
fn block_frequency(block: &[u8]) -> Option<u64> {
    if block.len() < BLOCK_HEADER_LEN || block[..2] != BLOCK_MAGIC {
        return None;
    }
    let raw: [u8; 8] = block[2..BLOCK_HEADER_LEN].try_into().ok()?;
    Some(u64::from_le_bytes(raw))
}

/// Everything the receive pipeline owns while a sweep runs.
///
/// The control handle reaches in through a mutex for configuration; the
/// transfer context holds the lock for the duration of each transfer.
pub(crate) struct SweepCore {
    pub sample_rate_hz: u64,
    pub tune_step_mhz: u32,
    pub blocks_per_xfer: usize,
    pub program: SweepProgram,
    pub output: Option<Output>,
    pub fft: Option<FftContext>,
    pub raw_block_cb: Option<RawBlockFn>,
    pub fft_ready_cb: Option<FftReadyFn>,
    pub hooks: Option<Arc<dyn WriteMutex>>,
    pub shared: Arc<Shared>,
    pub finiteness: Finiteness,
    pub max_sweeps: u64,
    pub sweep_started: bool,
    pub normalized_timestamp: bool,
    pub timestamp: Option<DateTime<Local>>,
}

impl SweepCore {
    /// The receive pipeline: one call per USB transfer, with the valid
    /// bytes of the transfer buffer. `Shutdown` tells the transport to
    /// tear the stream down.
    pub fn process_transfer(&mut self, buffer: &[u8]) -> TransferStatus {
        if let Some(cb) = self.raw_block_cb.as_mut() {
            if cb(buffer) == CallbackCtl::Unsubscribe {
                let _g = WriteGuard::lock(&self.hooks);
                self.raw_block_cb = None;
            }
        }

        // Without a configured sink nothing downstream can consume records.
        if self.output.is_none() {
            return TransferStatus::Shutdown;
        }

        if self.shared.is_exiting() {
            return TransferStatus::Continue;
        }

        // One stamp per transfer, or one per sweep when normalized (the
        // per-sweep restamp happens at the boundary).
        if self.timestamp.is_none() || !self.normalized_timestamp {
            self.timestamp = Some(Local::now());
        }

        self.shared.add_bytes(buffer.len() as u64);

        let start_hz = self.program.start_frequency_hz();

        for block in buffer
            .chunks_exact(BYTES_PER_BLOCK)
            .take(self.blocks_per_xfer)
        {
            let Some(frequency) = block_frequency(block) else {
                // partial or synchronization block
                continue;
            };

            if frequency == start_hz {
                if self.sweep_started {
                    self.finish_sweep();
                }
                self.sweep_started = true;
            }

            if self.shared.is_exiting() || self.shared.lifecycle() == Lifecycle::Stopped {
                return TransferStatus::Continue;
            }
            if !self.sweep_started {
                continue;
            }
            if frequency > FREQ_MAX_MHZ as u64 * FREQ_ONE_MHZ {
                // the device should not emit this
                continue;
            }
            if self.shared.bypass_fft() {
                continue;
            }

            {
                let Some(fft) = self.fft.as_mut() else {
                    continue;
                };
                let span = 2 * fft.size();
                if span > block.len() {
                    continue;
                }
                fft.load_block(&block[block.len() - span..]);
                fft.execute_forward();
            }

            let timestamp = self.timestamp.unwrap_or_else(Local::now);

            let mut unsubscribe = false;
            if let (Some(cb), Some(fft)) = (self.fft_ready_cb.as_mut(), self.fft.as_ref()) {
                let frame = FftFrame {
                    frequency_hz: frequency,
                    bin_width: fft.bin_width(),
                    fft_size: fft.size(),
                    timestamp,
                    pwr: fft.pwr(),
                };
                unsubscribe = cb(&frame) == CallbackCtl::Unsubscribe;
            }
            if unsubscribe {
                let _g = WriteGuard::lock(&self.hooks);
                self.fft_ready_cb = None;
            }

            match self.output.as_ref().map(|o| o.mode) {
                Some(OutputMode::Binary) => self.emit_binary(frequency),
                Some(OutputMode::InverseFft) => {
                    if let Some(fft) = self.fft.as_mut() {
                        fft.assemble(frequency, start_hz);
                    }
                }
                Some(OutputMode::Text) => self.emit_text(frequency, &timestamp),
                None => {}
            }
        }

        TransferStatus::Continue
    }

    /// A full sweep just ended: flush the reconstructed stream in IFFT
    /// mode, bump the counter, restamp if normalized, and request exit
    /// when the configured number of sweeps is reached.
    fn finish_sweep(&mut self) {
        let ifft_mode = matches!(
            self.output.as_ref().map(|o| o.mode),
            Some(OutputMode::InverseFft)
        );
        if ifft_mode && !self.shared.bypass_fft() {
            let flushed = self.fft.as_mut().map(FftContext::run_inverse).unwrap_or(false);
            if flushed {
                if let (Some(fft), Some(output)) = (self.fft.as_ref(), self.output.as_mut()) {
                    if let Some(w) = output.writer() {
                        let _ = record::write_ifft_stream(w, fft.inverse_output());
                    }
                }
            }
        }

        let completed = self.shared.increment_sweeps();

        if self.normalized_timestamp {
            self.timestamp = Some(Local::now());
        }

        let done = match self.finiteness {
            Finiteness::OneShot => true,
            Finiteness::Finite(max) => completed >= max,
            Finiteness::Continuous => false,
        };
        if done {
            let _g = WriteGuard::lock(&self.hooks);
            self.shared.set_exiting(true);
        }
    }

    fn emit_text(&mut self, frequency: u64, timestamp: &DateTime<Local>) {
        let sample_rate = self.sample_rate_hz;
        let (Some(fft), Some(output)) = (self.fft.as_ref(), self.output.as_mut()) else {
            return;
        };
        let Some(w) = output.writer() else {
            return;
        };
        let n = fft.size();
        let pwr = fft.pwr();

        let (hz_low, hz_high) = record::lower_slice_bounds(frequency, sample_rate);
        let _ = record::write_text_record(
            w,
            timestamp,
            hz_low,
            hz_high,
            fft.bin_width(),
            n,
            &pwr[lower_bins(n)],
        );
        let (hz_low, hz_high) = record::upper_slice_bounds(frequency, sample_rate);
        let _ = record::write_text_record(
            w,
            timestamp,
            hz_low,
            hz_high,
            fft.bin_width(),
            n,
            &pwr[upper_bins(n)],
        );
    }

    fn emit_binary(&mut self, frequency: u64) {
        let sample_rate = self.sample_rate_hz;
        let (Some(fft), Some(output)) = (self.fft.as_ref(), self.output.as_mut()) else {
            return;
        };
        let Some(w) = output.writer() else {
            return;
        };
        let n = fft.size();
        let pwr = fft.pwr();

        let (hz_low, hz_high) = record::lower_slice_bounds(frequency, sample_rate);
        let _ = record::write_binary_record(w, hz_low, hz_high, &pwr[lower_bins(n)]);
        let (hz_low, hz_high) = record::upper_slice_bounds(frequency, sample_rate);
        let _ = record::write_binary_record(w, hz_low, hz_high, &pwr[upper_bins(n)]);
    }
}
