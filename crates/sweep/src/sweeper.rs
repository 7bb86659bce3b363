use std::sync::{Arc, Mutex, MutexGuard};

use rfs_dsp::PlanStrategy;
use rfs_sdr::{SweepDevice, TransferHandler, TransferStatus, BLOCKS_PER_TRANSFER};

use crate::callback::{FftReadyFn, RawBlockFn};
use crate::error::{SweepError, SweepResult};
use crate::fft::FftContext;
use crate::flags::{Finiteness, Lifecycle, Shared};
use crate::output::{Output, OutputMode, SinkTarget};
use crate::pipeline::SweepCore;
use crate::program::SweepProgram;
use crate::sync::{WriteGuard, WriteMutex};

/// Default sample rate: 20 Msps.
pub const DEFAULT_SAMPLE_RATE_HZ: u64 = 20_000_000;

/// Default tuning-step width: the full sample rate, in MHz.
pub const DEFAULT_TUNE_STEP_MHZ: u32 = 20;

fn lock_core(core: &Mutex<SweepCore>) -> MutexGuard<'_, SweepCore> {
    // A poisoned lock only means a callback panicked mid-transfer; the
    // state itself is still consistent at block granularity.
    core.lock().unwrap_or_else(|e| e.into_inner())
}

/// Clonable handle that requests a stop from any thread (for example a
/// signal handler). Stopping is cooperative: the pipeline exits at the
/// next block boundary.
#[derive(Clone)]
pub struct StopHandle {
    shared: Arc<Shared>,
    hooks: Option<Arc<dyn WriteMutex>>,
}

impl StopHandle {
    pub fn stop(&self) {
        let _g = WriteGuard::lock(&self.hooks);
        self.shared.set_exiting(true);
        self.shared.set_lifecycle(Lifecycle::Stopped);
        self.shared.reset_counters();
    }

    pub fn is_exiting(&self) -> bool {
        self.shared.is_exiting()
    }
}

/// The sweep engine: owns the peripheral, the signal-path state, and the
/// run lifecycle.
///
/// Configuration order is enforced: output before ranges, FFT setup before
/// `start`. A stopped sweep can be restarted without reconfiguration;
/// `close` releases everything and ends the state's life.
pub struct Sweeper<D: SweepDevice> {
    device: D,
    core: Arc<Mutex<SweepCore>>,
    shared: Arc<Shared>,
    released: bool,
}

impl<D: SweepDevice> Sweeper<D> {
    /// Initialize a sweep state over `device`. Zero parameters select the
    /// defaults (20 Msps, 20 MHz steps).
    pub fn new(device: D, sample_rate_hz: u64, tune_step_mhz: u32) -> Self {
        let sample_rate_hz = if sample_rate_hz == 0 {
            DEFAULT_SAMPLE_RATE_HZ
        } else {
            sample_rate_hz
        };
        let tune_step_mhz = if tune_step_mhz == 0 {
            DEFAULT_TUNE_STEP_MHZ
        } else {
            tune_step_mhz
        };
        let shared = Arc::new(Shared::new());
        let core = SweepCore {
            sample_rate_hz,
            tune_step_mhz,
            blocks_per_xfer: BLOCKS_PER_TRANSFER,
            program: SweepProgram::default_span(tune_step_mhz),
            output: None,
            fft: None,
            raw_block_cb: None,
            fft_ready_cb: None,
            hooks: None,
            shared: Arc::clone(&shared),
            finiteness: Finiteness::Continuous,
            max_sweeps: 0,
            sweep_started: false,
            normalized_timestamp: false,
            timestamp: None,
        };
        Self {
            device,
            core: Arc::new(Mutex::new(core)),
            shared,
            released: false,
        }
    }

    /// Initialize with the default sample rate and step width.
    pub fn with_defaults(device: D) -> Self {
        Self::new(device, DEFAULT_SAMPLE_RATE_HZ, DEFAULT_TUNE_STEP_MHZ)
    }

    fn ensure_live(&self) -> SweepResult<()> {
        if self.released {
            Err(SweepError::NotReady)
        } else {
            Ok(())
        }
    }

    /// Configure the sink. Must precede `set_range` so range validation can
    /// account for output-mode restrictions.
    pub fn set_output(&mut self, mode: OutputMode, target: SinkTarget) -> SweepResult<()> {
        self.ensure_live()?;
        let mut core = lock_core(&self.core);
        let hooks = core.hooks.clone();
        let _g = WriteGuard::lock(&hooks);
        core.output = Some(Output { mode, target });
        Ok(())
    }

    /// Validate and install the frequency program. An empty list installs
    /// the default full-spectrum range.
    pub fn set_range(&mut self, pairs: &[(u16, u16)]) -> SweepResult<()> {
        self.ensure_live()?;
        let mut core = lock_core(&self.core);
        let Some(output) = core.output.as_ref() else {
            return Err(SweepError::NotReady);
        };
        let single_range_only = output.mode == OutputMode::InverseFft;
        let program = SweepProgram::new(pairs, core.tune_step_mhz, single_range_only)?;
        let hooks = core.hooks.clone();
        let _g = WriteGuard::lock(&hooks);
        core.program = program;
        Ok(())
    }

    /// Build the FFT context for the current configuration. Rebuilding
    /// replaces the previous context.
    pub fn setup_fft(
        &mut self,
        strategy: PlanStrategy,
        requested_bin_width_hz: Option<u32>,
    ) -> SweepResult<()> {
        self.ensure_live()?;
        let mut core = lock_core(&self.core);
        let with_inverse = matches!(
            core.output.as_ref().map(|o| o.mode),
            Some(OutputMode::InverseFft)
        );
        let ctx = FftContext::build(
            core.sample_rate_hz,
            requested_bin_width_hz,
            core.program.step_count(),
            strategy,
            with_inverse,
        )?;
        core.fft = Some(ctx);
        Ok(())
    }

    /// Install the FFT-ready callback, fired once per processed block on
    /// the transfer thread.
    pub fn set_fft_rx_callback(&mut self, cb: FftReadyFn) -> SweepResult<()> {
        self.ensure_live()?;
        let mut core = lock_core(&self.core);
        let hooks = core.hooks.clone();
        let _g = WriteGuard::lock(&hooks);
        core.fft_ready_cb = Some(cb);
        Ok(())
    }

    /// Install the raw transfer callback. `bypass` additionally disables
    /// all FFT-derived processing and outputs.
    pub fn set_raw_sample_rx_callback(&mut self, cb: RawBlockFn, bypass: bool) -> SweepResult<()> {
        self.ensure_live()?;
        let mut core = lock_core(&self.core);
        let hooks = core.hooks.clone();
        let _g = WriteGuard::lock(&hooks);
        core.raw_block_cb = Some(cb);
        self.shared.set_bypass_fft(bypass);
        Ok(())
    }

    /// Install the opaque write mutex. First setter wins; a second attempt
    /// is rejected.
    pub fn set_write_mutex(&mut self, hooks: Arc<dyn WriteMutex>) -> SweepResult<()> {
        self.ensure_live()?;
        let mut core = lock_core(&self.core);
        if core.hooks.is_some() {
            return Err(SweepError::InvalidParam);
        }
        core.hooks = Some(hooks);
        Ok(())
    }

    /// Changing the sample rate of a built state would require rebuilding
    /// the FFT plans; not supported while configured.
    pub fn set_sample_rate(&mut self, _sample_rate_hz: u64) -> SweepResult<()> {
        Err(SweepError::Unsupported)
    }

    /// Number of blocks processed out of each transfer. Rarely useful.
    pub fn set_blocks_per_xfer(&mut self, blocks: usize) -> SweepResult<()> {
        self.ensure_live()?;
        lock_core(&self.core).blocks_per_xfer = blocks;
        Ok(())
    }

    /// When enabled, every record within one sweep carries the same
    /// wall-clock timestamp (stamped at each sweep boundary).
    pub fn set_timestamp_normalization(&mut self, normalized: bool) -> SweepResult<()> {
        self.ensure_live()?;
        lock_core(&self.core).normalized_timestamp = normalized;
        Ok(())
    }

    /// Start sweeping. `max_sweeps` of zero runs until stopped; one runs a
    /// single sweep; any other value runs that many sweeps.
    ///
    /// A running sweep is stopped and restarted with the current
    /// configuration. Counters reset on every start.
    pub fn start(&mut self, max_sweeps: u64) -> SweepResult<()> {
        self.ensure_live()?;

        if self.shared.lifecycle() == Lifecycle::Running {
            let mut core = lock_core(&self.core);
            let hooks = core.hooks.clone();
            let _g = WriteGuard::lock(&hooks);
            self.shared.set_lifecycle(Lifecycle::Stopped);
            core.sweep_started = false;
        }

        let plan = {
            let mut core = lock_core(&self.core);
            if core.fft.is_none() {
                return Err(SweepError::NotReady);
            }
            let hooks = core.hooks.clone();
            let _g = WriteGuard::lock(&hooks);
            core.finiteness = match max_sweeps {
                0 => Finiteness::Continuous,
                1 => Finiteness::OneShot,
                n => Finiteness::Finite(n),
            };
            core.max_sweeps = max_sweeps;
            core.sweep_started = false;
            self.shared.reset_counters();
            core.program.tune_plan(core.tune_step_mhz)
        };

        self.device.init_sweep(&plan)?;

        {
            let core = lock_core(&self.core);
            let hooks = core.hooks.clone();
            let _g = WriteGuard::lock(&hooks);
            self.shared.set_exiting(false);
            self.shared.set_lifecycle(Lifecycle::Running);
        }

        let core = Arc::clone(&self.core);
        let handler: TransferHandler =
            Box::new(move |buffer| lock_core(&core).process_transfer(buffer));

        if let Err(e) = self.device.start_rx_sweep(handler) {
            self.shared.set_lifecycle(Lifecycle::Stopped);
            return Err(e.into());
        }
        Ok(())
    }

    /// Request a cooperative stop. The pipeline exits at the next block
    /// boundary; counters reset.
    pub fn stop(&self) {
        self.stop_handle().stop();
    }

    /// Handle for stopping from another thread.
    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            shared: Arc::clone(&self.shared),
            hooks: lock_core(&self.core).hooks.clone(),
        }
    }

    /// Stop, release the FFT context, clear callbacks and mutex hooks, and
    /// close the peripheral. The state is unusable afterwards; use `stop`
    /// when re-runs are intended.
    pub fn close(&mut self) -> SweepResult<()> {
        self.ensure_live()?;
        self.stop();

        {
            let mut core = lock_core(&self.core);
            let hooks = core.hooks.clone();
            {
                let _g = WriteGuard::lock(&hooks);
                core.fft = None;
                core.raw_block_cb = None;
                core.fft_ready_cb = None;
            }
            core.hooks = None;
        }

        self.device.close()?;
        self.released = true;
        Ok(())
    }

    /// Entry point for the transfer context; exposed so hosts with their
    /// own transport (or tests) can drive the pipeline directly.
    pub fn process_transfer(&self, buffer: &[u8]) -> TransferStatus {
        lock_core(&self.core).process_transfer(buffer)
    }

    /// Completed sweeps in the current run.
    pub fn sweep_count(&self) -> u64 {
        self.shared.sweep_count()
    }

    /// The sweep bound handed to the last `start` (zero for continuous).
    pub fn max_sweeps(&self) -> u64 {
        lock_core(&self.core).max_sweeps
    }

    /// Bytes transferred in the current run.
    pub fn byte_count(&self) -> u64 {
        self.shared.byte_count()
    }

    /// Reset the byte counter (the statistics loop does this each second).
    pub fn reset_byte_count(&self) {
        self.shared.reset_byte_count()
    }

    pub fn is_exiting(&self) -> bool {
        self.shared.is_exiting()
    }

    pub fn is_streaming(&self) -> bool {
        self.device.is_streaming()
    }

    /// The installed frequency program.
    pub fn program(&self) -> SweepProgram {
        lock_core(&self.core).program.clone()
    }

    /// Transform size of the built FFT context, when one exists.
    pub fn fft_size(&self) -> Option<usize> {
        lock_core(&self.core).fft.as_ref().map(|f| f.size())
    }

    /// Bin width of the built FFT context, when one exists.
    pub fn bin_width(&self) -> Option<f64> {
        lock_core(&self.core).fft.as_ref().map(|f| f.bin_width())
    }

    pub fn sample_rate_hz(&self) -> u64 {
        lock_core(&self.core).sample_rate_hz
    }

    /// Access to the owned peripheral, for backend-specific settings.
    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }
}
