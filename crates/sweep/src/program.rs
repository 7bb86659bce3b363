use rfs_sdr::{TunePlan, BYTES_PER_BLOCK, SWEEP_OFFSET_HZ};

use crate::error::{SweepError, SweepResult};

/// One MHz in Hz.
pub const FREQ_ONE_MHZ: u64 = 1_000_000;

/// Lowest tunable frequency in MHz.
pub const FREQ_MIN_MHZ: u16 = 0;

/// Highest tunable frequency in MHz.
pub const FREQ_MAX_MHZ: u16 = 7250;

/// Maximum number of frequency ranges in one program.
pub const MAX_SWEEP_RANGES: usize = 10;

/// One validated frequency range with its derived tuning-step count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FreqRange {
    pub min_mhz: u16,
    pub max_mhz: u16,
    pub step_count: u32,
}

/// Validated list of frequency ranges the peripheral will visit in order.
///
/// After validation each range's upper bound is rounded up so the span is a
/// whole number of tuning steps, minimum one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweepProgram {
    ranges: Vec<FreqRange>,
}

fn make_range(min_mhz: u16, max_mhz: u16, tune_step_mhz: u32) -> FreqRange {
    let step = tune_step_mhz.max(1);
    // Signed math so min == max still yields one step.
    let span = max_mhz as i64 - min_mhz as i64;
    let step_count = (1 + (span - 1) / step as i64) as u32;
    FreqRange {
        min_mhz,
        max_mhz: (min_mhz as u32 + step_count * step).min(u16::MAX as u32) as u16,
        step_count,
    }
}

impl SweepProgram {
    /// Default program spanning the whole tunable spectrum.
    pub fn default_span(tune_step_mhz: u32) -> Self {
        Self {
            ranges: vec![make_range(FREQ_MIN_MHZ, FREQ_MAX_MHZ, tune_step_mhz)],
        }
    }

    /// Validate `pairs` and build a program. An empty list installs the
    /// default span. `single_range_only` enforces the IFFT restriction.
    pub fn new(
        pairs: &[(u16, u16)],
        tune_step_mhz: u32,
        single_range_only: bool,
    ) -> SweepResult<Self> {
        if pairs.is_empty() {
            return Ok(Self::default_span(tune_step_mhz));
        }
        if single_range_only && pairs.len() > 1 {
            return Err(SweepError::IncompatibleMode);
        }
        if pairs.len() > MAX_SWEEP_RANGES {
            return Err(SweepError::InvalidRangeCount);
        }

        let mut ranges = Vec::with_capacity(pairs.len());
        for &(min_mhz, max_mhz) in pairs {
            if min_mhz > max_mhz || max_mhz > FREQ_MAX_MHZ {
                return Err(SweepError::InvalidRange);
            }
            ranges.push(make_range(min_mhz, max_mhz, tune_step_mhz));
        }
        Ok(Self { ranges })
    }

    pub fn ranges(&self) -> &[FreqRange] {
        &self.ranges
    }

    /// Start of the first range in MHz; the sweep-boundary frequency.
    pub fn first_start_mhz(&self) -> u16 {
        self.ranges[0].min_mhz
    }

    /// Start of the first range in Hz.
    pub fn start_frequency_hz(&self) -> u64 {
        self.first_start_mhz() as u64 * FREQ_ONE_MHZ
    }

    /// Tuning-step count of the first range (the IFFT assembly span).
    pub fn step_count(&self) -> u32 {
        self.ranges[0].step_count
    }

    /// Flattened `[min, max, ...]` bounds for the peripheral.
    pub fn flatten(&self) -> Vec<u16> {
        let mut out = Vec::with_capacity(self.ranges.len() * 2);
        for r in &self.ranges {
            out.push(r.min_mhz);
            out.push(r.max_mhz);
        }
        out
    }

    /// Tuning plan handed to the peripheral at the start of a run.
    pub fn tune_plan(&self, tune_step_mhz: u32) -> TunePlan {
        let step_width_hz =
            u32::try_from(tune_step_mhz as u64 * FREQ_ONE_MHZ).unwrap_or(u32::MAX);
        TunePlan {
            freqs_mhz: self.flatten(),
            num_ranges: self.ranges.len(),
            bytes_per_block: BYTES_PER_BLOCK as u32,
            step_width_hz,
            offset_hz: SWEEP_OFFSET_HZ,
            interleaved: true,
        }
    }
}
