use num_complex::Complex32;
use rfs_dsp::{hann, log_power, ForwardFft, InverseFft, PlanStrategy};

use crate::error::{SweepError, SweepResult};

/// Smallest usable transform size (bin width of a quarter sample rate).
pub const FFT_MIN_SIZE: usize = 4;

/// Largest transform size that still fits the sample run of one block.
pub const FFT_MAX_SIZE: usize = 8180;

/// Transform size seeded when no bin width is requested.
const FFT_DEFAULT_SIZE: usize = 20;

/// Bins of the lower quarter-band slice, covering `[f, f + sr/4)`.
pub fn lower_bins(size: usize) -> std::ops::Range<usize> {
    let start = 1 + size * 5 / 8;
    start..start + size / 4
}

/// Bins of the upper quarter-band slice, covering `[f + sr/2, f + 3*sr/4)`.
pub fn upper_bins(size: usize) -> std::ops::Range<usize> {
    let start = 1 + size / 8;
    start..start + size / 4
}

/// Positions of a step's two slices within the inverse assembly buffer.
///
/// `start_hz` is the first range's start frequency; the returned pair is
/// `(lower_start, upper_start)`, each the base of an `size/4` run inside
/// the length-`size * step_count` buffer.
pub fn assembly_indices(
    size: usize,
    step_count: u32,
    frequency_hz: u64,
    start_hz: u64,
    bin_width: f64,
) -> (usize, usize) {
    let bins = size * step_count as usize;
    let idx = ((frequency_hz.saturating_sub(start_hz)) as f64 / bin_width).round() as usize;
    let lower = (idx + bins / 2) % bins;
    let upper = (lower + size / 2) % bins;
    (lower, upper)
}

struct InverseAssembly {
    plan: InverseFft,
    input: Vec<Complex32>,
    output: Vec<Complex32>,
}

/// Transform plan, window, and working buffers for one configuration.
///
/// Sized once at setup; the receive pipeline is the only accessor while a
/// sweep runs. The inverse half exists only for the IFFT output mode.
pub struct FftContext {
    size: usize,
    bin_width: f64,
    strategy: PlanStrategy,
    window: Vec<f32>,
    fwd_in: Vec<Complex32>,
    fwd_out: Vec<Complex32>,
    pwr: Vec<f32>,
    forward: ForwardFft,
    inverse: Option<InverseAssembly>,
}

impl FftContext {
    /// Derive the transform size from the requested bin width and allocate
    /// plans and buffers. `with_inverse` additionally sizes the length
    /// `size * step_count` assembly buffers and the backward plan.
    pub fn build(
        sample_rate_hz: u64,
        requested_bin_width_hz: Option<u32>,
        step_count: u32,
        strategy: PlanStrategy,
        with_inverse: bool,
    ) -> SweepResult<Self> {
        let mut size = match requested_bin_width_hz {
            Some(0) | None => FFT_DEFAULT_SIZE,
            Some(w) => (sample_rate_hz / w as u64) as usize,
        };

        // Bin width is capped at a quarter of the sample rate, and the bin
        // count at the samples available in one block.
        if size < FFT_MIN_SIZE || size > FFT_MAX_SIZE {
            return Err(SweepError::InvalidFftSize);
        }

        // Interleaved slice selection needs the bin count to be an odd
        // multiple of four (4, 12, 20, 28, ...).
        while (size + 4) % 8 != 0 {
            size += 1;
        }

        let bin_width = sample_rate_hz as f64 / size as f64;

        let inverse = if with_inverse {
            let bins = size * step_count as usize;
            Some(InverseAssembly {
                plan: InverseFft::new(bins, strategy),
                input: vec![Complex32::new(0.0, 0.0); bins],
                output: vec![Complex32::new(0.0, 0.0); bins],
            })
        } else {
            None
        };

        Ok(Self {
            size,
            bin_width,
            strategy,
            window: hann(size),
            fwd_in: vec![Complex32::new(0.0, 0.0); size],
            fwd_out: vec![Complex32::new(0.0, 0.0); size],
            pwr: vec![0.0; size],
            forward: ForwardFft::new(size, strategy),
            inverse,
        })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn bin_width(&self) -> f64 {
        self.bin_width
    }

    pub fn strategy(&self) -> PlanStrategy {
        self.strategy
    }

    pub fn has_inverse(&self) -> bool {
        self.inverse.is_some()
    }

    /// Power spectrum of the most recent block, in dB.
    pub fn pwr(&self) -> &[f32] {
        &self.pwr
    }

    /// Window and scale one block's interleaved signed 8-bit IQ samples
    /// into the forward input buffer.
    pub fn load_block(&mut self, samples: &[u8]) {
        for i in 0..self.size {
            let re = samples[2 * i] as i8 as f32;
            let im = samples[2 * i + 1] as i8 as f32;
            self.fwd_in[i] = Complex32::new(
                re * self.window[i] / 128.0,
                im * self.window[i] / 128.0,
            );
        }
    }

    /// Run the forward transform and refresh the power spectrum.
    pub fn execute_forward(&mut self) {
        self.forward.process(&mut self.fwd_in, &mut self.fwd_out);
        let scale = 1.0 / self.size as f32;
        for (p, c) in self.pwr.iter_mut().zip(self.fwd_out.iter()) {
            *p = log_power(*c, scale);
        }
    }

    /// Copy the current step's two slices into the inverse assembly buffer
    /// at the positions derived from the step's center frequency.
    pub fn assemble(&mut self, frequency_hz: u64, start_hz: u64) {
        let Some(inv) = self.inverse.as_mut() else {
            return;
        };
        let bins = inv.input.len();
        if bins == 0 {
            return;
        }
        let (lower, upper) =
            assembly_indices(self.size, (bins / self.size) as u32, frequency_hz, start_hz, self.bin_width);
        let quarter = self.size / 4;
        if lower + quarter <= bins {
            inv.input[lower..lower + quarter].copy_from_slice(&self.fwd_out[lower_bins(self.size)]);
        }
        if upper + quarter <= bins {
            inv.input[upper..upper + quarter].copy_from_slice(&self.fwd_out[upper_bins(self.size)]);
        }
    }

    /// Execute the inverse transform over the assembled sweep and normalize
    /// by the bin count. Returns false when no inverse half was built.
    pub fn run_inverse(&mut self) -> bool {
        let Some(inv) = self.inverse.as_mut() else {
            return false;
        };
        if inv.input.is_empty() {
            return false;
        }
        inv.plan.process(&inv.input, &mut inv.output);
        let scale = 1.0 / inv.output.len() as f32;
        for c in inv.output.iter_mut() {
            *c *= scale;
        }
        true
    }

    /// Reconstructed wideband samples from the last `run_inverse`.
    pub fn inverse_output(&self) -> &[Complex32] {
        self.inverse.as_ref().map(|i| i.output.as_slice()).unwrap_or(&[])
    }
}
