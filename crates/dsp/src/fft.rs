use num_complex::Complex32;
use rustfft::{Fft, FftDirection, FftPlanner};
use std::sync::Arc;

/// Planner effort requested by the caller.
///
/// rustfft selects its algorithm from the transform size alone, so the
/// strategy is advisory; it is kept on the plan for API parity with FFTW
/// style backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlanStrategy {
    Estimate,
    #[default]
    Measure,
    Patient,
    Exhaustive,
}

/// Convert one FFT bin to dB, with `scale` applied to both parts first.
///
/// Matches the usual sweep convention: `10 * log10(|c * scale|^2)`,
/// computed via log2. Zero magnitude yields `-inf`.
pub fn log_power(c: Complex32, scale: f32) -> f32 {
    let re = c.re * scale;
    let im = c.im * scale;
    let magsq = re * re + im * im;
    magsq.log2() * 10.0 / 10.0f32.log2()
}

/// Forward out-of-place FFT with a reusable scratch buffer.
///
/// Planned once for a fixed size; the plan is executed once at build time
/// so first real data does not pay plan-selection latency.
pub struct ForwardFft {
    fft: Arc<dyn Fft<f32>>,
    size: usize,
    strategy: PlanStrategy,
    scratch: Vec<Complex32>,
}

impl ForwardFft {
    pub fn new(size: usize, strategy: PlanStrategy) -> Self {
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft(size, FftDirection::Forward);
        let scratch_len = fft.get_outofplace_scratch_len();
        let mut this = Self {
            fft,
            size,
            strategy,
            scratch: vec![Complex32::new(0.0, 0.0); scratch_len],
        };
        // warm-up
        let mut input = vec![Complex32::new(0.0, 0.0); size];
        let mut output = vec![Complex32::new(0.0, 0.0); size];
        this.process(&mut input, &mut output);
        this
    }

    /// Transform `input` into `output`. `input` is clobbered as scratch.
    pub fn process(&mut self, input: &mut [Complex32], output: &mut [Complex32]) {
        debug_assert_eq!(input.len(), self.size);
        debug_assert_eq!(output.len(), self.size);
        self.fft
            .process_outofplace_with_scratch(input, output, &mut self.scratch);
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn strategy(&self) -> PlanStrategy {
        self.strategy
    }
}

/// Inverse FFT over a persistent assembly buffer.
///
/// `process` copies the caller's assembly buffer into an internal staging
/// buffer before executing, so the assembly survives across executions.
/// The output is unnormalized, as with FFTW's backward transform.
pub struct InverseFft {
    fft: Arc<dyn Fft<f32>>,
    size: usize,
    staging: Vec<Complex32>,
    scratch: Vec<Complex32>,
}

impl InverseFft {
    pub fn new(size: usize, _strategy: PlanStrategy) -> Self {
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft(size, FftDirection::Inverse);
        let scratch_len = fft.get_outofplace_scratch_len();
        let mut this = Self {
            fft,
            size,
            staging: vec![Complex32::new(0.0, 0.0); size],
            scratch: vec![Complex32::new(0.0, 0.0); scratch_len],
        };
        let mut output = vec![Complex32::new(0.0, 0.0); size];
        let input = vec![Complex32::new(0.0, 0.0); size];
        this.process(&input, &mut output);
        this
    }

    pub fn process(&mut self, input: &[Complex32], output: &mut [Complex32]) {
        debug_assert_eq!(input.len(), self.size);
        debug_assert_eq!(output.len(), self.size);
        self.staging.copy_from_slice(input);
        self.fft
            .process_outofplace_with_scratch(&mut self.staging, output, &mut self.scratch);
    }

    pub fn size(&self) -> usize {
        self.size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forward_dc() {
        let size = 64;
        let mut fft = ForwardFft::new(size, PlanStrategy::Estimate);

        // DC input (all ones) should give energy only in bin 0
        let mut input = vec![Complex32::new(1.0, 0.0); size];
        let mut output = vec![Complex32::new(0.0, 0.0); size];
        fft.process(&mut input, &mut output);

        assert!((output[0].norm() - size as f32).abs() < 0.01);
        for &val in &output[1..] {
            assert!(val.norm() < 0.01, "non-zero energy in non-DC bin: {}", val.norm());
        }
    }

    #[test]
    fn forward_single_tone() {
        let size = 64;
        let bin = 5;
        let mut fft = ForwardFft::new(size, PlanStrategy::Measure);

        let mut input: Vec<Complex32> = (0..size)
            .map(|n| {
                let phase = 2.0 * std::f32::consts::PI * bin as f32 * n as f32 / size as f32;
                Complex32::new(phase.cos(), phase.sin())
            })
            .collect();
        let mut output = vec![Complex32::new(0.0, 0.0); size];
        fft.process(&mut input, &mut output);

        let mut max_bin = 0;
        let mut max_mag = 0.0f32;
        for (i, val) in output.iter().enumerate() {
            if val.norm() > max_mag {
                max_mag = val.norm();
                max_bin = i;
            }
        }
        assert_eq!(max_bin, bin, "expected peak at bin {}, got {}", bin, max_bin);
    }

    #[test]
    fn inverse_round_trip() {
        let size = 20;
        let mut fwd = ForwardFft::new(size, PlanStrategy::Estimate);
        let mut inv = InverseFft::new(size, PlanStrategy::Estimate);

        let original: Vec<Complex32> = (0..size)
            .map(|i| Complex32::new(i as f32 * 0.1, -(i as f32) * 0.05))
            .collect();
        let mut spectrum = vec![Complex32::new(0.0, 0.0); size];
        let mut work = original.clone();
        fwd.process(&mut work, &mut spectrum);

        let mut restored = vec![Complex32::new(0.0, 0.0); size];
        inv.process(&spectrum, &mut restored);

        for (a, b) in original.iter().zip(restored.iter()) {
            // backward transform is unnormalized
            assert!((a.re - b.re / size as f32).abs() < 1e-4);
            assert!((a.im - b.im / size as f32).abs() < 1e-4);
        }
    }

    #[test]
    fn inverse_preserves_input() {
        let size = 16;
        let mut inv = InverseFft::new(size, PlanStrategy::Estimate);
        let input: Vec<Complex32> = (0..size)
            .map(|i| Complex32::new(i as f32, 0.0))
            .collect();
        let snapshot = input.clone();
        let mut output = vec![Complex32::new(0.0, 0.0); size];
        inv.process(&input, &mut output);
        assert_eq!(input, snapshot);
    }

    #[test]
    fn log_power_values() {
        // |1+0i| with unit scale -> 0 dB
        assert!(log_power(Complex32::new(1.0, 0.0), 1.0).abs() < 1e-5);
        // |10+0i| -> 20 dB
        assert!((log_power(Complex32::new(10.0, 0.0), 1.0) - 20.0).abs() < 1e-4);
        // zero magnitude -> -inf
        assert_eq!(log_power(Complex32::new(0.0, 0.0), 0.05), f32::NEG_INFINITY);
    }
}
