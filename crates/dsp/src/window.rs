use std::f64::consts::PI;

/// Generate Hann window coefficients.
///
/// `w[i] = 0.5 * (1 - cos(2*pi*i / (n - 1)))`, the symmetric form.
pub fn hann(n: usize) -> Vec<f32> {
    if n < 2 {
        return vec![1.0; n];
    }
    let denom = (n - 1) as f64;
    (0..n)
        .map(|i| (0.5 * (1.0 - (2.0 * PI * i as f64 / denom).cos())) as f32)
        .collect()
}
