use chrono::{DateTime, Local};

/// Returned by user callbacks to stay subscribed or unsubscribe.
///
/// `Unsubscribe` clears only the returning callback; the sweep keeps
/// running. Reinstall the callback to resume delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackCtl {
    Continue,
    Unsubscribe,
}

/// Borrowed view of one tuning step's freshly computed spectrum, handed to
/// the FFT-ready callback on the transfer thread.
#[derive(Debug)]
pub struct FftFrame<'a> {
    /// Center frequency the peripheral reported for this block, in Hz.
    pub frequency_hz: u64,
    /// Frequency resolution, `sample_rate / fft_size`.
    pub bin_width: f64,
    pub fft_size: usize,
    /// Transfer timestamp the matching records carry.
    pub timestamp: DateTime<Local>,
    /// Full power spectrum in dB, `fft_size` bins.
    pub pwr: &'a [f32],
}

/// Raw transfer callback: receives the valid bytes of every transfer
/// before any processing.
pub type RawBlockFn = Box<dyn FnMut(&[u8]) -> CallbackCtl + Send>;

/// FFT-ready callback: fires once per processed block.
pub type FftReadyFn = Box<dyn FnMut(&FftFrame<'_>) -> CallbackCtl + Send>;
