pub mod fft;
pub mod window;

pub use fft::{log_power, ForwardFft, InverseFft, PlanStrategy};
pub use window::hann;
