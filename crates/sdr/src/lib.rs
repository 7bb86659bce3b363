// Copyright 2025-2026 CEMAXECUTER LLC

#[cfg(feature = "hackrf")]
pub mod hackrf;

use thiserror::Error;

/// Size of one framed block within a USB transfer, in bytes.
///
/// Each block starts with a 10-byte header (two magic bytes plus the tuned
/// center frequency) and is padded with IQ samples up to this size.
pub const BYTES_PER_BLOCK: usize = 16384;

/// Number of blocks the peripheral packs into a single transfer.
pub const BLOCKS_PER_TRANSFER: usize = 16;

/// Length of the per-block header: `[0x7F, 0x7F]` + little-endian u64 Hz.
pub const BLOCK_HEADER_LEN: usize = 10;

/// Magic bytes opening every well-formed block.
pub const BLOCK_MAGIC: [u8; 2] = [0x7F, 0x7F];

/// LO offset applied by the peripheral during sweep tuning, in Hz.
pub const SWEEP_OFFSET_HZ: u32 = 7_500_000;

/// Baseband filter bandwidth applied at device bring-up, in Hz.
pub const DEFAULT_BASEBAND_FILTER_HZ: u32 = 15_000_000;

/// Errors reported by a sweep peripheral backend.
#[derive(Error, Debug)]
pub enum DeviceError {
    /// A peripheral library call failed with its native error code.
    #[error("{call} failed ({code})")]
    Ffi { call: &'static str, code: i32 },

    /// The requested device could not be matched.
    #[error("no device matching '{0}'")]
    NotFound(String),

    /// The backend was built without hardware support.
    #[error("built without support for {0}")]
    Unsupported(&'static str),
}

impl DeviceError {
    /// Native error code for callers that interoperate with the C library.
    pub fn code(&self) -> i32 {
        match self {
            DeviceError::Ffi { code, .. } => *code,
            DeviceError::NotFound(_) => -5,
            DeviceError::Unsupported(_) => -9999,
        }
    }
}

/// Status a transfer handler returns to the peripheral.
///
/// `Shutdown` maps to a non-zero callback return, which makes the transport
/// tear down the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferStatus {
    Continue,
    Shutdown,
}

/// Tuning plan handed to the peripheral when a sweep run starts.
#[derive(Debug, Clone)]
pub struct TunePlan {
    /// Flattened `[min, max, min, max, ...]` bounds in MHz.
    pub freqs_mhz: Vec<u16>,
    /// Number of `[min, max]` pairs in `freqs_mhz`.
    pub num_ranges: usize,
    /// Bytes the peripheral packs into each block.
    pub bytes_per_block: u32,
    /// Width of one tuning step in Hz.
    pub step_width_hz: u32,
    /// LO offset in Hz.
    pub offset_hz: u32,
    /// Interleaved sweep style (the only style the engine consumes).
    pub interleaved: bool,
}

/// Handler invoked for every transfer, with the valid bytes of the buffer.
pub type TransferHandler = Box<dyn FnMut(&[u8]) -> TransferStatus + Send>;

/// Contract between the sweep engine and a peripheral backend.
///
/// The backend owns the transport thread: after `start_rx_sweep` the handler
/// is invoked from that context until it returns `Shutdown`, the stream
/// starves, or `close` is called. `is_streaming` is safe to poll from the
/// control thread.
pub trait SweepDevice: Send {
    /// Program the peripheral with the tuning plan for the next run.
    fn init_sweep(&mut self, plan: &TunePlan) -> Result<(), DeviceError>;

    /// Begin delivering transfers to `handler`.
    fn start_rx_sweep(&mut self, handler: TransferHandler) -> Result<(), DeviceError>;

    /// Whether the transport is still delivering transfers.
    fn is_streaming(&self) -> bool;

    /// Release the peripheral. Further calls are invalid.
    fn close(&mut self) -> Result<(), DeviceError>;
}
