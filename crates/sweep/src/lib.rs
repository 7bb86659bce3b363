// Copyright 2025-2026 CEMAXECUTER LLC

//! Continuous wideband spectrum sweep engine.
//!
//! Drives a sweep-capable SDR peripheral through a programmed sequence of
//! tuning steps, converts each delivered block into a power spectrum, and
//! emits tabulated records, packed binary records, or a reconstructed
//! wideband inverse-FFT stream through a pluggable sink. The peripheral
//! transport and the FFT kernel are external collaborators; see `rfs-sdr`
//! and `rfs-dsp`.

pub mod callback;
pub mod error;
pub mod fft;
pub mod output;
pub mod program;
pub mod record;
pub mod sweeper;
pub mod sync;

mod flags;
mod pipeline;

pub use callback::{CallbackCtl, FftFrame, FftReadyFn, RawBlockFn};
pub use error::{SweepError, SweepResult};
pub use fft::{FftContext, FFT_MAX_SIZE, FFT_MIN_SIZE};
pub use flags::{Finiteness, Lifecycle};
pub use output::{OutputMode, SinkTarget};
pub use program::{
    FreqRange, SweepProgram, FREQ_MAX_MHZ, FREQ_MIN_MHZ, FREQ_ONE_MHZ, MAX_SWEEP_RANGES,
};
pub use sweeper::{StopHandle, Sweeper, DEFAULT_SAMPLE_RATE_HZ, DEFAULT_TUNE_STEP_MHZ};
pub use sync::{NopWriteMutex, WriteMutex};

pub use rfs_dsp::PlanStrategy;
pub use rfs_sdr::{
    DeviceError, SweepDevice, TransferHandler, TransferStatus, TunePlan, BLOCKS_PER_TRANSFER,
    BYTES_PER_BLOCK,
};
