// Copyright 2025-2026 CEMAXECUTER LLC

use std::ffi::CString;
use std::os::raw::{c_char, c_int, c_void};
use std::ptr;

use crate::{DeviceError, SweepDevice, TransferHandler, TransferStatus, TunePlan};

const HACKRF_SUCCESS: c_int = 0;
const HACKRF_TRUE: c_int = 1;
const SWEEP_STYLE_INTERLEAVED: c_int = 1;

#[repr(C)]
pub struct HackrfTransfer {
    pub device: *mut c_void,
    pub buffer: *mut u8,
    pub buffer_length: i32,
    pub valid_length: i32,
    pub rx_ctx: *mut c_void,
    pub tx_ctx: *mut c_void,
}

type HackrfDevice = c_void;

extern "C" {
    fn hackrf_init() -> c_int;
    fn hackrf_exit() -> c_int;
    fn hackrf_open(device: *mut *mut HackrfDevice) -> c_int;
    fn hackrf_open_by_serial(
        desired_serial_number: *const c_char,
        device: *mut *mut HackrfDevice,
    ) -> c_int;
    fn hackrf_close(device: *mut HackrfDevice) -> c_int;
    fn hackrf_set_sample_rate_manual(
        device: *mut HackrfDevice,
        freq_hz: u32,
        divider: u32,
    ) -> c_int;
    fn hackrf_set_baseband_filter_bandwidth(
        device: *mut HackrfDevice,
        bandwidth_hz: u32,
    ) -> c_int;
    fn hackrf_set_lna_gain(device: *mut HackrfDevice, value: u32) -> c_int;
    fn hackrf_set_vga_gain(device: *mut HackrfDevice, value: u32) -> c_int;
    fn hackrf_set_amp_enable(device: *mut HackrfDevice, value: u8) -> c_int;
    fn hackrf_set_antenna_enable(device: *mut HackrfDevice, value: u8) -> c_int;
    fn hackrf_init_sweep(
        device: *mut HackrfDevice,
        frequency_list: *const u16,
        num_ranges: c_int,
        num_bytes: u32,
        step_width: u32,
        offset: u32,
        style: c_int,
    ) -> c_int;
    fn hackrf_start_rx_sweep(
        device: *mut HackrfDevice,
        callback: unsafe extern "C" fn(*mut HackrfTransfer) -> c_int,
        rx_ctx: *mut c_void,
    ) -> c_int;
    fn hackrf_stop_rx(device: *mut HackrfDevice) -> c_int;
    fn hackrf_is_streaming(device: *mut HackrfDevice) -> c_int;
}

fn check(call: &'static str, code: c_int) -> Result<(), DeviceError> {
    if code == HACKRF_SUCCESS {
        Ok(())
    } else {
        Err(DeviceError::Ffi { call, code })
    }
}

unsafe extern "C" fn sweep_rx_trampoline(transfer: *mut HackrfTransfer) -> c_int {
    let handler = &mut *((*transfer).rx_ctx as *mut TransferHandler);
    let valid = (*transfer).valid_length as usize;
    let buf = std::slice::from_raw_parts((*transfer).buffer, valid);

    match handler(buf) {
        TransferStatus::Continue => 0,
        TransferStatus::Shutdown => -1,
    }
}

/// HackRF sweep backend over the libhackrf C API.
pub struct HackrfSweepDevice {
    dev: *mut HackrfDevice,
    // Boxed handler leaked to the transport for the lifetime of a run.
    ctx: Option<*mut TransferHandler>,
}

// Single owner; libhackrf serializes access to the device pointer.
unsafe impl Send for HackrfSweepDevice {}

impl HackrfSweepDevice {
    /// Open a HackRF, optionally by serial number, and apply the RX chain
    /// settings the sweep engine expects.
    pub fn open(
        serial: Option<&str>,
        sample_rate_hz: u32,
        baseband_filter_hz: u32,
        lna_gain: u32,
        vga_gain: u32,
    ) -> Result<Self, DeviceError> {
        unsafe {
            check("hackrf_init", hackrf_init())?;

            let mut dev: *mut HackrfDevice = ptr::null_mut();
            let r = match serial {
                Some(s) => {
                    let cs = CString::new(s)
                        .map_err(|_| DeviceError::NotFound(s.to_string()))?;
                    hackrf_open_by_serial(cs.as_ptr(), &mut dev)
                }
                None => hackrf_open(&mut dev),
            };
            if r != HACKRF_SUCCESS {
                hackrf_exit();
                return Err(DeviceError::Ffi {
                    call: "hackrf_open",
                    code: r,
                });
            }

            log::info!("HackRF opened (serial={:?})", serial);

            let setup = check(
                "hackrf_set_sample_rate_manual",
                hackrf_set_sample_rate_manual(dev, sample_rate_hz, 1),
            )
            .and_then(|_| {
                check(
                    "hackrf_set_baseband_filter_bandwidth",
                    hackrf_set_baseband_filter_bandwidth(dev, baseband_filter_hz),
                )
            })
            .and_then(|_| check("hackrf_set_lna_gain", hackrf_set_lna_gain(dev, lna_gain)))
            .and_then(|_| check("hackrf_set_vga_gain", hackrf_set_vga_gain(dev, vga_gain)));

            if let Err(e) = setup {
                hackrf_close(dev);
                hackrf_exit();
                return Err(e);
            }

            Ok(Self { dev, ctx: None })
        }
    }

    /// Toggle the front-end RF amplifier.
    pub fn set_amp_enable(&mut self, enable: bool) -> Result<(), DeviceError> {
        unsafe {
            check(
                "hackrf_set_amp_enable",
                hackrf_set_amp_enable(self.dev, enable as u8),
            )
        }
    }

    /// Toggle antenna-port power.
    pub fn set_antenna_enable(&mut self, enable: bool) -> Result<(), DeviceError> {
        unsafe {
            check(
                "hackrf_set_antenna_enable",
                hackrf_set_antenna_enable(self.dev, enable as u8),
            )
        }
    }

    fn release_ctx(&mut self) {
        if let Some(ctx) = self.ctx.take() {
            unsafe {
                hackrf_stop_rx(self.dev);
                drop(Box::from_raw(ctx));
            }
        }
    }
}

impl SweepDevice for HackrfSweepDevice {
    fn init_sweep(&mut self, plan: &TunePlan) -> Result<(), DeviceError> {
        let style = if plan.interleaved {
            SWEEP_STYLE_INTERLEAVED
        } else {
            0
        };
        unsafe {
            check(
                "hackrf_init_sweep",
                hackrf_init_sweep(
                    self.dev,
                    plan.freqs_mhz.as_ptr(),
                    plan.num_ranges as c_int,
                    plan.bytes_per_block,
                    plan.step_width_hz,
                    plan.offset_hz,
                    style,
                ),
            )
        }
    }

    fn start_rx_sweep(&mut self, handler: TransferHandler) -> Result<(), DeviceError> {
        // A leftover handler from a previous run is stopped first.
        self.release_ctx();

        let ctx = Box::into_raw(Box::new(handler));
        unsafe {
            let r = hackrf_start_rx_sweep(self.dev, sweep_rx_trampoline, ctx as *mut c_void);
            if r != HACKRF_SUCCESS {
                drop(Box::from_raw(ctx));
                return Err(DeviceError::Ffi {
                    call: "hackrf_start_rx_sweep",
                    code: r,
                });
            }
        }
        self.ctx = Some(ctx);
        Ok(())
    }

    fn is_streaming(&self) -> bool {
        !self.dev.is_null() && unsafe { hackrf_is_streaming(self.dev) == HACKRF_TRUE }
    }

    fn close(&mut self) -> Result<(), DeviceError> {
        self.release_ctx();
        if !self.dev.is_null() {
            unsafe {
                let r = hackrf_close(self.dev);
                hackrf_exit();
                self.dev = ptr::null_mut();
                check("hackrf_close", r)?;
            }
        }
        Ok(())
    }
}

impl Drop for HackrfSweepDevice {
    fn drop(&mut self) {
        let _ = self.close();
    }
}
