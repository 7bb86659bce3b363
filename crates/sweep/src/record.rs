use std::io::{self, Write};

use byteorder::{LittleEndian, WriteBytesExt};
use chrono::{DateTime, Local};
use num_complex::Complex32;

/// Band edges of the lower slice: `[f, f + sr/4)`.
pub fn lower_slice_bounds(frequency_hz: u64, sample_rate_hz: u64) -> (u64, u64) {
    (frequency_hz, frequency_hz + sample_rate_hz / 4)
}

/// Band edges of the upper slice: `[f + sr/2, f + 3*sr/4)`.
pub fn upper_slice_bounds(frequency_hz: u64, sample_rate_hz: u64) -> (u64, u64) {
    (
        frequency_hz + sample_rate_hz / 2,
        frequency_hz + sample_rate_hz * 3 / 4,
    )
}

/// Timestamp layout shared by every text record.
pub const TEXT_TIMESTAMP_FORMAT: &str = "%Y-%m-%d, %H:%M:%S%.6f";

/// One tabulated line:
/// `date, time, hz_low, hz_high, bin_width, fft_size, p0, p1, ...`
/// with two decimal places for the bin width and each power.
pub fn write_text_record<W: Write + ?Sized>(
    w: &mut W,
    timestamp: &DateTime<Local>,
    hz_low: u64,
    hz_high: u64,
    bin_width: f64,
    fft_size: usize,
    pwr: &[f32],
) -> io::Result<()> {
    write!(
        w,
        "{}, {}, {}, {:.2}, {}",
        timestamp.format(TEXT_TIMESTAMP_FORMAT),
        hz_low,
        hz_high,
        bin_width,
        fft_size
    )?;
    for p in pwr {
        write!(w, ", {:.2}", p)?;
    }
    writeln!(w)
}

/// One length-prefixed binary record:
/// `u32 record_length | u64 hz_low | u64 hz_high | f32 pwr[..]`, little-endian,
/// `record_length = 16 + 4 * pwr.len()`.
pub fn write_binary_record<W: Write + ?Sized>(
    w: &mut W,
    hz_low: u64,
    hz_high: u64,
    pwr: &[f32],
) -> io::Result<()> {
    let record_length = (2 * std::mem::size_of::<u64>() + pwr.len() * std::mem::size_of::<f32>()) as u32;
    w.write_u32::<LittleEndian>(record_length)?;
    w.write_u64::<LittleEndian>(hz_low)?;
    w.write_u64::<LittleEndian>(hz_high)?;
    for p in pwr {
        w.write_f32::<LittleEndian>(*p)?;
    }
    Ok(())
}

/// Binary record as an owned buffer, for publishers that frame messages.
pub fn binary_record(hz_low: u64, hz_high: u64, pwr: &[f32]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(4 + 16 + pwr.len() * 4);
    // Vec<u8> writes cannot fail
    let _ = write_binary_record(&mut buf, hz_low, hz_high, pwr);
    buf
}

/// The reconstructed wideband stream for one sweep: interleaved
/// little-endian f32 pairs, `2 * bins.len()` values.
pub fn write_ifft_stream<W: Write + ?Sized>(w: &mut W, bins: &[Complex32]) -> io::Result<()> {
    for c in bins {
        w.write_f32::<LittleEndian>(c.re)?;
        w.write_f32::<LittleEndian>(c.im)?;
    }
    Ok(())
}
