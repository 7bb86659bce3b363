//! Publish sweep records over ZMQ instead of writing them to a file.
//!
//! The FFT-ready callback runs on the transfer thread, so records are
//! handed to a bounded channel and a consumer thread does the socket work.

use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "rfsweep-zmqpub")]
#[command(about = "Wideband spectrum sweep publishing to a ZMQ collector")]
struct Cli {
    /// Serial number of the desired device
    #[arg(short = 'd', long)]
    serial: Option<String>,

    /// Sweep range in MHz as min:max (repeat for multiple ranges)
    #[arg(short = 'f', long = "freq", value_name = "MIN:MAX")]
    ranges: Vec<String>,

    /// RX LNA (IF) gain, 0-40 dB in 8 dB steps
    #[arg(short = 'l', long, default_value = "16")]
    lna_gain: u32,

    /// RX VGA (baseband) gain, 0-62 dB in 2 dB steps
    #[arg(short = 'g', long, default_value = "20")]
    vga_gain: u32,

    /// FFT bin width (frequency resolution) in Hz, 2445-5000000
    #[arg(short = 'w', long)]
    bin_width: Option<u32>,

    /// Number of sweeps to perform (0 = until stopped)
    #[arg(short = 'N', long, default_value = "0")]
    num_sweeps: u64,

    /// ZMQ endpoint the PUB socket connects to
    #[arg(short = 'Z', long, default_value = "tcp://127.0.0.1:5555")]
    zmq: String,

    /// Sensor identifier prepended to every message
    #[arg(long)]
    sensor_id: Option<String>,
}

fn parse_range(s: &str) -> Result<(u16, u16), String> {
    let (min, max) = s
        .split_once(':')
        .ok_or_else(|| format!("invalid range '{}': expected MIN:MAX in MHz", s))?;
    let min: u16 = min
        .trim()
        .parse()
        .map_err(|_| format!("invalid range minimum '{}'", min))?;
    let max: u16 = max
        .trim()
        .parse()
        .map_err(|_| format!("invalid range maximum '{}'", max))?;
    if min >= max {
        return Err(format!("freq_max must be greater than freq_min in '{}'", s));
    }
    Ok((min, max))
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}

#[cfg(not(feature = "hackrf"))]
fn run(cli: Cli) -> Result<(), String> {
    for s in &cli.ranges {
        parse_range(s)?;
    }
    Err("this build has no device backend; rebuild with --features hackrf,zmq".to_string())
}

#[cfg(feature = "hackrf")]
fn run(cli: Cli) -> Result<(), String> {
    use std::time::Duration;

    use crossbeam::channel;
    use rfs_output::zmq_pub::SpectrumPublisher;
    use rfs_sdr::hackrf::HackrfSweepDevice;
    use rfs_sdr::DEFAULT_BASEBAND_FILTER_HZ;
    use rfs_sweep::{
        CallbackCtl, OutputMode, PlanStrategy, SinkTarget, Sweeper, DEFAULT_SAMPLE_RATE_HZ,
    };

    let ranges: Vec<(u16, u16)> = cli
        .ranges
        .iter()
        .map(|s| parse_range(s))
        .collect::<Result<_, _>>()?;

    let device = HackrfSweepDevice::open(
        cli.serial.as_deref(),
        DEFAULT_SAMPLE_RATE_HZ as u32,
        DEFAULT_BASEBAND_FILTER_HZ,
        cli.lna_gain,
        cli.vga_gain,
    )
    .map_err(|e| e.to_string())?;

    let mut sweeper = Sweeper::with_defaults(device);
    sweeper
        .set_output(OutputMode::Binary, SinkTarget::Nop)
        .map_err(|e| e.to_string())?;
    sweeper.set_range(&ranges).map_err(|e| e.to_string())?;
    sweeper
        .setup_fft(PlanStrategy::Measure, cli.bin_width)
        .map_err(|e| e.to_string())?;

    let meta = rfs_output::announce(
        cli.sensor_id.as_deref(),
        sweeper.sample_rate_hz(),
        sweeper.bin_width().unwrap_or(0.0),
        sweeper.fft_size().unwrap_or(0),
    );

    // Records queue here; the transfer thread never blocks on the socket.
    // A full queue drops the newest records.
    let (tx, rx) = channel::bounded::<Vec<u8>>(4096);

    sweeper
        .set_fft_rx_callback(Box::new(move |frame| {
            let (lower, upper) = rfs_output::slice_records(frame);
            let _ = tx.try_send(lower);
            let _ = tx.try_send(upper);
            CallbackCtl::Continue
        }))
        .map_err(|e| e.to_string())?;

    let endpoint = cli.zmq.clone();
    let sensor_id = cli.sensor_id.clone();
    let consumer = std::thread::spawn(move || {
        let publisher = match SpectrumPublisher::new(&endpoint, sensor_id.as_deref()) {
            Ok(p) => p,
            Err(e) => {
                eprintln!("error: {}", e);
                return;
            }
        };
        publisher.send_announce(&meta);
        for record in rx.iter() {
            publisher.send_record(&record);
        }
    });

    let handle = sweeper.stop_handle();
    ctrlc::set_handler(move || {
        eprintln!("\ninterrupted, stopping...");
        handle.stop();
    })
    .map_err(|e| format!("failed to set Ctrl-C handler: {}", e))?;

    sweeper.start(cli.num_sweeps).map_err(|e| e.to_string())?;

    eprintln!("Stop with Ctrl-C");
    while sweeper.is_streaming() && !sweeper.is_exiting() {
        std::thread::sleep(Duration::from_millis(100));
    }

    eprintln!("\nExiting... {} sweeps completed", sweeper.sweep_count());

    sweeper.stop();
    // close() drops the callback, which closes the channel and ends the
    // consumer thread.
    sweeper.close().map_err(|e| e.to_string())?;
    let _ = consumer.join();

    Ok(())
}
