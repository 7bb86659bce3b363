use clap::{Parser, ValueEnum};
use rfs_sweep::PlanStrategy;

#[derive(Parser, Debug)]
#[command(name = "rfsweep")]
#[command(about = "Wideband spectrum sweep for HackRF")]
struct Cli {
    /// Serial number of the desired device
    #[arg(short = 'd', long)]
    serial: Option<String>,

    /// RX RF amplifier: 1=enable, 0=disable
    #[arg(short = 'a', long)]
    amp: Option<u8>,

    /// Antenna port power: 1=enable, 0=disable
    #[arg(short = 'p', long)]
    antenna: Option<u8>,

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

    /// FFT plan strategy
    #[arg(short = 'P', long, default_value = "measure")]
    plan: PlanArg,

    /// One-shot mode: exit after a single sweep
    #[arg(short = '1', long)]
    one_shot: bool,

    /// Number of sweeps to perform
    #[arg(short = 'N', long)]
    num_sweeps: Option<u64>,

    /// Binary record output
    #[arg(short = 'B', long)]
    binary: bool,

    /// Binary inverse FFT output
    #[arg(short = 'I', long)]
    ifft: bool,

    /// Keep the same timestamp within a sweep
    #[arg(short = 'n', long)]
    normalized_timestamp: bool,

    /// Output file, "-" for stdout
    #[arg(short = 'r', long, default_value = "-")]
    output: String,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum PlanArg {
    Estimate,
    Measure,
    Patient,
    Exhaustive,
}

impl From<PlanArg> for PlanStrategy {
    fn from(p: PlanArg) -> Self {
        match p {
            PlanArg::Estimate => PlanStrategy::Estimate,
            PlanArg::Measure => PlanStrategy::Measure,
            PlanArg::Patient => PlanStrategy::Patient,
            PlanArg::Exhaustive => PlanStrategy::Exhaustive,
        }
    }
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

    match run(cli) {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("error: {}", e);
            std::process::exit(1);
        }
    }
}

#[cfg(not(feature = "hackrf"))]
fn run(cli: Cli) -> Result<i32, String> {
    for s in &cli.ranges {
        parse_range(s)?;
    }
    Err("this build has no device backend; rebuild with --features hackrf".to_string())
}

#[cfg(feature = "hackrf")]
fn run(cli: Cli) -> Result<i32, String> {
    use std::fs::File;
    use std::io::{self, BufWriter, Write};
    use std::time::{Duration, Instant};

    use rfs_sdr::hackrf::HackrfSweepDevice;
    use rfs_sdr::DEFAULT_BASEBAND_FILTER_HZ;
    use rfs_sweep::{OutputMode, SinkTarget, Sweeper, DEFAULT_SAMPLE_RATE_HZ};

    let ranges: Vec<(u16, u16)> = cli
        .ranges
        .iter()
        .map(|s| parse_range(s))
        .collect::<Result<_, _>>()?;

    let mode = match (cli.binary, cli.ifft) {
        (true, true) => return Err("-B and -I are mutually exclusive".to_string()),
        (true, false) => OutputMode::Binary,
        (false, true) => OutputMode::InverseFft,
        (false, false) => OutputMode::Text,
    };

    if cli.lna_gain % 8 != 0 {
        eprintln!("warning: lna_gain (-l) should be a multiple of 8");
    }
    if cli.vga_gain % 2 != 0 {
        eprintln!("warning: vga_gain (-g) should be a multiple of 2");
    }

    let writer: Box<dyn Write + Send> = if cli.output == "-" {
        Box::new(io::stdout())
    } else {
        let file = File::create(&cli.output)
            .map_err(|e| format!("failed to create {}: {}", cli.output, e))?;
        Box::new(BufWriter::with_capacity(8 * 1024, file))
    };

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
        .set_timestamp_normalization(cli.normalized_timestamp)
        .map_err(|e| e.to_string())?;
    sweeper
        .set_output(mode, SinkTarget::Stream(writer))
        .map_err(|e| e.to_string())?;
    sweeper.set_range(&ranges).map_err(|e| e.to_string())?;
    sweeper
        .setup_fft(cli.plan.into(), cli.bin_width)
        .map_err(|e| e.to_string())?;

    let handle = sweeper.stop_handle();
    ctrlc::set_handler(move || {
        eprintln!("\ninterrupted, stopping...");
        handle.stop();
    })
    .map_err(|e| format!("failed to set Ctrl-C handler: {}", e))?;

    let num_sweeps = if cli.one_shot {
        1
    } else {
        cli.num_sweeps.unwrap_or(0)
    };
    sweeper.start(num_sweeps).map_err(|e| e.to_string())?;

    if let Some(amp) = cli.amp {
        sweeper
            .device_mut()
            .set_amp_enable(amp != 0)
            .map_err(|e| e.to_string())?;
    }
    if let Some(antenna) = cli.antenna {
        sweeper
            .device_mut()
            .set_antenna_enable(antenna != 0)
            .map_err(|e| e.to_string())?;
    }

    log::info!(
        "sweeping {:?} MHz, fft size {} ({} Hz bins)",
        sweeper.program().flatten(),
        sweeper.fft_size().unwrap_or(0),
        sweeper.bin_width().unwrap_or(0.0)
    );
    eprintln!("Stop with Ctrl-C");

    let started = Instant::now();
    let mut last_report = Instant::now();
    let mut sweep_rate = 0.0f64;
    let mut exit_code = 0;

    while sweeper.is_streaming() && !sweeper.is_exiting() {
        std::thread::sleep(Duration::from_millis(50));

        if last_report.elapsed() >= Duration::from_secs(1) {
            let elapsed = started.elapsed().as_secs_f64();
            let sweeps = sweeper.sweep_count();
            sweep_rate = sweeps as f64 / elapsed;
            let data_rate_kb = sweeper.byte_count() as f64 / 1024.0;

            eprintln!(
                "{} total sweeps completed, {:.2} sweeps/second, {:.2} KBytes/second",
                sweeps, sweep_rate, data_rate_kb
            );

            if sweeper.byte_count() == 0 {
                exit_code = 1;
                eprintln!("\nCouldn't transfer any data for one second.");
                break;
            }
            sweeper.reset_byte_count();
            last_report = Instant::now();
        }
    }

    eprintln!("\nExiting...");

    let elapsed = started.elapsed().as_secs_f64();
    if sweep_rate == 0.0 && elapsed > 0.0 {
        sweep_rate = sweeper.sweep_count() as f64 / elapsed;
    }
    eprintln!(
        "Total sweeps: {} in {:.5} seconds ({:.2} sweeps/second)",
        sweeper.sweep_count(),
        elapsed,
        sweep_rate
    );

    sweeper.stop();
    sweeper.close().map_err(|e| e.to_string())?;

    Ok(exit_code)
}
