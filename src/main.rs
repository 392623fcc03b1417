use clap::{Parser, ValueEnum};
use log::LevelFilter;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

use tesla_telemetry::{DecoderBackend, ExtractorConfig, TelemetryExtractor, TelemetryRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Json,
    Csv,
}

fn csv_header() -> &'static str {
    "frame_index,version,gear_state,frame_seq_no,vehicle_speed_mps,speed_mph,speed_kph,accelerator_pedal_position,steering_wheel_angle_deg,blinker_on_left,blinker_on_right,brake_applied,autopilot_state,latitude_deg,longitude_deg,heading_deg,linear_acceleration_mps2_x,linear_acceleration_mps2_y,linear_acceleration_mps2_z,g_force_x,g_force_y,g_force_z"
}

#[derive(Parser, Debug)]
#[command(name = "tesla-telemetry")]
#[command(about = "Extract Tesla dashcam telemetry and look it up by playback time", long_about = None)]
struct Cli {
    /// Input MP4 file
    #[arg(value_name = "INPUT.mp4")]
    input: PathBuf,

    /// Output file path (use '-' for stdout)
    #[arg(short = 'o', long = "output", value_name = "FILE")]
    output: Option<PathBuf>,

    /// Output format
    #[arg(long = "format", value_enum, default_value_t = OutputFormat::Json, conflicts_with_all = ["csv", "json"])]
    format: OutputFormat,

    /// Alias for `--format csv`
    #[arg(long, conflicts_with_all = ["json", "format"], action = clap::ArgAction::SetTrue)]
    csv: bool,

    /// Alias for `--format json`
    #[arg(long, conflicts_with_all = ["csv", "format"], action = clap::ArgAction::SetTrue)]
    json: bool,

    /// Print gear and autopilot states as names (e.g. D, AUTOSTEER) instead of numeric codes
    #[arg(short = 'e', long = "enum", action = clap::ArgAction::SetTrue)]
    enum_strings: bool,

    /// Only print the record shown at this playback time (seconds)
    #[arg(long = "at", value_name = "SECONDS")]
    at: Option<f64>,

    /// Telemetry decoder backend (defaults to TESLA_TELEMETRY_DECODER, then auto)
    #[arg(long = "decoder", value_enum)]
    decoder: Option<DecoderBackend>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    verbose: u8,
}

fn resolve_format(cli: &Cli) -> OutputFormat {
    if cli.csv {
        OutputFormat::Csv
    } else if cli.json {
        OutputFormat::Json
    } else {
        cli.format
    }
}

fn should_write_to_stdout(output: &Option<PathBuf>) -> bool {
    match output {
        None => true,
        Some(p) => p.as_os_str() == "-",
    }
}

fn init_logging(verbose: u8) {
    let mut builder = env_logger::Builder::from_default_env();
    match verbose {
        0 => {}
        1 => {
            builder.filter_level(LevelFilter::Debug);
        }
        _ => {
            builder.filter_level(LevelFilter::Trace);
        }
    }
    builder.init();
}

fn fmt_f64(v: f64) -> String {
    format!("{:.15}", v)
}

fn record_json(rec: &TelemetryRecord, enum_strings: bool) -> io::Result<serde_json::Value> {
    let mut value = serde_json::to_value(rec)?;
    if enum_strings {
        if let Some(obj) = value.as_object_mut() {
            obj.insert("gear_state".into(), rec.gear_name().into());
            obj.insert("autopilot_state".into(), rec.autopilot_name().into());
        }
    }
    Ok(value)
}

fn write_csv_row(out: &mut dyn Write, rec: &TelemetryRecord, enum_strings: bool) -> io::Result<()> {
    let (gear, autopilot) = if enum_strings {
        (rec.gear_name().to_string(), rec.autopilot_name().to_string())
    } else {
        (rec.gear_state.to_string(), rec.autopilot_state.to_string())
    };

    // NB: we avoid quoting because values are numeric/bool/enum tokens.
    writeln!(
        out,
        "{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{}",
        rec.frame_index,
        rec.version,
        gear,
        rec.frame_seq_no,
        fmt_f64(rec.vehicle_speed_mps),
        fmt_f64(rec.speed_mph),
        fmt_f64(rec.speed_kph),
        fmt_f64(rec.accelerator_pedal_position),
        fmt_f64(rec.steering_wheel_angle_deg),
        rec.blinker_on_left,
        rec.blinker_on_right,
        rec.brake_applied,
        autopilot,
        fmt_f64(rec.latitude_deg),
        fmt_f64(rec.longitude_deg),
        fmt_f64(rec.heading_deg),
        fmt_f64(rec.linear_acceleration_mps2_x),
        fmt_f64(rec.linear_acceleration_mps2_y),
        fmt_f64(rec.linear_acceleration_mps2_z),
        fmt_f64(rec.g_force_x),
        fmt_f64(rec.g_force_y),
        fmt_f64(rec.g_force_z)
    )
}

fn run_with_writer(cli: &Cli, format: OutputFormat, out: &mut dyn Write) -> io::Result<()> {
    let mut config = ExtractorConfig::from_env();
    if let Some(decoder) = cli.decoder {
        config.decoder = decoder;
    }
    let extractor = TelemetryExtractor::new(config);
    let result = extractor.extract_from_file(&cli.input);

    if result.is_empty() {
        log::warn!("no telemetry found in {}", cli.input.display());
    }
    log::info!(
        "{} records, {:.3} fps, {:.1}s, {} decoder",
        result.len(),
        result.fps,
        result.duration_seconds(),
        extractor.decoder_name()
    );

    let records: Vec<&TelemetryRecord> = match cli.at {
        Some(seconds) => result.telemetry_at(seconds).into_iter().collect(),
        None => result.frames.iter().collect(),
    };

    match format {
        OutputFormat::Json => {
            let values = records
                .iter()
                .map(|rec| record_json(rec, cli.enum_strings))
                .collect::<io::Result<Vec<_>>>()?;
            let json = match cli.at {
                Some(_) => serde_json::to_string_pretty(&values.first())?,
                None => serde_json::to_string_pretty(&values)?,
            };
            writeln!(out, "{json}")?;
        }
        OutputFormat::Csv => {
            writeln!(out, "{}", csv_header())?;
            for rec in records {
                write_csv_row(out, rec, cli.enum_strings)?;
            }
        }
    }

    Ok(())
}

fn main() -> io::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let format = resolve_format(&cli);

    if should_write_to_stdout(&cli.output) {
        let stdout = io::stdout();
        let mut out = BufWriter::new(stdout.lock());
        run_with_writer(&cli, format, &mut out)?;
        out.flush()?;
    } else if let Some(path) = cli.output.as_ref() {
        let file = File::create(path)?;
        let mut out = BufWriter::new(file);
        run_with_writer(&cli, format, &mut out)?;
        out.flush()?;
    }

    Ok(())
}
