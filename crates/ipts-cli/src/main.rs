//! ipts CLI — debug tools for IPTS digitizer data.
//!
//! Works on recorded raw report dumps: a file of concatenated self-framed
//! buffers, exactly as they were read from the device.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};

use ipts_core::{Application, Config, Contact, EventSink, Finder, Normalizer, StylusData};

type CliError = Box<dyn std::error::Error>;
type CliResult<T> = Result<T, CliError>;

/// Give up after this many consecutive per-buffer failures.
const MAX_CONTIGUOUS_ERRORS: u32 = 50;

#[derive(Parser)]
#[command(name = "ipts")]
#[command(about = "Process recorded IPTS report dumps: contact detection, stylus interpolation, calibration statistics")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a dump through the full pipeline and print the events.
    Replay {
        /// Path to the recorded report dump.
        #[arg(long)]
        dump: PathBuf,

        /// Path to a JSON config; overrides --width/--height.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Physical screen width in tenths of a millimeter.
        #[arg(long, default_value = "2600.0")]
        width: f64,

        /// Physical screen height in tenths of a millimeter.
        #[arg(long, default_value = "1735.0")]
        height: f64,
    },

    /// Observe stable contacts in a dump and report size/aspect statistics.
    Calibrate {
        /// Path to the recorded report dump.
        #[arg(long)]
        dump: PathBuf,

        /// Physical screen width in tenths of a millimeter.
        #[arg(long, default_value = "2600.0")]
        width: f64,

        /// Physical screen height in tenths of a millimeter.
        #[arg(long, default_value = "1735.0")]
        height: f64,
    },

    /// Print the effective configuration as JSON.
    ConfigInfo {
        /// Path to a JSON config; defaults are printed when omitted.
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

fn main() -> CliResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Replay {
            dump,
            config,
            width,
            height,
        } => run_replay(&dump, config.as_deref(), width, height),

        Commands::Calibrate { dump, width, height } => run_calibrate(&dump, width, height),

        Commands::ConfigInfo { config } => run_config_info(config.as_deref()),
    }
}

// ── shared helpers ─────────────────────────────────────────────────────────

fn load_config(path: Option<&Path>, width: f64, height: f64) -> CliResult<Config> {
    let config = match path {
        Some(path) => {
            let json = std::fs::read_to_string(path).map_err(|e| -> CliError {
                format!("failed to read config {}: {}", path.display(), e).into()
            })?;
            serde_json::from_str(&json)?
        }
        None => Config::new(width, height)?,
    };
    config.validate()?;
    Ok(config)
}

/// Split a dump file into its self-framed buffers.
fn split_frames(data: &[u8]) -> CliResult<Vec<&[u8]>> {
    let mut frames = Vec::new();
    let mut offset = 0;

    while offset < data.len() {
        if offset + 8 > data.len() {
            return Err("truncated frame header at end of dump".into());
        }
        let size = u32::from_le_bytes(data[offset + 4..offset + 8].try_into().unwrap()) as usize;
        let end = offset + 8 + size;
        if end > data.len() {
            return Err("truncated frame payload at end of dump".into());
        }
        frames.push(&data[offset..end]);
        offset = end;
    }

    Ok(frames)
}

// ── replay ─────────────────────────────────────────────────────────────────

/// Sink that prints every processed event to stdout.
#[derive(Default)]
struct PrintSink {
    frame: u64,
}

impl EventSink for PrintSink {
    fn on_contacts(&mut self, contacts: &[Contact]) {
        self.frame += 1;
        for contact in contacts {
            println!(
                "frame {:>6}  contact {:>3}  x={:.4} y={:.4}  major={:.4} minor={:.4}  \
                 angle={:.3}  stable={}  valid={}",
                self.frame,
                contact.index,
                contact.x,
                contact.y,
                contact.major,
                contact.minor,
                contact.orientation,
                contact.stable,
                contact
                    .valid
                    .map_or_else(|| "?".to_string(), |v| v.to_string()),
            );
        }
    }

    fn on_stylus(&mut self, stylus: &StylusData) {
        println!(
            "stylus  serial={:#010X}  x={:>5} y={:>5}  pressure={:>4}  \
             tilt=({:>5}, {:>5})  proximity={} contact={}",
            stylus.serial,
            stylus.x,
            stylus.y,
            stylus.pressure,
            stylus.tilt_x,
            stylus.tilt_y,
            stylus.proximity,
            stylus.contact,
        );
    }
}

fn run_replay(
    dump_path: &Path,
    config_path: Option<&Path>,
    width: f64,
    height: f64,
) -> CliResult<()> {
    let config = load_config(config_path, width, height)?;
    let data = std::fs::read(dump_path).map_err(|e| -> CliError {
        format!("failed to read dump {}: {}", dump_path.display(), e).into()
    })?;
    let frames = split_frames(&data)?;

    tracing::info!("Replaying {} buffers from {}", frames.len(), dump_path.display());

    let mut app = Application::new(config, None, PrintSink::default())?;
    app.start();

    let mut errors = 0_u32;
    for frame in frames {
        if errors >= MAX_CONTIGUOUS_ERRORS {
            app.stop();
            return Err(format!(
                "encountered {} continuous errors, aborting",
                MAX_CONTIGUOUS_ERRORS
            )
            .into());
        }

        match app.process(frame) {
            Ok(()) => errors = 0,
            Err(e) => {
                tracing::warn!("{}", e);
                errors += 1;
            }
        }
    }

    app.stop();
    Ok(())
}

// ── calibrate ──────────────────────────────────────────────────────────────

fn percentile(sorted: &[f64], q: f64) -> f64 {
    let idx = ((sorted.len() - 1) as f64 * q).round() as usize;
    sorted[idx]
}

fn run_calibrate(dump_path: &Path, width: f64, height: f64) -> CliResult<()> {
    let config = Config::new(width, height)?;
    let data = std::fs::read(dump_path).map_err(|e| -> CliError {
        format!("failed to read dump {}: {}", dump_path.display(), e).into()
    })?;
    let frames = split_frames(&data)?;

    let parser = ipts_core::Parser::new();
    let mut normalizer = Normalizer::new();
    let mut finder = Finder::new(config.contacts.clone());
    let mut contacts: Vec<Contact> = Vec::new();

    let diagonal = config.diagonal();
    let mut sizes: Vec<f64> = Vec::new();
    let mut aspects: Vec<f64> = Vec::new();

    let mut errors = 0_u32;
    for frame in frames {
        if errors >= MAX_CONTIGUOUS_ERRORS {
            return Err(format!(
                "encountered {} continuous errors, aborting",
                MAX_CONTIGUOUS_ERRORS
            )
            .into());
        }

        let result = parser.parse(frame, &mut |record| {
            let ipts_core::Frame::Heatmap(heatmap) = record else {
                return;
            };
            let map = normalizer.normalize(&heatmap);
            finder.find(map, &mut contacts);

            let mut updated = false;
            for contact in &contacts {
                if !contact.stable {
                    continue;
                }
                sizes.push(contact.major * diagonal);
                aspects.push(contact.major / contact.minor);
                updated = true;
            }

            // Re-report the running statistics after every frame that
            // contributed a stable contact.
            if !updated {
                return;
            }

            sizes.sort_by(|a, b| a.partial_cmp(b).unwrap());
            aspects.sort_by(|a, b| a.partial_cmp(b).unwrap());

            let size_avg = sizes.iter().sum::<f64>() / sizes.len() as f64;
            let aspect_avg = aspects.iter().sum::<f64>() / aspects.len() as f64;

            tracing::info!("Samples: {}", sizes.len());
            tracing::info!(
                "Size:    {:.3} (Min: {:.3}; Max: {:.3})",
                size_avg,
                percentile(&sizes, 0.01),
                percentile(&sizes, 0.99),
            );
            tracing::info!(
                "Aspect:  {:.3} (Min: {:.3}; Max: {:.3})",
                aspect_avg,
                percentile(&aspects, 0.01),
                percentile(&aspects, 0.99),
            );
        });

        match result {
            Ok(()) => errors = 0,
            Err(e) => {
                tracing::warn!("{}", e);
                errors += 1;
            }
        }
    }

    if sizes.is_empty() {
        tracing::info!("No stable contacts observed");
    }

    Ok(())
}

// ── config-info ────────────────────────────────────────────────────────────

fn run_config_info(config_path: Option<&Path>) -> CliResult<()> {
    let config = load_config(config_path, 2600.0, 1735.0)?;
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}
