use anyhow::Result;
use clap::{Parser, ValueEnum};
use laserfence::{CameraBackend, LaserFenceApp, LaserFenceConfig, LaserFenceError, Mask};
use tracing::{error, info};
use tracing_appender::non_blocking::WorkerGuard;

#[derive(Parser, Debug)]
#[command(name = "laserfence")]
#[command(about = "Trigger-synchronized paired-frame laser fence detector")]
#[command(version)]
#[command(long_about = "Captures frame pairs from a hardware-triggered camera, sums the \
intensity inside a rectangular mask for each frame and writes one line per pair to stdout: \
`<counter> <sumFirst> <sumSecond> <epochMillis>`. Diagnostics go to stderr.")]
struct Args {
    /// Mask corners: ROW1 COL1 ROW2 COL2 (inclusive)
    #[arg(value_name = "MASK", num_args = 0..=4)]
    mask: Vec<u32>,

    /// Number of frames to capture before exiting (even); 0 streams forever
    #[arg(short = 'n', long = "count", value_name = "N")]
    count: Option<u32>,

    /// Path to configuration file
    #[arg(short, long, default_value = "laserfence.toml", help = "Path to TOML configuration file")]
    config: String,

    /// Camera driver family
    #[arg(long, value_enum)]
    backend: Option<BackendArg>,

    /// Enable debug logging (most verbose)
    #[arg(short, long, help = "Enable debug level logging")]
    debug: bool,

    /// Enable verbose logging (info level)
    #[arg(short, long, help = "Enable verbose info level logging")]
    verbose: bool,

    /// Enable quiet mode (errors only)
    #[arg(short, long, help = "Enable quiet mode - only log errors")]
    quiet: bool,

    /// Override log format (json, pretty, compact)
    #[arg(long, value_name = "FORMAT", help = "Log output format: json, pretty, or compact")]
    log_format: Option<String>,

    /// Also write logs to a daily rolling file in this directory
    #[arg(long, value_name = "DIR")]
    log_dir: Option<String>,

    /// Validate configuration and exit
    #[arg(long, help = "Validate configuration file and exit without touching the camera")]
    validate_config: bool,

    /// Print default configuration and exit
    #[arg(long, help = "Print default configuration in TOML format and exit")]
    print_config: bool,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum BackendArg {
    Simulated,
    Replay,
}

impl From<BackendArg> for CameraBackend {
    fn from(arg: BackendArg) -> Self {
        match arg {
            BackendArg::Simulated => CameraBackend::Simulated,
            BackendArg::Replay => CameraBackend::Replay,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Handle special modes that don't require full initialization
    if args.print_config {
        print!("{}", LaserFenceConfig::default().to_toml()?);
        return Ok(());
    }

    let _log_guard = init_logging(&args)?;

    info!("Starting laserfence v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration file: {}", args.config);

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            eprintln!("Error: {}", e);
            std::process::exit(e.exit_code());
        }
    };

    // Validate configuration if requested
    if args.validate_config {
        match config.validate() {
            Ok(()) => {
                info!("Configuration validation successful");
                eprintln!("✓ Configuration is valid");
                return Ok(());
            }
            Err(e) => {
                error!("Configuration validation failed: {}", e);
                eprintln!("✗ Configuration validation failed: {}", e);
                std::process::exit(e.exit_code());
            }
        }
    }

    let app = LaserFenceApp::new(config).map_err(|e| {
        error!("Failed to create application: {}", e);
        e
    })?;

    match app.run().await {
        Ok(outcome) => {
            info!(
                "laserfence exited after {} pairs ({:?})",
                outcome.pairs_completed, outcome.reason
            );
            Ok(())
        }
        Err(e) => {
            error!("laserfence failed: {}", e);
            eprintln!("Error: {}", e);
            std::process::exit(e.exit_code());
        }
    }
}

/// Layer command line overrides on top of the file and environment configuration
fn load_config(args: &Args) -> std::result::Result<LaserFenceConfig, LaserFenceError> {
    let mut config = LaserFenceConfig::load_from_file(&args.config)?;

    match args.mask.as_slice() {
        [] => {}
        [row1, col1, row2, col2] => {
            config.mask = Mask::new(*row1, *col1, *row2, *col2)
                .map_err(|e| LaserFenceError::validation(e.to_string()))?;
        }
        other => {
            return Err(LaserFenceError::validation(format!(
                "Mask needs 4 values (ROW1 COL1 ROW2 COL2), got {}",
                other.len()
            )));
        }
    }

    if let Some(count) = args.count {
        config.session.capture_count = count;
    }
    if let Some(backend) = args.backend {
        config.camera.backend = backend.into();
    }

    Ok(config)
}

fn init_logging(args: &Args) -> Result<Option<WorkerGuard>> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

    // Determine log level based on flags
    let log_level = if args.debug {
        "debug"
    } else if args.verbose {
        "info"
    } else if args.quiet {
        "error"
    } else {
        "warn"
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("laserfence={}", log_level)));

    // stdout carries the result lines, so console logs always go to stderr
    let fmt_layer = match args.log_format.as_deref() {
        Some("json") => fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .boxed(),
        Some("compact") => fmt::layer()
            .compact()
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .boxed(),
        Some("pretty") | None => fmt::layer()
            .pretty()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_thread_ids(args.debug)
            .with_file(args.debug)
            .with_line_number(args.debug)
            .boxed(),
        Some(format) => {
            eprintln!("Warning: Unknown log format '{}', using default", format);
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_thread_ids(args.debug)
                .with_file(args.debug)
                .with_line_number(args.debug)
                .boxed()
        }
    };

    let (file_layer, guard) = match &args.log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "laserfence.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true)
                .boxed();
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(file_layer)
        .with(env_filter)
        .init();

    Ok(guard)
}
