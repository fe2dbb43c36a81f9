use clap::{CommandFactory, Parser};
use datetidy::cli::{Options, run};
use datetidy::config::Config;
use datetidy::output::OutputFormatter;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Move files into Year/Month folders by date.
///
/// Files whose content already exists at the destination are removed from the
/// source; files that collide with a different file get a `_N` suffix.
#[derive(Debug, Parser)]
#[command(name = "datetidy", version)]
struct Cli {
    /// Source directory
    #[arg(value_name = "SRC")]
    source: Option<PathBuf>,

    /// Root directory for organized files
    #[arg(value_name = "DST")]
    destination: Option<PathBuf>,

    /// Scan files recursively into SRC subdirectories
    #[arg(short = 'r', long)]
    recursive: bool,

    /// Dry run: print decisions without modifying files or directories
    #[arg(long = "dry", visible_alias = "dry-run")]
    dry: bool,

    /// Do not process files newer than DAYS days from now
    #[arg(short = 'd', long = "days", value_name = "DAYS")]
    days: Option<u64>,

    /// Use the EXIF capture date when available
    #[arg(long)]
    exif: bool,

    /// Path to a TOML configuration file
    #[arg(short = 'c', long, value_name = "PATH")]
    config: Option<PathBuf>,
}

/// Rewrites the single-dash long flags `-dry` and `-exif` to `--dry` and
/// `--exif`.
fn normalize_args(args: impl IntoIterator<Item = String>) -> Vec<String> {
    args.into_iter()
        .map(|arg| match arg.as_str() {
            "-dry" => "--dry".to_string(),
            "-exif" => "--exif".to_string(),
            _ => arg,
        })
        .collect()
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn main() -> ExitCode {
    init_tracing();

    let cli = Cli::parse_from(normalize_args(std::env::args()));

    let (Some(source), Some(destination)) = (cli.source.as_ref(), cli.destination.as_ref()) else {
        println!("Error: SRC or DST directories not set");
        let _ = Cli::command().print_help();
        return ExitCode::SUCCESS;
    };

    let config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            OutputFormatter::error(&format!("Error loading configuration: {}", e));
            return ExitCode::FAILURE;
        }
    };
    let filters = match config.compile_filters() {
        Ok(filters) => filters,
        Err(e) => {
            OutputFormatter::error(&format!("Error compiling filters: {}", e));
            return ExitCode::FAILURE;
        }
    };

    let mut options = Options::from_defaults(&config.defaults);
    options.recursive |= cli.recursive;
    options.dry_run = cli.dry;
    options.use_metadata |= cli.exif;
    if let Some(days) = cli.days {
        options.min_age_days = days;
    }

    match run(source, destination, &options, filters) {
        Ok(report) => {
            if report.has_failures() {
                OutputFormatter::warning("Some files could not be organized. Please review errors above.");
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            OutputFormatter::error(&e.to_string());
            ExitCode::FAILURE
        }
    }
}
