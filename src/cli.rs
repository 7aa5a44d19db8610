use crate::{
    config::{ConverterConfig, DEFAULT_CONFIG_FILE},
    convert::{self, ConversionReport, ConvertOptions},
    log::{ProgressSink, RunLog},
};
use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};

const DEFAULT_LOG_FILE: &str = "log.txt";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    fn parse(value: &str) -> Option<Self> {
        match value {
            "json" => Some(OutputFormat::Json),
            "text" => Some(OutputFormat::Text),
            _ => None,
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
struct ConvertArgs {
    config: PathBuf,
    log: Option<PathBuf>,
    dry_run: bool,
    format: OutputFormat,
}

#[derive(Debug, PartialEq, Eq)]
enum CliAction {
    Convert(ConvertArgs),
    Help,
    Version,
}

pub fn run() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    match parse_args(&args)? {
        CliAction::Help => {
            print_help();
            Ok(())
        }
        CliAction::Version => {
            println!("mcuuid-switch v{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        CliAction::Convert(args) => run_convert(args),
    }
}

fn parse_args(args: &[String]) -> Result<CliAction> {
    if matches!(args.first().map(|s| s.as_str()), Some("--help" | "-h" | "help")) {
        return Ok(CliAction::Help);
    }
    if matches!(args.first().map(|s| s.as_str()), Some("--version" | "-V" | "version")) {
        return Ok(CliAction::Version);
    }

    let mut config = PathBuf::from(DEFAULT_CONFIG_FILE);
    let mut log = None;
    let mut dry_run = false;
    let mut format = OutputFormat::Text;
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "convert" => {}
            "--config" | "-c" => {
                let Some(value) = iter.next() else {
                    bail!("--config requires a path");
                };
                config = PathBuf::from(value);
            }
            value if value.starts_with("--config=") => {
                config = PathBuf::from(value.trim_start_matches("--config="));
            }
            "--log" => {
                let Some(value) = iter.next() else {
                    bail!("--log requires a path");
                };
                log = Some(PathBuf::from(value));
            }
            value if value.starts_with("--log=") => {
                log = Some(PathBuf::from(value.trim_start_matches("--log=")));
            }
            "--dry-run" | "-n" => dry_run = true,
            "--format" => {
                let Some(value) = iter.next() else {
                    bail!("--format requires a value");
                };
                format = parse_format(value)?;
            }
            value if value.starts_with("--format=") => {
                format = parse_format(value.trim_start_matches("--format="))?;
            }
            "--help" | "-h" => return Ok(CliAction::Help),
            other => bail!("Unknown argument: {other} (see --help)"),
        }
    }

    Ok(CliAction::Convert(ConvertArgs {
        config,
        log,
        dry_run,
        format,
    }))
}

fn parse_format(value: &str) -> Result<OutputFormat> {
    OutputFormat::parse(value).with_context(|| format!("Unknown format: {value} (use json or text)"))
}

fn run_convert(args: ConvertArgs) -> Result<()> {
    let log_path = args
        .log
        .clone()
        .unwrap_or_else(|| default_log_path(&args.config));
    let mut sink = RunLog::create(&log_path)
        .with_context(|| format!("create log file {}", log_path.display()))?;
    if args.format == OutputFormat::Json {
        sink = sink.quiet();
    }

    let config = match ConverterConfig::load(&args.config) {
        Ok(config) => config,
        Err(err) => {
            sink.error(format!("Conversion failed at config stage: {err}"));
            sink.error("online-mode was left unchanged".to_string());
            return Err(err).context("load configuration");
        }
    };

    let options = ConvertOptions {
        dry_run: args.dry_run,
    };
    match convert::convert_from_config(&config, options, &mut sink) {
        Ok(report) => {
            print_report(&report, args.format)?;
            sink.info(format!("Detailed log saved to: {}", sink.path().display()));
            Ok(())
        }
        Err(err) => {
            sink.error(format!("Conversion failed at {} stage: {}", err.stage, err.source));
            sink.error(
                "online-mode was left unchanged; inspect the files listed above before retrying"
                    .to_string(),
            );
            Err(err.into())
        }
    }
}

fn default_log_path(config: &Path) -> PathBuf {
    config
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .map(|parent| parent.join(DEFAULT_LOG_FILE))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_FILE))
}

fn print_report(report: &ConversionReport, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(report)?);
        }
        OutputFormat::Text => {
            println!("Direction: {}", report.direction.label());
            println!("Mapping entries updated: {}", report.mapping_entries_updated);
            println!("Files renamed: {}", report.renamed);
            println!("Already converted: {}", report.already_converted);
            println!("Unmanaged files: {}", report.unmanaged);
            println!("Content updated: {}", report.content_updated);
            println!("Warnings: {}", report.warnings.len());
            println!("online-mode: {}", report.online_mode);
        }
    }
    Ok(())
}

fn print_help() {
    println!("mcuuid-switch v{}", env!("CARGO_PKG_VERSION"));
    println!("Usage:");
    println!("  mcuuid-switch [convert] [options]   Toggle online-mode and convert player UUIDs");
    println!();
    println!("Options:");
    println!("  -c, --config <path>              Configuration file (default: Info.json)");
    println!("  --log <path>                     Log file (default: log.txt next to the config)");
    println!("  -n, --dry-run                    Show what would change without writing");
    println!("  --format <json|text>             Summary format");
    println!("  -h, --help                       Show help");
    println!("  -V, --version                    Show version");
    println!();
    println!("Stop the server before converting; the run is not reversible automatically.");
}
