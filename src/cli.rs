//! Command-line interface for phpfacts.

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};

use crate::config::ScanConfig;
use crate::pipeline::Runner;
use crate::report;

/// Exit codes.
pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_ERROR: i32 = 2;

const FORMATS: &[&str] = &["pretty", "json"];

/// Extract structured facts from a legacy PHP codebase.
///
/// phpfacts reads a PHP source tree without executing it and reports its
/// classes and functions, HTTP endpoints, database usage, composer
/// dependencies and directory layout, along with summary complexity tiers.
#[derive(Parser)]
#[command(name = "phpfacts")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbose logging on stderr (repeat for more: -v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Scan a PHP tree and print its facts
    #[command(visible_alias = "analyze")]
    Scan(ScanArgs),
    /// Print the effective scan configuration
    Config(ConfigArgs),
}

/// Arguments for the scan command.
#[derive(Parser)]
pub struct ScanArgs {
    /// Root directory of the PHP project
    pub path: PathBuf,

    /// Path to config YAML file (default: auto-discover)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Output format: pretty or json
    #[arg(short, long, default_value = "pretty")]
    pub format: String,

    /// Worker threads for per-file analysis (0 = one per CPU)
    #[arg(short, long)]
    pub jobs: Option<usize>,
}

/// Arguments for the config command.
#[derive(Parser)]
pub struct ConfigArgs {
    /// Path to config YAML file (default: auto-discover)
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

/// Map `-v` occurrences to a default log filter.
pub fn log_filter(verbose: u8) -> &'static str {
    match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

/// Run the scan command.
pub fn run_scan(args: &ScanArgs) -> anyhow::Result<i32> {
    if !FORMATS.contains(&args.format.as_str()) {
        eprintln!(
            "Error: invalid format {:?}, must be 'pretty' or 'json'",
            args.format
        );
        return Ok(EXIT_ERROR);
    }

    let (config, config_path) = match ScanConfig::resolve(args.config.as_deref()) {
        Ok(resolved) => resolved,
        Err(e) => {
            eprintln!("Error: {}", e);
            return Ok(EXIT_ERROR);
        }
    };
    if let Some(p) = &config_path {
        tracing::info!(config = %p.display(), "loaded config");
    }

    let mut runner = Runner::new(&args.path).config(config);
    if let Some(jobs) = args.jobs {
        runner = runner.jobs(jobs);
    }

    let pretty = args.format == "pretty";
    let spinner = pretty.then(|| {
        let pb = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("  {spinner} {msg}") {
            pb.set_style(style);
        }
        pb.set_message(format!("scanning {}", args.path.display()));
        pb.enable_steady_tick(Duration::from_millis(100));
        pb
    });

    let result = runner.run();
    if let Some(pb) = spinner {
        pb.finish_and_clear();
    }

    let model = match result {
        Ok(m) => m,
        Err(e) => {
            eprintln!("Error: {}", e);
            return Ok(EXIT_ERROR);
        }
    };

    if pretty {
        report::write_pretty(&model);
    } else {
        report::write_json(io::stdout().lock(), &model)?;
    }
    Ok(EXIT_SUCCESS)
}

/// Run the config command.
pub fn run_config(args: &ConfigArgs) -> anyhow::Result<i32> {
    let (config, path) = match ScanConfig::resolve(args.config.as_deref()) {
        Ok(resolved) => resolved,
        Err(e) => {
            eprintln!("Error: {}", e);
            return Ok(EXIT_ERROR);
        }
    };

    match path {
        Some(p) => println!("# loaded from {}", p.display()),
        None => println!("# built-in defaults"),
    }
    print!("{}", serde_yaml::to_string(&config)?);
    Ok(EXIT_SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_scan_args() {
        let cli = Cli::try_parse_from(["phpfacts", "-vv", "analyze", "src", "--format", "json", "-j", "3"]).unwrap();
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Scan(args) => {
                assert_eq!(args.path, PathBuf::from("src"));
                assert_eq!(args.format, "json");
                assert_eq!(args.jobs, Some(3));
                assert!(args.config.is_none());
            }
            Commands::Config(_) => panic!("expected scan"),
        }
    }

    #[test]
    fn test_log_filter() {
        assert_eq!(log_filter(0), "warn");
        assert_eq!(log_filter(1), "info");
        assert_eq!(log_filter(9), "trace");
    }

    #[test]
    fn test_invalid_format_is_rejected() {
        let args = ScanArgs {
            path: PathBuf::from("."),
            config: None,
            format: "sarif".to_string(),
            jobs: None,
        };
        assert_eq!(run_scan(&args).unwrap(), EXIT_ERROR);
    }
}
