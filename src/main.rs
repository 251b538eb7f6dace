use airtime_archive::config::ArchiveConfig;
use airtime_archive::pipeline::Pipeline;
use anyhow::{Context, Result};
use chrono::{Datelike, Local, NaiveDateTime};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "airtime", about = "Broadcast schedule archive", version)]
struct Cli {
    /// Config file (defaults to the per-user config directory)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
    /// Log debug output
    #[arg(short, long, global = true)]
    verbose: bool,
    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest every listing day, assemble recordings, then sweep old segments
    Run,
    /// Fetch listing pages and store their programmes
    Ingest {
        /// Only ingest this weekday
        #[arg(short, long)]
        day: Option<String>,
    },
    /// Assemble recordings for pending programmes
    Assemble,
    /// Delete capture segments past the retention window
    Sweep {
        /// Retention in days (overrides config)
        #[arg(short, long)]
        days: Option<u32>,
    },
    /// Show the most recent programmes in the store
    Schedule {
        /// Number of programmes to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },
    /// Configuration
    Config {
        #[command(subcommand)]
        action: ConfigCmd,
    },
}

#[derive(Subcommand)]
enum ConfigCmd {
    /// Print the effective configuration
    Show,
    /// Write the default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn now() -> NaiveDateTime {
    Local::now().naive_local()
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config_path = cli.config.clone().unwrap_or_else(ArchiveConfig::default_path);

    if let Commands::Config { action } = &cli.command {
        return match action {
            ConfigCmd::Show => {
                let config = ArchiveConfig::load(&config_path)
                    .with_context(|| format!("loading {}", config_path.display()))?;
                print_json(&config)
            }
            ConfigCmd::Init { force } => {
                if config_path.exists() && !force {
                    anyhow::bail!(
                        "{} already exists (use --force to overwrite)",
                        config_path.display()
                    );
                }
                ArchiveConfig::default().save(&config_path)?;
                println!("Wrote default config to {}", config_path.display());
                Ok(())
            }
        };
    }

    let config = ArchiveConfig::load(&config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;
    let mut pipeline = Pipeline::from_config(config).context("starting pipeline")?;

    match cli.command {
        Commands::Run => {
            let report = pipeline.run(now());
            if cli.json {
                print_json(&report)?;
            } else {
                println!(
                    "Ingested {} programme(s) ({} day(s) failed)",
                    report.ingest.inserted(),
                    report.ingest.failed_days.len()
                );
                if let Some(assembly) = &report.assembly {
                    println!(
                        "Assembled {} recording(s), {} gap(s), {} failure(s)",
                        assembly.assembled.len() + assembly.already_present.len(),
                        assembly.gaps.len(),
                        assembly.failed.len()
                    );
                }
                if let Some(sweep) = &report.sweep {
                    println!("Deleted {} old segment(s)", sweep.deleted.len());
                }
                for path in &report.malformed_segments {
                    println!("Skipped unparsable name: {}", path.display());
                }
                for failure in &report.stage_errors {
                    eprintln!("Error in {}: {}", failure.stage, failure.error);
                }
            }
            if !report.stage_errors.is_empty() {
                std::process::exit(1);
            }
        }
        Commands::Ingest { day } => {
            let year = now().year();
            match day {
                Some(day) => {
                    let report = pipeline.ingest_day(&day, year)?;
                    if cli.json {
                        print_json(&report)?;
                    } else {
                        println!(
                            "{} ({}): {} new, {} already known, {} dropped",
                            report.day,
                            report.date,
                            report.inserted,
                            report.duplicates,
                            report.dropped_tokens
                        );
                    }
                }
                None => {
                    let summary = pipeline.ingest_all(year);
                    if cli.json {
                        print_json(&summary)?;
                    } else {
                        for report in &summary.reports {
                            println!(
                                "{} ({}): {} new, {} already known, {} dropped",
                                report.day,
                                report.date,
                                report.inserted,
                                report.duplicates,
                                report.dropped_tokens
                            );
                        }
                        for failure in &summary.failed_days {
                            eprintln!("{}: {}", failure.day, failure.error);
                        }
                    }
                }
            }
        }
        Commands::Assemble => {
            let report = pipeline.assemble(now())?;
            if cli.json {
                print_json(&report)?;
            } else {
                for path in report.assembled.iter().chain(&report.already_present) {
                    println!("Assembled {}", path.display());
                }
                for gap in &report.gaps {
                    println!("No segments: {gap}");
                }
                for failure in &report.failed {
                    eprintln!("Failed: {} ({})", failure.programme, failure.error);
                }
                if let Some(waiting) = &report.awaiting_successor {
                    println!("Waiting for next programme: {waiting}");
                }
            }
        }
        Commands::Sweep { days } => {
            let report = pipeline.sweep(now(), days)?;
            if cli.json {
                print_json(&report)?;
            } else {
                println!(
                    "Deleted {} segment(s) older than {}, kept {}",
                    report.deleted.len(),
                    report.cutoff.format("%Y-%m-%d %H:%M"),
                    report.retained
                );
            }
        }
        Commands::Schedule { limit } => {
            let programmes = pipeline.store().list_recent(limit)?;
            if cli.json {
                print_json(&programmes)?;
            } else if programmes.is_empty() {
                println!("No programmes stored.");
            } else {
                for p in &programmes {
                    let marker = if p.is_assembled() { "✓" } else { " " };
                    println!("[{marker}] {}", p.display_line());
                }
            }
        }
        Commands::Config { .. } => unreachable!("handled above"),
    }
    Ok(())
}
