mod cli;
mod console;
mod logging;

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process;

use clap::{CommandFactory, Parser};
use cli::{Cli, Commands};
use colored::*;
use console::CliReporter;
use dotenv::dotenv;
use shutter_sort::catalog::Catalog;
use shutter_sort::{report, AppConfig, OrganizeEngine, RunSummary, ScanSource};
use tracing::error;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();

    let _guard = logging::init_logger();

    let config = match AppConfig::load() {
        Ok(config) => config,
        Err(err) => {
            error!("Error loading configuration: {}", err);
            process::exit(1);
        }
    };

    let args = Cli::parse();

    match args.command {
        Some(Commands::Organize {
            src,
            dest,
            seed_output,
            db,
            use_phash,
            max_workers,
        }) => {
            let mut config = config;
            if use_phash {
                config.use_phash = true;
            }
            if let Some(workers) = max_workers {
                config.workers = workers;
            }
            let db_path = db.unwrap_or_else(|| dest.join(&config.db_filename));
            if let Err(err) = run_organize(config, src, dest, seed_output, db_path) {
                error!("Error: {}", err);
                process::exit(1);
            }
        }
        Some(Commands::Report { db, out_dir }) => {
            if let Err(err) = run_report(&db, &out_dir) {
                error!("Error: {}", err);
                process::exit(1);
            }
        }
        Some(Commands::PrintConfig) => {
            println!("Configuration: {:?}", config);
        }
        Some(Commands::TruncateDb { db }) => {
            match prompt_confirm(
                "Are you SURE you want to COMPLETELY DELETE the catalog?",
                Some(false),
            ) {
                Ok(true) => match Catalog::open(&db) {
                    Ok(catalog) => {
                        if let Err(e) = catalog.truncate_all() {
                            error!("Error truncating catalog: {}", e);
                        } else {
                            println!("All tables truncated");
                        }
                    }
                    Err(e) => error!("Error opening catalog: {}", e),
                },
                _ => {
                    process::exit(0);
                }
            }
        }
        None => {
            let _ = Cli::command().print_long_help();
        }
    }

    Ok(())
}

fn run_organize(
    config: AppConfig,
    src: PathBuf,
    dest: PathBuf,
    seed: Option<PathBuf>,
    db_path: PathBuf,
) -> Result<(), Box<dyn std::error::Error>> {
    std::fs::create_dir_all(&dest)?;

    // Seed first so its occurrences take first-seen priority.
    let mut sources = Vec::new();
    if let Some(seed_root) = seed {
        sources.push(ScanSource {
            root: seed_root,
            is_seed: true,
        });
    }
    sources.push(ScanSource {
        root: src,
        is_seed: false,
    });

    let engine = OrganizeEngine::new(config, db_path);
    let reporter = CliReporter::new();
    let summary = engine.organize(&sources, &dest, &reporter)?;

    println!();
    print_summary(&summary);
    Ok(())
}

fn print_summary(summary: &RunSummary) {
    println!(
        "Scan: {}, Link: {}, Plan: {}",
        format!("{:.2}s", summary.scan_duration.as_secs_f64()).green(),
        format!("{:.2}s", summary.link_duration.as_secs_f64()).green(),
        format!("{:.2}s", summary.plan_duration.as_secs_f64()).green(),
    );
    println!(
        "{} files, {} new, {} duplicates, {} promoted, {} skipped",
        format!("{}", summary.files_processed).cyan(),
        format!("{}", summary.new_records).green(),
        format!("{}", summary.duplicates).yellow(),
        format!("{}", summary.promotions).yellow(),
        format!("{}", summary.skipped_files).red(),
    );
    println!(
        "{} capture times from paths, {} from mtime",
        format!("{}", summary.path_inferences).yellow(),
        format!("{}", summary.mtime_fallbacks).yellow(),
    );
    println!(
        "{} sidecar links, {} output links, {} destinations planned ({} ambiguous groups)",
        format!("{}", summary.sidecar_links).cyan(),
        format!("{}", summary.output_links).cyan(),
        format!("{}", summary.planned_destinations).green(),
        format!("{}", summary.ambiguous_groups).yellow(),
    );
}

fn run_report(db: &Path, out_dir: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let catalog = Catalog::open(db)?;
    let unmatched = report::write_unmatched_raws(
        &catalog,
        &out_dir.join(report::UNMATCHED_RAWS_FILENAME),
    )?;
    let unclassified =
        report::write_unclassified(&catalog, &out_dir.join(report::UNCLASSIFIED_FILENAME))?;
    println!(
        "{} unmatched RAWs, {} unclassified files written to {}",
        format!("{}", unmatched).red(),
        format!("{}", unclassified).yellow(),
        out_dir.display()
    );
    Ok(())
}

fn prompt_confirm(prompt: &str, default: Option<bool>) -> io::Result<bool> {
    let mut input = String::new();

    loop {
        input.clear();

        match default {
            Some(true) => print!("{} (Y/n): ", prompt),
            Some(false) | None => print!("{} (y/N): ", prompt),
        }
        io::stdout().flush()?;

        io::stdin().read_line(&mut input)?;

        match input.trim().to_uppercase().as_str() {
            "Y" => return Ok(true),
            "N" => return Ok(false),
            "" => match default {
                Some(default) => return Ok(default),
                None => continue,
            },
            _ => continue,
        }
    }
}
