use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "shutter-sort")]
#[command(about = "Content-addressed photo and video catalog organizer", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Scan sources into the catalog, link related files and plan destinations
    Organize {
        /// Source tree to ingest
        src: PathBuf,
        /// Destination root destinations are planned beneath
        dest: PathBuf,
        /// Already-organized archive scanned first; its copies win naming ties
        #[arg(long)]
        seed_output: Option<PathBuf>,
        /// Catalog database path (defaults to the configured filename under dest)
        #[arg(long)]
        db: Option<PathBuf>,
        /// Enable perceptual-fingerprint lineage matching
        #[arg(long)]
        use_phash: bool,
        /// Scan workers for the probe phase (capped at 8)
        #[arg(long)]
        max_workers: Option<usize>,
    },
    /// Export unmatched-RAW and unclassified-file CSV reports
    Report {
        /// Catalog database path
        db: PathBuf,
        /// Directory the CSV files are written into
        out_dir: PathBuf,
    },
    /// Print configuration values
    PrintConfig,
    /// Truncate catalog tables
    TruncateDb {
        /// Catalog database path
        db: PathBuf,
    },
}
