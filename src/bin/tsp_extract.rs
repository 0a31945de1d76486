//! CLI tool for extracting the TSP ID from a PDF invoice
//!
//! Prints the result as JSON on stdout; logs go to stderr (see `RUST_LOG`).

use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::process;
use std::time::Instant;
use tsp_extractor::{extract_tsp_id_with, Envelope, ExtractionResult, ExtractorConfig, Strategy};

#[derive(Debug, Clone, Copy, ValueEnum, Default)]
enum StrategyArg {
    /// Heading boundary with candidate scoring (default)
    #[default]
    Layout,
    /// First 6-digit number in the page text
    FirstMatch,
}

impl From<StrategyArg> for Strategy {
    fn from(arg: StrategyArg) -> Self {
        match arg {
            StrategyArg::Layout => Strategy::Layout,
            StrategyArg::FirstMatch => Strategy::FirstMatch,
        }
    }
}

/// Extract the TSP ID from the first page of a PDF invoice
#[derive(Parser, Debug)]
#[command(name = "tsp-extract")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the PDF file
    pdf: PathBuf,

    /// Extraction strategy
    #[arg(short, long, value_enum, default_value_t = StrategyArg::Layout)]
    strategy: StrategyArg,

    /// Wrap the result in the {success, results, error} envelope
    /// (always on for first-match)
    #[arg(short, long)]
    envelope: bool,

    /// Heading that closes the header section
    #[arg(long)]
    heading: Option<String>,

    /// Shorter heading tried when the full one is missing
    #[arg(long)]
    partial_heading: Option<String>,

    /// Single-line JSON instead of pretty-printed
    #[arg(long)]
    compact: bool,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args = Args::parse();
    let start = Instant::now();

    let mut config = ExtractorConfig::default();
    if let Some(heading) = args.heading.clone() {
        config.heading = heading;
    }
    if let Some(partial) = args.partial_heading.clone() {
        config.partial_heading = partial;
    }

    let use_envelope = args.envelope || matches!(args.strategy, StrategyArg::FirstMatch);

    let result = if args.pdf.exists() {
        let strategy = Strategy::from(args.strategy).build(config);
        extract_tsp_id_with(&args.pdf, strategy.as_ref())
    } else {
        ExtractionResult::failure(format!("File not found: {}", args.pdf.display()))
    };

    let json = if use_envelope {
        let envelope = Envelope::from_result(&result, start.elapsed().as_millis() as u64);
        to_json(&envelope, args.compact)
    } else {
        to_json(&result, args.compact)
    };

    match json {
        Ok(json) => println!("{}", json),
        Err(e) => {
            eprintln!("Error: failed to serialize result: {}", e);
            process::exit(1);
        }
    }

    if !result.is_success() {
        process::exit(1);
    }
}

fn to_json<T: serde::Serialize>(value: &T, compact: bool) -> serde_json::Result<String> {
    if compact {
        serde_json::to_string(value)
    } else {
        serde_json::to_string_pretty(value)
    }
}
