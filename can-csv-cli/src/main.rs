//! CAN CSV Decoder CLI Application
//!
//! Command-line interface for the can-csv-decoder library. It adds:
//! - DBC/CSV/output path handling (flags or config.toml)
//! - Logging setup
//! - Optional parallel row decoding
//! - CSV or JSON-lines output and a run summary

use anyhow::{Context, Result};
use can_csv_decoder::{
    CsvLogReader, Decoder, DecoderConfig, InputRecord, PipelineStats, RowOutcome, RowPipeline,
    SignalSink,
};
use clap::Parser;
use rayon::prelude::*;
use std::path::PathBuf;

mod config;
mod output;

use config::{AppConfig, OutputFormat};

/// CAN CSV Decoder - Decode logged CAN frames into signal values
#[derive(Parser, Debug)]
#[command(name = "can-csv-cli")]
#[command(about = "Decode CAN frames logged as CSV using DBC signal definitions", long_about = None)]
#[command(version)]
struct Args {
    /// Path to CSV log file (columns: timestamp, can_id, data)
    #[arg(short, long, value_name = "FILE")]
    input: Option<PathBuf>,

    /// Path to DBC file(s) (can be repeated; first definition of an ID wins)
    #[arg(long, value_name = "FILE")]
    dbc: Vec<PathBuf>,

    /// Output file for decoded signals [default: decoded_signals.csv]
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum)]
    format: Option<OutputFormat>,

    /// Path to configuration file (config.toml)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Reject payloads shorter than the message length instead of decoding what fits
    #[arg(long)]
    strict: bool,

    /// Report raw numbers instead of value-table labels
    #[arg(long)]
    no_choices: bool,

    /// Decode rows in parallel
    #[arg(short = 'j', long)]
    parallel: bool,

    /// Maximum number of rows to process (for testing)
    #[arg(long, value_name = "COUNT")]
    max_rows: Option<usize>,

    /// Verbosity level (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long)]
    quiet: bool,
}

/// Effective settings after merging config file and flags
#[derive(Debug, Clone)]
struct RunSettings {
    dbc_files: Vec<PathBuf>,
    input: Option<PathBuf>,
    output: PathBuf,
    format: OutputFormat,
    decoder: DecoderConfig,
    parallel: bool,
    max_rows: Option<usize>,
}

impl RunSettings {
    /// Flags override the config file
    fn resolve(args: &Args, config: AppConfig) -> Self {
        let mut decoder = config.decoding;
        if args.strict {
            decoder.allow_truncated = false;
        }
        if args.no_choices {
            decoder.decode_choices = false;
        }

        Self {
            dbc_files: if args.dbc.is_empty() {
                config.input.dbc_files
            } else {
                args.dbc.clone()
            },
            input: args.input.clone().or(config.input.csv_file),
            output: args.output.clone().unwrap_or(config.output.file),
            format: args.format.unwrap_or(config.output.format),
            decoder,
            parallel: args.parallel || config.processing.parallel,
            max_rows: args.max_rows.or(config.processing.max_rows),
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(args.verbose, args.quiet);

    log::info!("CAN CSV Decoder CLI v{}", env!("CARGO_PKG_VERSION"));
    log::info!("Using decoder library v{}", can_csv_decoder::VERSION);

    let config = match &args.config {
        Some(path) => {
            log::info!("Loading configuration from: {:?}", path);
            config::load_config(path)?
        }
        None => AppConfig::default(),
    };
    let settings = RunSettings::resolve(&args, config);

    if settings.dbc_files.is_empty() || settings.input.is_none() {
        println!("CAN CSV Decoder - No input specified");
        println!("\nQuick Start:");
        println!("  can-csv-cli --dbc Small_CAR_CANbus.dbc --input can_log.csv");
        println!("  can-csv-cli --dbc car.dbc --input can_log.csv --format jsonl -o out.jsonl");
        println!("\nWith a configuration file:");
        println!("  can-csv-cli --config config.toml");
        println!("\nUse --help for more options");
        return Ok(());
    }

    match run(&settings) {
        Ok(stats) => {
            if !args.quiet {
                println!("Rows processed:   {}", stats.rows_seen);
                println!("Rows skipped:     {}", stats.rows_skipped);
                println!("Signals decoded:  {}", stats.signals_produced);
                println!("Output written:   {:?}", settings.output);
            }
            log::info!("CAN data analysis completed successfully");
            Ok(())
        }
        Err(e) => {
            log::error!("Analysis failed: {:#}", e);
            Err(e)
        }
    }
}

/// Load the DBC files, decode the CSV log and write the output
fn run(settings: &RunSettings) -> Result<PipelineStats> {
    let mut decoder = Decoder::with_config(settings.decoder.clone());
    for dbc_path in &settings.dbc_files {
        decoder
            .add_dbc(dbc_path)
            .with_context(|| format!("Error parsing DBC file: {:?}", dbc_path))?;
    }

    let db_stats = decoder.database_stats();
    log::info!(
        "Signal database: {} messages, {} signals",
        db_stats.num_messages,
        db_stats.num_signals
    );

    let input = settings
        .input
        .as_ref()
        .context("No input CSV file given")?;
    let reader = CsvLogReader::open(input)
        .with_context(|| format!("Error reading CSV file: {:?}", input))?;

    let mut sink = output::create_sink(&settings.output, settings.format)?;
    let records = reader
        .records()
        .take(settings.max_rows.unwrap_or(usize::MAX));

    let mut pipeline = RowPipeline::new(&decoder);
    let stats = if settings.parallel {
        run_parallel(&mut pipeline, records, sink.as_mut())?
    } else {
        pipeline
            .run(records, sink.as_mut())
            .with_context(|| format!("Error writing output file: {:?}", settings.output))?
    };

    log::info!("Saved decoded data to {:?}", settings.output);
    Ok(stats)
}

/// Decode all rows on the rayon pool, then write them in input order
fn run_parallel<I>(
    pipeline: &mut RowPipeline<'_>,
    records: I,
    sink: &mut dyn SignalSink,
) -> Result<PipelineStats>
where
    I: Iterator<Item = can_csv_decoder::Result<InputRecord>>,
{
    let records = records.collect::<can_csv_decoder::Result<Vec<_>>>()?;
    log::debug!("Decoding {} rows in parallel", records.len());

    let shared: &RowPipeline<'_> = pipeline;
    let outcomes: Vec<RowOutcome> = records
        .par_iter()
        .map(|record| shared.decode_record(record))
        .collect();

    for (record, outcome) in records.iter().zip(outcomes) {
        pipeline.accept(record, outcome, &mut *sink)?;
    }
    sink.finish()?;

    let stats = pipeline.stats();
    log::info!("{}", stats);
    Ok(stats)
}

/// Initialize logging based on verbosity level
fn init_logging(verbose: u8, quiet: bool) {
    use env_logger::Builder;
    use log::LevelFilter;
    use std::io::Write;

    let level = if quiet {
        LevelFilter::Error
    } else {
        match verbose {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    };

    Builder::new()
        .filter_level(level)
        .format(|buf, record| {
            writeln!(
                buf,
                "[{} {}] {}",
                record.level(),
                record.target(),
                record.args()
            )
        })
        .init();
}
