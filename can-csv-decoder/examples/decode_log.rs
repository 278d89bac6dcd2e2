//! Example: decode a CSV log with one or more DBC files and print the signals
//!
//! Usage:
//!   cargo run --example decode_log -- can_log.csv --dbc Small_CAR_CANbus.dbc [--limit 20]

use can_csv_decoder::{CsvLogReader, DecodedSignal, Decoder, RowPipeline, SignalSink};
use std::collections::HashMap;
use std::env;
use std::path::PathBuf;

/// Prints decoded signals and counts them per message
#[derive(Default)]
struct PrintSink {
    per_message: HashMap<String, usize>,
}

impl SignalSink for PrintSink {
    fn write_signal(&mut self, signal: &DecodedSignal) -> can_csv_decoder::Result<()> {
        *self
            .per_message
            .entry(signal.message_name.clone())
            .or_insert(0) += 1;

        let Some(name) = &signal.signal_name else {
            println!(
                "[{}] {} {} (no signals)",
                signal.timestamp,
                signal.can_id_hex(),
                signal.message_name
            );
            return Ok(());
        };

        let value = match (&signal.state, signal.physical_value, &signal.raw_value) {
            (Some(state), _, _) => format!("\"{}\"", state),
            (None, Some(physical), _) => format!("{:.3} {}", physical, signal.unit),
            (None, None, Some(raw)) => format!("raw {}", raw),
            (None, None, None) => "N/A".to_string(),
        };
        println!(
            "[{}] {} {}.{}: {}",
            signal.timestamp,
            signal.can_id_hex(),
            signal.message_name,
            name,
            value
        );
        Ok(())
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        eprintln!("Usage: {} <can_log.csv> [--dbc <file.dbc>] [--limit <rows>]", args[0]);
        eprintln!("\nExample:");
        eprintln!("  {} can_log.csv --dbc Small_CAR_CANbus.dbc --limit 100", args[0]);
        std::process::exit(1);
    }

    let log_file = PathBuf::from(&args[1]);
    let mut dbc_files = Vec::new();
    let mut limit: Option<usize> = None;

    let mut i = 2;
    while i < args.len() {
        match args[i].as_str() {
            "--dbc" => {
                i += 1;
                if i < args.len() {
                    dbc_files.push(PathBuf::from(&args[i]));
                }
            }
            "--limit" => {
                i += 1;
                if i < args.len() {
                    limit = Some(args[i].parse()?);
                }
            }
            _ => {
                eprintln!("Unknown argument: {}", args[i]);
            }
        }
        i += 1;
    }

    let mut decoder = Decoder::new();
    for dbc_file in &dbc_files {
        println!("Loading DBC: {:?}", dbc_file);
        decoder.add_dbc(dbc_file)?;
    }

    let db_stats = decoder.database_stats();
    println!("\n=== SIGNAL DATABASE ===");
    println!("Messages: {}", db_stats.num_messages);
    println!("Signals: {}", db_stats.num_signals);
    if db_stats.num_messages == 0 {
        println!("Warning: no signal definitions loaded, every frame will be Unknown_<ID>");
    }

    println!("\n=== DECODING LOG FILE ===\n");
    let reader = CsvLogReader::open(&log_file)?;
    let records = reader.records().take(limit.unwrap_or(usize::MAX));

    let mut sink = PrintSink::default();
    let stats = RowPipeline::new(&decoder).run(records, &mut sink)?;

    println!("\n=== SUMMARY ===");
    println!("{}", stats);
    let mut messages: Vec<_> = sink.per_message.into_iter().collect();
    messages.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    for (name, count) in messages.iter().take(10) {
        println!("  {:<24} {}", name, count);
    }

    Ok(())
}
