//! Output sinks for decoded signals

use crate::config::OutputFormat;
use anyhow::{Context, Result};
use can_csv_decoder::{CsvSignalWriter, DecodedSignal, SignalSink};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

/// Writes one JSON object per decoded signal
pub struct JsonLinesWriter<W: Write> {
    writer: BufWriter<W>,
}

impl<W: Write> JsonLinesWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            writer: BufWriter::new(inner),
        }
    }
}

impl<W: Write> SignalSink for JsonLinesWriter<W> {
    fn write_signal(&mut self, signal: &DecodedSignal) -> can_csv_decoder::Result<()> {
        serde_json::to_writer(&mut self.writer, signal).map_err(io::Error::from)?;
        self.writer.write_all(b"\n")?;
        Ok(())
    }

    fn finish(&mut self) -> can_csv_decoder::Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

/// Create the output file and wrap it in the sink for `format`
pub fn create_sink(path: &Path, format: OutputFormat) -> Result<Box<dyn SignalSink>> {
    let sink: Box<dyn SignalSink> = match format {
        OutputFormat::Csv => Box::new(
            CsvSignalWriter::create(path)
                .with_context(|| format!("Failed to create output file: {:?}", path))?,
        ),
        OutputFormat::Jsonl => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create output file: {:?}", path))?;
            Box::new(JsonLinesWriter::new(file))
        }
    };
    Ok(sink)
}
