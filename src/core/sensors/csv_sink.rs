//! Batched CSV output shared by the metadata writers.
//!
//! Records are buffered and flushed every N rows so a crash loses at most
//! one batch; shutdown is not relied on to flush a backlog. The header row
//! goes out with the first flush, so even an empty run leaves a parseable
//! file.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::Result;

pub struct CsvSink {
    path: PathBuf,
    header: &'static [&'static str],
    threshold: usize,
    file: Option<BufWriter<File>>,
    header_written: bool,
    rows: Vec<String>,
}

impl CsvSink {
    pub fn new(path: impl Into<PathBuf>, header: &'static [&'static str], threshold: usize) -> Self {
        Self {
            path: path.into(),
            header,
            threshold: threshold.max(1),
            file: None,
            header_written: false,
            rows: Vec::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Rows buffered since the last flush.
    pub fn buffered(&self) -> usize {
        self.rows.len()
    }

    /// Create (truncate) the output file and reset batching state.
    pub fn open(&mut self) -> Result<()> {
        self.file = Some(BufWriter::new(File::create(&self.path)?));
        self.header_written = false;
        self.rows.clear();
        Ok(())
    }

    /// Buffer one pre-joined CSV row, flushing when the batch is full.
    pub fn push(&mut self, row: String) -> Result<()> {
        self.rows.push(row);
        if self.rows.len() >= self.threshold {
            self.flush()?;
        }
        Ok(())
    }

    /// Write the header (first time) and every buffered row.
    pub fn flush(&mut self) -> Result<()> {
        if let Some(file) = self.file.as_mut() {
            if !self.header_written {
                writeln!(file, "{}", self.header.join(","))?;
                self.header_written = true;
            }
            for row in &self.rows {
                writeln!(file, "{}", row)?;
            }
            file.flush()?;
            log::debug!("{}: flushed {} rows", self.path.display(), self.rows.len());
        }
        self.rows.clear();
        Ok(())
    }

    /// Flush remaining rows and close the file.
    pub fn close(&mut self) -> Result<()> {
        self.flush()?;
        self.file = None;
        Ok(())
    }
}
