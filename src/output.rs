//! Result stream encoding: one (call, put) pair per non-`Ignored` input
//! message, in either binary or textual mode (spec.md §6).
//!
//! Grounded on the teacher's `write_orderbook` buffered-writer pattern
//! (`BufWriter`, explicit flush discipline) generalized from a fixed
//! depth-10 CSV ladder to the spec's two output encodings.

use std::io::{self, Write};

use clap::ValueEnum;

use crate::pricer::OptionPrices;

/// `ValueEnum` lets `clap` validate `--output-mode` itself (unknown values
/// become a clean usage error, not a value the crate has to reject later).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputMode {
    #[default]
    Binary,
    Text,
}

impl std::str::FromStr for OutputMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "binary" => Ok(OutputMode::Binary),
            "text" => Ok(OutputMode::Text),
            other => Err(format!("unrecognized output mode: {other}")),
        }
    }
}

/// Writes one encoded result per call to `write_pair`. Buffering and flush
/// cadence mirror the teacher's `BufWriter`-backed writer.
pub struct ResultWriter<W: Write> {
    inner: W,
    mode: OutputMode,
}

impl<W: Write> ResultWriter<W> {
    pub fn new(inner: W, mode: OutputMode) -> Self {
        ResultWriter { inner, mode }
    }

    /// Binary mode: 8 bytes little-endian, call then put as IEEE-754 f32.
    /// Text mode: one line `Call=<f>  Put=<f>` formatted to 6 decimals.
    pub fn write_pair(&mut self, prices: OptionPrices) -> io::Result<()> {
        match self.mode {
            OutputMode::Binary => {
                self.inner.write_all(&prices.call.to_le_bytes())?;
                self.inner.write_all(&prices.put.to_le_bytes())?;
            }
            OutputMode::Text => {
                writeln!(self.inner, "Call={:.6}  Put={:.6}", prices.call, prices.put)?;
            }
        }
        Ok(())
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}
