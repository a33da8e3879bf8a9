//! Wires decoder → order book → pricer → output writer into the single
//! pipeline described by spec.md §2.
//!
//! Grounded on the teacher's `parser::process_itch_file` loop shape (a
//! cursor advanced frame-by-frame, periodic `tracing::info!` throughput
//! logging) generalized from "mmap one file, filter by symbol" to "decode
//! every frame in a byte slice, no symbol filter, emit a price pair for
//! every non-ignored message."

use std::collections::HashSet;
use std::io::Write;
use std::time::Instant;

use thiserror::Error;

use crate::decoder::{decode_next, DecodeError, DecodeOutcome};
use crate::message_types::NormalizedMessage;
use crate::orderbook::{Book, TopOfBook};
use crate::output::ResultWriter;
use crate::pricer::{black_scholes, spot_ticks, ticks_to_float, BsParams, OptionPrices};

/// Crate-level error boundary. Distinguishes the three fatal conditions of
/// spec.md §6.4 from the locally-recovered decode anomalies absorbed
/// inside `decode_next`/`classify`.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("failed to open input: {0}")]
    InputOpen(#[source] std::io::Error),
    #[error("irrecoverable framing error: {0}")]
    Framing(#[from] DecodeError),
    #[error("failed to write output: {0}")]
    OutputWrite(#[source] std::io::Error),
}

/// Run summary, surfaced to the caller on clean shutdown (spec.md §7
/// "messages=N ignored=M").
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineStats {
    pub messages: u64,
    pub ignored: u64,
}

/// Drive the full pipeline over an already-buffered byte slice, writing one
/// encoded (call, put) pair per non-`Ignored` message (or every message,
/// including `Ignored`, when `emit_on_ignored` is set).
///
/// `on_result` is called with the top-of-book and priced pair for every
/// message that produces one; the optional WebSocket server (§6.3) hangs
/// off this hook so the core pipeline never depends on transport types.
pub fn run_pipeline<W: Write>(
    data: &[u8],
    book: &mut Book,
    params: &BsParams,
    writer: &mut ResultWriter<W>,
    emit_on_ignored: bool,
    mut on_result: impl FnMut(TopOfBook, OptionPrices),
) -> Result<PipelineStats, PipelineError> {
    let mut cursor = 0usize;
    let mut ignored = 0u64;
    let mut messages = 0u64;
    let mut warned_kinds: HashSet<u8> = HashSet::new();
    let start = Instant::now();

    loop {
        let (outcome, consumed) = decode_next(&data[cursor..])?;
        cursor += consumed;

        let msg = match outcome {
            DecodeOutcome::EndOfStream => break,
            DecodeOutcome::Message(msg) => msg,
        };

        messages += 1;
        let is_ignored = matches!(msg, NormalizedMessage::Ignored(_));
        if let NormalizedMessage::Ignored(kind) = msg {
            ignored += 1;
            if warned_kinds.insert(kind) {
                tracing::warn!("ignored message kind: {:?}", kind as char);
            }
        }

        let top = book.apply(msg);

        if !is_ignored || emit_on_ignored {
            let spot = ticks_to_float(spot_ticks(top));
            let prices = black_scholes(spot, params);
            writer
                .write_pair(prices)
                .map_err(PipelineError::OutputWrite)?;
            on_result(top, prices);
        }

        if messages % 10_000_000 == 0 {
            let elapsed = start.elapsed().as_secs_f64().max(1e-9);
            tracing::info!(
                "processed {} messages, {:.2} messages/sec",
                messages,
                messages as f64 / elapsed
            );
        }
    }

    writer.flush().map_err(PipelineError::OutputWrite)?;
    tracing::info!("messages={} ignored={}", messages, ignored);

    Ok(PipelineStats { messages, ignored })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::OutputMode;

    fn frame(payload: &[u8]) -> Vec<u8> {
        let mut out = (payload.len() as u16).to_be_bytes().to_vec();
        out.extend_from_slice(payload);
        out
    }

    fn add_payload(order_ref: u64, side: u8, shares: u32, price: u32) -> Vec<u8> {
        let mut p = vec![0u8; 36];
        p[0] = b'A';
        p[11..19].copy_from_slice(&order_ref.to_be_bytes());
        p[19] = side;
        p[20..24].copy_from_slice(&shares.to_be_bytes());
        p[32..36].copy_from_slice(&price.to_be_bytes());
        p
    }

    #[test]
    fn one_message_in_one_pair_out() {
        let mut data = Vec::new();
        data.extend(frame(&add_payload(1, b'B', 100, 1_000_000))); // S = 100.0
        data.extend_from_slice(&[0u8, 0u8]); // end-of-session

        let mut book = Book::new();
        let params = BsParams::default();
        let mut buf = Vec::new();
        let mut writer = ResultWriter::new(&mut buf, OutputMode::Binary);

        let stats = run_pipeline(&data, &mut book, &params, &mut writer, false, |_, _| {}).unwrap();
        assert_eq!(stats.messages, 1);
        assert_eq!(stats.ignored, 0);
        assert_eq!(buf.len(), 8);
    }

    #[test]
    fn ignored_messages_produce_no_pair_by_default() {
        let mut data = Vec::new();
        data.extend(frame(&[b'S', 0, 0, 0, 0, 0, 0, 0, 0, 0])); // system event, arbitrary length
        data.extend_from_slice(&[0u8, 0u8]);

        let mut book = Book::new();
        let params = BsParams::default();
        let mut buf = Vec::new();
        let mut writer = ResultWriter::new(&mut buf, OutputMode::Binary);

        let stats = run_pipeline(&data, &mut book, &params, &mut writer, false, |_, _| {}).unwrap();
        assert_eq!(stats.messages, 1);
        assert_eq!(stats.ignored, 1);
        assert!(buf.is_empty());
    }

    #[test]
    fn emit_on_ignored_writes_zero_pair() {
        let mut data = Vec::new();
        data.extend(frame(&[b'S', 0, 0, 0, 0, 0, 0, 0, 0, 0]));
        data.extend_from_slice(&[0u8, 0u8]);

        let mut book = Book::new();
        let params = BsParams::default();
        let mut buf = Vec::new();
        let mut writer = ResultWriter::new(&mut buf, OutputMode::Binary);

        let stats = run_pipeline(&data, &mut book, &params, &mut writer, true, |_, _| {}).unwrap();
        assert_eq!(stats.ignored, 1);
        assert_eq!(buf.len(), 8);
        let call = f32::from_le_bytes(buf[0..4].try_into().unwrap());
        let put = f32::from_le_bytes(buf[4..8].try_into().unwrap());
        assert_eq!(call, 0.0);
        assert_eq!(put, 0.0);
    }

    #[test]
    fn short_read_is_fatal() {
        let data = vec![0u8, 10u8, 1, 2, 3]; // declares 10 bytes, has 3
        let mut book = Book::new();
        let params = BsParams::default();
        let mut buf = Vec::new();
        let mut writer = ResultWriter::new(&mut buf, OutputMode::Binary);

        let result = run_pipeline(&data, &mut book, &params, &mut writer, false, |_, _| {});
        assert!(matches!(result, Err(PipelineError::Framing(DecodeError::ShortRead))));
    }

    #[test]
    fn s6_zero_length_terminates_cleanly_with_no_messages() {
        let data = vec![0u8, 0u8, 0xAA, 0xBB];
        let mut book = Book::new();
        let params = BsParams::default();
        let mut buf = Vec::new();
        let mut writer = ResultWriter::new(&mut buf, OutputMode::Binary);

        let stats = run_pipeline(&data, &mut book, &params, &mut writer, false, |_, _| {}).unwrap();
        assert_eq!(stats, PipelineStats::default());
    }
}
