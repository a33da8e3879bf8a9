//! ITCH frame decoder: `LEN[2 BE] PAYLOAD[LEN]` framing over a byte slice,
//! classified into a `NormalizedMessage`.
//!
//! This mirrors the cursor-and-offset style of the teacher's
//! `parser::process_itch_file`, generalized from "scan a whole mmap'd file
//! for one symbol" to "decode exactly one frame per call for any symbol."

use thiserror::Error;

use crate::message_types::{NormalizedMessage, Side};

const LEN_PREFIX: usize = 2;

/// What a successful `decode_next` call produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeOutcome {
    Message(NormalizedMessage),
    /// A `LEN == 0` frame, or the input slice is fully drained.
    EndOfStream,
}

/// The only decoder condition that aborts the pipeline. Length mismatches
/// and bad side bytes are recovered locally into `Ignored` — see
/// `decode_next`.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    #[error("short read: frame declared more bytes than the stream can supply")]
    ShortRead,
}

/// Decode exactly one frame from the front of `input`.
///
/// Returns the outcome and the number of bytes consumed from `input` so the
/// caller can advance its cursor. Consumes nothing on `Err`.
pub fn decode_next(input: &[u8]) -> Result<(DecodeOutcome, usize), DecodeError> {
    if input.is_empty() {
        return Ok((DecodeOutcome::EndOfStream, 0));
    }
    if input.len() < LEN_PREFIX {
        return Err(DecodeError::ShortRead);
    }

    let len = u16::from_be_bytes([input[0], input[1]]) as usize;
    if len == 0 {
        // Any further bytes are ignored per the framing contract.
        return Ok((DecodeOutcome::EndOfStream, input.len()));
    }

    let frame_end = LEN_PREFIX + len;
    if input.len() < frame_end {
        return Err(DecodeError::ShortRead);
    }

    let payload = &input[LEN_PREFIX..frame_end];
    let message = classify(payload);
    Ok((DecodeOutcome::Message(message), frame_end))
}

fn read_u32(payload: &[u8], offset: usize) -> u32 {
    u32::from_be_bytes(payload[offset..offset + 4].try_into().unwrap())
}

fn read_u64(payload: &[u8], offset: usize) -> u64 {
    u64::from_be_bytes(payload[offset..offset + 8].try_into().unwrap())
}

/// Classify a payload (type byte at offset 0) into a `NormalizedMessage`,
/// applying the offset table of the spec's §4.1 for the six modeled types.
fn classify(payload: &[u8]) -> NormalizedMessage {
    let type_byte = payload[0];
    match type_byte {
        b'A' => {
            if payload.len() != 36 {
                return NormalizedMessage::Ignored(type_byte);
            }
            match Side::from_byte(payload[19]) {
                Some(side) => NormalizedMessage::Add {
                    order_ref: read_u64(payload, 11),
                    side,
                    shares: read_u32(payload, 20),
                    price: read_u32(payload, 32),
                },
                None => NormalizedMessage::Ignored(type_byte),
            }
        }
        b'E' => {
            if payload.len() != 31 {
                return NormalizedMessage::Ignored(type_byte);
            }
            NormalizedMessage::Execute {
                order_ref: read_u64(payload, 11),
                executed_shares: read_u32(payload, 19),
            }
        }
        b'C' => {
            if payload.len() != 36 {
                return NormalizedMessage::Ignored(type_byte);
            }
            // ExecuteWithPrice normalizes to Execute: the matched price is
            // informational and doesn't affect book state (spec.md §3.2).
            NormalizedMessage::Execute {
                order_ref: read_u64(payload, 11),
                executed_shares: read_u32(payload, 19),
            }
        }
        b'X' => {
            if payload.len() != 23 {
                return NormalizedMessage::Ignored(type_byte);
            }
            NormalizedMessage::Cancel {
                order_ref: read_u64(payload, 11),
                cancelled_shares: read_u32(payload, 19),
            }
        }
        b'D' => {
            if payload.len() != 19 {
                return NormalizedMessage::Ignored(type_byte);
            }
            NormalizedMessage::Delete {
                order_ref: read_u64(payload, 11),
            }
        }
        b'U' => {
            if payload.len() != 35 {
                return NormalizedMessage::Ignored(type_byte);
            }
            NormalizedMessage::Replace {
                old_ref: read_u64(payload, 11),
                new_ref: read_u64(payload, 19),
                shares: read_u32(payload, 27),
                price: read_u32(payload, 31),
            }
        }
        other => NormalizedMessage::Ignored(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

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
    fn decodes_add_order() {
        let payload = add_payload(1, b'B', 100, 10_000);
        let bytes = frame(&payload);
        let (outcome, consumed) = decode_next(&bytes).unwrap();
        assert_eq!(consumed, bytes.len());
        assert_eq!(
            outcome,
            DecodeOutcome::Message(NormalizedMessage::Add {
                order_ref: 1,
                side: Side::Buy,
                shares: 100,
                price: 10_000,
            })
        );
    }

    #[test]
    fn execute_with_price_normalizes_to_execute() {
        let mut p = vec![0u8; 36];
        p[0] = b'C';
        p[11..19].copy_from_slice(&7u64.to_be_bytes());
        p[19..23].copy_from_slice(&40u32.to_be_bytes());
        let bytes = frame(&p);
        let (outcome, _) = decode_next(&bytes).unwrap();
        assert_eq!(
            outcome,
            DecodeOutcome::Message(NormalizedMessage::Execute {
                order_ref: 7,
                executed_shares: 40,
            })
        );
    }

    #[test]
    fn zero_length_frame_is_end_of_stream() {
        let bytes = [0u8, 0u8, 0xAA, 0xBB];
        let (outcome, consumed) = decode_next(&bytes).unwrap();
        assert_eq!(outcome, DecodeOutcome::EndOfStream);
        assert_eq!(consumed, bytes.len());
    }

    #[test]
    fn short_read_is_surfaced_not_malformed() {
        let bytes = [0u8, 10u8, 1, 2, 3]; // declares 10 payload bytes, has 3
        assert_eq!(decode_next(&bytes), Err(DecodeError::ShortRead));
    }

    #[test]
    fn bad_side_is_ignored_not_fatal() {
        let payload = add_payload(1, b'Z', 100, 10_000);
        let bytes = frame(&payload);
        let (outcome, consumed) = decode_next(&bytes).unwrap();
        assert_eq!(consumed, bytes.len());
        assert_eq!(outcome, DecodeOutcome::Message(NormalizedMessage::Ignored(b'A')));
    }

    #[test]
    fn length_mismatch_is_ignored_not_fatal() {
        // Declares type 'A' but with a payload shorter than the Add spec length.
        let mut payload = vec![0u8; 20];
        payload[0] = b'A';
        let bytes = frame(&payload);
        let (outcome, _) = decode_next(&bytes).unwrap();
        assert_eq!(outcome, DecodeOutcome::Message(NormalizedMessage::Ignored(b'A')));
    }

    #[test]
    fn unknown_type_is_ignored() {
        let payload = vec![b'Z'; 5];
        let bytes = frame(&payload);
        let (outcome, _) = decode_next(&bytes).unwrap();
        assert_eq!(outcome, DecodeOutcome::Message(NormalizedMessage::Ignored(b'Z')));
    }

    #[test]
    fn empty_input_is_end_of_stream() {
        let (outcome, consumed) = decode_next(&[]).unwrap();
        assert_eq!(outcome, DecodeOutcome::EndOfStream);
        assert_eq!(consumed, 0);
    }
}
