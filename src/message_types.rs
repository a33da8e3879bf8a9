//! ITCH 5.0 message classification and the normalized message shape the
//! rest of the pipeline operates on.

/// Order side. `BadSide` bytes (anything but `B`/`S`) are rejected by the
/// decoder before a `Side` is ever constructed — see `decoder::DecodeError`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn from_byte(byte: u8) -> Option<Side> {
        match byte {
            b'B' => Some(Side::Buy),
            b'S' => Some(Side::Sell),
            _ => None,
        }
    }
}

pub type OrderRef = u64;
pub type Shares = u32;
pub type Price = u32;

/// A decoded, venue-agnostic message. This is the sole interface between
/// the frame decoder and the order book: the book never sees a type byte
/// or a raw offset again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NormalizedMessage {
    Add {
        order_ref: OrderRef,
        side: Side,
        shares: Shares,
        price: Price,
    },
    Execute {
        order_ref: OrderRef,
        executed_shares: Shares,
    },
    Cancel {
        order_ref: OrderRef,
        cancelled_shares: Shares,
    },
    Delete {
        order_ref: OrderRef,
    },
    Replace {
        old_ref: OrderRef,
        new_ref: OrderRef,
        shares: Shares,
        price: Price,
    },
    /// Recognized-but-unmodeled or anomalous message; carries the raw type
    /// byte for observability only.
    Ignored(u8),
}
