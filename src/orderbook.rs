//! Single-instrument limit order book: per-order index, per-price-level
//! aggregation, and the mutation algebra for add/execute/cancel/delete/
//! replace.
//!
//! Container choice is carried from the teacher's `OrderBook`
//! (`rustc_hash::FxHashMap` keyed by order ref, `BTreeMap<Price, _>` per
//! side for ordered level lookup) rather than the CSV-row-writing state
//! machine it was embedded in there.

use rustc_hash::FxHashMap;
use std::collections::BTreeMap;

use crate::message_types::{NormalizedMessage, OrderRef, Price, Shares, Side};

#[derive(Debug, Clone, Copy)]
struct Order {
    side: Side,
    price: Price,
    remaining: Shares,
}

/// Top-of-book observable, emitted after every applied mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TopOfBook {
    pub best_bid: Option<Price>,
    pub best_ask: Option<Price>,
    pub order_count: u32,
}

/// The single mutable state of the order book stage.
pub struct Book {
    orders: FxHashMap<OrderRef, Order>,
    // BTreeMap keeps levels ordered by price; best_bid/best_ask are the
    // max/min key respectively. A level key is removed as soon as its
    // volume reaches zero (§3.4 invariant 2: live iff total_volume > 0).
    bid_levels: BTreeMap<Price, Shares>,
    ask_levels: BTreeMap<Price, Shares>,
    messages_applied: u64,
    ignored_count: u64,
}

impl Default for Book {
    fn default() -> Self {
        Self::new()
    }
}

impl Book {
    pub fn new() -> Self {
        Book {
            orders: FxHashMap::default(),
            bid_levels: BTreeMap::new(),
            ask_levels: BTreeMap::new(),
            messages_applied: 0,
            ignored_count: 0,
        }
    }

    pub fn messages_applied(&self) -> u64 {
        self.messages_applied
    }

    pub fn ignored_count(&self) -> u64 {
        self.ignored_count
    }

    pub fn order_count(&self) -> u32 {
        self.orders.len() as u32
    }

    fn levels_mut(&mut self, side: Side) -> &mut BTreeMap<Price, Shares> {
        match side {
            Side::Buy => &mut self.bid_levels,
            Side::Sell => &mut self.ask_levels,
        }
    }

    /// Apply one normalized message and return the top-of-book *after* the
    /// mutation. `Ignored` leaves state untouched but still reports the
    /// current top-of-book (I7).
    pub fn apply(&mut self, msg: NormalizedMessage) -> TopOfBook {
        self.messages_applied += 1;
        match msg {
            NormalizedMessage::Add {
                order_ref,
                side,
                shares,
                price,
            } => self.add(order_ref, side, shares, price),
            NormalizedMessage::Execute {
                order_ref,
                executed_shares,
            } => self.reduce(order_ref, executed_shares),
            NormalizedMessage::Cancel {
                order_ref,
                cancelled_shares,
            } => self.reduce(order_ref, cancelled_shares),
            NormalizedMessage::Delete { order_ref } => self.delete(order_ref),
            NormalizedMessage::Replace {
                old_ref,
                new_ref,
                shares,
                price,
            } => self.replace(old_ref, new_ref, shares, price),
            NormalizedMessage::Ignored(_) => {
                self.ignored_count += 1;
            }
        }
        self.top_of_book()
    }

    /// Add(ref, side, shares, price) — §4.2 rule 1.
    fn add(&mut self, order_ref: OrderRef, side: Side, shares: Shares, price: Price) {
        if shares == 0 {
            return;
        }
        if self.orders.contains_key(&order_ref) {
            // Idempotent duplicate: no-op.
            return;
        }
        *self.levels_mut(side).entry(price).or_insert(0) += shares;
        self.orders.insert(
            order_ref,
            Order {
                side,
                price,
                remaining: shares,
            },
        );
    }

    /// Execute/Cancel share the same clamp-and-decrement reduction — §4.2
    /// rules 2 and 3 are behaviorally identical from the book's view.
    fn reduce(&mut self, order_ref: OrderRef, amount: Shares) {
        let Some(order) = self.orders.get_mut(&order_ref) else {
            return;
        };
        let delta = amount.min(order.remaining);
        order.remaining -= delta;
        let side = order.side;
        let price = order.price;
        let exhausted = order.remaining == 0;

        self.shrink_level(side, price, delta);
        if exhausted {
            self.orders.remove(&order_ref);
        }
    }

    /// Delete(ref) — §4.2 rule 4.
    fn delete(&mut self, order_ref: OrderRef) {
        let Some(order) = self.orders.remove(&order_ref) else {
            return;
        };
        self.shrink_level(order.side, order.price, order.remaining);
    }

    /// Replace(old_ref, new_ref, shares, price) — §4.2 rule 5. Atomic from
    /// the caller's perspective: a no-op unless `old_ref` is live and
    /// `new_ref` is not already live.
    fn replace(&mut self, old_ref: OrderRef, new_ref: OrderRef, shares: Shares, price: Price) {
        if old_ref == new_ref {
            // Can't simultaneously remove and (re-)insert the same key;
            // treat as the no-op the spec mandates for a colliding new_ref.
            return;
        }
        if self.orders.contains_key(&new_ref) {
            return;
        }
        let Some(old) = self.orders.get(&old_ref).copied() else {
            return;
        };
        self.delete(old_ref);
        self.add(new_ref, old.side, shares, price);
    }

    fn shrink_level(&mut self, side: Side, price: Price, delta: Shares) {
        let levels = self.levels_mut(side);
        if let Some(volume) = levels.get_mut(&price) {
            *volume -= delta;
            if *volume == 0 {
                levels.remove(&price);
            }
        }
    }

    fn top_of_book(&self) -> TopOfBook {
        TopOfBook {
            best_bid: self.bid_levels.keys().next_back().copied(),
            best_ask: self.ask_levels.keys().next().copied(),
            order_count: self.orders.len() as u32,
        }
    }
}
