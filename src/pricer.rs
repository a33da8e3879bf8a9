//! Spot-price derivation from top-of-book and closed-form Black–Scholes
//! valuation. Grounded on `examples/original_source/ecelinux/blackscholes.cpp`
//! for the Abramowitz–Stegun polynomial and its constants; expressed here
//! as plain functions over an immutable `BsParams` rather than the
//! original's process-wide mutable globals (spec.md §9).

use crate::orderbook::TopOfBook;

/// Black–Scholes parameters, fixed at startup and passed by reference
/// through the pricer. Never mutated at steady state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BsParams {
    pub strike: f32,
    pub rate: f32,
    pub volatility: f32,
    pub maturity: f32,
}

impl Default for BsParams {
    fn default() -> Self {
        BsParams {
            strike: 100.0,
            rate: 0.05,
            volatility: 0.20,
            maturity: 1.0,
        }
    }
}

/// Priced European call/put pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OptionPrices {
    pub call: f32,
    pub put: f32,
}

const ZERO_PRICES: OptionPrices = OptionPrices { call: 0.0, put: 0.0 };

/// Derive the spot in ticks from top-of-book per spec.md §4.3: both sides
/// absent ⇒ 0, one side present ⇒ that side, both present ⇒ floor midpoint.
///
/// The reference implementation computed this as `(bid + ask) << 1`, a
/// shift where a divide belongs (see `original_source/ecelinux/orderbook.cpp`);
/// this is the corrected integer midpoint.
pub fn spot_ticks(top: TopOfBook) -> u32 {
    match (top.best_bid, top.best_ask) {
        (None, None) => 0,
        (Some(bid), None) => bid,
        (None, Some(ask)) => ask,
        (Some(bid), Some(ask)) => (bid + ask) / 2,
    }
}

/// Standard normal CDF via the Abramowitz–Stegun 5-term polynomial
/// approximation (constants as in `blackscholes.cpp`).
fn norm_cdf(x: f32) -> f32 {
    const A1: f32 = 0.31938153;
    const A2: f32 = -0.356563782;
    const A3: f32 = 1.781477937;
    const A4: f32 = -1.821255978;
    const A5: f32 = 1.330274429;

    let l = x.abs();
    let k = 1.0 / (1.0 + 0.2316419 * l);
    const INV_SQRT_2PI: f32 = 0.398_942_28;
    let poly = ((((A5 * k + A4) * k + A3) * k + A2) * k + A1) * k;
    let pdf = INV_SQRT_2PI * (-0.5 * l * l).exp();
    let w = poly * pdf;
    if x >= 0.0 {
        1.0 - w
    } else {
        w
    }
}

/// Evaluate the closed-form Black–Scholes call/put pair for spot `s`
/// (already converted from ticks to float currency units).
///
/// Returns `(0, 0)` when `s` or any parameter is non-positive, per
/// spec.md §4.3's degenerate-input rule.
pub fn black_scholes(s: f32, params: &BsParams) -> OptionPrices {
    if s <= 0.0 || params.strike <= 0.0 || params.volatility <= 0.0 || params.maturity <= 0.0 {
        return ZERO_PRICES;
    }

    let sqrt_t = params.maturity.sqrt();
    let d1 = ((s / params.strike).ln()
        + (params.rate + 0.5 * params.volatility * params.volatility) * params.maturity)
        / (params.volatility * sqrt_t);
    let d2 = d1 - params.volatility * sqrt_t;

    let discount = (-params.rate * params.maturity).exp();
    let call = s * norm_cdf(d1) - params.strike * discount * norm_cdf(d2);
    let put = params.strike * discount * norm_cdf(-d2) - s * norm_cdf(-d1);

    OptionPrices { call, put }
}

/// Convert ticks (1 tick = 1/10 000 of the quoted currency unit) to float.
pub fn ticks_to_float(ticks: u32) -> f32 {
    ticks as f32 / 10_000.0
}
