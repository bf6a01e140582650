//! Implied rate engine and its console rendering.

pub mod display;
pub mod engine;

pub use display::render_rates;
pub use engine::{compute_rates, implicit_rate, ImplicitRates, RateTable, DAYS_IN_A_YEAR};
