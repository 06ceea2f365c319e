//! Persisting camera captures
//!
//! Each response is written in the format its payload flags call for:
//! float depth as PFM, compressed bytes verbatim as PNG, raw pixels as a
//! flipped and green-marked PNG.

mod persist;
mod pfm;

pub use persist::{ensure_dir, save_responses};
