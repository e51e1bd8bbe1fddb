//! Carry PDCP frames over a lossy, reordering, and adversarial link.
//!
//! # Overview
//!
//! A [Channel] moves encoded frames from a transmitter to a receiver in discrete slots. Every
//! frame submitted with [Channel::transmit] may be:
//!
//! - tampered with deliberately (a [Tamper] targets one SDU and flips a bit of its ciphertext or
//!   MAC-I),
//! - dropped, corrupted, duplicated, or delayed at random (see [Impairments]).
//!
//! Frames are held until their release slot and handed out by [Channel::release], which also
//! advances the clock by one slot. A frame delayed by `reorder_delay` slots therefore arrives
//! after frames sent later than it.
//!
//! All randomness comes from the `Rng` the channel is created with, so a seeded generator makes
//! every run reproducible.

use thiserror::Error;

mod config;
pub use config::{Config, Impairments, Tamper, Target};
mod link;
pub use link::{Channel, Event, Stats, Transmission};

/// Errors that can occur when configuring a [Channel].
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("invalid {name} probability (must be in [0, 1]): {value}")]
    InvalidProbability { name: &'static str, value: f64 },
    #[error("invalid reorder delay (must be at least 1 slot)")]
    InvalidReorderDelay,
}
