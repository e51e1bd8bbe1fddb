//! Simulate a PDCP bearer end to end over an unreliable, adversarial channel.
//!
//! # Overview
//!
//! [run] sends `sdu_count` SDUs through a [Transmitter], a [Channel], and a [Receiver], one SDU
//! per slot:
//!
//! 1. The transmitter protects the SDU with the next COUNT.
//! 2. The encoded frame is submitted to the channel, which may tamper with, drop, corrupt,
//!    duplicate, or delay it.
//! 3. Every frame the channel releases in this slot is handed to the receiver.
//! 4. The receiver's t-Reordering timer advances by one slot.
//!
//! Once every SDU is sent, frames still in transit are flushed to the receiver and (unless
//! disabled) the receiver keeps ticking until t-Reordering is idle.
//!
//! Protocol anomalies never fail a run: they are recorded in the [Entry] log and counted in the
//! [Metrics]. Only an invalid [Config] produces an [Error], and it does so before anything is
//! sent.
//!
//! # Example
//!
//! ```rust
//! use simulator::{run, Config};
//!
//! let cfg = Config {
//!     sdu_count: 5,
//!     ..Config::default()
//! }
//! .with_tamper();
//! let output = run(&cfg).unwrap();
//! assert_eq!(output.metrics.discarded_corrupted, 1);
//! assert_eq!(output.metrics.delivered_sdu_count, 4);
//! ```

use pdcp_channel::{Channel, Transmission};
use pdcp_entity::{
    receiver::{self, Delivery, Expiry, Outcome},
    Receiver, Sdu, SnLength, Transmitter,
};
use rand::{rngs::StdRng, SeedableRng};
use serde::Serialize;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, info};

pub mod config;
pub use config::{Config, SecurityConfig};
pub mod log;
pub use log::{Entry, Status};
pub mod metrics;
pub use metrics::{Metrics, Sample};

/// Errors that can occur when configuring a run.
#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid SDU count: {0} (must be in [1, 2^32 - 1])")]
    InvalidSduCount(u64),
    #[error("tamper target SDU {sdu_id} outside run of {sdu_count} SDUs")]
    TamperOutOfRange { sdu_id: u64, sdu_count: u64 },
    #[error("invalid sample interval (must be at least 1)")]
    InvalidSampleInterval,
    #[error("malformed key: {0}")]
    MalformedKey(String),
    #[error("security: {0}")]
    Security(#[from] pdcp_security::Error),
    #[error("entity: {0}")]
    Entity(#[from] pdcp_entity::Error),
    #[error("channel: {0}")]
    Channel(#[from] pdcp_channel::Error),
}

/// Returns the version of the crate.
pub fn crate_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

/// Parse hex-encoded key material (whitespace and a `0x` prefix are allowed).
pub fn parse_key(key: &str) -> Result<Vec<u8>, Error> {
    commonware_utils::from_hex_formatted(key).ok_or_else(|| Error::MalformedKey(key.to_string()))
}

/// Everything a run produced.
#[derive(Clone, Debug, Serialize)]
pub struct Output {
    pub log: Vec<Entry>,
    pub metrics: Metrics,
    pub samples: Vec<Sample>,

    /// SDUs released to the upper layer, in delivery order.
    #[serde(skip)]
    pub delivered: Vec<Sdu>,
}

/// Accumulates the log and deliveries of a run.
#[derive(Default)]
struct Recorder {
    log: Vec<Entry>,
    delivered: Vec<Sdu>,
}

impl Recorder {
    fn received(&mut self, sdu_id: u64, outcome: Outcome) {
        match outcome {
            Outcome::Delivered {
                count,
                verification,
                deliveries,
            } => {
                self.log.push(Entry::RxVerifyPass {
                    sdu_id,
                    count,
                    received_mac: verification.received,
                    calculated_mac: verification.calculated,
                    status: Status::Passed,
                });
                self.deliveries(deliveries);
            }
            Outcome::Buffered {
                count,
                verification,
            } => {
                self.log.push(Entry::RxVerifyPass {
                    sdu_id,
                    count,
                    received_mac: verification.received,
                    calculated_mac: verification.calculated,
                    status: Status::Passed,
                });
                self.log.push(Entry::RxBuffer { sdu_id, count });
            }
            Outcome::Discarded {
                count,
                reason,
                verification,
            } => {
                if let (Some(count), Some(verification)) = (count, verification) {
                    self.log.push(Entry::RxVerifyFail {
                        sdu_id,
                        count,
                        received_mac: verification.received,
                        calculated_mac: verification.calculated,
                        status: Status::Failed,
                    });
                }
                self.log.push(Entry::RxDiscard {
                    sdu_id,
                    count,
                    reason,
                });
            }
        }
    }

    fn expired(&mut self, expiry: Expiry) {
        self.log.push(Entry::RxReorderingExpired {
            rx_reord: expiry.rx_reord,
            rx_deliv: expiry.rx_deliv,
            rx_next: expiry.rx_next,
            skipped: expiry.skipped,
        });
        self.deliveries(expiry.deliveries);
    }

    fn deliveries(&mut self, deliveries: Vec<Delivery>) {
        for Delivery {
            count,
            sdu,
            skipped,
        } in deliveries
        {
            self.log.push(Entry::RxDeliver {
                sdu_id: sdu.id,
                count,
                skipped,
            });
            self.delivered.push(sdu);
        }
    }
}

/// Run one simulation.
pub fn run(cfg: &Config) -> Result<Output, Error> {
    // Build every component before sending anything
    cfg.validate()?;
    let sn_length = SnLength::try_from(cfg.sn_bits)?;
    let context = cfg.security.context()?;
    let mut rx_cfg = receiver::Config::new(sn_length);
    rx_cfg.t_reordering = cfg.t_reordering;
    if let Some(window) = cfg.window_size {
        rx_cfg.window = window;
    }
    let mut rx = Receiver::new(context.clone(), rx_cfg)?;
    let mut channel = Channel::new(
        StdRng::seed_from_u64(cfg.seed),
        pdcp_channel::Config {
            sn_length,
            tamper: cfg.tamper,
            impairments: cfg.impairments,
        },
    )?;
    let mut tx = Transmitter::new(context, sn_length);
    let interval = cfg.sample_interval();

    info!(
        sdus = cfg.sdu_count,
        sn_bits = cfg.sn_bits,
        seed = cfg.seed,
        tamper = cfg.tamper.is_some(),
        impaired = cfg.impairments.is_some(),
        "starting simulation"
    );
    let start = Instant::now();
    let mut recorder = Recorder::default();
    let mut samples = Vec::new();
    let mut step = 0;
    for sdu_id in 0..cfg.sdu_count {
        let sdu = Sdu::new(sdu_id, format!("SDU_data_{sdu_id}"));
        let pdu = tx.send(&sdu);
        recorder.log.push(Entry::TxProtect {
            sdu_id,
            count: pdu.count,
            sn: pdu.sn,
            hfn: sn_length.hfn(pdu.count),
            mac_i: pdu.mac_i,
        });

        let events = channel.transmit(Transmission {
            sdu_id,
            frame: pdu.encode(sn_length),
        });
        recorder
            .log
            .extend(events.into_iter().map(|event| Entry::channel(sdu_id, event)));
        for Transmission { sdu_id, frame } in channel.release() {
            recorder.received(sdu_id, rx.receive(sdu_id, frame));
        }
        if let Some(expiry) = rx.tick() {
            recorder.expired(expiry);
        }

        step += 1;
        if step % interval == 0 {
            samples.push(Sample::capture(step, &tx, &rx));
        }
    }

    // Traffic has stopped: deliver what is still in flight, then let t-Reordering run out
    let in_flight = channel.flush();
    debug!(frames = in_flight.len(), "flushing channel");
    for Transmission { sdu_id, frame } in in_flight {
        recorder.received(sdu_id, rx.receive(sdu_id, frame));
    }
    if cfg.drain {
        while rx.reordering() {
            if let Some(expiry) = rx.tick() {
                recorder.expired(expiry);
            }
            step += 1;
        }
    }
    if samples.last().map(|sample| sample.step) != Some(step) {
        samples.push(Sample::capture(step, &tx, &rx));
    }

    let metrics = Metrics::collect(cfg.sdu_count, &tx, &rx, channel.stats(), start.elapsed());
    info!(
        delivered = metrics.delivered_sdu_count,
        corrupted = metrics.discarded_corrupted,
        duplicates = metrics.discarded_duplicates,
        old = metrics.discarded_old,
        buffered = metrics.buffered_final,
        rx_deliv = metrics.rx_deliv_final,
        rx_next = metrics.rx_next_final,
        "finished simulation"
    );
    Ok(Output {
        log: recorder.log,
        metrics,
        samples,
        delivered: recorder.delivered,
    })
}
