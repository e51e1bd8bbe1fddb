//! Receiving side of a PDCP entity.
//!
//! # Design
//!
//! The receiver tracks three state variables (TS 38.323 5.2.2):
//!
//! - `RX_DELIV`: the COUNT of the first SDU not yet delivered to the upper layer.
//! - `RX_NEXT`: one past the highest COUNT accepted so far.
//! - `RX_REORD`: the value of `RX_NEXT` when t-Reordering was last started.
//!
//! Accepted SDUs with a COUNT above `RX_DELIV` wait in a buffer. Whenever a gap exists
//! (`RX_DELIV < RX_NEXT`) the t-Reordering timer runs; if the gap is not filled before it
//! expires, everything below `RX_REORD` is released and the missing COUNTs are given up on.
//!
//! Time is logical: the timer advances only through [Receiver::tick].
//!
//! The state variables are kept as `u64` so that "one past" the last 32-bit COUNT is
//! representable.

use crate::{engine, engine::Verification, Count, Error, Frame, Sdu, SnLength};
use bytes::Bytes;
use pdcp_security::SecurityContext;
use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
};
use tracing::{debug, warn};

/// Default t-Reordering duration (in slots).
pub const DEFAULT_T_REORDERING: u64 = 20;

/// Configuration for a [Receiver].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    pub sn_length: SnLength,

    /// Number of COUNTs at and above `RX_DELIV` that are accepted.
    ///
    /// Must not exceed half the SN space, otherwise COUNT reconstruction becomes ambiguous.
    pub window: u32,

    /// Slots to wait for a missing COUNT before giving up on it.
    pub t_reordering: u64,
}

impl Config {
    /// Configuration with the largest window `sn_length` allows and the default t-Reordering.
    pub fn new(sn_length: SnLength) -> Self {
        Self {
            sn_length,
            window: sn_length.window(),
            t_reordering: DEFAULT_T_REORDERING,
        }
    }

    pub fn validate(&self) -> Result<(), Error> {
        let max = self.sn_length.window();
        if self.window == 0 || self.window > max {
            return Err(Error::InvalidWindow {
                window: self.window,
                max,
            });
        }
        Ok(())
    }
}

/// Why a frame was discarded.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Discard {
    /// The COUNT was already accepted.
    Duplicate,
    /// The COUNT is below `RX_DELIV` or beyond the reordering window.
    Old,
    /// The frame could not be decoded or failed integrity verification.
    Corrupted,
}

impl fmt::Display for Discard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Duplicate => write!(f, "DUPLICATE"),
            Self::Old => write!(f, "OLD"),
            Self::Corrupted => write!(f, "CORRUPTED"),
        }
    }
}

/// An SDU released to the upper layer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Delivery {
    pub count: Count,
    pub sdu: Sdu,
    /// COUNTs given up on immediately before this one (non-zero only after t-Reordering).
    pub skipped: u64,
}

/// What happened to a received frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// Verified and delivered, along with any buffered SDUs it unblocked.
    Delivered {
        count: Count,
        verification: Verification,
        deliveries: Vec<Delivery>,
    },
    /// Verified and held until the COUNTs before it arrive (or t-Reordering expires).
    Buffered {
        count: Count,
        verification: Verification,
    },
    /// Dropped. `count` is `None` if it could not be determined and `verification` is `None`
    /// if the frame was dropped before verification.
    Discarded {
        count: Option<Count>,
        reason: Discard,
        verification: Option<Verification>,
    },
}

/// The result of a t-Reordering expiry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Expiry {
    /// `RX_REORD` at the time of expiry.
    pub rx_reord: u64,
    /// `RX_DELIV` after the expiry.
    pub rx_deliv: u64,
    pub rx_next: u64,
    /// COUNTs given up on, including any gap `RX_DELIV` jumped to reach `RX_REORD`.
    pub skipped: u64,
    pub deliveries: Vec<Delivery>,
}

/// Counters accumulated over the receiver's lifetime.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Stats {
    pub delivered: u64,
    pub discarded_duplicates: u64,
    pub discarded_old: u64,
    pub discarded_corrupted: u64,
    /// Deliveries that passed over at least one missing COUNT.
    pub out_of_order_deliveries: u64,
    /// COUNTs given up on by t-Reordering.
    pub skipped: u64,
}

/// Verifies frames and releases SDUs in COUNT order.
pub struct Receiver {
    context: SecurityContext,
    cfg: Config,

    rx_next: u64,
    rx_deliv: u64,
    rx_reord: u64,

    buffer: BTreeMap<Count, Sdu>,

    // Accepted COUNTs (delivered or buffered) no further than `window` below RX_DELIV
    received: BTreeSet<Count>,

    // Slots elapsed since t-Reordering started (if running)
    timer: Option<u64>,

    stats: Stats,
}

impl Receiver {
    pub fn new(context: SecurityContext, cfg: Config) -> Result<Self, Error> {
        cfg.validate()?;
        Ok(Self {
            context,
            cfg,
            rx_next: 0,
            rx_deliv: 0,
            rx_reord: 0,
            buffer: BTreeMap::new(),
            received: BTreeSet::new(),
            timer: None,
            stats: Stats::default(),
        })
    }

    pub fn rx_next(&self) -> u64 {
        self.rx_next
    }

    pub fn rx_deliv(&self) -> u64 {
        self.rx_deliv
    }

    pub fn rx_reord(&self) -> u64 {
        self.rx_reord
    }

    /// Number of SDUs waiting in the reordering buffer.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Whether t-Reordering is running.
    pub fn reordering(&self) -> bool {
        self.timer.is_some()
    }

    pub fn stats(&self) -> Stats {
        self.stats
    }

    /// Process a frame carrying the SDU identified by `id`.
    pub fn receive(&mut self, id: u64, frame: Bytes) -> Outcome {
        let frame = match Frame::decode(frame, self.cfg.sn_length) {
            Ok(frame) => frame,
            Err(err) => {
                debug!(sdu = id, ?err, "undecodable frame");
                return self.discard(id, None, Discard::Corrupted, None);
            }
        };
        let Some(count) = self.cfg.sn_length.reconstruct(self.rx_deliv, frame.sn) else {
            return self.discard(id, None, Discard::Old, None);
        };

        // Filter before spending effort on verification
        if self.received.contains(&count) {
            return self.discard(id, Some(count), Discard::Duplicate, None);
        }
        let position = u64::from(count);
        if position < self.rx_deliv || position >= self.rx_deliv + u64::from(self.cfg.window) {
            return self.discard(id, Some(count), Discard::Old, None);
        }

        // A COUNT that fails verification stays open for a genuine copy
        let verification = engine::verify(&self.context, &frame.into_pdu(count));
        if !verification.pass {
            return self.discard(id, Some(count), Discard::Corrupted, Some(verification));
        }

        self.received.insert(count);
        if position >= self.rx_next {
            self.rx_next = position + 1;
        }
        self.buffer
            .insert(count, Sdu::new(id, verification.payload.clone()));
        let outcome = if position == self.rx_deliv {
            let deliveries = self.release_from(self.rx_deliv);
            Outcome::Delivered {
                count,
                verification,
                deliveries,
            }
        } else {
            debug!(sdu = id, count, rx_deliv = self.rx_deliv, "buffered sdu");
            Outcome::Buffered {
                count,
                verification,
            }
        };

        // Stop t-Reordering if the gap it was waiting on closed, then start it if a gap remains
        if self.timer.is_some() && self.rx_deliv >= self.rx_reord {
            debug!(rx_deliv = self.rx_deliv, rx_reord = self.rx_reord, "stopped t-Reordering");
            self.timer = None;
        }
        self.start_timer();
        self.prune();
        debug_assert!(self.rx_deliv <= self.rx_next);
        outcome
    }

    /// Advance the t-Reordering timer by one slot, returning the expiry if it fired.
    pub fn tick(&mut self) -> Option<Expiry> {
        let elapsed = self.timer.as_mut()?;
        *elapsed += 1;
        if *elapsed < self.cfg.t_reordering {
            return None;
        }
        Some(self.expire())
    }

    fn expire(&mut self) -> Expiry {
        self.timer = None;
        let rx_reord = self.rx_reord;
        let skipped_before = self.stats.skipped;

        // Release everything stored below RX_REORD, then everything consecutive from it
        let below = match Count::try_from(rx_reord) {
            Ok(boundary) => {
                let above = self.buffer.split_off(&boundary);
                std::mem::replace(&mut self.buffer, above)
            }
            Err(_) => std::mem::take(&mut self.buffer),
        };
        let mut deliveries = Vec::with_capacity(below.len());
        for (count, sdu) in below {
            deliveries.push(self.deliver(count, sdu));
        }
        deliveries.extend(self.release_from(rx_reord));

        let skipped = self.stats.skipped - skipped_before;
        warn!(
            rx_reord,
            rx_deliv = self.rx_deliv,
            rx_next = self.rx_next,
            delivered = deliveries.len(),
            skipped,
            "t-Reordering expired"
        );

        self.start_timer();
        self.prune();
        debug_assert!(self.rx_deliv <= self.rx_next);
        Expiry {
            rx_reord,
            rx_deliv: self.rx_deliv,
            rx_next: self.rx_next,
            skipped,
            deliveries,
        }
    }

    fn start_timer(&mut self) {
        if self.timer.is_none() && self.rx_deliv < self.rx_next {
            self.rx_reord = self.rx_next;
            self.timer = Some(0);
            debug!(
                rx_deliv = self.rx_deliv,
                rx_reord = self.rx_reord,
                "started t-Reordering"
            );
        }
    }

    /// Deliver every buffered SDU consecutive from `start`.
    ///
    /// If nothing is buffered at `start`, the COUNTs between `RX_DELIV` and `start` are given up
    /// on and `RX_DELIV` moves to `start`.
    fn release_from(&mut self, start: u64) -> Vec<Delivery> {
        let mut deliveries = Vec::new();
        let mut cursor = start;
        loop {
            let Ok(count) = Count::try_from(cursor) else {
                break;
            };
            let Some(sdu) = self.buffer.remove(&count) else {
                break;
            };
            deliveries.push(self.deliver(count, sdu));
            cursor += 1;
        }
        if self.rx_deliv < start {
            self.stats.skipped += start - self.rx_deliv;
            self.rx_deliv = start;
        }
        deliveries
    }

    fn deliver(&mut self, count: Count, sdu: Sdu) -> Delivery {
        let position = u64::from(count);
        let skipped = position - self.rx_deliv;
        self.rx_deliv = position + 1;
        self.stats.delivered += 1;
        if skipped > 0 {
            self.stats.out_of_order_deliveries += 1;
            self.stats.skipped += skipped;
        }
        debug!(sdu = sdu.id, count, skipped, "delivered sdu");
        Delivery {
            count,
            sdu,
            skipped,
        }
    }

    fn discard(
        &mut self,
        id: u64,
        count: Option<Count>,
        reason: Discard,
        verification: Option<Verification>,
    ) -> Outcome {
        match reason {
            Discard::Duplicate => self.stats.discarded_duplicates += 1,
            Discard::Old => self.stats.discarded_old += 1,
            Discard::Corrupted => self.stats.discarded_corrupted += 1,
        }
        debug!(sdu = id, ?count, %reason, rx_deliv = self.rx_deliv, "discarded pdu");
        Outcome::Discarded {
            count,
            reason,
            verification,
        }
    }

    fn prune(&mut self) {
        let floor = self.rx_deliv.saturating_sub(u64::from(self.cfg.window));
        let floor = Count::try_from(floor).unwrap_or(Count::MAX);
        self.received = self.received.split_off(&floor);
    }
}
