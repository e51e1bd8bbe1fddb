use crate::{Config, Error, Impairments, Tamper, Target};
use bytes::Bytes;
use pdcp_security::MAC_LENGTH;
use rand::Rng;
use std::{collections::BTreeMap, ops::Range};
use tracing::debug;

/// A frame in transit, tagged with the SDU it carries.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Transmission {
    pub sdu_id: u64,
    pub frame: Bytes,
}

/// Something that happened to a frame on its way through the [Channel].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
    /// Passed through unchanged.
    Ok,
    /// Deliberately altered.
    Tampered { detail: String },
    /// Dropped (no other event follows).
    Lost,
    /// A random bit was flipped (never a reserved header bit or the tampered bit).
    Corrupted { detail: String },
    /// A second copy was queued.
    Duplicated,
    /// A copy was held back.
    Reordered { delay: u64 },
}

/// Faults applied over the channel's lifetime.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Stats {
    pub lost: u64,
    pub duplicated: u64,
    pub corrupted: u64,
    pub reordered: u64,
    pub tampered: u64,
}

/// A simulated link between a transmitter and a receiver.
pub struct Channel<R: Rng> {
    rng: R,
    cfg: Config,

    slot: u64,
    sequence: u64,
    // Frames in transit keyed by (release slot, submission order)
    queue: BTreeMap<(u64, u64), Transmission>,

    stats: Stats,
}

impl<R: Rng> Channel<R> {
    pub fn new(rng: R, cfg: Config) -> Result<Self, Error> {
        cfg.validate()?;
        Ok(Self {
            rng,
            cfg,
            slot: 0,
            sequence: 0,
            queue: BTreeMap::new(),
            stats: Stats::default(),
        })
    }

    /// The current slot.
    pub fn slot(&self) -> u64 {
        self.slot
    }

    /// Number of frames still in transit.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    pub fn stats(&self) -> Stats {
        self.stats
    }

    /// Submit a frame in the current slot, returning the faults applied to it.
    ///
    /// Faults are applied in order: loss, tamper, corruption, duplication, then reordering of
    /// each copy.
    pub fn transmit(&mut self, transmission: Transmission) -> Vec<Event> {
        let Transmission { sdu_id, frame } = transmission;
        let impairments = self.cfg.impairments;
        let mut events = Vec::new();

        if let Some(impairments) = &impairments {
            if self.rng.gen_bool(impairments.loss) {
                self.stats.lost += 1;
                debug!(sdu = sdu_id, "lost frame");
                return vec![Event::Lost];
            }
        }

        let mut frame = frame.to_vec();
        let mut tampered = None;
        if let Some(tamper) = self.cfg.tamper.filter(|tamper| tamper.sdu_id == sdu_id) {
            if let Some((bit, detail)) = self.tamper(&tamper, &mut frame) {
                tampered = Some(bit);
                self.stats.tampered += 1;
                debug!(sdu = sdu_id, %detail, "tampered with frame");
                events.push(Event::Tampered { detail });
            }
        }

        let mut copies = 1;
        if let Some(impairments) = &impairments {
            if !frame.is_empty() && self.rng.gen_bool(impairments.corruption) {
                if let Some(detail) = self.corrupt(&mut frame, tampered) {
                    self.stats.corrupted += 1;
                    debug!(sdu = sdu_id, %detail, "corrupted frame");
                    events.push(Event::Corrupted { detail });
                }
            }
            if self.rng.gen_bool(impairments.duplication) {
                copies = 2;
                self.stats.duplicated += 1;
                debug!(sdu = sdu_id, "duplicated frame");
                events.push(Event::Duplicated);
            }
        }

        let frame = Bytes::from(frame);
        for _ in 0..copies {
            let delay = self.delay(impairments.as_ref());
            if delay > 0 {
                self.stats.reordered += 1;
                debug!(sdu = sdu_id, delay, "delayed frame");
                events.push(Event::Reordered { delay });
            }
            self.enqueue(
                self.slot + delay,
                Transmission {
                    sdu_id,
                    frame: frame.clone(),
                },
            );
        }

        if events.is_empty() {
            events.push(Event::Ok);
        }
        events
    }

    /// Release every frame due in the current slot and advance to the next slot.
    pub fn release(&mut self) -> Vec<Transmission> {
        let later = self.queue.split_off(&(self.slot + 1, 0));
        let due = std::mem::replace(&mut self.queue, later);
        self.slot += 1;
        due.into_values().collect()
    }

    /// Release every frame still in transit, in release order.
    pub fn flush(&mut self) -> Vec<Transmission> {
        std::mem::take(&mut self.queue).into_values().collect()
    }

    fn enqueue(&mut self, release: u64, transmission: Transmission) {
        self.queue.insert((release, self.sequence), transmission);
        self.sequence += 1;
    }

    fn delay(&mut self, impairments: Option<&Impairments>) -> u64 {
        match impairments {
            Some(impairments) if self.rng.gen_bool(impairments.reordering) => {
                impairments.reorder_delay
            }
            _ => 0,
        }
    }

    /// Flip the least significant bit of a random byte in the targeted field, returning the
    /// flipped bit's position in the frame.
    fn tamper(&mut self, tamper: &Tamper, frame: &mut [u8]) -> Option<(usize, String)> {
        let mac = frame.len().saturating_sub(MAC_LENGTH);
        let ciphertext = self.cfg.sn_length.header_len().min(mac)..mac;
        let (target, range) = match tamper.target {
            Target::Ciphertext if !ciphertext.is_empty() => (Target::Ciphertext, ciphertext),
            _ => (Target::MacI, mac..frame.len()),
        };
        if range.is_empty() {
            return None;
        }
        let offset = range.start;
        let index = self.pick(range);
        let before = frame[index];
        frame[index] ^= 0x01;
        let detail = format!(
            "flipped LSB of {target} byte {} (0x{before:02x} -> 0x{:02x})",
            index - offset,
            frame[index]
        );
        Some((index * 8, detail))
    }

    /// Flip a random bit the receiver decodes, leaving `spared` (a bit position) untouched.
    ///
    /// Reserved header bits are never chosen: flipping one would not change the frame's meaning.
    fn corrupt(&mut self, frame: &mut [u8], spared: Option<usize>) -> Option<String> {
        let reserved = self.cfg.sn_length.reserved_mask();
        let candidates: Vec<usize> = (0..frame.len() * 8)
            .filter(|&position| position >= 8 || reserved & (1u8 << position) == 0)
            .filter(|&position| Some(position) != spared)
            .collect();
        if candidates.is_empty() {
            return None;
        }
        let position = candidates[self.pick(0..candidates.len())];
        let (index, bit) = (position / 8, position % 8);
        frame[index] ^= 1 << bit;
        Some(format!("flipped bit {bit} of frame byte {index}"))
    }

    fn pick(&mut self, range: Range<usize>) -> usize {
        self.rng.gen_range(range)
    }
}
