//! Run configuration.

use crate::Error;
use pdcp_channel::{Impairments, Tamper, Target};
use pdcp_entity::receiver::DEFAULT_T_REORDERING;
use pdcp_security::{Direction, SecurityContext, KEY_LENGTH};

/// Number of SDUs sent when not configured.
pub const DEFAULT_SDU_COUNT: u64 = 1_000;

/// SDU targeted by tamper mode when not configured.
pub const DEFAULT_TAMPER_SDU: u64 = 1;

/// Key material used when the caller supplies none (`0123456789ABCDEF` repeated).
pub const DEFAULT_KEY: [u8; KEY_LENGTH] = [
    0x01, 0x23, 0x45, 0x67, 0x89, 0xAB, 0xCD, 0xEF, 0x01, 0x23, 0x45, 0x67, 0x89, 0xAB, 0xCD, 0xEF,
];

/// Key material and identity of the simulated bearer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SecurityConfig {
    pub integrity_key: Vec<u8>,
    pub ciphering_key: Vec<u8>,
    pub bearer: u8,
    pub direction: Direction,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            integrity_key: DEFAULT_KEY.to_vec(),
            ciphering_key: DEFAULT_KEY.to_vec(),
            bearer: 1,
            direction: Direction::Uplink,
        }
    }
}

impl SecurityConfig {
    pub fn context(&self) -> Result<SecurityContext, Error> {
        Ok(SecurityContext::new(
            &self.integrity_key,
            &self.ciphering_key,
            self.bearer,
            self.direction,
        )?)
    }
}

/// Configuration for a single [crate::run].
#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    /// Number of SDUs to send (one per slot).
    pub sdu_count: u64,

    /// Deliberately alter one SDU in transit.
    pub tamper: Option<Tamper>,

    /// Random channel faults (a perfect channel if `None`).
    pub impairments: Option<Impairments>,

    pub security: SecurityConfig,

    /// Receive window (defaults to half the SN space).
    pub window_size: Option<u32>,

    /// SN width (12 or 18).
    pub sn_bits: u8,

    /// t-Reordering duration in slots.
    pub t_reordering: u64,

    /// Seed for every random decision in the run.
    pub seed: u64,

    /// Keep ticking the receiver after the last SDU until t-Reordering is idle.
    pub drain: bool,

    /// Slots between state samples (defaults to `max(1, sdu_count / 200)`).
    pub sample_interval: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sdu_count: DEFAULT_SDU_COUNT,
            tamper: None,
            impairments: None,
            security: SecurityConfig::default(),
            window_size: None,
            sn_bits: 12,
            t_reordering: DEFAULT_T_REORDERING,
            seed: 0,
            drain: true,
            sample_interval: None,
        }
    }
}

impl Config {
    /// Tamper with the default SDU's ciphertext.
    pub fn with_tamper(mut self) -> Self {
        self.tamper = Some(Tamper {
            sdu_id: DEFAULT_TAMPER_SDU,
            target: Target::Ciphertext,
        });
        self
    }

    /// Checks that do not depend on building any component.
    pub fn validate(&self) -> Result<(), Error> {
        if self.sdu_count == 0 || self.sdu_count > u64::from(u32::MAX) {
            return Err(Error::InvalidSduCount(self.sdu_count));
        }
        if let Some(tamper) = &self.tamper {
            if tamper.sdu_id >= self.sdu_count {
                return Err(Error::TamperOutOfRange {
                    sdu_id: tamper.sdu_id,
                    sdu_count: self.sdu_count,
                });
            }
        }
        if self.sample_interval == Some(0) {
            return Err(Error::InvalidSampleInterval);
        }
        Ok(())
    }

    pub fn sample_interval(&self) -> u64 {
        self.sample_interval
            .unwrap_or_else(|| (self.sdu_count / 200).max(1))
    }
}
