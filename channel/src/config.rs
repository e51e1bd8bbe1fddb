use crate::Error;
use pdcp_entity::SnLength;
use std::fmt;

/// Field of a frame targeted by a [Tamper].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Target {
    #[default]
    Ciphertext,
    MacI,
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ciphertext => write!(f, "ciphertext"),
            Self::MacI => write!(f, "MAC-I"),
        }
    }
}

/// Deliberately alter one SDU in transit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Tamper {
    /// The SDU whose frame is altered (every copy of it, if duplicated).
    pub sdu_id: u64,
    pub target: Target,
}

/// Probabilities of random faults, each sampled independently per frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Impairments {
    pub loss: f64,
    pub duplication: f64,
    /// Probability that a copy is held for `reorder_delay` slots.
    pub reordering: f64,
    /// Probability that a single random bit of the frame is flipped.
    pub corruption: f64,
    pub reorder_delay: u64,
}

impl Default for Impairments {
    fn default() -> Self {
        Self {
            loss: 0.01,
            duplication: 0.01,
            reordering: 0.02,
            corruption: 0.005,
            reorder_delay: 3,
        }
    }
}

impl Impairments {
    /// No faults at all.
    pub fn none() -> Self {
        Self {
            loss: 0.0,
            duplication: 0.0,
            reordering: 0.0,
            corruption: 0.0,
            reorder_delay: 1,
        }
    }

    pub fn validate(&self) -> Result<(), Error> {
        for (name, value) in [
            ("loss", self.loss),
            ("duplication", self.duplication),
            ("reordering", self.reordering),
            ("corruption", self.corruption),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(Error::InvalidProbability { name, value });
            }
        }
        if self.reorder_delay == 0 {
            return Err(Error::InvalidReorderDelay);
        }
        Ok(())
    }
}

/// Configuration for a [crate::Channel].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Config {
    /// Used to locate the ciphertext and MAC-I within a frame.
    pub sn_length: SnLength,
    pub tamper: Option<Tamper>,
    pub impairments: Option<Impairments>,
}

impl Config {
    pub fn validate(&self) -> Result<(), Error> {
        match &self.impairments {
            Some(impairments) => impairments.validate(),
            None => Ok(()),
        }
    }
}
