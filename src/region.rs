//! Regulatory regions and their permitted Sub-GHz frequency bands.
//!
//! The compliance rules are encoded as data (region -> permitted band
//! list) so they stay auditable and testable in one place. All
//! frequencies are in Hz.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Regulatory jurisdiction constraining permitted scan frequency ranges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Region {
    Us,
    Eu,
    Jp,
    Cn,
    Au,
    Unknown,
}

/// An inclusive permitted frequency band, in Hz.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Band {
    pub start_hz: u32,
    pub end_hz: u32,
}

impl Band {
    const fn new(start_hz: u32, end_hz: u32) -> Self {
        Self { start_hz, end_hz }
    }

    /// Whether the given range lies entirely inside this band.
    pub fn contains(&self, start_hz: u32, end_hz: u32) -> bool {
        start_hz >= self.start_hz && end_hz <= self.end_hz
    }

    /// Intersection of this band with the given range, if any.
    pub fn intersect(&self, start_hz: u32, end_hz: u32) -> Option<Band> {
        let lo = self.start_hz.max(start_hz);
        let hi = self.end_hz.min(end_hz);
        (lo < hi).then_some(Band::new(lo, hi))
    }
}

// Sub-GHz bands open to unlicensed short-range devices per jurisdiction.
// The Unknown fallback permits only the near-worldwide 433 MHz ISM band.
const BANDS_US: &[Band] = &[
    Band::new(300_000_000, 348_000_000),
    Band::new(387_000_000, 464_000_000),
    Band::new(779_000_000, 928_000_000),
];
const BANDS_EU: &[Band] = &[
    Band::new(433_050_000, 434_790_000),
    Band::new(863_000_000, 870_000_000),
];
const BANDS_JP: &[Band] = &[
    Band::new(312_000_000, 315_250_000),
    Band::new(920_500_000, 923_500_000),
];
const BANDS_CN: &[Band] = &[
    Band::new(314_000_000, 316_000_000),
    Band::new(430_000_000, 432_000_000),
    Band::new(779_000_000, 787_000_000),
];
const BANDS_AU: &[Band] = &[
    Band::new(433_050_000, 434_790_000),
    Band::new(915_000_000, 928_000_000),
];
const BANDS_UNKNOWN: &[Band] = &[Band::new(433_050_000, 434_790_000)];

impl Region {
    /// Permitted Sub-GHz bands for this region.
    pub fn permitted_bands(&self) -> &'static [Band] {
        match self {
            Region::Us => BANDS_US,
            Region::Eu => BANDS_EU,
            Region::Jp => BANDS_JP,
            Region::Cn => BANDS_CN,
            Region::Au => BANDS_AU,
            Region::Unknown => BANDS_UNKNOWN,
        }
    }

    /// Whether an explicit scan range is fully contained in one permitted
    /// band. Ranges straddling a band edge are rejected, not clipped.
    pub fn permits(&self, start_hz: u32, end_hz: u32) -> bool {
        start_hz < end_hz
            && self
                .permitted_bands()
                .iter()
                .any(|b| b.contains(start_hz, end_hz))
    }

    /// Clip a wide scan plan to the permitted bands, preserving band order.
    pub fn clip(&self, start_hz: u32, end_hz: u32) -> Vec<Band> {
        self.permitted_bands()
            .iter()
            .filter_map(|b| b.intersect(start_hz, end_hz))
            .collect()
    }
}

impl FromStr for Region {
    type Err = ();

    /// Parses a region code. Unrecognized codes map to `Unknown` at the
    /// config layer; this returns Err so callers can tell the difference.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "US" => Ok(Region::Us),
            "EU" => Ok(Region::Eu),
            "JP" => Ok(Region::Jp),
            "CN" => Ok(Region::Cn),
            "AU" => Ok(Region::Au),
            "UNKNOWN" => Ok(Region::Unknown),
            _ => Err(()),
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let code = match self {
            Region::Us => "US",
            Region::Eu => "EU",
            Region::Jp => "JP",
            Region::Cn => "CN",
            Region::Au => "AU",
            Region::Unknown => "UNKNOWN",
        };
        write!(f, "{}", code)
    }
}
