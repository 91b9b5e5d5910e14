//! Spacecraft clock values and the time correlation port.
//!
//! SCLK to SCET and SCET to LST conversion are mission specific and are provided by an
//! implementation of [TimeCorrelation].
mod sclk;

use std::fmt::Display;

use hifitime::Epoch;
use serde::{Deserialize, Serialize};

pub use sclk::{Sclk, SclkFormat};

use crate::Scid;

/// Unit declared on a time field.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum TimeUnit {
    /// Spacecraft clock ticks.
    Sclk,
    /// Millisecond count.
    Ms,
    /// Microsecond count.
    Us,
}

impl TimeUnit {
    /// Parse a dictionary unit string. Unrecognized units produce `None`.
    #[must_use]
    pub fn parse(unit: &str) -> Option<Self> {
        match unit.trim().to_ascii_uppercase().as_str() {
            "SCLK" => Some(Self::Sclk),
            "MS" => Some(Self::Ms),
            "US" => Some(Self::Us),
            _ => None,
        }
    }

    /// Unit for a time field; missing or unrecognized units are treated as clock ticks.
    #[must_use]
    pub fn for_field(unit: Option<&str>) -> Self {
        unit.and_then(Self::parse).unwrap_or(Self::Sclk)
    }

    #[must_use]
    pub fn is_sclk_based(&self) -> bool {
        matches!(self, Self::Sclk)
    }

    /// Interpret a plain count in this unit as an absolute time since the Unix epoch.
    #[must_use]
    pub fn to_epoch(&self, count: u64) -> Option<Epoch> {
        match self {
            Self::Sclk => None,
            Self::Ms => Some(Epoch::from_unix_milliseconds(count as f64)),
            Self::Us => Some(Epoch::from_unix_milliseconds(count as f64 / 1000.0)),
        }
    }
}

impl Display for TimeUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Sclk => "SCLK",
            Self::Ms => "MS",
            Self::Us => "US",
        };
        f.write_str(s)
    }
}

/// Local solar time at a planetary surface location.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalSolarTime {
    pub sol: u32,
    pub millis_of_sol: u64,
}

impl Display for LocalSolarTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let ms = self.millis_of_sol;
        write!(
            f,
            "SOL-{:04}M{:02}:{:02}:{:02}.{:03}",
            self.sol,
            ms / 3_600_000,
            ms / 60_000 % 60,
            ms / 1000 % 60,
            ms % 1000
        )
    }
}

/// Time conversion capability supplied by the ground system.
pub trait TimeCorrelation: Send + Sync {
    /// Correlate a spacecraft clock value to spacecraft event time.
    fn sclk_to_scet(&self, sclk: &Sclk, ert: Option<Epoch>, scid: Scid) -> Option<Epoch>;

    /// Derive local solar time from spacecraft event time.
    fn scet_to_lst(&self, scet: Epoch, scid: Scid) -> Option<LocalSolarTime>;

    /// Correlate an earth receive time to spacecraft event time. Not all missions can.
    fn ert_to_scet(&self, _ert: Epoch, _scid: Scid) -> Option<Epoch> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_units() {
        assert_eq!(TimeUnit::parse("ms"), Some(TimeUnit::Ms));
        assert_eq!(TimeUnit::parse(" SCLK "), Some(TimeUnit::Sclk));
        assert_eq!(TimeUnit::parse("furlongs"), None);
        assert_eq!(TimeUnit::for_field(Some("furlongs")), TimeUnit::Sclk);
        assert_eq!(TimeUnit::for_field(None), TimeUnit::Sclk);
        assert_eq!(TimeUnit::for_field(Some("US")), TimeUnit::Us);
    }

    #[test]
    fn count_to_epoch() {
        let ms = TimeUnit::Ms.to_epoch(1_000).unwrap();
        let us = TimeUnit::Us.to_epoch(1_000_000).unwrap();
        assert_eq!(ms, us);
        assert!(TimeUnit::Sclk.to_epoch(1).is_none());
    }

    #[test]
    fn lst_display() {
        let lst = LocalSolarTime {
            sol: 12,
            millis_of_sol: 8 * 3_600_000 + 15 * 60_000 + 30_250,
        };
        assert_eq!(lst.to_string(), "SOL-0012M08:15:30.250");
    }
}
