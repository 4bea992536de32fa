//! Monotonic timestamps that survive textual encoding.
//!
//! Callback records carry three timestamps (registration, start, end) that
//! must be monotonic within a run *and* encodable as plain seconds +
//! nanoseconds in the persisted record format. [`Stamp`] measures time as a
//! duration since a process-wide monotonic anchor, taken the first time any
//! stamp is read.

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;
use std::time::{Duration, Instant};

static ANCHOR: OnceLock<Instant> = OnceLock::new();

fn anchor() -> Instant {
    *ANCHOR.get_or_init(Instant::now)
}

/// A monotonic timestamp, relative to the process-wide anchor.
///
/// Stamps from different processes are not comparable; within one run they
/// are totally ordered and never decrease.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Stamp(Duration);

impl Stamp {
    /// The zero stamp. Encodes as `0s 0ns`.
    pub const ZERO: Self = Self(Duration::ZERO);

    /// Reads the monotonic clock.
    #[must_use]
    pub fn now() -> Self {
        Self(anchor().elapsed())
    }

    /// Builds a stamp from whole seconds and a sub-second nanosecond part.
    #[must_use]
    pub const fn from_parts(secs: u64, nanos: u32) -> Self {
        Self(Duration::new(secs, nanos))
    }

    /// Whole seconds since the anchor.
    #[must_use]
    pub const fn secs(self) -> u64 {
        self.0.as_secs()
    }

    /// Sub-second nanoseconds.
    #[must_use]
    pub const fn subsec_nanos(self) -> u32 {
        self.0.subsec_nanos()
    }

    /// The stamp as a duration since the anchor.
    #[must_use]
    pub const fn as_duration(self) -> Duration {
        self.0
    }
}

impl fmt::Display for Stamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}s {}ns", self.secs(), self.subsec_nanos())
    }
}

/// Error parsing the `<SECS>s <NANOS>ns` stamp form.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("malformed timestamp: {0:?}")]
pub struct ParseStampError(pub String);

impl FromStr for Stamp {
    type Err = ParseStampError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || ParseStampError(s.to_string());
        let (secs, nanos) = s.split_once(' ').ok_or_else(malformed)?;
        let secs = secs
            .strip_suffix('s')
            .and_then(|v| v.parse::<u64>().ok())
            .ok_or_else(malformed)?;
        let nanos = nanos
            .strip_suffix("ns")
            .and_then(|v| v.parse::<u32>().ok())
            .filter(|v| *v < 1_000_000_000)
            .ok_or_else(malformed)?;
        Ok(Self::from_parts(secs, nanos))
    }
}
