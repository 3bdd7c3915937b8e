//! Key metadata shared by the engine, the boundary and the client.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Seconds + nanoseconds since the Unix epoch.
///
/// The engine stamps at millisecond resolution, so `nanos` is always a whole
/// number of milliseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp {
    pub secs: i64,
    pub nanos: u32,
}

impl Timestamp {
    /// Build from unix milliseconds
    pub fn from_millis(millis: u64) -> Self {
        Self {
            secs: (millis / 1000) as i64,
            nanos: ((millis % 1000) * 1_000_000) as u32,
        }
    }

    /// Unix milliseconds (negative times clamp to zero)
    pub fn as_millis(&self) -> u64 {
        if self.secs < 0 {
            return 0;
        }
        self.secs as u64 * 1000 + u64::from(self.nanos / 1_000_000)
    }

    pub fn to_system_time(&self) -> SystemTime {
        if self.secs >= 0 {
            UNIX_EPOCH + Duration::new(self.secs as u64, self.nanos)
        } else {
            UNIX_EPOCH - Duration::from_secs(self.secs.unsigned_abs())
                + Duration::from_nanos(u64::from(self.nanos))
        }
    }
}

/// Unix time in milliseconds
pub(crate) fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Point-in-time metadata for a key.
///
/// A `Stat` never changes after it is returned; take a new one to observe
/// later writes or touches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stat {
    /// Length of the stored value in bytes
    pub size: u64,
    /// Last write or read through a reader/single-key read
    pub last_used: Timestamp,
}

impl Stat {
    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn last_used(&self) -> SystemTime {
        self.last_used.to_system_time()
    }
}

/// A key and its metadata, as returned by listing.
///
/// The key bytes belong to the caller outright.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    pub key: Vec<u8>,
    pub stat: Stat,
}
