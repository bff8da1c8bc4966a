use std::convert::TryFrom;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use speedy::{Readable, Writable};

/// The representation of the time is the one defined by the IETF Network Time
/// Protocol (NTP) Standard (IETF RFC 1305). In this representation, time is
/// expressed in seconds and fraction of seconds using the formula:
/// time = seconds + (fraction / 2^(32))
///
/// This is the form carried by INFO_TS submessages.
#[derive(
  Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Readable, Writable, Clone, Copy, Serialize, Deserialize,
)]
pub struct Timestamp {
  seconds: i32,
  fraction: u32,
}

const NANOS_PER_SEC: i64 = 1_000_000_000;

impl Timestamp {
  pub const ZERO: Timestamp = Timestamp {
    seconds: 0,
    fraction: 0,
  };
  pub const INVALID: Timestamp = Timestamp {
    seconds: -1,
    fraction: 0xFFFF_FFFF,
  };
  pub const INFINITE: Timestamp = Timestamp {
    seconds: 0x7FFF_FFFF,
    fraction: 0xFFFF_FFFF,
  };

  pub const fn new(seconds: i32, fraction: u32) -> Timestamp {
    Timestamp { seconds, fraction }
  }

  pub fn now() -> Timestamp {
    Timestamp::from(Utc::now())
  }

  pub fn seconds(&self) -> i32 {
    self.seconds
  }

  pub fn fraction(&self) -> u32 {
    self.fraction
  }
}

impl From<DateTime<Utc>> for Timestamp {
  fn from(time: DateTime<Utc>) -> Self {
    Timestamp {
      seconds: i32::try_from(time.timestamp()).unwrap_or(i32::MAX),
      fraction: ((i64::from(time.timestamp_subsec_nanos()) << 32) / NANOS_PER_SEC) as u32,
    }
  }
}

impl From<Timestamp> for DateTime<Utc> {
  fn from(time: Timestamp) -> Self {
    let nanos = ((i64::from(time.fraction) * NANOS_PER_SEC) >> 32) as u32;
    Utc.timestamp(i64::from(time.seconds), nanos)
  }
}
