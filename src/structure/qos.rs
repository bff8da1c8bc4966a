use num_derive::FromPrimitive;
use serde::{Deserialize, Serialize};
use serde_repr::{Deserialize_repr, Serialize_repr};

/// Wire values follow ReliabilityKind_t in RTPS v2.3 section 9.3.2.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize_repr, Deserialize_repr, FromPrimitive,
)]
#[repr(i32)]
pub enum ReliabilityKind {
  BestEffort = 1,
  Reliable = 2,
}

/// Only the durability kinds that change reader delivery are modelled.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize_repr, Deserialize_repr, FromPrimitive,
)]
#[repr(i32)]
pub enum DurabilityKind {
  Volatile = 0,
  TransientLocal = 1,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReaderQos {
  pub reliability: ReliabilityKind,
  pub durability: DurabilityKind,
}

impl ReaderQos {
  pub fn best_effort() -> ReaderQos {
    ReaderQos {
      reliability: ReliabilityKind::BestEffort,
      durability: DurabilityKind::Volatile,
    }
  }

  pub fn reliable(durability: DurabilityKind) -> ReaderQos {
    ReaderQos {
      reliability: ReliabilityKind::Reliable,
      durability,
    }
  }
}

impl Default for ReaderQos {
  fn default() -> Self {
    ReaderQos::best_effort()
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriterQos {
  pub reliability: ReliabilityKind,
  pub durability: DurabilityKind,
}

impl Default for WriterQos {
  fn default() -> Self {
    WriterQos {
      reliability: ReliabilityKind::Reliable,
      durability: DurabilityKind::TransientLocal,
    }
  }
}
