use speedy::{Readable, Writable};

use crate::structure::guid::GuidPrefix;

/// This message is sent from an RTPS Writer to an RTPS Reader to modify
/// the GuidPrefix used to interpret the Reader entityIds appearing in the
/// Submessages that follow it.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Readable, Writable)]
pub struct InfoDestination {
  pub guid_prefix: GuidPrefix,
}

impl InfoDestination {
  pub const LENGTH: usize = 12;
}
