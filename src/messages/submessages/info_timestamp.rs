use crate::structure::time::Timestamp;

/// This Submessage is used to send a timestamp which applies to the
/// Submessages that follow within the same message.
///
/// `None` means the Invalidate flag is set: following submessages carry
/// no timestamp. The timestamp itself is then absent from the wire.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct InfoTimestamp {
  pub timestamp: Option<Timestamp>,
}

impl InfoTimestamp {
  pub fn len_serialized(&self) -> usize {
    match self.timestamp {
      Some(_) => 8,
      None => 0,
    }
  }
}
