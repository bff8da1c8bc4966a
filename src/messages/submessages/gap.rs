use speedy::{Readable, Writable};

use crate::structure::{
  guid::EntityId,
  sequence_number::{SequenceNumber, SequenceNumberSet},
};

/// This Submessage is sent from an RTPS Writer to an RTPS Reader and
/// indicates to the RTPS Reader that a range of sequence numbers
/// is no longer relevant. The set may be a contiguous range of
/// sequence numbers or a specific set of sequence numbers.
#[derive(Debug, PartialEq, Eq, Clone, Readable, Writable)]
pub struct Gap {
  /// Identifies the Reader Entity that is being informed of the
  /// irrelevance of a set of sequence numbers.
  pub reader_id: EntityId,

  /// Identifies the Writer Entity to which the range of sequence numbers
  /// applies.
  pub writer_id: EntityId,

  /// Identifies the first sequence number in the interval of
  /// irrelevant sequence numbers.
  pub gap_start: SequenceNumber,

  /// gapList.base is the last sequence number plus one of the contiguous
  /// irrelevant interval that starts at gap_start. The set members are
  /// further irrelevant sequence numbers.
  pub gap_list: SequenceNumberSet,
}

impl Gap {
  pub fn len_serialized(&self) -> usize {
    4 + 4 + 8 + self.gap_list.len_serialized()
  }
}
