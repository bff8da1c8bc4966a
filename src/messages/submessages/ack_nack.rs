use speedy::{Readable, Writable};

use crate::structure::{guid::EntityId, sequence_number::SequenceNumberSet};

/// This Submessage is used to communicate the state of a Reader to a
/// Writer.
///
/// The Submessage allows the Reader to inform the Writer about
/// the sequence numbers it has received and which ones it is still
/// missing. This Submessage can be used to do both positive
/// and negative acknowledgments.
#[derive(Debug, PartialEq, Eq, Clone, Readable, Writable)]
pub struct AckNack {
  /// Identifies the Reader entity that acknowledges receipt of certain
  /// sequence numbers and/or requests to receive certain sequence numbers.
  pub reader_id: EntityId,

  /// Identifies the Writer entity that is the target of the AckNack
  /// message. This is the Writer Entity that is being asked to re-send
  /// some sequence numbers or is being informed of the reception of
  /// certain sequence numbers.
  pub writer_id: EntityId,

  /// Communicates the state of the reader to the writer.
  /// All sequence numbers up to the one prior to readerSNState.base
  /// are confirmed as received by the reader. The sequence numbers that
  /// appear in the set indicate missing sequence numbers on the reader
  /// side. The ones that do not appear in the set are undetermined (could
  /// be received or not).
  pub reader_sn_state: SequenceNumberSet,

  /// A counter that is incremented each time a new AckNack message is sent.
  /// Provides the means for a Writer to detect duplicate AckNack messages
  /// that can result from the presence of redundant communication paths.
  pub count: i32,
}

impl AckNack {
  pub fn len_serialized(&self) -> usize {
    4 + 4 + self.reader_sn_state.len_serialized() + 4
  }
}

#[cfg(test)]
mod tests {
  use hex_literal::hex;
  use speedy::Endianness;

  use super::*;
  use crate::structure::sequence_number::SequenceNumber;

  #[test]
  fn oversized_bitmap_is_rejected() {
    // numBits 0xffffffff would make us allocate and read far past the end
    let bytes = hex!(
      "00 00 00 07 00 00 01 02
       00 00 00 00 01 00 00 00
       ff ff ff ff
       01 00 00 00"
    );
    assert!(AckNack::read_from_buffer_with_ctx(Endianness::LittleEndian, &bytes).is_err());
  }

  serialization_test!( type = AckNack,
  {
      acknack_missing_two,
      {
        let mut set = SequenceNumberSet::new(SequenceNumber::new(3), 3);
        set.insert(SequenceNumber::new(3));
        set.insert(SequenceNumber::new(5));
        AckNack {
          reader_id: EntityId::new([0x00, 0x00, 0x12], 0x04),
          writer_id: EntityId::new([0x00, 0x00, 0x12], 0x03),
          reader_sn_state: set,
          count: 2,
        }
      },
      le = [0x00, 0x00, 0x12, 0x04,
            0x00, 0x00, 0x12, 0x03,
            0x00, 0x00, 0x00, 0x00,
            0x03, 0x00, 0x00, 0x00,
            0x03, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0xA0,
            0x02, 0x00, 0x00, 0x00],
      be = [0x00, 0x00, 0x12, 0x04,
            0x00, 0x00, 0x12, 0x03,
            0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x03,
            0x00, 0x00, 0x00, 0x03,
            0xA0, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x02]
  });
}
