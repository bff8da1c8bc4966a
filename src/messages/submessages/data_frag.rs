use std::io;

use bytes::Bytes;
use enumflags2::BitFlags;
#[allow(unused_imports)]
use log::{debug, error, trace, warn};
use speedy::{Context, Readable, Writable, Writer};

use crate::{
  messages::submessages::{
    elements::{padding_needed, parameter_list::ParameterList},
    read_error,
    submessage_flag::{endianness_flag, DATAFRAG_Flags},
  },
  structure::{
    guid::EntityId,
    sequence_number::{FragmentNumber, SequenceNumber},
  },
};

/// The DataFrag Submessage extends the Data Submessage by enabling the
/// serializedData to be fragmented and sent as multiple DataFrag
/// Submessages. The fragments contained in the DataFrag Submessages are
/// then re-assembled by the RTPS Reader.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct DataFrag {
  /// Identifies the RTPS Reader entity that is being informed of the change
  /// to the data-object.
  pub reader_id: EntityId,

  /// Identifies the RTPS Writer entity that made the change to the
  /// data-object.
  pub writer_id: EntityId,

  /// Uniquely identifies the change and the relative order for all changes
  /// made by the RTPS Writer.
  pub writer_sn: SequenceNumber,

  /// Indicates the starting fragment for the series of fragments in
  /// serialized_payload. Fragment numbering starts with number 1.
  pub fragment_starting_num: FragmentNumber,

  /// The number of consecutive fragments contained in this Submessage,
  /// starting at fragment_starting_num.
  pub fragments_in_submessage: u16,

  /// The size of an individual fragment in bytes. The maximum fragment size
  /// equals 64K.
  pub fragment_size: u16,

  /// The total size in bytes of the original data before fragmentation,
  /// serialized payload header included.
  pub data_size: u32,

  /// Contains QoS that may affect the interpretation of the message.
  /// Present only if the InlineQosFlag is set in the header.
  pub inline_qos: Option<ParameterList>,

  /// Raw bytes of the covered fragments. Only the first fragment of a
  /// sample starts with the serialized payload header.
  pub serialized_payload: Bytes,
}

impl DataFrag {
  /// Reader id, writer id, sequence number and the four fragment fields.
  pub const OCTETS_TO_INLINE_QOS: u16 = 28;

  /// Body length without inline QoS and fragment bytes.
  pub const FIXED_LENGTH: usize = 32;

  /// Total number of fragments the sample was cut into.
  pub fn total_number_of_fragments(&self) -> u32 {
    if self.fragment_size == 0 {
      return 0;
    }
    let fragment_size = u64::from(self.fragment_size);
    ((u64::from(self.data_size) + fragment_size - 1) / fragment_size) as u32
  }

  /// Number of payload bytes this submessage should carry: whole fragments,
  /// except that the final fragment may be shorter.
  pub fn expected_payload_length(&self) -> Option<usize> {
    let fragment_size = self.fragment_size as usize;
    let start = (u32::from(self.fragment_starting_num) as usize)
      .checked_sub(1)?
      .checked_mul(fragment_size)?;
    let data_size = self.data_size as usize;
    if start >= data_size {
      return None;
    }
    let covered = fragment_size.checked_mul(self.fragments_in_submessage as usize)?;
    Some(covered.min(data_size - start))
  }

  pub fn deserialize(buffer: &Bytes, flags: BitFlags<DATAFRAG_Flags>) -> io::Result<DataFrag> {
    let e = endianness_flag(flags.bits());
    if buffer.len() < DataFrag::FIXED_LENGTH {
      return Err(io::Error::new(
        io::ErrorKind::UnexpectedEof,
        format!("DATA_FRAG body too short: {} bytes", buffer.len()),
      ));
    }
    let octets_to_inline_qos = u16::read_from_buffer_with_ctx(e, &buffer[2..4]).map_err(read_error)?;
    let reader_id = EntityId::read_from_buffer_with_ctx(e, &buffer[4..8]).map_err(read_error)?;
    let writer_id = EntityId::read_from_buffer_with_ctx(e, &buffer[8..12]).map_err(read_error)?;
    let writer_sn =
      SequenceNumber::read_from_buffer_with_ctx(e, &buffer[12..20]).map_err(read_error)?;
    let fragment_starting_num =
      FragmentNumber::read_from_buffer_with_ctx(e, &buffer[20..24]).map_err(read_error)?;
    let fragments_in_submessage =
      u16::read_from_buffer_with_ctx(e, &buffer[24..26]).map_err(read_error)?;
    let fragment_size = u16::read_from_buffer_with_ctx(e, &buffer[26..28]).map_err(read_error)?;
    let data_size = u32::read_from_buffer_with_ctx(e, &buffer[28..32]).map_err(read_error)?;

    let mut pos = 4 + octets_to_inline_qos as usize;
    if pos > buffer.len() {
      return Err(io::Error::new(
        io::ErrorKind::InvalidData,
        format!("DATA_FRAG octetsToInlineQos {} past end of submessage", octets_to_inline_qos),
      ));
    }

    let inline_qos = if flags.contains(DATAFRAG_Flags::InlineQos) {
      let (qos, consumed) = ParameterList::read_from_bytes(&buffer.slice(pos..), e)?;
      pos += consumed;
      Some(qos)
    } else {
      None
    };

    let mut data_frag = DataFrag {
      reader_id,
      writer_id,
      writer_sn,
      fragment_starting_num,
      fragments_in_submessage,
      fragment_size,
      data_size,
      inline_qos,
      serialized_payload: buffer.slice(pos..),
    };

    // Drop alignment padding after the final fragment.
    if let Some(expected) = data_frag.expected_payload_length() {
      if data_frag.serialized_payload.len() > expected
        && data_frag.serialized_payload.len() - expected < 4
      {
        data_frag.serialized_payload.truncate(expected);
      }
    }
    Ok(data_frag)
  }

  pub fn content_flags(&self) -> BitFlags<DATAFRAG_Flags> {
    if self.inline_qos.is_some() {
      DATAFRAG_Flags::InlineQos.into()
    } else {
      BitFlags::<DATAFRAG_Flags>::empty()
    }
  }
}

impl<C: Context> Writable<C> for DataFrag {
  fn write_to<T: ?Sized + Writer<C>>(&self, writer: &mut T) -> Result<(), C::Error> {
    writer.write_u16(0)?;
    writer.write_u16(DataFrag::OCTETS_TO_INLINE_QOS)?;
    writer.write_value(&self.reader_id)?;
    writer.write_value(&self.writer_id)?;
    writer.write_value(&self.writer_sn)?;
    writer.write_value(&self.fragment_starting_num)?;
    writer.write_u16(self.fragments_in_submessage)?;
    writer.write_u16(self.fragment_size)?;
    writer.write_u32(self.data_size)?;
    if let Some(inline_qos) = &self.inline_qos {
      writer.write_value(inline_qos)?;
    }
    writer.write_bytes(&self.serialized_payload)?;
    for _ in 0..padding_needed(self.serialized_payload.len()) {
      writer.write_u8(0)?;
    }
    Ok(())
  }
}
