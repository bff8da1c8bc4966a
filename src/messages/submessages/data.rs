use std::io;

use bytes::Bytes;
use enumflags2::BitFlags;
use speedy::{Context, Readable, Writable, Writer};

use crate::{
  messages::submessages::{
    elements::{parameter_list::ParameterList, serialized_payload::SerializedPayload},
    read_error,
    submessage_flag::{endianness_flag, DATA_Flags},
  },
  structure::{guid::EntityId, sequence_number::SequenceNumber},
};

/// This Submessage is sent from an RTPS Writer to an RTPS Reader.
///
/// The Submessage notifies the RTPS Reader of a change to
/// a data-object belonging to the RTPS Writer.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Data {
  /// Identifies the RTPS Reader entity that is being informed of the change
  /// to the data-object. ENTITYID_UNKNOWN addresses all matched readers.
  pub reader_id: EntityId,

  /// Identifies the RTPS Writer entity that made the change to the
  /// data-object.
  pub writer_id: EntityId,

  /// Uniquely identifies the change and the relative order for all changes
  /// made by the RTPS Writer.
  pub writer_sn: SequenceNumber,

  /// Contains QoS that may affect the interpretation of the message.
  /// Present only if the InlineQosFlag is set in the header.
  pub inline_qos: Option<ParameterList>,

  /// Present if the DataFlag or the KeyFlag is set.
  pub serialized_payload: Option<SerializedPayload>,
}

impl Data {
  /// Octets from the end of octetsToInlineQos to the inline QoS: reader id,
  /// writer id and sequence number.
  pub const OCTETS_TO_INLINE_QOS: u16 = 16;

  /// Body length without inline QoS and payload.
  pub const FIXED_LENGTH: usize = 20;

  pub fn deserialize_data(buffer: &Bytes, flags: BitFlags<DATA_Flags>) -> io::Result<Data> {
    let e = endianness_flag(flags.bits());
    if buffer.len() < Data::FIXED_LENGTH {
      return Err(io::Error::new(
        io::ErrorKind::UnexpectedEof,
        format!("DATA body too short: {} bytes", buffer.len()),
      ));
    }
    // extraFlags in buffer[0..2] are reserved and ignored
    let octets_to_inline_qos = u16::read_from_buffer_with_ctx(e, &buffer[2..4]).map_err(read_error)?;
    let reader_id = EntityId::read_from_buffer_with_ctx(e, &buffer[4..8]).map_err(read_error)?;
    let writer_id = EntityId::read_from_buffer_with_ctx(e, &buffer[8..12]).map_err(read_error)?;
    let writer_sn =
      SequenceNumber::read_from_buffer_with_ctx(e, &buffer[12..20]).map_err(read_error)?;

    let mut pos = 4 + octets_to_inline_qos as usize;
    if pos > buffer.len() {
      return Err(io::Error::new(
        io::ErrorKind::InvalidData,
        format!("DATA octetsToInlineQos {} past end of submessage", octets_to_inline_qos),
      ));
    }

    let inline_qos = if flags.contains(DATA_Flags::InlineQos) {
      let (qos, consumed) = ParameterList::read_from_bytes(&buffer.slice(pos..), e)?;
      pos += consumed;
      Some(qos)
    } else {
      None
    };

    let serialized_payload =
      if flags.contains(DATA_Flags::Data) || flags.contains(DATA_Flags::Key) {
        Some(SerializedPayload::from_bytes(&buffer.slice(pos..))?)
      } else {
        None
      };

    Ok(Data {
      reader_id,
      writer_id,
      writer_sn,
      inline_qos,
      serialized_payload,
    })
  }

  /// Flags that describe which optional elements are present.
  pub fn content_flags(&self) -> BitFlags<DATA_Flags> {
    let mut flags = BitFlags::<DATA_Flags>::empty();
    if self.inline_qos.is_some() {
      flags |= DATA_Flags::InlineQos;
    }
    if self.serialized_payload.is_some() {
      flags |= DATA_Flags::Data;
    }
    flags
  }
}

impl<C: Context> Writable<C> for Data {
  fn write_to<T: ?Sized + Writer<C>>(&self, writer: &mut T) -> Result<(), C::Error> {
    // extraFlags, all zero in RTPS 2.3
    writer.write_u16(0)?;
    writer.write_u16(Data::OCTETS_TO_INLINE_QOS)?;
    writer.write_value(&self.reader_id)?;
    writer.write_value(&self.writer_id)?;
    writer.write_value(&self.writer_sn)?;
    if let Some(inline_qos) = &self.inline_qos {
      writer.write_value(inline_qos)?;
    }
    if let Some(serialized_payload) = &self.serialized_payload {
      writer.write_value(serialized_payload)?;
    }
    Ok(())
  }
}
