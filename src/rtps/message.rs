use std::io;

use bytes::Bytes;
use enumflags2::BitFlags;
#[allow(unused_imports)]
use log::{debug, error, trace, warn};
use speedy::{Context, Endianness, Writable, Writer};

use crate::{
  messages::{
    header::{Header, HeaderError},
    submessages::submessages::*,
  },
  result::{Error, Result},
  rtps::{length_calculator, Submessage, SubmessageBody},
  structure::{
    cache_change::CacheChange,
    guid::{EntityId, GuidPrefix},
    sequence_number::{SequenceNumber, SequenceNumberSet},
    time::Timestamp,
  },
};

/// Everything this engine sends is little endian.
pub const ENDIANNESS: Endianness = Endianness::LittleEndian;

#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Message {
  pub header: Header,
  pub submessages: Vec<Submessage>,
}

impl Message {
  pub fn new(header: Header) -> Message {
    Message {
      header,
      submessages: vec![],
    }
  }

  pub fn add_submessage(&mut self, submessage: Submessage) {
    self.submessages.push(submessage);
  }

  /// Strict decode: any malformed submessage fails the whole message.
  pub fn read_from_buffer(buffer: &Bytes) -> io::Result<Message> {
    let header = Header::read_validated(buffer)
      .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, format!("{:?}", e)))?;
    let mut message = Message::new(header);
    let mut submessages_left = buffer.slice(Header::LENGTH..);
    while !submessages_left.is_empty() {
      if let Some(submessage) = Submessage::read_from_buffer(&mut submessages_left)? {
        message.submessages.push(submessage);
      }
    }
    Ok(message)
  }

  /// Decodes a received datagram.
  ///
  /// Returns `None` for datagrams that are not RTPS or carry an unsupported
  /// protocol version. A malformed submessage ends decoding, but the
  /// submessages in front of it are kept.
  pub fn decode(buffer: &Bytes) -> Option<Message> {
    let header = match Header::read_validated(buffer) {
      Ok(header) => header,
      Err(HeaderError::NotRtpsPacket) => {
        trace!("Dropping {} byte datagram that is not RTPS", buffer.len());
        return None;
      }
      Err(HeaderError::UnsupportedVersion(version)) => {
        debug!("Dropping message with unsupported protocol version {:?}", version);
        return None;
      }
    };
    let mut message = Message::new(header);
    let mut submessages_left = buffer.slice(Header::LENGTH..);
    while !submessages_left.is_empty() {
      match Submessage::read_from_buffer(&mut submessages_left) {
        Ok(Some(submessage)) => message.submessages.push(submessage),
        Ok(None) => (),
        Err(e) => {
          warn!(
            "Malformed submessage from {:?}, keeping {} earlier submessages: {}",
            header.guid_prefix,
            message.submessages.len(),
            e
          );
          break;
        }
      }
    }
    Some(message)
  }

  /// Bytes `encode` will produce.
  pub fn encoded_length(&self) -> usize {
    length_calculator::message_length(self)
  }

  /// Writes the message little endian to the front of `buffer` and returns
  /// the number of bytes used.
  pub fn encode(&self, buffer: &mut [u8]) -> Result<usize> {
    let needed = self.encoded_length();
    if buffer.len() < needed {
      return Err(Error::BufferTooSmall {
        needed,
        available: buffer.len(),
      });
    }
    self.write_to_buffer_with_ctx(ENDIANNESS, &mut buffer[..needed])?;
    Ok(needed)
  }

  pub fn encode_to_vec(&self) -> Result<Vec<u8>> {
    Ok(self.write_to_vec_with_ctx(ENDIANNESS)?)
  }
}

impl<C: Context> Writable<C> for Message {
  fn write_to<T: ?Sized + Writer<C>>(&self, writer: &mut T) -> std::result::Result<(), C::Error> {
    writer.write_value(&self.header)?;
    for submessage in &self.submessages {
      writer.write_value(submessage)?;
    }
    Ok(())
  }
}

/// Collects submessages and wraps them into a [`Message`].
#[derive(Default, Clone, Debug)]
pub struct MessageBuilder {
  submessages: Vec<Submessage>,
}

impl MessageBuilder {
  pub fn new() -> MessageBuilder {
    MessageBuilder::default()
  }

  pub fn is_empty(&self) -> bool {
    self.submessages.is_empty()
  }

  /// Encoded size of the submessages collected so far, header excluded.
  pub fn submessages_length(&self) -> usize {
    self
      .submessages
      .iter()
      .map(length_calculator::submessage_length)
      .sum()
  }

  fn push(mut self, body: SubmessageBody) -> MessageBuilder {
    self.submessages.push(Submessage::new(body));
    self
  }

  pub fn dst_submessage(self, guid_prefix: GuidPrefix) -> MessageBuilder {
    let flags = BitFlags::<INFODESTINATION_Flags>::from_endianness(ENDIANNESS);
    self.push(SubmessageBody::Interpreter(
      InterpreterSubmessage::InfoDestination(InfoDestination { guid_prefix }, flags),
    ))
  }

  /// `None` sends an INFO_TS with the Invalidate flag: the submessages that
  /// follow have no timestamp.
  pub fn ts_msg(self, timestamp: Option<Timestamp>) -> MessageBuilder {
    let mut flags = BitFlags::<INFOTIMESTAMP_Flags>::from_endianness(ENDIANNESS);
    if timestamp.is_none() {
      flags |= INFOTIMESTAMP_Flags::Invalidate;
    }
    self.push(SubmessageBody::Interpreter(
      InterpreterSubmessage::InfoTimestamp(InfoTimestamp { timestamp }, flags),
    ))
  }

  pub fn data_msg(self, cache_change: &CacheChange, reader_entity_id: EntityId) -> MessageBuilder {
    let data = Data {
      reader_id: reader_entity_id,
      writer_id: cache_change.writer_guid.entity_id,
      writer_sn: cache_change.sequence_number,
      inline_qos: cache_change.inline_qos.clone(),
      serialized_payload: Some(cache_change.payload.clone()),
    };
    let flags = BitFlags::<DATA_Flags>::from_endianness(ENDIANNESS) | data.content_flags();
    self.push(SubmessageBody::Writer(WriterSubmessage::Data(data, flags)))
  }

  pub fn data_frag_msg(self, data_frag: DataFrag) -> MessageBuilder {
    let flags = BitFlags::<DATAFRAG_Flags>::from_endianness(ENDIANNESS) | data_frag.content_flags();
    self.push(SubmessageBody::Writer(WriterSubmessage::DataFrag(
      data_frag, flags,
    )))
  }

  pub fn heartbeat_msg(
    self,
    reader_id: EntityId,
    writer_id: EntityId,
    first_sn: SequenceNumber,
    last_sn: SequenceNumber,
    count: i32,
    set_final_flag: bool,
  ) -> MessageBuilder {
    let mut flags = BitFlags::<HEARTBEAT_Flags>::from_endianness(ENDIANNESS);
    if set_final_flag {
      flags |= HEARTBEAT_Flags::Final;
    }
    let heartbeat = Heartbeat {
      reader_id,
      writer_id,
      first_sn,
      last_sn,
      count,
    };
    self.push(SubmessageBody::Writer(WriterSubmessage::Heartbeat(
      heartbeat, flags,
    )))
  }

  pub fn acknack_msg(
    self,
    reader_id: EntityId,
    writer_id: EntityId,
    reader_sn_state: SequenceNumberSet,
    count: i32,
    set_final_flag: bool,
  ) -> MessageBuilder {
    let mut flags = BitFlags::<ACKNACK_Flags>::from_endianness(ENDIANNESS);
    if set_final_flag {
      flags |= ACKNACK_Flags::Final;
    }
    let ack_nack = AckNack {
      reader_id,
      writer_id,
      reader_sn_state,
      count,
    };
    self.push(SubmessageBody::Reader(ReaderSubmessage::AckNack(
      ack_nack, flags,
    )))
  }

  pub fn add_header_and_build(self, guid_prefix: GuidPrefix) -> Message {
    Message {
      header: Header::new(guid_prefix),
      submessages: self.submessages,
    }
  }
}
