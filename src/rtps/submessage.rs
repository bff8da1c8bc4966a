use std::io;

use bytes::Bytes;
use enumflags2::BitFlags;
#[allow(unused_imports)]
use log::{debug, error, trace, warn};
use speedy::{Context, Readable, Writable, Writer};

use crate::{
  messages::submessages::{
    elements::padding_needed,
    read_error,
    submessages::*,
  },
  rtps::length_calculator,
  structure::time::Timestamp,
};

/// One decoded or to-be-encoded submessage.
///
/// Submessages are always written little-endian: the endianness bit of
/// the written flags is set and `content_length` is computed from the body,
/// so the header can never disagree with what follows it. Write them with
/// a little-endian context, as [`Message::encode`](crate::rtps::Message::encode)
/// does.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Submessage {
  pub header: SubmessageHeader,
  pub body: SubmessageBody,
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub enum SubmessageBody {
  Writer(WriterSubmessage),
  Reader(ReaderSubmessage),
  Interpreter(InterpreterSubmessage),
}

impl SubmessageBody {
  pub fn kind(&self) -> SubmessageKind {
    match self {
      SubmessageBody::Writer(WriterSubmessage::Data(..)) => SubmessageKind::DATA,
      SubmessageBody::Writer(WriterSubmessage::DataFrag(..)) => SubmessageKind::DATA_FRAG,
      SubmessageBody::Writer(WriterSubmessage::Gap(..)) => SubmessageKind::GAP,
      SubmessageBody::Writer(WriterSubmessage::Heartbeat(..)) => SubmessageKind::HEARTBEAT,
      SubmessageBody::Reader(ReaderSubmessage::AckNack(..)) => SubmessageKind::ACKNACK,
      SubmessageBody::Interpreter(InterpreterSubmessage::InfoTimestamp(..)) => {
        SubmessageKind::INFO_TS
      }
      SubmessageBody::Interpreter(InterpreterSubmessage::InfoDestination(..)) => {
        SubmessageKind::INFO_DST
      }
    }
  }

  pub fn flags(&self) -> u8 {
    match self {
      SubmessageBody::Writer(WriterSubmessage::Data(_, f)) => f.bits(),
      SubmessageBody::Writer(WriterSubmessage::DataFrag(_, f)) => f.bits(),
      SubmessageBody::Writer(WriterSubmessage::Gap(_, f)) => f.bits(),
      SubmessageBody::Writer(WriterSubmessage::Heartbeat(_, f)) => f.bits(),
      SubmessageBody::Reader(ReaderSubmessage::AckNack(_, f)) => f.bits(),
      SubmessageBody::Interpreter(InterpreterSubmessage::InfoTimestamp(_, f)) => f.bits(),
      SubmessageBody::Interpreter(InterpreterSubmessage::InfoDestination(_, f)) => f.bits(),
    }
  }
}

impl Submessage {
  /// Wraps a body with a header computed from it.
  pub fn new(body: SubmessageBody) -> Submessage {
    let header = SubmessageHeader {
      kind: body.kind(),
      flags: body.flags(),
      content_length: length_calculator::body_length(&body) as u16,
    };
    Submessage { header, body }
  }

  /// Reads one submessage from the front of `buffer` and advances the buffer
  /// past it. `Ok(None)` means the submessage was skipped: PAD, or a kind
  /// this implementation does not know.
  pub fn read_from_buffer(buffer: &mut Bytes) -> io::Result<Option<Submessage>> {
    let header = SubmessageHeader::read_from_bytes(buffer).ok_or_else(|| {
      io::Error::new(
        io::ErrorKind::UnexpectedEof,
        format!("{} bytes left, no room for a submessage header", buffer.len()),
      )
    })?;

    let available = buffer.len() - SubmessageHeader::LENGTH;
    // RTPS v2.3 section 9.4.5.1.3: zero length means "up to the end of the
    // message", except for PAD and INFO_TS that may really be empty.
    let content_length = match (header.content_length, header.kind) {
      (0, SubmessageKind::PAD) | (0, SubmessageKind::INFO_TS) => 0,
      (0, _) => available,
      (length, _) => length as usize,
    };
    if content_length > available {
      return Err(io::Error::new(
        io::ErrorKind::InvalidData,
        format!(
          "{:?} declares {} bytes, only {} left in message",
          header.kind, content_length, available
        ),
      ));
    }

    let mut sub_buffer = buffer.split_to(SubmessageHeader::LENGTH + content_length);
    let content = sub_buffer.split_off(SubmessageHeader::LENGTH);
    let alignment = padding_needed(content_length).min(buffer.len());
    let _ = buffer.split_to(alignment);

    let e = endianness_flag(header.flags);
    let mk_w = |s: WriterSubmessage| {
      io::Result::<Option<Submessage>>::Ok(Some(Submessage {
        header,
        body: SubmessageBody::Writer(s),
      }))
    };
    let mk_r = |s: ReaderSubmessage| {
      io::Result::<Option<Submessage>>::Ok(Some(Submessage {
        header,
        body: SubmessageBody::Reader(s),
      }))
    };
    let mk_i = |s: InterpreterSubmessage| {
      io::Result::<Option<Submessage>>::Ok(Some(Submessage {
        header,
        body: SubmessageBody::Interpreter(s),
      }))
    };

    match header.kind {
      SubmessageKind::DATA => {
        let f = BitFlags::<DATA_Flags>::from_bits_truncate(header.flags);
        mk_w(WriterSubmessage::Data(Data::deserialize_data(&content, f)?, f))
      }
      SubmessageKind::DATA_FRAG => {
        let f = BitFlags::<DATAFRAG_Flags>::from_bits_truncate(header.flags);
        mk_w(WriterSubmessage::DataFrag(
          DataFrag::deserialize(&content, f)?,
          f,
        ))
      }
      SubmessageKind::GAP => {
        let f = BitFlags::<GAP_Flags>::from_bits_truncate(header.flags);
        mk_w(WriterSubmessage::Gap(
          Gap::read_from_buffer_with_ctx(e, &content).map_err(read_error)?,
          f,
        ))
      }
      SubmessageKind::HEARTBEAT => {
        let f = BitFlags::<HEARTBEAT_Flags>::from_bits_truncate(header.flags);
        mk_w(WriterSubmessage::Heartbeat(
          Heartbeat::read_from_buffer_with_ctx(e, &content).map_err(read_error)?,
          f,
        ))
      }
      SubmessageKind::ACKNACK => {
        let f = BitFlags::<ACKNACK_Flags>::from_bits_truncate(header.flags);
        mk_r(ReaderSubmessage::AckNack(
          AckNack::read_from_buffer_with_ctx(e, &content).map_err(read_error)?,
          f,
        ))
      }
      SubmessageKind::INFO_DST => {
        let f = BitFlags::<INFODESTINATION_Flags>::from_bits_truncate(header.flags);
        mk_i(InterpreterSubmessage::InfoDestination(
          InfoDestination::read_from_buffer_with_ctx(e, &content).map_err(read_error)?,
          f,
        ))
      }
      SubmessageKind::INFO_TS => {
        let f = BitFlags::<INFOTIMESTAMP_Flags>::from_bits_truncate(header.flags);
        let timestamp = if f.contains(INFOTIMESTAMP_Flags::Invalidate) {
          None
        } else {
          Some(Timestamp::read_from_buffer_with_ctx(e, &content).map_err(read_error)?)
        };
        mk_i(InterpreterSubmessage::InfoTimestamp(
          InfoTimestamp { timestamp },
          f,
        ))
      }
      SubmessageKind::PAD => Ok(None),
      unknown_kind => {
        if unknown_kind.is_vendor_specific() {
          trace!("Skipping vendor-specific submessage {:?}", unknown_kind);
        } else {
          debug!(
            "Skipping unsupported submessage {:?}, {} bytes",
            unknown_kind, content_length
          );
        }
        Ok(None)
      }
    }
  }
}

const ENDIANNESS_FLAG: u8 = 0x01;

impl<C: Context> Writable<C> for Submessage {
  fn write_to<T: ?Sized + Writer<C>>(&self, writer: &mut T) -> Result<(), C::Error> {
    writer.write_value(&self.header.kind)?;
    writer.write_u8(self.header.flags | ENDIANNESS_FLAG)?;
    writer.write_u16(length_calculator::body_length(&self.body) as u16)?;
    match &self.body {
      SubmessageBody::Writer(WriterSubmessage::Data(s, _)) => writer.write_value(s),
      SubmessageBody::Writer(WriterSubmessage::DataFrag(s, _)) => writer.write_value(s),
      SubmessageBody::Writer(WriterSubmessage::Gap(s, _)) => writer.write_value(s),
      SubmessageBody::Writer(WriterSubmessage::Heartbeat(s, _)) => writer.write_value(s),
      SubmessageBody::Reader(ReaderSubmessage::AckNack(s, _)) => writer.write_value(s),
      SubmessageBody::Interpreter(InterpreterSubmessage::InfoDestination(s, _)) => {
        writer.write_value(s)
      }
      SubmessageBody::Interpreter(InterpreterSubmessage::InfoTimestamp(s, _)) => {
        match &s.timestamp {
          Some(timestamp) => writer.write_value(timestamp),
          None => Ok(()),
        }
      }
    }
  }
}
