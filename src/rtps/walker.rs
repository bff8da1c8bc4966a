//! Visiting the submessages of a decoded message in order.

use enumflags2::BitFlags;

use crate::{
  messages::submessages::submessages::*,
  rtps::{Message, SubmessageBody},
  structure::{
    guid::{EntityId, GuidPrefix},
    time::Timestamp,
  },
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisitResult {
  Continue,
  Stop,
}

/// Receiver state built up while walking one message. Interpreter
/// submessages update it; it applies to everything that follows them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageContext {
  pub source_guid_prefix: GuidPrefix,
  /// `GuidPrefix::UNKNOWN` until an INFO_DST names a participant.
  pub dest_guid_prefix: GuidPrefix,
  pub timestamp: Option<Timestamp>,
}

impl MessageContext {
  pub fn new(source_guid_prefix: GuidPrefix) -> MessageContext {
    MessageContext {
      source_guid_prefix,
      dest_guid_prefix: GuidPrefix::UNKNOWN,
      timestamp: None,
    }
  }

  /// Is the current submessage meant for the participant `own_prefix`?
  pub fn is_addressed_to(&self, own_prefix: GuidPrefix) -> bool {
    self.dest_guid_prefix == GuidPrefix::UNKNOWN || self.dest_guid_prefix == own_prefix
  }
}

/// One method per submessage kind. All of them default to doing nothing.
pub trait SubmessageVisitor {
  fn on_data(&mut self, _context: &MessageContext, _data: &Data) -> VisitResult {
    VisitResult::Continue
  }

  fn on_data_frag(&mut self, _context: &MessageContext, _data_frag: &DataFrag) -> VisitResult {
    VisitResult::Continue
  }

  fn on_gap(&mut self, _context: &MessageContext, _gap: &Gap) -> VisitResult {
    VisitResult::Continue
  }

  fn on_heartbeat(
    &mut self,
    _context: &MessageContext,
    _heartbeat: &Heartbeat,
    _flags: BitFlags<HEARTBEAT_Flags>,
  ) -> VisitResult {
    VisitResult::Continue
  }

  fn on_ack_nack(&mut self, _context: &MessageContext, _ack_nack: &AckNack) -> VisitResult {
    VisitResult::Continue
  }

  fn on_info_destination(
    &mut self,
    _context: &MessageContext,
    _info_dst: &InfoDestination,
  ) -> VisitResult {
    VisitResult::Continue
  }

  fn on_info_timestamp(
    &mut self,
    _context: &MessageContext,
    _info_ts: &InfoTimestamp,
  ) -> VisitResult {
    VisitResult::Continue
  }
}

/// Dispatches every submessage of `message` to `visitor`, in order. Stops as
/// soon as the visitor returns [`VisitResult::Stop`].
pub fn walk<V: SubmessageVisitor + ?Sized>(message: &Message, visitor: &mut V) -> VisitResult {
  let mut context = MessageContext::new(message.header.guid_prefix);
  for submessage in &message.submessages {
    let result = match &submessage.body {
      SubmessageBody::Interpreter(InterpreterSubmessage::InfoDestination(info_dst, _)) => {
        context.dest_guid_prefix = info_dst.guid_prefix;
        visitor.on_info_destination(&context, info_dst)
      }
      SubmessageBody::Interpreter(InterpreterSubmessage::InfoTimestamp(info_ts, _)) => {
        context.timestamp = info_ts.timestamp;
        visitor.on_info_timestamp(&context, info_ts)
      }
      SubmessageBody::Writer(WriterSubmessage::Data(data, _)) => visitor.on_data(&context, data),
      SubmessageBody::Writer(WriterSubmessage::DataFrag(data_frag, _)) => {
        visitor.on_data_frag(&context, data_frag)
      }
      SubmessageBody::Writer(WriterSubmessage::Gap(gap, _)) => visitor.on_gap(&context, gap),
      SubmessageBody::Writer(WriterSubmessage::Heartbeat(heartbeat, flags)) => {
        visitor.on_heartbeat(&context, heartbeat, *flags)
      }
      SubmessageBody::Reader(ReaderSubmessage::AckNack(ack_nack, _)) => {
        visitor.on_ack_nack(&context, ack_nack)
      }
    };
    if result == VisitResult::Stop {
      return VisitResult::Stop;
    }
  }
  VisitResult::Continue
}

/// Passes on only the writer submessages addressed to `reader_id` or to
/// every reader (`EntityId::UNKNOWN`).
///
/// AckNack is passed on unfiltered: its reader id names the sender.
pub struct FilterByEntityId<V> {
  reader_id: EntityId,
  inner: V,
}

impl<V: SubmessageVisitor> FilterByEntityId<V> {
  pub fn new(reader_id: EntityId, inner: V) -> FilterByEntityId<V> {
    FilterByEntityId { reader_id, inner }
  }

  pub fn into_inner(self) -> V {
    self.inner
  }

  fn accepts(&self, reader_id: EntityId) -> bool {
    reader_id == EntityId::UNKNOWN || reader_id == self.reader_id
  }
}

impl<V: SubmessageVisitor> SubmessageVisitor for FilterByEntityId<V> {
  fn on_data(&mut self, context: &MessageContext, data: &Data) -> VisitResult {
    if self.accepts(data.reader_id) {
      self.inner.on_data(context, data)
    } else {
      VisitResult::Continue
    }
  }

  fn on_data_frag(&mut self, context: &MessageContext, data_frag: &DataFrag) -> VisitResult {
    if self.accepts(data_frag.reader_id) {
      self.inner.on_data_frag(context, data_frag)
    } else {
      VisitResult::Continue
    }
  }

  fn on_gap(&mut self, context: &MessageContext, gap: &Gap) -> VisitResult {
    if self.accepts(gap.reader_id) {
      self.inner.on_gap(context, gap)
    } else {
      VisitResult::Continue
    }
  }

  fn on_heartbeat(
    &mut self,
    context: &MessageContext,
    heartbeat: &Heartbeat,
    flags: BitFlags<HEARTBEAT_Flags>,
  ) -> VisitResult {
    if self.accepts(heartbeat.reader_id) {
      self.inner.on_heartbeat(context, heartbeat, flags)
    } else {
      VisitResult::Continue
    }
  }

  fn on_ack_nack(&mut self, context: &MessageContext, ack_nack: &AckNack) -> VisitResult {
    self.inner.on_ack_nack(context, ack_nack)
  }

  fn on_info_destination(
    &mut self,
    context: &MessageContext,
    info_dst: &InfoDestination,
  ) -> VisitResult {
    self.inner.on_info_destination(context, info_dst)
  }

  fn on_info_timestamp(&mut self, context: &MessageContext, info_ts: &InfoTimestamp) -> VisitResult {
    self.inner.on_info_timestamp(context, info_ts)
  }
}
