#![allow(dead_code)]

use std::{
  io,
  net::{Ipv4Addr, SocketAddrV4},
  sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex, Weak,
  },
  time::Duration,
};

use bytes::Bytes;
use enumflags2::BitFlags;
use rtps_engine::{
  messages::submessages::{
    elements::serialized_payload::{RepresentationIdentifier, SerializedPayload},
    submessages::*,
  },
  network::{DataChannel, DataChannelFactory},
  rtps::{
    Message, MessageBuilder, MessageSubscriber, SampleReceiver, Submessage, SubmessageBody,
    ENDIANNESS,
  },
  structure::{cache_change::CacheChange, sequence_number::SequenceNumberSet},
  EntityId, GuidPrefix, Locator, RtpsConfig, SequenceNumber, Timestamp, GUID,
};

pub fn writer_guid() -> GUID {
  GUID::new(
    GuidPrefix::new(&[0x0a; 12]),
    EntityId::new([0, 0, 1], EntityId::KIND_USER_WRITER_NO_KEY),
  )
}

pub fn reader_guid() -> GUID {
  GUID::new(
    GuidPrefix::new(&[0x0b; 12]),
    EntityId::new([0, 0, 2], EntityId::KIND_USER_READER_NO_KEY),
  )
}

pub fn locator(port: u16) -> Locator {
  Locator::UdpV4(SocketAddrV4::new(Ipv4Addr::LOCALHOST, port))
}

pub fn sn(n: i64) -> SequenceNumber {
  SequenceNumber::new(n)
}

/// Heartbeats only on explicit `heartbeat_tick` calls during a test.
pub fn test_config() -> RtpsConfig {
  RtpsConfig::builder()
    .heartbeat_period(Duration::from_secs(3600))
    .publisher_max_buffer_size(256)
    .build()
    .unwrap()
}

pub fn payload(value: &[u8]) -> SerializedPayload {
  SerializedPayload::new(RepresentationIdentifier::CDR_LE, Bytes::copy_from_slice(value))
}

pub fn change(writer: GUID, n: i64) -> CacheChange {
  CacheChange::new(
    writer,
    sn(n),
    Some(Timestamp::now()),
    payload(&(n as u32).to_le_bytes()),
  )
}

/// A message from `writer` carrying one DATA.
pub fn data_message(writer: GUID, reader_id: EntityId, n: i64) -> Message {
  MessageBuilder::new()
    .ts_msg(Some(Timestamp::now()))
    .data_msg(&change(writer, n), reader_id)
    .add_header_and_build(writer.prefix)
}

pub fn heartbeat_message(writer: GUID, first: i64, last: i64, count: i32) -> Message {
  MessageBuilder::new()
    .heartbeat_msg(EntityId::UNKNOWN, writer.entity_id, sn(first), sn(last), count, false)
    .add_header_and_build(writer.prefix)
}

/// GAP declaring `[start, list_base - 1]` and `extra` irrelevant.
pub fn gap_message(writer: GUID, start: i64, list_base: i64, extra: &[i64]) -> Message {
  let mut gap_list = SequenceNumberSet::new(sn(list_base), 32);
  for n in extra {
    gap_list.insert(sn(*n));
  }
  let gap = Gap {
    reader_id: EntityId::UNKNOWN,
    writer_id: writer.entity_id,
    gap_start: sn(start),
    gap_list,
  };
  let mut message = MessageBuilder::new().add_header_and_build(writer.prefix);
  message.add_submessage(Submessage::new(SubmessageBody::Writer(WriterSubmessage::Gap(
    gap,
    BitFlags::<GAP_Flags>::from_endianness(ENDIANNESS),
  ))));
  message
}

pub fn ack_nack_message(reader: GUID, writer: GUID, base: i64, missing: &[i64], count: i32) -> Message {
  let mut set = SequenceNumberSet::new(sn(base), 32);
  for n in missing {
    set.insert(sn(*n));
  }
  MessageBuilder::new()
    .dst_submessage(writer.prefix)
    .acknack_msg(reader.entity_id, writer.entity_id, set, count, false)
    .add_header_and_build(reader.prefix)
}

/// Sequence numbers of everything waiting in `samples`.
pub fn delivered(samples: &SampleReceiver) -> Vec<i64> {
  let mut delivered = Vec::new();
  while let Ok(sample) = samples.try_recv() {
    delivered.push(i64::from(sample.sequence_number));
  }
  delivered
}

pub fn heartbeats(messages: &[Message]) -> Vec<Heartbeat> {
  writer_submessages(messages)
    .into_iter()
    .filter_map(|w| match w {
      WriterSubmessage::Heartbeat(hb, _) => Some(hb),
      _ => None,
    })
    .collect()
}

pub fn data_sequence_numbers(messages: &[Message]) -> Vec<i64> {
  writer_submessages(messages)
    .into_iter()
    .filter_map(|w| match w {
      WriterSubmessage::Data(data, _) => Some(i64::from(data.writer_sn)),
      _ => None,
    })
    .collect()
}

pub fn data_frags(messages: &[Message]) -> Vec<DataFrag> {
  writer_submessages(messages)
    .into_iter()
    .filter_map(|w| match w {
      WriterSubmessage::DataFrag(df, _) => Some(df),
      _ => None,
    })
    .collect()
}

pub fn ack_nacks(messages: &[Message]) -> Vec<AckNack> {
  messages
    .iter()
    .flat_map(|m| m.submessages.iter())
    .filter_map(|s| match &s.body {
      SubmessageBody::Reader(ReaderSubmessage::AckNack(an, _)) => Some(an.clone()),
      _ => None,
    })
    .collect()
}

fn writer_submessages(messages: &[Message]) -> Vec<WriterSubmessage> {
  messages
    .iter()
    .flat_map(|m| m.submessages.iter())
    .filter_map(|s| match &s.body {
      SubmessageBody::Writer(w) => Some(w.clone()),
      _ => None,
    })
    .collect()
}

/// In-memory channel that records what is sent through it.
pub struct RecordingChannel {
  pub locators: Vec<Locator>,
  sent: Mutex<Vec<(GUID, Message)>>,
  closed: AtomicBool,
}

impl RecordingChannel {
  /// Everything sent since the last call.
  pub fn take_sent(&self) -> Vec<Message> {
    self
      .sent
      .lock()
      .unwrap()
      .drain(..)
      .map(|(_, message)| message)
      .collect()
  }
}

impl DataChannel for RecordingChannel {
  fn send(&self, destination: GUID, message: &Message) -> io::Result<()> {
    self.sent.lock().unwrap().push((destination, message.clone()));
    Ok(())
  }

  fn receive(&self) -> io::Result<Option<Message>> {
    Ok(None)
  }

  fn close(&self) {
    self.closed.store(true, Ordering::SeqCst);
  }

  fn is_closed(&self) -> bool {
    self.closed.load(Ordering::SeqCst)
  }
}

/// Hands out one [`RecordingChannel`] per `connect`.
#[derive(Default)]
pub struct RecordingFactory {
  channels: Mutex<Vec<Arc<RecordingChannel>>>,
}

impl RecordingFactory {
  pub fn channels(&self) -> Vec<Arc<RecordingChannel>> {
    self.channels.lock().unwrap().clone()
  }

  /// The channel opened towards `locator`. Panics if there is none.
  pub fn channel_to(&self, locator: Locator) -> Arc<RecordingChannel> {
    self
      .channels()
      .into_iter()
      .find(|c| c.locators.contains(&locator))
      .unwrap()
  }
}

impl DataChannelFactory for RecordingFactory {
  fn connect(&self, locators: &[Locator]) -> io::Result<Arc<dyn DataChannel>> {
    let channel = Arc::new(RecordingChannel {
      locators: locators.to_vec(),
      sent: Mutex::new(Vec::new()),
      closed: AtomicBool::new(false),
    });
    self.channels.lock().unwrap().push(channel.clone());
    Ok(channel)
  }

  fn bind(&self, _port: u16) -> io::Result<Arc<dyn DataChannel>> {
    Err(io::Error::new(io::ErrorKind::Other, "bind not supported"))
  }
}

/// Delivers every sent message synchronously to the subscriber registered
/// at the destination locator. `filter` sees each message first and may
/// drop it.
pub struct Switchboard {
  endpoints: Mutex<Vec<(Locator, Weak<dyn MessageSubscriber>)>>,
  filter: Mutex<Box<dyn FnMut(&Message) -> bool + Send>>,
}

impl Switchboard {
  pub fn new() -> Arc<Switchboard> {
    Arc::new(Switchboard {
      endpoints: Mutex::new(Vec::new()),
      filter: Mutex::new(Box::new(|_| true)),
    })
  }

  pub fn attach(&self, locator: Locator, subscriber: Arc<dyn MessageSubscriber>) {
    self
      .endpoints
      .lock()
      .unwrap()
      .push((locator, Arc::downgrade(&subscriber)));
  }

  pub fn set_filter(&self, filter: impl FnMut(&Message) -> bool + Send + 'static) {
    *self.filter.lock().unwrap() = Box::new(filter);
  }

  fn deliver(&self, locators: &[Locator], message: &Message) {
    if !(self.filter.lock().unwrap())(message) {
      return;
    }
    let targets: Vec<Arc<dyn MessageSubscriber>> = self
      .endpoints
      .lock()
      .unwrap()
      .iter()
      .filter(|(locator, _)| locators.contains(locator))
      .filter_map(|(_, subscriber)| subscriber.upgrade())
      .collect();
    for target in targets {
      target.on_message(message);
    }
  }
}

struct SwitchboardChannel {
  switchboard: Arc<Switchboard>,
  locators: Vec<Locator>,
  closed: AtomicBool,
}

impl DataChannel for SwitchboardChannel {
  fn send(&self, _destination: GUID, message: &Message) -> io::Result<()> {
    // round trip through the codec, as a socket would
    let bytes = Bytes::from(message.encode_to_vec().unwrap());
    let decoded = Message::decode(&bytes).unwrap();
    self.switchboard.deliver(&self.locators, &decoded);
    Ok(())
  }

  fn receive(&self) -> io::Result<Option<Message>> {
    Ok(None)
  }

  fn close(&self) {
    self.closed.store(true, Ordering::SeqCst);
  }

  fn is_closed(&self) -> bool {
    self.closed.load(Ordering::SeqCst)
  }
}

pub struct SwitchboardFactory(pub Arc<Switchboard>);

impl DataChannelFactory for SwitchboardFactory {
  fn connect(&self, locators: &[Locator]) -> io::Result<Arc<dyn DataChannel>> {
    Ok(Arc::new(SwitchboardChannel {
      switchboard: self.0.clone(),
      locators: locators.to_vec(),
      closed: AtomicBool::new(false),
    }))
  }

  fn bind(&self, _port: u16) -> io::Result<Arc<dyn DataChannel>> {
    Err(io::Error::new(io::ErrorKind::Other, "bind not supported"))
  }
}
