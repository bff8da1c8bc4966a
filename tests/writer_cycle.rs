mod common;

use std::sync::Arc;

use common::*;
use rtps_engine::{
  messages::submessages::elements::parameter_list::{Parameter, ParameterId, ParameterList},
  network::DataChannel,
  rtps::MessageSubscriber,
  DurabilityKind, EntityId, GuidPrefix, ReliabilityKind, RtpsWriter, UserSample, WriterQos, GUID,
};

const READER_PORT: u16 = 7412;

fn writer(qos: WriterQos) -> (RtpsWriter, Arc<RecordingFactory>) {
  let factory = Arc::new(RecordingFactory::default());
  let writer = RtpsWriter::new(writer_guid(), qos, &test_config(), factory.clone());
  (writer, factory)
}

fn publish(writer: &RtpsWriter, count: usize) {
  for i in 0..count {
    writer
      .new_change(UserSample::new(payload(&[i as u8; 8])))
      .unwrap();
  }
}

#[test]
fn reliable_reader_gets_no_push() {
  let (writer, factory) = writer(WriterQos::default());
  writer
    .matched_reader_add(reader_guid(), vec![locator(READER_PORT)], ReliabilityKind::Reliable)
    .unwrap();
  publish(&writer, 3);
  assert!(factory.channel_to(locator(READER_PORT)).take_sent().is_empty());
  writer.close().unwrap();
}

#[test]
fn heartbeat_announces_history() {
  let (writer, factory) = writer(WriterQos::default());
  writer
    .matched_reader_add(reader_guid(), vec![locator(READER_PORT)], ReliabilityKind::Reliable)
    .unwrap();
  writer.heartbeat_tick().unwrap();
  let channel = factory.channel_to(locator(READER_PORT));
  assert!(channel.take_sent().is_empty(), "no heartbeat for empty history");

  publish(&writer, 3);
  writer.heartbeat_tick().unwrap();
  writer.heartbeat_tick().unwrap();
  let sent = channel.take_sent();
  let heartbeats = heartbeats(&sent);
  assert_eq!(heartbeats.len(), 2);
  assert_eq!(heartbeats[0].first_sn, sn(1));
  assert_eq!(heartbeats[0].last_sn, sn(3));
  assert_eq!(heartbeats[0].reader_id, reader_guid().entity_id);
  assert_eq!(heartbeats[0].writer_id, writer_guid().entity_id);
  assert!(heartbeats[0].count < heartbeats[1].count);
  assert_eq!(writer.heartbeat_count().unwrap(), heartbeats[1].count);
  assert_eq!(sent[0].header.guid_prefix, writer_guid().prefix);
  writer.close().unwrap();
}

#[test]
fn requested_changes_are_resent_after_heartbeat() {
  let (writer, factory) = writer(WriterQos::default());
  writer
    .matched_reader_add(reader_guid(), vec![locator(READER_PORT)], ReliabilityKind::Reliable)
    .unwrap();
  publish(&writer, 5);
  writer.on_message(&ack_nack_message(reader_guid(), writer_guid(), 2, &[2, 4], 1));
  let acked = writer
    .with_reader_proxy(reader_guid(), |proxy| proxy.highest_acked())
    .unwrap();
  assert_eq!(acked, Some(sn(1)));

  writer.heartbeat_tick().unwrap();
  let sent = factory.channel_to(locator(READER_PORT)).take_sent();
  assert_eq!(heartbeats(&sent).len(), 1);
  assert_eq!(data_sequence_numbers(&sent), vec![2, 4]);
  // heartbeat first, then the resent data
  assert_eq!(heartbeats(&sent[..1]).len(), 1);

  // still requested until the next AckNack replaces the set
  writer.heartbeat_tick().unwrap();
  let sent = factory.channel_to(locator(READER_PORT)).take_sent();
  assert_eq!(data_sequence_numbers(&sent), vec![2, 4]);

  writer.on_message(&ack_nack_message(reader_guid(), writer_guid(), 6, &[], 2));
  writer.heartbeat_tick().unwrap();
  let sent = factory.channel_to(locator(READER_PORT)).take_sent();
  assert!(data_sequence_numbers(&sent).is_empty());
  writer.close().unwrap();
}

#[test]
fn ack_nack_for_other_writer_or_unknown_reader_is_ignored() {
  let (writer, factory) = writer(WriterQos::default());
  writer
    .matched_reader_add(reader_guid(), vec![locator(READER_PORT)], ReliabilityKind::Reliable)
    .unwrap();
  publish(&writer, 2);
  let other_writer = GUID::new(
    writer_guid().prefix,
    EntityId::new([0, 0, 7], EntityId::KIND_USER_WRITER_NO_KEY),
  );
  writer.on_message(&ack_nack_message(reader_guid(), other_writer, 1, &[1], 1));
  let stranger = GUID::new(GuidPrefix::new(&[0x0e; 12]), reader_guid().entity_id);
  writer.on_message(&ack_nack_message(stranger, writer_guid(), 1, &[1], 1));

  writer.heartbeat_tick().unwrap();
  let sent = factory.channel_to(locator(READER_PORT)).take_sent();
  assert!(data_sequence_numbers(&sent).is_empty());
  writer.close().unwrap();
}

#[test]
fn best_effort_reader_gets_changes_pushed() {
  let (writer, factory) = writer(WriterQos {
    reliability: ReliabilityKind::BestEffort,
    durability: DurabilityKind::Volatile,
  });
  publish(&writer, 2);
  writer
    .matched_reader_add(reader_guid(), vec![locator(READER_PORT)], ReliabilityKind::BestEffort)
    .unwrap();
  let channel = factory.channel_to(locator(READER_PORT));
  assert!(channel.take_sent().is_empty(), "volatile writer replays nothing");

  publish(&writer, 1);
  let sent = channel.take_sent();
  assert_eq!(data_sequence_numbers(&sent), vec![3]);

  writer.heartbeat_tick().unwrap();
  assert!(heartbeats(&channel.take_sent()).is_empty());
  writer.close().unwrap();
}

#[test]
fn transient_local_writer_replays_history_to_best_effort_reader() {
  let (writer, factory) = writer(WriterQos::default());
  publish(&writer, 3);
  writer
    .matched_reader_add(reader_guid(), vec![locator(READER_PORT)], ReliabilityKind::BestEffort)
    .unwrap();
  let sent = factory.channel_to(locator(READER_PORT)).take_sent();
  assert_eq!(data_sequence_numbers(&sent), vec![1, 2, 3]);
  // small changes travel together
  assert_eq!(sent.len(), 1);
  writer.close().unwrap();
}

#[test]
fn user_parameters_travel_as_inline_qos() {
  let (writer, factory) = writer(WriterQos::default());
  writer
    .matched_reader_add(reader_guid(), vec![locator(READER_PORT)], ReliabilityKind::BestEffort)
    .unwrap();
  let mut user_parameters = ParameterList::new();
  user_parameters.push(Parameter::new(ParameterId::new(0x8010), vec![9u8; 4]).unwrap());
  writer
    .new_change(UserSample::new(payload(b"hello")).with_user_parameters(user_parameters.clone()))
    .unwrap();
  let sent = factory.channel_to(locator(READER_PORT)).take_sent();
  let data = sent
    .iter()
    .flat_map(|m| m.submessages.iter())
    .find_map(|s| match &s.body {
      rtps_engine::rtps::SubmessageBody::Writer(
        rtps_engine::messages::submessages::submessages::WriterSubmessage::Data(d, _),
      ) => Some(d.clone()),
      _ => None,
    })
    .unwrap();
  assert_eq!(data.inline_qos, Some(user_parameters));
  writer.close().unwrap();
}

#[test]
fn matched_readers_remove_drops_whole_participant() {
  let (writer, factory) = writer(WriterQos::default());
  let second_reader = GUID::new(
    reader_guid().prefix,
    EntityId::new([0, 0, 3], EntityId::KIND_USER_READER_NO_KEY),
  );
  let other_participant = GUID::new(GuidPrefix::new(&[0x0f; 12]), reader_guid().entity_id);
  for (guid, port) in &[(reader_guid(), 1), (second_reader, 2), (other_participant, 3)] {
    writer
      .matched_reader_add(*guid, vec![locator(*port)], ReliabilityKind::Reliable)
      .unwrap();
  }
  writer.matched_readers_remove(reader_guid().prefix).unwrap();
  assert_eq!(writer.matched_readers().unwrap(), vec![other_participant]);
  assert!(factory.channel_to(locator(1)).is_closed());
  writer.close().unwrap();
}

#[test]
fn matched_reader_add_is_idempotent() {
  let (writer, factory) = writer(WriterQos::default());
  for _ in 0..2 {
    writer
      .matched_reader_add(reader_guid(), vec![locator(READER_PORT)], ReliabilityKind::Reliable)
      .unwrap();
  }
  assert_eq!(writer.matched_readers().unwrap().len(), 1);
  assert_eq!(factory.channels().len(), 1);
  writer.close().unwrap();
}

#[test]
fn closed_writer_refuses_work() {
  let (writer, factory) = writer(WriterQos::default());
  writer
    .matched_reader_add(reader_guid(), vec![locator(READER_PORT)], ReliabilityKind::Reliable)
    .unwrap();
  writer.close().unwrap();
  assert!(writer.matched_readers().unwrap().is_empty());
  assert!(factory.channel_to(locator(READER_PORT)).is_closed());
  assert!(writer.new_change(UserSample::new(payload(b"late"))).is_err());
  assert!(writer
    .matched_reader_add(reader_guid(), vec![locator(READER_PORT)], ReliabilityKind::Reliable)
    .is_err());
  // closing twice is fine
  writer.close().unwrap();
}
