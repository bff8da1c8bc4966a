//! Encoded sizes of submessages and messages.
//!
//! Submessage headers and parameter entries carry the length of what follows
//! them, so the encoder needs these sizes before it writes the first byte.
//! Every function here mirrors the matching `Writable` implementation.

use crate::{
  messages::{
    header::Header,
    submessages::{
      elements::padding_needed,
      submessage_header::SubmessageHeader,
      submessages::{
        AckNack, Data, DataFrag, Gap, Heartbeat, InfoDestination, InfoTimestamp,
        InterpreterSubmessage, ReaderSubmessage, WriterSubmessage,
      },
    },
  },
  rtps::{Message, Submessage, SubmessageBody},
};

pub fn data_length(data: &Data) -> usize {
  Data::FIXED_LENGTH
    + data.inline_qos.as_ref().map_or(0, |qos| qos.len_serialized())
    + data
      .serialized_payload
      .as_ref()
      .map_or(0, |payload| payload.len_serialized())
}

pub fn data_frag_length(data_frag: &DataFrag) -> usize {
  let fragment_bytes = data_frag.serialized_payload.len();
  DataFrag::FIXED_LENGTH
    + data_frag.inline_qos.as_ref().map_or(0, |qos| qos.len_serialized())
    + fragment_bytes
    + padding_needed(fragment_bytes)
}

fn writer_submessage_length(submessage: &WriterSubmessage) -> usize {
  match submessage {
    WriterSubmessage::Data(data, _) => data_length(data),
    WriterSubmessage::DataFrag(data_frag, _) => data_frag_length(data_frag),
    WriterSubmessage::Gap(gap, _) => Gap::len_serialized(gap),
    WriterSubmessage::Heartbeat(_, _) => Heartbeat::LENGTH,
  }
}

fn reader_submessage_length(submessage: &ReaderSubmessage) -> usize {
  match submessage {
    ReaderSubmessage::AckNack(ack_nack, _) => AckNack::len_serialized(ack_nack),
  }
}

fn interpreter_submessage_length(submessage: &InterpreterSubmessage) -> usize {
  match submessage {
    InterpreterSubmessage::InfoTimestamp(info_ts, _) => InfoTimestamp::len_serialized(info_ts),
    InterpreterSubmessage::InfoDestination(_, _) => InfoDestination::LENGTH,
  }
}

/// Value of `octetsToNextHeader`.
pub fn body_length(body: &SubmessageBody) -> usize {
  match body {
    SubmessageBody::Writer(s) => writer_submessage_length(s),
    SubmessageBody::Reader(s) => reader_submessage_length(s),
    SubmessageBody::Interpreter(s) => interpreter_submessage_length(s),
  }
}

pub fn submessage_length(submessage: &Submessage) -> usize {
  SubmessageHeader::LENGTH + body_length(&submessage.body)
}

pub fn message_length(message: &Message) -> usize {
  Header::LENGTH
    + message
      .submessages
      .iter()
      .map(submessage_length)
      .sum::<usize>()
}

#[cfg(test)]
mod tests {
  use bytes::Bytes;
  use speedy::{Endianness, Writable};

  use super::*;
  use crate::{
    messages::submessages::elements::{
      parameter_list::{Parameter, ParameterId, ParameterList},
      serialized_payload::{RepresentationIdentifier, SerializedPayload},
    },
    structure::{
      guid::{EntityId, GuidPrefix},
      sequence_number::{SequenceNumber, SequenceNumberSet},
      time::Timestamp,
    },
  };

  fn encoded_len<T: Writable<Endianness>>(value: &T) -> usize {
    value.write_to_vec_with_ctx(Endianness::LittleEndian).unwrap().len()
  }

  #[test]
  fn data_length_matches_encoder() {
    let mut qos = ParameterList::new();
    qos.push(Parameter::new(ParameterId::new(0x8001), vec![1u8, 2, 3, 4, 5, 6, 7, 8]).unwrap());
    let data = Data {
      reader_id: EntityId::UNKNOWN,
      writer_id: EntityId::new([0, 0, 1], EntityId::KIND_USER_WRITER_NO_KEY),
      writer_sn: SequenceNumber::new(3),
      inline_qos: Some(qos),
      serialized_payload: Some(SerializedPayload::new(
        RepresentationIdentifier::CDR_LE,
        Bytes::from_static(b"seven b"),
      )),
    };
    assert_eq!(data_length(&data), encoded_len(&data));
    assert_eq!(data_length(&data) % 4, 0);
  }

  #[test]
  fn fixed_size_bodies() {
    let info_dst = InfoDestination {
      guid_prefix: GuidPrefix::UNKNOWN,
    };
    assert_eq!(InfoDestination::LENGTH, encoded_len(&info_dst));
    let ts = InfoTimestamp {
      timestamp: Some(Timestamp::ZERO),
    };
    assert_eq!(InfoTimestamp::len_serialized(&ts), 8);
    let ack_nack = AckNack {
      reader_id: EntityId::UNKNOWN,
      writer_id: EntityId::UNKNOWN,
      reader_sn_state: SequenceNumberSet::new(SequenceNumber::new(1), 40),
      count: 1,
    };
    assert_eq!(AckNack::len_serialized(&ack_nack), encoded_len(&ack_nack));
  }
}
