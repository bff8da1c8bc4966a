use crate::{
  messages::submessages::elements::{
    parameter_list::ParameterList, serialized_payload::SerializedPayload,
  },
  structure::{guid::GUID, sequence_number::SequenceNumber, time::Timestamp},
};

/// One sample produced by a writer. A change is immutable once it has been
/// created; writer GUID and sequence number identify it.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct CacheChange {
  pub writer_guid: GUID,
  pub sequence_number: SequenceNumber,
  /// Time of the INFO_TS that preceded the sample on the wire, or the time
  /// the local writer created it.
  pub source_timestamp: Option<Timestamp>,
  /// Protocol and user parameters carried in front of the payload.
  pub inline_qos: Option<ParameterList>,
  pub payload: SerializedPayload,
}

impl CacheChange {
  pub fn new(
    writer_guid: GUID,
    sequence_number: SequenceNumber,
    source_timestamp: Option<Timestamp>,
    payload: SerializedPayload,
  ) -> CacheChange {
    CacheChange {
      writer_guid,
      sequence_number,
      source_timestamp,
      inline_qos: None,
      payload,
    }
  }

  pub fn with_inline_qos(mut self, inline_qos: Option<ParameterList>) -> CacheChange {
    self.inline_qos = inline_qos.filter(|qos| !qos.is_empty());
    self
  }
}
