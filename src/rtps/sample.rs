use crate::{
  messages::submessages::elements::{
    parameter_list::ParameterList, serialized_payload::SerializedPayload,
  },
  structure::{
    cache_change::CacheChange, guid::GUID, sequence_number::SequenceNumber, time::Timestamp,
  },
};

/// Sample handed to a writer for publication.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserSample {
  pub payload: SerializedPayload,
  /// Sent as inline QoS in front of the payload. Ids should have the
  /// 0x8000 bit set, or the receiving side drops them.
  pub user_parameters: ParameterList,
}

impl UserSample {
  pub fn new(payload: SerializedPayload) -> UserSample {
    UserSample {
      payload,
      user_parameters: ParameterList::new(),
    }
  }

  #[must_use]
  pub fn with_user_parameters(mut self, user_parameters: ParameterList) -> UserSample {
    self.user_parameters = user_parameters;
    self
  }
}

/// Sample delivered to the application by a reader, in order and fully
/// reassembled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sample {
  pub writer_guid: GUID,
  pub sequence_number: SequenceNumber,
  pub source_timestamp: Option<Timestamp>,
  /// Inline QoS the writer sent along: user parameters, key hash and
  /// status info.
  pub inline_qos: ParameterList,
  pub payload: SerializedPayload,
}

impl Sample {
  /// Inline QoS entries with user defined ids.
  pub fn user_parameters(&self) -> ParameterList {
    ParameterList {
      parameters: self
        .inline_qos
        .parameters
        .iter()
        .filter(|p| p.parameter_id.is_user_defined())
        .cloned()
        .collect(),
    }
  }
}

impl From<CacheChange> for Sample {
  fn from(change: CacheChange) -> Self {
    Sample {
      writer_guid: change.writer_guid,
      sequence_number: change.sequence_number,
      source_timestamp: change.source_timestamp,
      inline_qos: change.inline_qos.unwrap_or_default(),
      payload: change.payload,
    }
  }
}
