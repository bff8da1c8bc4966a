use std::collections::BTreeSet;

#[allow(unused_imports)]
use log::{debug, error, trace, warn};

use crate::{
  messages::submessages::submessages::AckNack,
  structure::{
    guid::GUID, locator::Locator, qos::ReliabilityKind, sequence_number::SequenceNumber,
  },
};

/// What a writer knows about one matched remote reader.
#[derive(Debug, PartialEq, Clone)]
pub struct ReaderProxy {
  /// Identifies the remote matched reader.
  pub remote_reader_guid: GUID,
  pub unicast_locator_list: Vec<Locator>,
  pub reliability: ReliabilityKind,

  // The reader has confirmed everything up to and including this.
  highest_acked: SequenceNumber,
  // Sequence numbers the reader asked for in its latest AckNack.
  requested_changes: BTreeSet<SequenceNumber>,
  last_ack_nack_count: Option<i32>,
}

impl ReaderProxy {
  pub fn new(
    remote_reader_guid: GUID,
    unicast_locator_list: Vec<Locator>,
    reliability: ReliabilityKind,
  ) -> ReaderProxy {
    ReaderProxy {
      remote_reader_guid,
      unicast_locator_list,
      reliability,
      highest_acked: SequenceNumber::zero(),
      requested_changes: BTreeSet::new(),
      last_ack_nack_count: None,
    }
  }

  pub fn is_reliable(&self) -> bool {
    self.reliability == ReliabilityKind::Reliable
  }

  /// Everything up to and including `committed` is confirmed. The
  /// watermark only moves forward.
  pub fn acked_changes(&mut self, committed: SequenceNumber) {
    if committed > self.highest_acked {
      self.highest_acked = committed;
    }
  }

  pub fn highest_acked(&self) -> SequenceNumber {
    self.highest_acked
  }

  pub fn requested_changes_clear(&mut self) {
    self.requested_changes.clear();
  }

  pub fn requested_changes_set(&mut self, seq_nums: impl IntoIterator<Item = SequenceNumber>) {
    self.requested_changes.extend(seq_nums);
  }

  /// Requested sequence numbers, ascending.
  pub fn requested_changes(&self) -> Vec<SequenceNumber> {
    self.requested_changes.iter().copied().collect()
  }

  pub fn has_requested_changes(&self) -> bool {
    !self.requested_changes.is_empty()
  }

  /// Applies an AckNack from this reader: acknowledges everything below
  /// the set base and replaces the requested set with the set members.
  /// Returns false if the AckNack is a duplicate by count, or its set
  /// starts below 1.
  pub fn handle_ack_nack(&mut self, ack_nack: &AckNack) -> bool {
    if !ack_nack.reader_sn_state.base().is_valid() {
      debug!(
        "AckNack from {:?} with base {:?} ignored",
        self.remote_reader_guid,
        ack_nack.reader_sn_state.base()
      );
      return false;
    }
    if self.last_ack_nack_count.map_or(false, |c| ack_nack.count <= c) {
      trace!(
        "Duplicate AckNack count {} from {:?}",
        ack_nack.count,
        self.remote_reader_guid
      );
      return false;
    }
    self.last_ack_nack_count = Some(ack_nack.count);
    self.acked_changes(ack_nack.reader_sn_state.base().prev());
    self.requested_changes_clear();
    self.requested_changes_set(ack_nack.reader_sn_state.iter());
    true
  }
}
