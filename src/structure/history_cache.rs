use std::{
  collections::{btree_map::Entry, BTreeMap},
  ops::Bound::{Excluded, Unbounded},
};

#[allow(unused_imports)]
use log::{debug, error, trace, warn};

use crate::structure::{cache_change::CacheChange, guid::GUID, sequence_number::SequenceNumber};

/// Changes of every writer known to an endpoint, ordered by sequence number
/// per writer.
#[derive(Debug, Default)]
pub struct HistoryCache {
  changes: BTreeMap<GUID, BTreeMap<SequenceNumber, CacheChange>>,
}

impl HistoryCache {
  pub fn new() -> HistoryCache {
    HistoryCache::default()
  }

  /// Stores the change. Returns `false` and keeps the old entry if the
  /// writer already has a change with that sequence number.
  pub fn add_change(&mut self, change: CacheChange) -> bool {
    let writer_changes = self.changes.entry(change.writer_guid).or_default();
    match writer_changes.entry(change.sequence_number) {
      Entry::Occupied(_) => {
        trace!(
          "Change {:?} from {:?} already in cache",
          change.sequence_number,
          change.writer_guid
        );
        false
      }
      Entry::Vacant(e) => {
        e.insert(change);
        true
      }
    }
  }

  pub fn get_change(&self, writer_guid: GUID, sequence_number: SequenceNumber) -> Option<&CacheChange> {
    self
      .changes
      .get(&writer_guid)
      .and_then(|c| c.get(&sequence_number))
  }

  /// Takes a change out of the cache, e.g. once it has been delivered.
  pub fn remove_change(&mut self, writer_guid: GUID, sequence_number: SequenceNumber) -> Option<CacheChange> {
    self
      .changes
      .get_mut(&writer_guid)
      .and_then(|c| c.remove(&sequence_number))
  }

  /// Drops every change of the writer.
  pub fn remove_writer(&mut self, writer_guid: GUID) {
    self.changes.remove(&writer_guid);
  }

  /// Looks up changes in the order the sequence numbers are given. Numbers
  /// that are not in the cache are skipped.
  pub fn find_all(&self, writer_guid: GUID, sequence_numbers: &[SequenceNumber]) -> Vec<&CacheChange> {
    match self.changes.get(&writer_guid) {
      Some(writer_changes) => sequence_numbers
        .iter()
        .filter_map(|sn| writer_changes.get(sn))
        .collect(),
      None => Vec::new(),
    }
  }

  /// Changes of the writer with sequence number strictly greater than
  /// `after`, in ascending order.
  pub fn get_all_after(&self, writer_guid: GUID, after: SequenceNumber) -> Vec<&CacheChange> {
    match self.changes.get(&writer_guid) {
      Some(writer_changes) => writer_changes
        .range((Excluded(after), Unbounded))
        .map(|(_, c)| c)
        .collect(),
      None => Vec::new(),
    }
  }

  /// Lowest stored sequence number, zero if the writer has no changes.
  pub fn seq_num_min(&self, writer_guid: GUID) -> SequenceNumber {
    self
      .changes
      .get(&writer_guid)
      .and_then(|c| c.keys().next().copied())
      .unwrap_or_else(SequenceNumber::zero)
  }

  /// Highest stored sequence number, zero if the writer has no changes.
  pub fn seq_num_max(&self, writer_guid: GUID) -> SequenceNumber {
    self
      .changes
      .get(&writer_guid)
      .and_then(|c| c.keys().next_back().copied())
      .unwrap_or_else(SequenceNumber::zero)
  }

  pub fn len(&self, writer_guid: GUID) -> usize {
    self.changes.get(&writer_guid).map_or(0, BTreeMap::len)
  }

  pub fn is_empty(&self) -> bool {
    self.changes.values().all(BTreeMap::is_empty)
  }

  pub fn clear(&mut self) {
    self.changes.clear();
  }
}
