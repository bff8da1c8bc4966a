use std::{
  cmp::{max, min},
  collections::{BTreeMap, BTreeSet},
};

#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};

use crate::{
  messages::submessages::submessages::{Gap, Heartbeat},
  rtps::{Message, MessageBuilder},
  structure::{
    guid::GUID,
    locator::Locator,
    sequence_number::{SequenceNumber, SequenceNumberSet},
  },
};

/// RTPS v2.3 section 8.4.10.4 ChangeFromWriterStatusKind, without UNKNOWN
/// (no status) and LOST (below `settled_before`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeFromWriterStatus {
  Missing,
  Received,
  Irrelevant,
}

/// What a reader knows about one matched remote writer: which changes it
/// has received, which ones it still misses and which ones the writer
/// declared irrelevant.
///
/// Peers announce ranges of any size, so nothing here is stored per
/// announced number: missing changes are everything up to the highest
/// announced number that is neither received nor irrelevant, and
/// irrelevant changes are kept as disjoint ranges.
#[derive(Debug)]
pub struct WriterProxy {
  pub remote_writer_guid: GUID,
  pub unicast_locator_list: Vec<Locator>,

  received: BTreeSet<SequenceNumber>,
  // first -> last, inclusive, disjoint and not adjacent
  irrelevant: BTreeMap<SequenceNumber, SequenceNumber>,
  // Highest number a heartbeat said the writer has.
  announced_max: SequenceNumber,
  // Highest sequence number received or declared irrelevant.
  available_changes_max: SequenceNumber,
  // Nothing below is reported missing again: it was delivered, or lost.
  settled_before: SequenceNumber,

  lost_changes_count: u64,
  irrelevant_changes_count: u64,

  heartbeat_processor: WriterHeartbeatProcessor,

  // Reader-side delivery position. `None` until the reader decides where
  // delivery starts.
  pub(crate) next_to_deliver: Option<SequenceNumber>,
}

impl WriterProxy {
  pub fn new(remote_writer_guid: GUID, unicast_locator_list: Vec<Locator>) -> WriterProxy {
    WriterProxy {
      remote_writer_guid,
      unicast_locator_list,
      received: BTreeSet::new(),
      irrelevant: BTreeMap::new(),
      announced_max: SequenceNumber::zero(),
      available_changes_max: SequenceNumber::zero(),
      settled_before: SequenceNumber::new(1),
      lost_changes_count: 0,
      irrelevant_changes_count: 0,
      heartbeat_processor: WriterHeartbeatProcessor::new(),
      next_to_deliver: None,
    }
  }

  /// Records that the change `seq_num` is now in the local history cache.
  pub fn received_change_set(&mut self, seq_num: SequenceNumber) {
    if !self.received.insert(seq_num) {
      trace!("{:?} from {:?} already received", seq_num, self.remote_writer_guid);
      return;
    }
    self.available_changes_max = max(self.available_changes_max, seq_num);
  }

  /// Every number up to `last_available` that is neither received nor
  /// irrelevant becomes missing.
  pub fn missing_changes_update(&mut self, last_available: SequenceNumber) {
    self.announced_max = max(self.announced_max, last_available);
  }

  /// The writer no longer has anything below `first_available`. Numbers
  /// still missing below it are counted as lost and never requested again.
  pub fn lost_changes_update(&mut self, first_available: SequenceNumber) {
    if first_available <= self.settled_before {
      return;
    }
    let last_lost = min(first_available.prev(), self.announced_max);
    if last_lost >= self.settled_before {
      let count = span(self.settled_before, last_lost)
        - self.received_in(self.settled_before, last_lost)
        - self.irrelevant_in(self.settled_before, last_lost);
      if count > 0 {
        self.lost_changes_count += count;
        debug!(
          "{} changes from {:?} before {:?} are no longer available and are lost",
          count, self.remote_writer_guid, first_available
        );
      }
    }
    // Irrelevant ranges stay: delivery may still need to step over them.
    self.received = self.received.split_off(&first_available);
    self.settled_before = first_available;
  }

  /// Forgets bookkeeping below `sn`. Used once changes are delivered or
  /// when the reader is not interested in older changes.
  pub fn forget_before(&mut self, sn: SequenceNumber) {
    self.received = self.received.split_off(&sn);
    let mut kept = self.irrelevant.split_off(&sn);
    if let Some((_, last)) = self.irrelevant.iter().next_back() {
      if *last >= sn {
        kept.insert(sn, *last);
      }
    }
    self.irrelevant = kept;
    self.settled_before = max(self.settled_before, sn);
  }

  /// Marks `[first, last]` irrelevant. Numbers the reader already stepped
  /// past are left alone.
  pub fn irrelevant_changes_set(&mut self, first: SequenceNumber, last: SequenceNumber) {
    let floor = self.next_to_deliver.unwrap_or_else(|| SequenceNumber::new(1));
    let first = max(first, floor);
    if first > last {
      return;
    }

    // Lost numbers were already counted.
    let counted_from = max(first, self.settled_before);
    if counted_from <= last {
      self.irrelevant_changes_count += span(counted_from, last)
        - self.received_in(counted_from, last)
        - self.irrelevant_in(counted_from, last);
    }

    let mut merged_first = first;
    let mut merged_last = last;
    let touching: Vec<(SequenceNumber, SequenceNumber)> = self
      .irrelevant
      .range(..=last.next())
      .rev()
      .take_while(|(_, end)| **end >= first.prev())
      .map(|(start, end)| (*start, *end))
      .collect();
    for (start, end) in touching {
      self.irrelevant.remove(&start);
      merged_first = min(merged_first, start);
      merged_last = max(merged_last, end);
    }
    self.irrelevant.insert(merged_first, merged_last);
    self.available_changes_max = max(self.available_changes_max, last);
  }

  pub fn irrelevant_change_set(&mut self, seq_num: SequenceNumber) {
    self.irrelevant_changes_set(seq_num, seq_num)
  }

  /// Marks everything a GAP submessage covers as irrelevant: the range
  /// `[gap_start, gap_list.base - 1]` and every member of `gap_list`.
  /// Returns false for a GAP with numbers below 1.
  pub fn handle_gap(&mut self, gap: &Gap) -> bool {
    let list_base = gap.gap_list.base();
    if !gap.gap_start.is_valid() || !list_base.is_valid() {
      debug!(
        "GAP from {:?} with start {:?} and list base {:?} ignored",
        self.remote_writer_guid, gap.gap_start, list_base
      );
      return false;
    }
    if gap.gap_start < list_base {
      self.irrelevant_changes_set(gap.gap_start, list_base.prev());
    }
    for sn in gap.gap_list.iter() {
      self.irrelevant_change_set(sn);
    }
    true
  }

  /// The lowest outstanding sequence numbers, ascending: at most as many
  /// as one AckNack can request, starting at the first missing one.
  pub fn missing_changes(&self) -> Vec<SequenceNumber> {
    let mut missing = Vec::new();
    let mut window_end = self.announced_max;
    let mut cursor = self.settled_before;
    while cursor <= window_end {
      if let Some(last) = self.irrelevant_until(cursor) {
        if last >= window_end {
          break;
        }
        cursor = last.next();
        continue;
      }
      if !self.received.contains(&cursor) {
        if missing.is_empty() {
          let window = i64::from(SequenceNumberSet::MAX_BITS) - 1;
          let last_in_window = SequenceNumber::new(i64::from(cursor).saturating_add(window));
          window_end = min(window_end, last_in_window);
        }
        missing.push(cursor);
      }
      if cursor == window_end {
        break;
      }
      cursor = cursor.next();
    }
    missing
  }

  pub fn available_changes_max(&self) -> SequenceNumber {
    self.available_changes_max
  }

  /// Lowest sequence number still tracked.
  pub fn settled_before(&self) -> SequenceNumber {
    self.settled_before
  }

  pub fn status(&self, seq_num: SequenceNumber) -> Option<ChangeFromWriterStatus> {
    if self.received.contains(&seq_num) {
      Some(ChangeFromWriterStatus::Received)
    } else if self.irrelevant_until(seq_num).is_some() {
      Some(ChangeFromWriterStatus::Irrelevant)
    } else if seq_num >= self.settled_before && seq_num <= self.announced_max {
      Some(ChangeFromWriterStatus::Missing)
    } else {
      None
    }
  }

  pub fn is_received(&self, seq_num: SequenceNumber) -> bool {
    self.received.contains(&seq_num)
  }

  /// If `seq_num` was declared irrelevant, the last number of the
  /// irrelevant run that contains it.
  pub fn irrelevant_until(&self, seq_num: SequenceNumber) -> Option<SequenceNumber> {
    self
      .irrelevant
      .range(..=seq_num)
      .next_back()
      .filter(|(_, last)| **last >= seq_num)
      .map(|(_, last)| *last)
  }

  pub fn lost_changes_count(&self) -> u64 {
    self.lost_changes_count
  }

  pub fn irrelevant_changes_count(&self) -> u64 {
    self.irrelevant_changes_count
  }

  /// Returns false for a duplicate heartbeat, or one announcing numbers
  /// below 1 or a range that ends before it starts.
  pub fn handle_heartbeat(&mut self, heartbeat: &Heartbeat, final_flag: bool) -> bool {
    if !heartbeat.first_sn.is_valid() || heartbeat.last_sn < heartbeat.first_sn.prev() {
      warn!(
        "Heartbeat from {:?} with range {:?}..={:?} ignored",
        self.remote_writer_guid, heartbeat.first_sn, heartbeat.last_sn
      );
      return false;
    }
    self.heartbeat_processor.add_heartbeat(heartbeat, final_flag)
  }

  /// Acknowledges the latest pending heartbeat. Returns the AckNack
  /// message to send to the writer, or `None` if no heartbeat is pending.
  pub fn ack(&mut self, reader_guid: GUID) -> Option<Message> {
    let heartbeat = self.heartbeat_processor.take_pending()?;
    self.lost_changes_update(heartbeat.first_sn);
    self.missing_changes_update(heartbeat.last_sn);

    // nothing below settled_before is of interest any more
    let acked_max = max(self.available_changes_max, self.settled_before.prev());
    let reader_sn_state = sequence_number_set(&self.missing_changes(), acked_max, heartbeat.last_sn);
    let count = self.heartbeat_processor.next_ack_count();
    trace!(
      "AckNack {} to {:?}: base {:?} missing {:?}",
      count,
      self.remote_writer_guid,
      reader_sn_state.base(),
      reader_sn_state.iter().collect::<Vec<_>>()
    );
    Some(
      MessageBuilder::new()
        .dst_submessage(self.remote_writer_guid.prefix)
        .acknack_msg(
          reader_guid.entity_id,
          self.remote_writer_guid.entity_id,
          reader_sn_state,
          count,
          false,
        )
        .add_header_and_build(reader_guid.prefix),
    )
  }

  // Received numbers in `[first, last]`.
  fn received_in(&self, first: SequenceNumber, last: SequenceNumber) -> u64 {
    self.received.range(first..=last).count() as u64
  }

  // Irrelevant numbers in `[first, last]` that were not received.
  fn irrelevant_in(&self, first: SequenceNumber, last: SequenceNumber) -> u64 {
    let starts_before = self.irrelevant.range(..first).next_back();
    starts_before
      .into_iter()
      .chain(self.irrelevant.range(first..=last))
      .filter_map(|(start, end)| {
        let from = max(*start, first);
        let to = min(*end, last);
        if from > to {
          None
        } else {
          Some(span(from, to) - self.received_in(from, to))
        }
      })
      .sum()
  }
}

// Count of numbers in `[first, last]`, with `first <= last`.
fn span(first: SequenceNumber, last: SequenceNumber) -> u64 {
  (i64::from(last) as i128 - i64::from(first) as i128 + 1) as u64
}

/// Builds the `readerSNState` of an AckNack.
///
/// With nothing missing, the set is empty and based at
/// `available_changes_max + 1`: everything so far is acknowledged. Else the
/// set starts at the lowest missing number and marks every missing number
/// up to `last_sn`, at most 256 of them.
pub fn sequence_number_set(
  missing: &[SequenceNumber],
  available_changes_max: SequenceNumber,
  last_sn: SequenceNumber,
) -> SequenceNumberSet {
  let base = match missing.iter().filter(|sn| **sn <= last_sn).min() {
    Some(base) => *base,
    None => return SequenceNumberSet::new_empty(available_changes_max.next()),
  };
  let span = i64::from(last_sn)
    .saturating_sub(i64::from(base))
    .saturating_add(1);
  let num_bits = span.min(i64::from(SequenceNumberSet::MAX_BITS)) as u32;
  let mut set = SequenceNumberSet::new(base, num_bits);
  for sn in missing {
    if *sn >= base && i64::from(*sn).saturating_sub(i64::from(base)) < i64::from(num_bits) {
      set.insert(*sn);
    }
  }
  set
}

/// Heartbeat deduplication and AckNack counting for one writer proxy.
#[derive(Debug)]
pub struct WriterHeartbeatProcessor {
  highest_count_seen: Option<i32>,
  pending: Option<Heartbeat>,
  ack_count: i32,
}

impl WriterHeartbeatProcessor {
  pub fn new() -> WriterHeartbeatProcessor {
    WriterHeartbeatProcessor {
      highest_count_seen: None,
      pending: None,
      ack_count: 1,
    }
  }

  /// Keeps `heartbeat` for the next `ack` unless its count was already
  /// seen. Final heartbeats need no answer.
  pub fn add_heartbeat(&mut self, heartbeat: &Heartbeat, final_flag: bool) -> bool {
    if self.highest_count_seen.map_or(false, |c| heartbeat.count <= c) {
      trace!("Duplicate heartbeat count {}", heartbeat.count);
      return false;
    }
    self.highest_count_seen = Some(heartbeat.count);
    if final_flag {
      trace!("Final heartbeat {}, no AckNack needed", heartbeat.count);
    } else {
      self.pending = Some(heartbeat.clone());
    }
    true
  }

  pub fn take_pending(&mut self) -> Option<Heartbeat> {
    self.pending.take()
  }

  pub fn next_ack_count(&mut self) -> i32 {
    let count = self.ack_count;
    self.ack_count = self.ack_count.wrapping_add(1);
    count
  }
}

impl Default for WriterHeartbeatProcessor {
  fn default() -> Self {
    WriterHeartbeatProcessor::new()
  }
}
