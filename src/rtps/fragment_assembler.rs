use std::collections::BTreeMap;

use bit_vec::BitVec;
use bytes::Bytes;
#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};

use crate::{
  messages::submessages::{
    elements::{parameter_list::ParameterList, serialized_payload::SerializedPayload},
    submessages::DataFrag,
  },
  structure::{
    cache_change::CacheChange,
    guid::GUID,
    sequence_number::SequenceNumber,
    time::Timestamp,
  },
};

// One sample being put back together.
struct AssemblyBuffer {
  buffer_bytes: Vec<u8>,
  // one bit per fragment, set once received
  received_bitmap: BitVec,
  fragment_size: usize,
  data_size: usize,
  fragment_count: usize,
  received_count: usize,
  inline_qos: Option<ParameterList>,
}

impl AssemblyBuffer {
  fn new(data_frag: &DataFrag) -> AssemblyBuffer {
    let fragment_count = data_frag.total_number_of_fragments() as usize;
    AssemblyBuffer {
      buffer_bytes: vec![0; data_frag.data_size as usize],
      received_bitmap: BitVec::from_elem(fragment_count, false),
      fragment_size: data_frag.fragment_size as usize,
      data_size: data_frag.data_size as usize,
      fragment_count,
      received_count: 0,
      inline_qos: data_frag.inline_qos.clone(),
    }
  }

  // Copies the fragments of `data_frag` into place. Returns false if the
  // submessage does not belong to this sample or repeats a fragment.
  fn insert_frags(&mut self, data_frag: &DataFrag) -> bool {
    let fragment_size = data_frag.fragment_size as usize;
    if fragment_size != self.fragment_size || data_frag.data_size as usize != self.data_size {
      warn!(
        "DataFrag for {:?} changed sizes: fragment {} -> {}, data {} -> {}",
        data_frag.writer_sn,
        self.fragment_size,
        fragment_size,
        self.data_size,
        data_frag.data_size
      );
      return false;
    }

    let first = match (u32::from(data_frag.fragment_starting_num) as usize).checked_sub(1) {
      Some(first) => first,
      None => return false,
    };
    let count = data_frag.fragments_in_submessage as usize;
    if first.saturating_add(count) > self.fragment_count {
      debug!("DataFrag fragments {}..{} out of range", first + 1, first + count);
      return false;
    }
    if (first..first + count).any(|f| self.received_bitmap.get(f).unwrap_or(true)) {
      trace!("Duplicate fragment {} of {:?}", first + 1, data_frag.writer_sn);
      return false;
    }

    let from_byte = first * self.fragment_size;
    let payload = &data_frag.serialized_payload;
    self.buffer_bytes[from_byte..from_byte + payload.len()].copy_from_slice(payload);
    for f in first..first + count {
      self.received_bitmap.set(f, true);
    }
    self.received_count += count;
    if self.inline_qos.is_none() {
      self.inline_qos = data_frag.inline_qos.clone();
    }
    true
  }

  fn is_complete(&self) -> bool {
    self.received_count == self.fragment_count
  }
}

/// Collects DATA_FRAG submessages until every fragment of a sample has
/// arrived. Fragments may come in any order.
pub struct FragmentAssembler {
  assembly_buffers: BTreeMap<(GUID, SequenceNumber), AssemblyBuffer>,
  max_sample_size: usize,
}

impl FragmentAssembler {
  /// Samples declaring more than `max_sample_size` bytes are refused
  /// before any buffer is allocated for them.
  pub fn new(max_sample_size: usize) -> FragmentAssembler {
    FragmentAssembler {
      assembly_buffers: BTreeMap::new(),
      max_sample_size,
    }
  }

  /// Stores the fragments carried by `data_frag`. Returns true if they were
  /// new. Duplicates and malformed submessages change nothing.
  pub fn add(&mut self, writer_guid: GUID, data_frag: &DataFrag) -> bool {
    if data_frag.fragment_size == 0 || data_frag.data_size == 0 {
      debug!("DataFrag with zero fragment or data size from {:?}", writer_guid);
      return false;
    }
    if data_frag.data_size as usize > self.max_sample_size {
      debug!(
        "DataFrag {:?} from {:?} declares {} bytes, limit is {}",
        data_frag.writer_sn, writer_guid, data_frag.data_size, self.max_sample_size
      );
      return false;
    }
    match data_frag.expected_payload_length() {
      Some(len) if len == data_frag.serialized_payload.len() => (),
      expected => {
        debug!(
          "DataFrag {:?} fragment {} carries {} bytes, expected {:?}",
          data_frag.writer_sn,
          u32::from(data_frag.fragment_starting_num),
          data_frag.serialized_payload.len(),
          expected
        );
        return false;
      }
    }
    self
      .assembly_buffers
      .entry((writer_guid, data_frag.writer_sn))
      .or_insert_with(|| AssemblyBuffer::new(data_frag))
      .insert_frags(data_frag)
  }

  pub fn has_all_fragments(&self, writer_guid: GUID, sn: SequenceNumber) -> bool {
    self
      .assembly_buffers
      .get(&(writer_guid, sn))
      .map_or(false, AssemblyBuffer::is_complete)
  }

  /// Number of distinct fragments received so far for a sample.
  pub fn received_fragments(&self, writer_guid: GUID, sn: SequenceNumber) -> usize {
    self
      .assembly_buffers
      .get(&(writer_guid, sn))
      .map_or(0, |ab| ab.received_count)
  }

  /// Removes a completed sample and turns it into a change. None if the
  /// sample is incomplete or unknown, or its bytes lack a payload header.
  pub fn join(
    &mut self,
    writer_guid: GUID,
    sn: SequenceNumber,
    source_timestamp: Option<Timestamp>,
  ) -> Option<CacheChange> {
    if !self.has_all_fragments(writer_guid, sn) {
      return None;
    }
    let ab = self.assembly_buffers.remove(&(writer_guid, sn))?;
    match SerializedPayload::from_bytes(&Bytes::from(ab.buffer_bytes)) {
      Ok(payload) => Some(
        CacheChange::new(writer_guid, sn, source_timestamp, payload).with_inline_qos(ab.inline_qos),
      ),
      Err(e) => {
        warn!("Reassembled sample {:?} from {:?} is invalid: {}", sn, writer_guid, e);
        None
      }
    }
  }

  /// `add` followed by `join`: returns the change once the last fragment
  /// arrives.
  pub fn new_datafrag(
    &mut self,
    writer_guid: GUID,
    data_frag: &DataFrag,
    source_timestamp: Option<Timestamp>,
  ) -> Option<CacheChange> {
    if self.add(writer_guid, data_frag) {
      self.join(writer_guid, data_frag.writer_sn, source_timestamp)
    } else {
      None
    }
  }

  /// Drops partial samples of `writer_guid` older than `sn`.
  pub fn garbage_collect_before(&mut self, writer_guid: GUID, sn: SequenceNumber) {
    self
      .assembly_buffers
      .retain(|(guid, buffer_sn), _| *guid != writer_guid || *buffer_sn >= sn);
  }

  /// Forgets everything from `writer_guid`.
  pub fn remove_writer(&mut self, writer_guid: GUID) {
    self.assembly_buffers.retain(|(guid, _), _| *guid != writer_guid);
  }

  pub fn is_empty(&self) -> bool {
    self.assembly_buffers.is_empty()
  }
}
