use std::cmp::min;

use crate::{
  messages::submessages::{
    elements::parameter_list::ParameterList, info_destination::InfoDestination,
    submessage_header::SubmessageHeader,
    submessages::{Data, DataFrag},
  },
  rtps::length_calculator,
  structure::{cache_change::CacheChange, guid::EntityId, sequence_number::FragmentNumber},
};

/// INFO_TS with a timestamp, header included.
const INFO_TS_SUBMESSAGE_LENGTH: usize = SubmessageHeader::LENGTH + 8;
const INFO_DST_SUBMESSAGE_LENGTH: usize = SubmessageHeader::LENGTH + InfoDestination::LENGTH;

/// Room for the writer submessage itself once INFO_DST and INFO_TS are
/// accounted for.
pub fn writer_submessage_room(max_submessage_size: usize) -> usize {
  max_submessage_size.saturating_sub(INFO_DST_SUBMESSAGE_LENGTH + INFO_TS_SUBMESSAGE_LENGTH)
}

/// Does `change` fit into a single DATA submessage next to INFO_DST and
/// INFO_TS?
pub fn fits_in_data(change: &CacheChange, max_submessage_size: usize) -> bool {
  let data_submessage = SubmessageHeader::LENGTH
    + Data::FIXED_LENGTH
    + change.inline_qos.as_ref().map_or(0, ParameterList::len_serialized)
    + change.payload.len_serialized();
  data_submessage <= writer_submessage_room(max_submessage_size)
}

/// Largest multiple of four that fits into one DATA_FRAG next to its fixed
/// fields and `inline_qos`. Zero if nothing fits.
pub fn fragment_size(max_submessage_size: usize, inline_qos: Option<&ParameterList>) -> usize {
  let overhead = SubmessageHeader::LENGTH
    + DataFrag::FIXED_LENGTH
    + inline_qos.map_or(0, ParameterList::len_serialized);
  let room = writer_submessage_room(max_submessage_size).saturating_sub(overhead);
  // fragmentSize is 16 bits on the wire
  min(room, usize::from(u16::MAX)) & !0x03
}

/// Cuts the serialized payload of `change` into DATA_FRAG submessages with
/// one fragment each, numbered from 1. The first fragment starts with the
/// four byte payload header. All fragments but the last are exactly
/// `fragment_size` bytes long.
pub fn split(change: &CacheChange, reader_id: EntityId, fragment_size: usize) -> Vec<DataFrag> {
  if fragment_size == 0 {
    return Vec::new();
  }
  let sample = change.payload.to_unpadded_bytes();
  let data_size = sample.len();
  let fragment_count = (data_size + fragment_size - 1) / fragment_size;
  (0..fragment_count)
    .map(|i| {
      let from_byte = i * fragment_size;
      let up_to_before_byte = min(from_byte + fragment_size, data_size);
      DataFrag {
        reader_id,
        writer_id: change.writer_guid.entity_id,
        writer_sn: change.sequence_number,
        fragment_starting_num: FragmentNumber::new(i as u32 + 1),
        fragments_in_submessage: 1,
        fragment_size: fragment_size as u16,
        data_size: data_size as u32,
        inline_qos: change.inline_qos.clone(),
        serialized_payload: sample.slice(from_byte..up_to_before_byte),
      }
    })
    .collect()
}

/// Encoded DATA_FRAG submessage length, header included.
pub fn data_frag_submessage_length(data_frag: &DataFrag) -> usize {
  SubmessageHeader::LENGTH + length_calculator::data_frag_length(data_frag)
}
