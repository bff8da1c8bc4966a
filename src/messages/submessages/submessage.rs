use enumflags2::BitFlags;

use super::{
  ack_nack::AckNack,
  data::Data,
  data_frag::DataFrag,
  gap::Gap,
  heartbeat::Heartbeat,
  info_destination::InfoDestination,
  info_timestamp::InfoTimestamp,
  submessage_flag::*,
};

/// Submessages that originate from a Writer and are addressed to Readers.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum WriterSubmessage {
  Data(Data, BitFlags<DATA_Flags>),
  DataFrag(DataFrag, BitFlags<DATAFRAG_Flags>),
  Gap(Gap, BitFlags<GAP_Flags>),
  Heartbeat(Heartbeat, BitFlags<HEARTBEAT_Flags>),
}

/// Submessages that originate from a Reader and are addressed to Writers.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum ReaderSubmessage {
  AckNack(AckNack, BitFlags<ACKNACK_Flags>),
}

/// Submessages that change how the following submessages are interpreted.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum InterpreterSubmessage {
  InfoTimestamp(InfoTimestamp, BitFlags<INFOTIMESTAMP_Flags>),
  InfoDestination(InfoDestination, BitFlags<INFODESTINATION_Flags>),
}
