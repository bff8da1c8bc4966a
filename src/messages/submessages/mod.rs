use std::io;

pub mod ack_nack;
pub mod data;
pub mod data_frag;
pub mod elements;
pub mod gap;
pub mod heartbeat;
pub mod info_destination;
pub mod info_timestamp;
pub mod submessage;
pub mod submessage_flag;
pub mod submessage_header;
pub mod submessage_kind;

pub mod submessages {
  pub use super::{
    ack_nack::*, data::*, data_frag::*, gap::*, heartbeat::*, info_destination::*,
    info_timestamp::*, submessage::*, submessage_flag::*, submessage_header::*, submessage_kind::*,
  };
}

pub(crate) fn read_error(e: speedy::Error) -> io::Error {
  io::Error::new(io::ErrorKind::InvalidData, e)
}
