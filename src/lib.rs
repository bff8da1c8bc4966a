//! RTPS protocol engine.
//!
//! This crate implements the core of the Real-Time Publish-Subscribe wire
//! protocol that sits underneath DDS:
//!
//! * a binary codec for RTPS messages, submessages and parameter lists
//!   ([`messages`], [`rtps::Message`]),
//! * the reliable and best-effort reader and writer state machines
//!   ([`rtps::RtpsReader`], [`rtps::RtpsWriter`]) together with their remote
//!   endpoint proxies,
//! * splitting of large samples into `DATA_FRAG` submessages and their
//!   reassembly on the receiving side.
//!
//! Discovery, topic typing and the DDS application API are not part of this
//! crate. They connect to the engine through
//! [`matched_writer_add`](rtps::RtpsReader::matched_writer_add) /
//! [`matched_reader_add`](rtps::RtpsWriter::matched_reader_add), the
//! [`DataChannel`](network::DataChannel) transport seam and the sample
//! channels returned by readers.

#[macro_use]
mod checked_impl;
#[cfg(test)]
#[macro_use]
mod test;

pub mod config;
pub mod messages;
pub mod network;
mod result;
pub mod rtps;
pub mod structure;

pub use config::{RtpsConfig, RtpsConfigBuilder};
pub use result::{Error, Result};
pub use rtps::{
  MessageReceiver, MessageSubscriber, RtpsReader, RtpsWriter, Sample, UserSample,
};
pub use structure::{
  guid::{EntityId, GuidPrefix, GUID},
  locator::Locator,
  qos::{DurabilityKind, ReaderQos, ReliabilityKind, WriterQos},
  sequence_number::SequenceNumber,
  time::Timestamp,
};
