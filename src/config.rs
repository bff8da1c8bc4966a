use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{
  messages::header::Header,
  result::{bad_parameter, Result},
  structure::guid::GuidPrefix,
};

/// Engine settings. Readers, writers and transports only read them.
///
/// Use [`RtpsConfig::builder`] to construct one; `RtpsConfig::default()`
/// gives the documented defaults with a fresh random GUID prefix.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RtpsConfig {
  /// Size of the UDP receive and send buffers inside the engine. Bounds
  /// the size of one RTPS message.
  pub packet_buffer_size: usize,
  pub heartbeat_period: Duration,
  /// Room for submessages in one message, header excluded.
  pub max_submessage_size: usize,
  /// Capacity of the sample channel of each reader.
  pub publisher_max_buffer_size: usize,
  /// Largest fragmented sample a reader agrees to reassemble, serialized
  /// payload header included.
  pub max_sample_size: usize,
  /// Socket level SO_RCVBUF.
  pub receive_buffer_size: usize,
  /// Socket level SO_SNDBUF.
  pub send_buffer_size: usize,
  pub guid_prefix: GuidPrefix,
}

impl RtpsConfig {
  pub const DEFAULT_PACKET_BUFFER_SIZE: usize = 65_508;
  pub const MIN_PACKET_BUFFER_SIZE: usize = 10_000;
  pub const DEFAULT_HEARTBEAT_PERIOD: Duration = Duration::from_secs(1);
  pub const DEFAULT_PUBLISHER_MAX_BUFFER_SIZE: usize = 32;
  pub const DEFAULT_SOCKET_BUFFER_SIZE: usize = 26_214_400;
  pub const DEFAULT_MAX_SAMPLE_SIZE: usize = 16 * 1024 * 1024;

  pub fn builder() -> RtpsConfigBuilder {
    RtpsConfigBuilder::new()
  }
}

impl Default for RtpsConfig {
  fn default() -> Self {
    RtpsConfig {
      packet_buffer_size: Self::DEFAULT_PACKET_BUFFER_SIZE,
      heartbeat_period: Self::DEFAULT_HEARTBEAT_PERIOD,
      max_submessage_size: Self::DEFAULT_PACKET_BUFFER_SIZE - Header::LENGTH,
      publisher_max_buffer_size: Self::DEFAULT_PUBLISHER_MAX_BUFFER_SIZE,
      max_sample_size: Self::DEFAULT_MAX_SAMPLE_SIZE,
      receive_buffer_size: Self::DEFAULT_SOCKET_BUFFER_SIZE,
      send_buffer_size: Self::DEFAULT_SOCKET_BUFFER_SIZE,
      guid_prefix: GuidPrefix::random(),
    }
  }
}

#[derive(Clone, Debug, Default)]
pub struct RtpsConfigBuilder {
  packet_buffer_size: Option<usize>,
  heartbeat_period: Option<Duration>,
  max_submessage_size: Option<usize>,
  publisher_max_buffer_size: Option<usize>,
  max_sample_size: Option<usize>,
  receive_buffer_size: Option<usize>,
  send_buffer_size: Option<usize>,
  guid_prefix: Option<GuidPrefix>,
}

impl RtpsConfigBuilder {
  pub fn new() -> Self {
    Self::default()
  }

  #[must_use]
  pub const fn packet_buffer_size(mut self, packet_buffer_size: usize) -> Self {
    self.packet_buffer_size = Some(packet_buffer_size);
    self
  }

  #[must_use]
  pub const fn heartbeat_period(mut self, heartbeat_period: Duration) -> Self {
    self.heartbeat_period = Some(heartbeat_period);
    self
  }

  /// Defaults to `packet_buffer_size` minus the message header.
  #[must_use]
  pub const fn max_submessage_size(mut self, max_submessage_size: usize) -> Self {
    self.max_submessage_size = Some(max_submessage_size);
    self
  }

  #[must_use]
  pub const fn publisher_max_buffer_size(mut self, publisher_max_buffer_size: usize) -> Self {
    self.publisher_max_buffer_size = Some(publisher_max_buffer_size);
    self
  }

  #[must_use]
  pub const fn max_sample_size(mut self, max_sample_size: usize) -> Self {
    self.max_sample_size = Some(max_sample_size);
    self
  }

  #[must_use]
  pub const fn receive_buffer_size(mut self, receive_buffer_size: usize) -> Self {
    self.receive_buffer_size = Some(receive_buffer_size);
    self
  }

  #[must_use]
  pub const fn send_buffer_size(mut self, send_buffer_size: usize) -> Self {
    self.send_buffer_size = Some(send_buffer_size);
    self
  }

  #[must_use]
  pub const fn guid_prefix(mut self, guid_prefix: GuidPrefix) -> Self {
    self.guid_prefix = Some(guid_prefix);
    self
  }

  pub fn build(self) -> Result<RtpsConfig> {
    let packet_buffer_size = self
      .packet_buffer_size
      .unwrap_or(RtpsConfig::DEFAULT_PACKET_BUFFER_SIZE);
    if !(RtpsConfig::MIN_PACKET_BUFFER_SIZE..=RtpsConfig::DEFAULT_PACKET_BUFFER_SIZE)
      .contains(&packet_buffer_size)
    {
      return bad_parameter(format!(
        "packet_buffer_size {} outside {}..={}",
        packet_buffer_size,
        RtpsConfig::MIN_PACKET_BUFFER_SIZE,
        RtpsConfig::DEFAULT_PACKET_BUFFER_SIZE
      ));
    }
    if packet_buffer_size % 4 != 0 {
      return bad_parameter(format!(
        "packet_buffer_size {} is not a multiple of 4",
        packet_buffer_size
      ));
    }

    let max_submessage_size = self
      .max_submessage_size
      .unwrap_or(packet_buffer_size - Header::LENGTH);
    if max_submessage_size % 4 != 0 {
      return bad_parameter(format!(
        "max_submessage_size {} is not a multiple of 4",
        max_submessage_size
      ));
    }
    if max_submessage_size + Header::LENGTH > packet_buffer_size {
      return bad_parameter(format!(
        "max_submessage_size {} does not fit into packet_buffer_size {}",
        max_submessage_size, packet_buffer_size
      ));
    }

    let heartbeat_period = self
      .heartbeat_period
      .unwrap_or(RtpsConfig::DEFAULT_HEARTBEAT_PERIOD);
    if heartbeat_period == Duration::from_secs(0) {
      return bad_parameter("heartbeat_period must not be zero");
    }

    let publisher_max_buffer_size = self
      .publisher_max_buffer_size
      .unwrap_or(RtpsConfig::DEFAULT_PUBLISHER_MAX_BUFFER_SIZE);
    if publisher_max_buffer_size == 0 {
      return bad_parameter("publisher_max_buffer_size must not be zero");
    }

    let max_sample_size = self
      .max_sample_size
      .unwrap_or(RtpsConfig::DEFAULT_MAX_SAMPLE_SIZE);
    if max_sample_size == 0 {
      return bad_parameter("max_sample_size must not be zero");
    }

    Ok(RtpsConfig {
      packet_buffer_size,
      heartbeat_period,
      max_submessage_size,
      publisher_max_buffer_size,
      max_sample_size,
      receive_buffer_size: self
        .receive_buffer_size
        .unwrap_or(RtpsConfig::DEFAULT_SOCKET_BUFFER_SIZE),
      send_buffer_size: self
        .send_buffer_size
        .unwrap_or(RtpsConfig::DEFAULT_SOCKET_BUFFER_SIZE),
      guid_prefix: self.guid_prefix.unwrap_or_else(GuidPrefix::random),
    })
  }
}
