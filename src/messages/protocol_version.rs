use speedy::{Readable, Writable};
use serde::{Deserialize, Serialize};

#[derive(
  Debug, PartialOrd, PartialEq, Ord, Eq, Readable, Writable, Serialize, Deserialize, Clone, Copy,
)]
pub struct ProtocolVersion {
  pub major: u8,
  pub minor: u8,
}

impl ProtocolVersion {
  /// Version written into every outgoing message.
  pub const THIS_IMPLEMENTATION: ProtocolVersion = ProtocolVersion::PROTOCOLVERSION_2_3;

  pub const PROTOCOLVERSION_2_2: ProtocolVersion = ProtocolVersion { major: 2, minor: 2 };
  pub const PROTOCOLVERSION_2_3: ProtocolVersion = ProtocolVersion { major: 2, minor: 3 };
  pub const PROTOCOLVERSION_2_4: ProtocolVersion = ProtocolVersion { major: 2, minor: 4 };

  /// Versions whose wire layout this codec understands.
  pub fn is_supported(&self) -> bool {
    self.major == 2 && (2..=4).contains(&self.minor)
  }
}

impl Default for ProtocolVersion {
  fn default() -> Self {
    ProtocolVersion::THIS_IMPLEMENTATION
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn supported_versions() {
    assert!(ProtocolVersion::PROTOCOLVERSION_2_2.is_supported());
    assert!(ProtocolVersion::PROTOCOLVERSION_2_3.is_supported());
    assert!(ProtocolVersion::PROTOCOLVERSION_2_4.is_supported());
    assert!(!ProtocolVersion { major: 2, minor: 1 }.is_supported());
    assert!(!ProtocolVersion { major: 3, minor: 3 }.is_supported());
  }

  serialization_test!( type = ProtocolVersion,
  {
      protocol_version_2_3,
      ProtocolVersion::PROTOCOLVERSION_2_3,
      le = [0x02, 0x03],
      be = [0x02, 0x03]
  });
}
