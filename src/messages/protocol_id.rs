use speedy::{Readable, Writable};

/// The four magic bytes every RTPS message starts with.
#[derive(Debug, PartialEq, Eq, Readable, Writable, Clone, Copy)]
pub struct ProtocolId {
  protocol_id: [u8; 4],
}

impl ProtocolId {
  pub const PROTOCOL_RTPS: ProtocolId = ProtocolId {
    protocol_id: [b'R', b'T', b'P', b'S'],
  };
}

impl Default for ProtocolId {
  fn default() -> Self {
    ProtocolId::PROTOCOL_RTPS
  }
}
