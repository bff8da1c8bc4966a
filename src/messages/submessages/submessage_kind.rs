use std::fmt;

use speedy::{Readable, Writable};

#[derive(PartialEq, Eq, Readable, Writable, Clone, Copy, Hash)]
pub struct SubmessageKind {
  value: u8,
}

impl SubmessageKind {
  pub const PAD: SubmessageKind = SubmessageKind { value: 0x01 };
  pub const ACKNACK: SubmessageKind = SubmessageKind { value: 0x06 };
  pub const HEARTBEAT: SubmessageKind = SubmessageKind { value: 0x07 };
  pub const GAP: SubmessageKind = SubmessageKind { value: 0x08 };
  pub const INFO_TS: SubmessageKind = SubmessageKind { value: 0x09 };
  pub const INFO_SRC: SubmessageKind = SubmessageKind { value: 0x0c };
  pub const INFO_REPLY_IP4: SubmessageKind = SubmessageKind { value: 0x0d };
  pub const INFO_DST: SubmessageKind = SubmessageKind { value: 0x0e };
  pub const INFO_REPLY: SubmessageKind = SubmessageKind { value: 0x0f };
  pub const NACK_FRAG: SubmessageKind = SubmessageKind { value: 0x12 };
  pub const HEARTBEAT_FRAG: SubmessageKind = SubmessageKind { value: 0x13 };
  pub const DATA: SubmessageKind = SubmessageKind { value: 0x15 };
  pub const DATA_FRAG: SubmessageKind = SubmessageKind { value: 0x16 };

  pub const fn from_u8(value: u8) -> SubmessageKind {
    SubmessageKind { value }
  }

  pub fn value(self) -> u8 {
    self.value
  }

  /// Kinds 0x80..=0xff are reserved for vendors.
  pub fn is_vendor_specific(self) -> bool {
    self.value >= 0x80
  }
}

impl fmt::Debug for SubmessageKind {
  fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name = match *self {
      SubmessageKind::PAD => "PAD",
      SubmessageKind::ACKNACK => "ACKNACK",
      SubmessageKind::HEARTBEAT => "HEARTBEAT",
      SubmessageKind::GAP => "GAP",
      SubmessageKind::INFO_TS => "INFO_TS",
      SubmessageKind::INFO_SRC => "INFO_SRC",
      SubmessageKind::INFO_REPLY_IP4 => "INFO_REPLY_IP4",
      SubmessageKind::INFO_DST => "INFO_DST",
      SubmessageKind::INFO_REPLY => "INFO_REPLY",
      SubmessageKind::NACK_FRAG => "NACK_FRAG",
      SubmessageKind::HEARTBEAT_FRAG => "HEARTBEAT_FRAG",
      SubmessageKind::DATA => "DATA",
      SubmessageKind::DATA_FRAG => "DATA_FRAG",
      SubmessageKind { value } => return write!(fmt, "SubmessageKind({:#04x})", value),
    };
    fmt.write_str(name)
  }
}
