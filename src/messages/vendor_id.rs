use std::fmt;

use speedy::{Readable, Writable};

#[derive(PartialEq, Eq, Clone, Copy, Readable, Writable)]
pub struct VendorId {
  pub vendor_id: [u8; 2],
}

impl VendorId {
  pub const VENDOR_UNKNOWN: Self = Self {
    vendor_id: [0x00, 0x00],
  };

  // No id is registered for this engine with the OMG.
  pub const THIS_IMPLEMENTATION: Self = Self::VENDOR_UNKNOWN;

  /// Vendor-specific submessage kinds and parameters are only meaningful
  /// when the sender's vendor is known.
  pub fn is_unknown(&self) -> bool {
    *self == Self::VENDOR_UNKNOWN
  }
}

impl Default for VendorId {
  fn default() -> Self {
    VendorId::VENDOR_UNKNOWN
  }
}

impl fmt::Debug for VendorId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "VendorId({:02x}.{:02x})", self.vendor_id[0], self.vendor_id[1])
  }
}
