use speedy::{Endianness, Readable, Writable};

use crate::{
  messages::{protocol_id::ProtocolId, protocol_version::ProtocolVersion, vendor_id::VendorId},
  structure::guid::GuidPrefix,
};

/// Why a datagram was not accepted as an RTPS message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderError {
  /// Too short or wrong magic. Anything may arrive on a UDP port.
  NotRtpsPacket,
  UnsupportedVersion(ProtocolVersion),
}

#[derive(Debug, Readable, Writable, PartialEq, Eq, Clone, Copy)]
pub struct Header {
  pub protocol_id: ProtocolId,
  pub protocol_version: ProtocolVersion,
  pub vendor_id: VendorId,
  pub guid_prefix: GuidPrefix,
}

impl Header {
  pub const LENGTH: usize = 20;

  pub fn new(guid_prefix: GuidPrefix) -> Header {
    Header {
      protocol_id: ProtocolId::PROTOCOL_RTPS,
      protocol_version: ProtocolVersion::THIS_IMPLEMENTATION,
      vendor_id: VendorId::THIS_IMPLEMENTATION,
      guid_prefix,
    }
  }

  /// Reads and validates the fixed message header. The header has no
  /// endianness of its own; all of its fields are byte strings.
  pub fn read_validated(buffer: &[u8]) -> Result<Header, HeaderError> {
    if buffer.len() < Header::LENGTH {
      return Err(HeaderError::NotRtpsPacket);
    }
    let header = Header::read_from_buffer_with_ctx(Endianness::LittleEndian, &buffer[..Header::LENGTH])
      .map_err(|_| HeaderError::NotRtpsPacket)?;
    if header.protocol_id != ProtocolId::PROTOCOL_RTPS {
      return Err(HeaderError::NotRtpsPacket);
    }
    if !header.protocol_version.is_supported() {
      return Err(HeaderError::UnsupportedVersion(header.protocol_version));
    }
    Ok(header)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn wrong_magic_is_not_rtps() {
    let mut bytes = Header::new(GuidPrefix::UNKNOWN)
      .write_to_vec_with_ctx(Endianness::LittleEndian)
      .unwrap();
    bytes[0] = b'X';
    assert_eq!(Header::read_validated(&bytes), Err(HeaderError::NotRtpsPacket));
  }

  #[test]
  fn short_buffer_is_not_rtps() {
    assert_eq!(Header::read_validated(b"RTPS\x02\x03"), Err(HeaderError::NotRtpsPacket));
  }

  #[test]
  fn old_version_is_rejected() {
    let mut header = Header::new(GuidPrefix::UNKNOWN);
    header.protocol_version = ProtocolVersion { major: 1, minor: 0 };
    let bytes = header.write_to_vec_with_ctx(Endianness::LittleEndian).unwrap();
    assert_eq!(
      Header::read_validated(&bytes),
      Err(HeaderError::UnsupportedVersion(ProtocolVersion { major: 1, minor: 0 }))
    );
  }

  serialization_test!( type = Header,
  {
      header_with_unknown_guid_prefix,
      Header::new(GuidPrefix::UNKNOWN),
      le = [0x52, 0x54, 0x50, 0x53, // protocol_id
            0x02, 0x03,             // protocol_version
            0x00, 0x00,             // vendor_id
            0x00, 0x00, 0x00, 0x00, // guid_prefix
            0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00],
      be = [0x52, 0x54, 0x50, 0x53,
            0x02, 0x03,
            0x00, 0x00,
            0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00]
  });
}
