use std::io;

use bytes::{BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use speedy::{Context, Readable, Writable, Writer};

use super::padding_needed;

/// Used to identify serialization format of payload data over RTPS.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Readable, Writable, Serialize, Deserialize)]
pub struct RepresentationIdentifier {
  bytes: [u8; 2],
}

impl RepresentationIdentifier {
  // Numeric values are from RTPS spec v2.3 Section 10.5 , Table 10.3
  pub const CDR_BE: Self = Self {
    bytes: [0x00, 0x00],
  };
  pub const CDR_LE: Self = Self {
    bytes: [0x00, 0x01],
  };
  pub const PL_CDR_BE: Self = Self {
    bytes: [0x00, 0x02],
  };
  pub const PL_CDR_LE: Self = Self {
    bytes: [0x00, 0x03],
  };

  pub const fn from_bytes(bytes: [u8; 2]) -> Self {
    Self { bytes }
  }

  pub fn to_bytes(self) -> [u8; 2] {
    self.bytes
  }
}

/// Encapsulated sample value: 2-byte representation identifier, 2-byte
/// representation options, then the value itself.
///
/// The two least significant bits of the options count the zero bytes that
/// follow the value to reach 4-byte alignment. They are set when writing
/// and stripped when reading, so `value` never contains padding.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct SerializedPayload {
  pub representation_identifier: RepresentationIdentifier,
  pub representation_options: [u8; 2],
  pub value: Bytes,
}

impl SerializedPayload {
  pub const HEADER_LENGTH: usize = 4;

  pub fn new(representation_identifier: RepresentationIdentifier, value: Bytes) -> SerializedPayload {
    SerializedPayload {
      representation_identifier,
      representation_options: [0, 0],
      value,
    }
  }

  fn padding(&self) -> usize {
    padding_needed(self.value.len())
  }

  /// Length inside a DATA submessage, alignment padding included.
  pub fn len_serialized(&self) -> usize {
    SerializedPayload::HEADER_LENGTH + self.value.len() + self.padding()
  }

  /// Header followed by the value, without trailing padding. This is the
  /// byte string that DATA_FRAG submessages cut into fragments.
  pub fn to_unpadded_bytes(&self) -> Bytes {
    let mut buffer = BytesMut::with_capacity(SerializedPayload::HEADER_LENGTH + self.value.len());
    buffer.put_slice(&self.representation_identifier.bytes);
    buffer.put_slice(&[
      self.representation_options[0],
      self.representation_options[1] & !0x03,
    ]);
    buffer.put_slice(&self.value);
    buffer.freeze()
  }

  pub fn from_bytes(bytes: &Bytes) -> io::Result<SerializedPayload> {
    if bytes.len() < SerializedPayload::HEADER_LENGTH {
      return Err(io::Error::new(
        io::ErrorKind::UnexpectedEof,
        format!("SerializedPayload of {} bytes has no header", bytes.len()),
      ));
    }
    let representation_identifier = RepresentationIdentifier {
      bytes: [bytes[0], bytes[1]],
    };
    let padding = (bytes[3] & 0x03) as usize;
    let value_end = bytes.len().saturating_sub(padding).max(SerializedPayload::HEADER_LENGTH);
    Ok(SerializedPayload {
      representation_identifier,
      representation_options: [bytes[2], bytes[3] & !0x03],
      value: bytes.slice(SerializedPayload::HEADER_LENGTH..value_end),
    })
  }
}

impl<C: Context> Writable<C> for SerializedPayload {
  fn write_to<T: ?Sized + Writer<C>>(&self, writer: &mut T) -> Result<(), C::Error> {
    let padding = self.padding();
    writer.write_bytes(&self.representation_identifier.bytes)?;
    writer.write_u8(self.representation_options[0])?;
    writer.write_u8((self.representation_options[1] & !0x03) | padding as u8)?;
    writer.write_bytes(&self.value)?;
    for _ in 0..padding {
      writer.write_u8(0)?;
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use speedy::Endianness;

  use super::*;

  #[test]
  fn padding_is_recorded_and_stripped() {
    let payload =
      SerializedPayload::new(RepresentationIdentifier::CDR_LE, Bytes::from_static(b"abcde"));
    let bytes = payload.write_to_vec_with_ctx(Endianness::LittleEndian).unwrap();
    assert_eq!(bytes, b"\x00\x01\x00\x03abcde\x00\x00\x00".to_vec());
    assert_eq!(payload.len_serialized(), bytes.len());
    let decoded = SerializedPayload::from_bytes(&Bytes::from(bytes)).unwrap();
    assert_eq!(decoded, payload);
  }

  #[test]
  fn aligned_value_has_no_padding() {
    let payload =
      SerializedPayload::new(RepresentationIdentifier::PL_CDR_LE, Bytes::from_static(b"abcd"));
    assert_eq!(payload.len_serialized(), 8);
    assert_eq!(payload.to_unpadded_bytes(), Bytes::from_static(b"\x00\x03\x00\x00abcd"));
  }

  #[test]
  fn header_is_required() {
    assert!(SerializedPayload::from_bytes(&Bytes::from_static(&[0, 1])).is_err());
  }
}
