use speedy::{Context, Readable, Reader, Writable, Writer};

use super::{submessage_flag::endianness_flag, submessage_kind::SubmessageKind};

/// Four bytes in front of every submessage body.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct SubmessageHeader {
  pub kind: SubmessageKind,
  pub flags: u8,
  /// octetsToNextHeader
  pub content_length: u16,
}

impl SubmessageHeader {
  pub const LENGTH: usize = 4;

  /// The length field uses the endianness announced in the flags, so the
  /// header cannot be read with a fixed context.
  pub fn read_from_bytes(bytes: &[u8]) -> Option<SubmessageHeader> {
    if bytes.len() < SubmessageHeader::LENGTH {
      return None;
    }
    let kind = SubmessageKind::from_u8(bytes[0]);
    let flags = bytes[1];
    let content_length =
      u16::read_from_buffer_with_ctx(endianness_flag(flags), &bytes[2..4]).ok()?;
    Some(SubmessageHeader {
      kind,
      flags,
      content_length,
    })
  }
}

impl<'a, C: Context> Readable<'a, C> for SubmessageHeader {
  #[inline]
  fn read_from<R: Reader<'a, C>>(reader: &mut R) -> Result<Self, C::Error> {
    Ok(SubmessageHeader {
      kind: reader.read_value()?,
      flags: reader.read_u8()?,
      content_length: reader.read_u16()?,
    })
  }

  #[inline]
  fn minimum_bytes_needed() -> usize {
    SubmessageHeader::LENGTH
  }
}

impl<C: Context> Writable<C> for SubmessageHeader {
  #[inline]
  fn write_to<T: ?Sized + Writer<C>>(&self, writer: &mut T) -> Result<(), C::Error> {
    writer.write_value(&self.kind)?;
    writer.write_u8(self.flags)?;
    writer.write_u16(self.content_length)
  }
}
