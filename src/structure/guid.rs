use std::fmt;

use serde::{Deserialize, Serialize};
use speedy::{Context, Readable, Reader, Writable, Writer};
use uuid::Uuid;

/// Identifies a participant. All entities inside one participant share the
/// prefix.
#[derive(Copy, Clone, PartialOrd, PartialEq, Ord, Eq, Hash, Serialize, Deserialize)]
pub struct GuidPrefix {
  pub bytes: [u8; 12],
}

impl GuidPrefix {
  pub const UNKNOWN: GuidPrefix = GuidPrefix { bytes: [0x00; 12] };

  pub fn new(bytes: &[u8]) -> GuidPrefix {
    let mut prefix = [0; 12];
    for (to, from) in prefix.iter_mut().zip(bytes.iter()) {
      *to = *from;
    }
    GuidPrefix { bytes: prefix }
  }

  /// Fresh prefix for a local participant, taken from a random UUID.
  pub fn random() -> GuidPrefix {
    GuidPrefix::new(Uuid::new_v4().as_bytes())
  }
}

impl Default for GuidPrefix {
  fn default() -> GuidPrefix {
    GuidPrefix::UNKNOWN
  }
}

impl fmt::Debug for GuidPrefix {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    for b in self.bytes.iter() {
      write!(f, "{:02x}", b)?;
    }
    Ok(())
  }
}

impl<'a, C: Context> Readable<'a, C> for GuidPrefix {
  #[inline]
  fn read_from<R: Reader<'a, C>>(reader: &mut R) -> Result<Self, C::Error> {
    let mut guid_prefix = GuidPrefix::default();
    reader.read_bytes(&mut guid_prefix.bytes)?;
    Ok(guid_prefix)
  }

  #[inline]
  fn minimum_bytes_needed() -> usize {
    12
  }
}

impl<C: Context> Writable<C> for GuidPrefix {
  #[inline]
  fn write_to<T: ?Sized + Writer<C>>(&self, writer: &mut T) -> Result<(), C::Error> {
    writer.write_bytes(&self.bytes)
  }
}

/// Identifies an endpoint inside a participant: 3-byte key and 1-byte kind.
#[derive(Copy, Clone, PartialOrd, PartialEq, Ord, Eq, Hash, Serialize, Deserialize)]
pub struct EntityId {
  pub entity_key: [u8; 3],
  pub entity_kind: u8,
}

impl EntityId {
  /// Wildcard reader id. A submessage addressed to it is meant for every
  /// matched reader of the sending writer.
  pub const UNKNOWN: EntityId = EntityId {
    entity_key: [0x00; 3],
    entity_kind: 0x00,
  };
  pub const PARTICIPANT: EntityId = EntityId {
    entity_key: [0x00, 0x00, 0x01],
    entity_kind: 0xC1,
  };
  pub const SPDP_BUILTIN_PARTICIPANT_WRITER: EntityId = EntityId {
    entity_key: [0x00, 0x01, 0x00],
    entity_kind: 0xC2,
  };
  pub const SPDP_BUILTIN_PARTICIPANT_READER: EntityId = EntityId {
    entity_key: [0x00, 0x01, 0x00],
    entity_kind: 0xC7,
  };

  // Entity kinds from RTPS spec v2.3 section 9.3.1.2
  pub const KIND_USER_WRITER_NO_KEY: u8 = 0x03;
  pub const KIND_USER_READER_NO_KEY: u8 = 0x04;

  pub const fn new(entity_key: [u8; 3], entity_kind: u8) -> EntityId {
    EntityId {
      entity_key,
      entity_kind,
    }
  }

  pub fn is_unknown(&self) -> bool {
    *self == EntityId::UNKNOWN
  }
}

impl Default for EntityId {
  fn default() -> EntityId {
    EntityId::UNKNOWN
  }
}

impl fmt::Debug for EntityId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(
      f,
      "{:02x}{:02x}{:02x}.{:02x}",
      self.entity_key[0], self.entity_key[1], self.entity_key[2], self.entity_kind
    )
  }
}

impl<'a, C: Context> Readable<'a, C> for EntityId {
  #[inline]
  fn read_from<R: Reader<'a, C>>(reader: &mut R) -> Result<Self, C::Error> {
    let entity_key = [reader.read_u8()?, reader.read_u8()?, reader.read_u8()?];
    let entity_kind = reader.read_u8()?;
    Ok(EntityId {
      entity_key,
      entity_kind,
    })
  }

  #[inline]
  fn minimum_bytes_needed() -> usize {
    4
  }
}

impl<C: Context> Writable<C> for EntityId {
  #[inline]
  fn write_to<T: ?Sized + Writer<C>>(&self, writer: &mut T) -> Result<(), C::Error> {
    writer.write_bytes(&self.entity_key)?;
    writer.write_u8(self.entity_kind)
  }
}

#[derive(
  Copy,
  Clone,
  Default,
  PartialOrd,
  PartialEq,
  Ord,
  Eq,
  Readable,
  Writable,
  Hash,
  Serialize,
  Deserialize,
)]
pub struct GUID {
  pub prefix: GuidPrefix,
  pub entity_id: EntityId,
}

impl GUID {
  pub const UNKNOWN: GUID = GUID {
    prefix: GuidPrefix::UNKNOWN,
    entity_id: EntityId::UNKNOWN,
  };

  pub const fn new(prefix: GuidPrefix, entity_id: EntityId) -> GUID {
    GUID { prefix, entity_id }
  }

  /// Another entity of the same participant.
  pub fn from_prefix(self, entity_id: EntityId) -> GUID {
    GUID {
      prefix: self.prefix,
      entity_id,
    }
  }
}

impl fmt::Debug for GUID {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{:?}:{:?}", self.prefix, self.entity_id)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn random_prefixes_differ() {
    assert_ne!(GuidPrefix::random(), GuidPrefix::random());
  }

  #[test]
  fn short_prefix_input_is_zero_filled() {
    let prefix = GuidPrefix::new(&[1, 2, 3]);
    assert_eq!(prefix.bytes, [1, 2, 3, 0, 0, 0, 0, 0, 0, 0, 0, 0]);
  }

  #[test]
  fn guid_orders_by_prefix_first() {
    let a = GUID::new(GuidPrefix::new(&[1]), EntityId::new([0, 0, 9], 0x03));
    let b = GUID::new(GuidPrefix::new(&[2]), EntityId::new([0, 0, 1], 0x03));
    assert!(a < b);
  }

  serialization_test!( type = GuidPrefix,
  {
      guid_prefix_unknown,
      GuidPrefix::UNKNOWN,
      le = [0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00],
      be = [0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00]
  },
  {
      guid_prefix_endianness_insensitive,
      GuidPrefix::new(&[0x00, 0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88, 0x99, 0xAA, 0xBB]),
      le = [0x00, 0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88, 0x99, 0xAA, 0xBB],
      be = [0x00, 0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88, 0x99, 0xAA, 0xBB]
  });

  serialization_test!( type = EntityId,
  {
      entity_unknown,
      EntityId::UNKNOWN,
      le = [0x00, 0x00, 0x00, 0x00],
      be = [0x00, 0x00, 0x00, 0x00]
  },
  {
      entity_spdp_participant_reader,
      EntityId::SPDP_BUILTIN_PARTICIPANT_READER,
      le = [0x00, 0x01, 0x00, 0xC7],
      be = [0x00, 0x01, 0x00, 0xC7]
  });

  serialization_test!( type = GUID,
  {
      guid_unknown,
      GUID::UNKNOWN,
      le = [0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00],
      be = [0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00]
  },
  {
      guid_user_writer,
      GUID::new(
        GuidPrefix::new(&[0x01, 0x0f, 0x99, 0x06, 0x78, 0x34, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00]),
        EntityId::new([0x00, 0x00, 0x12], EntityId::KIND_USER_WRITER_NO_KEY),
      ),
      le = [0x01, 0x0f, 0x99, 0x06, 0x78, 0x34, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x12, 0x03],
      be = [0x01, 0x0f, 0x99, 0x06, 0x78, 0x34, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x12, 0x03]
  });
}
