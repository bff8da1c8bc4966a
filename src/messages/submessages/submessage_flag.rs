#![allow(non_camel_case_types)]

use enumflags2::{bitflags, BitFlags};
use speedy::Endianness;

/// Flag bit 0 of every submessage: set means little endian.
pub fn endianness_flag(flags: u8) -> Endianness {
  if (flags & 0x01) != 0 {
    Endianness::LittleEndian
  } else {
    Endianness::BigEndian
  }
}

/// Build a flag set holding only the endianness bit.
pub trait FromEndianness {
  fn from_endianness(end: Endianness) -> Self;
}

macro_rules! submessageflag_impls {
  ($t:ident) => {
    impl FromEndianness for BitFlags<$t> {
      fn from_endianness(end: Endianness) -> Self {
        if end == Endianness::LittleEndian {
          $t::Endianness.into()
        } else {
          BitFlags::<$t>::empty()
        }
      }
    }
  };
}

#[bitflags]
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum INFOTIMESTAMP_Flags {
  Endianness = 0b01,
  Invalidate = 0b10,
}
submessageflag_impls!(INFOTIMESTAMP_Flags);

#[bitflags]
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum INFODESTINATION_Flags {
  Endianness = 0b01,
}
submessageflag_impls!(INFODESTINATION_Flags);

#[bitflags]
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ACKNACK_Flags {
  Endianness = 0b01,
  Final = 0b10,
}
submessageflag_impls!(ACKNACK_Flags);

#[bitflags]
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DATA_Flags {
  Endianness = 0b00001,
  InlineQos = 0b00010,
  Data = 0b00100,
  Key = 0b01000,
  NonStandardPayload = 0b10000,
}
submessageflag_impls!(DATA_Flags);

#[bitflags]
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DATAFRAG_Flags {
  Endianness = 0b0001,
  InlineQos = 0b0010,
  Key = 0b0100,
  NonStandardPayload = 0b1000,
}
submessageflag_impls!(DATAFRAG_Flags);

#[bitflags]
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GAP_Flags {
  Endianness = 0b01,
}
submessageflag_impls!(GAP_Flags);

#[bitflags]
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HEARTBEAT_Flags {
  Endianness = 0b001,
  Final = 0b010,
  Liveliness = 0b100,
}
submessageflag_impls!(HEARTBEAT_Flags);
