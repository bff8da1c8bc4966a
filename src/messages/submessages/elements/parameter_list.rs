use std::{fmt, io};

use byteorder::{BigEndian, ByteOrder, LittleEndian};
use bytes::Bytes;
#[allow(unused_imports)]
use log::{debug, error, trace, warn};
use serde::{Deserialize, Serialize};
use speedy::{Context, Endianness, Writable, Writer};

use crate::result::{bad_parameter, Result};

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ParameterId(u16);

impl ParameterId {
  pub const PID_PAD: ParameterId = ParameterId(0x0000);
  pub const PID_SENTINEL: ParameterId = ParameterId(0x0001);
  pub const PID_KEY_HASH: ParameterId = ParameterId(0x0070);
  pub const PID_STATUS_INFO: ParameterId = ParameterId(0x0071);

  pub const fn new(value: u16) -> ParameterId {
    ParameterId(value)
  }

  pub fn value(self) -> u16 {
    self.0
  }

  /// Ids with the 0x8000 bit set belong to applications and vendors.
  pub fn is_user_defined(self) -> bool {
    self.0 & 0x8000 != 0
  }

  /// Parameters kept when decoding inline QoS. Everything else is skipped
  /// by its declared length.
  fn is_retained(self) -> bool {
    self == ParameterId::PID_KEY_HASH || self == ParameterId::PID_STATUS_INFO || self.is_user_defined()
  }
}

impl fmt::Debug for ParameterId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "PID({:#06x})", self.0)
  }
}

/// One inline QoS entry. The value is kept raw: the engine carries it
/// through without interpreting it.
///
/// Values are written as they are, so their length must be a multiple
/// of 4 that fits the 16-bit length field.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Parameter {
  pub parameter_id: ParameterId,
  pub value: Bytes,
}

impl Parameter {
  /// Largest multiple of 4 that fits the length field.
  pub const MAX_VALUE_LENGTH: usize = 65_532;

  pub fn new(parameter_id: ParameterId, value: impl Into<Bytes>) -> Result<Parameter> {
    let value = value.into();
    if value.len() % 4 != 0 || value.len() > Parameter::MAX_VALUE_LENGTH {
      return bad_parameter(format!(
        "{:?} value of {} bytes is not a multiple of 4 up to {}",
        parameter_id,
        value.len(),
        Parameter::MAX_VALUE_LENGTH
      ));
    }
    Ok(Parameter { parameter_id, value })
  }

  fn len_serialized(&self) -> usize {
    4 + self.value.len()
  }
}

/// ParameterList is used as part of several messages to encapsulate
/// QoS parameters that may affect the interpretation of the message.
/// The encapsulation of the parameters follows a mechanism that allows
/// extensions to the QoS without breaking backwards compatibility.
#[derive(Debug, PartialEq, Eq, Clone, Default)]
pub struct ParameterList {
  pub parameters: Vec<Parameter>,
}

impl ParameterList {
  pub fn new() -> ParameterList {
    ParameterList::default()
  }

  pub fn push(&mut self, parameter: Parameter) {
    self.parameters.push(parameter)
  }

  pub fn is_empty(&self) -> bool {
    self.parameters.is_empty()
  }

  pub fn get(&self, parameter_id: ParameterId) -> Option<&Parameter> {
    self.parameters.iter().find(|p| p.parameter_id == parameter_id)
  }

  /// Encoded size including the sentinel.
  pub fn len_serialized(&self) -> usize {
    self.parameters.iter().map(Parameter::len_serialized).sum::<usize>() + 4
  }

  /// Decodes a list from the front of `bytes`. Returns the list and the
  /// number of bytes consumed, sentinel included.
  pub fn read_from_bytes(
    bytes: &Bytes,
    endianness: Endianness,
  ) -> io::Result<(ParameterList, usize)> {
    let read_u16 = |b: &[u8]| match endianness {
      Endianness::LittleEndian => LittleEndian::read_u16(b),
      Endianness::BigEndian => BigEndian::read_u16(b),
    };
    let mut list = ParameterList::new();
    let mut pos = 0;
    loop {
      if bytes.len() < pos + 4 {
        return Err(io::Error::new(
          io::ErrorKind::UnexpectedEof,
          "ParameterList ended without sentinel",
        ));
      }
      let parameter_id = ParameterId(read_u16(&bytes[pos..pos + 2]));
      let length = read_u16(&bytes[pos + 2..pos + 4]) as usize;
      pos += 4;
      if parameter_id == ParameterId::PID_SENTINEL {
        return Ok((list, pos));
      }
      if bytes.len() < pos + length {
        return Err(io::Error::new(
          io::ErrorKind::UnexpectedEof,
          format!("{:?} declares {} bytes, only {} left", parameter_id, length, bytes.len() - pos),
        ));
      }
      if parameter_id.is_retained() {
        list.push(Parameter {
          parameter_id,
          value: bytes.slice(pos..pos + length),
        });
      } else if parameter_id != ParameterId::PID_PAD {
        trace!("Skipping inline QoS {:?} of {} bytes", parameter_id, length);
      }
      pos += length;
    }
  }
}

impl<C: Context> Writable<C> for ParameterList {
  #[inline]
  fn write_to<T: ?Sized + Writer<C>>(&self, writer: &mut T) -> std::result::Result<(), C::Error> {
    for param in self.parameters.iter() {
      let length = param.value.len();
      if length % 4 != 0 || length > Parameter::MAX_VALUE_LENGTH {
        return Err(
          speedy::Error::custom(format!(
            "{:?} value of {} bytes cannot be encoded",
            param.parameter_id, length
          ))
          .into(),
        );
      }
      writer.write_u16(param.parameter_id.0)?;
      writer.write_u16(length as u16)?;
      writer.write_bytes(&param.value)?;
    }
    writer.write_u16(ParameterId::PID_SENTINEL.0)?;
    writer.write_u16(0)
  }
}
