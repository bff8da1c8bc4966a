use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, SocketAddrV4, SocketAddrV6};

use serde::{Deserialize, Serialize};
use speedy::{Context, Readable, Reader, Writable, Writer};

const LOCATOR_KIND_INVALID: i32 = -1;
const LOCATOR_KIND_RESERVED: i32 = 0;
const LOCATOR_KIND_UDP_V4: i32 = 1;
const LOCATOR_KIND_UDP_V6: i32 = 2;

/// Transport address of a remote endpoint. Only UDP is supported. Other
/// kinds survive a decode as `Other` so that they can be ignored later.
#[derive(Debug, PartialEq, Eq, Hash, Copy, Clone, Serialize, Deserialize, PartialOrd, Ord)]
pub enum Locator {
  Invalid,
  Reserved,
  UdpV4(SocketAddrV4),
  UdpV6(SocketAddrV6),
  Other {
    kind: i32,
    port: u32,
    address: [u8; 16],
  },
}

impl Locator {
  pub fn is_udp(&self) -> bool {
    matches!(self, Locator::UdpV4(_) | Locator::UdpV6(_))
  }

  pub fn to_socket_address(&self) -> Option<SocketAddr> {
    match self {
      Locator::UdpV4(a) => Some(SocketAddr::V4(*a)),
      Locator::UdpV6(a) => Some(SocketAddr::V6(*a)),
      _ => None,
    }
  }

  fn kind(&self) -> i32 {
    match self {
      Locator::Invalid => LOCATOR_KIND_INVALID,
      Locator::Reserved => LOCATOR_KIND_RESERVED,
      Locator::UdpV4(_) => LOCATOR_KIND_UDP_V4,
      Locator::UdpV6(_) => LOCATOR_KIND_UDP_V6,
      Locator::Other { kind, .. } => *kind,
    }
  }

  fn port(&self) -> u32 {
    match self {
      Locator::UdpV4(a) => u32::from(a.port()),
      Locator::UdpV6(a) => u32::from(a.port()),
      Locator::Other { port, .. } => *port,
      Locator::Invalid | Locator::Reserved => 0,
    }
  }

  // IPv4 addresses occupy the last four bytes
  fn address(&self) -> [u8; 16] {
    match self {
      Locator::UdpV4(a) => {
        let mut address = [0; 16];
        address[12..].copy_from_slice(&a.ip().octets());
        address
      }
      Locator::UdpV6(a) => a.ip().octets(),
      Locator::Other { address, .. } => *address,
      Locator::Invalid | Locator::Reserved => [0; 16],
    }
  }
}

impl Default for Locator {
  fn default() -> Self {
    Locator::Invalid
  }
}

impl From<SocketAddr> for Locator {
  fn from(socket_address: SocketAddr) -> Self {
    match socket_address {
      SocketAddr::V4(a) => Locator::UdpV4(a),
      SocketAddr::V6(a) => Locator::UdpV6(a),
    }
  }
}

impl From<(IpAddr, u16)> for Locator {
  fn from((ip, port): (IpAddr, u16)) -> Self {
    Locator::from(SocketAddr::new(ip, port))
  }
}

impl<'a, C: Context> Readable<'a, C> for Locator {
  #[inline]
  fn read_from<R: Reader<'a, C>>(reader: &mut R) -> Result<Self, C::Error> {
    let kind: i32 = reader.read_value()?;
    let port: u32 = reader.read_value()?;
    let mut address = [0u8; 16];
    reader.read_bytes(&mut address)?;
    Ok(match kind {
      LOCATOR_KIND_INVALID => Locator::Invalid,
      LOCATOR_KIND_RESERVED => Locator::Reserved,
      LOCATOR_KIND_UDP_V4 => Locator::UdpV4(SocketAddrV4::new(
        Ipv4Addr::new(address[12], address[13], address[14], address[15]),
        port as u16,
      )),
      LOCATOR_KIND_UDP_V6 => {
        Locator::UdpV6(SocketAddrV6::new(Ipv6Addr::from(address), port as u16, 0, 0))
      }
      kind => Locator::Other {
        kind,
        port,
        address,
      },
    })
  }

  #[inline]
  fn minimum_bytes_needed() -> usize {
    24
  }
}

impl<C: Context> Writable<C> for Locator {
  #[inline]
  fn write_to<T: ?Sized + Writer<C>>(&self, writer: &mut T) -> Result<(), C::Error> {
    writer.write_i32(self.kind())?;
    writer.write_u32(self.port())?;
    writer.write_bytes(&self.address())
  }
}
