use std::net::{IpAddr, SocketAddr};

#[allow(unused_imports)]
use log::{debug, error, info, trace};

use crate::structure::locator::Locator;

/// UDPv4 locators for `port` on every non-loopback local interface.
pub fn get_local_unicast_locators(port: u16) -> Vec<Locator> {
  match get_if_addrs::get_if_addrs() {
    Ok(ifaces) => ifaces
      .iter()
      .filter(|iface| !iface.is_loopback())
      .filter_map(|iface| match iface.ip() {
        IpAddr::V4(ip) => Some(Locator::from(SocketAddr::new(IpAddr::V4(ip), port))),
        IpAddr::V6(_) => None,
      })
      .collect(),
    Err(e) => {
      error!("Cannot get local network interfaces: get_if_addrs() : {:?}", e);
      vec![]
    }
  }
}
