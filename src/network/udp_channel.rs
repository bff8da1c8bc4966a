use std::{
  collections::VecDeque,
  fmt, io,
  net::{Ipv4Addr, SocketAddr},
  sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex,
  },
};

use bytes::Bytes;
#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};
use mio::{net::UdpSocket, Events, Poll, PollOpt, Ready, Token};
use mio_extras::channel as mio_channel;
use socket2::{Domain, Protocol, SockAddr, Socket, Type};

use crate::{
  config::RtpsConfig,
  network::data_channel::{DataChannel, DataChannelFactory},
  rtps::Message,
  structure::{guid::GUID, locator::Locator},
};

const SOCKET_TOKEN: Token = Token(0);
const STOP_TOKEN: Token = Token(1);

/// UDP transport. A connected channel sends to every UDP locator of its
/// remote endpoint; a bound channel receives on a local port.
///
/// `receive` waits on a poll that also watches a stop channel, so `close`
/// wakes up a receiver blocked in another thread.
pub struct UdpDataChannel {
  socket: UdpSocket,
  remote_addresses: Vec<SocketAddr>,
  packet_buffer_size: usize,
  receiving: Mutex<Receiving>,
  stop_sender: Mutex<mio_channel::Sender<()>>,
  closed: AtomicBool,
}

// State of the receiving side, used by one receive call at a time.
struct Receiving {
  poll: Poll,
  events: Events,
  buffer: Vec<u8>,
  // decoded, not yet returned
  pending: VecDeque<Message>,
  stop_receiver: mio_channel::Receiver<()>,
}

fn new_socket(address: SocketAddr, config: &RtpsConfig) -> io::Result<UdpSocket> {
  let raw_socket = Socket::new(Domain::ipv4(), Type::dgram(), Some(Protocol::udp()))?;

  // SO_REUSEADDR lets other participants on this host bind the same port.
  // It only has an effect when set before bind.
  raw_socket.set_reuse_address(true)?;
  if let Err(e) = raw_socket.set_recv_buffer_size(config.receive_buffer_size) {
    warn!("Unable to set SO_RCVBUF to {}: {:?}", config.receive_buffer_size, e);
  }
  if let Err(e) = raw_socket.set_send_buffer_size(config.send_buffer_size) {
    warn!("Unable to set SO_SNDBUF to {}: {:?}", config.send_buffer_size, e);
  }
  raw_socket.bind(&SockAddr::from(address))?;

  let std_socket = raw_socket.into_udp_socket();
  std_socket.set_nonblocking(true)?;
  UdpSocket::from_socket(std_socket)
}

impl UdpDataChannel {
  /// Channel that sends to `locators`. Non-UDP locators are ignored.
  pub fn connect(locators: &[Locator], config: &RtpsConfig) -> io::Result<UdpDataChannel> {
    let remote_addresses: Vec<SocketAddr> = locators
      .iter()
      .filter_map(Locator::to_socket_address)
      .filter(SocketAddr::is_ipv4)
      .collect();
    if remote_addresses.is_empty() {
      return Err(io::Error::new(
        io::ErrorKind::InvalidInput,
        format!("No UDPv4 locator in {:?}", locators),
      ));
    }
    let socket = new_socket(SocketAddr::new(Ipv4Addr::UNSPECIFIED.into(), 0), config)?;
    debug!(
      "UdpDataChannel from {:?} to {:?}",
      socket.local_addr(),
      remote_addresses
    );
    UdpDataChannel::new(socket, remote_addresses, config)
  }

  /// Channel that receives on `port` of every local interface.
  pub fn bind(port: u16, config: &RtpsConfig) -> io::Result<UdpDataChannel> {
    let socket = new_socket(SocketAddr::new(Ipv4Addr::UNSPECIFIED.into(), port), config)?;
    debug!("UdpDataChannel listening on {:?}", socket.local_addr());
    UdpDataChannel::new(socket, vec![], config)
  }

  fn new(
    socket: UdpSocket,
    remote_addresses: Vec<SocketAddr>,
    config: &RtpsConfig,
  ) -> io::Result<UdpDataChannel> {
    let poll = Poll::new()?;
    poll.register(&socket, SOCKET_TOKEN, Ready::readable(), PollOpt::edge())?;
    let (stop_sender, stop_receiver) = mio_channel::channel::<()>();
    poll.register(&stop_receiver, STOP_TOKEN, Ready::readable(), PollOpt::edge())?;
    Ok(UdpDataChannel {
      socket,
      remote_addresses,
      packet_buffer_size: config.packet_buffer_size,
      receiving: Mutex::new(Receiving {
        poll,
        events: Events::with_capacity(4),
        buffer: vec![0; config.packet_buffer_size],
        pending: VecDeque::new(),
        stop_receiver,
      }),
      stop_sender: Mutex::new(stop_sender),
      closed: AtomicBool::new(false),
    })
  }

  pub fn local_port(&self) -> io::Result<u16> {
    Ok(self.socket.local_addr()?.port())
  }

  fn closed_error() -> io::Error {
    io::Error::new(io::ErrorKind::NotConnected, "channel closed")
  }
}

impl Receiving {
  // Reads datagrams until the socket has no more. Edge-triggered
  // readiness fires again only after that.
  fn drain(&mut self, socket: &UdpSocket) -> io::Result<()> {
    loop {
      match socket.recv_from(&mut self.buffer) {
        Ok((length, source)) => {
          match Message::decode(&Bytes::copy_from_slice(&self.buffer[..length])) {
            Some(message) => self.pending.push_back(message),
            None => trace!("{} bytes from {} are not an RTPS message", length, source),
          }
        }
        Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(()),
        Err(e) => return Err(e),
      }
    }
  }
}

impl fmt::Debug for UdpDataChannel {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("UdpDataChannel")
      .field("local_address", &self.socket.local_addr().ok())
      .field("remote_addresses", &self.remote_addresses)
      .field("closed", &self.is_closed())
      .finish()
  }
}

impl DataChannel for UdpDataChannel {
  fn send(&self, destination: GUID, message: &Message) -> io::Result<()> {
    if self.is_closed() {
      trace!("send to {:?} on a closed channel", destination);
      return Ok(());
    }
    let mut buffer = vec![0; self.packet_buffer_size];
    let length = message
      .encode(&mut buffer)
      .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))?;
    for address in &self.remote_addresses {
      match self.socket.send_to(&buffer[..length], address) {
        Ok(sent) if sent == length => (),
        Ok(sent) => warn!("Sent only {} of {} bytes to {}", sent, length, address),
        Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
          warn!("Send buffer full, dropped {} bytes to {}", length, address)
        }
        Err(e) => {
          warn!("Unable to send to {} ({:?}): {:?}", address, destination, e);
          return Err(e);
        }
      }
    }
    Ok(())
  }

  fn receive(&self) -> io::Result<Option<Message>> {
    if self.is_closed() {
      return Err(UdpDataChannel::closed_error());
    }
    let mut receiving = self
      .receiving
      .lock()
      .map_err(|_| io::Error::new(io::ErrorKind::Other, "receive state lock poisoned"))?;
    if let Some(message) = receiving.pending.pop_front() {
      return Ok(Some(message));
    }

    let Receiving { poll, events, .. } = &mut *receiving;
    poll.poll(events, None)?;
    let mut readable = false;
    for event in events.iter() {
      match event.token() {
        STOP_TOKEN => return Err(UdpDataChannel::closed_error()),
        SOCKET_TOKEN => readable = true,
        other => warn!("UdpDataChannel got unknown token {:?}", other),
      }
    }
    if readable {
      receiving.drain(&self.socket)?;
    }
    if self.is_closed() {
      return Err(UdpDataChannel::closed_error());
    }
    Ok(receiving.pending.pop_front())
  }

  fn close(&self) {
    if self.closed.swap(true, Ordering::SeqCst) {
      return;
    }
    match self.stop_sender.lock() {
      Ok(stop_sender) => {
        if stop_sender.send(()).is_err() {
          debug!("UdpDataChannel stop receiver is gone");
        }
      }
      Err(_) => error!("UdpDataChannel stop sender lock poisoned"),
    }
  }

  fn is_closed(&self) -> bool {
    self.closed.load(Ordering::SeqCst)
  }
}

/// Opens [`UdpDataChannel`]s with the socket settings of one configuration.
#[derive(Debug, Clone)]
pub struct UdpDataChannelFactory {
  config: RtpsConfig,
}

impl UdpDataChannelFactory {
  pub fn new(config: RtpsConfig) -> UdpDataChannelFactory {
    UdpDataChannelFactory { config }
  }
}

impl DataChannelFactory for UdpDataChannelFactory {
  fn connect(&self, locators: &[Locator]) -> io::Result<Arc<dyn DataChannel>> {
    Ok(Arc::new(UdpDataChannel::connect(locators, &self.config)?))
  }

  fn bind(&self, port: u16) -> io::Result<Arc<dyn DataChannel>> {
    Ok(Arc::new(UdpDataChannel::bind(port, &self.config)?))
  }
}
