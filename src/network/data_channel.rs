use std::{io, sync::Arc};

use crate::{
  rtps::Message,
  structure::{guid::GUID, locator::Locator},
};

/// Raw message transport underneath the engine.
///
/// A channel is either connected to the locators of one remote endpoint
/// and used for `send`, or bound to a local port and used for `receive`.
pub trait DataChannel: Send + Sync {
  /// Encodes `message` and sends it towards `destination`.
  fn send(&self, destination: GUID, message: &Message) -> io::Result<()>;

  /// Waits for the next message. `Ok(None)` means what arrived was not
  /// RTPS and the caller should try again. A `close` from another thread
  /// ends the wait with an error.
  fn receive(&self) -> io::Result<Option<Message>>;

  /// After `close`, `receive` returns an error and `send` does nothing.
  fn close(&self);

  fn is_closed(&self) -> bool;
}

/// Opens channels. Readers and writers use it to reach their matched
/// remote endpoints.
pub trait DataChannelFactory: Send + Sync {
  fn connect(&self, locators: &[Locator]) -> io::Result<Arc<dyn DataChannel>>;

  fn bind(&self, port: u16) -> io::Result<Arc<dyn DataChannel>>;
}
