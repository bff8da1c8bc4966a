use std::{
  io,
  sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex,
  },
  thread::{self, JoinHandle},
};

#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};

use crate::{
  network::DataChannel,
  result::{Error, Result},
  rtps::Message,
};

/// Something that wants to see every decoded message of a receiver.
pub trait MessageSubscriber: Send + Sync {
  fn on_message(&self, message: &Message);
}

/// Runs the receive loop of one data channel on its own thread. Every
/// decoded message goes to each subscriber in turn, in subscription order.
pub struct MessageReceiver {
  data_channel: Arc<dyn DataChannel>,
  subscribers: Arc<Mutex<Vec<Arc<dyn MessageSubscriber>>>>,
  stop: Arc<AtomicBool>,
  receive_thread: Mutex<Option<JoinHandle<()>>>,
}

impl MessageReceiver {
  pub fn new(data_channel: Arc<dyn DataChannel>) -> MessageReceiver {
    MessageReceiver {
      data_channel,
      subscribers: Arc::new(Mutex::new(Vec::new())),
      stop: Arc::new(AtomicBool::new(false)),
      receive_thread: Mutex::new(None),
    }
  }

  pub fn subscribe(&self, subscriber: Arc<dyn MessageSubscriber>) -> Result<()> {
    self.subscribers.lock()?.push(subscriber);
    Ok(())
  }

  /// Starts the receive thread. Calling it again while the thread runs
  /// does nothing.
  pub fn start(&self) -> Result<()> {
    if self.stop.load(Ordering::SeqCst) {
      return Err(Error::Closed);
    }
    let mut receive_thread = self.receive_thread.lock()?;
    if receive_thread.is_some() {
      return Ok(());
    }
    let data_channel = self.data_channel.clone();
    let subscribers = self.subscribers.clone();
    let stop = self.stop.clone();
    let handle = thread::Builder::new()
      .name("rtps message receiver".to_string())
      .spawn(move || receive_loop(&*data_channel, &subscribers, &stop))?;
    *receive_thread = Some(handle);
    Ok(())
  }

  /// Hands `message` to the subscribers on the calling thread.
  pub fn dispatch(&self, message: &Message) {
    dispatch_to(&self.subscribers, message);
  }

  /// Stops the receive loop and waits for the thread to finish.
  pub fn close(&self) {
    if self.stop.swap(true, Ordering::SeqCst) {
      return;
    }
    self.data_channel.close();
    let handle = match self.receive_thread.lock() {
      Ok(mut receive_thread) => receive_thread.take(),
      Err(_) => {
        error!("MessageReceiver thread handle lock poisoned");
        None
      }
    };
    if let Some(handle) = handle {
      if handle.join().is_err() {
        error!("MessageReceiver thread panicked");
      }
    }
  }
}

impl Drop for MessageReceiver {
  fn drop(&mut self) {
    self.close();
  }
}

fn dispatch_to(subscribers: &Mutex<Vec<Arc<dyn MessageSubscriber>>>, message: &Message) {
  // Subscribers may subscribe more while we deliver, so do not hold the lock.
  let subscribers: Vec<Arc<dyn MessageSubscriber>> = match subscribers.lock() {
    Ok(s) => s.clone(),
    Err(_) => {
      error!("MessageReceiver subscriber list lock poisoned");
      return;
    }
  };
  for subscriber in subscribers {
    subscriber.on_message(message);
  }
}

fn receive_loop(
  data_channel: &dyn DataChannel,
  subscribers: &Mutex<Vec<Arc<dyn MessageSubscriber>>>,
  stop: &AtomicBool,
) {
  debug!("MessageReceiver started");
  while !stop.load(Ordering::SeqCst) {
    match data_channel.receive() {
      Ok(Some(message)) => {
        trace!(
          "Received message from {:?} with {} submessages",
          message.header.guid_prefix,
          message.submessages.len()
        );
        dispatch_to(subscribers, &message);
      }
      Ok(None) => (),
      Err(_) if stop.load(Ordering::SeqCst) || data_channel.is_closed() => break,
      Err(e) => match e.kind() {
        io::ErrorKind::Interrupted
        | io::ErrorKind::ConnectionRefused
        | io::ErrorKind::ConnectionReset => {
          debug!("Transient receive error: {:?}", e);
        }
        _ => {
          error!("Receive failed, stopping MessageReceiver: {:?}", e);
          break;
        }
      },
    }
  }
  debug!("MessageReceiver stopped");
}
