use std::{fmt, io, result, sync::PoisonError};

/// Specialized Result, similar to std::io::Result
pub type Result<T> = result::Result<T, Error>;

#[derive(Debug)]
pub enum Error {
  /// Wire encoding or decoding failed inside speedy.
  Serialization(speedy::Error),
  /// Transport level failure.
  Io(io::Error),
  /// Encode target buffer cannot hold the message.
  BufferTooSmall { needed: usize, available: usize },
  /// Caller supplied an illegal argument or configuration value.
  BadParameter(String),
  /// Operation is not possible in the current state.
  PreconditionNotMet(String),
  /// A thread panicked while holding one of our locks.
  LockPoisoned,
  /// The entity or channel was closed.
  Closed,
}

impl fmt::Display for Error {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Error::Serialization(e) => write!(f, "serialization error: {}", e),
      Error::Io(e) => write!(f, "i/o error: {}", e),
      Error::BufferTooSmall { needed, available } => write!(
        f,
        "buffer too small: need {} bytes, have {}",
        needed, available
      ),
      Error::BadParameter(reason) => write!(f, "bad parameter: {}", reason),
      Error::PreconditionNotMet(reason) => write!(f, "precondition not met: {}", reason),
      Error::LockPoisoned => write!(f, "lock poisoned"),
      Error::Closed => write!(f, "closed"),
    }
  }
}

impl std::error::Error for Error {
  fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
    match self {
      Error::Serialization(e) => Some(e),
      Error::Io(e) => Some(e),
      _ => None,
    }
  }
}

impl From<speedy::Error> for Error {
  fn from(e: speedy::Error) -> Self {
    Error::Serialization(e)
  }
}

impl From<io::Error> for Error {
  fn from(e: io::Error) -> Self {
    Error::Io(e)
  }
}

impl<T> From<PoisonError<T>> for Error {
  fn from(_: PoisonError<T>) -> Self {
    Error::LockPoisoned
  }
}

pub(crate) fn bad_parameter<T>(reason: impl Into<String>) -> Result<T> {
  Err(Error::BadParameter(reason.into()))
}
