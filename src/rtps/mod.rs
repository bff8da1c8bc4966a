//! The protocol engine: message framing, readers and writers with their
//! remote endpoint proxies, fragmentation and the receive loop.

pub mod fragment_assembler;
pub mod fragment_splitter;
pub mod length_calculator;
pub mod message;
pub mod message_receiver;
pub mod reader;
pub mod reader_proxy;
pub mod sample;
pub mod submessage;
pub mod walker;
pub mod writer;
pub mod writer_proxy;

pub use message::{Message, MessageBuilder, ENDIANNESS};
pub use message_receiver::{MessageReceiver, MessageSubscriber};
pub use reader::{RtpsReader, SampleReceiver};
pub use sample::{Sample, UserSample};
pub use submessage::{Submessage, SubmessageBody};
pub use writer::RtpsWriter;
