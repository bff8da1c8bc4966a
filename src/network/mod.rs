pub mod data_channel;
pub mod udp_channel;
pub mod util;

pub use data_channel::{DataChannel, DataChannelFactory};
pub use udp_channel::{UdpDataChannel, UdpDataChannelFactory};
