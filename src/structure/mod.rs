pub mod cache_change;
pub mod guid;
pub mod history_cache;
pub mod locator;
pub mod qos;
pub mod sequence_number;
pub mod time;
