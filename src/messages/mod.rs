pub mod header;
pub mod protocol_id;
pub mod protocol_version;
pub mod submessages;
pub mod vendor_id;
